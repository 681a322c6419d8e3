use thiserror::Error;

use crate::domain::{Cents, UserId};
use crate::storage::StoreError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Account not found for user {0}")]
    AccountNotFound(UserId),

    #[error("Insufficient funds for user {user_id}: balance {balance}, required {required}")]
    InsufficientFunds {
        user_id: UserId,
        balance: Cents,
        required: Cents,
    },

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(user_id) => AppError::AccountNotFound(user_id),
            StoreError::Insufficient {
                user_id,
                available,
                requested,
            } => AppError::InsufficientFunds {
                user_id,
                balance: available,
                required: requested,
            },
            StoreError::Backend(err) => AppError::Storage(err),
        }
    }
}
