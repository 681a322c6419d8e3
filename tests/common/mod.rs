// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use anyhow::Result;
use balancebook::application::AccountService;
use tempfile::TempDir;

/// Helper to create a test service with a temporary database
pub async fn test_service() -> Result<(AccountService, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let service = AccountService::init(db_path.to_str().unwrap()).await?;
    Ok((service, temp_dir))
}

/// Helper to create a service whose user already holds a deposit balance
pub async fn funded_service(user_id: i64, deposit_cents: i64) -> Result<(AccountService, TempDir)> {
    let (service, temp_dir) = test_service().await?;
    service.deposit(user_id, deposit_cents, "").await?;
    Ok((service, temp_dir))
}
