mod common;

use anyhow::Result;
use balancebook::application::AppError;
use balancebook::domain::EventKind;
use common::funded_service;

#[tokio::test]
async fn test_reserve_moves_funds_into_reserve_account() -> Result<()> {
    let (service, _temp) = funded_service(1, 10_000).await?;

    let entry = service.reserve(1, 1, 1, 3_000, "").await?;

    let balance = service.get_balance(1).await?;
    assert_eq!(balance.deposit_cents, 7_000);
    assert_eq!(balance.reserve_cents, 3_000);

    assert_eq!(entry.event, EventKind::Reserve);
    assert_eq!(entry.amount_cents, 3_000);
    assert_eq!(entry.start_cents, 10_000);
    assert_eq!(entry.end_cents, 7_000);
    assert_eq!(entry.message, "reserve 30.00 on account (service 1, order 1)");

    Ok(())
}

#[tokio::test]
async fn test_reserve_conserves_total_funds() -> Result<()> {
    let (service, _temp) = funded_service(1, 10_000).await?;

    let before = service.get_balance(1).await?;
    service.reserve(1, 1, 1, 4_500, "").await?;
    let after = service.get_balance(1).await?;

    assert_eq!(
        before.deposit_cents + before.reserve_cents,
        after.deposit_cents + after.reserve_cents
    );

    Ok(())
}

#[tokio::test]
async fn test_confirm_withdraws_reserved_funds() -> Result<()> {
    let (service, _temp) = funded_service(1, 10_000).await?;
    service.reserve(1, 1, 1, 3_000, "").await?;

    let entry = service.confirm(1, 1, 1, 3_000, "").await?;

    let balance = service.get_balance(1).await?;
    assert_eq!(balance.deposit_cents, 7_000);
    assert_eq!(balance.reserve_cents, 0);

    // TAKE snapshots the reserve side; the deposit account is untouched.
    assert_eq!(entry.event, EventKind::Take);
    assert_eq!(entry.start_cents, 3_000);
    assert_eq!(entry.end_cents, 0);
    assert_eq!(entry.message, "take 30.00 from account (service 1, order 1)");

    Ok(())
}

#[tokio::test]
async fn test_partial_confirm_leaves_remainder_reserved() -> Result<()> {
    let (service, _temp) = funded_service(1, 10_000).await?;
    service.reserve(1, 2, 7, 6_000, "").await?;

    service.confirm(1, 2, 7, 2_000, "").await?;

    let balance = service.get_balance(1).await?;
    assert_eq!(balance.deposit_cents, 4_000);
    assert_eq!(balance.reserve_cents, 4_000);

    Ok(())
}

#[tokio::test]
async fn test_reserve_beyond_deposit_fails_without_mutation() -> Result<()> {
    let (service, _temp) = funded_service(1, 7_000).await?;

    let result = service.reserve(1, 1, 2, 15_000, "").await;
    assert!(matches!(
        result,
        Err(AppError::InsufficientFunds {
            user_id: 1,
            balance: 7_000,
            required: 15_000
        })
    ));

    let balance = service.get_balance(1).await?;
    assert_eq!(balance.deposit_cents, 7_000);
    assert_eq!(balance.reserve_cents, 0);
    assert_eq!(service.history(1).await?.len(), 1);

    Ok(())
}

#[tokio::test]
async fn test_confirm_beyond_reserve_fails_without_mutation() -> Result<()> {
    let (service, _temp) = funded_service(1, 10_000).await?;
    service.reserve(1, 1, 1, 3_000, "").await?;

    // A full deposit balance does not help: confirm draws on the
    // reserve account only.
    let result = service.confirm(1, 1, 1, 5_000, "").await;
    assert!(matches!(
        result,
        Err(AppError::InsufficientFunds {
            user_id: 1,
            balance: 3_000,
            required: 5_000
        })
    ));

    let balance = service.get_balance(1).await?;
    assert_eq!(balance.deposit_cents, 7_000);
    assert_eq!(balance.reserve_cents, 3_000);
    assert_eq!(service.history(1).await?.len(), 2);

    Ok(())
}

#[tokio::test]
async fn test_reserved_funds_are_not_spendable() -> Result<()> {
    let (service, _temp) = funded_service(1, 10_000).await?;
    service.reserve(1, 1, 1, 8_000, "").await?;

    // Only the 2000 still on deposit can be reserved or withdrawn.
    assert!(matches!(
        service.reserve(1, 1, 2, 3_000, "").await,
        Err(AppError::InsufficientFunds { .. })
    ));
    assert!(matches!(
        service.withdraw(1, 3_000, "").await,
        Err(AppError::InsufficientFunds { .. })
    ));

    service.reserve(1, 1, 2, 2_000, "").await?;
    let balance = service.get_balance(1).await?;
    assert_eq!(balance.deposit_cents, 0);
    assert_eq!(balance.reserve_cents, 10_000);

    Ok(())
}
