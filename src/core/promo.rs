//! Promo ledger - checking and redeeming promo codes.
//!
//! [`apply_promo`] is a read-only preview: it runs the eligibility checks and prices
//! the order. [`redeem_promo`] runs the same checks again inside a transaction and
//! then records the redemption. The usage counter is bumped by a guarded write that
//! also re-checks the limit and the validity window, so concurrent redemptions can
//! never push `used_count` past `usage_limit`.

use crate::{
    core::{
        catalog::get_promo_by_code,
        guard::{Guarded, apply_guarded, begin_write},
    },
    entities::{PromoCode, PromoProduct, PromoRedemption, promo_code, promo_product, promo_redemption},
    errors::{Error, PromoRejection, Result},
};
use chrono::{DateTime, Utc};
use sea_orm::{
    Condition, Set, SqlErr, TransactionTrait, prelude::*, sea_query::Expr,
};
use tracing::{debug, info};

/// Order total after the promo discount, never below zero.
#[must_use]
pub fn discounted_total(order_total: i64, discount_amount: i64) -> i64 {
    order_total.saturating_sub(discount_amount).max(0)
}

/// Runs every eligibility check for `promo` against the order.
///
/// Checks run in a fixed order: minimum sum, activity (window and limit),
/// previous use by this user, product restriction.
pub async fn check_eligibility<C>(
    db: &C,
    promo: &promo_code::Model,
    user_id: i64,
    order_total: i64,
    product_ids: &[i64],
    now: DateTime<Utc>,
) -> Result<()>
where
    C: ConnectionTrait,
{
    if order_total < promo.min_order_sum {
        return Err(PromoRejection::BelowMinimum {
            minimum: promo.min_order_sum,
        }
        .into());
    }

    if !promo.is_within_window(now) || promo.is_exhausted() {
        return Err(PromoRejection::Inactive.into());
    }

    let already_used = PromoRedemption::find_by_id((promo.id, user_id))
        .one(db)
        .await?
        .is_some();
    if already_used {
        return Err(PromoRejection::AlreadyUsed.into());
    }

    let restricted_to: Vec<i64> = PromoProduct::find()
        .filter(promo_product::Column::PromoCodeId.eq(promo.id))
        .all(db)
        .await?
        .into_iter()
        .map(|row| row.product_id)
        .collect();
    if !restricted_to.is_empty() && !product_ids.iter().any(|id| restricted_to.contains(id)) {
        return Err(PromoRejection::NotApplicable.into());
    }

    Ok(())
}

/// Prices an order with `code` without changing any state.
///
/// Returns `max(order_total - discount, 0)`.
pub async fn apply_promo<C>(
    db: &C,
    code: &str,
    user_id: i64,
    order_total: i64,
    product_ids: &[i64],
) -> Result<i64>
where
    C: ConnectionTrait,
{
    let promo = get_promo_by_code(db, code)
        .await?
        .ok_or_else(|| Error::not_found("promo code", code))?;

    check_eligibility(db, &promo, user_id, order_total, product_ids, Utc::now()).await?;
    Ok(discounted_total(order_total, promo.discount_amount))
}

/// Redeems `code` for `user_id` and returns the discounted total.
///
/// Eligibility is checked again at redemption time. The redemption row and the
/// counter increment commit together or not at all.
pub async fn redeem_promo<C>(
    db: &C,
    code: &str,
    user_id: i64,
    order_total: i64,
    product_ids: &[i64],
) -> Result<i64>
where
    C: ConnectionTrait + TransactionTrait,
{
    let txn = begin_write(db).await?;

    let promo = get_promo_by_code(&txn, code)
        .await?
        .ok_or_else(|| Error::not_found("promo code", code))?;

    let now = Utc::now();
    check_eligibility(&txn, &promo, user_id, order_total, product_ids, now).await?;

    let redemption = promo_redemption::ActiveModel {
        promo_code_id: Set(promo.id),
        user_id: Set(user_id),
        redeemed_at: Set(now),
    };
    if let Err(e) = PromoRedemption::insert(redemption)
        .exec_without_returning(&txn)
        .await
    {
        return Err(match e.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(_)) => PromoRejection::AlreadyUsed.into(),
            _ => e.into(),
        });
    }

    let increment = PromoCode::update_many()
        .col_expr(
            promo_code::Column::UsedCount,
            Expr::col(promo_code::Column::UsedCount).add(1),
        )
        .filter(promo_code::Column::Id.eq(promo.id))
        .filter(promo_code::Column::ValidFrom.lte(now))
        .filter(promo_code::Column::ValidUntil.gte(now))
        .filter(
            Condition::any()
                .add(promo_code::Column::UsageLimit.is_null())
                .add(
                    Expr::col(promo_code::Column::UsedCount)
                        .lt(Expr::col(promo_code::Column::UsageLimit)),
                ),
        );

    if apply_guarded(&txn, increment).await? == Guarded::Rejected {
        debug!(promo_id = promo.id, user_id, "Promo limit reached during redemption");
        // Dropping the transaction rolls back the redemption row.
        return Err(PromoRejection::Inactive.into());
    }

    txn.commit().await?;
    info!(promo_id = promo.id, user_id, "Promo code redeemed");
    Ok(discounted_total(order_total, promo.discount_amount))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::core::catalog;
    use crate::test_utils::*;
    use chrono::Duration;
    use std::collections::HashMap;
    use std::sync::Arc;

    #[test]
    fn test_discounted_total_never_negative() {
        assert_eq!(discounted_total(1500, 200), 1300);
        assert_eq!(discounted_total(150, 200), 0);
    }

    #[tokio::test]
    async fn test_apply_promo_example() -> Result<()> {
        let (db, store) = setup_with_store().await?;
        create_test_promo(&db, store.id, "SAVE200", 200, 1000, None, Vec::new()).await?;

        let total = apply_promo(&db, "SAVE200", 1, 1500, &[]).await?;
        assert_eq!(total, 1300);
        Ok(())
    }

    #[tokio::test]
    async fn test_apply_promo_is_pure() -> Result<()> {
        let (db, store) = setup_with_store().await?;
        let promo = create_test_promo(&db, store.id, "PURE", 200, 0, Some(1), Vec::new()).await?;

        apply_promo(&db, "PURE", 1, 500, &[]).await?;
        apply_promo(&db, "PURE", 1, 500, &[]).await?;

        let stored = PromoCode::find_by_id(promo.id).one(&db).await?.unwrap();
        assert_eq!(stored.used_count, 0);
        assert!(PromoRedemption::find().all(&db).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_apply_promo_rejections() -> Result<()> {
        let (db, store) = setup_with_store().await?;
        let cheap = create_test_product(&db, store.id, "Bun", 100).await?;
        let pricey = create_test_product(&db, store.id, "Cake", 900).await?;
        create_test_promo(&db, store.id, "MIN", 100, 1000, None, Vec::new()).await?;
        create_test_promo(&db, store.id, "CAKE", 100, 0, None, vec![pricey.id]).await?;

        let err = apply_promo(&db, "MIN", 1, 999, &[]).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Promo(PromoRejection::BelowMinimum { minimum: 1000 })
        ));

        let err = apply_promo(&db, "CAKE", 1, 500, &[cheap.id]).await.unwrap_err();
        assert!(matches!(err, Error::Promo(PromoRejection::NotApplicable)));
        assert_eq!(apply_promo(&db, "CAKE", 1, 500, &[cheap.id, pricey.id]).await?, 400);

        let err = apply_promo(&db, "NOPE", 1, 500, &[]).await.unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
        Ok(())
    }

    #[tokio::test]
    async fn test_apply_promo_outside_window_is_inactive() -> Result<()> {
        let (db, store) = setup_with_store().await?;
        let now = Utc::now();
        create_windowed_promo(
            &db,
            store.id,
            "LATER",
            now + Duration::days(1),
            now + Duration::days(2),
        )
        .await?;
        create_windowed_promo(
            &db,
            store.id,
            "EXPIRED",
            now - Duration::days(2),
            now - Duration::days(1),
        )
        .await?;

        for code in ["LATER", "EXPIRED"] {
            let err = apply_promo(&db, code, 1, 5000, &[]).await.unwrap_err();
            assert!(matches!(err, Error::Promo(PromoRejection::Inactive)), "{code}");
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_redeem_promo_once_per_user() -> Result<()> {
        let (db, store) = setup_with_store().await?;
        let promo = create_test_promo(&db, store.id, "ONCE", 200, 0, None, Vec::new()).await?;

        assert_eq!(redeem_promo(&db, "ONCE", 7, 1500, &[]).await?, 1300);
        let err = redeem_promo(&db, "ONCE", 7, 1500, &[]).await.unwrap_err();
        assert!(matches!(err, Error::Promo(PromoRejection::AlreadyUsed)));

        let err = apply_promo(&db, "ONCE", 7, 1500, &[]).await.unwrap_err();
        assert!(matches!(err, Error::Promo(PromoRejection::AlreadyUsed)));

        // Another user is unaffected
        assert_eq!(redeem_promo(&db, "ONCE", 8, 1500, &[]).await?, 1300);

        let stored = PromoCode::find_by_id(promo.id).one(&db).await?.unwrap();
        assert_eq!(stored.used_count, 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_redeem_rejection_leaves_no_trace() -> Result<()> {
        let (db, store) = setup_with_store().await?;
        let promo = create_test_promo(&db, store.id, "BIG", 200, 1000, None, Vec::new()).await?;

        let err = redeem_promo(&db, "BIG", 7, 10, &[]).await.unwrap_err();
        assert!(matches!(err, Error::Promo(PromoRejection::BelowMinimum { .. })));

        let stored = PromoCode::find_by_id(promo.id).one(&db).await?.unwrap();
        assert_eq!(stored.used_count, 0);
        assert!(PromoRedemption::find().all(&db).await?.is_empty());
        Ok(())
    }

    async fn redeem_concurrently(
        db: &Arc<DatabaseConnection>,
        code: &'static str,
        user_ids: impl Iterator<Item = i64>,
    ) -> HashMap<&'static str, usize> {
        let handles: Vec<_> = user_ids
            .map(|user_id| {
                let db = Arc::clone(db);
                tokio::spawn(
                    async move { redeem_promo(db.as_ref(), code, user_id, 1000, &[]).await },
                )
            })
            .collect();

        let mut outcomes: HashMap<&str, usize> = HashMap::new();
        for handle in handles {
            let key = match handle.await.unwrap() {
                Ok(_) => "ok",
                Err(Error::Promo(PromoRejection::Inactive)) => "inactive",
                Err(other) => panic!("unexpected outcome: {other}"),
            };
            *outcomes.entry(key).or_default() += 1;
        }
        outcomes
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_redemptions_respect_limit() -> Result<()> {
        const LIMIT: i32 = 3;
        let (db, _dir) = setup_file_db().await?;
        let store = catalog::create_store(&db, "Race Store").await?;
        let promo =
            create_test_promo(&db, store.id, "RUSH", 100, 0, Some(LIMIT), Vec::new()).await?;

        let users = i64::from(FILE_DB_CONNECTIONS);
        let outcomes = redeem_concurrently(&db, "RUSH", 1..=users).await;

        assert_eq!(outcomes.get("ok"), Some(&(LIMIT as usize)));
        assert_eq!(
            outcomes.get("inactive"),
            Some(&(FILE_DB_CONNECTIONS as usize - LIMIT as usize))
        );

        let stored = PromoCode::find_by_id(promo.id).one(db.as_ref()).await?.unwrap();
        assert_eq!(stored.used_count, LIMIT);
        assert_eq!(
            PromoRedemption::find().all(db.as_ref()).await?.len(),
            LIMIT as usize
        );
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_redemptions_of_unlimited_code_all_succeed() -> Result<()> {
        const ROUNDS: i64 = 5;
        let (db, _dir) = setup_file_db().await?;
        let store = catalog::create_store(&db, "Race Store").await?;
        let promo = create_test_promo(&db, store.id, "OPEN", 100, 0, None, Vec::new()).await?;

        let users = i64::from(FILE_DB_CONNECTIONS);
        for round in 0..ROUNDS {
            let first = round * users + 1;
            let outcomes = redeem_concurrently(&db, "OPEN", first..first + users).await;
            assert_eq!(outcomes.get("ok"), Some(&(FILE_DB_CONNECTIONS as usize)));
        }

        let stored = PromoCode::find_by_id(promo.id).one(db.as_ref()).await?.unwrap();
        assert_eq!(i64::from(stored.used_count), ROUNDS * users);
        Ok(())
    }
}
