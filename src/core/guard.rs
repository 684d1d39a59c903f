//! Guarded writes - the one concurrency primitive of the engine.
//!
//! A guarded write is a single `UPDATE ... WHERE <row> AND <expected state>`. The
//! database evaluates the condition and applies the change in one statement, so of
//! any number of racing callers only those whose expectation still holds see
//! [`Guarded::Applied`]. Claims, completions and promo redemptions all go through
//! [`apply_guarded`] instead of reading a row, checking it, and writing it back.
//!
//! Multi-statement work that reads before it writes opens its transaction with
//! [`begin_write`], so it holds the write lock from its first statement on.

use crate::errors::Result;
use sea_orm::{
    ConnectionTrait, DatabaseTransaction, DbBackend, EntityTrait, TransactionTrait, UpdateMany,
};
use tracing::trace;

/// Matches no rows, but still takes the `SQLite` write lock.
const SQLITE_LOCK_STATEMENT: &str = "UPDATE stores SET id = id WHERE 0";

/// Outcome of a guarded write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Guarded {
    /// The condition held and the row was changed
    Applied,
    /// The condition no longer held; nothing was written
    Rejected,
}

impl Guarded {
    /// Whether the write went through.
    #[must_use]
    pub const fn is_applied(self) -> bool {
        matches!(self, Self::Applied)
    }
}

/// Executes `update` and reports whether it changed a row.
///
/// `update` must filter on the target row's primary key plus the state the caller
/// expects to find.
pub async fn apply_guarded<C, E>(db: &C, update: UpdateMany<E>) -> Result<Guarded>
where
    C: ConnectionTrait,
    E: EntityTrait,
{
    let result = update.exec(db).await?;
    trace!(rows = result.rows_affected, "Guarded write executed");
    Ok(if result.rows_affected > 0 {
        Guarded::Applied
    } else {
        Guarded::Rejected
    })
}

/// Begins a transaction that holds the database write lock before its first read.
///
/// `SQLite` transactions start deferred. One that reads and then writes cannot
/// upgrade its lock while another connection writes, and fails with "database is
/// locked" at once instead of waiting out the busy timeout. Waiting for the write
/// lock up front avoids the upgrade. Inside an outer transaction this opens a
/// savepoint, and the lock is already held.
pub async fn begin_write<C>(db: &C) -> Result<DatabaseTransaction>
where
    C: ConnectionTrait + TransactionTrait,
{
    let txn = db.begin().await?;
    if txn.get_database_backend() == DbBackend::Sqlite {
        txn.execute_unprepared(SQLITE_LOCK_STATEMENT).await?;
    }
    Ok(txn)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::entities::{Courier, courier};
    use crate::test_utils::*;
    use sea_orm::{ColumnTrait, QueryFilter, sea_query::Expr};

    #[tokio::test]
    async fn test_guard_applies_only_while_condition_holds() -> Result<()> {
        let db = setup_test_db().await?;
        let rider = create_test_courier(&db, "996700000001", None).await?;

        let bind = |handle: &str| {
            Courier::update_many()
                .col_expr(courier::Column::ChannelHandle, Expr::value(handle))
                .filter(courier::Column::Id.eq(rider.id))
                .filter(courier::Column::ChannelHandle.is_null())
        };

        assert_eq!(apply_guarded(&db, bind("first")).await?, Guarded::Applied);
        assert_eq!(apply_guarded(&db, bind("second")).await?, Guarded::Rejected);

        let stored = Courier::find_by_id(rider.id).one(&db).await?.unwrap();
        assert_eq!(stored.channel_handle.as_deref(), Some("first"));
        Ok(())
    }

    #[tokio::test]
    async fn test_guard_on_missing_row_is_rejected() -> Result<()> {
        let db = setup_test_db().await?;
        let update = Courier::update_many()
            .col_expr(courier::Column::Name, Expr::value("ghost"))
            .filter(courier::Column::Id.eq(404));
        assert!(!apply_guarded(&db, update).await?.is_applied());
        Ok(())
    }

    #[tokio::test]
    async fn test_begin_write_nests_as_savepoint() -> Result<()> {
        let db = setup_test_db().await?;
        let rider = create_test_courier(&db, "996700000002", None).await?;

        let outer = begin_write(&db).await?;
        let inner = begin_write(&outer).await?;
        let rename = Courier::update_many()
            .col_expr(courier::Column::Name, Expr::value("Renamed"))
            .filter(courier::Column::Id.eq(rider.id));
        assert!(apply_guarded(&inner, rename).await?.is_applied());
        inner.commit().await?;
        outer.commit().await?;

        let stored = Courier::find_by_id(rider.id).one(&db).await?.unwrap();
        assert_eq!(stored.name.as_deref(), Some("Renamed"));
        Ok(())
    }
}
