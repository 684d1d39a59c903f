//! Database configuration module.
//!
//! This module handles `SQLite` database connection and table creation using `SeaORM`.
//! Tables are generated from the entity definitions with `Schema::create_table_from_entity`,
//! so the schema always matches the Rust structs without hand-written SQL.

use crate::entities::{
    Courier, Order, OrderItem, OrderNotification, Partner, Product, PromoCode, PromoProduct,
    PromoRedemption, Store, StorePartner,
};
use crate::errors::Result;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, EntityTrait, Schema};
use tracing::{debug, info};

/// Default database location when neither `DATABASE_URL` nor config.toml name one.
pub const DEFAULT_DATABASE_URL: &str = "sqlite://data/dispatch.sqlite?mode=rwc";

/// Establishes a connection to the database at `database_url`.
pub async fn create_connection(database_url: &str) -> Result<DatabaseConnection> {
    debug!("Connecting to database at {database_url}");
    Database::connect(database_url).await.map_err(Into::into)
}

/// Creates all tables from the entity definitions.
///
/// Parents are created before the tables that reference them. Existing tables are
/// left untouched, so this is safe to run on every start.
pub async fn create_tables<C>(db: &C) -> Result<()>
where
    C: ConnectionTrait,
{
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    create_table(db, &schema, Store).await?;
    create_table(db, &schema, Partner).await?;
    create_table(db, &schema, StorePartner).await?;
    create_table(db, &schema, Product).await?;
    create_table(db, &schema, Courier).await?;
    create_table(db, &schema, PromoCode).await?;
    create_table(db, &schema, PromoProduct).await?;
    create_table(db, &schema, PromoRedemption).await?;
    create_table(db, &schema, Order).await?;
    create_table(db, &schema, OrderItem).await?;
    create_table(db, &schema, OrderNotification).await?;

    info!("Database tables ready");
    Ok(())
}

async fn create_table<C, E>(db: &C, schema: &Schema, entity: E) -> Result<()>
where
    C: ConnectionTrait,
    E: EntityTrait,
{
    let builder = db.get_database_backend();
    let mut statement = schema.create_table_from_entity(entity);
    statement.if_not_exists();
    db.execute(builder.build(&statement)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{OrderModel, PromoCodeModel};
    use crate::test_utils::setup_test_db;
    use sea_orm::QuerySelect;

    #[tokio::test]
    async fn test_create_tables() -> Result<()> {
        let db = setup_test_db().await?;

        // Test that tables exist by querying them
        let _: Vec<OrderModel> = Order::find().limit(1).all(&db).await?;
        let _: Vec<PromoCodeModel> = PromoCode::find().limit(1).all(&db).await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_create_tables_is_idempotent() -> Result<()> {
        let db = setup_test_db().await?;
        create_tables(&db).await?;
        Ok(())
    }
}
