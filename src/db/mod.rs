//! Database module for persistence using SeaORM (SQLite by default, PostgreSQL when configured)

pub mod entities;

use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr, Statement};

use crate::config::DatabaseTarget;

/// Initialize database connection and create tables
pub async fn init_database(target: &DatabaseTarget) -> Result<DatabaseConnection, DbErr> {
    // Ensure parent directory exists
    if let DatabaseTarget::Sqlite { path } = target {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
    }

    let db = connect(&target.url()).await?;

    // Create tables
    create_tables(&db).await?;

    Ok(db)
}

/// Open a connection pool for `url`
pub async fn connect(url: &str) -> Result<DatabaseConnection, DbErr> {
    tracing::info!("Connecting to database: {}", redact(url));

    let mut options = ConnectOptions::new(url.to_string());
    options.sqlx_logging(false);

    // Every pooled connection would get its own private in-memory database
    if url.contains(":memory:") {
        options.max_connections(1).min_connections(1);
    }

    Database::connect(options).await
}

/// Create all tables if they don't exist
pub async fn create_tables(db: &DatabaseConnection) -> Result<(), DbErr> {
    // Ingredients table
    db.execute(Statement::from_string(
        db.get_database_backend(),
        r#"
        CREATE TABLE IF NOT EXISTS ingredients (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            name_key TEXT NOT NULL,
            ingredient_type TEXT,
            description TEXT,
            energy DOUBLE PRECISION NOT NULL,
            hsr DOUBLE PRECISION,
            hsr_id TEXT,
            ghg DOUBLE PRECISION,
            emission_id TEXT,
            protein DOUBLE PRECISION NOT NULL,
            sodium DOUBLE PRECISION NOT NULL,
            sugar DOUBLE PRECISION NOT NULL,
            saturated_fat DOUBLE PRECISION NOT NULL,
            fibre DOUBLE PRECISION NOT NULL,
            fat DOUBLE PRECISION,
            carbohydrate DOUBLE PRECISION,
            created_at BIGINT NOT NULL,
            updated_at BIGINT NOT NULL
        )
        "#.to_string(),
    )).await?;

    // Meals table
    db.execute(Statement::from_string(
        db.get_database_backend(),
        r#"
        CREATE TABLE IF NOT EXISTS meals (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            name_key TEXT NOT NULL,
            description TEXT,
            energy DOUBLE PRECISION,
            ghg DOUBLE PRECISION,
            hsr DOUBLE PRECISION,
            created_at BIGINT NOT NULL,
            updated_at BIGINT NOT NULL
        )
        "#.to_string(),
    )).await?;

    // Meal ingredient lines (ordered by position; ingredient_id is not enforced)
    db.execute(Statement::from_string(
        db.get_database_backend(),
        r#"
        CREATE TABLE IF NOT EXISTS meal_ingredients (
            meal_id TEXT NOT NULL,
            position INTEGER NOT NULL,
            ingredient_id TEXT NOT NULL,
            quantity DOUBLE PRECISION NOT NULL DEFAULT 1,
            PRIMARY KEY (meal_id, position),
            FOREIGN KEY (meal_id) REFERENCES meals(id) ON DELETE CASCADE
        )
        "#.to_string(),
    )).await?;

    // Create index for reverse lookups from an ingredient
    db.execute(Statement::from_string(
        db.get_database_backend(),
        r#"CREATE INDEX IF NOT EXISTS idx_meal_ingredients_ingredient ON meal_ingredients(ingredient_id)"#.to_string(),
    )).await?;

    // Markets table
    db.execute(Statement::from_string(
        db.get_database_backend(),
        r#"
        CREATE TABLE IF NOT EXISTS markets (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            name_key TEXT NOT NULL,
            address TEXT,
            suburb TEXT,
            postcode INTEGER,
            state TEXT,
            business_category TEXT,
            lga TEXT,
            region TEXT,
            lon DOUBLE PRECISION,
            lat DOUBLE PRECISION,
            created_at BIGINT NOT NULL,
            updated_at BIGINT NOT NULL
        )
        "#.to_string(),
    )).await?;

    tracing::info!("Database tables initialized");
    Ok(())
}

/// Current unix time in seconds, used for createdAt/updatedAt
pub fn now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

/// Hide the password part of a connection string before logging it
fn redact(url: &str) -> String {
    match url::Url::parse(url) {
        Ok(mut parsed) if parsed.password().is_some() => {
            let _ = parsed.set_password(Some("****"));
            parsed.to_string()
        }
        _ => url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_tables_is_idempotent() {
        let db = connect("sqlite::memory:").await.unwrap();
        create_tables(&db).await.unwrap();
        create_tables(&db).await.unwrap();
    }

    #[test]
    fn test_redact_password() {
        assert_eq!(
            redact("postgres://api:secret@db:5432/food"),
            "postgres://api:****@db:5432/food"
        );
        assert_eq!(redact("sqlite::memory:"), "sqlite::memory:");
    }
}
