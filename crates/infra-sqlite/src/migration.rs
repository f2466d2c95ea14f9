// Migration runner - versioned via PRAGMA user_version, idempotent

use sqlx::SqlitePool;
use tracing::info;

pub async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    let current_version: i64 = sqlx::query_scalar("PRAGMA user_version")
        .fetch_one(pool)
        .await?;

    info!(current_version, "running sqlite migrations");

    if current_version < 1 {
        apply_migration(pool, include_str!("../migrations/0001_initial_schema.sql")).await?;
        sqlx::query("PRAGMA user_version = 1").execute(pool).await?;
    }

    Ok(())
}

async fn apply_migration(pool: &SqlitePool, sql: &str) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;
    for statement in sql.split(';') {
        let clean: String = statement
            .lines()
            .filter(|line| !line.trim().starts_with("--"))
            .collect::<Vec<_>>()
            .join("\n")
            .trim()
            .to_string();
        if !clean.is_empty() {
            sqlx::query(&clean).execute(&mut *tx).await?;
        }
    }
    tx.commit().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::create_pool;

    #[tokio::test]
    async fn migrations_create_expected_tables() {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM registry")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn migrations_are_idempotent() {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        run_migrations(&pool).await.unwrap();
    }
}
