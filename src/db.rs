use anyhow::Context;
use sqlx::MySqlPool;
use tracing::{info, warn};

use crate::auth::password::hash_password;
use crate::model::role::Role;

pub async fn init_db(database_url: &str) -> anyhow::Result<MySqlPool> {
    MySqlPool::connect(database_url)
        .await
        .context("Failed to connect to database")
}

/// Applies the migrations embedded from `./migrations`.
pub async fn run_migrations(pool: &MySqlPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("Failed to run database migrations")?;
    info!("Database migrations applied");
    Ok(())
}

/// Creates the first administrator when no user exists yet.
pub async fn bootstrap_admin(pool: &MySqlPool, username: &str, password: &str) -> anyhow::Result<()> {
    let users = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
        .fetch_one(pool)
        .await?;
    if users > 0 {
        return Ok(());
    }

    let hash = hash_password(password).map_err(|e| anyhow::anyhow!("Failed to hash admin password: {e}"))?;

    let mut tx = pool.begin().await?;
    let result = sqlx::query("INSERT INTO users (username, password, active_role_id) VALUES (?, ?, ?)")
        .bind(username)
        .bind(hash)
        .bind(Role::Admin.id())
        .execute(&mut *tx)
        .await?;
    sqlx::query("INSERT INTO user_roles (user_id, role_id) VALUES (?, ?)")
        .bind(result.last_insert_id())
        .bind(Role::Admin.id())
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    warn!(username, "Bootstrap admin created; change its password");
    Ok(())
}
