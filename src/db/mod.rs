pub mod models;
pub mod repository;
pub mod schema;
pub mod vector;

use anyhow::Context;
use sqlx::PgPool;

/// Connect and run idempotent schema initialization. All C2–C5 repositories
/// are thin typed wrappers over this single pool; none of them
/// does in-application K-NN — every vector comparison is pushed into SQL.
pub async fn connect(database_url: &str) -> anyhow::Result<PgPool> {
    let pool = PgPool::connect(database_url)
        .await
        .context("connect to Postgres")?;
    schema::init_schema(&pool).await.context("initialize schema")?;
    Ok(pool)
}
