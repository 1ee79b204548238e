// region:    --- Imports
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, Transaction};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tracing::{debug, info};

// endregion: --- Imports

const SCHEMA_SQL: &str = include_str!("../sql/01-create-schema.sql");
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

/// 트랜잭션 본문 (커밋 여부는 결과에 따라 결정)
pub type TxBody<'c, R, E> = Pin<Box<dyn Future<Output = Result<R, E>> + Send + 'c>>;

/// Postgres 커넥션 풀 관리
pub struct DatabaseManager {
    pool: PgPool,
}

impl DatabaseManager {
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .connect(database_url)
            .await?;
        info!(
            "{:<12} --> 커넥션 풀 준비 (max_connections={})",
            "Database", max_connections
        );
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// body 가 Ok 면 커밋, Err 면 롤백
    pub async fn transaction<F, R, E>(&self, body: F) -> Result<R, E>
    where
        F: for<'c> FnOnce(&'c mut Transaction<'_, Postgres>) -> TxBody<'c, R, E>,
        E: From<sqlx::Error>,
    {
        let mut tx = self.pool.begin().await?;
        let outcome = body(&mut tx).await;
        if outcome.is_ok() {
            tx.commit().await?;
        } else {
            tx.rollback().await?;
        }
        outcome
    }

    /// 스키마 적용. 모든 문장이 IF NOT EXISTS 라 재실행해도 안전하다.
    pub async fn initialize_database(&self) -> Result<(), sqlx::Error> {
        let statements = schema_statements(SCHEMA_SQL);
        for statement in &statements {
            debug!("{:<12} --> {}", "Database", first_line(statement));
            sqlx::query(statement).execute(&self.pool).await?;
        }
        info!(
            "{:<12} --> 스키마 적용 완료 ({}개 문장)",
            "Database",
            statements.len()
        );
        Ok(())
    }
}

/// SQL 스크립트를 문장 단위로 분리 (`--` 주석 줄은 제외)
pub fn schema_statements(script: &str) -> Vec<String> {
    let stripped: String = script
        .lines()
        .filter(|line| !line.trim_start().starts_with("--"))
        .collect::<Vec<_>>()
        .join("\n");

    stripped
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn first_line(statement: &str) -> &str {
    statement.lines().next().unwrap_or_default()
}
