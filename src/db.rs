use log::debug;
use sqlx::mysql::{MySqlPool, MySqlPoolOptions, MySqlRow};
use sqlx::Row;
use thiserror::Error;

use crate::config::DbConfig;
use crate::models::{StudentRecord, StudentSummary};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database connection failed: {0}; check DB_HOST, DB_USER, DB_PASSWORD and DB_DATABASE")]
    Connection(#[source] sqlx::Error),
    #[error("database query failed: {0}")]
    Query(#[source] sqlx::Error),
}

fn classify(err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::Configuration(_) => StoreError::Connection(err),
        other => StoreError::Query(other),
    }
}

pub async fn connect(config: &DbConfig) -> Result<MySqlPool, StoreError> {
    debug!("connecting to mysql at {}", config.host);
    MySqlPoolOptions::new()
        .max_connections(5)
        .connect(&config.url())
        .await
        .map_err(StoreError::Connection)
}

pub async fn list_students(pool: &MySqlPool) -> Result<Vec<StudentSummary>, StoreError> {
    let rows = sqlx::query("SELECT id, name, email, date FROM paced_learning ORDER BY date DESC")
        .fetch_all(pool)
        .await
        .map_err(classify)?;

    debug!("fetched {} learning records", rows.len());
    Ok(rows.iter().map(summary_from_row).collect())
}

pub async fn fetch_student(pool: &MySqlPool, id: i64) -> Result<Option<StudentRecord>, StoreError> {
    let row = sqlx::query(
        "SELECT id, name, email, date, \
         domain_1_content, domain_2_content, domain_3_content, \
         domain_4_content, domain_5_content, domain_6_content \
         FROM paced_learning WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .map_err(classify)?;

    Ok(row.map(|row| StudentRecord {
        id: row.get("id"),
        name: row.get("name"),
        email: row.get("email"),
        submitted_at: row.get("date"),
        domain_1: row.get("domain_1_content"),
        domain_2: row.get("domain_2_content"),
        domain_3: row.get("domain_3_content"),
        domain_4: row.get("domain_4_content"),
        domain_5: row.get("domain_5_content"),
        domain_6: row.get("domain_6_content"),
    }))
}

fn summary_from_row(row: &MySqlRow) -> StudentSummary {
    StudentSummary {
        id: row.get("id"),
        name: row.get("name"),
        email: row.get("email"),
        submitted_at: row.get("date"),
    }
}
