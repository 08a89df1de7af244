use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ridebook_core::repository::{BookingRepository, DocumentStore};
use ridebook_core::{BookingHistoryRecord, BookingRecord, BookingStatus, BoxError};
use serde_json::Value;
use sqlx::types::Json;
use sqlx::PgPool;

/// User documents kept as one JSONB column per user.
pub struct PgDocumentStore {
    pool: PgPool,
}

impl PgDocumentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct DocumentRow {
    document: Json<Value>,
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn get(&self, user_id: &str) -> Result<Option<Value>, BoxError> {
        let row: Option<DocumentRow> =
            sqlx::query_as("SELECT document FROM user_documents WHERE user_id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|r| r.document.0))
    }

    async fn set(&self, user_id: &str, document: Value) -> Result<(), BoxError> {
        sqlx::query(
            r#"
            INSERT INTO user_documents (user_id, document, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (user_id) DO UPDATE SET document = EXCLUDED.document, updated_at = NOW()
            "#,
        )
        .bind(user_id)
        .bind(Json(document))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update(&self, user_id: &str, partial: Value) -> Result<(), BoxError> {
        if !partial.is_object() {
            return Err("document update must be a JSON object".into());
        }
        // `||` on jsonb merges top-level keys, which is exactly the update contract.
        sqlx::query(
            r#"
            INSERT INTO user_documents (user_id, document, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (user_id) DO UPDATE
            SET document = user_documents.document || EXCLUDED.document, updated_at = NOW()
            "#,
        )
        .bind(user_id)
        .bind(Json(partial))
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

/// Booking records and trip history.
pub struct PgBookingRepository {
    pool: PgPool,
}

impl PgBookingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct BookingRow {
    record: Json<BookingRecord>,
}

#[derive(sqlx::FromRow)]
struct HistoryRow {
    record: Json<BookingHistoryRecord>,
}

fn status_str(status: BookingStatus) -> &'static str {
    match status {
        BookingStatus::Active => "active",
        BookingStatus::Completed => "completed",
    }
}

#[async_trait]
impl BookingRepository for PgBookingRepository {
    async fn get_booking(&self, booking_id: &str) -> Result<Option<BookingRecord>, BoxError> {
        let row: Option<BookingRow> = sqlx::query_as("SELECT record FROM bookings WHERE id = $1")
            .bind(booking_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.record.0))
    }

    async fn save_booking(&self, record: &BookingRecord) -> Result<(), BoxError> {
        sqlx::query(
            r#"
            INSERT INTO bookings (id, user_id, status, record, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO UPDATE
            SET status = EXCLUDED.status, record = EXCLUDED.record, updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(&record.id)
        .bind(&record.user_id)
        .bind(status_str(record.status))
        .bind(Json(record))
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn append_history(&self, record: &BookingHistoryRecord) -> Result<(), BoxError> {
        let completed_at: DateTime<Utc> = record.completed_at;
        sqlx::query(
            r#"
            INSERT INTO booking_history (id, booking_id, user_id, record, completed_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(&record.id)
        .bind(&record.booking_id)
        .bind(&record.user_id)
        .bind(Json(record))
        .bind(completed_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_history(&self, user_id: &str) -> Result<Vec<BookingHistoryRecord>, BoxError> {
        let rows: Vec<HistoryRow> = sqlx::query_as(
            "SELECT record FROM booking_history WHERE user_id = $1 ORDER BY completed_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|r| r.record.0).collect())
    }
}
