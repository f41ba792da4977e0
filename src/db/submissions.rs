use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use super::DonateSubmission;
use crate::listings::{ListingKind, ListingStatus};
use crate::submissions::PreparedSubmission;

/// Writes the submission record and its Processing listing together.
/// Returns `(submission_id, listing_id)`.
pub async fn insert_submission(
    pool: &PgPool,
    prepared: &PreparedSubmission,
) -> Result<(Uuid, Uuid), sqlx::Error> {
    let submission_id = Uuid::new_v4();
    let listing_id = Uuid::new_v4();
    let mut tx = pool.begin().await?;

    match prepared.kind {
        ListingKind::Sell => {
            sqlx::query(
                r#"
                INSERT INTO sell_submissions (id, user_id, pickup_location, image_url, extracted_text, parsed_items)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(submission_id)
            .bind(prepared.user_id)
            .bind(&prepared.pickup_location)
            .bind(&prepared.image_url)
            .bind(&prepared.extracted_text)
            .bind(Json(prepared.parsed_items.clone().unwrap_or_default()))
            .execute(&mut *tx)
            .await?;
        }
        ListingKind::Donate => {
            sqlx::query(
                r#"
                INSERT INTO donate_submissions (id, user_id, pickup_location, notes, image_url, extracted_text, status)
                VALUES ($1, $2, $3, $4, $5, $6, 'pending')
                "#,
            )
            .bind(submission_id)
            .bind(prepared.user_id)
            .bind(&prepared.pickup_location)
            .bind(&prepared.notes)
            .bind(&prepared.image_url)
            .bind(&prepared.extracted_text)
            .execute(&mut *tx)
            .await?;
        }
    }

    sqlx::query(
        r#"
        INSERT INTO listings (id, owner_id, kind, file_name, file_url, pickup_location, status)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(listing_id)
    .bind(prepared.user_id)
    .bind(prepared.kind.as_str())
    .bind(&prepared.file_name)
    .bind(&prepared.image_url)
    .bind(&prepared.pickup_location)
    .bind(ListingStatus::Processing.as_str())
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok((submission_id, listing_id))
}

pub async fn list_donate_submissions(
    pool: &PgPool,
    user_id: Uuid,
) -> Result<Vec<DonateSubmission>, sqlx::Error> {
    sqlx::query_as::<_, DonateSubmission>(
        "SELECT * FROM donate_submissions WHERE user_id = $1 ORDER BY created_at DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
}
