use sqlx::PgPool;
use uuid::Uuid;

use super::ListingRow;
use crate::listings::{ListingStatus, Transition};

pub async fn list_listings(pool: &PgPool, owner_id: Uuid) -> Result<Vec<ListingRow>, sqlx::Error> {
    sqlx::query_as::<_, ListingRow>(
        "SELECT * FROM listings WHERE owner_id = $1 ORDER BY created_at DESC, id DESC",
    )
    .bind(owner_id)
    .fetch_all(pool)
    .await
}

pub async fn get_listing(
    pool: &PgPool,
    owner_id: Uuid,
    listing_id: Uuid,
) -> Result<Option<ListingRow>, sqlx::Error> {
    sqlx::query_as::<_, ListingRow>("SELECT * FROM listings WHERE id = $1 AND owner_id = $2")
        .bind(listing_id)
        .bind(owner_id)
        .fetch_optional(pool)
        .await
}

/// Only applies while the listing is still in `from`; `None` means it moved
/// underneath us.
pub async fn apply_transition(
    pool: &PgPool,
    owner_id: Uuid,
    listing_id: Uuid,
    from: ListingStatus,
    transition: &Transition,
) -> Result<Option<ListingRow>, sqlx::Error> {
    match *transition {
        Transition::Graded { grade, price, at } => {
            sqlx::query_as::<_, ListingRow>(
                r#"
                UPDATE listings
                SET status = $4, grade = $5, price_offered = $6, graded_at = $7
                WHERE id = $1 AND owner_id = $2 AND status = $3
                RETURNING *
                "#,
            )
            .bind(listing_id)
            .bind(owner_id)
            .bind(from.as_str())
            .bind(transition.target().as_str())
            .bind(grade.as_str())
            .bind(price)
            .bind(at)
            .fetch_optional(pool)
            .await
        }
        Transition::Completed { at } => {
            sqlx::query_as::<_, ListingRow>(
                r#"
                UPDATE listings
                SET status = $4, completed_at = $5
                WHERE id = $1 AND owner_id = $2 AND status = $3
                RETURNING *
                "#,
            )
            .bind(listing_id)
            .bind(owner_id)
            .bind(from.as_str())
            .bind(transition.target().as_str())
            .bind(at)
            .fetch_optional(pool)
            .await
        }
    }
}

pub async fn delete_listing(pool: &PgPool, owner_id: Uuid, listing_id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM listings WHERE id = $1 AND owner_id = $2")
        .bind(listing_id)
        .bind(owner_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
