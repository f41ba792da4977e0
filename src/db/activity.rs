use sqlx::PgPool;
use uuid::Uuid;

use super::{DonationRequest, TransactionRow};
use crate::dashboard::DashboardStats;

async fn count(pool: &PgPool, sql: &str, user_id: Uuid) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(sql)
        .bind(user_id)
        .fetch_one(pool)
        .await
}

pub async fn member_counts(pool: &PgPool, user_id: Uuid) -> Result<DashboardStats, sqlx::Error> {
    let (listed, sold, donated, pending) = tokio::try_join!(
        count(pool, "SELECT COUNT(*) FROM listings WHERE owner_id = $1", user_id),
        count(
            pool,
            "SELECT COUNT(*) FROM transactions WHERE seller_id = $1 AND status = 'completed'",
            user_id
        ),
        count(pool, "SELECT COUNT(*) FROM donate_submissions WHERE user_id = $1", user_id),
        count(
            pool,
            "SELECT COUNT(*) FROM transactions WHERE seller_id = $1 AND status = 'pending'",
            user_id
        ),
    )?;

    Ok(DashboardStats {
        listed,
        sold,
        donated,
        pending,
    })
}

pub async fn recent_transactions(
    pool: &PgPool,
    seller_id: Uuid,
    limit: i64,
) -> Result<Vec<TransactionRow>, sqlx::Error> {
    sqlx::query_as::<_, TransactionRow>(
        r#"
        SELECT * FROM transactions
        WHERE seller_id = $1
        ORDER BY created_at DESC NULLS LAST
        LIMIT $2
        "#,
    )
    .bind(seller_id)
    .bind(limit)
    .fetch_all(pool)
    .await
}

pub async fn list_donation_requests(
    pool: &PgPool,
    ngo_id: Uuid,
) -> Result<Vec<DonationRequest>, sqlx::Error> {
    sqlx::query_as::<_, DonationRequest>(
        "SELECT * FROM donation_requests WHERE ngo_id = $1 ORDER BY created_at DESC",
    )
    .bind(ngo_id)
    .fetch_all(pool)
    .await
}

pub async fn insert_donation_request(
    pool: &PgPool,
    ngo_id: Uuid,
    ngo_name: &str,
    comment: &str,
) -> Result<DonationRequest, sqlx::Error> {
    sqlx::query_as::<_, DonationRequest>(
        r#"
        INSERT INTO donation_requests (id, ngo_id, ngo_name, comment, status)
        VALUES ($1, $2, $3, $4, 'pending')
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(ngo_id)
    .bind(ngo_name)
    .bind(comment)
    .fetch_one(pool)
    .await
}
