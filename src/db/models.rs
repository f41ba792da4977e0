use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub name: Option<String>,
    pub role: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Profile columns only; what the identity resolver reads on every request.
#[derive(Debug, Clone, FromRow)]
pub struct ProfileRow {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub role: Option<String>,
}

#[derive(Debug, Clone, FromRow)]
pub struct ListingRow {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub kind: String,
    pub file_name: Option<String>,
    pub file_url: Option<String>,
    pub pickup_location: Option<String>,
    pub status: String,
    pub grade: Option<String>,
    pub price_offered: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub graded_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct DonateSubmission {
    pub id: Uuid,
    pub user_id: Uuid,
    pub pickup_location: String,
    pub notes: Option<String>,
    pub image_url: String,
    pub extracted_text: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DonationRequest {
    pub id: Uuid,
    pub ngo_id: Uuid,
    pub ngo_name: String,
    pub comment: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

/// Written by the settlement side, read-only here.
#[derive(Debug, Clone, FromRow)]
pub struct TransactionRow {
    pub id: Uuid,
    pub seller_id: Uuid,
    pub tx_type: Option<String>,
    pub item_name: Option<String>,
    pub status: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}
