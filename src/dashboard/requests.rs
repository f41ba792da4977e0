use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::UserData;
use crate::db::DonationRequest;
use crate::error::{AppError, AppResult};

/// How long the "request posted" banner stays up.
pub const BANNER_TTL_SECS: u64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Accepted,
    Rejected,
}

impl RequestStatus {
    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "pending" => Some(RequestStatus::Pending),
            "accepted" => Some(RequestStatus::Accepted),
            "rejected" => Some(RequestStatus::Rejected),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RequestView {
    pub id: Uuid,
    pub ngo_name: String,
    pub comment: String,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
}

impl From<DonationRequest> for RequestView {
    fn from(r: DonationRequest) -> Self {
        let status = RequestStatus::parse(&r.status).unwrap_or_else(|| {
            tracing::warn!("Donation request {} has unknown status {:?}", r.id, r.status);
            RequestStatus::Pending
        });
        RequestView {
            id: r.id,
            ngo_name: r.ngo_name,
            comment: r.comment,
            status,
            created_at: r.created_at,
        }
    }
}

pub fn validate_comment(raw: &str) -> AppResult<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(AppError::InvalidInput("Describe what you need".to_string()));
    }
    Ok(trimmed.to_string())
}

pub async fn list_requests(pool: &PgPool, ngo_id: Uuid) -> AppResult<Vec<RequestView>> {
    Ok(crate::db::list_donation_requests(pool, ngo_id)
        .await?
        .into_iter()
        .map(RequestView::from)
        .collect())
}

/// New pending request authored by the signed-in NGO.
pub async fn create_request(pool: &PgPool, user: &UserData, comment: &str) -> AppResult<RequestView> {
    if !user.is_ngo() {
        return Err(AppError::Forbidden(
            "Only NGO accounts can raise donation requests.".to_string(),
        ));
    }
    let comment = validate_comment(comment)?;
    let ngo_name = user.name.clone().unwrap_or_else(|| "NGO".to_string());

    let request = crate::db::insert_donation_request(pool, user.id, &ngo_name, &comment).await?;
    tracing::info!("NGO {} raised donation request {}", user.id, request.id);
    Ok(request.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use sqlx::postgres::PgPoolOptions;

    #[test]
    fn comment_must_have_content() {
        assert!(validate_comment("   \n ").is_err());
        assert_eq!(validate_comment("  20 laptops for a school ").unwrap(), "20 laptops for a school");
    }

    #[test]
    fn unknown_status_reads_as_pending() {
        let view = RequestView::from(DonationRequest {
            id: Uuid::nil(),
            ngo_id: Uuid::nil(),
            ngo_name: "NGO".to_string(),
            comment: "chairs".to_string(),
            status: "archived".to_string(),
            created_at: Utc::now(),
        });
        assert_eq!(view.status, RequestStatus::Pending);
    }

    #[tokio::test]
    async fn members_cannot_raise_requests() {
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://nobody@127.0.0.1:1/none")
            .unwrap();
        let member = UserData {
            id: Uuid::new_v4(),
            email: "m@example.com".to_string(),
            name: None,
            role: Some(Role::Organization),
        };
        let err = create_request(&pool, &member, "need things").await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }
}
