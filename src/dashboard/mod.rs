mod requests;

pub use requests::{
    create_request, list_requests, validate_comment, RequestStatus, RequestView, BANNER_TTL_SECS,
};

use serde::Serialize;
use uuid::Uuid;

use crate::auth::{Audience, UserData};
use crate::db::TransactionRow;
use crate::error::AppResult;
use crate::state::AppState;

pub const RECENT_ACTIVITY_LIMIT: i64 = 5;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DashboardStats {
    pub listed: i64,
    pub sold: i64,
    pub donated: i64,
    pub pending: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ActivityType {
    Sale,
    Donation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityStatus {
    Pending,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivityRow {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub activity_type: ActivityType,
    pub item_name: String,
    pub date: String,
    pub status: ActivityStatus,
}

impl From<TransactionRow> for ActivityRow {
    fn from(tx: TransactionRow) -> Self {
        let activity_type = match tx.tx_type.as_deref() {
            Some("Donation") => ActivityType::Donation,
            _ => ActivityType::Sale,
        };
        let status = match tx.status.as_deref() {
            Some("completed") => ActivityStatus::Completed,
            _ => ActivityStatus::Pending,
        };
        ActivityRow {
            id: tx.id,
            activity_type,
            item_name: tx
                .item_name
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| "Item".to_string()),
            date: tx
                .created_at
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_default(),
            status,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "view", rename_all = "lowercase")]
pub enum Dashboard {
    Ngo {
        requests: Vec<RequestView>,
    },
    Member {
        stats: DashboardStats,
        recent: Vec<ActivityRow>,
    },
}

impl Dashboard {
    /// Donated counter is present exactly when this is a member dashboard.
    pub fn donated(&self) -> Option<i64> {
        match self {
            Dashboard::Ngo { .. } => None,
            Dashboard::Member { stats, .. } => Some(stats.donated),
        }
    }
}

/// Reads are independent; counts may come from slightly different instants.
pub async fn load(state: &AppState, user: &UserData) -> AppResult<Dashboard> {
    let pool = state.pool.as_ref();
    match user.audience() {
        Audience::Ngo => Ok(Dashboard::Ngo {
            requests: list_requests(pool, user.id).await?,
        }),
        Audience::Member(_) | Audience::Unassigned => {
            let (stats, recent) = tokio::try_join!(
                crate::db::member_counts(pool, user.id),
                crate::db::recent_transactions(pool, user.id, RECENT_ACTIVITY_LIMIT),
            )?;
            Ok(Dashboard::Member {
                stats,
                recent: recent.into_iter().map(ActivityRow::from).collect(),
            })
        }
    }
}
