mod busy;
mod grading;
mod hub;

pub use busy::{BusyGuard, BusyListings};
pub use grading::{Assessment, GradingStrategy, RandomGrader};
pub use hub::{ListingChange, ListingHub, Refresh};

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::db::ListingRow;
use crate::error::{AppError, AppResult};
use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ListingKind {
    Sell,
    Donate,
}

impl ListingKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListingKind::Sell => "sell",
            ListingKind::Donate => "donate",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "sell" => Some(ListingKind::Sell),
            "donate" => Some(ListingKind::Donate),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum ListingStatus {
    Processing,
    Graded,
    Completed,
    Cancelled,
}

impl ListingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListingStatus::Processing => "Processing",
            ListingStatus::Graded => "Graded",
            ListingStatus::Completed => "Completed",
            ListingStatus::Cancelled => "Cancelled",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "Processing" => Some(ListingStatus::Processing),
            "Graded" => Some(ListingStatus::Graded),
            "Completed" => Some(ListingStatus::Completed),
            "Cancelled" => Some(ListingStatus::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ListingStatus::Completed | ListingStatus::Cancelled)
    }

    /// Label of the button that advances the listing, if it can advance.
    pub fn action_label(&self) -> Option<&'static str> {
        match self {
            ListingStatus::Processing => Some("Process"),
            ListingStatus::Graded => Some("Complete"),
            ListingStatus::Completed | ListingStatus::Cancelled => None,
        }
    }
}

impl std::fmt::Display for ListingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Grade {
    A,
    B,
    C,
}

impl Grade {
    pub const ALL: [Grade; 3] = [Grade::A, Grade::B, Grade::C];

    pub fn as_str(&self) -> &'static str {
        match self {
            Grade::A => "A",
            Grade::B => "B",
            Grade::C => "C",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "A" => Some(Grade::A),
            "B" => Some(Grade::B),
            "C" => Some(Grade::C),
            _ => None,
        }
    }

    /// Offer range for sell listings, upper bound exclusive.
    pub fn price_range(&self) -> std::ops::Range<i32> {
        match self {
            Grade::A => 1200..2000,
            Grade::B => 600..1000,
            Grade::C => 150..500,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Listing {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub kind: ListingKind,
    pub file_name: Option<String>,
    pub file_url: Option<String>,
    pub pickup_location: Option<String>,
    pub status: ListingStatus,
    pub grade: Option<Grade>,
    pub price_offered: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub graded_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl TryFrom<ListingRow> for Listing {
    type Error = AppError;

    fn try_from(row: ListingRow) -> Result<Self, Self::Error> {
        let kind = ListingKind::parse(&row.kind)
            .ok_or_else(|| AppError::Internal(format!("listing {} has kind {:?}", row.id, row.kind)))?;
        let status = ListingStatus::parse(&row.status).ok_or_else(|| {
            AppError::Internal(format!("listing {} has status {:?}", row.id, row.status))
        })?;
        let grade = match row.grade.as_deref() {
            Some(raw) => Some(Grade::parse(raw).ok_or_else(|| {
                AppError::Internal(format!("listing {} has grade {:?}", row.id, raw))
            })?),
            None => None,
        };
        Ok(Listing {
            id: row.id,
            owner_id: row.owner_id,
            kind,
            file_name: row.file_name,
            file_url: row.file_url,
            pickup_location: row.pickup_location,
            status,
            grade,
            price_offered: if kind == ListingKind::Sell { row.price_offered } else { None },
            created_at: row.created_at,
            graded_at: row.graded_at,
            completed_at: row.completed_at,
        })
    }
}

impl Listing {
    pub fn title(&self) -> &'static str {
        match self.kind {
            ListingKind::Sell => "Sale Listing",
            ListingKind::Donate => "Donation",
        }
    }

    pub fn price_display(&self) -> String {
        match (self.kind, self.price_offered) {
            (ListingKind::Donate, _) => "Free".to_string(),
            (ListingKind::Sell, Some(price)) => format!("₹{}", price),
            (ListingKind::Sell, None) => "—".to_string(),
        }
    }

    pub fn apply(&mut self, transition: &Transition) {
        match *transition {
            Transition::Graded { grade, price, at } => {
                self.status = ListingStatus::Graded;
                self.grade = Some(grade);
                self.price_offered = price;
                self.graded_at = Some(at);
            }
            Transition::Completed { at } => {
                self.status = ListingStatus::Completed;
                self.completed_at = Some(at);
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Transition {
    Graded {
        grade: Grade,
        price: Option<i32>,
        at: DateTime<Utc>,
    },
    Completed {
        at: DateTime<Utc>,
    },
}

impl Transition {
    pub fn target(&self) -> ListingStatus {
        match self {
            Transition::Graded { .. } => ListingStatus::Graded,
            Transition::Completed { .. } => ListingStatus::Completed,
        }
    }
}

#[derive(Error, Debug, PartialEq)]
pub enum LifecycleError {
    #[error("Listing is already {0}")]
    Terminal(ListingStatus),
}

impl From<LifecycleError> for AppError {
    fn from(err: LifecycleError) -> Self {
        AppError::Conflict(err.to_string())
    }
}

/// The step "simulate processing" takes from the listing's current status.
pub fn next_transition(
    listing: &Listing,
    grader: &dyn GradingStrategy,
    now: DateTime<Utc>,
) -> Result<Transition, LifecycleError> {
    match listing.status {
        ListingStatus::Processing => {
            let assessment = grader.assess(listing.kind);
            let price = match listing.kind {
                ListingKind::Sell => assessment.price,
                ListingKind::Donate => None,
            };
            Ok(Transition::Graded {
                grade: assessment.grade,
                price,
                at: now,
            })
        }
        ListingStatus::Graded => Ok(Transition::Completed { at: now }),
        status @ (ListingStatus::Completed | ListingStatus::Cancelled) => {
            Err(LifecycleError::Terminal(status))
        }
    }
}

pub async fn list_for_owner(state: &AppState, owner_id: Uuid) -> AppResult<Vec<Listing>> {
    crate::db::list_listings(state.pool.as_ref(), owner_id)
        .await?
        .into_iter()
        .map(Listing::try_from)
        .collect()
}

pub async fn get_owned(state: &AppState, owner_id: Uuid, listing_id: Uuid) -> AppResult<Listing> {
    crate::db::get_listing(state.pool.as_ref(), owner_id, listing_id)
        .await?
        .ok_or_else(|| AppError::NotFound("listing".to_string()))
        .and_then(Listing::try_from)
}

/// Moves one owned listing a single step forward and notifies subscribers.
pub async fn advance(state: &AppState, owner_id: Uuid, listing_id: Uuid) -> AppResult<Listing> {
    let _guard = state
        .busy
        .try_acquire(listing_id)
        .ok_or_else(|| AppError::Conflict("Listing is busy, try again in a moment".to_string()))?;

    let listing = get_owned(state, owner_id, listing_id).await?;

    let transition = next_transition(&listing, state.grader.as_ref(), Utc::now())?;

    let updated = crate::db::apply_transition(
        state.pool.as_ref(),
        owner_id,
        listing_id,
        listing.status,
        &transition,
    )
    .await?
    .ok_or_else(|| AppError::Conflict("Listing changed, reload and try again".to_string()))?;
    let updated = Listing::try_from(updated)?;

    tracing::info!(
        "Listing {} moved {} -> {} (grade={:?}, price={:?})",
        listing_id,
        listing.status,
        updated.status,
        updated.grade,
        updated.price_offered
    );

    state.listing_hub.publish(ListingChange {
        owner_id,
        listing_id,
    });
    Ok(updated)
}

/// Erases the listing document only; its submission record and blob stay.
pub async fn delete(state: &AppState, owner_id: Uuid, listing_id: Uuid) -> AppResult<()> {
    let _guard = state
        .busy
        .try_acquire(listing_id)
        .ok_or_else(|| AppError::Conflict("Listing is busy, try again in a moment".to_string()))?;

    let deleted = crate::db::delete_listing(state.pool.as_ref(), owner_id, listing_id).await?;
    if !deleted {
        return Err(AppError::NotFound("listing".to_string()));
    }

    tracing::info!("Listing {} deleted by {}", listing_id, owner_id);
    state.listing_hub.publish(ListingChange {
        owner_id,
        listing_id,
    });
    Ok(())
}
