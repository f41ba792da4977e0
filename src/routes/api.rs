use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    response::IntoResponse,
    Json,
};
use futures_util::{Stream, StreamExt};
use serde::Deserialize;
use std::convert::Infallible;
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::{Identity, RequireUser};
use crate::dashboard::{self, Dashboard, RequestView};
use crate::error::{AppError, AppResult};
use crate::listings::{self, Listing, ListingKind, Refresh};
use crate::state::AppState;
use crate::submissions::{self, SubmissionReceipt, SubmissionUpload};

pub async fn me(identity: Identity) -> impl IntoResponse {
    Json(serde_json::json!({
        "user": identity.user(),
        "loading": false
    }))
}

pub async fn list_listings(
    State(state): State<Arc<AppState>>,
    RequireUser(user): RequireUser,
) -> AppResult<Json<Vec<Listing>>> {
    Ok(Json(listings::list_for_owner(&state, user.id).await?))
}

/// Snapshot on connect, then a fresh snapshot after every change to the
/// caller's listings.
pub async fn stream_listings(
    State(state): State<Arc<AppState>>,
    RequireUser(user): RequireUser,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let owner_id = user.id;
    let refreshes = futures_util::stream::once(async { None })
        .chain(state.listing_hub.subscribe(owner_id).map(Some));
    tracing::debug!(
        "Listing stream opened for {} ({} open)",
        owner_id,
        state.listing_hub.subscriber_count()
    );

    let events = refreshes.then(move |refresh| {
        let state = state.clone();
        async move {
            if let Some(Refresh::Resync) = refresh {
                tracing::debug!("Resyncing listings stream for {}", owner_id);
            }
            let event = match listings::list_for_owner(&state, owner_id).await {
                Ok(snapshot) => Event::default()
                    .event("snapshot")
                    .json_data(&snapshot)
                    .unwrap_or_else(|e| Event::default().event("error").data(e.to_string())),
                Err(e) => {
                    tracing::error!("Listing snapshot for {} failed: {}", owner_id, e);
                    Event::default().event("error").data(e.user_message())
                }
            };
            Ok::<_, Infallible>(event)
        }
    });

    Sse::new(events).keep_alive(KeepAlive::default())
}

pub async fn process_listing(
    State(state): State<Arc<AppState>>,
    RequireUser(user): RequireUser,
    Path(listing_id): Path<Uuid>,
) -> AppResult<Json<Listing>> {
    Ok(Json(listings::advance(&state, user.id, listing_id).await?))
}

#[derive(Deserialize)]
pub struct DeleteQuery {
    #[serde(default)]
    confirm: bool,
}

pub async fn delete_listing(
    State(state): State<Arc<AppState>>,
    RequireUser(user): RequireUser,
    Path(listing_id): Path<Uuid>,
    Query(query): Query<DeleteQuery>,
) -> AppResult<StatusCode> {
    if !query.confirm {
        return Err(AppError::InvalidInput(
            "Deleting a listing cannot be undone; repeat with ?confirm=true".to_string(),
        ));
    }
    listings::delete(&state, user.id, listing_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn dashboard(
    State(state): State<Arc<AppState>>,
    RequireUser(user): RequireUser,
) -> AppResult<Json<Dashboard>> {
    Ok(Json(dashboard::load(&state, &user).await?))
}

pub async fn list_requests(
    State(state): State<Arc<AppState>>,
    RequireUser(user): RequireUser,
) -> AppResult<Json<Vec<RequestView>>> {
    if !user.is_ngo() {
        return Err(AppError::Forbidden(
            "Only NGO accounts have donation requests.".to_string(),
        ));
    }
    Ok(Json(dashboard::list_requests(state.pool.as_ref(), user.id).await?))
}

#[derive(Deserialize)]
pub struct NewRequest {
    comment: String,
}

pub async fn create_request(
    State(state): State<Arc<AppState>>,
    RequireUser(user): RequireUser,
    Json(body): Json<NewRequest>,
) -> AppResult<(StatusCode, Json<RequestView>)> {
    let request = dashboard::create_request(state.pool.as_ref(), &user, &body.comment).await?;
    Ok((StatusCode::CREATED, Json(request)))
}

async fn submit(
    state: &AppState,
    identity: Identity,
    kind: ListingKind,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<SubmissionReceipt>)> {
    let Identity::Authenticated(user) = identity else {
        return Err(AppError::Unauthorized("Please sign in".to_string()));
    };
    let upload = SubmissionUpload::from_multipart(multipart).await?;
    let receipt = submissions::submit(state, &user, kind, upload).await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

pub async fn submit_sell(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<SubmissionReceipt>)> {
    submit(&state, identity, ListingKind::Sell, multipart).await
}

pub async fn submit_donate(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<SubmissionReceipt>)> {
    submit(&state, identity, ListingKind::Donate, multipart).await
}
