use axum::{
    extract::{Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    Form,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tera::Context;
use uuid::Uuid;

use crate::auth::{
    self, clear_session_cookie, session_cookie, AuthError, Identity, Role, SignInForm, SignUpForm,
    UserData,
};
use crate::dashboard::{self, Dashboard, BANNER_TTL_SECS};
use crate::error::AppError;
use crate::listings::{self, Listing, ListingKind};
use crate::state::AppState;
use crate::submissions::{self, SubmissionUpload};
use crate::templates::{base_context, render};

fn page(name: &str, ctx: &Context) -> Html<String> {
    Html(render(name, ctx))
}

fn notice(identity: &Identity, status: StatusCode, message: &str) -> Response {
    let mut ctx = base_context(identity);
    ctx.insert("message", message);
    (status, page("notice.html", &ctx)).into_response()
}

fn sign_in_required(identity: &Identity, action: &str) -> Response {
    notice(
        identity,
        StatusCode::UNAUTHORIZED,
        &format!("Please sign in to {}.", action),
    )
}

fn format_time(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M UTC").to_string()
}

pub async fn health() -> &'static str {
    "ok"
}

pub async fn root(identity: Identity) -> Redirect {
    match identity {
        Identity::Authenticated(_) => Redirect::to("/dashboard"),
        Identity::Anonymous => Redirect::to("/landing"),
    }
}

pub async fn landing(identity: Identity) -> Html<String> {
    page("landing.html", &base_context(&identity))
}

// --- sign up / sign in ---------------------------------------------------

#[derive(Serialize)]
struct RoleOption {
    value: &'static str,
    label: &'static str,
}

fn role_options() -> Vec<RoleOption> {
    [Role::Individual, Role::Organization, Role::Ngo]
        .iter()
        .map(|r| RoleOption {
            value: r.label(),
            label: r.label(),
        })
        .collect()
}

fn signup_form(identity: &Identity, name: &str, email: &str, role: &str, error: Option<&str>) -> Html<String> {
    let mut ctx = base_context(identity);
    ctx.insert("roles", &role_options());
    ctx.insert("name", name);
    ctx.insert("email", email);
    ctx.insert("role", role);
    ctx.insert("error", &error);
    page("signup.html", &ctx)
}

pub async fn signup_page(identity: Identity) -> Html<String> {
    signup_form(&identity, "", "", Role::Individual.label(), None)
}

fn start_session(state: &AppState, user_id: Uuid, email: &str, to: &str) -> Result<Response, AuthError> {
    let token = auth::issue_token(
        &state.config.jwt_secret,
        user_id,
        email,
        state.config.session_ttl_hours,
    )?;
    let cookie = session_cookie(&token, state.config.session_ttl_hours);
    Ok(([(header::SET_COOKIE, cookie)], Redirect::to(to)).into_response())
}

async fn sign_up(state: &AppState, form: SignUpForm) -> Result<Response, AppError> {
    let valid = form.validate()?;
    let hash = auth::hash_password(valid.password).await?;
    let user = crate::db::create_user(
        state.pool.as_ref(),
        &valid.email,
        &hash,
        &valid.name,
        valid.role.label(),
    )
    .await?
    .ok_or(AuthError::EmailTaken)?;

    tracing::info!("New {} account {}", valid.role.as_str(), user.id);
    Ok(start_session(state, user.id, &user.email, "/dashboard")?)
}

pub async fn signup_submit(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Form(form): Form<SignUpForm>,
) -> Response {
    let (name, email, role) = (form.name.clone(), form.email.clone(), form.role.clone());
    match sign_up(&state, form).await {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!("Sign-up failed for {}: {}", email, e);
            let status = e.status();
            (
                status,
                signup_form(&identity, &name, &email, &role, Some(e.user_message().as_str())),
            )
                .into_response()
        }
    }
}

fn login_form(identity: &Identity, email: &str, error: Option<&str>) -> Html<String> {
    let mut ctx = base_context(identity);
    ctx.insert("email", email);
    ctx.insert("error", &error);
    page("login.html", &ctx)
}

pub async fn login_page(identity: Identity) -> Html<String> {
    login_form(&identity, "", None)
}

async fn sign_in(state: &AppState, form: SignInForm) -> Result<Response, AppError> {
    let email = form.email.trim().to_lowercase();
    let user = crate::db::find_user_by_email(state.pool.as_ref(), &email)
        .await?
        .ok_or(AuthError::InvalidCredentials)?;
    auth::verify_password(form.password, user.password_hash.clone()).await?;

    tracing::info!("User {} signed in", user.id);
    Ok(start_session(state, user.id, &user.email, "/dashboard")?)
}

pub async fn login_submit(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Form(form): Form<SignInForm>,
) -> Response {
    let email = form.email.clone();
    match sign_in(&state, form).await {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!("Sign-in failed for {}: {}", email, e);
            (e.status(), login_form(&identity, &email, Some(e.user_message().as_str()))).into_response()
        }
    }
}

pub async fn logout() -> Response {
    (
        [(header::SET_COOKIE, clear_session_cookie())],
        Redirect::to("/landing"),
    )
        .into_response()
}

// --- dashboard -------------------------------------------------------------

#[derive(Deserialize)]
pub struct DashboardQuery {
    #[serde(default)]
    posted: bool,
}

async fn render_dashboard(
    state: &AppState,
    identity: &Identity,
    user: &UserData,
    status: StatusCode,
    posted: bool,
    error: Option<String>,
    comment: &str,
) -> Response {
    let mut ctx = base_context(identity);
    let mut error = error;
    let view = match dashboard::load(state, user).await {
        Ok(view) => Some(view),
        Err(e) => {
            tracing::error!("Dashboard fetch failed for {}: {}", user.id, e);
            error.get_or_insert_with(|| {
                "Failed to load dashboard data. Please check your connection and try again."
                    .to_string()
            });
            None
        }
    };

    ctx.insert("is_ngo", &user.is_ngo());
    ctx.insert("user_name", user.display_name());
    ctx.insert("stats", &Option::<()>::None);
    ctx.insert("requests", &Vec::<()>::new());
    ctx.insert("recent", &Vec::<()>::new());
    ctx.insert("donated", &view.as_ref().and_then(Dashboard::donated));
    match &view {
        Some(Dashboard::Ngo { requests }) => ctx.insert("requests", requests),
        Some(Dashboard::Member { stats, recent }) => {
            ctx.insert("stats", stats);
            ctx.insert("recent", recent);
        }
        None => {}
    }
    ctx.insert("posted", &posted);
    ctx.insert("banner_ttl_secs", &BANNER_TTL_SECS);
    ctx.insert("error", &error);
    ctx.insert("comment", comment);
    (status, page("dashboard.html", &ctx)).into_response()
}

pub async fn dashboard_page(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Query(query): Query<DashboardQuery>,
) -> Response {
    let Some(user) = identity.user().cloned() else {
        return sign_in_required(&identity, "view your dashboard");
    };
    render_dashboard(&state, &identity, &user, StatusCode::OK, query.posted, None, "").await
}

#[derive(Deserialize)]
pub struct RequestForm {
    comment: String,
}

pub async fn raise_request(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Form(form): Form<RequestForm>,
) -> Response {
    let Some(user) = identity.user().cloned() else {
        return sign_in_required(&identity, "raise a request");
    };
    match dashboard::create_request(state.pool.as_ref(), &user, &form.comment).await {
        Ok(_) => Redirect::to("/dashboard?posted=true").into_response(),
        Err(e) => {
            tracing::error!("Failed to submit NGO request for {}: {}", user.id, e);
            let message = match &e {
                AppError::InvalidInput(_) | AppError::Forbidden(_) => e.user_message(),
                _ => "Failed to submit request. Please try again.".to_string(),
            };
            render_dashboard(&state, &identity, &user, e.status(), false, Some(message), &form.comment)
                .await
        }
    }
}

// --- sell / donate ---------------------------------------------------------

fn submit_form(
    identity: &Identity,
    kind: ListingKind,
    pickup_location: &str,
    notes: &str,
    error: Option<&str>,
) -> Html<String> {
    let mut ctx = base_context(identity);
    ctx.insert("kind", kind.as_str());
    ctx.insert("pickup_location", pickup_location);
    ctx.insert("notes", notes);
    ctx.insert("error", &error);
    page("submit.html", &ctx)
}

fn gate(identity: &Identity, kind: ListingKind) -> Result<UserData, Response> {
    let Some(user) = identity.user() else {
        let action = match kind {
            ListingKind::Sell => "sell items",
            ListingKind::Donate => "donate items",
        };
        return Err(sign_in_required(identity, action));
    };
    submissions::check_allowed(user, kind)
        .map_err(|e| notice(identity, StatusCode::FORBIDDEN, &e.user_message()))?;
    Ok(user.clone())
}

pub async fn sell_page(identity: Identity) -> Response {
    match gate(&identity, ListingKind::Sell) {
        Ok(_) => submit_form(&identity, ListingKind::Sell, "", "", None).into_response(),
        Err(response) => response,
    }
}

pub async fn donate_page(identity: Identity) -> Response {
    match gate(&identity, ListingKind::Donate) {
        Ok(_) => submit_form(&identity, ListingKind::Donate, "", "", None).into_response(),
        Err(response) => response,
    }
}

async fn handle_submission(
    state: &AppState,
    identity: &Identity,
    kind: ListingKind,
    multipart: Multipart,
) -> Response {
    let user = match gate(identity, kind) {
        Ok(user) => user,
        Err(response) => return response,
    };

    let upload = match SubmissionUpload::from_multipart(multipart).await {
        Ok(upload) => upload,
        Err(e) => {
            return (
                e.status(),
                submit_form(identity, kind, "", "", Some(e.user_message().as_str())),
            )
                .into_response()
        }
    };
    let pickup_location = upload.pickup_location.clone();
    let notes = upload.notes.clone().unwrap_or_default();

    match submissions::submit(state, &user, kind, upload).await {
        Ok(receipt) => {
            let mut ctx = base_context(identity);
            ctx.insert("kind", kind.as_str());
            ctx.insert("receipt", &receipt);
            page("submitted.html", &ctx).into_response()
        }
        Err(e) => {
            tracing::error!("Error processing {} submission for {}: {}", kind.as_str(), user.id, e);
            let message = e.user_message();
            let status = AppError::from(e).status();
            (
                status,
                submit_form(identity, kind, &pickup_location, &notes, Some(message.as_str())),
            )
                .into_response()
        }
    }
}

pub async fn sell_submit(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    multipart: Multipart,
) -> Response {
    handle_submission(&state, &identity, ListingKind::Sell, multipart).await
}

pub async fn donate_submit(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    multipart: Multipart,
) -> Response {
    handle_submission(&state, &identity, ListingKind::Donate, multipart).await
}

// --- my listings -----------------------------------------------------------

#[derive(Serialize)]
struct ListingCard {
    id: Uuid,
    kind: &'static str,
    title: &'static str,
    file_name: String,
    file_url: Option<String>,
    pickup_location: String,
    submitted: String,
    status: &'static str,
    grade: Option<&'static str>,
    price: String,
    action_label: Option<&'static str>,
    busy: bool,
}

impl ListingCard {
    fn new(listing: &Listing, busy: bool) -> Self {
        Self {
            id: listing.id,
            kind: listing.kind.as_str(),
            title: listing.title(),
            file_name: listing
                .file_name
                .clone()
                .unwrap_or_else(|| "Uploaded file".to_string()),
            file_url: listing.file_url.clone(),
            pickup_location: listing
                .pickup_location
                .clone()
                .filter(|p| !p.is_empty())
                .unwrap_or_else(|| "—".to_string()),
            submitted: format_time(listing.created_at),
            status: listing.status.as_str(),
            grade: listing.grade.map(|g| g.as_str()),
            price: listing.price_display(),
            action_label: listing.status.action_label(),
            busy,
        }
    }
}

async fn render_listings(
    state: &AppState,
    identity: &Identity,
    user: &UserData,
    status: StatusCode,
    error: Option<String>,
) -> Response {
    let mut ctx = base_context(identity);
    let mut error = error;
    let cards: Vec<ListingCard> = match listings::list_for_owner(state, user.id).await {
        Ok(items) => items
            .iter()
            .map(|l| ListingCard::new(l, state.busy.is_busy(l.id)))
            .collect(),
        Err(e) => {
            tracing::error!("Listing fetch failed for {}: {}", user.id, e);
            error.get_or_insert_with(|| "Failed to load your listings. Please try again.".to_string());
            Vec::new()
        }
    };
    ctx.insert("listings", &cards);
    ctx.insert("error", &error);
    (status, page("my_listings.html", &ctx)).into_response()
}

pub async fn my_listings_page(State(state): State<Arc<AppState>>, identity: Identity) -> Response {
    let Some(user) = identity.user().cloned() else {
        return sign_in_required(&identity, "view your listings");
    };
    render_listings(&state, &identity, &user, StatusCode::OK, None).await
}

pub async fn process_listing(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Path(listing_id): Path<Uuid>,
) -> Response {
    let Some(user) = identity.user().cloned() else {
        return sign_in_required(&identity, "manage your listings");
    };
    match listings::advance(&state, user.id, listing_id).await {
        Ok(_) => Redirect::to("/my-listings").into_response(),
        Err(e) => {
            tracing::error!("simulate processing failed for {}: {}", listing_id, e);
            render_listings(&state, &identity, &user, e.status(), Some(e.user_message())).await
        }
    }
}

pub async fn confirm_delete_page(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Path(listing_id): Path<Uuid>,
) -> Response {
    let Some(user) = identity.user().cloned() else {
        return sign_in_required(&identity, "manage your listings");
    };
    match listings::get_owned(&state, user.id, listing_id).await {
        Ok(listing) => {
            let mut ctx = base_context(&identity);
            ctx.insert("listing", &ListingCard::new(&listing, false));
            page("confirm_delete.html", &ctx).into_response()
        }
        Err(e) => notice(&identity, e.status(), &e.user_message()),
    }
}

#[derive(Deserialize)]
pub struct DeleteForm {
    #[serde(default)]
    confirm: String,
}

pub async fn delete_listing_submit(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Path(listing_id): Path<Uuid>,
    Form(form): Form<DeleteForm>,
) -> Response {
    let Some(user) = identity.user().cloned() else {
        return sign_in_required(&identity, "manage your listings");
    };
    if form.confirm != "yes" {
        return Redirect::to(&format!("/my-listings/{}/delete", listing_id)).into_response();
    }
    match listings::delete(&state, user.id, listing_id).await {
        Ok(()) => Redirect::to("/my-listings").into_response(),
        Err(e) => {
            tracing::error!("delete listing {} failed: {}", listing_id, e);
            render_listings(&state, &identity, &user, e.status(), Some(e.user_message())).await
        }
    }
}

// --- transactions ----------------------------------------------------------

#[derive(Serialize)]
struct TransactionCard {
    id: Uuid,
    pickup_location: String,
    notes: String,
    image_url: String,
    extracted_text: String,
    completed: bool,
    date: String,
}

pub async fn transactions_page(State(state): State<Arc<AppState>>, identity: Identity) -> Response {
    let Some(user) = identity.user().cloned() else {
        return sign_in_required(&identity, "view your transactions");
    };
    let mut ctx = base_context(&identity);
    match crate::db::list_donate_submissions(state.pool.as_ref(), user.id).await {
        Ok(rows) => {
            let cards: Vec<TransactionCard> = rows
                .into_iter()
                .map(|s| TransactionCard {
                    id: s.id,
                    pickup_location: if s.pickup_location.is_empty() {
                        "No Location Specified".to_string()
                    } else {
                        s.pickup_location
                    },
                    notes: s.notes.unwrap_or_default(),
                    image_url: s.image_url,
                    extracted_text: s.extracted_text,
                    completed: s.status == "done",
                    date: s.created_at.format("%Y-%m-%d").to_string(),
                })
                .collect();
            ctx.insert("transactions", &cards);
            ctx.insert("error", &Option::<String>::None);
        }
        Err(e) => {
            tracing::error!("Error fetching transactions for {}: {}", user.id, e);
            ctx.insert("transactions", &Vec::<TransactionCard>::new());
            ctx.insert("error", &Some("Failed to load transactions. Please try again."));
        }
    }
    page("transactions.html", &ctx).into_response()
}
