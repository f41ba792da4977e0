mod api;
mod pages;

use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    let body_limit = state.config.max_upload_bytes;
    let blob_root = state.config.upload_folder.clone();

    let api = Router::new()
        .route("/me", get(api::me))
        .route("/listings", get(api::list_listings))
        .route("/listings/stream", get(api::stream_listings))
        .route("/listings/:listing_id/process", post(api::process_listing))
        .route("/listings/:listing_id", delete(api::delete_listing))
        .route("/dashboard", get(api::dashboard))
        .route("/requests", get(api::list_requests).post(api::create_request))
        .route("/submissions/sell", post(api::submit_sell))
        .route("/submissions/donate", post(api::submit_donate));

    Router::new()
        .route("/", get(pages::root))
        .route("/health", get(pages::health))
        .route("/landing", get(pages::landing))
        .route("/signup", get(pages::signup_page).post(pages::signup_submit))
        .route("/login", get(pages::login_page).post(pages::login_submit))
        .route("/logout", post(pages::logout))
        .route("/dashboard", get(pages::dashboard_page))
        .route("/requests", post(pages::raise_request))
        .route("/sell", get(pages::sell_page).post(pages::sell_submit))
        .route("/donate", get(pages::donate_page).post(pages::donate_submit))
        .route("/my-listings", get(pages::my_listings_page))
        .route("/my-listings/:listing_id/process", post(pages::process_listing))
        .route(
            "/my-listings/:listing_id/delete",
            get(pages::confirm_delete_page).post(pages::delete_listing_submit),
        )
        .route("/transactions", get(pages::transactions_page))
        .nest("/api", api)
        .nest_service("/blobs", ServeDir::new(blob_root))
        .nest_service("/static", ServeDir::new("static"))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}


#[cfg(test)]
mod tests {
    use super::test_support::offline_state;
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    async fn body_text(response: axum::response::Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8_lossy(&bytes).into_owned()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn health_is_ok() {
        let response = router(offline_state()).oneshot(get("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "ok");
    }

    #[tokio::test]
    async fn root_sends_visitors_to_landing() {
        let response = router(offline_state()).oneshot(get("/")).await.unwrap();
        assert!(response.status().is_redirection());
        assert_eq!(response.headers()[header::LOCATION], "/landing");
    }

    #[tokio::test]
    async fn member_pages_require_sign_in() {
        for (uri, message) in [
            ("/sell", "Please sign in to sell items."),
            ("/donate", "Please sign in to donate items."),
            ("/my-listings", "Please sign in to view your listings."),
            ("/dashboard", "Please sign in to view your dashboard."),
            ("/transactions", "Please sign in to view your transactions."),
        ] {
            let response = router(offline_state()).oneshot(get(uri)).await.unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{}", uri);
            assert!(body_text(response).await.contains(message), "{}", uri);
        }
    }

    #[tokio::test]
    async fn api_rejects_anonymous_callers() {
        for uri in ["/api/listings", "/api/dashboard", "/api/requests"] {
            let response = router(offline_state()).oneshot(get(uri)).await.unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{}", uri);
        }
    }

    #[tokio::test]
    async fn me_reports_anonymous_without_loading() {
        let response = router(offline_state()).oneshot(get("/api/me")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(json, serde_json::json!({ "user": null, "loading": false }));
    }

    #[tokio::test]
    async fn logout_clears_the_session_cookie() {
        let request = Request::builder()
            .method("POST")
            .uri("/logout")
            .body(Body::empty())
            .unwrap();
        let response = router(offline_state()).oneshot(request).await.unwrap();
        assert_eq!(response.headers()[header::LOCATION], "/landing");
        let cookie = response.headers()[header::SET_COOKIE].to_str().unwrap();
        assert!(cookie.contains("recircuit_session=;"));
        assert!(cookie.contains("Max-Age=0"));
    }

    #[tokio::test]
    async fn profile_less_user_gets_the_donate_form() {
        let state = offline_state();
        let token = crate::auth::issue_token(
            &state.config.jwt_secret,
            uuid::Uuid::new_v4(),
            "ngo@example.org",
            1,
        )
        .unwrap();
        // Profile store is offline: signed in, no role.
        let request = Request::builder()
            .uri("/donate")
            .header(header::COOKIE, format!("recircuit_session={}", token))
            .body(Body::empty())
            .unwrap();
        let response = router(state).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let html = body_text(response).await;
        assert!(html.contains("name=\"pickup_location\""));
        assert!(html.contains("name=\"notes\""));
    }

    #[tokio::test]
    async fn ngo_pages_never_link_to_donate() {
        let ngo = crate::auth::Identity::Authenticated(crate::auth::UserData {
            id: uuid::Uuid::new_v4(),
            email: "ngo@example.org".to_string(),
            name: Some("Helping Hands".to_string()),
            role: Some(crate::auth::Role::Ngo),
        });
        for uri in ["/sell", "/my-listings", "/donate"] {
            let mut request = get(uri);
            // A resolved identity in the extensions skips the profile lookup.
            request.extensions_mut().insert(ngo.clone());
            let response = router(offline_state()).oneshot(request).await.unwrap();
            let html = body_text(response).await;
            assert!(html.contains("Helping Hands"), "{}", uri);
            assert!(!html.contains("href=\"/donate\""), "{}", uri);
        }
    }

    #[tokio::test]
    async fn truncated_form_field_is_reported_as_malformed() {
        let state = offline_state();
        let token =
            crate::auth::issue_token(&state.config.jwt_secret, uuid::Uuid::new_v4(), "a@b.c", 1)
                .unwrap();
        // Stream ends inside the pickup_location part.
        let body = "--XBOUNDARY\r\nContent-Disposition: form-data; name=\"pickup_location\"\r\n\r\n12 Ma";
        let request = Request::builder()
            .method("POST")
            .uri("/api/submissions/sell")
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .header(header::CONTENT_TYPE, "multipart/form-data; boundary=XBOUNDARY")
            .body(Body::from(body))
            .unwrap();
        let response = router(state).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let text = body_text(response).await;
        assert!(text.contains("pickup location read failed"), "{}", text);
        assert!(!text.contains("Pickup location is required"));
    }

    #[tokio::test]
    async fn delete_without_confirmation_is_refused() {
        let state = offline_state();
        let token =
            crate::auth::issue_token(&state.config.jwt_secret, uuid::Uuid::new_v4(), "a@b.c", 1)
                .unwrap();
        let request = Request::builder()
            .method("DELETE")
            .uri(format!("/api/listings/{}", uuid::Uuid::new_v4()))
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .body(Body::empty())
            .unwrap();
        let response = router(state).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
