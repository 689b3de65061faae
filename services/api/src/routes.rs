use crate::infra::{
    AppState, InMemoryBookingRepository, InMemoryNotificationRepository, InMemoryPaymentRepository,
    InMemoryPropertyDirectory,
};
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use hearth::marketplace::bookings::{booking_router, BookingService};
use hearth::marketplace::notifications::{notification_router, NotificationService};
use hearth::marketplace::payments::{payment_router, PaymentGateway};
use hearth::marketplace::tokens::{ExpiringTokenStore, ResetTokenStore};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

pub(crate) fn marketplace_routes(
    bookings: Arc<BookingService>,
    payments: Arc<PaymentGateway>,
    notifications: Arc<NotificationService>,
) -> Router {
    booking_router(bookings)
        .merge(payment_router(payments))
        .merge(notification_router(notifications))
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
}

/// Inspection endpoints mounted only in the development environment.
#[derive(Clone)]
pub(crate) struct DebugState {
    pub(crate) bookings: InMemoryBookingRepository,
    pub(crate) payments: InMemoryPaymentRepository,
    pub(crate) notifications: InMemoryNotificationRepository,
    pub(crate) properties: InMemoryPropertyDirectory,
    pub(crate) tokens: Arc<ExpiringTokenStore>,
}

pub(crate) fn debug_routes(state: DebugState) -> Router {
    Router::new()
        .route("/debug/state", get(debug_state_endpoint))
        .route("/debug/reset-tokens", post(issue_reset_token_endpoint))
        .route(
            "/debug/reset-tokens/redeem",
            post(redeem_reset_token_endpoint),
        )
        .with_state(state)
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

async fn debug_state_endpoint(State(state): State<DebugState>) -> Json<serde_json::Value> {
    Json(json!({
        "bookings": state.bookings.len(),
        "payments": state.payments.len(),
        "notifications": state.notifications.len(),
        "properties": state.properties.len(),
        "reset_tokens": state.tokens.outstanding(),
    }))
}

#[derive(Debug, Deserialize)]
struct IssueTokenRequest {
    user_id: String,
}

#[derive(Debug, Deserialize)]
struct RedeemTokenRequest {
    token: String,
}

async fn issue_reset_token_endpoint(
    State(state): State<DebugState>,
    Json(request): Json<IssueTokenRequest>,
) -> impl IntoResponse {
    let token = state
        .tokens
        .issue(&hearth::marketplace::domain::UserId(request.user_id));
    (StatusCode::CREATED, Json(json!({ "token": token })))
}

async fn redeem_reset_token_endpoint(
    State(state): State<DebugState>,
    Json(request): Json<RedeemTokenRequest>,
) -> impl IntoResponse {
    match state.tokens.consume(&request.token) {
        Some(user) => (StatusCode::OK, Json(json!({ "user_id": user.0 }))),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "token is unknown, expired, or already used" })),
        ),
    }
}
