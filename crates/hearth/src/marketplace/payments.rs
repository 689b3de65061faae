//! Payment gateway adapter: webhook intake, signature verification, and the
//! event dispatch table that reconciles payments against bookings.
//!
//! Policy: a trusted, parseable payload is always acknowledged with
//! `{"received": true}`, including no-ops and internally failed updates, so the
//! gateway never retries indefinitely. Each dispatch arm absorbs its own
//! repository failures.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use super::bookings::{BookingPaymentStatus, BookingRepository};
use super::domain::{next_payment_id, BookingId, PaymentId, RepositoryError};
use super::fault::Fault;
use super::notifications::{templates, NotificationWriter};

/// Lifecycle of one payment attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentState {
    Pending,
    Completed,
    Failed,
    Cancelled,
}

/// One payment attempt against a booking. A booking may accumulate several
/// attempts; at most one may be COMPLETED.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub booking_id: BookingId,
    pub gateway_payment_id: String,
    pub amount_cents: u64,
    pub status: PaymentState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Storage abstraction for payment attempts.
pub trait PaymentRepository: Send + Sync {
    fn insert(&self, payment: Payment) -> Result<Payment, RepositoryError>;
    fn update(&self, payment: Payment) -> Result<(), RepositoryError>;
    fn fetch_by_gateway_id(&self, gateway_id: &str) -> Result<Option<Payment>, RepositoryError>;
    fn fetch_by_booking(&self, booking: &BookingId) -> Result<Vec<Payment>, RepositoryError>;
}

/// Opaque event envelope posted by the external payment processor.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEnvelope {
    #[serde(rename = "type")]
    pub kind: String,
    pub data: WebhookData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookData {
    pub object: WebhookObject,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookObject {
    pub id: String,
}

/// Verifies the keyed digest the gateway attaches to each delivery.
///
/// Signature scheme: `hex(SHA-256(secret || '.' || raw_body))`. Comparison is
/// done over fresh digests of both strings so a mismatch cannot short-circuit
/// on length.
#[derive(Debug, Clone)]
pub struct WebhookVerifier {
    secret: String,
}

impl WebhookVerifier {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    pub fn signature(&self, body: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.secret.as_bytes());
        hasher.update(b".");
        hasher.update(body.as_bytes());
        hex::encode(hasher.finalize())
    }

    pub fn verify(&self, body: &str, provided: &str) -> bool {
        let expected = self.signature(body);
        Sha256::digest(expected.as_bytes()) == Sha256::digest(provided.as_bytes())
    }
}

/// What the dispatcher did with an event; surfaced in logs and tests, never to
/// the external caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookOutcome {
    PaymentCompleted,
    PaymentFailed,
    PaymentCancelled,
    UnknownPayment,
    UnknownEvent,
    DuplicateCompletion,
    InternalNoOp,
}

/// Informational view of a cancelled payment attempt.
#[derive(Debug, Clone, Serialize)]
pub struct CancelInfo {
    pub booking_id: BookingId,
    pub gateway_payment_id: String,
    pub status: PaymentState,
    pub amount_cents: u64,
    pub message: String,
}

pub struct PaymentGateway {
    payments: Arc<dyn PaymentRepository>,
    bookings: Arc<dyn BookingRepository>,
    notifications: Arc<dyn NotificationWriter>,
    verifier: WebhookVerifier,
}

impl PaymentGateway {
    pub fn new(
        payments: Arc<dyn PaymentRepository>,
        bookings: Arc<dyn BookingRepository>,
        notifications: Arc<dyn NotificationWriter>,
        verifier: WebhookVerifier,
    ) -> Self {
        Self {
            payments,
            bookings,
            notifications,
            verifier,
        }
    }

    pub fn verifier(&self) -> &WebhookVerifier {
        &self.verifier
    }

    /// Record a new payment attempt ahead of the gateway's event stream taking
    /// ownership of its lifecycle.
    pub fn record_attempt(
        &self,
        booking_id: BookingId,
        gateway_payment_id: String,
        amount_cents: Option<u64>,
    ) -> Result<Payment, Fault> {
        let booking = self.bookings.fetch(&booking_id)?.ok_or(Fault::NotFound {
            entity: "booking",
            id: booking_id.0.clone(),
        })?;
        if gateway_payment_id.trim().is_empty() {
            return Err(Fault::Validation(
                "gateway payment id is required".to_string(),
            ));
        }

        let now = Utc::now();
        let payment = Payment {
            id: next_payment_id(),
            booking_id,
            gateway_payment_id,
            amount_cents: amount_cents.unwrap_or(booking.total_amount_cents),
            status: PaymentState::Pending,
            created_at: now,
            updated_at: now,
        };
        let stored = self.payments.insert(payment)?;
        Ok(stored)
    }

    /// Dispatch one trusted event. Never fails; a repository error inside an
    /// arm is logged and reported as a no-op.
    pub fn handle_event(&self, envelope: &WebhookEnvelope) -> WebhookOutcome {
        let gateway_id = envelope.data.object.id.as_str();
        let result = match envelope.kind.as_str() {
            "payment_intent.succeeded" => self.apply_success(gateway_id),
            "payment_intent.payment_failed" => self.apply_failure(gateway_id),
            "payment_intent.canceled" => self.apply_cancellation(gateway_id),
            other => {
                info!(event = other, "ignoring unknown webhook event type");
                Ok(WebhookOutcome::UnknownEvent)
            }
        };

        match result {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(event = %envelope.kind, gateway_id, error = %err, "webhook update failed; acknowledging anyway");
                WebhookOutcome::InternalNoOp
            }
        }
    }

    fn apply_success(&self, gateway_id: &str) -> Result<WebhookOutcome, RepositoryError> {
        let Some(mut payment) = self.payments.fetch_by_gateway_id(gateway_id)? else {
            info!(gateway_id, "payment not found for succeeded event");
            return Ok(WebhookOutcome::UnknownPayment);
        };

        if payment.status == PaymentState::Completed {
            info!(gateway_id, "payment already completed; ignoring redelivery");
            return Ok(WebhookOutcome::DuplicateCompletion);
        }
        let siblings = self.payments.fetch_by_booking(&payment.booking_id)?;
        if siblings
            .iter()
            .any(|p| p.status == PaymentState::Completed && p.id != payment.id)
        {
            warn!(
                gateway_id,
                booking = %payment.booking_id.0,
                "booking already has a completed payment; refusing a second completion"
            );
            return Ok(WebhookOutcome::DuplicateCompletion);
        }

        payment.status = PaymentState::Completed;
        payment.updated_at = Utc::now();
        self.payments.update(payment.clone())?;

        match self.bookings.fetch(&payment.booking_id)? {
            Some(mut booking) => {
                booking.payment_status = BookingPaymentStatus::Paid;
                booking.payment_id = Some(payment.id.clone());
                booking.updated_at = Utc::now();
                self.bookings.update(booking.clone())?;
                self.notifications.deliver(templates::payment_received(
                    &booking.guest_id,
                    &booking.id,
                    payment.amount_cents,
                ));
            }
            None => {
                warn!(gateway_id, booking = %payment.booking_id.0, "booking missing for completed payment");
            }
        }

        Ok(WebhookOutcome::PaymentCompleted)
    }

    fn apply_failure(&self, gateway_id: &str) -> Result<WebhookOutcome, RepositoryError> {
        let Some(mut payment) = self.payments.fetch_by_gateway_id(gateway_id)? else {
            info!(gateway_id, "payment not found for failed event");
            return Ok(WebhookOutcome::UnknownPayment);
        };

        payment.status = PaymentState::Failed;
        payment.updated_at = Utc::now();
        self.payments.update(payment.clone())?;

        // Booking status is left untouched; only the attempt is marked.
        if let Some(mut booking) = self.bookings.fetch(&payment.booking_id)? {
            booking.payment_status = BookingPaymentStatus::Failed;
            booking.updated_at = Utc::now();
            self.bookings.update(booking.clone())?;
            self.notifications
                .deliver(templates::payment_failed(&booking.guest_id, &booking.id));
        }

        Ok(WebhookOutcome::PaymentFailed)
    }

    fn apply_cancellation(&self, gateway_id: &str) -> Result<WebhookOutcome, RepositoryError> {
        let Some(mut payment) = self.payments.fetch_by_gateway_id(gateway_id)? else {
            info!(gateway_id, "payment not found for canceled event");
            return Ok(WebhookOutcome::UnknownPayment);
        };

        payment.status = PaymentState::Cancelled;
        payment.updated_at = Utc::now();
        self.payments.update(payment)?;
        Ok(WebhookOutcome::PaymentCancelled)
    }

    /// Describe a cancelled payment attempt, looked up by gateway id or by the
    /// booking's most recent attempt. Exactly one selector is required.
    pub fn cancel_info(
        &self,
        gateway_payment_id: Option<&str>,
        booking_id: Option<&BookingId>,
    ) -> Result<CancelInfo, Fault> {
        let payment = match (gateway_payment_id, booking_id) {
            (Some(gateway_id), None) => {
                self.payments
                    .fetch_by_gateway_id(gateway_id)?
                    .ok_or(Fault::NotFound {
                        entity: "payment",
                        id: gateway_id.to_string(),
                    })?
            }
            (None, Some(booking)) => {
                let mut attempts = self.payments.fetch_by_booking(booking)?;
                attempts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
                attempts.into_iter().next().ok_or(Fault::NotFound {
                    entity: "payment",
                    id: booking.0.clone(),
                })?
            }
            _ => {
                return Err(Fault::Validation(
                    "exactly one of payment_intent or booking_id is required".to_string(),
                ))
            }
        };

        Ok(CancelInfo {
            message: format!(
                "payment attempt {} for booking {} was cancelled before completion",
                payment.gateway_payment_id, payment.booking_id.0
            ),
            booking_id: payment.booking_id,
            gateway_payment_id: payment.gateway_payment_id,
            status: payment.status,
            amount_cents: payment.amount_cents,
        })
    }
}

/// Router builder exposing the payment endpoints.
pub fn payment_router(gateway: Arc<PaymentGateway>) -> Router {
    Router::new()
        .route("/api/v1/payments", post(record_attempt_handler))
        .route("/api/v1/payments/webhook", post(webhook_handler))
        .route("/api/v1/payments/cancel", get(cancel_info_handler))
        .with_state(gateway)
}

#[derive(Debug, Deserialize)]
struct RecordAttemptRequest {
    booking_id: String,
    gateway_payment_id: String,
    amount_cents: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct CancelQuery {
    payment_intent: Option<String>,
    #[serde(alias = "bookingId")]
    booking_id: Option<String>,
}

async fn record_attempt_handler(
    State(gateway): State<Arc<PaymentGateway>>,
    Json(request): Json<RecordAttemptRequest>,
) -> Result<(StatusCode, Json<Payment>), Fault> {
    let payment = gateway.record_attempt(
        BookingId(request.booking_id),
        request.gateway_payment_id,
        request.amount_cents,
    )?;
    Ok((StatusCode::CREATED, Json(payment)))
}

async fn webhook_handler(
    State(gateway): State<Arc<PaymentGateway>>,
    headers: HeaderMap,
    body: String,
) -> Response {
    let provided = headers
        .get("x-webhook-signature")
        .and_then(|value| value.to_str().ok());
    let Some(provided) = provided else {
        let payload = json!({ "error": "missing webhook signature" });
        return (StatusCode::BAD_REQUEST, Json(payload)).into_response();
    };
    if !gateway.verifier.verify(&body, provided) {
        warn!("webhook signature mismatch; rejecting payload");
        let payload = json!({ "error": "invalid webhook signature" });
        return (StatusCode::BAD_REQUEST, Json(payload)).into_response();
    }

    let envelope: WebhookEnvelope = match serde_json::from_str(&body) {
        Ok(envelope) => envelope,
        Err(err) => {
            let payload = json!({ "error": format!("unparseable webhook payload: {err}") });
            return (StatusCode::BAD_REQUEST, Json(payload)).into_response();
        }
    };

    let outcome = gateway.handle_event(&envelope);
    info!(event = %envelope.kind, ?outcome, "webhook acknowledged");
    (StatusCode::OK, Json(json!({ "received": true }))).into_response()
}

async fn cancel_info_handler(
    State(gateway): State<Arc<PaymentGateway>>,
    Query(query): Query<CancelQuery>,
) -> Result<Json<CancelInfo>, Fault> {
    let booking_id = query.booking_id.map(BookingId);
    let info = gateway.cancel_info(query.payment_intent.as_deref(), booking_id.as_ref())?;
    Ok(Json(info))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marketplace::bookings::{Booking, BookingStatus};
    use crate::marketplace::domain::{PropertyId, UserId};
    use crate::marketplace::notifications::{Notification, NotificationDraft, NotificationKind};
    use axum::body::to_bytes;
    use chrono::NaiveDate;
    use serde_json::Value;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default, Clone)]
    struct MemoryPayments {
        records: Arc<Mutex<HashMap<PaymentId, Payment>>>,
    }

    impl MemoryPayments {
        fn all(&self) -> Vec<Payment> {
            self.records.lock().expect("lock").values().cloned().collect()
        }
    }

    impl PaymentRepository for MemoryPayments {
        fn insert(&self, payment: Payment) -> Result<Payment, RepositoryError> {
            let mut guard = self.records.lock().expect("lock");
            if guard.contains_key(&payment.id) {
                return Err(RepositoryError::Conflict);
            }
            guard.insert(payment.id.clone(), payment.clone());
            Ok(payment)
        }

        fn update(&self, payment: Payment) -> Result<(), RepositoryError> {
            let mut guard = self.records.lock().expect("lock");
            if guard.contains_key(&payment.id) {
                guard.insert(payment.id.clone(), payment);
                Ok(())
            } else {
                Err(RepositoryError::NotFound)
            }
        }

        fn fetch_by_gateway_id(
            &self,
            gateway_id: &str,
        ) -> Result<Option<Payment>, RepositoryError> {
            Ok(self
                .records
                .lock()
                .expect("lock")
                .values()
                .find(|p| p.gateway_payment_id == gateway_id)
                .cloned())
        }

        fn fetch_by_booking(&self, booking: &BookingId) -> Result<Vec<Payment>, RepositoryError> {
            Ok(self
                .records
                .lock()
                .expect("lock")
                .values()
                .filter(|p| p.booking_id == *booking)
                .cloned()
                .collect())
        }
    }

    #[derive(Default, Clone)]
    struct MemoryBookings {
        records: Arc<Mutex<HashMap<BookingId, Booking>>>,
    }

    impl BookingRepository for MemoryBookings {
        fn insert(&self, booking: Booking) -> Result<Booking, RepositoryError> {
            self.records
                .lock()
                .expect("lock")
                .insert(booking.id.clone(), booking.clone());
            Ok(booking)
        }

        fn update(&self, booking: Booking) -> Result<(), RepositoryError> {
            let mut guard = self.records.lock().expect("lock");
            if guard.contains_key(&booking.id) {
                guard.insert(booking.id.clone(), booking);
                Ok(())
            } else {
                Err(RepositoryError::NotFound)
            }
        }

        fn fetch(&self, id: &BookingId) -> Result<Option<Booking>, RepositoryError> {
            Ok(self.records.lock().expect("lock").get(id).cloned())
        }
    }

    #[derive(Default, Clone)]
    struct CapturedNotifications {
        drafts: Arc<Mutex<Vec<NotificationDraft>>>,
    }

    impl CapturedNotifications {
        fn drafts(&self) -> Vec<NotificationDraft> {
            self.drafts.lock().expect("lock").clone()
        }
    }

    impl NotificationWriter for CapturedNotifications {
        fn deliver(&self, draft: NotificationDraft) -> Option<Notification> {
            self.drafts.lock().expect("lock").push(draft);
            None
        }
    }

    fn booking(id: &str) -> Booking {
        let now = Utc::now();
        Booking {
            id: BookingId(id.into()),
            property_id: PropertyId("prop-1".into()),
            guest_id: UserId("sam".into()),
            start_date: NaiveDate::from_ymd_opt(2030, 6, 1).expect("valid"),
            end_date: NaiveDate::from_ymd_opt(2030, 6, 4).expect("valid"),
            guest_count: 2,
            guest_name: "Sam Guest".into(),
            guest_email: "sam@example.com".into(),
            status: BookingStatus::Pending,
            payment_status: crate::marketplace::bookings::BookingPaymentStatus::Unpaid,
            total_amount_cents: 36_000,
            payment_id: None,
            confirmed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    struct Harness {
        gateway: PaymentGateway,
        payments: MemoryPayments,
        bookings: MemoryBookings,
        notifications: CapturedNotifications,
    }

    fn harness() -> Harness {
        let payments = MemoryPayments::default();
        let bookings = MemoryBookings::default();
        let notifications = CapturedNotifications::default();
        bookings.insert(booking("bkg-000001")).expect("seed booking");
        let gateway = PaymentGateway::new(
            Arc::new(payments.clone()),
            Arc::new(bookings.clone()),
            Arc::new(notifications.clone()),
            WebhookVerifier::new("test-secret"),
        );
        Harness {
            gateway,
            payments,
            bookings,
            notifications,
        }
    }

    fn envelope(kind: &str, gateway_id: &str) -> WebhookEnvelope {
        WebhookEnvelope {
            kind: kind.to_string(),
            data: WebhookData {
                object: WebhookObject {
                    id: gateway_id.to_string(),
                },
            },
        }
    }

    #[test]
    fn succeeded_event_marks_payment_and_booking_paid() {
        let h = harness();
        let payment = h
            .gateway
            .record_attempt(BookingId("bkg-000001".into()), "pi_abc".into(), None)
            .expect("attempt recorded");
        assert_eq!(payment.amount_cents, 36_000, "defaults to booking total");

        let outcome = h
            .gateway
            .handle_event(&envelope("payment_intent.succeeded", "pi_abc"));
        assert_eq!(outcome, WebhookOutcome::PaymentCompleted);

        let stored = h
            .payments
            .fetch_by_gateway_id("pi_abc")
            .expect("fetch")
            .expect("present");
        assert_eq!(stored.status, PaymentState::Completed);

        let booking = h
            .bookings
            .fetch(&BookingId("bkg-000001".into()))
            .expect("fetch")
            .expect("present");
        assert_eq!(
            booking.payment_status,
            crate::marketplace::bookings::BookingPaymentStatus::Paid
        );
        assert_eq!(booking.payment_id, Some(stored.id));

        let drafts = h.notifications.drafts();
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].kind, NotificationKind::Payment);
    }

    #[test]
    fn unknown_gateway_id_is_a_no_op_that_still_acknowledges() {
        let h = harness();
        let outcome = h
            .gateway
            .handle_event(&envelope("payment_intent.succeeded", "pi_123"));
        assert_eq!(outcome, WebhookOutcome::UnknownPayment);
        assert!(h.payments.all().is_empty());

        let booking = h
            .bookings
            .fetch(&BookingId("bkg-000001".into()))
            .expect("fetch")
            .expect("present");
        assert_eq!(
            booking.payment_status,
            crate::marketplace::bookings::BookingPaymentStatus::Unpaid
        );
    }

    #[test]
    fn unknown_event_type_is_ignored() {
        let h = harness();
        let outcome = h
            .gateway
            .handle_event(&envelope("payment_intent.partially_funded", "pi_abc"));
        assert_eq!(outcome, WebhookOutcome::UnknownEvent);
    }

    #[test]
    fn second_completion_for_same_booking_is_refused() {
        let h = harness();
        h.gateway
            .record_attempt(BookingId("bkg-000001".into()), "pi_one".into(), None)
            .expect("attempt");
        h.gateway
            .record_attempt(BookingId("bkg-000001".into()), "pi_two".into(), None)
            .expect("attempt");

        let first = h
            .gateway
            .handle_event(&envelope("payment_intent.succeeded", "pi_one"));
        assert_eq!(first, WebhookOutcome::PaymentCompleted);

        let second = h
            .gateway
            .handle_event(&envelope("payment_intent.succeeded", "pi_two"));
        assert_eq!(second, WebhookOutcome::DuplicateCompletion);

        let completed: Vec<Payment> = h
            .payments
            .all()
            .into_iter()
            .filter(|p| p.status == PaymentState::Completed)
            .collect();
        assert_eq!(completed.len(), 1);
    }

    #[test]
    fn redelivered_success_event_is_idempotent() {
        let h = harness();
        h.gateway
            .record_attempt(BookingId("bkg-000001".into()), "pi_abc".into(), None)
            .expect("attempt");

        h.gateway
            .handle_event(&envelope("payment_intent.succeeded", "pi_abc"));
        let outcome = h
            .gateway
            .handle_event(&envelope("payment_intent.succeeded", "pi_abc"));
        assert_eq!(outcome, WebhookOutcome::DuplicateCompletion);
    }

    #[test]
    fn failed_event_marks_attempt_failed_and_keeps_booking_status() {
        let h = harness();
        h.gateway
            .record_attempt(BookingId("bkg-000001".into()), "pi_abc".into(), None)
            .expect("attempt");

        let outcome = h
            .gateway
            .handle_event(&envelope("payment_intent.payment_failed", "pi_abc"));
        assert_eq!(outcome, WebhookOutcome::PaymentFailed);

        let booking = h
            .bookings
            .fetch(&BookingId("bkg-000001".into()))
            .expect("fetch")
            .expect("present");
        assert_eq!(booking.status, BookingStatus::Pending);
        assert_eq!(
            booking.payment_status,
            crate::marketplace::bookings::BookingPaymentStatus::Failed
        );

        let drafts = h.notifications.drafts();
        assert!(drafts.iter().any(|d| d.title.contains("failed")));
    }

    #[test]
    fn canceled_event_marks_attempt_cancelled() {
        let h = harness();
        h.gateway
            .record_attempt(BookingId("bkg-000001".into()), "pi_abc".into(), None)
            .expect("attempt");

        let outcome = h
            .gateway
            .handle_event(&envelope("payment_intent.canceled", "pi_abc"));
        assert_eq!(outcome, WebhookOutcome::PaymentCancelled);

        let stored = h
            .payments
            .fetch_by_gateway_id("pi_abc")
            .expect("fetch")
            .expect("present");
        assert_eq!(stored.status, PaymentState::Cancelled);
    }

    #[test]
    fn cancel_info_requires_exactly_one_selector() {
        let h = harness();
        match h.gateway.cancel_info(None, None) {
            Err(Fault::Validation(message)) => assert!(message.contains("exactly one")),
            other => panic!("expected validation failure, got {other:?}"),
        }
        match h
            .gateway
            .cancel_info(Some("pi_abc"), Some(&BookingId("bkg-000001".into())))
        {
            Err(Fault::Validation(_)) => {}
            other => panic!("expected validation failure, got {other:?}"),
        }
    }

    #[test]
    fn cancel_info_resolves_latest_attempt_for_booking() {
        let h = harness();
        h.gateway
            .record_attempt(BookingId("bkg-000001".into()), "pi_old".into(), None)
            .expect("attempt");
        h.gateway
            .record_attempt(BookingId("bkg-000001".into()), "pi_new".into(), None)
            .expect("attempt");
        h.gateway
            .handle_event(&envelope("payment_intent.canceled", "pi_new"));

        let info = h
            .gateway
            .cancel_info(None, Some(&BookingId("bkg-000001".into())))
            .expect("info resolves");
        assert_eq!(info.gateway_payment_id, "pi_new");
        assert_eq!(info.status, PaymentState::Cancelled);
    }

    #[test]
    fn verifier_accepts_matching_and_rejects_tampered_signatures() {
        let verifier = WebhookVerifier::new("test-secret");
        let body = r#"{"type":"payment_intent.succeeded","data":{"object":{"id":"pi_123"}}}"#;
        let signature = verifier.signature(body);

        assert!(verifier.verify(body, &signature));
        assert!(!verifier.verify(body, "deadbeef"));
        assert!(!verifier.verify(&format!("{body} "), &signature));
        assert!(!WebhookVerifier::new("other-secret").verify(body, &signature));
    }

    #[tokio::test]
    async fn webhook_handler_acknowledges_trusted_unknown_payment() {
        let h = harness();
        let gateway = Arc::new(h.gateway);
        let body =
            r#"{"type":"payment_intent.succeeded","data":{"object":{"id":"pi_123"}}}"#.to_string();
        let signature = gateway.verifier().signature(&body);

        let mut headers = HeaderMap::new();
        headers.insert(
            "x-webhook-signature",
            signature.parse().expect("header value"),
        );

        let response = webhook_handler(State(gateway), headers, body).await;
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), 1024).await.expect("body");
        let payload: Value = serde_json::from_slice(&bytes).expect("json");
        assert_eq!(payload.get("received"), Some(&Value::Bool(true)));

        assert!(h.payments.all().is_empty(), "no row was mutated");
    }

    #[tokio::test]
    async fn webhook_handler_rejects_bad_signature_and_bad_payload() {
        let h = harness();
        let gateway = Arc::new(h.gateway);

        let body = r#"{"type":"payment_intent.succeeded","data":{"object":{"id":"pi_123"}}}"#;
        let mut headers = HeaderMap::new();
        headers.insert("x-webhook-signature", "deadbeef".parse().expect("value"));
        let response =
            webhook_handler(State(gateway.clone()), headers, body.to_string()).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = webhook_handler(State(gateway.clone()), HeaderMap::new(), body.to_string()).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let garbage = "not json".to_string();
        let signature = gateway.verifier().signature(&garbage);
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-webhook-signature",
            signature.parse().expect("header value"),
        );
        let response = webhook_handler(State(gateway), headers, garbage).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
