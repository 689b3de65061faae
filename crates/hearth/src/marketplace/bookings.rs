//! Booking lifecycle: creation, the status state machine, and permissioned
//! transitions with an audit trail.
//!
//! State machine: PENDING -> {CONFIRMED, CANCELLED}; CONFIRMED -> {CANCELLED,
//! COMPLETED}; CANCELLED and COMPLETED are terminal. A transition outside this
//! table fails without mutating the record.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use super::access::{actor_from_headers, AccessPolicy, Action, ResourceRef};
use super::audit::{AuditAction, AuditEntry, AuditSink, RequestMeta};
use super::domain::{
    next_booking_id, Actor, BookingId, PaymentId, Property, PropertyId, RepositoryError, UserId,
};
use super::fault::Fault;
use super::notifications::{templates, NotificationWriter};

/// Booking lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
}

impl BookingStatus {
    pub fn label(self) -> &'static str {
        match self {
            BookingStatus::Pending => "PENDING",
            BookingStatus::Confirmed => "CONFIRMED",
            BookingStatus::Cancelled => "CANCELLED",
            BookingStatus::Completed => "COMPLETED",
        }
    }

    /// Whether the state machine permits moving from `self` to `next`.
    pub fn allows(self, next: BookingStatus) -> bool {
        Self::sources_for(next).contains(&self)
    }

    /// The source statuses from which `target` is reachable.
    pub fn sources_for(target: BookingStatus) -> &'static [BookingStatus] {
        match target {
            BookingStatus::Pending => &[],
            BookingStatus::Confirmed => &[BookingStatus::Pending],
            BookingStatus::Cancelled => &[BookingStatus::Pending, BookingStatus::Confirmed],
            BookingStatus::Completed => &[BookingStatus::Confirmed],
        }
    }
}

/// Reconciliation status mirrored from the payment stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingPaymentStatus {
    Unpaid,
    Paid,
    Failed,
}

/// A reservation of a property by a guest for a date range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    pub id: BookingId,
    pub property_id: PropertyId,
    pub guest_id: UserId,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub guest_count: u32,
    pub guest_name: String,
    pub guest_email: String,
    pub status: BookingStatus,
    pub payment_status: BookingPaymentStatus,
    pub total_amount_cents: u64,
    pub payment_id: Option<PaymentId>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Inbound creation request.
#[derive(Debug, Clone, Deserialize)]
pub struct BookingRequest {
    pub property_id: PropertyId,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub guest_count: u32,
    pub guest_name: String,
    pub guest_email: String,
}

/// Updated booking joined with the property summary fields callers render.
#[derive(Debug, Clone, Serialize)]
pub struct BookingSummary {
    pub booking: Booking,
    pub property: PropertySummary,
}

#[derive(Debug, Clone, Serialize)]
pub struct PropertySummary {
    pub id: PropertyId,
    pub owner: UserId,
    pub agent: Option<UserId>,
    pub nightly_rate_cents: u64,
}

impl PropertySummary {
    fn of(property: &Property) -> Self {
        Self {
            id: property.id.clone(),
            owner: property.owner.clone(),
            agent: property.agent.clone(),
            nightly_rate_cents: property.nightly_rate_cents,
        }
    }
}

/// Storage abstraction for bookings.
pub trait BookingRepository: Send + Sync {
    fn insert(&self, booking: Booking) -> Result<Booking, RepositoryError>;
    fn update(&self, booking: Booking) -> Result<(), RepositoryError>;
    fn fetch(&self, id: &BookingId) -> Result<Option<Booking>, RepositoryError>;
}

/// Read-only lookup of listed properties; the booking flow never mutates them.
pub trait PropertyDirectory: Send + Sync {
    fn fetch(&self, id: &PropertyId) -> Result<Option<Property>, RepositoryError>;
}

pub struct BookingService {
    repository: Arc<dyn BookingRepository>,
    properties: Arc<dyn PropertyDirectory>,
    notifications: Arc<dyn NotificationWriter>,
    audit: Arc<dyn AuditSink>,
    policy: Arc<dyn AccessPolicy>,
    base_url: String,
}

impl BookingService {
    pub fn new(
        repository: Arc<dyn BookingRepository>,
        properties: Arc<dyn PropertyDirectory>,
        notifications: Arc<dyn NotificationWriter>,
        audit: Arc<dyn AuditSink>,
        policy: Arc<dyn AccessPolicy>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            repository,
            properties,
            notifications,
            audit,
            policy,
            base_url: base_url.into(),
        }
    }

    /// Create a booking owned by the requesting user, status PENDING/UNPAID.
    ///
    /// No overlap check against existing bookings is performed; date-range
    /// exclusivity per property is not enforced.
    pub fn create(
        &self,
        actor: &Actor,
        request: BookingRequest,
        meta: &RequestMeta,
    ) -> Result<Booking, Fault> {
        let today = Utc::now().date_naive();
        validate_request(&request, today)?;

        let property = self
            .properties
            .fetch(&request.property_id)?
            .ok_or(Fault::NotFound {
                entity: "property",
                id: request.property_id.0.clone(),
            })?;
        if !property.active {
            return Err(Fault::Validation(format!(
                "property {} is not accepting bookings",
                property.id.0
            )));
        }

        let nights = (request.end_date - request.start_date).num_days() as u64;
        let total_amount_cents = nights * property.nightly_rate_cents;

        let now = Utc::now();
        let booking = Booking {
            id: next_booking_id(),
            property_id: request.property_id,
            guest_id: actor.user_id.clone(),
            start_date: request.start_date,
            end_date: request.end_date,
            guest_count: request.guest_count,
            guest_name: request.guest_name,
            guest_email: request.guest_email,
            status: BookingStatus::Pending,
            payment_status: BookingPaymentStatus::Unpaid,
            total_amount_cents,
            payment_id: None,
            confirmed_at: None,
            created_at: now,
            updated_at: now,
        };

        let stored = self.repository.insert(booking)?;

        self.audit.record(AuditEntry {
            actor: actor.user_id.clone(),
            action: AuditAction::Create,
            entity_kind: "booking",
            entity_id: stored.id.0.clone(),
            before: None,
            after: Some(json!({ "status": stored.status.label() })),
            meta: meta.clone(),
            recorded_at: Utc::now(),
        })?;

        self.notifications.deliver(templates::booking_created(
            &self.base_url,
            &stored.guest_id,
            &stored.id,
        ));

        Ok(stored)
    }

    /// Confirm a PENDING booking as the property owner, assigned agent, or an
    /// admin. Writes one audit entry; no notification is dispatched here.
    pub fn confirm(
        &self,
        actor: &Actor,
        id: &BookingId,
        meta: &RequestMeta,
    ) -> Result<BookingSummary, Fault> {
        let summary = self.apply_transition(
            actor,
            id,
            BookingStatus::Confirmed,
            Action::ConfirmBooking,
            AuditAction::Confirm,
            meta,
        )?;
        info!(booking = %summary.booking.id.0, actor = %actor.user_id.0, "booking confirmed");
        Ok(summary)
    }

    /// Cancel a PENDING or CONFIRMED booking.
    pub fn cancel(
        &self,
        actor: &Actor,
        id: &BookingId,
        meta: &RequestMeta,
    ) -> Result<BookingSummary, Fault> {
        let summary = self.apply_transition(
            actor,
            id,
            BookingStatus::Cancelled,
            Action::CancelBooking,
            AuditAction::Cancel,
            meta,
        )?;
        self.notifications.deliver(templates::booking_cancelled(
            &summary.booking.guest_id,
            &summary.booking.id,
        ));
        Ok(summary)
    }

    /// Mark a CONFIRMED booking as completed after the stay.
    pub fn complete(
        &self,
        actor: &Actor,
        id: &BookingId,
        meta: &RequestMeta,
    ) -> Result<BookingSummary, Fault> {
        self.apply_transition(
            actor,
            id,
            BookingStatus::Completed,
            Action::CompleteBooking,
            AuditAction::Complete,
            meta,
        )
    }

    pub fn get(&self, actor: &Actor, id: &BookingId) -> Result<BookingSummary, Fault> {
        let (booking, property) = self.load(id)?;
        self.authorize(actor, Action::ViewBooking, &booking, &property)?;
        Ok(BookingSummary {
            property: PropertySummary::of(&property),
            booking,
        })
    }

    fn load(&self, id: &BookingId) -> Result<(Booking, Property), Fault> {
        let booking = self.repository.fetch(id)?.ok_or(Fault::NotFound {
            entity: "booking",
            id: id.0.clone(),
        })?;
        let property = self
            .properties
            .fetch(&booking.property_id)?
            .ok_or(Fault::NotFound {
                entity: "property",
                id: booking.property_id.0.clone(),
            })?;
        Ok((booking, property))
    }

    fn authorize(
        &self,
        actor: &Actor,
        action: Action,
        booking: &Booking,
        property: &Property,
    ) -> Result<(), Fault> {
        let resource = ResourceRef::Booking { booking, property };
        if self.policy.can(actor, action, &resource) {
            Ok(())
        } else {
            Err(Fault::Forbidden(
                "actor may not manage this booking".to_string(),
            ))
        }
    }

    /// Shared transition path: load, authorize, check the state table, persist,
    /// append one audit entry. The record is never mutated on a rejected
    /// transition.
    fn apply_transition(
        &self,
        actor: &Actor,
        id: &BookingId,
        target: BookingStatus,
        action: Action,
        audit_action: AuditAction,
        meta: &RequestMeta,
    ) -> Result<BookingSummary, Fault> {
        let (mut booking, property) = self.load(id)?;
        self.authorize(actor, action, &booking, &property)?;

        if !booking.status.allows(target) {
            let allowed = BookingStatus::sources_for(target)
                .iter()
                .map(|status| status.label())
                .collect::<Vec<_>>()
                .join(" or ");
            return Err(Fault::InvalidTransition {
                current: booking.status.label().to_string(),
                allowed,
            });
        }

        let before = json!({ "status": booking.status.label() });
        let now = Utc::now();
        booking.status = target;
        booking.updated_at = now;
        if target == BookingStatus::Confirmed {
            booking.confirmed_at = Some(now);
        }
        let after = json!({ "status": booking.status.label() });

        self.repository.update(booking.clone())?;
        self.audit.record(AuditEntry {
            actor: actor.user_id.clone(),
            action: audit_action,
            entity_kind: "booking",
            entity_id: booking.id.0.clone(),
            before: Some(before),
            after: Some(after),
            meta: meta.clone(),
            recorded_at: now,
        })?;

        Ok(BookingSummary {
            property: PropertySummary::of(&property),
            booking,
        })
    }
}

fn validate_request(request: &BookingRequest, today: NaiveDate) -> Result<(), Fault> {
    if request.start_date >= request.end_date {
        return Err(Fault::Validation(
            "start date must fall before end date".to_string(),
        ));
    }
    if request.start_date <= today {
        return Err(Fault::Validation(
            "start date must be in the future".to_string(),
        ));
    }
    if request.guest_count == 0 {
        return Err(Fault::Validation(
            "guest count must be at least one".to_string(),
        ));
    }
    if request.guest_name.trim().is_empty() {
        return Err(Fault::Validation("guest name is required".to_string()));
    }
    if !request.guest_email.contains('@') {
        return Err(Fault::Validation(
            "guest email must be a valid address".to_string(),
        ));
    }
    Ok(())
}

/// Router builder exposing the booking endpoints.
pub fn booking_router(service: Arc<BookingService>) -> Router {
    Router::new()
        .route("/api/v1/bookings", post(create_handler))
        .route("/api/v1/bookings/:booking_id", get(get_handler))
        .route("/api/v1/bookings/:booking_id/confirm", post(confirm_handler))
        .route("/api/v1/bookings/:booking_id/cancel", post(cancel_handler))
        .route(
            "/api/v1/bookings/:booking_id/complete",
            post(complete_handler),
        )
        .with_state(service)
}

async fn create_handler(
    State(service): State<Arc<BookingService>>,
    headers: HeaderMap,
    Json(request): Json<BookingRequest>,
) -> Result<(StatusCode, Json<Booking>), Fault> {
    let actor = actor_from_headers(&headers)?;
    let meta = RequestMeta::from_headers(&headers);
    let booking = service.create(&actor, request, &meta)?;
    Ok((StatusCode::CREATED, Json(booking)))
}

async fn get_handler(
    State(service): State<Arc<BookingService>>,
    headers: HeaderMap,
    Path(booking_id): Path<String>,
) -> Result<Json<BookingSummary>, Fault> {
    let actor = actor_from_headers(&headers)?;
    let summary = service.get(&actor, &BookingId(booking_id))?;
    Ok(Json(summary))
}

async fn confirm_handler(
    State(service): State<Arc<BookingService>>,
    headers: HeaderMap,
    Path(booking_id): Path<String>,
) -> Result<Json<BookingSummary>, Fault> {
    let actor = actor_from_headers(&headers)?;
    let meta = RequestMeta::from_headers(&headers);
    let summary = service.confirm(&actor, &BookingId(booking_id), &meta)?;
    Ok(Json(summary))
}

async fn cancel_handler(
    State(service): State<Arc<BookingService>>,
    headers: HeaderMap,
    Path(booking_id): Path<String>,
) -> Result<Json<BookingSummary>, Fault> {
    let actor = actor_from_headers(&headers)?;
    let meta = RequestMeta::from_headers(&headers);
    let summary = service.cancel(&actor, &BookingId(booking_id), &meta)?;
    Ok(Json(summary))
}

async fn complete_handler(
    State(service): State<Arc<BookingService>>,
    headers: HeaderMap,
    Path(booking_id): Path<String>,
) -> Result<Json<BookingSummary>, Fault> {
    let actor = actor_from_headers(&headers)?;
    let meta = RequestMeta::from_headers(&headers);
    let summary = service.complete(&actor, &BookingId(booking_id), &meta)?;
    Ok(Json(summary))
}
