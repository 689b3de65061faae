//! User-facing notifications: best-effort delivery, paginated queries, bulk
//! read-marking, and the CRUD surface for single records.
//!
//! Delivery is at-most-once. A persistence failure is logged and swallowed so
//! the primary operation that triggered the notification never rolls back.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, put};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::warn;

use super::access::{actor_from_headers, AccessPolicy, Action, ResourceRef};
use super::domain::{next_notification_id, NotificationId, RepositoryError, UserId};
use super::fault::Fault;

/// Type tag carried by every notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationKind {
    Booking,
    Payment,
    Property,
    System,
}

impl NotificationKind {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "BOOKING" => Some(Self::Booking),
            "PAYMENT" => Some(Self::Payment),
            "PROPERTY" => Some(Self::Property),
            "SYSTEM" => Some(Self::System),
            _ => None,
        }
    }
}

/// Persisted notification row. Only the read/important flags mutate after
/// creation; deletion is reserved to the addressee.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub user_id: UserId,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub reference: Option<String>,
    pub important: bool,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

/// Input to `deliver`; ids and timestamps are assigned at persistence time.
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationDraft {
    pub user_id: UserId,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub reference: Option<String>,
    pub important: bool,
}

/// Template functions producing the (title, message, kind) tuple for common events.
pub mod templates {
    use super::{NotificationDraft, NotificationKind};
    use crate::marketplace::domain::{BookingId, PropertyId, UserId};

    pub fn booking_created(base_url: &str, guest: &UserId, booking: &BookingId) -> NotificationDraft {
        NotificationDraft {
            user_id: guest.clone(),
            kind: NotificationKind::Booking,
            title: "Booking received".to_string(),
            message: format!(
                "Your booking request was received and is awaiting confirmation: {base_url}/bookings/{}",
                booking.0
            ),
            reference: Some(booking.0.clone()),
            important: false,
        }
    }

    pub fn booking_confirmed(base_url: &str, guest: &UserId, booking: &BookingId) -> NotificationDraft {
        NotificationDraft {
            user_id: guest.clone(),
            kind: NotificationKind::Booking,
            title: "Booking confirmed".to_string(),
            message: format!(
                "Your booking is confirmed: {base_url}/bookings/{}",
                booking.0
            ),
            reference: Some(booking.0.clone()),
            important: true,
        }
    }

    pub fn booking_cancelled(guest: &UserId, booking: &BookingId) -> NotificationDraft {
        NotificationDraft {
            user_id: guest.clone(),
            kind: NotificationKind::Booking,
            title: "Booking cancelled".to_string(),
            message: format!("Booking {} was cancelled.", booking.0),
            reference: Some(booking.0.clone()),
            important: false,
        }
    }

    pub fn payment_received(guest: &UserId, booking: &BookingId, amount_cents: u64) -> NotificationDraft {
        NotificationDraft {
            user_id: guest.clone(),
            kind: NotificationKind::Payment,
            title: "Payment received".to_string(),
            message: format!(
                "We received your payment of {}.{:02} for booking {}.",
                amount_cents / 100,
                amount_cents % 100,
                booking.0
            ),
            reference: Some(booking.0.clone()),
            important: false,
        }
    }

    pub fn payment_failed(guest: &UserId, booking: &BookingId) -> NotificationDraft {
        NotificationDraft {
            user_id: guest.clone(),
            kind: NotificationKind::Payment,
            title: "Payment failed".to_string(),
            message: format!(
                "A payment attempt for booking {} failed. Please retry with another method.",
                booking.0
            ),
            reference: Some(booking.0.clone()),
            important: true,
        }
    }

    pub fn property_published(base_url: &str, owner: &UserId, property: &PropertyId) -> NotificationDraft {
        NotificationDraft {
            user_id: owner.clone(),
            kind: NotificationKind::Property,
            title: "Listing published".to_string(),
            message: format!(
                "Your property listing is live: {base_url}/properties/{}",
                property.0
            ),
            reference: Some(property.0.clone()),
            important: false,
        }
    }

    pub fn system_message(user: &UserId, title: &str, message: &str) -> NotificationDraft {
        NotificationDraft {
            user_id: user.clone(),
            kind: NotificationKind::System,
            title: title.to_string(),
            message: message.to_string(),
            reference: None,
            important: false,
        }
    }
}

/// Storage abstraction so the service can be exercised in isolation.
pub trait NotificationRepository: Send + Sync {
    fn insert(&self, notification: Notification) -> Result<Notification, RepositoryError>;
    fn update(&self, notification: Notification) -> Result<(), RepositoryError>;
    fn fetch(&self, id: &NotificationId) -> Result<Option<Notification>, RepositoryError>;
    fn delete(&self, id: &NotificationId) -> Result<(), RepositoryError>;
    fn for_user(&self, user: &UserId) -> Result<Vec<Notification>, RepositoryError>;
}

/// Outbound port used by the booking and payment services for side-effect
/// notifications without depending on the full service type.
pub trait NotificationWriter: Send + Sync {
    fn deliver(&self, draft: NotificationDraft) -> Option<Notification>;
}

/// Filter applied to a user's notification listing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NotificationFilter {
    pub kind: Option<NotificationKind>,
    pub read: Option<bool>,
}

/// One page of a user's notifications plus the counts the inbox UI renders.
#[derive(Debug, Clone, Serialize)]
pub struct NotificationPage {
    pub items: Vec<Notification>,
    pub total: usize,
    pub unread: usize,
    pub read: usize,
    pub page: usize,
    pub per_page: usize,
}

pub struct NotificationService {
    repository: Arc<dyn NotificationRepository>,
    policy: Arc<dyn AccessPolicy>,
}

impl NotificationService {
    pub fn new(
        repository: Arc<dyn NotificationRepository>,
        policy: Arc<dyn AccessPolicy>,
    ) -> Self {
        Self { repository, policy }
    }

    /// Persist one notification, best effort. Failures are logged and absorbed.
    pub fn deliver(&self, draft: NotificationDraft) -> Option<Notification> {
        let notification = Notification {
            id: next_notification_id(),
            user_id: draft.user_id,
            kind: draft.kind,
            title: draft.title,
            message: draft.message,
            reference: draft.reference,
            important: draft.important,
            read: false,
            created_at: Utc::now(),
        };

        match self.repository.insert(notification) {
            Ok(stored) => Some(stored),
            Err(err) => {
                warn!(error = %err, "notification delivery failed; continuing");
                None
            }
        }
    }

    /// Paginated fetch with total/unread/read counts over the kind-filtered set.
    pub fn page(
        &self,
        user: &UserId,
        filter: NotificationFilter,
        page: usize,
        per_page: usize,
    ) -> Result<NotificationPage, Fault> {
        let page = page.max(1);
        let per_page = per_page.clamp(1, 100);

        let mut all: Vec<Notification> = self
            .repository
            .for_user(user)?
            .into_iter()
            .filter(|n| filter.kind.map_or(true, |kind| n.kind == kind))
            .collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = all.len();
        let unread = all.iter().filter(|n| !n.read).count();
        let read = total - unread;

        let items: Vec<Notification> = all
            .into_iter()
            .filter(|n| filter.read.map_or(true, |flag| n.read == flag))
            .skip((page - 1) * per_page)
            .take(per_page)
            .collect();

        Ok(NotificationPage {
            items,
            total,
            unread,
            read,
            page,
            per_page,
        })
    }

    /// Mark notifications as read. With no explicit ids, every currently-unread
    /// notification of this user (and only this user) is marked in one pass.
    pub fn mark_read(
        &self,
        user: &UserId,
        ids: Option<Vec<NotificationId>>,
    ) -> Result<usize, Fault> {
        let targets: Vec<Notification> = match ids {
            Some(ids) => {
                let mut found = Vec::new();
                for id in ids {
                    if let Some(notification) = self.repository.fetch(&id)? {
                        if notification.user_id == *user && !notification.read {
                            found.push(notification);
                        }
                    }
                }
                found
            }
            None => self
                .repository
                .for_user(user)?
                .into_iter()
                .filter(|n| !n.read)
                .collect(),
        };

        let mut updated = 0;
        for mut notification in targets {
            notification.read = true;
            self.repository.update(notification)?;
            updated += 1;
        }
        Ok(updated)
    }

    pub fn get(&self, actor: &super::domain::Actor, id: &NotificationId) -> Result<Notification, Fault> {
        let notification = self.fetch_owned(actor, id)?;
        Ok(notification)
    }

    /// Toggle the read/important flags, the only fields mutable after creation.
    pub fn set_flags(
        &self,
        actor: &super::domain::Actor,
        id: &NotificationId,
        read: Option<bool>,
        important: Option<bool>,
    ) -> Result<Notification, Fault> {
        let mut notification = self.fetch_owned(actor, id)?;
        if let Some(read) = read {
            notification.read = read;
        }
        if let Some(important) = important {
            notification.important = important;
        }
        self.repository.update(notification.clone())?;
        Ok(notification)
    }

    pub fn delete(&self, actor: &super::domain::Actor, id: &NotificationId) -> Result<(), Fault> {
        let notification = self.fetch_owned(actor, id)?;
        self.repository.delete(&notification.id)?;
        Ok(())
    }

    fn fetch_owned(
        &self,
        actor: &super::domain::Actor,
        id: &NotificationId,
    ) -> Result<Notification, Fault> {
        let notification = self.repository.fetch(id)?.ok_or(Fault::NotFound {
            entity: "notification",
            id: id.0.clone(),
        })?;

        let resource = ResourceRef::Notification {
            addressee: &notification.user_id,
        };
        if !self.policy.can(actor, Action::ManageNotification, &resource) {
            return Err(Fault::Forbidden(
                "notification belongs to another user".to_string(),
            ));
        }
        Ok(notification)
    }
}

impl NotificationWriter for NotificationService {
    fn deliver(&self, draft: NotificationDraft) -> Option<Notification> {
        NotificationService::deliver(self, draft)
    }
}

/// Router builder exposing the notification CRUD surface.
pub fn notification_router(service: Arc<NotificationService>) -> Router {
    Router::new()
        .route("/api/v1/notifications", get(list_handler))
        .route("/api/v1/notifications/read", put(mark_read_handler))
        .route(
            "/api/v1/notifications/:notification_id",
            get(get_handler).put(update_handler).delete(delete_handler),
        )
        .with_state(service)
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    kind: Option<String>,
    read: Option<bool>,
    page: Option<usize>,
    per_page: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct MarkReadRequest {
    ids: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct UpdateRequest {
    read: Option<bool>,
    important: Option<bool>,
}

async fn list_handler(
    State(service): State<Arc<NotificationService>>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> Result<Json<NotificationPage>, Fault> {
    let actor = actor_from_headers(&headers)?;

    let kind = match query.kind.as_deref() {
        Some(raw) => Some(NotificationKind::parse(raw).ok_or_else(|| {
            Fault::Validation(format!("unknown notification kind '{raw}'"))
        })?),
        None => None,
    };

    let page = service.page(
        &actor.user_id,
        NotificationFilter {
            kind,
            read: query.read,
        },
        query.page.unwrap_or(1),
        query.per_page.unwrap_or(20),
    )?;
    Ok(Json(page))
}

async fn mark_read_handler(
    State(service): State<Arc<NotificationService>>,
    headers: HeaderMap,
    Json(request): Json<MarkReadRequest>,
) -> Result<Json<serde_json::Value>, Fault> {
    let actor = actor_from_headers(&headers)?;
    let ids = request
        .ids
        .map(|ids| ids.into_iter().map(NotificationId).collect());
    let updated = service.mark_read(&actor.user_id, ids)?;
    Ok(Json(json!({ "updated": updated })))
}

async fn get_handler(
    State(service): State<Arc<NotificationService>>,
    headers: HeaderMap,
    Path(notification_id): Path<String>,
) -> Result<Json<Notification>, Fault> {
    let actor = actor_from_headers(&headers)?;
    let notification = service.get(&actor, &NotificationId(notification_id))?;
    Ok(Json(notification))
}

async fn update_handler(
    State(service): State<Arc<NotificationService>>,
    headers: HeaderMap,
    Path(notification_id): Path<String>,
    Json(request): Json<UpdateRequest>,
) -> Result<Json<Notification>, Fault> {
    let actor = actor_from_headers(&headers)?;
    let notification = service.set_flags(
        &actor,
        &NotificationId(notification_id),
        request.read,
        request.important,
    )?;
    Ok(Json(notification))
}

async fn delete_handler(
    State(service): State<Arc<NotificationService>>,
    headers: HeaderMap,
    Path(notification_id): Path<String>,
) -> Result<StatusCode, Fault> {
    let actor = actor_from_headers(&headers)?;
    service.delete(&actor, &NotificationId(notification_id))?;
    Ok(StatusCode::NO_CONTENT)
}
