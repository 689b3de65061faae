//! Capability checks: a single `can(actor, action, resource)` interface in place
//! of per-handler role string comparison.

use axum::http::HeaderMap;

use super::bookings::Booking;
use super::domain::{Actor, Property, Role, UserId};
use super::fault::Fault;

/// Actions subject to a capability check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    ConfirmBooking,
    CancelBooking,
    CompleteBooking,
    ViewBooking,
    ManageNotification,
}

/// The resource an action targets, borrowed from the calling service.
#[derive(Debug)]
pub enum ResourceRef<'a> {
    Booking {
        booking: &'a Booking,
        property: &'a Property,
    },
    Notification {
        addressee: &'a UserId,
    },
}

pub trait AccessPolicy: Send + Sync {
    fn can(&self, actor: &Actor, action: Action, resource: &ResourceRef<'_>) -> bool;
}

/// Default policy: admins may do anything; property owners and assigned agents
/// manage bookings on their property; guests manage their own bookings and
/// notifications.
#[derive(Debug, Default, Clone)]
pub struct RolePolicy;

impl AccessPolicy for RolePolicy {
    fn can(&self, actor: &Actor, action: Action, resource: &ResourceRef<'_>) -> bool {
        if actor.role == Role::Admin {
            return true;
        }

        match resource {
            ResourceRef::Booking { booking, property } => {
                let manages_property = property.owner == actor.user_id
                    || property.agent.as_ref() == Some(&actor.user_id);
                let own_booking = booking.guest_id == actor.user_id;
                match action {
                    Action::ConfirmBooking | Action::CompleteBooking => manages_property,
                    Action::CancelBooking | Action::ViewBooking => manages_property || own_booking,
                    Action::ManageNotification => false,
                }
            }
            ResourceRef::Notification { addressee } => {
                action == Action::ManageNotification && **addressee == actor.user_id
            }
        }
    }
}

/// Resolve the request identity from headers populated by the upstream auth
/// layer. Missing or malformed identity yields `Unauthorized`.
pub fn actor_from_headers(headers: &HeaderMap) -> Result<Actor, Fault> {
    let user_id = headers
        .get("x-user-id")
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or(Fault::Unauthorized)?;

    let role = headers
        .get("x-user-role")
        .and_then(|value| value.to_str().ok())
        .and_then(Role::parse)
        .ok_or(Fault::Unauthorized)?;

    Ok(Actor {
        user_id: UserId(user_id.to_string()),
        role,
    })
}
