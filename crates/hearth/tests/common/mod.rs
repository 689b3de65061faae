#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use hearth::marketplace::access::RolePolicy;
use hearth::marketplace::audit::MemoryAuditSink;
use hearth::marketplace::bookings::{
    Booking, BookingRepository, BookingRequest, BookingService, PropertyDirectory,
};
use hearth::marketplace::domain::{
    Actor, BookingId, NotificationId, PaymentId, Property, PropertyId, RepositoryError, Role,
    UserId,
};
use hearth::marketplace::notifications::{
    Notification, NotificationRepository, NotificationService,
};
use hearth::marketplace::payments::{
    Payment, PaymentGateway, PaymentRepository, WebhookVerifier,
};
use chrono::NaiveDate;

pub const WEBHOOK_SECRET: &str = "test-secret";
pub const FIXTURE_PROPERTY: &str = "prop-000100";
pub const NIGHTLY_RATE_CENTS: u64 = 12_000;

#[derive(Default, Clone)]
pub struct MemoryBookings {
    records: Arc<Mutex<HashMap<BookingId, Booking>>>,
}

impl BookingRepository for MemoryBookings {
    fn insert(&self, booking: Booking) -> Result<Booking, RepositoryError> {
        let mut guard = self.records.lock().expect("lock");
        if guard.contains_key(&booking.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(booking.id.clone(), booking.clone());
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
pub struct MemoryPayments {
    records: Arc<Mutex<HashMap<PaymentId, Payment>>>,
}

impl MemoryPayments {
    pub fn all(&self) -> Vec<Payment> {
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

    fn fetch_by_gateway_id(&self, gateway_id: &str) -> Result<Option<Payment>, RepositoryError> {
        Ok(self
            .records
            .lock()
            .expect("lock")
            .values()
            .find(|payment| payment.gateway_payment_id == gateway_id)
            .cloned())
    }

    fn fetch_by_booking(&self, booking: &BookingId) -> Result<Vec<Payment>, RepositoryError> {
        Ok(self
            .records
            .lock()
            .expect("lock")
            .values()
            .filter(|payment| payment.booking_id == *booking)
            .cloned()
            .collect())
    }
}

#[derive(Default, Clone)]
pub struct MemoryNotifications {
    records: Arc<Mutex<HashMap<NotificationId, Notification>>>,
}

impl MemoryNotifications {
    pub fn all(&self) -> Vec<Notification> {
        self.records.lock().expect("lock").values().cloned().collect()
    }
}

impl NotificationRepository for MemoryNotifications {
    fn insert(&self, notification: Notification) -> Result<Notification, RepositoryError> {
        let mut guard = self.records.lock().expect("lock");
        if guard.contains_key(&notification.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(notification.id.clone(), notification.clone());
        Ok(notification)
    }

    fn update(&self, notification: Notification) -> Result<(), RepositoryError> {
        let mut guard = self.records.lock().expect("lock");
        if guard.contains_key(&notification.id) {
            guard.insert(notification.id.clone(), notification);
            Ok(())
        } else {
            Err(RepositoryError::NotFound)
        }
    }

    fn fetch(&self, id: &NotificationId) -> Result<Option<Notification>, RepositoryError> {
        Ok(self.records.lock().expect("lock").get(id).cloned())
    }

    fn delete(&self, id: &NotificationId) -> Result<(), RepositoryError> {
        self.records
            .lock()
            .expect("lock")
            .remove(id)
            .map(|_| ())
            .ok_or(RepositoryError::NotFound)
    }

    fn for_user(&self, user: &UserId) -> Result<Vec<Notification>, RepositoryError> {
        Ok(self
            .records
            .lock()
            .expect("lock")
            .values()
            .filter(|notification| notification.user_id == *user)
            .cloned()
            .collect())
    }
}

#[derive(Clone)]
pub struct FixtureProperties {
    records: Arc<Mutex<HashMap<PropertyId, Property>>>,
}

impl Default for FixtureProperties {
    fn default() -> Self {
        let mut records = HashMap::new();
        let property = Property {
            id: PropertyId(FIXTURE_PROPERTY.into()),
            owner: UserId("olive".into()),
            agent: Some(UserId("aria".into())),
            nightly_rate_cents: NIGHTLY_RATE_CENTS,
            active: true,
            amenities: vec!["wifi".into()],
            images: Vec::new(),
        };
        records.insert(property.id.clone(), property);
        Self {
            records: Arc::new(Mutex::new(records)),
        }
    }
}

impl PropertyDirectory for FixtureProperties {
    fn fetch(&self, id: &PropertyId) -> Result<Option<Property>, RepositoryError> {
        Ok(self.records.lock().expect("lock").get(id).cloned())
    }
}

/// Everything wired together the way the API service wires it, with the
/// in-memory backends kept reachable for assertions.
pub struct World {
    pub bookings: MemoryBookings,
    pub payments: MemoryPayments,
    pub notifications: MemoryNotifications,
    pub audit: MemoryAuditSink,
    pub booking_service: Arc<BookingService>,
    pub payment_gateway: Arc<PaymentGateway>,
    pub notification_service: Arc<NotificationService>,
}

impl World {
    pub fn new() -> Self {
        let bookings = MemoryBookings::default();
        let payments = MemoryPayments::default();
        let notifications = MemoryNotifications::default();
        let audit = MemoryAuditSink::default();
        let policy = Arc::new(RolePolicy);

        let notification_service = Arc::new(NotificationService::new(
            Arc::new(notifications.clone()),
            policy.clone(),
        ));
        let booking_service = Arc::new(BookingService::new(
            Arc::new(bookings.clone()),
            Arc::new(FixtureProperties::default()),
            notification_service.clone(),
            Arc::new(audit.clone()),
            policy,
            "http://localhost:3000",
        ));
        let payment_gateway = Arc::new(PaymentGateway::new(
            Arc::new(payments.clone()),
            Arc::new(bookings.clone()),
            notification_service.clone(),
            WebhookVerifier::new(WEBHOOK_SECRET),
        ));

        Self {
            bookings,
            payments,
            notifications,
            audit,
            booking_service,
            payment_gateway,
            notification_service,
        }
    }
}

pub fn actor(user: &str, role: Role) -> Actor {
    Actor {
        user_id: UserId(user.into()),
        role,
    }
}

pub fn guest() -> Actor {
    actor("sam", Role::Guest)
}

pub fn owner() -> Actor {
    actor("olive", Role::Owner)
}

pub fn booking_request() -> BookingRequest {
    BookingRequest {
        property_id: PropertyId(FIXTURE_PROPERTY.into()),
        start_date: NaiveDate::from_ymd_opt(2030, 6, 1).expect("valid date"),
        end_date: NaiveDate::from_ymd_opt(2030, 6, 4).expect("valid date"),
        guest_count: 2,
        guest_name: "Sam Guest".into(),
        guest_email: "sam@example.com".into(),
    }
}
