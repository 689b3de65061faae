use hearth::marketplace::bookings::{Booking, BookingRepository, PropertyDirectory};
use hearth::marketplace::domain::{
    BookingId, NotificationId, PaymentId, Property, PropertyId, RepositoryError, UserId,
};
use hearth::marketplace::notifications::{Notification, NotificationRepository};
use hearth::marketplace::payments::{Payment, PaymentRepository};
use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryBookingRepository {
    records: Arc<Mutex<HashMap<BookingId, Booking>>>,
}

impl InMemoryBookingRepository {
    pub(crate) fn len(&self) -> usize {
        self.records.lock().expect("repository mutex poisoned").len()
    }
}

impl BookingRepository for InMemoryBookingRepository {
    fn insert(&self, booking: Booking) -> Result<Booking, RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        if guard.contains_key(&booking.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(booking.id.clone(), booking.clone());
        Ok(booking)
    }

    fn update(&self, booking: Booking) -> Result<(), RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        if guard.contains_key(&booking.id) {
            guard.insert(booking.id.clone(), booking);
            Ok(())
        } else {
            Err(RepositoryError::NotFound)
        }
    }

    fn fetch(&self, id: &BookingId) -> Result<Option<Booking>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard.get(id).cloned())
    }
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryPaymentRepository {
    records: Arc<Mutex<HashMap<PaymentId, Payment>>>,
}

impl InMemoryPaymentRepository {
    pub(crate) fn len(&self) -> usize {
        self.records.lock().expect("repository mutex poisoned").len()
    }
}

impl PaymentRepository for InMemoryPaymentRepository {
    fn insert(&self, payment: Payment) -> Result<Payment, RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        if guard.contains_key(&payment.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(payment.id.clone(), payment.clone());
        Ok(payment)
    }

    fn update(&self, payment: Payment) -> Result<(), RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        if guard.contains_key(&payment.id) {
            guard.insert(payment.id.clone(), payment);
            Ok(())
        } else {
            Err(RepositoryError::NotFound)
        }
    }

    fn fetch_by_gateway_id(&self, gateway_id: &str) -> Result<Option<Payment>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard
            .values()
            .find(|payment| payment.gateway_payment_id == gateway_id)
            .cloned())
    }

    fn fetch_by_booking(&self, booking: &BookingId) -> Result<Vec<Payment>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard
            .values()
            .filter(|payment| payment.booking_id == *booking)
            .cloned()
            .collect())
    }
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryNotificationRepository {
    records: Arc<Mutex<HashMap<NotificationId, Notification>>>,
}

impl InMemoryNotificationRepository {
    pub(crate) fn len(&self) -> usize {
        self.records.lock().expect("repository mutex poisoned").len()
    }
}

impl NotificationRepository for InMemoryNotificationRepository {
    fn insert(&self, notification: Notification) -> Result<Notification, RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        if guard.contains_key(&notification.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(notification.id.clone(), notification.clone());
        Ok(notification)
    }

    fn update(&self, notification: Notification) -> Result<(), RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        if guard.contains_key(&notification.id) {
            guard.insert(notification.id.clone(), notification);
            Ok(())
        } else {
            Err(RepositoryError::NotFound)
        }
    }

    fn fetch(&self, id: &NotificationId) -> Result<Option<Notification>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn delete(&self, id: &NotificationId) -> Result<(), RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        guard.remove(id).map(|_| ()).ok_or(RepositoryError::NotFound)
    }

    fn for_user(&self, user: &UserId) -> Result<Vec<Notification>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard
            .values()
            .filter(|notification| notification.user_id == *user)
            .cloned()
            .collect())
    }
}

/// Property listings backing the booking flow. Seeded with fixtures until the
/// listing service grows its own write path.
#[derive(Default, Clone)]
pub(crate) struct InMemoryPropertyDirectory {
    records: Arc<Mutex<HashMap<PropertyId, Property>>>,
}

impl InMemoryPropertyDirectory {
    pub(crate) fn with_fixtures() -> Self {
        let directory = Self::default();
        {
            let mut guard = directory.records.lock().expect("repository mutex poisoned");
            for property in fixture_properties() {
                guard.insert(property.id.clone(), property);
            }
        }
        directory
    }

    pub(crate) fn len(&self) -> usize {
        self.records.lock().expect("repository mutex poisoned").len()
    }
}

impl PropertyDirectory for InMemoryPropertyDirectory {
    fn fetch(&self, id: &PropertyId) -> Result<Option<Property>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard.get(id).cloned())
    }
}

fn fixture_properties() -> Vec<Property> {
    vec![
        Property {
            id: PropertyId("prop-000100".into()),
            owner: UserId("olive".into()),
            agent: Some(UserId("aria".into())),
            nightly_rate_cents: 12_000,
            active: true,
            amenities: vec!["wifi".into(), "parking".into(), "kitchen".into()],
            images: vec!["https://cdn.example.com/prop-000100/front.jpg".into()],
        },
        Property {
            id: PropertyId("prop-000200".into()),
            owner: UserId("omar".into()),
            agent: None,
            nightly_rate_cents: 25_500,
            active: true,
            amenities: vec!["wifi".into(), "pool".into()],
            images: Vec::new(),
        },
        Property {
            id: PropertyId("prop-000300".into()),
            owner: UserId("olive".into()),
            agent: None,
            nightly_rate_cents: 9_000,
            active: false,
            amenities: Vec::new(),
            images: Vec::new(),
        },
    ]
}
