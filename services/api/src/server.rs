use crate::cli::ServeArgs;
use crate::infra::{
    AppState, InMemoryBookingRepository, InMemoryNotificationRepository, InMemoryPaymentRepository,
    InMemoryPropertyDirectory,
};
use crate::routes::{debug_routes, marketplace_routes, DebugState};
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use chrono::Duration;
use hearth::config::{AppConfig, AppEnvironment};
use hearth::error::AppError;
use hearth::marketplace::access::RolePolicy;
use hearth::marketplace::audit::MemoryAuditSink;
use hearth::marketplace::bookings::BookingService;
use hearth::marketplace::notifications::NotificationService;
use hearth::marketplace::payments::{PaymentGateway, WebhookVerifier};
use hearth::marketplace::tokens::ExpiringTokenStore;
use hearth::telemetry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let bookings = InMemoryBookingRepository::default();
    let payments = InMemoryPaymentRepository::default();
    let notifications = InMemoryNotificationRepository::default();
    let properties = InMemoryPropertyDirectory::with_fixtures();

    let policy = Arc::new(RolePolicy);
    let audit = Arc::new(MemoryAuditSink::default());
    let tokens = Arc::new(ExpiringTokenStore::new(Duration::minutes(
        config.marketplace.reset_token_ttl_minutes,
    )));

    let notification_service = Arc::new(NotificationService::new(
        Arc::new(notifications.clone()),
        policy.clone(),
    ));
    let booking_service = Arc::new(BookingService::new(
        Arc::new(bookings.clone()),
        Arc::new(properties.clone()),
        notification_service.clone(),
        audit,
        policy,
        config.marketplace.base_url.clone(),
    ));
    let payment_gateway = Arc::new(PaymentGateway::new(
        Arc::new(payments.clone()),
        Arc::new(bookings.clone()),
        notification_service.clone(),
        WebhookVerifier::new(config.marketplace.webhook_secret.clone()),
    ));

    let mut app = marketplace_routes(booking_service, payment_gateway, notification_service);
    if config.environment == AppEnvironment::Development {
        app = app.merge(debug_routes(DebugState {
            bookings,
            payments,
            notifications,
            properties,
            tokens,
        }));
    }
    let app = app.layer(Extension(app_state)).layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "marketplace api ready");

    axum::serve(listener, app).await?;
    Ok(())
}
