use std::net::SocketAddr;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: capacity validations performed.
pub const VALIDATIONS_TOTAL: &str = "gatehouse_validations_total";

/// Histogram: validation latency in seconds.
pub const VALIDATION_DURATION_SECONDS: &str = "gatehouse_validation_duration_seconds";

/// Counter: VIP overrides applied to otherwise-full requests.
pub const VIP_OVERRIDES_TOTAL: &str = "gatehouse_vip_overrides_total";

/// Counter: alternative-slot scans started.
pub const ALTERNATIVE_SCANS_TOTAL: &str = "gatehouse_alternative_scans_total";

/// Counter: scan days skipped after a provider failure.
pub const ALTERNATIVE_DAYS_SKIPPED_TOTAL: &str = "gatehouse_alternative_days_skipped_total";

// ── Booking lifecycle ───────────────────────────────────────────

/// Counter: bookings confirmed.
pub const BOOKINGS_CONFIRMED_TOTAL: &str = "gatehouse_bookings_confirmed_total";

/// Counter: bookings rejected for insufficient slot capacity.
pub const BOOKINGS_REJECTED_TOTAL: &str = "gatehouse_bookings_rejected_total";

/// Counter: bookings cancelled.
pub const BOOKINGS_CANCELLED_TOTAL: &str = "gatehouse_bookings_cancelled_total";

/// Histogram: book_slot latency in seconds.
pub const BOOKING_DURATION_SECONDS: &str = "gatehouse_booking_duration_seconds";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) {
    let Some(port) = port else { return };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .expect("failed to install Prometheus metrics exporter");
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
}
