use std::net::SocketAddr;

// ── Booking flow ────────────────────────────────────────────────

/// Counter: bookings created.
pub const BOOKINGS_CREATED_TOTAL: &str = "homebook_bookings_created_total";

/// Counter: booking requests rejected for overlapping existing bookings.
pub const BOOKING_CONFLICTS_TOTAL: &str = "homebook_booking_conflicts_total";

/// Counter: status transitions. Labels: to.
pub const TRANSITIONS_TOTAL: &str = "homebook_transitions_total";

/// Counter: booking journal appends retried after a failure.
pub const PERSIST_RETRIES_TOTAL: &str = "homebook_persist_retries_total";

/// Counter: notices that could not be delivered.
pub const NOTIFICATIONS_FAILED_TOTAL: &str = "homebook_notifications_failed_total";

// ── Journal ─────────────────────────────────────────────────────

/// Histogram: group-commit flush duration in seconds.
pub const JOURNAL_FLUSH_DURATION_SECONDS: &str = "homebook_journal_flush_duration_seconds";

/// Histogram: records per group-commit flush.
pub const JOURNAL_FLUSH_BATCH_SIZE: &str = "homebook_journal_flush_batch_size";

/// Install the fmt subscriber. Safe to call more than once.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt().try_init();
}

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), metrics_exporter_prometheus::BuildError> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}
