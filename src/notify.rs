use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use ulid::Ulid;

use crate::model::{Booking, BookingStatus};

const CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeKind {
    Created,
    Confirmed,
    Cancelled,
    Completed,
}

impl NoticeKind {
    pub fn for_status(status: BookingStatus) -> Self {
        match status {
            BookingStatus::Pending => NoticeKind::Created,
            BookingStatus::Confirmed => NoticeKind::Confirmed,
            BookingStatus::Cancelled => NoticeKind::Cancelled,
            BookingStatus::Completed => NoticeKind::Completed,
        }
    }
}

/// A booking lifecycle event, carrying the booking as it is after the change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookingNotice {
    pub kind: NoticeKind,
    pub booking: Booking,
}

/// Broadcast hub for booking notices, per provider and for everything.
pub struct NotifyHub {
    channels: DashMap<Ulid, broadcast::Sender<BookingNotice>>,
    all: broadcast::Sender<BookingNotice>,
}

impl Default for NotifyHub {
    fn default() -> Self {
        Self::new()
    }
}

impl NotifyHub {
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
            all: broadcast::channel(CHANNEL_CAPACITY).0,
        }
    }

    /// Subscribe to one provider's notices. Creates the channel if needed.
    pub fn subscribe(&self, provider_id: Ulid) -> broadcast::Receiver<BookingNotice> {
        self.channels
            .entry(provider_id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    pub fn subscribe_all(&self) -> broadcast::Receiver<BookingNotice> {
        self.all.subscribe()
    }

    /// No-op if nobody is listening.
    pub fn send(&self, notice: BookingNotice) {
        if let Some(sender) = self.channels.get(&notice.booking.provider_id) {
            let _ = sender.send(notice.clone());
        }
        let _ = self.all.send(notice);
    }

    pub fn remove(&self, provider_id: &Ulid) {
        self.channels.remove(provider_id);
    }
}

#[derive(Debug, thiserror::Error)]
#[error("notification delivery failed: {0}")]
pub struct NotifyError(pub String);

/// Outbound delivery (email and the like) for booking notices.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn deliver(&self, notice: &BookingNotice) -> Result<(), NotifyError>;
}

/// Writes each notice to the log as JSON. Stands in when no mailer is wired up.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn deliver(&self, notice: &BookingNotice) -> Result<(), NotifyError> {
        let body = serde_json::to_string(notice).map_err(|e| NotifyError(e.to_string()))?;
        info!(target: "homebook::notice", "{body}");
        Ok(())
    }
}

/// Forward every notice on the hub to `notifier`. Failures are logged and
/// counted; the booking they describe is already committed.
pub async fn run_dispatcher(hub: Arc<NotifyHub>, notifier: Arc<dyn Notifier>) {
    let mut rx = hub.subscribe_all();
    loop {
        match rx.recv().await {
            Ok(notice) => {
                if let Err(e) = notifier.deliver(&notice).await {
                    warn!("notice {:?} for booking {}: {e}", notice.kind, notice.booking.id);
                    metrics::counter!(crate::observability::NOTIFICATIONS_FAILED_TOTAL)
                        .increment(1);
                }
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!("notification dispatcher lagged, {n} notices dropped");
                metrics::counter!(crate::observability::NOTIFICATIONS_FAILED_TOTAL).increment(n);
            }
            Err(broadcast::error::RecvError::Closed) => {
                debug!("notification hub closed, dispatcher exiting");
                break;
            }
        }
    }
}
