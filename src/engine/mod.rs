mod availability;
mod conflict;
mod error;
mod journal;
mod lifecycle;
mod mutations;
mod queries;
mod slots;

pub use availability::{
    merge_overlapping, subtract_intervals, validate_blocked_ranges, validate_day_ranges,
    windows_on, DayPlan,
};
pub use conflict::{find_conflicts, has_conflict, now_ms};
pub use error::EngineError;
pub use journal::{EventLog, GroupCommitLog};
pub use slots::{generate_slots, Slots};

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::RwLock;
use tracing::{info, warn};
use ulid::Ulid;

use crate::config::Config;
use crate::model::*;
use crate::notify::{BookingNotice, NoticeKind, NotifyHub};
use crate::wal::Wal;

pub type SharedProviderState = Arc<RwLock<ProviderState>>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineOptions {
    /// Requested bookings must match a generated slot exactly, not merely
    /// fit inside an availability window.
    pub strict_slots: bool,
}

pub struct Engine {
    pub(super) providers: DashMap<Ulid, SharedProviderState>,
    /// Reverse lookup: booking id → provider id.
    pub(super) booking_index: DashMap<Ulid, Ulid>,
    pub(super) log: Arc<dyn EventLog>,
    pub notify: Arc<NotifyHub>,
    pub(super) options: EngineOptions,
    /// Writers hold this shared; compaction holds it exclusively so no append
    /// can land between its snapshot and the file swap.
    pub(super) write_gate: RwLock<()>,
}

/// Apply an event to a provider (caller holds the lock).
/// Re-applying a `BookingCreated` is a no-op, so a record duplicated by a
/// retried append replays cleanly.
fn apply_to_provider(ps: &mut ProviderState, event: &Event, index: &DashMap<Ulid, Ulid>) {
    match event {
        Event::ProviderUpdated { name, settings, .. } => {
            ps.name = name.clone();
            ps.settings = settings.clone();
        }
        Event::WeeklyPatternSet { windows, .. } => {
            ps.weekly = windows.clone();
        }
        Event::ExceptionSet { date, exception, .. } => {
            ps.exceptions.insert(*date, exception.clone());
        }
        Event::ExceptionCleared { date, .. } => {
            ps.exceptions.remove(date);
        }
        Event::BookingCreated { booking } => {
            if index.contains_key(&booking.id) {
                return;
            }
            index.insert(booking.id, ps.id);
            ps.insert_booking(booking.clone());
        }
        Event::BookingStatusChanged { id, status, at, .. } => {
            if let Some(b) = ps.booking_mut(id) {
                b.status = *status;
                b.updated_at = *at;
            }
        }
        // handled at the DashMap level
        Event::ProviderCreated { .. } => {}
    }
}

impl Engine {
    /// Open the journal at `wal_path`, replay it, and start the group-commit writer.
    pub fn new(
        wal_path: PathBuf,
        notify: Arc<NotifyHub>,
        options: EngineOptions,
    ) -> io::Result<Self> {
        let history = Wal::replay(&wal_path)?;
        let log = Arc::new(GroupCommitLog::open(&wal_path)?);
        Ok(Self::with_log(log, history, notify, options))
    }

    pub fn open(config: &Config) -> io::Result<Self> {
        std::fs::create_dir_all(&config.data_dir)?;
        let options = EngineOptions {
            strict_slots: config.strict_slots,
        };
        Self::new(config.journal_path(), Arc::new(NotifyHub::new()), options)
    }

    /// Build state from `history` and persist further changes through `log`.
    pub fn with_log(
        log: Arc<dyn EventLog>,
        history: Vec<Event>,
        notify: Arc<NotifyHub>,
        options: EngineOptions,
    ) -> Self {
        let engine = Self {
            providers: DashMap::new(),
            booking_index: DashMap::new(),
            log,
            notify,
            options,
            write_gate: RwLock::new(()),
        };

        // We are the only owner of these Arcs, so try_write cannot contend.
        // Never block here: this may run inside an async context.
        for event in &history {
            match event {
                Event::ProviderCreated { id, name, settings } => {
                    let ps = ProviderState::new(*id, name.clone(), settings.clone());
                    engine.providers.insert(*id, Arc::new(RwLock::new(ps)));
                }
                other => {
                    let Some(entry) = engine.providers.get(&other.provider_id()) else {
                        warn!("replay: event for unknown provider {}", other.provider_id());
                        continue;
                    };
                    let ps = entry.value().clone();
                    drop(entry);
                    let mut guard = ps.try_write().expect("replay: uncontended write");
                    apply_to_provider(&mut guard, other, &engine.booking_index);
                }
            }
        }
        if !history.is_empty() {
            info!(
                "replayed {} events: {} providers, {} bookings",
                history.len(),
                engine.providers.len(),
                engine.booking_index.len()
            );
        }

        engine
    }

    pub fn get_provider(&self, id: &Ulid) -> Option<SharedProviderState> {
        self.providers.get(id).map(|e| e.value().clone())
    }

    pub fn get_provider_for_booking(&self, booking_id: &Ulid) -> Option<Ulid> {
        self.booking_index.get(booking_id).map(|e| *e.value())
    }

    /// Append + apply for configuration writes (providers, patterns, exceptions).
    pub(super) async fn persist_and_apply(
        &self,
        ps: &mut ProviderState,
        event: &Event,
    ) -> Result<(), EngineError> {
        self.log
            .append(event)
            .await
            .map_err(|e| EngineError::Storage(e.to_string()))?;
        apply_to_provider(ps, event, &self.booking_index);
        Ok(())
    }

    /// Append + apply + notify for booking writes. A failed append is retried
    /// once under the same lock before the request is failed.
    pub(super) async fn commit_booking_event(
        &self,
        ps: &mut ProviderState,
        event: &Event,
        booking_id: Ulid,
    ) -> Result<Booking, EngineError> {
        if let Err(first) = self.log.append(event).await {
            warn!("journal append for booking {booking_id} failed, retrying: {first}");
            metrics::counter!(crate::observability::PERSIST_RETRIES_TOTAL).increment(1);
            self.log
                .append(event)
                .await
                .map_err(|e| EngineError::BookingFailed(e.to_string()))?;
        }
        apply_to_provider(ps, event, &self.booking_index);

        let booking = ps
            .booking(&booking_id)
            .cloned()
            .ok_or(EngineError::NotFound(booking_id))?;
        self.notify.send(BookingNotice {
            kind: NoticeKind::for_status(booking.status),
            booking: booking.clone(),
        });
        Ok(booking)
    }

    /// Resolve booking → provider and take the provider's write lock.
    pub(super) async fn resolve_booking_write(
        &self,
        booking_id: &Ulid,
    ) -> Result<tokio::sync::OwnedRwLockWriteGuard<ProviderState>, EngineError> {
        let provider_id = self
            .get_provider_for_booking(booking_id)
            .ok_or(EngineError::NotFound(*booking_id))?;
        let ps = self
            .get_provider(&provider_id)
            .ok_or(EngineError::NotFound(provider_id))?;
        Ok(ps.write_owned().await)
    }
}
