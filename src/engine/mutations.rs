use std::sync::Arc;

use chrono::NaiveDate;
use tokio::sync::RwLock;
use tracing::{debug, info};
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;

use super::availability::{validate_blocked_ranges, validate_day_ranges, validate_weekly};
use super::conflict::{check_no_conflict, now_ms, validate_span};
use super::lifecycle::{
    authorize, check_booking_window, check_slot, check_transition, validate_contact,
    validate_settings,
};
use super::{Engine, EngineError};

impl Engine {
    pub async fn create_provider(
        &self,
        id: Ulid,
        name: Option<String>,
        settings: ProviderSettings,
    ) -> Result<(), EngineError> {
        if self.providers.len() >= MAX_PROVIDERS {
            return Err(EngineError::LimitExceeded("too many providers"));
        }
        if let Some(ref n) = name
            && n.len() > MAX_NAME_LEN
        {
            return Err(EngineError::LimitExceeded("provider name too long"));
        }
        validate_settings(&settings)?;

        // Exclusive: the existence check and insert must not interleave with
        // another create of the same id.
        let _gate = self.write_gate.write().await;
        if self.providers.contains_key(&id) {
            return Err(EngineError::AlreadyExists(id));
        }
        let event = Event::ProviderCreated {
            id,
            name: name.clone(),
            settings: settings.clone(),
        };
        self.log
            .append(&event)
            .await
            .map_err(|e| EngineError::Storage(e.to_string()))?;
        self.providers
            .insert(id, Arc::new(RwLock::new(ProviderState::new(id, name, settings))));
        info!("provider {id} created");
        Ok(())
    }

    pub async fn update_provider(
        &self,
        id: Ulid,
        name: Option<String>,
        settings: ProviderSettings,
    ) -> Result<(), EngineError> {
        if let Some(ref n) = name
            && n.len() > MAX_NAME_LEN
        {
            return Err(EngineError::LimitExceeded("provider name too long"));
        }
        validate_settings(&settings)?;
        let ps = self.get_provider(&id).ok_or(EngineError::NotFound(id))?;
        let _gate = self.write_gate.read().await;
        let mut guard = ps.write().await;
        let event = Event::ProviderUpdated { id, name, settings };
        self.persist_and_apply(&mut guard, &event).await
    }

    /// Replace the provider's whole weekly pattern. Returns what was stored
    /// (enabled windows only, sorted).
    pub async fn set_weekly_pattern(
        &self,
        provider_id: Ulid,
        windows: Vec<AvailabilityWindow>,
    ) -> Result<Vec<AvailabilityWindow>, EngineError> {
        let windows = validate_weekly(&windows)?;
        let ps = self
            .get_provider(&provider_id)
            .ok_or(EngineError::NotFound(provider_id))?;
        let _gate = self.write_gate.read().await;
        let mut guard = ps.write().await;
        let event = Event::WeeklyPatternSet {
            provider_id,
            windows: windows.clone(),
        };
        self.persist_and_apply(&mut guard, &event).await?;
        info!("provider {provider_id}: weekly pattern set ({} windows)", windows.len());
        Ok(windows)
    }

    /// Override the weekly pattern on one date. Replaces any earlier
    /// exception for that date.
    pub async fn set_exception(
        &self,
        provider_id: Ulid,
        date: NaiveDate,
        exception: DateException,
    ) -> Result<(), EngineError> {
        let exception = match exception {
            DateException::Closed => DateException::Closed,
            DateException::Blocked(r) => {
                DateException::Blocked(validate_blocked_ranges(day_of_week(date), &r)?)
            }
            DateException::Hours(r) => {
                DateException::Hours(validate_day_ranges(day_of_week(date), &r)?)
            }
        };
        let ps = self
            .get_provider(&provider_id)
            .ok_or(EngineError::NotFound(provider_id))?;
        let _gate = self.write_gate.read().await;
        let mut guard = ps.write().await;
        if !guard.exceptions.contains_key(&date)
            && guard.exceptions.len() >= MAX_EXCEPTIONS_PER_PROVIDER
        {
            return Err(EngineError::LimitExceeded("too many exceptions"));
        }
        let event = Event::ExceptionSet {
            provider_id,
            date,
            exception,
        };
        self.persist_and_apply(&mut guard, &event).await
    }

    /// Returns false if there was no exception on that date.
    pub async fn clear_exception(
        &self,
        provider_id: Ulid,
        date: NaiveDate,
    ) -> Result<bool, EngineError> {
        let ps = self
            .get_provider(&provider_id)
            .ok_or(EngineError::NotFound(provider_id))?;
        let _gate = self.write_gate.read().await;
        let mut guard = ps.write().await;
        if !guard.exceptions.contains_key(&date) {
            return Ok(false);
        }
        let event = Event::ExceptionCleared { provider_id, date };
        self.persist_and_apply(&mut guard, &event).await?;
        Ok(true)
    }

    pub async fn create_booking(&self, request: BookingRequest) -> Result<Booking, EngineError> {
        self.create_booking_at(request, now_ms()).await
    }

    /// Validate and insert a `pending` booking. Everything from the conflict
    /// check to the journal append runs under the provider's write lock.
    pub(crate) async fn create_booking_at(
        &self,
        request: BookingRequest,
        now: Ms,
    ) -> Result<Booking, EngineError> {
        validate_contact(&request.contact, request.requirements.as_deref())?;
        let provider_id = request.provider_id;
        let ps = self
            .get_provider(&provider_id)
            .ok_or(EngineError::NotFound(provider_id))?;
        let _gate = self.write_gate.read().await;
        let mut guard = ps.write().await;

        if self.booking_index.contains_key(&request.id) {
            return Err(EngineError::AlreadyExists(request.id));
        }
        if guard.bookings.len() >= MAX_BOOKINGS_PER_PROVIDER {
            return Err(EngineError::LimitExceeded("too many bookings on provider"));
        }

        let duration = request
            .duration_minutes
            .unwrap_or(guard.settings.default_duration_minutes);
        if duration == 0 || duration > MAX_BOOKING_DURATION_MINUTES {
            return Err(EngineError::LimitExceeded("booking duration out of range"));
        }
        let end = request
            .start
            .checked_add(duration as Ms * MINUTE_MS)
            .ok_or(EngineError::LimitExceeded("timestamp out of range"))?;
        let span = Span::try_new(request.start, end)?;
        validate_span(&span)?;
        check_booking_window(&guard.settings, &span, now)?;
        check_slot(&guard, &span, duration, self.options.strict_slots)?;
        if let Err(e) = check_no_conflict(&guard, &span) {
            metrics::counter!(crate::observability::BOOKING_CONFLICTS_TOTAL).increment(1);
            debug!("booking request {} rejected: {e}", request.id);
            return Err(e);
        }

        let booking = Booking {
            id: request.id,
            provider_id,
            service_id: request.service_id,
            customer_id: request.customer_id,
            contact: request.contact,
            requirements: request.requirements,
            span,
            status: BookingStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        let event = Event::BookingCreated { booking };
        let booking = self
            .commit_booking_event(&mut guard, &event, request.id)
            .await?;
        metrics::counter!(crate::observability::BOOKINGS_CREATED_TOTAL).increment(1);
        info!(
            "booking {} created for provider {provider_id} [{}, {})",
            booking.id, booking.span.start, booking.span.end
        );
        Ok(booking)
    }

    pub async fn transition(
        &self,
        booking_id: Ulid,
        to: BookingStatus,
        actor: Actor,
    ) -> Result<Booking, EngineError> {
        self.transition_at(booking_id, to, actor, now_ms()).await
    }

    pub(crate) async fn transition_at(
        &self,
        booking_id: Ulid,
        to: BookingStatus,
        actor: Actor,
        now: Ms,
    ) -> Result<Booking, EngineError> {
        let _gate = self.write_gate.read().await;
        let mut guard = self.resolve_booking_write(&booking_id).await?;
        let booking = guard
            .booking(&booking_id)
            .ok_or(EngineError::NotFound(booking_id))?;
        let from = booking.status;
        check_transition(from, to)?;
        authorize(booking, to, actor)?;

        let event = Event::BookingStatusChanged {
            id: booking_id,
            provider_id: guard.id,
            status: to,
            at: now,
        };
        let booking = self
            .commit_booking_event(&mut guard, &event, booking_id)
            .await?;
        metrics::counter!(crate::observability::TRANSITIONS_TOTAL, "to" => to.as_str())
            .increment(1);
        info!("booking {booking_id}: {from} -> {to} by {actor:?}");
        Ok(booking)
    }

    /// Confirmed bookings that have ended by `now`.
    pub async fn collect_finished_bookings(&self, now: Ms) -> Vec<Ulid> {
        let providers: Vec<_> = self.providers.iter().map(|e| e.value().clone()).collect();
        let mut finished = Vec::new();
        for ps in providers {
            let guard = ps.read().await;
            finished.extend(
                guard
                    .bookings
                    .iter()
                    .filter(|b| b.status == BookingStatus::Confirmed && b.span.end <= now)
                    .map(|b| b.id),
            );
        }
        finished
    }

    /// Move every finished confirmed booking to `completed` on behalf of the
    /// system. Returns the ids that were completed.
    pub async fn complete_finished(&self, now: Ms) -> Vec<Ulid> {
        let mut completed = Vec::new();
        for id in self.collect_finished_bookings(now).await {
            match self
                .transition_at(id, BookingStatus::Completed, Actor::System, now)
                .await
            {
                Ok(_) => completed.push(id),
                // may have been cancelled in between
                Err(e) => debug!("auto-complete skip {id}: {e}"),
            }
        }
        completed
    }

    /// Rewrite the journal with only the events needed to recreate the current state.
    pub async fn compact(&self) -> Result<(), EngineError> {
        let _gate = self.write_gate.write().await;
        let providers: Vec<_> = self.providers.iter().map(|e| e.value().clone()).collect();
        let mut events = Vec::new();
        for ps in providers {
            let guard = ps.read().await;
            events.push(Event::ProviderCreated {
                id: guard.id,
                name: guard.name.clone(),
                settings: guard.settings.clone(),
            });
            if !guard.weekly.is_empty() {
                events.push(Event::WeeklyPatternSet {
                    provider_id: guard.id,
                    windows: guard.weekly.clone(),
                });
            }
            for (date, exception) in &guard.exceptions {
                events.push(Event::ExceptionSet {
                    provider_id: guard.id,
                    date: *date,
                    exception: exception.clone(),
                });
            }
            for booking in &guard.bookings {
                events.push(Event::BookingCreated {
                    booking: booking.clone(),
                });
            }
        }
        let count = events.len();
        self.log
            .compact(events)
            .await
            .map_err(|e| EngineError::Storage(e.to_string()))?;
        info!("journal compacted to {count} events");
        Ok(())
    }

    pub async fn journal_appends_since_compact(&self) -> u64 {
        self.log.appends_since_compact().await
    }
}
