use chrono::NaiveDate;
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;

use super::availability::windows_on;
use super::conflict::{self, now_ms};
use super::lifecycle::check_booking_window;
use super::slots::generate_slots;
use super::{Engine, EngineError};

impl Engine {
    pub async fn list_providers(&self) -> Vec<ProviderInfo> {
        let providers: Vec<_> = self.providers.iter().map(|e| e.value().clone()).collect();
        let mut infos = Vec::with_capacity(providers.len());
        for ps in providers {
            let guard = ps.read().await;
            infos.push(ProviderInfo {
                id: guard.id,
                name: guard.name.clone(),
                settings: guard.settings.clone(),
            });
        }
        infos
    }

    pub async fn provider(&self, id: Ulid) -> Result<ProviderInfo, EngineError> {
        let ps = self.get_provider(&id).ok_or(EngineError::NotFound(id))?;
        let guard = ps.read().await;
        Ok(ProviderInfo {
            id,
            name: guard.name.clone(),
            settings: guard.settings.clone(),
        })
    }

    pub async fn weekly_pattern(
        &self,
        provider_id: Ulid,
    ) -> Result<Vec<AvailabilityWindow>, EngineError> {
        let ps = self
            .get_provider(&provider_id)
            .ok_or(EngineError::NotFound(provider_id))?;
        let guard = ps.read().await;
        Ok(guard.weekly.clone())
    }

    pub async fn exceptions(
        &self,
        provider_id: Ulid,
    ) -> Result<Vec<(NaiveDate, DateException)>, EngineError> {
        let ps = self
            .get_provider(&provider_id)
            .ok_or(EngineError::NotFound(provider_id))?;
        let guard = ps.read().await;
        Ok(guard
            .exceptions
            .iter()
            .map(|(d, e)| (*d, e.clone()))
            .collect())
    }

    /// The provider's windows on `date`, exceptions applied.
    pub async fn windows_for(
        &self,
        provider_id: Ulid,
        date: NaiveDate,
    ) -> Result<Vec<Span>, EngineError> {
        let ps = self
            .get_provider(&provider_id)
            .ok_or(EngineError::NotFound(provider_id))?;
        let guard = ps.read().await;
        Ok(windows_on(&guard, date))
    }

    /// Every slot on `date`, flagged available when it passes the booking
    /// window and conflict checks. `step_minutes` falls back to the provider's
    /// slot step, then to the duration.
    pub async fn available_slots(
        &self,
        provider_id: Ulid,
        date: NaiveDate,
        duration_minutes: u32,
        step_minutes: Option<u32>,
    ) -> Result<Vec<SlotInfo>, EngineError> {
        self.available_slots_at(provider_id, date, duration_minutes, step_minutes, now_ms())
            .await
    }

    pub(super) async fn available_slots_at(
        &self,
        provider_id: Ulid,
        date: NaiveDate,
        duration_minutes: u32,
        step_minutes: Option<u32>,
        now: Ms,
    ) -> Result<Vec<SlotInfo>, EngineError> {
        if duration_minutes == 0 || duration_minutes > MAX_BOOKING_DURATION_MINUTES {
            return Err(EngineError::LimitExceeded("booking duration out of range"));
        }
        let ps = self
            .get_provider(&provider_id)
            .ok_or(EngineError::NotFound(provider_id))?;
        let guard = ps.read().await;
        let step = step_minutes
            .or(guard.settings.slot_step_minutes)
            .unwrap_or(duration_minutes);
        let buffer = guard.settings.effective_buffer_minutes();

        Ok(generate_slots(&windows_on(&guard, date), duration_minutes, step)
            .map(|span| SlotInfo {
                span,
                available: check_booking_window(&guard.settings, &span, now).is_ok()
                    && !conflict::has_conflict(&guard, &span, buffer),
            })
            .collect())
    }

    /// Whether `candidate` collides with any pending or confirmed booking.
    ///
    /// The buffer is applied on both sides: an existing booking occupies
    /// `[start, end + buffer)`, and the candidate's own `end + buffer` may not
    /// run into a later booking. This is the conflict check `create_booking`
    /// applies with the provider's effective buffer.
    pub async fn has_conflict(
        &self,
        provider_id: Ulid,
        candidate: Span,
        buffer_minutes: u32,
    ) -> Result<bool, EngineError> {
        check_query_span(&candidate, buffer_minutes)?;
        let ps = self
            .get_provider(&provider_id)
            .ok_or(EngineError::NotFound(provider_id))?;
        let guard = ps.read().await;
        Ok(conflict::has_conflict(&guard, &candidate, buffer_minutes))
    }

    /// The bookings behind a `has_conflict` hit, buffer applied both ways.
    pub async fn find_conflicts(
        &self,
        provider_id: Ulid,
        candidate: Span,
        buffer_minutes: u32,
    ) -> Result<Vec<Booking>, EngineError> {
        check_query_span(&candidate, buffer_minutes)?;
        let ps = self
            .get_provider(&provider_id)
            .ok_or(EngineError::NotFound(provider_id))?;
        let guard = ps.read().await;
        Ok(conflict::find_conflicts(&guard, &candidate, buffer_minutes)
            .into_iter()
            .cloned()
            .collect())
    }

    pub async fn get_booking(&self, id: Ulid) -> Option<Booking> {
        let provider_id = self.get_provider_for_booking(&id)?;
        let ps = self.get_provider(&provider_id)?;
        let guard = ps.read().await;
        guard.booking(&id).cloned()
    }

    /// A provider's bookings ordered by start, optionally only those starting
    /// within `range`.
    pub async fn bookings(
        &self,
        provider_id: Ulid,
        range: Option<Span>,
    ) -> Result<Vec<Booking>, EngineError> {
        if let Some(r) = range
            && r.duration_ms() > MAX_QUERY_WINDOW_MS
        {
            return Err(EngineError::LimitExceeded("query window too wide"));
        }
        let ps = self
            .get_provider(&provider_id)
            .ok_or(EngineError::NotFound(provider_id))?;
        let guard = ps.read().await;
        Ok(guard
            .bookings
            .iter()
            .filter(|b| range.is_none_or(|r| r.contains_instant(b.span.start)))
            .cloned()
            .collect())
    }

    /// Bookings matching every given criterion, across all providers, ordered
    /// by start. An empty filter matches nothing.
    pub async fn customer_bookings(&self, filter: &CustomerFilter) -> Vec<Booking> {
        if filter.customer_id.is_none() && filter.email.is_none() {
            return Vec::new();
        }
        let providers: Vec<_> = self.providers.iter().map(|e| e.value().clone()).collect();
        let mut found = Vec::new();
        for ps in providers {
            let guard = ps.read().await;
            found.extend(
                guard
                    .bookings
                    .iter()
                    .filter(|b| filter.customer_id.is_none_or(|c| b.customer_id == Some(c)))
                    .filter(|b| {
                        filter
                            .email
                            .as_deref()
                            .is_none_or(|e| b.contact.email.eq_ignore_ascii_case(e))
                    })
                    .cloned(),
            );
        }
        found.sort_by_key(|b| b.span.start);
        found
    }
}

/// Caller-built spans go through the same bounds as bookings before any
/// buffer arithmetic.
fn check_query_span(candidate: &Span, buffer_minutes: u32) -> Result<(), EngineError> {
    if candidate.start >= candidate.end {
        return Err(InvalidInterval {
            start: candidate.start,
            end: candidate.end,
        }
        .into());
    }
    if candidate.start < MIN_VALID_TIMESTAMP_MS || candidate.end > MAX_VALID_TIMESTAMP_MS {
        return Err(EngineError::LimitExceeded("timestamp out of range"));
    }
    if buffer_minutes > MAX_BUFFER_MINUTES {
        return Err(EngineError::LimitExceeded("buffer time too long"));
    }
    Ok(())
}
