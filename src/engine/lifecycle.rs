//! Rules applied on the way into and through the booking lifecycle.

use std::sync::LazyLock;

use regex::Regex;

use crate::limits::*;
use crate::model::*;

use super::availability::windows_on;
use super::slots::generate_slots;
use super::EngineError;

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("static regex"));

pub(crate) fn validate_contact(
    contact: &Contact,
    requirements: Option<&str>,
) -> Result<(), EngineError> {
    let name = contact.name.trim();
    if name.is_empty() {
        return Err(EngineError::InvalidContact("name is required"));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(EngineError::InvalidContact("name too long"));
    }
    if contact.email.len() > MAX_EMAIL_LEN || !EMAIL_RE.is_match(&contact.email) {
        return Err(EngineError::InvalidContact("invalid email format"));
    }
    if let Some(phone) = &contact.phone
        && phone.len() > MAX_PHONE_LEN
    {
        return Err(EngineError::InvalidContact("phone too long"));
    }
    if requirements.is_some_and(|r| r.len() > MAX_REQUIREMENTS_LEN) {
        return Err(EngineError::LimitExceeded("requirements too long"));
    }
    Ok(())
}

pub(crate) fn validate_settings(settings: &ProviderSettings) -> Result<(), EngineError> {
    if settings.buffer_minutes > MAX_BUFFER_MINUTES {
        return Err(EngineError::LimitExceeded("buffer time too long"));
    }
    if settings.default_duration_minutes == 0
        || settings.default_duration_minutes > MAX_BOOKING_DURATION_MINUTES
    {
        return Err(EngineError::LimitExceeded("default duration out of range"));
    }
    if settings.min_notice_minutes.is_some_and(|m| m > MAX_NOTICE_MINUTES) {
        return Err(EngineError::LimitExceeded("minimum notice too long"));
    }
    if settings
        .max_advance_days
        .is_some_and(|d| d == 0 || d > MAX_ADVANCE_DAYS)
    {
        return Err(EngineError::LimitExceeded("maximum advance out of range"));
    }
    if settings.slot_step_minutes == Some(0) {
        return Err(EngineError::LimitExceeded("slot step must be positive"));
    }
    Ok(())
}

/// Earliest/latest start the provider accepts, relative to `now`.
pub(crate) fn check_booking_window(
    settings: &ProviderSettings,
    span: &Span,
    now: Ms,
) -> Result<(), EngineError> {
    let notice = settings.min_notice_minutes.unwrap_or(0) as Ms * MINUTE_MS;
    if span.start < now + notice {
        return Err(EngineError::OutsideBookingWindow("too soon"));
    }
    if let Some(days) = settings.max_advance_days
        && span.start > now + days as Ms * DAY_MS
    {
        return Err(EngineError::OutsideBookingWindow("too far ahead"));
    }
    Ok(())
}

/// The requested span must be bookable on the provider's calendar: inside a
/// window, and in strict mode exactly one of the generated slots.
pub(crate) fn check_slot(
    ps: &ProviderState,
    span: &Span,
    duration_minutes: u32,
    strict: bool,
) -> Result<(), EngineError> {
    let windows = windows_on(ps, date_of(span.start));
    let fits = if strict {
        let step = ps.settings.slot_step_minutes.unwrap_or(duration_minutes);
        generate_slots(&windows, duration_minutes, step).any(|slot| slot == *span)
    } else {
        windows.iter().any(|w| w.contains_span(span))
    };
    if fits {
        Ok(())
    } else {
        Err(EngineError::SlotNotAvailable(*span))
    }
}

pub(crate) fn check_transition(
    from: BookingStatus,
    to: BookingStatus,
) -> Result<(), EngineError> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(EngineError::InvalidTransition { from, to })
    }
}

/// Providers (and the system) confirm and complete; either party cancels.
pub(crate) fn authorize(
    booking: &Booking,
    to: BookingStatus,
    actor: Actor,
) -> Result<(), EngineError> {
    let is_provider = actor == Actor::Provider(booking.provider_id);
    let is_customer = matches!(actor, Actor::Customer(id) if booking.customer_id == Some(id));
    let allowed = match to {
        BookingStatus::Confirmed | BookingStatus::Completed => {
            is_provider || actor == Actor::System
        }
        BookingStatus::Cancelled => is_provider || is_customer || actor == Actor::System,
        BookingStatus::Pending => false,
    };
    if allowed {
        Ok(())
    } else {
        Err(EngineError::NotPermitted(match to {
            BookingStatus::Cancelled => "only the customer or provider may cancel",
            _ => "only the provider may change this booking's status",
        }))
    }
}
