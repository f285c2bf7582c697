use crate::limits::*;
use crate::model::*;

use super::EngineError;

/// Current wall-clock time in Unix milliseconds.
pub fn now_ms() -> Ms {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as Ms)
        .unwrap_or(0)
}

pub(crate) fn validate_span(span: &Span) -> Result<(), EngineError> {
    if span.start < MIN_VALID_TIMESTAMP_MS || span.end > MAX_VALID_TIMESTAMP_MS {
        return Err(EngineError::LimitExceeded("timestamp out of range"));
    }
    if span.duration_ms() > MAX_BOOKING_DURATION_MINUTES as Ms * MINUTE_MS {
        return Err(EngineError::LimitExceeded("booking too long"));
    }
    Ok(())
}

/// Active bookings colliding with `candidate` once the buffer is applied.
///
/// The buffer trails every booking: an existing booking occupies
/// `[start, end + buffer)`, and the candidate's own trailing buffer may not
/// run into a later booking either. Ending exactly where a buffered
/// occupancy ends is not a conflict.
fn colliding<'a>(
    ps: &'a ProviderState,
    candidate: &Span,
    buffer_minutes: u32,
) -> impl Iterator<Item = &'a Booking> + use<'a> {
    let buffer = buffer_minutes as Ms * MINUTE_MS;
    let candidate = *candidate;
    let candidate_occupied = candidate.expand(buffer_minutes);
    // Widen the search so bookings ending up to `buffer` before the candidate are seen.
    let search = Span::new(candidate.start - buffer, candidate_occupied.end);
    ps.overlapping(search).filter(move |b| {
        b.is_active()
            && (b.span.expand(buffer_minutes).overlaps(&candidate)
                || candidate_occupied.overlaps(&b.span))
    })
}

/// Active bookings colliding with `candidate`. The buffer trails both the
/// existing bookings and the candidate itself.
pub fn find_conflicts<'a>(
    ps: &'a ProviderState,
    candidate: &Span,
    buffer_minutes: u32,
) -> Vec<&'a Booking> {
    colliding(ps, candidate, buffer_minutes).collect()
}

/// Buffer applied both ways, as in [`find_conflicts`].
pub fn has_conflict(ps: &ProviderState, candidate: &Span, buffer_minutes: u32) -> bool {
    colliding(ps, candidate, buffer_minutes).next().is_some()
}

/// Conflict check with the provider's own buffer setting.
pub(crate) fn check_no_conflict(ps: &ProviderState, span: &Span) -> Result<(), EngineError> {
    let buffer = ps.settings.effective_buffer_minutes();
    let ids: Vec<_> = colliding(ps, span, buffer).map(|b| b.id).collect();
    if ids.is_empty() {
        Ok(())
    } else {
        Err(EngineError::Conflict(ids))
    }
}
