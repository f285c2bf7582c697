use ulid::Ulid;

use crate::model::{BookingStatus, InvalidInterval, Span, TimeRange};

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("not found: {0}")]
    NotFound(Ulid),
    #[error("already exists: {0}")]
    AlreadyExists(Ulid),
    #[error(transparent)]
    InvalidInterval(#[from] InvalidInterval),
    #[error("invalid window on day {day_of_week}: {start}..{end}")]
    InvalidWindow { day_of_week: u8, start: u16, end: u16 },
    #[error("windows overlap on day {day_of_week}: {first:?} and {second:?}")]
    OverlappingWindows {
        day_of_week: u8,
        first: TimeRange,
        second: TimeRange,
    },
    #[error("requested time [{}, {}) is not an available slot", .0.start, .0.end)]
    SlotNotAvailable(Span),
    #[error("outside booking window: {0}")]
    OutsideBookingWindow(&'static str),
    #[error("conflict with bookings: {0:?}")]
    Conflict(Vec<Ulid>),
    #[error("invalid status transition: {from} -> {to}")]
    InvalidTransition { from: BookingStatus, to: BookingStatus },
    #[error("not permitted: {0}")]
    NotPermitted(&'static str),
    #[error("invalid contact: {0}")]
    InvalidContact(&'static str),
    #[error("limit exceeded: {0}")]
    LimitExceeded(&'static str),
    #[error("booking failed: {0}")]
    BookingFailed(String),
    #[error("storage error: {0}")]
    Storage(String),
}
