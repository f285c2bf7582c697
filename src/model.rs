use std::collections::BTreeMap;
use std::fmt;

use chrono::{Datelike, NaiveDate, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Unix milliseconds, UTC.
pub type Ms = i64;

pub const MINUTE_MS: Ms = 60_000;
pub const DAY_MS: Ms = 86_400_000;
pub const MINUTES_PER_DAY: u16 = 1_440;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid interval [{start}, {end}): start must be before end")]
pub struct InvalidInterval {
    pub start: Ms,
    pub end: Ms,
}

/// Half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start: Ms,
    pub end: Ms,
}

impl Span {
    pub fn new(start: Ms, end: Ms) -> Self {
        debug_assert!(start < end, "Span start must be before end");
        Self { start, end }
    }

    pub fn try_new(start: Ms, end: Ms) -> Result<Self, InvalidInterval> {
        if start >= end {
            return Err(InvalidInterval { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn duration_ms(&self) -> Ms {
        self.end - self.start
    }

    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn contains_instant(&self, t: Ms) -> bool {
        self.start <= t && t < self.end
    }

    /// Returns true if `self` fully contains `other`.
    pub fn contains_span(&self, other: &Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// Push `end` forward by a buffer. Only used to model occupancy; stored
    /// bookings keep their original span.
    pub fn expand(&self, buffer_minutes: u32) -> Span {
        Span {
            start: self.start,
            end: self.end + buffer_minutes as Ms * MINUTE_MS,
        }
    }
}

// ── Calendar helpers ─────────────────────────────────────────────

/// UTC midnight of `date`.
pub fn day_start(date: NaiveDate) -> Ms {
    date.signed_duration_since(NaiveDate::default()).num_days() * DAY_MS
}

/// Calendar date (UTC) containing instant `t`.
pub fn date_of(t: Ms) -> NaiveDate {
    NaiveDate::default() + chrono::Duration::days(t.div_euclid(DAY_MS))
}

/// 0 = Sunday .. 6 = Saturday.
pub fn day_of_week(date: NaiveDate) -> u8 {
    date.weekday().num_days_from_sunday() as u8
}

/// A time-of-day range in minutes since midnight, `[start, end)`.
/// `end` may be 1440 to run until midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: u16,
    pub end: u16,
}

impl TimeRange {
    pub fn new(start: u16, end: u16) -> Self {
        Self { start, end }
    }

    /// Parse `"HH:MM"` bounds. `"24:00"` is accepted as an end of day.
    pub fn parse(start: &str, end: &str) -> Option<Self> {
        let start = parse_minute_of_day(start)?;
        let end = if end == "24:00" {
            MINUTES_PER_DAY
        } else {
            parse_minute_of_day(end)?
        };
        Some(Self { start, end })
    }

    pub fn is_valid(&self) -> bool {
        self.start < self.end && self.end <= MINUTES_PER_DAY
    }

    pub fn overlaps(&self, other: &TimeRange) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Concrete span of this range on the day starting at `midnight`.
    pub fn anchor(&self, midnight: Ms) -> Span {
        Span::new(
            midnight + self.start as Ms * MINUTE_MS,
            midnight + self.end as Ms * MINUTE_MS,
        )
    }
}

fn parse_minute_of_day(s: &str) -> Option<u16> {
    let t = NaiveTime::parse_from_str(s, "%H:%M").ok()?;
    Some((t.hour() * 60 + t.minute()) as u16)
}

// ── Availability ─────────────────────────────────────────────────

/// Recurring weekly window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityWindow {
    /// 0 = Sunday .. 6 = Saturday.
    pub day_of_week: u8,
    pub start: u16,
    pub end: u16,
    pub enabled: bool,
}

impl AvailabilityWindow {
    pub fn new(day_of_week: u8, range: TimeRange) -> Self {
        Self {
            day_of_week,
            start: range.start,
            end: range.end,
            enabled: true,
        }
    }

    pub fn range(&self) -> TimeRange {
        TimeRange::new(self.start, self.end)
    }
}

/// Date-specific override of the weekly pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DateException {
    /// No availability at all.
    Closed,
    /// Remove these ranges from the recurring windows.
    Blocked(Vec<TimeRange>),
    /// Use these ranges instead of the recurring windows.
    Hours(Vec<TimeRange>),
}

// ── Bookings ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
}

impl BookingStatus {
    pub fn can_transition_to(self, next: BookingStatus) -> bool {
        use BookingStatus::*;
        matches!(
            (self, next),
            (Pending, Confirmed) | (Pending, Cancelled) | (Confirmed, Cancelled) | (Confirmed, Completed)
        )
    }

    /// Pending and confirmed bookings occupy the provider's time.
    pub fn is_active(self) -> bool {
        matches!(self, BookingStatus::Pending | BookingStatus::Confirmed)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, BookingStatus::Cancelled | BookingStatus::Completed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who is asking. Identity is established by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Actor {
    Customer(Ulid),
    Provider(Ulid),
    System,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: Ulid,
    pub provider_id: Ulid,
    pub service_id: Ulid,
    /// Guest bookings carry contact details only.
    pub customer_id: Option<Ulid>,
    pub contact: Contact,
    pub requirements: Option<String>,
    pub span: Span,
    pub status: BookingStatus,
    pub created_at: Ms,
    pub updated_at: Ms,
}

impl Booking {
    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }
}

/// Booking request as received from the customer-facing side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingRequest {
    pub id: Ulid,
    pub provider_id: Ulid,
    pub service_id: Ulid,
    pub customer_id: Option<Ulid>,
    pub contact: Contact,
    pub requirements: Option<String>,
    pub start: Ms,
    /// Falls back to the provider's default duration.
    pub duration_minutes: Option<u32>,
}

// ── Providers ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderSettings {
    /// Idle gap enforced after every booking.
    pub buffer_minutes: u32,
    /// Disables the buffer entirely.
    pub allow_back_to_back: bool,
    pub default_duration_minutes: u32,
    /// Earliest a booking may start, relative to now.
    pub min_notice_minutes: Option<u32>,
    /// Latest a booking may start, relative to now.
    pub max_advance_days: Option<u32>,
    /// Slot step; defaults to the requested duration.
    pub slot_step_minutes: Option<u32>,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            buffer_minutes: 15,
            allow_back_to_back: false,
            default_duration_minutes: 60,
            min_notice_minutes: None,
            max_advance_days: None,
            slot_step_minutes: None,
        }
    }
}

impl ProviderSettings {
    pub fn effective_buffer_minutes(&self) -> u32 {
        if self.allow_back_to_back {
            0
        } else {
            self.buffer_minutes
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProviderState {
    pub id: Ulid,
    pub name: Option<String>,
    pub settings: ProviderSettings,
    /// Enabled windows only, sorted by (day, start).
    pub weekly: Vec<AvailabilityWindow>,
    pub exceptions: BTreeMap<NaiveDate, DateException>,
    /// All bookings ever made, sorted by `span.start`.
    pub bookings: Vec<Booking>,
}

impl ProviderState {
    pub fn new(id: Ulid, name: Option<String>, settings: ProviderSettings) -> Self {
        Self {
            id,
            name,
            settings,
            weekly: Vec::new(),
            exceptions: BTreeMap::new(),
            bookings: Vec::new(),
        }
    }

    /// Insert booking maintaining sort order by span.start.
    pub fn insert_booking(&mut self, booking: Booking) {
        let pos = self
            .bookings
            .partition_point(|b| b.span.start <= booking.span.start);
        self.bookings.insert(pos, booking);
    }

    pub fn booking(&self, id: &Ulid) -> Option<&Booking> {
        self.bookings.iter().find(|b| b.id == *id)
    }

    pub fn booking_mut(&mut self, id: &Ulid) -> Option<&mut Booking> {
        self.bookings.iter_mut().find(|b| b.id == *id)
    }

    /// Bookings (any status) whose span overlaps the query window.
    /// Uses binary search to skip bookings starting at or after `query.end`.
    pub fn overlapping(&self, query: Span) -> impl Iterator<Item = &Booking> + use<'_> {
        let right_bound = self
            .bookings
            .partition_point(|b| b.span.start < query.end);
        self.bookings[..right_bound]
            .iter()
            .filter(move |b| b.span.end > query.start)
    }
}

/// Log record format: flat, one variant per state change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    ProviderCreated {
        id: Ulid,
        name: Option<String>,
        settings: ProviderSettings,
    },
    ProviderUpdated {
        id: Ulid,
        name: Option<String>,
        settings: ProviderSettings,
    },
    WeeklyPatternSet {
        provider_id: Ulid,
        windows: Vec<AvailabilityWindow>,
    },
    ExceptionSet {
        provider_id: Ulid,
        date: NaiveDate,
        exception: DateException,
    },
    ExceptionCleared {
        provider_id: Ulid,
        date: NaiveDate,
    },
    BookingCreated {
        booking: Booking,
    },
    BookingStatusChanged {
        id: Ulid,
        provider_id: Ulid,
        status: BookingStatus,
        at: Ms,
    },
}

impl Event {
    pub fn provider_id(&self) -> Ulid {
        match self {
            Event::ProviderCreated { id, .. } | Event::ProviderUpdated { id, .. } => *id,
            Event::WeeklyPatternSet { provider_id, .. }
            | Event::ExceptionSet { provider_id, .. }
            | Event::ExceptionCleared { provider_id, .. }
            | Event::BookingStatusChanged { provider_id, .. } => *provider_id,
            Event::BookingCreated { booking } => booking.provider_id,
        }
    }
}

// ── Query result types ───────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderInfo {
    pub id: Ulid,
    pub name: Option<String>,
    pub settings: ProviderSettings,
}

/// A generated slot and whether it can currently be booked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SlotInfo {
    pub span: Span,
    pub available: bool,
}

/// Lookup of a customer's bookings across providers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CustomerFilter {
    pub customer_id: Option<Ulid>,
    pub email: Option<String>,
}
