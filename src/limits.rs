use crate::model::Ms;

pub const MAX_PROVIDERS: usize = 100_000;
pub const MAX_BOOKINGS_PER_PROVIDER: usize = 50_000;
pub const MAX_WINDOWS_PER_DAY: usize = 24;
pub const MAX_EXCEPTIONS_PER_PROVIDER: usize = 1_000;

pub const MAX_NAME_LEN: usize = 256;
pub const MAX_EMAIL_LEN: usize = 320;
pub const MAX_PHONE_LEN: usize = 32;
pub const MAX_REQUIREMENTS_LEN: usize = 4_096;

/// Settings form caps buffer time at one hour.
pub const MAX_BUFFER_MINUTES: u32 = 60;
pub const MAX_BOOKING_DURATION_MINUTES: u32 = 24 * 60;
pub const MAX_ADVANCE_DAYS: u32 = 365;
pub const MAX_NOTICE_MINUTES: u32 = 72 * 60;

pub const MIN_VALID_TIMESTAMP_MS: Ms = 0;
/// 2200-01-01T00:00:00Z
pub const MAX_VALID_TIMESTAMP_MS: Ms = 7_258_118_400_000;
/// Range queries over a provider's bookings are capped at a year.
pub const MAX_QUERY_WINDOW_MS: Ms = 366 * 24 * 3_600_000;
