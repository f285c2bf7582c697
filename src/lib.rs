//! Booking availability engine for home-service providers: weekly hours with
//! per-date exceptions, slot generation, buffer-aware conflict checks and a
//! booking lifecycle, persisted to an append-only journal.

pub mod config;
pub mod engine;
pub mod limits;
pub mod maintenance;
pub mod model;
pub mod notify;
pub mod observability;
pub mod wal;
