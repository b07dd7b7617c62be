//! Access-log generation plus a time-bucketed ring counter for rolling
//! traffic totals.
//!
//! [`CountRing`] is the core: a fixed ring of per-bucket counts that slides
//! forward with time, either as events arrive ([`CountRing::record`]) or as the
//! clock moves ([`CountRing::tick`]). Its [`Clock`] is injectable so tests can
//! drive time by hand with [`MockClock`].

pub mod config;
pub mod generator;
pub mod models;
pub mod monitor;
pub mod util;

pub use util::clock::{Clock, MockClock, SystemClock};
pub use util::count_ring::CountRing;
