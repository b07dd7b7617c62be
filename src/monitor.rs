use crate::models::message::Message;
use crate::util::clock::{Clock, SystemClock};
use crate::util::count_ring::CountRing;
use crate::util::human::{fmt_bytes, fmt_duration, fmt_hits, fmt_rate};
use chrono::Utc;
use std::fmt;
use std::time::Duration;

/// Rolling totals over the monitor's window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowStats {
    pub hits:   i64,
    pub bytes:  i64,
    pub window: Duration,
}

impl WindowStats {
    pub fn hits_per_sec(&self) -> f64 {
        per_sec(self.hits, self.window)
    }

    pub fn bytes_per_sec(&self) -> f64 {
        per_sec(self.bytes, self.window)
    }
}

fn per_sec(total: i64, window: Duration) -> f64 {
    let secs = window.as_secs_f64();
    if secs <= 0.0 { 0.0 } else { total as f64 / secs }
}

impl fmt::Display for WindowStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "last {}: {} hits ({}/s), {} ({})",
            fmt_duration(self.window),
            self.hits,
            fmt_hits(self.hits_per_sec()),
            fmt_bytes(self.bytes.max(0) as u64),
            fmt_rate(self.bytes_per_sec()),
        )
    }
}

/// Hit and byte counters over one sliding window.
#[derive(Debug)]
pub struct TrafficMonitor {
    hits:  CountRing,
    bytes: CountRing,
}

impl TrafficMonitor {
    pub fn new(bucket_width: Duration, bucket_count: usize) -> Self {
        Self::with_clock(bucket_width, bucket_count, SystemClock)
    }

    /// Both counters read the same clock.
    pub fn with_clock<C: Clock + Clone + 'static>(bucket_width: Duration, bucket_count: usize, clock: C) -> Self {
        Self {
            hits:  CountRing::new(bucket_width, bucket_count).with_clock(clock.clone()),
            bytes: CountRing::new(bucket_width, bucket_count).with_clock(clock),
        }
    }

    pub fn bucket_width(&self) -> Duration { self.hits.bucket_width() }
    pub fn bucket_count(&self) -> usize { self.hits.bucket_count() }

    /// Count `msg` at its own timestamp. False when it predates the current bucket.
    pub fn observe(&mut self, msg: &Message) -> bool {
        let at   = msg.time.with_timezone(&Utc);
        let size = i64::try_from(msg.size).unwrap_or(i64::MAX);
        let hit  = self.hits.record(at, 1);
        let sent = self.bytes.record(at, size);
        if !(hit && sent) {
            tracing::debug!(time = %msg.time, uri = %msg.uri, "dropping stale message");
        }
        hit && sent
    }

    pub fn tick(&mut self) {
        self.hits.tick();
        self.bytes.tick();
    }

    pub fn stats(&self) -> WindowStats {
        WindowStats {
            hits:   self.hits.sum(),
            bytes:  self.bytes.sum(),
            window: self.hits.window(),
        }
    }
}
