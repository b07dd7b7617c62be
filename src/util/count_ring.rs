use crate::util::clock::{Clock, SystemClock};
use chrono::{DateTime, Utc};
use std::time::Duration;

const NANOS_PER_SEC: i128 = 1_000_000_000;

/// Fixed ring of per-bucket counts covering the most recent
/// `bucket_count * bucket_width` of time.
///
/// `record` moves the cursor and `window_start` together; `tick` rolls only
/// the cursor, on elapsed clock time. Moving the cursor zeroes every bucket it
/// enters, so data a full window old is never visible again.
/// Timestamps before `window_start` are rejected, there is no backfill.
///
/// Not synchronised: the owner serialises `record` / `tick` / `sum`.
#[derive(Debug)]
pub struct CountRing {
    bucket_width:  Duration,
    width_nanos:   i128,
    buckets:       Vec<i64>,
    cursor:        usize,
    window_start:  Option<i128>,          // truncated, nanos since epoch
    last_observed: Option<DateTime<Utc>>, // clock time of the last record/tick
    clock:         Box<dyn Clock>,
}

impl CountRing {
    /// # Panics
    ///
    /// Panics if `bucket_width` is zero or `bucket_count` is zero.
    pub fn new(bucket_width: Duration, bucket_count: usize) -> Self {
        assert!(!bucket_width.is_zero(), "bucket_width must be greater than 0");
        assert!(bucket_count > 0, "bucket_count must be greater than 0");

        Self {
            bucket_width,
            width_nanos:   i128::try_from(bucket_width.as_nanos()).unwrap_or(i128::MAX),
            buckets:       vec![0; bucket_count],
            cursor:        0,
            window_start:  None,
            last_observed: None,
            clock:         Box::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.set_clock(clock);
        self
    }

    /// Replace the time source. Meant for test setup, before any mutation.
    pub fn set_clock(&mut self, clock: impl Clock + 'static) {
        self.clock = Box::new(clock);
    }

    pub fn bucket_width(&self) -> Duration { self.bucket_width }
    pub fn bucket_count(&self) -> usize { self.buckets.len() }

    /// Total span covered by all buckets.
    pub fn window(&self) -> Duration {
        let n = u32::try_from(self.buckets.len()).unwrap_or(u32::MAX);
        self.bucket_width.checked_mul(n).unwrap_or(Duration::MAX)
    }

    /// Start of the bucket the cursor represents, `None` until the first record.
    pub fn window_start(&self) -> Option<DateTime<Utc>> {
        self.window_start.and_then(from_nanos)
    }

    /// True until the counter has been touched by `record` or `tick`.
    pub fn is_empty(&self) -> bool {
        self.window_start.is_none() && self.last_observed.is_none()
    }

    /// Add `quantity` to the bucket containing `at`.
    ///
    /// Returns false, leaving the buckets untouched, when `at` falls before the
    /// current bucket. Either way the clock time is noted for [`tick`](Self::tick).
    pub fn record(&mut self, at: DateTime<Utc>, quantity: i64) -> bool {
        let t = self.truncate(at);
        self.last_observed = Some(self.clock.now());

        let start = *self.window_start.get_or_insert(t);
        if t < start {
            return false;
        }
        if t > start {
            let steps = self.steps(t - start);
            self.advance(steps);
            self.window_start = Some(t);
        }

        let slot = &mut self.buckets[self.cursor];
        *slot = slot.saturating_add(quantity);
        true
    }

    /// Roll the window forward by the whole buckets elapsed on the clock since
    /// the last record or tick. Call roughly once per `bucket_width`.
    pub fn tick(&mut self) {
        let now = self.clock.now();
        let last = match self.last_observed {
            Some(t) => t,
            None    => {
                self.last_observed = Some(now);
                return;
            }
        };

        let dt = nanos(now) - nanos(last);
        if dt < self.width_nanos {
            return;
        }

        let steps = self.steps(dt);
        self.last_observed = Some(now);
        // window_start is left alone; the next record's truncation catches up.
        self.advance(steps);
    }

    /// Sum of every live bucket.
    pub fn sum(&self) -> i64 {
        self.buckets.iter().fold(0i64, |acc, v| acc.saturating_add(*v))
    }

    fn advance(&mut self, steps: u64) {
        let n = self.buckets.len();
        if steps == 0 {
            return;
        }
        if steps >= n as u64 {
            self.buckets.fill(0);
            self.cursor = (self.cursor + (steps % n as u64) as usize) % n;
            return;
        }
        for _ in 0..steps {
            self.cursor = (self.cursor + 1) % n;
            self.buckets[self.cursor] = 0;
        }
    }

    fn steps(&self, elapsed_nanos: i128) -> u64 {
        u64::try_from(elapsed_nanos / self.width_nanos).unwrap_or(u64::MAX)
    }

    /// Floor `at` onto a bucket boundary.
    fn truncate(&self, at: DateTime<Utc>) -> i128 {
        let ns = nanos(at);
        ns - ns.rem_euclid(self.width_nanos)
    }
}

fn nanos(t: DateTime<Utc>) -> i128 {
    i128::from(t.timestamp()) * NANOS_PER_SEC + i128::from(t.timestamp_subsec_nanos())
}

fn from_nanos(ns: i128) -> Option<DateTime<Utc>> {
    let secs = i64::try_from(ns.div_euclid(NANOS_PER_SEC)).ok()?;
    let sub  = u32::try_from(ns.rem_euclid(NANOS_PER_SEC)).ok()?;
    DateTime::from_timestamp(secs, sub)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::clock::MockClock;
    use chrono::Duration as TimeDelta;

    fn at_ms(ms: i64) -> DateTime<Utc> {
        DateTime::<Utc>::UNIX_EPOCH + TimeDelta::milliseconds(ms)
    }

    fn ring(width_ms: u64, count: usize) -> (CountRing, MockClock) {
        let clock = MockClock::default();
        let ring = CountRing::new(Duration::from_millis(width_ms), count).with_clock(clock.clone());
        (ring, clock)
    }

    #[test]
    #[should_panic(expected = "bucket_width must be greater than 0")]
    fn zero_width_panics() {
        CountRing::new(Duration::ZERO, 3);
    }

    #[test]
    #[should_panic(expected = "bucket_count must be greater than 0")]
    fn zero_count_panics() {
        CountRing::new(Duration::from_secs(1), 0);
    }

    #[test]
    fn fresh_ring_is_empty() {
        let (r, _) = ring(1000, 4);
        assert!(r.is_empty());
        assert_eq!(r.sum(), 0);
        assert_eq!(r.window_start(), None);
        assert_eq!(r.window(), Duration::from_secs(4));
        assert_eq!(r.bucket_width(), Duration::from_secs(1));
        assert_eq!(r.bucket_count(), 4);
    }

    #[test]
    fn first_record_sets_window_start() {
        let (mut r, _) = ring(1000, 3);
        assert!(r.record(at_ms(2_750), 1));
        assert_eq!(r.window_start(), Some(at_ms(2_000)));
        assert!(!r.is_empty());
    }

    #[test]
    fn truncates_toward_earlier_boundary_before_epoch() {
        let (mut r, _) = ring(1000, 3);
        assert!(r.record(at_ms(-1_500), 1));
        assert_eq!(r.window_start(), Some(at_ms(-2_000)));
        // -1.0s is the next bucket, not the same one
        assert!(r.record(at_ms(-1_000), 1));
        assert_eq!(r.window_start(), Some(at_ms(-1_000)));
        assert_eq!(r.sum(), 2);
    }

    #[test]
    fn same_bucket_accumulates() {
        let (mut r, _) = ring(1000, 3);
        assert!(r.record(at_ms(100), 2));
        assert!(r.record(at_ms(900), 3));
        assert!(r.record(at_ms(999), -1));
        assert_eq!(r.sum(), 4);
    }

    #[test]
    fn advancing_one_bucket_evicts_only_the_oldest() {
        let (mut r, _) = ring(1000, 3);
        assert!(r.record(at_ms(0), 5));
        assert!(r.record(at_ms(1_000), 3));
        assert!(r.record(at_ms(2_000), 1));
        assert_eq!(r.sum(), 9);

        assert!(r.record(at_ms(3_000), 0));
        assert_eq!(r.sum(), 4);
    }

    #[test]
    fn skipped_buckets_are_zeroed() {
        let (mut r, _) = ring(1000, 4);
        assert!(r.record(at_ms(0), 1));
        assert!(r.record(at_ms(1_000), 2));
        assert!(r.record(at_ms(2_000), 4));
        assert!(r.record(at_ms(3_000), 8));
        // jump two buckets: 0s and 1s fall out, 2s and 3s stay
        assert!(r.record(at_ms(5_000), 16));
        assert_eq!(r.sum(), 4 + 8 + 16);
    }

    #[test]
    fn far_future_record_resets_everything() {
        let (mut r, _) = ring(1000, 3);
        assert!(r.record(at_ms(0), 5));
        let far = DateTime::<Utc>::UNIX_EPOCH + TimeDelta::days(365 * 200);
        assert!(r.record(far, 7));
        assert_eq!(r.sum(), 7);
    }

    #[test]
    fn stale_record_is_rejected_but_noted() {
        let (mut r, clock) = ring(1000, 3);
        assert!(r.record(at_ms(5_000), 5));
        clock.advance(TimeDelta::seconds(2));
        assert!(!r.record(at_ms(4_999), 10));
        assert_eq!(r.sum(), 5);

        // last_observed moved to the rejected call, so nothing has elapsed yet
        r.tick();
        assert_eq!(r.sum(), 5);
    }

    #[test]
    fn tick_with_no_elapsed_time_is_a_noop() {
        let (mut r, clock) = ring(1000, 3);
        assert!(r.record(clock.now(), 3));
        r.tick();
        r.tick();
        assert_eq!(r.sum(), 3);

        clock.advance(TimeDelta::milliseconds(999));
        r.tick();
        assert_eq!(r.sum(), 3);
    }

    #[test]
    fn tick_rolls_the_window_without_events() {
        let (mut r, clock) = ring(1000, 3);
        assert!(r.record(clock.now(), 5));
        clock.advance(TimeDelta::seconds(1));
        assert!(r.record(clock.now(), 3));
        clock.advance(TimeDelta::seconds(1));
        assert!(r.record(clock.now(), 1));
        assert_eq!(r.sum(), 9);

        clock.advance(TimeDelta::seconds(1));
        r.tick();
        assert_eq!(r.sum(), 4);
        assert_eq!(r.window_start(), Some(at_ms(2_000)));

        // truncation advances again from the untouched start: 3s bucket evicted too
        assert!(r.record(clock.now(), 2));
        assert_eq!(r.window_start(), Some(at_ms(3_000)));
        assert_eq!(r.sum(), 3);
    }

    #[test]
    fn record_in_current_bucket_after_tick_is_accepted() {
        let (mut r, clock) = ring(1000, 3);
        assert!(r.record(at_ms(0), 5));
        clock.advance(TimeDelta::seconds(1));
        r.tick();
        assert_eq!(r.window_start(), Some(at_ms(0)));

        assert!(r.record(at_ms(500), 1));
        assert_eq!(r.sum(), 6);
    }

    #[test]
    fn tick_past_the_window_zeroes_the_sum() {
        let (mut r, clock) = ring(1000, 3);
        assert!(r.record(clock.now(), 5));
        assert!(r.record(clock.now() + TimeDelta::seconds(1), 5));
        clock.advance(TimeDelta::seconds(10));
        r.tick();
        assert_eq!(r.sum(), 0);
    }

    #[test]
    fn tick_before_any_record_only_starts_the_clock() {
        let (mut r, clock) = ring(1000, 3);
        r.tick();
        assert_eq!(r.sum(), 0);
        assert_eq!(r.window_start(), None);
        assert!(!r.is_empty());

        clock.advance(TimeDelta::seconds(1));
        assert!(r.record(clock.now(), 1));
        assert_eq!(r.window_start(), Some(at_ms(1_000)));
        assert_eq!(r.sum(), 1);
    }

    #[test]
    fn single_bucket_ring() {
        let (mut r, _) = ring(500, 1);
        assert!(r.record(at_ms(0), 3));
        assert!(r.record(at_ms(499), 3));
        assert_eq!(r.sum(), 6);
        assert!(r.record(at_ms(500), 1));
        assert_eq!(r.sum(), 1);
    }

    #[test]
    fn sum_saturates() {
        let (mut r, _) = ring(1000, 2);
        assert!(r.record(at_ms(0), i64::MAX));
        assert!(r.record(at_ms(1_000), i64::MAX));
        assert_eq!(r.sum(), i64::MAX);
    }
}
