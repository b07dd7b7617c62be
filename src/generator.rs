use crate::config::GeneratorConfig;
use crate::models::message::{Message, DEFAULT_TIME_FORMAT};
use crate::util::randutil::Rand;
use anyhow::{Context, Result};
use chrono::{DateTime, FixedOffset, Local, Timelike};
use std::collections::BTreeMap;
use std::fmt::Write;

const METHODS:  &[&str] = &["GET", "HEAD", "POST", "PUT", "DELETE", "PATCH"];
const STATUSES: &[u16]  = &[200, 400, 201, 304, 401, 404, 500];
const MAX_AUTH_LEN: usize = 20;

/// Builds random access-log messages.
#[derive(Debug)]
pub struct Generator {
    config: GeneratorConfig,
    rng:    Rand,

    /// Auth users from several scripts; ASCII letters otherwise.
    pub use_unicode:  bool,
    /// Preset first path segments. Empty = fully random paths.
    pub page_choices: Vec<String>,
}

impl Generator {
    pub fn new(config: GeneratorConfig, rng: Rand) -> Self {
        let use_unicode = config.use_unicode;
        Self { config, rng, use_unicode, page_choices: Vec::new() }
    }

    pub fn config(&self) -> &GeneratorConfig { &self.config }

    /// Append `n` random page names of 1..20 letters.
    pub fn seed_page_choices(&mut self, n: usize) {
        for _ in 0..n {
            let len = self.rng.int_range(1, 20);
            let page = self.rng.alpha(len);
            self.page_choices.push(page);
        }
    }

    /// The canonical example record.
    pub fn test_msg(&self) -> Result<Message> {
        let time = DateTime::parse_from_str("10/Oct/2000:13:55:36 -0700", DEFAULT_TIME_FORMAT)
            .context("parsing example timestamp")?;
        Ok(Message {
            remote: "127.0.0.1".into(),
            ident:  "-".into(),
            auth:   "frank".into(),
            time,
            method: "GET".into(),
            uri:    "/apache_pb.gif".into(),
            proto:  "HTTP/1.0".into(),
            status: 200,
            size:   2326,
        })
    }

    pub fn msg_with_page(&self, page: &str) -> Result<Message> {
        let mut m = self.test_msg()?;
        m.uri = page.to_string();
        Ok(m)
    }

    /// A random record stamped with the current local time.
    pub fn rand_msg(&mut self) -> Message {
        let now = Local::now().fixed_offset();
        self.rand_msg_at(now)
    }

    /// A random record stamped `time`, at the precision of the configured
    /// time format.
    pub fn rand_msg_at(&mut self, time: DateTime<FixedOffset>) -> Message {
        let time   = self.at_format_precision(time);
        let remote = self.rng.ipv4().to_string();
        let auth   = self.rand_auth();
        let method = self.rng.select(METHODS).copied().unwrap_or("GET").to_string();
        let uri    = self.rand_uri();
        let status = self.rng.select(STATUSES).copied().unwrap_or(200);
        let size   = self.rng.int_range(1 << 8, 1 << 26) as u64;

        Message {
            remote,
            ident: "-".into(),
            auth,
            time,
            method,
            uri,
            proto: "HTTP/1.0".into(),
            status,
            size,
        }
    }

    /// Print `time` with the configured layout and read it back. Layouts that
    /// can't be read back as a full timestamp fall back to whole seconds.
    fn at_format_precision(&self, time: DateTime<FixedOffset>) -> DateTime<FixedOffset> {
        let layout = &self.config().time_format;
        let mut text = String::new();
        if write!(text, "{}", time.format(layout)).is_ok() {
            if let Ok(t) = DateTime::parse_from_str(&text, layout) {
                return t;
            }
        }
        time.with_nanosecond(0).unwrap_or(time)
    }

    fn rand_auth(&mut self) -> String {
        let len = self.rng.below(MAX_AUTH_LEN);
        let auth = if self.use_unicode {
            self.rng.unicode_letters(len)
        } else {
            self.rng.alpha(len)
        };
        if auth.is_empty() { "-".into() } else { auth }
    }

    fn rand_uri(&mut self) -> String {
        let mut uri = String::new();

        if let Some(page) = self.rng.select(&self.page_choices) {
            uri.push('/');
            uri.push_str(page);
        }

        // 1..=5 path components
        let segments = self.rng.int_range(1, 6);
        for _ in 0..segments {
            let len = self.rng.int_range(1, 3);
            uri.push('/');
            uri.push_str(&self.rng.alpha(len));
        }

        // 0..=5 query params, deduplicated and sorted by key
        let mut params = BTreeMap::new();
        for _ in 0..self.rng.below(6) {
            let (klen, vlen) = (self.rng.int_range(1, 5), self.rng.int_range(1, 5));
            params.insert(self.rng.alpha(klen), self.rng.alpha(vlen));
        }
        if !params.is_empty() {
            let query = params.iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect::<Vec<_>>()
                .join("&");
            uri.push('?');
            uri.push_str(&query);
        }

        uri
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::message::EXAMPLE_LOG_LINE;

    fn generator(seed: u64) -> Generator {
        Generator::new(GeneratorConfig::default(), Rand::seeded(seed))
    }

    #[test]
    fn test_msg_renders_example_line() {
        let g = generator(0);
        assert_eq!(g.test_msg().unwrap().to_string(), EXAMPLE_LOG_LINE);
    }

    #[test]
    fn msg_with_page_only_changes_uri() {
        let g = generator(0);
        let m = g.msg_with_page("/home").unwrap();
        assert_eq!(m.uri, "/home");
        assert_eq!(m.auth, "frank");
    }

    #[test]
    fn random_fields_stay_in_range() {
        let mut g = generator(42);
        for _ in 0..500 {
            let m = g.rand_msg();
            assert!(METHODS.contains(&m.method.as_str()));
            assert!(STATUSES.contains(&m.status));
            assert!((256..1 << 26).contains(&m.size));
            assert_eq!(m.ident, "-");
            assert_eq!(m.proto, "HTTP/1.0");
            assert_eq!(m.time.nanosecond(), 0);
            assert!(m.remote.parse::<std::net::Ipv4Addr>().is_ok());
            assert!(m.auth == "-" || m.auth.chars().all(|c| c.is_ascii_alphabetic()));
            assert!(m.auth.chars().count() < MAX_AUTH_LEN);

            let path = m.uri.split('?').next().unwrap();
            let segments = path.split('/').skip(1).count();
            assert!((1..=5).contains(&segments), "uri {}", m.uri);
        }
    }

    #[test]
    fn query_keys_are_sorted() {
        let mut g = generator(5);
        for _ in 0..200 {
            let m = g.rand_msg();
            if let Some((_, q)) = m.uri.split_once('?') {
                let keys: Vec<&str> = q.split('&').map(|kv| kv.split('=').next().unwrap()).collect();
                let mut sorted = keys.clone();
                sorted.sort();
                sorted.dedup();
                assert_eq!(keys, sorted);
            }
        }
    }

    #[test]
    fn page_choices_prefix_the_path() {
        let mut g = generator(8);
        g.seed_page_choices(3);
        assert_eq!(g.page_choices.len(), 3);
        for _ in 0..100 {
            let m = g.rand_msg();
            assert!(g.page_choices.iter().any(|p| m.uri.starts_with(&format!("/{}/", p))));
        }
    }

    #[test]
    fn unicode_auth() {
        let mut g = generator(11);
        g.use_unicode = true;
        let any_non_ascii = (0..200).any(|_| !g.rand_msg().auth.is_ascii());
        assert!(any_non_ascii);
    }

    #[test]
    fn seeded_generators_agree() {
        let t = DateTime::parse_from_rfc3339("2024-05-01T12:00:00.750+02:00").unwrap();
        let (mut a, mut b) = (generator(123), generator(123));
        for _ in 0..20 {
            assert_eq!(a.rand_msg_at(t), b.rand_msg_at(t));
        }
        assert_eq!(a.rand_msg_at(t).time.to_rfc3339(), "2024-05-01T12:00:00+02:00");
    }

    fn with_time_format(layout: &str) -> Generator {
        let config = GeneratorConfig { time_format: layout.into(), ..GeneratorConfig::default() };
        Generator::new(config, Rand::seeded(1))
    }

    #[test]
    fn timestamp_precision_follows_time_format() {
        let t = DateTime::parse_from_rfc3339("2024-05-01T12:00:00.750+02:00").unwrap();

        let mut g = with_time_format("%Y-%m-%dT%H:%M:%S%.f%z");
        assert_eq!(g.config().time_format, "%Y-%m-%dT%H:%M:%S%.f%z");
        assert_eq!(g.rand_msg_at(t).time, t);

        // minutes only: seconds are dropped too
        let mut g = with_time_format("%Y-%m-%d %H:%M %z");
        assert_eq!(g.rand_msg_at(t).time.to_rfc3339(), "2024-05-01T12:00:00+02:00");
        let t = DateTime::parse_from_rfc3339("2024-05-01T12:00:42.5+02:00").unwrap();
        assert_eq!(g.rand_msg_at(t).time.to_rfc3339(), "2024-05-01T12:00:00+02:00");
    }

    #[test]
    fn unparseable_time_format_keeps_whole_seconds() {
        let t = DateTime::parse_from_rfc3339("2024-05-01T12:34:56.750+02:00").unwrap();
        let mut g = with_time_format("%H:%M");
        assert_eq!(g.rand_msg_at(t).time.to_rfc3339(), "2024-05-01T12:34:56+02:00");
    }
}
