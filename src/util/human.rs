use anyhow::{bail, Context, Result};
use std::time::Duration;

const BYTE_UNITS: &[(f64, &str)] = &[
    (1_099_511_627_776.0, "TB"),
    (1_073_741_824.0,     "GB"),
    (1_048_576.0,         "MB"),
    (1_024.0,             "KB"),
];

/// Byte throughput: "12.5 MB/s"
pub fn fmt_rate(bytes_per_sec: f64) -> String {
    format!("{}/s", scale_bytes(bytes_per_sec))
}

/// Byte count: "12.5 MB"
pub fn fmt_bytes(bytes: u64) -> String {
    scale_bytes(bytes as f64)
}

fn scale_bytes(b: f64) -> String {
    match BYTE_UNITS.iter().find(|(size, _)| b >= *size) {
        Some((size, unit)) => format!("{:.1} {}", b / size, unit),
        None               => format!("{:.0} B", b),
    }
}

/// Format hits/s: "3.2", "1.2K", "4.0M"
pub fn fmt_hits(per_sec: f64) -> String {
    if per_sec >= 1_000_000.0 { format!("{:.1}M", per_sec / 1_000_000.0) }
    else if per_sec >= 1_000.0 { format!("{:.1}K", per_sec / 1_000.0) }
    else { format!("{:.1}", per_sec) }
}

/// Compact duration: "250ms", "10s", "1m30s", "2h"
pub fn fmt_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs == 0 {
        return format!("{}ms", d.as_millis());
    }
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    let mut out = String::new();
    if h > 0 { out.push_str(&format!("{}h", h)); }
    if m > 0 { out.push_str(&format!("{}m", m)); }
    if s > 0 { out.push_str(&format!("{}s", s)); }
    out
}

/// Parse a Go-style duration: "1s", "250ms", "1m30s", "1.5h".
///
/// Units: ns, us (µs), ms, s, m, h. A bare "0" is accepted; any other number
/// needs a unit. Negative durations are rejected.
pub fn parse_duration(input: &str) -> Result<Duration> {
    let s = input.trim();
    if s.is_empty() {
        bail!("empty duration");
    }
    if s.starts_with('-') {
        bail!("negative duration {:?}", input);
    }
    let body = s.strip_prefix('+').unwrap_or(s);
    if body == "0" {
        return Ok(Duration::ZERO);
    }

    let is_num = |c: char| c.is_ascii_digit() || c == '.';
    let mut rest = body;
    let mut nanos = 0f64;
    while !rest.is_empty() {
        let num_len = rest.find(|c: char| !is_num(c)).unwrap_or(rest.len());
        if num_len == 0 {
            bail!("invalid duration {:?}: expected a number", input);
        }
        let value: f64 = rest[..num_len]
            .parse()
            .with_context(|| format!("invalid duration {:?}", input))?;
        rest = &rest[num_len..];

        let unit_len = rest.find(is_num).unwrap_or(rest.len());
        let scale = match &rest[..unit_len] {
            "ns"               => 1.0,
            "us" | "µs" | "μs" => 1e3,
            "ms"               => 1e6,
            "s"                => 1e9,
            "m"                => 60e9,
            "h"                => 3_600e9,
            ""                 => bail!("missing unit in duration {:?}", input),
            other              => bail!("unknown unit {:?} in duration {:?}", other, input),
        };
        rest = &rest[unit_len..];
        nanos += value * scale;
    }

    if nanos > u64::MAX as f64 {
        bail!("duration {:?} out of range", input);
    }
    Ok(Duration::from_nanos(nanos.round() as u64))
}
