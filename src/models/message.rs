use anyhow::{anyhow, Result};
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Write};

/// strftime layout of the bracketed CLF timestamp.
pub const DEFAULT_TIME_FORMAT: &str = "%d/%b/%Y:%H:%M:%S %z";

/// Line template; `{field}` placeholders are replaced by [`Message::render`].
pub const DEFAULT_LOG_FORMAT: &str =
    r#"{remote} {ident} {auth} [{time}] "{method} {uri} {proto}" {status} {size}"#;

pub const EXAMPLE_LOG_LINE: &str =
    r#"127.0.0.1 - frank [10/Oct/2000:13:55:36 -0700] "GET /apache_pb.gif HTTP/1.0" 200 2326"#;

/// One HTTP access-log record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub remote: String,
    pub ident:  String,
    pub auth:   String,
    pub time:   DateTime<FixedOffset>,
    pub method: String,
    pub uri:    String,
    pub proto:  String,
    pub status: u16,
    pub size:   u64,
}

impl Message {
    /// Fill `template` with this record's fields. Unknown placeholders are
    /// kept verbatim.
    pub fn render(&self, template: &str, time_format: &str) -> Result<String> {
        let mut out = String::with_capacity(template.len() + 64);
        let mut rest = template;

        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let tail = &rest[open..];
            let close = match tail.find('}') {
                Some(i) => i,
                None    => {
                    rest = tail;
                    break;
                }
            };
            let key = &tail[1..close];
            let written = match key {
                "remote" => write!(out, "{}", self.remote),
                "ident"  => write!(out, "{}", self.ident),
                "auth"   => write!(out, "{}", self.auth),
                "time"   => write!(out, "{}", self.time.format(time_format)),
                "method" => write!(out, "{}", self.method),
                "uri"    => write!(out, "{}", self.uri),
                "proto"  => write!(out, "{}", self.proto),
                "status" => write!(out, "{}", self.status),
                "size"   => write!(out, "{}", self.size),
                _        => write!(out, "{}", &tail[..=close]),
            };
            written.map_err(|_| anyhow!("invalid time format {:?}", time_format))?;
            rest = &tail[close + 1..];
        }
        out.push_str(rest);
        Ok(out)
    }

    /// Common Log Format with a caller-chosen timestamp layout.
    pub fn to_clf(&self, time_format: &str) -> Result<String> {
        self.render(DEFAULT_LOG_FORMAT, time_format)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

impl fmt::Display for Message {
    /// Common Log Format.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} [{}] \"{} {} {}\" {} {}",
            self.remote,
            self.ident,
            self.auth,
            self.time.format(DEFAULT_TIME_FORMAT),
            self.method,
            self.uri,
            self.proto,
            self.status,
            self.size,
        )
    }
}
