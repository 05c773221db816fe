//! Schedule expressions for the periodic trigger.
//!
//! Three forms are accepted, all evaluated in UTC:
//!
//! - `cron(min hour day-of-month month day-of-week year)`: the six-field
//!   cloud-scheduler form; `?` means "any".
//! - `rate(N minute|minutes|hour|hours|day|days)`: a fixed interval.
//! - anything else is handed to the `cron` crate as a seconds-resolution
//!   expression (`sec min hour dom month dow [year]`).

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;
use std::time::Duration;

use chrono::{DateTime, Utc};
use regex::Regex;

use crate::error::{Result, SchedulerError};

fn rate_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^rate\(\s*(\d+)\s+(minute|minutes|hour|hours|day|days)\s*\)$")
            .expect("valid regex")
    })
}

fn cloud_cron_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^cron\((.*)\)$").expect("valid regex"))
}

#[derive(Clone)]
pub enum Schedule {
    Cron {
        expr: String,
        inner: cron::Schedule,
    },
    Rate {
        expr: String,
        every: Duration,
    },
}

impl Schedule {
    pub fn parse(expr: &str) -> Result<Self> {
        let expr = expr.trim();
        let invalid = |reason: String| SchedulerError::InvalidSchedule {
            expr: expr.to_string(),
            reason,
        };

        if let Some(caps) = rate_re().captures(expr) {
            let n: u64 = caps[1]
                .parse()
                .map_err(|e| invalid(format!("bad rate value: {e}")))?;
            if n == 0 {
                return Err(invalid("rate must be at least 1".into()));
            }
            let unit_secs: u64 = match &caps[2] {
                "minute" | "minutes" => 60,
                "hour" | "hours" => 60 * 60,
                _ => 24 * 60 * 60,
            };
            let secs = n
                .checked_mul(unit_secs)
                .ok_or_else(|| invalid("rate interval is too large".into()))?;
            return Ok(Self::Rate {
                expr: expr.to_string(),
                every: Duration::from_secs(secs),
            });
        }

        if expr.starts_with("rate(") {
            return Err(invalid(
                "expected rate(N minute|minutes|hour|hours|day|days)".into(),
            ));
        }

        let seconds_form = match cloud_cron_re().captures(expr) {
            Some(caps) => cloud_to_seconds_form(&caps[1]).map_err(invalid)?,
            None => expr.to_string(),
        };

        let inner = cron::Schedule::from_str(&seconds_form).map_err(|e| invalid(e.to_string()))?;
        Ok(Self::Cron {
            expr: expr.to_string(),
            inner,
        })
    }

    pub fn expr(&self) -> &str {
        match self {
            Self::Cron { expr, .. } | Self::Rate { expr, .. } => expr,
        }
    }

    /// The next fire time strictly after `after`, or `None` if the schedule
    /// is exhausted (e.g. a cron expression pinned to a past year).
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Self::Cron { inner, .. } => inner.after(&after).next(),
            Self::Rate { every, .. } => {
                let every = chrono::Duration::from_std(*every).ok()?;
                after.checked_add_signed(every)
            }
        }
    }

    /// The next `count` fire times after `after`.
    pub fn upcoming(&self, after: DateTime<Utc>, count: usize) -> Vec<DateTime<Utc>> {
        let mut out = Vec::with_capacity(count);
        let mut cursor = after;
        while out.len() < count {
            match self.next_after(cursor) {
                Some(next) => {
                    out.push(next);
                    cursor = next;
                }
                None => break,
            }
        }
        out
    }

    /// The shortest gap between consecutive fire times over the next few
    /// ticks after `after`. Used to warn when runs can overlap.
    pub fn shortest_gap(&self, after: DateTime<Utc>) -> Option<Duration> {
        if let Self::Rate { every, .. } = self {
            return Some(*every);
        }
        self.upcoming(after, 8)
            .windows(2)
            .filter_map(|w| (w[1] - w[0]).to_std().ok())
            .min()
    }
}

impl fmt::Debug for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Schedule").field(&self.expr()).finish()
    }
}

/// `min hour dom month dow year` → `0 min hour dom month dow year`.
fn cloud_to_seconds_form(body: &str) -> std::result::Result<String, String> {
    let fields: Vec<&str> = body.split_whitespace().collect();
    if fields.len() != 6 {
        return Err(format!(
            "cron() takes 6 fields (minutes hours day-of-month month day-of-week year), got {}",
            fields.len()
        ));
    }
    let fields: Vec<&str> = fields
        .into_iter()
        .map(|f| if f == "?" { "*" } else { f })
        .collect();
    Ok(format!("0 {}", fields.join(" ")))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
