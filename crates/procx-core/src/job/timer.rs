//! Timer job configuration and repeat expressions

use crate::errors::{ProcxError, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Handler configuration of a timer job
///
/// Stored as JSON. Older timer jobs carry only the activity id as plain text;
/// `parse` accepts both forms.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerJobConfiguration {
    pub activity_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timer_end_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calendar_name: Option<String>,
}

impl TimerJobConfiguration {
    pub fn for_activity(activity_id: impl Into<String>) -> Self {
        Self {
            activity_id: Some(activity_id.into()),
            ..Self::default()
        }
    }

    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.starts_with('{') {
            if let Ok(config) = serde_json::from_str::<TimerJobConfiguration>(trimmed) {
                return config;
            }
        }
        Self::for_activity(trimmed)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn end_date(&self) -> Result<Option<DateTime<Utc>>> {
        self.timer_end_date
            .as_deref()
            .map(|s| {
                DateTime::parse_from_rfc3339(s)
                    .map(|d| d.with_timezone(&Utc))
                    .map_err(|e| ProcxError::InvalidTimer {
                        expression: s.to_string(),
                        reason: e.to_string(),
                    })
            })
            .transpose()
    }
}

/// `R[n]/<duration>` or `R[n]/<start>/<duration>`
///
/// `remaining == None` repeats without bound. The optional start date is
/// accepted and ignored; the next due date is always computed from the
/// current one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepeatExpression {
    pub remaining: Option<u32>,
    pub interval: Duration,
    interval_text: String,
}

impl RepeatExpression {
    /// Due date and expression of the following timer, if any
    ///
    /// None once the repetitions are used up, the next due date lies after
    /// `end_date`, or it is beyond the representable range.
    pub fn next(
        &self,
        current_due: DateTime<Utc>,
        end_date: Option<DateTime<Utc>>,
    ) -> Option<(DateTime<Utc>, RepeatExpression)> {
        let remaining = match self.remaining {
            Some(0) | Some(1) => return None,
            Some(n) => Some(n - 1),
            None => None,
        };
        let due = current_due.checked_add_signed(self.interval)?;
        if end_date.map_or(false, |end| due > end) {
            return None;
        }
        Some((
            due,
            RepeatExpression {
                remaining,
                interval: self.interval,
                interval_text: self.interval_text.clone(),
            },
        ))
    }
}

impl fmt::Display for RepeatExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.remaining {
            Some(n) => write!(f, "R{}/{}", n, self.interval_text),
            None => write!(f, "R/{}", self.interval_text),
        }
    }
}

impl FromStr for RepeatExpression {
    type Err = ProcxError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = |reason: &str| ProcxError::InvalidTimer {
            expression: s.to_string(),
            reason: reason.to_string(),
        };
        let parts: Vec<&str> = s.trim().split('/').collect();
        if parts.len() < 2 || parts.len() > 3 {
            return Err(invalid("expected R[n]/[start/]duration"));
        }
        let count = parts[0]
            .strip_prefix('R')
            .ok_or_else(|| invalid("missing R prefix"))?;
        let remaining = if count.is_empty() {
            None
        } else {
            Some(count.parse::<u32>().map_err(|_| invalid("invalid repetition count"))?)
        };
        let interval_text = parts[parts.len() - 1];
        let interval = parse_duration(interval_text)?;
        Ok(Self {
            remaining,
            interval,
            interval_text: interval_text.to_string(),
        })
    }
}

/// ISO-8601 duration with week, day, hour, minute and second designators
pub fn parse_duration(text: &str) -> Result<Duration> {
    let invalid = |reason: &str| ProcxError::InvalidTimer {
        expression: text.to_string(),
        reason: reason.to_string(),
    };
    let body = text.strip_prefix('P').ok_or_else(|| invalid("duration must start with P"))?;
    let mut total = Duration::zero();
    let mut in_time = false;
    let mut number = String::new();
    let mut seen_component = false;

    for ch in body.chars() {
        match ch {
            'T' if !in_time => in_time = true,
            '0'..='9' => number.push(ch),
            designator => {
                let value: i64 = number
                    .parse()
                    .map_err(|_| invalid("missing number before designator"))?;
                number.clear();
                let component = match (in_time, designator) {
                    (false, 'W') => Duration::try_weeks(value),
                    (false, 'D') => Duration::try_days(value),
                    (true, 'H') => Duration::try_hours(value),
                    (true, 'M') => Duration::try_minutes(value),
                    (true, 'S') => Duration::try_seconds(value),
                    _ => return Err(invalid("unsupported designator")),
                };
                total = component
                    .and_then(|c| total.checked_add(&c))
                    .ok_or_else(|| invalid("duration out of range"))?;
                seen_component = true;
            }
        }
    }
    if !number.is_empty() || !seen_component {
        return Err(invalid("incomplete duration"));
    }
    Ok(total)
}
