//! Cron-driven dispatch trigger.
//!
//! Supports the standard 5-field format `minute hour day_of_month month
//! day_of_week` with `*`, single values, ranges, lists and steps. Times are
//! matched in local time.

use chrono::{DateTime, Datelike, Duration as ChronoDuration, Local, Timelike};
use std::sync::Arc;

use crate::dispatcher::Dispatcher;
use crate::errors::AppError;

/// A field in a cron expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CronField {
    /// Any value (*).
    Any,
    Value(u8),
    /// Inclusive range.
    Range(u8, u8),
    List(Vec<CronField>),
    /// `*/n` or `a-b/n`.
    Step(Box<CronField>, u8),
}

impl CronField {
    pub fn matches(&self, value: u8) -> bool {
        match self {
            Self::Any => true,
            Self::Value(v) => *v == value,
            Self::Range(start, end) => value >= *start && value <= *end,
            Self::List(fields) => fields.iter().any(|f| f.matches(value)),
            Self::Step(base, step) => match base.as_ref() {
                Self::Any => value % step == 0,
                Self::Range(start, end) => {
                    value >= *start && value <= *end && (value - start) % step == 0
                }
                Self::Value(start) => value >= *start && (value - start) % step == 0,
                other => other.matches(value),
            },
        }
    }
}

/// Parsed 5-field cron expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronExpression {
    pub minutes: CronField,
    pub hours: CronField,
    pub day_of_month: CronField,
    pub month: CronField,
    /// 0-6, 0 = Sunday (7 is accepted as Sunday too).
    pub day_of_week: CronField,
}

impl CronExpression {
    pub fn parse(expr: &str) -> Result<Self, AppError> {
        let fields: Vec<&str> = expr.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(invalid(format!(
                "expected 5 fields, got {} in '{}'",
                fields.len(),
                expr
            )));
        }

        Ok(Self {
            minutes: parse_field(fields[0], 0, 59)?,
            hours: parse_field(fields[1], 0, 23)?,
            day_of_month: parse_field(fields[2], 1, 31)?,
            month: parse_field(fields[3], 1, 12)?,
            day_of_week: parse_field(fields[4], 0, 7)?,
        })
    }

    /// Day-of-month and day-of-week are OR-ed when both are restricted.
    pub fn matches(&self, time: &DateTime<Local>) -> bool {
        let weekday = time.weekday().num_days_from_sunday() as u8;
        let dom = self.day_of_month.matches(time.day() as u8);
        let dow = self.day_of_week.matches(weekday)
            || (weekday == 0 && self.day_of_week.matches(7));
        let day = match (&self.day_of_month, &self.day_of_week) {
            (CronField::Any, _) | (_, CronField::Any) => dom && dow,
            _ => dom || dow,
        };

        self.minutes.matches(time.minute() as u8)
            && self.hours.matches(time.hour() as u8)
            && self.month.matches(time.month() as u8)
            && day
    }
}

fn invalid(message: String) -> AppError {
    AppError::ConfigError(format!("Invalid cron expression: {}", message))
}

fn parse_value(raw: &str, min: u8, max: u8) -> Result<u8, AppError> {
    let value = raw
        .parse::<u8>()
        .map_err(|_| invalid(format!("invalid value '{}'", raw)))?;
    if value < min || value > max {
        return Err(invalid(format!(
            "value {} out of range {}-{}",
            value, min, max
        )));
    }
    Ok(value)
}

fn parse_field(field: &str, min: u8, max: u8) -> Result<CronField, AppError> {
    if field.contains(',') {
        let parts = field
            .split(',')
            .map(|part| parse_field(part, min, max))
            .collect::<Result<Vec<_>, _>>()?;
        return Ok(CronField::List(parts));
    }

    if let Some((base, step)) = field.split_once('/') {
        let step = step
            .parse::<u8>()
            .ok()
            .filter(|s| *s > 0)
            .ok_or_else(|| invalid(format!("invalid step '{}'", step)))?;
        return Ok(CronField::Step(Box::new(parse_field(base, min, max)?), step));
    }

    if field == "*" {
        return Ok(CronField::Any);
    }

    if let Some((start, end)) = field.split_once('-') {
        let start = parse_value(start, min, max)?;
        let end = parse_value(end, min, max)?;
        if start > end {
            return Err(invalid(format!("invalid range {}-{}", start, end)));
        }
        return Ok(CronField::Range(start, end));
    }

    Ok(CronField::Value(parse_value(field, min, max)?))
}

/// Start of the minute following `now`.
pub fn next_minute(now: DateTime<Local>) -> DateTime<Local> {
    let truncated = now
        .with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(now);
    truncated + ChronoDuration::minutes(1)
}

/// Runs once immediately, then whenever `schedule` matches. Never returns.
///
/// Runs are awaited in place, so a run that outlasts a minute boundary just
/// causes that minute to be skipped.
pub async fn run_on_schedule(dispatcher: Arc<Dispatcher>, schedule: CronExpression) {
    run_logged(&dispatcher).await;

    loop {
        let now = Local::now();
        let wake_at = next_minute(now);
        let wait = (wake_at - now).to_std().unwrap_or_default();
        tokio::time::sleep(wait).await;

        if schedule.matches(&wake_at) {
            run_logged(&dispatcher).await;
        }
    }
}

async fn run_logged(dispatcher: &Dispatcher) {
    if let Err(e) = dispatcher.run().await {
        tracing::error!("Dispatch run failed: {}", e);
    }
}
