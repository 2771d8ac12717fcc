//! Date math expressions.
//!
//! An expression is an optional anchor followed by any number of operations:
//!
//! ```text
//! NOW/DAY+1MONTH
//! 2002-02-01T00:00:00Z+12HOURS
//! 2002-02-01-7DAYS
//! +1DAY
//! ```
//!
//! `+N UNIT` and `-N UNIT` move the instant, `/UNIT` rounds it down to the
//! start of the unit. Operations apply left to right. Month and year steps
//! use calendar arithmetic and clamp to the last day of a shorter month.

use chrono::{
    DateTime, Datelike, DurationRound, Months, NaiveDate, TimeDelta, Timelike, Utc,
};
use lazy_static::lazy_static;
use regex::Regex;

use crate::error::{FacetryError, Result};

lazy_static! {
    static ref ANCHOR: Regex =
        Regex::new(r"^(\d{4}-\d{2}-\d{2})(T\d{2}:\d{2}:\d{2}(?:\.\d{1,9})?Z)?").unwrap();
    static ref STEP: Regex =
        Regex::new(r"^\s*(?:([+-])\s*(\d+)\s*([A-Za-z]+)|/\s*([A-Za-z]+))").unwrap();
}

/// Calendar unit of a date math operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateUnit {
    Year,
    Month,
    Day,
    Hour,
    Minute,
    Second,
    Millisecond,
}

impl DateUnit {
    /// Parse a unit name; plural forms and `DATE` (for day) are accepted.
    pub fn parse(name: &str) -> Result<Self> {
        let unit = match name.to_ascii_uppercase().as_str() {
            "YEAR" | "YEARS" => DateUnit::Year,
            "MONTH" | "MONTHS" => DateUnit::Month,
            "DAY" | "DAYS" | "DATE" => DateUnit::Day,
            "HOUR" | "HOURS" => DateUnit::Hour,
            "MINUTE" | "MINUTES" => DateUnit::Minute,
            "SECOND" | "SECONDS" => DateUnit::Second,
            "MILLI" | "MILLIS" | "MILLISECOND" | "MILLISECONDS" => DateUnit::Millisecond,
            other => {
                return Err(FacetryError::invalid_gap_math(format!(
                    "unknown date unit '{other}'"
                )));
            }
        };
        Ok(unit)
    }

    /// Fixed length of the unit, `None` for calendar units.
    fn fixed_delta(self, amount: i64) -> Option<TimeDelta> {
        match self {
            DateUnit::Year | DateUnit::Month => None,
            DateUnit::Day => TimeDelta::try_days(amount),
            DateUnit::Hour => TimeDelta::try_hours(amount),
            DateUnit::Minute => TimeDelta::try_minutes(amount),
            DateUnit::Second => TimeDelta::try_seconds(amount),
            DateUnit::Millisecond => TimeDelta::try_milliseconds(amount),
        }
    }
}

/// One date math operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateOp {
    /// Move by a signed number of units.
    Add(i64, DateUnit),
    /// Round down to the start of the unit.
    Round(DateUnit),
}

/// A parsed sequence of date math operations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DateMath {
    ops: Vec<DateOp>,
}

impl DateMath {
    /// Parse operations only (no anchor), e.g. `+1MONTH+12HOURS`.
    pub fn parse(expr: &str) -> Result<Self> {
        let mut ops = Vec::new();
        let mut rest = expr.trim();

        while !rest.is_empty() {
            let caps = STEP.captures(rest).ok_or_else(|| {
                FacetryError::invalid_gap_math(format!("cannot parse '{rest}' in '{expr}'"))
            })?;

            let op = match (caps.get(1), caps.get(2), caps.get(3), caps.get(4)) {
                (Some(sign), Some(amount), Some(unit), _) => {
                    let amount: i64 = amount.as_str().parse().map_err(|_| {
                        FacetryError::invalid_gap_math(format!(
                            "amount '{}' out of range in '{expr}'",
                            amount.as_str()
                        ))
                    })?;
                    let amount = if sign.as_str() == "-" { -amount } else { amount };
                    DateOp::Add(amount, DateUnit::parse(unit.as_str())?)
                }
                (_, _, _, Some(unit)) => DateOp::Round(DateUnit::parse(unit.as_str())?),
                _ => {
                    return Err(FacetryError::invalid_gap_math(format!(
                        "cannot parse '{rest}' in '{expr}'"
                    )));
                }
            };
            ops.push(op);
            rest = rest[caps[0].len()..].trim_start();
        }

        Ok(DateMath { ops })
    }

    pub fn ops(&self) -> &[DateOp] {
        &self.ops
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Apply every operation to `instant`.
    pub fn apply(&self, instant: DateTime<Utc>) -> Result<DateTime<Utc>> {
        self.ops.iter().try_fold(instant, |at, op| match *op {
            DateOp::Add(amount, unit) => add(at, amount, unit),
            DateOp::Round(unit) => round_down(at, unit),
        })
    }
}

/// Evaluate an anchored expression: `NOW`, an ISO-8601 instant or a bare
/// date, followed by optional date math. An expression that starts with an
/// operation is anchored at `now`.
pub fn evaluate(expr: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    let expr = expr.trim();
    let (anchor, math) = if let Some(rest) = expr.strip_prefix("NOW") {
        (now, rest)
    } else if let Some(caps) = ANCHOR.captures(expr) {
        let matched = &caps[0];
        (parse_instant(matched)?, &expr[matched.len()..])
    } else if expr.starts_with(['+', '-', '/']) {
        (now, expr)
    } else {
        return Err(FacetryError::invalid_gap_math(format!(
            "cannot parse date '{expr}'"
        )));
    };

    DateMath::parse(math)?.apply(anchor)
}

/// Format an instant the way range labels show it: whole seconds, plus
/// milliseconds when there are any.
pub fn format_instant(instant: &DateTime<Utc>) -> String {
    if instant.timestamp_subsec_millis() == 0 {
        instant.format("%Y-%m-%dT%H:%M:%SZ").to_string()
    } else {
        instant.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
    }
}

fn parse_instant(text: &str) -> Result<DateTime<Utc>> {
    if text.len() > 10 {
        DateTime::parse_from_rfc3339(text)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| FacetryError::invalid_gap_math(format!("invalid date '{text}': {e}")))
    } else {
        NaiveDate::parse_from_str(text, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|dt| dt.and_utc())
            .ok_or_else(|| FacetryError::invalid_gap_math(format!("invalid date '{text}'")))
    }
}

fn add(at: DateTime<Utc>, amount: i64, unit: DateUnit) -> Result<DateTime<Utc>> {
    let overflow = || {
        FacetryError::invalid_gap_math(format!("{amount} {unit:?} overflows from {at}"))
    };

    let moved = match unit {
        DateUnit::Year | DateUnit::Month => {
            let factor = if unit == DateUnit::Year { 12 } else { 1 };
            let months = amount.checked_mul(factor).ok_or_else(overflow)?;
            let step = u32::try_from(months.unsigned_abs()).map_err(|_| overflow())?;
            if months >= 0 {
                at.checked_add_months(Months::new(step))
            } else {
                at.checked_sub_months(Months::new(step))
            }
        }
        _ => unit
            .fixed_delta(amount)
            .and_then(|delta| at.checked_add_signed(delta)),
    };
    moved.ok_or_else(overflow)
}

fn round_down(at: DateTime<Utc>, unit: DateUnit) -> Result<DateTime<Utc>> {
    let rounded = match unit {
        DateUnit::Year => NaiveDate::from_ymd_opt(at.year(), 1, 1),
        DateUnit::Month => NaiveDate::from_ymd_opt(at.year(), at.month(), 1),
        _ => None,
    };
    if let Some(date) = rounded {
        return date
            .and_hms_opt(0, 0, 0)
            .map(|dt| dt.and_utc())
            .ok_or_else(|| FacetryError::invalid_gap_math(format!("cannot round {at}")));
    }

    let delta = unit
        .fixed_delta(1)
        .ok_or_else(|| FacetryError::internal("calendar unit without fixed length"))?;
    let truncated = at
        .with_nanosecond(at.nanosecond() / 1_000_000 * 1_000_000)
        .unwrap_or(at);
    truncated
        .duration_trunc(delta)
        .map_err(|e| FacetryError::invalid_gap_math(format!("cannot round {at}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::TimeZone;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[test]
    fn test_parse_gap() {
        let math = DateMath::parse("+1MONTH+12HOURS").unwrap();
        assert_eq!(
            math.ops(),
            &[
                DateOp::Add(1, DateUnit::Month),
                DateOp::Add(12, DateUnit::Hour)
            ]
        );

        let math = DateMath::parse("/DAY -2 DAYS").unwrap();
        assert_eq!(
            math.ops(),
            &[DateOp::Round(DateUnit::Day), DateOp::Add(-2, DateUnit::Day)]
        );

        assert!(DateMath::parse("").unwrap().is_empty());
    }

    #[test]
    fn test_parse_errors() {
        for bad in ["+1FORTNIGHT", "1DAY", "+DAY", "+1DAY*2", "+99999999999999999999DAYS"] {
            let err = DateMath::parse(bad).unwrap_err();
            assert!(matches!(err, FacetryError::InvalidGapMath(_)), "{bad}");
        }
    }

    #[test]
    fn test_evaluate_anchors() {
        let now = at(2024, 5, 17, 13, 45, 10);

        assert_eq!(evaluate("NOW", now).unwrap(), now);
        assert_eq!(evaluate("NOW/DAY", now).unwrap(), at(2024, 5, 17, 0, 0, 0));
        assert_eq!(
            evaluate("NOW/MONTH+1MONTH", now).unwrap(),
            at(2024, 6, 1, 0, 0, 0)
        );
        assert_eq!(evaluate("NOW/YEAR", now).unwrap(), at(2024, 1, 1, 0, 0, 0));
        assert_eq!(
            evaluate("2002-02-01T00:00:00Z", now).unwrap(),
            at(2002, 2, 1, 0, 0, 0)
        );
        assert_eq!(evaluate("2002-02-01", now).unwrap(), at(2002, 2, 1, 0, 0, 0));
        assert_eq!(
            evaluate("2002-02-01-7DAYS", now).unwrap(),
            at(2002, 1, 25, 0, 0, 0)
        );
        assert_eq!(evaluate("-1HOUR", now).unwrap(), at(2024, 5, 17, 12, 45, 10));

        assert!(evaluate("yesterday", now).is_err());
        assert!(evaluate("2002-13-01", now).is_err());
    }

    #[test]
    fn test_month_arithmetic_clamps() {
        let jan31 = at(2023, 1, 31, 8, 0, 0);
        let math = DateMath::parse("+1MONTH").unwrap();
        assert_eq!(math.apply(jan31).unwrap(), at(2023, 2, 28, 8, 0, 0));

        let math = DateMath::parse("-1YEAR").unwrap();
        assert_eq!(
            math.apply(at(2024, 2, 29, 0, 0, 0)).unwrap(),
            at(2023, 2, 28, 0, 0, 0)
        );
    }

    #[test]
    fn test_round_down_small_units() {
        let instant = Utc.timestamp_millis_opt(1_700_000_123_456).unwrap();

        let seconds = DateMath::parse("/SECOND").unwrap().apply(instant).unwrap();
        assert_eq!(seconds.timestamp_millis(), 1_700_000_123_000);

        let minutes = DateMath::parse("/MINUTE").unwrap().apply(instant).unwrap();
        assert_eq!(minutes.second(), 0);
        assert_eq!(minutes.timestamp_subsec_millis(), 0);
    }

    #[test]
    fn test_format_instant() {
        assert_eq!(
            format_instant(&at(2002, 2, 1, 0, 0, 0)),
            "2002-02-01T00:00:00Z"
        );
        let with_millis = Utc.timestamp_millis_opt(1_012_521_600_250).unwrap();
        assert_eq!(format_instant(&with_millis), "2002-02-01T00:00:00.250Z");
    }
}
