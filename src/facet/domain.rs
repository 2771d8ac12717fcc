//! Value domains of range facets.

use std::fmt;

use chrono::{DateTime, TimeZone, Utc};

use crate::error::{FacetryError, Result};
use crate::facet::date_math::{self, DateMath};

/// How a range facet reads, steps and prints its bounds.
pub trait RangeDomain {
    type Value: Ord + Clone + fmt::Debug;
    type Gap: Clone + fmt::Debug;

    /// Parse an external bound.
    fn parse_value(&self, raw: &str) -> Result<Self::Value>;

    /// Parse an external gap.
    fn parse_gap(&self, raw: &str) -> Result<Self::Gap>;

    /// The next bucket boundary after `value`.
    fn advance(&self, value: &Self::Value, gap: &Self::Gap) -> Result<Self::Value>;

    /// External form of a bound.
    fn format(&self, value: &Self::Value) -> String;

    /// The stored form, comparable with the field's numeric column.
    fn sortable(&self, value: &Self::Value) -> i64;
}

/// Signed integers with integer gaps.
#[derive(Debug, Clone, Copy, Default)]
pub struct NumericDomain;

impl RangeDomain for NumericDomain {
    type Value = i64;
    type Gap = i64;

    fn parse_value(&self, raw: &str) -> Result<i64> {
        raw.trim()
            .parse()
            .map_err(|_| FacetryError::invalid_argument(format!("'{raw}' is not an integer")))
    }

    fn parse_gap(&self, raw: &str) -> Result<i64> {
        let raw = raw.trim();
        raw.strip_prefix('+')
            .unwrap_or(raw)
            .parse()
            .map_err(|_| FacetryError::invalid_gap_math(format!("'{raw}' is not an integer gap")))
    }

    fn advance(&self, value: &i64, gap: &i64) -> Result<i64> {
        value
            .checked_add(*gap)
            .ok_or_else(|| FacetryError::invalid_gap_math(format!("{value} + {gap} overflows")))
    }

    fn format(&self, value: &i64) -> String {
        value.to_string()
    }

    fn sortable(&self, value: &i64) -> i64 {
        *value
    }
}

/// UTC instants with millisecond precision and date-math gaps.
///
/// `NOW` resolves to the clock captured when the domain was created, so every
/// bound of one request sees the same instant.
#[derive(Debug, Clone, Copy)]
pub struct DateDomain {
    now: DateTime<Utc>,
}

impl DateDomain {
    /// A domain anchored at the current time.
    pub fn new() -> Self {
        Self::at(Utc::now())
    }

    /// A domain anchored at a fixed instant.
    pub fn at(now: DateTime<Utc>) -> Self {
        DateDomain {
            now: truncate_millis(now),
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }
}

impl Default for DateDomain {
    fn default() -> Self {
        Self::new()
    }
}

impl RangeDomain for DateDomain {
    type Value = DateTime<Utc>;
    type Gap = DateMath;

    fn parse_value(&self, raw: &str) -> Result<DateTime<Utc>> {
        date_math::evaluate(raw, self.now).map(truncate_millis)
    }

    fn parse_gap(&self, raw: &str) -> Result<DateMath> {
        let gap = DateMath::parse(raw)?;
        if gap.is_empty() {
            return Err(FacetryError::invalid_gap_math("empty date gap"));
        }
        Ok(gap)
    }

    fn advance(&self, value: &DateTime<Utc>, gap: &DateMath) -> Result<DateTime<Utc>> {
        gap.apply(*value)
    }

    fn format(&self, value: &DateTime<Utc>) -> String {
        date_math::format_instant(value)
    }

    fn sortable(&self, value: &DateTime<Utc>) -> i64 {
        value.timestamp_millis()
    }
}

fn truncate_millis(instant: DateTime<Utc>) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(instant.timestamp_millis())
        .single()
        .unwrap_or(instant)
}
