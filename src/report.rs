//! Client-side report aggregation over fetched documents.
//!
//! [aggregate] groups flat rows by a composite key and sums numeric columns. [Rollup] chains it
//! date → month → year, each level re-aggregating the previous level's rows.

use std::{collections::HashMap, str::FromStr};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde_json::{Map, Number, Value};
use tracing::warn;

pub type Row = Map<String, Value>;

/// Bucket used for records whose date cannot be parsed.
pub const UNKNOWN_PERIOD: &str = "unknown";

fn parse_decimal(text: &str) -> Option<Decimal> {
    Decimal::from_str(text)
        .or_else(|_| Decimal::from_scientific(text))
        .ok()
}

/// Numeric value of a field. Missing and non-numeric values count as 0; numeric strings may carry
/// thousands separators.
///
/// Totals are kept as exact decimals so the grouping order never changes a sum.
pub fn numeric_value(value: Option<&Value>) -> Decimal {
    let parsed = match value {
        Some(Value::Number(number)) => parse_decimal(&number.to_string()),
        Some(Value::String(text)) => parse_decimal(&text.trim().replace(',', "")),
        _ => None,
    };
    parsed.unwrap_or(Decimal::ZERO)
}

fn number_value(total: Decimal) -> Value {
    // Integral totals stay integers so rows compare equal to hand-written JSON.
    let text = total.normalize().to_string();
    match Number::from_str(&text) {
        Ok(number) => Value::Number(number),
        Err(_) => {
            warn!(total = %text, "Total not representable as JSON number");
            Value::Null
        }
    }
}

fn key_part(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
    }
}

/// Grouping definition. Build with [Aggregation::new] and run with [Aggregation::run].
#[derive(Debug, Clone)]
pub struct Aggregation<'a> {
    group_by: &'a [&'a str],
    sum_fields: &'a [&'a str],
    count_as: Option<&'a str>,
}

impl<'a> Aggregation<'a> {
    pub fn new(group_by: &'a [&'a str], sum_fields: &'a [&'a str]) -> Self {
        Aggregation {
            group_by,
            sum_fields,
            count_as: None,
        }
    }

    /// Adds a column holding the number of input rows folded into each group.
    pub fn count_as(mut self, field: &'a str) -> Self {
        self.count_as = Some(field);
        self
    }

    /// One row per distinct key, in first-seen order. Non-key, non-sum fields keep their first-seen value.
    pub fn run(&self, records: &[Row]) -> Vec<Row> {
        let mut index: HashMap<Vec<String>, usize> = HashMap::new();
        let mut rows: Vec<Row> = Vec::new();
        let mut totals: Vec<(Vec<Decimal>, u64)> = Vec::new();

        for record in records {
            let key: Vec<String> = self
                .group_by
                .iter()
                .map(|field| key_part(record.get(*field)))
                .collect();

            let slot = *index.entry(key).or_insert_with(|| {
                rows.push(record.clone());
                totals.push((vec![Decimal::ZERO; self.sum_fields.len()], 0));
                rows.len() - 1
            });

            let (sums, count) = &mut totals[slot];
            for (sum, field) in sums.iter_mut().zip(self.sum_fields) {
                *sum = sum.saturating_add(numeric_value(record.get(*field)));
            }
            *count += 1;
        }

        for (row, (sums, count)) in rows.iter_mut().zip(totals) {
            for (field, sum) in self.sum_fields.iter().zip(sums) {
                row.insert(field.to_string(), number_value(sum));
            }
            if let Some(field) = self.count_as {
                row.insert(field.to_string(), Value::from(count));
            }
        }

        rows
    }
}

/// Shorthand for `Aggregation::new(group_by, sum_fields).run(records)`.
pub fn aggregate(records: &[Row], group_by: &[&str], sum_fields: &[&str]) -> Vec<Row> {
    Aggregation::new(group_by, sum_fields).run(records)
}

/// Distinct values of `field`, first-seen order. Records lacking the field are skipped.
pub fn distinct(records: &[Row], field: &str) -> Vec<Value> {
    let mut seen = Vec::new();
    for value in records.iter().filter_map(|record| record.get(field)) {
        if !value.is_null() && !seen.contains(value) {
            seen.push(value.clone());
        }
    }
    seen
}

/// Stable sort of rows by the string form of `field`.
pub fn sort_rows_by(rows: &mut [Row], field: &str) {
    rows.sort_by_key(|row| key_part(row.get(field)));
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    Date,
    Month,
    Year,
}

impl Period {
    pub fn field(&self) -> &'static str {
        match self {
            Self::Date => "date",
            Self::Month => "month",
            Self::Year => "year",
        }
    }

    fn format(&self) -> &'static str {
        match self {
            Self::Date => "%Y-%m-%d",
            Self::Month => "%Y-%m",
            Self::Year => "%Y",
        }
    }

    /// Period key of a raw record, read from its `date` field (`YYYY-MM-DD`, time suffix ignored).
    pub fn key_of(&self, record: &Row) -> String {
        let raw = record.get("date").and_then(Value::as_str).unwrap_or_default();
        let day = raw.split(['T', ' ']).next().unwrap_or_default();
        match NaiveDate::parse_from_str(day, "%Y-%m-%d") {
            Ok(date) => date.format(self.format()).to_string(),
            Err(_) => {
                warn!(date = raw, "Unparseable report date");
                UNKNOWN_PERIOD.to_string()
            }
        }
    }

    /// Coarsens a finer period key (`2024-01-05` → `2024-01` → `2024`).
    fn coarsen(&self, finer: &str) -> String {
        let len = match self {
            Self::Date => 10,
            Self::Month => 7,
            Self::Year => 4,
        };
        match finer.get(..len) {
            Some(prefix) if finer != UNKNOWN_PERIOD => prefix.to_string(),
            _ => UNKNOWN_PERIOD.to_string(),
        }
    }
}

/// Chained date → month → year rollup over the same dimensions and sum columns.
///
/// Rollup rows hold only the period field, the dimension fields and the totals.
#[derive(Debug, Clone)]
pub struct Rollup<'a> {
    dimensions: &'a [&'a str],
    sum_fields: &'a [&'a str],
    count_as: Option<&'a str>,
}

impl<'a> Rollup<'a> {
    pub fn new(dimensions: &'a [&'a str], sum_fields: &'a [&'a str]) -> Self {
        Rollup {
            dimensions,
            sum_fields,
            count_as: None,
        }
    }

    pub fn count_as(mut self, field: &'a str) -> Self {
        self.count_as = Some(field);
        self
    }

    fn project(&self, period: Period, key: String, source: &Row, seed_count: bool) -> Row {
        let mut row = Row::new();
        row.insert(period.field().to_string(), Value::String(key));
        for field in self.dimensions.iter().chain(self.sum_fields) {
            if let Some(value) = source.get(*field) {
                row.insert(field.to_string(), value.clone());
            }
        }
        if let Some(field) = self.count_as {
            let count = if seed_count {
                Value::from(1)
            } else {
                source.get(field).cloned().unwrap_or(Value::from(0))
            };
            row.insert(field.to_string(), count);
        }
        row
    }

    fn run(&self, period: Period, rows: Vec<Row>) -> Vec<Row> {
        let group_by: Vec<&str> = std::iter::once(period.field())
            .chain(self.dimensions.iter().copied())
            .collect();
        let sum_fields: Vec<&str> = self
            .sum_fields
            .iter()
            .copied()
            .chain(self.count_as)
            .collect();
        aggregate(&rows, &group_by, &sum_fields)
    }

    /// Date-level rows from raw records.
    pub fn daily(&self, records: &[Row]) -> Vec<Row> {
        let projected = records
            .iter()
            .map(|record| self.project(Period::Date, Period::Date.key_of(record), record, true))
            .collect();
        self.run(Period::Date, projected)
    }

    /// Month-level rows re-aggregated from date-level rows.
    pub fn monthly(&self, daily: &[Row]) -> Vec<Row> {
        self.coarsen(Period::Date, Period::Month, daily)
    }

    /// Year-level rows re-aggregated from month-level rows.
    pub fn yearly(&self, monthly: &[Row]) -> Vec<Row> {
        self.coarsen(Period::Month, Period::Year, monthly)
    }

    fn coarsen(&self, from: Period, to: Period, rows: &[Row]) -> Vec<Row> {
        let projected = rows
            .iter()
            .map(|row| {
                let finer = row.get(from.field()).and_then(Value::as_str).unwrap_or(UNKNOWN_PERIOD);
                self.project(to, to.coarsen(finer), row, false)
            })
            .collect();
        self.run(to, projected)
    }

    /// Full chain up to `period`.
    pub fn rollup(&self, records: &[Row], period: Period) -> Vec<Row> {
        let daily = self.daily(records);
        match period {
            Period::Date => daily,
            Period::Month => self.monthly(&daily),
            Period::Year => self.yearly(&self.monthly(&daily)),
        }
    }

    /// Aggregates raw records straight into `period`, without the intermediate levels.
    pub fn direct(&self, records: &[Row], period: Period) -> Vec<Row> {
        let projected = records
            .iter()
            .map(|record| self.project(period, period.key_of(record), record, true))
            .collect();
        self.run(period, projected)
    }
}
