use std::collections::BTreeMap;

use chrono::{Duration, NaiveDateTime};
use thiserror::Error;

use super::special::{Capability, SpecialField};

// ---------------------------------------------------------------------------
// Errors for the query surface
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("no series with display name '{0}'")]
    UnknownDisplayName(String),
    #[error("no field named '{0}'")]
    UnknownFieldName(String),
    #[error("series '{0}' is not numeric")]
    NotNumeric(String),
    #[error("averaging period must be positive, got {0}s")]
    InvalidPeriod(i64),
}

// ---------------------------------------------------------------------------
// FieldSeries – one column of the merged table
// ---------------------------------------------------------------------------

/// Column values, classified once at load time.
#[derive(Debug, Clone, PartialEq)]
pub enum Values {
    /// Every non-empty cell parsed as a number; empty cells are NaN.
    Numeric(Vec<f64>),
    Text(Vec<String>),
}

impl Values {
    pub fn len(&self) -> usize {
        match self {
            Values::Numeric(v) => v.len(),
            Values::Text(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Values::Numeric(_))
    }

    pub fn as_numeric(&self) -> Option<&[f64]> {
        match self {
            Values::Numeric(v) => Some(v),
            Values::Text(_) => None,
        }
    }
}

/// One field's data: timestamps and values of equal length.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSeries {
    pub timestamps: Vec<NaiveDateTime>,
    pub values: Values,
}

impl FieldSeries {
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn is_numeric(&self) -> bool {
        self.values.is_numeric()
    }
}

// ---------------------------------------------------------------------------
// FieldRegistry – field name ↔ display name bijection
// ---------------------------------------------------------------------------

/// Bijective mapping between CSV field names and user-facing display names.
/// Built once per load, immutable afterwards.
#[derive(Debug, Default)]
pub struct FieldRegistry {
    field_to_display: BTreeMap<String, String>,
    display_to_field: BTreeMap<String, String>,
}

impl FieldRegistry {
    /// Build the mapping for the given fields. A field with a special
    /// handler uses the handler's display name; every other field is its
    /// own display name.
    pub fn build<'a>(
        field_names: impl IntoIterator<Item = &'a str>,
        specials: &BTreeMap<String, Box<dyn SpecialField>>,
    ) -> Self {
        let mut registry = FieldRegistry::default();
        for field in field_names {
            let display = specials
                .get(field)
                .map(|s| s.display_name().to_string())
                .unwrap_or_else(|| field.to_string());
            registry
                .field_to_display
                .insert(field.to_string(), display.clone());
            registry.display_to_field.insert(display, field.to_string());
        }
        registry
    }

    pub fn field_name(&self, display_name: &str) -> Result<&str, DatasetError> {
        self.display_to_field
            .get(display_name)
            .map(String::as_str)
            .ok_or_else(|| DatasetError::UnknownDisplayName(display_name.to_string()))
    }

    pub fn display_name(&self, field_name: &str) -> Result<&str, DatasetError> {
        self.field_to_display
            .get(field_name)
            .map(String::as_str)
            .ok_or_else(|| DatasetError::UnknownFieldName(field_name.to_string()))
    }

    pub fn display_names(&self) -> impl Iterator<Item = &str> {
        self.field_to_display.values().map(String::as_str)
    }
}

// ---------------------------------------------------------------------------
// Dataset – the finished, read-only query surface
// ---------------------------------------------------------------------------

/// The finalized dataset handed off by the load pipeline. Never mutated
/// after construction; a new load builds a wholly new `Dataset`.
pub struct Dataset {
    series: BTreeMap<String, FieldSeries>,
    registry: FieldRegistry,
    numeric_fields: Vec<String>,
    specials: BTreeMap<String, Box<dyn SpecialField>>,
}

impl Dataset {
    pub fn new(
        series: BTreeMap<String, FieldSeries>,
        registry: FieldRegistry,
        numeric_fields: Vec<String>,
        specials: BTreeMap<String, Box<dyn SpecialField>>,
    ) -> Self {
        Dataset {
            series,
            registry,
            numeric_fields,
            specials,
        }
    }

    fn series_by_display(&self, display_name: &str) -> Result<&FieldSeries, DatasetError> {
        let field = self.registry.field_name(display_name)?;
        self.series
            .get(field)
            .ok_or_else(|| DatasetError::UnknownDisplayName(display_name.to_string()))
    }

    /// Timestamps for the requested series.
    pub fn timestamps(&self, display_name: &str) -> Result<&[NaiveDateTime], DatasetError> {
        Ok(&self.series_by_display(display_name)?.timestamps)
    }

    /// Values for the requested series.
    pub fn values(&self, display_name: &str) -> Result<&Values, DatasetError> {
        Ok(&self.series_by_display(display_name)?.values)
    }

    /// Numeric values for the requested series; errors for text series.
    pub fn numeric_values(&self, display_name: &str) -> Result<&[f64], DatasetError> {
        self.series_by_display(display_name)?
            .values
            .as_numeric()
            .ok_or_else(|| DatasetError::NotNumeric(display_name.to_string()))
    }

    /// Resample the series into fixed-width buckets of `period_seconds`,
    /// taking the mean of the finite values in each bucket. Bucket
    /// boundaries are anchored at the first timestamp and each bucket is
    /// reported at its midpoint. Buckets with no samples are omitted.
    pub fn average(
        &self,
        display_name: &str,
        period_seconds: i64,
    ) -> Result<(Vec<NaiveDateTime>, Vec<f64>), DatasetError> {
        if period_seconds <= 0 {
            return Err(DatasetError::InvalidPeriod(period_seconds));
        }
        let series = self.series_by_display(display_name)?;
        let values = series
            .values
            .as_numeric()
            .ok_or_else(|| DatasetError::NotNumeric(display_name.to_string()))?;

        let mut out_times = Vec::new();
        let mut out_values = Vec::new();
        let Some(&start) = series.timestamps.first() else {
            return Ok((out_times, out_values));
        };

        let flush = |idx: i64,
                     sum: f64,
                     count: usize,
                     out_times: &mut Vec<NaiveDateTime>,
                     out_values: &mut Vec<f64>| {
            if count > 0 {
                // Report the bucket at its midpoint, not its start.
                let mid = start
                    + Duration::seconds(idx * period_seconds)
                    + Duration::milliseconds(period_seconds * 500);
                out_times.push(mid);
                out_values.push(sum / count as f64);
            }
        };

        let mut bucket: Option<i64> = None;
        let mut sum = 0.0;
        let mut count = 0usize;
        for (ts, &value) in series.timestamps.iter().zip(values) {
            let idx = (*ts - start).num_seconds() / period_seconds;
            if bucket != Some(idx) {
                if let Some(prev) = bucket {
                    flush(prev, sum, count, &mut out_times, &mut out_values);
                }
                bucket = Some(idx);
                sum = 0.0;
                count = 0;
            }
            if value.is_finite() {
                sum += value;
                count += 1;
            }
        }
        if let Some(prev) = bucket {
            flush(prev, sum, count, &mut out_times, &mut out_values);
        }

        Ok((out_times, out_values))
    }

    /// Number of samples in a series. Unlike the other lookups, an unknown
    /// display name is tolerated here and reported as 0.
    pub fn len(&self, display_name: &str) -> usize {
        self.series_by_display(display_name)
            .map(FieldSeries::len)
            .unwrap_or(0)
    }

    pub fn field_name(&self, display_name: &str) -> Result<&str, DatasetError> {
        self.registry.field_name(display_name)
    }

    pub fn display_name(&self, field_name: &str) -> Result<&str, DatasetError> {
        self.registry.display_name(field_name)
    }

    pub fn display_names(&self) -> Vec<String> {
        self.registry.display_names().map(str::to_string).collect()
    }

    /// Display names of series classified as numeric.
    pub fn numeric_display_names(&self) -> Vec<String> {
        self.numeric_fields
            .iter()
            .filter_map(|f| self.registry.display_name(f).ok())
            .map(str::to_string)
            .collect()
    }

    /// Field (CSV column) names of series classified as numeric.
    pub fn numeric_field_names(&self) -> &[String] {
        &self.numeric_fields
    }

    /// Extra display modes for a series, as reported by its special-field
    /// handler. A series without a handler has no extra capabilities.
    pub fn special_capabilities(
        &self,
        display_name: &str,
    ) -> Result<Vec<Capability>, DatasetError> {
        let field = self.registry.field_name(display_name)?;
        Ok(self
            .specials
            .get(field)
            .map(|s| s.capabilities(self))
            .unwrap_or_default())
    }
}
