use std::collections::BTreeMap;

use log::warn;

use super::model::{FieldSeries, Values};

// ---------------------------------------------------------------------------
// Range limits from the LIMITS config section
// ---------------------------------------------------------------------------

/// A user-configured inclusive value range for one series, keyed by
/// display name. Samples outside the range are dropped after load.
#[derive(Debug, Clone, PartialEq)]
pub struct Limit {
    pub display_name: String,
    pub min: f64,
    pub max: f64,
}

/// Parse the `LIMITS` config section: `display_name = min, max`.
/// Malformed entries (wrong arity, non-numeric bounds) are silently
/// ignored, leaving that series unfiltered.
pub fn parse_limits(section: &BTreeMap<String, String>) -> Vec<Limit> {
    let mut limits = Vec::new();
    for (display_name, bounds) in section {
        let parts: Vec<&str> = bounds.split(',').map(str::trim).collect();
        if parts.len() != 2 {
            continue;
        }
        let (Ok(min), Ok(max)) = (parts[0].parse::<f64>(), parts[1].parse::<f64>()) else {
            continue;
        };
        limits.push(Limit {
            display_name: display_name.clone(),
            min,
            max,
        });
    }
    limits
}

/// Remove every timestamp/value pair outside `[min, max]` (inclusive).
/// NaN values never satisfy the bounds and are dropped too. Text series
/// cannot be range-limited and are left untouched.
pub fn apply(series: &mut FieldSeries, limit: &Limit) {
    let Values::Numeric(values) = &series.values else {
        warn!(
            "Cannot apply limits to non-numeric series '{}'",
            limit.display_name
        );
        return;
    };

    let keep: Vec<bool> = values
        .iter()
        .map(|&v| v >= limit.min && v <= limit.max)
        .collect();

    let mut kept = keep.iter().copied();
    series.timestamps.retain(|_| kept.next().unwrap_or(false));
    let Values::Numeric(values) = &mut series.values else {
        return;
    };
    let mut kept = keep.iter().copied();
    values.retain(|_| kept.next().unwrap_or(false));
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(s: u32) -> chrono::NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(12, 0, s)
            .unwrap()
    }

    fn section(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn parses_valid_entries_and_ignores_malformed_ones() {
        let limits = parse_limits(&section(&[
            ("Temperature", "0, 40"),
            ("Humidity", "0"),
            ("Pressure", "a, b"),
            ("Rain", "0, 5, 10"),
        ]));
        assert_eq!(
            limits,
            vec![Limit {
                display_name: "Temperature".to_string(),
                min: 0.0,
                max: 40.0,
            }]
        );
    }

    #[test]
    fn bounds_are_inclusive_and_nan_is_dropped() {
        let mut series = FieldSeries {
            timestamps: (0..6).map(ts).collect(),
            values: Values::Numeric(vec![-5.0, 0.0, 20.0, 40.0, 45.0, f64::NAN]),
        };
        apply(
            &mut series,
            &Limit {
                display_name: "Temperature".to_string(),
                min: 0.0,
                max: 40.0,
            },
        );
        assert_eq!(series.values.as_numeric().unwrap(), &[0.0, 20.0, 40.0]);
        assert_eq!(series.timestamps, vec![ts(1), ts(2), ts(3)]);
    }

    #[test]
    fn text_series_are_left_untouched() {
        let mut series = FieldSeries {
            timestamps: vec![ts(0)],
            values: Values::Text(vec!["N".to_string()]),
        };
        apply(
            &mut series,
            &Limit {
                display_name: "Direction".to_string(),
                min: 0.0,
                max: 1.0,
            },
        );
        assert_eq!(series.len(), 1);
    }
}
