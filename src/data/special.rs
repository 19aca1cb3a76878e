use std::collections::BTreeMap;

use log::warn;

use super::model::{Dataset, FieldSeries, Values};

// ---------------------------------------------------------------------------
// Capabilities – extra display modes a special field can offer
// ---------------------------------------------------------------------------

/// Extra ways a series can be displayed, beyond the standard subplots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Capability {
    /// Polar wind-rose plot of a direction series against a speed series.
    Windrose { speed: String, direction: String },
    /// Frequency histogram of the series itself.
    Histogram,
}

impl Capability {
    pub fn label(&self) -> &'static str {
        match self {
            Capability::Windrose { .. } => "Windrose",
            Capability::Histogram => "Histogram",
        }
    }
}

// ---------------------------------------------------------------------------
// SpecialField – per-field conversion applied during load
// ---------------------------------------------------------------------------

/// A per-field transform looked up by field name during the load pipeline.
/// Fields without a handler pass through unchanged; that is the normal
/// path, not an error.
pub trait SpecialField: Send {
    /// The user-facing name this field is displayed under.
    fn display_name(&self) -> &str;

    /// Replace the raw series with the converted one. Conversions may
    /// reclassify values (e.g. compass-point text becomes degrees).
    fn convert(&self, series: FieldSeries) -> FieldSeries;

    /// Extra display modes this field offers, given the finished dataset.
    fn capabilities(&self, _dataset: &Dataset) -> Vec<Capability> {
        Vec::new()
    }
}

/// Build the handler registry from the `SPECIAL FIELDS` config section.
/// Each entry is `field_name = type, display_name, extra args...`.
/// Malformed entries and unknown type tags are logged and skipped.
pub fn registry_from_config(
    section: &BTreeMap<String, String>,
) -> BTreeMap<String, Box<dyn SpecialField>> {
    let mut registry: BTreeMap<String, Box<dyn SpecialField>> = BTreeMap::new();
    for (field_name, options) in section {
        let parts: Vec<&str> = options.split(',').map(str::trim).collect();
        if parts.len() < 2 {
            warn!("Ignoring special field '{field_name}': expected 'type, display_name, ...'");
            continue;
        }
        let kind = parts[0].to_ascii_lowercase();
        let display_name = parts[1].to_string();
        let args = &parts[2..];

        let handler: Box<dyn SpecialField> = match kind.as_str() {
            "winddirection" => Box::new(WindDirection {
                display_name,
                speed_display_name: args
                    .first()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "Wind Speed".to_string()),
            }),
            "windspeed" => Box::new(WindSpeed {
                display_name,
                factor: args.first().and_then(|s| s.parse().ok()),
            }),
            "scale" => match args.first().and_then(|s| s.parse().ok()) {
                Some(factor) => Box::new(Scaled {
                    display_name,
                    factor,
                }),
                None => {
                    warn!("Ignoring scale field '{field_name}': missing or bad factor");
                    continue;
                }
            },
            other => {
                warn!("Ignoring special field '{field_name}': unknown type '{other}'");
                continue;
            }
        };
        registry.insert(field_name.clone(), handler);
    }
    registry
}

// ---------------------------------------------------------------------------
// WindDirection – compass points to degrees
// ---------------------------------------------------------------------------

const COMPASS_POINTS: [(&str, f64); 16] = [
    ("N", 0.0),
    ("NNE", 22.5),
    ("NE", 45.0),
    ("ENE", 67.5),
    ("E", 90.0),
    ("ESE", 112.5),
    ("SE", 135.0),
    ("SSE", 157.5),
    ("S", 180.0),
    ("SSW", 202.5),
    ("SW", 225.0),
    ("WSW", 247.5),
    ("W", 270.0),
    ("WNW", 292.5),
    ("NW", 315.0),
    ("NNW", 337.5),
];

fn compass_to_degrees(token: &str) -> f64 {
    let token = token.trim();
    COMPASS_POINTS
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(token))
        .map(|(_, deg)| *deg)
        .unwrap_or(f64::NAN)
}

/// Wind direction recorded as compass points ("N", "SSW", ...) or already
/// as degrees. Converted to a numeric series in degrees so it can be
/// plotted and fed to the windrose.
struct WindDirection {
    display_name: String,
    speed_display_name: String,
}

impl SpecialField for WindDirection {
    fn display_name(&self) -> &str {
        &self.display_name
    }

    fn convert(&self, series: FieldSeries) -> FieldSeries {
        let values = match series.values {
            Values::Text(cells) => {
                Values::Numeric(cells.iter().map(|c| compass_to_degrees(c)).collect())
            }
            numeric @ Values::Numeric(_) => numeric,
        };
        FieldSeries {
            timestamps: series.timestamps,
            values,
        }
    }

    fn capabilities(&self, dataset: &Dataset) -> Vec<Capability> {
        // A windrose needs a speed series to pair with.
        if dataset.len(&self.speed_display_name) > 0 {
            vec![Capability::Windrose {
                speed: self.speed_display_name.clone(),
                direction: self.display_name.clone(),
            }]
        } else {
            Vec::new()
        }
    }
}

// ---------------------------------------------------------------------------
// WindSpeed – optional scaling, histogram capability
// ---------------------------------------------------------------------------

/// Wind speed, optionally scaled from raw sensor counts, which can also be
/// shown as a frequency histogram.
struct WindSpeed {
    display_name: String,
    factor: Option<f64>,
}

impl SpecialField for WindSpeed {
    fn display_name(&self) -> &str {
        &self.display_name
    }

    fn convert(&self, series: FieldSeries) -> FieldSeries {
        match self.factor {
            Some(factor) => scale_series(series, factor),
            None => series,
        }
    }

    fn capabilities(&self, _dataset: &Dataset) -> Vec<Capability> {
        vec![Capability::Histogram]
    }
}

// ---------------------------------------------------------------------------
// Scaled – plain unit conversion by a constant factor
// ---------------------------------------------------------------------------

struct Scaled {
    display_name: String,
    factor: f64,
}

impl SpecialField for Scaled {
    fn display_name(&self) -> &str {
        &self.display_name
    }

    fn convert(&self, series: FieldSeries) -> FieldSeries {
        scale_series(series, self.factor)
    }
}

fn scale_series(series: FieldSeries, factor: f64) -> FieldSeries {
    let values = match series.values {
        Values::Numeric(v) => Values::Numeric(v.into_iter().map(|x| x * factor).collect()),
        text @ Values::Text(_) => text,
    };
    FieldSeries {
        timestamps: series.timestamps,
        values,
    }
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
    fn wind_direction_converts_compass_text_to_degrees() {
        let registry = section(&[("Direction", "winddirection, Direction, Wind Speed")]);
        let registry = registry_from_config(&registry);
        let handler = registry.get("Direction").unwrap();

        let series = FieldSeries {
            timestamps: vec![ts(0), ts(1), ts(2), ts(3)],
            values: Values::Text(vec![
                "N".to_string(),
                "ssw".to_string(),
                " E ".to_string(),
                "bogus".to_string(),
            ]),
        };
        let converted = handler.convert(series);
        let numbers = converted.values.as_numeric().unwrap();
        assert_eq!(numbers[0], 0.0);
        assert_eq!(numbers[1], 202.5);
        assert_eq!(numbers[2], 90.0);
        assert!(numbers[3].is_nan());
        assert_eq!(converted.timestamps.len(), 4);
    }

    #[test]
    fn wind_speed_applies_scale_factor() {
        let registry = registry_from_config(&section(&[("WS", "windspeed, Wind Speed, 0.5")]));
        let handler = registry.get("WS").unwrap();
        assert_eq!(handler.display_name(), "Wind Speed");

        let series = FieldSeries {
            timestamps: vec![ts(0), ts(1)],
            values: Values::Numeric(vec![4.0, 10.0]),
        };
        let converted = handler.convert(series);
        assert_eq!(converted.values.as_numeric().unwrap(), &[2.0, 5.0]);
    }

    #[test]
    fn malformed_and_unknown_entries_are_skipped() {
        let registry = registry_from_config(&section(&[
            ("A", "justonetoken"),
            ("B", "frobnicate, B Display"),
            ("C", "scale, C Display, notanumber"),
            ("D", "scale, D Display, 2.0"),
        ]));
        assert!(!registry.contains_key("A"));
        assert!(!registry.contains_key("B"));
        assert!(!registry.contains_key("C"));
        assert!(registry.contains_key("D"));
    }
}
