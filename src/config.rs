use std::collections::BTreeMap;
use std::path::Path;

use log::info;

// ---------------------------------------------------------------------------
// ConfigFile – one parsed ini-style file
// ---------------------------------------------------------------------------

/// A parsed ini-style configuration file: `[SECTION]` headers followed by
/// `key = value` lines. Keys are case-sensitive. Lookups never fail hard;
/// a missing file, section, or key just yields an empty default.
#[derive(Debug, Clone, Default)]
pub struct ConfigFile {
    sections: BTreeMap<String, BTreeMap<String, String>>,
}

impl ConfigFile {
    pub fn parse(text: &str) -> Self {
        let mut sections: BTreeMap<String, BTreeMap<String, String>> = BTreeMap::new();
        let mut current: Option<String> = None;

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
                continue;
            }
            if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
                let name = name.trim().to_string();
                sections.entry(name.clone()).or_default();
                current = Some(name);
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            if let Some(section) = &current {
                sections
                    .entry(section.clone())
                    .or_default()
                    .insert(key.trim().to_string(), value.trim().to_string());
            }
        }
        ConfigFile { sections }
    }

    /// Load a config file, returning an empty config if it doesn't exist.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(text) => {
                info!("Reading config from {}", path.display());
                ConfigFile::parse(&text)
            }
            Err(_) => {
                info!("No config from {}", path.display());
                ConfigFile::default()
            }
        }
    }

    pub fn section(&self, name: &str) -> Option<&BTreeMap<String, String>> {
        self.sections.get(name)
    }

    pub fn value(&self, section: &str, key: &str) -> Option<&str> {
        self.sections.get(section)?.get(key).map(String::as_str)
    }
}

// ---------------------------------------------------------------------------
// Plot styles from the FORMATTING section
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlotKind {
    Line,
    Bar,
}

/// How a field is drawn: line or bar, plus a matplotlib-style colour
/// letter (`b g r c m y k w`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlotStyle {
    pub kind: PlotKind,
    pub color: char,
}

impl Default for PlotStyle {
    fn default() -> Self {
        PlotStyle {
            kind: PlotKind::Line,
            color: 'b',
        }
    }
}

// ---------------------------------------------------------------------------
// ConfigManager
// ---------------------------------------------------------------------------

/// Holds the global application configuration (read once at startup) and
/// the per-dataset configuration (reloaded for every data directory).
#[derive(Debug, Default)]
pub struct ConfigManager {
    global: ConfigFile,
    dataset: Option<ConfigFile>,
}

impl ConfigManager {
    /// Load the global configuration (`config.ini`) from a directory.
    pub fn with_global_config(directory: &Path) -> Self {
        ConfigManager {
            global: ConfigFile::load(&directory.join("config.ini")),
            dataset: None,
        }
    }

    /// Load the dataset configuration (`config.txt`) from a data directory.
    pub fn load_dataset_config(&mut self, directory: &Path) {
        self.dataset = Some(ConfigFile::load(&directory.join("config.txt")));
    }

    #[cfg(test)]
    pub fn with_parsed_global(global: ConfigFile) -> Self {
        ConfigManager {
            global,
            dataset: None,
        }
    }

    #[cfg(test)]
    pub fn set_dataset_config(&mut self, config: ConfigFile) {
        self.dataset = Some(config);
    }

    /// A whole section of the dataset configuration; empty when the
    /// section (or the config itself) is absent.
    pub fn dataset_section(&self, name: &str) -> BTreeMap<String, String> {
        self.dataset
            .as_ref()
            .and_then(|c| c.section(name))
            .cloned()
            .unwrap_or_default()
    }

    pub fn global_value(&self, section: &str, key: &str) -> Option<&str> {
        self.global.value(section, key)
    }

    /// Unit strings per field or display name, dataset entries overriding
    /// the global ones.
    pub fn units(&self) -> BTreeMap<String, String> {
        let mut units = self
            .global
            .section("UNITS")
            .cloned()
            .unwrap_or_default();
        if let Some(dataset) = &self.dataset {
            if let Some(overrides) = dataset.section("UNITS") {
                units.extend(overrides.clone());
            }
        }
        units
    }

    /// Field names to auto-populate the subplots with after a load.
    pub fn default_fields(&self) -> Vec<String> {
        self.global_value("DEFAULT", "DefaultFields")
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Plot style for a field from the dataset `FORMATTING` section,
    /// falling back to a blue line.
    pub fn plot_style(&self, field_name: &str) -> PlotStyle {
        let Some(value) = self
            .dataset
            .as_ref()
            .and_then(|c| c.value("FORMATTING", field_name))
        else {
            return PlotStyle::default();
        };

        let parts: Vec<&str> = value.split(',').map(str::trim).collect();
        let kind = match parts.first() {
            Some(&"bar") => PlotKind::Bar,
            _ => PlotKind::Line,
        };
        let color = parts
            .get(1)
            .and_then(|s| s.chars().next())
            .unwrap_or('b');
        PlotStyle { kind, color }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GLOBAL: &str = "\
[DEFAULT]
DefaultFields = Temperature, Humidity

[UNITS]
Temperature = C
Wind Speed = m/s
";

    const DATASET: &str = "\
; per-dataset overrides
[UNITS]
Temperature = F

[FORMATTING]
Rain = bar, g
Temperature = line
";

    fn manager() -> ConfigManager {
        let mut config = ConfigManager {
            global: ConfigFile::parse(GLOBAL),
            dataset: None,
        };
        config.set_dataset_config(ConfigFile::parse(DATASET));
        config
    }

    #[test]
    fn missing_sections_and_keys_are_empty_defaults() {
        let config = manager();
        assert!(config.dataset_section("LIMITS").is_empty());
        assert_eq!(config.global_value("DEFAULT", "Nope"), None);
        assert_eq!(config.global_value("NOPE", "DefaultFields"), None);
    }

    #[test]
    fn dataset_units_override_global_units() {
        let units = manager().units();
        assert_eq!(units["Temperature"], "F");
        assert_eq!(units["Wind Speed"], "m/s");
    }

    #[test]
    fn default_fields_are_split_and_trimmed() {
        assert_eq!(manager().default_fields(), vec!["Temperature", "Humidity"]);
    }

    #[test]
    fn plot_styles_fall_back_to_blue_line() {
        let config = manager();
        assert_eq!(
            config.plot_style("Rain"),
            PlotStyle {
                kind: PlotKind::Bar,
                color: 'g'
            }
        );
        // Style given without a colour gets the default colour.
        assert_eq!(config.plot_style("Temperature"), PlotStyle::default());
        // Unlisted field gets the full default.
        assert_eq!(config.plot_style("Pressure"), PlotStyle::default());
    }

    #[test]
    fn keys_are_case_sensitive() {
        let config = manager();
        assert_eq!(config.units().get("temperature"), None);
    }
}
