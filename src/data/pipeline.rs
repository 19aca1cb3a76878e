use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::mpsc;
use std::thread;

use anyhow::{bail, Context, Result};
use log::{debug, info, warn};

use crate::config::ConfigManager;

use super::limits::{self, Limit};
use super::loader;
use super::model::{Dataset, FieldRegistry};
use super::special::{self, SpecialField};

// ---------------------------------------------------------------------------
// Progress channel
// ---------------------------------------------------------------------------

/// Maximum queued progress events. The full checkpoint schedule of a load
/// fits comfortably, so the worker never blocks on a polling consumer.
const PROGRESS_CHANNEL_CAPACITY: usize = 256;

/// A progress update from the load worker to the UI thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressEvent {
    /// Percent complete, 0..=100. Not globally monotonic: the scale resets
    /// when the pipeline moves from reading files to processing.
    Percent(u8),
    /// All files read and merged; conversion is about to start.
    LoadComplete,
    /// The whole pipeline finished; the dataset is now safe to query.
    ProcessingComplete,
}

/// Sender handle used by the load worker.
pub type ProgressSender = mpsc::SyncSender<ProgressEvent>;

/// Receiver handle polled by the UI thread.
pub type ProgressReceiver = mpsc::Receiver<ProgressEvent>;

/// Create the bounded single-producer/single-consumer progress channel.
pub fn progress_channel() -> (ProgressSender, ProgressReceiver) {
    mpsc::sync_channel(PROGRESS_CHANNEL_CAPACITY)
}

fn emit(tx: &ProgressSender, event: ProgressEvent) {
    // A dropped receiver means the UI went away; nothing left to notify.
    if tx.send(event).is_err() {
        debug!("Progress receiver dropped, discarding {event:?}");
    }
}

// ---------------------------------------------------------------------------
// LoadPipeline
// ---------------------------------------------------------------------------

/// Drives one complete load: read all CSV files in a directory, merge and
/// sort them, apply special conversions and limits, and produce the final
/// `Dataset`. Runs to completion on a worker thread; progress is reported
/// through the bounded channel and the dataset is handed off through the
/// thread's join handle after `ProcessingComplete`.
pub struct LoadPipeline {
    folder: PathBuf,
    specials: BTreeMap<String, Box<dyn SpecialField>>,
    limits: Vec<Limit>,
}

impl LoadPipeline {
    /// Build a pipeline for a directory, reading the `SPECIAL FIELDS` and
    /// `LIMITS` sections of the dataset configuration.
    pub fn new(folder: PathBuf, config: &ConfigManager) -> Self {
        let specials = special::registry_from_config(&config.dataset_section("SPECIAL FIELDS"));
        let limits = limits::parse_limits(&config.dataset_section("LIMITS"));
        LoadPipeline {
            folder,
            specials,
            limits,
        }
    }

    /// Spawn the worker thread. The returned receiver carries the
    /// checkpoint schedule; the join handle yields the dataset (or the
    /// fatal load error) once `ProcessingComplete` has been observed.
    pub fn spawn(self) -> Result<(ProgressReceiver, thread::JoinHandle<Result<Dataset>>)> {
        let (tx, rx) = progress_channel();
        let handle = thread::Builder::new()
            .name("data-load".to_string())
            .spawn(move || self.run(&tx))
            .context("spawning load worker thread")?;
        Ok((rx, handle))
    }

    /// Run the whole pipeline, emitting the fixed checkpoint schedule:
    /// per-file percentages, `LoadComplete`, then 20/40/60/80/100 and
    /// `ProcessingComplete`. Consumers may display these values literally,
    /// so the order and values are part of the contract.
    pub fn run(self, tx: &ProgressSender) -> Result<Dataset> {
        let files = loader::csv_filenames(&self.folder)?;
        if files.is_empty() {
            bail!("no CSV files found in {}", self.folder.display());
        }

        let total = files.len();
        let mut tables = Vec::with_capacity(total);
        for (count, path) in files.iter().enumerate() {
            tables.push(loader::read_csv_file(path)?);
            emit(tx, ProgressEvent::Percent((count * 100 / total) as u8));
        }
        emit(tx, ProgressEvent::LoadComplete);

        let mut table = loader::merge(tables)?;
        emit(tx, ProgressEvent::Percent(20));

        table.trim_field_names();
        emit(tx, ProgressEvent::Percent(40));

        let mut series = loader::split_series(table);
        emit(tx, ProgressEvent::Percent(60));

        // Apply special conversions; a missing handler is the normal path.
        let fields: Vec<String> = series.keys().cloned().collect();
        for field in &fields {
            match self.specials.get(field) {
                Some(handler) => {
                    if let Some(s) = series.remove(field) {
                        series.insert(field.clone(), handler.convert(s));
                        info!("Applied special conversion to field '{field}'");
                    }
                }
                None => debug!("No special conversion exists for field '{field}'"),
            }
        }
        emit(tx, ProgressEvent::Percent(80));

        let registry = FieldRegistry::build(series.keys().map(String::as_str), &self.specials);
        let numeric_fields: Vec<String> = series
            .iter()
            .filter(|(_, s)| s.is_numeric())
            .map(|(name, _)| name.clone())
            .collect();

        // Limits are configured by display name; map back to field names.
        for limit in &self.limits {
            match registry.field_name(&limit.display_name) {
                Ok(field) => {
                    info!(
                        "Applying limits ({}, {}) to field '{field}'",
                        limit.min, limit.max
                    );
                    if let Some(s) = series.get_mut(field) {
                        limits::apply(s, limit);
                    }
                }
                Err(_) => warn!(
                    "Limit configured for unknown series '{}'",
                    limit.display_name
                ),
            }
        }

        let dataset = Dataset::new(series, registry, numeric_fields, self.specials);
        emit(tx, ProgressEvent::Percent(100));
        emit(tx, ProgressEvent::ProcessingComplete);
        Ok(dataset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigFile;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_file(dir: &TempDir, name: &str, contents: &str) {
        let mut file = std::fs::File::create(dir.path().join(name)).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
    }

    fn config_with(dataset_config: &str) -> ConfigManager {
        let mut config = ConfigManager::default();
        config.set_dataset_config(ConfigFile::parse(dataset_config));
        config
    }

    fn run_collecting(
        pipeline: LoadPipeline,
    ) -> (Result<Dataset>, Vec<ProgressEvent>) {
        let (tx, rx) = progress_channel();
        let result = pipeline.run(&tx);
        drop(tx);
        (result, rx.iter().collect())
    }

    const DATASET_CONFIG: &str = "\
[SPECIAL FIELDS]
Direction = winddirection, Direction, Wind Speed
Wind Speed = windspeed, Wind Speed

[LIMITS]
Temperature = 0, 40
Humidity = nonsense
";

    fn weather_dir() -> TempDir {
        let dir = TempDir::new().unwrap();
        write_file(
            &dir,
            "day1.csv",
            "Ref,Date,Time, Temperature ,Wind Speed,Direction\n\
             1,01/03/2024,10:00:00,-5.0,3.2,N\n\
             2,01/03/2024,11:00:00,12.0,4.1,NNE\n",
        );
        write_file(
            &dir,
            "day2.csv",
            "Ref,Date,Time, Temperature ,Wind Speed,Direction\n\
             1,02/03/2024,10:00:00,45.0,2.0,SSW\n\
             2,02/03/2024,11:00:00,20.0,1.0,W\n",
        );
        dir
    }

    #[test]
    fn emits_exact_checkpoint_schedule() {
        let dir = weather_dir();
        let pipeline = LoadPipeline::new(dir.path().to_path_buf(), &config_with(""));
        let (result, events) = run_collecting(pipeline);
        assert!(result.is_ok());
        assert_eq!(
            events,
            vec![
                ProgressEvent::Percent(0),
                ProgressEvent::Percent(50),
                ProgressEvent::LoadComplete,
                ProgressEvent::Percent(20),
                ProgressEvent::Percent(40),
                ProgressEvent::Percent(60),
                ProgressEvent::Percent(80),
                ProgressEvent::Percent(100),
                ProgressEvent::ProcessingComplete,
            ]
        );
    }

    #[test]
    fn converts_limits_and_capabilities_end_to_end() {
        let dir = weather_dir();
        let pipeline = LoadPipeline::new(dir.path().to_path_buf(), &config_with(DATASET_CONFIG));
        let (result, _) = run_collecting(pipeline);
        let dataset = result.unwrap();

        // Temperature limited to [0, 40]: -5 and 45 dropped.
        assert_eq!(dataset.len("Temperature"), 2);
        for &v in dataset.numeric_values("Temperature").unwrap() {
            assert!((0.0..=40.0).contains(&v));
        }
        // Humidity limit was malformed and ignored; field doesn't exist anyway.
        assert_eq!(dataset.len("Humidity"), 0);

        // Direction converted from compass text to degrees.
        let direction = dataset.numeric_values("Direction").unwrap();
        assert_eq!(direction[0], 0.0);
        assert!(dataset
            .numeric_display_names()
            .contains(&"Direction".to_string()));

        // Capabilities: windrose on Direction, histogram on Wind Speed.
        let caps = dataset.special_capabilities("Direction").unwrap();
        assert!(caps
            .iter()
            .any(|c| matches!(c, crate::data::special::Capability::Windrose { .. })));
        let caps = dataset.special_capabilities("Wind Speed").unwrap();
        assert_eq!(caps, vec![crate::data::special::Capability::Histogram]);
        // Plain fields have no extra capabilities.
        assert_eq!(dataset.special_capabilities("Temperature").unwrap(), vec![]);
    }

    #[test]
    fn merged_timestamps_are_non_decreasing() {
        let dir = weather_dir();
        let pipeline = LoadPipeline::new(dir.path().to_path_buf(), &config_with(""));
        let (result, _) = run_collecting(pipeline);
        let dataset = result.unwrap();
        let times = dataset.timestamps("Temperature").unwrap();
        assert!(times.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(times.len(), 4);
    }

    #[test]
    fn empty_directory_is_a_fatal_error() {
        let dir = TempDir::new().unwrap();
        let pipeline = LoadPipeline::new(dir.path().to_path_buf(), &config_with(""));
        let (result, events) = run_collecting(pipeline);
        assert!(result.is_err());
        assert!(!events.contains(&ProgressEvent::ProcessingComplete));
    }

    #[test]
    fn unparseable_file_aborts_the_whole_load() {
        let dir = TempDir::new().unwrap();
        write_file(
            &dir,
            "good.csv",
            "Ref,Date,Time,Temperature\n1,01/03/2024,10:00:00,1.0\n",
        );
        write_file(
            &dir,
            "bad.csv",
            "Ref,Date,Time,Temperature\n1,garbage,10:00:00,1.0\n",
        );
        let pipeline = LoadPipeline::new(dir.path().to_path_buf(), &config_with(""));
        let (result, events) = run_collecting(pipeline);
        assert!(result.is_err());
        assert!(!events.contains(&ProgressEvent::ProcessingComplete));
    }

    #[test]
    fn spawn_hands_the_dataset_off_through_the_join_handle() {
        let dir = weather_dir();
        let pipeline = LoadPipeline::new(dir.path().to_path_buf(), &config_with(""));
        let (rx, handle) = pipeline.spawn().unwrap();

        // Poll like the UI does until the terminal event arrives.
        let mut complete = false;
        for event in rx.iter() {
            if event == ProgressEvent::ProcessingComplete {
                complete = true;
                break;
            }
        }
        assert!(complete);
        let dataset = handle.join().unwrap().unwrap();
        assert_eq!(dataset.len("Temperature"), 4);
    }
}
