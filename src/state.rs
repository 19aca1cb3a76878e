use std::path::PathBuf;
use std::sync::mpsc::TryRecvError;
use std::thread::JoinHandle;

use anyhow::Result;
use chrono::NaiveDateTime;
use log::{error, info, warn};

use crate::config::ConfigManager;
use crate::data::loader;
use crate::data::model::Dataset;
use crate::data::pipeline::{LoadPipeline, ProgressEvent, ProgressReceiver};

pub const SUBPLOT_COUNT: usize = 3;

// ---------------------------------------------------------------------------
// Averaging controls
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    Seconds,
    Minutes,
    Hours,
    Days,
    Weeks,
}

impl TimeUnit {
    pub const ALL: [TimeUnit; 5] = [
        TimeUnit::Seconds,
        TimeUnit::Minutes,
        TimeUnit::Hours,
        TimeUnit::Days,
        TimeUnit::Weeks,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            TimeUnit::Seconds => "Seconds",
            TimeUnit::Minutes => "Minutes",
            TimeUnit::Hours => "Hours",
            TimeUnit::Days => "Days",
            TimeUnit::Weeks => "Weeks",
        }
    }

    pub fn seconds(&self) -> i64 {
        match self {
            TimeUnit::Seconds => 1,
            TimeUnit::Minutes => 60,
            TimeUnit::Hours => 60 * 60,
            TimeUnit::Days => 24 * 60 * 60,
            TimeUnit::Weeks => 7 * 24 * 60 * 60,
        }
    }
}

/// A resampled series replacing the raw one on a subplot until reset.
#[derive(Debug, Clone)]
pub struct AveragedSeries {
    pub timestamps: Vec<NaiveDateTime>,
    pub values: Vec<f64>,
}

// ---------------------------------------------------------------------------
// In-flight load
// ---------------------------------------------------------------------------

/// A load running on the worker thread. The UI polls `rx` every frame;
/// the dataset is retrieved from `handle` only after the terminal
/// `ProcessingComplete` event (or channel disconnect on failure).
pub struct LoadInProgress {
    rx: ProgressReceiver,
    handle: JoinHandle<Result<Dataset>>,
    pub percent: u8,
    pub phase: &'static str,
}

// ---------------------------------------------------------------------------
// Application state
// ---------------------------------------------------------------------------

/// The full UI state, independent of rendering.
pub struct AppState {
    pub config: ConfigManager,

    /// Finished dataset; read-only once installed.
    pub dataset: Option<Dataset>,

    /// In-flight load, if any. While set, starting another load is blocked.
    pub load: Option<LoadInProgress>,

    /// Display names shown on the three subplots.
    pub subplots: [Option<String>; SUBPLOT_COUNT],

    /// Per-subplot averaged override (None = raw series).
    pub averaged: [Option<AveragedSeries>; SUBPLOT_COUNT],

    /// Series the averaging/special controls operate on.
    pub selected_series: Option<String>,
    pub average_value: String,
    pub average_unit: TimeUnit,

    /// Open windrose window: (speed, direction) display names.
    pub windrose: Option<(String, String)>,
    /// Open histogram window: display name.
    pub histogram: Option<String>,
    pub show_about: bool,

    /// Status / error message shown in the UI.
    pub status_message: Option<String>,
}

impl AppState {
    pub fn new(config: ConfigManager) -> Self {
        AppState {
            config,
            dataset: None,
            load: None,
            subplots: Default::default(),
            averaged: Default::default(),
            selected_series: None,
            average_value: "10".to_string(),
            average_unit: TimeUnit::Minutes,
            windrose: None,
            histogram: None,
            show_about: false,
            status_message: None,
        }
    }

    pub fn is_loading(&self) -> bool {
        self.load.is_some()
    }

    /// Kick off a load of a new data directory on the worker thread.
    /// Ignored while a load is already in flight.
    pub fn start_load(&mut self, directory: PathBuf) {
        if self.is_loading() {
            warn!("Ignoring load request: a load is already in flight");
            return;
        }
        if !loader::directory_has_data_files(&directory) {
            self.status_message = Some(format!(
                "No CSV files found in '{}'",
                directory.display()
            ));
            return;
        }

        info!("Parsing directory {}", directory.display());
        self.config.load_dataset_config(&directory);
        let pipeline = LoadPipeline::new(directory, &self.config);
        match pipeline.spawn() {
            Ok((rx, handle)) => {
                self.status_message = None;
                self.load = Some(LoadInProgress {
                    rx,
                    handle,
                    percent: 0,
                    phase: "Loading data...",
                });
            }
            Err(e) => {
                error!("Failed to start load: {e:#}");
                self.status_message = Some(format!("Failed to start load: {e:#}"));
            }
        }
    }

    /// Drain pending progress events. Called every frame while loading;
    /// an empty channel just means "no update yet".
    pub fn poll_load(&mut self) {
        loop {
            let Some(load) = &mut self.load else { return };
            match load.rx.try_recv() {
                Ok(ProgressEvent::Percent(p)) => load.percent = p,
                Ok(ProgressEvent::LoadComplete) => {
                    load.phase = "Processing data...";
                    load.percent = 0;
                }
                Ok(ProgressEvent::ProcessingComplete) => {
                    // The dataset is now finalized; take ownership of it.
                    self.finish_load();
                    return;
                }
                Err(TryRecvError::Empty) => return,
                Err(TryRecvError::Disconnected) => {
                    // Worker ended without completing: a fatal load error.
                    self.finish_load();
                    return;
                }
            }
        }
    }

    fn finish_load(&mut self) {
        let Some(load) = self.load.take() else { return };
        match load.handle.join() {
            Ok(Ok(dataset)) => self.install_dataset(dataset),
            Ok(Err(e)) => {
                error!("Data load failed: {e:#}");
                self.status_message = Some(format!("Data load failed: {e:#}"));
            }
            Err(_) => {
                error!("Data load worker panicked");
                self.status_message = Some("Data load failed unexpectedly".to_string());
            }
        }
    }

    /// Install a freshly loaded dataset and populate the subplots: fields
    /// from `DEFAULT.DefaultFields` first, then remaining numeric fields,
    /// up to three.
    fn install_dataset(&mut self, dataset: Dataset) {
        let numeric_fields = dataset.numeric_field_names().to_vec();
        let mut chosen: Vec<String> = Vec::new();

        for field in self.config.default_fields() {
            if chosen.len() == SUBPLOT_COUNT {
                break;
            }
            if numeric_fields.contains(&field) {
                if let Ok(display) = dataset.display_name(&field) {
                    chosen.push(display.to_string());
                }
            }
        }
        for field in &numeric_fields {
            if chosen.len() == SUBPLOT_COUNT {
                break;
            }
            let Ok(display) = dataset.display_name(field) else {
                continue;
            };
            if !chosen.iter().any(|c| c == display) {
                chosen.push(display.to_string());
            }
        }

        self.subplots = Default::default();
        self.averaged = Default::default();
        for (slot, display) in chosen.iter().enumerate() {
            self.subplots[slot] = Some(display.clone());
        }
        self.selected_series = chosen.first().cloned();
        self.windrose = None;
        self.histogram = None;
        self.status_message = None;
        self.dataset = Some(dataset);
    }

    /// Change what a subplot shows, clearing any averaged override.
    pub fn set_subplot(&mut self, slot: usize, display_name: Option<String>) {
        if slot >= SUBPLOT_COUNT {
            return;
        }
        self.subplots[slot] = display_name;
        self.averaged[slot] = None;
        // Keep the series selector pointing at something visible.
        let active = self.active_display_names();
        let selection_gone = self
            .selected_series
            .as_ref()
            .map_or(true, |s| !active.contains(s));
        if selection_gone {
            self.selected_series = active.first().cloned();
        }
    }

    /// Display names currently shown on subplots, in slot order.
    pub fn active_display_names(&self) -> Vec<String> {
        self.subplots.iter().flatten().cloned().collect()
    }

    pub fn subplot_index_of(&self, display_name: &str) -> Option<usize> {
        self.subplots
            .iter()
            .position(|s| s.as_deref() == Some(display_name))
    }

    /// Replace the selected series on its subplot with its average over
    /// the configured period.
    pub fn apply_average(&mut self) {
        let Some(display) = self.selected_series.clone() else {
            return;
        };
        let Some(slot) = self.subplot_index_of(&display) else {
            return;
        };
        let Some(dataset) = &self.dataset else { return };

        let Ok(value) = self.average_value.trim().parse::<f64>() else {
            return;
        };
        let period = (value * self.average_unit.seconds() as f64) as i64;
        if period <= 0 {
            return;
        }

        info!(
            "Averaging {display} over {value} {}",
            self.average_unit.label().to_lowercase()
        );
        match dataset.average(&display, period) {
            Ok((timestamps, values)) => {
                self.averaged[slot] = Some(AveragedSeries { timestamps, values });
            }
            Err(e) => {
                warn!("Could not average {display}: {e}");
                self.status_message = Some(format!("Could not average {display}: {e}"));
            }
        }
    }

    /// Restore the raw series on the selected subplot.
    pub fn reset_average(&mut self) {
        let Some(display) = self.selected_series.clone() else {
            return;
        };
        if let Some(slot) = self.subplot_index_of(&display) {
            info!("Resetting dataset {display} on subplot {slot}");
            self.averaged[slot] = None;
        }
    }
}
