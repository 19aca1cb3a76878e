use chrono::NaiveDateTime;
use eframe::egui::{self, Color32, Stroke, Ui};
use egui_plot::{Bar, BarChart, Line, Plot, PlotPoint, PlotPoints, Polygon, Text};

use crate::color::{speed_bin_colors, style_color};
use crate::config::{ConfigManager, PlotKind};
use crate::data::model::Dataset;
use crate::state::AppState;

fn ts_to_x(ts: &NaiveDateTime) -> f64 {
    ts.and_utc().timestamp() as f64
}

fn format_tick(value: f64) -> String {
    chrono::DateTime::from_timestamp(value as i64, 0)
        .map(|dt| dt.format("%d/%m %H:%M").to_string())
        .unwrap_or_default()
}

fn unit_label(config: &ConfigManager, display: &str, field: &str) -> String {
    let units = config.units();
    match units.get(display).or_else(|| units.get(field)) {
        Some(unit) => format!("{display} {}", unit.trim()),
        None => display.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Time-series subplots (central panel)
// ---------------------------------------------------------------------------

/// Render the visible subplots, stacked vertically with a shared x-axis.
pub fn time_series(ui: &mut Ui, state: &AppState) {
    let Some(dataset) = &state.dataset else {
        ui.centered_and_justified(|ui: &mut Ui| {
            ui.heading("Open a data directory to view series  (File → Open directory…)");
        });
        return;
    };

    let visible: Vec<(usize, String)> = state
        .subplots
        .iter()
        .enumerate()
        .filter_map(|(slot, name)| name.clone().map(|n| (slot, n)))
        .collect();
    if visible.is_empty() {
        ui.centered_and_justified(|ui: &mut Ui| {
            ui.heading("No subplots selected");
        });
        return;
    }

    let spacing = ui.spacing().item_spacing.y;
    let height = (ui.available_height() - spacing * (visible.len() - 1) as f32)
        / visible.len() as f32;

    for (slot, display) in visible {
        let field = dataset.field_name(&display).unwrap_or(&display).to_string();
        let style = state.config.plot_style(&field);
        let color = style_color(style.color);

        // An averaged override replaces the raw series until reset.
        let points: Vec<[f64; 2]> = match &state.averaged[slot] {
            Some(avg) => avg
                .timestamps
                .iter()
                .zip(&avg.values)
                .filter(|(_, v)| v.is_finite())
                .map(|(t, &v)| [ts_to_x(t), v])
                .collect(),
            None => {
                let (Ok(times), Ok(values)) = (
                    dataset.timestamps(&display),
                    dataset.numeric_values(&display),
                ) else {
                    continue;
                };
                times
                    .iter()
                    .zip(values)
                    .filter(|(_, v)| v.is_finite())
                    .map(|(t, &v)| [ts_to_x(t), v])
                    .collect()
            }
        };

        Plot::new(format!("subplot_{slot}"))
            .height(height)
            .link_axis(egui::Id::new("time_axis"), [true, false])
            .x_axis_formatter(|mark, _range| format_tick(mark.value))
            .y_axis_label(unit_label(&state.config, &display, &field))
            .show(ui, |plot_ui| match style.kind {
                PlotKind::Line => {
                    let line = Line::new(PlotPoints::from(points))
                        .name(&display)
                        .color(color)
                        .width(1.5);
                    plot_ui.line(line);
                }
                PlotKind::Bar => {
                    let bars: Vec<Bar> = points
                        .iter()
                        .map(|p| Bar::new(p[0], p[1]).width(10.0).fill(color))
                        .collect();
                    plot_ui.bar_chart(BarChart::new(bars).name(&display));
                }
            });
    }
}

// ---------------------------------------------------------------------------
// Windrose
// ---------------------------------------------------------------------------

const SECTOR_COUNT: usize = 16;
const SPEED_BIN_COUNT: usize = 6;
const SECTOR_SPAN_DEG: f64 = 360.0 / SECTOR_COUNT as f64;

/// Render a windrose: per-direction-sector frequency wedges, stacked by
/// speed bin. Frequencies are normalized so the rose is independent of
/// sample count.
pub fn windrose(
    ui: &mut Ui,
    dataset: &Dataset,
    config: &ConfigManager,
    speed_display: &str,
    direction_display: &str,
) {
    let (Ok(speeds), Ok(directions)) = (
        dataset.numeric_values(speed_display),
        dataset.numeric_values(direction_display),
    ) else {
        ui.label("Windspeed and direction data must be numeric");
        return;
    };
    if speeds.len() != directions.len() {
        ui.label(format!(
            "Length of direction ({}) and speed ({}) series are not equal",
            directions.len(),
            speeds.len()
        ));
        return;
    }

    let pairs: Vec<(f64, f64)> = speeds
        .iter()
        .zip(directions)
        .filter(|(s, d)| s.is_finite() && d.is_finite())
        .map(|(&s, &d)| (s, d))
        .collect();
    if pairs.is_empty() {
        ui.label("No valid windspeed/direction samples");
        return;
    }

    let max_speed = pairs.iter().map(|(s, _)| *s).fold(0.0, f64::max);
    let bin_width = if max_speed > 0.0 {
        max_speed / SPEED_BIN_COUNT as f64
    } else {
        1.0
    };

    let mut counts = [[0usize; SPEED_BIN_COUNT]; SECTOR_COUNT];
    for (speed, direction) in &pairs {
        let sector = (((direction.rem_euclid(360.0)) + SECTOR_SPAN_DEG / 2.0) / SECTOR_SPAN_DEG)
            as usize
            % SECTOR_COUNT;
        let bin = ((speed / bin_width) as usize).min(SPEED_BIN_COUNT - 1);
        counts[sector][bin] += 1;
    }
    let total = pairs.len() as f64;

    let colors = speed_bin_colors(SPEED_BIN_COUNT);
    let speed_unit = config
        .units()
        .get(speed_display)
        .map(|u| format!(" {}", u.trim()))
        .unwrap_or_default();

    Plot::new("windrose")
        .data_aspect(1.0)
        .show_axes([false, false])
        .show_grid([false, false])
        .legend(egui_plot::Legend::default())
        .show(ui, |plot_ui| {
            for (sector, bins) in counts.iter().enumerate() {
                // Compass convention: 0° = N at the top, clockwise.
                let center_deg = 90.0 - sector as f64 * SECTOR_SPAN_DEG;
                let half_span = (SECTOR_SPAN_DEG * 0.85 / 2.0).to_radians();
                let center = center_deg.to_radians();

                let mut inner = 0.0;
                for (bin, &count) in bins.iter().enumerate() {
                    if count == 0 {
                        continue;
                    }
                    let outer = inner + count as f64 / total;
                    let lo = bin as f64 * bin_width;
                    let hi = lo + bin_width;
                    let wedge = annular_wedge(center, half_span, inner, outer);
                    plot_ui.polygon(
                        Polygon::new(PlotPoints::from(wedge))
                            .name(format!("{lo:.1}–{hi:.1}{speed_unit}"))
                            .fill_color(colors[bin].gamma_multiply(0.7))
                            .stroke(Stroke::new(1.0, colors[bin])),
                    );
                    inner = outer;
                }
            }

            // Cardinal labels just outside the largest wedge.
            let radius = counts
                .iter()
                .map(|bins| bins.iter().sum::<usize>() as f64 / total)
                .fold(0.0, f64::max)
                * 1.15;
            for (label, angle) in [("N", 90.0f64), ("E", 0.0), ("S", -90.0), ("W", 180.0)] {
                let angle = angle.to_radians();
                plot_ui.text(Text::new(
                    PlotPoint::new(radius * angle.cos(), radius * angle.sin()),
                    label,
                ));
            }
        });
}

/// Points of an annular sector between radii `r0..r1` around `center`
/// (radians), used as one stacked wedge of the windrose.
fn annular_wedge(center: f64, half_span: f64, r0: f64, r1: f64) -> Vec<[f64; 2]> {
    const ARC_STEPS: usize = 8;
    let mut points = Vec::with_capacity(2 * (ARC_STEPS + 1));
    for step in 0..=ARC_STEPS {
        let a = center - half_span + 2.0 * half_span * step as f64 / ARC_STEPS as f64;
        points.push([r1 * a.cos(), r1 * a.sin()]);
    }
    for step in (0..=ARC_STEPS).rev() {
        let a = center - half_span + 2.0 * half_span * step as f64 / ARC_STEPS as f64;
        points.push([r0 * a.cos(), r0 * a.sin()]);
    }
    points
}

// ---------------------------------------------------------------------------
// Histogram
// ---------------------------------------------------------------------------

const HISTOGRAM_BINS: usize = 50;

/// Render a frequency histogram (percent per bin) of a numeric series.
pub fn histogram(ui: &mut Ui, dataset: &Dataset, display_name: &str) {
    let Ok(values) = dataset.numeric_values(display_name) else {
        ui.label(format!("'{display_name}' is not numeric"));
        return;
    };
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        ui.label("No samples to plot");
        return;
    }

    let min = finite.iter().copied().fold(f64::INFINITY, f64::min);
    let max = finite.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let width = if max > min {
        (max - min) / HISTOGRAM_BINS as f64
    } else {
        1.0
    };

    let mut counts = [0usize; HISTOGRAM_BINS];
    for &v in &finite {
        let bin = (((v - min) / width) as usize).min(HISTOGRAM_BINS - 1);
        counts[bin] += 1;
    }
    let total = finite.len() as f64;

    let bars: Vec<Bar> = counts
        .iter()
        .enumerate()
        .map(|(bin, &count)| {
            Bar::new(min + (bin as f64 + 0.5) * width, count as f64 / total * 100.0)
                .width(width)
                .fill(Color32::from_rgb(50, 100, 230))
        })
        .collect();

    Plot::new(("histogram", display_name))
        .x_axis_label(display_name)
        .y_axis_label("Frequency (%)")
        .show(ui, |plot_ui| {
            plot_ui.bar_chart(BarChart::new(bars));
        });
}
