use eframe::egui::{self, Color32, TextureHandle, TextureOptions, Ui};
use egui_extras::{Column, TableBuilder};
use egui_plot::{Legend, Line, LineStyle, Plot, PlotImage, PlotPoint, PlotPoints, Points, Polygon};

use crate::color::{generate_palette, heat_color, HeatImage};
use crate::data::raster::{energy_axis, CHANNEL_SCALE_EV};
use crate::data::session::{apply_scale, progression_axis_label};
use crate::state::AppState;

/// Uploaded heat-map texture and the state revision it was built from.
pub type RasterTexture = (u64, TextureHandle);

const WINDOW_FILL: Color32 = Color32::from_rgba_premultiplied(90, 30, 30, 60);

fn counts_label(log: bool) -> &'static str {
    if log { "Counts (log)" } else { "Counts" }
}

fn base_plot(id: &str, show_legend: bool) -> Plot<'_> {
    let plot = Plot::new(id)
        .allow_boxed_zoom(true)
        .allow_drag(true)
        .allow_scroll(true)
        .allow_zoom(true);
    if show_legend {
        plot.legend(Legend::default())
    } else {
        plot
    }
}

/// Shaded rectangle spanning `[low, high]` up to `top`.
fn window_band(low: f64, high: f64, top: f64) -> Vec<[f64; 2]> {
    vec![[low, 0.0], [high, 0.0], [high, top], [low, top]]
}

fn max_of(values: &[f64]) -> f64 {
    values.iter().copied().fold(0.0, f64::max)
}

fn no_data(ui: &mut Ui, text: &str) {
    ui.centered_and_justified(|ui: &mut Ui| {
        ui.heading(text);
    });
}

// ---------------------------------------------------------------------------
// Raster mode: mean spectrum + heat map
// ---------------------------------------------------------------------------

pub fn raster_view(ui: &mut Ui, state: &AppState, texture: &mut Option<RasterTexture>) {
    if state.raster.is_none() {
        no_data(ui, "Open a scan folder to view the raster  (File → Open scan folder…)");
        return;
    }
    let half = (ui.available_height() / 2.0 - 16.0).max(160.0);
    raster_spectrum_plot(ui, state, half);
    ui.separator();
    raster_heatmap(ui, state, texture);
}

fn raster_spectrum_plot(ui: &mut Ui, state: &AppState, height: f32) {
    let Some(scan) = &state.raster else {
        return;
    };
    let config = &state.config;
    let energies = energy_axis(scan.collection.channels(), CHANNEL_SCALE_EV);
    let to_points = |values: &[f64]| -> Vec<[f64; 2]> {
        energies
            .iter()
            .zip(apply_scale(values, config.log_display))
            .map(|(&e, y)| [e, y])
            .collect()
    };

    let mean = apply_scale(&scan.mean.values, config.log_display);
    let window = config.window();
    let strong = ui.visuals().strong_text_color();

    base_plot("raster_spectrum", config.show_legend)
        .height(height)
        .x_axis_label("Energy (eV)")
        .y_axis_label(counts_label(config.log_display))
        .show(ui, |plot_ui| {
            let band = window_band(window.low(), window.high(), max_of(&mean).max(1.0));
            plot_ui.polygon(
                Polygon::new(PlotPoints::from(band))
                    .fill_color(WINDOW_FILL)
                    .name("Window"),
            );

            if config.show_all_traces {
                let palette = generate_palette(scan.collection.len());
                for ((step, sp), color) in scan.collection.iter().zip(palette) {
                    let counts: Vec<f64> = sp.counts.iter().map(|&c| c as f64).collect();
                    plot_ui.line(
                        Line::new(to_points(&counts))
                            .name(format!("Trace {step}"))
                            .color(color)
                            .width(1.0),
                    );
                }
            }
            if config.show_mean {
                plot_ui.line(
                    Line::new(to_points(&scan.mean.values))
                        .name("Average")
                        .color(strong)
                        .width(1.5),
                );
            }
        });
}

fn raster_heatmap(ui: &mut Ui, state: &AppState, texture: &mut Option<RasterTexture>) {
    if let Some(err) = &state.raster_error {
        ui.colored_label(Color32::RED, format!("Raster unavailable: {err}"));
        return;
    }
    let Some(view) = &state.raster_view else {
        return;
    };

    let heat = HeatImage::from_matrix(&view.matrix, state.config.max_counts);
    let stale = texture
        .as_ref()
        .map_or(true, |(revision, _)| *revision != state.revision);
    if stale {
        let mut image = egui::ColorImage::new([heat.width, heat.height], Color32::BLACK);
        image.pixels = heat.pixels.clone();
        let handle = ui
            .ctx()
            .load_texture("raster", image, TextureOptions::NEAREST);
        *texture = Some((state.revision, handle));
    }
    let Some((_, handle)) = texture.as_ref() else {
        return;
    };

    let xp = state.config.x_pixel_um;
    let zp = state.config.z_pixel_um;
    let width_um = heat.width as f64 * xp;
    let height_um = heat.height as f64 * zp;
    // Pixel centers sit on the stage coordinates 0, pitch, 2*pitch, ...
    let center = PlotPoint::new((width_um - xp) / 2.0, (height_um - zp) / 2.0);

    ui.horizontal(|ui: &mut Ui| {
        ui.strong(&view.title);
        ui.label(format!("Sum of Counts: 0 – {:.0}", heat.ceiling));
        colour_bar(ui);
    });

    let mut hovered: Option<(usize, usize)> = None;
    Plot::new("raster_heatmap")
        .x_axis_label("X [µm]")
        .y_axis_label("Z [µm]")
        .allow_boxed_zoom(true)
        .show(ui, |plot_ui| {
            plot_ui.image(PlotImage::new(
                handle,
                center,
                [width_um as f32, height_um as f32],
            ));
            if let Some(pos) = plot_ui.pointer_coordinate() {
                let i = ((pos.x + xp / 2.0) / xp).floor();
                let j = ((pos.y + zp / 2.0) / zp).floor();
                if i >= 0.0 && j >= 0.0 && (i as usize) < heat.width && (j as usize) < heat.height
                {
                    hovered = Some((i as usize, j as usize));
                }
            }
        });

    if let Some((i, j)) = hovered {
        ui.label(format!(
            "X = {} µm, Z = {} µm: {} counts",
            view.x_axis[i],
            view.z_axis[j],
            view.matrix.get(i, j)
        ));
    }
}

fn colour_bar(ui: &mut Ui) {
    let (rect, _) = ui.allocate_exact_size(egui::vec2(120.0, 12.0), egui::Sense::hover());
    let steps = 32;
    let w = rect.width() / steps as f32;
    for s in 0..steps {
        let x0 = rect.left() + s as f32 * w;
        let seg = egui::Rect::from_min_size(
            egui::pos2(x0, rect.top()),
            egui::vec2(w + 0.5, rect.height()),
        );
        ui.painter()
            .rect_filled(seg, 0.0, heat_color(s as f64 / (steps - 1) as f64));
    }
}

// ---------------------------------------------------------------------------
// Spectra mode: uploaded spectra, peak analysis, progression
// ---------------------------------------------------------------------------

pub fn session_view(ui: &mut Ui, state: &AppState) {
    if state.session.is_empty() {
        no_data(ui, "Open summed spectra to begin  (File → Open spectra…)");
        return;
    }
    let config = &state.config;
    let spectra = state.session.spectra();
    let palette = generate_palette(spectra.len());
    let window = config.window();
    let strong = ui.visuals().strong_text_color();

    let with_analysis = state.analysis.is_some();
    let top_height = if with_analysis {
        (ui.available_height() * 0.45).max(160.0)
    } else {
        ui.available_height()
    };

    let shown: Vec<Vec<f64>> = spectra
        .iter()
        .map(|sp| apply_scale(&sp.counts, config.log_display))
        .collect();
    let top = shown.iter().map(|v| max_of(v)).fold(1.0, f64::max);

    base_plot("session_spectra", config.show_legend)
        .height(top_height)
        .x_axis_label("Energy (eV)")
        .y_axis_label(counts_label(config.log_display))
        .show(ui, |plot_ui| {
            let (low, high) = match &state.analysis {
                Some(a) => (
                    a.window_x.first().copied().unwrap_or(window.low()),
                    a.window_x.last().copied().unwrap_or(window.high()),
                ),
                None => (window.low(), window.high()),
            };
            plot_ui.polygon(
                Polygon::new(PlotPoints::from(window_band(low, high, top)))
                    .fill_color(WINDOW_FILL)
                    .name("Window"),
            );
            for ((sp, values), color) in spectra.iter().zip(&shown).zip(&palette) {
                let points: PlotPoints = values
                    .iter()
                    .enumerate()
                    .map(|(i, &y)| [i as f64 * config.channel_scale_ev, y])
                    .collect();
                plot_ui.line(Line::new(points).name(&sp.name).color(*color).width(1.5));
            }
        });

    if let Some(err) = &state.session_error {
        ui.colored_label(Color32::RED, format!("Peak analysis unavailable: {err}"));
        return;
    }
    let Some(analysis) = &state.analysis else {
        return;
    };

    ui.separator();
    let lower_height = (ui.available_height() - 140.0).max(160.0);
    ui.columns(2, |cols| {
        base_plot("session_peaks", config.show_legend)
            .height(lower_height)
            .x_axis_label("Energy (eV)")
            .y_axis_label(format!("{} at peak", counts_label(config.log_display)))
            .show(&mut cols[0], |plot_ui| {
                for ((sp, peak), color) in spectra.iter().zip(&analysis.peaks).zip(&palette) {
                    plot_ui.points(
                        Points::new(vec![[peak.x, peak.value]])
                            .radius(4.0)
                            .name(&sp.name)
                            .color(*color),
                    );
                }
                let average: PlotPoints = analysis
                    .window_x
                    .iter()
                    .zip(&analysis.average)
                    .map(|(&x, &y)| [x, y])
                    .collect();
                plot_ui.line(Line::new(average).name("Average").color(strong).width(1.5));
            });

        base_plot("session_progression", false)
            .height(lower_height)
            .x_axis_label(progression_axis_label(config.step_size, &config.step_unit))
            .y_axis_label(config.metric.label())
            .show(&mut cols[1], |plot_ui| {
                let pts: Vec<[f64; 2]> =
                    analysis.progression.points.iter().map(|&(x, y)| [x, y]).collect();
                plot_ui.line(
                    Line::new(PlotPoints::from(pts.clone()))
                        .color(strong)
                        .style(LineStyle::dotted_dense()),
                );
                for (pt, color) in pts.into_iter().zip(&palette) {
                    plot_ui.points(Points::new(vec![pt]).radius(4.0).color(*color));
                }
            });
    });

    peak_table(ui, state);
}

fn peak_table(ui: &mut Ui, state: &AppState) {
    let Some(analysis) = &state.analysis else {
        return;
    };
    let spectra = state.session.spectra();

    TableBuilder::new(ui)
        .striped(true)
        .column(Column::remainder().at_least(120.0))
        .columns(Column::auto().at_least(80.0), 4)
        .header(20.0, |mut header| {
            for title in ["File", "Peak (eV)", "Peak value", "Window sum", "Position"] {
                header.col(|ui| {
                    ui.strong(title);
                });
            }
        })
        .body(|mut body| {
            let rows = spectra
                .iter()
                .zip(&analysis.peaks)
                .zip(&analysis.sums)
                .zip(analysis.progression.xs());
            for (((sp, peak), sum), x) in rows {
                body.row(18.0, |mut row| {
                    row.col(|ui| {
                        ui.label(&sp.name);
                    });
                    row.col(|ui| {
                        ui.label(format!("{:.0}", peak.x));
                    });
                    row.col(|ui| {
                        ui.label(format!("{:.3}", peak.value));
                    });
                    row.col(|ui| {
                        ui.label(format!("{sum:.3}"));
                    });
                    row.col(|ui| {
                        ui.label(format!("{x}"));
                    });
                });
            }
        });
}
