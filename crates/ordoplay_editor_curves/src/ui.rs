// SPDX-License-Identifier: MIT OR Apache-2.0
//! Curve editor UI rendering.
//!
//! Features:
//! - Curve view with tangent handles, marquee and filled regions
//! - Dope sheet with one key row per curve
//! - Curve list with visibility, removal and rotation mode menus
//! - Toolbar for tangent modes, snapping, undo/redo and apply
//! - Zoom/pan navigation
//!
//! All edits go through [`CurveEditorSession`]; this module only maps
//! pointer and keyboard input to session operations and paints the result.

use crate::clip::ClipSink;
use crate::curve::{CurveId, CurveWrapper};
use crate::hierarchy::AnimationHierarchy;
use crate::keyframe::{KeyValue, ObjectRef, TangentMode, TangentSide};
use crate::region::{region_pairs, region_strips};
use crate::rotation::{RotationMode, TRANSFORM_COMPONENT};
use crate::session::{CurveEditorSession, CurveError};
use egui::{Color32, Key, Modifiers, PointerButton, Pos2, Rect, Sense, Shape, Stroke, Vec2};

const CURVE_LIST_WIDTH: f32 = 220.0;
const ROW_HEIGHT: f32 = 22.0;
const RULER_HEIGHT: f32 = 24.0;
const KEY_SIZE: f32 = 10.0;
const KEY_RADIUS: f32 = 4.0;
const HANDLE_RADIUS: f32 = 3.0;
const MIN_GRID_SPACING: f32 = 60.0;
const MAX_GRID_LINES: usize = 512;
const REGION_SAMPLES: usize = 64;
const SELECTED_COLOR: Color32 = Color32::from_rgb(255, 200, 100);

/// Which editor is shown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewMode {
    /// Value-over-time curves
    #[default]
    CurveEditor,
    /// Key timing only, one row per curve
    DopeSheet,
}

fn color_of(wrapper: &CurveWrapper) -> Color32 {
    let [r, g, b] = wrapper.color;
    Color32::from_rgb(r, g, b)
}

/// Grid step in curve units so that lines are at least `min_pixels` apart.
///
/// Steps follow a 1-2-5 progression.
pub fn grid_step(pixels_per_unit: f32, min_pixels: f32) -> f32 {
    if pixels_per_unit <= 0.0 || !pixels_per_unit.is_finite() {
        return 1.0;
    }
    let raw = min_pixels / pixels_per_unit;
    let magnitude = 10f32.powf(raw.log10().floor());
    [1.0, 2.0, 5.0, 10.0]
        .into_iter()
        .map(|m| m * magnitude)
        .find(|step| *step >= raw)
        .unwrap_or(10.0 * magnitude)
}

/// Grid line positions covering `[min, max]` at multiples of `step`.
///
/// Positions are derived from an integer index, so a step below the float
/// resolution of the range repeats values instead of stalling. At most
/// `MAX_GRID_LINES` positions are produced.
pub fn grid_lines(min: f32, max: f32, step: f32) -> impl Iterator<Item = f32> {
    let valid = step > 0.0 && step.is_finite() && min.is_finite() && max.is_finite() && max >= min;
    let (first, count) = if valid {
        let first = (f64::from(min) / f64::from(step)).floor();
        let last = (f64::from(max) / f64::from(step)).floor();
        (first, ((last - first) as usize).saturating_add(1).min(MAX_GRID_LINES))
    } else {
        (0.0, 0)
    };
    (0..count).map(move |i| ((first + i as f64) * f64::from(step)) as f32)
}

/// Curve editor panel for integration with the editor
pub struct CurveEditorPanel {
    /// Panel name
    pub name: String,
    /// Editing session
    pub session: CurveEditorSession,
    /// Current view mode
    pub view_mode: ViewMode,
    /// Properties that can receive new curves
    pub hierarchy: Option<AnimationHierarchy>,
    /// Where applied edits are written
    sink: Option<Box<dyn ClipSink>>,
    /// Apply after every edit instead of on demand
    pub auto_apply: bool,
    /// Last error shown in the toolbar
    status: Option<String>,
}

impl CurveEditorPanel {
    /// Create a panel around a session
    pub fn new(name: impl Into<String>, session: CurveEditorSession) -> Self {
        Self {
            name: name.into(),
            session,
            view_mode: ViewMode::CurveEditor,
            hierarchy: None,
            sink: None,
            auto_apply: false,
            status: None,
        }
    }

    /// Set the sink applied edits are written to
    pub fn with_sink(mut self, sink: Box<dyn ClipSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Last reported error
    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    fn report<T>(&mut self, result: Result<T, CurveError>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::warn!("Curve edit failed: {err}");
                self.status = Some(err.to_string());
                None
            }
        }
    }

    /// Flush pending edits to the sink
    pub fn apply(&mut self) {
        let Some(sink) = self.sink.as_mut() else {
            return;
        };
        let result = self.session.apply(sink.as_mut());
        if self.report(result) == Some(true) {
            self.status = None;
        }
    }

    /// Render the panel UI
    pub fn ui(&mut self, ui: &mut egui::Ui) {
        self.render_toolbar(ui);
        ui.separator();

        let remaining = ui.available_rect_before_wrap();
        let list_rect = Rect::from_min_size(remaining.min, Vec2::new(CURVE_LIST_WIDTH, remaining.height()));
        let content_rect = Rect::from_min_max(Pos2::new(list_rect.max.x, remaining.min.y), remaining.max);
        let ruler_rect = Rect::from_min_size(content_rect.min, Vec2::new(content_rect.width(), RULER_HEIGHT));
        let view_rect = Rect::from_min_max(Pos2::new(content_rect.min.x, ruler_rect.max.y), content_rect.max);
        self.session.view.rect = view_rect;

        self.render_curve_list(ui, list_rect);
        self.render_ruler(ui, ruler_rect);

        let response = ui.interact(view_rect, ui.id().with("curve_view"), Sense::click_and_drag());
        match self.view_mode {
            ViewMode::CurveEditor => {
                self.render_curve_view(ui, view_rect);
                self.handle_curve_input(ui, &response, view_rect);
            }
            ViewMode::DopeSheet => {
                self.render_dope_sheet(ui, view_rect);
                self.handle_dope_sheet_input(ui, &response, view_rect);
            }
        }
        self.handle_navigation(ui, &response, view_rect);
        self.handle_shortcuts(ui, view_rect);

        if self.auto_apply && self.session.is_dirty() && !self.session.drag().is_dragging() {
            self.apply();
        }
    }

    /// Render toolbar with editing controls
    fn render_toolbar(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            ui.selectable_value(&mut self.view_mode, ViewMode::CurveEditor, "Curves");
            ui.selectable_value(&mut self.view_mode, ViewMode::DopeSheet, "Dope Sheet");

            ui.separator();

            ui.checkbox(&mut self.session.settings.snap_to_frame, "Snap");
            ui.checkbox(&mut self.session.settings.show_unselected_tangents, "All Tangents");

            ui.separator();

            for mode in TangentMode::all() {
                if ui.button(mode.name()).on_hover_text("Set tangent mode of selected keys").clicked() {
                    let result = self.session.set_selected_tangent_mode(*mode);
                    self.report(result);
                }
            }
            ui.menu_button("Sides", |ui| {
                for side in [TangentSide::In, TangentSide::Out] {
                    for mode in TangentMode::all() {
                        if ui.button(format!("{side:?}: {}", mode.name())).clicked() {
                            let result = self.session.set_selected_side_mode(side, *mode);
                            self.report(result);
                            ui.close_menu();
                        }
                    }
                }
            });
            if ui.button("Flatten").clicked() {
                let result = self.session.flatten_selected();
                self.report(result);
            }
            if ui.button("Break").clicked() {
                let result = self.session.set_selected_broken(true);
                self.report(result);
            }
            if ui.button("Join").clicked() {
                let result = self.session.set_selected_broken(false);
                self.report(result);
            }

            ui.separator();

            let stats = self.session.history_stats();
            let undo_hint = self
                .session
                .undo_description()
                .map(|d| format!("Undo {d} ({} of {} steps)", stats.undo_count, stats.max_depth));
            let undo = ui.add_enabled(self.session.can_undo(), egui::Button::new("Undo"));
            if undo.on_hover_text(undo_hint.unwrap_or_default()).clicked() {
                let result = self.session.undo();
                self.report(result);
            }
            let redo_hint = self.session.redo_description().map(|d| format!("Redo {d}"));
            let redo = ui.add_enabled(self.session.can_redo(), egui::Button::new("Redo"));
            if redo.on_hover_text(redo_hint.unwrap_or_default()).clicked() {
                let result = self.session.redo();
                self.report(result);
            }

            if ui.button("Frame All").on_hover_text("Frame all curves (A)").clicked() {
                self.session.frame_all();
            }

            ui.separator();

            let can_apply = self.sink.is_some() && self.session.is_dirty();
            if ui.add_enabled(can_apply, egui::Button::new("Apply")).clicked() {
                self.apply();
            }
            ui.checkbox(&mut self.auto_apply, "Auto");

            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                if let Some(status) = &self.status {
                    ui.colored_label(Color32::from_rgb(255, 120, 100), status);
                }
                ui.label(format!(
                    "{} curves | {} fps{}",
                    self.session.curves().len(),
                    self.session.frame_rate(),
                    if self.session.is_dirty() { " | modified" } else { "" }
                ));
            });
        });
    }

    /// Render the curve list with per-curve menus
    fn render_curve_list(&mut self, ui: &mut egui::Ui, rect: Rect) {
        let painter = ui.painter_at(rect);
        painter.rect_filled(rect, 0.0, Color32::from_gray(35));

        let header = Rect::from_min_size(rect.min, Vec2::new(rect.width(), RULER_HEIGHT));
        self.render_add_property_menu(ui, header);

        let rows: Vec<(CurveId, String, Color32, bool)> = self
            .session
            .curves()
            .values()
            .map(|c| (c.id, c.binding.display_name(), color_of(c), c.hidden))
            .collect();

        let mut y = header.max.y;
        for (id, name, color, hidden) in rows {
            if y > rect.max.y {
                break;
            }
            let row = Rect::from_min_size(Pos2::new(rect.min.x, y), Vec2::new(rect.width(), ROW_HEIGHT));
            let swatch = Rect::from_min_size(row.min + Vec2::new(4.0, 5.0), Vec2::splat(ROW_HEIGHT - 10.0));
            let selected = self.session.selection().curves().contains(&id);

            if selected {
                painter.rect_filled(row, 0.0, Color32::from_rgba_unmultiplied(100, 150, 255, 40));
            }
            if hidden {
                painter.rect_stroke(swatch, 0.0, Stroke::new(1.0, color));
            } else {
                painter.rect_filled(swatch, 0.0, color);
            }
            painter.text(
                Pos2::new(swatch.max.x + 6.0, row.center().y),
                egui::Align2::LEFT_CENTER,
                &name,
                egui::FontId::proportional(12.0),
                if hidden { Color32::from_gray(100) } else { Color32::from_gray(200) },
            );

            let response = ui.interact(row, ui.id().with(("curve_row", id)), Sense::click());
            if response.clicked() {
                if swatch.contains(response.interact_pointer_pos().unwrap_or(row.center())) {
                    let result = self.session.set_hidden(id, !hidden);
                    self.report(result);
                } else {
                    self.session.bring_to_front(id);
                }
            }
            response.context_menu(|ui| self.curve_context_menu(ui, id));
            y += ROW_HEIGHT;
        }
    }

    fn render_add_property_menu(&mut self, ui: &mut egui::Ui, rect: Rect) {
        let Some(hierarchy) = self.hierarchy.take() else {
            return;
        };
        let response = ui.interact(rect, ui.id().with("add_property"), Sense::click());
        ui.painter_at(rect).text(
            rect.left_center() + Vec2::new(8.0, 0.0),
            egui::Align2::LEFT_CENTER,
            "+ Add Property",
            egui::FontId::proportional(12.0),
            Color32::from_gray(200),
        );
        response.context_menu(|ui| {
            let addable = self.session.addable_properties(&hierarchy);
            if addable.is_empty() {
                ui.label("All properties are animated");
            }
            for descriptor in addable {
                if ui.button(descriptor.binding.display_name()).clicked() {
                    let initial = if descriptor.value_type.is_object() {
                        KeyValue::Object(ObjectRef::new(""))
                    } else {
                        KeyValue::Float(0.0)
                    };
                    let result = self.session.add_curve(descriptor, initial);
                    self.report(result);
                    ui.close_menu();
                }
            }
        });
        self.hierarchy = Some(hierarchy);
    }

    fn curve_context_menu(&mut self, ui: &mut egui::Ui, id: CurveId) {
        let Some(binding) = self.session.curve(id).map(|c| c.binding.clone()) else {
            return;
        };
        let rotation = (binding.component_type == TRANSFORM_COMPONENT)
            .then(|| RotationMode::parse_property(&binding.property_name))
            .flatten()
            .map(|(mode, _)| mode);

        if let Some(current) = rotation {
            ui.label("Interpolation");
            for mode in [RotationMode::BakedEuler, RotationMode::NonBakedEuler, RotationMode::Quaternion] {
                let enabled = mode != current && current != RotationMode::Quaternion && mode != RotationMode::Quaternion;
                if ui.add_enabled(enabled, egui::Button::new(mode.name())).clicked() {
                    let result = self.session.convert_rotation(&binding.path, mode);
                    self.report(result);
                    ui.close_menu();
                }
            }
            if current == RotationMode::Quaternion && ui.button("Bake to Euler Angles").clicked() {
                let result = self.session.bake_quaternion_rotation(&binding.path);
                self.report(result);
                ui.close_menu();
            }
            ui.separator();
        }

        if ui.button("Remove Curve").clicked() {
            let result = self.session.remove_curve(id);
            self.report(result);
            ui.close_menu();
        }
    }

    /// Render time ruler with event markers
    fn render_ruler(&self, ui: &egui::Ui, rect: Rect) {
        let painter = ui.painter_at(rect);
        painter.rect_filled(rect, 0.0, Color32::from_gray(40));

        let view = self.session.view;
        let step = grid_step(view.pixels_per_second(), MIN_GRID_SPACING);
        for time in grid_lines(view.time_start, view.time_end, step) {
            let x = view.time_to_x(time);
            painter.line_segment(
                [Pos2::new(x, rect.max.y - 8.0), Pos2::new(x, rect.max.y)],
                Stroke::new(1.0, Color32::from_gray(150)),
            );
            painter.text(
                Pos2::new(x + 2.0, rect.min.y + 2.0),
                egui::Align2::LEFT_TOP,
                format!("{time:.2}"),
                egui::FontId::monospace(10.0),
                Color32::from_gray(180),
            );
        }

        for event in self.session.events() {
            let x = view.time_to_x(event.time);
            if x < rect.min.x || x > rect.max.x {
                continue;
            }
            let marker = vec![
                Pos2::new(x - 4.0, rect.max.y - 10.0),
                Pos2::new(x + 4.0, rect.max.y - 10.0),
                Pos2::new(x, rect.max.y - 2.0),
            ];
            painter.add(Shape::convex_polygon(marker, Color32::from_rgb(120, 200, 255), Stroke::NONE));
            let marker_rect = Rect::from_center_size(Pos2::new(x, rect.max.y - 6.0), Vec2::splat(10.0));
            let _ = ui
                .interact(marker_rect, ui.id().with(("event", event.id)), Sense::hover())
                .on_hover_text(format!("{} @ {:.3}s", event.function_name, event.time));
        }
    }

    /// Render grid, regions, curves, keys and tangent handles
    fn render_curve_view(&self, ui: &egui::Ui, rect: Rect) {
        let painter = ui.painter_at(rect);
        painter.rect_filled(rect, 0.0, Color32::from_gray(30));

        let view = &self.session.view;
        let curves = self.session.curves();
        let selection = self.session.selection();
        let settings = &self.session.settings;

        // Grid
        let grid = Stroke::new(1.0, Color32::from_gray(45));
        let time_step = grid_step(view.pixels_per_second(), MIN_GRID_SPACING);
        for time in grid_lines(view.time_start, view.time_end, time_step) {
            let x = view.time_to_x(time);
            painter.line_segment([Pos2::new(x, rect.min.y), Pos2::new(x, rect.max.y)], grid);
        }
        let value_step = grid_step(view.pixels_per_unit(), MIN_GRID_SPACING);
        for value in grid_lines(view.value_min, view.value_max, value_step) {
            let y = view.value_to_y(value);
            painter.line_segment([Pos2::new(rect.min.x, y), Pos2::new(rect.max.x, y)], grid);
            painter.text(
                Pos2::new(rect.min.x + 2.0, y - 2.0),
                egui::Align2::LEFT_BOTTOM,
                format!("{value:.2}"),
                egui::FontId::monospace(10.0),
                Color32::from_gray(110),
            );
        }

        // Regions
        for pair in region_pairs(curves) {
            let (Some(first), Some(second)) = (curves.get(&pair.first), curves.get(&pair.second)) else {
                continue;
            };
            for strip in region_strips(&first.curve, &second.curve, view.time_start, view.time_end, REGION_SAMPLES) {
                let top = if strip.first_above { first } else { second };
                let fill = color_of(top).gamma_multiply(0.2);
                let points: Vec<Pos2> = strip.outline.iter().map(|&(t, v)| view.to_screen(t, v)).collect();
                let half = points.len() / 2;
                for i in 0..half.saturating_sub(1) {
                    let quad = vec![points[i], points[i + 1], points[points.len() - 2 - i], points[points.len() - 1 - i]];
                    painter.add(Shape::convex_polygon(quad, fill, Stroke::NONE));
                }
            }
        }

        // Curves, bottom to top
        let spacing = settings.curve_sample_spacing.max(1.0);
        for id in self.session.draw_order().ids() {
            let Some(wrapper) = curves.get(id).filter(|c| !c.hidden) else {
                continue;
            };
            let color = color_of(wrapper);
            let curve_color = if wrapper.read_only { color.gamma_multiply(0.5) } else { color };

            let mut points = Vec::new();
            let mut x = rect.min.x;
            while x <= rect.max.x {
                if let Some(v) = wrapper.curve.evaluate_float(view.x_to_time(x)) {
                    points.push(Pos2::new(x, view.value_to_y(v)));
                }
                x += spacing;
            }
            if points.len() >= 2 {
                painter.add(Shape::line(points, Stroke::new(1.5, curve_color)));
            }

            let keys = wrapper.curve.keys();
            for (index, key) in keys.iter().enumerate() {
                let Some(pos) = view.key_position(key) else {
                    continue;
                };
                let touched = selection.touches(wrapper.id, index);
                if touched || settings.show_unselected_tangents {
                    let sides = [(TangentSide::In, index > 0), (TangentSide::Out, index + 1 < keys.len())];
                    for (side, present) in sides {
                        if !present {
                            continue;
                        }
                        if let Some(handle) = view.tangent_handle(key, side, settings.tangent_handle_length) {
                            painter.line_segment([pos, handle], Stroke::new(1.0, Color32::from_gray(160)));
                            painter.circle_filled(handle, HANDLE_RADIUS, Color32::from_gray(200));
                        }
                    }
                }

                let fill = if selection.contains(wrapper.id, index) {
                    SELECTED_COLOR
                } else if selection.is_semi_selected(wrapper.id, index) {
                    SELECTED_COLOR.gamma_multiply(0.5)
                } else {
                    color
                };
                painter.circle_filled(pos, KEY_RADIUS, fill);
                painter.circle_stroke(pos, KEY_RADIUS, Stroke::new(1.0, Color32::from_gray(20)));
            }
        }

        if let Some(marquee) = self.session.drag().session().and_then(|s| s.marquee_rect()) {
            painter.rect_filled(marquee, 0.0, Color32::from_rgba_unmultiplied(100, 150, 255, 30));
            painter.rect_stroke(marquee, 0.0, Stroke::new(1.0, Color32::from_rgb(100, 150, 255)));
        }
    }

    /// Rows of the dope sheet, one per visible curve
    fn dope_rows(&self, rect: Rect) -> Vec<(CurveId, Rect)> {
        self.session
            .curves()
            .values()
            .filter(|c| !c.hidden)
            .enumerate()
            .map(|(i, c)| {
                let min = Pos2::new(rect.min.x, rect.min.y + i as f32 * ROW_HEIGHT);
                (c.id, Rect::from_min_size(min, Vec2::new(rect.width(), ROW_HEIGHT)))
            })
            .collect()
    }

    /// Key under `pos` in the dope sheet
    fn dope_key_at(&self, rows: &[(CurveId, Rect)], pos: Pos2) -> Option<(CurveId, usize)> {
        let (id, _) = rows.iter().find(|(_, row)| row.y_range().contains(pos.y))?;
        let wrapper = self.session.curve(*id)?;
        let view = &self.session.view;
        wrapper
            .curve
            .keys()
            .iter()
            .enumerate()
            .map(|(i, k)| (i, (view.time_to_x(k.time) - pos.x).abs()))
            .filter(|(_, d)| *d <= KEY_SIZE * 0.5 + 1.0)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(i, _)| (*id, i))
    }

    /// Render key diamonds per curve
    fn render_dope_sheet(&self, ui: &egui::Ui, rect: Rect) {
        let painter = ui.painter_at(rect);
        painter.rect_filled(rect, 0.0, Color32::from_gray(30));

        let view = &self.session.view;
        let selection = self.session.selection();
        for (row_index, (id, row)) in self.dope_rows(rect).into_iter().enumerate() {
            if row_index % 2 == 1 {
                painter.rect_filled(row, 0.0, Color32::from_gray(28));
            }
            let Some(wrapper) = self.session.curve(id) else {
                continue;
            };
            let center_y = row.center().y;
            for (index, key) in wrapper.curve.keys().iter().enumerate() {
                let x = view.time_to_x(key.time);
                if x < rect.min.x || x > rect.max.x {
                    continue;
                }
                let half = KEY_SIZE / 2.0;
                let diamond = vec![
                    Pos2::new(x, center_y - half),
                    Pos2::new(x + half, center_y),
                    Pos2::new(x, center_y + half),
                    Pos2::new(x - half, center_y),
                ];
                let (fill, stroke) = if selection.contains(id, index) {
                    (SELECTED_COLOR, Stroke::new(2.0, Color32::WHITE))
                } else if selection.is_semi_selected(id, index) {
                    (SELECTED_COLOR.gamma_multiply(0.5), Stroke::new(1.0, Color32::from_gray(80)))
                } else {
                    (color_of(wrapper), Stroke::new(1.0, Color32::from_gray(80)))
                };
                painter.add(Shape::convex_polygon(diamond, fill, stroke));
            }
            painter.line_segment(
                [Pos2::new(row.min.x, row.max.y), Pos2::new(row.max.x, row.max.y)],
                Stroke::new(1.0, Color32::from_gray(45)),
            );
        }
    }

    /// Handle pointer input in the curve view
    fn handle_curve_input(&mut self, ui: &egui::Ui, response: &egui::Response, rect: Rect) {
        let modifiers = ui.input(|i| i.modifiers);

        if response.drag_started_by(PointerButton::Primary) {
            if let Some(origin) = ui.input(|i| i.pointer.press_origin()) {
                let result = self.session.pointer_down(origin, modifiers);
                self.report(result);
            }
        }
        if response.dragged_by(PointerButton::Primary) && self.session.drag().is_dragging() {
            if let Some(pos) = response.interact_pointer_pos() {
                let result = self.session.pointer_drag(pos);
                self.report(result);
            }
        }
        if response.drag_stopped_by(PointerButton::Primary) && self.session.drag().is_dragging() {
            let pos = response
                .interact_pointer_pos()
                .or_else(|| ui.input(|i| i.pointer.latest_pos()))
                .unwrap_or(rect.center());
            let result = self.session.pointer_up(pos);
            self.report(result);
        }

        if response.double_clicked() {
            if let Some(pos) = response.interact_pointer_pos() {
                let result = self.session.add_key_on_curve(pos);
                self.report(result);
            }
        } else if response.clicked() {
            if let Some(pos) = response.interact_pointer_pos() {
                let result = self.session.pointer_down(pos, modifiers);
                if self.report(result).is_some() {
                    let result = self.session.pointer_up(pos);
                    self.report(result);
                }
            }
        }
    }

    /// Handle pointer input in the dope sheet
    fn handle_dope_sheet_input(&mut self, ui: &egui::Ui, response: &egui::Response, rect: Rect) {
        let modifiers = ui.input(|i| i.modifiers);
        let rows = self.dope_rows(rect);

        let press = if response.drag_started_by(PointerButton::Primary) {
            ui.input(|i| i.pointer.press_origin())
        } else if response.clicked() {
            response.interact_pointer_pos()
        } else {
            None
        };
        if let Some(pos) = press {
            match self.dope_key_at(&rows, pos) {
                Some((id, key)) => {
                    let result = self.session.select_key(id, key, modifiers);
                    if self.report(result) == Some(true) && response.drag_started() {
                        let result = self.session.begin_key_drag(pos, true);
                        self.report(result);
                    }
                }
                None if !modifiers.shift && !modifiers.command => self.session.clear_selection(),
                None => {}
            }
        }

        if response.dragged_by(PointerButton::Primary) && self.session.drag().is_dragging() {
            if let Some(pos) = response.interact_pointer_pos() {
                let result = self.session.pointer_drag(pos);
                self.report(result);
            }
        }
        if response.drag_stopped_by(PointerButton::Primary) && self.session.drag().is_dragging() {
            let pos = response.interact_pointer_pos().unwrap_or(rect.center());
            let result = self.session.pointer_up(pos);
            self.report(result);
        }
    }

    /// Scroll wheel zoom and middle mouse pan
    fn handle_navigation(&mut self, ui: &egui::Ui, response: &egui::Response, rect: Rect) {
        if response.dragged_by(PointerButton::Middle) {
            self.session.view.pan(response.drag_delta());
        }

        let Some(hover) = ui.input(|i| i.pointer.hover_pos()).filter(|p| rect.contains(*p)) else {
            return;
        };
        ui.input(|input| {
            let scroll = input.smooth_scroll_delta.y;
            if scroll == 0.0 {
                return;
            }
            let factor = (1.0 + scroll * 0.01).max(0.1);
            let zoom = if input.modifiers.ctrl {
                Vec2::new(1.0, factor)
            } else if input.modifiers.shift || self.view_mode == ViewMode::DopeSheet {
                Vec2::new(factor, 1.0)
            } else {
                Vec2::splat(factor)
            };
            self.session.view.zoom(zoom, hover);
        });
    }

    /// Keyboard shortcuts
    fn handle_shortcuts(&mut self, ui: &mut egui::Ui, rect: Rect) {
        let hovered = ui.input(|i| i.pointer.hover_pos()).is_some_and(|p| rect.contains(p));
        if !hovered && !self.session.drag().is_dragging() {
            return;
        }

        // Shift+Command+Z also matches Command+Z, so redo is consumed first
        let (escape, delete, redo, undo, select_all, frame_all, frame_selected) = ui.input_mut(|i| {
            (
                i.consume_key(Modifiers::NONE, Key::Escape),
                i.consume_key(Modifiers::NONE, Key::Delete) || i.consume_key(Modifiers::NONE, Key::Backspace),
                i.consume_key(Modifiers::COMMAND | Modifiers::SHIFT, Key::Z) || i.consume_key(Modifiers::COMMAND, Key::Y),
                i.consume_key(Modifiers::COMMAND, Key::Z),
                i.consume_key(Modifiers::COMMAND, Key::A),
                i.consume_key(Modifiers::NONE, Key::A),
                i.consume_key(Modifiers::NONE, Key::F),
            )
        });

        if escape && self.session.drag().is_dragging() {
            let result = self.session.cancel_drag();
            self.report(result);
        }
        if delete {
            let result = self.session.delete_selected_keys();
            self.report(result);
        }
        if redo {
            let result = self.session.redo();
            self.report(result);
        } else if undo {
            let result = self.session.undo();
            self.report(result);
        }
        if select_all {
            self.session.select_all();
        }
        if frame_all {
            self.session.frame_all();
        }
        if frame_selected {
            self.session.frame_selected();
        }
    }
}
