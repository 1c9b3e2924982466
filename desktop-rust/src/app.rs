use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};

use anyhow::Result;
use eframe::egui::{self, Align2, Color32, FontId, RichText, Sense, Stroke};
use eframe::egui::{FontData, FontDefinitions, FontFamily};

use crate::io::{analysis_output_path, cli_failure_message, decode_image, load_analysis_response, load_inspection, resolve_local_image, save_inspection};
use crate::model::{
    rgb, rgba, to_egui_rect, to_point, to_size, AppState, DecodedImage, DeletePrompt, SlotKind, UiMessage,
};
use thermal_review_common::{
    hit_test, log_rows, overlay_boxes, AnalysisOutcome, AnalysisTicket, FitMapping, InspectionStatus, Point, Rect,
    ReviewSession, ScreenMapping, Size, ViewTransform, Viewport, Weather, ZoomLimits, MANUAL_CLASSIFICATIONS,
    THRESHOLD_STEP,
};

const CANVAS_HEIGHT: f32 = 360.0;
const WHEEL_ZOOM_SPEED: f32 = 0.002;
const INSPECTOR_ZOOM_STEP: f32 = 0.5;
const HIGHLIGHT: Color32 = Color32::from_rgb(0, 200, 255);

pub struct DesktopApp {
    state: AppState,
    status: String,
    analyze_status: String,
    save_status: String,
    analyze_rx: Option<Receiver<UiMessage>>,
    save_rx: Option<Receiver<UiMessage>>,
    image_rx: Receiver<DecodedImage>,
    image_tx: Sender<DecodedImage>,
    image_inflight: usize,
    hover_claimed: bool,
}

impl DesktopApp {
    fn new_inspection(&mut self) {
        self.state.session.close();
        let id = chrono::Local::now().format("%Y%m%d-%H%M%S").to_string();
        let session = ReviewSession::from_inspection(thermal_review_common::Inspection::new(id));
        self.state = AppState::new(session, None);
        self.status = "New inspection".to_string();
    }

    fn open_inspection(&mut self) {
        if let Some(path) = rfd::FileDialog::new().add_filter("JSON", &["json"]).pick_file() {
            self.open_path(&path);
        }
    }

    pub fn open_path(&mut self, path: &Path) {
        match self.load_from_path(path) {
            Ok(_) => self.status = format!("Loaded {}", path.display()),
            Err(err) => {
                log::error!("failed to load {}: {err:#}", path.display());
                self.status = format!("Load failed: {err}");
            }
        }
    }

    fn load_from_path(&mut self, path: &Path) -> Result<()> {
        let inspection = load_inspection(path)?;
        // 実行中の解析結果は以後破棄される
        self.state.session.close();
        self.state = AppState::new(ReviewSession::from_inspection(inspection), Some(path.to_path_buf()));
        self.analyze_rx = None;
        Ok(())
    }

    fn save(&mut self, choose_path: bool) {
        let path = match (&self.state.source_path, choose_path) {
            (Some(path), false) => path.clone(),
            _ => {
                let default_name = format!("inspection-{}.json", self.state.session.inspection_id());
                let Some(path) = rfd::FileDialog::new()
                    .add_filter("JSON", &["json"])
                    .set_file_name(default_name.as_str())
                    .save_file()
                else {
                    return;
                };
                path
            }
        };

        match save_inspection(&path, &self.state.session.to_inspection()) {
            Ok(_) => {
                self.status = format!("Saved {}", path.display());
                self.state.source_path = Some(path.clone());
                self.state.dirty = false;
                self.push_annotations(path);
            }
            Err(err) => self.status = format!("Save failed: {err}"),
        }
    }

    /// サーバーへの注釈保存（ベストエフォート、CLIに委譲）
    fn push_annotations(&mut self, record: PathBuf) {
        if self.state.session.store().is_empty() {
            return;
        }
        let cli = resolve_cli_binary();
        let (tx, rx) = mpsc::channel();
        self.save_rx = Some(rx);
        self.save_status = "Saving annotations...".to_string();

        std::thread::spawn(move || {
            let result = std::process::Command::new(cli)
                .env("RUST_LOG", "off")
                .arg("save")
                .arg(&record)
                .output();
            let message = match result {
                Ok(out) if out.status.success() => "Annotations sent".to_string(),
                Ok(out) => format!("Annotation save failed: {}", cli_failure_message(&out.stderr)),
                Err(err) => format!("Annotation save failed: {err}"),
            };
            let _ = tx.send(UiMessage::SaveDone { message });
        });
    }

    fn pick_image() -> Option<PathBuf> {
        rfd::FileDialog::new()
            .add_filter("Images", &["png", "jpg", "jpeg", "bmp", "tif", "tiff"])
            .pick_file()
    }

    fn upload_baseline(&mut self) {
        if let Some(path) = Self::pick_image() {
            let now = now_stamp();
            self.state
                .session
                .attach_baseline(path.to_string_lossy(), &now, self.state.baseline_weather);
            self.state.sync_slots();
            self.state.dirty = true;
        }
    }

    fn upload_maintenance(&mut self) {
        if let Some(path) = Self::pick_image() {
            let now = now_stamp();
            self.state
                .session
                .attach_maintenance(path.to_string_lossy(), &now, self.state.maintenance_weather);
            self.state.sync_slots();
            self.state.inspector_needs_fit = true;
            self.state.dirty = true;
            if self.analyze_rx.is_some() {
                self.analyze_status = "Previous analysis discarded".to_string();
            }
        }
    }

    fn run_analysis(&mut self) {
        let ticket = match self.state.session.begin_analysis() {
            Ok(ticket) => ticket,
            Err(err) => {
                self.analyze_status = err.to_string();
                return;
            }
        };

        let base_dir = self.state.base_dir();
        let paths = resolve_local_image(&ticket.baseline, base_dir.as_deref())
            .and_then(|b| resolve_local_image(&ticket.maintenance, base_dir.as_deref()).map(|m| (b, m)));
        let (baseline, maintenance) = match paths {
            Ok(paths) => paths,
            Err(err) => {
                self.finish_analysis(ticket, Err(err.to_string()));
                return;
            }
        };

        let cli = resolve_cli_binary();
        let output = analysis_output_path(&ticket.inspection_id, ticket.generation);
        let threshold = format!("{:.2}", ticket.threshold);
        let (tx, rx) = mpsc::channel();
        self.analyze_rx = Some(rx);
        self.analyze_status = "AI analysis running...".to_string();
        log::info!("analysis started for inspection {}", ticket.inspection_id);

        std::thread::spawn(move || {
            let result = std::process::Command::new(cli)
                .env("RUST_LOG", "off")
                .arg("analyze")
                .arg("--baseline")
                .arg(&baseline)
                .arg("--maintenance")
                .arg(&maintenance)
                .arg("--inspection-id")
                .arg(&ticket.inspection_id)
                .arg("--threshold")
                .arg(&threshold)
                .arg("--output")
                .arg(&output)
                .output();

            let result = match result {
                Ok(out) if out.status.success() => {
                    let parsed = load_analysis_response(&output).map_err(|e| e.to_string());
                    let _ = std::fs::remove_file(&output);
                    parsed
                }
                Ok(out) => Err(cli_failure_message(&out.stderr)),
                Err(err) => Err(err.to_string()),
            };
            let _ = tx.send(UiMessage::AnalysisDone { ticket, result });
        });
    }

    fn finish_analysis(&mut self, ticket: AnalysisTicket, result: std::result::Result<thermal_review_common::AnalysisResponse, String>) {
        match self.state.session.finish_analysis(&ticket, result) {
            Ok(AnalysisOutcome::Applied(count)) => {
                self.analyze_status = format!("AI analysis complete: {count} anomalies");
                self.state.sync_slots();
                self.state.dirty = true;
            }
            Ok(AnalysisOutcome::Discarded) => {
                log::info!("stale analysis result ignored");
            }
            Err(err) => {
                self.analyze_status = err.to_string();
                self.state.dirty = true;
            }
        }
    }

    fn request_image(&mut self, kind: SlotKind) {
        let base_dir = self.state.base_dir();
        let slot = self.state.slot_mut(kind);
        let Some(reference) = slot.reference.clone() else {
            return;
        };
        if slot.is_loaded() || slot.error.is_some() || slot.pending {
            return;
        }
        slot.pending = true;
        self.image_inflight += 1;
        let sender = self.image_tx.clone();

        std::thread::spawn(move || {
            let result = decode_image(&reference, base_dir.as_deref()).map_err(|e| e.to_string());
            let _ = sender.send(DecodedImage { kind, reference, result });
        });
    }

    fn poll_messages(&mut self, ctx: &egui::Context) {
        while let Ok(msg) = self.image_rx.try_recv() {
            self.image_inflight = self.image_inflight.saturating_sub(1);
            let slot = self.state.slot_mut(msg.kind);
            // 途中で差し替えられた画像は捨てる
            if slot.reference.as_deref() != Some(msg.reference.as_str()) {
                continue;
            }
            slot.pending = false;
            match msg.result {
                Ok((size, pixels)) => {
                    let color_image = egui::ColorImage::from_rgba_unmultiplied(size, &pixels);
                    slot.texture = Some(ctx.load_texture(&msg.reference, color_image, egui::TextureOptions::LINEAR));
                    slot.natural = Size::new(size[0] as f32, size[1] as f32);
                    if msg.kind == SlotKind::Maintenance {
                        let natural = slot.natural;
                        self.state.session.set_maintenance_size(natural);
                        self.state.inspector.set_natural(natural);
                    }
                }
                Err(err) => {
                    log::warn!("image decode failed: {err}");
                    slot.error = Some(err);
                }
            }
        }

        if let Some(rx) = &self.analyze_rx {
            if let Ok(UiMessage::AnalysisDone { ticket, result }) = rx.try_recv() {
                self.analyze_rx = None;
                self.finish_analysis(ticket, result);
            }
        }

        if let Some(rx) = &self.save_rx {
            if let Ok(UiMessage::SaveDone { message }) = rx.try_recv() {
                self.save_status = message;
                self.save_rx = None;
            }
        }
    }

    fn render_progress(&self, ui: &mut egui::Ui) {
        let progress = self.state.session.progress();
        ui.horizontal(|ui| {
            for (i, (label, status)) in progress.stages().iter().enumerate() {
                if i > 0 {
                    ui.label(RichText::new("→").color(Color32::from_gray(120)));
                }
                ui.label(RichText::new("●").color(rgb(status.rgb())));
                ui.label(format!("{label}: {}", status.label()));
            }
            ui.separator();
            let status = self.state.session.status();
            let color = match status {
                InspectionStatus::Completed => Color32::from_rgb(0, 128, 0),
                InspectionStatus::InProgress => Color32::from_rgb(255, 165, 0),
                InspectionStatus::Pending => Color32::from_gray(128),
            };
            ui.label(RichText::new(status.label()).strong().color(color));
        });
    }

    fn render_image_header(&mut self, ui: &mut egui::Ui, kind: SlotKind) {
        let inspection = self.state.session.inspection().clone();
        ui.horizontal(|ui| match kind {
            SlotKind::Baseline => {
                ui.label(RichText::new("Baseline").strong());
                weather_combo(ui, "baseline_weather", &mut self.state.baseline_weather);
                if ui.button("Upload").clicked() {
                    self.upload_baseline();
                }
                if ui
                    .add_enabled(inspection.baseline_image.is_some(), egui::Button::new("Remove"))
                    .clicked()
                {
                    self.state.session.remove_baseline();
                    self.state.baseline_weather = Weather::default();
                    self.state.sync_slots();
                    self.state.dirty = true;
                }
                if let Some(date) = &inspection.baseline_upload_date {
                    ui.label(RichText::new(format!("{} · {}", date, inspection.baseline_weather.label())).size(11.0));
                }
            }
            _ => {
                ui.label(RichText::new("Thermal").strong());
                weather_combo(ui, "maintenance_weather", &mut self.state.maintenance_weather);
                if ui.add_enabled(!self.state.session.is_analyzing(), egui::Button::new("Upload")).clicked() {
                    self.upload_maintenance();
                }
                if let Some(date) = &inspection.maintenance_upload_date {
                    ui.label(RichText::new(format!("{} · {}", date, inspection.maintenance_weather.label())).size(11.0));
                }
            }
        });
    }

    fn render_baseline(&mut self, ui: &mut egui::Ui, width: f32) {
        self.request_image(SlotKind::Baseline);
        let (response, painter) = ui.allocate_painter(egui::vec2(width, CANVAS_HEIGHT), Sense::hover());
        let canvas = response.rect;
        let painter = painter.with_clip_rect(canvas);
        painter.rect_filled(canvas, 4.0, Color32::from_gray(18));

        let slot = &self.state.baseline;
        match (&slot.texture, &slot.error) {
            (Some(texture), _) => {
                let fit = FitMapping::new(slot.natural, to_size(canvas.size()));
                let bounds = Rect::new(0.0, 0.0, slot.natural.width, slot.natural.height);
                paint_texture(&painter, texture, to_egui_rect(canvas.min, fit.rect_to_display(bounds)));
            }
            (None, Some(err)) => placeholder(&painter, canvas, err),
            (None, None) if slot.reference.is_some() => placeholder(&painter, canvas, "Loading..."),
            _ => placeholder(&painter, canvas, "No baseline image"),
        }
    }

    fn render_thermal(&mut self, ui: &mut egui::Ui, width: f32) {
        self.request_image(SlotKind::Maintenance);
        self.request_image(SlotKind::Annotated);

        let (response, painter) = ui.allocate_painter(egui::vec2(width, CANVAS_HEIGHT), Sense::click_and_drag());
        let canvas = response.rect;
        let painter = painter.with_clip_rect(canvas);
        painter.rect_filled(canvas, 4.0, Color32::from_gray(18));

        let natural = self.state.session.maintenance_size();
        let texture = self
            .state
            .annotated
            .texture
            .as_ref()
            .or(self.state.maintenance.texture.as_ref())
            .cloned();
        let Some(texture) = texture.filter(|_| natural.is_known()) else {
            let text = match (&self.state.maintenance.reference, &self.state.maintenance.error) {
                (_, Some(err)) => err.as_str(),
                (Some(_), None) => "Loading...",
                (None, None) => "No thermal image",
            };
            placeholder(&painter, canvas, text);
            return;
        };

        // インライン拡大はキャンバス中央を基準にする
        let center = Point::new(canvas.width() / 2.0, canvas.height() / 2.0);
        let view = ViewTransform::identity().zoomed_about(ZoomLimits::INLINE.clamp(self.state.inline_zoom), center);
        let viewport = Viewport::new(FitMapping::new(natural, to_size(canvas.size())), view);
        let bounds = Rect::new(0.0, 0.0, natural.width, natural.height);
        paint_texture(&painter, &texture, to_egui_rect(canvas.min, viewport.rect_to_screen(bounds)));

        self.handle_canvas_pointer(ui, &response, canvas.min, &viewport);
        self.paint_overlays(&painter, canvas.min, &viewport);
    }

    fn handle_canvas_pointer<M: ScreenMapping>(
        &mut self,
        ui: &egui::Ui,
        response: &egui::Response,
        origin: egui::Pos2,
        mapping: &M,
    ) {
        let session = &mut self.state.session;
        if session.mode().is_drawing() {
            if response.drag_started() {
                if let Some(press) = ui.input(|i| i.pointer.press_origin()) {
                    let start = mapping.to_natural(to_point(origin, press));
                    session.mode_mut().pointer_down(start);
                }
            }
            if response.drag_stopped() {
                if let Some(pos) = response.interact_pointer_pos() {
                    let end = mapping.to_natural(to_point(origin, pos));
                    match session.finish_drawing(end) {
                        Some(Ok(id)) => {
                            self.status = format!("Added {id}");
                            self.state.dirty = true;
                        }
                        Some(Err(err)) => self.status = err.to_string(),
                        None => {}
                    }
                }
            }
            return;
        }

        if let Some(pos) = response.hover_pos() {
            let boxes = overlay_boxes(session.store(), mapping, None);
            let p = to_point(origin, pos);
            if let Some(b) = hit_test(&boxes, p.x, p.y) {
                session.mode_mut().hover(&b.id);
                self.hover_claimed = true;
            }
        }
    }

    fn paint_overlays<M: ScreenMapping>(&self, painter: &egui::Painter, origin: egui::Pos2, mapping: &M) {
        let session = &self.state.session;
        for b in overlay_boxes(session.store(), mapping, session.mode().hovered()) {
            let rect = to_egui_rect(origin, b.screen);
            let color = rgba(b.rgba);
            let (stroke, fill) = if b.highlighted {
                (Stroke::new(3.0, HIGHLIGHT), HIGHLIGHT.linear_multiply(0.15))
            } else {
                (Stroke::new(2.0, color), Color32::TRANSPARENT)
            };
            painter.rect_filled(rect, 0.0, fill);
            painter.rect_stroke(rect, 0.0, stroke);
            let tag = egui::Rect::from_min_size(rect.min - egui::vec2(0.0, 16.0), egui::vec2(22.0, 16.0));
            painter.rect_filled(tag, 2.0, if b.highlighted { HIGHLIGHT } else { color });
            painter.text(tag.center(), Align2::CENTER_CENTER, b.number.to_string(), FontId::proportional(11.0), Color32::BLACK);
        }

        // 描画中のプレビュー
        if let Some(start) = session.mode().draw_start() {
            if let Some(pos) = painter.ctx().pointer_latest_pos() {
                let current = mapping.to_natural(to_point(origin, pos));
                let preview = mapping.rect_to_screen(Rect::from_corners(start, current));
                painter.rect_stroke(
                    to_egui_rect(origin, preview),
                    0.0,
                    Stroke::new(2.0, Color32::from_rgb(0, 123, 255)),
                );
            }
        }
    }

    fn render_controls(&mut self, ui: &mut egui::Ui) {
        let session = &self.state.session;
        let analyzing = session.is_analyzing();
        let has_images = session.baseline_image().is_some() && session.maintenance_image().is_some();
        let can_complete = session.progress().can_complete_review() && !session.progress().is_completed();
        let drawing = session.mode().is_drawing();
        let has_annotations = !session.store().is_empty();

        ui.horizontal(|ui| {
            let mut threshold = self.state.session.threshold();
            let slider = egui::Slider::new(&mut threshold, 0.0..=1.0)
                .step_by(THRESHOLD_STEP as f64)
                .text("Threshold");
            if ui.add_enabled(!analyzing, slider).changed() {
                if let Err(err) = self.state.session.set_threshold(threshold) {
                    self.status = err.to_string();
                }
            }
            ui.label(format!("{}%", (threshold * 100.0).round()));

            let label = if analyzing { "Analyzing..." } else { "Run AI Analysis" };
            if ui.add_enabled(!analyzing && has_images, egui::Button::new(label)).clicked() {
                self.run_analysis();
            }
            if analyzing {
                ui.spinner();
            }

            ui.separator();
            let draw_label = if drawing { "Cancel Drawing" } else { "Add Manual" };
            if ui
                .add_enabled(self.state.session.maintenance_size().is_known(), egui::SelectableLabel::new(drawing, draw_label))
                .clicked()
            {
                self.state.session.mode_mut().toggle_drawing();
            }
            if ui.add_enabled(has_annotations, egui::Button::new("Clear Annotations")).clicked() {
                self.state.confirm_clear = true;
            }
            if ui.add_enabled(can_complete, egui::Button::new("Complete Reviewing")).clicked() {
                let today = chrono::Local::now().format("%Y-%m-%d").to_string();
                match self.state.session.complete_review(&today) {
                    Ok(_) => {
                        self.status = "Review completed".to_string();
                        self.state.dirty = true;
                    }
                    Err(err) => self.status = err.to_string(),
                }
            }

            ui.separator();
            ui.add(egui::Slider::new(&mut self.state.inline_zoom, ZoomLimits::INLINE.min..=ZoomLimits::INLINE.max).text("Zoom"));
            if ui.button("Inspector").clicked() {
                self.state.inspector_open = true;
                self.state.inspector_needs_fit = true;
            }
        });
    }

    fn render_log(&mut self, ui: &mut egui::Ui) {
        let rows = log_rows(self.state.session.store());
        ui.label(RichText::new(format!("Analysis Log ({})", rows.len())).strong());
        if rows.is_empty() {
            ui.label(RichText::new("No anomalies").color(Color32::from_gray(150)));
        }

        let hovered = self.state.session.mode().hovered().map(str::to_string);
        let mut row_hovered: Option<String> = None;

        egui::Grid::new("analysis_log").striped(true).min_col_width(40.0).show(ui, |ui| {
            for header in ["#", "Origin", "Severity", "Classification", "Details", "Comment", ""] {
                ui.label(RichText::new(header).strong());
            }
            ui.end_row();

            for row in &rows {
                let is_hovered = hovered.as_deref() == Some(row.id.as_str());
                let number = RichText::new(row.number.to_string()).strong();
                let number = if is_hovered { number.color(HIGHLIGHT) } else { number };
                let mut hovered_here = ui.label(number).hovered();
                hovered_here |= ui.label(row.origin).hovered();
                hovered_here |= ui.label(RichText::new(&row.badge).color(rgba(row.tier.rgba()))).hovered();

                if row.editable_classification {
                    let mut selected = row.classification.clone();
                    egui::ComboBox::from_id_source(("classification", row.id.as_str()))
                        .selected_text(if selected.is_empty() { "Select..." } else { selected.as_str() })
                        .show_ui(ui, |ui| {
                            for option in MANUAL_CLASSIFICATIONS {
                                ui.selectable_value(&mut selected, option.to_string(), *option);
                            }
                        });
                    if selected != row.classification {
                        match self.state.session.set_classification(&row.id, Some(selected.as_str())) {
                            Ok(_) => self.state.dirty = true,
                            Err(err) => self.status = err.to_string(),
                        }
                    }
                } else {
                    hovered_here |= ui.label(&row.classification).hovered();
                }
                hovered_here |= ui.label(RichText::new(row.details()).size(11.0)).hovered();

                let mut comment = row.comment.clone();
                let response = ui.add(egui::TextEdit::multiline(&mut comment).desired_rows(1).desired_width(220.0));
                if response.changed() {
                    match self.state.session.set_comment(&row.id, &comment) {
                        Ok(_) => self.state.dirty = true,
                        Err(err) => self.status = err.to_string(),
                    }
                }

                if ui.button("Delete").clicked() {
                    if row.origin == "AI" {
                        self.state.delete_prompt = Some(DeletePrompt {
                            id: row.id.clone(),
                            number: row.number,
                            reason: String::new(),
                        });
                    } else {
                        match self.state.session.delete(&row.id, None) {
                            Ok(_) => self.state.dirty = true,
                            Err(err) => self.status = err.to_string(),
                        }
                    }
                }
                if hovered_here {
                    row_hovered = Some(row.id.clone());
                }
                ui.end_row();
            }
        });

        if let Some(id) = row_hovered {
            self.state.session.mode_mut().hover(&id);
            self.hover_claimed = true;
        }

        let deleted: Vec<(String, &'static str, String)> = self
            .state
            .session
            .store()
            .deleted()
            .map(|a| (a.id.clone(), a.source.label(), a.comment.clone()))
            .collect();
        if !deleted.is_empty() {
            egui::CollapsingHeader::new(format!("Deleted ({})", deleted.len()))
                .id_source("deleted_list")
                .show(ui, |ui| {
                    for (id, origin, comment) in deleted {
                        ui.horizontal(|ui| {
                            ui.label(format!("{id} ({origin})"));
                            if let Some(last) = comment.lines().last() {
                                ui.label(RichText::new(last).size(11.0).color(Color32::from_gray(150)));
                            }
                            if ui.button("Restore").clicked() {
                                match self.state.session.restore(&id) {
                                    Ok(_) => self.state.dirty = true,
                                    Err(err) => self.status = err.to_string(),
                                }
                            }
                        });
                    }
                });
        }
    }

    fn render_delete_prompt(&mut self, ctx: &egui::Context) {
        let Some(mut prompt) = self.state.delete_prompt.take() else {
            return;
        };
        let mut keep_open = true;
        egui::Window::new(format!("Delete anomaly #{}", prompt.number))
            .collapsible(false)
            .resizable(false)
            .anchor(Align2::CENTER_CENTER, egui::vec2(0.0, 0.0))
            .show(ctx, |ui| {
                ui.label("Reason for deleting this AI-detected anomaly:");
                ui.add(egui::TextEdit::multiline(&mut prompt.reason).desired_rows(3));
                ui.horizontal(|ui| {
                    let has_reason = !prompt.reason.trim().is_empty();
                    if ui.add_enabled(has_reason, egui::Button::new("Delete")).clicked() {
                        match self.state.session.delete(&prompt.id, Some(prompt.reason.as_str())) {
                            Ok(_) => {
                                self.state.dirty = true;
                                self.status = format!("Deleted #{}", prompt.number);
                            }
                            Err(err) => self.status = err.to_string(),
                        }
                        keep_open = false;
                    }
                    if ui.button("Cancel").clicked() {
                        keep_open = false;
                    }
                });
            });
        if keep_open {
            self.state.delete_prompt = Some(prompt);
        }
    }

    fn render_clear_confirm(&mut self, ctx: &egui::Context) {
        if !self.state.confirm_clear {
            return;
        }
        egui::Window::new("Clear annotations")
            .collapsible(false)
            .resizable(false)
            .anchor(Align2::CENTER_CENTER, egui::vec2(0.0, 0.0))
            .show(ctx, |ui| {
                ui.label("Remove every annotation from this inspection?");
                ui.horizontal(|ui| {
                    if ui.button("Clear").clicked() {
                        self.state.session.clear_annotations();
                        self.state.confirm_clear = false;
                        self.state.dirty = true;
                    }
                    if ui.button("Cancel").clicked() {
                        self.state.confirm_clear = false;
                    }
                });
            });
    }

    fn render_inspector(&mut self, ctx: &egui::Context) {
        if !self.state.inspector_open {
            return;
        }
        let mut open = true;
        egui::Window::new("Inspector")
            .open(&mut open)
            .default_size([960.0, 680.0])
            .resizable(true)
            .show(ctx, |ui| {
                let viewer = &mut self.state.inspector;
                ui.horizontal(|ui| {
                    if ui.button("Zoom +").clicked() {
                        let zoom = viewer.zoom() + INSPECTOR_ZOOM_STEP;
                        viewer.set_zoom(zoom, None);
                    }
                    if ui.button("Fit").clicked() {
                        viewer.fit_to_container();
                    }
                    if ui.button("1:1").clicked() {
                        viewer.reset();
                    }
                    ui.label(format!("{:.0}%", viewer.zoom() * 100.0));
                });

                let size = ui.available_size().max(egui::vec2(200.0, 200.0));
                let (response, painter) = ui.allocate_painter(size, Sense::click_and_drag());
                let canvas = response.rect;
                let painter = painter.with_clip_rect(canvas);
                painter.rect_filled(canvas, 0.0, Color32::from_gray(12));

                let natural = self.state.session.maintenance_size();
                viewer.set_container(to_size(canvas.size()));
                viewer.set_natural(natural);
                if self.state.inspector_needs_fit && natural.is_known() {
                    viewer.fit_to_container();
                    self.state.inspector_needs_fit = false;
                }

                if response.hovered() {
                    let scroll = ui.input(|i| i.smooth_scroll_delta.y);
                    if scroll != 0.0 {
                        let pivot = response.hover_pos().map(|p| to_point(canvas.min, p));
                        viewer.zoom_by((scroll * WHEEL_ZOOM_SPEED).exp(), pivot);
                    }
                }
                if response.drag_started() {
                    if let Some(pos) = response.interact_pointer_pos() {
                        viewer.begin_drag(to_point(canvas.min, pos));
                    }
                }
                if response.dragged() {
                    if let Some(pos) = response.interact_pointer_pos() {
                        viewer.drag_to(to_point(canvas.min, pos));
                    }
                }
                if response.drag_stopped() {
                    viewer.end_drag();
                }

                let texture = self
                    .state
                    .annotated
                    .texture
                    .as_ref()
                    .or(self.state.maintenance.texture.as_ref());
                match texture {
                    Some(texture) if natural.is_known() => {
                        paint_texture(&painter, texture, to_egui_rect(canvas.min, viewer.visible_rect()));
                    }
                    _ => placeholder(&painter, canvas, "No thermal image"),
                }

                let viewer = self.state.inspector.clone();
                self.paint_overlays(&painter, canvas.min, &viewer);
            });
        self.state.inspector_open = open;
        if !open {
            self.state.inspector.end_drag();
        }
    }
}

fn weather_combo(ui: &mut egui::Ui, id: &str, weather: &mut Weather) {
    egui::ComboBox::from_id_source(id)
        .selected_text(weather.label())
        .width(80.0)
        .show_ui(ui, |ui| {
            for option in Weather::ALL {
                ui.selectable_value(weather, option, option.label());
            }
        });
}

fn paint_texture(painter: &egui::Painter, texture: &egui::TextureHandle, rect: egui::Rect) {
    let uv = egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0));
    painter.image(texture.id(), rect, uv, Color32::WHITE);
}

fn placeholder(painter: &egui::Painter, canvas: egui::Rect, text: &str) {
    painter.text(canvas.center(), Align2::CENTER_CENTER, text, FontId::proportional(14.0), Color32::from_gray(150));
}

fn now_stamp() -> String {
    chrono::Local::now().format("%Y-%m-%dT%H:%M:%S").to_string()
}

pub fn configure_fonts(ctx: &egui::Context) {
    let mut fonts = FontDefinitions::default();
    let candidates = [
        r"C:\Windows\Fonts\meiryo.ttc",
        r"C:\Windows\Fonts\msgothic.ttc",
        "/System/Library/Fonts/Supplemental/Arial Unicode.ttf",
        "/usr/share/fonts/truetype/noto/NotoSansCJK-Regular.ttc",
        "/usr/share/fonts/opentype/noto/NotoSansCJK-Regular.ttc",
    ];

    for path in candidates {
        if let Ok(data) = std::fs::read(path) {
            fonts.font_data.insert("cjk_fallback".to_string(), FontData::from_owned(data));
            fonts.families
                .entry(FontFamily::Proportional)
                .or_default()
                .push("cjk_fallback".to_string());
            fonts.families
                .entry(FontFamily::Monospace)
                .or_default()
                .push("cjk_fallback".to_string());
            ctx.set_fonts(fonts);
            return;
        }
    }
}

impl Default for DesktopApp {
    fn default() -> Self {
        let (image_tx, image_rx) = mpsc::channel();
        Self {
            state: AppState::default(),
            status: String::new(),
            analyze_status: String::new(),
            save_status: String::new(),
            analyze_rx: None,
            save_rx: None,
            image_rx,
            image_tx,
            image_inflight: 0,
            hover_claimed: false,
        }
    }
}

impl eframe::App for DesktopApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        if self.analyze_rx.is_some() || self.save_rx.is_some() || self.image_inflight > 0 {
            ctx.request_repaint();
        }
        self.poll_messages(ctx);
        self.hover_claimed = false;

        if ctx.input(|i| i.key_pressed(egui::Key::Escape)) {
            self.state.session.mode_mut().cancel();
        }

        egui::TopBottomPanel::top("top").show(ctx, |ui| {
            egui::menu::bar(ui, |ui| {
                ui.menu_button("File", |ui| {
                    if ui.button("New Inspection").clicked() {
                        self.new_inspection();
                        ui.close_menu();
                    }
                    if ui.button("Open Inspection").clicked() {
                        self.open_inspection();
                        ui.close_menu();
                    }
                    if ui.button("Save").clicked() {
                        self.save(false);
                        ui.close_menu();
                    }
                    if ui.button("Save As").clicked() {
                        self.save(true);
                        ui.close_menu();
                    }
                });

                ui.separator();
                let title = format!(
                    "Inspection {}{}",
                    self.state.session.inspection_id(),
                    if self.state.dirty { " *" } else { "" }
                );
                ui.label(RichText::new(title).strong());
                for status in [&self.analyze_status, &self.save_status, &self.status] {
                    if !status.is_empty() {
                        ui.label(RichText::new(status.as_str()).color(Color32::from_gray(170)));
                    }
                }
            });
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            self.render_progress(ui);
            ui.separator();
            self.render_controls(ui);
            ui.separator();

            let half = (ui.available_width() - 12.0) / 2.0;
            ui.horizontal_top(|ui| {
                ui.vertical(|ui| {
                    ui.set_width(half);
                    self.render_image_header(ui, SlotKind::Baseline);
                    self.render_baseline(ui, half);
                });
                ui.vertical(|ui| {
                    ui.set_width(half);
                    self.render_image_header(ui, SlotKind::Maintenance);
                    self.render_thermal(ui, half);
                });
            });

            ui.separator();
            egui::ScrollArea::vertical().auto_shrink([false, false]).show(ui, |ui| {
                self.render_log(ui);
            });
        });

        // 画像にもログ行にもポインタがなければハイライトを消す
        if !self.hover_claimed && !self.state.session.mode().is_drawing() {
            self.state.session.mode_mut().unhover();
        }

        self.render_delete_prompt(ctx);
        self.render_clear_confirm(ctx);
        self.render_inspector(ctx);
    }
}

fn resolve_cli_binary() -> PathBuf {
    let name = if cfg!(windows) { "thermal-review.exe" } else { "thermal-review" };
    let exe = std::env::current_exe().ok();
    if let Some(base_dir) = exe.as_ref().and_then(|p| p.parent()) {
        let local = base_dir.join(name);
        if local.exists() {
            return local;
        }
        if let Some(target_dir) = base_dir.parent() {
            let sibling = target_dir.join("debug").join(name);
            if sibling.exists() {
                return sibling;
            }
            let release = target_dir.join("release").join(name);
            if release.exists() {
                return release;
            }
        }
    }
    PathBuf::from("thermal-review")
}
