use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use eframe::egui::{self, ColorImage, Sense, TextureHandle, TextureOptions};

use crate::codec::{
    decode_for_display, download_file_name, parse_data_uri, to_data_uri, SourceImage,
    RESULT_MIME_TYPE,
};
use crate::history::{AnalysisLog, EditHistory};
use crate::launch::{LaunchRequest, Mode};
use crate::prompts::{
    append_filter, compose_edit_prompt, filter_scenes, require_image, require_prompt,
    time_travel_prompt, TextOverlay, TextPosition, DEFAULT_ANALYSIS_PROMPT, FONT_FAMILIES,
    FONT_SIZES, QUICK_FILTERS, SCENES,
};
use crate::service::GenerativeImageService;
use crate::settings::{model_label, Provider, Settings, SettingsStore, IMAGE_MODELS, TEXT_MODELS};
use crate::tasks::{ActionSlot, SlotPoll};
use crate::zoomable::{ZoomableAction, ZoomableImage};

const APP_TITLE: &str = "Vision Lab";
const APP_VERSION: &str = env!("CARGO_PKG_VERSION");
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp", "gif", "bmp", "heic", "heif"];
const RESULT_VIEW_MAX_HEIGHT: f32 = 520.0;
const PREVIEW_VIEW_MAX_HEIGHT: f32 = 360.0;
const HISTORY_THUMB_MAX_DIM: usize = 96;
const HISTORY_LIST_THUMB_MAX_DIM: f32 = 56.0;
const ACCENT: egui::Color32 = egui::Color32::from_rgb(244, 196, 48);

const CREATE_PROMPT_REQUIRED: &str = "Please enter a prompt to generate an image.";
const EDIT_INPUT_REQUIRED: &str = "Please upload an image and provide an editing prompt.";
const ANALYZE_IMAGE_REQUIRED: &str = "Please upload an image to analyze.";
const PORTRAIT_REQUIRED: &str = "Please upload a photo of yourself.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Theme {
    #[default]
    Dark,
    Light,
}

impl Theme {
    fn toggled(self) -> Self {
        match self {
            Theme::Dark => Theme::Light,
            Theme::Light => Theme::Dark,
        }
    }

    fn toggle_label(self) -> &'static str {
        match self {
            Theme::Dark => "Light mode",
            Theme::Light => "Dark mode",
        }
    }
}

enum ViewEvent {
    Fullscreen(TextureHandle),
    Download { file_name: String, bytes: Arc<[u8]> },
}

/// Texture cache for one displayed image, rebuilt when the bytes change.
#[derive(Default)]
struct ImageView {
    shown: Option<Arc<[u8]>>,
    image: Option<ZoomableImage>,
}

impl ImageView {
    fn sync(
        &mut self,
        ctx: &egui::Context,
        nonce: &mut u64,
        bytes: Option<&Arc<[u8]>>,
        alt: &str,
    ) {
        let Some(bytes) = bytes else {
            self.shown = None;
            self.image = None;
            return;
        };
        if self
            .shown
            .as_ref()
            .is_some_and(|shown| Arc::ptr_eq(shown, bytes))
        {
            return;
        }

        *nonce = nonce.saturating_add(1);
        self.shown = Some(Arc::clone(bytes));
        self.image = match ZoomableImage::new(ctx, format!("view-{nonce}"), alt, Arc::clone(bytes))
        {
            Ok(image) => Some(image),
            Err(err) => {
                log::warn!("Could not display {alt}: {err}");
                None
            }
        };
    }

    fn show(&mut self, ui: &mut egui::Ui, max_height: f32) -> Option<ViewEvent> {
        let Some(image) = self.image.as_mut() else {
            if self.shown.is_some() {
                ui.label("Preview unavailable for this image format.");
            }
            return None;
        };
        let action = image.show(ui, max_height)?;
        Some(match action {
            ZoomableAction::Fullscreen => ViewEvent::Fullscreen(image.texture().clone()),
            ZoomableAction::Download => ViewEvent::Download {
                file_name: download_file_name(image.alt()),
                bytes: Arc::clone(image.bytes()),
            },
        })
    }
}

#[derive(Default)]
struct CreatorState {
    prompt: String,
    result: Option<Arc<[u8]>>,
    result_view: ImageView,
    error: Option<String>,
    task: ActionSlot<Vec<u8>>,
}

#[derive(Default)]
struct EditorState {
    original: Option<SourceImage>,
    original_view: ImageView,
    prompt: String,
    overlay: TextOverlay,
    history: EditHistory<String>,
    edited: Option<Arc<[u8]>>,
    edited_view: ImageView,
    error: Option<String>,
    task: ActionSlot<Vec<u8>>,
}

impl EditorState {
    fn sync_edited(&mut self) {
        self.edited = match self.history.current() {
            None => None,
            Some(uri) => match parse_data_uri(uri) {
                Ok((_, bytes)) => Some(Arc::from(bytes)),
                Err(err) => {
                    self.error = Some(err.to_string());
                    None
                }
            },
        };
    }
}

struct AnalysisOutcome {
    image: SourceImage,
    prompt: String,
    analysis: String,
}

enum AnalysisLogAction {
    View(u64),
    Rerun(u64),
    Clear,
}

struct AnalyzerState {
    image: Option<SourceImage>,
    image_view: ImageView,
    prompt: String,
    analysis: Option<String>,
    log: AnalysisLog,
    thumbs: HashMap<u64, Option<TextureHandle>>,
    error: Option<String>,
    task: ActionSlot<AnalysisOutcome>,
}

impl Default for AnalyzerState {
    fn default() -> Self {
        Self {
            image: None,
            image_view: ImageView::default(),
            prompt: DEFAULT_ANALYSIS_PROMPT.to_string(),
            analysis: None,
            log: AnalysisLog::new(),
            thumbs: HashMap::new(),
            error: None,
            task: ActionSlot::new(),
        }
    }
}

struct TimeTravelState {
    portrait: Option<SourceImage>,
    portrait_view: ImageView,
    search: String,
    scene: &'static str,
    result: Option<Arc<[u8]>>,
    result_view: ImageView,
    error: Option<String>,
    task: ActionSlot<Vec<u8>>,
}

impl Default for TimeTravelState {
    fn default() -> Self {
        Self {
            portrait: None,
            portrait_view: ImageView::default(),
            search: String::new(),
            scene: SCENES[0],
            result: None,
            result_view: ImageView::default(),
            error: None,
            task: ActionSlot::new(),
        }
    }
}

pub struct VisionLabApp {
    service: Arc<dyn GenerativeImageService>,
    settings_store: SettingsStore,
    settings: Settings,
    settings_draft: Option<Settings>,
    mode: Mode,
    theme: Theme,
    status_line: String,
    texture_nonce: u64,
    fullscreen: Option<TextureHandle>,
    pending_launch_request: Option<LaunchRequest>,
    creator: CreatorState,
    editor: EditorState,
    analyzer: AnalyzerState,
    time_travel: TimeTravelState,
}

impl VisionLabApp {
    pub fn new(
        service: Arc<dyn GenerativeImageService>,
        settings_store: SettingsStore,
        initial_request: Option<LaunchRequest>,
        initial_status: Option<String>,
    ) -> Self {
        let settings = settings_store.load();
        Self {
            service,
            settings_store,
            settings,
            settings_draft: None,
            mode: Mode::default(),
            theme: Theme::default(),
            status_line: initial_status.unwrap_or_default(),
            texture_nonce: 0,
            fullscreen: None,
            pending_launch_request: initial_request,
            creator: CreatorState::default(),
            editor: EditorState::default(),
            analyzer: AnalyzerState::default(),
            time_travel: TimeTravelState::default(),
        }
    }

    fn apply_theme(ctx: &egui::Context, theme: Theme) {
        let mut visuals = match theme {
            Theme::Dark => {
                let mut visuals = egui::Visuals::dark();
                visuals.panel_fill = egui::Color32::from_gray(16);
                visuals.window_fill = egui::Color32::from_gray(22);
                visuals.extreme_bg_color = egui::Color32::from_gray(8);
                visuals
            }
            Theme::Light => egui::Visuals::light(),
        };
        visuals.selection.bg_fill = ACCENT;
        visuals.selection.stroke = egui::Stroke::new(1.0, egui::Color32::BLACK);
        visuals.hyperlink_color = ACCENT;
        ctx.set_visuals(visuals);
    }

    fn is_busy(&self) -> bool {
        self.creator.task.is_busy()
            || self.editor.task.is_busy()
            || self.analyzer.task.is_busy()
            || self.time_travel.task.is_busy()
    }

    fn mode_error_mut(&mut self, mode: Mode) -> &mut Option<String> {
        match mode {
            Mode::Create => &mut self.creator.error,
            Mode::Edit => &mut self.editor.error,
            Mode::Analyze => &mut self.analyzer.error,
            Mode::TimeTravel => &mut self.time_travel.error,
        }
    }

    fn handle_launch_request(&mut self, request: LaunchRequest) {
        let mode = request.mode.unwrap_or(if request.image.is_some() {
            Mode::Edit
        } else {
            Mode::Create
        });
        self.mode = mode;

        if let Some(path) = request.image {
            if mode == Mode::Create {
                self.status_line = "The Creator does not take an input image.".to_string();
            } else {
                self.open_image(mode, &path);
            }
        }

        if let Some(prompt) = request.prompt {
            match mode {
                Mode::Create => self.creator.prompt = prompt,
                Mode::Edit => self.editor.prompt = prompt,
                Mode::Analyze => self.analyzer.prompt = prompt,
                Mode::TimeTravel => self.time_travel.search = prompt,
            }
        }
    }

    fn pick_image(&mut self, mode: Mode) {
        let picked = rfd::FileDialog::new()
            .add_filter("Images", IMAGE_EXTENSIONS)
            .pick_file();
        if let Some(path) = picked {
            self.open_image(mode, &path);
        }
    }

    fn open_image(&mut self, mode: Mode, path: &Path) {
        match SourceImage::load(path) {
            Ok(image) => {
                log::info!("Opened {} ({})", path.display(), image.mime_type);
                self.set_image(mode, image);
            }
            Err(err) => {
                log::warn!("Could not open {}: {err}", path.display());
                *self.mode_error_mut(mode) = Some(err.to_string());
            }
        }
    }

    fn set_image(&mut self, mode: Mode, image: SourceImage) {
        match mode {
            Mode::Create => {}
            Mode::Edit => {
                self.editor.original = Some(image);
                self.editor.history.reset();
                self.editor.edited = None;
                self.editor.error = None;
            }
            Mode::Analyze => {
                self.analyzer.image = Some(image);
                self.analyzer.analysis = None;
                self.analyzer.error = None;
            }
            Mode::TimeTravel => {
                self.time_travel.portrait = Some(image);
                self.time_travel.result = None;
                self.time_travel.error = None;
            }
        }
    }

    fn start_create(&mut self) {
        if self.creator.task.is_busy() {
            return;
        }
        let prompt = match require_prompt(&self.creator.prompt, CREATE_PROMPT_REQUIRED) {
            Ok(prompt) => prompt,
            Err(err) => {
                self.creator.error = Some(err.to_string());
                return;
            }
        };

        self.creator.error = None;
        self.creator.result = None;
        let service = Arc::clone(&self.service);
        let model = self.settings.image_model.clone();
        self.creator.task.start(move || {
            service
                .generate(&prompt, &model)
                .map_err(|err| err.to_string())
        });
    }

    fn start_edit(&mut self) {
        if self.editor.task.is_busy() {
            return;
        }
        let original = match require_image(self.editor.original.as_ref(), EDIT_INPUT_REQUIRED) {
            Ok(image) => image.clone(),
            Err(err) => {
                self.editor.error = Some(err.to_string());
                return;
            }
        };
        if let Err(err) = require_prompt(&self.editor.prompt, EDIT_INPUT_REQUIRED) {
            self.editor.error = Some(err.to_string());
            return;
        }

        self.editor.error = None;
        let prompt = compose_edit_prompt(&self.editor.prompt, &self.editor.overlay);
        let service = Arc::clone(&self.service);
        let model = self.settings.image_model.clone();
        self.editor.task.start(move || {
            service
                .edit(&original.bytes, &original.mime_type, &prompt, &model)
                .map_err(|err| err.to_string())
        });
    }

    fn undo_edit(&mut self) {
        if self.editor.task.is_busy() || !self.editor.history.can_undo() {
            return;
        }
        self.editor.history.undo();
        self.editor.sync_edited();
    }

    fn redo_edit(&mut self) {
        if self.editor.task.is_busy() || !self.editor.history.can_redo() {
            return;
        }
        self.editor.history.redo();
        self.editor.sync_edited();
    }

    fn analyze_current(&mut self) {
        match require_image(self.analyzer.image.as_ref(), ANALYZE_IMAGE_REQUIRED) {
            Ok(image) => {
                let image = image.clone();
                let prompt = self.analyzer.prompt.clone();
                self.start_analysis(image, prompt);
            }
            Err(err) => self.analyzer.error = Some(err.to_string()),
        }
    }

    fn start_analysis(&mut self, image: SourceImage, prompt: String) {
        if self.analyzer.task.is_busy() {
            return;
        }
        self.analyzer.error = None;
        self.analyzer.analysis = None;
        let service = Arc::clone(&self.service);
        let model = self.settings.text_model.clone();
        self.analyzer.task.start(move || {
            service
                .analyze(&image.bytes, &image.mime_type, &prompt, &model)
                .map(|analysis| AnalysisOutcome {
                    image,
                    prompt,
                    analysis,
                })
                .map_err(|err| err.to_string())
        });
    }

    fn apply_analysis_log_action(&mut self, action: AnalysisLogAction) {
        match action {
            AnalysisLogAction::View(id) => {
                let Some(entry) = self.analyzer.log.get(id).cloned() else {
                    return;
                };
                self.analyzer.image = Some(entry.image);
                self.analyzer.prompt = entry.prompt;
                self.analyzer.analysis = Some(entry.analysis);
                self.analyzer.error = None;
            }
            AnalysisLogAction::Rerun(id) => {
                if self.analyzer.task.is_busy() {
                    return;
                }
                let Some(entry) = self.analyzer.log.get(id).cloned() else {
                    return;
                };
                self.analyzer.image = Some(entry.image.clone());
                self.analyzer.prompt = entry.prompt.clone();
                self.start_analysis(entry.image, entry.prompt);
            }
            AnalysisLogAction::Clear => self.analyzer.log.clear(),
        }
    }

    fn start_time_travel(&mut self) {
        if self.time_travel.task.is_busy() {
            return;
        }
        let portrait = match require_image(self.time_travel.portrait.as_ref(), PORTRAIT_REQUIRED) {
            Ok(image) => image.clone(),
            Err(err) => {
                self.time_travel.error = Some(err.to_string());
                return;
            }
        };

        self.time_travel.error = None;
        self.time_travel.result = None;
        let prompt = time_travel_prompt(self.time_travel.scene);
        let service = Arc::clone(&self.service);
        let model = self.settings.image_model.clone();
        self.time_travel.task.start(move || {
            service
                .edit(&portrait.bytes, &portrait.mime_type, &prompt, &model)
                .map_err(|err| err.to_string())
        });
    }

    fn poll_tasks(&mut self) -> bool {
        match self.creator.task.poll() {
            SlotPoll::Finished(Ok(bytes)) => {
                log::info!("Created image ({} bytes)", bytes.len());
                self.creator.result = Some(Arc::from(bytes));
            }
            SlotPoll::Finished(Err(message)) => self.creator.error = Some(message),
            SlotPoll::Idle | SlotPoll::Busy => {}
        }

        match self.editor.task.poll() {
            SlotPoll::Finished(Ok(bytes)) => {
                log::info!("Edited image ({} bytes)", bytes.len());
                self.editor
                    .history
                    .push(to_data_uri(RESULT_MIME_TYPE, &bytes));
                self.editor.sync_edited();
            }
            SlotPoll::Finished(Err(message)) => self.editor.error = Some(message),
            SlotPoll::Idle | SlotPoll::Busy => {}
        }

        match self.analyzer.task.poll() {
            SlotPoll::Finished(Ok(outcome)) => {
                self.analyzer.analysis = Some(outcome.analysis.clone());
                self.analyzer
                    .log
                    .record(outcome.image, outcome.prompt, outcome.analysis);
            }
            SlotPoll::Finished(Err(message)) => {
                self.analyzer.error = Some(message);
                self.analyzer.analysis = None;
            }
            SlotPoll::Idle | SlotPoll::Busy => {}
        }

        match self.time_travel.task.poll() {
            SlotPoll::Finished(Ok(bytes)) => {
                log::info!("Time travel finished ({} bytes)", bytes.len());
                self.time_travel.result = Some(Arc::from(bytes));
            }
            SlotPoll::Finished(Err(message)) => self.time_travel.error = Some(message),
            SlotPoll::Idle | SlotPoll::Busy => {}
        }

        self.is_busy()
    }

    fn apply_settings(&mut self, settings: Settings) {
        match self.settings_store.save(&settings) {
            Ok(()) => self.status_line = "Settings saved.".to_string(),
            Err(err) => {
                log::warn!("{err}");
                self.status_line = err.to_string();
            }
        }
        self.settings = settings;
    }

    fn sync_views(&mut self, ctx: &egui::Context) {
        let nonce = &mut self.texture_nonce;
        self.creator.result_view.sync(
            ctx,
            nonce,
            self.creator.result.as_ref(),
            "Generated image",
        );
        self.editor.original_view.sync(
            ctx,
            nonce,
            self.editor.original.as_ref().map(|image| &image.bytes),
            "Original image",
        );
        self.editor
            .edited_view
            .sync(ctx, nonce, self.editor.edited.as_ref(), "Edited image");
        self.analyzer.image_view.sync(
            ctx,
            nonce,
            self.analyzer.image.as_ref().map(|image| &image.bytes),
            "Analyzed image",
        );
        self.time_travel.portrait_view.sync(
            ctx,
            nonce,
            self.time_travel.portrait.as_ref().map(|image| &image.bytes),
            "Your photo",
        );
        self.time_travel.result_view.sync(
            ctx,
            nonce,
            self.time_travel.result.as_ref(),
            "Time travel result",
        );
    }

    fn sync_analysis_thumbs(&mut self, ctx: &egui::Context) {
        let entries = self.analyzer.log.entries();
        self.analyzer
            .thumbs
            .retain(|id, _| entries.iter().any(|entry| entry.id == *id));

        for entry in entries {
            if self.analyzer.thumbs.contains_key(&entry.id) {
                continue;
            }
            self.texture_nonce = self.texture_nonce.saturating_add(1);
            let thumb = match decode_for_display(&entry.image.bytes) {
                Ok(color_image) => Some(ctx.load_texture(
                    format!("analysis-thumb-{}", self.texture_nonce),
                    downsample_color_image(&color_image, HISTORY_THUMB_MAX_DIM),
                    TextureOptions::LINEAR,
                )),
                Err(err) => {
                    log::warn!("No thumbnail for {}: {err}", entry.image.name);
                    None
                }
            };
            self.analyzer.thumbs.insert(entry.id, thumb);
        }
    }

    fn handle_view_event(&mut self, event: ViewEvent) {
        match event {
            ViewEvent::Fullscreen(texture) => self.fullscreen = Some(texture),
            ViewEvent::Download { file_name, bytes } => {
                let Some(path) = rfd::FileDialog::new()
                    .set_file_name(file_name)
                    .add_filter("PNG image", &["png"])
                    .save_file()
                else {
                    return;
                };
                self.status_line = match write_download(&path, &bytes) {
                    Ok(()) => format!("Saved {}", path.display()),
                    Err(err) => err,
                };
            }
        }
    }

    fn show_creator(&mut self, ui: &mut egui::Ui) -> Option<ViewEvent> {
        let busy = self.creator.task.is_busy();
        ui.heading(Mode::Create.label());
        ui.label("Describe the image you want to create.");
        ui.add(
            egui::TextEdit::multiline(&mut self.creator.prompt)
                .hint_text("A peacock dancing in the monsoon rain, oil painting")
                .desired_rows(3)
                .desired_width(f32::INFINITY),
        );

        let can_create = !busy && !self.creator.prompt.trim().is_empty();
        let label = if busy { "Creating..." } else { "Create" };
        if ui.add_enabled(can_create, egui::Button::new(label)).clicked() {
            self.start_create();
        }

        show_error_banner(ui, self.creator.error.as_deref());
        if busy {
            show_busy(ui, "Creating your image...");
        }
        ui.add_space(8.0);
        self.creator.result_view.show(ui, RESULT_VIEW_MAX_HEIGHT)
    }

    fn show_editor(&mut self, ui: &mut egui::Ui) -> Option<ViewEvent> {
        let busy = self.editor.task.is_busy();
        let mut open_clicked = false;
        let mut generate_clicked = false;
        let mut undo_clicked = false;
        let mut redo_clicked = false;

        ui.heading(Mode::Edit.label());
        ui.horizontal(|ui| {
            open_clicked = ui
                .add_enabled(!busy, egui::Button::new("Open image..."))
                .clicked();
            if let Some(original) = self.editor.original.as_ref() {
                show_image_caption(ui, original);
            }
        });

        ui.add(
            egui::TextEdit::multiline(&mut self.editor.prompt)
                .hint_text("Describe the edit, e.g. add a sunset behind the temple")
                .desired_rows(3)
                .desired_width(f32::INFINITY),
        );

        ui.horizontal_wrapped(|ui| {
            ui.label("Quick filters:");
            for filter in QUICK_FILTERS {
                if ui
                    .add_enabled(!busy, egui::Button::new(filter.name))
                    .on_hover_text(filter.prompt)
                    .clicked()
                {
                    self.editor.prompt = append_filter(&self.editor.prompt, filter);
                }
            }
        });

        show_overlay_options(ui, &mut self.editor.overlay);

        ui.horizontal(|ui| {
            let can_generate = !busy
                && self.editor.original.is_some()
                && !self.editor.prompt.trim().is_empty();
            let label = if busy { "Generating..." } else { "Generate" };
            generate_clicked = ui.add_enabled(can_generate, egui::Button::new(label)).clicked();
            undo_clicked = ui
                .add_enabled(!busy && self.editor.history.can_undo(), egui::Button::new("Undo"))
                .clicked();
            redo_clicked = ui
                .add_enabled(!busy && self.editor.history.can_redo(), egui::Button::new("Redo"))
                .clicked();
            if let Some(cursor) = self.editor.history.cursor() {
                ui.label(format!("Edit {} of {}", cursor + 1, self.editor.history.len()));
            }
        });

        show_error_banner(ui, self.editor.error.as_deref());
        if busy {
            show_busy(ui, "Applying your edit...");
        }
        ui.add_space(8.0);

        let mut event = None;
        let original_view = &mut self.editor.original_view;
        let edited_view = &mut self.editor.edited_view;
        let has_edit = self.editor.edited.is_some();
        ui.columns(2, |columns| {
            columns[0].strong("Original");
            if let Some(found) = original_view.show(&mut columns[0], RESULT_VIEW_MAX_HEIGHT) {
                event = Some(found);
            }
            columns[1].strong("Edited");
            if has_edit {
                if let Some(found) = edited_view.show(&mut columns[1], RESULT_VIEW_MAX_HEIGHT) {
                    event = Some(found);
                }
            } else {
                columns[1].label("Your edited image will appear here.");
            }
        });

        if open_clicked {
            self.pick_image(Mode::Edit);
        }
        if generate_clicked {
            self.start_edit();
        }
        if undo_clicked {
            self.undo_edit();
        }
        if redo_clicked {
            self.redo_edit();
        }
        event
    }

    fn show_analyzer(&mut self, ui: &mut egui::Ui) -> Option<ViewEvent> {
        let busy = self.analyzer.task.is_busy();
        let mut open_clicked = false;
        let mut analyze_clicked = false;

        ui.heading(Mode::Analyze.label());
        ui.horizontal(|ui| {
            open_clicked = ui
                .add_enabled(!busy, egui::Button::new("Open image..."))
                .clicked();
            if let Some(image) = self.analyzer.image.as_ref() {
                show_image_caption(ui, image);
            }
        });
        let event = self.analyzer.image_view.show(ui, PREVIEW_VIEW_MAX_HEIGHT);

        ui.add(
            egui::TextEdit::multiline(&mut self.analyzer.prompt)
                .desired_rows(2)
                .desired_width(f32::INFINITY),
        );
        let label = if busy { "Analyzing..." } else { "Analyze" };
        if ui
            .add_enabled(!busy && self.analyzer.image.is_some(), egui::Button::new(label))
            .clicked()
        {
            analyze_clicked = true;
        }

        show_error_banner(ui, self.analyzer.error.as_deref());
        if busy {
            show_busy(ui, "Analyzing your image...");
        }
        if let Some(analysis) = self.analyzer.analysis.as_deref() {
            ui.add_space(6.0);
            egui::Frame::group(ui.style()).show(ui, |ui| {
                ui.set_width(ui.available_width());
                ui.label(analysis);
            });
        }

        ui.add_space(10.0);
        let log_action = self.show_analysis_log(ui, busy);

        if open_clicked {
            self.pick_image(Mode::Analyze);
        }
        if analyze_clicked {
            self.analyze_current();
        }
        if let Some(action) = log_action {
            self.apply_analysis_log_action(action);
        }
        event
    }

    fn show_analysis_log(&self, ui: &mut egui::Ui, busy: bool) -> Option<AnalysisLogAction> {
        let mut action = None;
        ui.horizontal(|ui| {
            ui.strong("History");
            if !self.analyzer.log.is_empty() && ui.button("Clear History").clicked() {
                action = Some(AnalysisLogAction::Clear);
            }
        });
        if self.analyzer.log.is_empty() {
            ui.label("No previous analyses.");
            return action;
        }

        egui::ScrollArea::vertical()
            .id_salt("analysis-history")
            .max_height(280.0)
            .show(ui, |ui| {
                for entry in self.analyzer.log.entries() {
                    egui::Frame::none()
                        .stroke(egui::Stroke::new(1.0, ui.visuals().widgets.inactive.bg_stroke.color))
                        .inner_margin(egui::Margin::same(6.0))
                        .show(ui, |ui| {
                            ui.horizontal(|ui| {
                                if let Some(Some(texture)) = self.analyzer.thumbs.get(&entry.id) {
                                    let texture_size = texture.size_vec2();
                                    let max_side = texture_size.x.max(texture_size.y).max(1.0);
                                    let scale =
                                        (HISTORY_LIST_THUMB_MAX_DIM / max_side).clamp(0.01, 1.0);
                                    ui.add(egui::Image::new((texture.id(), texture_size * scale)));
                                }
                                ui.vertical(|ui| {
                                    ui.label(egui::RichText::new(&entry.prompt).strong());
                                    ui.horizontal(|ui| {
                                        if ui.button("View").clicked() {
                                            action = Some(AnalysisLogAction::View(entry.id));
                                        }
                                        if ui
                                            .add_enabled(!busy, egui::Button::new("Re-run"))
                                            .clicked()
                                        {
                                            action = Some(AnalysisLogAction::Rerun(entry.id));
                                        }
                                    });
                                });
                            });
                        });
                    ui.add_space(4.0);
                }
            });
        action
    }

    fn show_time_travel(&mut self, ui: &mut egui::Ui) -> Option<ViewEvent> {
        let busy = self.time_travel.task.is_busy();
        let mut open_clicked = false;
        let mut travel_clicked = false;
        let mut event = None;

        ui.heading(Mode::TimeTravel.label());
        ui.horizontal(|ui| {
            open_clicked = ui
                .add_enabled(!busy, egui::Button::new("Open your photo..."))
                .clicked();
            if let Some(portrait) = self.time_travel.portrait.as_ref() {
                show_image_caption(ui, portrait);
            }
        });
        if let Some(found) = self
            .time_travel
            .portrait_view
            .show(ui, PREVIEW_VIEW_MAX_HEIGHT)
        {
            event = Some(found);
        }

        ui.add(
            egui::TextEdit::singleline(&mut self.time_travel.search)
                .hint_text("Search destinations")
                .desired_width(f32::INFINITY),
        );
        egui::ScrollArea::vertical()
            .id_salt("time-travel-scenes")
            .max_height(180.0)
            .show(ui, |ui| {
                let scenes = filter_scenes(&self.time_travel.search);
                if scenes.is_empty() {
                    ui.label("No destinations match your search.");
                }
                for scene in scenes {
                    if ui
                        .selectable_label(self.time_travel.scene == scene, scene)
                        .clicked()
                    {
                        self.time_travel.scene = scene;
                    }
                }
            });

        ui.label(format!("Destination: {}", self.time_travel.scene));
        let label = if busy { "Travelling..." } else { "Time Travel!" };
        if ui
            .add_enabled(!busy && self.time_travel.portrait.is_some(), egui::Button::new(label))
            .clicked()
        {
            travel_clicked = true;
        }

        show_error_banner(ui, self.time_travel.error.as_deref());
        if busy {
            show_busy(ui, "Travelling through time...");
        }
        ui.add_space(8.0);
        if let Some(found) = self
            .time_travel
            .result_view
            .show(ui, RESULT_VIEW_MAX_HEIGHT)
        {
            event = Some(found);
        }

        if open_clicked {
            self.pick_image(Mode::TimeTravel);
        }
        if travel_clicked {
            self.start_time_travel();
        }
        event
    }

    fn show_settings_window(&mut self, ctx: &egui::Context) {
        let Some(mut draft) = self.settings_draft.take() else {
            return;
        };

        let mut open = true;
        let mut save_clicked = false;
        let mut cancel_clicked = false;
        let settings_path = self.settings_store.path().map(Path::to_path_buf);
        egui::Window::new("Settings")
            .collapsible(false)
            .resizable(false)
            .open(&mut open)
            .show(ctx, |ui| {
                egui::Grid::new("settings-grid")
                    .num_columns(2)
                    .spacing([12.0, 8.0])
                    .show(ui, |ui| {
                        ui.label("Provider");
                        egui::ComboBox::from_id_salt("settings-provider")
                            .selected_text(draft.provider.label())
                            .show_ui(ui, |ui| {
                                for provider in Provider::ALL {
                                    ui.selectable_value(
                                        &mut draft.provider,
                                        *provider,
                                        provider.label(),
                                    );
                                }
                            });
                        ui.end_row();

                        ui.label("Image model");
                        model_combo(ui, "settings-image-model", IMAGE_MODELS, &mut draft.image_model);
                        ui.end_row();

                        ui.label("Text model");
                        model_combo(ui, "settings-text-model", TEXT_MODELS, &mut draft.text_model);
                        ui.end_row();
                    });

                if let Some(path) = settings_path.as_ref() {
                    ui.small(format!("Stored in {}", path.display()));
                }
                ui.separator();
                ui.horizontal(|ui| {
                    save_clicked = ui.button("Save").clicked();
                    cancel_clicked = ui.button("Cancel").clicked();
                });
            });

        if save_clicked {
            self.apply_settings(draft);
        } else if open && !cancel_clicked {
            self.settings_draft = Some(draft);
        }
    }

    fn show_fullscreen(&mut self, ctx: &egui::Context) {
        let Some(texture) = self.fullscreen.as_ref() else {
            return;
        };

        let mut close = ctx.input(|input| input.key_pressed(egui::Key::Escape));
        let screen = ctx.screen_rect();
        egui::Area::new(egui::Id::new("fullscreen-overlay"))
            .order(egui::Order::Foreground)
            .fixed_pos(screen.min)
            .show(ctx, |ui| {
                let (rect, response) = ui.allocate_exact_size(screen.size(), Sense::click());
                let painter = ui.painter();
                painter.rect_filled(rect, 0.0, egui::Color32::from_black_alpha(235));

                let texture_size = texture.size_vec2();
                if texture_size.x > 0.0 && texture_size.y > 0.0 {
                    let scale = (rect.width() * 0.92 / texture_size.x)
                        .min(rect.height() * 0.92 / texture_size.y);
                    let image_rect =
                        egui::Rect::from_center_size(rect.center(), texture_size * scale);
                    painter.image(
                        texture.id(),
                        image_rect,
                        egui::Rect::from_min_max(egui::Pos2::ZERO, egui::pos2(1.0, 1.0)),
                        egui::Color32::WHITE,
                    );
                }
                painter.text(
                    rect.right_top() + egui::vec2(-16.0, 16.0),
                    egui::Align2::RIGHT_TOP,
                    "Click or press Esc to close",
                    egui::FontId::proportional(13.0),
                    egui::Color32::from_gray(200),
                );
                if response.clicked() {
                    close = true;
                }
            });

        if close {
            self.fullscreen = None;
        }
    }
}

impl eframe::App for VisionLabApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        Self::apply_theme(ctx, self.theme);

        if let Some(request) = self.pending_launch_request.take() {
            self.handle_launch_request(request);
        }

        let busy = self.poll_tasks();
        self.sync_views(ctx);
        self.sync_analysis_thumbs(ctx);

        let mut settings_clicked = false;
        egui::TopBottomPanel::top("mode-bar")
            .exact_height(36.0)
            .show(ctx, |ui| {
                ui.horizontal_centered(|ui| {
                    ui.label(
                        egui::RichText::new(format!("{APP_TITLE} v{APP_VERSION}"))
                            .strong()
                            .color(ACCENT),
                    );
                    ui.separator();
                    for mode in Mode::ALL {
                        ui.selectable_value(&mut self.mode, *mode, mode.label());
                    }
                    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                        settings_clicked = ui.button("Settings").clicked();
                        if ui.button(self.theme.toggle_label()).clicked() {
                            self.theme = self.theme.toggled();
                        }
                    });
                });
            });

        if settings_clicked && self.settings_draft.is_none() {
            self.settings_draft = Some(self.settings.clone());
        }

        if !self.status_line.is_empty() {
            let mut dismiss = false;
            egui::TopBottomPanel::bottom("status-line").show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.label(&self.status_line);
                    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                        dismiss = ui.small_button("Dismiss").clicked();
                    });
                });
            });
            if dismiss {
                self.status_line.clear();
            }
        }

        let mut view_event = None;
        egui::CentralPanel::default().show(ctx, |ui| {
            egui::ScrollArea::vertical()
                .id_salt("mode-panel")
                .auto_shrink([false, false])
                .show(ui, |ui| {
                    view_event = match self.mode {
                        Mode::Create => self.show_creator(ui),
                        Mode::Edit => self.show_editor(ui),
                        Mode::Analyze => self.show_analyzer(ui),
                        Mode::TimeTravel => self.show_time_travel(ui),
                    };
                });
        });

        self.show_settings_window(ctx);
        self.show_fullscreen(ctx);
        if let Some(event) = view_event {
            self.handle_view_event(event);
        }

        if busy {
            ctx.set_cursor_icon(egui::CursorIcon::Progress);
            ctx.request_repaint_after(Duration::from_millis(16));
        }
    }
}

fn show_error_banner(ui: &mut egui::Ui, error: Option<&str>) {
    let Some(message) = error else {
        return;
    };
    egui::Frame::none()
        .fill(egui::Color32::from_rgb(80, 18, 18))
        .stroke(egui::Stroke::new(1.0, egui::Color32::from_rgb(190, 70, 70)))
        .rounding(6.0)
        .inner_margin(egui::Margin::same(8.0))
        .show(ui, |ui| {
            ui.set_width(ui.available_width());
            ui.colored_label(egui::Color32::from_rgb(255, 175, 175), message);
        });
}

fn show_image_caption(ui: &mut egui::Ui, image: &SourceImage) {
    let response = ui.label(&image.name);
    if let Some(path) = image.path.as_ref() {
        response.on_hover_text(path.display().to_string());
    }
}

fn show_busy(ui: &mut egui::Ui, message: &str) {
    ui.horizontal(|ui| {
        ui.add(egui::Spinner::new());
        ui.label(message);
    });
}

fn show_overlay_options(ui: &mut egui::Ui, overlay: &mut TextOverlay) {
    egui::CollapsingHeader::new("Text overlay")
        .id_salt("text-overlay")
        .show(ui, |ui| {
            ui.checkbox(&mut overlay.enabled, "Add text to the image");
            ui.add_enabled_ui(overlay.enabled, |ui| {
                egui::Grid::new("text-overlay-grid")
                    .num_columns(2)
                    .show(ui, |ui| {
                        ui.label("Text");
                        ui.text_edit_singleline(&mut overlay.text);
                        ui.end_row();

                        ui.label("Font");
                        option_combo(ui, "overlay-font", FONT_FAMILIES, &mut overlay.font_family);
                        ui.end_row();

                        ui.label("Size");
                        option_combo(ui, "overlay-size", FONT_SIZES, &mut overlay.font_size);
                        ui.end_row();

                        ui.label("Color");
                        ui.text_edit_singleline(&mut overlay.color);
                        ui.end_row();

                        ui.label("Position");
                        egui::ComboBox::from_id_salt("overlay-position")
                            .selected_text(overlay.position.label())
                            .show_ui(ui, |ui| {
                                for position in TextPosition::ALL {
                                    ui.selectable_value(
                                        &mut overlay.position,
                                        *position,
                                        position.label(),
                                    );
                                }
                            });
                        ui.end_row();
                    });
            });
        });
}

fn option_combo(ui: &mut egui::Ui, id: &str, options: &[&str], selected: &mut String) {
    egui::ComboBox::from_id_salt(id)
        .selected_text(selected.as_str())
        .show_ui(ui, |ui| {
            for option in options {
                ui.selectable_value(selected, option.to_string(), *option);
            }
        });
}

fn model_combo(
    ui: &mut egui::Ui,
    id: &str,
    catalog: &'static [(&'static str, &'static str)],
    selected: &mut String,
) {
    let selected_label = model_label(catalog, selected).to_string();
    egui::ComboBox::from_id_salt(id)
        .selected_text(selected_label)
        .width(300.0)
        .show_ui(ui, |ui| {
            for (model_id, label) in catalog {
                ui.selectable_value(selected, model_id.to_string(), *label);
            }
        });
}

fn write_download(path: &Path, bytes: &[u8]) -> Result<(), String> {
    fs::write(path, bytes).map_err(|err| format!("Could not save {}: {err}", path.display()))?;
    log::info!("Saved {} ({} bytes)", path.display(), bytes.len());
    Ok(())
}

fn downsample_color_image(source: &ColorImage, max_dim: usize) -> ColorImage {
    let source_width = source.size[0];
    let source_height = source.size[1];
    if source_width == 0 || source_height == 0 || max_dim == 0 {
        return source.clone();
    }

    let longest_edge = source_width.max(source_height);
    if longest_edge <= max_dim {
        return source.clone();
    }

    let scale = max_dim as f32 / longest_edge as f32;
    let target_width = ((source_width as f32 * scale).round() as usize).max(1);
    let target_height = ((source_height as f32 * scale).round() as usize).max(1);

    let mut pixels = Vec::with_capacity(target_width * target_height);
    for target_y in 0..target_height {
        let source_y = ((target_y * source_height) / target_height).min(source_height - 1);
        for target_x in 0..target_width {
            let source_x = ((target_x * source_width) / target_width).min(source_width - 1);
            pixels.push(source.pixels[source_y * source_width + source_x]);
        }
    }

    ColorImage {
        size: [target_width, target_height],
        pixels,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::mpsc::{channel, Receiver};
    use std::sync::Mutex;
    use std::thread;
    use std::time::Instant;

    use crate::error::{LabError, LabResult};
    use crate::history::ANALYSIS_LOG_CAPACITY;

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct Call {
        action: &'static str,
        prompt: String,
        model: String,
    }

    #[derive(Default)]
    struct FakeService {
        calls: Mutex<Vec<Call>>,
        fail_with: Option<String>,
        gate: Option<Mutex<Receiver<()>>>,
    }

    impl FakeService {
        fn record(&self, action: &'static str, prompt: &str, model: &str) -> LabResult<usize> {
            if let Some(gate) = self.gate.as_ref() {
                let _ = gate.lock().expect("gate lock").recv();
            }
            let mut calls = self.calls.lock().expect("calls lock");
            calls.push(Call {
                action,
                prompt: prompt.to_string(),
                model: model.to_string(),
            });
            match self.fail_with.as_ref() {
                Some(message) => Err(LabError::service(message.clone())),
                None => Ok(calls.len()),
            }
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().expect("calls lock").clone()
        }
    }

    impl GenerativeImageService for FakeService {
        fn generate(&self, prompt: &str, model: &str) -> LabResult<Vec<u8>> {
            let count = self.record("generate", prompt, model)?;
            Ok(format!("generated-{count}").into_bytes())
        }

        fn edit(
            &self,
            _image_bytes: &[u8],
            _mime_type: &str,
            prompt: &str,
            model: &str,
        ) -> LabResult<Vec<u8>> {
            let count = self.record("edit", prompt, model)?;
            Ok(format!("edited-{count}").into_bytes())
        }

        fn analyze(
            &self,
            _image_bytes: &[u8],
            _mime_type: &str,
            prompt: &str,
            model: &str,
        ) -> LabResult<String> {
            let count = self.record("analyze", prompt, model)?;
            Ok(format!("analysis-{count}"))
        }
    }

    fn app_with(service: Arc<FakeService>) -> VisionLabApp {
        VisionLabApp::new(service, SettingsStore::new(None), None, None)
    }

    fn wait_for_tasks(app: &mut VisionLabApp) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while app.poll_tasks() {
            assert!(Instant::now() < deadline, "background task timed out");
            thread::sleep(Duration::from_millis(2));
        }
    }

    fn photo(name: &str) -> SourceImage {
        SourceImage::from_bytes(name, "image/jpeg", name.as_bytes().to_vec())
    }

    fn edited_bytes(app: &VisionLabApp) -> Option<Vec<u8>> {
        app.editor.edited.as_ref().map(|bytes| bytes.to_vec())
    }

    #[test]
    fn create_requires_a_prompt() {
        let service = Arc::new(FakeService::default());
        let mut app = app_with(Arc::clone(&service));
        app.creator.prompt = "   ".to_string();
        app.start_create();

        assert_eq!(app.creator.error.as_deref(), Some(CREATE_PROMPT_REQUIRED));
        assert!(!app.creator.task.is_busy());
        assert!(service.calls().is_empty());
    }

    #[test]
    fn create_uses_the_image_model() {
        let service = Arc::new(FakeService::default());
        let mut app = app_with(Arc::clone(&service));
        app.creator.prompt = " A lotus pond ".to_string();
        app.start_create();
        wait_for_tasks(&mut app);

        assert_eq!(
            app.creator.result.as_deref(),
            Some(b"generated-1".as_slice())
        );
        assert_eq!(
            service.calls(),
            vec![Call {
                action: "generate",
                prompt: "A lotus pond".to_string(),
                model: "gemini-2.5-flash-image".to_string(),
            }]
        );
    }

    #[test]
    fn service_errors_are_shown_verbatim_and_controls_recover() {
        let service = Arc::new(FakeService {
            fail_with: Some("Failed to generate image. quota exceeded".to_string()),
            ..FakeService::default()
        });
        let mut app = app_with(service);
        app.creator.prompt = "A lotus pond".to_string();
        app.start_create();
        wait_for_tasks(&mut app);

        assert_eq!(
            app.creator.error.as_deref(),
            Some("Failed to generate image. quota exceeded")
        );
        assert!(app.creator.result.is_none());
        assert!(!app.is_busy());
    }

    #[test]
    fn busy_action_refuses_a_second_submission() {
        let (release_tx, release_rx) = channel::<()>();
        let service = Arc::new(FakeService {
            gate: Some(Mutex::new(release_rx)),
            ..FakeService::default()
        });
        let mut app = app_with(Arc::clone(&service));
        app.creator.prompt = "A lotus pond".to_string();
        app.start_create();
        app.start_create();
        assert!(app.is_busy());

        release_tx.send(()).expect("worker should be waiting");
        wait_for_tasks(&mut app);
        assert_eq!(service.calls().len(), 1);
    }

    #[test]
    fn edit_session_keeps_original_out_of_history() {
        let service = Arc::new(FakeService::default());
        let mut app = app_with(Arc::clone(&service));
        app.set_image(Mode::Edit, photo("temple.jpg"));
        app.editor.prompt = "Apply sepia".to_string();

        app.start_edit();
        wait_for_tasks(&mut app);
        assert_eq!(edited_bytes(&app), Some(b"edited-1".to_vec()));
        assert!(!app.editor.history.can_undo());
        app.undo_edit();
        assert_eq!(edited_bytes(&app), Some(b"edited-1".to_vec()));

        app.start_edit();
        wait_for_tasks(&mut app);
        assert_eq!(edited_bytes(&app), Some(b"edited-2".to_vec()));
        app.undo_edit();
        assert_eq!(edited_bytes(&app), Some(b"edited-1".to_vec()));
        assert!(app.editor.history.can_redo());
        app.redo_edit();
        assert_eq!(edited_bytes(&app), Some(b"edited-2".to_vec()));
    }

    #[test]
    fn edit_after_undo_discards_the_redo_branch() {
        let service = Arc::new(FakeService::default());
        let mut app = app_with(service);
        app.set_image(Mode::Edit, photo("temple.jpg"));
        app.editor.prompt = "Apply sepia".to_string();
        for _ in 0..3 {
            app.start_edit();
            wait_for_tasks(&mut app);
        }
        app.undo_edit();
        app.undo_edit();

        app.start_edit();
        wait_for_tasks(&mut app);
        assert_eq!(app.editor.history.len(), 2);
        assert_eq!(app.editor.history.cursor(), Some(1));
        assert!(!app.editor.history.can_redo());
        assert_eq!(edited_bytes(&app), Some(b"edited-4".to_vec()));
    }

    #[test]
    fn new_upload_resets_edit_history() {
        let service = Arc::new(FakeService::default());
        let mut app = app_with(service);
        app.set_image(Mode::Edit, photo("temple.jpg"));
        app.editor.prompt = "Apply sepia".to_string();
        app.start_edit();
        wait_for_tasks(&mut app);
        assert_eq!(app.editor.history.len(), 1);

        app.set_image(Mode::Edit, photo("river.jpg"));
        assert!(app.editor.history.is_empty());
        assert!(app.editor.edited.is_none());
    }

    #[test]
    fn edit_validation_and_overlay_prompt() {
        let service = Arc::new(FakeService::default());
        let mut app = app_with(Arc::clone(&service));
        app.editor.prompt = "Apply sepia".to_string();
        app.start_edit();
        assert_eq!(app.editor.error.as_deref(), Some(EDIT_INPUT_REQUIRED));

        app.set_image(Mode::Edit, photo("temple.jpg"));
        app.editor.overlay.enabled = true;
        app.editor.overlay.text = "Namaste".to_string();
        app.start_edit();
        wait_for_tasks(&mut app);

        let calls = service.calls();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].prompt.starts_with("Apply sepia Also, add the text \"Namaste\""));
        assert!(app.editor.error.is_none());
    }

    #[test]
    fn analysis_is_recorded_and_view_does_not_mutate_log() {
        let service = Arc::new(FakeService::default());
        let mut app = app_with(Arc::clone(&service));
        app.analyze_current();
        assert_eq!(app.analyzer.error.as_deref(), Some(ANALYZE_IMAGE_REQUIRED));

        app.set_image(Mode::Analyze, photo("fort.jpg"));
        app.analyze_current();
        wait_for_tasks(&mut app);
        assert_eq!(app.analyzer.analysis.as_deref(), Some("analysis-1"));
        assert_eq!(app.analyzer.log.len(), 1);
        assert_eq!(service.calls()[0].prompt, DEFAULT_ANALYSIS_PROMPT);
        assert_eq!(service.calls()[0].model, "gemini-2.5-flash");

        let first_id = app.analyzer.log.entries()[0].id;
        app.set_image(Mode::Analyze, photo("lake.jpg"));
        app.analyzer.prompt = "Count the boats.".to_string();
        app.analyze_current();
        wait_for_tasks(&mut app);
        assert_eq!(app.analyzer.log.len(), 2);

        app.apply_analysis_log_action(AnalysisLogAction::View(first_id));
        assert_eq!(app.analyzer.log.len(), 2);
        assert_eq!(app.analyzer.analysis.as_deref(), Some("analysis-1"));
        assert_eq!(app.analyzer.prompt, DEFAULT_ANALYSIS_PROMPT);
        assert_eq!(
            app.analyzer.image.as_ref().map(|image| image.name.as_str()),
            Some("fort.jpg")
        );
    }

    #[test]
    fn rerun_records_a_new_entry() {
        let service = Arc::new(FakeService::default());
        let mut app = app_with(Arc::clone(&service));
        app.set_image(Mode::Analyze, photo("fort.jpg"));
        app.analyze_current();
        wait_for_tasks(&mut app);
        let first_id = app.analyzer.log.entries()[0].id;

        app.apply_analysis_log_action(AnalysisLogAction::Rerun(first_id));
        wait_for_tasks(&mut app);
        assert_eq!(app.analyzer.log.len(), 2);
        assert_ne!(app.analyzer.log.entries()[0].id, first_id);
        assert_eq!(app.analyzer.analysis.as_deref(), Some("analysis-2"));

        app.apply_analysis_log_action(AnalysisLogAction::Clear);
        assert!(app.analyzer.log.is_empty());
    }

    #[test]
    fn analysis_log_stays_bounded() {
        let service = Arc::new(FakeService::default());
        let mut app = app_with(service);
        app.set_image(Mode::Analyze, photo("fort.jpg"));
        for _ in 0..ANALYSIS_LOG_CAPACITY + 2 {
            app.analyze_current();
            wait_for_tasks(&mut app);
        }
        assert_eq!(app.analyzer.log.len(), ANALYSIS_LOG_CAPACITY);
    }

    #[test]
    fn failed_analysis_clears_result_and_keeps_log() {
        let service = Arc::new(FakeService {
            fail_with: Some("Failed to analyze image. Empty response from model".to_string()),
            ..FakeService::default()
        });
        let mut app = app_with(service);
        app.set_image(Mode::Analyze, photo("fort.jpg"));
        app.analyzer.analysis = Some("stale".to_string());
        app.analyze_current();
        wait_for_tasks(&mut app);

        assert!(app.analyzer.analysis.is_none());
        assert!(app.analyzer.log.is_empty());
        assert_eq!(
            app.analyzer.error.as_deref(),
            Some("Failed to analyze image. Empty response from model")
        );
    }

    #[test]
    fn time_travel_edits_portrait_with_scene_prompt() {
        let service = Arc::new(FakeService::default());
        let mut app = app_with(Arc::clone(&service));
        app.start_time_travel();
        assert_eq!(app.time_travel.error.as_deref(), Some(PORTRAIT_REQUIRED));

        app.set_image(Mode::TimeTravel, photo("me.jpg"));
        app.time_travel.scene = SCENES[8];
        app.start_time_travel();
        wait_for_tasks(&mut app);

        let calls = service.calls();
        assert_eq!(calls[0].action, "edit");
        assert_eq!(calls[0].model, "gemini-2.5-flash-image");
        assert!(calls[0].prompt.contains("Celebrating Diwali in ancient Ayodhya"));
        assert_eq!(
            app.time_travel.result.as_deref(),
            Some(b"edited-1".as_slice())
        );
    }

    #[test]
    fn launch_request_selects_mode_and_prompt() {
        let service = Arc::new(FakeService::default());
        let mut app = app_with(service);
        app.handle_launch_request(LaunchRequest {
            mode: Some(Mode::Analyze),
            image: None,
            prompt: Some("List the colors.".to_string()),
        });
        assert_eq!(app.mode, Mode::Analyze);
        assert_eq!(app.analyzer.prompt, "List the colors.");

        app.handle_launch_request(LaunchRequest {
            mode: None,
            image: Some(PathBuf::from("/definitely/missing/photo.png")),
            prompt: None,
        });
        assert_eq!(app.mode, Mode::Edit);
        assert!(app.editor.original.is_none());
        assert!(app.editor.error.is_some());
    }

    #[test]
    fn settings_apply_in_memory_even_without_a_store() {
        let service = Arc::new(FakeService::default());
        let mut app = app_with(Arc::clone(&service));
        app.apply_settings(Settings {
            text_model: "gemini-2.5-pro".to_string(),
            ..Settings::default()
        });
        assert_eq!(app.settings.text_model, "gemini-2.5-pro");
        assert!(app.status_line.starts_with("Settings error"));

        app.set_image(Mode::Analyze, photo("fort.jpg"));
        app.analyze_current();
        wait_for_tasks(&mut app);
        assert_eq!(service.calls()[0].model, "gemini-2.5-pro");
    }

    #[test]
    fn downsample_limits_longest_edge() {
        let source = ColorImage::new([200, 100], egui::Color32::WHITE);
        let thumb = downsample_color_image(&source, HISTORY_THUMB_MAX_DIM);
        assert_eq!(thumb.size, [96, 48]);
        assert_eq!(thumb.pixels.len(), 96 * 48);

        let small = ColorImage::new([20, 10], egui::Color32::WHITE);
        assert_eq!(downsample_color_image(&small, HISTORY_THUMB_MAX_DIM).size, [20, 10]);
    }
}
