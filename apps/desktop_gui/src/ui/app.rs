//! App shell: sign-in gate, workspace view, and overlay wiring.

use std::time::Duration;

use chrono::{DateTime, Utc};
use crossbeam_channel::{Receiver, Sender};
use eframe::egui;
use overlay::OverlayCoordinator;
use serde_json::Value;
use shared::domain::TaskId;
use shared::protocol::{TaskRecord, UserDescriptor};

use crate::backend_bridge::commands::BackendCommand;
use crate::controller::events::{
    classify_sign_in_failure, UiErrorCategory, UiErrorContext, UiEvent,
};
use crate::controller::orchestration::dispatch_backend_command;
use crate::ui::overlays;
use crate::ui::theme::{self, PersistedDesktopSettings, ThemePreset, ThemeSettings};

const SETTINGS_STORAGE_KEY: &str = "tasklane.desktop.settings";

#[derive(Debug, Clone)]
pub struct StartupConfig {
    pub server_url: String,
    pub username: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AppViewState {
    SignIn,
    Workspace,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StatusBannerSeverity {
    Error,
}

#[derive(Debug, Clone)]
struct StatusBanner {
    severity: StatusBannerSeverity,
    message: String,
}

fn err_label(category: UiErrorCategory) -> &'static str {
    match category {
        UiErrorCategory::Auth => "Authentication",
        UiErrorCategory::Transport => "Transport",
        UiErrorCategory::Validation => "Validation",
        UiErrorCategory::Unknown => "Unexpected",
    }
}

fn server_environment_label(server_url: &str) -> &'static str {
    let server = server_url.to_ascii_lowercase();
    if server.contains("127.0.0.1") || server.contains("localhost") {
        "Local"
    } else if server.contains("staging") {
        "Staging"
    } else if server.contains("dev") {
        "Development"
    } else {
        "Production"
    }
}

fn format_task_age(created_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let age = now.signed_duration_since(created_at);
    if age.num_seconds() < 60 {
        "just now".to_string()
    } else if age.num_minutes() < 60 {
        format!("{}m ago", age.num_minutes())
    } else if age.num_hours() < 24 {
        format!("{}h ago", age.num_hours())
    } else {
        format!("{}d ago", age.num_days())
    }
}

// Taller inputs with a stable id keep focus reliable across frames.
fn labeled_text_field(
    ui: &mut egui::Ui,
    id: &'static str,
    label: &str,
    hint: &str,
    value: &mut String,
    request_focus: bool,
) -> egui::Response {
    ui.label(egui::RichText::new(label).strong());
    let edit = egui::TextEdit::singleline(value)
        .id_salt(id)
        .hint_text(hint)
        .desired_width(f32::INFINITY);
    let response = ui.add_sized([ui.available_width(), 34.0], edit);
    if request_focus {
        response.request_focus();
    }
    response
}

async fn fetch_task_detail(
    http: reqwest::Client,
    server_url: String,
    task_id: TaskId,
) -> overlay::FetchResult {
    let body: Value = http
        .get(format!("{server_url}/tasks/{}", task_id.0))
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;
    match body {
        Value::Object(map) => Ok(map),
        other => Err(anyhow::anyhow!("unexpected task detail payload: {other}")),
    }
}

pub struct DesktopGuiApp {
    cmd_tx: Sender<BackendCommand>,
    ui_rx: Receiver<UiEvent>,
    overlay: OverlayCoordinator,
    http: reqwest::Client,

    view_state: AppViewState,
    session: Option<UserDescriptor>,
    server_url: String,
    username_draft: String,
    sign_in_pending: bool,
    focus_username: bool,

    tasks: Vec<TaskRecord>,
    tasks_synced: bool,

    status: String,
    status_banner: Option<StatusBanner>,

    theme: ThemeSettings,
    applied_theme: Option<ThemeSettings>,
    settings_open: bool,

    // Simple frame tick (used for debugging and UI heuristics).
    tick: u64,
}

impl DesktopGuiApp {
    pub fn new(
        cc: &eframe::CreationContext<'_>,
        cmd_tx: Sender<BackendCommand>,
        ui_rx: Receiver<UiEvent>,
        runtime: tokio::runtime::Handle,
        startup: StartupConfig,
    ) -> Self {
        let persisted = cc.storage.and_then(|storage| {
            storage
                .get_string(SETTINGS_STORAGE_KEY)
                .and_then(|text| serde_json::from_str::<PersistedDesktopSettings>(&text).ok())
        });
        let theme = persisted.unwrap_or_default().into_runtime();
        let overlay = OverlayCoordinator::new(&cc.egui_ctx, runtime);

        Self {
            cmd_tx,
            ui_rx,
            overlay,
            http: reqwest::Client::new(),
            view_state: AppViewState::SignIn,
            session: None,
            server_url: startup.server_url,
            username_draft: startup.username,
            sign_in_pending: false,
            focus_username: true,
            tasks: Vec::new(),
            tasks_synced: false,
            status: "Not signed in".to_string(),
            status_banner: None,
            theme,
            applied_theme: None,
            settings_open: false,
            tick: 0,
        }
    }

    fn process_ui_events(&mut self, ctx: &egui::Context) {
        while let Ok(event) = self.ui_rx.try_recv() {
            match event {
                UiEvent::SignedIn(user) => {
                    self.session = Some(user);
                    self.view_state = AppViewState::Workspace;
                    self.sign_in_pending = false;
                    self.status = "Signed in - syncing tasks".to_string();
                    self.status_banner = None;
                    self.tasks.clear();
                    self.tasks_synced = false;
                    dispatch_backend_command(
                        &self.cmd_tx,
                        BackendCommand::RefreshTasks,
                        &mut self.status,
                    );
                }
                UiEvent::SignedOut => {
                    self.session = None;
                    self.view_state = AppViewState::SignIn;
                    self.sign_in_pending = false;
                    self.tasks.clear();
                    self.tasks_synced = false;
                    self.status = "Signed out".to_string();
                    self.focus_username = true;
                    // A hidden overlay must not carry one session's payload
                    // into the next.
                    self.overlay.handle(ctx).close();
                }
                UiEvent::Info(message) => {
                    self.status = message;
                }
                UiEvent::TasksSnapshot { items } => {
                    self.tasks = items;
                    self.tasks_synced = true;
                }
                UiEvent::Error(err) => {
                    self.sign_in_pending = false;
                    if err.requires_reauth() {
                        self.session = None;
                        self.view_state = AppViewState::SignIn;
                        self.status = format!("Authentication error: {}", err.message());
                        self.status_banner = Some(StatusBanner {
                            severity: StatusBannerSeverity::Error,
                            message:
                                "Session expired or invalid credentials. Please sign in again."
                                    .to_string(),
                        });
                        self.focus_username = true;
                    } else {
                        self.status = if err.context() == UiErrorContext::SignIn {
                            classify_sign_in_failure(err.message())
                        } else {
                            format!("{} error: {}", err_label(err.category()), err.message())
                        };
                        if matches!(
                            err.context(),
                            UiErrorContext::SignIn
                                | UiErrorContext::CreateTask
                                | UiErrorContext::DeleteTask
                        ) {
                            self.status_banner = Some(StatusBanner {
                                severity: StatusBannerSeverity::Error,
                                message: self.status.clone(),
                            });
                        }
                    }
                }
            }
        }
    }

    fn apply_theme_if_needed(&mut self, ctx: &egui::Context) {
        if self.applied_theme == Some(self.theme) {
            return;
        }
        let mut style = (*ctx.style()).clone();
        style.visuals = theme::visuals_for_theme(self.theme);
        style.spacing.item_spacing = egui::vec2(8.0, 6.0);
        style.spacing.button_padding = egui::vec2(10.0, 6.0);
        ctx.set_style(style);
        self.applied_theme = Some(self.theme);
    }

    fn show_status_banner(&mut self, ui: &mut egui::Ui) {
        if let Some(banner) = self.status_banner.clone() {
            let (fill, stroke) = match banner.severity {
                StatusBannerSeverity::Error => (
                    egui::Color32::from_rgb(111, 53, 53),
                    egui::Stroke::new(1.0, egui::Color32::from_rgb(175, 96, 96)),
                ),
            };

            egui::Frame::new()
                .fill(fill)
                .stroke(stroke)
                .corner_radius(8)
                .inner_margin(egui::Margin::symmetric(10, 8))
                .show(ui, |ui| {
                    ui.horizontal_wrapped(|ui| {
                        ui.label(egui::RichText::new(&banner.message).color(egui::Color32::WHITE));
                        ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                            if ui.button("Dismiss").clicked() {
                                self.status_banner = None;
                            }
                        });
                    });
                });
            ui.add_space(6.0);
        }
    }

    fn show_sign_in_screen(&mut self, ctx: &egui::Context) {
        egui::CentralPanel::default().show(ctx, |ui| {
            let avail = ui.available_size();
            let column_width = 360.0_f32.min(avail.x - 32.0);
            ui.add_space((avail.y * 0.22).max(24.0));
            ui.vertical_centered(|ui| {
                ui.set_max_width(column_width);
                ui.heading("Tasklane");
                ui.small("Sign in to your task workspace");
                ui.add_space(12.0);

                self.show_status_banner(ui);

                labeled_text_field(
                    ui,
                    "sign_in_server",
                    "Server",
                    "http://127.0.0.1:8443",
                    &mut self.server_url,
                    false,
                );
                ui.add_space(6.0);
                let take_focus = std::mem::take(&mut self.focus_username);
                let username_response = labeled_text_field(
                    ui,
                    "sign_in_username",
                    "Username",
                    "your username",
                    &mut self.username_draft,
                    take_focus,
                );
                let submit_via_enter = username_response.lost_focus()
                    && ui.input(|i| i.key_pressed(egui::Key::Enter));

                ui.add_space(12.0);
                let can_submit = !self.sign_in_pending
                    && !self.username_draft.trim().is_empty()
                    && !self.server_url.trim().is_empty();
                let clicked = ui
                    .add_enabled(
                        can_submit,
                        egui::Button::new("Sign in").min_size(egui::vec2(column_width, 34.0)),
                    )
                    .clicked();
                if clicked || (submit_via_enter && can_submit) {
                    self.sign_in_pending = true;
                    self.status = format!("Signing in to {}...", self.server_url.trim());
                    dispatch_backend_command(
                        &self.cmd_tx,
                        BackendCommand::SignIn {
                            server_url: self.server_url.trim().to_string(),
                            username: self.username_draft.trim().to_string(),
                        },
                        &mut self.status,
                    );
                }
                if self.sign_in_pending {
                    ui.add_space(8.0);
                    ui.add(egui::Spinner::new());
                }
                ui.add_space(12.0);
                ui.small(self.status.as_str());
            });
        });
    }

    fn show_workspace(&mut self, ctx: &egui::Context) {
        let Some(user) = self.session.clone() else {
            self.view_state = AppViewState::SignIn;
            return;
        };

        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.heading("Tasklane");
                ui.label(
                    egui::RichText::new(server_environment_label(&self.server_url))
                        .small()
                        .weak(),
                );
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if ui.button("Sign out").clicked() {
                        dispatch_backend_command(
                            &self.cmd_tx,
                            BackendCommand::SignOut,
                            &mut self.status,
                        );
                    }
                    if ui.button("Settings").clicked() {
                        self.settings_open = true;
                    }
                    ui.label(egui::RichText::new(user.username.as_str()).strong());
                });
            });
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            self.show_status_banner(ui);
            ui.horizontal(|ui| {
                ui.heading("My tasks");
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if ui.button("New task").clicked() {
                        self.overlay
                            .handle(ui.ctx())
                            .open(overlays::composer_view(self.cmd_tx.clone()));
                    }
                });
            });
            ui.add_space(6.0);

            if !self.tasks_synced {
                ui.horizontal(|ui| {
                    ui.add(egui::Spinner::new());
                    ui.label("Syncing tasks...");
                });
                return;
            }
            if self.tasks.is_empty() {
                ui.weak("Nothing here yet. Create your first task.");
                return;
            }

            let now = Utc::now();
            let tasks = self.tasks.clone();
            egui::ScrollArea::vertical()
                .auto_shrink(false)
                .show(ui, |ui| {
                    for task in &tasks {
                        self.show_task_row(ui, task, now);
                    }
                });
        });

        self.show_settings_window(ctx);
    }

    fn show_task_row(&mut self, ui: &mut egui::Ui, task: &TaskRecord, now: DateTime<Utc>) {
        egui::Frame::new()
            .fill(ui.visuals().faint_bg_color)
            .corner_radius(6)
            .inner_margin(egui::Margin::symmetric(10, 8))
            .show(ui, |ui| {
                ui.horizontal(|ui| {
                    ui.vertical(|ui| {
                        ui.label(egui::RichText::new(task.content.as_str()).strong());
                        ui.small(format_task_age(task.created_at, now));
                    });
                    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                        if ui.button("Delete").clicked() {
                            self.overlay.handle(ui.ctx()).open(
                                overlays::confirm_delete_view(self.cmd_tx.clone(), task.clone()),
                            );
                        }
                        if ui.button("Details").clicked() {
                            self.overlay.handle(ui.ctx()).open_with_fetch(
                                overlays::task_detail_view(),
                                fetch_task_detail(
                                    self.http.clone(),
                                    self.server_url.trim().to_string(),
                                    task.task_id,
                                ),
                            );
                        }
                    });
                });
            });
        ui.add_space(4.0);
    }

    fn show_settings_window(&mut self, ctx: &egui::Context) {
        if !self.settings_open {
            return;
        }

        egui::Window::new("Settings")
            .open(&mut self.settings_open)
            .resizable(false)
            .show(ctx, |ui| {
                ui.label("Theme preset");
                egui::ComboBox::from_id_salt("theme_preset")
                    .selected_text(self.theme.preset.label())
                    .show_ui(ui, |ui| {
                        ui.selectable_value(
                            &mut self.theme.preset,
                            ThemePreset::SlateDark,
                            ThemePreset::SlateDark.label(),
                        );
                        ui.selectable_value(
                            &mut self.theme.preset,
                            ThemePreset::Paper,
                            ThemePreset::Paper.label(),
                        );
                    });

                ui.separator();
                ui.label("Accent color");
                ui.color_edit_button_srgba(&mut self.theme.accent);
                ui.small("Used for selection and primary emphasis.");

                if ui.button("Reset to defaults").clicked() {
                    self.theme = ThemeSettings::slate_default();
                }
            });
    }
}

impl eframe::App for DesktopGuiApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.tick = self.tick.wrapping_add(1);

        self.process_ui_events(ctx);
        self.apply_theme_if_needed(ctx);

        let overlay = self.overlay.clone();
        overlay.show(ctx, |ctx| match self.view_state {
            AppViewState::SignIn => self.show_sign_in_screen(ctx),
            AppViewState::Workspace => self.show_workspace(ctx),
        });

        ctx.request_repaint_after(Duration::from_millis(200));
    }

    fn save(&mut self, storage: &mut dyn eframe::Storage) {
        let settings = PersistedDesktopSettings::from_runtime(self.theme);
        if let Ok(serialized) = serde_json::to_string(&settings) {
            storage.set_string(SETTINGS_STORAGE_KEY, serialized);
        }
    }
}
