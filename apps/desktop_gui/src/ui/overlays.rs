//! Overlay content shown by the workspace: task composer, delete
//! confirmation, and the pre-fetched task detail card.
//!
//! These are plain render closures; per-view transient state (the composer
//! draft) lives in egui temp memory so the closures stay `Fn`.

use crossbeam_channel::Sender;
use eframe::egui;
use overlay::{OverlayHandle, OverlayView};
use serde_json::Value;
use shared::protocol::TaskRecord;

use crate::backend_bridge::commands::BackendCommand;
use crate::controller::orchestration::try_dispatch;

pub fn composer_view(cmd_tx: Sender<BackendCommand>) -> OverlayView {
    OverlayView::new("task-composer", move |ui| {
        let draft_id = egui::Id::new("overlay.composer.draft");
        let mut draft = ui
            .data_mut(|d| d.get_temp::<String>(draft_id))
            .unwrap_or_default();

        ui.heading("New task");
        ui.add_space(6.0);
        let edit = ui.add(
            egui::TextEdit::singleline(&mut draft)
                .hint_text("What needs doing?")
                .desired_width(280.0),
        );
        let submit_via_enter = edit.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));

        ui.add_space(8.0);
        let mut finished = false;
        ui.horizontal(|ui| {
            let can_create = !draft.trim().is_empty();
            let clicked = ui
                .add_enabled(can_create, egui::Button::new("Create"))
                .clicked();
            if clicked || (submit_via_enter && can_create) {
                try_dispatch(
                    &cmd_tx,
                    BackendCommand::CreateTask {
                        content: draft.trim().to_string(),
                    },
                );
                finished = true;
            }
            if ui.button("Cancel").clicked() {
                finished = true;
            }
        });

        if finished {
            ui.data_mut(|d| d.remove::<String>(draft_id));
            OverlayHandle::of(ui.ctx()).close();
        } else {
            ui.data_mut(|d| d.insert_temp(draft_id, draft));
        }
    })
}

pub fn confirm_delete_view(cmd_tx: Sender<BackendCommand>, task: TaskRecord) -> OverlayView {
    OverlayView::new("confirm-delete", move |ui| {
        ui.heading("Delete task");
        ui.add_space(6.0);
        ui.label(format!(
            "Delete \"{}\"? This cannot be undone.",
            task.content
        ));
        ui.add_space(8.0);
        ui.horizontal(|ui| {
            if ui.button("Delete").clicked() {
                try_dispatch(
                    &cmd_tx,
                    BackendCommand::DeleteTask {
                        task_id: task.task_id,
                    },
                );
                OverlayHandle::of(ui.ctx()).close();
            }
            if ui.button("Keep it").clicked() {
                OverlayHandle::of(ui.ctx()).close();
            }
        });
    })
}

/// Reads whatever the pre-open fetch merged into the overlay payload; the
/// shape is service-defined and rendered best-effort.
pub fn task_detail_view() -> OverlayView {
    OverlayView::new("task-detail", |ui| {
        let overlay = OverlayHandle::of(ui.ctx());
        let data = overlay.data();

        ui.heading("Task details");
        ui.add_space(6.0);
        match data.get("task") {
            Some(Value::Object(task)) => {
                if let Some(Value::String(content)) = task.get("content") {
                    ui.label(egui::RichText::new(content.as_str()).strong());
                }
                if let Some(Value::String(created_at)) = task.get("created_at") {
                    ui.small(format!("Created {created_at}"));
                }
            }
            _ => {
                ui.label("No detail available.");
            }
        }
        if let Some(Value::Array(activity)) = data.get("activity") {
            ui.add_space(6.0);
            ui.label("Recent activity");
            for entry in activity {
                if let Value::String(line) = entry {
                    ui.small(format!("- {line}"));
                }
            }
        }
        ui.add_space(8.0);
        if ui.button("Close").clicked() {
            overlay.close();
        }
    })
}
