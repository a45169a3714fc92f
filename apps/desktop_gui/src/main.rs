mod backend_bridge;
mod controller;
mod ui;

use anyhow::Context;
use clap::Parser;
use crossbeam_channel::bounded;
use eframe::egui;

use crate::backend_bridge::commands::BackendCommand;
use crate::backend_bridge::runtime::spawn_backend_worker;
use crate::controller::events::UiEvent;
use crate::ui::app::{DesktopGuiApp, StartupConfig};

/// Desktop client for the Tasklane managed task service.
#[derive(Parser)]
#[command(name = "tasklane", version)]
struct Cli {
    /// Base URL of the task service.
    #[arg(long, default_value = "http://127.0.0.1:8443")]
    server_url: String,
    /// Username to pre-fill on the sign-in screen.
    #[arg(long, default_value = "")]
    username: String,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();
    let cli = Cli::parse();

    // Built here so the overlay coordinator can borrow a handle for fetch
    // spawning before the runtime moves into the worker thread.
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build backend runtime")?;
    let runtime_handle = runtime.handle().clone();

    let (cmd_tx, cmd_rx) = bounded::<BackendCommand>(256);
    let (ui_tx, ui_rx) = bounded::<UiEvent>(2048);
    spawn_backend_worker(runtime, cmd_rx, ui_tx);

    let startup = StartupConfig {
        server_url: cli.server_url,
        username: cli.username,
    };
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("Tasklane")
            .with_inner_size([1080.0, 720.0])
            .with_min_inner_size([760.0, 520.0]),
        ..Default::default()
    };
    eframe::run_native(
        "Tasklane",
        options,
        Box::new(move |cc| {
            Ok(Box::new(DesktopGuiApp::new(
                cc,
                cmd_tx,
                ui_rx,
                runtime_handle,
                startup,
            )))
        }),
    )
    .map_err(|err| anyhow::anyhow!("desktop shell exited with error: {err}"))
}
