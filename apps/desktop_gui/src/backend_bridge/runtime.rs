//! Backend worker: a dedicated thread driving the task client on its own
//! tokio runtime, fed by the UI command queue.

use std::thread;

use client_core::{ClientEvent, ClientHandle, RealtimeTaskClient};
use crossbeam_channel::{Receiver, Sender};
use tokio::task::JoinHandle;

use crate::backend_bridge::commands::BackendCommand;
use crate::controller::events::{UiError, UiErrorContext, UiEvent};

pub fn spawn_backend_worker(
    runtime: tokio::runtime::Runtime,
    cmd_rx: Receiver<BackendCommand>,
    ui_tx: Sender<UiEvent>,
) {
    thread::spawn(move || {
        runtime.block_on(async move {
            let client = RealtimeTaskClient::new();
            let _ = ui_tx.try_send(UiEvent::Info("Backend worker ready".to_string()));

            let mut event_task: Option<JoinHandle<()>> = None;
            while let Ok(cmd) = cmd_rx.recv() {
                match cmd {
                    BackendCommand::SignIn {
                        server_url,
                        username,
                    } => {
                        if let Some(task) = event_task.take() {
                            task.abort();
                        }
                        // Subscribe before signing in so the first snapshot
                        // cannot slip past the forwarder.
                        let mut events = client.subscribe_events();
                        let ui_tx_clone = ui_tx.clone();
                        event_task = Some(tokio::spawn(async move {
                            while let Ok(event) = events.recv().await {
                                let evt = match event {
                                    ClientEvent::TasksSnapshot { items } => {
                                        UiEvent::TasksSnapshot { items }
                                    }
                                    ClientEvent::Error(err) => UiEvent::Error(
                                        UiError::from_message(UiErrorContext::TaskSync, err),
                                    ),
                                };
                                let _ = ui_tx_clone.try_send(evt);
                            }
                        }));

                        match client.sign_in(&server_url, &username).await {
                            Ok(user) => {
                                let _ = ui_tx.try_send(UiEvent::SignedIn(user));
                            }
                            Err(err) => {
                                let _ = ui_tx.try_send(UiEvent::Error(UiError::from_message(
                                    UiErrorContext::SignIn,
                                    err.to_string(),
                                )));
                            }
                        }
                    }
                    BackendCommand::SignOut => {
                        if let Some(task) = event_task.take() {
                            task.abort();
                        }
                        match client.sign_out().await {
                            Ok(()) => {
                                let _ = ui_tx.try_send(UiEvent::SignedOut);
                            }
                            Err(err) => {
                                let _ = ui_tx.try_send(UiEvent::Error(UiError::from_message(
                                    UiErrorContext::General,
                                    err.to_string(),
                                )));
                            }
                        }
                    }
                    BackendCommand::RefreshTasks => {
                        if let Err(err) = client.observe_tasks().await {
                            let _ = ui_tx.try_send(UiEvent::Error(UiError::from_message(
                                UiErrorContext::TaskSync,
                                err.to_string(),
                            )));
                        }
                    }
                    BackendCommand::CreateTask { content } => {
                        if let Err(err) = client.create_task(&content).await {
                            let _ = ui_tx.try_send(UiEvent::Error(UiError::from_message(
                                UiErrorContext::CreateTask,
                                err.to_string(),
                            )));
                        }
                    }
                    BackendCommand::DeleteTask { task_id } => {
                        if let Err(err) = client.delete_task(task_id).await {
                            let _ = ui_tx.try_send(UiEvent::Error(UiError::from_message(
                                UiErrorContext::DeleteTask,
                                err.to_string(),
                            )));
                        }
                    }
                }
            }
        });
    });
}
