//! Client runtime for the Tasklane managed task service.
//!
//! Mutations and queries go over HTTP; a websocket subscription keeps a local
//! result set live and broadcasts a full snapshot after every change, so
//! consumers never reconcile deltas themselves.

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use shared::{
    domain::{TaskId, UserId},
    protocol::{
        CreateTaskRequest, LoginRequest, LoginResponse, ServerEvent, TaskRecord, UserDescriptor,
    },
};
use tokio::{
    sync::{broadcast, Mutex},
    task::JoinHandle,
};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::info;

#[derive(Debug, Clone)]
pub enum ClientEvent {
    /// The complete live result set, emitted after any change.
    TasksSnapshot { items: Vec<TaskRecord> },
    Error(String),
}

#[async_trait]
pub trait ClientHandle: Send + Sync {
    async fn sign_in(&self, server_url: &str, username: &str) -> Result<UserDescriptor>;
    async fn sign_out(&self) -> Result<()>;
    /// Fetch the current result set and start emitting snapshots for it.
    async fn observe_tasks(&self) -> Result<()>;
    async fn create_task(&self, content: &str) -> Result<TaskRecord>;
    async fn delete_task(&self, task_id: TaskId) -> Result<()>;
    fn subscribe_events(&self) -> broadcast::Receiver<ClientEvent>;
}

pub struct RealtimeTaskClient {
    http: Client,
    inner: Mutex<SessionState>,
    events: broadcast::Sender<ClientEvent>,
}

struct SessionState {
    server_url: Option<String>,
    user: Option<UserDescriptor>,
    tasks: Vec<TaskRecord>,
    ws_task: Option<JoinHandle<()>>,
}

/// Result sets are held oldest-first; ids break timestamp ties so the order
/// is stable across clients.
fn sort_result_set(items: &mut [TaskRecord]) {
    items.sort_by(|a, b| {
        a.created_at
            .cmp(&b.created_at)
            .then_with(|| a.task_id.cmp(&b.task_id))
    });
}

/// Folds one push event into the result set. Returns whether anything
/// changed; duplicate creates and deletes of unknown rows do not.
fn apply_server_event(items: &mut Vec<TaskRecord>, event: &ServerEvent) -> bool {
    match event {
        ServerEvent::TaskCreated { task } => {
            if items.iter().any(|existing| existing.task_id == task.task_id) {
                return false;
            }
            items.push(task.clone());
            sort_result_set(items);
            true
        }
        ServerEvent::TaskDeleted { task_id } => {
            let before = items.len();
            items.retain(|task| task.task_id != *task_id);
            items.len() != before
        }
        ServerEvent::Error(_) => false,
    }
}

impl RealtimeTaskClient {
    pub fn new() -> Arc<Self> {
        let (events, _) = broadcast::channel(1024);
        Arc::new(Self {
            http: Client::new(),
            inner: Mutex::new(SessionState {
                server_url: None,
                user: None,
                tasks: Vec::new(),
                ws_task: None,
            }),
            events,
        })
    }

    async fn session(&self) -> Result<(String, UserDescriptor)> {
        let guard = self.inner.lock().await;
        let server_url = guard
            .server_url
            .clone()
            .ok_or_else(|| anyhow!("not signed in: missing server_url"))?;
        let user = guard
            .user
            .clone()
            .ok_or_else(|| anyhow!("not signed in: missing user"))?;
        Ok((server_url, user))
    }

    async fn spawn_ws_events(
        self: &Arc<Self>,
        server_url: &str,
        user_id: UserId,
    ) -> Result<JoinHandle<()>> {
        let ws_url = if server_url.starts_with("https://") {
            server_url.replacen("https://", "wss://", 1)
        } else if server_url.starts_with("http://") {
            server_url.replacen("http://", "ws://", 1)
        } else {
            return Err(anyhow!("server_url must start with http:// or https://"));
        };
        let ws_url = format!("{ws_url}/ws?user_id={}", user_id.0);
        let (ws_stream, _) = connect_async(&ws_url)
            .await
            .with_context(|| format!("failed to connect websocket: {ws_url}"))?;
        let (_, mut ws_reader) = ws_stream.split();

        let client = Arc::clone(self);
        Ok(tokio::spawn(async move {
            while let Some(msg) = ws_reader.next().await {
                match msg {
                    Ok(Message::Text(text)) => match serde_json::from_str::<ServerEvent>(&text) {
                        Ok(ServerEvent::Error(err)) => {
                            let _ = client
                                .events
                                .send(ClientEvent::Error(format!("server error: {err}")));
                        }
                        Ok(event) => client.fold_event(&event).await,
                        Err(err) => {
                            let _ = client
                                .events
                                .send(ClientEvent::Error(format!("invalid server event: {err}")));
                        }
                    },
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(err) => {
                        let _ = client.events.send(ClientEvent::Error(format!(
                            "websocket receive failed: {err}"
                        )));
                        break;
                    }
                }
            }
            info!("live task subscription ended");
        }))
    }

    async fn fold_event(&self, event: &ServerEvent) {
        let snapshot = {
            let mut guard = self.inner.lock().await;
            if apply_server_event(&mut guard.tasks, event) {
                Some(guard.tasks.clone())
            } else {
                None
            }
        };
        if let Some(items) = snapshot {
            let _ = self.events.send(ClientEvent::TasksSnapshot { items });
        }
    }
}

#[async_trait]
impl ClientHandle for Arc<RealtimeTaskClient> {
    async fn sign_in(&self, server_url: &str, username: &str) -> Result<UserDescriptor> {
        let response = self
            .http
            .post(format!("{server_url}/login"))
            .json(&LoginRequest {
                username: username.to_string(),
            })
            .send()
            .await?
            .error_for_status()?;
        let body: LoginResponse = response.json().await?;

        {
            let mut guard = self.inner.lock().await;
            if let Some(task) = guard.ws_task.take() {
                task.abort();
            }
            guard.server_url = Some(server_url.to_string());
            guard.user = Some(body.user.clone());
            guard.tasks.clear();
        }

        match self.spawn_ws_events(server_url, body.user.user_id).await {
            Ok(task) => {
                self.inner.lock().await.ws_task = Some(task);
            }
            Err(err) => {
                // A session without its subscription would look signed-in but
                // never see changes; roll back instead.
                let mut guard = self.inner.lock().await;
                guard.server_url = None;
                guard.user = None;
                guard.tasks.clear();
                return Err(err);
            }
        }

        info!(user_id = body.user.user_id.0, "signed in");
        Ok(body.user)
    }

    async fn sign_out(&self) -> Result<()> {
        let mut guard = self.inner.lock().await;
        if let Some(task) = guard.ws_task.take() {
            task.abort();
        }
        guard.server_url = None;
        guard.user = None;
        guard.tasks.clear();
        info!("signed out");
        Ok(())
    }

    async fn observe_tasks(&self) -> Result<()> {
        let (server_url, user) = self.session().await?;
        let mut items: Vec<TaskRecord> = self
            .http
            .get(format!("{server_url}/tasks"))
            .query(&[("owner_id", user.user_id.0)])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        sort_result_set(&mut items);

        {
            let mut guard = self.inner.lock().await;
            guard.tasks = items.clone();
        }
        let _ = self.events.send(ClientEvent::TasksSnapshot { items });
        Ok(())
    }

    async fn create_task(&self, content: &str) -> Result<TaskRecord> {
        let content = content.trim();
        if content.is_empty() {
            return Err(anyhow!("task content must not be empty"));
        }
        let (server_url, user) = self.session().await?;
        let task: TaskRecord = self
            .http
            .post(format!("{server_url}/tasks"))
            .json(&CreateTaskRequest {
                owner_id: user.user_id,
                content: content.to_string(),
            })
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        // The result set is updated by the subscription, not by this reply.
        Ok(task)
    }

    async fn delete_task(&self, task_id: TaskId) -> Result<()> {
        let (server_url, user) = self.session().await?;
        self.http
            .delete(format!("{server_url}/tasks/{}", task_id.0))
            .query(&[("owner_id", user.user_id.0)])
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    fn subscribe_events(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
