use std::collections::HashMap;
use std::time::Duration;

use axum::{
    extract::{
        ws::{Message as WsMessage, WebSocketUpgrade},
        Path, Query, State,
    },
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use chrono::{TimeZone, Utc};
use tokio::{net::TcpListener, sync::oneshot};
use uuid::Uuid;

use super::*;

fn record(content: &str, minute: u32) -> TaskRecord {
    TaskRecord {
        task_id: TaskId(Uuid::new_v4()),
        owner_id: UserId(7),
        content: content.to_string(),
        created_at: Utc
            .with_ymd_and_hms(2024, 5, 1, 12, minute, 0)
            .single()
            .expect("valid timestamp"),
    }
}

async fn spawn_server(app: Router) -> Result<String> {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok(format!("http://{addr}"))
}

async fn inject_session(client: &Arc<RealtimeTaskClient>, server_url: &str) {
    let mut inner = client.inner.lock().await;
    inner.server_url = Some(server_url.to_string());
    inner.user = Some(UserDescriptor {
        user_id: UserId(7),
        username: "alice".to_string(),
    });
}

async fn handle_login(Json(payload): Json<LoginRequest>) -> Json<LoginResponse> {
    Json(LoginResponse {
        user: UserDescriptor {
            user_id: UserId(7),
            username: payload.username,
        },
    })
}

async fn handle_idle_ws(ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(|mut socket| async move { while socket.recv().await.is_some() {} })
}

#[test]
fn created_rows_are_inserted_in_timestamp_order() {
    let mut items = Vec::new();
    let newer = record("newer", 30);
    let older = record("older", 10);

    assert!(apply_server_event(
        &mut items,
        &ServerEvent::TaskCreated { task: newer.clone() }
    ));
    assert!(apply_server_event(
        &mut items,
        &ServerEvent::TaskCreated { task: older.clone() }
    ));

    assert_eq!(items, vec![older, newer]);
}

#[test]
fn duplicate_created_deliveries_are_ignored() {
    let mut items = Vec::new();
    let task = record("once", 10);

    assert!(apply_server_event(
        &mut items,
        &ServerEvent::TaskCreated { task: task.clone() }
    ));
    assert!(!apply_server_event(
        &mut items,
        &ServerEvent::TaskCreated { task: task.clone() }
    ));
    assert_eq!(items, vec![task]);
}

#[test]
fn deleting_an_unknown_row_changes_nothing() {
    let mut items = vec![record("kept", 10)];

    assert!(!apply_server_event(
        &mut items,
        &ServerEvent::TaskDeleted {
            task_id: TaskId(Uuid::new_v4()),
        }
    ));
    assert_eq!(items.len(), 1);
}

#[test]
fn deleted_rows_leave_the_result_set() {
    let kept = record("kept", 10);
    let removed = record("removed", 20);
    let mut items = vec![kept.clone(), removed.clone()];

    assert!(apply_server_event(
        &mut items,
        &ServerEvent::TaskDeleted {
            task_id: removed.task_id,
        }
    ));
    assert_eq!(items, vec![kept]);
}

#[derive(Clone)]
struct CreateCapture {
    tx: Arc<Mutex<Option<oneshot::Sender<CreateTaskRequest>>>>,
}

async fn handle_create_task(
    State(state): State<CreateCapture>,
    Json(payload): Json<CreateTaskRequest>,
) -> Json<TaskRecord> {
    let task = TaskRecord {
        task_id: TaskId(Uuid::new_v4()),
        owner_id: payload.owner_id,
        content: payload.content.clone(),
        created_at: Utc::now(),
    };
    if let Some(tx) = state.tx.lock().await.take() {
        let _ = tx.send(payload);
    }
    Json(task)
}

#[tokio::test]
async fn create_task_posts_an_owner_scoped_payload() {
    let (tx, rx) = oneshot::channel();
    let app = Router::new()
        .route("/tasks", post(handle_create_task))
        .with_state(CreateCapture {
            tx: Arc::new(Mutex::new(Some(tx))),
        });
    let server_url = spawn_server(app).await.expect("spawn server");

    let client = RealtimeTaskClient::new();
    inject_session(&client, &server_url).await;

    let created = client.create_task("  water the plants  ").await.expect("create");
    assert_eq!(created.content, "water the plants");

    let payload = rx.await.expect("captured request");
    assert_eq!(payload.owner_id, UserId(7));
    assert_eq!(payload.content, "water the plants");
}

#[tokio::test]
async fn create_task_rejects_empty_content() {
    let client = RealtimeTaskClient::new();

    let err = client.create_task("   ").await.expect_err("must reject");
    assert!(err.to_string().contains("must not be empty"));
}

#[derive(Clone)]
struct DeleteCapture {
    tx: Arc<Mutex<Option<oneshot::Sender<(Uuid, Option<String>)>>>>,
}

async fn handle_delete_task(
    State(state): State<DeleteCapture>,
    Path(task_id): Path<Uuid>,
    Query(query): Query<HashMap<String, String>>,
) {
    if let Some(tx) = state.tx.lock().await.take() {
        let _ = tx.send((task_id, query.get("owner_id").cloned()));
    }
}

#[tokio::test]
async fn delete_task_targets_the_row_for_the_signed_in_owner() {
    let (tx, rx) = oneshot::channel();
    let app = Router::new()
        .route("/tasks/:task_id", delete(handle_delete_task))
        .with_state(DeleteCapture {
            tx: Arc::new(Mutex::new(Some(tx))),
        });
    let server_url = spawn_server(app).await.expect("spawn server");

    let client = RealtimeTaskClient::new();
    inject_session(&client, &server_url).await;

    let task_id = TaskId(Uuid::new_v4());
    client.delete_task(task_id).await.expect("delete");

    let (seen_id, seen_owner) = rx.await.expect("captured request");
    assert_eq!(seen_id, task_id.0);
    assert_eq!(seen_owner.as_deref(), Some("7"));
}

#[tokio::test]
async fn observe_tasks_replaces_the_result_set_and_emits_a_sorted_snapshot() {
    let newer = record("newer", 30);
    let older = record("older", 10);
    let listing = vec![newer.clone(), older.clone()];
    let app = Router::new().route(
        "/tasks",
        get(move || {
            let listing = listing.clone();
            async move { Json(listing) }
        }),
    );
    let server_url = spawn_server(app).await.expect("spawn server");

    let client = RealtimeTaskClient::new();
    inject_session(&client, &server_url).await;
    let mut events = client.subscribe_events();

    client.observe_tasks().await.expect("observe");

    let event = tokio::time::timeout(Duration::from_secs(2), events.recv())
        .await
        .expect("timely snapshot")
        .expect("event");
    match event {
        ClientEvent::TasksSnapshot { items } => {
            assert_eq!(items, vec![older.clone(), newer.clone()])
        }
        other => panic!("unexpected event: {other:?}"),
    }
    assert_eq!(client.inner.lock().await.tasks, vec![older, newer]);
}

#[tokio::test]
async fn sign_in_establishes_a_session_and_live_subscription() {
    let app = Router::new()
        .route("/login", post(handle_login))
        .route("/ws", get(handle_idle_ws));
    let server_url = spawn_server(app).await.expect("spawn server");

    let client = RealtimeTaskClient::new();
    let user = client.sign_in(&server_url, "alice").await.expect("sign in");
    assert_eq!(user.user_id, UserId(7));
    assert_eq!(user.username, "alice");

    let inner = client.inner.lock().await;
    assert_eq!(inner.server_url.as_deref(), Some(server_url.as_str()));
    assert_eq!(inner.user.as_ref(), Some(&user));
    assert!(inner.ws_task.is_some());
}

#[tokio::test]
async fn sign_in_rolls_back_when_the_subscription_cannot_connect() {
    // No /ws route: the login succeeds but the websocket upgrade 404s.
    let app = Router::new().route("/login", post(handle_login));
    let server_url = spawn_server(app).await.expect("spawn server");

    let client = RealtimeTaskClient::new();
    client
        .sign_in(&server_url, "alice")
        .await
        .expect_err("sign-in must fail without a subscription");

    let inner = client.inner.lock().await;
    assert!(inner.server_url.is_none());
    assert!(inner.user.is_none());
}

#[derive(Clone)]
struct SeededWs {
    task: TaskRecord,
}

async fn handle_seeded_ws(State(state): State<SeededWs>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |mut socket| async move {
        let text = serde_json::to_string(&ServerEvent::TaskCreated {
            task: state.task.clone(),
        })
        .expect("serialize event");
        let _ = socket.send(WsMessage::Text(text)).await;
        while socket.recv().await.is_some() {}
    })
}

#[tokio::test]
async fn subscription_deltas_are_folded_into_full_snapshots() {
    let task = record("pushed from the service", 15);
    let app = Router::new()
        .route("/login", post(handle_login))
        .route("/ws", get(handle_seeded_ws))
        .with_state(SeededWs { task: task.clone() });
    let server_url = spawn_server(app).await.expect("spawn server");

    let client = RealtimeTaskClient::new();
    let mut events = client.subscribe_events();
    client.sign_in(&server_url, "alice").await.expect("sign in");

    let event = tokio::time::timeout(Duration::from_secs(2), events.recv())
        .await
        .expect("timely snapshot")
        .expect("event");
    match event {
        ClientEvent::TasksSnapshot { items } => assert_eq!(items, vec![task]),
        other => panic!("unexpected event: {other:?}"),
    }
}
