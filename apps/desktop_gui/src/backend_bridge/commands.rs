//! Backend commands queued from UI to the backend worker.

use shared::domain::TaskId;

pub enum BackendCommand {
    SignIn {
        server_url: String,
        username: String,
    },
    SignOut,
    RefreshTasks,
    CreateTask {
        content: String,
    },
    DeleteTask {
        task_id: TaskId,
    },
}
