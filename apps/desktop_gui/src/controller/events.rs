//! UI/backend events and error modeling for the desktop controller.

use shared::protocol::{TaskRecord, UserDescriptor};

pub enum UiEvent {
    SignedIn(UserDescriptor),
    SignedOut,
    Info(String),
    Error(UiError),
    TasksSnapshot { items: Vec<TaskRecord> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiErrorCategory {
    Auth,
    Transport,
    Validation,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiErrorContext {
    SignIn,
    CreateTask,
    DeleteTask,
    TaskSync,
    General,
}

pub fn classify_sign_in_failure(message: &str) -> String {
    let lower = message.to_ascii_lowercase();
    if lower.contains("failed to connect")
        || lower.contains("connection refused")
        || lower.contains("dns")
        || lower.contains("timed out")
    {
        "Server unreachable; check URL/network and retry sign-in.".to_string()
    } else {
        format!("Sign-in error: {message}")
    }
}

#[derive(Debug, Clone)]
pub struct UiError {
    category: UiErrorCategory,
    context: UiErrorContext,
    message: String,
}

impl UiError {
    pub fn from_message(context: UiErrorContext, message: impl Into<String>) -> Self {
        let message = message.into();
        let message_lower = message.to_ascii_lowercase();
        let category = if message_lower.contains("401")
            || message_lower.contains("403")
            || message_lower.contains("unauthorized")
            || message_lower.contains("forbidden")
            || message_lower.contains("session expired")
            || message_lower.contains("not signed in")
            || message_lower.contains("invalid credential")
        {
            UiErrorCategory::Auth
        } else if message_lower.contains("invalid")
            || message_lower.contains("missing")
            || message_lower.contains("malformed")
            || message_lower.contains("must not be empty")
        {
            UiErrorCategory::Validation
        } else if message_lower.contains("timeout")
            || message_lower.contains("connection")
            || message_lower.contains("network")
            || message_lower.contains("transport")
            || message_lower.contains("unavailable")
            || message_lower.contains("disconnect")
            || message_lower.contains("websocket")
        {
            UiErrorCategory::Transport
        } else {
            UiErrorCategory::Unknown
        };

        Self {
            category,
            context,
            message,
        }
    }

    pub fn requires_reauth(&self) -> bool {
        self.category == UiErrorCategory::Auth
    }

    pub fn category(&self) -> UiErrorCategory {
        self.category
    }

    pub fn context(&self) -> UiErrorContext {
        self.context
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_backend_disconnect_as_transport_error() {
        let err = UiError::from_message(
            UiErrorContext::General,
            "Backend command processor disconnected (possible startup/runtime failure)",
        );
        assert_eq!(err.category(), UiErrorCategory::Transport);
        assert!(!err.requires_reauth());
    }

    #[test]
    fn unauthorized_responses_force_reauthentication() {
        let err = UiError::from_message(
            UiErrorContext::TaskSync,
            "HTTP status client error (401 Unauthorized) for url",
        );
        assert_eq!(err.category(), UiErrorCategory::Auth);
        assert!(err.requires_reauth());
    }

    #[test]
    fn empty_content_rejection_reads_as_validation() {
        let err =
            UiError::from_message(UiErrorContext::CreateTask, "task content must not be empty");
        assert_eq!(err.category(), UiErrorCategory::Validation);
    }

    #[test]
    fn unreachable_server_gets_a_friendly_sign_in_hint() {
        let hint = classify_sign_in_failure("error sending request: connection refused");
        assert!(hint.contains("Server unreachable"));

        let other = classify_sign_in_failure("login endpoint returned error: 500");
        assert!(other.starts_with("Sign-in error:"));
    }
}
