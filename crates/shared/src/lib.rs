//! Types shared between the Tasklane client runtime and the desktop shell.

pub mod domain;
pub mod error;
pub mod protocol;
