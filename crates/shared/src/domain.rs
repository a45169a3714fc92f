use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Server-assigned account identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub i64);

/// Identifier for one row of the managed task collection.
///
/// The service mints these; clients never generate ids for real records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskId(pub Uuid);
