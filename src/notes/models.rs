//! Note data models

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::common::helpers::serialize_millis;

#[derive(FromRow, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Note {
    pub id: String,
    pub user_id: String,
    pub content: String,
    #[serde(serialize_with = "serialize_millis")]
    pub created_at: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateNoteRequest {
    pub content: String,
}
