//! Wire types for the todos v2 API.
//!
//! # Design
//! Every field the server sends is optional: responses are not guaranteed to
//! be complete and this layer does not enforce non-null fields. Whether an
//! absent `data` is acceptable is the classifier's decision, not the type's.
//! Wire names are snake_case and are mapped explicitly where they differ from
//! the Rust field names.

use serde::{Deserialize, Serialize};

/// A single todo item.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Todo {
    pub id: Option<i64>,
    pub title: Option<String>,
    pub is_done: Option<bool>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

/// Envelope around a single entity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BaseResponse<T> {
    pub data: Option<T>,
    pub message: Option<String>,
}

/// Envelope around a page of entities.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BaseListResponse<T> {
    pub data: Option<Vec<T>>,
    pub meta: Option<Meta>,
    pub message: Option<String>,
}

/// Pagination descriptor attached to list responses.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Meta {
    pub current_page: Option<i64>,
    pub from: Option<i64>,
    pub last_page: Option<i64>,
    pub per_page: Option<i64>,
    pub to: Option<i64>,
    pub total: Option<i64>,
}

/// Outbound payload for creating or updating a todo.
///
/// Serialized as JSON for the `-json` endpoints and as form fields for the
/// multipart and urlencoded ones.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct NewTodo {
    pub title: String,
    pub is_done: bool,
}

impl NewTodo {
    pub fn new(title: impl Into<String>, is_done: bool) -> Self {
        Self {
            title: title.into(),
            is_done,
        }
    }
}
