//! Awaitable todos operations: build, send, classify.
//!
//! # Design
//! `TodosApi` pairs the stateless `TodoClient` with a `Transport`. Each
//! method makes exactly one attempt and reports the first applicable
//! `ApiError`; retrying is the caller's call. Whether to await a method
//! inline or `tokio::spawn` it is also left to the caller.
//!
//! The bulk methods run the single-item operations through a `FanOut`. The
//! transport sits behind an `Arc` so each spawned item owns a cheap clone
//! of the API.

use std::sync::Arc;

use crate::client::TodoClient;
use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::fanout::FanOut;
use crate::http::{HttpRequest, HttpResponse};
use crate::transport::Transport;
use crate::types::{BaseListResponse, BaseResponse, NewTodo, Todo};

/// First page, used by the add-then-refetch composites.
const FIRST_PAGE: u32 = 1;

pub struct TodosApi<T> {
    client: TodoClient,
    transport: Arc<T>,
}

impl<T> Clone for TodosApi<T> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            transport: Arc::clone(&self.transport),
        }
    }
}

impl<T: Transport> TodosApi<T> {
    pub fn new(config: &ClientConfig, transport: T) -> Self {
        Self::from_parts(TodoClient::from_config(config), Arc::new(transport))
    }

    pub fn from_parts(client: TodoClient, transport: Arc<T>) -> Self {
        Self { client, transport }
    }

    pub fn client(&self) -> &TodoClient {
        &self.client
    }

    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        tracing::debug!(method = %request.method, url = %request.url, "sending request");
        let response = self.transport.execute(request).await.map_err(|e| {
            tracing::debug!(error = %e, "transport failed");
            ApiError::from(e)
        })?;
        tracing::debug!(status = response.status, "received response");
        Ok(response)
    }

    pub async fn fetch_todos(&self, page: u32) -> Result<BaseListResponse<Todo>, ApiError> {
        let request = self.client.build_fetch_todos(page)?;
        let response = self.send(request).await?;
        self.client.parse_fetch_todos(response)
    }

    pub async fn fetch_todo(&self, id: i64) -> Result<BaseResponse<Todo>, ApiError> {
        let request = self.client.build_fetch_todo(id)?;
        let response = self.send(request).await?;
        self.client.parse_todo(response)
    }

    pub async fn search_todos(
        &self,
        query: &str,
        page: u32,
    ) -> Result<BaseListResponse<Todo>, ApiError> {
        let request = self.client.build_search_todos(query, page)?;
        let response = self.send(request).await?;
        self.client.parse_search_todos(response)
    }

    /// Create through the multipart endpoint.
    pub async fn add_todo(&self, title: &str, is_done: bool) -> Result<BaseResponse<Todo>, ApiError> {
        let request = self.client.build_add_todo(&NewTodo::new(title, is_done))?;
        let response = self.send(request).await?;
        self.client.parse_todo(response)
    }

    pub async fn add_todo_json(
        &self,
        title: &str,
        is_done: bool,
    ) -> Result<BaseResponse<Todo>, ApiError> {
        let request = self.client.build_add_todo_json(&NewTodo::new(title, is_done))?;
        let response = self.send(request).await?;
        self.client.parse_todo(response)
    }

    pub async fn edit_todo_json(
        &self,
        id: i64,
        title: &str,
        is_done: bool,
    ) -> Result<BaseResponse<Todo>, ApiError> {
        let request = self
            .client
            .build_edit_todo_json(id, &NewTodo::new(title, is_done))?;
        let response = self.send(request).await?;
        self.client.parse_todo(response)
    }

    /// Update through the urlencoded `PUT` endpoint.
    pub async fn edit_todo(
        &self,
        id: i64,
        title: &str,
        is_done: bool,
    ) -> Result<BaseResponse<Todo>, ApiError> {
        let request = self.client.build_edit_todo(id, &NewTodo::new(title, is_done))?;
        let response = self.send(request).await?;
        self.client.parse_todo(response)
    }

    pub async fn delete_todo(&self, id: i64) -> Result<BaseResponse<Todo>, ApiError> {
        let request = self.client.build_delete_todo(id)?;
        let response = self.send(request).await?;
        self.client.parse_todo(response)
    }

    /// Create a todo, then fetch the first page.
    ///
    /// The list is only requested after the create succeeded. Errors from
    /// either step are returned as is.
    pub async fn add_todo_and_fetch_todos(
        &self,
        title: &str,
        is_done: bool,
    ) -> Result<BaseListResponse<Todo>, ApiError> {
        self.add_todo(title, is_done).await?;
        self.fetch_todos(FIRST_PAGE).await
    }

    /// Like `add_todo_and_fetch_todos`, but a failed refetch yields an empty
    /// list. A failed create is still an error.
    pub async fn add_todo_and_fetch_todos_or_empty(
        &self,
        title: &str,
        is_done: bool,
    ) -> Result<Vec<Todo>, ApiError> {
        self.add_todo(title, is_done).await?;
        match self.fetch_todos(FIRST_PAGE).await {
            Ok(list) => Ok(list.data.unwrap_or_default()),
            Err(err) => {
                tracing::debug!(error = %err, "refetch after create failed");
                Ok(Vec::new())
            }
        }
    }

    /// Fetch every id concurrently; fails if any fetch fails.
    pub async fn fetch_selected_todos(&self, ids: &[i64]) -> Result<Vec<Todo>, ApiError> {
        self.fetch_selected_todos_in(&FanOut::new(), ids).await
    }

    pub async fn fetch_selected_todos_in(
        &self,
        fan_out: &FanOut,
        ids: &[i64],
    ) -> Result<Vec<Todo>, ApiError> {
        let api = self.clone();
        fan_out
            .strict(ids.iter().copied(), move |id| api.clone().fetch_owned(id))
            .await
    }

    /// Fetch every id concurrently; returns the todos that could be fetched,
    /// in the order they arrived.
    pub async fn fetch_selected_todos_best_effort(&self, ids: &[i64]) -> Vec<Todo> {
        self.fetch_selected_todos_best_effort_in(&FanOut::new(), ids)
            .await
    }

    pub async fn fetch_selected_todos_best_effort_in(
        &self,
        fan_out: &FanOut,
        ids: &[i64],
    ) -> Vec<Todo> {
        let api = self.clone();
        fan_out
            .best_effort(ids.iter().copied(), move |id| api.clone().fetch_owned(id))
            .await
    }

    /// Fetch every id concurrently; returns the todos that could be fetched,
    /// in the order of `ids`.
    pub async fn fetch_selected_todos_zip(&self, ids: &[i64]) -> Vec<Todo> {
        self.fetch_selected_todos_zip_in(&FanOut::new(), ids).await
    }

    pub async fn fetch_selected_todos_zip_in(&self, fan_out: &FanOut, ids: &[i64]) -> Vec<Todo> {
        let api = self.clone();
        fan_out
            .best_effort_ordered(ids.iter().copied(), move |id| api.clone().fetch_owned(id))
            .await
    }

    /// Delete every id concurrently; fails if any delete fails. Returns the
    /// deleted ids in input order.
    pub async fn delete_selected_todos(&self, ids: &[i64]) -> Result<Vec<i64>, ApiError> {
        self.delete_selected_todos_in(&FanOut::new(), ids).await
    }

    pub async fn delete_selected_todos_in(
        &self,
        fan_out: &FanOut,
        ids: &[i64],
    ) -> Result<Vec<i64>, ApiError> {
        let api = self.clone();
        fan_out
            .strict(ids.iter().copied(), move |id| api.clone().delete_owned(id))
            .await
    }

    /// Delete every id concurrently; returns the ids that were deleted, in
    /// the order the deletes completed.
    pub async fn delete_selected_todos_best_effort(&self, ids: &[i64]) -> Vec<i64> {
        self.delete_selected_todos_best_effort_in(&FanOut::new(), ids)
            .await
    }

    pub async fn delete_selected_todos_best_effort_in(
        &self,
        fan_out: &FanOut,
        ids: &[i64],
    ) -> Vec<i64> {
        let api = self.clone();
        fan_out
            .best_effort(ids.iter().copied(), move |id| api.clone().delete_owned(id))
            .await
    }

    /// Delete every id concurrently; returns the ids that were deleted, in
    /// the order of `ids`.
    pub async fn delete_selected_todos_zip(&self, ids: &[i64]) -> Vec<i64> {
        self.delete_selected_todos_zip_in(&FanOut::new(), ids).await
    }

    pub async fn delete_selected_todos_zip_in(&self, fan_out: &FanOut, ids: &[i64]) -> Vec<i64> {
        let api = self.clone();
        fan_out
            .best_effort_ordered(ids.iter().copied(), move |id| api.clone().delete_owned(id))
            .await
    }

    async fn fetch_owned(self, id: i64) -> Result<Todo, ApiError> {
        self.fetch_todo(id).await?.data.ok_or(ApiError::NoContent)
    }

    async fn delete_owned(self, id: i64) -> Result<i64, ApiError> {
        let envelope = self.delete_todo(id).await?;
        Ok(envelope.data.and_then(|todo| todo.id).unwrap_or(id))
    }
}
