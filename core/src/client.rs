//! Stateless HTTP request builder and response parser for the todos API.
//!
//! # Design
//! `TodoClient` holds only the API root (base URL plus version prefix) and
//! carries no mutable state between calls. Each operation is split into a
//! `build_*` method that produces an `HttpRequest` and a `parse_*` method
//! that consumes an `HttpResponse`. `TodosApi` drives the round-trip in
//! between; tests can drive either half directly.

use url::Url;
use uuid::Uuid;

use crate::classify::{classify_entity, classify_list};
use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::types::{BaseListResponse, BaseResponse, NewTodo, Todo};

const ACCEPT: (&str, &str) = ("accept", "application/json");

/// Synchronous, stateless request builder for the todos API.
#[derive(Debug, Clone)]
pub struct TodoClient {
    api_root: String,
}

impl TodoClient {
    /// Client for `base_url` speaking the default API version.
    pub fn new(base_url: &str) -> Self {
        Self::from_config(&ClientConfig::new(base_url))
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            api_root: config.api_root(),
        }
    }

    pub fn api_root(&self) -> &str {
        &self.api_root
    }

    pub fn build_fetch_todos(&self, page: u32) -> Result<HttpRequest, ApiError> {
        let page = page.to_string();
        let url = self.url("/todos", &[("page", page.as_str())])?;
        Ok(bodiless(HttpMethod::Get, url))
    }

    pub fn build_fetch_todo(&self, id: i64) -> Result<HttpRequest, ApiError> {
        let url = self.url(&format!("/todos/{id}"), &[])?;
        Ok(bodiless(HttpMethod::Get, url))
    }

    pub fn build_search_todos(&self, query: &str, page: u32) -> Result<HttpRequest, ApiError> {
        let page = page.to_string();
        let url = self.url("/todos/search", &[("page", page.as_str()), ("query", query)])?;
        Ok(bodiless(HttpMethod::Get, url))
    }

    /// Create via `multipart/form-data`. Each call gets a fresh boundary.
    pub fn build_add_todo(&self, input: &NewTodo) -> Result<HttpRequest, ApiError> {
        let url = self.url("/todos", &[])?;
        let boundary = format!("Boundary-{}", Uuid::new_v4().simple());
        let is_done = if input.is_done { "true" } else { "false" };
        let body = multipart_body(&boundary, &[("title", input.title.as_str()), ("is_done", is_done)]);
        Ok(with_body(
            HttpMethod::Post,
            url,
            format!("multipart/form-data; boundary={boundary}"),
            body,
        ))
    }

    pub fn build_add_todo_json(&self, input: &NewTodo) -> Result<HttpRequest, ApiError> {
        let url = self.url("/todos-json", &[])?;
        let body = json_body(input)?;
        Ok(with_body(HttpMethod::Post, url, "application/json".to_string(), body))
    }

    pub fn build_edit_todo_json(&self, id: i64, input: &NewTodo) -> Result<HttpRequest, ApiError> {
        let url = self.url(&format!("/todos-json/{id}"), &[])?;
        let body = json_body(input)?;
        Ok(with_body(HttpMethod::Post, url, "application/json".to_string(), body))
    }

    /// Update via `PUT` with an `application/x-www-form-urlencoded` body.
    pub fn build_edit_todo(&self, id: i64, input: &NewTodo) -> Result<HttpRequest, ApiError> {
        let url = self.url(&format!("/todos/{id}"), &[])?;
        let body = serde_urlencoded::to_string(input).map_err(|e| {
            tracing::debug!(error = %e, "form body could not be encoded");
            ApiError::JsonEncodingError
        })?;
        Ok(with_body(
            HttpMethod::Put,
            url,
            "application/x-www-form-urlencoded".to_string(),
            body,
        ))
    }

    pub fn build_delete_todo(&self, id: i64) -> Result<HttpRequest, ApiError> {
        let url = self.url(&format!("/todos/{id}"), &[])?;
        Ok(bodiless(HttpMethod::Delete, url))
    }

    pub fn parse_fetch_todos(&self, response: HttpResponse) -> Result<BaseListResponse<Todo>, ApiError> {
        classify_list(&response)
    }

    pub fn parse_search_todos(&self, response: HttpResponse) -> Result<BaseListResponse<Todo>, ApiError> {
        classify_list(&response)
    }

    /// Parse any single-todo response: get, create, update and delete all
    /// answer with the affected todo in a `BaseResponse`.
    pub fn parse_todo(&self, response: HttpResponse) -> Result<BaseResponse<Todo>, ApiError> {
        classify_entity(&response)
    }

    /// Compose `api_root + path` and append `query` pairs form-urlencoded.
    fn url(&self, path: &str, query: &[(&str, &str)]) -> Result<String, ApiError> {
        let mut url = Url::parse(&format!("{}{path}", self.api_root)).map_err(|e| {
            tracing::debug!(error = %e, root = %self.api_root, path, "url rejected");
            ApiError::NotAllowedUrl
        })?;
        if url.cannot_be_a_base() {
            return Err(ApiError::NotAllowedUrl);
        }
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url.into())
    }
}

fn bodiless(method: HttpMethod, url: String) -> HttpRequest {
    HttpRequest {
        method,
        url,
        headers: vec![(ACCEPT.0.to_string(), ACCEPT.1.to_string())],
        body: None,
    }
}

fn with_body(method: HttpMethod, url: String, content_type: String, body: String) -> HttpRequest {
    HttpRequest {
        method,
        url,
        headers: vec![
            (ACCEPT.0.to_string(), ACCEPT.1.to_string()),
            ("content-type".to_string(), content_type),
        ],
        body: Some(body),
    }
}

fn json_body(input: &NewTodo) -> Result<String, ApiError> {
    serde_json::to_string(input).map_err(|e| {
        tracing::debug!(error = %e, "json body could not be encoded");
        ApiError::JsonEncodingError
    })
}

fn multipart_body(boundary: &str, fields: &[(&str, &str)]) -> String {
    let mut body = String::new();
    for (name, value) in fields {
        body.push_str(&format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
        ));
    }
    body.push_str(&format!("--{boundary}--\r\n"));
    body
}
