//! Async API client core for the todos v2 service.
//!
//! # Overview
//! Builds requests, sends them through a pluggable `Transport`, and
//! classifies responses into typed envelopes or an `ApiError`. Bulk
//! operations fan out one request per id and fan the results back in,
//! either strictly (all or nothing, input order) or best-effort (successes
//! only, completion order).
//!
//! # Design
//! - `TodoClient` is stateless: `build_*` produces an `HttpRequest`,
//!   `parse_*` consumes an `HttpResponse`. No I/O.
//! - `TodosApi` composes the two halves around a `Transport` into one
//!   awaitable call per action.
//! - `FanOut` runs item operations on a `JoinSet` under one
//!   `CancellationToken`.
//! - The base URL is injected through `ClientConfig`.

pub mod api;
pub mod classify;
pub mod client;
pub mod config;
pub mod error;
pub mod fanout;
pub mod http;
pub mod transport;
pub mod types;

pub use api::TodosApi;
pub use client::TodoClient;
pub use config::{ClientConfig, ConfigError};
pub use error::{ApiError, TransportError};
pub use fanout::FanOut;
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use transport::{ReqwestTransport, Transport};
pub use types::{BaseListResponse, BaseResponse, Meta, NewTodo, Todo};
