use std::{collections::BTreeMap, sync::Arc};

use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Form, Json, Router,
};
use serde::{de, Deserialize, Deserializer, Serialize};
use tokio::{net::TcpListener, sync::RwLock};

pub const PER_PAGE: usize = 10;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Todo {
    pub id: i64,
    pub title: String,
    pub is_done: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// Single-entity envelope.
#[derive(Debug, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub data: Option<T>,
    pub message: Option<String>,
}

/// Page envelope.
#[derive(Debug, Serialize, Deserialize)]
pub struct ListEnvelope<T> {
    pub data: Vec<T>,
    pub meta: Meta,
    pub message: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Meta {
    pub current_page: usize,
    pub from: Option<usize>,
    pub last_page: usize,
    pub per_page: usize,
    pub to: Option<usize>,
    pub total: usize,
}

/// Body of every create and update endpoint, whatever its encoding.
#[derive(Debug, Deserialize)]
pub struct TodoInput {
    pub title: String,
    #[serde(default, deserialize_with = "flag")]
    pub is_done: bool,
}

#[derive(Deserialize)]
pub struct PageQuery {
    #[serde(default = "first_page")]
    pub page: usize,
}

#[derive(Deserialize)]
pub struct SearchQuery {
    #[serde(default = "first_page")]
    pub page: usize,
    #[serde(default)]
    pub query: String,
}

fn first_page() -> usize {
    1
}

/// Accept `true`, `"true"`, `"1"` and their false counterparts.
fn flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Text(String),
    }

    match Flag::deserialize(deserializer)? {
        Flag::Bool(value) => Ok(value),
        Flag::Text(text) => parse_flag(&text)
            .ok_or_else(|| de::Error::custom(format!("invalid is_done value: {text}"))),
    }
}

fn parse_flag(text: &str) -> Option<bool> {
    match text.trim() {
        "true" | "1" => Some(true),
        "false" | "0" | "" => Some(false),
        _ => None,
    }
}

#[derive(Debug, Default)]
pub struct Store {
    next_id: i64,
    todos: BTreeMap<i64, Todo>,
}

impl Store {
    fn insert(&mut self, input: TodoInput) -> Todo {
        self.next_id += 1;
        let now = chrono::Utc::now().to_rfc3339();
        let todo = Todo {
            id: self.next_id,
            title: input.title,
            is_done: input.is_done,
            created_at: now.clone(),
            updated_at: now,
        };
        self.todos.insert(todo.id, todo.clone());
        todo
    }

    fn update(&mut self, id: i64, input: TodoInput) -> Option<Todo> {
        let todo = self.todos.get_mut(&id)?;
        todo.title = input.title;
        todo.is_done = input.is_done;
        todo.updated_at = chrono::Utc::now().to_rfc3339();
        Some(todo.clone())
    }
}

pub type Db = Arc<RwLock<Store>>;

pub fn app() -> Router {
    let db: Db = Arc::new(RwLock::new(Store::default()));
    let v2 = Router::new()
        .route("/todos", get(list_todos).post(create_todo_multipart))
        .route("/todos/search", get(search_todos))
        .route(
            "/todos/{id}",
            get(get_todo).put(update_todo_form).delete(delete_todo),
        )
        .route("/todos-json", post(create_todo_json))
        .route("/todos-json/{id}", post(update_todo_json))
        .with_state(db);
    Router::new().nest("/v2", v2)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

fn page_of(todos: Vec<Todo>, page: usize) -> ListEnvelope<Todo> {
    let page = page.max(1);
    let total = todos.len();
    let last_page = total.div_ceil(PER_PAGE).max(1);
    // Huge page numbers land past the end instead of overflowing.
    let skip = (page - 1).saturating_mul(PER_PAGE);
    let data: Vec<Todo> = todos.into_iter().skip(skip).take(PER_PAGE).collect();
    let (from, to) = if data.is_empty() {
        (None, None)
    } else {
        (Some(skip + 1), Some(skip + data.len()))
    };
    ListEnvelope {
        data,
        meta: Meta {
            current_page: page,
            from,
            last_page,
            per_page: PER_PAGE,
            to,
            total,
        },
        message: Some("ok".to_string()),
    }
}

fn found(todo: Todo, message: &str) -> Json<Envelope<Todo>> {
    Json(Envelope {
        data: Some(todo),
        message: Some(message.to_string()),
    })
}

async fn list_todos(State(db): State<Db>, Query(query): Query<PageQuery>) -> Json<ListEnvelope<Todo>> {
    let store = db.read().await;
    Json(page_of(store.todos.values().cloned().collect(), query.page))
}

async fn search_todos(
    State(db): State<Db>,
    Query(query): Query<SearchQuery>,
) -> Json<ListEnvelope<Todo>> {
    let needle = query.query.to_lowercase();
    let store = db.read().await;
    let hits = store
        .todos
        .values()
        .filter(|todo| todo.title.to_lowercase().contains(&needle))
        .cloned()
        .collect();
    Json(page_of(hits, query.page))
}

async fn get_todo(
    State(db): State<Db>,
    Path(id): Path<i64>,
) -> Result<Json<Envelope<Todo>>, StatusCode> {
    let store = db.read().await;
    store
        .todos
        .get(&id)
        .cloned()
        .map(|todo| found(todo, "ok"))
        .ok_or(StatusCode::NOT_FOUND)
}

async fn create_todo_multipart(
    State(db): State<Db>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<Envelope<Todo>>), StatusCode> {
    let mut title = None;
    let mut is_done = false;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| StatusCode::BAD_REQUEST)?
    {
        let name = field.name().unwrap_or_default().to_string();
        let value = field.text().await.map_err(|_| StatusCode::BAD_REQUEST)?;
        match name.as_str() {
            "title" => title = Some(value),
            "is_done" => is_done = parse_flag(&value).ok_or(StatusCode::UNPROCESSABLE_ENTITY)?,
            _ => {}
        }
    }
    let title = title.ok_or(StatusCode::UNPROCESSABLE_ENTITY)?;

    let todo = db.write().await.insert(TodoInput { title, is_done });
    tracing::info!(id = todo.id, "created todo from multipart form");
    Ok((StatusCode::CREATED, found(todo, "created")))
}

async fn create_todo_json(
    State(db): State<Db>,
    Json(input): Json<TodoInput>,
) -> (StatusCode, Json<Envelope<Todo>>) {
    let todo = db.write().await.insert(input);
    tracing::info!(id = todo.id, "created todo from json");
    (StatusCode::CREATED, found(todo, "created"))
}

async fn update_todo_json(
    State(db): State<Db>,
    Path(id): Path<i64>,
    Json(input): Json<TodoInput>,
) -> Result<Json<Envelope<Todo>>, StatusCode> {
    let mut store = db.write().await;
    store
        .update(id, input)
        .map(|todo| found(todo, "updated"))
        .ok_or(StatusCode::NOT_FOUND)
}

async fn update_todo_form(
    State(db): State<Db>,
    Path(id): Path<i64>,
    Form(input): Form<TodoInput>,
) -> Result<Json<Envelope<Todo>>, StatusCode> {
    let mut store = db.write().await;
    store
        .update(id, input)
        .map(|todo| found(todo, "updated"))
        .ok_or(StatusCode::NOT_FOUND)
}

async fn delete_todo(
    State(db): State<Db>,
    Path(id): Path<i64>,
) -> Result<Json<Envelope<Todo>>, StatusCode> {
    let mut store = db.write().await;
    let todo = store.todos.remove(&id).ok_or(StatusCode::NOT_FOUND)?;
    tracing::info!(id, "deleted todo");
    Ok(found(todo, "deleted"))
}
