//! Verify build/parse methods against JSON test vectors stored in `test-vectors/`.
//!
//! Each vector file describes inputs, expected requests, simulated responses,
//! and expected parse results or errors. JSON bodies are compared as parsed
//! values so field order does not matter; form bodies are compared verbatim.

use serde_json::Value;
use todos_core::{
    ApiError, BaseListResponse, BaseResponse, HttpMethod, HttpRequest, HttpResponse, NewTodo, Todo,
    TodoClient,
};

const BASE_URL: &str = "http://localhost:3000";

fn client() -> TodoClient {
    TodoClient::new(BASE_URL)
}

fn load(raw: &str) -> Vec<Value> {
    let vectors: Value = serde_json::from_str(raw).unwrap();
    vectors["cases"].as_array().unwrap().clone()
}

fn parse_method(s: &str) -> HttpMethod {
    match s {
        "GET" => HttpMethod::Get,
        "POST" => HttpMethod::Post,
        "PUT" => HttpMethod::Put,
        "DELETE" => HttpMethod::Delete,
        other => panic!("unknown method: {other}"),
    }
}

/// Map the vector's error name onto `ApiError`; `BadStatus:<code>` carries
/// its status.
fn parse_error(s: &str) -> ApiError {
    match s {
        "NoContent" => ApiError::NoContent,
        "Unauthorized" => ApiError::Unauthorized,
        "DecodingError" => ApiError::DecodingError,
        "NotAllowedUrl" => ApiError::NotAllowedUrl,
        other => match other.strip_prefix("BadStatus:") {
            Some(code) => ApiError::BadStatus(code.parse().unwrap()),
            None => panic!("unknown expected_error: {other}"),
        },
    }
}

fn input(case: &Value) -> NewTodo {
    let input = &case["input"];
    NewTodo::new(
        input["title"].as_str().unwrap(),
        input["is_done"].as_bool().unwrap(),
    )
}

fn check_request(name: &str, req: &HttpRequest, expected: &Value) {
    assert_eq!(
        req.method,
        parse_method(expected["method"].as_str().unwrap()),
        "{name}: method"
    );
    assert_eq!(
        req.url,
        format!("{BASE_URL}{}", expected["url"].as_str().unwrap()),
        "{name}: url"
    );

    let expected_headers: Vec<(String, String)> = expected["headers"]
        .as_array()
        .unwrap()
        .iter()
        .map(|h| {
            let pair = h.as_array().unwrap();
            (
                pair[0].as_str().unwrap().to_string(),
                pair[1].as_str().unwrap().to_string(),
            )
        })
        .collect();
    assert_eq!(req.headers, expected_headers, "{name}: headers");

    match &expected["body"] {
        Value::Null => assert!(req.body.is_none(), "{name}: body should be None"),
        Value::String(form) => {
            assert_eq!(req.body.as_deref(), Some(form.as_str()), "{name}: body")
        }
        json => {
            let body: Value = serde_json::from_str(req.body.as_deref().unwrap()).unwrap();
            assert_eq!(&body, json, "{name}: body");
        }
    }
}

fn simulated(case: &Value) -> HttpResponse {
    let sim = &case["simulated_response"];
    HttpResponse::new(
        sim["status"].as_u64().unwrap() as u16,
        sim["body"].as_str().unwrap(),
    )
}

/// Compare a parse outcome with the case's `expected_result` or
/// `expected_error`.
fn check_outcome<T>(name: &str, case: &Value, result: Result<T, ApiError>)
where
    T: serde::de::DeserializeOwned + PartialEq + std::fmt::Debug,
{
    if let Some(expected_error) = case.get("expected_error") {
        let err = result.unwrap_err();
        assert_eq!(
            err,
            parse_error(expected_error.as_str().unwrap()),
            "{name}: error"
        );
    } else {
        let expected: T = serde_json::from_value(case["expected_result"].clone()).unwrap();
        assert_eq!(result.unwrap(), expected, "{name}: parsed result");
    }
}

// ---------------------------------------------------------------------------
// List
// ---------------------------------------------------------------------------

#[test]
fn list_test_vectors() {
    let c = client();
    for case in load(include_str!("../../test-vectors/list.json")) {
        let name = case["name"].as_str().unwrap();
        let page = case["input_page"].as_u64().unwrap() as u32;

        let req = c.build_fetch_todos(page).unwrap();
        check_request(name, &req, &case["expected_request"]);

        let result = c.parse_fetch_todos(simulated(&case));
        check_outcome::<BaseListResponse<Todo>>(name, &case, result);
    }
}

// ---------------------------------------------------------------------------
// Search
// ---------------------------------------------------------------------------

#[test]
fn search_test_vectors() {
    let c = client();
    for case in load(include_str!("../../test-vectors/search.json")) {
        let name = case["name"].as_str().unwrap();
        let query = case["input_query"].as_str().unwrap();
        let page = case["input_page"].as_u64().unwrap() as u32;

        let req = c.build_search_todos(query, page).unwrap();
        check_request(name, &req, &case["expected_request"]);

        let result = c.parse_search_todos(simulated(&case));
        check_outcome::<BaseListResponse<Todo>>(name, &case, result);
    }
}

// ---------------------------------------------------------------------------
// Get
// ---------------------------------------------------------------------------

#[test]
fn get_test_vectors() {
    let c = client();
    for case in load(include_str!("../../test-vectors/get.json")) {
        let name = case["name"].as_str().unwrap();
        let id = case["input_id"].as_i64().unwrap();

        let req = c.build_fetch_todo(id).unwrap();
        check_request(name, &req, &case["expected_request"]);

        let result = c.parse_todo(simulated(&case));
        check_outcome::<BaseResponse<Todo>>(name, &case, result);
    }
}

// ---------------------------------------------------------------------------
// Create (json)
// ---------------------------------------------------------------------------

#[test]
fn create_json_test_vectors() {
    let c = client();
    for case in load(include_str!("../../test-vectors/create_json.json")) {
        let name = case["name"].as_str().unwrap();

        let req = c.build_add_todo_json(&input(&case)).unwrap();
        check_request(name, &req, &case["expected_request"]);

        let result = c.parse_todo(simulated(&case));
        check_outcome::<BaseResponse<Todo>>(name, &case, result);
    }
}

// ---------------------------------------------------------------------------
// Update (json post and urlencoded put)
// ---------------------------------------------------------------------------

#[test]
fn update_test_vectors() {
    let c = client();
    for case in load(include_str!("../../test-vectors/update.json")) {
        let name = case["name"].as_str().unwrap();
        let id = case["input_id"].as_i64().unwrap();
        let input = input(&case);

        let req = match case["encoding"].as_str().unwrap() {
            "json" => c.build_edit_todo_json(id, &input).unwrap(),
            "form" => c.build_edit_todo(id, &input).unwrap(),
            other => panic!("{name}: unknown encoding: {other}"),
        };
        check_request(name, &req, &case["expected_request"]);

        let result = c.parse_todo(simulated(&case));
        check_outcome::<BaseResponse<Todo>>(name, &case, result);
    }
}

// ---------------------------------------------------------------------------
// Delete
// ---------------------------------------------------------------------------

#[test]
fn delete_test_vectors() {
    let c = client();
    for case in load(include_str!("../../test-vectors/delete.json")) {
        let name = case["name"].as_str().unwrap();
        let id = case["input_id"].as_i64().unwrap();

        let req = c.build_delete_todo(id).unwrap();
        check_request(name, &req, &case["expected_request"]);

        let result = c.parse_todo(simulated(&case));
        check_outcome::<BaseResponse<Todo>>(name, &case, result);
    }
}
