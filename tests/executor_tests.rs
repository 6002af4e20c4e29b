//! Request executor tests against a loopback server

mod common;

use std::collections::BTreeMap;

use pretty_assertions::assert_eq;
use serde_json::{Map, Value, json};

use webapi_mcp::api::{ApiDefinition, RequestExecutor, normalize_value};

fn definition(document: Value) -> ApiDefinition {
    normalize_value(&document).unwrap()
}

fn args(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap_or_default()
}

async fn call(
    api: &ApiDefinition,
    call_args: Value,
) -> Result<Option<Value>, webapi_mcp::ApiCallError> {
    RequestExecutor::new()
        .unwrap()
        .execute(api, &api.methods[0], &args(call_args), &BTreeMap::new())
        .await
}

#[tokio::test]
async fn get_places_arguments_in_query() {
    let base = common::spawn_server().await;
    let api = definition(json!({"name": "echo", "baseUrl": base, "url": "/echo"}));

    let echoed = call(&api, json!({"q": "x", "n": 2, "skip": null}))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(echoed["method"], "GET");
    assert_eq!(echoed["query"], "n=2&q=x");
    assert_eq!(echoed["body"], "");
}

#[tokio::test]
async fn post_places_arguments_in_json_body() {
    let base = common::spawn_server().await;
    let api = definition(json!({
        "name": "echo", "baseUrl": base, "url": "/echo", "method": "POST"
    }));

    let echoed = call(&api, json!({"q": "x"})).await.unwrap().unwrap();
    assert_eq!(echoed["method"], "POST");
    assert_eq!(echoed["query"], Value::Null);
    assert_eq!(echoed["headers"]["content-type"], "application/json");
    let body: Value = serde_json::from_str(echoed["body"].as_str().unwrap()).unwrap();
    assert_eq!(body, json!({"q": "x"}));
}

#[tokio::test]
async fn form_content_type_encodes_body() {
    let base = common::spawn_server().await;
    let api = definition(json!({
        "name": "echo",
        "url": format!("{base}/echo"),
        "method": "PUT",
        "headers": {"Content-Type": "application/x-www-form-urlencoded"}
    }));

    let echoed = call(&api, json!({"a": "1", "tags": ["x", "y"]}))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(echoed["body"], "a=1&tags=x&tags=y");
}

#[tokio::test]
async fn path_parameters_are_substituted_and_kept() {
    let base = common::spawn_server().await;
    let api = definition(json!({"name": "user", "baseUrl": format!("{base}/"), "url": "/echo/users/:id"}));

    let echoed = call(&api, json!({"id": 42})).await.unwrap().unwrap();
    assert_eq!(echoed["path"], "/echo/users/42");
    assert_eq!(echoed["query"], "id=42");
}

#[tokio::test]
async fn headers_follow_scope_precedence() {
    let base = common::spawn_server().await;
    let api = definition(json!({
        "name": "echo",
        "baseUrl": base,
        "headers": {"A": "2", "B": "1"},
        "methods": [{"name": "get", "url": "/echo", "headers": {"A": "3"}}]
    }));
    let global: BTreeMap<String, String> = [("A".to_string(), "1".to_string()), ("C".to_string(), "g".to_string())]
        .into_iter()
        .collect();

    let echoed = RequestExecutor::new()
        .unwrap()
        .execute(&api, &api.methods[0], &Map::new(), &global)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(echoed["headers"]["a"], "3");
    assert_eq!(echoed["headers"]["b"], "1");
    assert_eq!(echoed["headers"]["c"], "g");
}

#[tokio::test]
async fn result_path_extraction() {
    let base = common::spawn_server().await;
    let items = definition(json!({
        "name": "nested", "url": format!("{base}/nested"), "resultPath": "data.items"
    }));
    assert_eq!(call(&items, json!({})).await.unwrap(), Some(json!([1, 2, 3])));

    let indexed = definition(json!({
        "name": "nested", "url": format!("{base}/nested"), "resultPath": "data.users.0.name"
    }));
    assert_eq!(call(&indexed, json!({})).await.unwrap(), Some(json!("Alice")));

    let missing = definition(json!({
        "name": "nested", "url": format!("{base}/nested"), "resultPath": "data.missing.x"
    }));
    assert_eq!(call(&missing, json!({})).await.unwrap(), None);
}

#[tokio::test]
async fn text_and_empty_responses() {
    let base = common::spawn_server().await;
    let text = definition(json!({"name": "t", "url": format!("{base}/text")}));
    assert_eq!(call(&text, json!({})).await.unwrap(), Some(json!("plain body")));

    let forced = definition(json!({
        "name": "t", "url": format!("{base}/nested"), "responseType": "text"
    }));
    assert!(call(&forced, json!({})).await.unwrap().unwrap().is_string());

    let empty = definition(json!({"name": "e", "url": format!("{base}/empty")}));
    assert_eq!(call(&empty, json!({})).await.unwrap(), Some(Value::Null));
}

#[tokio::test]
async fn http_errors_carry_status_and_body() {
    let base = common::spawn_server().await;
    let api = definition(json!({"name": "s", "url": format!("{base}/status/404")}));

    let err = call(&api, json!({})).await.unwrap_err();
    assert_eq!(err.status, 404);
    assert_eq!(err.message, "HTTP 404 Not Found");
    assert_eq!(err.body, Some(json!({"error": "status 404"})));
}

#[tokio::test]
async fn timeout_maps_to_408() {
    let base = common::spawn_server().await;
    let api = definition(json!({"name": "slow", "url": format!("{base}/slow"), "timeout": 100}));

    let err = call(&api, json!({})).await.unwrap_err();
    assert!(err.is_timeout(), "{err:?}");
    assert_eq!(err.body, None);
}

#[tokio::test]
async fn connection_failure_maps_to_0() {
    let base = common::closed_port_url().await;
    let api = definition(json!({"name": "down", "url": format!("{base}/x")}));

    let err = call(&api, json!({})).await.unwrap_err();
    assert!(err.is_network(), "{err:?}");
    assert_eq!(err.body, None);
}
