//! The people routes served through the real ingress: happy paths, input
//! rejections and the generated OpenAPI document.

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use modkit::{ModuleCtxBuilder, RegistryBuilder};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

struct Modules(Value);

impl modkit::ConfigProvider for Modules {
    fn get_module_config(&self, module_name: &str) -> Option<&Value> {
        self.0.get(module_name)
    }
}

async fn app() -> Router {
    let mut b = RegistryBuilder::default();
    api_ingress::register(&mut b);
    people::register(&mut b);
    let registry = b.build_topo_sorted().unwrap();

    let ctx = ModuleCtxBuilder::new(CancellationToken::new())
        .with_config_provider(Arc::new(Modules(json!({
            "api_ingress": { "bind_addr": "127.0.0.1:0", "enable_docs": true }
        }))))
        .build();

    registry.run_init_phase(&ctx).await.unwrap();
    registry.run_rest_phase(&ctx, Router::new()).unwrap()
}

async fn send(req: Request<Body>) -> (StatusCode, String, Value) {
    let resp = app().await.oneshot(req).await.unwrap();
    let status = resp.status();
    let content_type = resp
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, content_type, json)
}

async fn get(uri: &str) -> (StatusCode, String, Value) {
    send(Request::get(uri).body(Body::empty()).unwrap()).await
}

async fn with_json(method: &str, uri: &str, body: Value) -> (StatusCode, String, Value) {
    send(
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
}

fn person() -> Value {
    json!({
        "first_name": "Facundo",
        "last_name": "García Martoni",
        "age": 21,
        "hair_color": "blonde",
        "is_married": false,
        "email": "facundo@example.com",
        "birthday": "2003-04-12",
        "credit_card": "4111111111111111",
        "password": "holasoyfacundo"
    })
}

fn location() -> Value {
    json!({"city": "Guadalajara", "state": "Jalisco", "country": "México"})
}

/// Assert a 422 problem whose errors include `pointer`.
fn assert_rejected(res: (StatusCode, String, Value), pointer: &str) {
    let (status, content_type, body) = res;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{body}");
    assert_eq!(content_type, "application/problem+json");
    assert_eq!(body["code"], "VALIDATION_ERROR");
    let pointers: Vec<&str> = body["errors"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|e| e["pointer"].as_str())
        .collect();
    assert!(pointers.contains(&pointer), "expected {pointer} in {pointers:?}");
}

#[tokio::test]
async fn home_says_hola() {
    let (status, _, body) = get("/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"Hola": "mundo"}));
}

#[tokio::test]
async fn create_person_hides_password() {
    let (status, _, body) = with_json("POST", "/person/new", person()).await;
    assert_eq!(status, StatusCode::OK);

    let mut expected = person();
    expected.as_object_mut().unwrap().remove("password");
    assert_eq!(body, expected);
}

#[tokio::test]
async fn create_person_fills_defaults() {
    let body = json!({
        "first_name": "Ana",
        "last_name": "Lopez",
        "age": 115,
        "password": "supersecret"
    });
    let (status, _, body) = with_json("POST", "/person/new", body).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["birthday"], "2000-01-01");
    assert_eq!(body["hair_color"], Value::Null);
    assert_eq!(body["email"], Value::Null);
    assert!(body.get("password").is_none());
}

#[tokio::test]
async fn create_person_rejects_bad_fields() {
    let cases = [
        ("age", json!(0)),
        ("age", json!(116)),
        ("age", json!(-5)),
        ("hair_color", json!("green")),
        ("email", json!("not-an-email")),
        ("birthday", json!("2999-01-01")),
        ("credit_card", json!("1234567812345678")),
        ("password", json!("short")),
        ("first_name", json!("x".repeat(51))),
        ("last_name", json!("")),
    ];

    for (field, value) in cases {
        let mut body = person();
        body[field] = value;
        assert_rejected(
            with_json("POST", "/person/new", body).await,
            &format!("/body/{field}"),
        );
    }
}

#[tokio::test]
async fn create_person_coerces_scalars() {
    let mut body = person();
    body["age"] = json!("30");
    body["is_married"] = json!("true");
    let (status, _, out) = with_json("POST", "/person/new", body).await;
    assert_eq!(status, StatusCode::OK, "{out}");
    assert_eq!(out["age"], 30);
    assert_eq!(out["is_married"], true);

    let mut body = person();
    body["age"] = json!(30.0);
    let (status, _, out) = with_json("POST", "/person/new", body).await;
    assert_eq!(status, StatusCode::OK, "{out}");
    assert_eq!(out["age"], 30);

    let mut body = person();
    body["age"] = json!("0");
    assert_rejected(with_json("POST", "/person/new", body).await, "/body/age");

    let mut body = person();
    body["age"] = json!("thirty");
    assert_rejected(with_json("POST", "/person/new", body).await, "/body/age");
}

#[tokio::test]
async fn create_person_requires_fields() {
    let mut body = person();
    body.as_object_mut().unwrap().remove("password");
    assert_rejected(with_json("POST", "/person/new", body).await, "/body/password");
}

#[tokio::test]
async fn create_person_needs_json_content_type() {
    let req = Request::post("/person/new")
        .body(Body::from(person().to_string()))
        .unwrap();
    assert_rejected(send(req).await, "/body");
}

#[tokio::test]
async fn show_person_from_query() {
    let (status, _, body) = get("/person/detail?age=34").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"name": null, "age": 34}));

    let (status, _, body) = get("/person/detail?name=Roc%C3%ADo&age=25").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"name": "Rocío", "age": 25}));
}

#[tokio::test]
async fn show_person_query_rejections() {
    assert_rejected(get("/person/detail").await, "/query/age");
    assert_rejected(get("/person/detail?age=abc").await, "/query/age");
    assert_rejected(get("/person/detail?name=&age=3").await, "/query/name");

    let long = "x".repeat(51);
    assert_rejected(
        get(&format!("/person/detail?name={long}&age=3")).await,
        "/query/name",
    );
}

#[tokio::test]
async fn show_person_by_id() {
    let (status, _, body) = get("/person/details/7").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"7": "It exists"}));

    assert_rejected(get("/person/details/0").await, "/path/person_id");
    assert_rejected(get("/person/details/-1").await, "/path/person_id");
    assert_rejected(get("/person/details/abc").await, "/path/person_id");
}

#[tokio::test]
async fn update_location_echoes_body() {
    let (status, _, body) = with_json("PUT", "/person/details/3", location()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, location());

    assert_rejected(
        with_json("PUT", "/person/details/0", location()).await,
        "/path/person_id",
    );
    assert_rejected(
        with_json("PUT", "/person/details/3", json!({"city": "x", "state": "y"})).await,
        "/body/country",
    );
}

#[tokio::test]
async fn update_person_merges_location_over_person() {
    let req = json!({"person": person(), "location": location()});
    let (status, _, body) = with_json("PUT", "/person/9", req).await;
    assert_eq!(status, StatusCode::OK);

    for (key, value) in location().as_object().unwrap() {
        assert_eq!(&body[key], value);
    }
    assert_eq!(body["first_name"], "Facundo");
    assert_eq!(body["age"], 21);
    assert_eq!(body["password"], "holasoyfacundo");
    assert_eq!(body.as_object().unwrap().len(), 12);
}

#[tokio::test]
async fn update_person_reports_nested_pointers() {
    let mut p = person();
    p["age"] = json!(200);
    let req = json!({"person": p, "location": location()});
    assert_rejected(with_json("PUT", "/person/9", req).await, "/body/person/age");

    let mut p = person();
    p["hair_color"] = json!("purple");
    let req = json!({"person": p, "location": location()});
    assert_rejected(
        with_json("PUT", "/person/9", req).await,
        "/body/person/hair_color",
    );

    let req = json!({"person": person()});
    assert_rejected(with_json("PUT", "/person/9", req).await, "/body/location");
}

#[tokio::test]
async fn rejection_carries_request_id() {
    let req = Request::get("/person/details/0")
        .header("x-request-id", "req-42")
        .body(Body::empty())
        .unwrap();
    let resp = app().await.oneshot(req).await.unwrap();
    assert_eq!(resp.headers()["x-request-id"], "req-42");

    let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    let problem: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(problem["request_id"], "req-42");
    assert_eq!(problem["instance"], "/person/details/0");
}

#[tokio::test]
async fn openapi_lists_people_operations() {
    let (status, _, doc) = get("/openapi.json").await;
    assert_eq!(status, StatusCode::OK);

    let ops = [
        ("/", "get", "people.home"),
        ("/person/new", "post", "people.create_person"),
        ("/person/detail", "get", "people.show_person"),
        ("/person/details/{person_id}", "get", "people.show_person_by_id"),
        ("/person/details/{person_id}", "put", "people.update_location"),
        ("/person/{person_id}", "put", "people.update_person"),
    ];
    for (path, method, id) in ops {
        assert_eq!(doc["paths"][path][method]["operationId"], id, "{method} {path}");
    }

    let params = doc["paths"]["/person/detail"]["get"]["parameters"]
        .as_array()
        .unwrap();
    let age = params.iter().find(|p| p["name"] == "age").unwrap();
    assert_eq!(age["in"], "query");
    assert_eq!(age["required"], true);
    assert_eq!(age["schema"]["type"], "integer");

    let schemas = &doc["components"]["schemas"];
    for name in ["Person", "PersonOut", "Location", "HairColor", "Problem", "UpdatePersonReq"] {
        assert!(schemas[name].is_object(), "missing schema {name}");
    }
    let person = &schemas["Person"];
    assert!(person.get("example").or_else(|| person.get("examples")).is_some());
    assert!(schemas["PersonOut"]["properties"].get("password").is_none());
}
