//! Validating extractors.
//!
//! `ValidJson`, `ValidQuery` and `ValidPath` deserialize their input with the
//! matching axum extractor and then run `validator::Validate`. Every failure
//! becomes a 422 `application/problem+json` response whose `errors` carry a
//! JSON pointer rooted at the input source: `/body/...`, `/query/...`, `/path/...`.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{FromRequest, FromRequestParts, Json, Path, Query, Request};
use axum::response::{IntoResponse, Response};
use http::request::Parts;
use serde::de::DeserializeOwned;
use validator::{Validate, ValidationErrors, ValidationErrorsKind};

use crate::api::problem::{self, Problem, ValidationError};

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Where a piece of input came from; names the pointer root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Body,
    Query,
    Path,
}

impl Source {
    fn root(self) -> &'static str {
        match self {
            Source::Body => "/body",
            Source::Query => "/query",
            Source::Path => "/path",
        }
    }

    fn pointer<'a>(self, segments: impl IntoIterator<Item = &'a str>) -> String {
        let mut out = self.root().to_string();
        for seg in segments {
            out.push('/');
            out.push_str(&seg.replace('~', "~0").replace('/', "~1"));
        }
        out
    }
}

/// Rejection produced by the validating extractors.
#[derive(Debug)]
pub struct InputRejection(pub Problem);

impl IntoResponse for InputRejection {
    fn into_response(self) -> Response {
        problem::ProblemResponse(self.0).into_response()
    }
}

impl InputRejection {
    fn unprocessable(errors: Vec<ValidationError>, uri_path: &str, headers: &http::HeaderMap) -> Self {
        tracing::debug!(path = %uri_path, ?errors, "request input rejected");
        let mut p = problem::unprocessable("Request validation failed", errors).0;
        p = p.with_instance(uri_path);
        if let Some(id) = headers
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
        {
            p = p.with_request_id(id);
        }
        Self(p)
    }
}

/// JSON body that passed both deserialization and `Validate`.
#[derive(Debug, Clone)]
pub struct ValidJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = InputRejection;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let uri_path = req.uri().path().to_string();
        let headers = req.headers().clone();

        let value = match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => value,
            Err(rejection) => return Err(json_rejection(rejection, &uri_path, &headers)),
        };
        value
            .validate()
            .map_err(|e| InputRejection::unprocessable(flatten(Source::Body, &e), &uri_path, &headers))?;
        Ok(Self(value))
    }
}

/// Query string that passed both deserialization and `Validate`.
#[derive(Debug, Clone)]
pub struct ValidQuery<T>(pub T);

impl<T, S> FromRequestParts<S> for ValidQuery<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = InputRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let value = match Query::<T>::from_request_parts(parts, state).await {
            Ok(Query(value)) => value,
            Err(rejection) => {
                let errors = vec![query_error(&rejection)];
                return Err(InputRejection::unprocessable(errors, parts.uri.path(), &parts.headers));
            }
        };
        value.validate().map_err(|e| {
            InputRejection::unprocessable(flatten(Source::Query, &e), parts.uri.path(), &parts.headers)
        })?;
        Ok(Self(value))
    }
}

/// Path parameters that passed both deserialization and `Validate`.
#[derive(Debug, Clone)]
pub struct ValidPath<T>(pub T);

impl<T, S> FromRequestParts<S> for ValidPath<T>
where
    T: DeserializeOwned + Validate + Send,
    S: Send + Sync,
{
    type Rejection = InputRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let value = match Path::<T>::from_request_parts(parts, state).await {
            Ok(Path(value)) => value,
            Err(rejection) => {
                let errors = vec![path_error(&rejection)];
                return Err(InputRejection::unprocessable(errors, parts.uri.path(), &parts.headers));
            }
        };
        value.validate().map_err(|e| {
            InputRejection::unprocessable(flatten(Source::Path, &e), parts.uri.path(), &parts.headers)
        })?;
        Ok(Self(value))
    }
}

fn json_rejection(rejection: JsonRejection, uri_path: &str, headers: &http::HeaderMap) -> InputRejection {
    let error = match &rejection {
        JsonRejection::JsonDataError(e) => {
            let message = std::error::Error::source(e)
                .map(|s| s.to_string())
                .unwrap_or_else(|| e.body_text());
            serde_error(Source::Body, &message)
        }
        JsonRejection::JsonSyntaxError(_) | JsonRejection::MissingJsonContentType(_) => {
            ValidationError::new(Source::Body.root(), rejection.body_text())
        }
        // Body could not be read at all (size limit, I/O): keep axum's status.
        _ => {
            let status = rejection.status();
            let title = status.canonical_reason().unwrap_or("Bad Request");
            return InputRejection(
                Problem::new(status, title, rejection.body_text()).with_instance(uri_path),
            );
        }
    };
    InputRejection::unprocessable(vec![error], uri_path, headers)
}

fn query_error(rejection: &QueryRejection) -> ValidationError {
    match rejection {
        QueryRejection::FailedToDeserializeQueryString(e) => {
            let message = std::error::Error::source(e)
                .map(|s| s.to_string())
                .unwrap_or_else(|| e.body_text());
            serde_error(Source::Query, &message)
        }
        other => ValidationError::new(Source::Query.root(), other.body_text()),
    }
}

fn path_error(rejection: &PathRejection) -> ValidationError {
    use axum::extract::path::ErrorKind;

    match rejection {
        PathRejection::FailedToDeserializePathParams(e) => {
            let key = match e.kind() {
                ErrorKind::ParseErrorAtKey { key, .. }
                | ErrorKind::InvalidUtf8InPathParam { key }
                | ErrorKind::DeserializeError { key, .. } => Some(key.as_str()),
                _ => None,
            };
            ValidationError::new(Source::Path.pointer(key), e.body_text())
        }
        other => ValidationError::new(Source::Path.root(), other.body_text()),
    }
}

/// Turn a serde message into a pointer + detail.
///
/// Handles the `path.to.field: message` prefix axum adds for data errors and
/// the `missing field `name`` message, which names the field itself.
fn serde_error(source: Source, message: &str) -> ValidationError {
    let message = strip_position(message);

    let (mut segments, detail) = match message.split_once(": ") {
        Some((".", rest)) => (Vec::new(), rest),
        Some((path, rest)) if is_field_path(path) => (split_path(path), rest),
        _ => (Vec::new(), message),
    };

    if let Some(field) = missing_field(detail) {
        segments.push(field.to_string());
    }

    ValidationError::new(
        source.pointer(segments.iter().map(String::as_str)),
        detail.to_string(),
    )
}

fn strip_position(message: &str) -> &str {
    match message.rfind(" at line ") {
        Some(idx) => &message[..idx],
        None => message,
    }
}

fn is_field_path(candidate: &str) -> bool {
    !candidate.is_empty()
        && candidate != "."
        && candidate
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '_' | '.' | '[' | ']' | '-' | '?'))
}

// "person.tags[1]" -> ["person", "tags", "1"]
fn split_path(path: &str) -> Vec<String> {
    path.split(['.', '[', ']'])
        .filter(|s| !s.is_empty() && *s != "?")
        .map(str::to_string)
        .collect()
}

fn missing_field(detail: &str) -> Option<&str> {
    detail
        .strip_prefix("missing field `")
        .and_then(|rest| rest.split_once('`'))
        .map(|(field, _)| field)
}

/// Flatten `validator` errors (nested structs and lists included) into pointer form.
pub fn flatten(source: Source, errors: &ValidationErrors) -> Vec<ValidationError> {
    let mut out = Vec::new();
    collect(source, &mut Vec::new(), errors, &mut out);
    out.sort_by(|a, b| a.pointer.cmp(&b.pointer));
    out
}

fn collect(
    source: Source,
    prefix: &mut Vec<String>,
    errors: &ValidationErrors,
    out: &mut Vec<ValidationError>,
) {
    for (field, kind) in errors.errors() {
        prefix.push(field.to_string());
        match kind {
            ValidationErrorsKind::Field(list) => {
                let pointer = source.pointer(prefix.iter().map(String::as_str));
                for e in list {
                    out.push(ValidationError::new(pointer.clone(), describe(e)));
                }
            }
            ValidationErrorsKind::Struct(inner) => collect(source, prefix, inner, out),
            ValidationErrorsKind::List(items) => {
                for (idx, inner) in items {
                    prefix.push(idx.to_string());
                    collect(source, prefix, inner, out);
                    prefix.pop();
                }
            }
        }
        prefix.pop();
    }
}

// "length: min=1, max=50"
fn describe(e: &validator::ValidationError) -> String {
    if let Some(message) = &e.message {
        return message.to_string();
    }
    let mut params: Vec<String> = e
        .params
        .iter()
        .filter(|(k, _)| k.as_ref() != "value")
        .map(|(k, v)| format!("{k}={v}"))
        .collect();
    params.sort();
    if params.is_empty() {
        e.code.to_string()
    } else {
        format!("{}: {}", e.code, params.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::routing::{get, post};
    use axum::Router;
    use http::StatusCode;
    use serde::Deserialize;
    use tower::ServiceExt;

    #[derive(Debug, Deserialize, Validate)]
    struct Inner {
        #[validate(range(min = 1, max = 10))]
        n: i64,
    }

    #[derive(Debug, Deserialize, Validate)]
    struct Outer {
        #[validate(length(min = 2))]
        name: String,
        #[validate(nested)]
        inner: Inner,
    }

    #[derive(Debug, Deserialize, Validate)]
    struct Q {
        #[validate(length(min = 1, max = 5))]
        name: Option<String>,
        age: i64,
    }

    #[derive(Debug, Deserialize, Validate)]
    struct P {
        #[validate(range(exclusive_min = 0))]
        id: i64,
    }

    fn app() -> Router {
        Router::new()
            .route(
                "/outer",
                post(|ValidJson(o): ValidJson<Outer>| async move { o.name }),
            )
            .route(
                "/q",
                get(|ValidQuery(q): ValidQuery<Q>| async move { q.age.to_string() }),
            )
            .route(
                "/p/{id}",
                get(|ValidPath(p): ValidPath<P>| async move { p.id.to_string() }),
            )
    }

    async fn call(req: http::Request<Body>) -> (StatusCode, serde_json::Value) {
        let resp = app().oneshot(req).await.unwrap();
        let status = resp.status();
        let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null))
    }

    fn post_json(body: &str) -> http::Request<Body> {
        http::Request::post("/outer")
            .header("content-type", "application/json")
            .header("x-request-id", "req-1")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_req(uri: &str) -> http::Request<Body> {
        http::Request::get(uri).body(Body::empty()).unwrap()
    }

    fn pointers(v: &serde_json::Value) -> Vec<String> {
        v["errors"]
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["pointer"].as_str().unwrap().to_string())
            .collect()
    }

    #[tokio::test]
    async fn valid_json_passes_through() {
        let resp = app()
            .oneshot(post_json(r#"{"name":"ok","inner":{"n":3}}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn constraint_failures_report_nested_pointers() {
        let (status, v) = call(post_json(r#"{"name":"x","inner":{"n":11}}"#)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(v["code"], "VALIDATION_ERROR");
        assert_eq!(v["instance"], "/outer");
        assert_eq!(v["request_id"], "req-1");
        assert_eq!(pointers(&v), vec!["/body/inner/n", "/body/name"]);
        let detail = v["errors"][0]["detail"].as_str().unwrap();
        assert!(detail.starts_with("range: "), "{detail}");
        assert!(!detail.contains("value="), "{detail}");
    }

    #[tokio::test]
    async fn missing_field_names_the_field() {
        let (status, v) = call(post_json(r#"{"name":"ok","inner":{}}"#)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(pointers(&v), vec!["/body/inner/n"]);
        let detail = v["errors"][0]["detail"].as_str().unwrap();
        assert!(detail.starts_with("missing field `n`"), "{detail}");
    }

    #[tokio::test]
    async fn wrong_type_points_at_field() {
        let (status, v) = call(post_json(r#"{"name":"ok","inner":{"n":"three"}}"#)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(pointers(&v), vec!["/body/inner/n"]);
    }

    #[tokio::test]
    async fn syntax_error_and_missing_content_type_point_at_body() {
        let (status, v) = call(post_json("{not json")).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(pointers(&v), vec!["/body"]);

        let req = http::Request::post("/outer")
            .body(Body::from(r#"{"name":"ok","inner":{"n":3}}"#))
            .unwrap();
        let (status, v) = call(req).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(pointers(&v), vec!["/body"]);
    }

    #[tokio::test]
    async fn query_missing_and_invalid_values() {
        let (status, _) = call(get_req("/q?age=3")).await;
        assert_eq!(status, StatusCode::OK);

        let (status, v) = call(get_req("/q?name=abc")).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(pointers(&v), vec!["/query/age"]);

        let (status, v) = call(get_req("/q?age=3&name=toolong")).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(pointers(&v), vec!["/query/name"]);
    }

    #[tokio::test]
    async fn path_parse_and_range_failures() {
        let (status, _) = call(get_req("/p/7")).await;
        assert_eq!(status, StatusCode::OK);

        let (status, v) = call(get_req("/p/abc")).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(pointers(&v), vec!["/path/id"]);

        let (status, v) = call(get_req("/p/0")).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(pointers(&v), vec!["/path/id"]);
    }

    #[test]
    fn serde_messages_become_pointers() {
        let e = serde_error(
            Source::Body,
            "person.hair_color: unknown variant `green`, expected one of `white`, `brown` at line 1 column 40",
        );
        assert_eq!(e.pointer, "/body/person/hair_color");
        assert_eq!(e.detail, "unknown variant `green`, expected one of `white`, `brown`");

        let e = serde_error(Source::Body, "invalid type: integer `1`, expected a string");
        assert_eq!(e.pointer, "/body");

        let e = serde_error(Source::Body, "items[2]: invalid length");
        assert_eq!(e.pointer, "/body/items/2");
    }

    #[test]
    fn pointer_segments_are_escaped() {
        assert_eq!(Source::Query.pointer(["a/b", "c~d"]), "/query/a~1b/c~0d");
    }
}
