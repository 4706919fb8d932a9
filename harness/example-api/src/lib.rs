//! A small in-memory user service used to exercise golden tests end to end.
//!
//! The routes mirror a typical JSON API: health probes, user creation and an
//! upserting `PUT`. [`ExampleApi`] implements [`Handler`] directly and
//! [`router`] exposes the same routes as an axum `Router`.

use std::{collections::BTreeMap, sync::Arc};

use axum::{
    Router,
    body::Body,
    extract::{Request, State},
};
use bytes::Bytes;
use http::{
    HeaderValue, Method, Response, StatusCode,
    header::{CONTENT_TYPE, X_CONTENT_TYPE_OPTIONS},
};
use http_golden::{Error, Handler};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

const JSON: &str = "application/json";
const TEXT: &str = "text/plain; charset=utf-8";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Deserialize)]
struct UserInput {
    name: String,
}

#[derive(Debug, Serialize)]
struct Created {
    id: u64,
    created_time: i64,
}

#[derive(Debug, Default, Deserialize)]
struct UserQuery {
    typ: Option<String>,
}

#[derive(Debug, Default)]
struct Users {
    by_id: BTreeMap<u64, User>,
    last_id: u64,
}

#[derive(Debug, Default)]
pub struct ExampleApi {
    users: RwLock<Users>,
}

impl ExampleApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn user(&self, id: u64) -> Option<User> {
        self.users.read().by_id.get(&id).cloned()
    }

    pub fn route(&self, request: http::Request<Bytes>) -> Response<Bytes> {
        debug!(method = %request.method(), uri = %request.uri(), "example api request");
        let path = request.uri().path().trim_matches('/').to_string();
        let segments: Vec<&str> = path.split('/').collect();
        match segments.as_slice() {
            ["v1", "health"] => json_static(r#"{"hoge":"fuga"}"#),
            ["v2", "health"] => json_static(r#"{"ping":"pong"}"#),
            ["v1", "user"] if request.method() == Method::POST => {
                self.create_user(request.body())
            }
            ["v1", "user"] => method_not_allowed(),
            ["v1", "user", id] => {
                let Ok(id) = id.parse::<u64>() else {
                    return not_found();
                };
                if request.method() == Method::GET {
                    self.get_user(id, request.uri().query())
                } else if request.method() == Method::PUT {
                    self.put_user(id, request.body())
                } else {
                    method_not_allowed()
                }
            }
            _ => not_found(),
        }
    }

    fn create_user(&self, body: &[u8]) -> Response<Bytes> {
        let Ok(input) = serde_json::from_slice::<UserInput>(body) else {
            return text(StatusCode::BAD_REQUEST, "Bad request");
        };
        let id = {
            let mut users = self.users.write();
            users.last_id += 1;
            let id = users.last_id;
            users.by_id.insert(
                id,
                User {
                    id,
                    name: input.name,
                },
            );
            id
        };
        json(
            StatusCode::CREATED,
            &Created {
                id,
                created_time: chrono::Utc::now().timestamp(),
            },
        )
    }

    fn get_user(&self, id: u64, query: Option<&str>) -> Response<Bytes> {
        let query: UserQuery = serde_urlencoded::from_str(query.unwrap_or_default())
            .unwrap_or_default();
        if query.typ.as_deref() == Some("exception") {
            return text(StatusCode::INTERNAL_SERVER_ERROR, "Server error");
        }
        match self.user(id) {
            Some(user) => json(StatusCode::OK, &user),
            None => not_found(),
        }
    }

    fn put_user(&self, id: u64, body: &[u8]) -> Response<Bytes> {
        let Ok(input) = serde_json::from_slice::<UserInput>(body) else {
            return text(StatusCode::BAD_REQUEST, "Bad request");
        };
        let mut users = self.users.write();
        users.last_id = users.last_id.max(id);
        users.by_id.insert(
            id,
            User {
                id,
                name: input.name,
            },
        );
        status_only(StatusCode::NO_CONTENT)
    }
}

impl Handler for ExampleApi {
    fn handle(&self, request: http::Request<Bytes>) -> Result<Response<Bytes>, Error> {
        Ok(self.route(request))
    }
}

/// The same routes served through axum.
pub fn router(api: Arc<ExampleApi>) -> Router {
    Router::new().fallback(serve).with_state(api)
}

async fn serve(State(api): State<Arc<ExampleApi>>, request: Request) -> Response<Body> {
    let (parts, body) = request.into_parts();
    let response = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(body) => api.route(http::Request::from_parts(parts, body)),
        Err(err) => {
            warn!(error = %err, "failed to read request body");
            text(StatusCode::BAD_REQUEST, "Bad request")
        }
    };
    response.map(Body::from)
}

fn status_only(status: StatusCode) -> Response<Bytes> {
    let mut response = Response::new(Bytes::new());
    *response.status_mut() = status;
    response
}

fn json_static(body: &'static str) -> Response<Bytes> {
    let mut response = Response::new(Bytes::from_static(body.as_bytes()));
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(JSON));
    response
}

fn json<T: Serialize>(status: StatusCode, value: &T) -> Response<Bytes> {
    match serde_json::to_vec(value) {
        Ok(body) => {
            let mut response = Response::new(Bytes::from(body));
            *response.status_mut() = status;
            response
                .headers_mut()
                .insert(CONTENT_TYPE, HeaderValue::from_static(JSON));
            response
        }
        Err(err) => {
            warn!(error = %err, "failed to encode response");
            text(StatusCode::INTERNAL_SERVER_ERROR, "Server error")
        }
    }
}

fn text(status: StatusCode, message: &str) -> Response<Bytes> {
    let mut response = Response::new(Bytes::from(format!("{message}\n")));
    *response.status_mut() = status;
    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(TEXT));
    headers.insert(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
    response
}

fn not_found() -> Response<Bytes> {
    text(StatusCode::NOT_FOUND, "404 page not found")
}

fn method_not_allowed() -> Response<Bytes> {
    text(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(method: Method, uri: &str, body: &str) -> http::Request<Bytes> {
        http::Request::builder()
            .method(method)
            .uri(uri)
            .body(Bytes::copy_from_slice(body.as_bytes()))
            .unwrap()
    }

    #[test]
    fn users_are_created_with_increasing_ids() {
        let api = ExampleApi::new();
        let first = api.route(request(Method::POST, "/v1/user", r#"{"name":"JoJo"}"#));
        let second = api.route(request(Method::POST, "/v1/user", r#"{"name":"Dio"}"#));
        assert_eq!(first.status(), StatusCode::CREATED);
        assert_eq!(second.status(), StatusCode::CREATED);
        assert_eq!(api.user(2).unwrap().name, "Dio");

        let body: serde_json::Value = serde_json::from_slice(second.body()).unwrap();
        assert_eq!(body["id"], 2);
        assert!(body["created_time"].as_i64().unwrap() > 0);
    }

    #[test]
    fn put_upserts_and_returns_bare_no_content() {
        let api = ExampleApi::new();
        let response = api.route(request(Method::PUT, "/v1/user/7", r#"{"name":"Jotaro"}"#));
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert!(response.headers().is_empty());
        assert!(response.body().is_empty());

        let created = api.route(request(Method::POST, "/v1/user", r#"{"name":"Josuke"}"#));
        let body: serde_json::Value = serde_json::from_slice(created.body()).unwrap();
        assert_eq!(body["id"], 8);
    }

    #[test]
    fn errors_are_plain_text() {
        let api = ExampleApi::new();

        let missing = api.route(request(Method::GET, "/v1/user/1", ""));
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
        assert_eq!(missing.body().as_ref(), b"404 page not found\n");

        let exception = api.route(request(Method::GET, "/v1/user/1?typ=exception", ""));
        assert_eq!(exception.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(exception.headers()[CONTENT_TYPE], TEXT);
        assert_eq!(exception.headers()[X_CONTENT_TYPE_OPTIONS], "nosniff");

        let wrong_method = api.route(request(Method::DELETE, "/v1/user", ""));
        assert_eq!(wrong_method.status(), StatusCode::METHOD_NOT_ALLOWED);

        let bad_body = api.route(request(Method::POST, "/v1/user", "{"));
        assert_eq!(bad_body.status(), StatusCode::BAD_REQUEST);
    }
}
