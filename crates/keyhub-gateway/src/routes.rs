//! API route handlers for the gateway.
//!
//! Every response body is `{"ok": true, ...}` or `{"ok": false, "error": CODE}`.

use axum::{
    Json,
    extract::{
        Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use keyhub_core::error::KeyHubError;
use keyhub_platform::{accounts, licensing};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;

use super::server::AppState;

type Body = std::result::Result<Json<Value>, JsonRejection>;

fn status_for(e: &KeyHubError) -> StatusCode {
    match e {
        KeyHubError::UserNotFound | KeyHubError::ClientNotFound => StatusCode::NOT_FOUND,
        KeyHubError::Unauthorized => StatusCode::UNAUTHORIZED,
        KeyHubError::Forbidden => StatusCode::FORBIDDEN,
        e if e.is_client_error() => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Render a categorical error.
pub(crate) fn error_response(e: KeyHubError) -> Response {
    let status = status_for(&e);
    if status.is_server_error() {
        tracing::error!("Request failed: {e}");
    }
    (status, Json(json!({"ok": false, "error": e.code()}))).into_response()
}

fn respond(result: keyhub_core::Result<Value>) -> Response {
    match result {
        Ok(body) => Json(body).into_response(),
        Err(e) => error_response(e),
    }
}

/// A malformed or missing JSON body is treated as having no fields.
fn body_value(body: Body) -> Value {
    match body {
        Ok(Json(v)) => v,
        Err(rejection) => {
            tracing::debug!("Ignoring unreadable JSON body: {rejection}");
            Value::Null
        }
    }
}

/// `max_devices` from a request body: `None` when absent, an error when not an integer.
fn max_devices_field(body: &Value) -> keyhub_core::Result<Option<i64>> {
    match body.get("max_devices") {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v.as_i64().map(Some).ok_or(KeyHubError::InvalidMaxDevices),
    }
}

/// Unparseable query parameters read as missing ones.
fn query_params<T>(query: std::result::Result<Query<T>, QueryRejection>) -> keyhub_core::Result<T> {
    query.map(|Query(params)| params).map_err(|rejection| {
        tracing::debug!("Rejecting query string: {rejection}");
        KeyHubError::MissingFields
    })
}

fn field(body: &Value, name: &str) -> String {
    body.get(name).and_then(Value::as_str).unwrap_or_default().to_string()
}

/// Health check endpoint.
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "keyhub",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": state.start_time.elapsed().as_secs(),
    }))
}

// ── Accounts ────────────────────────────────────

pub async fn register(State(state): State<Arc<AppState>>, body: Body) -> Response {
    let body = body_value(body);
    let (email, password, key) = (field(&body, "email"), field(&body, "password"), field(&body, "license_key"));
    let cost = state.config.auth.bcrypt_cost;

    respond(state.with_db(move |db| {
        accounts::register(db, &email, &password, &key, cost)?;
        Ok(json!({"ok": true}))
    }).await)
}

pub async fn login(State(state): State<Arc<AppState>>, body: Body) -> Response {
    let body = body_value(body);
    let (email, password) = (field(&body, "email"), field(&body, "password"));
    let tokens = state.tokens.clone();

    respond(state.with_db(move |db| {
        let session = accounts::login(db, &tokens, &email, &password)?;
        Ok(json!({"ok": true, "user_id": session.user_id, "token": session.token}))
    }).await)
}

// ── Licenses ────────────────────────────────────

pub async fn activate(State(state): State<Arc<AppState>>, body: Body) -> Response {
    let body = body_value(body);
    let (key, machine, email) = (field(&body, "license_key"), field(&body, "machine_id"), field(&body, "email"));

    respond(state.with_db(move |db| {
        let outcome = licensing::activate(db, &key, &machine, &email)?;
        Ok(json!({"ok": true, "message": outcome.code()}))
    }).await)
}

#[derive(Debug, Deserialize)]
pub struct StatusParams {
    pub license_key: Option<String>,
    pub machine_id: Option<String>,
}

pub async fn license_status(
    State(state): State<Arc<AppState>>,
    query: std::result::Result<Query<StatusParams>, QueryRejection>,
) -> Response {
    let params = match query_params(query) {
        Ok(params) => params,
        Err(e) => return error_response(e),
    };
    let (Some(key), Some(machine)) = (params.license_key, params.machine_id) else {
        return error_response(KeyHubError::MissingFields);
    };

    respond(state.with_db(move |db| {
        let active = licensing::status(db, &key, &machine)?;
        Ok(json!({"ok": true, "active": active}))
    }).await)
}

// ── Admin ────────────────────────────────────

pub async fn create_license(State(state): State<Arc<AppState>>, body: Body) -> Response {
    let body = body_value(body);
    let key = field(&body, "license_key");
    let max_devices = match max_devices_field(&body) {
        Ok(n) => n.unwrap_or(1),
        Err(e) => return error_response(e),
    };

    respond(state.with_db(move |db| {
        licensing::create_license(db, &key, max_devices)?;
        Ok(json!({"ok": true}))
    }).await)
}

pub async fn list_licenses(State(state): State<Arc<AppState>>) -> Response {
    respond(state.with_db(|db| {
        let data = licensing::list_licenses(db)?;
        Ok(json!({"ok": true, "data": data}))
    }).await)
}

pub async fn list_users(State(state): State<Arc<AppState>>) -> Response {
    respond(state.with_db(|db| {
        use keyhub_platform::Queries;
        let data = db.list_users()?;
        Ok(json!({"ok": true, "data": data}))
    }).await)
}

pub async fn delete_user(State(state): State<Arc<AppState>>, body: Body) -> Response {
    let body = body_value(body);
    let email = field(&body, "email");

    respond(state.with_db(move |db| {
        licensing::delete_user(db, &email)?;
        Ok(json!({"ok": true, "message": format!("User {email} and their licenses deleted")}))
    }).await)
}

/// Provision a client, then email its key. Mail failures do not fail the request.
pub async fn create_client(State(state): State<Arc<AppState>>, body: Body) -> Response {
    let body = body_value(body);
    let (email, name) = (field(&body, "email"), field(&body, "name"));
    let max_devices = match max_devices_field(&body) {
        Ok(n) => n,
        Err(e) => return error_response(e),
    };
    let licensing_cfg = state.config.licensing.clone();

    let provisioned = state.with_db(move |db| {
        accounts::provision_client(db, &licensing_cfg, &email, &name, max_devices)
    }).await;

    let client = match provisioned {
        Ok(client) => client,
        Err(e) => return error_response(e),
    };

    let email_sent = keyhub_channels::deliver_license_key(
        state.mailer.as_ref(),
        &client.email,
        &client.name,
        &client.license_key,
    ).await;

    Json(json!({"ok": true, "license_key": client.license_key, "email_sent": email_sent})).into_response()
}

pub async fn list_clients(State(state): State<Arc<AppState>>) -> Response {
    respond(state.with_db(|db| {
        let data = accounts::list_clients(db)?;
        Ok(json!({"ok": true, "data": data}))
    }).await)
}

pub async fn set_client_status(State(state): State<Arc<AppState>>, body: Body) -> Response {
    let body = body_value(body);
    let email = field(&body, "email");
    let Some(is_active) = body.get("is_active").and_then(Value::as_bool) else {
        return error_response(KeyHubError::MissingFields);
    };

    respond(state.with_db(move |db| {
        accounts::set_client_active(db, &email, is_active)?;
        Ok(json!({"ok": true}))
    }).await)
}

#[derive(Debug, Deserialize)]
pub struct EventsParams {
    pub limit: Option<usize>,
}

pub async fn recent_events(
    State(state): State<Arc<AppState>>,
    query: std::result::Result<Query<EventsParams>, QueryRejection>,
) -> Response {
    let params = match query_params(query) {
        Ok(params) => params,
        Err(e) => return error_response(e),
    };
    let limit = params.limit.unwrap_or(100).min(1000);
    respond(state.with_db(move |db| {
        use keyhub_platform::Queries;
        let events = db.recent_events(limit)?;
        Ok(json!({"ok": true, "events": events}))
    }).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::{AppState, build_router};
    use async_trait::async_trait;
    use axum::Router;
    use axum::body::Body as HttpBody;
    use axum::http::{Method, Request, header};
    use keyhub_core::config::KeyHubConfig;
    use keyhub_core::traits::Mailer;
    use keyhub_platform::LicenseDb;
    use std::sync::Mutex;
    use tower::ServiceExt;

    #[derive(Default)]
    struct RecordingMailer {
        sent: Mutex<Vec<(String, String)>>,
        fail: bool,
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        fn name(&self) -> &str {
            "recording"
        }

        async fn send_license_key(&self, to: &str, _name: &str, key: &str) -> keyhub_core::Result<()> {
            if self.fail {
                return Err(KeyHubError::email("smtp down"));
            }
            self.sent.lock().unwrap().push((to.to_string(), key.to_string()));
            Ok(())
        }
    }

    struct Harness {
        app: Router,
        state: AppState,
        mailer: Arc<RecordingMailer>,
    }

    fn harness_with(mailer: RecordingMailer) -> Harness {
        let mut config = KeyHubConfig::default();
        config.auth.jwt_secret = "test-secret".into();
        config.auth.bcrypt_cost = 4;
        let mailer = Arc::new(mailer);
        let state = AppState::new(LicenseDb::open_in_memory().unwrap(), config, mailer.clone());
        Harness { app: build_router(state.clone()), state, mailer }
    }

    fn harness() -> Harness {
        harness_with(RecordingMailer::default())
    }

    async fn send(app: Router, method: Method, uri: &str, body: Option<Value>, token: Option<&str>) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            req = req.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let req = match body {
            Some(b) => req
                .header(header::CONTENT_TYPE, "application/json")
                .body(HttpBody::from(b.to_string())),
            None => req.body(HttpBody::empty()),
        }
        .unwrap();

        let resp = app.oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    impl Harness {
        async fn call(&self, method: Method, uri: &str, body: Option<Value>, token: Option<&str>) -> (StatusCode, Value) {
            send(self.app.clone(), method, uri, body, token).await
        }

        async fn admin_token(&self) -> String {
            let cost = self.state.config.auth.bcrypt_cost;
            self.state
                .with_db(move |db| accounts::create_admin(db, "ops@example.com", "admin-pw", cost))
                .await
                .unwrap();
            let (status, body) = self
                .call(Method::POST, "/api/login", Some(json!({"email": "ops@example.com", "password": "admin-pw"})), None)
                .await;
            assert_eq!(status, StatusCode::OK);
            body["token"].as_str().unwrap().to_string()
        }

        /// Provision a client and register it as a user. Returns the license key.
        async fn registered_user(&self, admin: &str, email: &str) -> String {
            let (_, body) = self
                .call(Method::POST, "/api/admin/clients", Some(json!({"email": email, "name": "Test"})), Some(admin))
                .await;
            let key = body["license_key"].as_str().unwrap().to_string();
            let (status, body) = self
                .call(Method::POST, "/api/register", Some(json!({"email": email, "password": "pw", "license_key": key})), None)
                .await;
            assert_eq!(status, StatusCode::OK, "{body}");
            key
        }
    }

    #[tokio::test]
    async fn test_health_check() {
        let h = harness();
        let (status, json) = h.call(Method::GET, "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn test_admin_routes_require_admin_token() {
        let h = harness();
        let (status, json) = h.call(Method::GET, "/api/admin/licenses", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(json["error"], "UNAUTHORIZED");

        let (status, _) = h.call(Method::GET, "/api/admin/licenses", None, Some("garbage")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let user_token = h.state.tokens.create_token("u1", "u@example.com", "user").unwrap();
        let (status, json) = h.call(Method::GET, "/api/admin/licenses", None, Some(&user_token)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(json["error"], "FORBIDDEN");
    }

    #[tokio::test]
    async fn test_activation_flow_over_http() {
        let h = harness();
        let admin = h.admin_token().await;
        let key = h.registered_user(&admin, "user@example.com").await;

        let activate = |machine: &str| json!({"license_key": key, "machine_id": machine, "email": "user@example.com"});

        let (status, json) = h.call(Method::POST, "/api/licenses/activate", Some(activate("A")), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["message"], "LICENSE_ACTIVATED");

        let (_, json) = h.call(Method::POST, "/api/licenses/activate", Some(activate("A")), None).await;
        assert_eq!(json["message"], "ALREADY_ACTIVATED");

        let (status, json) = h.call(Method::POST, "/api/licenses/activate", Some(activate("B")), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["ok"], false);
        assert_eq!(json["error"], "MAX_DEVICES_REACHED");

        let uri = format!("/api/licenses/status?license_key={key}&machine_id=A");
        let (_, json) = h.call(Method::GET, &uri, None, None).await;
        assert_eq!(json["active"], true);
        let uri = format!("/api/licenses/status?license_key={key}&machine_id=B");
        let (_, json) = h.call(Method::GET, &uri, None, None).await;
        assert_eq!(json["active"], false);
    }

    #[tokio::test]
    async fn test_status_errors() {
        let h = harness();
        let (status, json) = h.call(Method::GET, "/api/licenses/status?license_key=NOPE&machine_id=A", None, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "INVALID_LICENSE");

        let (_, json) = h.call(Method::GET, "/api/licenses/status?machine_id=A", None, None).await;
        assert_eq!(json["error"], "MISSING_FIELDS");
    }

    #[tokio::test]
    async fn test_activate_unknown_user_and_missing_body() {
        let h = harness();
        let body = json!({"license_key": "K", "machine_id": "A", "email": "ghost@example.com"});
        let (_, json) = h.call(Method::POST, "/api/licenses/activate", Some(body), None).await;
        assert_eq!(json["error"], "UNKNOWN_USER");

        let (status, json) = h.call(Method::POST, "/api/licenses/activate", None, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "MISSING_FIELDS");
    }

    #[tokio::test]
    async fn test_admin_license_crud() {
        let h = harness();
        let admin = h.admin_token().await;

        let body = json!({"license_key": "ADMIN-KEY", "max_devices": 2});
        let (status, _) = h.call(Method::POST, "/api/admin/licenses", Some(body.clone()), Some(&admin)).await;
        assert_eq!(status, StatusCode::OK);
        let (_, json) = h.call(Method::POST, "/api/admin/licenses", Some(body), Some(&admin)).await;
        assert_eq!(json["error"], "LICENSE_EXISTS");

        let (_, json) = h
            .call(Method::POST, "/api/admin/licenses", Some(json!({"license_key": "Z", "max_devices": 0})), Some(&admin))
            .await;
        assert_eq!(json["error"], "INVALID_MAX_DEVICES");

        let (_, json) = h.call(Method::GET, "/api/admin/licenses", None, Some(&admin)).await;
        let data = json["data"].as_array().unwrap();
        assert_eq!(data.len(), 1);
        assert_eq!(data[0]["license_key"], "ADMIN-KEY");
        assert_eq!(data[0]["max_devices"], 2);
        assert!(data[0]["email"].is_null());
    }

    #[tokio::test]
    async fn test_non_integer_max_devices_rejected() {
        let h = harness();
        let admin = h.admin_token().await;

        for bad in [json!("3"), json!(2.5), json!(true)] {
            let body = json!({"license_key": "BAD-SEATS", "max_devices": bad});
            let (status, json) = h.call(Method::POST, "/api/admin/licenses", Some(body), Some(&admin)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(json["error"], "INVALID_MAX_DEVICES");

            let body = json!({"email": "c@example.com", "name": "C", "max_devices": bad});
            let (status, json) = h.call(Method::POST, "/api/admin/clients", Some(body), Some(&admin)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(json["error"], "INVALID_MAX_DEVICES");
        }

        let (_, json) = h.call(Method::GET, "/api/admin/licenses", None, Some(&admin)).await;
        assert!(json["data"].as_array().unwrap().is_empty());
        let (_, json) = h.call(Method::GET, "/api/admin/clients", None, Some(&admin)).await;
        assert!(json["data"].as_array().unwrap().is_empty());
        assert!(h.mailer.sent.lock().unwrap().is_empty());

        // Absent means the default.
        let (_, json) = h
            .call(Method::POST, "/api/admin/clients", Some(json!({"email": "c@example.com", "name": "C"})), Some(&admin))
            .await;
        let key = json["license_key"].as_str().unwrap().to_string();
        let (_, json) = h.call(Method::GET, "/api/admin/licenses", None, Some(&admin)).await;
        assert_eq!(json["data"][0]["license_key"], key.as_str());
        assert_eq!(json["data"][0]["max_devices"], 1);
    }

    #[tokio::test]
    async fn test_bad_query_string_keeps_json_envelope() {
        let h = harness();
        let admin = h.admin_token().await;
        let (status, json) = h.call(Method::GET, "/api/admin/events?limit=abc", None, Some(&admin)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["ok"], false);
        assert_eq!(json["error"], "MISSING_FIELDS");

        let (status, json) = h.call(Method::GET, "/api/admin/events?limit=-1", None, Some(&admin)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "MISSING_FIELDS");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_parallel_activations_respect_max_devices() {
        let h = harness();
        let admin = h.admin_token().await;
        let key = h.registered_user(&admin, "user@example.com").await;

        let mut handles = Vec::new();
        for i in 0..32 {
            let app = h.app.clone();
            let body = json!({"license_key": key, "machine_id": format!("m{i}"), "email": "user@example.com"});
            handles.push(tokio::spawn(async move {
                send(app, Method::POST, "/api/licenses/activate", Some(body), None).await
            }));
        }

        let mut activated = 0;
        for handle in handles {
            let (status, json) = handle.await.unwrap();
            if json["message"] == "LICENSE_ACTIVATED" {
                activated += 1;
            } else {
                assert_eq!(status, StatusCode::BAD_REQUEST);
                assert_eq!(json["error"], "MAX_DEVICES_REACHED");
            }
        }
        assert_eq!(activated, 1);

        let devices = h
            .state
            .with_db(move |db| {
                use keyhub_platform::Queries;
                Ok(db.license_by_key(&key)?.map(|l| l.devices).unwrap_or_default())
            })
            .await
            .unwrap();
        assert_eq!(devices.len(), 1);
    }

    #[tokio::test]
    async fn test_delete_user_without_email() {
        let h = harness();
        let admin = h.admin_token().await;
        for body in [json!({}), json!({"email": ""})] {
            let (status, json) = h.call(Method::DELETE, "/api/admin/users", Some(body), Some(&admin)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(json["error"], "MISSING_FIELDS");
        }
    }

    #[tokio::test]
    async fn test_provisioning_sends_email() {
        let h = harness();
        let admin = h.admin_token().await;
        let (status, json) = h
            .call(Method::POST, "/api/admin/clients", Some(json!({"email": "c@example.com", "name": "C"})), Some(&admin))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["email_sent"], true);

        let sent = h.mailer.sent.lock().unwrap().clone();
        assert_eq!(sent, vec![("c@example.com".to_string(), json["license_key"].as_str().unwrap().to_string())]);

        let (_, json) = h
            .call(Method::POST, "/api/admin/clients", Some(json!({"email": "c@example.com", "name": "C"})), Some(&admin))
            .await;
        assert_eq!(json["error"], "CLIENT_EXISTS");
    }

    #[tokio::test]
    async fn test_email_failure_does_not_fail_provisioning() {
        let h = harness_with(RecordingMailer { fail: true, ..Default::default() });
        let admin = h.admin_token().await;
        let (status, json) = h
            .call(Method::POST, "/api/admin/clients", Some(json!({"email": "c@example.com", "name": "C"})), Some(&admin))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["ok"], true);
        assert_eq!(json["email_sent"], false);

        let (_, json) = h.call(Method::GET, "/api/admin/clients", None, Some(&admin)).await;
        assert_eq!(json["data"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_register_errors() {
        let h = harness();
        let admin = h.admin_token().await;
        let key = h.registered_user(&admin, "u@example.com").await;

        let (_, json) = h
            .call(Method::POST, "/api/register", Some(json!({"email": "u@example.com", "password": "pw", "license_key": key})), None)
            .await;
        assert_eq!(json["error"], "EMAIL_EXISTS");

        let (_, json) = h
            .call(Method::POST, "/api/register", Some(json!({"email": "x@example.com", "password": "pw", "license_key": key})), None)
            .await;
        assert_eq!(json["error"], "CLIENT_OR_LICENSE_INVALID");

        let (_, json) = h.call(Method::POST, "/api/register", Some(json!({"email": "x@example.com"})), None).await;
        assert_eq!(json["error"], "MISSING_FIELDS");
    }

    #[tokio::test]
    async fn test_deactivated_client_cannot_register() {
        let h = harness();
        let admin = h.admin_token().await;
        let (_, json) = h
            .call(Method::POST, "/api/admin/clients", Some(json!({"email": "c@example.com", "name": "C"})), Some(&admin))
            .await;
        let key = json["license_key"].as_str().unwrap().to_string();

        let (status, _) = h
            .call(Method::PUT, "/api/admin/clients/status", Some(json!({"email": "c@example.com", "is_active": false})), Some(&admin))
            .await;
        assert_eq!(status, StatusCode::OK);

        let (_, json) = h
            .call(Method::POST, "/api/register", Some(json!({"email": "c@example.com", "password": "pw", "license_key": key})), None)
            .await;
        assert_eq!(json["error"], "CLIENT_OR_LICENSE_INVALID");

        let (status, json) = h
            .call(Method::PUT, "/api/admin/clients/status", Some(json!({"email": "nobody@example.com", "is_active": true})), Some(&admin))
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"], "CLIENT_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_login_and_delete_user() {
        let h = harness();
        let admin = h.admin_token().await;
        let key = h.registered_user(&admin, "u@example.com").await;

        let (status, json) = h
            .call(Method::POST, "/api/login", Some(json!({"email": "u@example.com", "password": "pw"})), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert!(json["user_id"].is_string());

        let (_, json) = h
            .call(Method::POST, "/api/login", Some(json!({"email": "u@example.com", "password": "nope"})), None)
            .await;
        assert_eq!(json["error"], "INVALID_CREDENTIALS");

        let (status, _) = h
            .call(Method::DELETE, "/api/admin/users", Some(json!({"email": "u@example.com"})), Some(&admin))
            .await;
        assert_eq!(status, StatusCode::OK);

        let uri = format!("/api/licenses/status?license_key={key}&machine_id=A");
        let (_, json) = h.call(Method::GET, &uri, None, None).await;
        assert_eq!(json["error"], "INVALID_LICENSE");

        let (status, json) = h
            .call(Method::DELETE, "/api/admin/users", Some(json!({"email": "u@example.com"})), Some(&admin))
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"], "USER_NOT_FOUND");

        let (_, json) = h.call(Method::GET, "/api/admin/users", None, Some(&admin)).await;
        let users = json["data"].as_array().unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0]["email"], "ops@example.com");
        assert!(users[0].get("password_hash").is_none());

        let (_, json) = h.call(Method::GET, "/api/admin/events?limit=1", None, Some(&admin)).await;
        assert_eq!(json["events"][0]["event_type"], "user_deleted");
    }
}
