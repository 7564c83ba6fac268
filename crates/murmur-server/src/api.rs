use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderValue, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use murmur_shared::constants::MSG_SEND_OK;
use murmur_shared::UserId;
use murmur_store::{Contact, SqliteBackend, UserDirectory};

use crate::auth::AuthService;
use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::registry::ConnectionRegistry;
use crate::relay::{HistoryEntry, RelayService};
use crate::ws;

#[derive(Clone)]
pub struct AppState {
    pub registry: ConnectionRegistry,
    pub relay: RelayService,
    pub auth: AuthService,
    pub directory: Arc<dyn UserDirectory>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    /// Wire every service to one SQLite backend and a fresh registry.
    pub fn new(config: ServerConfig, backend: SqliteBackend) -> Self {
        let registry = ConnectionRegistry::new();
        let directory: Arc<dyn UserDirectory> = Arc::new(backend.clone());
        Self {
            relay: RelayService::new(Arc::new(backend), registry.clone()),
            auth: AuthService::new(directory.clone(), config.bcrypt_cost),
            directory,
            registry,
            config: Arc::new(config),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let origin = match state.config.cors_origin.as_deref() {
        Some(origin) => match HeaderValue::from_str(origin) {
            Ok(value) => AllowOrigin::exact(value),
            Err(_) => {
                warn!(origin = %origin, "Invalid CORS_ORIGIN, allowing any origin");
                AllowOrigin::from(Any)
            }
        },
        None => AllowOrigin::from(Any),
    };
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/ping", get(ping))
        .route("/health", get(health_check))
        .route("/ws", get(ws::ws_upgrade))
        .route("/messages/send", post(send_message))
        .route("/messages/history", post(message_history))
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/allusers/:id", get(all_users))
        .route("/auth/setavatar/:id", post(set_avatar))
        .route("/auth/logout/:id", get(logout))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    name: String,
    version: &'static str,
    online: usize,
}

#[derive(Deserialize)]
struct SendRequest {
    #[serde(default)]
    from: UserId,
    #[serde(default)]
    to: UserId,
    #[serde(default)]
    message: String,
}

#[derive(Deserialize)]
struct HistoryRequest {
    #[serde(default)]
    from: UserId,
    #[serde(default)]
    to: UserId,
}

#[derive(Deserialize)]
struct RegisterRequest {
    #[serde(default)]
    username: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

#[derive(Deserialize)]
struct LoginRequest {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
}

#[derive(Deserialize)]
struct AvatarRequest {
    #[serde(default)]
    image: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AvatarResponse {
    is_set: bool,
    image: Option<String>,
}

async fn ping() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "msg": "Ping Successful" }))
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        name: state.config.instance_name.clone(),
        version: env!("CARGO_PKG_VERSION"),
        online: state.registry.online_count().await,
    })
}

async fn send_message(
    State(state): State<AppState>,
    Json(req): Json<SendRequest>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let outcome = state.relay.handle_send(req.from, req.to, req.message).await?;
    tracing::debug!(?outcome, "Message accepted via REST");
    Ok(Json(serde_json::json!({ "msg": MSG_SEND_OK })))
}

async fn message_history(
    State(state): State<AppState>,
    Json(req): Json<HistoryRequest>,
) -> Result<Json<Vec<HistoryEntry>>, ServerError> {
    let entries = state.relay.handle_history(req.from, req.to).await?;
    Ok(Json(entries))
}

async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ServerError> {
    let user = state
        .auth
        .register(req.username, req.email, req.password)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "status": true, "user": user })),
    ))
}

async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let user = state.auth.identify(req.username, req.password).await?;
    Ok(Json(serde_json::json!({ "status": true, "user": user })))
}

async fn all_users(
    State(state): State<AppState>,
    Path(id): Path<UserId>,
) -> Result<Json<Vec<Contact>>, ServerError> {
    let directory = state.directory.clone();
    let contacts = tokio::task::spawn_blocking(move || directory.list_others(&id))
        .await
        .map_err(|e| ServerError::Internal(e.to_string()))??;

    if contacts.is_empty() {
        return Err(ServerError::NotFound("No users found".into()));
    }
    Ok(Json(contacts))
}

async fn set_avatar(
    State(state): State<AppState>,
    Path(id): Path<UserId>,
    Json(req): Json<AvatarRequest>,
) -> Result<Json<AvatarResponse>, ServerError> {
    if req.image.is_empty() {
        return Err(ServerError::BadRequest("image is required".into()));
    }

    let directory = state.directory.clone();
    let user = tokio::task::spawn_blocking(move || directory.set_avatar(&id, &req.image))
        .await
        .map_err(|e| ServerError::Internal(e.to_string()))??;

    Ok(Json(AvatarResponse {
        is_set: user.is_avatar_image_set,
        image: user.avatar_image,
    }))
}

/// Drop the user's presence. The connection itself stays open.
async fn logout(
    State(state): State<AppState>,
    Path(id): Path<UserId>,
) -> Result<StatusCode, ServerError> {
    if !state.registry.remove(&id).await {
        return Err(ServerError::NotFound("User not found in online users".into()));
    }
    info!(user = %id, "Logged out");
    Ok(StatusCode::OK)
}

pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting HTTP server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::Request;
    use murmur_shared::protocol::ServerEvent;
    use murmur_store::Database;
    use tower::ServiceExt;

    use super::*;
    use crate::registry::tests::live_handle;

    fn test_state() -> AppState {
        let config = ServerConfig {
            bcrypt_cost: 4,
            ..ServerConfig::default()
        };
        AppState::new(config, SqliteBackend::new(Database::open_in_memory().unwrap()))
    }

    async fn call(
        state: &AppState,
        method: Method,
        uri: &str,
        body: Option<serde_json::Value>,
    ) -> (StatusCode, serde_json::Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = build_router(state.clone()).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    #[tokio::test]
    async fn ping_responds() {
        let (status, body) = call(&test_state(), Method::GET, "/ping", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["msg"], "Ping Successful");
    }

    #[tokio::test]
    async fn send_with_missing_field_is_bad_request() {
        let state = test_state();
        let (status, body) = call(
            &state,
            Method::POST,
            "/messages/send",
            Some(serde_json::json!({ "from": "a", "to": "b" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["msg"], "From, to, and message are required");
    }

    #[tokio::test]
    async fn send_then_history() {
        let state = test_state();
        let (status, body) = call(
            &state,
            Method::POST,
            "/messages/send",
            Some(serde_json::json!({ "from": "a", "to": "b", "message": "hi" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["msg"], MSG_SEND_OK);

        let (status, body) = call(
            &state,
            Method::POST,
            "/messages/history",
            Some(serde_json::json!({ "from": "b", "to": "a" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let entries = body.as_array().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0]["fromSelf"], false);
        assert_eq!(entries[0]["message"], "hi");
        assert!(entries[0]["createdAt"].is_string());
    }

    #[tokio::test]
    async fn history_requires_both_users() {
        let (status, _) = call(
            &test_state(),
            Method::POST,
            "/messages/history",
            Some(serde_json::json!({ "from": "a" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn rest_send_pushes_to_online_recipient() {
        let state = test_state();
        let (handle, _tx, mut rx) = live_handle();
        state.registry.register(UserId::new("b"), handle).await;

        let (status, _) = call(
            &state,
            Method::POST,
            "/messages/send",
            Some(serde_json::json!({ "from": "a", "to": "b", "message": "hi" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            rx.try_recv().unwrap(),
            ServerEvent::MessageReceived {
                from: UserId::new("a"),
                text: "hi".into()
            }
        );
    }

    #[tokio::test]
    async fn register_login_and_contacts() {
        let state = test_state();
        let (status, alice) = call(
            &state,
            Method::POST,
            "/auth/register",
            Some(serde_json::json!({
                "username": "alice",
                "email": "alice@example.org",
                "password": "password1"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(alice["status"], true);
        assert!(alice["user"].get("passwordHash").is_none());
        let alice_id = alice["user"]["id"].as_str().unwrap().to_string();

        let (status, _) = call(
            &state,
            Method::POST,
            "/auth/register",
            Some(serde_json::json!({
                "username": "alice",
                "email": "other@example.org",
                "password": "password1"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) = call(
            &state,
            Method::POST,
            "/auth/login",
            Some(serde_json::json!({ "username": "alice", "password": "wrong-pass" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = call(
            &state,
            Method::POST,
            "/auth/login",
            Some(serde_json::json!({ "username": "alice", "password": "password1" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user"]["id"], alice_id.as_str());

        let uri = format!("/auth/allusers/{alice_id}");
        let (status, _) = call(&state, Method::GET, &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        call(
            &state,
            Method::POST,
            "/auth/register",
            Some(serde_json::json!({
                "username": "bob",
                "email": "bob@example.org",
                "password": "password2"
            })),
        )
        .await;
        let (status, contacts) = call(&state, Method::GET, &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(contacts.as_array().unwrap().len(), 1);
        assert_eq!(contacts[0]["username"], "bob");
    }

    #[tokio::test]
    async fn set_avatar_flow() {
        let state = test_state();
        let (_, alice) = call(
            &state,
            Method::POST,
            "/auth/register",
            Some(serde_json::json!({
                "username": "alice",
                "email": "alice@example.org",
                "password": "password1"
            })),
        )
        .await;
        let uri = format!("/auth/setavatar/{}", alice["user"]["id"].as_str().unwrap());

        let (status, body) = call(
            &state,
            Method::POST,
            &uri,
            Some(serde_json::json!({ "image": "svg-data" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["isSet"], true);
        assert_eq!(body["image"], "svg-data");

        let (status, _) = call(
            &state,
            Method::POST,
            "/auth/setavatar/nobody",
            Some(serde_json::json!({ "image": "svg-data" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn logout_removes_presence_once() {
        let state = test_state();
        let (handle, _tx, _rx) = live_handle();
        state.registry.register(UserId::new("alice"), handle).await;

        let (status, _) = call(&state, Method::GET, "/auth/logout/alice", None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(state.registry.lookup(&UserId::new("alice")).await.is_none());

        let (status, body) = call(&state, Method::GET, "/auth/logout/alice", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["msg"], "User not found in online users");
    }

    #[tokio::test]
    async fn health_reports_online_count() {
        let state = test_state();
        let (handle, _tx, _rx) = live_handle();
        state.registry.register(UserId::new("alice"), handle).await;

        let (status, body) = call(&state, Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["online"], 1);
    }
}
