// ─── folio content API ──────────────────────────────────────────────
//
// JSON CRUD over projects, certificates and contact messages, plus the
// GitHub repository list. Collection
// routes take `?id=N` for single-item access as well as `/{id}` paths.
// Every route answers OPTIONS with 200 and unsupported methods with a
// JSON 405.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post, MethodRouter},
    Router,
};
use parking_lot::RwLock;
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use folio_core::FolioError;
use folio_store::{
    CertificatePatch, NewCertificate, NewMessage, NewProject, ProjectPatch, Storage,
};

use crate::github::GithubClient;

// ── Shared state ────────────────────────────────────────────────────

#[derive(Clone)]
pub struct AppState {
    store: Arc<RwLock<Box<dyn Storage>>>,
    github: Arc<GithubClient>,
}

impl AppState {
    pub fn new(store: impl Storage + 'static, github: GithubClient) -> Self {
        Self {
            store: Arc::new(RwLock::new(Box::new(store))),
            github: Arc::new(github),
        }
    }
}

// ── Errors ──────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }
}

impl From<FolioError> for ApiError {
    fn from(err: FolioError) -> Self {
        match err {
            FolioError::NotFound { kind, .. } => {
                Self::new(StatusCode::NOT_FOUND, format!("{} not found", capitalize(kind)))
            }
            FolioError::Validation(message) => Self::bad_request(message),
            other => {
                tracing::error!("storage failure: {}", other);
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(format!("Invalid request body: {}", rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

/// Entity kind, for ids and error wording.
#[derive(Debug, Clone, Copy)]
enum Kind {
    Project,
    Certificate,
    Message,
}

impl Kind {
    fn name(self) -> &'static str {
        match self {
            Kind::Project => "project",
            Kind::Certificate => "certificate",
            Kind::Message => "message",
        }
    }

    /// Parse an id from a query parameter or path segment.
    fn id(self, raw: Option<&str>) -> ApiResult<u64> {
        let raw = raw.ok_or_else(|| {
            ApiError::bad_request(format!("{} ID is required", capitalize(self.name())))
        })?;
        raw.trim()
            .parse::<u64>()
            .map_err(|_| ApiError::bad_request(format!("Invalid {} ID", self.name())))
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[derive(Debug, Default, Deserialize)]
struct ItemQuery {
    id: Option<String>,
    featured: Option<String>,
}

// ── Router ──────────────────────────────────────────────────────────

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", with_fallbacks(get(health)))
        // Projects
        .route(
            "/api/projects",
            with_fallbacks(
                get(list_projects)
                    .post(create_project)
                    .put(update_project_by_query)
                    .delete(delete_project_by_query),
            ),
        )
        .route("/api/projects/featured", with_fallbacks(get(featured_projects)))
        .route(
            "/api/projects/{id}",
            with_fallbacks(
                get(get_project)
                    .put(update_project_by_path)
                    .delete(delete_project_by_path),
            ),
        )
        // Certificates
        .route(
            "/api/certificates",
            with_fallbacks(
                get(list_certificates)
                    .post(create_certificate)
                    .put(update_certificate_by_query)
                    .delete(delete_certificate_by_query),
            ),
        )
        .route(
            "/api/certificates/{id}",
            with_fallbacks(
                get(get_certificate)
                    .put(update_certificate_by_path)
                    .delete(delete_certificate_by_path),
            ),
        )
        // Messages
        .route(
            "/api/messages",
            with_fallbacks(
                get(list_messages)
                    .post(create_message)
                    .delete(delete_message_by_query),
            ),
        )
        .route(
            "/api/messages/{id}",
            with_fallbacks(get(get_message).delete(delete_message_by_path)),
        )
        .route("/api/messages/{id}/read", with_fallbacks(post(mark_message_read)))
        .route("/api/github", with_fallbacks(get(github_repositories)))
        .fallback(not_found)
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Preflight answers 200; anything else unrouted is a JSON 405.
fn with_fallbacks(route: MethodRouter<AppState>) -> MethodRouter<AppState> {
    route.options(preflight).fallback(method_not_allowed)
}

pub async fn serve(state: AppState, addr: SocketAddr) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    let local = listener.local_addr()?;
    println!("📡 Folio API listening on http://{}", local);
    tracing::info!("serving API on {}", local);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("API server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("failed to listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
}

async fn preflight() -> StatusCode {
    StatusCode::OK
}

async fn method_not_allowed() -> ApiError {
    ApiError::new(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
}

async fn not_found() -> ApiError {
    ApiError::new(StatusCode::NOT_FOUND, "Not found")
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let stats = state.store.read().stats();
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "projects": stats.projects,
        "featured": stats.featured,
        "certificates": stats.certificates,
        "messages": stats.messages,
        "unread": stats.unread,
    }))
}

// ── Projects ────────────────────────────────────────────────────────

async fn list_projects(
    State(state): State<AppState>,
    Query(query): Query<ItemQuery>,
) -> ApiResult<Response> {
    let store = state.store.read();
    if query.id.is_some() {
        let id = Kind::Project.id(query.id.as_deref())?;
        return Ok(Json(store.project(id)?).into_response());
    }
    if query.featured.as_deref() == Some("true") {
        return Ok(Json(store.featured_projects()).into_response());
    }
    Ok(Json(store.projects()).into_response())
}

async fn featured_projects(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.store.read().featured_projects())
}

async fn get_project(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Response> {
    let id = Kind::Project.id(Some(&id))?;
    Ok(Json(state.store.read().project(id)?).into_response())
}

async fn create_project(
    State(state): State<AppState>,
    body: std::result::Result<Json<NewProject>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(new) = body?;
    let project = state.store.write().create_project(new)?;
    Ok((StatusCode::CREATED, Json(project)).into_response())
}

async fn update_project_by_query(
    State(state): State<AppState>,
    Query(query): Query<ItemQuery>,
    body: std::result::Result<Json<ProjectPatch>, JsonRejection>,
) -> ApiResult<Response> {
    let id = Kind::Project.id(query.id.as_deref())?;
    update_project(&state, id, body)
}

async fn update_project_by_path(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: std::result::Result<Json<ProjectPatch>, JsonRejection>,
) -> ApiResult<Response> {
    let id = Kind::Project.id(Some(&id))?;
    update_project(&state, id, body)
}

fn update_project(
    state: &AppState,
    id: u64,
    body: std::result::Result<Json<ProjectPatch>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(patch) = body?;
    let project = state.store.write().update_project(id, patch)?;
    Ok(Json(project).into_response())
}

async fn delete_project_by_query(
    State(state): State<AppState>,
    Query(query): Query<ItemQuery>,
) -> ApiResult<StatusCode> {
    let id = Kind::Project.id(query.id.as_deref())?;
    state.store.write().delete_project(id)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_project_by_path(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let id = Kind::Project.id(Some(&id))?;
    state.store.write().delete_project(id)?;
    Ok(StatusCode::NO_CONTENT)
}

// ── Certificates ────────────────────────────────────────────────────

async fn list_certificates(
    State(state): State<AppState>,
    Query(query): Query<ItemQuery>,
) -> ApiResult<Response> {
    let store = state.store.read();
    if query.id.is_some() {
        let id = Kind::Certificate.id(query.id.as_deref())?;
        return Ok(Json(store.certificate(id)?).into_response());
    }
    Ok(Json(store.certificates()).into_response())
}

async fn get_certificate(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    let id = Kind::Certificate.id(Some(&id))?;
    Ok(Json(state.store.read().certificate(id)?).into_response())
}

async fn create_certificate(
    State(state): State<AppState>,
    body: std::result::Result<Json<NewCertificate>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(new) = body?;
    let certificate = state.store.write().create_certificate(new)?;
    Ok((StatusCode::CREATED, Json(certificate)).into_response())
}

async fn update_certificate_by_query(
    State(state): State<AppState>,
    Query(query): Query<ItemQuery>,
    body: std::result::Result<Json<CertificatePatch>, JsonRejection>,
) -> ApiResult<Response> {
    let id = Kind::Certificate.id(query.id.as_deref())?;
    update_certificate(&state, id, body)
}

async fn update_certificate_by_path(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: std::result::Result<Json<CertificatePatch>, JsonRejection>,
) -> ApiResult<Response> {
    let id = Kind::Certificate.id(Some(&id))?;
    update_certificate(&state, id, body)
}

fn update_certificate(
    state: &AppState,
    id: u64,
    body: std::result::Result<Json<CertificatePatch>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(patch) = body?;
    let certificate = state.store.write().update_certificate(id, patch)?;
    Ok(Json(certificate).into_response())
}

async fn delete_certificate_by_query(
    State(state): State<AppState>,
    Query(query): Query<ItemQuery>,
) -> ApiResult<StatusCode> {
    let id = Kind::Certificate.id(query.id.as_deref())?;
    state.store.write().delete_certificate(id)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_certificate_by_path(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let id = Kind::Certificate.id(Some(&id))?;
    state.store.write().delete_certificate(id)?;
    Ok(StatusCode::NO_CONTENT)
}

// ── Messages ────────────────────────────────────────────────────────

async fn list_messages(
    State(state): State<AppState>,
    Query(query): Query<ItemQuery>,
) -> ApiResult<Response> {
    let store = state.store.read();
    if query.id.is_some() {
        let id = Kind::Message.id(query.id.as_deref())?;
        return Ok(Json(store.message(id)?).into_response());
    }
    Ok(Json(store.messages()).into_response())
}

async fn get_message(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Response> {
    let id = Kind::Message.id(Some(&id))?;
    Ok(Json(state.store.read().message(id)?).into_response())
}

async fn create_message(
    State(state): State<AppState>,
    body: std::result::Result<Json<NewMessage>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(new) = body?;
    let message = state.store.write().create_message(new)?;
    Ok((StatusCode::CREATED, Json(message)).into_response())
}

async fn mark_message_read(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    let id = Kind::Message.id(Some(&id))?;
    state.store.write().mark_message_read(id)?;
    Ok(Json(json!({ "success": true })).into_response())
}

async fn delete_message_by_query(
    State(state): State<AppState>,
    Query(query): Query<ItemQuery>,
) -> ApiResult<StatusCode> {
    let id = Kind::Message.id(query.id.as_deref())?;
    state.store.write().delete_message(id)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_message_by_path(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let id = Kind::Message.id(Some(&id))?;
    state.store.write().delete_message(id)?;
    Ok(StatusCode::NO_CONTENT)
}

// ── GitHub ──────────────────────────────────────────────────────────

async fn github_repositories(State(state): State<AppState>) -> Response {
    match state.github.repositories().await {
        Ok(repos) => Json(repos).into_response(),
        Err(e) => {
            tracing::error!("failed to fetch GitHub repositories: {:#}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": "Failed to fetch GitHub repositories",
                    "details": format!("{:#}", e),
                })),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_core::GithubConfig;
    use folio_store::MemStorage;
    use serde_json::Value;

    /// Serve `app` on an ephemeral port; returns its base URL.
    async fn serve_on_ephemeral_port(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    async fn spawn_with(store: MemStorage, github: GithubConfig) -> String {
        let state = AppState::new(store, GithubClient::new(&github).unwrap());
        serve_on_ephemeral_port(router(state)).await
    }

    async fn spawn(store: MemStorage) -> String {
        spawn_with(store, GithubConfig::default()).await
    }

    /// A stand-in for api.github.com serving one account's repositories.
    async fn fake_github() -> String {
        use axum::http::HeaderMap;

        async fn user_repos(headers: HeaderMap) -> Response {
            let authorized = headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .is_some_and(|v| v == "token s3cret");
            if !authorized {
                return (StatusCode::UNAUTHORIZED, Json(json!({ "message": "Bad credentials" })))
                    .into_response();
            }
            Json(json!([
                {
                    "name": "folio",
                    "description": "Portfolio engine",
                    "html_url": "https://github.com/ada/folio",
                    "stargazers_count": 12,
                    "forks_count": 4,
                    "language": "Rust",
                    "updated_at": "2024-05-01T10:00:00Z",
                    "private": false
                },
                {
                    "name": "notes",
                    "description": null,
                    "html_url": "https://github.com/ada/notes",
                    "stargazers_count": 0,
                    "forks_count": 0,
                    "language": null,
                    "updated_at": "2023-01-09T08:30:00Z",
                    "private": true
                }
            ]))
            .into_response()
        }

        async fn broken() -> StatusCode {
            StatusCode::BAD_GATEWAY
        }

        let app = Router::new()
            .route("/user/repos", get(user_repos))
            .route("/users/{user}/repos", get(broken));
        serve_on_ephemeral_port(app).await
    }

    fn seeded() -> MemStorage {
        let mut store = MemStorage::new();
        store.seed_sample_data().unwrap();
        store
    }

    #[tokio::test]
    async fn test_list_and_single_project() {
        let base = spawn(seeded()).await;
        let client = reqwest::Client::new();

        let list: Value = client
            .get(format!("{base}/api/projects"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(list.as_array().unwrap().len(), 2);
        assert_eq!(list[0]["title"], "KKNotesV2");

        let by_query: Value = client
            .get(format!("{base}/api/projects?id=2"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(by_query["title"], "MaestraMind");

        let by_path: Value = client
            .get(format!("{base}/api/projects/2"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(by_path, by_query);
    }

    #[tokio::test]
    async fn test_invalid_and_missing_ids() {
        let base = spawn(seeded()).await;
        let client = reqwest::Client::new();

        let resp = client.get(format!("{base}/api/projects?id=abc")).send().await.unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["error"], "Invalid project ID");

        let resp = client.get(format!("{base}/api/projects/99")).send().await.unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::NOT_FOUND);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["error"], "Project not found");

        let resp = client
            .put(format!("{base}/api/projects"))
            .json(&json!({ "featured": false }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["error"], "Project ID is required");
    }

    #[tokio::test]
    async fn test_project_crud_cycle() {
        let base = spawn(MemStorage::new()).await;
        let client = reqwest::Client::new();

        let resp = client
            .post(format!("{base}/api/projects"))
            .json(&json!({
                "title": "Folio",
                "description": "Portfolio engine",
                "techStack": "Rust, axum",
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::CREATED);
        let created: Value = resp.json().await.unwrap();
        assert_eq!(created["id"], 1);
        assert_eq!(created["featured"], false);

        let resp = client
            .put(format!("{base}/api/projects?id=1"))
            .json(&json!({ "featured": true }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::OK);

        let featured: Value = client
            .get(format!("{base}/api/projects?featured=true"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(featured.as_array().unwrap().len(), 1);

        let resp = client.delete(format!("{base}/api/projects/1")).send().await.unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::NO_CONTENT);
        let resp = client.delete(format!("{base}/api/projects?id=1")).send().await.unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_invalid_body_is_bad_request() {
        let base = spawn(MemStorage::new()).await;
        let client = reqwest::Client::new();

        let resp = client
            .post(format!("{base}/api/certificates"))
            .json(&json!({ "title": "Rust" }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);

        let resp = client
            .post(format!("{base}/api/certificates"))
            .json(&json!({ "title": "Rust", "issuer": " ", "date": "2024" }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["error"], "issuer is required");
    }

    #[tokio::test]
    async fn test_message_read_and_delete() {
        let base = spawn(MemStorage::new()).await;
        let client = reqwest::Client::new();

        let resp = client
            .post(format!("{base}/api/messages"))
            .json(&json!({
                "name": "Ada",
                "email": "ada@example.com",
                "subject": "Hello",
                "message": "Lovely site",
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::CREATED);

        let resp = client
            .post(format!("{base}/api/messages/1/read"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::OK);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body, json!({ "success": true }));

        let health: Value = client
            .get(format!("{base}/api/health"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(health["status"], "ok");
        assert_eq!(health["messages"], 1);
        assert_eq!(health["unread"], 0);

        let resp = client.delete(format!("{base}/api/messages/1")).send().await.unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_method_not_allowed_and_preflight() {
        let base = spawn(MemStorage::new()).await;
        let client = reqwest::Client::new();

        let resp = client
            .patch(format!("{base}/api/projects"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::METHOD_NOT_ALLOWED);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["error"], "Method not allowed");

        let resp = client.put(format!("{base}/api/messages")).send().await.unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::METHOD_NOT_ALLOWED);

        let resp = client
            .request(reqwest::Method::OPTIONS, format!("{base}/api/certificates"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unknown_path_is_json_404() {
        let base = spawn(MemStorage::new()).await;
        let resp = reqwest::get(format!("{base}/api/nope")).await.unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::NOT_FOUND);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["error"], "Not found");
    }

    #[tokio::test]
    async fn test_github_repositories_are_mapped() {
        let github = fake_github().await;
        let base = spawn_with(
            MemStorage::new(),
            GithubConfig {
                api_url: github,
                token: Some("s3cret".into()),
                user: None,
            },
        )
        .await;

        let resp = reqwest::get(format!("{base}/api/github")).await.unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::OK);
        let repos: Value = resp.json().await.unwrap();
        assert_eq!(repos.as_array().unwrap().len(), 2);
        assert_eq!(
            repos[0],
            json!({
                "name": "folio",
                "description": "Portfolio engine",
                "url": "https://github.com/ada/folio",
                "stars": 12,
                "forks": 4,
                "language": "Rust",
                "updated_at": "2024-05-01T10:00:00Z"
            })
        );
        assert_eq!(repos[1]["language"], Value::Null);
    }

    #[tokio::test]
    async fn test_github_failures_are_500_with_details() {
        let github = fake_github().await;
        let client = reqwest::Client::new();

        let base = spawn_with(
            MemStorage::new(),
            GithubConfig {
                api_url: github.clone(),
                token: None,
                user: Some("ada".into()),
            },
        )
        .await;
        let resp = client.get(format!("{base}/api/github")).send().await.unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::INTERNAL_SERVER_ERROR);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["error"], "Failed to fetch GitHub repositories");
        assert!(body["details"].as_str().unwrap().contains("502"));

        let base = spawn_with(
            MemStorage::new(),
            GithubConfig {
                api_url: github,
                token: Some("wrong".into()),
                user: None,
            },
        )
        .await;
        let resp = client.get(format!("{base}/api/github")).send().await.unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::INTERNAL_SERVER_ERROR);
        let body: Value = resp.json().await.unwrap();
        assert!(body["details"].as_str().unwrap().contains("401"));
    }

    #[tokio::test]
    async fn test_github_route_is_get_only() {
        let base = spawn(MemStorage::new()).await;
        let client = reqwest::Client::new();

        let resp = client.post(format!("{base}/api/github")).send().await.unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::METHOD_NOT_ALLOWED);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["error"], "Method not allowed");

        let resp = client
            .request(reqwest::Method::OPTIONS, format!("{base}/api/github"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::OK);

        // Nothing configured is a fetch failure, not a crash.
        let resp = client.get(format!("{base}/api/github")).send().await.unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::INTERNAL_SERVER_ERROR);
        let body: Value = resp.json().await.unwrap();
        assert!(body["details"].as_str().unwrap().contains("no GitHub token or user"));
    }
}
