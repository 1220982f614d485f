// Library Roster - Web Server
// REST API over the student book and owner accounts

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use library_roster::{
    add_student_to_sheet, import_students, update_student_in_sheet, AppConfig, AuthError,
    AuthService, ImportBatch, IngestError, Normalizer, PublishedSheet, RosterError, SqliteStore,
    StudentBook, StudentForm,
};

type Store = Arc<SqliteStore>;

/// Shared application state
#[derive(Clone)]
struct AppState {
    book: Arc<StudentBook<Store>>,
    auth: Arc<AuthService<Store>>,
    config: Arc<AppConfig>,
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    fn ok(data: T) -> Response {
        Self::with_status(StatusCode::OK, data)
    }

    fn with_status(status: StatusCode, data: T) -> Response {
        let body = Self {
            success: true,
            data: Some(data),
            error: None,
        };
        (status, Json(body)).into_response()
    }
}

fn fail(status: StatusCode, message: impl Into<String>) -> Response {
    let body = ApiResponse::<()> {
        success: false,
        data: None,
        error: Some(message.into()),
    };
    (status, Json(body)).into_response()
}

fn roster_failure(e: RosterError) -> Response {
    match e {
        RosterError::NotFound(_) => fail(StatusCode::NOT_FOUND, e.to_string()),
        RosterError::Validation(_) | RosterError::InvalidPayment(_) => {
            fail(StatusCode::UNPROCESSABLE_ENTITY, e.to_string())
        }
        RosterError::Store(_) => {
            tracing::error!(error = %e, "roster storage failure");
            fail(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

fn auth_failure(e: AuthError) -> Response {
    match e {
        AuthError::InvalidCredentials => fail(StatusCode::UNAUTHORIZED, e.to_string()),
        AuthError::DuplicateAccount => fail(StatusCode::CONFLICT, e.to_string()),
        AuthError::Store(_) => {
            tracing::error!(error = %e, "auth storage failure");
            fail(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

fn require_login(state: &AppState) -> Result<(), Response> {
    if state.auth.is_authenticated() {
        Ok(())
    } else {
        Err(fail(StatusCode::UNAUTHORIZED, "Not logged in"))
    }
}

// ============================================================================
// API Handlers
// ============================================================================

#[derive(Deserialize)]
struct SearchParams {
    q: Option<String>,
}

#[derive(Deserialize)]
struct LoginRequest {
    username: String,
    password: String,
}

#[derive(Serialize)]
struct ImportResponse {
    imported: usize,
    skipped: usize,
    unchanged: bool,
}

impl ImportResponse {
    fn from_batch(batch: &ImportBatch, unchanged: bool) -> Self {
        Self {
            imported: batch.students.len(),
            skipped: batch.skipped.len(),
            unchanged,
        }
    }
}

/// GET /api/health - Health check
async fn health_check() -> Response {
    ApiResponse::ok("OK")
}

/// GET /api/students?q= - List or search students
async fn list_students(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Response {
    if let Err(denied) = require_login(&state) {
        return denied;
    }

    match state.book.search(params.q.as_deref().unwrap_or("")) {
        Ok(students) => ApiResponse::ok(students),
        Err(e) => roster_failure(e),
    }
}

/// GET /api/students/:id
async fn get_student(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    if let Err(denied) = require_login(&state) {
        return denied;
    }

    match state.book.get(&id) {
        Ok(student) => ApiResponse::ok(student),
        Err(e) => roster_failure(e),
    }
}

/// POST /api/students - Register a student
async fn add_student(State(state): State<AppState>, Json(form): Json<StudentForm>) -> Response {
    if let Err(denied) = require_login(&state) {
        return denied;
    }

    match state.book.add(&form, Utc::now().date_naive()) {
        Ok(student) => {
            add_student_to_sheet(&form);
            ApiResponse::with_status(StatusCode::CREATED, student)
        }
        Err(e) => roster_failure(e),
    }
}

/// PUT /api/students/:id - Edit a student
async fn update_student(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(form): Json<StudentForm>,
) -> Response {
    if let Err(denied) = require_login(&state) {
        return denied;
    }

    match state.book.update(&id, &form) {
        Ok(student) => {
            if let Err(e) = update_student_in_sheet(&id, &form) {
                tracing::warn!(id = %id, error = %e, "sheet write-back failed");
            }
            ApiResponse::ok(student)
        }
        Err(e) => roster_failure(e),
    }
}

/// DELETE /api/students/:id
async fn delete_student(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    if let Err(denied) = require_login(&state) {
        return denied;
    }

    match state.book.delete(&id) {
        Ok(true) => ApiResponse::ok(id),
        Ok(false) => roster_failure(RosterError::NotFound(id)),
        Err(e) => roster_failure(e),
    }
}

/// POST /api/import - Replace the roster from the published sheet
async fn import_sheet(State(state): State<AppState>) -> Response {
    if let Err(denied) = require_login(&state) {
        return denied;
    }

    let url = match state.config.sheet_url() {
        Ok(url) => url.to_string(),
        Err(e) => return fail(StatusCode::SERVICE_UNAVAILABLE, e.to_string()),
    };
    let timeout = state.config.http_timeout;

    let fetched = tokio::task::spawn_blocking(move || -> Result<ImportBatch, IngestError> {
        let sheet = PublishedSheet::new(url, timeout)?;
        import_students(&sheet, &Normalizer::new())
    })
    .await;

    let batch = match fetched {
        Ok(Ok(batch)) => batch,
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "sheet import failed");
            return fail(StatusCode::BAD_GATEWAY, format!("Failed to fetch student data: {}", e));
        }
        Err(e) => return fail(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    };

    let unchanged = match state.book.is_unchanged(&batch) {
        Ok(unchanged) => unchanged,
        Err(e) => return roster_failure(e),
    };

    if let Err(e) = state.book.replace_with_import(&batch) {
        return roster_failure(e);
    }

    ApiResponse::ok(ImportResponse::from_batch(&batch, unchanged))
}

/// POST /api/auth/login
async fn login(State(state): State<AppState>, Json(req): Json<LoginRequest>) -> Response {
    match state.auth.login(&req.username, &req.password) {
        Ok(owner) => ApiResponse::ok(owner),
        Err(e) => auth_failure(e),
    }
}

/// POST /api/auth/logout
async fn logout(State(state): State<AppState>) -> Response {
    match state.auth.logout() {
        Ok(()) => ApiResponse::ok("logged out"),
        Err(e) => auth_failure(e),
    }
}

/// GET /api/auth/me
async fn current_owner(State(state): State<AppState>) -> Response {
    match state.auth.current_user() {
        Some(owner) => ApiResponse::ok(owner),
        None => fail(StatusCode::UNAUTHORIZED, "Not logged in"),
    }
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "library_roster=info,roster_server=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;

    let store = Arc::new(SqliteStore::open(&config.store_path)?);
    tracing::info!(path = %config.store_path.display(), "store opened");

    let auth = AuthService::new(Arc::clone(&store), config.seed_account()?.clone());
    auth.initialize()?;

    let addr = SocketAddr::new(config.host.parse()?, config.port);

    // Create shared state
    let state = AppState {
        book: Arc::new(StudentBook::new(Arc::clone(&store))),
        auth: Arc::new(auth),
        config: Arc::new(config),
    };

    // Build API routes
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/students", get(list_students).post(add_student))
        .route(
            "/students/:id",
            get(get_student).put(update_student).delete(delete_student),
        )
        .route("/import", post(import_sheet))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/me", get(current_owner))
        .with_state(state);

    let app = Router::new()
        .nest("/api", api_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    tracing::info!("Starting server on {addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
