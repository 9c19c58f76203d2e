use std::{net::SocketAddr, sync::Arc};

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use server_api::{create_comment, list_comments, ApiContext};
use shared::{
    domain::PostId,
    error::{ApiError, ErrorCode},
    protocol::{
        post_comments_route, CreateCommentRequest, CreateCommentResponse, ListCommentsResponse,
    },
};
use storage::Storage;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing::{error, info, warn};

mod app_state;
mod config;

use app_state::AppState;
use config::{load_settings, prepare_database_url};

type HttpError = (StatusCode, Json<ApiError>);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let settings = load_settings();
    let database_url = prepare_database_url(&settings.database_url)?;
    let storage = Storage::new(&database_url).await.map_err(|error| {
        error!(
            %database_url,
            %error,
            "failed to open SQLite database; verify parent directory exists and permissions are correct"
        );
        error
    })?;

    let state = AppState {
        api: ApiContext { storage },
    };
    let app = build_router(Arc::new(state), settings.max_body_bytes);

    let addr: SocketAddr = settings.server_bind.parse()?;
    info!(%addr, max_body_bytes = settings.max_body_bytes, "comment store listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: Arc<AppState>, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route(
            post_comments_route(),
            get(http_list_comments).post(http_create_comment),
        )
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz(State(state): State<Arc<AppState>>) -> Result<&'static str, HttpError> {
    state.api.storage.health_check().await.map_err(|e| {
        error!(error = %e, "healthz: storage unavailable");
        http_error(ApiError::new(ErrorCode::Internal, e.to_string()))
    })?;
    Ok("ok")
}

async fn http_list_comments(
    State(state): State<Arc<AppState>>,
    Path(post_id): Path<String>,
) -> Result<Json<ListCommentsResponse>, HttpError> {
    let comments = list_comments(&state.api, &PostId::new(post_id))
        .await
        .map_err(http_error)?;
    Ok(Json(ListCommentsResponse { comments }))
}

async fn http_create_comment(
    State(state): State<Arc<AppState>>,
    Path(post_id): Path<String>,
    body: Result<Json<CreateCommentRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CreateCommentResponse>), HttpError> {
    let Json(req) = body.map_err(|rejection| {
        warn!(%post_id, error = %rejection, "comments: rejected malformed create request");
        let code = if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ErrorCode::PayloadTooLarge
        } else {
            ErrorCode::Validation
        };
        http_error(ApiError::new(code, rejection.body_text()))
    })?;

    let created = create_comment(&state.api, PostId::new(post_id), req)
        .await
        .map_err(http_error)?;
    Ok((StatusCode::CREATED, Json(created)))
}

fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::Validation => StatusCode::BAD_REQUEST,
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
        ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn http_error(err: ApiError) -> HttpError {
    (status_for(err.code), Json(err))
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
