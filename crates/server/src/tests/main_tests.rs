use super::*;
use axum::{body, body::Body, http::Request};
use shared::domain::NewComment;
use tower::ServiceExt;

const TEST_BODY_LIMIT: usize = 16 * 1024;

async fn test_app() -> (Router, Storage) {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let api = ApiContext {
        storage: storage.clone(),
    };
    let app = build_router(Arc::new(AppState { api }), TEST_BODY_LIMIT);
    (app, storage)
}

fn create_request(post_id: &str, payload: serde_json::Value) -> Request<Body> {
    Request::post(format!("/posts/{post_id}/comments"))
        .header("content-type", "application/json")
        .body(Body::from(payload.to_string()))
        .expect("request")
}

async fn read_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json")
}

#[tokio::test]
async fn healthz_reports_ok_when_storage_is_ready() {
    let (app, _storage) = test_app().await;
    let request = Request::get("/healthz")
        .body(Body::empty())
        .expect("request");
    let response = app.oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let body = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    assert_eq!(body.as_ref(), b"ok");
}

#[tokio::test]
async fn unknown_post_lists_empty() {
    let (app, _storage) = test_app().await;
    let request = Request::get("/posts/nobody-wrote-here/comments")
        .body(Body::empty())
        .expect("request");
    let response = app.oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let dto: ListCommentsResponse = read_json(response).await;
    assert!(dto.comments.is_empty());
}

#[tokio::test]
async fn created_comment_is_listed_trimmed_and_in_order() {
    let (app, storage) = test_app().await;
    storage
        .insert_comment(&NewComment {
            post_id: PostId::new("post-1"),
            author: "ann".into(),
            content: "first".into(),
        })
        .await
        .expect("seed");

    let response = app
        .clone()
        .oneshot(create_request(
            "post-1",
            serde_json::json!({ "author": "  bob ", "content": " second  " }),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::CREATED);
    let created: CreateCommentResponse = read_json(response).await;
    assert!(created.comment_id.0 > 0);

    let list = Request::get("/posts/post-1/comments")
        .body(Body::empty())
        .expect("request");
    let response = app.oneshot(list).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let dto: ListCommentsResponse = read_json(response).await;
    let rendered: Vec<_> = dto
        .comments
        .iter()
        .map(|c| (c.author.as_str(), c.content.as_str()))
        .collect();
    assert_eq!(rendered, vec![("ann", "first"), ("bob", "second")]);
}

#[tokio::test]
async fn blank_content_is_rejected_with_validation_error() {
    let (app, storage) = test_app().await;
    let response = app
        .oneshot(create_request(
            "post-1",
            serde_json::json!({ "author": "ann", "content": "   " }),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let err: ApiError = read_json(response).await;
    assert_eq!(err.code, ErrorCode::Validation);
    assert!(!err.message.is_empty());
    assert_eq!(
        storage
            .count_comments_for_post(&PostId::new("post-1"))
            .await
            .expect("count"),
        0
    );
}

#[tokio::test]
async fn malformed_json_maps_to_api_error() {
    let (app, _storage) = test_app().await;
    let request = Request::post("/posts/post-1/comments")
        .header("content-type", "application/json")
        .body(Body::from("{ not json"))
        .expect("request");
    let response = app.oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let err: ApiError = read_json(response).await;
    assert_eq!(err.code, ErrorCode::Validation);
}

#[tokio::test]
async fn oversized_body_is_rejected() {
    let (app, _storage) = test_app().await;
    let response = app
        .oneshot(create_request(
            "post-1",
            serde_json::json!({ "author": "ann", "content": "x".repeat(TEST_BODY_LIMIT * 2) }),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[test]
fn error_codes_map_to_http_statuses() {
    assert_eq!(status_for(ErrorCode::Validation), StatusCode::BAD_REQUEST);
    assert_eq!(status_for(ErrorCode::NotFound), StatusCode::NOT_FOUND);
    assert_eq!(
        status_for(ErrorCode::PayloadTooLarge),
        StatusCode::PAYLOAD_TOO_LARGE
    );
    assert_eq!(
        status_for(ErrorCode::Internal),
        StatusCode::INTERNAL_SERVER_ERROR
    );
}
