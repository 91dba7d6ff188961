//! API integration tests.
//!
//! The full application (middleware included) runs against a mock database
//! and the in-memory engagement store.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::time::Duration;

use agora_api::{AppState, app};
use agora_common::IdGenerator;
use agora_common::config::PaginationConfig;
use agora_core::{
    MemoryEngagementStore, PaginationService, PostService, RankingService, SharedEngagementStore,
    UserService, VoteService,
};
use agora_db::entities::{post, user};
use agora_db::repositories::{PostRepository, UserRepository};
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
    response::Response,
};
use chrono::Utc;
use sea_orm::{DatabaseBackend, DatabaseConnection, MockDatabase};
use serde_json::Value;
use tower::ServiceExt;

const TOKEN: &str = "0123456789abcdef0123456789abcdef";

fn test_user() -> user::Model {
    user::Model {
        id: 100,
        username: "alice".to_string(),
        username_lower: "alice".to_string(),
        token: TOKEN.to_string(),
        created_at: Utc::now().into(),
    }
}

fn test_post(id: i64) -> post::Model {
    post::Model {
        id,
        user_id: 100,
        title: format!("Post {id}"),
        content: "hello".to_string(),
        created_at: Utc::now().into(),
    }
}

/// Build the app over `db`, returning the ranking for direct assertions.
fn create_test_app(db: DatabaseConnection) -> (Router, RankingService) {
    let db = Arc::new(db);
    let deadline = Duration::from_secs(1);
    let store: SharedEngagementStore = Arc::new(MemoryEngagementStore::new());
    let id_gen = Arc::new(IdGenerator::new("2024-01-01T00:00:00Z", 1).unwrap());

    let post_repo = PostRepository::new(Arc::clone(&db));
    let user_repo = UserRepository::new(Arc::clone(&db));

    let ranking = RankingService::new(Arc::clone(&store), true, deadline);
    let vote_service = VoteService::new(Arc::clone(&store), ranking.clone(), deadline, 4);
    let pagination_service = PaginationService::new(
        ranking.clone(),
        Arc::new(post_repo.clone()),
        &PaginationConfig {
            default_page_size: 20,
            max_page_size: 100,
        },
    );
    let post_service = PostService::new(post_repo, Arc::clone(&id_gen), ranking.clone());
    let user_service = UserService::new(user_repo, id_gen);

    let state = AppState {
        user_service,
        post_service,
        vote_service,
        pagination_service,
    };

    (app(state), ranking)
}

fn empty_db() -> DatabaseConnection {
    MockDatabase::new(DatabaseBackend::Postgres).into_connection()
}

fn authed(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {TOKEN}"))
        .body(Body::empty())
        .unwrap()
}

async fn json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_healthz() {
    let (app, _) = create_test_app(empty_db());

    let response = app
        .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["status"], "ok");
}

#[tokio::test]
async fn test_create_post_requires_auth() {
    let (app, _) = create_test_app(empty_db());

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/posts")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"title":"Hi"}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(response).await["error"]["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_unknown_token_is_anonymous() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([Vec::<user::Model>::new()])
        .into_connection();
    let (app, _) = create_test_app(db);

    let response = app.oneshot(authed("GET", "/api/users/me")).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_create_user_returns_token() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([Vec::<user::Model>::new()])
        .append_query_results([[test_user()]])
        .into_connection();
    let (app, _) = create_test_app(db);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/users")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"username":"alice"}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["data"]["id"], "100");
    assert_eq!(body["data"]["username"], "alice");
    assert_eq!(body["data"]["token"], TOKEN);
}

#[tokio::test]
async fn test_me_hides_token() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([[test_user()]])
        .into_connection();
    let (app, _) = create_test_app(db);

    let response = app.oneshot(authed("GET", "/api/users/me")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["data"]["username"], "alice");
    assert!(body["data"].get("token").is_none());
}

#[tokio::test]
async fn test_like_then_like_again() {
    // Each request: token lookup, then post existence check.
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([[test_user()]])
        .append_query_results([[test_post(7)]])
        .append_query_results([[test_user()]])
        .append_query_results([[test_post(7)]])
        .into_connection();
    let (app, ranking) = create_test_app(db);
    ranking.register(7).await.unwrap();

    let response = app
        .clone()
        .oneshot(authed("POST", "/api/posts/7/like"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["data"]["postId"], "7");
    assert_eq!(body["data"]["direction"], "like");
    assert_eq!(body["data"]["score"], 1);

    let response = app
        .oneshot(authed("POST", "/api/posts/7/like"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(json_body(response).await["error"]["code"], "ALREADY_LIKED");
    assert_eq!(ranking.score_of(7).await.unwrap(), 1);
}

#[tokio::test]
async fn test_dislike_without_like_is_rejected() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([[test_user()]])
        .append_query_results([[test_post(8)]])
        .into_connection();
    let (app, ranking) = create_test_app(db);
    ranking.register(8).await.unwrap();

    let response = app
        .oneshot(authed("POST", "/api/posts/8/dislike"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        json_body(response).await["error"]["code"],
        "NOT_PREVIOUSLY_LIKED"
    );
    assert_eq!(ranking.score_of(8).await.unwrap(), 0);
}

#[tokio::test]
async fn test_vote_on_missing_post_is_not_found() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([[test_user()]])
        .append_query_results([Vec::<post::Model>::new()])
        .into_connection();
    let (app, ranking) = create_test_app(db);

    let response = app
        .oneshot(authed("POST", "/api/posts/9/like"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(ranking.cardinality().await.unwrap(), 0);
}

#[tokio::test]
async fn test_vote_state_before_voting_is_null() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([[test_user()]])
        .into_connection();
    let (app, _) = create_test_app(db);

    let response = app
        .oneshot(authed("GET", "/api/posts/7/vote"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(json_body(response).await["data"]["direction"].is_null());
}

#[tokio::test]
async fn test_hot_listing_clamps_page_size() {
    let (app, _) = create_test_app(empty_db());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/posts?order=hot&limit=1000&page=0")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["data"]["pageSize"], 100);
    assert_eq!(body["data"]["page"], 1);
    assert_eq!(body["data"]["order"], "hot");
    assert_eq!(body["data"]["total"], 0);
}

#[tokio::test]
async fn test_hot_listing_orders_by_score() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([[test_post(1), test_post(2), test_post(3)]])
        .into_connection();
    let (app, ranking) = create_test_app(db);
    for id in 1..=3 {
        ranking.register(id).await.unwrap();
    }
    ranking.adjust_score(2, 3).await.unwrap();
    ranking.adjust_score(1, 1).await.unwrap();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/posts?order=hot")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    let ids: Vec<&str> = body["data"]["posts"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["2", "1", "3"]);
    assert_eq!(body["data"]["posts"][0]["score"], 3);
    assert_eq!(body["data"]["total"], 3);
}

#[tokio::test]
async fn test_new_listing_uses_recency() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        // count
        .append_query_results([[maplit::btreemap! {
            "num_items" => sea_orm::Value::BigInt(Some(2))
        }]])
        // find_recent_ids
        .append_query_results([[test_post(20), test_post(10)]])
        // hydration
        .append_query_results([[test_post(10), test_post(20)]])
        .into_connection();
    let (app, _) = create_test_app(db);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/posts?order=whatever")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["data"]["order"], "new");
    assert_eq!(body["data"]["total"], 2);
    assert_eq!(body["data"]["posts"][0]["id"], "20");
    assert_eq!(body["data"]["posts"][1]["id"], "10");
}

#[tokio::test]
async fn test_new_listing_far_past_end_is_empty() {
    // Only the count runs; no row query is issued for the out-of-range page.
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([[maplit::btreemap! {
            "num_items" => sea_orm::Value::BigInt(Some(2))
        }]])
        .into_connection();
    let (app, _) = create_test_app(db);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/posts?order=new&page=9223372036854775807&limit=100")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["data"]["total"], 2);
    assert_eq!(body["data"]["pageSize"], 100);
    assert!(body["data"]["posts"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_invalid_post_id_is_bad_request() {
    let (app, _) = create_test_app(empty_db());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/posts/not-a-number")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
