// Feed HTTP Interface - decodes requests, calls the feed and user services, encodes results
// Error kinds map to status codes in FeedError::into_response

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post, put},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    app_state::AppState,
    core::{Post, PostId, ReconcileReport, Reply, User},
    error::{FeedError, FeedResult},
};

// HTTP Request types
#[derive(Debug, Deserialize)]
pub struct CreatePostRequest {
    pub author_id: String,
    pub body: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateReplyRequest {
    pub author_id: String,
    pub body: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateLikeRequest {
    pub author_id: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateRepostRequest {
    pub author_id: String,
}

#[derive(Debug, Deserialize)]
pub struct UpsertUserRequest {
    pub display_name: String,
}

#[derive(Debug, Deserialize)]
pub struct FavoriteTeamRequest {
    pub team_id: String,
}

#[derive(Debug, Deserialize)]
pub struct ListPostsQuery {
    pub limit: Option<u32>,
}

fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> FeedResult<T> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| FeedError::Validation(rejection.body_text()))
}

fn post_id(path: Result<Path<i64>, PathRejection>) -> FeedResult<PostId> {
    path.map(|Path(id)| PostId::new(id))
        .map_err(|rejection| FeedError::Validation(rejection.body_text()))
}

fn user_path(path: Result<Path<String>, PathRejection>) -> FeedResult<String> {
    path.map(|Path(id)| id)
        .map_err(|rejection| FeedError::Validation(rejection.body_text()))
}

// HTTP Handlers

pub async fn create_post_handler(
    State(state): State<AppState>,
    payload: Result<Json<CreatePostRequest>, JsonRejection>,
) -> Result<impl IntoResponse, FeedError> {
    let req = json_body(payload)?;
    let post = state.feed.create_post(&req.author_id, &req.body).await?;
    Ok((StatusCode::CREATED, Json(post)))
}

pub async fn list_posts_handler(
    State(state): State<AppState>,
    query: Result<Query<ListPostsQuery>, QueryRejection>,
) -> Result<Json<Vec<Post>>, FeedError> {
    let Query(params) =
        query.map_err(|rejection| FeedError::Validation(rejection.body_text()))?;
    Ok(Json(state.feed.list_posts(params.limit).await?))
}

pub async fn get_post_handler(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<Post>, FeedError> {
    Ok(Json(state.feed.get_post(post_id(path)?).await?))
}

pub async fn list_replies_handler(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<Vec<Reply>>, FeedError> {
    Ok(Json(state.feed.list_replies(post_id(path)?).await?))
}

pub async fn append_reply_handler(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
    payload: Result<Json<CreateReplyRequest>, JsonRejection>,
) -> Result<impl IntoResponse, FeedError> {
    let id = post_id(path)?;
    let req = json_body(payload)?;
    let reply = state.feed.append_reply(id, &req.author_id, &req.body).await?;
    Ok((StatusCode::CREATED, Json(reply)))
}

pub async fn record_like_handler(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
    payload: Result<Json<CreateLikeRequest>, JsonRejection>,
) -> Result<impl IntoResponse, FeedError> {
    let id = post_id(path)?;
    let req = json_body(payload)?;
    let like = state.feed.record_like(id, &req.author_id).await?;
    Ok((StatusCode::CREATED, Json(like)))
}

pub async fn record_repost_handler(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
    payload: Result<Json<CreateRepostRequest>, JsonRejection>,
) -> Result<impl IntoResponse, FeedError> {
    let id = post_id(path)?;
    let req = json_body(payload)?;
    let repost = state.feed.record_repost(id, &req.author_id).await?;
    Ok((StatusCode::CREATED, Json(repost)))
}

pub async fn reconcile_post_handler(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<ReconcileReport>, FeedError> {
    Ok(Json(state.feed.reconcile_post(post_id(path)?).await?))
}

pub async fn upsert_user_handler(
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
    payload: Result<Json<UpsertUserRequest>, JsonRejection>,
) -> Result<Json<User>, FeedError> {
    let id = user_path(path)?;
    let req = json_body(payload)?;
    Ok(Json(state.users.upsert_user(&id, &req.display_name).await?))
}

pub async fn get_user_handler(
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
) -> Result<Json<User>, FeedError> {
    let id = user_path(path)?;
    Ok(Json(state.users.get_user(&id).await?))
}

pub async fn favorite_team_handler(
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
    payload: Result<Json<FavoriteTeamRequest>, JsonRejection>,
) -> Result<Json<User>, FeedError> {
    let id = user_path(path)?;
    let req = json_body(payload)?;
    Ok(Json(state.users.set_favorite_team(&id, &req.team_id).await?))
}

pub async fn health_handler(State(state): State<AppState>) -> Result<Json<Value>, FeedError> {
    state.store.facts.health_check().await?;
    Ok(Json(json!({"status": "ok"})))
}

// Create feed router
pub fn create_feed_router(state: AppState) -> Router {
    Router::new()
        // Posts and their projections
        .route("/posts", post(create_post_handler).get(list_posts_handler))
        .route("/posts/{id}", get(get_post_handler))
        .route("/posts/{id}/replies", post(append_reply_handler).get(list_replies_handler))
        .route("/posts/{id}/likes", post(record_like_handler))
        .route("/posts/{id}/reposts", post(record_repost_handler))
        .route("/posts/{id}/reconcile", post(reconcile_post_handler))
        // User directory
        .route("/users/{id}", put(upsert_user_handler).get(get_user_handler))
        .route("/users/{id}/favorite-team", put(favorite_team_handler))
        .with_state(state)
}

/// Full application: versioned API plus health check, with CORS and request tracing
pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .with_state(state.clone())
        .nest("/api/v1", create_feed_router(state))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
