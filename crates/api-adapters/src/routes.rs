//! # Thread Routes
//!
//! Thin handlers over the tree assembler and the mutation service. Each one
//! resolves the caller, runs exactly one service operation and records its
//! outcome.

use crate::error::HttpError;
use crate::extract::{MaybeAuthor, RequireAuthor};
use crate::html::ThreadPage;
use crate::state::AppState;
use crate::wire;
use askama::Template;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use domains::{NewDiscussion, NodeId, Page};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;

const OPENMETRICS: &str = "application/openmetrics-text; version=1.0.0; charset=utf-8";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddCommentRequest {
    pub parent_id: NodeId,
    pub body: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeRequest {
    pub node_id: NodeId,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Ack {
    pub ok: bool,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/thread/{root_id}", get(get_thread))
        .route("/api/add-comment", post(add_comment))
        .route("/api/toggle-like", post(toggle_like))
        .route("/api/delete-node", post(delete_node))
        .route("/api/discussions", get(list_discussions).post(create_discussion))
        .route("/threads/{root_id}", get(thread_page))
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn parse_id(raw: &str) -> Result<NodeId, HttpError> {
    raw.parse()
        .map_err(|_| HttpError::new(format!("malformed node id '{raw}'"), "VALIDATION_ERROR"))
}

/// Counts the outcome of `operation` and converts its error.
fn observe<T>(state: &AppState, operation: &str, result: domains::Result<T>) -> Result<T, HttpError> {
    match &result {
        Ok(_) => state.metrics.record(operation, "ok"),
        Err(err) => state.metrics.record(operation, err.code()),
    }
    result.map_err(HttpError::from)
}

async fn get_thread(
    State(state): State<AppState>,
    Path(raw): Path<String>,
    viewer: MaybeAuthor,
) -> Result<Response, HttpError> {
    let root_id = parse_id(&raw)?;
    let tree = observe(&state, "assemble", state.assembler.assemble(root_id, viewer.user_id()).await)?;
    let body = wire::thread_json(&tree).map_err(|e| HttpError::internal(e.to_string()))?;
    Ok(([(CONTENT_TYPE, "application/json")], body).into_response())
}

async fn add_comment(
    State(state): State<AppState>,
    RequireAuthor(author): RequireAuthor,
    payload: Result<Json<AddCommentRequest>, JsonRejection>,
) -> Result<Response, HttpError> {
    let Json(req) = payload?;
    let node = observe(
        &state,
        "add_comment",
        state.mutations.add_node(req.parent_id, &author, &req.body).await,
    )?;
    Ok(Json(node).into_response())
}

async fn toggle_like(
    State(state): State<AppState>,
    RequireAuthor(author): RequireAuthor,
    payload: Result<Json<NodeRequest>, JsonRejection>,
) -> Result<Response, HttpError> {
    let Json(req) = payload?;
    let summary = observe(
        &state,
        "toggle_like",
        state.mutations.toggle_like(req.node_id, author.id).await,
    )?;
    Ok(Json(summary).into_response())
}

async fn delete_node(
    State(state): State<AppState>,
    RequireAuthor(author): RequireAuthor,
    payload: Result<Json<NodeRequest>, JsonRejection>,
) -> Result<Json<Ack>, HttpError> {
    let Json(req) = payload?;
    observe(
        &state,
        "delete_node",
        state.mutations.soft_delete(req.node_id, author.id).await,
    )?;
    Ok(Json(Ack { ok: true }))
}

async fn create_discussion(
    State(state): State<AppState>,
    RequireAuthor(author): RequireAuthor,
    payload: Result<Json<NewDiscussion>, JsonRejection>,
) -> Result<Response, HttpError> {
    let Json(input) = payload?;
    let root = observe(
        &state,
        "create_discussion",
        state.mutations.create_discussion(&author, input).await,
    )?;
    Ok((StatusCode::CREATED, Json(root)).into_response())
}

async fn list_discussions(
    State(state): State<AppState>,
    viewer: MaybeAuthor,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Result<Response, HttpError> {
    let Query(params) = params?;
    let page = Page::new(params.limit, params.offset);
    let summaries = observe(
        &state,
        "list_discussions",
        state.assembler.list_discussions(viewer.user_id(), page).await,
    )?;
    Ok(Json(summaries).into_response())
}

async fn thread_page(
    State(state): State<AppState>,
    Path(raw): Path<String>,
    viewer: MaybeAuthor,
) -> Result<Html<String>, HttpError> {
    let root_id = parse_id(&raw)?;
    let tree = observe(&state, "render_page", state.assembler.assemble(root_id, viewer.user_id()).await)?;
    let html = ThreadPage::from_tree(&tree)
        .render()
        .map_err(|e| HttpError::internal(e.to_string()))?;
    Ok(Html(html))
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn metrics(State(state): State<AppState>) -> Result<Response, HttpError> {
    let text = state
        .metrics
        .render()
        .map_err(|e| HttpError::internal(e.to_string()))?;
    Ok(([(CONTENT_TYPE, OPENMETRICS)], text).into_response())
}
