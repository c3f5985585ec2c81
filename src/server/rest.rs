//! HTTP handlers for the resource routes
//!
//! Handlers are generic over the resource and only translate between HTTP
//! and the [`ResourceService`]: query strings and bodies in, the
//! [`OperationResult`] envelope out, with the status taken from its failure
//! kind.

use axum::{
    Json, Router,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Serialize;
use serde_json::{Value, json};
use std::collections::HashMap;

use super::AppState;
use crate::core::error::{EngineError, StoreError};
use crate::core::outcome::OperationResult;
use crate::core::repository::Repository;
use crate::core::resource::Resource;
use crate::core::service::ResourceService;
use crate::resources::game::{ARENA_GAMES, TEAM_GAMES, WITHIN_PARENT};
use crate::resources::statistic::GAME_STATS;
use crate::resources::{Arena, Game, Player, Statistic, Team};
use crate::storage::Store;

// =============================================================================
// Resource wiring
// =============================================================================

/// A resource reachable over HTTP at `/{table}`
///
/// Handlers over `R: Exposed` also bound `dyn Store: Repository<R>`; the
/// store trait object only implements the repositories it lists.
pub trait Exposed: Resource {
    fn service(state: &AppState) -> &ResourceService<Self, dyn Store>;
}

impl Exposed for Team {
    fn service(state: &AppState) -> &ResourceService<Self, dyn Store> {
        &state.teams
    }
}

impl Exposed for Arena {
    fn service(state: &AppState) -> &ResourceService<Self, dyn Store> {
        &state.arenas
    }
}

impl Exposed for Game {
    fn service(state: &AppState) -> &ResourceService<Self, dyn Store> {
        &state.games
    }
}

impl Exposed for Player {
    fn service(state: &AppState) -> &ResourceService<Self, dyn Store> {
        &state.players
    }
}

impl Exposed for Statistic {
    fn service(state: &AppState) -> &ResourceService<Self, dyn Store> {
        &state.statistics
    }
}

/// A resource games point at, listable at `/{table}/{id}/games`
pub trait GameParent: Resource {
    /// Game columns referencing this resource
    const GAME_COLUMNS: &'static [&'static str];
}

impl GameParent for Team {
    const GAME_COLUMNS: &'static [&'static str] = TEAM_GAMES;
}

impl GameParent for Arena {
    const GAME_COLUMNS: &'static [&'static str] = ARENA_GAMES;
}

/// Collection and item routes for `R`:
///
/// - GET    /{table}       - filtered listing
/// - POST   /{table}       - batch create
/// - PUT    /{table}       - batch update
/// - DELETE /{table}       - batch delete
/// - GET    /{table}/{id}  - single record
pub fn resource_routes<R: Exposed>() -> Router<AppState>
where
    dyn Store: Repository<R>,
{
    let collection = format!("/{}", R::TABLE.table);
    let item = format!("{}/{{id}}", collection);

    Router::new()
        .route(
            &collection,
            get(list::<R>)
                .post(create::<R>)
                .put(update::<R>)
                .delete(delete::<R>),
        )
        .route(&item, get(fetch::<R>))
}

/// GET /{table}/{id}/games for a parent of games
pub fn game_routes<P: GameParent>() -> Router<AppState>
where
    dyn Store: Repository<P>,
{
    let path = format!("/{}/{{id}}/{}", P::TABLE.table, Game::TABLE.table);
    Router::new().route(&path, get(games_of::<P>))
}

/// GET /games/{id}/stats
pub fn stats_routes() -> Router<AppState> {
    let path = format!("/{}/{{id}}/stats", Game::TABLE.table);
    Router::new().route(&path, get(stats_of_game))
}

// =============================================================================
// Handlers
// =============================================================================

pub async fn list<R: Exposed>(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response
where
    dyn Store: Repository<R>,
{
    respond(R::service(&state).list(&params).await, StatusCode::OK)
}

pub async fn fetch<R: Exposed>(State(state): State<AppState>, Path(id): Path<String>) -> Response
where
    dyn Store: Repository<R>,
{
    match parse_id(&id) {
        Ok(id) => respond(R::service(&state).get(id).await, StatusCode::OK),
        Err(e) => reject(e),
    }
}

pub async fn games_of<P: GameParent>(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Response
where
    dyn Store: Repository<P>,
{
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(e) => return reject(e),
    };
    respond(
        state
            .games
            .list_within::<P>(&params, &WITHIN_PARENT, id, P::GAME_COLUMNS)
            .await,
        StatusCode::OK,
    )
}

pub async fn stats_of_game(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(e) => return reject(e),
    };
    respond(
        state
            .statistics
            .list_within::<Game>(&params, Statistic::query_config(), id, GAME_STATS)
            .await,
        StatusCode::OK,
    )
}

pub async fn create<R: Exposed>(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Response
where
    dyn Store: Repository<R>,
{
    match batch(body) {
        Ok(records) => respond(R::service(&state).create(records).await, StatusCode::CREATED),
        Err(e) => reject(e),
    }
}

pub async fn update<R: Exposed>(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Response
where
    dyn Store: Repository<R>,
{
    match batch(body) {
        Ok(records) => respond(R::service(&state).update(records).await, StatusCode::OK),
        Err(e) => reject(e),
    }
}

pub async fn delete<R: Exposed>(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Response
where
    dyn Store: Repository<R>,
{
    match batch(body) {
        Ok(records) => respond(R::service(&state).delete(records).await, StatusCode::OK),
        Err(e) => reject(e),
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Path ids must be positive integers
fn parse_id(raw: &str) -> Result<i64, EngineError> {
    match raw.trim().parse::<i64>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(EngineError::invalid_input("id", "must be a positive integer")),
    }
}

/// A body is either one record or an array of records
fn batch(body: Result<Json<Value>, JsonRejection>) -> Result<Vec<Value>, EngineError> {
    let Json(body) = body.map_err(|e| EngineError::invalid_input("body", e.body_text()))?;
    match body {
        Value::Array(records) => Ok(records),
        record @ Value::Object(_) => Ok(vec![record]),
        _ => Err(EngineError::invalid_input(
            "body",
            "must be a JSON object or an array of objects",
        )),
    }
}

fn reject(err: EngineError) -> Response {
    respond(OperationResult::<()>::settle(Err(err), "", 0), StatusCode::OK)
}

fn respond<T: Serialize>(
    result: Result<OperationResult<T>, StoreError>,
    success: StatusCode,
) -> Response {
    match result {
        Ok(envelope) => {
            let status = envelope
                .failure_kind()
                .map_or(success, |kind| kind.status_code());
            (status, Json(envelope)).into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "request failed on a store error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "success": false,
                    "message": "Internal storage error",
                    "data": null,
                    "errors": null
                })),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_id() {
        assert_eq!(parse_id("12").unwrap(), 12);
        assert!(parse_id("0").is_err());
        assert!(parse_id("-3").is_err());
        assert!(parse_id("abc").is_err());
    }

    #[test]
    fn test_batch_shapes() {
        let one = batch(Ok(Json(json!({"team_name": "A"})))).unwrap();
        assert_eq!(one.len(), 1);

        let many = batch(Ok(Json(json!([{"a": 1}, {"a": 2}])))).unwrap();
        assert_eq!(many.len(), 2);

        let err = batch(Ok(Json(json!(5)))).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }
}
