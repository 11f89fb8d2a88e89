//! HTTP surface: read accessors, health, and the manual sync trigger.
//!
//! Thin glue over the application services; every handler formats a service
//! result as JSON and maps failures onto a status code.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::application::service::FplDataService;
use crate::application::source::UpstreamError;
use crate::application::sync::{SyncReport, SyncService, UpdateCheck};
use crate::cache::KeyValueStore;
use crate::cache::keys::PlayerFilter;
use crate::domain::entities::{Fixture, Gameweek, Player, PlayerGameweekStat, Team};
use crate::domain::position::Position;
use crate::domain::upstream::{GameweekLive, PlayerDetail};
use crate::infra::db::PostgresRepositories;

const SOURCE: &str = "infra::http";

#[derive(Clone)]
pub struct ApiState {
    pub service: Arc<FplDataService>,
    pub sync: Arc<SyncService>,
    pub db: Arc<PostgresRepositories>,
    pub store: Arc<dyn KeyValueStore>,
}

pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/status", get(status))
        .route("/teams", get(teams))
        .route("/players", get(players))
        .route("/players/{id}/detail", get(player_detail))
        .route("/players/{id}/gameweeks/{gw}", get(player_gameweek_stat))
        .route("/gameweeks", get(gameweeks))
        .route("/gameweeks/current", get(current_gameweek))
        .route("/gameweeks/next", get(next_gameweek))
        .route("/gameweeks/{id}/live", get(live_gameweek))
        .route("/fixtures", get(fixtures))
        .route("/sync", post(run_sync))
        .route("/sync/check", post(run_update_check))
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

type HandlerError = (StatusCode, Json<ErrorBody>);

fn upstream_error(err: UpstreamError) -> HandlerError {
    let status = match &err {
        UpstreamError::Status { status: 404 } => StatusCode::NOT_FOUND,
        _ => StatusCode::BAD_GATEWAY,
    };
    (
        status,
        Json(ErrorBody {
            error: err.to_string(),
        }),
    )
}

fn bad_request(message: impl Into<String>) -> HandlerError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorBody {
            error: message.into(),
        }),
    )
}

#[derive(Debug, Serialize)]
struct HealthBody {
    database: bool,
    cache: bool,
}

async fn health(State(state): State<ApiState>) -> (StatusCode, Json<HealthBody>) {
    let database = match state.db.health_check().await {
        Ok(()) => true,
        Err(db_error) => {
            error!(target: SOURCE, error = %db_error, "database health check failed");
            false
        }
    };
    let cache = match state.store.ping().await {
        Ok(()) => true,
        Err(cache_error) => {
            error!(target: SOURCE, error = %cache_error, "cache health check failed");
            false
        }
    };

    let status = if database && cache {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(HealthBody { database, cache }))
}

#[derive(Debug, Serialize)]
struct StatusBody {
    gameweek_active: bool,
}

async fn status(State(state): State<ApiState>) -> Json<StatusBody> {
    Json(StatusBody {
        gameweek_active: state.service.is_gameweek_active().await,
    })
}

async fn teams(State(state): State<ApiState>) -> Result<Json<Vec<Team>>, HandlerError> {
    state.service.get_teams().await.map(Json).map_err(upstream_error)
}

#[derive(Debug, Deserialize)]
struct PlayerQuery {
    team_id: Option<i64>,
    position: Option<String>,
}

async fn players(
    State(state): State<ApiState>,
    Query(query): Query<PlayerQuery>,
) -> Result<Json<Vec<Player>>, HandlerError> {
    let position = match query.position.as_deref() {
        Some(label) => Some(
            Position::from_label(label)
                .ok_or_else(|| bad_request(format!("unknown position `{label}`")))?,
        ),
        None => None,
    };
    let filter = PlayerFilter {
        team_id: query.team_id,
        position,
    };
    state
        .service
        .get_players(filter)
        .await
        .map(Json)
        .map_err(upstream_error)
}

async fn player_detail(
    State(state): State<ApiState>,
    Path(player_id): Path<i64>,
) -> Result<Json<PlayerDetail>, HandlerError> {
    state
        .service
        .get_player_detail(player_id)
        .await
        .map(Json)
        .map_err(upstream_error)
}

async fn player_gameweek_stat(
    State(state): State<ApiState>,
    Path((player_id, gameweek_id)): Path<(i64, i64)>,
) -> Result<Json<PlayerGameweekStat>, HandlerError> {
    match state
        .service
        .get_player_gameweek_stats(player_id, gameweek_id)
        .await
    {
        Some(stat) => Ok(Json(stat)),
        None => Err((
            StatusCode::NOT_FOUND,
            Json(ErrorBody {
                error: format!("no stat line for player {player_id} in gameweek {gameweek_id}"),
            }),
        )),
    }
}

async fn gameweeks(State(state): State<ApiState>) -> Result<Json<Vec<Gameweek>>, HandlerError> {
    state
        .service
        .get_gameweeks()
        .await
        .map(Json)
        .map_err(upstream_error)
}

async fn current_gameweek(
    State(state): State<ApiState>,
) -> Result<Json<Option<Gameweek>>, HandlerError> {
    state
        .service
        .get_current_gameweek()
        .await
        .map(Json)
        .map_err(upstream_error)
}

async fn next_gameweek(
    State(state): State<ApiState>,
) -> Result<Json<Option<Gameweek>>, HandlerError> {
    state
        .service
        .get_next_gameweek()
        .await
        .map(Json)
        .map_err(upstream_error)
}

async fn live_gameweek(
    State(state): State<ApiState>,
    Path(gameweek_id): Path<i64>,
) -> Result<Json<GameweekLive>, HandlerError> {
    state
        .service
        .get_live_gameweek(gameweek_id)
        .await
        .map(Json)
        .map_err(upstream_error)
}

#[derive(Debug, Deserialize)]
struct FixtureQuery {
    gameweek: Option<i64>,
}

async fn fixtures(
    State(state): State<ApiState>,
    Query(query): Query<FixtureQuery>,
) -> Result<Json<Vec<Fixture>>, HandlerError> {
    state
        .service
        .get_fixtures(query.gameweek)
        .await
        .map(Json)
        .map_err(upstream_error)
}

async fn run_sync(State(state): State<ApiState>) -> (StatusCode, Json<SyncReport>) {
    let report = state.sync.sync_all().await;
    let status = if report.success {
        StatusCode::OK
    } else {
        StatusCode::BAD_GATEWAY
    };
    (status, Json(report))
}

async fn run_update_check(State(state): State<ApiState>) -> (StatusCode, Json<UpdateCheck>) {
    let check = state.sync.check_for_updates().await;
    let status = if check.success {
        StatusCode::OK
    } else {
        StatusCode::BAD_GATEWAY
    };
    (status, Json(check))
}
