//! HTTP routes + handlers.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use skirmish_core::PlayerId;
use skirmish_infra::jobs::{JobId, JobStatus};
use skirmish_infra::BattleJobPayload;
use skirmish_players::{Player, PlayerDraft};

use crate::app::errors;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/players", post(create_player))
        .route("/players/:id", get(get_player))
        .route("/leaderboard", get(leaderboard))
        .route("/battles", post(start_battle))
        .route("/battles/:id", get(battle_status))
        .route("/admin/jobs", get(job_stats))
}

pub async fn health() -> axum::response::Response {
    (StatusCode::OK, Json(json!({"status": "ok"}))).into_response()
}

pub async fn create_player(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<PlayerDraft>,
) -> axum::response::Response {
    let player = match Player::register(body) {
        Ok(p) => p,
        Err(e) => return errors::domain_error_to_response(e),
    };

    if let Err(e) = services.register_player(&player) {
        return errors::store_error_to_response(e);
    }

    (StatusCode::CREATED, Json(player)).into_response()
}

pub async fn get_player(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: PlayerId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid player id"),
    };

    match services.get_player(id) {
        Ok(Some(player)) => (StatusCode::OK, Json(player)).into_response(),
        Ok(None) => errors::json_error(StatusCode::NOT_FOUND, "not_found", "player not found"),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn leaderboard(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    let entries = match services.leaderboard_top(10) {
        Ok(v) => v,
        Err(e) => return errors::store_error_to_response(e),
    };

    let body: Vec<_> = entries
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            json!({
                "rank": i + 1,
                "player_id": entry.player_id,
                "score": entry.score,
            })
        })
        .collect();

    (StatusCode::OK, Json(body)).into_response()
}

#[derive(Debug, Deserialize)]
pub struct StartBattleRequest {
    pub attacker_id: PlayerId,
    pub defender_id: PlayerId,
}

pub async fn start_battle(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<StartBattleRequest>,
) -> axum::response::Response {
    if body.attacker_id == body.defender_id {
        return errors::json_error(
            StatusCode::BAD_REQUEST,
            "invalid_battle",
            "a player cannot battle itself",
        );
    }

    let attacker = match services.get_player(body.attacker_id) {
        Ok(Some(p)) => p,
        Ok(None) => return errors::json_error(StatusCode::NOT_FOUND, "not_found", "attacker not found"),
        Err(e) => return errors::store_error_to_response(e),
    };
    let defender = match services.get_player(body.defender_id) {
        Ok(Some(p)) => p,
        Ok(None) => return errors::json_error(StatusCode::NOT_FOUND, "not_found", "defender not found"),
        Err(e) => return errors::store_error_to_response(e),
    };

    let battle_id = match services.enqueue_battle(BattleJobPayload { attacker, defender }) {
        Ok(id) => id,
        Err(e) => return errors::job_store_error_to_response(e),
    };

    (
        StatusCode::ACCEPTED,
        Json(json!({
            "status": "queued",
            "battle_id": battle_id,
        })),
    )
        .into_response()
}

pub async fn battle_status(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: JobId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid battle id"),
    };

    let job = match services.battle_job(id) {
        Ok(Some(job)) => job,
        Ok(None) => return errors::json_error(StatusCode::NOT_FOUND, "not_found", "battle not found"),
        Err(e) => return errors::job_store_error_to_response(e),
    };

    let (status, error) = match &job.status {
        JobStatus::Pending => ("queued", None),
        JobStatus::Running => ("running", None),
        JobStatus::Completed => ("completed", None),
        JobStatus::Failed { error, .. } => ("retrying", Some(error.clone())),
        JobStatus::DeadLettered { error, .. } => ("failed", Some(error.clone())),
    };

    (
        StatusCode::OK,
        Json(json!({
            "battle_id": job.id,
            "status": status,
            "attempts": job.attempt,
            "error": error,
        })),
    )
        .into_response()
}

pub async fn job_stats(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    let queue = match services.job_queue_stats() {
        Ok(s) => s,
        Err(e) => return errors::job_store_error_to_response(e),
    };
    let executor = services.executor().stats();

    (
        StatusCode::OK,
        Json(json!({
            "queue": queue,
            "executor": executor,
        })),
    )
        .into_response()
}
