//! HTTP surface of the queue and read-only match views.

use actix_web::{error, web, Error, HttpRequest, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::race::types::PlayerInfo;
use crate::server::http_error::{engine_error, http_error_response, identity_error};
use crate::server::identity::resolve_identity;
use crate::server::matchmaking::messages::{GetQueueStatus, JoinQueue, LeaveQueue, LookupMatch};
use crate::server::race_session::messages::GetSnapshot;
use crate::server::state::AppState;

const DEFAULT_LEADERBOARD_LIMIT: usize = 10;
const MAX_LEADERBOARD_LIMIT: usize = 100;

#[derive(Debug, Default, Deserialize)]
pub struct JoinBody {
    pub hint: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct LeaderboardQuery {
    pub limit: Option<usize>,
}

fn identity(req: &HttpRequest) -> Result<PlayerInfo, HttpResponse> {
    resolve_identity(req.query_string()).map_err(|e| identity_error(&e))
}

pub async fn join_queue(
    req: HttpRequest,
    body: Option<web::Json<JoinBody>>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let player = match identity(&req) {
        Ok(player) => player,
        Err(resp) => return Ok(resp),
    };
    let hint = body.and_then(|b| b.into_inner().hint);
    let reply = data
        .matchmaking
        .send(JoinQueue { player, hint })
        .await
        .map_err(error::ErrorInternalServerError)?;
    Ok(match reply {
        Ok(view) => HttpResponse::Ok().json(view),
        Err(e) => engine_error(&e),
    })
}

pub async fn leave_queue(req: HttpRequest, data: web::Data<AppState>) -> Result<HttpResponse, Error> {
    let player = match identity(&req) {
        Ok(player) => player,
        Err(resp) => return Ok(resp),
    };
    let removed = data
        .matchmaking
        .send(LeaveQueue { participant: player.id })
        .await
        .map_err(error::ErrorInternalServerError)?;
    Ok(HttpResponse::Ok().json(json!({ "removed": removed })))
}

pub async fn queue_status(req: HttpRequest, data: web::Data<AppState>) -> Result<HttpResponse, Error> {
    let player = match identity(&req) {
        Ok(player) => player,
        Err(resp) => return Ok(resp),
    };
    let view = data
        .matchmaking
        .send(GetQueueStatus { participant: player.id })
        .await
        .map_err(error::ErrorInternalServerError)?;
    Ok(HttpResponse::Ok().json(view))
}

pub async fn get_match(path: web::Path<String>, data: web::Data<AppState>) -> Result<HttpResponse, Error> {
    let raw = path.into_inner();
    let Ok(match_id) = Uuid::parse_str(&raw) else {
        return Ok(http_error_response(
            "INVALID_MATCH_ID",
            &format!("malformed match id '{raw}'"),
            actix_web::http::StatusCode::BAD_REQUEST,
        ));
    };
    let summary = match data
        .matchmaking
        .send(LookupMatch { match_id })
        .await
        .map_err(error::ErrorInternalServerError)?
    {
        Ok(summary) => summary,
        Err(e) => return Ok(engine_error(&e)),
    };
    let snapshot = match &summary.race {
        Some(race) => Some(race.send(GetSnapshot).await.map_err(error::ErrorInternalServerError)?),
        None => None,
    };
    Ok(HttpResponse::Ok().json(json!({
        "match_id": summary.match_id,
        "phase": summary.phase,
        "participants": summary.participants,
        "race": snapshot,
    })))
}

pub async fn leaderboard(query: web::Query<LeaderboardQuery>, data: web::Data<AppState>) -> HttpResponse {
    let limit = query.limit.unwrap_or(DEFAULT_LEADERBOARD_LIMIT).min(MAX_LEADERBOARD_LIMIT);
    HttpResponse::Ok().json(data.leaderboard.top(limit))
}
