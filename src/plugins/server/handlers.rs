use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Request, State},
  http::StatusCode,
  middleware::Next,
  response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use crate::{
  engine::{Outcome, Report},
  entity::{PrizeKind, RequirementKind, giveaway, participant, pre_winner, win},
  prelude::*,
  state::AppState,
  sv,
};

pub async fn require_key(
  State(app): State<Arc<AppState>>,
  request: Request,
  next: Next,
) -> Response {
  let key =
    request.headers().get("x-api-key").and_then(|key| key.to_str().ok());

  if key != Some(app.config.secret.as_str()) {
    let body = json::json!({
      "success": false,
      "error": "Invalid API key"
    });
    return (StatusCode::UNAUTHORIZED, Json(body)).into_response();
  }

  next.run(request).await
}

pub async fn health() -> &'static str {
  "OK"
}

pub async fn process_expired(
  State(app): State<Arc<AppState>>,
) -> Result<Json<Report>> {
  Ok(Json(app.engine.force_process_expired().await?))
}

#[derive(Debug, Deserialize)]
pub struct PreWinnersReq {
  pub user_ids: Vec<i64>,
}

pub async fn submit_pre_winners(
  State(app): State<Arc<AppState>>,
  Path(id): Path<i64>,
  Json(req): Json<PreWinnersReq>,
) -> Result<Json<Vec<pre_winner::Model>>> {
  let list = app.engine.submit_pre_winner_list(id, &req.user_ids).await?;
  Ok(Json(list))
}

pub async fn complete(
  State(app): State<Arc<AppState>>,
  Path(id): Path<i64>,
) -> Result<Json<Outcome>> {
  Ok(Json(app.engine.complete_with_custom_requirements(id).await?))
}

pub async fn archive(
  State(app): State<Arc<AppState>>,
  Path(id): Path<i64>,
) -> Result<Json<giveaway::Model>> {
  Ok(Json(app.engine.archive(id).await?))
}

#[derive(Debug, Serialize)]
pub struct WinsRes {
  pub giveaway: giveaway::Model,
  pub wins: Vec<win::Model>,
}

pub async fn wins(
  State(app): State<Arc<AppState>>,
  Path(id): Path<i64>,
) -> Result<Json<WinsRes>> {
  let sv = app.sv();
  let giveaway =
    sv.giveaway.by_id(id).await?.ok_or(Error::GiveawayNotFound(id))?;
  let wins = sv.win.by_giveaway(id).await?;
  Ok(Json(WinsRes { giveaway, wins }))
}

#[derive(Debug, Deserialize)]
pub struct PrizeReq {
  /// 0 covers every place without a prize of its own.
  #[serde(default)]
  pub place: i32,
  pub name: String,
  pub kind: PrizeKind,
}

#[derive(Debug, Deserialize)]
pub struct RequirementReq {
  pub kind: RequirementKind,
  pub channel: Option<String>,
  pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateGiveawayReq {
  pub creator_id: i64,
  pub title: String,
  pub description: Option<String>,
  pub started_at: Option<DateTime>,
  pub duration_seconds: i64,
  #[serde(default)]
  pub max_participants: i32,
  pub winners_count: i32,
  #[serde(default)]
  pub auto_distribute: bool,
  #[serde(default)]
  pub allow_tickets: bool,
  #[serde(default)]
  pub prizes: Vec<PrizeReq>,
  #[serde(default)]
  pub requirements: Vec<RequirementReq>,
}

pub async fn create_giveaway(
  State(app): State<Arc<AppState>>,
  Json(req): Json<CreateGiveawayReq>,
) -> Result<Json<giveaway::Model>> {
  let now = app.engine.now();
  let txn = app.db.begin().await?;

  let giveaways = sv::Giveaway::new(&txn);
  let giveaway = giveaways
    .create(
      sv::NewGiveaway {
        creator_id: req.creator_id,
        title: req.title,
        description: req.description,
        started_at: req.started_at.unwrap_or(now),
        duration_seconds: req.duration_seconds,
        max_participants: req.max_participants,
        winners_count: req.winners_count,
        auto_distribute: req.auto_distribute,
        allow_tickets: req.allow_tickets,
      },
      now,
    )
    .await?;

  for prize in req.prizes {
    let model =
      sv::Prize::new(&txn).create(req.creator_id, prize.name, now).await?;
    giveaways.add_prize(giveaway.id, prize.place, model.id, prize.kind).await?;
  }
  for requirement in req.requirements {
    giveaways
      .add_requirement(
        giveaway.id,
        requirement.kind,
        requirement.channel,
        requirement.description,
      )
      .await?;
  }

  txn.commit().await?;
  info!("Giveaway {} created by {}", giveaway.id, giveaway.creator_id);
  Ok(Json(giveaway))
}

#[derive(Debug, Deserialize)]
pub struct JoinReq {
  pub user_id: i64,
  pub username: Option<String>,
  pub avatar: Option<String>,
}

pub async fn join(
  State(app): State<Arc<AppState>>,
  Path(id): Path<i64>,
  Json(req): Json<JoinReq>,
) -> Result<Json<participant::Model>> {
  let now = app.engine.now();
  let sv = app.sv();
  let giveaway =
    sv.giveaway.by_id(id).await?.ok_or(Error::GiveawayNotFound(id))?;

  sv.user.upsert(req.user_id, req.username, req.avatar, now).await?;
  Ok(Json(sv.entry.join(&giveaway, req.user_id, now).await?))
}

#[derive(Debug, Deserialize)]
pub struct TicketsReq {
  pub user_id: i64,
  pub count: i64,
}

pub async fn set_tickets(
  State(app): State<Arc<AppState>>,
  Path(id): Path<i64>,
  Json(req): Json<TicketsReq>,
) -> Result<StatusCode> {
  let sv = app.sv();
  let giveaway =
    sv.giveaway.by_id(id).await?.ok_or(Error::GiveawayNotFound(id))?;

  if !giveaway.allow_tickets {
    return Err(Error::Validation(format!("giveaway {id} has no tickets")));
  }
  if !sv.entry.is_participant(id, req.user_id).await? {
    return Err(Error::Validation(format!(
      "user {} is not a participant",
      req.user_id
    )));
  }

  sv.entry.set_tickets(id, req.user_id, req.count).await?;
  Ok(StatusCode::NO_CONTENT)
}
