//! Handlers for `/clubs` and `/me/clubs` endpoints.
//!
//! | Method   | Path                 | Notes |
//! |----------|----------------------|-------|
//! | `GET`    | `/clubs`             | All clubs, oldest first |
//! | `POST`   | `/clubs`             | Caller becomes leader and sole member |
//! | `GET`    | `/clubs/{id}`        | 404 if not found |
//! | `PATCH`  | `/clubs/{id}`        | Leader or moderator only |
//! | `DELETE` | `/clubs/{id}`        | Leader only; absent club is 204 |
//! | `POST`   | `/clubs/{id}/join`   | Idempotent |
//! | `POST`   | `/clubs/{id}/leave`  | Idempotent |
//! | `GET`    | `/me/clubs`          | Optional `?category=&q=` |
//!
//! Every route requires the `x-user-id` header.

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use clubhouse_core::{
  club::{Club, ClubDetails, NewClub},
  membership::MembershipService,
  selector::{ClubFilter, Partition, partition},
  store::ClubStore,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{actor::Actor, error::ApiError};

// ─── List ─────────────────────────────────────────────────────────────────────

/// `GET /clubs`
pub async fn list<S: ClubStore>(
  State(service): State<MembershipService<S>>,
  _actor: Actor,
) -> Result<Json<Vec<Club>>, ApiError> {
  Ok(Json(service.list_clubs().await?))
}

// ─── Create ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub name:        String,
  pub category:    String,
  #[serde(default)]
  pub description: String,
  #[serde(default)]
  pub tags:        Vec<String>,
  /// Display name for the leader; defaults to the caller's id.
  pub leader_name: Option<String>,
  #[serde(default)]
  pub private:     bool,
  pub capacity:    Option<u32>,
}

/// `POST /clubs`: body: `{"name":"...","category":"..."}`
pub async fn create<S: ClubStore>(
  State(service): State<MembershipService<S>>,
  Actor(actor): Actor,
  Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError> {
  if body.name.trim().is_empty() {
    return Err(ApiError::BadRequest("name must not be empty".into()));
  }
  if body.capacity == Some(0) {
    return Err(ApiError::BadRequest("capacity must be at least 1".into()));
  }

  let club = service
    .create_club(NewClub {
      name:        body.name,
      category:    body.category,
      description: body.description,
      tags:        body.tags,
      leader_name: body.leader_name.unwrap_or_else(|| actor.clone()),
      leader_id:   actor,
      private:     body.private,
      capacity:    body.capacity,
    })
    .await?;
  Ok((StatusCode::CREATED, Json(club)))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /clubs/{id}`
pub async fn get_one<S: ClubStore>(
  State(service): State<MembershipService<S>>,
  _actor: Actor,
  Path(id): Path<Uuid>,
) -> Result<Json<Club>, ApiError> {
  Ok(Json(service.get_club(id).await?))
}

// ─── Update ───────────────────────────────────────────────────────────────────

/// `PATCH /clubs/{id}`: body: any subset of
/// `{"name","category","description","tags","recent_activity"}`
pub async fn update<S: ClubStore>(
  State(service): State<MembershipService<S>>,
  Actor(actor): Actor,
  Path(id): Path<Uuid>,
  Json(details): Json<ClubDetails>,
) -> Result<Json<Club>, ApiError> {
  service.update_club(id, &actor, details).await?;
  Ok(Json(service.get_club(id).await?))
}

// ─── Delete ───────────────────────────────────────────────────────────────────

/// `DELETE /clubs/{id}`
pub async fn delete<S: ClubStore>(
  State(service): State<MembershipService<S>>,
  Actor(actor): Actor,
  Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
  service.delete_club(id, &actor).await?;
  Ok(StatusCode::NO_CONTENT)
}

// ─── Membership ───────────────────────────────────────────────────────────────

/// `POST /clubs/{id}/join`
pub async fn join<S: ClubStore>(
  State(service): State<MembershipService<S>>,
  Actor(actor): Actor,
  Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
  service.join_club(id, &actor).await?;
  Ok(StatusCode::NO_CONTENT)
}

/// `POST /clubs/{id}/leave`
pub async fn leave<S: ClubStore>(
  State(service): State<MembershipService<S>>,
  Actor(actor): Actor,
  Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
  service.leave_club(id, &actor).await?;
  Ok(StatusCode::NO_CONTENT)
}

// ─── Mine ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct MineParams {
  pub category: Option<String>,
  pub q:        Option<String>,
}

/// `GET /me/clubs[?category=<cat>&q=<text>]`
pub async fn mine<S: ClubStore>(
  State(service): State<MembershipService<S>>,
  Actor(actor): Actor,
  Query(params): Query<MineParams>,
) -> Result<Json<Partition>, ApiError> {
  let clubs = service.list_clubs().await?;
  let filter = ClubFilter { category: params.category, search: params.q };
  Ok(Json(partition(&clubs, &actor, &filter)))
}
