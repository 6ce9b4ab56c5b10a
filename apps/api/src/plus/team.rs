use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::plus::TeamMemberRow;
use crate::models::user::UserIdQuery;
use crate::plus::require_plus;
use crate::state::AppState;

pub const DEFAULT_ROLE: &str = "collaborator";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InviteRequest {
    pub owner_user_id: Uuid,
    pub invitee_email: String,
    pub role: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamMemberView {
    pub id: Uuid,
    pub member_email: String,
    pub role: String,
    pub joined_at: DateTime<Utc>,
}

impl From<TeamMemberRow> for TeamMemberView {
    fn from(row: TeamMemberRow) -> Self {
        Self {
            id: row.id,
            member_email: row.member_email,
            role: row.role,
            joined_at: row.joined_at,
        }
    }
}

/// Trimmed, lower-cased email. Rejects anything without a local part and a
/// domain.
pub fn normalize_email(raw: &str) -> Result<String, AppError> {
    let email = raw.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(email),
        _ => Err(AppError::Validation(format!("Invalid email address: {raw}"))),
    }
}

pub fn resolve_role(role: Option<&str>) -> String {
    role.map(str::trim)
        .filter(|r| !r.is_empty())
        .unwrap_or(DEFAULT_ROLE)
        .to_lowercase()
}

/// GET /api/plus/team
pub async fn handle_list_team(
    State(state): State<AppState>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<Value>, AppError> {
    require_plus(&state.db, params.user_id).await?;

    let members: Vec<TeamMemberView> = sqlx::query_as::<_, TeamMemberRow>(
        "SELECT * FROM team_members WHERE owner_id = $1 ORDER BY joined_at ASC",
    )
    .bind(params.user_id)
    .fetch_all(&state.db)
    .await?
    .into_iter()
    .map(TeamMemberView::from)
    .collect();

    Ok(Json(json!({ "members": members })))
}

/// POST /api/plus/team
pub async fn handle_invite(
    State(state): State<AppState>,
    Json(req): Json<InviteRequest>,
) -> Result<Json<TeamMemberView>, AppError> {
    let email = normalize_email(&req.invitee_email)?;
    require_plus(&state.db, req.owner_user_id).await?;

    let exists: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM team_members WHERE owner_id = $1 AND member_email = $2)",
    )
    .bind(req.owner_user_id)
    .bind(&email)
    .fetch_one(&state.db)
    .await?;
    if exists {
        return Err(AppError::Conflict(format!("{email} is already on the team")));
    }

    let row = sqlx::query_as::<_, TeamMemberRow>(
        r#"
        INSERT INTO team_members (id, owner_id, member_email, role)
        VALUES ($1, $2, $3, $4)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(req.owner_user_id)
    .bind(&email)
    .bind(resolve_role(req.role.as_deref()))
    .fetch_one(&state.db)
    .await?;

    info!("User {} added {} to their team", req.owner_user_id, email);
    Ok(Json(TeamMemberView::from(row)))
}

/// DELETE /api/plus/team/:id
pub async fn handle_remove_member(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<Value>, AppError> {
    require_plus(&state.db, params.user_id).await?;

    let result = sqlx::query("DELETE FROM team_members WHERE id = $1 AND owner_id = $2")
        .bind(id)
        .bind(params.user_id)
        .execute(&state.db)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(format!("Team member {id} not found")));
    }

    Ok(Json(json!({ "success": true })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  Ada@School.EDU ").unwrap(), "ada@school.edu");
        assert!(normalize_email("ada").is_err());
        assert!(normalize_email("@school.edu").is_err());
        assert!(normalize_email("ada@localhost").is_err());
    }

    #[test]
    fn test_resolve_role() {
        assert_eq!(resolve_role(None), "collaborator");
        assert_eq!(resolve_role(Some("  ")), "collaborator");
        assert_eq!(resolve_role(Some("Viewer")), "viewer");
    }
}
