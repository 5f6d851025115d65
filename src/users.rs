use crate::auth::AuthUser;
use crate::error::UserError;
use crate::startup::AppState;
use axum::{
    extract::{Extension, Json, Path},
    response::IntoResponse,
};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub poll_count: i64,
}

/// A user's profile and how many polls they have created
pub async fn get_user(
    Extension(app_state): Extension<AppState>,
    _caller: AuthUser,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, UserError> {
    let user = app_state
        .users
        .find_user_by_id(user_id)
        .await?
        .ok_or(UserError::UserNotFound)?;
    let poll_count = app_state.users.count_polls_by_creator(user.id).await?;

    Ok(Json(UserResponse {
        id: user.id,
        username: user.username,
        email: user.email,
        poll_count,
    }))
}
