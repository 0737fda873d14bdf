use axum::{extract::State, Extension, Json};
use bastion_core::{errors::Error, fit::user::User};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{auth::AuthorizedUser, error::ApiError, WebState};

pub(crate) async fn get_max_hr(
    State(state): State<WebState>,
    Extension(AuthorizedUser(id)): Extension<AuthorizedUser>,
) -> Result<Json<Value>, ApiError> {
    let user = state.fit.users.get_user(id).await?;
    Ok(Json(json!({ "heartrate": user.max_hr })))
}

#[derive(Debug, Deserialize)]
pub(crate) struct UpdateHr {
    hr: f64,
}

pub(crate) async fn update_max_hr(
    State(state): State<WebState>,
    Extension(AuthorizedUser(id)): Extension<AuthorizedUser>,
    Json(body): Json<UpdateHr>,
) -> Result<Json<Value>, ApiError> {
    if !body.hr.is_finite() || body.hr.fract() != 0.0 || body.hr < 0.0 {
        return Err(Error::InvalidInput(format!("invalid heart rate {}", body.hr)).into());
    }
    tracing::debug!(user_id = %id, hr = body.hr, "updating max heart rate");

    let hr = body.hr as u32;
    state
        .fit
        .users
        .update_user(id, &mut |user: &mut User| user.update_max_heartrate(hr))
        .await?;
    Ok(Json(json!({ "success": true })))
}
