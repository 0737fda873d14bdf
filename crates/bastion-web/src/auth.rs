use axum::{
    extract::{Query, Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::{Html, IntoResponse, Redirect, Response},
    Json,
};
use bastion_core::{
    domain::UserId,
    errors::Error,
    fit::{
        auth::parse_token,
        strava::has_required_scopes,
        user::User,
    },
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::{error::ApiError, WebState};

/// Member id attached to requests that passed [`validate_token`].
#[derive(Clone, Copy, Debug)]
pub(crate) struct AuthorizedUser(pub UserId);

/// Require an `Authorization: discordId.password` header.
pub(crate) async fn validate_token(
    State(state): State<WebState>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let authorized = async {
        let token = token.ok_or_else(|| Error::Unauthorized("No token provided".to_string()))?;
        let (id, password) = parse_token(&token)?;
        state.fit.auth.get_authorized(id, password).await?;
        Ok::<_, Error>(id)
    }
    .await;

    match authorized {
        Ok(id) => {
            request.extensions_mut().insert(AuthorizedUser(id));
            next.run(request).await
        }
        Err(e) => ApiError(e).into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct LoginRequest {
    #[serde(default)]
    token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LoginResponse {
    discord_id: String,
    token: String,
    is_connected: bool,
    auth_url: Option<String>,
}

/// Validate a connect token from the settings page and hand back the Strava
/// authorization URL when the member still has to connect.
pub(crate) async fn login(
    State(state): State<WebState>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let record = async {
        let (id, password) = parse_token(&body.token)?;
        state.fit.auth.get_authorized(id, password).await
    }
    .await
    .map_err(|e| {
        debug!(error = %e, "login rejected");
        ApiError(Error::Unauthorized(format!(
            "There is a problem with the URL, please try to use {}fit auth again",
            state.fit.instigator
        )))
    })?;

    let is_connected = record.is_connected();
    Ok(Json(LoginResponse {
        discord_id: record.discord_id.to_string(),
        auth_url: (!is_connected).then(|| state.fit.strava.authorize_url(&body.token)),
        token: body.token,
        is_connected,
    }))
}

#[derive(Debug, Deserialize)]
pub(crate) struct AcceptQuery {
    code: Option<String>,
    state: Option<String>,
    #[serde(default)]
    scope: String,
}

const MISSING_SCOPES_PAGE: &str = r#"
Authorization failed, the bot won't work unless you accept both permissions
<ul>
  <li><b>View your complete Strava profile</b> - This permission is needed to access heart rate data</li>
  <li><b>View data about your private activities</b> - This permission is needed to get accurate distance measurement for when you opt in for private zones</li>
</ul>
If you want to redo it, click on the auth url again in your DMs and re-auth.
"#;

/// Landing page of the Strava authorization grant.
pub(crate) async fn accept(
    State(state): State<WebState>,
    Query(query): Query<AcceptQuery>,
) -> Response {
    let (Some(code), Some(token)) = (query.code, query.state) else {
        return "Invalid token".into_response();
    };
    if !has_required_scopes(&query.scope) {
        return Html(MISSING_SCOPES_PAGE).into_response();
    }

    match link_account(&state, &code, &token).await {
        Ok(id) => {
            debug!(user_id = %id, "strava account linked");
            Redirect::to(&state.settings_url).into_response()
        }
        Err(Error::NotConnected(msg)) => {
            debug!(error = %msg, "failed to accept token");
            format!(
                "Something went wrong when trying to authorize your account. Try using {}fit auth once again",
                state.fit.instigator
            )
            .into_response()
        }
        Err(e) => {
            error!(error = %e, "failed to accept token");
            "Something unexpected went wrong and your account couldn't be connected"
                .into_response()
        }
    }
}

async fn link_account(state: &WebState, code: &str, token: &str) -> bastion_core::Result<UserId> {
    let (id, password) = parse_token(token)?;
    let fit = &state.fit;

    let load_user = async {
        Ok::<_, Error>(fit.users.find_user(id).await?.unwrap_or_else(|| User::new(id)))
    };
    let (mut auth, mut user, grant) = tokio::try_join!(
        fit.auth.get_authorized(id, password),
        load_user,
        fit.strava.exchange_code(code),
    )?;

    auth.link_to_strava(grant.athlete.id, grant.refresh_token);
    user.update_gender(grant.athlete.sex.as_deref());
    tokio::try_join!(fit.auth.save_auth(&auth), fit.users.save_user(&user))?;
    Ok(id)
}
