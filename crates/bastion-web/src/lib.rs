//! HTTP side of the bot: Strava webhooks, the OAuth accept callback and the
//! settings API.

mod auth;
mod error;
mod hooks;
mod settings;

pub use error::{status_for, ApiError};

use std::sync::Arc;

use anyhow::Context;
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use bastion_core::fit::{poster::ActivityPoster, FitContext};
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct WebState {
    pub fit: FitContext,
    pub poster: Arc<ActivityPoster>,
    pub settings_url: String,
}

pub fn router(state: WebState) -> Router {
    let api = Router::new()
        .route("/api/hr", get(settings::get_max_hr).post(settings::update_max_hr))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::validate_token,
        ));

    Router::new()
        .route("/activity", post(hooks::post_activity).get(hooks::verify_hook))
        .route("/hub-challenge", get(hooks::verify_hook))
        .route("/auth/login", post(auth::login))
        .route("/auth/accept", get(auth::accept))
        .route("/health", get(|| async { "ok" }))
        .merge(api)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve until `shutdown` is cancelled.
pub async fn serve(addr: &str, state: WebState, shutdown: CancellationToken) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind web server to {addr}"))?;
    tracing::info!(addr = %addr, "starting web server");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .context("web server failed")?;

    tracing::info!("web server stopped");
    Ok(())
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::{sync::Arc, time::Duration};

    use axum::{
        body::{to_bytes, Body},
        http::{Request, Response},
    };
    use bastion_core::{
        bastion::{Bastion, BastionSettings},
        domain::{ChannelId, StravaId, UserId},
        fit::{
            poster::{ActivityPoster, PosterSettings},
            store::{AuthRepository, MemoryStore, UserRepository},
            user::User,
            FitContext,
        },
        router::Router,
        testing::{FakeChat, FakeStrava},
    };
    use tower::ServiceExt;

    use super::{router, WebState};

    pub const CHANNEL: u64 = 900;

    pub struct Harness {
        pub chat: Arc<FakeChat>,
        pub store: Arc<MemoryStore>,
        pub strava: Arc<FakeStrava>,
        pub state: WebState,
    }

    impl Harness {
        pub fn new() -> Self {
            let chat = Arc::new(FakeChat::new());
            chat.add_channel(CHANNEL);
            let store = Arc::new(MemoryStore::new());
            let strava = Arc::new(FakeStrava::new());
            let fit = FitContext::from_store(store.clone(), strava.clone(), "!");
            let bastion = Arc::new(Bastion::new(
                BastionSettings {
                    instigator: "!".to_string(),
                    max_concurrent_commands: None,
                },
                Router::new(),
                chat.clone(),
            ));
            let poster = Arc::new(ActivityPoster::new(
                fit.clone(),
                bastion,
                PosterSettings {
                    post_channel: Some(ChannelId(CHANNEL)),
                    post_delay: Duration::ZERO,
                    max_age: Duration::from_secs(36 * 3600),
                },
            ));
            let state = WebState {
                fit,
                poster,
                settings_url: "http://localhost:3000/settings".to_string(),
            };
            Self {
                chat,
                store,
                strava,
                state,
            }
        }

        /// Create an auth record for `id` and return its token.
        pub async fn token_for(&self, id: u64) -> String {
            let (_, password) = self.store.get_or_create(UserId(id)).await.unwrap();
            format!("{id}.{}", password.unwrap())
        }

        /// Link `id` to Strava athlete `athlete` with a default user record.
        pub async fn link(&self, id: u64, athlete: &str) {
            let (mut record, _) = self.store.get_or_create(UserId(id)).await.unwrap();
            record.link_to_strava(StravaId::from(athlete), "refresh");
            self.store.save_auth(&record).await.unwrap();
            self.store.save_user(&User::new(UserId(id))).await.unwrap();
        }

        pub async fn send(&self, req: Request<Body>) -> Response<Body> {
            router(self.state.clone()).oneshot(req).await.unwrap()
        }
    }

    pub async fn body_string(resp: Response<Body>) -> String {
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    pub async fn body_json(resp: Response<Body>) -> serde_json::Value {
        serde_json::from_str(&body_string(resp).await).unwrap()
    }

    pub fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    pub fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }
}
