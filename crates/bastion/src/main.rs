use std::sync::Arc;

use bastion_core::{
    bastion::{Bastion, BastionSettings},
    christmas,
    config::Config,
    errors::Error,
    fit::{
        self,
        poster::{ActivityPoster, PosterSettings},
        store::MemoryStore,
        strava::StravaApi,
        FitContext,
    },
    router::Router,
};
use bastion_discord::DiscordConnection;
use bastion_strava::StravaClient;
use bastion_web::WebState;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<(), bastion_core::Error> {
    bastion_core::logging::init("bastion")?;

    let cfg = Config::load()?;
    if cfg.strava_client_id.is_empty() || cfg.strava_client_secret.is_empty() {
        warn!("strava credentials not set; connecting accounts will fail");
    }

    let store = Arc::new(match &cfg.data_file {
        Some(path) => MemoryStore::open(path.clone())?,
        None => MemoryStore::new(),
    });
    let strava: Arc<dyn StravaApi> = Arc::new(StravaClient::new(
        cfg.strava_client_id.clone(),
        cfg.strava_client_secret.clone(),
        cfg.strava_redirect_uri.clone(),
    )?);
    let fit_ctx = FitContext::from_store(store, strava, cfg.instigator.clone());

    let mut router = Router::new();
    christmas::register(&mut router)?;
    fit::commands::register(&mut router, fit_ctx.clone())?;
    info!(commands = ?router.commands(), "registered commands");

    let DiscordConnection {
        backend,
        events,
        mut client,
    } = bastion_discord::connect(&cfg).await?;
    let bastion = Arc::new(Bastion::new(BastionSettings::from(&cfg), router, backend));
    let poster = Arc::new(ActivityPoster::new(
        fit_ctx.clone(),
        bastion.clone(),
        PosterSettings::from(&cfg),
    ));

    let shutdown = CancellationToken::new();
    let mut web = tokio::spawn({
        let addr = cfg.web_bind_address.clone();
        let state = WebState {
            fit: fit_ctx,
            poster,
            settings_url: cfg.settings_url.clone(),
        };
        let shutdown = shutdown.clone();
        async move { bastion_web::serve(&addr, state, shutdown).await }
    });

    let shard_manager = client.shard_manager.clone();
    let gateway = tokio::spawn(async move { client.start().await });

    let mut web_done = false;
    let result = tokio::select! {
        r = bastion.run(events, |ready| info!(bot = %ready.bot_name, "bastion connected")) => r,
        r = gateway => match r {
            Ok(Ok(())) => Err(Error::Disconnected),
            Ok(Err(e)) => Err(Error::External(format!("discord gateway failed: {e}"))),
            Err(e) => Err(Error::External(format!("discord task failed: {e}"))),
        },
        r = &mut web => {
            web_done = true;
            match r {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => Err(Error::External(format!("{e:#}"))),
                Err(e) => Err(Error::External(format!("web task failed: {e}"))),
            }
        },
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown requested");
            Ok(())
        }
    };

    shutdown.cancel();
    shard_manager.shutdown_all().await;
    if !web_done {
        match web.await {
            Ok(Err(e)) => error!(error = %format!("{e:#}"), "web server error"),
            Err(e) => error!(error = %e, "web task failed"),
            Ok(Ok(())) => {}
        }
    }

    if let Err(e) = &result {
        error!(error = %e, "bastion stopped");
    }
    result
}
