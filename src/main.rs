//! Ascendia binary entrypoint wiring the roster services, the admin REST API and the Discord bot.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use tokio::{net::TcpListener, sync::watch};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ascendia_back::{
    config::{AppConfig, Secrets},
    dao::{
        cache::LocalCache,
        roster_store::airtable::{AirtableConfig, AirtableRosterStore},
    },
    discord::DiscordBot,
    ladder::OpenDotaClient,
    routes,
    services::{community_service::CommunityService, guild_actions::GuildActions},
    state::{AppState, SharedState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let secrets = Secrets::from_env();

    let airtable = AirtableConfig::from_env();
    if !airtable.is_configured() {
        warn!("AIRTABLE_TOKEN or AIRTABLE_BASE_ID missing; running from the local cache only");
    }
    let store = AirtableRosterStore::new(airtable).context("building Airtable client")?;
    let ladder = OpenDotaClient::new(&config.ladder_url).context("building ladder client")?;

    let community = Arc::new(CommunityService::new(
        Arc::new(store),
        Arc::new(ladder),
        LocalCache::new(config.cache_dir.clone()),
        config.community.clone(),
    ));
    community.initialize_from_cache().await;
    if let Err(err) = community.guild_settings_list(true).await {
        warn!(error = %err, "failed to load guild settings; using cached values");
    }

    let actions = GuildActions::new(community, config.emojis.clone());
    if secrets.admin_token.is_none() {
        warn!("ADMIN_TOKEN missing; mutating admin routes are disabled");
    }
    let port = env::var("PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(config.port);
    let app_state = AppState::new(config, actions.clone(), secrets.admin_token.clone());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("shutdown requested");
        let _ = shutdown_tx.send(true);
    });

    let bot = match secrets.discord_token.as_deref() {
        Some(token) => {
            let bot = DiscordBot::new(token, secrets.discord_guild_id, actions)
                .await
                .context("building Discord client")?;
            let shutdown = wait_for_shutdown(shutdown_rx.clone());
            Some(tokio::spawn(async move {
                if let Err(err) = bot.run(shutdown).await {
                    error!(error = ?err, "discord bot stopped");
                }
            }))
        }
        None => {
            warn!("DISCORD_TOKEN missing; starting without the Discord bot");
            None
        }
    };

    // Build the HTTP router once the shared state is ready.
    let app = build_router(app_state);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(wait_for_shutdown(shutdown_rx))
        .await
        .context("serving axum")?;

    if let Some(bot) = bot {
        if let Err(err) = bot.await {
            error!(error = %err, "discord task panicked");
        }
    }

    Ok(())
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Resolve once the shutdown flag flips, or when its sender is gone.
async fn wait_for_shutdown(mut rx: watch::Receiver<bool>) {
    let _ = rx.wait_for(|stop| *stop).await;
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler; waiting for Ctrl+C");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
