use crate::{
    config::{Env, MediaSettings},
    server::{ServerState, UploadSettings},
    storage::LocalMediaStorage,
};
use artfeed_common::media::{MediaRules, inspect::FfprobeInspector};
use artfeed_db::client::{DbClient, DbError};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use thiserror::Error;
use tracing::{debug, error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod server;
mod service;
mod storage;

#[derive(Debug, Error)]
enum InitError {
    #[error("Error parsing .env file: {0}")]
    Dotenv(#[from] dotenvy::Error),
    #[error("Error parsing environment: {0}")]
    Envy(#[from] envy::Error),
    #[error("Error preparing the database: {0}")]
    Database(#[from] DbError),
    #[error("Error binding tcp listener: {0}")]
    TcpBind(std::io::Error),
    #[error("Error serving server: {0}")]
    TcpServe(std::io::Error),
}

fn install_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "artfeed_api=debug,artfeed_common=debug,artfeed_db=debug,\
                tower_http=debug,axum::rejection=trace,sqlx=warn"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn get_env() -> Result<(Env, MediaSettings), InitError> {
    if let Err(e) = dotenvy::dotenv() {
        if e.not_found() {
            debug!("No .dotenv file found");
        } else {
            return Err(e.into());
        }
    }

    Ok((envy::from_env()?, MediaSettings::from_env()?))
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "Could not listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}

#[tokio::main]
async fn main() -> Result<(), InitError> {
    install_tracing();
    let (env, media_settings) = get_env()?;

    let rules = MediaRules::from(media_settings);
    debug!(?rules, "Loaded media rules");

    let db_client = DbClient::connect(
        &env.database_url,
        env.database_max_connections,
        env.snowflake_node_id,
    )
    .await?;
    db_client.migrate().await?;

    let state = ServerState::new(
        Arc::new(db_client),
        &rules,
        FfprobeInspector::new(
            env.ffprobe_path,
            Duration::from_secs(env.ffprobe_timeout_seconds),
        ),
        LocalMediaStorage::new(env.media_root),
        UploadSettings {
            temp_dir: env.upload_temp_dir,
        },
    );
    let app = server::app(state, env.max_request_bytes);

    let server_address = SocketAddr::new(env.server_address, env.server_port);
    let listener = tokio::net::TcpListener::bind(server_address)
        .await
        .map_err(InitError::TcpBind)?;
    info!(%server_address, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(InitError::TcpServe)?;

    Ok(())
}
