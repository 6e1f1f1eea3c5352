use domain::jwt::JwtAuthenticator;
use events::{EventLog, MemoryEventLog, PgEventLog};
use log::*;
use migration::{DbErr, Migrator, MigratorTrait};
use service::config::{Config, EventLogBackend};
use service::logging::Logger;
use sse::Hub;
use std::process;
use std::sync::Arc;
use web::AppState;

#[tokio::main]
async fn main() {
    let config = Config::new();

    if let Err(e) = Logger::init_logger(&config) {
        eprintln!("Failed to initialize logger: {e}");
    }

    info!(
        "Starting up stream hub ({} environment, {} event log)",
        config.runtime_env(),
        config.event_log
    );

    let authenticator = match JwtAuthenticator::from_config(&config) {
        Ok(authenticator) => authenticator,
        Err(e) => {
            error!("Cannot authenticate stream clients: {e}");
            process::exit(1);
        }
    };

    let event_log: Arc<dyn EventLog> = match config.event_log {
        EventLogBackend::Memory => {
            warn!("Using the in-memory event log: events are lost on restart");
            Arc::new(MemoryEventLog::new())
        }
        EventLogBackend::Postgres => match init_postgres_log(&config).await {
            Ok(log) => Arc::new(log),
            Err(e) => {
                error!("Failed to open the Postgres event log: {e}");
                process::exit(1);
            }
        },
    };

    let hub = match Hub::start(event_log, config.heartbeat_interval()).await {
        Ok(hub) => Arc::new(hub),
        Err(e) => {
            error!("Failed to start the stream hub: {e}");
            process::exit(1);
        }
    };

    let app_state = AppState::new(config, hub, Arc::new(authenticator));

    if let Err(e) = web::init_server(app_state, shutdown_signal()).await {
        error!("Server stopped with an error: {e}");
        process::exit(1);
    }

    info!("Server stopped");
}

async fn init_postgres_log(config: &Config) -> Result<PgEventLog, DbErr> {
    let db = service::init_database(config).await?;
    Migrator::up(&db, None).await?;

    Ok(PgEventLog::new(Arc::new(db), config.database_url()))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
