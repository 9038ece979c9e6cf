//! PLYR settlement backend entrypoint wiring the REST layer and the entity store.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::{Context, bail};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use plyr_back::{
    config::AppConfig,
    dao::{
        entity_store::{EntityStore, memory::MemoryEntityStore},
        storage::StorageError,
    },
    routes,
    services::storage_supervisor,
    state::{AppState, SharedState},
};

/// Storage backends selectable through `STORAGE_BACKEND`.
#[derive(Debug, Clone, Copy)]
enum Backend {
    Memory,
    #[cfg(feature = "mongo-store")]
    Mongo,
    #[cfg(feature = "couch-store")]
    Couch,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let backend = select_backend()?;
    let app_state = AppState::new(config);

    spawn_storage(app_state.clone(), backend)?;
    // Build the HTTP router once the shared state is ready.
    let app = build_router(app_state);

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, ?backend, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

fn select_backend() -> anyhow::Result<Backend> {
    let requested = env::var("STORAGE_BACKEND").ok();
    match requested.as_deref().map(str::trim) {
        Some("memory") => Ok(Backend::Memory),
        #[cfg(feature = "mongo-store")]
        Some("mongo") | Some("mongodb") => Ok(Backend::Mongo),
        #[cfg(feature = "couch-store")]
        Some("couch") | Some("couchdb") => Ok(Backend::Couch),
        Some(other) if !other.is_empty() => {
            bail!("unsupported STORAGE_BACKEND `{other}` for this build")
        }
        _ => Ok(default_backend()),
    }
}

#[allow(unreachable_code)]
fn default_backend() -> Backend {
    #[cfg(feature = "mongo-store")]
    return Backend::Mongo;
    #[cfg(feature = "couch-store")]
    return Backend::Couch;
    Backend::Memory
}

/// Start the storage supervisor for the selected backend.
fn spawn_storage(state: SharedState, backend: Backend) -> anyhow::Result<()> {
    match backend {
        Backend::Memory => {
            let store = match state.config().fixtures_path() {
                Some(path) => MemoryEntityStore::from_fixtures_file(path)
                    .with_context(|| format!("loading fixtures from {}", path.display()))?,
                None => MemoryEntityStore::new(),
            };
            let store: Arc<dyn EntityStore> = Arc::new(store);
            tokio::spawn(storage_supervisor::run(state, move || {
                let store = store.clone();
                async move { Ok::<_, StorageError>(store) }
            }));
        }
        #[cfg(feature = "mongo-store")]
        Backend::Mongo => {
            use plyr_back::dao::entity_store::mongodb::{MongoConfig, MongoEntityStore};

            tokio::spawn(storage_supervisor::run(state, || async {
                let config = MongoConfig::from_env().await?;
                let store = MongoEntityStore::connect(config).await?;
                Ok::<_, StorageError>(Arc::new(store) as Arc<dyn EntityStore>)
            }));
        }
        #[cfg(feature = "couch-store")]
        Backend::Couch => {
            use plyr_back::dao::entity_store::couchdb::{CouchConfig, CouchEntityStore};

            tokio::spawn(storage_supervisor::run(state, || async {
                let config = CouchConfig::from_env()?;
                let store = CouchEntityStore::connect(config).await?;
                Ok::<_, StorageError>(Arc::new(store) as Arc<dyn EntityStore>)
            }));
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

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
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
                tracing::warn!(error = %err, "failed to install SIGTERM handler; waiting for Ctrl+C");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
