//! The HTTP API: composes the chunk/manifest/user stores and the token
//! service behind a small REST surface, with a bearer-token auth filter in
//! front of every route except `/auth/*` and `/healthz`.

pub mod auth_middleware;
pub mod handlers;

use crate::chunk_store::ChunkStore;
use crate::config::Config;
use crate::manifest_store::ManifestStore;
use crate::token::TokenService;
use crate::user_store::UserStore;
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Request, Response, Server};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

pub struct AppState {
    pub chunk_store: ChunkStore,
    pub manifest_store: ManifestStore,
    pub user_store: UserStore,
    pub token_service: TokenService,
}

impl AppState {
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        std::fs::create_dir_all(&config.storage_root)?;
        let db_path = config.storage_root.join("users.db");
        Ok(AppState {
            chunk_store: ChunkStore::new(&config.storage_root),
            manifest_store: ManifestStore::new(&config.storage_root),
            user_store: UserStore::open(db_path)?,
            token_service: TokenService::new(
                config.jwt_secret.clone(),
                config.access_ttl_min,
                config.refresh_ttl_hour,
            ),
        })
    }
}

pub async fn run(config: Config) -> anyhow::Result<()> {
    let state = Arc::new(AppState::from_config(&config)?);
    let addr: SocketAddr = format!("{}:{}", config.bind_addr, config.port).parse()?;

    let make_svc = make_service_fn(move |_conn| {
        let state = state.clone();
        async move {
            Ok::<_, Infallible>(service_fn(move |req| {
                let state = state.clone();
                async move { Ok::<_, Infallible>(dispatch(req, state).await) }
            }))
        }
    });

    let server = Server::bind(&addr).serve(make_svc);
    log::info!("listening on {}", addr);

    let server = server.with_graceful_shutdown(shutdown_signal());
    server.await?;
    log::info!("shutdown drain complete");
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    log::info!("shutdown signal received, draining in-flight requests (5s deadline)");
    tokio::time::sleep(std::time::Duration::from_secs(5)).await;
}

async fn dispatch(req: Request<Body>, state: Arc<AppState>) -> Response<Body> {
    let start = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let response = handlers::route(req, state).await;

    let response = response.unwrap_or_else(|err| {
        log::error!("request failed: {} {} -> {}", method, path, err);
        handlers::error_response(&err)
    });

    let elapsed_ms = start.elapsed().as_millis();
    if path == "/healthz" {
        log::debug!("{} {} {} {}ms", method, path, response.status(), elapsed_ms);
    } else {
        log::info!("{} {} {} {}ms", method, path, response.status(), elapsed_ms);
    }
    response
}
