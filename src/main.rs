use std::{process, sync::Arc};

use auth::TokenAllowList;
use config::{AppConfig, StorageType};
use library::ImageLibrary;
use storage::{InMemoryStorage, LocalFileStorage, Storage};

mod auth;
mod config;
mod errors;
mod index;
mod library;
mod routes;
mod storage;

#[tokio::main]
async fn main() {
    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing_subscriber::fmt().init();
            tracing::error!("{e}");
            process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_max_level(if config.debug {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .init();

    let storage: Arc<dyn Storage> = match config.storage_type {
        StorageType::Memory => Arc::new(InMemoryStorage::new()),
        StorageType::Local => match LocalFileStorage::new(config.images_dir.clone()) {
            Ok(local) => {
                tracing::info!("Serving images from {}", local.path().display());
                Arc::new(local)
            }
            Err(e) => {
                tracing::error!("Failed to initialize image directory: {e}");
                process::exit(1);
            }
        },
    };

    let library = Arc::new(ImageLibrary::new(storage, config.base_url.clone()));
    if let Err(e) = library.initialize().await {
        tracing::error!("Failed to build image index: {e}");
        process::exit(1);
    }

    let allow_list = TokenAllowList::new(config.auth_tokens.clone());
    let app = routes::router(library.clone(), allow_list.clone(), config.upload_limit_bytes());

    let addr = match config.socket_addr() {
        Ok(addr) => addr,
        Err(e) => {
            tracing::error!("{e}");
            process::exit(1);
        }
    };

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind {addr}: {e}");
            process::exit(1);
        }
    };

    tracing::info!("Server started at {}", config.base_url);
    tracing::info!("Port: {}", config.port);
    tracing::info!("Upload limit: {} MB", config.upload_limit_mb);
    tracing::info!("Auth tokens: {} configured", allow_list.len());
    tracing::info!("Debug mode: {}", config.debug);
    tracing::info!("Indexed images: {}", library.index().len().await);

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("Server error: {e}");
        process::exit(1);
    }
}
