mod app;

use std::sync::Arc;

use eframe::{egui, NativeOptions};
use gallery_core::{
    spawn_article_loader, CoordinatorOptions, DictionaryImageDataCache, FetchCoordinator,
    GalleryConfig, HttpTransport,
};
use reqwest::{redirect, ClientBuilder};
use tokio::runtime::Runtime;
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::app::{AppInit, GalleryApp};

fn main() -> eframe::Result<()> {
    init_tracing();

    let runtime = Arc::new(Runtime::new().expect("failed to initialise Tokio runtime"));
    let config = GalleryConfig::load();
    let client = ClientBuilder::new()
        .redirect(redirect::Policy::limited(5))
        .user_agent("ArticleGallery/0.1")
        .build()
        .expect("failed to build HTTP client");

    let cache = DictionaryImageDataCache::with_capacity(config.images.max_cached_images).shared();
    let coordinator = FetchCoordinator::new(
        HttpTransport::new(client.clone(), config.images.request_timeout()).shared(),
        Some(cache),
        CoordinatorOptions::from(&config.images),
        runtime.handle().clone(),
    );
    info!(endpoint = %config.feed.endpoint, dedup = config.images.deduplicate, "starting article gallery");

    let (update_tx, update_rx) = mpsc::channel(8);
    let loader = {
        let guard = runtime.enter();
        let handle = spawn_article_loader(client, config.feed.clone(), update_tx);
        drop(guard);
        handle
    };

    let init = AppInit {
        runtime,
        loader,
        updates: update_rx,
        coordinator,
        ui: config.ui,
    };

    eframe::run_native(
        "Articles",
        NativeOptions {
            viewport: egui::ViewportBuilder::default()
                .with_inner_size([420.0, 820.0])
                .with_min_inner_size([320.0, 480.0]),
            ..Default::default()
        },
        Box::new(move |cc| {
            egui_extras::install_image_loaders(&cc.egui_ctx);
            Box::new(GalleryApp::new(init))
        }),
    )
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
