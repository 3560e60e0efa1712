mod config;
mod frame;
mod links;
mod render;
mod routes;
mod scene;
mod services;
mod state;

use std::process::ExitCode;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::links::Projector;
use crate::links::http::{HttpProjector, HttpTouchTable};
use crate::render::SceneRenderer;
use crate::services::node::Node;
use crate::services::startup::{self, Readiness};

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match config::NodeConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "invalid configuration");
            return ExitCode::FAILURE;
        }
    };
    let readiness = Readiness { timeout: config.startup_timeout, poll: config.readiness_poll };

    // Text items are skipped without a font; everything else still renders.
    let font = match &config.font_path {
        Some(path) => match render::load_font(path) {
            Ok(font) => Some(font),
            Err(e) => {
                warn!(error = %e, "font not loaded, text items disabled");
                None
            }
        },
        None => {
            info!("FONT_PATH not set, text items disabled");
            None
        }
    };
    let renderer = Arc::new(SceneRenderer::new(config.jpeg_quality, font));
    info!(
        origin_x = config.table.origin_x,
        origin_y = config.table.origin_y,
        width_m = config.table.width_m,
        height_m = config.table.height_m,
        pixels_per_meter = config.table.pixels_per_meter,
        text = renderer.has_font(),
        "renderer ready"
    );

    let table = match HttpTouchTable::new(config.touchtable_url.clone()) {
        Ok(table) => table,
        Err(e) => {
            error!(error = %e, "touch table client init failed");
            return ExitCode::FAILURE;
        }
    };
    let projectors = match config
        .projectors
        .iter()
        .map(|url| HttpProjector::new(url.clone()).map(|p| Arc::new(p) as Arc<dyn Projector>))
        .collect::<Result<Vec<_>, _>>()
    {
        Ok(projectors) => projectors,
        Err(e) => {
            error!(error = %e, "projector client init failed");
            return ExitCode::FAILURE;
        }
    };

    let (mut node, handle) = Node::new(&config, renderer);

    // HTTP comes up first: the touch table calls back into it while the
    // startup sequence is still running.
    let http_listener = match tokio::net::TcpListener::bind(("0.0.0.0", config.http_port)).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(port = config.http_port, error = %e, "failed to bind HTTP port");
            return ExitCode::FAILURE;
        }
    };
    let (stop_tx, mut stop_rx) = watch::channel(false);
    let app = routes::app(handle.clone());
    let http = tokio::spawn(async move {
        let stopped = async move {
            let _ = stop_rx.wait_for(|stop| *stop).await;
        };
        if let Err(e) = axum::serve(http_listener, app).with_graceful_shutdown(stopped).await {
            error!(error = %e, "HTTP server failed");
        }
    });
    info!(port = config.http_port, "HTTP listening");

    let sigint = interrupted();
    tokio::pin!(sigint);

    let prepare = async {
        let already_calibrated = startup::wait_table_calibrated(&table, readiness).await?;
        match services::acceptor::bind(config.scene_port).await {
            Ok(listener) => {
                services::acceptor::spawn_acceptor(listener, handle.events.clone(), config.client_queue_depth);
            }
            Err(e) => error!(port = config.scene_port, error = %e, "scene TCP server not started"),
        }
        node.bring_up_projectors(&projectors, readiness).await;
        node.add_demo_content();
        Ok::<_, startup::StartupError>(already_calibrated)
    };
    let already_calibrated = tokio::select! {
        result = prepare => result,
        () = &mut sigint => {
            stop_tx.send_replace(true);
            let _ = http.await;
            return ExitCode::SUCCESS;
        }
    };
    let already_calibrated = match already_calibrated {
        Ok(calibrated) => calibrated,
        Err(e) => {
            error!(error = %e, "startup failed");
            stop_tx.send_replace(true);
            let _ = http.await;
            return ExitCode::FAILURE;
        }
    };

    // The node must be running while the table calibrates: it shows the
    // points the table asks for.
    let node_task = tokio::spawn(node.run());

    let calibrated = tokio::select! {
        result = startup::ensure_table_calibrated(&table, already_calibrated, readiness) => Some(result),
        () = &mut sigint => None,
    };
    let code = match calibrated {
        Some(Ok(outcome)) => {
            info!(?outcome, "ready");
            sigint.await;
            ExitCode::SUCCESS
        }
        Some(Err(e)) => {
            error!(error = %e, "startup failed");
            ExitCode::FAILURE
        }
        None => ExitCode::SUCCESS,
    };

    handle.shutdown().await;
    if let Err(e) = node_task.await {
        error!(error = %e, "node task failed");
    }
    stop_tx.send_replace(true);
    if let Err(e) = http.await {
        error!(error = %e, "HTTP task failed");
    }
    info!("stopped");
    code
}

/// Resolves on SIGINT. Never resolves if the handler cannot be installed.
async fn interrupted() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("SIGINT received, shutting down"),
        Err(e) => {
            warn!(error = %e, "SIGINT handler not installed");
            std::future::pending::<()>().await;
        }
    }
}
