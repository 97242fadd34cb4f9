use std::sync::Arc;

use actix_cors::Cors;
use actix_web::middleware::Logger;
use actix_web::{web, App, HttpServer};
use anyhow::{anyhow, Context};
use clap::Parser;
use tracing::{error, info};

use star_type_classifier::config::{Cli, Settings};
use star_type_classifier::{handlers, logging, Gateway, OnnxClassifier};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load(&cli).context("failed to load configuration")?;
    logging::init(&settings.log)?;

    // No model, no server.
    let classifier = OnnxClassifier::load(&settings.model.path, &settings.model.labels_path)
        .map_err(|e| {
            error!(error = %e, "refusing to start without a model");
            e
        })?;
    let gateway = web::Data::new(Gateway::new(Arc::new(classifier)));
    let routes = handlers::configure(gateway, settings.server.max_upload_bytes)
        .map_err(|e| anyhow!("failed to compile UI templates: {e}"))?;

    let host = settings.server.host.clone();
    let port = settings.server.port;
    info!("Server running at http://{host}:{port}");

    let mut server = HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header();

        App::new()
            .wrap(cors)
            .wrap(Logger::default())
            .configure(routes.clone())
    });
    if let Some(workers) = settings.server.workers {
        server = server.workers(workers);
    }

    server
        .bind((host.as_str(), port))
        .with_context(|| format!("failed to bind {host}:{port}"))?
        .run()
        .await?;
    Ok(())
}
