use std::sync::Arc;

use actix_web::{App, HttpServer};
use anyhow::Context;
use paperclip::actix::{web, OpenApiExt};
use tracing_actix_web::TracingLogger;

use libraryservice_circulation::app_config::{config_app, LibraryServices};
use libraryservice_circulation::library_repository::{
    InMemoryLibraryRepository, LibraryRepository, PostgresLibraryRepository,
};
use libraryservice_circulation::settings::Settings;
use libraryservice_circulation::telemetry::init_telemetry;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load()?;
    init_telemetry(&settings)?;
    tracing::info!(
        "starting HTTP server at http://{}:{}",
        settings.bind_address,
        settings.bind_port
    );

    let repository: Arc<dyn LibraryRepository> = if settings.use_in_memory_db {
        Arc::new(InMemoryLibraryRepository::default())
    } else {
        Arc::new(
            PostgresLibraryRepository::init(settings.postgres_config())
                .await
                .context("Failed to init postgres")?,
        )
    };
    // Carts are held by the services, so one instance is shared by every worker
    let services = LibraryServices::new(repository);

    HttpServer::new(move || {
        App::new()
            .wrap_api()
            .app_data(web::Data::new(services.clone()))
            .wrap(TracingLogger::default())
            .configure(config_app)
            .with_json_spec_at("/apispec/v2")
            .build()
    })
    .bind((settings.bind_address.as_str(), settings.bind_port))?
    .run()
    .await
    .context("HTTP server failed")
}
