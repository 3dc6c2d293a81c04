pub use controller::*;
use kube::Client;
use tracing_subscriber::{EnvFilter, Registry, prelude::*};

use actix_web::{
    App, HttpRequest, HttpResponse, HttpServer, Responder, get, middleware,
    web::{self, Data},
};

#[get("/metrics")]
async fn metrics(c: Data<Manager>, _req: HttpRequest) -> impl Responder {
    match c.metrics() {
        Ok(metrics) => HttpResponse::Ok()
            .content_type("application/openmetrics-text; version=1.0.0; charset=utf-8")
            .body(metrics),
        Err(e) => HttpResponse::InternalServerError().body(e.to_string()),
    }
}

#[get("/health")]
async fn health(_: HttpRequest) -> impl Responder {
    HttpResponse::Ok().json("healthy")
}

#[get("/")]
async fn index(c: Data<Manager>, _req: HttpRequest) -> impl Responder {
    let d = c.diagnostics().await;
    HttpResponse::Ok().json(&d)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Setup tracing layers
    #[cfg(feature = "telemetry")]
    let telemetry = tracing_opentelemetry::layer().with_tracer(telemetry::init_tracer()?);
    let logger = tracing_subscriber::fmt::layer();
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .map_err(|e| Error::Startup(e.to_string()))?;

    // Decide on layers
    #[cfg(feature = "telemetry")]
    let collector = Registry::default().with(telemetry).with(logger).with(env_filter);
    #[cfg(not(feature = "telemetry"))]
    let collector = Registry::default().with(logger).with(env_filter);

    // Initialize tracing
    tracing::subscriber::set_global_default(collector).map_err(|e| Error::Startup(e.to_string()))?;

    let client = Client::try_default().await.map_err(Error::KubeError)?;
    let config = common::ControllerConfig::load(client.clone()).await?;
    // Start kubernetes controllers
    let (manager, controller_projects, controller_customers) = Manager::new(client, config).await?;

    let bind = std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:9000".to_string());
    // Start web server
    let server = HttpServer::new(move || {
        App::new()
            .app_data(Data::new(manager.clone()))
            .app_data(web::JsonConfig::default().limit(4 * 1024 * 1024))
            .wrap(middleware::Logger::default().exclude("/health"))
            .service(index)
            .service(health)
            .service(metrics)
            .service(admission::validate_project)
            .service(admission::validate_customer)
    })
    .bind(&bind)
    .map_err(|e| Error::Startup(format!("can not bind to {bind}: {e}")))?
    .shutdown_timeout(5);

    tokio::select! {
        _ = controller_projects => tracing::warn!("Project controller exited"),
        _ = controller_customers => tracing::warn!("Customer controller exited"),
        _ = server.run() => tracing::info!("actix exited"),
    }
    Ok(())
}
