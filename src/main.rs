use actix_web::{web, App, HttpServer};
use piapi_gateway::app::AppState;
use piapi_gateway::config::{ConfigManager, ConfigWatcher};
use piapi_gateway::proxy::ProxyClient;
use piapi_gateway::routes;
use piapi_gateway::settings::Settings;
use std::sync::Arc;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    piapi_gateway::logs::configure_logger();

    let settings = Settings::from_env();
    log::info!(
        "starting piapi-gateway: config={} listen={}",
        settings.config_path.display(),
        settings.listen_addr
    );

    let config_manager = Arc::new(ConfigManager::new());
    let mut watcher = ConfigWatcher::new(
        config_manager.clone(),
        settings.config_path.clone(),
        settings.reload_poll_interval,
    );
    watcher.load_initial().await.map_err(|err| {
        log::error!("fatal: could not load initial configuration: {err}");
        std::io::Error::other(err.to_string())
    })?;
    watcher.spawn();

    let app_data = web::Data::new(AppState {
        config_manager: config_manager.clone(),
        proxy_client: ProxyClient::new(settings.response_timeout),
    });
    let gateway_prefix = settings.gateway_prefix.clone();

    let server = HttpServer::new(move || {
        App::new()
            .wrap(actix_web::middleware::Logger::default())
            .app_data(app_data.clone())
            .configure(routes::configure(&gateway_prefix))
    })
        .bind(&settings.listen_addr)?
        .shutdown_timeout(5)
        .run();

    let handle = server.handle();

    tokio::select! {
        result = server => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            log::info!("shutdown signal received, draining connections");
            handle.stop(true).await;
        }
    }

    log::info!("piapi-gateway stopped");
    Ok(())
}
