use actix_web::{web, App, HttpServer};
use sketch_backend::infra::state::StateBuilder;
use sketch_backend::{routes, Config};

mod telemetry;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    telemetry::init_tracing();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ {e}");
            std::process::exit(1);
        }
    };

    let app_state = match StateBuilder::from_config(&config)
        .await
        .and_then(StateBuilder::build)
    {
        Ok(state) => state,
        Err(e) => {
            eprintln!("❌ Failed to build application state: {e}");
            std::process::exit(1);
        }
    };

    tracing::info!(
        host = %config.host,
        port = config.port,
        store = app_state.store_backend(),
        words = app_state.words().backend(),
        "Starting sketch backend"
    );

    let data = web::Data::new(app_state);

    HttpServer::new(move || {
        App::new()
            .wrap(actix_web::middleware::Logger::default())
            .app_data(data.clone())
            .configure(routes::configure)
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await
}
