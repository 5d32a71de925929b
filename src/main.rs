use tokio::net::TcpListener;

use huddle_server::auth::jwt::load_or_generate_jwt_secret;
use huddle_server::config::{generate_config_template, Config};
use huddle_server::{db, routes, state::AppState};

fn init_tracing(json_logs: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "huddle_server=info".parse().unwrap());
    if json_logs {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().pretty().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;

    if config.generate_config {
        print!("{}", generate_config_template());
        return Ok(());
    }

    init_tracing(config.json_logs);
    tracing::info!("huddle-server v{} starting", env!("CARGO_PKG_VERSION"));

    let db = db::init_db(&config.data_dir)?;
    let jwt_secret = load_or_generate_jwt_secret(&config.data_dir)?;

    // Registry, presence, fan-out, and the membership engine all hang off
    // this state and are shared by the HTTP and WebSocket surfaces.
    let state = AppState::new(db, jwt_secret);
    let app = routes::build_router(state);

    let addr = format!("{}:{}", config.bind_address, config.port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}
