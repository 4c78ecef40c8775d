use std::env;
use std::time::Duration;

use command_service::{build_server, create_pool, dispatcher, run_migrations};
use dotenvy::dotenv;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = env::var("PORT")
        .unwrap_or_else(|_| "8080".to_string())
        .parse()
        .expect("PORT must be a valid number");
    let inventory_url =
        env::var("INVENTORY_SERVICE_URL").unwrap_or_else(|_| "http://localhost:8081".to_string());
    let dispatch_interval: u64 = env::var("DISPATCH_INTERVAL_SECS")
        .unwrap_or_else(|_| "60".to_string())
        .parse()
        .expect("DISPATCH_INTERVAL_SECS must be a valid number");

    let pool = create_pool(&database_url);
    run_migrations(&pool);

    dispatcher::spawn(
        pool.clone(),
        inventory_url,
        Duration::from_secs(dispatch_interval),
    )?;

    log::info!("Starting server at http://{}:{}", host, port);

    build_server(pool, &host, port)?.await
}
