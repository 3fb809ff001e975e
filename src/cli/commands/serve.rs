use anyhow::Result;
use clap::ArgMatches;
use std::sync::Arc;

use bike_predictor::{db, server, Config};

pub async fn handle_serve(matches: &ArgMatches, mut config: Config) -> Result<()> {
    if let Some(port) = matches.get_one::<u16>("port") {
        config.server.port = *port;
    }
    if let Some(host) = matches.get_one::<String>("host") {
        config.server.host = host.clone();
    }

    println!("🚲 Starting bike prediction API on {}:{}", config.server.host, config.server.port);
    if let Some(host) = &config.database.host {
        println!("📊 Connecting to PostgreSQL at {}:{}", host, config.database.port);
    }

    let pool = Arc::new(db::bootstrap_pool(&config.database, &config.pool).await);
    if let Some(reason) = pool.failure_reason().await {
        println!("⚠️  Database unavailable, /predictions will return errors: {}", reason);
    }

    server::start_server(pool, &config).await?;

    Ok(())
}
