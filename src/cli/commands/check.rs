use anyhow::{Context, Result};
use clap::ArgMatches;
use std::time::Instant;

use bike_predictor::db::queries;
use bike_predictor::Config;

use crate::cli::utils::{format_duration, pluralize};

const PREDICTIONS_TABLE: (&str, &str) = ("public", "bike_predictions");

pub async fn handle_check(matches: &ArgMatches, config: &Config) -> Result<()> {
    let verbose = matches.get_flag("verbose");

    println!("🔍 Database Check");
    println!("=================\n");

    let missing = config.database.missing_fields();
    if !missing.is_empty() {
        println!("  ⚠️  Missing settings: {}", missing.join(", "));
        println!("    💡 Set DB_HOST, DB_NAME, DB_USER and DB_PASSWORD in .env");
    }

    let connection_config = config.database.to_connection_config()?;
    if verbose {
        println!("  🔧 {:?}", connection_config);
    }

    let start = Instant::now();
    let mut conn = connection_config
        .connect()
        .await
        .context("Failed to connect to PostgreSQL")?;
    println!("  ✅ Connected in {}", format_duration(start.elapsed()));

    let version = queries::server_version(&mut conn).await?;
    println!("  🐘 {}", version);

    let tables = queries::list_user_tables(&mut conn)
        .await
        .context("Failed to list tables")?;
    println!("\n📂 {}", pluralize("table", tables.len()));
    for (schema, table) in &tables {
        println!("  • {}.{}", schema, table);
    }

    let has_predictions = tables
        .iter()
        .any(|(schema, table)| (schema.as_str(), table.as_str()) == PREDICTIONS_TABLE);

    if has_predictions {
        println!("\n  ✅ bike_predictions table found");
        if verbose {
            let count = queries::count_predictions(&mut conn).await?;
            println!("    📊 {}", pluralize("prediction", count.max(0) as usize));
        }
    } else {
        println!("\n  ❌ bike_predictions table not found");
        println!("    💡 Run 'bike_predictor seed' to create it");
    }

    println!("\n✅ Database check complete");
    Ok(())
}
