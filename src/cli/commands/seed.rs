use anyhow::{Context, Result};
use clap::ArgMatches;
use std::time::Instant;

use bike_predictor::db::queries;
use bike_predictor::models::{sample_predictions, BikePrediction};
use bike_predictor::Config;

use crate::cli::utils::{format_duration, pluralize};

pub async fn handle_seed(matches: &ArgMatches, config: &Config) -> Result<()> {
    let dry_run = matches.get_flag("dry-run");
    let samples = sample_predictions();

    println!("🌱 Seeding bike predictions");
    println!("===========================\n");

    if dry_run {
        println!("🔍 Dry run: {} would be written", pluralize("row", samples.len()));
        print_predictions(&samples);
        return Ok(());
    }

    let start = Instant::now();
    let connection_config = config.database.to_connection_config()?;
    let mut conn = connection_config
        .connect()
        .await
        .context("Failed to connect to PostgreSQL")?;
    println!("  ✅ Connected to {}", connection_config.database);

    queries::create_table(&mut conn)
        .await
        .context("Failed to create bike_predictions table")?;
    println!("  ✅ Table public.bike_predictions ready");

    let affected = queries::upsert_predictions(&mut conn, &samples)
        .await
        .context("Failed to insert sample predictions")?;
    println!("  ✅ Upserted {}", pluralize("row", affected as usize));

    let stored: Vec<BikePrediction> = queries::fetch_all_predictions(&mut conn)
        .await
        .context("Failed to read back predictions")?
        .into_iter()
        .map(BikePrediction::from)
        .collect();

    println!("\n📋 Current contents:");
    print_predictions(&stored);

    println!("\n✨ Seed complete in {}", format_duration(start.elapsed()));
    Ok(())
}

fn print_predictions(predictions: &[BikePrediction]) {
    for prediction in predictions {
        println!(
            "  • {:<6} lat {:>9.4}  lon {:>9.4}  p(failure) {:.2}",
            prediction.bike_id,
            prediction.latitude,
            prediction.longitude,
            prediction.failure_probability
        );
    }
}
