//! Grid Ladder Bot Binary
//!
//! Replays a quote file through the grid ladder strategy against the
//! in-process paper broker.
//!
//! ## Setup
//!
//! 1. Copy `config.example.toml` to `config.toml` and point `[feed] path`
//!    at a `time,bid,ask` CSV file.
//!
//! 2. Optionally override settings in a `.env` file or the environment:
//!    ```text
//!    APP_STRATEGY__PIP_STEP=20
//!    RUST_LOG=debug
//!    ```
//!
//! 3. Run the bot:
//!    ```bash
//!    cargo run --bin grid_bot -- config.toml
//!    ```

use std::path::Path;

use grid_ladder_bot::runner::BotRunner;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file
    dotenvy::dotenv().ok();

    let args: Vec<String> = std::env::args().collect();
    let default_config = "config.toml".to_string();
    let config_path = args.get(1).unwrap_or(&default_config);
    if !Path::new(config_path).exists() {
        eprintln!(
            "Config file '{}' not found. Copy config.example.toml to get started.",
            config_path
        );
        std::process::exit(1);
    }

    let runner = BotRunner::new(config_path)?;

    match runner.run().await {
        Ok(stats) => {
            println!(
                "Done: {} ticks, {} opened, {} closed, {} stopped out, realized {:.2}",
                stats.ticks, stats.opened, stats.closed, stats.stopped_out, stats.realized_profit
            );
        }
        Err(e) => {
            eprintln!("Bot execution error: {}", e);
            std::process::exit(1);
        }
    }

    Ok(())
}
