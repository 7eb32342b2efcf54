//! 🚀 bulkstream-cli: the front door, the bouncer, the maitre d' of bulkstream.
//!
//! 📦 Thin CLI wrapper: sets up logging, loads config, streams NDJSON records
//! (from `runtime.input_file` or stdin) into the writer, and prints a summary
//! table when the last batch has landed. Like a manager. 🦆
//!
//! ```text
//! cat records.ndjson | RUST_LOG=info bulkstream-cli bulkstream.toml
//! ```

use anyhow::{Context, Result};
use bulkstream::StatsSnapshot;
use comfy_table::{Cell, CellAlignment, ContentArrangement, Table, presets::NOTHING};
use tracing::error;
use tracing_subscriber::EnvFilter;

/// 🚀 main(): where it all begins.
///
/// 🔧 Steps:
/// 1. Init tracing (so we can see what goes wrong, and when)
/// 2. Find the config file, if there is one
/// 3. Load config (the moment of truth)
/// 4. Run the thing
/// 5. Print the scoreboard, or the error chain
#[tokio::main]
async fn main() -> Result<()> {
    // 📡 logs go to stderr, the summary table goes to stdout
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    let path_arg = args.get(1).map(String::as_str).unwrap_or("bulkstream.toml");

    // 🔒 A missing file is fine (env vars only). An unreadable path is not.
    let config_file = std::path::Path::new(path_arg);
    let config_file_if_it_exists = match config_file.try_exists()
        .context(format!("💀 Couldn't check whether the configuration file exists. Was checking here: '{}'", config_file.display()))?
    {
        true => Some(config_file),
        false => None,
    };

    let app_config = bulkstream::app_config::load_config(config_file_if_it_exists)
        .context("💀 In bulkstream-cli, main, we couldn't load the config. Check the file and the BULKSTREAM_* environment variables.")?;

    match bulkstream::run(app_config).await {
        Ok(stats) => {
            println!("{}", summary_table(&stats));
            Ok(())
        }
        Err(err) => {
            error!("💀 error: {}", err);
            // -- 🧅 peel the onion of sadness, one layer at a time
            let mut the_vibes_are_giving_connection_issues = false;
            for cause in err.chain().skip(1) {
                error!("⚠️  cause: {}", cause);
                let cause_str = cause.to_string();
                if cause_str.contains("error sending request")
                    || cause_str.contains("connection refused")
                    || cause_str.contains("Connection refused")
                    || cause_str.contains("tcp connect error")
                    || cause_str.contains("dns error")
                {
                    the_vibes_are_giving_connection_issues = true;
                }
            }

            if the_vibes_are_giving_connection_issues {
                error!(
                    "🔧 hint: looks like the cluster isn't reachable. \
                    Double-check that Elasticsearch is actually running at the configured url. \
                    If you're using Docker, try `docker ps` to see what's up. ☕"
                );
            }

            std::process::exit(1);
        }
    }
}

/// 🍽️ Final counters as a borderless, right-aligned two-column table.
fn summary_table(stats: &StatsSnapshot) -> Table {
    let mut table = Table::new();
    table.load_preset(NOTHING);
    table.set_content_arrangement(ContentArrangement::Dynamic);

    let rows = [
        ("accepted", stats.ok),
        ("rejected", stats.error),
        ("written", stats.written),
        ("inserted", stats.inserted),
        ("failed", stats.failed),
        ("queued", stats.queued()),
    ];
    for (label, value) in rows {
        table.add_row(vec![
            Cell::new(label).set_alignment(CellAlignment::Right),
            Cell::new(value).set_alignment(CellAlignment::Right),
        ]);
    }
    table
}
