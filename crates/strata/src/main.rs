// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Strata - adaptive model resource pool and confidence-tiered router.
//!
//! This is the binary entry point.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod commands;
mod run;
mod shutdown;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use strata_config::StrataConfig;

/// Strata - adaptive model resource pool and confidence-tiered router.
#[derive(Parser, Debug)]
#[command(name = "strata", version, about, long_about = None)]
struct Cli {
    /// Config file to use instead of the XDG lookup. Enables registry hot reload in `run`.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Validate the configuration and print a registry summary.
    Check,
    /// Print the routing decision for a confidence score or a request text.
    Route {
        /// Confidence score in [0, 1].
        #[arg(long, required_unless_present = "text", conflicts_with = "text")]
        confidence: Option<f64>,
        /// Score this request text with the pattern analyzer instead.
        #[arg(long)]
        text: Option<String>,
        /// Force the deepest tier.
        #[arg(long)]
        escalate: bool,
        /// Session the request belongs to.
        #[arg(long)]
        session: Option<String>,
    },
    /// Print the quantization decision for a local model.
    Select {
        #[arg(long)]
        model: String,
        #[arg(long)]
        prompt_tokens: u32,
        #[arg(long, default_value_t = 0.5)]
        complexity: f64,
        /// Memory the pool could still hand out, in MB.
        #[arg(long)]
        available_mb: u64,
    },
    /// Run the pool until interrupted.
    Run,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(errors) => {
            strata_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    // Logs go to stderr so stdout carries only command output.
    init_tracing(&config.log.level);

    let result = match cli.command {
        Some(Commands::Check) => {
            print!("{}", commands::check_summary(&config));
            Ok(())
        }
        Some(Commands::Route {
            confidence,
            text,
            escalate,
            session,
        }) => {
            let request = commands::RouteRequest {
                confidence,
                text: text.as_deref(),
                escalate,
                session: session.as_deref(),
            };
            let decision = commands::route(&config, &request);
            commands::print_json(&decision)
        }
        Some(Commands::Select {
            model,
            prompt_tokens,
            complexity,
            available_mb,
        }) => commands::select(&config, &model, prompt_tokens, complexity, available_mb)
            .and_then(|decision| commands::print_json(&decision)),
        Some(Commands::Run) => run::run(config, cli.config).await,
        None => {
            println!("strata: use --help for available commands");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn load_config(cli: &Cli) -> Result<StrataConfig, Vec<strata_config::ConfigError>> {
    match &cli.config {
        Some(path) => strata_config::load_and_validate_path(path),
        None => strata_config::load_and_validate(),
    }
}

/// Initializes the tracing subscriber with the given log level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("strata={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
