// Copyright 2026 Prodscrape Contributors
// SPDX-License-Identifier: Apache-2.0

//! prodscrape command-line entry point.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use prodscrape_cli::http::{self, AppState, BrowserService};
use prodscrape_cli::scrape_cmd::SaveTarget;
use prodscrape_cli::{doctor, extract_cmd, init_logging, prompt, scrape_cmd, Overrides};

#[derive(Parser)]
#[command(
    name = "prodscrape",
    about = "Resilient product-page extraction for JavaScript-heavy storefronts",
    version
)]
struct Cli {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` takes precedence.
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(flatten)]
    overrides: Overrides,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape one product page and print the record as JSON.
    Scrape {
        /// Product page URL.
        url: String,

        /// Save the record to this file instead of a timestamped one.
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Directory for timestamped record files.
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,

        /// Print only; do not save the record.
        #[arg(long)]
        no_save: bool,
    },

    /// Interactive prompt that scrapes each URL you paste.
    Prompt {
        /// Directory for timestamped record files.
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,

        /// Do not save records.
        #[arg(long)]
        no_save: bool,
    },

    /// Start the HTTP server.
    Serve {
        /// Listen address (host:port).
        #[arg(long, default_value = http::DEFAULT_ADDR)]
        addr: String,

        /// Directory for timestamped record files.
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,

        /// Do not save records.
        #[arg(long)]
        no_save: bool,

        /// Scrapes allowed to run at once (each drives its own browser).
        #[arg(long, default_value_t = 1)]
        max_concurrent: usize,
    },

    /// Extract a record from a saved HTML page without a browser.
    Extract {
        /// Saved product page.
        file: PathBuf,

        /// URL the page was saved from; used to resolve relative links.
        #[arg(long)]
        url: String,

        /// Save the record to this file.
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Check that a browser is available and show the effective settings.
    Doctor,

    /// Generate shell completion scripts.
    ///
    /// Examples:
    ///   prodscrape completions bash > ~/.local/share/bash-completion/completions/prodscrape
    ///   prodscrape completions zsh > ~/.zfunc/_prodscrape
    Completions {
        /// Shell type (bash, zsh, fish, powershell, elvish).
        shell: Shell,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level, cli.log_json);
    let config = cli.overrides.resolve();

    match cli.command {
        Commands::Scrape {
            url,
            out,
            out_dir,
            no_save,
        } => {
            let target = SaveTarget::from_flags(out, &out_dir, no_save);
            scrape_cmd::run(&config, &url, &target).await?;
        }

        Commands::Prompt { out_dir, no_save } => {
            let target = SaveTarget::from_flags(None, &out_dir, no_save);
            prompt::run(&config, &target).await?;
        }

        Commands::Serve {
            addr,
            out_dir,
            no_save,
            max_concurrent,
        } => {
            let out_dir = (!no_save).then_some(out_dir);
            let service = Arc::new(BrowserService::new(config));
            let state = Arc::new(AppState::new(service, out_dir, max_concurrent));
            http::serve(&addr, state).await?;
        }

        Commands::Extract { file, url, out } => {
            let target = match out {
                Some(path) => SaveTarget::File(path),
                None => SaveTarget::None,
            };
            extract_cmd::run(&config, &file, &url, &target).await?;
        }

        Commands::Doctor => doctor::run(&config)?,

        Commands::Completions { shell } => {
            clap_complete::generate(
                shell,
                &mut Cli::command(),
                "prodscrape",
                &mut std::io::stdout(),
            );
        }
    }

    Ok(())
}
