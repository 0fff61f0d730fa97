// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! spacey-cgi - run one CGI request through the script host
//!
//! Invoked by a web server, the main file comes from `PATH_TRANSLATED` or
//! `SCRIPT_FILENAME`. From a shell, pass the script explicitly:
//!
//! ```bash
//! spacey-cgi app.js first second
//! SPACEY_CGI_LIBRARY_PATH=/usr/lib/spacey spacey-cgi --verbose app.js
//! ```

use clap::Parser;
use owo_colors::OwoColorize;
use spacey_host::request::process_environment;
use spacey_host::{Config, Engine, Request, VERSION};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "spacey-cgi",
    about = "CGI JavaScript host powered by Spacey",
    version = VERSION,
    author = "Pegasus Heavy Industries"
)]
struct Cli {
    /// Configuration file (defaults to $SPACEY_CGI_CONFIG, then /etc/spacey-cgi.json)
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(long)]
    verbose: bool,

    /// Main script; taken from the CGI environment when absent
    script: Option<PathBuf>,

    /// Arguments passed to the script
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // stdout belongs to the response
    let default_filter = if cli.verbose {
        "spacey_host=debug,spacey_cgi=debug"
    } else {
        "spacey_host=warn,spacey_cgi=warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}: {}", "Error".red().bold(), e);
            std::process::exit(1);
        }
    };
    tracing::debug!("Loaded configuration: {:?}", config);

    let mut request = Request::from_vars(process_environment()).with_args(cli.args);
    if let Some(script) = cli.script {
        request = request.with_main_file(script);
    }
    if request.is_http() {
        tracing::debug!(
            "Serving {} request",
            request.var("REQUEST_METHOD").unwrap_or("CGI")
        );
    }

    let mut engine = Engine::new(config)?;
    let status = engine.execute(&request);
    std::process::exit(status);
}
