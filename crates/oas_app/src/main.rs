//! `oas_publisher`: reads one invocation event as JSON on stdin and writes
//! the `{status_code, body, headers}` response as JSON on stdout.
mod args;
mod service;
mod settings;

use std::io::{self, Read};
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use oas_core::{RequestError, Response};
use pipeline_logging::{parse_level, pipeline_info};
use serde_json::Value;

use crate::args::Cli;
use crate::settings::{load_settings, save_settings, Settings};

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(err) => {
            eprintln!("oas_publisher: {err:#}");
            ExitCode::from(2)
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<bool> {
    if let Some(path) = cli.init_settings {
        let written = save_settings(&path, &Settings::default())?;
        println!("{}", written.display());
        return Ok(true);
    }

    let env = |name: &str| std::env::var(name).ok();
    let settings = load_settings(&cli.settings)?.overlay(env);
    pipeline_logging::initialize(&settings.log.destination(), parse_level(&settings.log.level));
    let config = settings.engine_config(env);
    pipeline_info!("Starting with {:?}", config);

    let mut input = String::new();
    io::stdin()
        .read_to_string(&mut input)
        .context("cannot read event from stdin")?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("cannot start async runtime")?;
    let dispatcher = service::build_dispatcher(&settings, config)?;

    let response = match serde_json::from_str::<Value>(&input) {
        Ok(event) => runtime.block_on(dispatcher.handle_event(event)),
        Err(err) => Response::from_request_error(&RequestError::InvalidParameter(format!(
            "event is not valid JSON: {err}"
        ))),
    };
    pipeline_info!("Responding with status {}", response.status_code);

    let out = serde_json::to_string(&response).context("cannot serialize response")?;
    println!("{out}");
    Ok(response.is_success())
}
