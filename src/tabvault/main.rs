use clap::Parser;
use directories::ProjectDirs;
use std::path::PathBuf;
use tabvault::api::{CmdResult, ConfigAction, TabvaultApi};
use tabvault::config::TabvaultConfig;
use tabvault::error::{Result, TabvaultError};
use tabvault::store::primary::{self, PrimaryIndex};
use tracing_subscriber::EnvFilter;

mod args;
mod cli;

use args::{Cli, Commands};
use cli::{print_config, print_messages, print_record, print_summaries};

type Api = TabvaultApi<Box<dyn PrimaryIndex>>;

fn main() {
    match run() {
        Ok(false) => {}
        Ok(true) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

/// Returns whether the command reported an error.
fn run() -> Result<bool> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let api = init_api(&cli)?;

    let result = match cli.command {
        Some(Commands::Ingest { file, data }) => handle_ingest(&api, file, data)?,
        Some(Commands::Recent { limit }) => handle_recent(&api, limit)?,
        Some(Commands::Show { id }) => handle_show(&api, &id)?,
        Some(Commands::Delete { ids }) => handle_delete(&api, &ids)?,
        Some(Commands::Doctor) => handle_doctor(&api)?,
        Some(Commands::Config { key, value }) => handle_config(&api, key, value)?,
        None => handle_recent(&api, None)?,
    };
    Ok(result.has_errors())
}

fn init_tracing(verbose: bool) {
    let fallback = if verbose { "tabvault=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn init_api(cli: &Cli) -> Result<Api> {
    let data_dir = match &cli.data_dir {
        Some(dir) => dir.clone(),
        None => default_data_dir()?,
    };

    let mut config = TabvaultConfig::load(&data_dir)?;
    if let Some(url) = &cli.primary {
        config.primary_url = Some(url.clone());
    }
    let primary = primary::connect(config.primary_url.as_deref());

    TabvaultApi::with_config(data_dir, config, primary)
}

fn default_data_dir() -> Result<PathBuf> {
    ProjectDirs::from("com", "tabvault", "tabvault")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .ok_or_else(|| {
            TabvaultError::Config("Could not determine data dir; pass --data-dir".to_string())
        })
}

fn handle_ingest(api: &Api, file: PathBuf, data: PathBuf) -> Result<CmdResult> {
    let result = api.ingest_file(&file, &data)?;
    print_messages(&result.messages);
    Ok(result)
}

fn handle_recent(api: &Api, limit: Option<usize>) -> Result<CmdResult> {
    let result = api.recent(limit)?;
    print_summaries(&result.listed);
    print_messages(&result.messages);
    Ok(result)
}

fn handle_show(api: &Api, id: &str) -> Result<CmdResult> {
    let result = api.get(id)?;
    for record in &result.records {
        print_record(record);
    }
    print_messages(&result.messages);
    Ok(result)
}

fn handle_delete(api: &Api, ids: &[String]) -> Result<CmdResult> {
    let result = api.delete(ids)?;
    print_messages(&result.messages);
    Ok(result)
}

fn handle_doctor(api: &Api) -> Result<CmdResult> {
    let result = api.doctor()?;
    print_messages(&result.messages);
    Ok(result)
}

fn handle_config(api: &Api, key: Option<String>, value: Option<String>) -> Result<CmdResult> {
    let action = match (key, value) {
        (None, _) => ConfigAction::ShowAll,
        (Some(key), None) => ConfigAction::ShowKey(key),
        (Some(key), Some(value)) => ConfigAction::Set(key, value),
    };

    let result = api.config(action)?;
    if let (Some(config), true) = (&result.config, result.messages.is_empty()) {
        print_config(config);
    }
    print_messages(&result.messages);
    Ok(result)
}
