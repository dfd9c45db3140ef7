mod args;
mod config;
mod dirs;
mod upstream;

use std::error::Error;
use std::io;

use clap::Parser;
use meter_app::{AppConfig, AppPaths, AppState, ensure_app_data_dir, load_pricing_defaults};
use meter_core::PriceRuleInput;
use serde::Serialize;
use serde_json::json;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use args::{ChannelsCommand, Cli, Command, PricesCommand};
use config::CliConfig;
use upstream::FileUpstream;

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let loaded = config::load_or_create(cli.config.as_deref()).map_err(io::Error::other)?;
    init_logging(cli.verbose, &loaded.config.log_level);
    if loaded.created {
        tracing::info!(path = %loaded.file.display(), "created default config");
    }

    let app_state = open_app(&cli, &loaded.config)?;
    let upstream = FileUpstream::new(loaded.config.upstream_dir.clone());
    run(cli.command, cli.tz, &app_state, &upstream)
}

/// `RUST_LOG` wins over the configured level; `--verbose` wins over both.
fn init_logging(verbose: bool, log_level: &str) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level))
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

fn open_app(cli: &Cli, config: &CliConfig) -> Result<AppState, Box<dyn Error>> {
    let paths = match &cli.db {
        Some(db_path) => {
            let dir = db_path
                .parent()
                .map(|parent| parent.to_path_buf())
                .unwrap_or_default();
            let mut paths = AppPaths::new(dir);
            paths.db_path = db_path.clone();
            paths
        }
        None => AppPaths::new(dirs::resolve_data_dir(config.data_dir.as_deref())?),
    };
    ensure_app_data_dir(&paths)?;
    tracing::debug!(db = %paths.db_path.display(), "opening store");

    let app_state = AppState::from_config(AppConfig {
        db_path: paths.db_path,
        pricing_defaults_path: paths.pricing_defaults_path,
        default_timezone: config.timezone.clone(),
    });
    app_state.initialize()?;
    Ok(app_state)
}

fn run(
    command: Command,
    tz: Option<String>,
    app_state: &AppState,
    upstream: &FileUpstream,
) -> Result<(), Box<dyn Error>> {
    let services = &app_state.services;
    match command {
        Command::Ingest { payload } => {
            let report = services.ingest.run_file(&payload, upstream)?;
            print_json(&report)
        }
        Command::Overview {
            range,
            page,
            page_size,
        } => {
            let overview = services
                .analytics
                .overview(&range.into_params(tz), page, page_size)?;
            print_json(&overview)
        }
        Command::Explore { range, max_points } => {
            let sample = services
                .analytics
                .explore(&range.into_params(tz), max_points)?;
            print_json(&sample)
        }
        Command::Records {
            range,
            sort,
            order,
            page_size,
            cursor,
            include_filters,
        } => {
            let params = args::records_params(sort, order, page_size, cursor, include_filters);
            let page = services
                .analytics
                .records(&range.into_params(tz), &params)?;
            print_json(&page)
        }
        Command::Prices { command } => run_prices(command, app_state),
        Command::Channels { command } => match command {
            ChannelsCommand::List => print_json(&services.channels.list()?),
            ChannelsCommand::Sync => {
                let stats = services.channels.sync(upstream)?;
                print_json(&json!({
                    "inserted": stats.inserted,
                    "updated": stats.updated,
                    "unchanged": stats.unchanged,
                }))
            }
        },
        Command::RecomputeCosts => {
            let repriced = services.pricing.recompute_costs()?;
            print_json(&json!({ "repriced": repriced }))
        }
    }
}

fn run_prices(command: PricesCommand, app_state: &AppState) -> Result<(), Box<dyn Error>> {
    let pricing = &app_state.services.pricing;
    match command {
        PricesCommand::List => print_json(&pricing.list_rules()?),
        PricesCommand::Set {
            model,
            input,
            cached,
            output,
        } => {
            let rule = PriceRuleInput {
                model,
                input_per_1m: input,
                cached_input_per_1m: cached,
                output_per_1m: output,
            };
            let repriced = pricing.upsert_rule(&rule)?;
            print_json(&json!({ "repriced": repriced }))
        }
        PricesCommand::Delete { model } => {
            let repriced = pricing.delete_rule(&model)?;
            print_json(&json!({ "repriced": repriced }))
        }
        PricesCommand::Sync {
            catalog,
            observed,
            replace,
        } => {
            let rows = load_pricing_defaults(&catalog)?;
            if observed {
                return print_json(&pricing.sync_catalog_for_models(&rows)?);
            }
            let repriced = if replace {
                pricing.replace_rules(&rows)?
            } else {
                pricing.sync_catalog(&rows)?
            };
            print_json(&json!({ "rules": rows.len(), "repriced": repriced }))
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
