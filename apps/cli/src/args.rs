use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use meter_app::{RangeParams, RecordsParams};

/// Ingest proxy usage payloads and report metered cost.
#[derive(Debug, Parser)]
#[command(name = "usage-meter")]
#[command(version)]
pub struct Cli {
    /// Config file (default: $XDG_CONFIG_HOME/usage-meter/config.toml)
    #[arg(long, global = true, env = "USAGE_METER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Database file, overriding the configured data dir
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Bucket timezone such as `UTC+8` or `Asia/Shanghai`
    #[arg(long, global = true)]
    pub tz: Option<String>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Ingest a usage payload file
    Ingest {
        /// JSON payload as exported by the proxy's usage endpoint
        payload: PathBuf,
    },

    /// Totals, model and channel rollups, daily and hourly series
    Overview {
        #[command(flatten)]
        range: RangeArgs,

        /// Model page, 1-based
        #[arg(long, default_value = "1")]
        page: u32,

        #[arg(long)]
        page_size: Option<u32>,
    },

    /// Evenly spread sample of raw entries
    Explore {
        #[command(flatten)]
        range: RangeArgs,

        #[arg(long)]
        max_points: Option<u32>,
    },

    /// One page of raw entries
    Records {
        #[command(flatten)]
        range: RangeArgs,

        /// time, model, route, input_tokens, output_tokens, total_tokens, cost, is_error
        #[arg(long)]
        sort: Option<String>,

        /// asc or desc
        #[arg(long)]
        order: Option<String>,

        #[arg(long)]
        page_size: Option<u32>,

        /// `next_cursor` from the previous page
        #[arg(long)]
        cursor: Option<String>,

        /// Include distinct models, routes, and channels
        #[arg(long)]
        include_filters: bool,
    },

    /// Manage price rules
    Prices {
        #[command(subcommand)]
        command: PricesCommand,
    },

    /// Manage channel mappings
    Channels {
        #[command(subcommand)]
        command: ChannelsCommand,
    },

    /// Reprice every stored entry from the current rules
    RecomputeCosts,
}

#[derive(Debug, Subcommand)]
pub enum PricesCommand {
    List,

    /// Create or update one rule; `*` in the model is a wildcard
    Set {
        model: String,

        /// USD per million input tokens
        #[arg(long)]
        input: f64,

        /// USD per million cached input tokens
        #[arg(long, default_value = "0")]
        cached: f64,

        /// USD per million output tokens
        #[arg(long)]
        output: f64,
    },

    Delete {
        model: String,
    },

    /// Apply a JSON catalog of rules
    Sync {
        catalog: PathBuf,

        /// Only price models already seen in stored entries
        #[arg(long)]
        observed: bool,

        /// Replace every stored rule with the catalog
        #[arg(long, conflicts_with = "observed")]
        replace: bool,
    },
}

#[derive(Debug, Subcommand)]
pub enum ChannelsCommand {
    List,

    /// Refresh mappings from the upstream auth-file listing
    Sync,
}

#[derive(Debug, Clone, Args)]
pub struct RangeArgs {
    /// Trailing window in days (1-90)
    #[arg(long)]
    pub days: Option<i64>,

    /// RFC 3339 start; takes precedence over --days
    #[arg(long)]
    pub start: Option<String>,

    #[arg(long)]
    pub end: Option<String>,

    #[arg(long)]
    pub model: Option<String>,

    #[arg(long)]
    pub route: Option<String>,

    /// Channel name or raw source
    #[arg(long)]
    pub channel: Option<String>,
}

impl RangeArgs {
    pub fn into_params(self, tz: Option<String>) -> RangeParams {
        RangeParams {
            days: self.days,
            start: self.start,
            end: self.end,
            model: self.model,
            route: self.route,
            channel: self.channel,
            tz,
        }
    }
}

pub fn records_params(
    sort: Option<String>,
    order: Option<String>,
    page_size: Option<u32>,
    cursor: Option<String>,
    include_filters: bool,
) -> RecordsParams {
    RecordsParams {
        sort,
        order,
        page_size,
        cursor,
        include_filters,
    }
}
