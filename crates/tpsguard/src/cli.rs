//! Clap derive structures for the `tpsguard` CLI.
//!
//! Defines the command tree, global flags, and shared value enums.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// tpsguard -- keep TPS mitigation zones in line with what operators asked for
#[derive(Debug, Parser)]
#[command(
    name = "tpsguard",
    version,
    about = "Orchestrate and watch DDoS mitigation zones on a TPS appliance",
    long_about = "Creates and re-syncs mitigation zones from local templates, and\n\
        runs as a daemon that reports attack incidents, out-of-band zone\n\
        changes and appliance reachability.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Path to config.toml (defaults to the platform config directory)
    #[arg(long, env = "TPSGUARD_CONFIG", global = true, hide_env = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(long, short = 'o', default_value = "table", global = true)]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Log line format
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Accept self-signed TLS certificates
    #[arg(long, short = 'k', global = true)]
    pub insecure: bool,
}

// ── Value Enums ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines
    Text,
    /// One JSON object per line
    Json,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the pollers until interrupted (Ctrl-C)
    Run,

    /// Create or re-sync the mitigation zone for an IP
    Mitigate(MitigateArgs),

    /// Delete the mitigation zone for an IP
    #[command(alias = "rm")]
    Remove(RemoveArgs),

    /// Inspect mitigation zones
    #[command(alias = "z")]
    Zones(ZonesArgs),

    /// Inspect ongoing attack incidents
    #[command(alias = "inc")]
    Incidents(IncidentsArgs),

    /// Manage local zone templates
    Templates(TemplatesArgs),

    /// Show appliance system, inventory and license information
    System(SystemArgs),

    /// Manage configuration and stored credentials
    Config(ConfigArgs),
}

// ── Mitigation ───────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct MitigateArgs {
    /// Target IP address (becomes the zone name)
    pub ip: String,

    /// Template to create the zone from (required when several exist)
    #[arg(long, short = 't')]
    pub template: Option<String>,
}

#[derive(Debug, Args)]
pub struct RemoveArgs {
    /// IP address of the zone to delete
    pub ip: String,
}

// ── Zones ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ZonesArgs {
    #[command(subcommand)]
    pub command: ZonesCommand,
}

#[derive(Debug, Subcommand)]
pub enum ZonesCommand {
    /// List zones, one page at a time
    #[command(alias = "ls")]
    List(PageArgs),

    /// Show mode, services and addresses of the zone for an IP
    Status {
        /// Zone IP address
        ip: String,
    },
}

#[derive(Debug, Args)]
pub struct PageArgs {
    /// Page number (1-based)
    #[arg(long, default_value = "1", value_parser = clap::value_parser!(u32).range(1..))]
    pub page: u32,

    /// Items per page
    #[arg(long, default_value = "50", value_parser = clap::value_parser!(u32).range(1..=1000))]
    pub items: u32,
}

// ── Incidents ────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct IncidentsArgs {
    #[command(subcommand)]
    pub command: Option<IncidentsCommand>,

    #[command(flatten)]
    pub page: PageArgs,
}

#[derive(Debug, Subcommand)]
pub enum IncidentsCommand {
    /// Show the raw detail record of one incident
    Show {
        /// Incident ID
        id: String,
    },
}

// ── Templates ────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct TemplatesArgs {
    #[command(subcommand)]
    pub command: TemplatesCommand,
}

#[derive(Debug, Subcommand)]
pub enum TemplatesCommand {
    /// List readable templates in the template directory
    #[command(alias = "ls")]
    List,

    /// Print a stored template
    Show {
        /// Template name (file stem)
        name: String,
    },

    /// Validate a template file and store it under a name
    Add {
        /// Template name (file stem)
        name: String,

        /// JSON file holding zone_payload and monitor_payload
        file: PathBuf,
    },

    /// Capture the zone protecting an IP as a new template
    Import {
        /// IP address of an existing zone
        ip: String,

        /// Name for the new template
        name: String,
    },

    /// Delete a stored template ('default' is protected)
    #[command(alias = "rm")]
    Delete {
        /// Template name
        name: String,
    },
}

// ── System ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct SystemArgs {
    #[command(subcommand)]
    pub command: Option<SystemCommand>,
}

#[derive(Debug, Subcommand)]
pub enum SystemCommand {
    /// List enforcement devices in the inventory
    Devices,

    /// Show license type, limits and expiry
    License,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the effective configuration (password masked)
    Show,

    /// Print the config file path
    Path,

    /// Store the appliance password in the system keyring
    SetPassword,
}
