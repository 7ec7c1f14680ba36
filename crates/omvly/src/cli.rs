//! Clap derive structures for the `omvly` CLI.
//!
//! Defines the command tree, global flags, and shared value enums.

use clap::{Args, Parser, Subcommand, ValueEnum};

use omvly_core::Category;

// ── Top-Level CLI ────────────────────────────────────────────────────

/// omvly -- poll OpenMediaVault devices and print normalized snapshots
#[derive(Debug, Parser)]
#[command(
    name = "omvly",
    version,
    about = "Poll OpenMediaVault devices from the command line",
    long_about = "Fetches hardware, plugin, disk, filesystem, SMART and service state\n\
        from an OpenMediaVault device over its JSON-RPC API and prints a\n\
        normalized snapshot with a stable field set.",
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
    /// Device profile to use
    #[arg(long, short = 'p', env = "OMVLY_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Device host, optionally with a port (overrides profile)
    #[arg(long, short = 'H', env = "OMVLY_HOST", global = true)]
    pub host: Option<String>,

    /// Login user (overrides profile)
    #[arg(long, short = 'u', env = "OMVLY_USERNAME", global = true)]
    pub username: Option<String>,

    /// Talk to the device over HTTPS
    #[arg(long, env = "OMVLY_SSL", global = true)]
    pub ssl: bool,

    /// Verify the device's TLS certificate
    #[arg(long, env = "OMVLY_VERIFY_SSL", global = true)]
    pub verify_ssl: bool,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "OMVLY_OUTPUT",
        default_value = "json",
        global = true
    )]
    pub output: OutputFormat,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Request timeout in seconds (overrides profile)
    #[arg(long, env = "OMVLY_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Value Enums ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Pretty-printed JSON (default)
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
}

/// Snapshot slice selectable on the command line.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum CategoryArg {
    /// Hardware and system information
    Hwinfo,
    /// Installed plugins
    Plugin,
    /// Physical disks with SMART data
    Disk,
    /// Mounted filesystems
    Fs,
    /// System services
    Service,
}

impl From<CategoryArg> for Category {
    fn from(arg: CategoryArg) -> Self {
        match arg {
            CategoryArg::Hwinfo => Category::Hwinfo,
            CategoryArg::Plugin => Category::Plugin,
            CategoryArg::Disk => Category::Disk,
            CategoryArg::Fs => Category::Fs,
            CategoryArg::Service => Category::Service,
        }
    }
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run one full refresh and print the snapshot
    #[command(alias = "snap", alias = "s")]
    Snapshot(SnapshotArgs),

    /// Keep polling and print every published snapshot
    #[command(alias = "w")]
    Watch(WatchArgs),

    /// Manage CLI configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Snapshot / Watch ─────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct SnapshotArgs {
    /// Print only one slice of the snapshot
    #[arg(long, short = 'c')]
    pub category: Option<CategoryArg>,
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Print only one slice of the snapshot
    #[arg(long, short = 'c')]
    pub category: Option<CategoryArg>,

    /// Seconds between hardware/plugin/disk cycles (overrides profile)
    #[arg(long)]
    pub fast_interval: Option<u64>,

    /// Seconds between full inventory cycles (overrides profile)
    #[arg(long)]
    pub slow_interval: Option<u64>,

    /// Exit after this many published snapshots
    #[arg(long, short = 'n')]
    pub count: Option<u32>,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the config file location
    Path,

    /// Show current configuration (passwords redacted)
    Show,

    /// List profile names
    Profiles,

    /// Store a profile's password in the system keyring
    SetPassword {
        /// Profile to update (defaults to the active profile)
        #[arg(long)]
        profile: Option<String>,
    },
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
