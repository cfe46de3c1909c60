//! Clap derive structures for the `vesync` CLI.
//!
//! Defines the command tree, global flags, and shared types.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// vesync -- command-line access to a VeSync cloud account
#[derive(Debug, Parser)]
#[command(
    name = "vesync",
    version,
    about = "Log in to a VeSync account and list its devices",
    long_about = "Talks to the VeSync cloud the way the mobile app does.\n\n\
        Sessions are cached per profile, so repeated commands reuse the\n\
        token instead of logging in again.",
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
    /// Account profile to use
    #[arg(long, short = 'p', env = "VESYNC_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Account e-mail (overrides profile)
    #[arg(long, short = 'u', env = "VESYNC_USERNAME", global = true)]
    pub username: Option<String>,

    /// Region to log in to first: US, EU, CA, MX, JP
    #[arg(long, short = 'r', env = "VESYNC_REGION", global = true)]
    pub region: Option<String>,

    /// Account country code, e.g. DE (overrides profile)
    #[arg(long, env = "VESYNC_COUNTRY_CODE", global = true)]
    pub country_code: Option<String>,

    /// Pin every request to this base URL
    #[arg(long, env = "VESYNC_API_URL", global = true)]
    pub api_url: Option<String>,

    /// Session file (overrides profile)
    #[arg(long, env = "VESYNC_SESSION_FILE", global = true)]
    pub session_file: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "VESYNC_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Accept invalid TLS certificates
    #[arg(long, short = 'k', env = "VESYNC_INSECURE", global = true)]
    pub insecure: bool,

    /// Request timeout in seconds
    #[arg(long, env = "VESYNC_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Log in and cache the session
    Login(LoginArgs),

    /// List devices registered to the account
    #[command(alias = "dev", alias = "d")]
    Devices(DevicesArgs),

    /// Inspect or drop the cached session
    Session(SessionArgs),

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Login ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct LoginArgs {
    /// Ignore any cached session and log in again
    #[arg(long, short = 'f')]
    pub force: bool,

    /// Store the password in the system keyring for this profile
    #[arg(long)]
    pub remember: bool,
}

// ── Devices ──────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct DevicesArgs {
    /// Only show devices reported online
    #[arg(long)]
    pub online: bool,

    /// Filter by product category (e.g. wifi-air)
    #[arg(long, short = 't')]
    pub product_type: Option<String>,
}

// ── Session ──────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct SessionArgs {
    #[command(subcommand)]
    pub command: SessionCommand,
}

#[derive(Debug, Subcommand)]
pub enum SessionCommand {
    /// Show the cached session (token redacted)
    Show,

    /// Delete the cached session
    Clear,

    /// Print the session file path
    Path,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the config file path
    Path,

    /// Show the resolved configuration (secrets redacted)
    Show,

    /// List configured profiles
    Profiles,

    /// Create or update a profile
    Set(ConfigSetArgs),

    /// Store a profile password in the system keyring
    SetPassword,
}

#[derive(Debug, Args)]
pub struct ConfigSetArgs {
    /// Profile name (defaults to the active profile)
    pub name: Option<String>,

    /// Make this the default profile
    #[arg(long)]
    pub default: bool,
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
