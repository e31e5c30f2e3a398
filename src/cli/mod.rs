//! CLI for deckbridge.

pub mod commands;

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand, ValueEnum};

/// Deckbridge CLI
#[derive(Parser, Debug)]
#[command(
    name = "deckbridge",
    version,
    about = "Bridge a Gemini agent to MCP tool servers"
)]
pub struct Cli {
    /// Log verbosity: -v for debug, -vv for trace. RUST_LOG overrides.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the presentation tool server on stdin/stdout
    Serve(ServeArgs),
    /// Chat with the agent through one or more tool servers
    Chat(ChatArgs),
    /// List the tools offered by tool servers
    Tools(ToolsArgs),
}

/// Where the tool server keeps presentations.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Backend {
    /// Process-local storage, lost on exit
    Memory,
    /// Google Slides REST API
    Google,
}

impl Backend {
    pub fn as_arg(self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Google => "google",
        }
    }
}

/// Arguments for `deckbridge serve`.
#[derive(Parser, Debug)]
pub struct ServeArgs {
    #[arg(long, value_enum, default_value_t = Backend::Google)]
    pub backend: Backend,

    /// Override the Slides API base URL
    #[arg(long)]
    pub slides_base_url: Option<String>,
}

/// Arguments for `deckbridge chat`.
#[derive(Parser, Debug)]
pub struct ChatArgs {
    /// Tool server to connect to: a .js/.py script or an executable (repeatable)
    #[arg(short = 'S', long = "server", value_name = "PATH")]
    pub servers: Vec<String>,

    /// Config file (defaults to ~/.deckbridge/config.toml)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Gemini model id
    #[arg(short, long)]
    pub model: Option<String>,

    /// System prompt
    #[arg(short, long)]
    pub system: Option<String>,

    /// Access token pushed to the servers through set-access-token before chatting
    #[arg(long, env = "DECKBRIDGE_ACCESS_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Backend of the built-in server, used when no server is configured
    #[arg(long, value_enum, default_value_t = Backend::Google)]
    pub backend: Backend,
}

/// Arguments for `deckbridge tools`.
#[derive(Parser, Debug)]
pub struct ToolsArgs {
    /// Tool server to inspect (repeatable)
    #[arg(short = 'S', long = "server", value_name = "PATH")]
    pub servers: Vec<String>,

    /// Config file (defaults to ~/.deckbridge/config.toml)
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

impl Cli {
    /// Parse CLI arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
