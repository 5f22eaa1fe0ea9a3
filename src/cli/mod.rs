//! CLI module for Tollgate
//!
//! - `generate`, `chat`: send a request through the gateway
//! - `count`, `providers`, `models`, `health`, `usage`: read-only inspection

use crate::app::{self, AppConfig};
use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tollgate_core::RequestOptions;

mod generate;
mod inspect;

/// Budget-aware LLM gateway
#[derive(Parser, Debug)]
#[command(name = "tollgate")]
#[command(about = "Budget-aware LLM gateway")]
#[command(version)]
pub struct Cli {
    /// Extra configuration file layered over config/
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Routing and billing flags shared by `generate` and `chat`
#[derive(Args, Debug, Clone, Default)]
pub struct RequestArgs {
    /// User to bill
    #[arg(short, long)]
    pub user: Option<String>,
    /// Pin a provider (disables fallback)
    #[arg(short, long)]
    pub provider: Option<String>,
    /// Model to request
    #[arg(short, long)]
    pub model: Option<String>,
    /// Response ceiling in units
    #[arg(long)]
    pub max_tokens: Option<u32>,
    /// Sampling temperature
    #[arg(short, long)]
    pub temperature: Option<f32>,
    /// Stop sequence (repeatable)
    #[arg(long)]
    pub stop: Vec<String>,
}

impl RequestArgs {
    /// Gateway options for these flags
    pub fn to_options(&self) -> RequestOptions {
        RequestOptions {
            user_id: self.user.clone(),
            provider: self.provider.clone(),
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            stop: (!self.stop.is_empty()).then(|| self.stop.clone()),
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate a completion for a single prompt
    Generate {
        /// Prompt text; read from stdin when omitted
        prompt: Option<String>,
        #[command(flatten)]
        request: RequestArgs,
    },
    /// Send a conversation
    Chat {
        /// Message as `role:content` (repeatable, in order)
        #[arg(short = 'M', long = "message", required_unless_present = "file")]
        messages: Vec<String>,
        /// JSON file holding an array of {role, content}
        #[arg(short, long)]
        file: Option<PathBuf>,
        #[command(flatten)]
        request: RequestArgs,
    },
    /// Estimate units for text
    Count {
        /// Text to count
        text: String,
        #[arg(short, long)]
        provider: Option<String>,
        #[arg(short, long)]
        model: Option<String>,
    },
    /// List registered providers
    Providers,
    /// List catalog models and prices
    Models {
        #[arg(short, long)]
        provider: Option<String>,
    },
    /// Provider availability
    Health {
        #[arg(short, long)]
        provider: Option<String>,
    },
    /// Limits, consumption and headroom for a user
    Usage {
        /// User id
        user: String,
    },
}

/// Run the CLI command
pub async fn run(cli: Cli, config: AppConfig) -> Result<()> {
    let Some(command) = cli.command else {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        cmd.print_help()?;
        println!();
        return Ok(());
    };

    let shutdown = CancellationToken::new();
    let gateway = app::build_gateway(&config, &shutdown).await?;

    let result = match command {
        Commands::Generate { prompt, request } => {
            generate::run_generate(&gateway, prompt, &request, cli.json).await
        }
        Commands::Chat {
            messages,
            file,
            request,
        } => generate::run_chat(&gateway, &messages, file.as_deref(), &request, cli.json).await,
        Commands::Count {
            text,
            provider,
            model,
        } => inspect::count(&gateway, &text, provider.as_deref(), model.as_deref(), cli.json).await,
        Commands::Providers => inspect::providers(&gateway, cli.json),
        Commands::Models { provider } => inspect::models(&gateway, provider.as_deref(), cli.json),
        Commands::Health { provider } => inspect::health(&gateway, provider.as_deref(), cli.json),
        Commands::Usage { user } => inspect::usage(&gateway, &user, cli.json).await,
    };

    shutdown.cancel();
    result
}
