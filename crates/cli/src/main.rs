//! deskhand CLI — run the agent engine from a terminal.
//!
//! Commands:
//! - `agent`  — send a message and stream the run's events
//! - `config` — print the resolved configuration

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::debug;

use deskhand_audit::TracingAuditSink;
use deskhand_capabilities::default_registry;
use deskhand_config::EngineConfig;
use deskhand_core::{Conversation, ExecutionContext, Message, StreamEvent};
use deskhand_engine::AgentRunner;
use deskhand_inference::HttpInferenceClient;

#[derive(Parser)]
#[command(
    name = "deskhand",
    about = "deskhand — agent engine for the business-management platform",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to deskhand.toml
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Send a message to the agent and stream the response
    Agent {
        /// The message to send
        message: String,

        /// Override the configured model
        #[arg(short, long)]
        model: Option<String>,

        /// Session identifier passed through to capabilities
        #[arg(long)]
        session: Option<String>,

        /// Tenant identifier passed through to capabilities
        #[arg(long)]
        tenant: Option<String>,
    },

    /// Print the resolved configuration
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    let config = EngineConfig::load_or_default(cli.config.as_deref())?;
    debug!(?config, "Configuration resolved");

    match cli.command {
        Commands::Agent {
            message,
            model,
            session,
            tenant,
        } => run_agent(config, message, model, session, tenant).await,
        Commands::Config => {
            println!("{config:#?}");
            Ok(())
        }
    }
}

async fn run_agent(
    config: EngineConfig,
    message: String,
    model: Option<String>,
    session: Option<String>,
    tenant: Option<String>,
) -> anyhow::Result<()> {
    let backend = Arc::new(HttpInferenceClient::from_config(&config));

    let mut registry = default_registry();
    if config.audit.enabled {
        registry = registry.with_audit(Arc::new(TracingAuditSink));
    }

    let mut runner = AgentRunner::new(
        backend,
        Arc::new(registry),
        model.unwrap_or_else(|| config.model.clone()),
    )
    .with_temperature(config.temperature)
    .with_step_budget(config.step_budget);
    if let Some(max_tokens) = config.max_tokens {
        runner = runner.with_max_tokens(max_tokens);
    }

    let mut ctx = ExecutionContext::new();
    if let Some(session) = session {
        ctx = ctx.with_session(session);
    }
    if let Some(tenant) = tenant {
        ctx = ctx.with_tenant(tenant);
    }

    let mut conversation = Conversation::new();
    conversation.push(Message::user(message));
    let mut events = runner.run_stream(conversation.messages, ctx);

    let mut stdout = std::io::stdout();
    let mut failed = false;
    while let Some(event) = events.recv().await {
        match event {
            StreamEvent::TextDelta { content } => {
                write!(stdout, "{content}")?;
                stdout.flush()?;
            }
            StreamEvent::CapabilityRequested { name, arguments, .. } => {
                eprintln!("→ {name}({arguments})");
            }
            StreamEvent::CapabilityCompleted { name, output, .. } => {
                eprintln!("← {name}: {output}");
            }
            StreamEvent::FinalAnswer { content } => {
                // Deltas already printed the text for streamed turns; make
                // sure the answer lands even when none were emitted.
                if content.is_empty() {
                    println!();
                } else {
                    println!("\n{content}");
                }
            }
            StreamEvent::Error { message } => {
                eprintln!("error: {message}");
                failed = true;
            }
        }
    }

    if failed {
        std::process::exit(1);
    }
    Ok(())
}
