use campaign_rag::Result;
use campaign_rag::commands::{
    OutputFormat, ask_question, generate_content, index_collection, inspect_collection,
    run_session, show_status,
};
use campaign_rag::config::{get_config_dir, run_interactive_config, show_config};
use campaign_rag::llm::ContentKind;
use campaign_rag::session::{QueryRequest, SetupRequest};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "campaign-rag")]
#[command(about = "Ask questions about D&D campaign notes and generate grounded content")]
#[command(version)]
struct Cli {
    /// Directory holding config.toml and the default collection storage
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Overrides for the configured models and paths
#[derive(Args, Debug, Default)]
struct SetupArgs {
    /// Embedding model, e.g. "mxbai-embed-large"
    #[arg(long)]
    model_embed: Option<String>,
    /// Chat model, e.g. "llama3.1:8b"
    #[arg(long)]
    model_chat: Option<String>,
    /// Where the vector collection is stored
    #[arg(long)]
    db_path: Option<PathBuf>,
    /// Directory of markdown campaign notes
    #[arg(long)]
    source_dir: Option<PathBuf>,
}

impl From<SetupArgs> for SetupRequest {
    fn from(args: SetupArgs) -> Self {
        Self {
            model_embed: args.model_embed,
            model_chat: args.model_chat,
            db_path: args.db_path,
            source_dir: args.source_dir,
        }
    }
}

#[derive(Args, Debug)]
struct QueryArgs {
    /// What to ask or generate
    query: Vec<String>,
    /// Number of chunks retrieved as context
    #[arg(long)]
    top_k: Option<usize>,
    /// Print the raw JSON reply
    #[arg(long)]
    json: bool,
}

impl QueryArgs {
    fn into_request(self) -> (QueryRequest, OutputFormat) {
        let query = self.query.join(" ");
        let request = QueryRequest {
            query: (!query.trim().is_empty()).then_some(query),
            top_k: self.top_k,
        };
        let format = if self.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        };
        (request, format)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Configure Ollama connection and retrieval settings
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Build the collection from the source directory, replacing any previous one
    Index {
        #[command(flatten)]
        setup: SetupArgs,
    },
    /// Ask a question about the campaign notes
    Ask {
        #[command(flatten)]
        query: QueryArgs,
        #[command(flatten)]
        setup: SetupArgs,
    },
    /// Generate NPCs, locations, puzzles, items, rumours or names
    Generate {
        /// Kind of content to generate
        #[arg(value_enum)]
        kind: ContentKind,
        #[command(flatten)]
        query: QueryArgs,
        #[command(flatten)]
        setup: SetupArgs,
    },
    /// Show stored chunks
    Inspect {
        /// Maximum number of chunks to show
        #[arg(long)]
        limit: Option<usize>,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
        #[command(flatten)]
        setup: SetupArgs,
    },
    /// Check Ollama and the stored collection
    Status {
        #[command(flatten)]
        setup: SetupArgs,
    },
    /// Interactive question and generation loop
    Session {
        /// Rebuild the collection before starting
        #[arg(long)]
        rebuild: bool,
        #[command(flatten)]
        setup: SetupArgs,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config_dir = match cli.config_dir {
        Some(dir) => dir,
        None => get_config_dir()?,
    };

    match cli.command {
        Commands::Config { show } => {
            if show {
                show_config(&config_dir)?;
            } else {
                run_interactive_config(&config_dir)?;
            }
        }
        Commands::Index { setup } => {
            index_collection(&config_dir, setup.into()).await?;
        }
        Commands::Ask { query, setup } => {
            let (request, format) = query.into_request();
            ask_question(&config_dir, setup.into(), request, format).await?;
        }
        Commands::Generate { kind, query, setup } => {
            let (request, format) = query.into_request();
            generate_content(&config_dir, setup.into(), kind, request, format).await?;
        }
        Commands::Inspect { limit, json, setup } => {
            let format = if json {
                OutputFormat::Json
            } else {
                OutputFormat::Text
            };
            inspect_collection(&config_dir, setup.into(), limit, format).await?;
        }
        Commands::Status { setup } => {
            show_status(&config_dir, setup.into()).await?;
        }
        Commands::Session { rebuild, setup } => {
            run_session(&config_dir, setup.into(), rebuild).await?;
        }
    }

    Ok(())
}
