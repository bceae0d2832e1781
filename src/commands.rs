use anyhow::{Context, Result};
use console::style;
use dialoguer::Input;
use serde::Serialize;
use std::path::Path;
use tracing::{info, warn};

use crate::RagError;
use crate::config::Config;
use crate::embeddings::{Embedder, OllamaClient};
use crate::indexer::{BuildReport, Inspection};
use crate::llm::schemas::Answer;
use crate::llm::{ChatProvider, ContentKind, GeneratedContent, OllamaChatClient};
use crate::session::{QueryRequest, Session, SetupRequest};

/// Output format for query results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

fn load_config(config_dir: &Path) -> Result<Config> {
    Config::load(config_dir).context("Failed to load configuration")
}

async fn open_session(config_dir: &Path, setup: SetupRequest) -> Result<Session> {
    let config = load_config(config_dir)?;
    match Session::open(&config, setup).await {
        Ok(session) => Ok(session),
        Err(RagError::NotInitialized) => {
            eprintln!(
                "{}",
                style("No collection found. Run `campaign-rag index` first.").yellow()
            );
            Err(RagError::NotInitialized.into())
        }
        Err(e) => Err(e.into()),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{}", json);
    Ok(())
}

fn print_build_report(report: &BuildReport) {
    println!("✅ Indexed collection '{}'", report.collection_name);
    println!("   📄 Documents: {}", report.documents);
    println!("   🧩 Chunks: {}", report.chunks);
    if report.replaced_existing {
        println!("   ♻️  Replaced the previous collection");
    }
}

fn print_answer(answer: &Answer, format: OutputFormat) -> Result<()> {
    if format == OutputFormat::Json {
        return print_json(answer);
    }

    println!("{}", answer.answer);
    if !answer.references.is_empty() {
        println!();
        println!("{}", style("References:").bold());
        for reference in &answer.references {
            println!("  - {}", reference);
        }
    }
    Ok(())
}

fn print_generated(content: &GeneratedContent, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => print_json(content),
        OutputFormat::Text => {
            println!("{}", style(format!("Generated {}:", content.kind())).bold());
            print_json(&content.data().context("Failed to serialize content")?)
        }
    }
}

fn print_inspection(inspection: &Inspection, format: OutputFormat) -> Result<()> {
    if format == OutputFormat::Json {
        return print_json(inspection);
    }

    println!(
        "📚 {} chunks stored, showing {}",
        inspection.total_documents, inspection.sample_shown
    );
    for chunk in &inspection.documents {
        println!();
        println!("{}", style(&chunk.id).cyan().bold());
        println!("{}", chunk.document);
    }
    Ok(())
}

/// Build the collection from the source directory, replacing any previous one
#[inline]
pub async fn index_collection(config_dir: &Path, setup: SetupRequest) -> Result<()> {
    let config = load_config(config_dir)?;
    info!("Indexing campaign notes");

    let (_session, report) = Session::setup(&config, setup)
        .await
        .context("Failed to build collection")?;

    print_build_report(&report);
    Ok(())
}

#[inline]
pub async fn ask_question(
    config_dir: &Path,
    setup: SetupRequest,
    request: QueryRequest,
    format: OutputFormat,
) -> Result<()> {
    let session = open_session(config_dir, setup).await?;
    let answer = session.ask(request).await?;
    print_answer(&answer, format)
}

#[inline]
pub async fn generate_content(
    config_dir: &Path,
    setup: SetupRequest,
    kind: ContentKind,
    request: QueryRequest,
    format: OutputFormat,
) -> Result<()> {
    let session = open_session(config_dir, setup).await?;
    let content = session.generate(kind, request).await?;
    print_generated(&content, format)
}

#[inline]
pub async fn inspect_collection(
    config_dir: &Path,
    setup: SetupRequest,
    limit: Option<usize>,
    format: OutputFormat,
) -> Result<()> {
    let session = open_session(config_dir, setup).await?;
    let inspection = session.inspect(limit).await?;
    print_inspection(&inspection, format)
}

/// Report Ollama health and collection size
#[inline]
pub async fn show_status(config_dir: &Path, setup: SetupRequest) -> Result<()> {
    let config = load_config(config_dir)?;

    println!("🤖 Ollama Status:");
    match OllamaClient::new(&config.ollama) {
        Ok(client) => {
            let client = match &setup.model_embed {
                Some(model) => client.with_model(model.clone()),
                None => client,
            };
            match client.health_check() {
                Ok(()) => println!("   ✅ Embedding model: {}", client.model()),
                Err(e) => println!("   ⚠️  Embedding model unavailable - {:#}", e),
            }
        }
        Err(e) => println!("   ❌ Ollama: Failed to create client - {:#}", e),
    }
    match OllamaChatClient::new(&config.ollama) {
        Ok(client) => {
            let client = match &setup.model_chat {
                Some(model) => client.with_model(model.clone()),
                None => client,
            };
            match client.health_check() {
                Ok(()) => println!("   ✅ Chat model: {}", client.model()),
                Err(e) => println!("   ⚠️  Chat model unavailable - {:#}", e),
            }
        }
        Err(e) => println!("   ❌ Ollama: Failed to create client - {:#}", e),
    }

    println!();
    println!("🔍 Collection Status:");
    match Session::open(&config, setup).await {
        Ok(session) => {
            println!(
                "   ✅ '{}': {} chunks at {}",
                session.collection_name().await,
                session.count().await?,
                session.settings().db_path.display()
            );
        }
        Err(RagError::NotInitialized) => println!("   💤 Not built yet"),
        Err(e) => println!("   ❌ Failed to open collection - {}", e),
    }

    Ok(())
}

/// A line typed at the interactive session prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    Ask(String),
    Generate(ContentKind, String),
    Inspect(Option<usize>),
    Rebuild,
    Help,
    Quit,
}

impl SessionCommand {
    /// Parse a prompt line. Unknown leading words are treated as a question.
    #[inline]
    pub fn parse(line: &str) -> std::result::Result<Self, String> {
        let line = line.trim();
        let (head, rest) = line
            .split_once(char::is_whitespace)
            .map_or((line, ""), |(head, rest)| (head, rest.trim()));

        match head.to_lowercase().as_str() {
            "" => Err("Type a question, or `help` for commands".to_string()),
            "quit" | "exit" if rest.is_empty() => Ok(Self::Quit),
            "help" if rest.is_empty() => Ok(Self::Help),
            "rebuild" if rest.is_empty() => Ok(Self::Rebuild),
            "inspect" if rest.is_empty() => Ok(Self::Inspect(None)),
            "inspect" => rest
                .parse()
                .map(|limit| Self::Inspect(Some(limit)))
                .map_err(|_| format!("Invalid limit: {}", rest)),
            "ask" => Ok(Self::Ask(rest.to_string())),
            "gen" | "generate" => {
                let (kind, query) = rest
                    .split_once(char::is_whitespace)
                    .map_or((rest, ""), |(kind, query)| (kind, query.trim()));
                let kind = ContentKind::parse(kind).ok_or_else(|| {
                    format!(
                        "Unknown content kind '{}'. Choose one of: {}",
                        kind,
                        ContentKind::ALL.map(ContentKind::as_str).join(", ")
                    )
                })?;
                Ok(Self::Generate(kind, query.to_string()))
            }
            _ => Ok(Self::Ask(line.to_string())),
        }
    }
}

fn print_session_help() {
    println!("{}", style("Commands:").bold().yellow());
    println!("  <question>              Ask about the campaign notes");
    println!("  ask <question>          Same as above");
    println!("  gen <kind> <request>    Generate npc, location, puzzle, item, rumour or name");
    println!("  inspect [limit]         Show stored chunks");
    println!("  rebuild                 Re-index the source directory");
    println!("  quit                    Leave the session");
}

/// Interactive loop over one session
#[inline]
pub async fn run_session(config_dir: &Path, setup: SetupRequest, rebuild: bool) -> Result<()> {
    let config = load_config(config_dir)?;

    let session = if rebuild {
        let (session, report) = Session::setup(&config, setup)
            .await
            .context("Failed to build collection")?;
        print_build_report(&report);
        session
    } else {
        open_session(config_dir, setup).await?
    };

    eprintln!(
        "{}",
        style(format!(
            "🎲 Campaign session on '{}' with {}",
            session.collection_name().await,
            session.settings().model_chat
        ))
        .bold()
        .cyan()
    );
    print_session_help();

    loop {
        let line: String = Input::new()
            .with_prompt(">")
            .allow_empty(true)
            .interact_text()?;

        let command = match SessionCommand::parse(&line) {
            Ok(command) => command,
            Err(message) => {
                eprintln!("{}", style(message).yellow());
                continue;
            }
        };

        let outcome = match command {
            SessionCommand::Quit => break,
            SessionCommand::Help => {
                print_session_help();
                Ok(())
            }
            SessionCommand::Ask(query) => match session.ask(QueryRequest::new(query)).await {
                Ok(answer) => print_answer(&answer, OutputFormat::Text),
                Err(e) => Err(e.into()),
            },
            SessionCommand::Generate(kind, query) => {
                match session.generate(kind, QueryRequest::new(query)).await {
                    Ok(content) => print_generated(&content, OutputFormat::Text),
                    Err(e) => Err(e.into()),
                }
            }
            SessionCommand::Inspect(limit) => match session.inspect(limit).await {
                Ok(inspection) => print_inspection(&inspection, OutputFormat::Text),
                Err(e) => Err(e.into()),
            },
            SessionCommand::Rebuild => match session.rebuild().await {
                Ok(report) => {
                    print_build_report(&report);
                    Ok(())
                }
                Err(e) => Err(e.into()),
            },
        };

        if let Err(e) = outcome {
            warn!("Session command failed: {:#}", e);
            eprintln!("{} {:#}", style("Error:").red().bold(), e);
        }
    }

    Ok(())
}
