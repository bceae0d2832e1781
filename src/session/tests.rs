use super::*;
use crate::llm::ChatMessage;
use std::fs;
use tempfile::TempDir;

struct LengthEmbedder;

impl Embedder for LengthEmbedder {
    fn model(&self) -> &str {
        "length-test"
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(vec![text.len() as f32, 1.0])
    }
}

struct FixedChat(&'static str);

impl ChatProvider for FixedChat {
    fn model(&self) -> &str {
        "fixed-test"
    }

    fn chat(&self, _messages: &[ChatMessage], _format: &serde_json::Value) -> Result<String> {
        Ok(self.0.to_string())
    }
}

fn create_settings(temp_dir: &TempDir) -> SessionSettings {
    let source_dir = temp_dir.path().join("Stone-Heart Hollow");
    fs::create_dir_all(&source_dir).expect("should create source dir");
    fs::write(
        source_dir.join("adventure.md"),
        "# Town\n## Tavern\nThe ale is warm.",
    )
    .expect("should write note");

    let config = Config::with_base_dir(temp_dir.path());
    SessionSettings::resolve(
        &config,
        SetupRequest {
            source_dir: Some(source_dir),
            ..SetupRequest::default()
        },
    )
}

async fn create_session(temp_dir: &TempDir) -> Session {
    let (session, _) = Session::setup_with(
        create_settings(temp_dir),
        Arc::new(LengthEmbedder),
        Arc::new(FixedChat(r#"{"answer":"Warm ale.","references":["adventure-1"]}"#)),
    )
    .await
    .expect("should set up session");
    session
}

#[test]
fn settings_fall_back_to_config() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = Config::with_base_dir(temp_dir.path());

    let settings = SessionSettings::resolve(&config, SetupRequest::default());

    assert_eq!(settings.model_embed, "mxbai-embed-large");
    assert_eq!(settings.model_chat, "llama3.1:8b");
    assert_eq!(settings.db_path, temp_dir.path().join("markdown_db"));
    assert_eq!(settings.source_dir, None);
    assert_eq!(settings.collection_name, None);
    assert_eq!(settings.top_k, 5);
}

#[test]
fn setup_request_overrides_config() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = Config::with_base_dir(temp_dir.path());

    let settings = SessionSettings::resolve(
        &config,
        SetupRequest {
            model_embed: Some("nomic-embed-text".to_string()),
            model_chat: Some("mistral".to_string()),
            db_path: Some(PathBuf::from("custom_db")),
            source_dir: Some(PathBuf::from("/campaigns/Curse of Strahd")),
        },
    );

    assert_eq!(settings.model_embed, "nomic-embed-text");
    assert_eq!(settings.model_chat, "mistral");
    assert_eq!(settings.db_path, temp_dir.path().join("custom_db"));
    assert_eq!(settings.collection_name.as_deref(), Some("Curse of Strahd"));
}

#[test]
fn collection_name_comes_from_last_path_component() {
    assert_eq!(
        collection_name_from_dir(Path::new("/notes/Stone-Heart Hollow/")).as_deref(),
        Some("Stone-Heart Hollow")
    );
    assert_eq!(collection_name_from_dir(Path::new("/")), None);
}

#[tokio::test]
async fn setup_without_source_dir_is_invalid_input() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = Config::with_base_dir(temp_dir.path());
    let settings = SessionSettings::resolve(&config, SetupRequest::default());

    let result =
        Session::setup_with(settings, Arc::new(LengthEmbedder), Arc::new(FixedChat("{}"))).await;
    assert!(matches!(result, Err(RagError::InvalidInput(_))));
}

#[tokio::test]
async fn missing_or_blank_query_is_invalid_input() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let session = create_session(&temp_dir).await;

    let missing = session.ask(QueryRequest::default()).await;
    assert!(matches!(missing, Err(RagError::InvalidInput(_))));

    let blank = session.ask(QueryRequest::new("   ")).await;
    assert!(matches!(blank, Err(RagError::InvalidInput(_))));

    let zero = session
        .generate(ContentKind::Npc, QueryRequest::new("a bard").with_top_k(0))
        .await;
    assert!(matches!(zero, Err(RagError::InvalidInput(_))));
}

#[tokio::test]
async fn ask_returns_validated_answer() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let session = create_session(&temp_dir).await;

    let answer = session
        .ask(QueryRequest::new("What is the ale like?").with_top_k(1))
        .await
        .expect("should answer");

    assert_eq!(answer.answer, "Warm ale.");
    assert_eq!(session.collection_name().await, "stone-heart-hollow");
}

#[tokio::test]
async fn generate_surfaces_schema_validation() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let mut settings = create_settings(&temp_dir);
    settings.max_retries = 2;
    let (session, _) = Session::setup_with(
        settings,
        Arc::new(LengthEmbedder),
        Arc::new(FixedChat(r#"{"answer":"not an npc list"}"#)),
    )
    .await
    .expect("should set up session");

    let result = session
        .generate(ContentKind::Npc, QueryRequest::new("a bard"))
        .await;

    assert!(matches!(
        result,
        Err(RagError::SchemaValidation { attempts: 2, .. })
    ));
}

#[tokio::test]
async fn rebuild_and_inspect_share_the_index() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let session = create_session(&temp_dir).await;

    let source_dir = session
        .settings()
        .source_dir
        .clone()
        .expect("source dir is set");
    fs::write(source_dir.join("wilds.md"), "# Wilds\nTrees.").expect("should write note");

    let report = session.rebuild().await.expect("should rebuild");
    assert!(report.replaced_existing);
    assert_eq!(report.chunks, 2);

    let inspection = session.inspect(None).await.expect("should inspect");
    assert_eq!(inspection.total_documents, 2);
}
