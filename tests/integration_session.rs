#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

// Session flows with deterministic embedding and scripted chat replies

mod common;

use campaign_rag::RagError;
use campaign_rag::config::Config;
use campaign_rag::llm::{ChatRole, ContentKind, GeneratedContent};
use campaign_rag::session::{QueryRequest, Session, SessionSettings, SetupRequest};
use common::{KeywordEmbedder, ScriptedChat, TOWN_NOTE, WILDS_NOTE, init_test_tracing, write_campaign};
use std::sync::Arc;
use tempfile::TempDir;

const NPC_REPLY: &str = r#"{"NPCs":[{"name":"Brannoc","race":"Dwarf","role":"Smith's apprentice","description":"Soot to the elbows.","motivation":"Earn his own anvil.","secret":"Pawned Hesta's hammer."}]}"#;

fn create_settings(temp_dir: &TempDir) -> SessionSettings {
    let source = write_campaign(
        temp_dir.path(),
        "Stone-Heart Hollow",
        &[("adventure.md", TOWN_NOTE), ("wilds.md", WILDS_NOTE)],
    );
    let config = Config::with_base_dir(temp_dir.path());
    SessionSettings::resolve(
        &config,
        SetupRequest {
            source_dir: Some(source),
            ..SetupRequest::default()
        },
    )
}

#[tokio::test]
async fn ask_sends_retrieved_notes_to_the_chat_model() {
    init_test_tracing();
    let temp_dir = TempDir::new().expect("should create temp dir");
    let chat = Arc::new(ScriptedChat::new(&[
        r#"{"answer":"At the Drowned Rat.","references":["adventure-1"]}"#,
    ]));

    let (session, report) =
        Session::setup_with(create_settings(&temp_dir), Arc::new(KeywordEmbedder), Arc::clone(&chat))
            .await
            .expect("should set up session");
    assert_eq!(report.chunks, 3);

    let answer = session
        .ask(QueryRequest::new("Where is the tavern ale?").with_top_k(1))
        .await
        .expect("should answer");

    assert_eq!(answer.answer, "At the Drowned Rat.");
    assert_eq!(answer.references, vec!["adventure-1".to_string()]);

    let conversations = chat.conversations();
    assert_eq!(conversations.len(), 1);
    let prompt = &conversations[0][0].content;
    assert!(prompt.contains("Where is the tavern ale?"));
    assert!(prompt.contains("The Drowned Rat serves warm ale"));
    assert!(!prompt.contains("young dragon"));
}

#[tokio::test]
async fn generate_retries_after_an_invalid_reply() {
    init_test_tracing();
    let temp_dir = TempDir::new().expect("should create temp dir");
    let chat = Arc::new(ScriptedChat::new(&[r#"{"NPCs":"nobody"}"#, NPC_REPLY]));

    let (session, _) =
        Session::setup_with(create_settings(&temp_dir), Arc::new(KeywordEmbedder), Arc::clone(&chat))
            .await
            .expect("should set up session");

    let content = session
        .generate(ContentKind::Npc, QueryRequest::new("an apprentice for the blacksmith"))
        .await
        .expect("should generate");

    let GeneratedContent::Npc(list) = &content else {
        panic!("expected NPC content, got {:?}", content.kind());
    };
    assert_eq!(list.npcs.len(), 1);
    assert_eq!(list.npcs[0].name, "Brannoc");

    let conversations = chat.conversations();
    assert_eq!(conversations.len(), 2);
    let retry = &conversations[1];
    assert_eq!(retry.len(), 3);
    assert_eq!(retry[1].role, ChatRole::Assistant);
    assert_eq!(retry[1].content, r#"{"NPCs":"nobody"}"#);
    assert_eq!(retry[2].role, ChatRole::User);
}

#[tokio::test]
async fn reopened_session_answers_without_rebuilding() {
    init_test_tracing();
    let temp_dir = TempDir::new().expect("should create temp dir");
    let settings = create_settings(&temp_dir);

    Session::setup_with(
        settings.clone(),
        Arc::new(KeywordEmbedder),
        Arc::new(ScriptedChat::new(&[])),
    )
    .await
    .expect("should set up session");

    let session = Session::open_with(
        settings,
        Arc::new(KeywordEmbedder),
        Arc::new(ScriptedChat::new(&[r#"{"answer":"Gold.","references":[]}"#])),
    )
    .await
    .expect("should reopen session");

    assert_eq!(session.count().await.expect("should count"), 3);
    let answer = session
        .ask(QueryRequest::new("What does the dragon sleep on?"))
        .await
        .expect("should answer");
    assert_eq!(answer.answer, "Gold.");
}

#[tokio::test]
async fn opening_before_setup_is_not_initialized() {
    init_test_tracing();
    let temp_dir = TempDir::new().expect("should create temp dir");

    let result = Session::open_with(
        create_settings(&temp_dir),
        Arc::new(KeywordEmbedder),
        Arc::new(ScriptedChat::new(&[])),
    )
    .await;

    assert!(matches!(result, Err(RagError::NotInitialized)));
}

#[tokio::test]
async fn exhausted_retries_surface_schema_validation() {
    init_test_tracing();
    let temp_dir = TempDir::new().expect("should create temp dir");
    let mut settings = create_settings(&temp_dir);
    settings.max_retries = 2;

    let (session, _) = Session::setup_with(
        settings,
        Arc::new(KeywordEmbedder),
        Arc::new(ScriptedChat::new(&["not json", "still not json"])),
    )
    .await
    .expect("should set up session");

    let result = session
        .ask(QueryRequest::new("Who works the steel?"))
        .await;

    let Err(error) = result else {
        panic!("expected schema validation failure");
    };
    assert!(matches!(
        error,
        RagError::SchemaValidation { attempts: 2, .. }
    ));
    assert!(!error.is_client_error());
    assert_eq!(error.status_code(), 500);
}
