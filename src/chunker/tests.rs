use super::*;
use std::fs;
use tempfile::TempDir;

fn write_note(dir: &Path, relative: &str, content: &str) {
    let path = dir.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("should create note directory");
    }
    fs::write(path, content).expect("should write note");
}

#[test]
fn normalize_collapses_separator_runs() {
    assert_eq!(normalize("Lost_Mine of.Phandelver"), "lost-mine-of-phandelver");
    assert_eq!(normalize("a - _ b"), "a-b");
    assert_eq!(normalize("Dragon's Lair"), "dragon's-lair");
}

#[test]
fn normalize_is_idempotent() {
    for name in ["Curse of Strahd", "tomb__of--annihilation", "x.y.z", "plain"] {
        let once = normalize(name);
        assert_eq!(normalize(&once), once);
    }
}

#[test]
fn source_basename_drops_markdown_extension() {
    assert_eq!(source_basename(Path::new("/notes/adventure.md")), "adventure");
    assert_eq!(
        source_basename(Path::new("notes/Session Log_03.md")),
        "session-log-03"
    );
    assert_eq!(source_basename(Path::new("notes/map.v2.md")), "map-v2");
}

#[test]
fn format_chunk_fills_untitled_levels() {
    let headers = HeaderPath {
        header_1: Some("Town".to_string()),
        header_2: Some("Tavern".to_string()),
        ..HeaderPath::default()
    };

    let text = format_chunk(&headers, "town", "  ## Tavern\nThe ale is warm.\n");

    assert_eq!(
        text,
        "Title: Town\nSection: Tavern\nSubsection: Untitled\nSource: town\n\nContent:\n## Tavern\nThe ale is warm."
    );
}

#[test]
fn adventure_file_yields_numbered_chunks() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    write_note(
        temp_dir.path(),
        "adventure.md",
        "# Town\n## Tavern\nThe ale is warm.\n## Blacksmith\nSteel rings all day.",
    );

    let split = split_directory(temp_dir.path()).expect("should split directory");
    let chunks = &split.chunks;

    assert_eq!(split.documents, 1);
    assert_eq!(chunks.len(), 2);
    assert_eq!(chunks[0].id, "adventure-1");
    assert_eq!(chunks[1].id, "adventure-2");
    assert_eq!(chunks[0].metadata.chunk_id, "adventure-1");
    assert_eq!(chunks[0].metadata.source_basename, "adventure");
    assert!(Path::new(&chunks[0].metadata.source).is_absolute());
    assert!(chunks[0].formatted_text.starts_with(
        "Title: Town\nSection: Tavern\nSubsection: Untitled\nSource: adventure\n\nContent:\n"
    ));
    assert!(chunks[1].formatted_text.contains("Section: Blacksmith"));
}

#[test]
fn only_markdown_files_are_loaded_recursively() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    write_note(temp_dir.path(), "b.md", "# B\nSecond.");
    write_note(temp_dir.path(), "nested/a.md", "# A\nFirst.");
    write_note(temp_dir.path(), "readme.txt", "# Ignored\nNot markdown.");
    write_note(temp_dir.path(), "shout.MD", "# Ignored\nWrong case.");

    let documents = load_documents(temp_dir.path()).expect("should load documents");

    assert_eq!(documents.len(), 2);
    assert!(documents[0].path.ends_with("b.md"));
    assert!(documents[1].path.ends_with("nested/a.md"));
}

#[test]
fn splitting_is_deterministic() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    write_note(temp_dir.path(), "keep.md", "# Keep\n## Gate\nIron.\n## Hall\nStone.");
    write_note(temp_dir.path(), "wilds.md", "# Wilds\nTrees.");

    let first = split_directory(temp_dir.path()).expect("should split directory");
    let second = split_directory(temp_dir.path()).expect("should split directory");

    assert_eq!(first, second);
    assert_eq!(first.documents, 2);
    let ids: Vec<&str> = first.chunks.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec!["keep-1", "keep-2", "wilds-1"]);
}

#[test]
fn missing_directory_is_a_chunking_error() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let missing = temp_dir.path().join("nowhere");

    let result = split_directory(&missing);
    assert!(matches!(result, Err(RagError::Chunking(_))));
}

#[test]
fn file_path_is_not_a_directory() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    write_note(temp_dir.path(), "single.md", "# Single");

    let result = split_directory(&temp_dir.path().join("single.md"));
    assert!(matches!(result, Err(RagError::Chunking(_))));
}

#[test]
fn invalid_utf8_fails_the_whole_split() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    write_note(temp_dir.path(), "good.md", "# Good\nFine.");
    fs::write(temp_dir.path().join("bad.md"), [0xff, 0xfe, 0x23, 0x20])
        .expect("should write bytes");

    let result = split_directory(temp_dir.path());
    assert!(matches!(result, Err(RagError::Chunking(_))));
}

#[test]
fn empty_directory_has_no_chunks() {
    let temp_dir = TempDir::new().expect("should create temp dir");

    let split = split_directory(temp_dir.path()).expect("should split directory");
    assert_eq!(split.documents, 0);
    assert!(split.chunks.is_empty());
}
