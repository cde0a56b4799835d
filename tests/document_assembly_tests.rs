//! Integration tests for joining persisted records into search documents

use serde_json::{json, Value};
use std::path::Path;
use tempfile::TempDir;

use video_search_prep::config::DocumentSettings;
use video_search_prep::{DocumentAssembler, PipelineError};

fn settings(root: &Path) -> DocumentSettings {
    DocumentSettings {
        embeddings_dir: root.join("bedrock_marengo_embeddings"),
        analyses_dir: root.join("bedrock_pegasus_analyses"),
        documents_dir: root.join("documents"),
    }
}

fn write(path: &Path, value: &Value) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, serde_json::to_string_pretty(value).unwrap()).unwrap();
}

fn embeddings_record(name: &str) -> Value {
    json!({
        "videoName": name,
        "s3URI": format!("s3://marengo-bucket/commercials/{}", name),
        "keyframeURL": "https://d123.cloudfront.net/ad1.jpg",
        "dateCreated": "2025-07-23T10:00:00 UTC",
        "sizeBytes": 5242880,
        "durationSec": 7.0,
        "contentType": "video/mp4",
        "embeddings": [
            {
                "embedding": [0.1, 0.2],
                "embeddingOption": "visual-text",
                "startSec": 0.0,
                "endSec": 3.5
            },
            {"embedding": [0.3, 0.4], "embeddingOption": "audio", "startSec": 3.5, "endSec": 7.0}
        ]
    })
}

fn analysis_record(name: &str) -> Value {
    json!({
        "videoName": name,
        "s3URI": format!("s3://pegasus-bucket/commercials/{}", name),
        "title": "Fast Cars on Sunday",
        "summary": "A commercial for a sports car.",
        "keywords": ["sports", "car"],
        "dateCreated": "2025-07-23T11:00:00 UTC"
    })
}

fn seed_pair(settings: &DocumentSettings, stem: &str) {
    let name = format!("{}.mp4", stem);
    let file = format!("{}.json", stem);
    write(&settings.embeddings_dir.join(&file), &embeddings_record(&name));
    write(&settings.analyses_dir.join(&file), &analysis_record(&name));
}

#[tokio::test]
async fn test_merge_field_precedence() {
    let dir = TempDir::new().unwrap();
    let settings = settings(dir.path());
    seed_pair(&settings, "ad1");

    let summary = DocumentAssembler::new(settings.clone()).run().await.unwrap();
    assert_eq!(summary.written, 1);

    let bytes = std::fs::read(settings.documents_dir.join("ad1.json")).unwrap();
    let doc: Value = serde_json::from_slice(&bytes).unwrap();

    // Analysis wins for identity and text.
    assert_eq!(doc["videoName"], "ad1.mp4");
    assert_eq!(doc["s3URI"], "s3://pegasus-bucket/commercials/ad1.mp4");
    assert_eq!(doc["title"], "Fast Cars on Sunday");
    assert_eq!(doc["keywords"], json!(["sports", "car"]));

    // Embeddings win for storage and vectors.
    assert_eq!(doc["keyframeURL"], "https://d123.cloudfront.net/ad1.jpg");
    assert_eq!(doc["sizeBytes"], 5242880);
    assert_eq!(doc["contentType"], "video/mp4");
    assert_eq!(doc["durationSec"], 7.0);
    assert_eq!(doc["embeddings"].as_array().unwrap().len(), 2);

    // Assembly time, not either input's.
    assert_ne!(doc["dateCreated"], "2025-07-23T10:00:00 UTC");
    assert_ne!(doc["dateCreated"], "2025-07-23T11:00:00 UTC");
}

#[tokio::test]
async fn test_assembling_twice_differs_only_in_timestamp() {
    let dir = TempDir::new().unwrap();
    let settings = settings(dir.path());
    seed_pair(&settings, "ad1");
    let assembler = DocumentAssembler::new(settings);

    let mut first = assembler.assemble("ad1.json").await.unwrap();
    let mut second = assembler.assemble("ad1.json").await.unwrap();

    first.date_created.clear();
    second.date_created.clear();
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_missing_embeddings_is_not_found_and_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let settings = settings(dir.path());
    write(&settings.analyses_dir.join("x.json"), &analysis_record("x.mp4"));
    std::fs::create_dir_all(&settings.embeddings_dir).unwrap();

    let err = DocumentAssembler::new(settings.clone()).run().await.unwrap_err();

    match err {
        PipelineError::NotFound(path) => {
            assert!(path.ends_with("bedrock_marengo_embeddings/x.json"))
        }
        other => panic!("unexpected {:?}", other),
    }
    let written = std::fs::read_dir(&settings.documents_dir)
        .map(|entries| entries.count())
        .unwrap_or(0);
    assert_eq!(written, 0);
}

#[tokio::test]
async fn test_identity_mismatch_rejected() {
    let dir = TempDir::new().unwrap();
    let settings = settings(dir.path());
    write(&settings.embeddings_dir.join("ad1.json"), &embeddings_record("ad1.mp4"));
    write(&settings.analyses_dir.join("ad1.json"), &analysis_record("other.mp4"));

    let err = DocumentAssembler::new(settings.clone()).run().await.unwrap_err();
    assert!(matches!(err, PipelineError::ValidationError(_)));
    assert!(!settings.documents_dir.join("ad1.json").exists());
}

#[tokio::test]
async fn test_non_json_files_skipped() {
    let dir = TempDir::new().unwrap();
    let settings = settings(dir.path());
    seed_pair(&settings, "ad1");
    seed_pair(&settings, "ad2");
    std::fs::write(settings.analyses_dir.join(".DS_Store"), "junk").unwrap();

    let summary = DocumentAssembler::new(settings.clone()).run().await.unwrap();
    assert_eq!(summary.written, 2);
    assert!(settings.documents_dir.join("ad2.json").exists());
}

#[tokio::test]
async fn test_invalid_segment_rejected_on_load() {
    let dir = TempDir::new().unwrap();
    let settings = settings(dir.path());
    let mut embeddings = embeddings_record("ad1.mp4");
    embeddings["embeddings"][0]["startSec"] = json!(9.0);
    write(&settings.embeddings_dir.join("ad1.json"), &embeddings);
    write(&settings.analyses_dir.join("ad1.json"), &analysis_record("ad1.mp4"));

    let err = DocumentAssembler::new(settings).run().await.unwrap_err();
    assert!(matches!(err, PipelineError::ValidationError(_)));
}

#[tokio::test]
async fn test_cancelled_assembly_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let settings = settings(dir.path());
    seed_pair(&settings, "ad1");
    let (tx, rx) = tokio::sync::watch::channel(false);
    tx.send(true).unwrap();

    let err = DocumentAssembler::new(settings.clone())
        .with_cancel(rx)
        .run()
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Cancelled(_)));
    assert!(!settings.documents_dir.join("ad1.json").exists());
}
