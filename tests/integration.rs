use axum::{extract::Path as UrlPath, http::StatusCode, routing::get, Json, Router};
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

use sefaria_rag::builder::ChatbotBuilder;
use sefaria_rag::catalog::SefariaClient;
use sefaria_rag::collector::{DataCollector, FetchPolicy};
use sefaria_rag::config::{CatalogConfig, Config};
use sefaria_rag::error::CollectError;
use sefaria_rag::models::Corpus;
use sefaria_rag::preprocess::TextPreprocessor;
use sefaria_rag::server;

fn sefaria_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("sefaria-rag");
    path
}

// ============ Mock catalog ============

async fn handle_index() -> Json<Value> {
    Json(json!([
        {"title": "Genesis"},
        {"category": "Writings", "contents": [
            {"title": "Psalms"},
            {"title": "Genesis"}
        ]},
        {"title": "Exodus"},
        {"title": "Missing"},
        {"title": "Hebrew Only"},
        {"title": "Unknown Book"}
    ]))
}

async fn handle_text(UrlPath(title): UrlPath<String>) -> Result<Json<Value>, StatusCode> {
    match title.as_str() {
        "Genesis" => Ok(Json(json!({
            "text": [
                "In the beginning God created the heaven and the earth.",
                "And the earth was without form, and void."
            ]
        }))),
        "Psalms" => Ok(Json(json!({
            "text": [["The Lord is my shepherd;", "I shall not want."], []]
        }))),
        "Exodus" => Ok(Json(json!({
            "text": "Now these are the names of the children of Israel"
        }))),
        "Hebrew Only" => Ok(Json(json!({"text": "בְּרֵאשִׁית"}))),
        "Unknown Book" => Ok(Json(json!({"error": "Unknown book"}))),
        _ => Err(StatusCode::NOT_FOUND),
    }
}

/// Serve the mock catalog on an ephemeral port from a background thread.
/// Returns the API base URL.
fn spawn_catalog() -> String {
    let (tx, rx) = std::sync::mpsc::channel();
    std::thread::spawn(move || {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async move {
            let app = Router::new()
                .route("/api/index", get(handle_index))
                .route("/api/texts/{title}", get(handle_text));
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            tx.send(listener.local_addr().unwrap()).unwrap();
            axum::serve(listener, app).await.unwrap();
        });
    });
    let addr = rx.recv().unwrap();
    format!("http://{}/api", addr)
}

fn catalog_config(base_url: &str) -> CatalogConfig {
    CatalogConfig {
        base_url: base_url.to_string(),
        max_retries: 0,
        timeout_secs: 5,
        ..CatalogConfig::default()
    }
}

fn write_config(root: &Path, base_url: &str, extra: &str) -> PathBuf {
    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();
    let content = format!(
        r#"[catalog]
base_url = "{}"
max_retries = 0
timeout_secs = 5

[retrieval]
final_limit = 3
{}"#,
        base_url, extra
    );
    let path = config_dir.join("sefaria-rag.toml");
    fs::write(&path, content).unwrap();
    path
}

fn run_cli(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = sefaria_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .arg("--progress")
        .arg("off")
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run sefaria-rag binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

// ============ Collector against HTTP ============

#[tokio::test]
async fn test_collect_over_http_skips_failures() {
    let base = spawn_catalog();
    let client = SefariaClient::new(&catalog_config(&base)).unwrap();
    let corpus = DataCollector::new(client).collect_all().await.unwrap();

    let titles: Vec<&str> = corpus.titles().collect();
    assert_eq!(titles, vec!["Exodus", "Genesis", "Hebrew Only", "Psalms"]);
    assert_eq!(
        corpus.get("Genesis"),
        Some(
            "In the beginning God created the heaven and the earth.\n\n\
             And the earth was without form, and void."
        )
    );
    assert_eq!(
        corpus.get("Psalms"),
        Some("The Lord is my shepherd;\n\nI shall not want.")
    );
    assert!(corpus.get("Missing").is_none());
    assert!(corpus.get("Unknown Book").is_none());
}

#[tokio::test]
async fn test_collect_over_http_abort_policy() {
    let base = spawn_catalog();
    let client = SefariaClient::new(&catalog_config(&base)).unwrap();
    let err = DataCollector::new(client)
        .with_policy(FetchPolicy::Abort)
        .collect_all()
        .await
        .unwrap_err();

    match err {
        CollectError::Aborted { title, source } => {
            assert_eq!(title, "Missing");
            assert!(matches!(*source, CollectError::Status { status: 404, .. }));
        }
        other => panic!("expected Aborted, got {:?}", other),
    }
}

#[tokio::test]
async fn test_catalog_unreachable_is_error() {
    // Nothing listens on the discard port.
    let client = SefariaClient::new(&catalog_config("http://127.0.0.1:9/api")).unwrap();
    let err = DataCollector::new(client).collect_all().await.unwrap_err();
    assert!(matches!(err, CollectError::Http { .. }));
}

#[tokio::test]
async fn test_cleaned_corpus_is_ascii_alphanumeric() {
    let base = spawn_catalog();
    let client = SefariaClient::new(&catalog_config(&base)).unwrap();
    let corpus = DataCollector::new(client).collect_all().await.unwrap();
    let cleaned = TextPreprocessor::new().clean_corpus(&corpus);

    assert_eq!(cleaned.len(), corpus.len());
    assert_eq!(cleaned.get("Hebrew Only"), Some(""));
    for (_, text) in cleaned.iter() {
        assert!(text
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c.is_whitespace()));
    }
}

// ============ HTTP server ============

#[tokio::test]
async fn test_server_endpoints() {
    let base = spawn_catalog();
    let client = SefariaClient::new(&catalog_config(&base)).unwrap();
    let corpus = DataCollector::new(client).collect_all().await.unwrap();
    let cleaned = TextPreprocessor::new().clean_corpus(&corpus);
    let chatbot = ChatbotBuilder::new(&Config::minimal())
        .build(&cleaned)
        .await
        .unwrap();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = server::router(std::sync::Arc::new(chatbot));
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    let http = reqwest::Client::new();
    let url = |path: &str| format!("http://{}{}", addr, path);

    let health: Value = http.get(url("/health")).send().await.unwrap().json().await.unwrap();
    assert_eq!(health["status"], "ok");
    assert_eq!(health["passages"], 3);

    let search: Value = http
        .post(url("/search"))
        .json(&json!({"query": "names of the children", "limit": 1}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let results = search["results"].as_array().unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["title"], "Exodus");

    let ask: Value = http
        .post(url("/ask"))
        .json(&json!({"question": "who is my shepherd"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(ask["answer"].as_str().unwrap().starts_with("[Psalms]"));
    assert_eq!(ask["passages"][0]["title"], "Psalms");

    let resp = http
        .post(url("/ask"))
        .json(&json!({"question": "  "}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "bad_request");

    let resp = http
        .post(url("/search"))
        .json(&json!({"query": "beginning", "mode": "semantic"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 400);
}

#[tokio::test]
async fn test_server_malformed_bodies_use_error_shape() {
    let chatbot = ChatbotBuilder::new(&Config::minimal())
        .build(&Corpus::new())
        .await
        .unwrap();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = server::router(std::sync::Arc::new(chatbot));
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    let http = reqwest::Client::new();
    let url = |path: &str| format!("http://{}{}", addr, path);

    let cases = [
        ("/search", "{}"),
        ("/search", r#"{"query": "beginning", "mode": "fuzzy"}"#),
        ("/search", "not json"),
        ("/ask", r#"{"limit": 2}"#),
        ("/ask", r#"{"question": "who", "mode": 7}"#),
    ];
    for (path, body) in cases {
        let resp = http
            .post(url(path))
            .header("content-type", "application/json")
            .body(body)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 400, "{} {}", path, body);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["error"]["code"], "bad_request");
        assert!(!body["error"]["message"].as_str().unwrap().is_empty());
    }

    let resp = http.post(url("/search")).body("{}").send().await.unwrap();
    assert_eq!(resp.status().as_u16(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "bad_request");
}

// ============ CLI ============

#[test]
fn test_cli_collect_writes_corpus() {
    let base = spawn_catalog();
    let tmp = TempDir::new().unwrap();
    let config = write_config(tmp.path(), &base, "");
    let output = tmp.path().join("out/corpus.json");

    let (stdout, stderr, success) =
        run_cli(&config, &["collect", "--output", output.to_str().unwrap()]);
    assert!(success, "collect failed: {}", stderr);
    assert!(stdout.contains("texts collected: 4"));

    let corpus: Value = serde_json::from_str(&fs::read_to_string(&output).unwrap()).unwrap();
    assert!(corpus.get("Exodus").is_some());
    assert!(corpus.get("Missing").is_none());
}

#[test]
fn test_cli_build_prints_success_and_saves_snapshot() {
    let base = spawn_catalog();
    let tmp = TempDir::new().unwrap();
    let config = write_config(tmp.path(), &base, "");
    let index = tmp.path().join("index.json");

    let (stdout, stderr, success) =
        run_cli(&config, &["build", "--output", index.to_str().unwrap()]);
    assert!(success, "build failed: {}", stderr);
    assert!(stdout.contains("Chatbot built successfully with RAG model!"));
    assert!(stdout.contains("embedding model: disabled"));
    assert!(index.exists());

    let (stdout, stderr, success) = run_cli(
        &config,
        &["ask", "who is my shepherd", "--index", index.to_str().unwrap()],
    );
    assert!(success, "ask failed: {}", stderr);
    assert!(stdout.contains("[Psalms]"));
    assert!(stdout.contains("Sources:"));
}

#[test]
fn test_cli_build_limit() {
    let base = spawn_catalog();
    let tmp = TempDir::new().unwrap();
    let config = write_config(tmp.path(), &base, "");

    let (stdout, stderr, success) = run_cli(&config, &["build", "--limit", "1"]);
    assert!(success, "build failed: {}", stderr);
    assert!(stdout.contains("documents: 1"));
}

#[test]
fn test_cli_build_empty_catalog_succeeds() {
    let base = spawn_catalog();
    let tmp = TempDir::new().unwrap();
    let config = write_config(tmp.path(), &base, "");

    let (stdout, stderr, success) = run_cli(&config, &["build", "--limit", "0"]);
    assert!(success, "build failed: {}", stderr);
    assert!(stdout.contains("passages: 0"));
    assert!(stdout.contains("Chatbot built successfully with RAG model!"));
}

#[test]
fn test_cli_build_fails_on_abort() {
    let base = spawn_catalog();
    let tmp = TempDir::new().unwrap();
    let config = write_config(tmp.path(), &base, "");
    let content = fs::read_to_string(&config)
        .unwrap()
        .replace("max_retries = 0", "max_retries = 0\nfetch_policy = \"abort\"");
    fs::write(&config, content).unwrap();

    let (stdout, stderr, success) = run_cli(&config, &["build"]);
    assert!(!success);
    assert!(stderr.contains("Missing"));
    assert!(!stdout.contains("Chatbot built successfully"));
}

#[test]
fn test_cli_search_semantic_errors_when_disabled() {
    let base = spawn_catalog();
    let tmp = TempDir::new().unwrap();
    let config = write_config(tmp.path(), &base, "");

    let (_, stderr, success) = run_cli(&config, &["search", "beginning", "--mode", "semantic"]);
    assert!(!success);
    assert!(stderr.contains("embedding provider"));
}

#[test]
fn test_cli_search_keyword() {
    let base = spawn_catalog();
    let tmp = TempDir::new().unwrap();
    let config = write_config(tmp.path(), &base, "");

    let (stdout, stderr, success) = run_cli(&config, &["search", "names of the children"]);
    assert!(success, "search failed: {}", stderr);
    assert!(stdout.starts_with("1. ["));
    assert!(stdout.contains("Exodus"));
}

#[test]
fn test_cli_rejects_invalid_config() {
    let base = spawn_catalog();
    let tmp = TempDir::new().unwrap();
    let config = write_config(tmp.path(), &base, "hybrid_alpha = 2.0\n");

    let (_, stderr, success) = run_cli(&config, &["collect"]);
    assert!(!success);
    assert!(stderr.contains("hybrid_alpha"));
}
