use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tempfile::TempDir;

fn hls_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("hls");
    path
}

fn setup_test_env(extra: &str) -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let config_content = format!(
        r#"[db]
path = "{}/data/hls.sqlite"

[cache]
ttl_secs = 600

[history]
max_entries = 50
{}
"#,
        root.display(),
        extra
    );

    let config_path = config_dir.join("hls.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_hls(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    run_hls_env(config_path, args, &[])
}

fn run_hls_env(config_path: &Path, args: &[&str], envs: &[(&str, &str)]) -> (String, String, bool) {
    let binary = hls_binary();
    let output = Command::new(&binary)
        .envs(envs.iter().copied())
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run hls binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

/// Serve `app` on a background runtime; the binary under test runs in its
/// own process.
fn spawn_server(app: Router) -> String {
    let (tx, rx) = std::sync::mpsc::channel::<SocketAddr>();
    std::thread::spawn(move || {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async move {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            tx.send(listener.local_addr().unwrap()).unwrap();
            axum::serve(listener, app).await.unwrap();
        });
    });
    format!("http://{}", rx.recv().unwrap())
}

/// Mock legislation API with a search endpoint and a static fallback file.
fn spawn_mock_api() -> String {
    let app = Router::new()
        .route(
            "/search",
            post(|Json(body): Json<Value>| async move {
                let query = body["query"].as_str().unwrap_or_default().to_string();
                Json(json!({"data": {"results": [
                    {"id": "a1", "title": format!("{} kanunu", query), "content": "madde 1"},
                    {"id": "a2", "title": "Yönetmelik", "content": query}
                ]}}))
            }),
        )
        .route(
            "/fallback.json",
            get(|| async { Json(json!([{"id": "f1", "title": "Kira Sözleşmesi", "content": "kiracı"}])) }),
        );
    spawn_server(app)
}

#[test]
fn test_init_creates_database() {
    let (tmp, config_path) = setup_test_env("");

    let (stdout, stderr, success) = run_hls(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
    assert!(tmp.path().join("data/hls.sqlite").exists());
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env("");

    let (_, _, success1) = run_hls(&config_path, &["init"]);
    assert!(success1, "First init failed");

    let (_, _, success2) = run_hls(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_invalid_config_rejected() {
    let tmp = TempDir::new().unwrap();
    let config_path = tmp.path().join("hls.toml");
    fs::write(&config_path, "[db]\npath = \":memory:\"\n\n[cache]\nttl_secs = 0\n").unwrap();

    let (_, stderr, success) = run_hls(&config_path, &["sources"]);
    assert!(!success);
    assert!(stderr.contains("ttl_secs"));
}

#[test]
fn test_search_empty_query() {
    let (_tmp, config_path) = setup_test_env("");

    let (stdout, _, success) = run_hls(&config_path, &["search", "   "]);
    assert!(success);
    assert!(stdout.contains("No results."));

    let (stdout, _, _) = run_hls(&config_path, &["history", "list"]);
    assert!(stdout.contains("No search history."));
}

#[test]
fn test_search_empty_query_json() {
    let (_tmp, config_path) = setup_test_env("");

    let (stdout, stderr, success) = run_hls(&config_path, &["search", "  ", "--json"]);
    assert!(success, "stderr={}", stderr);
    let outcome: Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(outcome["results"].as_array().unwrap().len(), 0);
    assert_eq!(outcome["performance"]["attempts"], 0);
    assert_eq!(outcome["performance"]["cache_hit"], false);

    let (stdout, _, _) = run_hls(&config_path, &["history", "list", "--json"]);
    let entries: Value = serde_json::from_str(&stdout).unwrap();
    assert!(entries.as_array().unwrap().is_empty());
}

#[test]
fn test_search_syncs_every_history_entry_before_exit() {
    let synced = Arc::new(AtomicUsize::new(0));
    let app = Router::new()
        .route(
            "/search",
            post(|Json(body): Json<Value>| async move {
                let query = body["query"].as_str().unwrap_or_default().to_string();
                if query == "bulunamaz" {
                    return Json(json!({"data": {"results": []}}));
                }
                Json(json!({"data": {"results": [{"id": "a1", "title": query, "content": ""}]}}))
            }),
        )
        .route(
            "/rest/v1/user_searches",
            post(|State(synced): State<Arc<AtomicUsize>>| async move {
                tokio::time::sleep(Duration::from_millis(200)).await;
                synced.fetch_add(1, Ordering::SeqCst);
                StatusCode::CREATED
            }),
        )
        .with_state(synced.clone());
    let base = spawn_server(app);

    let (_tmp, config_path) = setup_test_env(&format!(
        "\n[sources.primary]\nurl = \"{base}/search\"\n\n[sync]\nurl = \"{base}\"\nuser_id = \"u-1\"\napi_key_env = \"HLS_TEST_CLI_SYNC_KEY\"\n"
    ));
    let envs = [("HLS_TEST_CLI_SYNC_KEY", "anon-key")];

    for query in ["tazminat", "kira", "icra"] {
        let (stdout, stderr, success) = run_hls_env(&config_path, &["search", query], &envs);
        assert!(success, "search failed: stdout={}, stderr={}", stdout, stderr);
    }
    // A failed resolution is recorded and synced as well.
    let (_, _, success) = run_hls_env(&config_path, &["search", "bulunamaz"], &envs);
    assert!(!success);

    assert_eq!(synced.load(Ordering::SeqCst), 4);
}

#[test]
fn test_search_without_sources_fails_and_is_recorded() {
    let (_tmp, config_path) = setup_test_env("");
    run_hls(&config_path, &["init"]);

    let (_, stderr, success) = run_hls(&config_path, &["search", "tazminat"]);
    assert!(!success);
    assert!(stderr.contains("all data sources failed"), "stderr={}", stderr);

    let (stdout, _, success) = run_hls(&config_path, &["history", "list", "--json"]);
    assert!(success);
    let entries: Value = serde_json::from_str(&stdout).unwrap();
    let entries = entries.as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["query"], "tazminat");
    assert_eq!(entries[0]["data_source"], "error");
    assert_eq!(entries[0]["result_count"], 0);
}

#[test]
fn test_search_primary_then_cache_first() {
    let base = spawn_mock_api();
    let (_tmp, config_path) = setup_test_env(&format!(
        "\n[sources.primary]\nurl = \"{}/search\"\ntimeout_ms = 3000\n",
        base
    ));
    run_hls(&config_path, &["init"]);

    let (stdout, stderr, success) = run_hls(&config_path, &["search", "tazminat"]);
    assert!(success, "search failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("source: primary"));
    assert!(stdout.contains("tazminat kanunu"));

    let (stdout, _, success) =
        run_hls(&config_path, &["search", "tazminat", "--cache-first", "--json"]);
    assert!(success);
    let outcome: Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(outcome["data_source"], "cache");
    assert_eq!(outcome["performance"]["cache_hit"], true);
    assert_eq!(outcome["results"].as_array().unwrap().len(), 2);

    let (stdout, _, _) = run_hls(&config_path, &["cache", "list"]);
    assert!(stdout.contains("tazminat"));

    let (stdout, _, _) = run_hls(&config_path, &["history", "list", "--json"]);
    let entries: Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(entries.as_array().unwrap().len(), 1);
    assert_eq!(entries[0]["data_source"], "cache");
}

#[test]
fn test_search_fallback_when_primary_missing() {
    let base = spawn_mock_api();
    let (_tmp, config_path) = setup_test_env(&format!(
        "\n[sources.fallback]\nurl = \"{}/fallback.json\"\n",
        base
    ));

    let (stdout, stderr, success) = run_hls(&config_path, &["search", "kira", "--limit", "5"]);
    assert!(success, "search failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("source: fallback"));
    assert!(stdout.contains("Kira Sözleşmesi"));

    let (_, _, success) = run_hls(&config_path, &["search", "icra", "--no-fallback"]);
    assert!(!success);
}

#[test]
fn test_history_stats_and_clear() {
    let base = spawn_mock_api();
    let (_tmp, config_path) = setup_test_env(&format!(
        "\n[sources.primary]\nurl = \"{}/search\"\n",
        base
    ));

    run_hls(&config_path, &["search", "tazminat"]);
    run_hls(&config_path, &["search", "kira"]);

    let (stdout, _, success) = run_hls(&config_path, &["history", "stats", "--json"]);
    assert!(success);
    let stats: Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(stats["total"], 2);
    assert_eq!(stats["by_source"]["primary"], 2);
    assert_eq!(stats["by_source"]["fallback"], 0);
    assert_eq!(stats["average_result_count"], 2.0);

    let (stdout, _, success) = run_hls(&config_path, &["history", "clear"]);
    assert!(success);
    assert!(stdout.contains("cleared"));

    let (stdout, _, _) = run_hls(&config_path, &["history", "stats", "--json"]);
    let stats: Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(stats["total"], 0);
}

#[test]
fn test_history_remove() {
    let (_tmp, config_path) = setup_test_env("");
    run_hls(&config_path, &["search", "tazminat"]);

    let (stdout, _, _) = run_hls(&config_path, &["history", "list", "--json"]);
    let entries: Value = serde_json::from_str(&stdout).unwrap();
    let id = entries[0]["id"].as_str().unwrap().to_string();

    let (_, _, success) = run_hls(&config_path, &["history", "remove", "no-such-id"]);
    assert!(!success);

    let (stdout, _, success) = run_hls(&config_path, &["history", "remove", &id]);
    assert!(success);
    assert!(stdout.contains("Removed"));

    let (stdout, _, _) = run_hls(&config_path, &["history", "list"]);
    assert!(stdout.contains("No search history."));
}

#[test]
fn test_cache_clear() {
    let base = spawn_mock_api();
    let (_tmp, config_path) = setup_test_env(&format!(
        "\n[sources.primary]\nurl = \"{}/search\"\n",
        base
    ));
    run_hls(&config_path, &["search", "tazminat"]);
    run_hls(&config_path, &["search", "tazminat", "--limit", "1"]);

    let (stdout, _, _) = run_hls(&config_path, &["cache", "stats"]);
    assert!(stdout.contains("Live entries:   2"));

    let (stdout, _, success) = run_hls(&config_path, &["cache", "clear"]);
    assert!(success);
    assert!(stdout.contains("2 entries removed"));

    let (stdout, _, _) = run_hls(&config_path, &["cache", "list"]);
    assert!(stdout.contains("Cache is empty."));
}

#[test]
fn test_sources_and_dataset_status() {
    let (_tmp, config_path) = setup_test_env("");

    let (stdout, _, success) = run_hls(&config_path, &["sources"]);
    assert!(success);
    assert!(stdout.contains("primary"));
    assert!(stdout.contains("NOT CONFIGURED"));

    let (stdout, _, success) = run_hls(&config_path, &["dataset", "status"]);
    assert!(success);
    assert!(stdout.contains("loading"));
    assert!(stdout.contains("never"));
}

#[test]
fn test_dataset_refresh_enables_secondary() {
    let base = spawn_mock_api();
    let (_tmp, config_path) = setup_test_env(&format!(
        "\n[[sources.community.datasets]]\nname = \"mevzuat\"\nurl = \"{}/fallback.json\"\n",
        base
    ));

    let (stdout, stderr, success) = run_hls(&config_path, &["dataset", "refresh"]);
    assert!(success, "refresh failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("status: active"));

    let (stdout, _, success) = run_hls(&config_path, &["search", "kiracı"]);
    assert!(success);
    assert!(stdout.contains("source: secondary"));
}
