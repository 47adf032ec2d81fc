mod common;

use std::fs;
use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::{http::StatusCode, response::IntoResponse, routing::post, Json, Router};
use serde_json::{json, Value};
use tempfile::TempDir;

use common::minimal_pdf;

fn run_docchat(args: &[&str]) -> (String, String, bool) {
    let output = Command::new(env!("CARGO_BIN_EXE_docchat"))
        .args(args)
        .output()
        .expect("failed to run docchat binary");
    (
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
        output.status.success(),
    )
}

/// Run `docchat` with `input` on stdin.
fn run_docchat_with_stdin(args: &[&str], input: &str) -> (String, String, bool) {
    let mut child = Command::new(env!("CARGO_BIN_EXE_docchat"))
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to run docchat binary");
    child
        .stdin
        .take()
        .unwrap()
        .write_all(input.as_bytes())
        .unwrap();
    let output = child.wait_with_output().unwrap();
    (
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
        output.status.success(),
    )
}

/// Ollama stand-in serving `/api/embed` and `/api/chat`. The first chat
/// call fails with 503; later calls answer. Returns the base URL, the
/// chat call counter, and the runtime that keeps the server alive.
fn start_ollama_stub() -> (String, Arc<AtomicUsize>, tokio::runtime::Runtime) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let chat_calls = Arc::new(AtomicUsize::new(0));
    let calls = chat_calls.clone();

    let app = Router::new()
        .route(
            "/api/embed",
            post(|Json(body): Json<Value>| async move {
                let embeddings: Vec<Vec<f32>> = body["input"]
                    .as_array()
                    .unwrap()
                    .iter()
                    .map(|t| {
                        let t = t.as_str().unwrap();
                        let count = |c: char| t.matches(c).count() as f32;
                        vec![count('a') + 1.0, count('e'), count('o')]
                    })
                    .collect();
                Json(json!({ "embeddings": embeddings }))
            }),
        )
        .route(
            "/api/chat",
            post(move || {
                let calls = calls.clone();
                async move {
                    if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                        return (StatusCode::SERVICE_UNAVAILABLE, "warming up").into_response();
                    }
                    Json(json!({ "message": { "role": "assistant", "content": "Stub answer." } }))
                        .into_response()
                }
            }),
        );

    let listener = rt
        .block_on(tokio::net::TcpListener::bind("127.0.0.1:0"))
        .unwrap();
    let addr = listener.local_addr().unwrap();
    rt.spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}", addr), chat_calls, rt)
}

fn ollama_config(dir: &Path, url: &str) -> String {
    write_config(
        dir,
        &format!(
            "[embedding]\nprovider = \"ollama\"\nmodel = \"stub-embed\"\ndims = 3\nurl = \"{url}\"\n\n\
             [llm]\nprovider = \"ollama\"\nmodel = \"stub-chat\"\nbase_url = \"{url}\"\n"
        ),
    )
}

fn write_config(dir: &Path, body: &str) -> String {
    let path = dir.join("docchat.toml");
    fs::write(&path, body).unwrap();
    path.to_str().unwrap().to_string()
}

#[test]
fn test_inspect_reports_chunks() {
    let tmp = TempDir::new().unwrap();
    let pdf = tmp.path().join("sample.pdf");
    fs::write(&pdf, minimal_pdf("inspect this sample document please")).unwrap();
    let config = write_config(tmp.path(), "[chunking]\nsize = 10\noverlap = 2\n");

    let (stdout, stderr, ok) = run_docchat(&[
        "--config",
        &config,
        "inspect",
        "--pdf",
        pdf.to_str().unwrap(),
    ]);
    assert!(ok, "inspect failed: {}", stderr);
    assert!(stdout.contains("sample.pdf:"), "stdout: {}", stdout);
    assert!(stdout.contains("total chunks:"), "stdout: {}", stdout);
    assert!(!stdout.contains("total chunks: 0"), "stdout: {}", stdout);
}

#[test]
fn test_inspect_skips_non_pdf() {
    let tmp = TempDir::new().unwrap();
    let good = tmp.path().join("good.pdf");
    let bad = tmp.path().join("bad.pdf");
    fs::write(&good, minimal_pdf("short text")).unwrap();
    fs::write(&bad, b"this is not a pdf").unwrap();

    let (stdout, stderr, ok) = run_docchat(&[
        "inspect",
        "--pdf",
        good.to_str().unwrap(),
        "--pdf",
        bad.to_str().unwrap(),
    ]);
    assert!(ok, "inspect failed: {}", stderr);
    assert!(stdout.contains("good.pdf:"), "stdout: {}", stdout);
    assert!(stdout.contains("skipped"), "stdout: {}", stdout);
    assert!(stdout.contains("bad.pdf"), "stdout: {}", stdout);
}

#[test]
fn test_invalid_config_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let pdf = tmp.path().join("sample.pdf");
    fs::write(&pdf, minimal_pdf("anything")).unwrap();
    let config = write_config(tmp.path(), "[chunking]\nsize = 100\noverlap = 100\n");

    let (_, stderr, ok) = run_docchat(&[
        "--config",
        &config,
        "inspect",
        "--pdf",
        pdf.to_str().unwrap(),
    ]);
    assert!(!ok);
    assert!(stderr.contains("overlap"), "stderr: {}", stderr);
}

#[test]
fn test_pdf_flag_required() {
    let (_, _, ok) = run_docchat(&["inspect"]);
    assert!(!ok);
}

#[test]
fn test_ask_with_unreachable_embedder_fails() {
    let tmp = TempDir::new().unwrap();
    let pdf = tmp.path().join("sample.pdf");
    fs::write(&pdf, minimal_pdf("some text to embed")).unwrap();
    // Nothing listens on the discard port.
    let config = ollama_config(tmp.path(), "http://127.0.0.1:9");

    let (_, stderr, ok) = run_docchat(&[
        "--config",
        &config,
        "ask",
        "--pdf",
        pdf.to_str().unwrap(),
        "what is this?",
    ]);
    assert!(!ok);
    assert!(stderr.contains("embedding service error"), "stderr: {}", stderr);
}

#[test]
fn test_chat_recovers_from_failed_answer_and_stops_at_exit() {
    let (url, chat_calls, _rt) = start_ollama_stub();
    let tmp = TempDir::new().unwrap();
    let pdf = tmp.path().join("notes.pdf");
    fs::write(&pdf, minimal_pdf("bananas and oranges are on the table")).unwrap();
    let config = ollama_config(tmp.path(), &url);

    let (stdout, stderr, ok) = run_docchat_with_stdin(
        &["--config", &config, "chat", "--pdf", pdf.to_str().unwrap()],
        "what fruit?\nwhat fruit again?\nexit\nnever asked\n",
    );
    assert!(ok, "chat failed: {}", stderr);
    assert!(stdout.contains("indexed 1 document(s)"), "stdout: {}", stdout);
    assert!(stdout.contains("(try again)"), "stdout: {}", stdout);
    assert!(stdout.contains("Stub answer."), "stdout: {}", stdout);
    assert!(stdout.contains("notes.pdf #0"), "stdout: {}", stdout);
    assert_eq!(chat_calls.load(Ordering::SeqCst), 2);
}
