use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn docqa_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("docqa");
    path
}

/// Minimal single-page PDF showing `phrase` in Helvetica.
fn minimal_pdf_with_phrase(phrase: &str) -> Vec<u8> {
    let stream = format!("BT /F1 12 Tf 100 700 Td ({}) Tj ET", phrase);
    let mut out = Vec::new();
    out.extend_from_slice(b"%PDF-1.4\n");
    let o1 = out.len();
    out.extend_from_slice(b"1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj\n");
    let o2 = out.len();
    out.extend_from_slice(b"2 0 obj << /Type /Pages /Kids [3 0 R] /Count 1 >> endobj\n");
    let o3 = out.len();
    out.extend_from_slice(b"3 0 obj << /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R /Resources << /Font << /F1 5 0 R >> >> >> endobj\n");
    let o4 = out.len();
    out.extend_from_slice(
        format!(
            "4 0 obj << /Length {} >> stream\n{}\nendstream endobj\n",
            stream.len(),
            stream
        )
        .as_bytes(),
    );
    let o5 = out.len();
    out.extend_from_slice(
        b"5 0 obj << /Type /Font /Subtype /Type1 /BaseFont /Helvetica >> endobj\n",
    );
    let xref_start = out.len();
    out.extend_from_slice(b"xref\n0 6\n");
    out.extend_from_slice(format!("{:010} 65535 f \n", 0).as_bytes());
    for offset in [o1, o2, o3, o4, o5] {
        out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    out.extend_from_slice(b"trailer << /Size 6 /Root 1 0 R >>\nstartxref\n");
    out.extend_from_slice(format!("{}\n", xref_start).as_bytes());
    out.extend_from_slice(b"%%EOF\n");
    out
}

fn setup(config_content: &str) -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let config_path = tmp.path().join("docqa.toml");
    fs::write(&config_path, config_content).unwrap();

    let files_dir = tmp.path().join("files");
    fs::create_dir_all(&files_dir).unwrap();
    fs::write(
        files_dir.join("contract.pdf"),
        minimal_pdf_with_phrase("spec test phrase"),
    )
    .unwrap();

    (tmp, config_path)
}

fn run_docqa(config_path: &Path, env: &[(&str, &str)], args: &[&str]) -> (String, String, bool) {
    let binary = docqa_binary();
    let mut command = Command::new(&binary);
    command
        .arg("--config")
        .arg(config_path)
        .args(args)
        .env_remove("GOOGLE_API_KEY")
        .env_remove("OPENAI_API_KEY")
        .env_remove("AZURE_DOC_INTELLI_ENDPOINT")
        .env_remove("AZURE_KEY")
        .env("RUST_LOG", "warn");
    for (key, value) in env {
        command.env(key, value);
    }
    let output = command
        .output()
        .unwrap_or_else(|e| panic!("Failed to run docqa binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

const GOOGLE: &[(&str, &str)] = &[("GOOGLE_API_KEY", "test")];

#[test]
fn extract_prints_pdf_text() {
    let (tmp, config_path) = setup("");
    let pdf = tmp.path().join("files/contract.pdf");

    let (stdout, stderr, success) =
        run_docqa(&config_path, GOOGLE, &["extract", pdf.to_str().unwrap()]);
    assert!(success, "extract failed: {}", stderr);
    assert!(stdout.contains("==> contract.pdf <=="), "stdout: {}", stdout);
    assert!(stdout.contains("spec test phrase"), "stdout: {}", stdout);
}

#[test]
fn extract_walks_directories_and_writes_files() {
    let (tmp, config_path) = setup("");
    let files = tmp.path().join("files");
    let out = tmp.path().join("out");

    let (_, stderr, success) = run_docqa(
        &config_path,
        GOOGLE,
        &[
            "extract",
            files.to_str().unwrap(),
            "--out",
            out.to_str().unwrap(),
        ],
    );
    assert!(success, "extract failed: {}", stderr);
    let text = fs::read_to_string(out.join("contract.pdf.txt")).unwrap();
    assert!(text.contains("spec test phrase"));
}

#[test]
fn bad_document_is_reported_and_others_continue() {
    let (tmp, config_path) = setup("");
    let files = tmp.path().join("files");
    fs::write(files.join("broken.pdf"), b"not a valid pdf").unwrap();

    let (stdout, stderr, success) =
        run_docqa(&config_path, GOOGLE, &["extract", files.to_str().unwrap()]);
    assert!(!success, "a failed document must fail the run");
    assert!(stdout.contains("spec test phrase"), "stdout: {}", stdout);
    assert!(stderr.contains("broken.pdf"), "stderr: {}", stderr);
    assert!(stderr.contains("1 of 2 documents failed"), "stderr: {}", stderr);
}

#[test]
fn missing_credentials_fail_at_startup() {
    let (tmp, config_path) = setup("");
    let pdf = tmp.path().join("files/contract.pdf");

    let (stdout, stderr, success) =
        run_docqa(&config_path, &[], &["extract", pdf.to_str().unwrap()]);
    assert!(!success);
    assert!(stdout.is_empty(), "no work before failing: {}", stdout);
    assert!(stderr.contains("GOOGLE_API_KEY"), "stderr: {}", stderr);
}

#[test]
fn layout_strategy_requires_azure_credentials() {
    let (tmp, config_path) = setup("[extraction]\nstrategy = \"layout\"\n");
    let pdf = tmp.path().join("files/contract.pdf");

    let (_, stderr, success) = run_docqa(&config_path, GOOGLE, &["extract", pdf.to_str().unwrap()]);
    assert!(!success);
    assert!(stderr.contains("AZURE_DOC_INTELLI_ENDPOINT"), "stderr: {}", stderr);
    assert!(stderr.contains("AZURE_KEY"), "stderr: {}", stderr);
}

#[test]
fn invalid_config_is_rejected() {
    let (tmp, config_path) = setup("[chunking]\nmax_chars = 10\noverlap_chars = 10\n");
    let pdf = tmp.path().join("files/contract.pdf");

    let (_, stderr, success) = run_docqa(&config_path, GOOGLE, &["extract", pdf.to_str().unwrap()]);
    assert!(!success);
    assert!(stderr.contains("configuration"), "stderr: {}", stderr);
}

#[test]
fn sla_with_unreachable_provider_writes_nothing() {
    let (tmp, config_path) = setup(
        r#"[embedding]
provider = "ollama"
url = "http://127.0.0.1:9"
timeout_secs = 1

[generation]
provider = "ollama"
url = "http://127.0.0.1:9"
timeout_secs = 1
"#,
    );
    let pdf = tmp.path().join("files/contract.pdf");
    let out = tmp.path().join("out");

    let (_, stderr, success) = run_docqa(
        &config_path,
        &[],
        &["sla", pdf.to_str().unwrap(), "--out", out.to_str().unwrap()],
    );
    assert!(!success);
    assert!(stderr.contains("contract.pdf"), "stderr: {}", stderr);
    assert!(!out.join("contract.pdf_sla_info.json").exists());
}
