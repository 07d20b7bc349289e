//! Shared test helpers for integration tests

#![allow(dead_code)]

use assert_cmd::cargo;
use assert_cmd::Command;
use std::path::PathBuf;
use tempfile::TempDir;

/// Helper to get an axis command isolated from the user's environment
pub fn axis() -> Command {
    let mut cmd = Command::new(cargo::cargo_bin!("axis"));
    cmd.env_remove("AXIS_DRAWING")
        .env_remove("RUST_LOG")
        .env("AXIS_CONFIG", "/nonexistent/axis/config.yaml")
        .env("AXIS_USER", "tester");
    cmd
}

/// A drawing in its own temp directory
pub struct TestDrawing {
    pub dir: TempDir,
    pub path: PathBuf,
}

impl TestDrawing {
    /// Command with `--drawing` already set
    pub fn axis(&self) -> Command {
        let mut cmd = axis();
        cmd.arg("-d").arg(&self.path);
        cmd
    }

    pub fn sidecar(&self, suffix: &str) -> PathBuf {
        self.dir.path().join(format!("part.pdf{}", suffix))
    }
}

/// Helper to create a drawing without initialising its store
pub fn empty_drawing() -> TestDrawing {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("part.pdf");
    std::fs::write(&path, b"%PDF-1.4\n").unwrap();
    TestDrawing { dir, path }
}

/// Helper to create a drawing with an initialised store
pub fn setup_drawing() -> TestDrawing {
    let drawing = empty_drawing();
    drawing.axis().arg("init").assert().success();
    drawing
}

/// Helper to add a feature and return its id
pub fn add_feature(drawing: &TestDrawing, method: &str) -> String {
    let output = drawing
        .axis()
        .args([
            "-o", "json", "feat", "add", "--page", "1", "--x", "100", "--y", "200", "--w", "40",
            "--h", "12", "--method", method,
        ])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let feature: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    feature["id"].as_str().unwrap_or_default().to_string()
}

/// Helper to give a feature a tolerance band
pub fn apply_tolerance(drawing: &TestDrawing, id: &str, expr: &str) {
    drawing
        .axis()
        .args(["tol", "apply", id, expr])
        .assert()
        .success();
}
