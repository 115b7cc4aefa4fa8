//! Secondary runtime export
//!
//! Runs an external converter over a published model blob. The converter
//! is a boundary call: only success or failure matters, and failure never
//! touches the already published version.

use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::config::ExportConfig;
use crate::error::{Result, RetrainError};
use crate::types::ExportReport;

/// Maximum converter stderr kept in an error message
const MAX_STDERR: usize = 2000;

const MODEL_PLACEHOLDER: &str = "{model}";
const OUT_DIR_PLACEHOLDER: &str = "{out_dir}";

/// Invokes the configured converter on a published model blob
pub struct Exporter {
    config: ExportConfig,
}

impl Exporter {
    pub fn new(config: ExportConfig) -> Self {
        Self { config }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Convert `model_path` into `out_dir`, listing the produced files
    ///
    /// On failure `out_dir` is removed again, so a published version never
    /// keeps a partial export.
    pub async fn export(&self, model_path: &Path, out_dir: &Path) -> Result<Vec<String>> {
        let result = self.convert(model_path, out_dir).await;
        if result.is_err() && out_dir.exists() {
            if let Err(e) = std::fs::remove_dir_all(out_dir) {
                warn!(output = %out_dir.display(), error = %e, "Failed to remove partial export");
            }
        }
        result
    }

    /// Converter arguments with `{model}` and `{out_dir}` filled in
    fn command_args(&self, model_path: &Path, out_dir: &Path) -> Vec<String> {
        let model = model_path.display().to_string();
        let out = out_dir.display().to_string();
        let templated = self
            .config
            .args
            .iter()
            .any(|a| a.contains(MODEL_PLACEHOLDER) || a.contains(OUT_DIR_PLACEHOLDER));

        let mut args: Vec<String> = self
            .config
            .args
            .iter()
            .map(|a| a.replace(MODEL_PLACEHOLDER, &model).replace(OUT_DIR_PLACEHOLDER, &out))
            .collect();
        if !templated {
            args.push(model);
            args.push(out);
        }
        args
    }

    async fn convert(&self, model_path: &Path, out_dir: &Path) -> Result<Vec<String>> {
        if self.config.program.trim().is_empty() {
            return Err(RetrainError::ExportFailure("no export program configured".to_string()));
        }

        info!(
            program = %self.config.program,
            output = %out_dir.display(),
            "Converting model to secondary format"
        );

        std::fs::create_dir_all(out_dir)
            .map_err(|e| RetrainError::ExportFailure(format!("cannot create {}: {}", out_dir.display(), e)))?;

        let mut cmd = Command::new(&self.config.program);
        cmd.args(self.command_args(model_path, out_dir))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = cmd.spawn().map_err(|e| {
            RetrainError::ExportFailure(format!("failed to start {}: {}", self.config.program, e))
        })?;

        let start = Instant::now();
        let limit = Duration::from_secs(self.config.timeout_secs);
        let output = match timeout(limit, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(RetrainError::ExportFailure(format!("converter I/O error: {}", e)));
            }
            Err(_) => {
                warn!(timeout = ?limit, "Converter timed out, process killed");
                return Err(RetrainError::ExportFailure(format!(
                    "converter timed out after {:?}",
                    limit
                )));
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stderr: String = stderr.chars().take(MAX_STDERR).collect();
            return Err(RetrainError::ExportFailure(format!(
                "converter exited with {:?}: {}",
                output.status.code(),
                stderr.trim()
            )));
        }

        let files = list_files(out_dir);
        info!(
            files = files.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Conversion successful"
        );
        Ok(files)
    }

    /// Export and fold any failure into a report instead of an error
    pub async fn export_report(&self, model_path: &Path, out_dir: &Path) -> ExportReport {
        match self.export(model_path, out_dir).await {
            Ok(files) => ExportReport {
                success: true,
                output_dir: Some(out_dir.display().to_string()),
                files,
                error: None,
            },
            Err(e) => {
                warn!(error = %e, "Secondary export failed, primary version remains published");
                ExportReport {
                    success: false,
                    output_dir: None,
                    files: Vec::new(),
                    error: Some(e.to_string()),
                }
            }
        }
    }
}

/// Relative paths of files under `dir`, sorted
fn list_files(dir: &Path) -> Vec<String> {
    let mut files: Vec<String> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| {
            e.path()
                .strip_prefix(dir)
                .ok()
                .map(|p| p.display().to_string())
        })
        .collect();
    files.sort();
    files
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shell(script: &str, timeout_secs: u64) -> Exporter {
        Exporter::new(ExportConfig {
            enabled: true,
            program: "sh".to_string(),
            args: vec!["-c".to_string(), script.to_string(), "convert".to_string()],
            timeout_secs,
        })
    }

    #[tokio::test]
    async fn test_successful_export_lists_files() {
        let dir = tempfile::tempdir().unwrap();
        let model = dir.path().join("model.json");
        std::fs::write(&model, "{}").unwrap();
        let out = dir.path().join("web_model");

        let exporter = shell(r#"cp "$1" "$2/model.json" && echo '[]' > "$2/group1-shard1of1.bin""#, 10);
        let files = exporter.export(&model, &out).await.unwrap();

        assert_eq!(files, vec!["group1-shard1of1.bin", "model.json"]);
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_export_failure() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = shell("echo 'bad input' >&2; exit 3", 10);
        let err = exporter
            .export(&dir.path().join("model.json"), &dir.path().join("out"))
            .await
            .unwrap_err();

        match err {
            RetrainError::ExportFailure(msg) => assert!(msg.contains("bad input")),
            other => panic!("unexpected error: {other}"),
        }
        assert!(!dir.path().join("out").exists());
    }

    #[tokio::test]
    async fn test_failed_export_removes_partial_output() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("web_model");
        let exporter = shell(r#"echo partial > "$2/model.json"; exit 1"#, 10);

        let report = exporter.export_report(&dir.path().join("model.json"), &out).await;
        assert!(!report.success);
        assert!(!out.exists());
    }

    #[test]
    fn test_placeholders_are_substituted() {
        let exporter = Exporter::new(ExportConfig {
            enabled: true,
            program: "blob2web".to_string(),
            args: vec!["--in={model}".to_string(), "{out_dir}".to_string()],
            timeout_secs: 10,
        });
        let args = exporter.command_args(Path::new("/v/model.json"), Path::new("/v/web_model"));
        assert_eq!(args, vec!["--in=/v/model.json", "/v/web_model"]);
    }

    #[tokio::test]
    async fn test_unconfigured_program_is_export_failure() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = Exporter::new(ExportConfig {
            enabled: true,
            ..ExportConfig::default()
        });
        let err = exporter
            .export(&dir.path().join("model.json"), &dir.path().join("out"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no export program"));
    }

    #[tokio::test]
    async fn test_missing_program_is_reported_not_raised() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = Exporter::new(ExportConfig {
            enabled: true,
            program: "definitely-not-a-model-converter".to_string(),
            ..ExportConfig::default()
        });

        let report = exporter
            .export_report(&dir.path().join("model.json"), &dir.path().join("out"))
            .await;
        assert!(!report.success);
        assert!(report.error.unwrap().contains("failed to start"));
    }

    #[tokio::test]
    async fn test_timeout_is_export_failure() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = shell("sleep 5", 1);
        let err = exporter
            .export(&dir.path().join("model.json"), &dir.path().join("out"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }
}
