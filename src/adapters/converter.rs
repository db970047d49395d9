use crate::domain::ports::{Converter, FilterRules};
use crate::utils::error::{MergeError, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

static OUTPUT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Runs a subconverter-compatible executable, feeding the link list on stdin.
#[derive(Debug, Clone)]
pub struct SubconverterCli {
    executable: String,
    timeout: Duration,
}

impl SubconverterCli {
    pub fn new(executable: impl Into<String>, timeout: Duration) -> Self {
        Self {
            executable: executable.into(),
            timeout,
        }
    }

    fn output_path(target: &str) -> PathBuf {
        let seq = OUTPUT_SEQ.fetch_add(1, Ordering::Relaxed);
        std::env::temp_dir().join(format!(
            "sub-merge-{}-{}-{}.txt",
            std::process::id(),
            seq,
            target
        ))
    }

    fn build_command(&self, target: &str, output: &Path, rules: &FilterRules) -> Command {
        let mut cmd = Command::new(&self.executable);
        cmd.arg("--no-color")
            .arg("--target")
            .arg(target)
            .arg("--output")
            .arg(output);

        for (flag, value) in [
            ("--rename", &rules.rename),
            ("--include", &rules.include),
            ("--exclude", &rules.exclude),
            ("--config", &rules.config),
        ] {
            if !value.is_empty() {
                cmd.arg(flag).arg(value);
            }
        }

        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

fn converter_error(message: impl Into<String>) -> MergeError {
    MergeError::ConverterError {
        message: message.into(),
    }
}

#[async_trait]
impl Converter for SubconverterCli {
    async fn convert(&self, input: &str, target: &str, rules: &FilterRules) -> Result<String> {
        let output = Self::output_path(target);
        tracing::debug!(
            "Running {} for target {} -> {}",
            self.executable,
            target,
            output.display()
        );

        let mut child = self
            .build_command(target, &output, rules)
            .spawn()
            .map_err(|e| converter_error(format!("cannot start {}: {}", self.executable, e)))?;

        let mut stdin = child.stdin.take();
        let feed = async {
            if let Some(mut pipe) = stdin.take() {
                // 轉換器提早結束時寫入會失敗，交給 exit status 判斷
                if let Err(e) = pipe.write_all(input.as_bytes()).await {
                    tracing::debug!("Converter closed stdin early: {}", e);
                }
            }
        };

        // stdin 寫入也算在 timeout 內
        let run = async {
            let ((), exited) = tokio::join!(feed, child.wait_with_output());
            exited
        };
        let result = tokio::time::timeout(self.timeout, run)
            .await
            .map_err(|_| {
                converter_error(format!(
                    "{} timed out after {:?} for target {}",
                    self.executable, self.timeout, target
                ))
            })?
            .map_err(|e| converter_error(format!("waiting for {}: {}", self.executable, e)))?;

        if !result.status.success() {
            let _ = tokio::fs::remove_file(&output).await;
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(converter_error(format!(
                "{} exited with {} for target {}: {}",
                self.executable,
                result.status,
                target,
                stderr.trim()
            )));
        }

        let converted = tokio::fs::read_to_string(&output).await.map_err(|e| {
            converter_error(format!(
                "no output at {} for target {}: {}",
                output.display(),
                target,
                e
            ))
        })?;
        let _ = tokio::fs::remove_file(&output).await;

        Ok(converted)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    fn script(dir: &TempDir, name: &str, body: &str) -> String {
        let path = dir.path().join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.display().to_string()
    }

    const ECHO_TO_OUTPUT: &str = r#"out=""
args="$*"
while [ $# -gt 0 ]; do
  if [ "$1" = "--output" ]; then out="$2"; fi
  shift
done
{ echo "$args"; cat; } > "$out""#;

    #[tokio::test]
    async fn test_convert_passes_stdin_and_rules() {
        let dir = TempDir::new().unwrap();
        let exe = script(&dir, "fake-converter", ECHO_TO_OUTPUT);
        let converter = SubconverterCli::new(exe, Duration::from_secs(10));

        let rules = FilterRules {
            exclude: "expired".to_string(),
            ..Default::default()
        };
        let converted = converter
            .convert("trojan://pw@a.example.com:443#A", "clash", &rules)
            .await
            .unwrap();

        let mut lines = converted.lines();
        let args = lines.next().unwrap();
        assert!(args.starts_with("--no-color --target clash --output "));
        assert!(args.ends_with("--exclude expired"));
        assert!(!args.contains("--rename"));
        assert_eq!(lines.next(), Some("trojan://pw@a.example.com:443#A"));
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_an_error() {
        let dir = TempDir::new().unwrap();
        let exe = script(&dir, "failing-converter", "cat > /dev/null\necho boom >&2\nexit 3");
        let converter = SubconverterCli::new(exe, Duration::from_secs(10));

        let err = converter
            .convert("x", "clash", &FilterRules::default())
            .await
            .unwrap_err();
        assert!(matches!(err, MergeError::ConverterError { .. }));
        assert!(err.to_string().contains("boom"));
    }

    #[tokio::test]
    async fn test_missing_output_is_an_error() {
        let dir = TempDir::new().unwrap();
        let exe = script(&dir, "silent-converter", "cat > /dev/null");
        let converter = SubconverterCli::new(exe, Duration::from_secs(10));

        let err = converter
            .convert("x", "clash", &FilterRules::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no output"));
    }

    #[tokio::test]
    async fn test_timeout_is_an_error() {
        let dir = TempDir::new().unwrap();
        let exe = script(&dir, "slow-converter", "sleep 5");
        let converter = SubconverterCli::new(exe, Duration::from_millis(200));

        let err = converter
            .convert("x", "clash", &FilterRules::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn test_timeout_covers_large_unread_input() {
        let dir = TempDir::new().unwrap();
        let exe = script(&dir, "deaf-converter", "exec sleep 5");
        let converter = SubconverterCli::new(exe, Duration::from_millis(200));
        let input = "trojan://pw@a.example.com:443#A\n".repeat(40_000);

        let started = std::time::Instant::now();
        let err = converter
            .convert(&input, "clash", &FilterRules::default())
            .await
            .unwrap_err();

        assert!(started.elapsed() < Duration::from_secs(2));
        assert!(err.to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn test_missing_executable_is_an_error() {
        let converter = SubconverterCli::new("/nonexistent/subconverter", Duration::from_secs(1));
        let err = converter
            .convert("x", "clash", &FilterRules::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("cannot start"));
    }
}
