use crate::domain::ports::ReportSink;
use crate::utils::error::{MergeError, Result};
use async_trait::async_trait;
use std::path::PathBuf;

/// Keeps the node count line right below a marker line of a Markdown file.
#[derive(Debug, Clone)]
pub struct ReadmeReport {
    path: PathBuf,
    marker: String,
    label: String,
}

impl ReadmeReport {
    pub fn new(path: impl Into<PathBuf>, marker: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            marker: marker.into(),
            label: label.into(),
        }
    }

    /// 回傳更新後的內容；找不到 marker 時回傳 None
    fn update_content(&self, content: &str, count: usize) -> Option<String> {
        let mut lines: Vec<String> = content.split_inclusive('\n').map(String::from).collect();
        let index = lines.iter().position(|line| line.contains(&self.marker))?;

        let count_line = format!("{}: `{}`\n", self.label, count);
        let has_count_line = lines
            .get(index + 1)
            .is_some_and(|next| next.contains(&self.label));
        if has_count_line {
            lines[index + 1] = count_line;
        } else {
            if !lines[index].ends_with('\n') {
                lines[index].push('\n');
            }
            lines.insert(index + 1, count_line);
        }
        Some(lines.concat())
    }
}

#[async_trait]
impl ReportSink for ReadmeReport {
    async fn record_node_count(&self, count: usize) -> Result<()> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| MergeError::ReportError {
                message: format!("cannot read {}: {}", self.path.display(), e),
            })?;

        let updated = self
            .update_content(&content, count)
            .ok_or_else(|| MergeError::ReportError {
                message: format!("marker '{}' not found in {}", self.marker, self.path.display()),
            })?;

        tokio::fs::write(&self.path, updated)
            .await
            .map_err(|e| MergeError::ReportError {
                message: format!("cannot write {}: {}", self.path.display(), e),
            })?;
        tracing::info!("📝 {} updated: {} nodes", self.path.display(), count);
        Ok(())
    }
}
