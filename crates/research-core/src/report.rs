use std::fs::create_dir_all;
use std::io::Write;
use std::path::Path;

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tempfile::NamedTempFile;

use crate::{ResearchError, ResearchModel};

/// Metadata describing how a report was produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportMeta {
    pub topic: String,
    pub model: ResearchModel,
    pub completed_at: DateTime<Utc>,
    #[serde(rename = "response_time_seconds")]
    pub elapsed_seconds: Option<f64>,
}

/// The persisted/emitted artifact of a successful run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportEnvelope {
    pub meta: ReportMeta,
    pub content: Value,
    pub sources: Vec<Value>,
}

/// Wrap retrieval output into a [`ReportEnvelope`], stamping the completion time.
pub fn format_report(
    topic: &str,
    model: ResearchModel,
    content: Value,
    sources: Vec<Value>,
    elapsed_seconds: Option<f64>,
) -> ReportEnvelope {
    ReportEnvelope {
        meta: ReportMeta {
            topic: topic.to_string(),
            model,
            completed_at: Utc::now(),
            elapsed_seconds,
        },
        content,
        sources,
    }
}

/// Write the report as pretty-printed JSON, creating parent directories as needed.
///
/// The payload goes to a temporary file beside `path` which is then renamed over
/// it, so a failed write never leaves a truncated report behind.
pub fn write_report(report: &ReportEnvelope, path: &Path) -> Result<(), ResearchError> {
    let to_output = |err: std::io::Error| ResearchError::output(path.to_path_buf(), err);
    let parent = match path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(parent) => {
            create_dir_all(parent).map_err(to_output)?;
            parent
        }
        None => Path::new("."),
    };
    let payload = serde_json::to_vec_pretty(report)
        .context("failed to serialise research report")?;

    let mut staged = NamedTempFile::new_in(parent).map_err(to_output)?;
    staged.write_all(&payload).map_err(to_output)?;
    staged.as_file().sync_all().map_err(to_output)?;
    staged.persist(path).map_err(|err| to_output(err.error))?;
    Ok(())
}

/// Emit the report as pretty-printed JSON followed by a newline.
pub fn emit_report<W: Write>(report: &ReportEnvelope, mut writer: W) -> Result<(), ResearchError> {
    serde_json::to_writer_pretty(&mut writer, report)
        .context("failed to serialise research report")?;
    writeln!(writer).context("failed to write research report")?;
    writer.flush().context("failed to flush research report")?;
    Ok(())
}
