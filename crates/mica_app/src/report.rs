//! Machine-readable run report written next to the split outputs.

use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const REPORT_FILE: &str = "mica_report.json";

#[derive(Debug, Serialize)]
pub struct RunReport {
    pub started_at: String,
    pub finished_at: String,
    pub input_dir: String,
    pub output_dir: String,
    pub files: Vec<FileReport>,
}

#[derive(Debug, Serialize)]
pub struct FileReport {
    pub file: String,
    pub status: FileStatus,
    pub error: Option<String>,
    pub page_failures: Vec<String>,
    pub units: Vec<UnitRecord>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    Ok,
    Failed,
}

#[derive(Debug, Serialize)]
pub struct UnitRecord {
    pub channel: String,
    pub role: String,
    pub image: PathBuf,
    pub metadata: PathBuf,
    pub image_sha256: String,
}

pub fn write_report(output_dir: &Path, report: &RunReport) -> anyhow::Result<PathBuf> {
    let path = output_dir.join(REPORT_FILE);
    let json = serde_json::to_string_pretty(report)?;
    fs::write(&path, json)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn report_serializes_with_stable_field_names() {
        let dir = TempDir::new().unwrap();
        let report = RunReport {
            started_at: "2026-01-01T00:00:00+00:00".into(),
            finished_at: "2026-01-01T00:00:01+00:00".into(),
            input_dir: "/in".into(),
            output_dir: dir.path().display().to_string(),
            files: vec![FileReport {
                file: "sample.jpk".into(),
                status: FileStatus::Ok,
                error: None,
                page_failures: vec!["page 3: Unsupported page: compression scheme 5".into()],
                units: vec![UnitRecord {
                    channel: "Height".into(),
                    role: "trace".into(),
                    image: PathBuf::from("/out/Height_trace/images/sample_Height_trace.tif"),
                    metadata: PathBuf::from(
                        "/out/Height_trace/metadata/sample_Height_trace_metadata.txt",
                    ),
                    image_sha256: "deadbeef".into(),
                }],
            }],
        };

        let path = write_report(dir.path(), &report).unwrap();
        let json = std::fs::read_to_string(path).unwrap();

        assert!(json.contains("\"status\": \"ok\""));
        assert!(json.contains("\"image_sha256\": \"deadbeef\""));
        assert!(json.contains("\"page_failures\""));
    }
}
