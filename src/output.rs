use crate::compile::Artifact;
use crate::diagnostics::Warning;
use crate::identifiers::EndpointIdentifier;
use crate::staging::Transaction;
use crate::util::sha256_hex;
use anyhow::Result;
use serde::Serialize;

pub const REPORT_FILE: &str = "build-report.json";
pub const REPORT_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ArtifactRecord {
    pub source: String,
    pub output: String,
    pub kind: String,
    pub bytes: usize,
    pub sha256: String,
}

impl ArtifactRecord {
    pub fn from_artifact(artifact: &Artifact) -> Self {
        let bytes = artifact.output_bytes();
        Self {
            source: artifact.source_path.clone(),
            output: artifact.output_path.clone(),
            kind: artifact.kind.as_str().to_string(),
            bytes: bytes.len(),
            sha256: sha256_hex(bytes),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BuildReport {
    pub schema_version: u32,
    pub build_date: String,
    pub business_name: String,
    pub version: String,
    pub artifacts: Vec<ArtifactRecord>,
    pub endpoints: Vec<EndpointIdentifier>,
    pub dynamic_columns: usize,
    pub warnings: Vec<Warning>,
}

impl BuildReport {
    pub fn warning_count(&self) -> usize {
        self.warnings.len()
    }
}

pub fn write_report_staged(txn: &Transaction, report: &BuildReport) -> Result<()> {
    txn.stage_json(REPORT_FILE, report)
}
