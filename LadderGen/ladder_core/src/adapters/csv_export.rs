//! 指令流 CSV 导出（分段文件 + 合并文件 + summary.json）。
//!
//! 约束：
//! - 存在任意致命诊断时拒绝导出（一个文件都不写）
//! - CSV 列：`StepNo, Command, Device, Note`；多操作数续行命令列留空；注释行写在 Note 列
//! - 同一指令流的 CSV 字节完全一致，摘要用于比对两次生成

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use log::info;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::domain::diagnostic::{critical_count, Diagnostic};
use crate::domain::ladder::{Command, LadderRow};
use crate::domain::program::{LadderProgram, SectionKind};

pub const LADDER_FILE_STEM: &str = "Ladder";
const CSV_HEADER: [&str; 4] = ["StepNo", "Command", "Device", "Note"];

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("export blocked by {critical} critical diagnostic(s)")]
    Blocked { critical: usize },

    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SectionSummary {
    pub kind: SectionKind,
    pub rows: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ExportSummary {
    pub generated_at_utc: DateTime<Utc>,
    pub rows: u32,
    pub sections: Vec<SectionSummary>,
    pub warnings: u32,
    pub stream_digest: String,
}

#[derive(Clone, Debug)]
pub struct ExportOutcome {
    pub files: Vec<PathBuf>,
    pub summary: ExportSummary,
}

fn row_records(row: &LadderRow) -> Vec<[String; 4]> {
    if row.command == Command::Comment {
        return vec![[
            row.id.to_string(),
            String::new(),
            String::new(),
            row.note.clone().unwrap_or_default(),
        ]];
    }

    let mut operands = row.operands.iter();
    let mut records = vec![[
        row.id.to_string(),
        row.command.mnemonic().to_string(),
        operands.next().cloned().unwrap_or_default(),
        row.note.clone().unwrap_or_default(),
    ]];
    for operand in operands {
        records.push([String::new(), String::new(), operand.clone(), String::new()]);
    }
    records
}

fn write_rows<'a, W: Write>(out: W, rows: impl Iterator<Item = &'a LadderRow>) -> Result<W, ExportError> {
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(CSV_HEADER)?;
    for row in rows {
        for record in row_records(row) {
            writer.write_record(&record)?;
        }
    }
    writer
        .into_inner()
        .map_err(|e| ExportError::Csv(csv::Error::from(e.into_error())))
}

/// 渲染为 CSV 字节。
pub fn render_csv<'a>(rows: impl Iterator<Item = &'a LadderRow>) -> Result<Vec<u8>, ExportError> {
    write_rows(Vec::new(), rows)
}

fn sha256_digest_prefixed(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    let mut hex = String::with_capacity(digest.len() * 2);
    for b in digest {
        hex.push_str(&format!("{:02x}", b));
    }
    format!("sha256:{hex}")
}

/// 整个指令流（合并 CSV）的摘要。
pub fn stream_digest(program: &LadderProgram) -> Result<String, ExportError> {
    Ok(sha256_digest_prefixed(&render_csv(program.rows())?))
}

fn write_bytes_atomic(path: &Path, bytes: &[u8]) -> Result<(), ExportError> {
    let io_err = |source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, bytes).map_err(io_err)?;
    if path.exists() {
        fs::remove_file(path).map_err(io_err)?;
    }
    fs::rename(&tmp, path).map_err(io_err)?;
    Ok(())
}

/// 导出：致命诊断闸门 -> 分段 CSV -> 合并 CSV -> summary.json。
pub fn export_program(
    program: &LadderProgram,
    diagnostics: &[Diagnostic],
    out_dir: &Path,
) -> Result<ExportOutcome, ExportError> {
    let critical = critical_count(diagnostics);
    if critical > 0 {
        return Err(ExportError::Blocked { critical });
    }

    let mut files = Vec::new();
    let mut sections = Vec::new();
    for section in &program.sections {
        let path = out_dir.join(format!("{}.csv", section.kind.file_stem()));
        write_bytes_atomic(&path, &render_csv(section.rows.iter())?)?;
        files.push(path);
        sections.push(SectionSummary {
            kind: section.kind,
            rows: section.rows.len() as u32,
        });
    }

    let ladder = render_csv(program.rows())?;
    let ladder_path = out_dir.join(format!("{LADDER_FILE_STEM}.csv"));
    write_bytes_atomic(&ladder_path, &ladder)?;
    files.push(ladder_path);

    let summary = ExportSummary {
        generated_at_utc: Utc::now(),
        rows: program.row_count() as u32,
        sections,
        warnings: diagnostics.len() as u32,
        stream_digest: sha256_digest_prefixed(&ladder),
    };
    let summary_path = out_dir.join("summary.json");
    write_bytes_atomic(&summary_path, serde_json::to_string_pretty(&summary)?.as_bytes())?;
    files.push(summary_path);

    info!(
        "exported {} rows to {} ({})",
        summary.rows,
        out_dir.display(),
        summary.stream_digest
    );
    Ok(ExportOutcome { files, summary })
}
