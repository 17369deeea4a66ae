use std::path::Path;

use anyhow::{Context, Result};
use log::info;

use crate::adapters::csv_export::{export_program, ExportError, ExportOutcome};
use crate::adapters::{ConditionTable, IoTable};
use crate::domain::diagnostic::{critical_count, has_critical, Diagnostic};
use crate::domain::model::ProjectSnapshot;
use crate::domain::program::{LadderProgram, SectionKind};
use crate::domain::roles::validate_dispatch_tables;
use crate::ports::{ConditionLookup, DeviceResolver};
use crate::synth::cylinder::build_cylinders;
use crate::synth::index::SnapshotIndex;
use crate::synth::operation::build_operations;
use crate::synth::process::build_processes;
use crate::synth::SynthContext;

use super::settings::GenerationSettings;

/// 一次生成的结果：指令流 + 诊断（按生成顺序）。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerationOutput {
    pub program: LadderProgram,
    pub diagnostics: Vec<Diagnostic>,
}

impl GenerationOutput {
    pub fn has_critical(&self) -> bool {
        has_critical(&self.diagnostics)
    }

    pub fn critical_count(&self) -> usize {
        critical_count(&self.diagnostics)
    }
}

/// Application layer use case: snapshot -> ladder program.
/// Keeps orchestration (dispatch validation, section order, export gate) away from synthesizers.
pub struct LadderService<R: DeviceResolver, C: ConditionLookup> {
    resolver: R,
    conditions: C,
    settings: GenerationSettings,
}

impl LadderService<IoTable, ConditionTable> {
    /// 直接使用快照内的 IO 表和条件表。
    pub fn from_snapshot(snapshot: &ProjectSnapshot, settings: GenerationSettings) -> Result<Self> {
        Self::new(
            IoTable::new(snapshot.ios.clone()),
            ConditionTable::new(snapshot.conditions.clone()),
            settings,
        )
    }
}

impl<R: DeviceResolver, C: ConditionLookup> LadderService<R, C> {
    /// Create a service; dispatch tables are validated once here.
    pub fn new(resolver: R, conditions: C, settings: GenerationSettings) -> Result<Self> {
        validate_dispatch_tables().context("invalid dispatch tables")?;
        Ok(Self {
            resolver,
            conditions,
            settings,
        })
    }

    pub fn settings(&self) -> &GenerationSettings {
        &self.settings
    }

    /// 生成：动作 -> 驱动单元 -> 工程 -> 工程明细，行号从 0 开始。
    pub fn generate(&self, snapshot: &ProjectSnapshot) -> GenerationOutput {
        let ctx = SynthContext {
            settings: &self.settings,
            resolver: &self.resolver,
            conditions: &self.conditions,
            index: SnapshotIndex::new(snapshot),
        };

        let operations = build_operations(&ctx);
        let cylinders = build_cylinders(&ctx);
        let processes = build_processes(&ctx);

        let mut program = LadderProgram::new();
        let mut diagnostics = Vec::new();
        for (kind, synthesis) in [
            (SectionKind::Operation, operations),
            (SectionKind::Cylinder, cylinders),
            (SectionKind::Process, processes.processes),
            (SectionKind::ProcessDetail, processes.details),
        ] {
            program.push_section(kind, synthesis.rows);
            diagnostics.extend(synthesis.diagnostics);
        }

        info!(
            "generated plc {} cycle {}: {} rows, {} diagnostics ({} critical)",
            snapshot.plc_id,
            snapshot.cycle_id,
            program.row_count(),
            diagnostics.len(),
            critical_count(&diagnostics)
        );
        GenerationOutput {
            program,
            diagnostics,
        }
    }

    /// 导出；存在致命诊断时返回 `ExportError::Blocked`。
    pub fn export(&self, output: &GenerationOutput, out_dir: &Path) -> Result<ExportOutcome, ExportError> {
        export_program(&output.program, &output.diagnostics, out_dir)
    }
}
