//! 梯形图生成模块：一次生成的指令流（按实体类别分段，行号统一分配）。

use serde::{Deserialize, Serialize};

use super::ladder::LadderRow;

/// 输出分段，顺序即生成顺序。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SectionKind {
    Operation,
    Cylinder,
    Process,
    ProcessDetail,
}

impl SectionKind {
    /// 分段输出文件名（不含扩展名）。
    pub fn file_stem(self) -> &'static str {
        match self {
            SectionKind::Operation => "Operation",
            SectionKind::Cylinder => "Cylinder",
            SectionKind::Process => "Process",
            SectionKind::ProcessDetail => "ProcessDetail",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgramSection {
    pub kind: SectionKind,
    pub rows: Vec<LadderRow>,
}

/// 指令流。行标识在每次生成开始时从 0 计数，保证同一输入两次生成逐字节一致。
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LadderProgram {
    pub sections: Vec<ProgramSection>,
    #[serde(skip)]
    next_id: u32,
}

impl LadderProgram {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一个分段，并按流顺序为每行分配标识。
    pub fn push_section(&mut self, kind: SectionKind, rows: Vec<LadderRow>) {
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.id = self.next_id;
                self.next_id += 1;
                row
            })
            .collect();
        self.sections.push(ProgramSection { kind, rows });
    }

    pub fn section(&self, kind: SectionKind) -> Option<&ProgramSection> {
        self.sections.iter().find(|section| section.kind == kind)
    }

    pub fn rows(&self) -> impl Iterator<Item = &LadderRow> {
        self.sections.iter().flat_map(|section| section.rows.iter())
    }

    pub fn row_count(&self) -> usize {
        self.sections.iter().map(|section| section.rows.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_ids_are_assigned_in_stream_order_across_sections() {
        let mut program = LadderProgram::new();
        program.push_section(
            SectionKind::Operation,
            vec![LadderRow::ld("M0"), LadderRow::out("M1")],
        );
        program.push_section(SectionKind::Cylinder, vec![LadderRow::ld("M100")]);

        let ids: Vec<u32> = program.rows().map(|row| row.id).collect();
        assert_eq!(ids, vec![0, 1, 2]);
        assert_eq!(program.row_count(), 3);
        assert_eq!(
            program.section(SectionKind::Cylinder).map(|s| s.rows[0].id),
            Some(2)
        );
        assert!(program.section(SectionKind::Process).is_none());
    }

    #[test]
    fn fresh_programs_restart_numbering() {
        let build = || {
            let mut program = LadderProgram::new();
            program.push_section(SectionKind::Process, vec![LadderRow::ld("M5")]);
            program
        };
        assert_eq!(build(), build());
        assert_eq!(build().rows().next().map(|r| r.id), Some(0));
    }
}
