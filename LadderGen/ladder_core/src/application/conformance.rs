//! 偏移一致性检查：指令流中落在某实体分配块内的每个位引用，
//! 其块内偏移都必须属于该实体类别声明的角色集合。

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::domain::ladder::split_device;
use crate::domain::model::{MnemonicDevice, MnemonicType, ProjectSnapshot};
use crate::domain::program::LadderProgram;
use crate::domain::roles::{detail_roles, DriveClass, OperationTemplate, ProcessTemplate, Role};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OffsetViolation {
    pub row_id: u32,
    pub device: String,
    pub mnemonic_type: MnemonicType,
    pub record_id: i32,
    pub offset: u32,
}

fn offsets<R: Role>(roles: Vec<R>) -> HashSet<u32> {
    roles.into_iter().map(Role::offset).collect()
}

/// 实体类别声明的偏移集合；类别未知时为空集（任何引用都算违规）。
fn allowed_offsets(snapshot: &ProjectSnapshot, device: &MnemonicDevice) -> HashSet<u32> {
    let id = device.record_id;
    match device.mnemonic_type {
        MnemonicType::Operation => snapshot
            .operations
            .iter()
            .find(|o| o.id == id)
            .and_then(|o| OperationTemplate::from_code(o.category_id))
            .map(|t| offsets(t.roles()))
            .unwrap_or_default(),
        MnemonicType::Cylinder => snapshot
            .cylinders
            .iter()
            .find(|c| c.id == id)
            .and_then(|c| DriveClass::from_code(c.drive_sub_id))
            .map(|c| offsets(c.roles()))
            .unwrap_or_default(),
        MnemonicType::Process => snapshot
            .processes
            .iter()
            .find(|p| p.id == id)
            .and_then(|p| ProcessTemplate::from_code(p.category_id))
            .map(|t| offsets(t.roles()))
            .unwrap_or_default(),
        MnemonicType::ProcessDetail => offsets(detail_roles()),
    }
}

/// 把每个操作数映射回 (实体, k)，报告不在角色集合内的 k。
pub fn check_offsets(snapshot: &ProjectSnapshot, program: &LadderProgram) -> Vec<OffsetViolation> {
    let mut by_label: HashMap<&str, Vec<(&MnemonicDevice, HashSet<u32>)>> = HashMap::new();
    for device in &snapshot.mnemonics {
        by_label
            .entry(device.label.as_str())
            .or_default()
            .push((device, allowed_offsets(snapshot, device)));
    }

    let mut violations = Vec::new();
    for row in program.rows() {
        for operand in &row.operands {
            let Some((label, number)) = split_device(operand) else {
                continue;
            };
            let Some(devices) = by_label.get(label) else {
                continue;
            };
            for (device, allowed) in devices {
                if number < device.start_num || !device.covers(number - device.start_num) {
                    continue;
                }
                let offset = number - device.start_num;
                if !allowed.contains(&offset) {
                    violations.push(OffsetViolation {
                        row_id: row.id,
                        device: operand.clone(),
                        mnemonic_type: device.mnemonic_type,
                        record_id: device.record_id,
                        offset,
                    });
                }
            }
        }
    }
    violations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ladder::LadderRow;
    use crate::domain::model::Process;
    use crate::domain::program::SectionKind;

    #[test]
    fn reports_offsets_outside_the_role_set() {
        let snapshot = ProjectSnapshot {
            processes: vec![Process {
                id: 1,
                name: "P1".to_string(),
                category_id: 1,
                sort_number: 1,
                block_number: None,
            }],
            mnemonics: vec![MnemonicDevice {
                mnemonic_type: MnemonicType::Process,
                record_id: 1,
                label: "M".to_string(),
                start_num: 100,
                out_coil_count: 5,
            }],
            ..Default::default()
        };
        let mut program = LadderProgram::new();
        program.push_section(
            SectionKind::Process,
            vec![
                LadderRow::ld("M100"),
                LadderRow::out("M104"),
                LadderRow::mov("K100", "D100"),
                LadderRow::out("M105"),
            ],
        );
        let violations = check_offsets(&snapshot, &program);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].device, "M104");
        assert_eq!(violations[0].offset, 4);
        assert_eq!(violations[0].row_id, 1);
    }
}
