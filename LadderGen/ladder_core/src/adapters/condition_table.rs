use crate::domain::model::{ConditionKind, ConditionRecord, MnemonicType};
use crate::ports::ConditionLookup;

/// 内存条件表：按配置顺序返回明细 id。
#[derive(Debug, Clone, Default)]
pub struct ConditionTable {
    records: Vec<ConditionRecord>,
}

impl ConditionTable {
    pub fn new(records: Vec<ConditionRecord>) -> Self {
        Self { records }
    }
}

impl ConditionLookup for ConditionTable {
    fn condition_ids(&self, kind: ConditionKind, owner_type: MnemonicType, owner_id: i32) -> Vec<i32> {
        self.records
            .iter()
            .filter(|r| r.kind == kind && r.owner_type == owner_type && r.owner_id == owner_id)
            .map(|r| r.detail_id)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(kind: ConditionKind, owner_type: MnemonicType, owner_id: i32, detail_id: i32) -> ConditionRecord {
        ConditionRecord {
            kind,
            owner_type,
            owner_id,
            detail_id,
        }
    }

    #[test]
    fn filters_by_kind_owner_and_keeps_order() {
        let table = ConditionTable::new(vec![
            record(ConditionKind::Start, MnemonicType::Process, 1, 30),
            record(ConditionKind::Finish, MnemonicType::Process, 1, 31),
            record(ConditionKind::Start, MnemonicType::Process, 1, 10),
            record(ConditionKind::Start, MnemonicType::ProcessDetail, 1, 99),
        ]);
        assert_eq!(
            table.condition_ids(ConditionKind::Start, MnemonicType::Process, 1),
            vec![30, 10]
        );
        assert_eq!(
            table.condition_ids(ConditionKind::Finish, MnemonicType::Process, 1),
            vec![31]
        );
        assert!(table
            .condition_ids(ConditionKind::Finish, MnemonicType::ProcessDetail, 1)
            .is_empty());
    }
}
