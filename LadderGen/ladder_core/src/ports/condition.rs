use crate::domain::model::{ConditionKind, MnemonicType};

/// 条件查找端口：工程 / 明细配置的开始、完成条件（明细 id 列表，保持配置顺序）。
pub trait ConditionLookup {
    fn condition_ids(&self, kind: ConditionKind, owner_type: MnemonicType, owner_id: i32) -> Vec<i32>;
}
