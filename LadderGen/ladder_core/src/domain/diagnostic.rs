//! 梯形图生成模块：诊断记录（只追加、不抛出）。

use serde::{Deserialize, Serialize};

use super::model::MnemonicType;

/// 一条生成期诊断：所属实体 + 消息 + 是否致命。
///
/// 只要存在任意一条 `is_critical = true`，整次生成的文件导出都会被拒绝。
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    pub mnemonic_type: MnemonicType,
    pub record_id: i32,
    pub record_name: String,
    pub message: String,
    pub is_critical: bool,
}

impl Diagnostic {
    pub fn critical(
        mnemonic_type: MnemonicType,
        record_id: i32,
        record_name: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            mnemonic_type,
            record_id,
            record_name: record_name.into(),
            message: message.into(),
            is_critical: true,
        }
    }

    pub fn warning(
        mnemonic_type: MnemonicType,
        record_id: i32,
        record_name: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            is_critical: false,
            ..Self::critical(mnemonic_type, record_id, record_name, message)
        }
    }
}

pub fn has_critical(diagnostics: &[Diagnostic]) -> bool {
    diagnostics.iter().any(|d| d.is_critical)
}

pub fn critical_count(diagnostics: &[Diagnostic]) -> usize {
    diagnostics.iter().filter(|d| d.is_critical).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostic_json_uses_camel_case_and_flag() {
        let diag = Diagnostic::warning(MnemonicType::Cylinder, 4, "CY1", "valve G not found");
        let json = serde_json::to_string(&diag).unwrap();
        assert!(json.contains("\"mnemonicType\":4"));
        assert!(json.contains("\"recordName\":\"CY1\""));
        assert!(json.contains("\"isCritical\":false"));
    }

    #[test]
    fn critical_gate_counts_only_critical_entries() {
        let mut diags = vec![Diagnostic::warning(MnemonicType::Operation, 1, "op", "w")];
        assert!(!has_critical(&diags));
        diags.push(Diagnostic::critical(MnemonicType::Operation, 2, "op2", "c"));
        assert!(has_critical(&diags));
        assert_eq!(critical_count(&diags), 1);
    }
}
