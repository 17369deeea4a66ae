use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// 生成配置：共享信号软元件。
/// 说明：显式传入每个生成函数，不使用进程级可变全局状态。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GenerationSettings {
    /// 常 ON
    pub always_on: String,
    /// 常 OFF，也是缺失配置时的安全回退信号
    pub always_off: String,
    pub pause_signal: String,
    pub reset_signal: String,
    pub auto_mode_signal: String,
    pub test_mode_signal: String,
    pub debug_start_signal: String,
    /// 跳转指针标签（`CJ P<n>`）
    pub jump_label: String,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            always_on: "SM400".to_string(),
            always_off: "SM401".to_string(),
            pause_signal: "M5000".to_string(),
            reset_signal: "M5001".to_string(),
            auto_mode_signal: "M5002".to_string(),
            test_mode_signal: "M5003".to_string(),
            debug_start_signal: "M5004".to_string(),
            jump_label: "P".to_string(),
        }
    }
}

impl GenerationSettings {
    /// 文件不存在时使用默认值。
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read generation settings from: {}", path.display()))?;
        let settings: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse generation settings JSON from: {}", path.display()))?;
        Ok(settings)
    }

    pub fn jump_pointer(&self, block_number: u32) -> String {
        format!("{}{}", self.jump_label, block_number)
    }
}
