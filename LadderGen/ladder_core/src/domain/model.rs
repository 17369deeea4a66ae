//! 梯形图生成模块：领域快照模型。
//!
//! 约束：
//! - 一次生成只读取一次快照（一个 PLC + 一个 Cycle 的选择），生成期间所有实体不可变
//! - 地址分配（`MnemonicDevice`）由外部预先计算，核心只读不分配
//! - JSON 字段统一 camelCase，集合字段缺省为空

use serde::{Deserialize, Serialize};

/// 实体所属的助记符类型（地址分配表的分区键）。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum MnemonicType {
    Process = 1,
    ProcessDetail = 2,
    Operation = 3,
    Cylinder = 4,
}

impl MnemonicType {
    pub fn id(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            MnemonicType::Process => "Process",
            MnemonicType::ProcessDetail => "ProcessDetail",
            MnemonicType::Operation => "Operation",
            MnemonicType::Cylinder => "Cylinder",
        }
    }
}

impl TryFrom<u8> for MnemonicType {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, String> {
        match value {
            1 => Ok(MnemonicType::Process),
            2 => Ok(MnemonicType::ProcessDetail),
            3 => Ok(MnemonicType::Operation),
            4 => Ok(MnemonicType::Cylinder),
            other => Err(format!("unknown mnemonicType id: {other}")),
        }
    }
}

impl From<MnemonicType> for u8 {
    fn from(value: MnemonicType) -> Self {
        value.id()
    }
}

/// 预分配的软元件块：`Label + (StartNum + k)`。
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MnemonicDevice {
    pub mnemonic_type: MnemonicType,
    pub record_id: i32,
    pub label: String,
    pub start_num: u32,
    pub out_coil_count: u32,
}

impl MnemonicDevice {
    /// 渲染偏移 `offset` 处的位地址，例如 `M1005`。
    /// 地址超出 u32 时按 u64 渲染，不会溢出；能否实际使用由 [`Self::addressable`] 判定。
    pub fn device(&self, offset: u32) -> String {
        match self.start_num.checked_add(offset) {
            Some(number) => format!("{}{}", self.label, number),
            None => format!("{}{}", self.label, u64::from(self.start_num) + u64::from(offset)),
        }
    }

    /// 从起始地址连续 `bits` 位是否都落在 u32 地址空间内。
    pub fn addressable(&self, bits: u32) -> bool {
        self.start_num.checked_add(bits).is_some()
    }

    /// 是否覆盖偏移 `offset`。
    pub fn covers(&self, offset: u32) -> bool {
        offset < self.out_coil_count
    }
}

/// 驱动单元（气缸 / 伺服轴 / 电机）。
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Cylinder {
    pub id: i32,
    /// 显示编号，同时作为 IO 查找的作用域名（如 "CY1"）
    pub cy_num: String,
    #[serde(default)]
    pub name: String,
    /// 驱动族代码，选择阀 / 电机 / 伺服 / 变频器的输出模板
    pub drive_sub_id: u32,
    #[serde(default)]
    pub sort_number: i32,
    /// 多点输出：按 `<base>1..N` 搜索，而不是单个裸名
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multi_sensor_count: Option<u32>,
}

impl Cylinder {
    pub fn display_name(&self) -> String {
        if self.name.is_empty() {
            self.cy_num.clone()
        } else {
            format!("{}{}", self.cy_num, self.name)
        }
    }
}

/// 动作（某个驱动单元的一步指令动作）。
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    pub id: i32,
    #[serde(default)]
    pub name: String,
    pub cylinder_id: i32,
    /// 动作类别代码，选择时序模板（励磁 / 保持 / N 段变速 / 定位）
    pub category_id: u32,
    /// "G" = 前进，"B" = 后退
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub go_back: Option<String>,
    /// 开始确认传感器名；`_` 前缀表示常闭接点
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,
    /// 完成确认传感器名
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish: Option<String>,
    /// 控制传感器名（启动联锁，可选）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub con: Option<String>,
    /// 开始 / 完成传感器的多点数量
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sensor_count: Option<u32>,
    /// 变速点传感器（最多 4 个）；`T` 开头的数字名视为定时器引用
    #[serde(default)]
    pub speed_sensors: Vec<String>,
    /// 各变速点之后的速度值（最多 4 个）
    #[serde(default)]
    pub speeds: Vec<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_speed: Option<i32>,
    /// 伺服定位目标值
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<i32>,
    #[serde(default)]
    pub sort_number: i32,
}

/// 工程（一个循环中的宏步骤）。
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Process {
    pub id: i32,
    #[serde(default)]
    pub name: String,
    pub category_id: u32,
    #[serde(default)]
    pub sort_number: i32,
    /// 程序块指针编号（`CJ P<n>` 的目标），未配置则不生成跳转
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_number: Option<u32>,
}

/// 工程明细（工程内的微步骤，可关联一个动作）。
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProcessDetail {
    pub id: i32,
    #[serde(default)]
    pub name: String,
    pub process_id: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<i32>,
    #[serde(default)]
    pub sort_number: i32,
}

/// 定时器用途类别（`TimerCategoryId`）。同一所属记录每个类别最多一个。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum TimerCategory {
    StartWait = 1,
    Stable = 2,
    DeepSeat = 3,
    ForcedDeceleration = 4,
    SpeedChange1 = 5,
    SpeedChange2 = 6,
    SpeedChange3 = 7,
    SpeedChange4 = 8,
}

impl TimerCategory {
    pub fn id(self) -> u32 {
        self as u32
    }

    /// 第 `index` 个变速点（0 起）对应的定时器类别。
    pub fn speed_change(index: usize) -> Option<Self> {
        [
            TimerCategory::SpeedChange1,
            TimerCategory::SpeedChange2,
            TimerCategory::SpeedChange3,
            TimerCategory::SpeedChange4,
        ]
        .get(index)
        .copied()
    }
}

/// 定时器，绑定到一个所属记录类型 + 记录 id 列表，并带有用途类别。
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Timer {
    pub id: i32,
    #[serde(default)]
    pub name: String,
    pub category_id: u32,
    pub mnemonic_type: MnemonicType,
    #[serde(default)]
    pub record_ids: Vec<i32>,
    pub timer_num: u32,
    /// 设定值（单位由 PLC 定时器决定，通常 100ms）
    pub preset: u32,
}

impl Timer {
    pub fn owned_by(&self, mnemonic_type: MnemonicType, record_id: i32) -> bool {
        self.mnemonic_type == mnemonic_type && self.record_ids.contains(&record_id)
    }
}

/// 物理 IO 点位。
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Io {
    pub id: i32,
    /// 符号名（如 "G"、"SW1"、"G2"）
    pub name: String,
    pub address: String,
    /// 链接软元件别名；非空时优先于 `address`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_device: Option<String>,
    #[serde(default)]
    pub is_output: bool,
    /// 作用域（所属单元显示编号）；空串表示公共 IO
    #[serde(default)]
    pub scope: String,
}

impl Io {
    /// 解析结果：链接软元件优先。
    pub fn effective_address(&self) -> &str {
        match self.link_device.as_deref() {
            Some(link) if !link.trim().is_empty() => link,
            _ => &self.address,
        }
    }
}

/// 速度设定字软元件（每个驱动单元最多一个）。
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SpeedDevice {
    pub cylinder_id: i32,
    pub device: String,
}

/// 手动操作盘映射（已解析为软元件）。
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ManualControl {
    pub cylinder_id: i32,
    pub go: String,
    pub back: String,
    pub enable: String,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ConditionKind {
    Start,
    Finish,
}

/// 工程 / 明细的开始、完成条件记录：引用某个明细的完成位。
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ConditionRecord {
    pub kind: ConditionKind,
    pub owner_type: MnemonicType,
    pub owner_id: i32,
    pub detail_id: i32,
}

/// 一次生成的输入快照。
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSnapshot {
    #[serde(default)]
    pub plc_id: i32,
    #[serde(default)]
    pub cycle_id: i32,
    #[serde(default)]
    pub cylinders: Vec<Cylinder>,
    #[serde(default)]
    pub operations: Vec<Operation>,
    #[serde(default)]
    pub processes: Vec<Process>,
    #[serde(default)]
    pub process_details: Vec<ProcessDetail>,
    #[serde(default)]
    pub timers: Vec<Timer>,
    #[serde(default)]
    pub ios: Vec<Io>,
    #[serde(default)]
    pub speed_devices: Vec<SpeedDevice>,
    #[serde(default)]
    pub manual_controls: Vec<ManualControl>,
    #[serde(default)]
    pub mnemonics: Vec<MnemonicDevice>,
    #[serde(default)]
    pub conditions: Vec<ConditionRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_near_address_limit_does_not_overflow() {
        let device = MnemonicDevice {
            mnemonic_type: MnemonicType::Operation,
            record_id: 1,
            label: "M".to_string(),
            start_num: u32::MAX - 5,
            out_coil_count: 20,
        };
        assert_eq!(device.device(5), format!("M{}", u32::MAX));
        assert_eq!(device.device(6), format!("M{}", u64::from(u32::MAX) + 1));
        assert!(device.addressable(5));
        assert!(!device.addressable(6));
    }

    #[test]
    fn mnemonic_type_serializes_as_integer_id() {
        let device = MnemonicDevice {
            mnemonic_type: MnemonicType::Operation,
            record_id: 7,
            label: "M".to_string(),
            start_num: 1000,
            out_coil_count: 20,
        };
        let json = serde_json::to_string(&device).unwrap();
        assert!(json.contains("\"mnemonicType\":3"));
        assert!(json.contains("\"outCoilCount\":20"));

        let decoded: MnemonicDevice = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, device);
        assert_eq!(decoded.device(5), "M1005");
        assert!(decoded.covers(19));
        assert!(!decoded.covers(20));
    }

    #[test]
    fn unknown_mnemonic_type_is_rejected() {
        let err = serde_json::from_str::<MnemonicType>("9").unwrap_err();
        assert!(err.to_string().contains("unknown mnemonicType id: 9"));
    }

    #[test]
    fn io_prefers_link_device_when_present() {
        let mut io = Io {
            id: 1,
            name: "G".to_string(),
            address: "Y100".to_string(),
            link_device: Some("  ".to_string()),
            is_output: true,
            scope: "CY1".to_string(),
        };
        assert_eq!(io.effective_address(), "Y100");
        io.link_device = Some("B200".to_string());
        assert_eq!(io.effective_address(), "B200");
    }

    #[test]
    fn snapshot_defaults_missing_collections() {
        let snapshot: ProjectSnapshot = serde_json::from_str(r#"{"plcId":1,"cycleId":2}"#).unwrap();
        assert_eq!(snapshot.plc_id, 1);
        assert!(snapshot.operations.is_empty());
        assert!(snapshot.conditions.is_empty());
    }
}
