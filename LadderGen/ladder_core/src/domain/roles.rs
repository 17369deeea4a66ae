//! 梯形图生成模块：角色偏移表 + 类别分派表。
//!
//! 所有位引用都是 `Label + (StartNum + k)`，`k` 只能来自这里按名字声明的角色。
//! 每个分派类别（动作模板 / 驱动族 / 工程模板）对应一个固定的角色集合，
//! 生成结果可以按 `check_offsets` 机械地校验。

use std::collections::HashSet;
use std::fmt::Debug;

use thiserror::Error;

use super::ladder::Contact;
use super::model::MnemonicDevice;

/// 角色：块内固定偏移。
pub trait Role: Copy + Debug {
    fn offset(self) -> u32;
}

/// 动作块（20 位）。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum OperationRole {
    ResetGate = 0,
    Hold = 1,
    StartLatch = 2,
    PositioningStart = 4,
    RunEnable = 5,
    StartDelay = 6,
    StartConfirmed = 7,
    PositioningBusy = 8,
    SpeedStep1 = 10,
    SpeedStep2 = 11,
    SpeedStep3 = 12,
    SpeedStep4 = 13,
    FinishDetected = 16,
    StableGate = 17,
    DeepSeat = 18,
    Completion = 19,
}

impl OperationRole {
    pub const SPEED_STEPS: [OperationRole; 4] = [
        OperationRole::SpeedStep1,
        OperationRole::SpeedStep2,
        OperationRole::SpeedStep3,
        OperationRole::SpeedStep4,
    ];

    /// 第 `index` 个变速点（0 起）。
    pub fn speed_step(index: usize) -> Option<Self> {
        Self::SPEED_STEPS.get(index).copied()
    }
}

impl Role for OperationRole {
    fn offset(self) -> u32 {
        self as u32
    }
}

/// 驱动单元块。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum CylinderRole {
    AutoGo = 0,
    AutoBack = 1,
    ManualGo = 2,
    ManualBack = 3,
    ForcedOff = 4,
    GoCommand = 5,
    BackCommand = 6,
    OutputOk = 7,
    RetainGo = 8,
    RetainBack = 9,
    ServoStart = 10,
    BrakeRelease = 11,
    Decelerate = 12,
}

impl Role for CylinderRole {
    fn offset(self) -> u32 {
        self as u32
    }
}

/// 工程块。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ProcessRole {
    Start = 0,
    Running = 1,
    Finished = 2,
}

impl Role for ProcessRole {
    fn offset(self) -> u32 {
        self as u32
    }
}

/// 工程明细块。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum DetailRole {
    Start = 0,
    Running = 1,
    Complete = 2,
}

impl Role for DetailRole {
    fn offset(self) -> u32 {
        self as u32
    }
}

/// 动作时序模板。变速 / 定位携带变速点数量（0~4）。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OperationTemplate {
    Excitation,
    Retention,
    ExcitationOff,
    SpeedChange(u8),
    Positioning(u8),
}

impl OperationTemplate {
    pub fn from_code(code: u32) -> Option<Self> {
        OPERATION_DISPATCH
            .iter()
            .find(|(c, _)| *c == code)
            .map(|(_, template)| *template)
    }

    /// 变速点数量（speedChangeCount）。
    pub fn speed_change_count(self) -> usize {
        match self {
            OperationTemplate::SpeedChange(n) | OperationTemplate::Positioning(n) => n as usize,
            _ => 0,
        }
    }

    /// 到达完成后是否立即切断运行许可（变速 / 定位的驱动需要停止）。
    pub fn stops_at_finish(self) -> bool {
        matches!(
            self,
            OperationTemplate::SpeedChange(_) | OperationTemplate::Positioning(_)
        )
    }

    pub fn roles(self) -> Vec<OperationRole> {
        use OperationRole::*;
        let mut roles = vec![
            ResetGate,
            StartLatch,
            RunEnable,
            StartDelay,
            StartConfirmed,
            FinishDetected,
            StableGate,
            DeepSeat,
            Completion,
        ];
        if self == OperationTemplate::Retention {
            roles.push(Hold);
        }
        roles.extend(OperationRole::SPEED_STEPS.iter().take(self.speed_change_count()));
        if matches!(self, OperationTemplate::Positioning(_)) {
            roles.push(PositioningStart);
            roles.push(PositioningBusy);
        }
        roles
    }
}

/// 驱动族输出模板。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DriveClass {
    SingleValve,
    DoubleValve,
    Motor,
    FlowValve,
    Servo,
    Inverter,
}

impl DriveClass {
    pub fn from_code(code: u32) -> Option<Self> {
        CYLINDER_DISPATCH
            .iter()
            .find(|(c, _)| *c == code)
            .map(|(_, class)| *class)
    }

    /// 该输出模板是否必须有速度设定字。
    pub fn requires_speed_device(self) -> bool {
        matches!(self, DriveClass::FlowValve | DriveClass::Servo | DriveClass::Inverter)
    }

    pub fn roles(self) -> Vec<CylinderRole> {
        use CylinderRole::*;
        let mut roles = vec![
            AutoGo,
            AutoBack,
            ManualGo,
            ManualBack,
            ForcedOff,
            GoCommand,
            BackCommand,
            OutputOk,
        ];
        match self {
            DriveClass::SingleValve => roles.push(RetainGo),
            DriveClass::DoubleValve | DriveClass::FlowValve => {
                roles.extend([RetainGo, RetainBack]);
            }
            DriveClass::Motor => {}
            DriveClass::Servo => roles.extend([ServoStart, BrakeRelease]),
            DriveClass::Inverter => roles.push(Decelerate),
        }
        roles
    }
}

/// 工程模板。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ProcessTemplate {
    Normal,
    ResetAfter,
    SubProcess,
    ConditionalBranch,
    InterlockWait,
}

impl ProcessTemplate {
    pub fn from_code(code: u32) -> Option<Self> {
        PROCESS_DISPATCH
            .iter()
            .find(|(c, _)| *c == code)
            .map(|(_, template)| *template)
    }

    pub fn roles(self) -> Vec<ProcessRole> {
        vec![ProcessRole::Start, ProcessRole::Running, ProcessRole::Finished]
    }
}

pub fn detail_roles() -> Vec<DetailRole> {
    vec![DetailRole::Start, DetailRole::Running, DetailRole::Complete]
}

pub const OPERATION_DISPATCH: &[(u32, OperationTemplate)] = &[
    (1, OperationTemplate::Excitation),
    (2, OperationTemplate::Retention),
    (20, OperationTemplate::Retention),
    (14, OperationTemplate::ExcitationOff),
    (3, OperationTemplate::SpeedChange(0)),
    (9, OperationTemplate::SpeedChange(0)),
    (15, OperationTemplate::SpeedChange(0)),
    (27, OperationTemplate::SpeedChange(0)),
    (4, OperationTemplate::SpeedChange(1)),
    (10, OperationTemplate::SpeedChange(1)),
    (16, OperationTemplate::SpeedChange(1)),
    (28, OperationTemplate::SpeedChange(1)),
    (5, OperationTemplate::SpeedChange(2)),
    (11, OperationTemplate::SpeedChange(2)),
    (17, OperationTemplate::SpeedChange(2)),
    (6, OperationTemplate::SpeedChange(3)),
    (12, OperationTemplate::SpeedChange(3)),
    (18, OperationTemplate::SpeedChange(3)),
    (7, OperationTemplate::SpeedChange(4)),
    (13, OperationTemplate::SpeedChange(4)),
    (19, OperationTemplate::SpeedChange(4)),
    (31, OperationTemplate::Positioning(0)),
    (32, OperationTemplate::Positioning(1)),
    (33, OperationTemplate::Positioning(2)),
    (34, OperationTemplate::Positioning(3)),
    (35, OperationTemplate::Positioning(4)),
];

pub const CYLINDER_DISPATCH: &[(u32, DriveClass)] = &[
    (1, DriveClass::SingleValve),
    (4, DriveClass::SingleValve),
    (10, DriveClass::SingleValve),
    (2, DriveClass::DoubleValve),
    (3, DriveClass::DoubleValve),
    (5, DriveClass::DoubleValve),
    (6, DriveClass::DoubleValve),
    (15, DriveClass::Motor),
    (7, DriveClass::FlowValve),
    (8, DriveClass::FlowValve),
    (9, DriveClass::FlowValve),
    (14, DriveClass::Servo),
    (16, DriveClass::Inverter),
];

pub const PROCESS_DISPATCH: &[(u32, ProcessTemplate)] = &[
    (1, ProcessTemplate::Normal),
    (2, ProcessTemplate::ResetAfter),
    (3, ProcessTemplate::SubProcess),
    (4, ProcessTemplate::ConditionalBranch),
    (5, ProcessTemplate::InterlockWait),
];

/// 动作块固定 20 位。
pub const OPERATION_BLOCK_BITS: u32 = 20;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DispatchError {
    #[error("duplicate class code {code} in {table} dispatch table")]
    DuplicateCode { table: &'static str, code: u32 },

    #[error("role offset {offset} of {table} template exceeds block size {block_bits}")]
    OffsetOutOfBlock {
        table: &'static str,
        offset: u32,
        block_bits: u32,
    },
}

fn check_unique<T>(table: &'static str, entries: &[(u32, T)]) -> Result<(), DispatchError> {
    let mut seen = HashSet::new();
    for (code, _) in entries {
        if !seen.insert(*code) {
            return Err(DispatchError::DuplicateCode { table, code: *code });
        }
    }
    Ok(())
}

/// 启动时校验分派表：代码不重复，动作角色都落在 20 位块内。
pub fn validate_dispatch_tables() -> Result<(), DispatchError> {
    check_unique("operation", OPERATION_DISPATCH)?;
    check_unique("cylinder", CYLINDER_DISPATCH)?;
    check_unique("process", PROCESS_DISPATCH)?;

    for (_, template) in OPERATION_DISPATCH {
        for role in template.roles() {
            if role.offset() >= OPERATION_BLOCK_BITS {
                return Err(DispatchError::OffsetOutOfBlock {
                    table: "operation",
                    offset: role.offset(),
                    block_bits: OPERATION_BLOCK_BITS,
                });
            }
        }
    }
    Ok(())
}

/// 模板所需的最小块长度（最大偏移 + 1）。
pub fn required_bits<R: Role>(roles: &[R]) -> u32 {
    roles.iter().map(|role| role.offset() + 1).max().unwrap_or(0)
}

/// 一个实体的已分配块，按角色名取位地址。
#[derive(Clone, Copy, Debug)]
pub struct RoleBlock<'a> {
    device: &'a MnemonicDevice,
}

impl<'a> RoleBlock<'a> {
    pub fn new(device: &'a MnemonicDevice) -> Self {
        Self { device }
    }

    pub fn bit<R: Role>(&self, role: R) -> String {
        self.device.device(role.offset())
    }

    pub fn contact<R: Role>(&self, role: R) -> Contact {
        Contact::no(self.bit(role))
    }

    pub fn not<R: Role>(&self, role: R) -> Contact {
        Contact::nc(self.bit(role))
    }
}
