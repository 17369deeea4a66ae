//! 梯形图生成模块：三个合成器（动作 / 驱动单元 / 工程）的公共上下文。
//!
//! 约束：
//! - 合成器只返回 (行, 诊断)，不写文件、不修改快照
//! - 单个实体的致命问题只中止该实体（`Halt`），其它实体继续生成
//! - 所有列表都按 `(sortNumber, id)` 排序，同一快照两次生成逐字节一致

pub mod cylinder;
pub mod index;
pub mod operation;
pub mod process;

use log::{debug, info, warn};
use thiserror::Error;

use crate::application::settings::GenerationSettings;
use crate::domain::diagnostic::Diagnostic;
use crate::domain::ladder::{is_timer_reference, Contact, LadderRow};
use crate::domain::model::{MnemonicType, TimerCategory};
use crate::domain::roles::{required_bits, Role, RoleBlock};
use crate::ports::{ConditionLookup, DeviceResolver};

use self::index::{SnapshotIndex, TimerLookup};

/// 合成结果：按发出顺序的指令行 + 诊断。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Synthesis {
    pub rows: Vec<LadderRow>,
    pub diagnostics: Vec<Diagnostic>,
}

impl Synthesis {
    pub fn merge(&mut self, other: Synthesis) {
        self.rows.extend(other.rows);
        self.diagnostics.extend(other.diagnostics);
    }
}

/// 当前实体中止生成（对应的致命诊断已经记录）。
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("synthesis halted for {mnemonic_type:?} {record_id}")]
pub struct Halt {
    pub mnemonic_type: MnemonicType,
    pub record_id: i32,
}

/// 单个实体的生成作用域：收集行与诊断，诊断同时写日志。
#[derive(Debug)]
pub struct EntityScope {
    mnemonic_type: MnemonicType,
    record_id: i32,
    record_name: String,
    rows: Vec<LadderRow>,
    diagnostics: Vec<Diagnostic>,
}

impl EntityScope {
    pub fn new(mnemonic_type: MnemonicType, record_id: i32, record_name: impl Into<String>) -> Self {
        Self {
            mnemonic_type,
            record_id,
            record_name: record_name.into(),
            rows: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    pub fn mnemonic_type(&self) -> MnemonicType {
        self.mnemonic_type
    }

    pub fn record_id(&self) -> i32 {
        self.record_id
    }

    pub fn record_name(&self) -> &str {
        &self.record_name
    }

    pub fn push(&mut self, row: LadderRow) {
        self.rows.push(row);
    }

    pub fn extend(&mut self, rows: impl IntoIterator<Item = LadderRow>) {
        self.rows.extend(rows);
    }

    /// 非致命诊断：继续生成。
    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        info!(
            "{} {} ({}): {}",
            self.mnemonic_type.name(),
            self.record_id,
            self.record_name,
            message
        );
        self.diagnostics.push(Diagnostic::warning(
            self.mnemonic_type,
            self.record_id,
            self.record_name.clone(),
            message,
        ));
    }

    /// 致命诊断：返回 `Halt`，调用方用 `?` 中止该实体。
    pub fn halt(&mut self, message: impl Into<String>) -> Halt {
        let message = message.into();
        warn!(
            "{} {} ({}) skipped: {}",
            self.mnemonic_type.name(),
            self.record_id,
            self.record_name,
            message
        );
        self.diagnostics.push(Diagnostic::critical(
            self.mnemonic_type,
            self.record_id,
            self.record_name.clone(),
            message,
        ));
        Halt {
            mnemonic_type: self.mnemonic_type,
            record_id: self.record_id,
        }
    }

    pub fn finish(self) -> Synthesis {
        Synthesis {
            rows: self.rows,
            diagnostics: self.diagnostics,
        }
    }
}

/// 一次生成共享的只读上下文。
pub struct SynthContext<'a> {
    pub settings: &'a GenerationSettings,
    pub resolver: &'a dyn DeviceResolver,
    pub conditions: &'a dyn ConditionLookup,
    pub index: SnapshotIndex<'a>,
}

impl<'a> SynthContext<'a> {
    /// 取实体的已分配块：不存在或长度不够容纳模板角色集时中止。
    pub fn block<R: Role>(&self, scope: &mut EntityScope, roles: &[R]) -> Result<RoleBlock<'a>, Halt> {
        let Some(device) = self.index.allocation(scope.mnemonic_type(), scope.record_id()) else {
            return Err(scope.halt("no device allocation for this record"));
        };
        let needed = required_bits(roles);
        if device.out_coil_count < needed {
            return Err(scope.halt(format!(
                "device allocation {}{} has {} bits, template needs {}",
                device.label, device.start_num, device.out_coil_count, needed
            )));
        }
        if !device.addressable(needed) {
            return Err(scope.halt(format!(
                "device allocation {}{} overflows the address range for {} bits",
                device.label, device.start_num, needed
            )));
        }
        Ok(RoleBlock::new(device))
    }

    /// 引用其它实体的块（不校验长度，缺失时返回 `None`）。
    pub fn peer_block(&self, mnemonic_type: MnemonicType, record_id: i32) -> Option<RoleBlock<'a>> {
        self.index.allocation(mnemonic_type, record_id).map(RoleBlock::new)
    }

    pub fn timer(&self, scope: &EntityScope, category: TimerCategory) -> TimerLookup<'a> {
        self.index
            .timer(scope.mnemonic_type(), scope.record_id(), category)
    }

    /// 传感器接点解析。
    ///
    /// - `_` 前缀：常闭接点
    /// - `T<数字>`：定时器接点，原样使用
    /// - `count = Some(N)`（N > 1）：`<name>1..N` 全部解析
    /// - 解析不到：非致命诊断，用常 OFF 代替（不取反，保证不会误触发）
    pub fn sensor_contacts(
        &self,
        scope: &mut EntityScope,
        name: &str,
        count: Option<u32>,
        scope_name: &str,
    ) -> Vec<Contact> {
        let name = name.trim();
        let negated = name.starts_with('_');
        let base = name.trim_start_matches('_');
        if is_timer_reference(base) {
            return vec![Contact {
                device: base.to_string(),
                negated,
            }];
        }

        self.resolve_points(base, count, false, scope_name, scope.record_id())
            .into_iter()
            .map(|(sensor, address)| match address {
                Some(device) => {
                    debug!("sensor {sensor} -> {device}");
                    Contact { device, negated }
                }
                None => {
                    scope.warn(format!(
                        "sensor {sensor} not found in IO table, using {}",
                        self.settings.always_off
                    ));
                    Contact::no(&self.settings.always_off)
                }
            })
            .collect()
    }

    /// 多点解析：`count = Some(N)`（N > 1）时查 `<base>1..N`，否则只查裸名。
    ///
    /// 多点先走一次 `resolve_range`；某个编号在范围结果里不是唯一的输入/输出点时
    /// 退回单点 `resolve`（公共 IO 回退与人工选择都在那里）。
    pub fn resolve_points(
        &self,
        base: &str,
        count: Option<u32>,
        is_output: bool,
        scope_name: &str,
        scope_record_id: i32,
    ) -> Vec<(String, Option<String>)> {
        let n = match count {
            Some(n) if n > 1 => n,
            _ => {
                let address = self.resolver.resolve(base, is_output, scope_name, scope_record_id);
                return vec![(base.to_string(), address)];
            }
        };
        let range = self.resolver.resolve_range(base, scope_name, scope_record_id);
        (1..=n)
            .map(|i| {
                let name = format!("{base}{i}");
                let mut hits = range
                    .iter()
                    .filter(|io| io.is_output == is_output && io.name == name);
                let address = match (hits.next(), hits.next()) {
                    (Some(only), None) => Some(only.effective_address().to_string()),
                    _ => self.resolver.resolve(&name, is_output, scope_name, scope_record_id),
                };
                (name, address)
            })
            .collect()
    }
}

/// 空白字符串视为未配置。
pub(crate) fn configured(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
pub(crate) mod testkit {
    use crate::adapters::{ConditionTable, IoTable};
    use crate::application::settings::GenerationSettings;
    use crate::domain::ladder::LadderRow;
    use crate::domain::model::{Io, MnemonicDevice, MnemonicType, ProjectSnapshot};
    use crate::ports::DeviceResolver;

    use super::index::SnapshotIndex;
    use super::SynthContext;

    pub fn alloc(mnemonic_type: MnemonicType, record_id: i32, label: &str, start_num: u32, count: u32) -> MnemonicDevice {
        MnemonicDevice {
            mnemonic_type,
            record_id,
            label: label.to_string(),
            start_num,
            out_coil_count: count,
        }
    }

    pub fn io(name: &str, address: &str, is_output: bool, scope: &str) -> Io {
        Io {
            id: 0,
            name: name.to_string(),
            address: address.to_string(),
            link_device: None,
            is_output,
            scope: scope.to_string(),
        }
    }

    /// 在快照上跑一个合成闭包。
    pub fn with_context<T>(snapshot: &ProjectSnapshot, f: impl FnOnce(&SynthContext<'_>) -> T) -> T {
        let resolver = IoTable::new(snapshot.ios.clone());
        with_resolver(snapshot, &resolver, f)
    }

    /// 同上，但使用给定的解析器。
    pub fn with_resolver<T>(
        snapshot: &ProjectSnapshot,
        resolver: &dyn DeviceResolver,
        f: impl FnOnce(&SynthContext<'_>) -> T,
    ) -> T {
        let settings = GenerationSettings::default();
        let conditions = ConditionTable::new(snapshot.conditions.clone());
        let ctx = SynthContext {
            settings: &settings,
            resolver,
            conditions: &conditions,
            index: SnapshotIndex::new(snapshot),
        };
        f(&ctx)
    }

    /// 渲染为 `LD M1` 形式便于断言。
    pub fn render(rows: &[LadderRow]) -> Vec<String> {
        rows.iter()
            .map(|row| {
                let mut text = row.command.mnemonic().to_string();
                for operand in &row.operands {
                    text.push(' ');
                    text.push_str(operand);
                }
                text
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::testkit::{io, with_context};
    use super::*;
    use crate::domain::model::ProjectSnapshot;

    #[test]
    fn sensor_contacts_handle_negation_timers_and_fallback() {
        let snapshot = ProjectSnapshot {
            ios: vec![
                io("SW1", "X10", false, "CY1"),
                io("SW2", "X11", false, ""),
                io("ST1", "X20", false, "CY1"),
                io("ST2", "X21", false, "CY1"),
            ],
            ..Default::default()
        };
        with_context(&snapshot, |ctx| {
            let mut scope = EntityScope::new(MnemonicType::Operation, 1, "A1");
            assert_eq!(
                ctx.sensor_contacts(&mut scope, "_SW1", None, "CY1"),
                vec![Contact::nc("X10")]
            );
            assert_eq!(
                ctx.sensor_contacts(&mut scope, "SW2", None, "CY1"),
                vec![Contact::no("X11")]
            );
            assert_eq!(
                ctx.sensor_contacts(&mut scope, "T12", None, "CY1"),
                vec![Contact::no("T12")]
            );
            assert_eq!(
                ctx.sensor_contacts(&mut scope, "ST", Some(2), "CY1"),
                vec![Contact::no("X20"), Contact::no("X21")]
            );
            assert!(scope.finish().diagnostics.is_empty());

            let mut scope = EntityScope::new(MnemonicType::Operation, 1, "A1");
            assert_eq!(
                ctx.sensor_contacts(&mut scope, "_MISSING", None, "CY1"),
                vec![Contact::no("SM401")]
            );
            let out = scope.finish();
            assert_eq!(out.diagnostics.len(), 1);
            assert!(!out.diagnostics[0].is_critical);
        });
    }

    #[test]
    fn block_requires_allocation_large_enough_for_roles() {
        use crate::domain::roles::OperationTemplate;

        let snapshot = ProjectSnapshot {
            mnemonics: vec![super::testkit::alloc(MnemonicType::Operation, 1, "M", 100, 10)],
            ..Default::default()
        };
        with_context(&snapshot, |ctx| {
            let roles = OperationTemplate::Excitation.roles();
            let mut short = EntityScope::new(MnemonicType::Operation, 1, "A1");
            assert!(ctx.block(&mut short, &roles).is_err());
            let mut missing = EntityScope::new(MnemonicType::Operation, 2, "A2");
            assert!(ctx.block(&mut missing, &roles).is_err());

            let diags = [short.finish().diagnostics, missing.finish().diagnostics].concat();
            assert_eq!(diags.len(), 2);
            assert!(diags.iter().all(|d| d.is_critical));
        });
    }

    #[test]
    fn block_rejects_allocation_past_the_address_range() {
        use crate::domain::roles::OperationTemplate;

        let snapshot = ProjectSnapshot {
            mnemonics: vec![super::testkit::alloc(MnemonicType::Operation, 1, "M", u32::MAX - 5, 20)],
            ..Default::default()
        };
        with_context(&snapshot, |ctx| {
            let roles = OperationTemplate::Excitation.roles();
            let mut scope = EntityScope::new(MnemonicType::Operation, 1, "A1");
            assert!(ctx.block(&mut scope, &roles).is_err());
            let diags = scope.finish().diagnostics;
            assert_eq!(diags.len(), 1);
            assert!(diags[0].is_critical);
            assert!(diags[0].message.contains("overflows"));
        });
    }
}
