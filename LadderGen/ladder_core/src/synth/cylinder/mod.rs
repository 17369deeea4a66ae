//! 驱动单元输出合成：把各动作的运行位汇总为去 / 回指令，再按驱动族输出到 IO。
//!
//! 约束：
//! - 公共段（自动 / 手动 / 强制断开 / 指令 / 输出许可）所有驱动族一致
//! - 输出地址通过 `DeviceResolver` 解析；找不到的输出只产生诊断，不产生行
//! - 速度设定字对流量阀 / 伺服 / 变频器是必需的，缺失时中止该驱动单元

pub mod builder;
mod drive;
mod valve;

use log::debug;

use crate::application::settings::GenerationSettings;
use crate::domain::diagnostic::Diagnostic;
use crate::domain::ladder::{k, or_of_and_chains, Contact, LadderRow};
use crate::domain::model::{Cylinder, ManualControl, MnemonicType, Operation};
use crate::domain::roles::{CylinderRole, DriveClass, OperationRole, OperationTemplate, RoleBlock};

use super::{EntityScope, Halt, SynthContext};

pub use builder::{build_cylinder, build_cylinders};

/// 手动操作信号（去 / 回 / 许可）。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManualSignals {
    pub go: String,
    pub back: String,
    pub enable: String,
}

/// 手动信号解析：没有映射时全部回退为常 OFF，并给出一条非致命诊断。
///
/// 只依赖驱动单元本身，重复调用结果相同。
pub fn resolve_manual(
    cylinder: &Cylinder,
    mapping: Option<&ManualControl>,
    settings: &GenerationSettings,
) -> (ManualSignals, Option<Diagnostic>) {
    let non_blank = |value: &str| !value.trim().is_empty();
    match mapping {
        Some(m) if non_blank(&m.go) && non_blank(&m.back) && non_blank(&m.enable) => (
            ManualSignals {
                go: m.go.trim().to_string(),
                back: m.back.trim().to_string(),
                enable: m.enable.trim().to_string(),
            },
            None,
        ),
        _ => (
            ManualSignals {
                go: settings.always_off.clone(),
                back: settings.always_off.clone(),
                enable: settings.always_off.clone(),
            },
            Some(Diagnostic::warning(
                MnemonicType::Cylinder,
                cylinder.id,
                cylinder.display_name(),
                format!(
                    "manual control signals not configured, using {}",
                    settings.always_off
                ),
            )),
        ),
    }
}

/// 已分类的动作引用（只包含有已知模板且有地址分配的动作）。
#[derive(Clone, Copy)]
pub(crate) struct OperationRef<'a> {
    pub op: &'a Operation,
    pub template: OperationTemplate,
    pub block: RoleBlock<'a>,
}

#[derive(Default)]
pub(crate) struct Classified<'a> {
    pub go: Vec<OperationRef<'a>>,
    pub back: Vec<OperationRef<'a>>,
    pub off: Vec<OperationRef<'a>>,
}

impl<'a> Classified<'a> {
    fn retained(refs: &[OperationRef<'a>]) -> Vec<OperationRef<'a>> {
        refs.iter()
            .filter(|r| r.template == OperationTemplate::Retention)
            .copied()
            .collect()
    }

    pub fn retain_go(&self) -> Vec<OperationRef<'a>> {
        Self::retained(&self.go)
    }

    pub fn retain_back(&self) -> Vec<OperationRef<'a>> {
        Self::retained(&self.back)
    }

    /// 去 + 回（强制断开动作不驱动输出）。
    pub fn driving(&self) -> impl Iterator<Item = &OperationRef<'a>> {
        self.go.iter().chain(self.back.iter())
    }
}

pub(crate) struct CylinderFunction<'s, 'a> {
    ctx: &'a SynthContext<'a>,
    cylinder: &'a Cylinder,
    block: RoleBlock<'a>,
    ops: Classified<'a>,
    manual: ManualSignals,
    scope: &'s mut EntityScope,
}

impl<'s, 'a> CylinderFunction<'s, 'a> {
    pub fn new(
        ctx: &'a SynthContext<'a>,
        cylinder: &'a Cylinder,
        class: DriveClass,
        scope: &'s mut EntityScope,
    ) -> Result<Self, Halt> {
        let block = ctx.block(scope, &class.roles())?;

        let mut ops = Classified::default();
        for op in ctx.index.operations_of(cylinder.id) {
            let Some(template) = OperationTemplate::from_code(op.category_id) else {
                debug!("operation {} has unknown category, not wired to {}", op.id, cylinder.cy_num);
                continue;
            };
            let Some(op_block) = ctx.peer_block(MnemonicType::Operation, op.id) else {
                continue;
            };
            let entry = OperationRef {
                op,
                template,
                block: op_block,
            };
            if template == OperationTemplate::ExcitationOff {
                ops.off.push(entry);
                continue;
            }
            match op.go_back.as_deref().map(str::trim) {
                Some("G") => ops.go.push(entry),
                Some("B") => ops.back.push(entry),
                other => scope.warn(format!(
                    "operation {} has goBack {:?}, expected G or B; ignored",
                    op.id,
                    other.unwrap_or("")
                )),
            }
        }

        let (manual, diagnostic) = resolve_manual(
            cylinder,
            ctx.index.manual_control(cylinder.id),
            ctx.settings,
        );
        if let Some(diagnostic) = diagnostic {
            scope.warn(diagnostic.message);
        }

        Ok(Self {
            ctx,
            cylinder,
            block,
            ops,
            manual,
            scope,
        })
    }

    fn bit(&self, role: CylinderRole) -> String {
        self.block.bit(role)
    }

    fn settings(&self) -> &'a GenerationSettings {
        self.ctx.settings
    }

    /// OR-of-AND 汇总动作位，没有动作时用常 OFF，最后 `OUT target`。
    fn collect(&mut self, refs: &[OperationRef<'a>], role: OperationRole, target: CylinderRole) {
        let mut branches: Vec<Vec<Contact>> = refs.iter().map(|r| vec![r.block.contact(role)]).collect();
        if branches.is_empty() {
            branches.push(vec![Contact::no(&self.settings().always_off)]);
        }
        self.scope.extend(or_of_and_chains(&branches));
        self.scope.push(LadderRow::out(self.bit(target)));
    }

    pub fn comment(&mut self) {
        self.scope
            .push(LadderRow::comment(self.cylinder.display_name()));
    }

    /// 公共段：自动 / 手动 / 强制断开 / 去回指令 / 输出许可。
    pub fn common(&mut self) {
        self.comment();

        let go = self.ops.go.clone();
        let back = self.ops.back.clone();
        let off = self.ops.off.clone();
        self.collect(&go, OperationRole::RunEnable, CylinderRole::AutoGo);
        self.collect(&back, OperationRole::RunEnable, CylinderRole::AutoBack);

        self.scope.extend([
            LadderRow::ld(&self.manual.go),
            LadderRow::ani(&self.manual.back),
            LadderRow::out(self.bit(CylinderRole::ManualGo)),
            LadderRow::ld(&self.manual.back),
            LadderRow::ani(&self.manual.go),
            LadderRow::out(self.bit(CylinderRole::ManualBack)),
        ]);

        self.collect(&off, OperationRole::RunEnable, CylinderRole::ForcedOff);

        self.command(CylinderRole::ManualGo, CylinderRole::AutoGo, CylinderRole::GoCommand);
        self.command(CylinderRole::ManualBack, CylinderRole::AutoBack, CylinderRole::BackCommand);

        self.scope.extend([
            LadderRow::ld(self.bit(CylinderRole::GoCommand)),
            LadderRow::or(self.bit(CylinderRole::BackCommand)),
            LadderRow::out(self.bit(CylinderRole::OutputOk)),
        ]);
    }

    /// `(手动 AND 许可) OR (自动 AND 自动模式); ANI 强制断开; OUT 指令`。
    fn command(&mut self, manual: CylinderRole, auto: CylinderRole, target: CylinderRole) {
        let branches = vec![
            vec![self.block.contact(manual), Contact::no(&self.manual.enable)],
            vec![
                self.block.contact(auto),
                Contact::no(&self.settings().auto_mode_signal),
            ],
        ];
        self.scope.extend(or_of_and_chains(&branches));
        self.scope.extend([
            LadderRow::ani(self.bit(CylinderRole::ForcedOff)),
            LadderRow::out(self.bit(target)),
        ]);
    }

    /// 保持位：保持型动作的 Hold 位 OR 汇总，反向指令切断。没有保持型动作时不生成。
    pub fn retain(&mut self, refs: &[OperationRef<'a>], opposite: CylinderRole, target: CylinderRole) -> Option<CylinderRole> {
        if refs.is_empty() {
            return None;
        }
        let branches: Vec<Vec<Contact>> = refs
            .iter()
            .map(|r| vec![r.block.contact(OperationRole::Hold)])
            .collect();
        self.scope.extend(or_of_and_chains(&branches));
        self.scope.extend([
            LadderRow::ani(self.bit(opposite)),
            LadderRow::out(self.bit(target)),
        ]);
        Some(target)
    }

    /// 输出解析：`multiSensorCount = N` 时为 `<base>1..N`，否则为裸名。
    /// 每个找不到的点一条非致命诊断，`detail` 说明后果。
    pub fn outputs(&mut self, base: &str, detail: &str) -> Vec<String> {
        let points = self.ctx.resolve_points(
            base,
            self.cylinder.multi_sensor_count,
            true,
            &self.cylinder.cy_num,
            self.cylinder.id,
        );
        let mut found = Vec::new();
        for (name, address) in points {
            match address {
                Some(address) => found.push(address),
                None => self.scope.warn(format!(
                    "output {name} not found for {}{detail}",
                    self.cylinder.cy_num
                )),
            }
        }
        found
    }

    /// 单个输出点，不产生诊断。
    pub fn find_output(&self, name: &str) -> Option<String> {
        self.ctx
            .resolver
            .resolve(name, true, &self.cylinder.cy_num, self.cylinder.id)
    }

    /// 线圈段：`LD 指令; [OR 保持]; [ANI 反向指令]; [ANI 反向首个输出]; OUT 地址...`。
    pub fn coil(
        &mut self,
        command: CylinderRole,
        retain: Option<CylinderRole>,
        interlock: Option<CylinderRole>,
        opposite_output: Option<&str>,
        addresses: &[String],
    ) {
        if addresses.is_empty() {
            return;
        }
        self.scope.push(LadderRow::ld(self.bit(command)));
        if let Some(retain) = retain {
            self.scope.push(LadderRow::or(self.bit(retain)));
        }
        if let Some(interlock) = interlock {
            self.scope.push(LadderRow::ani(self.bit(interlock)));
        }
        if let Some(opposite) = opposite_output {
            self.scope.push(LadderRow::ani(opposite));
        }
        self.scope
            .extend(addresses.iter().map(|address| LadderRow::out(address.as_str())));
    }

    /// 必需的速度设定字。
    pub fn speed_device(&mut self) -> Result<String, Halt> {
        match self.ctx.index.speed_device(self.cylinder.id) {
            Some(speed) => Ok(speed.device.trim().to_string()),
            None => Err(self.scope.halt("speed device is not configured")),
        }
    }

    /// 速度 MOV：起动速度 + 各变速点速度写入 `dest`，输出许可断开时清零。
    pub fn speed_moves(&mut self, dest: &str) {
        let refs: Vec<OperationRef<'a>> = self.ops.driving().copied().collect();
        for r in &refs {
            self.step_speeds(r, dest);
        }
        self.scope.extend([
            LadderRow::ldi(self.bit(CylinderRole::OutputOk)),
            LadderRow::mov(k(0), dest),
        ]);
    }

    /// 单个动作的速度 MOV（起动速度由运行许可触发）。
    fn step_speeds(&mut self, r: &OperationRef<'a>, dest: &str) {
        if let Some(start_speed) = r.op.start_speed {
            self.scope.extend([
                LadderRow::ld(r.block.bit(OperationRole::RunEnable)),
                LadderRow::mov(k(i64::from(start_speed)), dest),
            ]);
        }
        self.step_speed_moves(r, dest);
    }

    /// 各变速点速度 MOV，缺少速度值只给诊断。
    pub fn step_speed_moves(&mut self, r: &OperationRef<'a>, dest: &str) {
        for index in 0..r.template.speed_change_count() {
            let Some(step) = OperationRole::speed_step(index) else {
                break;
            };
            match r.op.speeds.get(index) {
                Some(speed) => self.scope.extend([
                    LadderRow::ld(r.block.bit(step)),
                    LadderRow::mov(k(i64::from(*speed)), dest),
                ]),
                None => self.scope.warn(format!(
                    "operation {} has no speed value for step {}",
                    r.op.id,
                    index + 1
                )),
            }
        }
    }
}
