//! 动作时序合成：每个动作一个 20 位块，按角色逐段生成。
//!
//! 说明：
//! - 每个 `OperationFunction` 方法只负责一个角色位的一段梯形图
//! - 段与段之间通过角色名引用，不出现字面偏移
//! - 模板（励磁 / 保持 / 变速 / 定位）只决定调用哪些段及顺序，见 `builder`

pub mod builder;

use crate::domain::ladder::{k, or_of_and_chains, timer_device, Contact, LadderRow};
use crate::domain::model::{MnemonicType, Operation, Timer, TimerCategory};
use crate::domain::roles::{DetailRole, OperationRole, OperationTemplate, RoleBlock};

use super::index::TimerLookup;
use super::{configured, EntityScope, Halt, SynthContext};

pub use builder::{build_operation, build_operations};

pub(crate) struct OperationFunction<'s, 'a> {
    ctx: &'a SynthContext<'a>,
    op: &'a Operation,
    template: OperationTemplate,
    block: RoleBlock<'a>,
    /// IO 作用域：所属驱动单元的显示编号
    scope_name: String,
    scope: &'s mut EntityScope,
    /// 上一个已生成的确认位（开始确认 / 变速点），后续段从它接续
    previous: OperationRole,
}

fn timer_rows(timer: &Timer, source: &str, target: &str) -> Vec<LadderRow> {
    let device = timer_device(timer.timer_num);
    vec![
        LadderRow::ld(source),
        LadderRow::out_timer(&device, k(i64::from(timer.preset))),
        LadderRow::ld(&device),
        LadderRow::out(target),
    ]
}

impl<'s, 'a> OperationFunction<'s, 'a> {
    pub fn new(
        ctx: &'a SynthContext<'a>,
        op: &'a Operation,
        template: OperationTemplate,
        scope: &'s mut EntityScope,
    ) -> Result<Self, Halt> {
        let block = ctx.block(scope, &template.roles())?;
        let scope_name = match ctx.index.cylinder(op.cylinder_id) {
            Some(cylinder) => cylinder.cy_num.clone(),
            None => {
                scope.warn(format!(
                    "cylinder {} not found, sensors resolve against shared IO only",
                    op.cylinder_id
                ));
                String::new()
            }
        };
        Ok(Self {
            ctx,
            op,
            template,
            block,
            scope_name,
            scope,
            previous: OperationRole::StartConfirmed,
        })
    }

    fn bit(&self, role: OperationRole) -> String {
        self.block.bit(role)
    }

    fn sensors(&mut self, name: &str, count: Option<u32>) -> Vec<Contact> {
        let scope_name = self.scope_name.clone();
        self.ctx.sensor_contacts(self.scope, name, count, &scope_name)
    }

    fn timer(&self, category: TimerCategory) -> TimerLookup<'a> {
        self.ctx.timer(self.scope, category)
    }

    /// 可选定时器段：有定时器则延时，没有或重复则直通。
    fn optional_delay(&mut self, category: TimerCategory, source: &str, target: OperationRole) {
        let target = self.bit(target);
        match self.timer(category) {
            TimerLookup::Found(timer) => self.scope.extend(timer_rows(timer, source, &target)),
            TimerLookup::Missing => {
                self.scope.extend([LadderRow::ld(source), LadderRow::out(target)]);
            }
            TimerLookup::Duplicate(n) => {
                self.scope
                    .warn(format!("{n} {category:?} timers configured, delay skipped"));
                self.scope.extend([LadderRow::ld(source), LadderRow::out(target)]);
            }
        }
    }

    /// 自保持：`LD src; AND 条件...; OR 自身; AND 复位门; OUT 自身`。
    fn latch(&mut self, source: OperationRole, conditions: &[Contact], target: OperationRole) {
        let target_bit = self.bit(target);
        let gate = self.bit(OperationRole::ResetGate);
        self.scope.push(LadderRow::ld(self.bit(source)));
        self.scope.extend(conditions.iter().map(Contact::and));
        self.scope.extend([
            LadderRow::or(&target_bit),
            LadderRow::and(gate),
            LadderRow::out(target_bit),
        ]);
    }

    pub fn comment(&mut self) {
        let owner = self
            .ctx
            .index
            .cylinder(self.op.cylinder_id)
            .map(|c| c.display_name())
            .unwrap_or_default();
        let text = format!("{} {}", owner, self.op.name).trim().to_string();
        self.scope.push(LadderRow::comment(text));
    }

    /// 复位门：所属工程明细运行中且未完成（任一明细），且未按复位。
    pub fn reset_gate(&mut self) {
        let mut branches = Vec::new();
        for detail in self.ctx.index.details_of_operation(self.op.id) {
            match self.ctx.peer_block(MnemonicType::ProcessDetail, detail.id) {
                Some(block) => branches.push(vec![
                    block.contact(DetailRole::Running),
                    block.not(DetailRole::Complete),
                ]),
                None => self.scope.warn(format!(
                    "process detail {} has no device allocation, branch skipped",
                    detail.id
                )),
            }
        }
        if branches.is_empty() {
            branches.push(vec![Contact::no(&self.ctx.settings.always_off)]);
        }
        self.scope.extend(or_of_and_chains(&branches));
        self.scope
            .push(LadderRow::ani(&self.ctx.settings.reset_signal));
        self.scope.push(LadderRow::out(self.bit(OperationRole::ResetGate)));
    }

    pub fn hold(&mut self) {
        let hold = self.bit(OperationRole::Hold);
        self.scope.extend([
            LadderRow::ld(self.bit(OperationRole::StartConfirmed)),
            LadderRow::or(&hold),
            LadderRow::ani(&self.ctx.settings.reset_signal),
            LadderRow::out(hold),
        ]);
    }

    pub fn start_latch(&mut self) {
        let interlock = match configured(&self.op.con).map(str::to_string) {
            Some(con) => self.sensors(&con, None),
            None => Vec::new(),
        };
        let gate = self.bit(OperationRole::ResetGate);
        let latch = self.bit(OperationRole::StartLatch);
        self.scope.push(LadderRow::ld(&gate));
        self.scope
            .push(LadderRow::ani(&self.ctx.settings.pause_signal));
        self.scope.extend(interlock.iter().map(Contact::and));
        self.scope.extend([
            LadderRow::or(&latch),
            LadderRow::and(gate),
            LadderRow::out(latch),
        ]);
    }

    pub fn positioning_start(&mut self) {
        self.scope.extend([
            LadderRow::ld(self.bit(OperationRole::RunEnable)),
            LadderRow::pls(self.bit(OperationRole::PositioningStart)),
        ]);
    }

    pub fn run_enable(&mut self) {
        self.scope.push(LadderRow::ld(self.bit(OperationRole::StartLatch)));
        if self.template == OperationTemplate::Retention {
            self.scope.push(LadderRow::or(self.bit(OperationRole::Hold)));
        }
        if self.template.stops_at_finish() {
            self.scope
                .push(LadderRow::ani(self.bit(OperationRole::FinishDetected)));
        }
        self.scope.push(LadderRow::out(self.bit(OperationRole::RunEnable)));
    }

    pub fn start_delay(&mut self) {
        let source = self.bit(OperationRole::RunEnable);
        self.optional_delay(TimerCategory::StartWait, &source, OperationRole::StartDelay);
    }

    pub fn start_confirmed(&mut self) -> Result<(), Halt> {
        let Some(start) = configured(&self.op.start).map(str::to_string) else {
            return Err(self.scope.halt("start sensor is not configured"));
        };
        let contacts = self.sensors(&start, self.op.sensor_count);
        self.latch(OperationRole::StartDelay, &contacts, OperationRole::StartConfirmed);
        self.previous = OperationRole::StartConfirmed;
        Ok(())
    }

    pub fn positioning_busy(&mut self) {
        let busy = self.bit(OperationRole::PositioningBusy);
        self.scope.extend([
            LadderRow::ld(self.bit(OperationRole::PositioningStart)),
            LadderRow::or(&busy),
            LadderRow::ani(self.bit(OperationRole::FinishDetected)),
            LadderRow::and(self.bit(OperationRole::ResetGate)),
            LadderRow::out(busy),
        ]);
    }

    /// 第 `index` 个变速点（0 起）：变速传感器 + 变速定时器都必须存在。
    pub fn speed_step(&mut self, index: usize) -> Result<(), Halt> {
        let (Some(role), Some(category)) =
            (OperationRole::speed_step(index), TimerCategory::speed_change(index))
        else {
            return Ok(());
        };
        let step = index + 1;

        let Some(sensor) = self
            .op
            .speed_sensors
            .get(index)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
        else {
            return Err(self
                .scope
                .halt(format!("speed change sensor {step} is not configured")));
        };
        let timer = match self.timer(category) {
            TimerLookup::Found(timer) => timer,
            TimerLookup::Missing => {
                return Err(self
                    .scope
                    .halt(format!("speed change timer {step} is not configured")));
            }
            TimerLookup::Duplicate(n) => {
                self.scope.warn(format!(
                    "{n} speed change timers configured for step {step}, step skipped"
                ));
                return Ok(());
            }
        };

        let contacts = self.sensors(&sensor, None);
        let device = timer_device(timer.timer_num);
        let target = self.bit(role);
        self.scope.push(LadderRow::ld(self.bit(self.previous)));
        self.scope.extend(contacts.iter().map(Contact::and));
        self.scope.extend([
            LadderRow::out_timer(&device, k(i64::from(timer.preset))),
            LadderRow::ld(&device),
            LadderRow::or(&target),
            LadderRow::and(self.bit(OperationRole::ResetGate)),
            LadderRow::out(target),
        ]);
        self.previous = role;
        Ok(())
    }

    pub fn finish_detected(&mut self) -> Result<(), Halt> {
        let Some(finish) = configured(&self.op.finish).map(str::to_string) else {
            return Err(self.scope.halt("finish sensor is not configured"));
        };
        let contacts = self.sensors(&finish, self.op.sensor_count);
        self.latch(self.previous, &contacts, OperationRole::FinishDetected);
        Ok(())
    }

    /// 深入到位（可选）+ 稳定门。
    pub fn settle(&mut self) {
        let mut source = OperationRole::FinishDetected;
        match self.timer(TimerCategory::DeepSeat) {
            TimerLookup::Found(timer) => {
                let rows = timer_rows(
                    timer,
                    &self.bit(OperationRole::FinishDetected),
                    &self.bit(OperationRole::DeepSeat),
                );
                self.scope.extend(rows);
                source = OperationRole::DeepSeat;
            }
            TimerLookup::Missing => {}
            TimerLookup::Duplicate(n) => self
                .scope
                .warn(format!("{n} DeepSeat timers configured, deep seat skipped")),
        }
        let source = self.bit(source);
        self.optional_delay(TimerCategory::Stable, &source, OperationRole::StableGate);
    }

    pub fn completion(&mut self) {
        self.scope.extend([
            LadderRow::ld(self.bit(OperationRole::StableGate)),
            LadderRow::pls(self.bit(OperationRole::Completion)),
        ]);
    }
}
