//! 工程 / 工程明细合成。
//!
//! 说明：
//! - 工程：开始 / 运行 / 结束三位，模板决定运行位的保持方式
//! - 明细：由所属工程的运行位使能，完成条件取自关联动作的稳定门
//! - 条件表中找不到的明细 id 直接跳过（只记 debug 日志）
//! - 所属工程不存在的明细排在最后，逐条报致命诊断

use log::debug;

use crate::domain::ladder::{k, or_of_and_chains, timer_device, Contact, LadderRow};
use crate::domain::model::{ConditionKind, MnemonicType, Process, ProcessDetail, TimerCategory};
use crate::domain::roles::{detail_roles, DetailRole, OperationRole, OperationTemplate, ProcessRole, ProcessTemplate, RoleBlock};

use super::index::TimerLookup;
use super::{EntityScope, Halt, SynthContext, Synthesis};

/// 工程段与明细段分开输出（两个程序段）。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessSynthesis {
    pub processes: Synthesis,
    pub details: Synthesis,
}

pub fn build_processes(ctx: &SynthContext<'_>) -> ProcessSynthesis {
    let mut out = ProcessSynthesis::default();
    for process in ctx.index.sorted_processes() {
        out.processes.merge(build_process(ctx, process));
        for detail in ctx.index.details_of_process(process.id) {
            out.details.merge(build_detail(ctx, detail));
        }
    }
    for detail in ctx.index.orphan_details() {
        out.details.merge(build_detail(ctx, detail));
    }
    debug!(
        "process synthesizer: {} process rows, {} detail rows",
        out.processes.rows.len(),
        out.details.rows.len()
    );
    out
}

/// 条件 id -> 明细块；找不到明细或没有地址分配的 id 跳过。
fn condition_blocks<'a>(
    ctx: &'a SynthContext<'a>,
    kind: ConditionKind,
    owner_type: MnemonicType,
    owner_id: i32,
) -> Vec<RoleBlock<'a>> {
    ctx.conditions
        .condition_ids(kind, owner_type, owner_id)
        .into_iter()
        .filter_map(|id| {
            let block = ctx
                .index
                .detail(id)
                .and_then(|detail| ctx.peer_block(MnemonicType::ProcessDetail, detail.id));
            if block.is_none() {
                debug!("{kind:?} condition {id} of {} {owner_id} not resolvable, skipped", owner_type.name());
            }
            block
        })
        .collect()
}

pub fn build_process<'a>(ctx: &'a SynthContext<'a>, process: &'a Process) -> Synthesis {
    let mut scope = EntityScope::new(MnemonicType::Process, process.id, process.name.clone());
    match ProcessTemplate::from_code(process.category_id) {
        Some(template) => {
            let _ = synthesize_process(ctx, process, template, &mut scope);
        }
        None => {
            scope.halt(format!("unknown process categoryId {}", process.category_id));
        }
    }
    scope.finish()
}

fn synthesize_process<'a>(
    ctx: &'a SynthContext<'a>,
    process: &'a Process,
    template: ProcessTemplate,
    scope: &mut EntityScope,
) -> Result<(), Halt> {
    let block = ctx.block(scope, &template.roles())?;
    let settings = ctx.settings;
    let start = block.bit(ProcessRole::Start);
    let running = block.bit(ProcessRole::Running);
    let finished = block.bit(ProcessRole::Finished);

    scope.push(LadderRow::comment(process.name.clone()));

    // 开始：前置明细完成（条件分支为“任一”），或测试模式下的调试起动
    let starts = condition_blocks(ctx, ConditionKind::Start, MnemonicType::Process, process.id);
    let mut branches: Vec<Vec<Contact>> = if starts.is_empty() {
        vec![vec![Contact::no(&settings.always_on)]]
    } else if template == ProcessTemplate::ConditionalBranch {
        starts
            .iter()
            .map(|b| vec![b.contact(DetailRole::Complete)])
            .collect()
    } else {
        vec![starts.iter().map(|b| b.contact(DetailRole::Complete)).collect()]
    };
    branches.push(vec![
        Contact::no(&settings.test_mode_signal),
        Contact::no(&settings.debug_start_signal),
    ]);
    scope.extend(or_of_and_chains(&branches));
    scope.push(LadderRow::out(&start));

    match template {
        ProcessTemplate::Normal | ProcessTemplate::ConditionalBranch => {
            scope.extend(self_latch(&start, &running, &finished));
        }
        ProcessTemplate::ResetAfter => scope.extend([
            LadderRow::ld(&start),
            LadderRow::set(&running),
            LadderRow::ld(&finished),
            LadderRow::or(&settings.reset_signal),
            LadderRow::rst(&running),
        ]),
        ProcessTemplate::SubProcess => scope.extend(self_latch(&start, &running, &settings.reset_signal)),
        ProcessTemplate::InterlockWait => match ctx.timer(scope, TimerCategory::StartWait) {
            TimerLookup::Found(timer) => {
                let device = timer_device(timer.timer_num);
                scope.extend([
                    LadderRow::ld(&start),
                    LadderRow::out_timer(&device, k(i64::from(timer.preset))),
                ]);
                scope.extend(self_latch(&device, &running, &finished));
            }
            TimerLookup::Missing => {
                scope.warn("interlock wait timer not configured, running without wait");
                scope.extend(self_latch(&start, &running, &finished));
            }
            TimerLookup::Duplicate(n) => {
                scope.warn(format!("{n} interlock wait timers configured, running without wait"));
                scope.extend(self_latch(&start, &running, &finished));
            }
        },
    }

    // 结束：条件表优先，没有配置时取本工程全部明细
    let mut finishes = condition_blocks(ctx, ConditionKind::Finish, MnemonicType::Process, process.id);
    if finishes.is_empty() {
        finishes = ctx
            .index
            .details_of_process(process.id)
            .into_iter()
            .filter_map(|d| ctx.peer_block(MnemonicType::ProcessDetail, d.id))
            .collect();
    }
    scope.push(LadderRow::ld(&running));
    scope.extend(finishes.iter().map(|b| b.contact(DetailRole::Complete).and()));
    scope.extend([
        LadderRow::or(&finished),
        LadderRow::ani(&settings.reset_signal),
        LadderRow::out(&finished),
    ]);

    if let Some(block_number) = process.block_number {
        scope.extend([
            LadderRow::ld(&running),
            LadderRow::cj(settings.jump_pointer(block_number)),
        ]);
    }
    Ok(())
}

/// `LD src; OR 自身; ANI 断开; OUT 自身`。
fn self_latch(source: &str, target: &str, breaker: &str) -> [LadderRow; 4] {
    [
        LadderRow::ld(source),
        LadderRow::or(target),
        LadderRow::ani(breaker),
        LadderRow::out(target),
    ]
}

pub fn build_detail<'a>(ctx: &'a SynthContext<'a>, detail: &'a ProcessDetail) -> Synthesis {
    let mut scope = EntityScope::new(MnemonicType::ProcessDetail, detail.id, detail.name.clone());
    let _ = synthesize_detail(ctx, detail, &mut scope);
    scope.finish()
}

fn synthesize_detail<'a>(
    ctx: &'a SynthContext<'a>,
    detail: &'a ProcessDetail,
    scope: &mut EntityScope,
) -> Result<(), Halt> {
    if !ctx.index.has_process(detail.process_id) {
        return Err(scope.halt(format!("owning process {} not found", detail.process_id)));
    }
    let block = ctx.block(scope, &detail_roles())?;
    let Some(process) = ctx.peer_block(MnemonicType::Process, detail.process_id) else {
        return Err(scope.halt(format!(
            "owning process {} has no device allocation",
            detail.process_id
        )));
    };
    let process_running = process.bit(ProcessRole::Running);
    let start = block.bit(DetailRole::Start);
    let running = block.bit(DetailRole::Running);
    let complete = block.bit(DetailRole::Complete);

    scope.push(LadderRow::comment(detail.name.clone()));

    let predecessors = condition_blocks(ctx, ConditionKind::Start, MnemonicType::ProcessDetail, detail.id);
    scope.push(LadderRow::ld(&process_running));
    scope.extend(predecessors.iter().map(|b| b.contact(DetailRole::Complete).and()));
    scope.push(LadderRow::out(&start));

    scope.extend([
        LadderRow::ld(&start),
        LadderRow::or(&running),
        LadderRow::ani(&complete),
        LadderRow::and(&process_running),
        LadderRow::out(&running),
    ]);

    scope.push(LadderRow::ld(&running));
    if let Some(stable) = operation_stable_gate(ctx, detail, scope) {
        scope.push(LadderRow::and(stable));
    }
    scope.extend([
        LadderRow::or(&complete),
        LadderRow::and(&process_running),
        LadderRow::out(&complete),
    ]);
    Ok(())
}

/// 关联动作的稳定门位；动作缺失时给出非致命诊断。
fn operation_stable_gate(ctx: &SynthContext<'_>, detail: &ProcessDetail, scope: &mut EntityScope) -> Option<String> {
    let operation_id = detail.operation_id?;
    let Some(op) = ctx.index.operation(operation_id) else {
        scope.warn(format!("operation {operation_id} not found, completion not gated"));
        return None;
    };
    OperationTemplate::from_code(op.category_id)?;
    let block = ctx.peer_block(MnemonicType::Operation, op.id)?;
    Some(block.bit(OperationRole::StableGate))
}
