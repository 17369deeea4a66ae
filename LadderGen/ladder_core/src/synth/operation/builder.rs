use log::debug;

use crate::domain::model::{MnemonicType, Operation};
use crate::domain::roles::OperationTemplate;
use crate::synth::{EntityScope, Halt, SynthContext, Synthesis};

use super::OperationFunction;

/// 全部动作（按 sortNumber, id）。
pub fn build_operations(ctx: &SynthContext<'_>) -> Synthesis {
    let mut out = Synthesis::default();
    for op in ctx.index.sorted_operations() {
        out.merge(build_operation(ctx, op));
    }
    debug!(
        "operation sequencer: {} rows, {} diagnostics",
        out.rows.len(),
        out.diagnostics.len()
    );
    out
}

pub fn build_operation<'a>(ctx: &'a SynthContext<'a>, op: &'a Operation) -> Synthesis {
    let mut scope = EntityScope::new(MnemonicType::Operation, op.id, op.name.clone());
    match OperationTemplate::from_code(op.category_id) {
        Some(template) => {
            // Halt 已记录致命诊断，这里只需停止
            let _ = synthesize(ctx, op, template, &mut scope);
        }
        None => {
            scope.halt(format!("unknown operation categoryId {}", op.category_id));
        }
    }
    scope.finish()
}

fn synthesize<'a>(
    ctx: &'a SynthContext<'a>,
    op: &'a Operation,
    template: OperationTemplate,
    scope: &mut EntityScope,
) -> Result<(), Halt> {
    let mut f = OperationFunction::new(ctx, op, template, scope)?;
    match template {
        OperationTemplate::Excitation | OperationTemplate::ExcitationOff => excitation(&mut f),
        OperationTemplate::Retention => retention(&mut f),
        OperationTemplate::SpeedChange(n) => speed_change(&mut f, usize::from(n)),
        OperationTemplate::Positioning(n) => positioning(&mut f, usize::from(n)),
    }
}

fn excitation(f: &mut OperationFunction<'_, '_>) -> Result<(), Halt> {
    f.comment();
    f.reset_gate();
    f.start_latch();
    f.run_enable();
    f.start_delay();
    f.start_confirmed()?;
    f.finish_detected()?;
    f.settle();
    f.completion();
    Ok(())
}

fn retention(f: &mut OperationFunction<'_, '_>) -> Result<(), Halt> {
    f.comment();
    f.reset_gate();
    f.hold();
    f.start_latch();
    f.run_enable();
    f.start_delay();
    f.start_confirmed()?;
    f.finish_detected()?;
    f.settle();
    f.completion();
    Ok(())
}

fn speed_change(f: &mut OperationFunction<'_, '_>, steps: usize) -> Result<(), Halt> {
    f.comment();
    f.reset_gate();
    f.start_latch();
    f.run_enable();
    f.start_delay();
    f.start_confirmed()?;
    for index in 0..steps {
        f.speed_step(index)?;
    }
    f.finish_detected()?;
    f.settle();
    f.completion();
    Ok(())
}

fn positioning(f: &mut OperationFunction<'_, '_>, steps: usize) -> Result<(), Halt> {
    f.comment();
    f.reset_gate();
    f.start_latch();
    f.positioning_start();
    f.run_enable();
    f.start_delay();
    f.start_confirmed()?;
    f.positioning_busy();
    for index in 0..steps {
        f.speed_step(index)?;
    }
    f.finish_detected()?;
    f.settle();
    f.completion();
    Ok(())
}
