//! 电机 / 伺服 / 变频器。

use log::debug;

use crate::domain::ladder::{k, offset_device, or_of_and_chains, timer_device, Contact, LadderRow};
use crate::domain::model::TimerCategory;
use crate::domain::roles::{CylinderRole, OperationRole, OperationTemplate};
use crate::synth::index::TimerLookup;
use crate::synth::Halt;

use super::{CylinderFunction, OperationRef};

const FORWARD_OUTPUT: &str = "G";
const REVERSE_OUTPUT: &str = "B";
const SERVO_START_OUTPUT: &str = "PST";
const BRAKE_OUTPUT: &str = "BRK";
const JOG_FORWARD_OUTPUT: &str = "JOG+";
const JOG_REVERSE_OUTPUT: &str = "JOG-";

/// 正转 / 反转：`LD 指令; ANI 反向指令; OUT`。反转只在有回动作时才要求存在。
fn forward_reverse(f: &mut CylinderFunction<'_, '_>) {
    let forward = f.outputs(FORWARD_OUTPUT, ", forward output skipped");
    let reverse: Vec<String> = if f.ops.back.is_empty() {
        f.find_output(REVERSE_OUTPUT).into_iter().collect()
    } else {
        f.outputs(REVERSE_OUTPUT, ", reverse output skipped")
    };
    f.coil(
        CylinderRole::GoCommand,
        None,
        Some(CylinderRole::BackCommand),
        None,
        &forward,
    );
    f.coil(
        CylinderRole::BackCommand,
        None,
        Some(CylinderRole::GoCommand),
        None,
        &reverse,
    );
}

pub(super) fn motor(f: &mut CylinderFunction<'_, '_>) -> Result<(), Halt> {
    f.common();
    forward_reverse(f);
    Ok(())
}

/// 伺服：位置字 `D`，速度字 `D+1`。
pub(super) fn servo(f: &mut CylinderFunction<'_, '_>) -> Result<(), Halt> {
    let position_word = f.speed_device()?;
    f.common();

    let positioning: Vec<OperationRef<'_>> = f
        .ops
        .driving()
        .filter(|r| matches!(r.template, OperationTemplate::Positioning(_)))
        .copied()
        .collect();

    let mut branches: Vec<Vec<Contact>> = positioning
        .iter()
        .map(|r| vec![r.block.contact(OperationRole::PositioningStart)])
        .collect();
    if branches.is_empty() {
        branches.push(vec![Contact::no(&f.settings().always_off)]);
    }
    f.scope.extend(or_of_and_chains(&branches));
    f.scope.push(LadderRow::out(f.bit(CylinderRole::ServoStart)));

    let speed_word = offset_device(&position_word, 1);
    if speed_word.is_none() {
        f.scope.warn(format!(
            "speed device {position_word} is not a word device, servo speeds skipped"
        ));
    }
    for r in &positioning {
        match r.op.position {
            Some(position) => f.scope.extend([
                LadderRow::ld(r.block.bit(OperationRole::PositioningStart)),
                LadderRow::mov(k(i64::from(position)), &position_word),
            ]),
            None => f
                .scope
                .warn(format!("positioning operation {} has no target position", r.op.id)),
        }
        if let Some(speed_word) = &speed_word {
            f.step_speeds(r, speed_word);
        }
    }

    let start = f.outputs(SERVO_START_OUTPUT, ", servo start output skipped");
    f.coil(CylinderRole::ServoStart, None, None, None, &start);

    f.scope.extend([
        LadderRow::ld(f.bit(CylinderRole::OutputOk)),
        LadderRow::or(f.bit(CylinderRole::ManualGo)),
        LadderRow::or(f.bit(CylinderRole::ManualBack)),
        LadderRow::out(f.bit(CylinderRole::BrakeRelease)),
    ]);
    let brake = f.outputs(BRAKE_OUTPUT, ", brake output skipped");
    f.coil(CylinderRole::BrakeRelease, None, None, None, &brake);

    for (name, role) in [
        (JOG_FORWARD_OUTPUT, CylinderRole::ManualGo),
        (JOG_REVERSE_OUTPUT, CylinderRole::ManualBack),
    ] {
        match f.find_output(name) {
            Some(address) => f.scope.extend([
                LadderRow::ld(f.bit(role)),
                LadderRow::and(&f.manual.enable),
                LadderRow::out(address),
            ]),
            None => debug!("{} has no {name} output", f.cylinder.cy_num),
        }
    }
    Ok(())
}

pub(super) fn inverter(f: &mut CylinderFunction<'_, '_>) -> Result<(), Halt> {
    let dest = f.speed_device()?;
    f.common();
    forward_reverse(f);
    f.speed_moves(&dest);

    let timer = match f.ctx.timer(f.scope, TimerCategory::ForcedDeceleration) {
        TimerLookup::Found(timer) => timer,
        TimerLookup::Missing => {
            f.scope
                .warn("forced deceleration timer not configured, deceleration skipped");
            return Ok(());
        }
        TimerLookup::Duplicate(n) => {
            f.scope.warn(format!(
                "{n} forced deceleration timers configured, deceleration skipped"
            ));
            return Ok(());
        }
    };
    let device = timer_device(timer.timer_num);
    let decelerate = f.bit(CylinderRole::Decelerate);
    f.scope.extend([
        LadderRow::ld(f.bit(CylinderRole::ForcedOff)),
        LadderRow::or(&f.settings().pause_signal),
        LadderRow::out_timer(&device, k(i64::from(timer.preset))),
        LadderRow::ani(&device),
        LadderRow::out(&decelerate),
        LadderRow::ld(&decelerate),
        LadderRow::mov(k(0), &dest),
    ]);
    Ok(())
}
