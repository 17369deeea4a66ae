//! 电磁阀族：单电控 / 双电控 / 比例流量阀。

use crate::domain::roles::CylinderRole;
use crate::synth::Halt;

use super::CylinderFunction;

const GO_OUTPUT: &str = "G";
const BACK_OUTPUT: &str = "B";

pub(super) fn single_valve(f: &mut CylinderFunction<'_, '_>) -> Result<(), Halt> {
    f.common();
    let retain_go = f.ops.retain_go();
    let retain = f.retain(&retain_go, CylinderRole::BackCommand, CylinderRole::RetainGo);
    let outputs = f.outputs(GO_OUTPUT, ", valve block skipped");
    f.coil(CylinderRole::GoCommand, retain, None, None, &outputs);
    Ok(())
}

/// 双电控线圈：去 / 回两组，各自带保持位并互锁对侧。
fn double_coils(f: &mut CylinderFunction<'_, '_>) {
    let retain_go = f.ops.retain_go();
    let retain_back = f.ops.retain_back();
    let retain_go = f.retain(&retain_go, CylinderRole::BackCommand, CylinderRole::RetainGo);
    let retain_back = f.retain(&retain_back, CylinderRole::GoCommand, CylinderRole::RetainBack);

    let go = f.outputs(GO_OUTPUT, ", go coil will never energise");
    let back = f.outputs(BACK_OUTPUT, ", back coil will never energise");
    f.coil(
        CylinderRole::GoCommand,
        retain_go,
        Some(CylinderRole::BackCommand),
        back.first().map(String::as_str),
        &go,
    );
    f.coil(
        CylinderRole::BackCommand,
        retain_back,
        Some(CylinderRole::GoCommand),
        go.first().map(String::as_str),
        &back,
    );
}

pub(super) fn double_valve(f: &mut CylinderFunction<'_, '_>) -> Result<(), Halt> {
    f.common();
    double_coils(f);
    Ok(())
}

pub(super) fn flow_valve(f: &mut CylinderFunction<'_, '_>) -> Result<(), Halt> {
    let dest = f.speed_device()?;
    f.common();
    double_coils(f);
    f.speed_moves(&dest);
    Ok(())
}
