use log::debug;

use crate::domain::model::{Cylinder, MnemonicType};
use crate::domain::roles::DriveClass;
use crate::synth::{EntityScope, Halt, SynthContext, Synthesis};

use super::{drive, valve, CylinderFunction};

/// 全部驱动单元（按 sortNumber, id）。
pub fn build_cylinders(ctx: &SynthContext<'_>) -> Synthesis {
    let mut out = Synthesis::default();
    for cylinder in ctx.index.sorted_cylinders() {
        out.merge(build_cylinder(ctx, cylinder));
    }
    debug!(
        "cylinder synthesizer: {} rows, {} diagnostics",
        out.rows.len(),
        out.diagnostics.len()
    );
    out
}

pub fn build_cylinder<'a>(ctx: &'a SynthContext<'a>, cylinder: &'a Cylinder) -> Synthesis {
    let mut scope = EntityScope::new(MnemonicType::Cylinder, cylinder.id, cylinder.display_name());
    match DriveClass::from_code(cylinder.drive_sub_id) {
        Some(class) => {
            let _ = synthesize(ctx, cylinder, class, &mut scope);
        }
        None => {
            scope.halt(format!("unknown driveSubId {}", cylinder.drive_sub_id));
        }
    }
    scope.finish()
}

fn synthesize<'a>(
    ctx: &'a SynthContext<'a>,
    cylinder: &'a Cylinder,
    class: DriveClass,
    scope: &mut EntityScope,
) -> Result<(), Halt> {
    let mut f = CylinderFunction::new(ctx, cylinder, class, scope)?;
    match class {
        DriveClass::SingleValve => valve::single_valve(&mut f),
        DriveClass::DoubleValve => valve::double_valve(&mut f),
        DriveClass::FlowValve => valve::flow_valve(&mut f),
        DriveClass::Motor => drive::motor(&mut f),
        DriveClass::Servo => drive::servo(&mut f),
        DriveClass::Inverter => drive::inverter(&mut f),
    }
}
