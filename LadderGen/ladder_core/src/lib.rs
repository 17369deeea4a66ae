//! Ladder instruction-list synthesis crate.
//! Responsibilities: compile a cylinder/operation/process snapshot into an ordered,
//! addressable instruction stream plus structured diagnostics.
//! Non-goals: persistence, address allocation, interactive UI (handled by upper layers).

pub mod domain;
pub mod ports;
pub mod synth;
pub mod adapters;
pub mod application;

pub use domain::diagnostic::Diagnostic;
pub use domain::ladder::{Command, LadderRow};
pub use domain::model::ProjectSnapshot;
pub use domain::program::{LadderProgram, SectionKind};
pub use application::service::{GenerationOutput, LadderService};
pub use application::settings::GenerationSettings;
pub use ports::{ConditionLookup, DeviceResolver, IoSelector};
pub use adapters::{ConditionTable, IoTable};
