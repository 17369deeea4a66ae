pub mod io_table;
pub mod condition_table;
pub mod snapshot;
pub mod csv_export;

pub use io_table::{DeclineSelection, FirstCandidate, IoTable};
pub use condition_table::ConditionTable;
pub use snapshot::{load_snapshot, SnapshotError};
pub use csv_export::{export_program, ExportError, ExportOutcome};
