pub mod model;
pub mod ladder;
pub mod roles;
pub mod diagnostic;
pub mod program;
