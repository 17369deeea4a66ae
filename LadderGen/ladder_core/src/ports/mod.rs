pub mod resolver;
pub mod condition;

pub use resolver::{DeviceResolver, IoSelector, SelectionRequest};
pub use condition::ConditionLookup;
