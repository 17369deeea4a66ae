pub mod conformance;
pub mod service;
pub mod settings;
