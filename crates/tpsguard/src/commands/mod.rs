//! Command handlers: bridge CLI args to core operations and output formatting.

pub mod config_cmd;
pub mod incidents;
pub mod mitigate;
pub mod run;
pub mod system;
pub mod templates;
pub mod zones;
