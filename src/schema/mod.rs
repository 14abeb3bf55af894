//! Schema module - configuration, identities and reporting types.

mod config;
mod objective;
mod snapshot;

pub use config::*;
pub use objective::*;
pub use snapshot::*;
