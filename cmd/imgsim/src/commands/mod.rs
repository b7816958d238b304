//! CLI commands module.

mod build;
mod query;
mod serve;
mod util;

pub use build::BuildCommand;
pub use query::QueryCommand;
pub use serve::ServeCommand;

pub(crate) use util::*;
