//! Command-line parsing and dispatch.

mod args;
mod run;

pub use args::{Cli, Command, CreateArgs, DeleteArgs, HostArgs, ListArgs, StartArgs, VmCommand};
pub use run::run;
