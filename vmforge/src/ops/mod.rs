//! VM management operations: delete, list, start.
//!
//! Each operation resolves names against `list_all` and warns about names
//! that matched nothing rather than failing the whole run. Confirmation
//! prompts are injected as closures so tests can script them.

mod delete;
mod list;
mod start;

pub use delete::{delete_vms, DeleteOptions, DEFAULT_SHUTDOWN_TIMEOUT};
pub use list::{list_vms, list_vms_json, render_table};
pub use start::start_vms;

/// Asks the operator to confirm an action on one VM.
pub type ConfirmFn<'a> = &'a (dyn Fn(&str) -> bool + Sync);
