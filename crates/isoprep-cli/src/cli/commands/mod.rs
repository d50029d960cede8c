//! CLI command handlers, one per file.

mod checksum;
mod completions;
mod probe;
mod purge;
mod resolve;
mod scan;
mod verify;

pub use checksum::run_checksum;
pub use completions::{run_completions, ShellType};
pub use probe::run_probe;
pub use purge::run_purge;
pub use resolve::{run_resolve, ModeArg, ResolveArgs};
pub use scan::{run_scan, ScanArgs};
pub use verify::run_verify;
