pub mod callback;
pub mod conflate;
pub mod dom;
pub mod extract;
pub mod fetch;
pub mod portal;
pub mod schedule;

mod import;

pub use import::{ImportConfig, Importer};

use callback::{ProgressSink, Prompter};
use fetch::Transport;

/// Run a full schedule import and serialize the result as a JSON array.
/// This is the primary entry point for eamsync-core; the result is always a
/// parseable array, even when the import fails (see [`schedule::error_entry`]).
pub fn import_schedule(
    transport: &dyn Transport,
    prompter: &dyn Prompter,
    sink: &dyn ProgressSink,
    config: ImportConfig,
) -> String {
    Importer::new(transport, prompter, sink, config).run_json()
}
