//! Run history: the append-only log of finalized run contexts and its
//! on-disk store.

mod entry;
mod report;
mod store;

pub use entry::{HistoryEntry, HistoryLog};
pub use report::{evolution_report, EVOLUTION_HEADER, FINAL_PLAYBOOK_HEADER};
pub use store::{HistoryStore, LoadedHistory};
