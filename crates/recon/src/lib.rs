//! `rostersync-recon` - roster-to-directory reconciliation engine.
//!
//! Pure engine crate: receives pre-loaded roster rows, a record store and a
//! message sink; returns counts and audit findings. No CLI or file IO.

pub mod config;
pub mod engine;
pub mod error;
pub mod model;
pub mod policy;
pub mod sanitize;
pub mod sink;
pub mod store;

pub use config::ImportConfig;
pub use engine::{audit, load_roster, run, ImportOptions};
pub use error::ReconError;
pub use model::{AccountType, AuditFinding, ImportResult, ImportSummary, MemberRecord, RosterRow};
pub use sink::{Message, MessageLog, MessageSink};
pub use store::{MemberStore, MemoryStore, StoreError, UniqueField};
