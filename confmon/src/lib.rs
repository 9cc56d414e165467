//! # confmon
//!
//! Running-configuration archiver for network devices.
//!
//! confmon logs into every device of an inventory over SSH or Telnet,
//! captures its running configuration, and compares it with the snapshot
//! kept in a git work tree. Changed snapshots are committed together in one
//! commit and pushed once per run.
//!
//! ## Features
//!
//! - Async SSH (russh) and Telnet transports
//! - Cisco IOS, IOS-XR and NX-OS dialects plus a generic fallback
//! - Tail-search prompt matching with ANSI escape stripping
//! - Per-device failure isolation; one bad device never stops the run
//! - Volatile-line aware diffing (timestamps, byte counts)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use confmon::{
//!     DialectSessionFactory, DialectTable, FleetOrchestrator, GitRepository, InventorySource,
//!     LineDiffer, SessionConfig,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), confmon::Error> {
//!     let source: InventorySource = "fleet.yml".parse().unwrap();
//!     let inventory = confmon::inventory::load(&source).await?;
//!
//!     let factory = DialectSessionFactory::new(DialectTable::builtin()?, SessionConfig::default());
//!     let differ = LineDiffer::standard().unwrap();
//!     let mut repository = GitRepository::new(&inventory.archive_root);
//!
//!     let summary = FleetOrchestrator::from_inventory(&inventory)
//!         .run(&factory, &differ, &mut repository)
//!         .await?;
//!     println!("{} devices changed", summary.changed().count());
//!     Ok(())
//! }
//! ```

pub mod archive;
pub mod channel;
pub mod device;
pub mod dialect;
pub mod differ;
pub mod error;
pub mod fleet;
pub mod inventory;
pub mod repository;
pub mod session;
pub mod transport;

// Re-export main types for convenience
pub use archive::{Snapshot, SnapshotArchive};
pub use device::{Device, DeviceConnection};
pub use dialect::{DeviceType, DialectDefinition, DialectTable};
pub use differ::{ChangeResult, Differ, LineDiffer};
pub use error::{Error, FailureKind, Result};
pub use fleet::{ChangeSet, DeviceOutcome, FleetOrchestrator, RunSummary};
pub use inventory::{Inventory, InventorySource};
pub use repository::{CommitOutcome, GitRepository, Repository};
pub use session::{
    DeviceSession, DialectSessionFactory, Response, Session, SessionConfig, SessionFactory,
    SessionState,
};
pub use transport::{HostKeyVerification, Protocol};
