//! cardslurp - Parallel Camera Card Offloader
//!
//! Copies every file from one or more mounted cards into a single flat
//! target directory. Each copy is verified byte for byte, files already
//! present are skipped, and name collisions with different content get a
//! unique suffix.
//!
//! # Features
//!
//! - **Parallel Discovery**: One walker thread per card; any walk error
//!   aborts the run before a single byte is copied.
//!
//! - **Chronological Interleave**: Files from every card are sorted by
//!   modification time before they are queued.
//!
//! - **Verified Copies**: Multi-pass comparison after every copy, with a
//!   bounded number of resubmissions on mismatch.
//!
//! - **Content Dedup**: A shared naming oracle guarantees no two items ever
//!   write the same target path and that identical files are copied once.
//!
//! - **Sidecar Replacement**: The `xmpsafecopy` binary backs up a shoot's
//!   sidecar files and replaces them with verified copies from another
//!   copy of the same shoot.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────┐  ┌──────────┐        ┌──────────┐
//! │  card 1  │  │  card 2  │  ...   │  card N  │
//! └────┬─────┘  └────┬─────┘        └────┬─────┘
//!      │ walk        │ walk              │ walk
//!      └─────────────┼───────────────────┘
//!                    ▼
//!          sort by modification time
//!                    │
//!                    ▼
//!       ┌──────────────────────────┐ ◄── requeue on mismatch
//!       │       Work Queue         │            │
//!       └────────────┬─────────────┘            │
//!                    ▼                          │
//!       ┌──────────────────────────┐            │
//!       │      Worker Threads      ├────────────┘
//!       │ claim ► copy ► verify    │ ◄──► Target Naming Oracle
//!       └────────────┬─────────────┘
//!                    ▼
//!              Result Stream ──► summary
//! ```
//!
//! # Example
//!
//! ```bash
//! # Offload two cards
//! cardslurp -t /photos/2024-06-01 -m /media/card1,/media/card2
//!
//! # Fewer workers, extra verification
//! cardslurp -t /photos/shoot -m /media/card1 -w 4 --verify-passes 3
//!
//! # Replace sidecars after editing on another machine
//! xmpsafecopy -s /laptop/2024-06-01 -t /nas/2024-06-01
//! ```

pub mod config;
pub mod content;
pub mod coordinator;
pub mod error;
pub mod naming;
pub mod pool;
pub mod progress;
pub mod sidecar;
pub mod types;
pub mod walker;

pub use config::{CliArgs, SlurpConfig};
pub use content::{FileComparator, FileOps};
pub use coordinator::{RootSummary, SlurpCoordinator, SlurpProgress, SlurpSummary};
pub use error::{Result, SlurpError};
pub use naming::TargetNameOracle;
pub use types::{EntryType, WorkItem};
