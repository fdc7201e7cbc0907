//! Source root walker
//!
//! One walker runs per source root, each on its own thread:
//!
//! ```text
//!   /mnt/card1        /mnt/card2        /mnt/cardN
//!       │                 │                 │
//! ┌─────▼─────┐     ┌─────▼─────┐     ┌─────▼─────┐
//! │  walk-0   │     │  walk-1   │     │  walk-N   │
//! │  walkdir  │     │  walkdir  │     │  walkdir  │
//! └─────┬─────┘     └─────┬─────┘     └─────┬─────┘
//!       └─────────────────┼─────────────────┘
//!                         ▼
//!            Vec<WorkItem> per root (or WalkError)
//! ```

pub mod scan;

pub use scan::walk_root;
