//! Data layer: CSV merge engine, load pipeline, and the query surface.
//!
//! ```text
//!   directory of .csv files
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  loader   │  read + merge + time-sort → per-field series
//!   └──────────┘
//!        │
//!        ▼
//!   ┌──────────┐
//!   │ pipeline  │  worker thread: convert → classify → limit,
//!   └──────────┘  progress via bounded channel
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  Dataset  │  read-only query surface for the UI
//!   └──────────┘
//! ```

pub mod limits;
pub mod loader;
pub mod model;
pub mod pipeline;
pub mod special;
