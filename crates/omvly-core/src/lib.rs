//! Polling core between `omvly-api` and consumers (CLI, dashboards).
//!
//! - **[`Poller`]** — owns the device snapshot and runs two cadences
//!   against it: a fast hardware/plugin/disk cycle and a slow inventory
//!   cycle (filesystems, SMART, services) that publishes the snapshot and
//!   signals an [`UpdateSink`]. Both share one exclusive-access token, so
//!   cycles never interleave; a cycle that cannot get the token in time is
//!   abandoned without touching anything.
//!
//! - **Normalization engine** ([`normalize`], [`schema`]) — folds loose RPC
//!   payloads into records with a stable field set using compile-time
//!   schema tables: typed coercion, defaults, row skipping, keyed merge and
//!   persist-once "ensure" fields.
//!
//! - **Derived fields** ([`derived`]) — uptime epoch, rounded usage
//!   percentages, GiB sizes and SMART enrichment.
//!
//! - **Domain model** ([`model`]) — [`Snapshot`], [`Record`],
//!   [`Collection`] and [`FieldValue`].

pub mod config;
pub mod derived;
pub mod error;
pub mod model;
pub mod normalize;
pub mod notify;
pub mod poller;
pub mod schema;
mod store;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{DeviceConfig, PollerConfig};
pub use error::CoreError;
pub use model::{Category, CategoryData, Collection, FieldValue, Record, Snapshot};
pub use normalize::{normalize, normalize_keyed, normalize_record};
pub use notify::{NullSink, UpdateSink, update_topic};
pub use poller::{CycleOutcome, Poller};
pub use schema::{FieldKind, FieldSpec, Schema, SkipRule};
