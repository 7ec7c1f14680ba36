// ── Domain model ──

pub mod snapshot;
pub mod value;

pub use snapshot::{Category, CategoryData, Collection, Record, Snapshot};
pub use value::FieldValue;
