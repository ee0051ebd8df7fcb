//! Collectors that reduce the two sides of a reconciliation, the API
//! specification and the existing configuration, to the same identity space.

mod existing;
mod spec_entries;

pub use existing::{collect_existing_entries, ExistingEntries};
pub use spec_entries::{collect_spec_entries, SpecEntries};
