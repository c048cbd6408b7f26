//! Strata manifest handling
//!
//! This crate owns everything that is text on disk: the in-memory model of a
//! Ninja manifest and its serializer, atomic and write-if-changed file
//! updates, depfiles, the `@@Key@@` placeholder substitution used to turn the
//! bootstrap template into a usable manifest, and the drift detector that
//! compares two template generations.

pub mod drift;
pub mod errors;
pub mod manifest;
pub mod ninja_writer;
pub mod template;
pub mod types;

pub use drift::{detect, first_difference, Drift};
pub use errors::{ManifestError, TemplateError};
pub use manifest::{format_depfile, read_depfile, write_atomic, write_depfile, write_if_changed};
pub use template::{contains_placeholders, substitute, Bindings, Placeholder};
pub use types::{BuildAction, Manifest, Rule};
