//! Section records, identity and submission validation.

pub mod checksum;
pub mod model;
pub mod submit;

pub use checksum::compute_checksum;
pub use model::{Directives, MetadataPatch, Section, SectionMeta};
pub use submit::{NewSection, SectionSubmission};
