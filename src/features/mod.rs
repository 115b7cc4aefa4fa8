//! Feature schema, frozen encoder and alignment
//!
//! The schema and encoder are read-only for the duration of a run. A newly
//! fitted encoder only becomes the frozen basis once its version is
//! published.

pub mod align;
pub mod encoder;
pub mod schema;

pub use align::{AlignedFeatures, FeatureAligner};
pub use encoder::EncoderParams;
pub use schema::{FeatureSchema, NUMERIC_FEATURES, REQUIRED_FIELDS};
