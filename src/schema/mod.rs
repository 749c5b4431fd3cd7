//! Schema catalog and OCSF-style enrichment.

pub mod catalog;
pub mod enrich;

pub use catalog::{AttributeDef, ClassDef, EnumDef, ObjectDef, SchemaCatalog, TypeDef, OTHER_ACTIVITY_ID};
pub use enrich::enrich;
