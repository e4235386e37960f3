//! Schema resolution module
//!
//! Builds record schemas from the dbt Cloud OpenAPI documents.
//!
//! # Features
//!
//! - **Reference Inlining**: `$ref` pointers into `components.schemas` are replaced by their targets
//! - **allOf Merging**: object members are folded into a single schema
//! - **Nullability Widening**: nullable or unannotated nodes accept `null`
//! - **Key Protection**: primary-key properties keep their declared type
//! - **Caching**: documents and resolved schemas are loaded once per process

mod resolver;
mod source;
mod types;

pub use resolver::{resolve_component, SchemaCache};
pub use source::{parse_components, SchemaSource};
pub use types::{FieldSpec, JsonType, ResolvedSchema};

#[cfg(test)]
mod tests;
