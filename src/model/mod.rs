//! # Graph Model
//!
//! Plain data that crosses every boundary: storage ↔ runtime ↔ programs ↔ user.
//!
//! Design rule: this module is pure data. No I/O, no state, no async.

pub mod concept;
pub mod edge;
pub mod schema;
pub mod value;
pub mod property_map;

pub use concept::{Concept, ConceptId, VertexKind};
pub use edge::{Direction, Edge, EdgeKind};
pub use schema::{DataType, Schema, SchemaType, TypeKind, meta, meta_types};
pub use value::Value;
pub use property_map::PropertyMap;
