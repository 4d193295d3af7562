//! Map-reduce result extractors.
//!
//! Each extractor is the terminal stage of a run: it reads what a vertex
//! program left on the vertices (or the raw graph, for counts) and shapes
//! the facade's result value.
//!
//! | Extractor | Key | Finalized value |
//! |-----------|-----|-----------------|
//! | `CountMapReduce` | type label | `{type: Int}` |
//! | `MinMapReduce` / `MaxMapReduce` | `()` | numeric or `Null` |
//! | `SumMapReduce` | `()` | numeric or `Null` |
//! | `MeanMapReduce` / `StdMapReduce` | `()` | `Float` or `Null` |
//! | `ClusterMemberMapReduce` | cluster label | `{label: [id]}` |
//! | `ClusterSizeMapReduce` | cluster label | `{label: Int}` |
//! | `DegreeDistributionMapReduce` | degree | `[[degree, [id]]]` |

pub mod count;
pub mod statistics;
pub mod cluster;
pub mod degree_distribution;

pub use count::CountMapReduce;
pub use statistics::{MaxMapReduce, MeanMapReduce, MinMapReduce, StdMapReduce, SumMapReduce};
pub use cluster::{ClusterMemberMapReduce, ClusterSizeMapReduce};
pub use degree_distribution::DegreeDistributionMapReduce;
