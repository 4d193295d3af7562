//! Vertex programs.
//!
//! Every program is an immutable, serializable config struct implementing
//! `VertexProgram`. Programs communicate only through messages along
//! `helpers` scopes and through the registers they declare in `setup`.
//!
//! | Program | Registers | Leaves on vertices |
//! |---------|-----------|--------------------|
//! | `CountProgram` | none | `OWNERSHIP_COUNT` |
//! | `DegreeProgram` | none | `DEGREE` |
//! | `DegreeStatisticsProgram` | none | `DEGREE` (weights) |
//! | `ConnectedComponentsProgram` | stable (AND) | `CLUSTER_LABEL` |
//! | `KCoreProgram` | stable (AND), exist (OR) | `CLUSTER_LABEL` |
//! | `CorenessProgram` | stable (AND), exist (OR), k | `CORENESS` |
//! | `ShortestPathProgram` | found (OR), min length (MIN), links (UNION) | distances |
//! | `MedianProgram` | counts (SUM), pivots (PICK) | labels |

pub mod helpers;
pub mod count;
pub mod degree;
pub mod connected_components;
pub mod kcore;
pub mod coreness;
pub mod shortest_path;
pub mod median;

pub use count::{CountProgram, OWNERSHIP_COUNT};
pub use degree::{DegreeProgram, DegreeStatisticsProgram, DEGREE};
pub use connected_components::{ConnectedComponentsProgram, CLUSTER_LABEL};
pub use kcore::KCoreProgram;
pub use coreness::{CorenessProgram, CORENESS};
pub use shortest_path::{ShortestPathProgram, LINKS};
pub use median::{MedianProgram, MEDIAN};
