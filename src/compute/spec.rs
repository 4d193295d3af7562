//! Serializable run configurations.
//!
//! A run is described by a `ProgramSpec` and/or a `MapReduceSpec`: a tag
//! naming the algorithm plus its immutable config. The coordinator
//! serializes the spec once; every worker rebuilds its own program from the
//! wire form before superstep 0.
//!
//! ```text
//!   ProgramSpec ──to_wire──► {"program":"k_core","selected":[..],"k":3}
//!                              │ one copy per worker
//!                              ▼
//!                   from_wire + KCoreProgram::from_spec
//! ```

use serde::{Deserialize, Serialize};

use crate::algorithm::{
    ConnectedComponentsProgram, CorenessProgram, CountProgram, DegreeProgram, DegreeStatisticsProgram,
    KCoreProgram, MedianProgram, ShortestPathProgram,
};
use crate::mapreduce::{
    ClusterMemberMapReduce, ClusterSizeMapReduce, CountMapReduce, DegreeDistributionMapReduce, MaxMapReduce,
    MeanMapReduce, MinMapReduce, StdMapReduce, SumMapReduce,
};
use crate::{Error, Result};
use super::{MapReduce, VertexProgram};

// ============================================================================
// ProgramSpec
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "program", rename_all = "snake_case")]
pub enum ProgramSpec {
    Count(CountProgram),
    Degree(DegreeProgram),
    DegreeStatistics(DegreeStatisticsProgram),
    ConnectedComponents(ConnectedComponentsProgram),
    KCore(KCoreProgram),
    Coreness(CorenessProgram),
    ShortestPath(ShortestPathProgram),
    Median(MedianProgram),
}

impl ProgramSpec {
    pub fn name(&self) -> &'static str {
        match self {
            ProgramSpec::Count(p) => p.name(),
            ProgramSpec::Degree(p) => p.name(),
            ProgramSpec::DegreeStatistics(p) => p.name(),
            ProgramSpec::ConnectedComponents(p) => p.name(),
            ProgramSpec::KCore(p) => p.name(),
            ProgramSpec::Coreness(p) => p.name(),
            ProgramSpec::ShortestPath(p) => p.name(),
            ProgramSpec::Median(p) => p.name(),
        }
    }

    pub fn to_wire(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_wire(wire: &str) -> Result<Self> {
        Ok(serde_json::from_str(wire)?)
    }
}

/// A program that can be rebuilt from its spec.
pub trait ProgramVariant: VertexProgram + Sized {
    fn from_spec(spec: ProgramSpec) -> Result<Self>;
}

// ============================================================================
// MapReduceSpec
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "job", rename_all = "snake_case")]
pub enum MapReduceSpec {
    Count(CountMapReduce),
    Min(MinMapReduce),
    Max(MaxMapReduce),
    Sum(SumMapReduce),
    Mean(MeanMapReduce),
    Std(StdMapReduce),
    ClusterMember(ClusterMemberMapReduce),
    ClusterSize(ClusterSizeMapReduce),
    DegreeDistribution(DegreeDistributionMapReduce),
}

impl MapReduceSpec {
    pub fn name(&self) -> &'static str {
        match self {
            MapReduceSpec::Count(j) => j.name(),
            MapReduceSpec::Min(j) => j.name(),
            MapReduceSpec::Max(j) => j.name(),
            MapReduceSpec::Sum(j) => j.name(),
            MapReduceSpec::Mean(j) => j.name(),
            MapReduceSpec::Std(j) => j.name(),
            MapReduceSpec::ClusterMember(j) => j.name(),
            MapReduceSpec::ClusterSize(j) => j.name(),
            MapReduceSpec::DegreeDistribution(j) => j.name(),
        }
    }

    pub fn to_wire(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_wire(wire: &str) -> Result<Self> {
        Ok(serde_json::from_str(wire)?)
    }
}

// ============================================================================
// Variant conversions
// ============================================================================

macro_rules! program_variants {
    ($($variant:ident => $ty:ty),* $(,)?) => {
        $(
            impl ProgramVariant for $ty {
                fn from_spec(spec: ProgramSpec) -> Result<Self> {
                    match spec {
                        ProgramSpec::$variant(p) => Ok(p),
                        other => Err(Error::Validation(format!(
                            "expected a {} spec, got {}",
                            stringify!($variant),
                            other.name()
                        ))),
                    }
                }
            }

            impl From<$ty> for ProgramSpec {
                fn from(p: $ty) -> Self {
                    ProgramSpec::$variant(p)
                }
            }
        )*
    };
}

program_variants! {
    Count => CountProgram,
    Degree => DegreeProgram,
    DegreeStatistics => DegreeStatisticsProgram,
    ConnectedComponents => ConnectedComponentsProgram,
    KCore => KCoreProgram,
    Coreness => CorenessProgram,
    ShortestPath => ShortestPathProgram,
    Median => MedianProgram,
}

macro_rules! map_reduce_variants {
    ($($variant:ident => $ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for MapReduceSpec {
                fn from(j: $ty) -> Self {
                    MapReduceSpec::$variant(j)
                }
            }
        )*
    };
}

map_reduce_variants! {
    Count => CountMapReduce,
    Min => MinMapReduce,
    Max => MaxMapReduce,
    Sum => SumMapReduce,
    Mean => MeanMapReduce,
    Std => StdMapReduce,
    ClusterMember => ClusterMemberMapReduce,
    ClusterSize => ClusterSizeMapReduce,
    DegreeDistribution => DegreeDistributionMapReduce,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ConceptId;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_program_wire_form_is_tagged() {
        let spec = ProgramSpec::from(KCoreProgram::new(["person".to_owned()].into(), 3));
        let wire = spec.to_wire().unwrap();
        assert!(wire.contains(r#""program":"k_core""#));
        assert_eq!(ProgramSpec::from_wire(&wire).unwrap(), spec);
    }

    #[test]
    fn test_worker_rebuild_checks_variant() {
        let spec = ProgramSpec::from(ShortestPathProgram::new(
            ["person".to_owned()].into(),
            ConceptId::from("V1"),
            ConceptId::from("V7"),
        ));
        let rebuilt = ShortestPathProgram::from_spec(ProgramSpec::from_wire(&spec.to_wire().unwrap()).unwrap()).unwrap();
        assert_eq!(rebuilt.destination, ConceptId::from("V7"));
        assert!(matches!(KCoreProgram::from_spec(spec), Err(Error::Validation(_))));
    }

    #[test]
    fn test_unknown_tag_rejected() {
        assert!(matches!(ProgramSpec::from_wire(r#"{"program":"page_rank"}"#), Err(Error::Serialization(_))));
        let job = MapReduceSpec::from(ClusterSizeMapReduce { size: Some(2) });
        assert_eq!(MapReduceSpec::from_wire(&job.to_wire().unwrap()).unwrap(), job);
    }
}
