//! Index-based compute graph built from a storage snapshot.

use std::ops::Range;

use hashbrown::HashMap;
use smallvec::SmallVec;

use crate::model::{Concept, ConceptId, Direction, EdgeKind};
use crate::storage::GraphSnapshot;
use super::MessageScope;

/// One adjacency entry: an edge seen from one of its endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Adjacent {
    pub kind: EdgeKind,
    /// `Outgoing` when this vertex is the edge's source.
    pub direction: Direction,
    pub target: usize,
}

impl Adjacent {
    pub fn matches(&self, scope: MessageScope) -> bool {
        self.kind == scope.edge && scope.direction.admits(self.direction)
    }
}

/// Vertices in id order with per-vertex adjacency lists.
#[derive(Debug, Default)]
pub struct ComputeGraph {
    vertices: Vec<Concept>,
    index: HashMap<ConceptId, usize>,
    adjacency: Vec<SmallVec<[Adjacent; 4]>>,
}

impl ComputeGraph {
    /// Build from a snapshot. Edges with an endpoint missing from the
    /// snapshot are dropped.
    pub fn from_snapshot(snapshot: GraphSnapshot) -> Self {
        let GraphSnapshot { mut vertices, edges } = snapshot;
        vertices.sort_by(|a, b| a.id.cmp(&b.id));
        vertices.dedup_by(|a, b| a.id == b.id);

        let index: HashMap<ConceptId, usize> = vertices
            .iter()
            .enumerate()
            .map(|(i, v)| (v.id.clone(), i))
            .collect();
        let mut adjacency = vec![SmallVec::new(); vertices.len()];

        for edge in &edges {
            let (Some(&src), Some(&dst)) = (index.get(&edge.src), index.get(&edge.dst)) else {
                continue;
            };
            adjacency[src].push(Adjacent { kind: edge.kind, direction: Direction::Outgoing, target: dst });
            adjacency[dst].push(Adjacent { kind: edge.kind, direction: Direction::Incoming, target: src });
        }

        Self { vertices, index, adjacency }
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn vertex(&self, idx: usize) -> &Concept {
        &self.vertices[idx]
    }

    pub fn vertices(&self) -> &[Concept] {
        &self.vertices
    }

    pub fn index_of(&self, id: &ConceptId) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn adjacency(&self, idx: usize) -> &[Adjacent] {
        &self.adjacency[idx]
    }

    /// Targets reachable from `idx` through `scope`, one per matching edge.
    pub fn neighbors(&self, idx: usize, scope: MessageScope) -> impl Iterator<Item = usize> + '_ {
        self.adjacency[idx].iter().filter(move |a| a.matches(scope)).map(|a| a.target)
    }

    /// Chunk length used to split vertices across `workers`.
    pub fn chunk_len(&self, workers: usize) -> usize {
        self.len().div_ceil(workers.max(1)).max(1)
    }

    /// Contiguous vertex ranges, one per non-empty worker partition.
    pub fn partitions(&self, workers: usize) -> Vec<Range<usize>> {
        let chunk = self.chunk_len(workers);
        (0..self.len())
            .step_by(chunk)
            .map(|start| start..(start + chunk).min(self.len()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Edge, VertexKind};

    fn snapshot() -> GraphSnapshot {
        let v = |id: &str, kind| Concept::new(ConceptId::from(id), kind, "t");
        GraphSnapshot {
            vertices: vec![
                v("V3", VertexKind::Entity),
                v("V1", VertexKind::Relation),
                v("V2", VertexKind::Casting),
            ],
            edges: vec![
                Edge::new("V1".into(), "V2".into(), EdgeKind::Casting),
                Edge::new("V2".into(), "V3".into(), EdgeKind::RolePlayer),
                Edge::new("V2".into(), "V404".into(), EdgeKind::RolePlayer),
            ],
        }
    }

    #[test]
    fn test_vertices_sorted_and_indexed() {
        let g = ComputeGraph::from_snapshot(snapshot());
        assert_eq!(g.vertex(0).id.as_str(), "V1");
        assert_eq!(g.index_of(&"V3".into()), Some(2));
    }

    #[test]
    fn test_scoped_neighbors() {
        let g = ComputeGraph::from_snapshot(snapshot());
        let casting = g.index_of(&"V2".into()).unwrap();
        let to_relation = MessageScope::new(EdgeKind::Casting, Direction::Incoming);
        let to_player = MessageScope::new(EdgeKind::RolePlayer, Direction::Outgoing);
        assert_eq!(g.neighbors(casting, to_relation).collect::<Vec<_>>(), vec![0]);
        assert_eq!(g.neighbors(casting, to_player).collect::<Vec<_>>(), vec![2]);
        assert_eq!(g.adjacency(casting).len(), 2);
    }

    #[test]
    fn test_partitions_cover_all_vertices() {
        let g = ComputeGraph::from_snapshot(snapshot());
        assert_eq!(g.partitions(2), vec![0..2, 2..3]);
        assert_eq!(g.partitions(8), vec![0..1, 1..2, 2..3]);
        assert!(ComputeGraph::default().partitions(4).is_empty());
    }
}
