//! Wire connectivity encodings.
//!
//! Both strategies consume the same inputs: the proximity graph over live
//! poles, each pole's literal, and shortest distances from the root set. They
//! differ only in which neighbors count as a valid "parent".

use crate::graph::ProximityGraph;
use crate::model::{Lit, PlacementModel};
use u_layout_core::EPSILON;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Encoding of "every selected pole is wired back to a root".
pub trait ConnectivityStrategy: Send + Sync {
    /// Strategy name for logs.
    fn name(&self) -> &'static str;

    /// Parents of `node`: neighbors one of which must be selected when
    /// `node` is.
    fn parents(&self, graph: &ProximityGraph, distances: &[f64], node: usize) -> Vec<usize>;

    /// Adds the implications for every finite, non-root node.
    ///
    /// Returns the number of constrained nodes.
    fn constrain(
        &self,
        model: &mut PlacementModel,
        graph: &ProximityGraph,
        literals: &[Lit],
        distances: &[f64],
        roots: &[usize],
    ) -> usize {
        let mut constrained = 0;
        for node in 0..graph.len() {
            if roots.contains(&node) || !distances[node].is_finite() {
                continue;
            }
            let parents: Vec<Lit> = self
                .parents(graph, distances, node)
                .into_iter()
                .map(|p| literals[p])
                .collect();
            model.add_implies_any(literals[node], &parents);
            constrained += 1;
        }
        constrained
    }
}

/// Selected ⇒ some strictly closer neighbor selected.
#[derive(Debug, Clone, Copy, Default)]
pub struct DistanceDecreasing;

impl ConnectivityStrategy for DistanceDecreasing {
    fn name(&self) -> &'static str {
        "distance-decreasing"
    }

    fn parents(&self, graph: &ProximityGraph, distances: &[f64], node: usize) -> Vec<usize> {
        let d = distances[node];
        graph
            .neighbors(node)
            .iter()
            .filter(|&&(j, _)| distances[j] < d - EPSILON)
            .map(|&(j, _)| j)
            .collect()
    }
}

/// Edges oriented away from the roots by `(distance, index)`; selected ⇒
/// some predecessor selected.
///
/// Unlike [`DistanceDecreasing`], equidistant neighbors can serve as parents
/// through the index tie-break, which never creates a cycle.
#[derive(Debug, Clone, Copy, Default)]
pub struct RootedDag;

impl ConnectivityStrategy for RootedDag {
    fn name(&self) -> &'static str {
        "rooted-dag"
    }

    fn parents(&self, graph: &ProximityGraph, distances: &[f64], node: usize) -> Vec<usize> {
        let key = (distances[node], node);
        graph
            .neighbors(node)
            .iter()
            .filter(|&&(j, _)| {
                let other = (distances[j], j);
                other.0.total_cmp(&key.0).then(other.1.cmp(&key.1)).is_lt()
            })
            .map(|&(j, _)| j)
            .collect()
    }
}

/// Serializable choice of connectivity encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ConnectivityMode {
    /// [`DistanceDecreasing`].
    #[default]
    DistanceDecreasing,
    /// [`RootedDag`].
    RootedDag,
}

impl ConnectivityMode {
    /// The strategy implementing this mode.
    pub fn strategy(self) -> &'static dyn ConnectivityStrategy {
        match self {
            Self::DistanceDecreasing => &DistanceDecreasing,
            Self::RootedDag => &RootedDag,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphNode;
    use u_layout_core::{CandidateId, Position};

    fn square() -> ProximityGraph {
        // 0 at the origin, 1 and 2 equidistant from it and adjacent to each
        // other, 3 reachable only through 1 or 2.
        ProximityGraph::build(
            [(0.0, 0.0), (4.0, 3.0), (4.0, -3.0), (9.0, 0.0)]
                .iter()
                .enumerate()
                .map(|(i, &(x, y))| GraphNode {
                    candidate: CandidateId::new(i),
                    position: Position::new(x, y),
                    wire_reach: 6.0,
                })
                .collect(),
        )
    }

    #[test]
    fn test_distance_decreasing_parents() {
        let graph = square();
        let dist = graph.shortest_distances(&[0]);
        assert_eq!(DistanceDecreasing.parents(&graph, &dist, 3), vec![1, 2]);
        assert_eq!(DistanceDecreasing.parents(&graph, &dist, 1), vec![0]);
        assert_eq!(DistanceDecreasing.parents(&graph, &dist, 2), vec![0]);
    }

    #[test]
    fn test_dag_breaks_ties_by_index() {
        let graph = square();
        let dist = graph.shortest_distances(&[0]);
        assert_eq!(RootedDag.parents(&graph, &dist, 1), vec![0]);
        assert_eq!(RootedDag.parents(&graph, &dist, 2), vec![0, 1]);
        assert_eq!(RootedDag.parents(&graph, &dist, 3), vec![1, 2]);
        assert_eq!(ConnectivityMode::RootedDag.strategy().name(), "rooted-dag");
    }
}
