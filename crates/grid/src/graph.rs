//! Pole proximity graph.
//!
//! Nodes are poles, an undirected edge joins two poles whose wire reach covers
//! the distance between them, weighted by that distance. The graph is an
//! arena: nodes in a vector, adjacency as parallel per-node edge lists.
//! Neighbor search goes through an R*-tree over pole positions.

use rstar::{RTree, RTreeObject, AABB};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use u_layout_core::{CandidateId, Position, EPSILON};

/// A pole in the proximity graph.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphNode {
    /// Candidate backing the pole.
    pub candidate: CandidateId,
    /// Pole position.
    pub position: Position,
    /// Maximum wire length.
    pub wire_reach: f64,
}

#[derive(Debug, Clone)]
struct PoleEntry {
    index: usize,
    point: [f64; 2],
}

impl RTreeObject for PoleEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.point)
    }
}

/// Undirected pole graph with Euclidean edge weights.
#[derive(Debug, Clone, Default)]
pub struct ProximityGraph {
    nodes: Vec<GraphNode>,
    edges: Vec<Vec<(usize, f64)>>,
    lookup: HashMap<CandidateId, usize>,
}

impl ProximityGraph {
    /// Builds the graph over `nodes`. Node indices follow the input order.
    pub fn build(nodes: Vec<GraphNode>) -> Self {
        let entries: Vec<PoleEntry> = nodes
            .iter()
            .enumerate()
            .map(|(index, n)| PoleEntry {
                index,
                point: [n.position.x, n.position.y],
            })
            .collect();
        let tree = RTree::bulk_load(entries);

        let mut edges = vec![Vec::new(); nodes.len()];
        for (i, node) in nodes.iter().enumerate() {
            let reach = node.wire_reach;
            let p = node.position;
            let envelope = AABB::from_corners([p.x - reach, p.y - reach], [p.x + reach, p.y + reach]);
            for entry in tree.locate_in_envelope_intersecting(&envelope) {
                let j = entry.index;
                if j <= i {
                    continue;
                }
                let other = &nodes[j];
                let d = p.distance(&other.position);
                if d <= reach.min(other.wire_reach) + EPSILON {
                    edges[i].push((j, d));
                    edges[j].push((i, d));
                }
            }
        }
        for list in &mut edges {
            list.sort_by_key(|&(j, _)| j);
        }

        let lookup = nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.candidate, i))
            .collect();
        Self {
            nodes,
            edges,
            lookup,
        }
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true if the graph has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of undirected edges.
    pub fn edge_count(&self) -> usize {
        self.edges.iter().map(Vec::len).sum::<usize>() / 2
    }

    /// Node at `index`.
    pub fn node(&self, index: usize) -> &GraphNode {
        &self.nodes[index]
    }

    /// All nodes in index order.
    pub fn nodes(&self) -> &[GraphNode] {
        &self.nodes
    }

    /// Neighbors of `index` with edge weights, in index order.
    pub fn neighbors(&self, index: usize) -> &[(usize, f64)] {
        &self.edges[index]
    }

    /// Node index of a candidate.
    pub fn index_of(&self, candidate: CandidateId) -> Option<usize> {
        self.lookup.get(&candidate).copied()
    }

    /// Multi-source shortest distances from `roots`.
    ///
    /// Unreachable nodes get `f64::INFINITY`.
    pub fn shortest_distances(&self, roots: &[usize]) -> Vec<f64> {
        let mut dist = vec![f64::INFINITY; self.nodes.len()];
        let mut heap = BinaryHeap::new();
        for &root in roots {
            dist[root] = 0.0;
            heap.push(State { cost: 0.0, node: root });
        }

        while let Some(State { cost, node }) = heap.pop() {
            if cost > dist[node] {
                continue;
            }
            for &(next, weight) in &self.edges[node] {
                let candidate = cost + weight;
                if candidate < dist[next] {
                    dist[next] = candidate;
                    heap.push(State {
                        cost: candidate,
                        node: next,
                    });
                }
            }
        }
        dist
    }

    /// Greedy maximal clique around the node nearest `reference`.
    ///
    /// Nodes are considered by distance to `reference`; each joins if it is
    /// adjacent to every member so far. Returns indices in ascending order.
    pub fn nearest_clique(&self, reference: Position) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.nodes.len()).collect();
        order.sort_by(|&a, &b| {
            let da = self.nodes[a].position.distance_squared(&reference);
            let db = self.nodes[b].position.distance_squared(&reference);
            da.total_cmp(&db).then(a.cmp(&b))
        });

        let mut clique: Vec<usize> = Vec::new();
        for i in order {
            if clique.iter().all(|&m| self.is_adjacent(m, i)) {
                clique.push(i);
            }
        }
        clique.sort_unstable();
        clique
    }

    /// Returns true if `a` and `b` share an edge.
    pub fn is_adjacent(&self, a: usize, b: usize) -> bool {
        self.edges[a].binary_search_by_key(&b, |&(j, _)| j).is_ok()
    }
}

#[derive(Debug, Clone, Copy)]
struct State {
    cost: f64,
    node: usize,
}

impl PartialEq for State {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for State {}

impl PartialOrd for State {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for State {
    // Reversed: BinaryHeap is a max-heap.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| other.node.cmp(&self.node))
    }
}
