//! Power network subproblem.
//!
//! Chooses a minimum-cost set of electric poles so that every power consumer
//! lies inside some pole's supply area, optionally requiring every selected
//! pole to be wired back to a root set.
//!
//! [`PowerNetwork::build`] runs the whole pipeline. Each step is public so
//! callers with their own candidate sets can drive it piecemeal:
//!
//! 1. [`PowerNetwork::new`] collects consumers and existing poles,
//! 2. [`PowerNetwork::enumerate_candidates`] / [`PowerNetwork::add_candidate`],
//! 3. [`PowerNetwork::build_coverage`],
//! 4. [`PowerNetwork::prune`],
//! 5. [`PowerNetwork::add_coverage_constraints`],
//! 6. [`PowerNetwork::add_connectivity_constraints`].

mod connectivity;

pub use connectivity::{ConnectivityMode, ConnectivityStrategy, DistanceDecreasing, RootedDag};

use crate::entity::Entity;
use crate::graph::{GraphNode, ProximityGraph};
use crate::model::{Footprint, Lit, PlacementModel};
use crate::spatial_index::SpatialIndex;
use rayon::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;
use u_layout_core::{
    BoundingBox, CandidateId, Direction, EntityPrototype, Error, ExactConfig, PoleSpec, Position,
    PrototypeCatalog, Result, SolveResult, TilePosition,
};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Power subproblem configuration.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PowerConfig {
    /// Pole prototype names to enumerate (empty = every pole in the catalog).
    pub pole_prototypes: Vec<String>,
    /// Drop candidates that can never contribute to coverage.
    pub prune: bool,
    /// Connectivity encoding, `None` to only require coverage.
    pub connectivity: Option<ConnectivityMode>,
    /// Where to grow the root clique when no pole exists yet
    /// (default: centre of the consumer region).
    pub reference: Option<Position>,
}

impl Default for PowerConfig {
    fn default() -> Self {
        Self {
            pole_prototypes: Vec::new(),
            prune: true,
            connectivity: Some(ConnectivityMode::default()),
            reference: None,
        }
    }
}

impl PowerConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a pole prototype to enumerate.
    pub fn with_pole_prototype(mut self, name: impl Into<String>) -> Self {
        self.pole_prototypes.push(name.into());
        self
    }

    /// Enables or disables pruning.
    pub fn with_prune(mut self, prune: bool) -> Self {
        self.prune = prune;
        self
    }

    /// Sets the connectivity encoding.
    pub fn with_connectivity(mut self, connectivity: Option<ConnectivityMode>) -> Self {
        self.connectivity = connectivity;
        self
    }

    /// Sets the root reference point.
    pub fn with_reference(mut self, reference: Position) -> Self {
        self.reference = Some(reference);
        self
    }
}

/// Conditions surfaced to the caller instead of failing the build.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PowerReport {
    /// Consumers no pole candidate can supply.
    pub uncovered: Vec<CandidateId>,
    /// Poles without a wire path to the roots.
    pub unreachable: Vec<CandidateId>,
    /// Candidates removed by pruning.
    pub pruned: Vec<CandidateId>,
}

/// A pole known to the subproblem.
#[derive(Debug, Clone)]
pub struct PoleNode {
    /// Backing candidate.
    pub candidate: CandidateId,
    /// Pole position.
    pub position: Position,
    /// Supply and wire ranges.
    pub spec: PoleSpec,
    /// Existing pole (constant-true).
    pub fixed: bool,
    alive: bool,
}

impl PoleNode {
    /// Supply area rounded outward to whole tiles.
    pub fn supply_area(&self) -> BoundingBox {
        let r = self.spec.supply_radius;
        BoundingBox::around(self.position, r, r).round_out()
    }
}

/// Pole placement state built against a [`PlacementModel`].
#[derive(Debug)]
pub struct PowerNetwork {
    poles: Vec<PoleNode>,
    consumers: Vec<CandidateId>,
    consumer_index: SpatialIndex<Footprint>,
    consumer_lookup: HashMap<CandidateId, usize>,
    covers: Vec<Vec<usize>>,
    covered_by: Vec<Vec<usize>>,
    report: PowerReport,
}

impl PowerNetwork {
    /// Runs the full pipeline against `model`.
    pub fn build(
        model: &mut PlacementModel,
        catalog: &PrototypeCatalog,
        config: &PowerConfig,
        exact: &ExactConfig,
    ) -> Result<Self> {
        let prototypes = if config.pole_prototypes.is_empty() {
            catalog.poles()
        } else {
            config
                .pole_prototypes
                .iter()
                .map(|name| catalog.get(name))
                .collect::<Result<Vec<_>>>()?
        };

        let mut network = Self::new(model);
        network.enumerate_candidates(model, &prototypes, exact.threads)?;
        network.build_coverage();
        if config.prune {
            network.prune(model)?;
        }
        network.add_coverage_constraints(model)?;
        if let Some(mode) = config.connectivity {
            network.add_connectivity_constraints(model, mode.strategy(), config.reference)?;
        }
        Ok(network)
    }

    /// Collects consumers and existing poles from the model's fixed entities.
    pub fn new(model: &PlacementModel) -> Self {
        let mut network = Self {
            poles: Vec::new(),
            consumers: Vec::new(),
            consumer_index: SpatialIndex::new(),
            consumer_lookup: HashMap::new(),
            covers: Vec::new(),
            covered_by: Vec::new(),
            report: PowerReport::default(),
        };
        for candidate in model.candidates().filter(|c| c.is_fixed()) {
            let entity = candidate.entity();
            if entity.prototype().consumes_power {
                network
                    .consumer_lookup
                    .insert(candidate.id(), network.consumers.len());
                network.consumers.push(candidate.id());
                network
                    .consumer_index
                    .add(Footprint::of(candidate.id(), entity));
            }
            if let Some(spec) = entity.prototype().pole {
                network.push_pole(candidate.id(), entity.position(), spec, true);
            }
        }
        log::debug!(
            "power network: {} consumers, {} existing poles",
            network.consumers.len(),
            network.poles.len()
        );
        network
    }

    fn push_pole(&mut self, candidate: CandidateId, position: Position, spec: PoleSpec, fixed: bool) {
        self.poles.push(PoleNode {
            candidate,
            position,
            spec,
            fixed,
            alive: true,
        });
    }

    /// Region candidate poles are drawn from: the consumers' enclosing box
    /// grown by `margin`.
    pub fn candidate_region(&self, margin: f64) -> Option<BoundingBox> {
        self.consumer_index
            .enclosing_box()
            .map(|b| b.expand(margin).round_out())
    }

    /// Enumerates pole candidates over the consumer region, one per tile and
    /// prototype that no fixed entity blocks.
    ///
    /// The scan runs on a rayon pool of `threads` workers (0 = rayon default);
    /// hits are sorted before they are registered so ids are deterministic.
    /// Returns the number of candidates added.
    pub fn enumerate_candidates(
        &mut self,
        model: &mut PlacementModel,
        prototypes: &[Arc<EntityPrototype>],
        threads: usize,
    ) -> Result<usize> {
        for proto in prototypes {
            check_pole(proto)?;
        }
        let margin = prototypes
            .iter()
            .filter_map(|p| p.pole.map(|s| s.supply_radius))
            .fold(0.0, f64::max);
        let Some(region) = self.candidate_region(margin) else {
            return Ok(0);
        };
        let tiles = region.tiles();

        let shared: &PlacementModel = model;
        let scan = || {
            let mut hits: Vec<(TilePosition, usize)> = tiles
                .par_iter()
                .flat_map_iter(|&tile| {
                    prototypes.iter().enumerate().filter_map(move |(k, proto)| {
                        let entity = Entity::at_tile(Arc::clone(proto), tile, Direction::North);
                        shared.can_place(entity.shape()).then_some((tile, k))
                    })
                })
                .collect();
            hits.sort();
            hits
        };
        let hits = match rayon::ThreadPoolBuilder::new().num_threads(threads).build() {
            Ok(pool) => pool.install(scan),
            Err(e) => {
                log::warn!("Falling back to the global rayon pool: {}", e);
                scan()
            }
        };

        log::debug!(
            "enumerated {} pole candidates over {} tiles",
            hits.len(),
            tiles.len()
        );
        for &(tile, k) in &hits {
            let entity = Entity::at_tile(Arc::clone(&prototypes[k]), tile, Direction::North);
            self.add_candidate(model, entity)?;
        }
        Ok(hits.len())
    }

    /// Registers a caller-provided pole candidate.
    pub fn add_candidate(&mut self, model: &mut PlacementModel, entity: Entity) -> Result<CandidateId> {
        let spec = check_pole(entity.prototype())?;
        let cost = entity.prototype().cost;
        let position = entity.position();
        let id = model.add_placement(entity, cost)?;
        self.push_pole(id, position, spec, false);
        Ok(id)
    }

    /// Computes which consumers each live pole supplies, and the inverse.
    pub fn build_coverage(&mut self) {
        self.covers = self
            .poles
            .iter()
            .map(|pole| {
                if !pole.alive {
                    return Vec::new();
                }
                let mut hit: Vec<usize> = self
                    .consumer_index
                    .get_in_area(&pole.supply_area())
                    .into_iter()
                    .filter_map(|f| self.consumer_lookup.get(&f.id).copied())
                    .collect();
                hit.sort_unstable();
                hit
            })
            .collect();

        self.covered_by = vec![Vec::new(); self.consumers.len()];
        for (p, consumers) in self.covers.iter().enumerate() {
            for &c in consumers {
                self.covered_by[c].push(p);
            }
        }
    }

    /// Removes optional candidates that supply nothing and have no wire
    /// neighbor supplying anything. Returns the number removed.
    pub fn prune(&mut self, model: &mut PlacementModel) -> Result<usize> {
        self.ensure_coverage();
        let live: Vec<usize> = self.live_poles().collect();
        let graph = self.graph(&live);

        let doomed: Vec<usize> = live
            .iter()
            .enumerate()
            .filter(|&(_, &p)| !self.poles[p].fixed && self.covers[p].is_empty())
            .filter(|&(g, _)| {
                graph
                    .neighbors(g)
                    .iter()
                    .all(|&(n, _)| self.covers[live[n]].is_empty())
            })
            .map(|(_, &p)| p)
            .collect();

        for &p in &doomed {
            let id = self.poles[p].candidate;
            model.remove_placement(id)?;
            self.poles[p].alive = false;
            self.report.pruned.push(id);
            // Only empty coverers are pruned, so the inverse lists hold no
            // reference to `p`; keep them exact anyway.
            for &c in &self.covers[p] {
                self.covered_by[c].retain(|&q| q != p);
            }
            self.covers[p].clear();
        }
        log::debug!("pruned {} of {} pole candidates", doomed.len(), live.len());
        Ok(doomed.len())
    }

    /// At least one supplying pole per consumer that has any.
    ///
    /// Consumers without one are recorded in [`PowerReport::uncovered`].
    pub fn add_coverage_constraints(&mut self, model: &mut PlacementModel) -> Result<()> {
        self.ensure_coverage();
        for (c, poles) in self.covered_by.iter().enumerate() {
            if poles.is_empty() {
                log::warn!("Consumer {} cannot be powered by any candidate", self.consumers[c]);
                self.report.uncovered.push(self.consumers[c]);
                continue;
            }
            let lits = poles
                .iter()
                .map(|&p| model.literal(self.poles[p].candidate))
                .collect::<Result<Vec<_>>>()?;
            model.add_at_least_one(&lits)?;
        }
        Ok(())
    }

    /// Requires every selected pole to be wired back to a root.
    ///
    /// Roots are the existing poles; without any, the greedy clique of
    /// candidates nearest `reference` (default: centre of the consumer
    /// region). Poles with no path to a root are recorded in
    /// [`PowerReport::unreachable`] and left unconstrained.
    pub fn add_connectivity_constraints(
        &mut self,
        model: &mut PlacementModel,
        strategy: &dyn ConnectivityStrategy,
        reference: Option<Position>,
    ) -> Result<()> {
        let live: Vec<usize> = self.live_poles().collect();
        if live.is_empty() {
            return Ok(());
        }
        let graph = self.graph(&live);

        let mut roots: Vec<usize> = (0..live.len())
            .filter(|&g| self.poles[live[g]].fixed)
            .collect();
        if roots.is_empty() {
            let reference = reference
                .or_else(|| self.consumer_index.enclosing_box().map(|b| b.center()))
                .unwrap_or_else(|| graph.node(0).position);
            roots = graph.nearest_clique(reference);
        }
        let distances = graph.shortest_distances(&roots);

        for (g, d) in distances.iter().enumerate() {
            if d.is_infinite() {
                let id = self.poles[live[g]].candidate;
                log::warn!("Pole candidate {} has no wire path to the root set", id);
                self.report.unreachable.push(id);
            }
        }

        let literals = live
            .iter()
            .map(|&p| model.literal(self.poles[p].candidate))
            .collect::<Result<Vec<Lit>>>()?;
        let constrained = strategy.constrain(model, &graph, &literals, &distances, &roots);
        log::debug!(
            "{} connectivity: {} roots, {} constrained poles, {} edges",
            strategy.name(),
            roots.len(),
            constrained,
            graph.edge_count()
        );
        Ok(())
    }

    /// Optional poles chosen in `result`.
    pub fn selected_poles(&self, result: &SolveResult) -> Vec<CandidateId> {
        self.live_poles()
            .map(|p| &self.poles[p])
            .filter(|pole| !pole.fixed && result.is_selected(pole.candidate))
            .map(|pole| pole.candidate)
            .collect()
    }

    /// Consumers supplied by the pole backed by `candidate`.
    pub fn coverage_of(&self, candidate: CandidateId) -> Vec<CandidateId> {
        self.poles
            .iter()
            .position(|p| p.candidate == candidate)
            .and_then(|p| self.covers.get(p))
            .map(|cs| cs.iter().map(|&c| self.consumers[c]).collect())
            .unwrap_or_default()
    }

    /// Live poles, existing and candidate.
    pub fn poles(&self) -> impl Iterator<Item = &PoleNode> {
        self.poles.iter().filter(|p| p.alive)
    }

    /// Power consumers in the model.
    pub fn consumers(&self) -> &[CandidateId] {
        &self.consumers
    }

    /// What the build could not satisfy.
    pub fn report(&self) -> &PowerReport {
        &self.report
    }

    fn ensure_coverage(&mut self) {
        if self.covers.len() != self.poles.len() || self.covered_by.len() != self.consumers.len() {
            self.build_coverage();
        }
    }

    fn live_poles(&self) -> impl Iterator<Item = usize> + '_ {
        self.poles
            .iter()
            .enumerate()
            .filter(|(_, p)| p.alive)
            .map(|(i, _)| i)
    }

    fn graph(&self, live: &[usize]) -> ProximityGraph {
        ProximityGraph::build(
            live.iter()
                .map(|&p| GraphNode {
                    candidate: self.poles[p].candidate,
                    position: self.poles[p].position,
                    wire_reach: self.poles[p].spec.wire_reach,
                })
                .collect(),
        )
    }
}

fn check_pole(proto: &EntityPrototype) -> Result<PoleSpec> {
    let spec = proto
        .pole
        .ok_or_else(|| Error::NotAPole(proto.name.clone()))?;
    let valid = |r: f64| r.is_finite() && r >= 0.0;
    if !valid(spec.supply_radius) || !valid(spec.wire_reach) {
        return Err(Error::InvalidGeometry(format!(
            "pole {} has ranges {} / {}",
            proto.name, spec.supply_radius, spec.wire_reach
        )));
    }
    Ok(spec)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn consumer() -> Arc<EntityPrototype> {
        Arc::new(EntityPrototype::new("lamp", 1, 1).with_power_consumption())
    }

    fn small_pole() -> Arc<EntityPrototype> {
        Arc::new(EntityPrototype::small_pole())
    }

    fn at(proto: &Arc<EntityPrototype>, x: i32, y: i32) -> Entity {
        Entity::at_tile(Arc::clone(proto), TilePosition::new(x, y), Direction::North)
    }

    #[test]
    fn test_collects_consumers_and_existing_poles() {
        let mut model = PlacementModel::new();
        let lamp = model.add_fixed_entity(at(&consumer(), 0, 0));
        let pole = model.add_fixed_entity(at(&small_pole(), 3, 0));
        model.add_fixed_entity(at(&Arc::new(EntityPrototype::new("wall", 1, 1)), 5, 5));

        let network = PowerNetwork::new(&model);
        assert_eq!(network.consumers(), &[lamp]);
        let poles: Vec<_> = network.poles().map(|p| (p.candidate, p.fixed)).collect();
        assert_eq!(poles, vec![(pole, true)]);
    }

    #[test]
    fn test_coverage_is_tile_rounded() {
        let mut model = PlacementModel::new();
        let near = model.add_fixed_entity(at(&consumer(), 2, 0));
        let far = model.add_fixed_entity(at(&consumer(), 3, 0));
        let mut network = PowerNetwork::new(&model);
        let pole = network.add_candidate(&mut model, at(&small_pole(), 0, 0)).unwrap();
        network.build_coverage();

        // Supply 2.5 around x = 0.5 rounds out to [-2, 3).
        assert_eq!(network.coverage_of(pole), vec![near]);
        assert!(!network.coverage_of(pole).contains(&far));
    }

    #[test]
    fn test_enumeration_skips_blocked_tiles() {
        let mut model = PlacementModel::new();
        model.add_fixed_entity(at(&consumer(), 0, 0));
        let mut network = PowerNetwork::new(&model);
        let added = network
            .enumerate_candidates(&mut model, &[small_pole()], 2)
            .unwrap();

        // The consumer box grown by 2.5 rounds out to 7×7 tiles, one of
        // which holds the consumer.
        assert_eq!(added, 48);
        assert!(network
            .poles()
            .all(|p| p.position.tile() != TilePosition::new(0, 0)));
    }

    #[test]
    fn test_rejects_non_pole_candidate() {
        let mut model = PlacementModel::new();
        let mut network = PowerNetwork::new(&model);
        let err = network
            .add_candidate(&mut model, at(&consumer(), 0, 0))
            .unwrap_err();
        assert_eq!(err, Error::NotAPole("lamp".into()));
    }

    #[test]
    fn test_prune_keeps_relays() {
        let mut model = PlacementModel::new();
        model.add_fixed_entity(at(&consumer(), 0, 0));
        let mut network = PowerNetwork::new(&model);
        let pole = small_pole();
        let supplier = network.add_candidate(&mut model, at(&pole, 1, 0)).unwrap();
        // Covers nothing but is wired to the supplier.
        let relay = network.add_candidate(&mut model, at(&pole, 7, 0)).unwrap();
        // Covers nothing and only neighbors the relay.
        let dangling = network.add_candidate(&mut model, at(&pole, 13, 0)).unwrap();
        network.build_coverage();

        assert_eq!(network.prune(&mut model).unwrap(), 1);
        assert_eq!(network.report().pruned, vec![dangling]);
        assert!(model.candidate(dangling).is_none());
        let live: Vec<_> = network.poles().map(|p| p.candidate).collect();
        assert_eq!(live, vec![supplier, relay]);
    }
}
