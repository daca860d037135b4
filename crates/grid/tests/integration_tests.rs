//! Integration tests for u-layout-grid.

use std::sync::Arc;
use u_layout_core::{
    CandidateId, Direction, EntityPrototype, ExactConfig, SolutionStatus, TilePosition,
};
use u_layout_grid::{
    BeltConfig, BeltLine, BeltProblem, BeltTier, ConnectivityMode, Entity, HeuristicMode,
    PlacementModel, PowerNetwork,
};

fn at(proto: &Arc<EntityPrototype>, x: i32, y: i32) -> Entity {
    Entity::at_tile(Arc::clone(proto), TilePosition::new(x, y), Direction::North)
}

fn lamp() -> Arc<EntityPrototype> {
    Arc::new(EntityPrototype::new("lamp", 1, 1).with_power_consumption())
}

fn small_pole() -> Arc<EntityPrototype> {
    Arc::new(EntityPrototype::small_pole())
}

fn tier(belt: f64, pair: f64) -> BeltTier {
    BeltTier::new(
        Arc::new(EntityPrototype::transport_belt()),
        Arc::new(EntityPrototype::underground_belt()),
    )
    .with_costs(belt, pair)
}

mod power_tests {
    use super::*;

    struct Scenario {
        model: PlacementModel,
        network: PowerNetwork,
        a: CandidateId,
        b: CandidateId,
        c: CandidateId,
    }

    /// Six lamps; pole A supplies three, B one, C none, two are out of reach.
    fn scenario() -> Scenario {
        let lamp = lamp();
        let mut model = PlacementModel::new();
        for (x, y) in [(-2, 0), (2, 0), (0, 2), (8, 0), (20, 20), (-20, 20)] {
            model.add_fixed_entity(at(&lamp, x, y));
        }
        let mut network = PowerNetwork::new(&model);
        let pole = small_pole();
        let a = network.add_candidate(&mut model, at(&pole, 0, 0)).unwrap();
        let b = network.add_candidate(&mut model, at(&pole, 6, 0)).unwrap();
        let c = network.add_candidate(&mut model, at(&pole, 40, 0)).unwrap();
        network.build_coverage();
        Scenario {
            model,
            network,
            a,
            b,
            c,
        }
    }

    #[test]
    fn test_coverage_and_reporting() {
        let Scenario {
            mut model,
            mut network,
            a,
            b,
            c,
        } = scenario();
        assert_eq!(network.coverage_of(a).len(), 3);
        assert_eq!(network.coverage_of(b).len(), 1);
        assert!(network.coverage_of(c).is_empty());

        network.add_coverage_constraints(&mut model).unwrap();
        let strategy = ConnectivityMode::DistanceDecreasing.strategy();
        network
            .add_connectivity_constraints(&mut model, strategy, None)
            .unwrap();
        assert_eq!(network.report().uncovered.len(), 2);
        assert_eq!(network.report().unreachable, vec![c]);

        model.set_objective();
        let result = model.solve(&ExactConfig::default(), None);
        assert_eq!(result.status, SolutionStatus::Optimal);
        assert_eq!(network.selected_poles(&result), vec![a, b]);
        assert!(!result.is_selected(c));
        assert!((result.objective_value.unwrap() - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_pruning_drops_useless_candidates() {
        let Scenario {
            mut model,
            mut network,
            a,
            b,
            c,
        } = scenario();
        assert_eq!(network.prune(&mut model).unwrap(), 1);
        assert_eq!(network.report().pruned, vec![c]);
        assert!(model.candidate(c).is_none());

        network.add_coverage_constraints(&mut model).unwrap();
        model.set_objective();
        let result = model.solve(&ExactConfig::default(), None);
        assert_eq!(network.selected_poles(&result), vec![a, b]);
        assert!(!result.selection.contains_key(&c));
    }

    /// Existing pole at the origin, a lamp twelve tiles away that only the
    /// far candidate supplies; the middle candidate is a pure relay.
    fn chain(connectivity: Option<ConnectivityMode>) -> (Vec<CandidateId>, f64) {
        let pole = small_pole();
        let mut model = PlacementModel::new();
        model.add_fixed_entity(at(&pole, 0, 0));
        model.add_fixed_entity(at(&lamp(), 14, 0));

        let mut network = PowerNetwork::new(&model);
        network.add_candidate(&mut model, at(&pole, 6, 0)).unwrap();
        network.add_candidate(&mut model, at(&pole, 12, 0)).unwrap();
        network.build_coverage();
        network.add_coverage_constraints(&mut model).unwrap();
        if let Some(mode) = connectivity {
            network
                .add_connectivity_constraints(&mut model, mode.strategy(), None)
                .unwrap();
        }
        model.set_objective();
        let result = model.solve(&ExactConfig::default(), None);
        (
            network.selected_poles(&result),
            result.objective_value.unwrap(),
        )
    }

    #[test]
    fn test_connectivity_pulls_in_relays() {
        for mode in [ConnectivityMode::DistanceDecreasing, ConnectivityMode::RootedDag] {
            let (selected, objective) = chain(Some(mode));
            assert_eq!(selected.len(), 2, "{:?}", mode);
            assert!((objective - 2.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_coverage_only_skips_relays() {
        let (selected, objective) = chain(None);
        assert_eq!(selected.len(), 1);
        assert!((objective - 1.0).abs() < 1e-6);
    }
}

mod belt_tests {
    use super::*;

    fn solve_line(mode: HeuristicMode) -> (String, bool) {
        let mut model = PlacementModel::new();
        let mut belts = BeltProblem::new(BeltConfig::new().with_heuristic(mode));
        belts
            .add_line(BeltLine::straight(
                1,
                TilePosition::new(0, 0),
                Direction::East,
                6,
                vec![tier(1.0, 2.5)],
            ))
            .unwrap();
        belts.build(&mut model).unwrap();
        belts.apply_heuristic(&mut model).unwrap();
        model.set_objective();
        let result = model.solve(&ExactConfig::default(), None);
        assert_eq!(result.status, SolutionStatus::Optimal);
        assert!((result.objective_value.unwrap() - 2.5).abs() < 1e-6);
        (belts.tile_string(1, &result).unwrap(), belts.heuristic_applied())
    }

    #[test]
    fn test_long_skip_in_every_heuristic_mode() {
        assert_eq!(HeuristicMode::default(), HeuristicMode::Off);
        assert_eq!(solve_line(HeuristicMode::Off), (">    <".to_string(), false));
        assert_eq!(solve_line(HeuristicMode::UpperBound), (">    <".to_string(), true));
        assert_eq!(solve_line(HeuristicMode::Fix), (">    <".to_string(), true));
    }

    #[test]
    fn test_exit_range_is_respected() {
        // Seven tiles: one skip cannot span the line.
        let mut model = PlacementModel::new();
        let mut belts = BeltProblem::new(BeltConfig::new().with_heuristic(HeuristicMode::Off));
        belts
            .add_line(BeltLine::straight(
                1,
                TilePosition::new(0, 0),
                Direction::North,
                7,
                vec![tier(1.0, 2.5)],
            ))
            .unwrap();
        belts.build(&mut model).unwrap();
        model.set_objective();
        let result = model.solve(&ExactConfig::default(), None);
        let s = belts.tile_string(1, &result).unwrap();
        assert!((result.objective_value.unwrap() - 3.5).abs() < 1e-6, "{}", s);
        assert_eq!(s.matches('>').count(), 1);
        assert_eq!(s.matches('<').count(), 1);
        assert_eq!(s.matches('=').count(), 1);
    }

    #[test]
    fn test_belts_and_poles_share_a_model() {
        let mut model = PlacementModel::new();
        model.add_fixed_entity(at(&lamp(), 2, 2));

        let mut belts = BeltProblem::new(BeltConfig::default());
        belts
            .add_line(BeltLine::straight(
                1,
                TilePosition::new(0, 0),
                Direction::East,
                6,
                vec![tier(1.0, 2.5)],
            ))
            .unwrap();
        belts.build(&mut model).unwrap();

        // The cheap pole sits on the belt line: taking it means tunnelling.
        let cheap = Arc::new(EntityPrototype::small_pole().with_cost(0.5));
        let mut network = PowerNetwork::new(&model);
        let on_line = network.add_candidate(&mut model, at(&cheap, 2, 0)).unwrap();
        let beside = network
            .add_candidate(&mut model, at(&small_pole(), 3, 1))
            .unwrap();
        network.build_coverage();
        network.add_coverage_constraints(&mut model).unwrap();

        model.add_non_overlapping_constraint().unwrap();
        model.set_objective();
        let result = model.solve(&ExactConfig::default(), None);
        assert!(result.is_selected(on_line));
        assert!(!result.is_selected(beside));
        assert_eq!(belts.tile_string(1, &result).unwrap(), ">    <");
        assert!((result.objective_value.unwrap() - 3.0).abs() < 1e-6);
    }

    /// Three belt tiles and a lamp that only a pole on the middle tile can
    /// supply. Belts alone cost 1.5, so the line must tunnel for 2.5.
    fn pole_on_short_line(mode: Option<HeuristicMode>) -> (String, bool, f64) {
        let mut model = PlacementModel::new();
        model.add_fixed_entity(at(&lamp(), 1, 2));

        let config = mode.map_or_else(BeltConfig::default, |m| BeltConfig::new().with_heuristic(m));
        let mut belts = BeltProblem::new(config);
        belts
            .add_line(BeltLine::straight(
                1,
                TilePosition::new(0, 0),
                Direction::East,
                3,
                vec![tier(0.5, 2.5)],
            ))
            .unwrap();
        belts.build(&mut model).unwrap();

        let mut network = PowerNetwork::new(&model);
        let pole = network.add_candidate(&mut model, at(&small_pole(), 1, 0)).unwrap();
        network.build_coverage();
        network.add_coverage_constraints(&mut model).unwrap();

        assert_eq!(belts.apply_heuristic(&mut model).unwrap(), 0);
        model.add_non_overlapping_constraint().unwrap();
        model.set_objective();
        let result = model.solve(&ExactConfig::default(), None);
        assert_eq!(result.status, SolutionStatus::Optimal, "{:?}", mode);
        (
            belts.tile_string(1, &result).unwrap(),
            result.is_selected(pole),
            result.objective_value.unwrap(),
        )
    }

    #[test]
    fn test_default_config_keeps_pole_on_line_feasible() {
        let (tiles, pole, objective) = pole_on_short_line(None);
        assert_eq!(tiles, "> <");
        assert!(pole);
        assert!((objective - 3.5).abs() < 1e-6);
    }

    #[test]
    fn test_heuristic_skips_lines_under_other_candidates() {
        for mode in [HeuristicMode::Off, HeuristicMode::UpperBound, HeuristicMode::Fix] {
            let (tiles, pole, objective) = pole_on_short_line(Some(mode));
            assert_eq!(tiles, "> <", "{:?}", mode);
            assert!(pole);
            assert!((objective - 3.5).abs() < 1e-6);
        }
    }
}

mod spatial_tests {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use u_layout_core::{BoundingBox, CandidateId, Position, Shape};
    use u_layout_grid::{Footprint, Spatial, SpatialIndex};

    fn random_box(rng: &mut StdRng) -> BoundingBox {
        let x = rng.gen_range(-20.0..20.0);
        let y = rng.gen_range(-20.0..20.0);
        let w = rng.gen_range(0.2..4.0);
        let h = rng.gen_range(0.2..4.0);
        BoundingBox::new(x, y, x + w, y + h)
    }

    fn ids<'a>(found: impl IntoIterator<Item = &'a Footprint>) -> Vec<usize> {
        let mut ids: Vec<usize> = found.into_iter().map(|f| f.id.index()).collect();
        ids.sort_unstable();
        ids
    }

    #[test]
    fn test_queries_match_linear_scan() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut objects: Vec<Footprint> = (0..300)
            .map(|i| {
                let b = random_box(&mut rng);
                Footprint {
                    id: CandidateId::new(i),
                    position: b.center(),
                    shape: Shape::Rect(b),
                }
            })
            .collect();
        let mut index = SpatialIndex::with_objects(objects.iter().cloned());

        for round in 0..2 {
            for _ in 0..100 {
                let area = random_box(&mut rng);
                let expected = ids(objects.iter().filter(|o| o.shape().intersects_box(&area)));
                assert_eq!(ids(index.get_in_area(&area)), expected, "round {}", round);

                let shape = Shape::Rect(area);
                let expected = ids(objects.iter().filter(|o| o.shape().intersects(&shape)));
                assert_eq!(ids(index.get_colliding(&shape)), expected);

                let center = Position::new(rng.gen_range(-20.0..20.0), rng.gen_range(-20.0..20.0));
                let radius = rng.gen_range(0.0..6.0);
                let expected = ids(
                    objects
                        .iter()
                        .filter(|o| o.position().distance(&center) <= radius),
                );
                assert_eq!(ids(index.get_pos_in_circle(center, radius)), expected);
            }

            // Second round runs against a thinned index.
            let removed: Vec<Footprint> = objects.iter().step_by(2).cloned().collect();
            for o in &removed {
                assert!(index.remove(o));
            }
            objects.retain(|o| o.id.index() % 2 == 1);
            assert_eq!(index.len(), objects.len());
        }
    }
}
