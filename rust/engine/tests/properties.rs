// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

mod common;

use approx::assert_relative_eq;
use common::*;
use mep_openings_engine::geometry::{BarrierCategory, Centerline, Frame, PenetrationMethod};
use mep_openings_engine::surface::{PARAM_FLOOR_THICKNESS, PARAM_FRAMING_WIDTH};
use mep_openings_engine::{
    BarrierElement, BarrierId, BarrierShape, Error, MemoryModel, OpeningKind, ParamValue,
    PathwayId, PlacementConfig, PlacementCoordinator, SegmentStatus,
};
use nalgebra::Point3;
use std::f64::consts::FRAC_PI_2;

fn two_overlapping_pipes() -> MemoryModel {
    let mut model = MemoryModel::new();
    add_host_wall(&mut model, 1, 0.0, 0.2);
    model.add_pathway(crossing_pipe(10, 0.0, 1.2, 0.05));
    model.add_pathway(crossing_pipe(11, 0.12, 1.2, 0.05));
    model
}

fn without_merge() -> PlacementCoordinator {
    let mut config = PlacementConfig::default();
    config.merge.enabled = false;
    PlacementCoordinator::new(config)
}

#[test]
fn one_opening_per_segment_even_through_two_walls() {
    let mut model = MemoryModel::new();
    add_host_wall(&mut model, 1, 0.0, 0.2);
    add_host_wall(&mut model, 2, 2.0, 0.2);
    let (start, end) = (Point3::new(0.0, -1.0, 1.2), Point3::new(0.0, 3.0, 1.2));
    model.add_pathway(pipe(10, start, end, 0.1));

    let coordinator = PlacementCoordinator::default();
    let report = coordinator.run(&mut model).unwrap();
    assert_eq!(report.placed, 1);
    assert_eq!(model.opening_count(), 1);

    let again = coordinator.run(&mut model).unwrap();
    assert_eq!(again.placed, 0);
    assert_eq!(again.suppressed, 1);
    assert_eq!(model.opening_count(), 1);
}

#[test]
fn duplicate_pathways_in_one_pass_see_each_others_openings() {
    let mut model = MemoryModel::new();
    add_host_wall(&mut model, 1, 0.0, 0.2);
    model.add_pathway(crossing_pipe(10, 0.5, 1.2, 0.1));
    model.add_pathway(crossing_pipe(11, 0.5, 1.2, 0.1));

    let report = PlacementCoordinator::default().run(&mut model).unwrap();
    assert_eq!(report.placed, 1);
    assert_eq!(report.suppressed, 1);
    let placed = match report.outcome(PathwayId(10)) {
        Some(SegmentStatus::Placed { opening, .. }) => *opening,
        other => panic!("expected placement, got {:?}", other),
    };
    assert!(matches!(
        report.outcome(PathwayId(11)),
        Some(SegmentStatus::Suppressed { existing, .. }) if *existing == placed
    ));
}

#[test]
fn depth_matches_the_pierced_barrier() {
    let mut model = MemoryModel::new();
    let walls = [(1, 0.0, 0.15, true), (2, 10.0, 0.30, true), (3, 20.0, 0.25, false)];
    for &(id, x, thickness, param) in &walls {
        let center = Point3::new(x, 0.0, 0.0);
        add_wall(&mut model, id, center, thickness, 0.0, Frame::Host, param);
        model.add_pathway(crossing_pipe(id + 10, x, 1.2, 0.1));
    }

    let report = without_merge().run(&mut model).unwrap();
    assert_eq!(report.placed, 3);
    for opening in openings(&model) {
        let barrier = opening.barrier.unwrap();
        let expected = walls.iter().find(|w| BarrierId(w.0) == barrier).unwrap().2;
        assert_relative_eq!(opening.depth, expected, epsilon = 1e-9);
    }
}

#[test]
fn floor_openings_take_slab_thickness_and_midpoint() {
    let mut model = MemoryModel::new();
    model
        .add_barrier(
            BarrierElement {
                id: BarrierId(5),
                category: BarrierCategory::Floor,
                frame: Frame::Host,
                name: None,
            },
            BarrierShape::Cuboid {
                center: Point3::new(0.0, 0.0, 3.0),
                length: 6.0,
                width: 6.0,
                height: 0.25,
                rotation: 0.0,
            },
            None,
        )
        .parameters
        .insert(PARAM_FLOOR_THICKNESS.to_string(), ParamValue::Number(0.25));
    let (start, end) = (Point3::new(1.0, 1.0, 2.0), Point3::new(1.0, 1.0, 4.0));
    model.add_pathway(pipe(10, start, end, 0.1));

    let report = PlacementCoordinator::default().run(&mut model).unwrap();
    assert_eq!(report.placed, 1);
    let opening = openings(&model).pop().unwrap();
    assert_eq!(opening.category, BarrierCategory::Floor);
    assert_relative_eq!(opening.depth, 0.25, epsilon = 1e-12);
    assert_relative_eq!(opening.placement, Point3::new(1.0, 1.0, 3.0), epsilon = 1e-9);
}

#[test]
fn beam_openings_take_cross_section_width_and_sit_on_the_axis() {
    let mut model = MemoryModel::new();
    model
        .add_barrier(
            BarrierElement {
                id: BarrierId(7),
                category: BarrierCategory::Framing,
                frame: Frame::Host,
                name: Some("B-01".into()),
            },
            BarrierShape::Cuboid {
                center: Point3::new(0.0, 0.0, 3.0),
                length: 6.0,
                width: 0.3,
                height: 0.4,
                rotation: 0.0,
            },
            Some(Centerline::new(Point3::new(-3.0, 0.0, 3.0), Point3::new(3.0, 0.0, 3.0))),
        )
        .parameters
        .insert(PARAM_FRAMING_WIDTH.to_string(), ParamValue::Number(0.3));
    let (start, end) = (Point3::new(1.0, -1.0, 3.0), Point3::new(1.0, 1.0, 3.0));
    model.add_pathway(pipe(10, start, end, 0.1));

    let report = PlacementCoordinator::default().run(&mut model).unwrap();
    assert_eq!(report.placed, 1);
    let opening = openings(&model).pop().unwrap();
    assert_eq!(opening.category, BarrierCategory::Framing);
    assert_eq!(opening.barrier, Some(BarrierId(7)));
    assert_eq!(opening.method, Some(PenetrationMethod::Exact));
    assert_relative_eq!(opening.depth, 0.3, epsilon = 1e-12);
    assert_relative_eq!(opening.placement, Point3::new(1.0, 0.0, 3.0), epsilon = 1e-9);
}

#[test]
fn merged_opening_covers_every_replaced_original() {
    let mut base = MemoryModel::new();
    add_host_wall(&mut base, 1, 0.0, 0.2);
    for (i, x) in [0.0, 0.13, 0.26].iter().enumerate() {
        base.add_pathway(crossing_pipe(10 + i as u64, *x, 1.2, 0.05));
    }

    let mut discrete = base.clone();
    without_merge().run(&mut discrete).unwrap();
    let originals = openings(&discrete);
    assert_eq!(originals.len(), 3);

    let mut merged_model = base;
    let report = PlacementCoordinator::default().run(&mut merged_model).unwrap();
    assert_eq!(report.merge.replaced, 3);
    let merged = openings(&merged_model).pop().unwrap();
    assert_eq!(merged.kind, OpeningKind::Merged);

    let cover = merged.local_bounds();
    for original in &originals {
        for corner in original.local_bounds().corners() {
            assert!(cover.contains_point(&corner, 1e-9), "{:?} not covered", corner);
        }
    }
}

#[test]
fn rotating_the_wall_swaps_width_and_height() {
    let mut along_x = MemoryModel::new();
    add_host_wall(&mut along_x, 1, 0.0, 0.2);
    let (start, end) = (Point3::new(0.0, -1.0, 1.2), Point3::new(0.0, 1.0, 1.2));
    along_x.add_pathway(duct(10, start, end, 0.4, 0.2));

    let mut along_y = MemoryModel::new();
    add_wall(&mut along_y, 1, Point3::origin(), 0.2, FRAC_PI_2, Frame::Host, true);
    let (start, end) = (Point3::new(-1.0, 0.0, 1.2), Point3::new(1.0, 0.0, 1.2));
    along_y.add_pathway(duct(10, start, end, 0.4, 0.2));

    PlacementCoordinator::default().run(&mut along_x).unwrap();
    PlacementCoordinator::default().run(&mut along_y).unwrap();
    let a = openings(&along_x).pop().unwrap();
    let b = openings(&along_y).pop().unwrap();

    assert!(!a.swapped);
    assert!(b.swapped);
    assert_relative_eq!(a.width(), b.height(), epsilon = 1e-9);
    assert_relative_eq!(a.height(), b.width(), epsilon = 1e-9);
    assert_relative_eq!(a.width(), 0.5, epsilon = 1e-9);
    assert_relative_eq!(a.horizontal_span(), b.horizontal_span(), epsilon = 1e-9);
    assert_relative_eq!(a.depth, b.depth, epsilon = 1e-12);
}

#[test]
fn merged_pass_is_idempotent() {
    let mut model = two_overlapping_pipes();
    let coordinator = PlacementCoordinator::default();
    coordinator.run(&mut model).unwrap();
    let before = openings(&model);

    let report = coordinator.run(&mut model).unwrap();
    assert_eq!(report.placed, 0);
    assert_eq!(report.suppressed, 2);
    assert_eq!(report.merge.merged, 0);
    assert_eq!(openings(&model), before);
}

#[test]
fn failed_delete_rolls_back_the_whole_batch() {
    let mut model = two_overlapping_pipes();
    model.faults.fatal_deletes = true;

    let result = PlacementCoordinator::default().run(&mut model);
    assert!(matches!(result, Err(Error::Batch(_))));
    assert_eq!(model.opening_count(), 0);
    assert!(!model.in_batch());
}

#[test]
fn refused_merge_keeps_the_originals() {
    let mut model = two_overlapping_pipes();
    model.faults.reject_kinds = vec![OpeningKind::Merged];

    let report = PlacementCoordinator::default().run(&mut model).unwrap();
    assert_eq!(report.merge.failed, 1);
    assert_eq!(report.merge.merged, 0);
    let kinds: Vec<OpeningKind> = openings(&model).iter().map(|o| o.kind).collect();
    assert_eq!(kinds, vec![OpeningKind::Round, OpeningKind::Round]);
}

#[test]
fn placement_fault_is_counted_and_the_pass_continues() {
    let mut model = MemoryModel::new();
    add_host_wall(&mut model, 1, 0.0, 0.2);
    model.add_pathway(crossing_pipe(10, -1.0, 1.2, 0.1));
    let (start, end) = (Point3::new(1.0, -1.0, 1.2), Point3::new(1.0, 1.0, 1.2));
    model.add_pathway(duct(11, start, end, 0.4, 0.2));
    model.faults.reject_kinds = vec![OpeningKind::Round];

    let report = PlacementCoordinator::default().run(&mut model).unwrap();
    assert_eq!(report.errored, 1);
    assert_eq!(report.placed, 1);
    assert!(matches!(report.outcome(PathwayId(10)), Some(SegmentStatus::Errored(_))));
    assert_eq!(openings(&model)[0].kind, OpeningKind::Rectangular);
}

#[test]
fn fatal_creation_midway_leaves_no_partial_state() {
    let mut model = MemoryModel::new();
    add_host_wall(&mut model, 1, 0.0, 0.2);
    model.add_pathway(crossing_pipe(10, -2.0, 1.2, 0.1));
    model.add_pathway(crossing_pipe(11, 2.0, 1.2, 0.1));
    model.faults.fatal_after_creates = Some(1);

    let result = PlacementCoordinator::default().run(&mut model);
    assert!(matches!(result, Err(Error::Batch(_))));
    assert_eq!(model.opening_count(), 0);
}

#[test]
fn unusable_geometry_is_degenerate_not_an_error() {
    let mut model = MemoryModel::new();
    model.add_barrier(
        BarrierElement {
            id: BarrierId(1),
            category: BarrierCategory::Wall,
            frame: Frame::Host,
            name: None,
        },
        BarrierShape::Missing,
        None,
    );
    model.add_pathway(crossing_pipe(10, 0.0, 1.2, 0.1));
    model.add_pathway(pipe(11, Point3::new(0.0, 0.0, 1.2), Point3::new(0.0, 0.0, 1.2), 0.1));

    let report = PlacementCoordinator::default().run(&mut model).unwrap();
    assert_eq!(report.degenerate, 2);
    assert_eq!(report.errored, 0);
    assert!(matches!(report.outcome(PathwayId(10)), Some(SegmentStatus::Degenerate(_))));
    assert!(matches!(report.outcome(PathwayId(11)), Some(SegmentStatus::Degenerate(_))));
    assert_eq!(model.opening_count(), 0);
}

#[test]
fn insulated_pipes_get_the_smaller_clearance() {
    let mut model = MemoryModel::new();
    add_host_wall(&mut model, 1, 0.0, 0.2);
    let mut insulated = crossing_pipe(10, 0.0, 1.2, 0.1);
    insulated.insulated = true;
    model.add_pathway(insulated);

    PlacementCoordinator::default().run(&mut model).unwrap();
    let opening = openings(&model).pop().unwrap();
    assert_relative_eq!(opening.width(), 0.15, epsilon = 1e-9);
}

#[test]
fn report_serializes_for_the_cli() {
    let mut model = two_overlapping_pipes();
    let report = PlacementCoordinator::default().run(&mut model).unwrap();
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["placed"], 2);
    assert_eq!(json["merge"]["merged"], 1);
    assert_eq!(json["outcomes"].as_array().map(|a| a.len()), Some(2));
}
