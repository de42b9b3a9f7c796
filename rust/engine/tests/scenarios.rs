// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

mod common;

use approx::assert_relative_eq;
use common::*;
use mep_openings_engine::geometry::{
    Frame, IntersectionEngine, LinkId, LinkTransform, PenetrationMethod, Segment,
};
use mep_openings_engine::surface::{PARAM_HOST_BARRIER, PARAM_SOURCE_PATHWAY};
use mep_openings_engine::{
    BarrierId, ElementRef, GeometrySource, LinkedModel, MemoryModel, OpeningKind, OpeningShape,
    ParamValue, ParameterSurface, PathwayId, PlacementCoordinator, SegmentStatus,
};
use nalgebra::{Point3, Vector3};
use std::f64::consts::FRAC_PI_2;

fn scenario_a() -> MemoryModel {
    let mut model = MemoryModel::new();
    add_host_wall(&mut model, 1, 0.0, 0.2);
    model.add_pathway(crossing_pipe(10, 0.5, 1.2, 0.1));
    model
}

#[test]
fn pipe_through_wall_places_one_padded_round_opening() {
    let mut model = scenario_a();
    let report = PlacementCoordinator::default().run(&mut model).unwrap();

    assert_eq!(report.placed, 1);
    assert_eq!(report.no_penetration, 0);
    assert_eq!(model.opening_count(), 1);

    let (id, opening) = model.opening_records().next().unwrap();
    assert_eq!(opening.kind, OpeningKind::Round);
    match opening.shape {
        OpeningShape::Round { diameter } => assert_relative_eq!(diameter, 0.2, epsilon = 1e-9),
        other => panic!("expected a round opening, got {:?}", other),
    }
    assert_relative_eq!(opening.depth, 0.2, epsilon = 1e-12);
    assert_relative_eq!(opening.placement, Point3::new(0.5, 0.0, 1.2), epsilon = 1e-9);
    assert_eq!(opening.source_pathway, Some(PathwayId(10)));
    assert_eq!(opening.method, Some(PenetrationMethod::Exact));

    assert_eq!(
        model.parameter(ElementRef::Opening(id), PARAM_SOURCE_PATHWAY),
        Some(ParamValue::Id(10))
    );
    assert_eq!(
        model.parameter(ElementRef::Opening(id), PARAM_HOST_BARRIER),
        Some(ParamValue::Id(1))
    );
    assert!(!model.in_batch());
}

#[test]
fn oblique_pipe_is_anchored_on_the_wall_centerline() {
    let mut model = MemoryModel::new();
    add_host_wall(&mut model, 1, 0.0, 0.2);
    let (start, end) = (Point3::new(-1.0, -1.0, 1.2), Point3::new(1.0, 1.0, 1.2));
    model.add_pathway(pipe(10, start, end, 0.1));

    PlacementCoordinator::default().run(&mut model).unwrap();
    let opening = openings(&model).pop().unwrap();
    assert_relative_eq!(opening.placement, Point3::new(0.0, 0.0, 1.2), epsilon = 1e-9);
}

#[test]
fn overlapping_openings_merge_into_one_rectangle() {
    let mut model = MemoryModel::new();
    add_host_wall(&mut model, 1, 0.0, 0.2);
    // 50 mm pipes + 50 mm clearance per side = 150 mm openings, 120 mm apart
    model.add_pathway(crossing_pipe(10, 0.0, 1.2, 0.05));
    model.add_pathway(crossing_pipe(11, 0.12, 1.2, 0.05));

    let report = PlacementCoordinator::default().run(&mut model).unwrap();
    assert_eq!(report.placed, 2);
    assert_eq!(report.merge.clusters, 1);
    assert_eq!(report.merge.merged, 1);
    assert_eq!(report.merge.replaced, 2);

    let all = openings(&model);
    assert_eq!(all.len(), 1);
    let merged = &all[0];
    assert_eq!(merged.kind, OpeningKind::Merged);
    assert!(!merged.swapped);
    assert_relative_eq!(merged.width(), 0.27, epsilon = 1e-9);
    assert_relative_eq!(merged.height(), 0.15, epsilon = 1e-9);
    assert_relative_eq!(merged.depth, 0.2, epsilon = 1e-12);
    assert_relative_eq!(merged.placement, Point3::new(0.06, 0.0, 1.2), epsilon = 1e-9);
    assert_eq!(merged.barrier, Some(BarrierId(1)));
}

#[test]
fn pathway_away_from_every_barrier_is_no_penetration() {
    let mut model = MemoryModel::new();
    add_host_wall(&mut model, 1, 0.0, 0.2);
    let (start, end) = (Point3::new(50.0, -1.0, 1.2), Point3::new(50.0, 1.0, 1.2));
    model.add_pathway(pipe(10, start, end, 0.1));

    let report = PlacementCoordinator::default().run(&mut model).unwrap();
    assert_eq!(report.no_penetration, 1);
    assert_eq!(report.placed, 0);
    assert_eq!(report.degraded_scans, 1);
    assert_eq!(report.outcome(PathwayId(10)), Some(&SegmentStatus::NoPenetration));
    assert_eq!(model.opening_count(), 0);
}

#[test]
fn second_pass_suppresses_existing_opening() {
    let mut model = scenario_a();
    let coordinator = PlacementCoordinator::default();
    coordinator.run(&mut model).unwrap();
    let before = openings(&model);

    let report = coordinator.run(&mut model).unwrap();
    assert_eq!(report.placed, 0);
    assert_eq!(report.suppressed, 1);
    assert!(matches!(
        report.outcome(PathwayId(10)),
        Some(SegmentStatus::Suppressed { barrier: BarrierId(1), .. })
    ));
    assert_eq!(openings(&model), before);
}

#[test]
fn linked_barrier_placement_round_trips_through_link_transform() {
    let link = LinkId(3);
    let transform =
        LinkTransform::from_translation_rotation(Vector3::new(10.0, 5.0, 0.0), FRAC_PI_2);

    let mut model = MemoryModel::new();
    model.add_link(LinkedModel {
        id: link,
        name: "structure".into(),
        transform: *transform.matrix(),
        visible: true,
    });
    // Wall along the link's local X axis, i.e. along host Y at x = 10
    add_wall(&mut model, 1, Point3::origin(), 0.2, 0.0, Frame::Linked(link), true);
    let host_start = Point3::new(9.0, 5.5, 1.2);
    let host_end = Point3::new(11.0, 5.5, 1.2);
    model.add_pathway(pipe(10, host_start, host_end, 0.1));

    let report = PlacementCoordinator::default().run(&mut model).unwrap();
    assert_eq!(report.placed, 1);
    let opening = openings(&model).pop().unwrap();

    // Intersect independently in the link's frame and map the result back
    let geometry = model.barrier_geometry(BarrierId(1)).unwrap();
    let local = Segment::new(
        transform.point_to_local(&host_start),
        transform.point_to_local(&host_end),
        Frame::Linked(link),
    );
    let hit = IntersectionEngine::default()
        .intersect(&local, &geometry)
        .unwrap()
        .into_hit()
        .unwrap();
    let expected = transform.point_to_host(&hit.placement);

    assert_relative_eq!(opening.placement, expected, epsilon = 1e-9);
    assert_relative_eq!(opening.placement, Point3::new(10.0, 5.5, 1.2), epsilon = 1e-9);
    assert_relative_eq!(opening.depth, 0.2, epsilon = 1e-12);
    assert_relative_eq!(opening.rotation.abs(), FRAC_PI_2, epsilon = 1e-9);
}

#[test]
fn hidden_linked_models_are_ignored() {
    let link = LinkId(3);
    let mut model = MemoryModel::new();
    model.add_link(LinkedModel {
        id: link,
        name: "structure".into(),
        transform: *LinkTransform::identity().matrix(),
        visible: false,
    });
    add_wall(&mut model, 1, Point3::origin(), 0.2, 0.0, Frame::Linked(link), true);
    model.add_pathway(crossing_pipe(10, 0.0, 1.2, 0.1));

    let report = PlacementCoordinator::default().run(&mut model).unwrap();
    assert_eq!(report.placed, 0);
    assert_eq!(report.no_penetration, 1);
    assert_eq!(model.opening_count(), 0);
}
