// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

#![allow(dead_code)]

use mep_openings_engine::geometry::{BarrierCategory, Centerline, Frame, Segment};
use mep_openings_engine::surface::PARAM_WALL_WIDTH;
use mep_openings_engine::{
    BarrierElement, BarrierId, BarrierShape, CrossSection, MemoryModel, OpeningRecord,
    ParamValue, PathwayId, PathwayKind, PathwaySegment,
};
use nalgebra::{Point3, Vector3};

pub const WALL_HEIGHT: f64 = 3.0;
pub const WALL_LENGTH: f64 = 6.0;

/// Wall centred on `center` (plan), running at plan angle `rotation`
pub fn add_wall(
    model: &mut MemoryModel,
    id: u64,
    center: Point3<f64>,
    thickness: f64,
    rotation: f64,
    frame: Frame,
    with_width_param: bool,
) {
    let dir = Vector3::new(rotation.cos(), rotation.sin(), 0.0) * (WALL_LENGTH / 2.0);
    let base = Point3::new(center.x, center.y, 0.0);
    let barrier = model.add_barrier(
        BarrierElement {
            id: BarrierId(id),
            category: BarrierCategory::Wall,
            frame,
            name: Some(format!("W-{:02}", id)),
        },
        BarrierShape::Cuboid {
            center: Point3::new(center.x, center.y, WALL_HEIGHT / 2.0),
            length: WALL_LENGTH,
            width: thickness,
            height: WALL_HEIGHT,
            rotation,
        },
        Some(Centerline::new(base - dir, base + dir)),
    );
    if with_width_param {
        barrier
            .parameters
            .insert(PARAM_WALL_WIDTH.to_string(), ParamValue::Number(thickness));
    }
}

/// Host wall along X through the origin
pub fn add_host_wall(model: &mut MemoryModel, id: u64, y: f64, thickness: f64) {
    add_wall(model, id, Point3::new(0.0, y, 0.0), thickness, 0.0, Frame::Host, true);
}

pub fn pipe(id: u64, start: Point3<f64>, end: Point3<f64>, diameter: f64) -> PathwaySegment {
    PathwaySegment {
        id: PathwayId(id),
        kind: PathwayKind::Pipe,
        segment: Segment::host(start, end),
        cross_section: CrossSection::Circular { diameter },
        insulated: false,
    }
}

pub fn duct(
    id: u64,
    start: Point3<f64>,
    end: Point3<f64>,
    width: f64,
    height: f64,
) -> PathwaySegment {
    PathwaySegment {
        id: PathwayId(id),
        kind: PathwayKind::Duct,
        segment: Segment::host(start, end),
        cross_section: CrossSection::Rectangular { width, height },
        insulated: false,
    }
}

/// Pipe crossing the wall along X (at y = 0) perpendicularly at `(x, z)`
pub fn crossing_pipe(id: u64, x: f64, z: f64, diameter: f64) -> PathwaySegment {
    pipe(id, Point3::new(x, -1.0, z), Point3::new(x, 1.0, z), diameter)
}

pub fn openings(model: &MemoryModel) -> Vec<OpeningRecord> {
    model.opening_records().map(|(_, r)| r.clone()).collect()
}
