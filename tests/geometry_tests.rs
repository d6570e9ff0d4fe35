//! Geometry and Attribute Tests
//!
//! Tests for:
//! - Attribute finalization defaults (type inference, target, count)
//! - Draw-range derivation (index wins over vertex attributes)
//! - Instance-count derivation and mismatch clamping
//! - Explicit draw-range / instance-count overrides
//! - Bounds computation from the position attribute

use glam::Vec3;

use opal::gl::{BufferTarget, BufferUsage, DataType};
use opal::utils::warning_count;
use opal::{AttributeDesc, Geometry};

const EPSILON: f32 = 1e-5;

fn approx(a: f32, b: f32) -> bool {
    (a - b).abs() < EPSILON
}

fn positions(count: usize) -> Vec<f32> {
    let tri = [[-0.5f32, -0.5, 0.0], [0.5, -0.5, 0.0], [0.0, 0.5, 0.0]];
    let mut data = Vec::with_capacity(count * 3);
    for i in 0..count {
        data.extend_from_slice(&tri[i % 3]);
    }
    data
}

// ============================================================================
// Attribute finalization
// ============================================================================

#[test]
fn vertex_attribute_defaults() {
    let mut geometry = Geometry::new();
    geometry.add_attribute("position", AttributeDesc::f32(positions(3)).size(3));

    let attr = geometry.attribute("position").unwrap();
    assert_eq!(attr.size, 3);
    assert_eq!(attr.data_type, DataType::F32);
    assert_eq!(attr.target, BufferTarget::Array);
    assert_eq!(attr.usage, BufferUsage::Static);
    assert_eq!(attr.count, 3);
    assert_eq!(attr.divisor, 0);
    assert!(attr.needs_update());
    assert!(attr.buffer().is_none());
}

#[test]
fn index_attribute_targets_element_buffer() {
    let mut geometry = Geometry::new();
    geometry.set_index(AttributeDesc::u16(vec![0, 1, 2, 2, 1, 0]));

    let index = geometry.index_attribute().unwrap();
    assert_eq!(index.data_type, DataType::U16);
    assert_eq!(index.target, BufferTarget::ElementArray);
    assert_eq!(index.count, 6);
}

#[test]
fn count_derives_from_stride_when_set() {
    let mut geometry = Geometry::new();
    // 24 floats = 96 bytes of interleaved data, 24-byte stride -> 4 vertices.
    geometry.add_attribute(
        "position",
        AttributeDesc::f32(vec![0.0; 24]).size(3).stride(24),
    );

    assert_eq!(geometry.attribute("position").unwrap().count, 4);
}

// ============================================================================
// Draw-range derivation
// ============================================================================

#[test]
fn draw_range_from_longest_vertex_attribute() {
    let mut geometry = Geometry::new();
    geometry.add_attribute("position", AttributeDesc::f32(positions(3)).size(3));
    geometry.add_attribute("uv", AttributeDesc::f32(vec![0.0; 12]).size(2));

    // uv has 6 elements, position 3; longest wins without an index.
    assert_eq!(geometry.draw_range.count, 6);
    assert_eq!(geometry.draw_range.start, 0);
}

#[test]
fn index_overrides_vertex_count() {
    let mut geometry = Geometry::new();
    geometry.add_attribute("position", AttributeDesc::f32(positions(4)).size(3));
    assert_eq!(geometry.draw_range.count, 4);

    geometry.set_index(AttributeDesc::u16(vec![0, 1, 2, 0, 2, 3, 1, 2, 3]));
    assert_eq!(geometry.draw_range.count, 9);

    // Later vertex attributes no longer affect the range once indexed.
    geometry.add_attribute("normal", AttributeDesc::f32(vec![0.0; 60]).size(3));
    assert_eq!(geometry.draw_range.count, 9);
}

#[test]
fn explicit_draw_range_override() {
    let mut geometry = Geometry::new();
    geometry.add_attribute("position", AttributeDesc::f32(positions(6)).size(3));

    geometry.set_draw_range(2, 3);
    assert_eq!(geometry.draw_range.start, 2);
    assert_eq!(geometry.draw_range.count, 3);
}

// ============================================================================
// Instancing
// ============================================================================

#[test]
fn instanced_count_is_count_times_divisor() {
    let mut geometry = Geometry::new();
    geometry.add_attribute("position", AttributeDesc::f32(positions(3)).size(3));
    geometry.add_attribute(
        "offset",
        AttributeDesc::f32(vec![0.0; 30]).size(3).instanced(1),
    );

    assert!(geometry.is_instanced());
    assert_eq!(geometry.instanced_count, 10);
    // Instanced streams never contribute to the vertex draw range.
    assert_eq!(geometry.draw_range.count, 3);
}

#[test]
fn mismatched_instance_counts_clamp_to_minimum() {
    let before = warning_count();

    let mut geometry = Geometry::new();
    geometry.add_attribute(
        "offset",
        AttributeDesc::f32(vec![0.0; 30]).size(3).instanced(1),
    );
    geometry.add_attribute(
        "tint",
        AttributeDesc::f32(vec![0.0; 32]).size(4).instanced(1),
    );

    // 10 offsets vs 8 tints: under-draw rather than read out of bounds.
    assert_eq!(geometry.instanced_count, 8);
    assert!(warning_count() > before, "clamp must record a diagnostic");
}

#[test]
fn explicit_instanced_count_override() {
    let mut geometry = Geometry::new();
    geometry.add_attribute(
        "offset",
        AttributeDesc::f32(vec![0.0; 30]).size(3).instanced(1),
    );

    geometry.set_instanced_count(4);
    assert_eq!(geometry.instanced_count, 4);
}

// ============================================================================
// Bounds
// ============================================================================

#[test]
fn bounds_cover_positions() {
    let mut geometry = Geometry::new();
    geometry.add_attribute(
        "position",
        AttributeDesc::f32(vec![
            -1.0, -2.0, 0.0, //
            3.0, 2.0, 0.0, //
            1.0, 0.0, 4.0,
        ])
        .size(3),
    );

    let bounds = geometry.bounds();
    assert!(approx(bounds.min.x, -1.0));
    assert!(approx(bounds.min.y, -2.0));
    assert!(approx(bounds.max.x, 3.0));
    assert!(approx(bounds.max.z, 4.0));

    let center = Vec3::new(1.0, 0.0, 2.0);
    assert!(approx(bounds.center.x, center.x));
    assert!(approx(bounds.center.z, center.z));
    assert!(bounds.radius > 0.0 && bounds.radius.is_finite());
}

#[test]
fn bounds_without_positions_are_unbounded() {
    let geometry = Geometry::new();
    let bounds = geometry.bounds();
    assert!(!bounds.radius.is_finite());
}
