//! Camera and Frustum Tests
//!
//! Tests for:
//! - View matrix derivation from the node's world transform
//! - Perspective / orthographic reconfiguration
//! - Frustum plane extraction and sphere intersection

use glam::Vec3;

use opal::scene::Projection;
use opal::{Camera, Scene};

const EPSILON: f32 = 1e-4;

fn approx(a: f32, b: f32) -> bool {
    (a - b).abs() < EPSILON
}

#[test]
fn view_matrix_is_world_inverse() {
    let mut scene = Scene::new();
    let node = scene.add_camera(Camera::new_perspective(60.0, 1.0, 0.1, 100.0));
    scene.node_mut(node).unwrap().transform.position = Vec3::new(0.0, 2.0, 5.0);

    scene.update_matrix_world(false);

    let camera = scene.camera_of(node).unwrap();
    assert!(approx(camera.world_position().y, 2.0));
    assert!(approx(camera.world_position().z, 5.0));

    // The view matrix maps the camera's own position to the origin.
    let eye = camera.view_matrix().transform_point3(Vec3::new(0.0, 2.0, 5.0));
    assert!(eye.length() < EPSILON);
}

#[test]
fn perspective_fov_is_stored_in_radians() {
    let camera = Camera::new_perspective(90.0, 1.5, 0.1, 10.0);
    match camera.projection {
        Projection::Perspective { fov, aspect, .. } => {
            assert!(approx(fov, 90.0f32.to_radians()));
            assert!(approx(aspect, 1.5));
        }
        Projection::Orthographic { .. } => panic!("expected perspective projection"),
    }
}

#[test]
fn reconfiguring_projection_rebuilds_the_matrix() {
    let mut camera = Camera::new_perspective(60.0, 1.0, 0.1, 100.0);
    let perspective = *camera.projection_matrix();

    camera.set_orthographic(-2.0, 2.0, -2.0, 2.0, 0.1, 100.0);
    assert_ne!(*camera.projection_matrix(), perspective);

    // Orthographic projection has no perspective term.
    let m = camera.projection_matrix();
    assert!(approx(m.row(3).z, 0.0));
    assert!(approx(m.row(3).w, 1.0));
}

#[test]
fn frustum_contains_points_in_front() {
    let mut scene = Scene::new();
    let node = scene.add_camera(Camera::new_perspective(60.0, 1.0, 0.1, 100.0));
    scene.update_matrix_world(false);

    let camera = scene.camera_of_mut(node).unwrap();
    camera.update_frustum();

    let frustum = camera.frustum();
    assert!(frustum.intersects_sphere(Vec3::new(0.0, 0.0, -5.0), 0.5));
    assert!(frustum.intersects_sphere(Vec3::new(0.0, 0.0, -99.0), 0.5));
}

#[test]
fn frustum_rejects_points_behind_and_past_far() {
    let mut scene = Scene::new();
    let node = scene.add_camera(Camera::new_perspective(60.0, 1.0, 0.1, 100.0));
    scene.update_matrix_world(false);

    let camera = scene.camera_of_mut(node).unwrap();
    camera.update_frustum();

    let frustum = camera.frustum();
    assert!(!frustum.intersects_sphere(Vec3::new(0.0, 0.0, 10.0), 0.5));
    assert!(!frustum.intersects_sphere(Vec3::new(0.0, 0.0, -200.0), 0.5));
}

#[test]
fn frustum_respects_sphere_radius() {
    let mut scene = Scene::new();
    let node = scene.add_camera(Camera::new_perspective(60.0, 1.0, 0.1, 100.0));
    scene.update_matrix_world(false);

    let camera = scene.camera_of_mut(node).unwrap();
    camera.update_frustum();

    let frustum = camera.frustum();
    // Center sits behind the near plane, but a large radius pokes through.
    assert!(!frustum.intersects_sphere(Vec3::new(0.0, 0.0, 2.0), 0.5));
    assert!(frustum.intersects_sphere(Vec3::new(0.0, 0.0, 2.0), 5.0));
}

#[test]
fn frustum_follows_camera_movement() {
    let mut scene = Scene::new();
    let node = scene.add_camera(Camera::new_perspective(60.0, 1.0, 0.1, 100.0));
    scene.node_mut(node).unwrap().transform.position = Vec3::new(0.0, 0.0, 50.0);
    scene.update_matrix_world(false);

    let camera = scene.camera_of_mut(node).unwrap();
    camera.update_frustum();

    let frustum = camera.frustum();
    // World origin is now well inside the view volume.
    assert!(frustum.intersects_sphere(Vec3::ZERO, 0.5));
    // Points behind the moved camera are not.
    assert!(!frustum.intersects_sphere(Vec3::new(0.0, 0.0, 60.0), 0.5));
}
