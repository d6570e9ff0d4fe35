//! Scene Graph and Transform Tests
//!
//! Tests for:
//! - World matrix propagation (parent before child)
//! - Attach / detach / re-parenting bookkeeping
//! - Caller-managed local matrices (matrix_auto_update)
//! - Local matrix decomposition
//! - Pruning traversal
//! - Matrix propagation through invisible nodes

use glam::{Affine3A, Quat, Vec3};

use opal::scene::Node;
use opal::Scene;

const EPSILON: f32 = 1e-5;

fn approx(a: f32, b: f32) -> bool {
    (a - b).abs() < EPSILON
}

fn vec3_approx(a: Vec3, b: Vec3) -> bool {
    approx(a.x, b.x) && approx(a.y, b.y) && approx(a.z, b.z)
}

fn node_at(name: &str, position: Vec3) -> Node {
    let mut node = Node::new(name);
    node.transform.position = position;
    node
}

// ============================================================================
// World matrix propagation
// ============================================================================

#[test]
fn root_world_matrix_equals_local() {
    let mut scene = Scene::new();
    let root = scene.add_node(node_at("root", Vec3::new(3.0, -1.0, 2.0)));

    scene.update_matrix_world(false);

    let node = scene.node(root).unwrap();
    assert_eq!(node.transform.local_matrix(), node.world_matrix());
}

#[test]
fn child_world_matrix_composes_with_parent() {
    let mut scene = Scene::new();
    let root = scene.add_node(node_at("root", Vec3::new(1.0, 0.0, 0.0)));
    let child = scene.add_child(node_at("child", Vec3::new(0.0, 1.0, 0.0)), root);
    let grandchild = scene.add_child(node_at("grandchild", Vec3::new(0.0, 0.0, 1.0)), child);

    scene.update_matrix_world(false);

    let child_world = Vec3::from(scene.node(child).unwrap().world_matrix().translation);
    assert!(vec3_approx(child_world, Vec3::new(1.0, 1.0, 0.0)));

    let grandchild_world = Vec3::from(scene.node(grandchild).unwrap().world_matrix().translation);
    assert!(vec3_approx(grandchild_world, Vec3::new(1.0, 1.0, 1.0)));
}

#[test]
fn every_world_matrix_is_parent_world_times_local() {
    let mut scene = Scene::new();
    let root = scene.add_node(node_at("root", Vec3::new(1.0, 2.0, 3.0)));
    let mut rotated = node_at("rotated", Vec3::new(0.5, 0.0, 0.0));
    rotated.transform.rotation = Quat::from_rotation_y(1.2);
    rotated.transform.scale = Vec3::splat(2.0);
    let mid = scene.add_child(rotated, root);
    let leaf = scene.add_child(node_at("leaf", Vec3::new(0.0, 4.0, 0.0)), mid);

    scene.update_matrix_world(false);

    for key in [mid, leaf] {
        let node = scene.node(key).unwrap();
        let parent = scene.node(node.parent().unwrap()).unwrap();
        let expected = *parent.world_matrix() * *node.transform.local_matrix();
        let got = node.world_matrix();
        assert!(
            got.abs_diff_eq(expected, EPSILON),
            "world != parent world * local for {}",
            node.name
        );
    }
}

#[test]
fn moving_a_parent_updates_the_subtree() {
    let mut scene = Scene::new();
    let root = scene.add_node(node_at("root", Vec3::ZERO));
    let child = scene.add_child(node_at("child", Vec3::new(0.0, 1.0, 0.0)), root);

    scene.update_matrix_world(false);
    scene.node_mut(root).unwrap().transform.position = Vec3::new(10.0, 0.0, 0.0);
    scene.update_matrix_world(false);

    let world = Vec3::from(scene.node(child).unwrap().world_matrix().translation);
    assert!(vec3_approx(world, Vec3::new(10.0, 1.0, 0.0)));
}

// ============================================================================
// Hierarchy bookkeeping
// ============================================================================

#[test]
fn attach_moves_between_parents() {
    let mut scene = Scene::new();
    let a = scene.add_node(node_at("a", Vec3::new(1.0, 0.0, 0.0)));
    let b = scene.add_node(node_at("b", Vec3::new(0.0, 0.0, 5.0)));
    let child = scene.add_child(node_at("child", Vec3::ZERO), a);

    scene.attach(child, b);

    assert!(scene.node(a).unwrap().children().is_empty());
    assert_eq!(scene.node(b).unwrap().children(), &[child]);
    assert_eq!(scene.node(child).unwrap().parent(), Some(b));

    scene.update_matrix_world(false);
    let world = Vec3::from(scene.node(child).unwrap().world_matrix().translation);
    assert!(vec3_approx(world, Vec3::new(0.0, 0.0, 5.0)));
}

#[test]
fn attach_from_root_list_unroots() {
    let mut scene = Scene::new();
    let a = scene.add_node(node_at("a", Vec3::ZERO));
    let b = scene.add_node(node_at("b", Vec3::ZERO));

    scene.attach(b, a);

    assert_eq!(scene.roots(), &[a]);
    assert_eq!(scene.node(b).unwrap().parent(), Some(a));
}

#[test]
fn detach_promotes_to_root() {
    let mut scene = Scene::new();
    let a = scene.add_node(node_at("a", Vec3::new(2.0, 0.0, 0.0)));
    let child = scene.add_child(node_at("child", Vec3::ZERO), a);

    scene.detach(child);

    assert!(scene.node(a).unwrap().children().is_empty());
    assert_eq!(scene.node(child).unwrap().parent(), None);
    assert!(scene.roots().contains(&child));

    scene.update_matrix_world(false);
    let world = Vec3::from(scene.node(child).unwrap().world_matrix().translation);
    assert!(vec3_approx(world, Vec3::ZERO));
}

#[test]
fn remove_node_drops_subtree() {
    let mut scene = Scene::new();
    let a = scene.add_node(node_at("a", Vec3::ZERO));
    let child = scene.add_child(node_at("child", Vec3::ZERO), a);

    scene.remove_node(a);

    assert!(scene.node(a).is_none());
    assert!(scene.node(child).is_none());
    assert!(scene.roots().is_empty());
}

// ============================================================================
// Local matrix management
// ============================================================================

#[test]
fn manual_local_matrix_skips_trs_recompose() {
    let mut scene = Scene::new();
    let key = scene.add_node(Node::new("manual"));

    {
        let node = scene.node_mut(key).unwrap();
        node.transform.matrix_auto_update = false;
        // TRS writes are ignored while auto-update is off.
        node.transform.position = Vec3::new(7.0, 7.0, 7.0);
    }
    scene.update_matrix_world(false);

    let world = Vec3::from(scene.node(key).unwrap().world_matrix().translation);
    assert!(vec3_approx(world, Vec3::ZERO));
}

#[test]
fn set_local_matrix_decomposes_trs() {
    let mut scene = Scene::new();
    let key = scene.add_node(Node::new("decomposed"));

    let mat = Affine3A::from_scale_rotation_translation(
        Vec3::splat(3.0),
        Quat::from_rotation_z(0.5),
        Vec3::new(1.0, 2.0, 3.0),
    );
    scene.node_mut(key).unwrap().transform.set_local_matrix(mat);
    scene.update_matrix_world(false);

    let node = scene.node(key).unwrap();
    assert!(vec3_approx(node.transform.position, Vec3::new(1.0, 2.0, 3.0)));
    assert!(vec3_approx(node.transform.scale, Vec3::splat(3.0)));
    assert!(node.world_matrix().abs_diff_eq(mat, EPSILON));
}

#[test]
fn look_at_points_negative_z_at_target() {
    let mut scene = Scene::new();
    let key = scene.add_node(node_at("looker", Vec3::new(0.0, 0.0, 5.0)));

    scene
        .node_mut(key)
        .unwrap()
        .transform
        .look_at(Vec3::ZERO, Vec3::Y);
    scene.update_matrix_world(false);

    let node = scene.node(key).unwrap();
    let forward = node.transform.rotation * Vec3::NEG_Z;
    assert!(vec3_approx(forward, Vec3::NEG_Z));
}

// ============================================================================
// Traversal
// ============================================================================

#[test]
fn traverse_visits_pre_order_and_prunes() {
    let mut scene = Scene::new();
    let root = scene.add_node(Node::new("root"));
    let skip_me = scene.add_child(Node::new("skip"), root);
    let _hidden_child = scene.add_child(Node::new("hidden"), skip_me);
    let _sibling = scene.add_child(Node::new("sibling"), root);

    let mut visited = Vec::new();
    scene.traverse(|key, node| {
        visited.push(node.name.clone());
        key == skip_me
    });

    assert_eq!(visited, ["root", "skip", "sibling"]);
}

#[test]
fn invisible_nodes_still_propagate_matrices() {
    let mut scene = Scene::new();
    let root = scene.add_node(node_at("root", Vec3::new(4.0, 0.0, 0.0)));
    scene.node_mut(root).unwrap().visible = false;
    let child = scene.add_child(node_at("child", Vec3::new(0.0, 2.0, 0.0)), root);

    scene.update_matrix_world(false);

    let world = Vec3::from(scene.node(child).unwrap().world_matrix().translation);
    assert!(vec3_approx(world, Vec3::new(4.0, 2.0, 0.0)));
}
