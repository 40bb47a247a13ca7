//! The scene graph and its per-frame update pass.

use ahash::AHashMap;
use glam::Affine2;
use slotmap::SlotMap;

use crate::events::{Event, EventBus};
use crate::id::NodeId;
use crate::matrix::{self, BoundsMargin, Rect};
use crate::node::{Node, RenderState, WorldState};
use crate::text_layout::TextLayoutProps;
use crate::zorder;

/// Owns the node arena and drives the update pass.
pub struct Scene {
    nodes: SlotMap<NodeId, Node>,
    root: NodeId,
    next_insertion_seq: u64,
    pending_destroy: Vec<NodeId>,
    /// How many children changed `z_index` on a given parent this frame;
    /// consumed and reset by `update`.
    z_changes: AHashMap<NodeId, usize>,
}

impl Scene {
    pub fn new() -> Self {
        let mut nodes = SlotMap::with_key();
        let mut root = Node::new(0);
        root.world.world_alpha = 1.0;
        root.world.world_matrix = Affine2::IDENTITY;
        let root_id = nodes.insert(root);
        Self {
            nodes,
            root: root_id,
            next_insertion_seq: 1,
            pending_destroy: Vec::new(),
            z_changes: AHashMap::new(),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id)
    }

    /// Creates a new node parented under `parent` (or the scene root if
    /// `None`). O(1); the node is dirty by construction so it is picked up
    /// by the next `update`.
    pub fn create_node(&mut self, parent: Option<NodeId>) -> NodeId {
        let parent = parent.unwrap_or(self.root);
        let seq = self.next_insertion_seq;
        self.next_insertion_seq += 1;
        let mut node = Node::new(seq);
        node.parent = Some(parent);
        let id = self.nodes.insert(node);
        if let Some(parent_node) = self.nodes.get_mut(parent) {
            parent_node.children.push(id);
            *self.z_changes.entry(parent).or_insert(0) += 1;
        }
        id
    }

    /// Creates a text node: a regular node
    /// with `text` populated so the batcher routes it through the SDF glyph
    /// path instead of emitting a single textured quad. `autosize` defaults
    /// on, matching the common case of a text node sizing itself to its
    /// laid-out content (`width`/`height` are filled in once a layout has
    /// been computed — see `crate::frame::FrameDriver`).
    pub fn create_text_node(&mut self, parent: Option<NodeId>, props: TextLayoutProps) -> NodeId {
        let id = self.create_node(parent);
        if let Some(node) = self.nodes.get_mut(id) {
            node.text = Some(props);
            node.flags.autosize = true;
            node.content_dirty = true;
        }
        id
    }

    /// Sets `child`'s z-index, marking its parent for incremental re-sort.
    pub fn set_z_index(&mut self, child: NodeId, z_index: i32) {
        let parent = match self.nodes.get(child) {
            Some(n) => n.parent,
            None => return,
        };
        if let Some(node) = self.nodes.get_mut(child) {
            if node.z_index != z_index {
                node.z_index = z_index;
                if let Some(parent) = parent {
                    *self.z_changes.entry(parent).or_insert(0) += 1;
                }
            }
        }
    }

    /// Detaches `id` from its parent and marks it (and its subtree) for
    /// removal at the next `flush_destroyed`. Vertex data already emitted
    /// this frame for `id` still draws — destruction is deferred, not
    /// immediate.
    pub fn destroy_node(&mut self, id: NodeId, events: &mut EventBus) {
        events.emit(Event::NodeBeforeDestroy(id));
        if let Some(node) = self.nodes.get(id) {
            if let Some(parent) = node.parent {
                if let Some(parent_node) = self.nodes.get_mut(parent) {
                    parent_node.children.retain(|&c| c != id);
                    parent_node.z_order.retain(|&c| c != id);
                }
            }
        }
        self.collect_subtree(id, &mut Vec::new());
        self.pending_destroy.push(id);
    }

    fn collect_subtree(&self, id: NodeId, out: &mut Vec<NodeId>) {
        out.push(id);
        if let Some(node) = self.nodes.get(id) {
            for &child in &node.children {
                self.collect_subtree(child, out);
            }
        }
    }

    /// Actually removes destroyed nodes from the arena. Call once per frame
    /// after batching has emitted this frame's vertex data.
    pub fn flush_destroyed(&mut self, events: &mut EventBus) {
        let pending = std::mem::take(&mut self.pending_destroy);
        for id in pending {
            let mut subtree = Vec::new();
            self.collect_subtree(id, &mut subtree);
            for node_id in subtree {
                if self.nodes.remove(node_id).is_some() {
                    events.emit(Event::NodeAfterDestroy(node_id));
                }
            }
        }
    }

    /// Runs the depth-first pre-order update pass: rebuilds dirty local
    /// matrices, propagates world matrix/alpha, computes clip rects and
    /// `render_state`, maintains z-order, and propagates `has_rtt_updates`
    /// to RTT ancestors.
    pub fn update(&mut self, viewport: Rect, bounds_margin: BoundsMargin, frame_no: u64) {
        let _ = frame_no;
        let expanded_viewport = viewport.expand(bounds_margin);

        // Re-sort any parent whose children's z-index changed this frame.
        let z_changes = std::mem::take(&mut self.z_changes);
        for (parent, count) in z_changes {
            if self.nodes.contains_key(parent) {
                zorder::reorder_children(&mut self.nodes, parent, count);
            }
        }

        let root = self.root;
        let mut rtt_ancestor_stack: Vec<NodeId> = Vec::new();
        self.update_node(
            root,
            Affine2::IDENTITY,
            1.0,
            None,
            viewport,
            expanded_viewport,
            &mut rtt_ancestor_stack,
        );
    }

    #[allow(clippy::too_many_arguments)]
    fn update_node(
        &mut self,
        id: NodeId,
        parent_world_matrix: Affine2,
        parent_world_alpha: f32,
        parent_clip: Option<Rect>,
        viewport: Rect,
        expanded_viewport: Rect,
        rtt_ancestor_stack: &mut Vec<NodeId>,
    ) {
        let (is_rtt, mutated, clipping, geometry, z_order) = {
            let node = &self.nodes[id];
            (
                node.flags.rtt,
                node.transform_dirty || node.content_dirty,
                node.effective_clipping(),
                node.geometry,
                node.z_order.clone(),
            )
        };

        if is_rtt {
            rtt_ancestor_stack.push(id);
        }
        if mutated {
            for &ancestor in rtt_ancestor_stack.iter() {
                if ancestor != id {
                    if let Some(a) = self.nodes.get_mut(ancestor) {
                        a.world.has_rtt_updates = true;
                    }
                }
            }
        }

        // Step 1-2: rebuild local matrix if dirty, compose world matrix.
        let local = matrix::local_transform(
            geometry.x,
            geometry.y,
            geometry.w,
            geometry.h,
            geometry.mount_x,
            geometry.mount_y,
            geometry.pivot_x,
            geometry.pivot_y,
            geometry.scale_x,
            geometry.scale_y,
            geometry.rotation,
        );
        let world_matrix = parent_world_matrix * local;

        // Step 3: alpha propagation.
        let alpha = self.nodes[id].alpha;
        let world_alpha = parent_world_alpha * alpha;

        // Step 4: screen AABB and clip rect.
        let corners = matrix::local_corners(geometry.w, geometry.h);
        let world_corners = matrix::transform_corners(&world_matrix, &corners);
        let screen_aabb = Rect::from_points(&world_corners);

        let own_rect = if clipping {
            Some(own_clip_rect(&geometry, &world_matrix))
        } else {
            None
        };
        let effective_clip = match (parent_clip, own_rect) {
            (Some(p), Some(o)) => Some(p.intersect(&o)),
            (Some(p), None) => Some(p),
            (None, Some(o)) => Some(o),
            (None, None) => None,
        };

        // Step 5: render-state classification.
        const EPSILON: f32 = 1e-4;
        let render_state = if world_alpha < EPSILON {
            RenderState::OutOfBounds
        } else if screen_aabb.intersects(&viewport) {
            RenderState::InViewport
        } else if screen_aabb.intersects(&expanded_viewport) {
            RenderState::InBounds
        } else {
            RenderState::OutOfBounds
        };

        {
            let node = &mut self.nodes[id];
            node.world = WorldState {
                world_matrix,
                world_alpha,
                world_clipping_rect: effective_clip,
                render_state,
                has_rtt_updates: node.world.has_rtt_updates,
                screen_aabb,
            };
            node.transform_dirty = false;
            node.content_dirty = false;
        }

        // Recurse regardless of OutOfBounds — invariant maintenance still
        // runs for off-screen subtrees.
        for child in z_order.iter().copied().chain(
            self.nodes[id]
                .children
                .iter()
                .copied()
                .filter(|c| !z_order.contains(c)),
        ) {
            if self.nodes.contains_key(child) {
                self.update_node(
                    child,
                    world_matrix,
                    world_alpha,
                    effective_clip,
                    viewport,
                    expanded_viewport,
                    rtt_ancestor_stack,
                );
            }
        }

        if is_rtt {
            rtt_ancestor_stack.pop();
        }
    }

    /// Clears `has_rtt_updates` on an RTT node after its offscreen pass has
    /// been rendered this frame.
    pub fn clear_rtt_updates(&mut self, id: NodeId) {
        if let Some(node) = self.nodes.get_mut(id) {
            node.world.has_rtt_updates = false;
        }
    }

    pub fn iter_in_z_order(&self, parent: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes
            .get(parent)
            .map(|n| n.z_order.clone())
            .unwrap_or_default()
            .into_iter()
    }

    /// Every live node in the arena, in no particular order. Used by the
    /// frame driver for whole-scene sweeps (RTT texture provisioning,
    /// out-of-bounds texture collection) that don't follow tree structure.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Node)> + '_ {
        self.nodes.iter()
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

/// Computes a clipping node's own world-space clip rect.
///
/// When `scaleX != scaleY` the clip rect uses their average as a single
/// effective scale rather than scaling width and height independently,
/// keeping the scissor rect axis-aligned regardless of aspect skew. See
/// `DESIGN.md` for the rationale.
fn own_clip_rect(geometry: &crate::node::Geometry, world_matrix: &Affine2) -> Rect {
    let effective_scale = if geometry.scale_x == geometry.scale_y {
        geometry.scale_x
    } else {
        (geometry.scale_x + geometry.scale_y) / 2.0
    };

    // Reconstruct the clip rect's own transform with the uniform scale,
    // otherwise identical to the node's local transform. Since clipping
    // nodes always have rotation == 0 (enforced by `effective_clipping`),
    // this is always axis-aligned.
    let local = matrix::local_transform(
        geometry.x,
        geometry.y,
        geometry.w,
        geometry.h,
        geometry.mount_x,
        geometry.mount_y,
        geometry.pivot_x,
        geometry.pivot_y,
        effective_scale,
        effective_scale,
        0.0,
    );
    // world_matrix already includes this node's own local transform, so to
    // get this node's clip rect in world space we compose the parent's
    // portion of world_matrix (world_matrix * local^-1) with the
    // uniform-scale local transform.
    let parent_matrix = *world_matrix * local.inverse();
    let world = parent_matrix * local;
    let corners = matrix::local_corners(geometry.w, geometry.h);
    let world_corners = matrix::transform_corners(&world, &corners);
    Rect::from_points(&world_corners)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_has_identity_matrix_and_full_alpha() {
        let mut scene = Scene::new();
        let viewport = Rect::from_xywh(0.0, 0.0, 1920.0, 1080.0);
        scene.update(viewport, BoundsMargin::default(), 0);
        let root = scene.get(scene.root()).unwrap();
        assert!(root.world.world_matrix.abs_diff_eq(Affine2::IDENTITY, 1e-6));
        assert_eq!(root.world.world_alpha, 1.0);
    }

    #[test]
    fn child_world_matrix_composes_with_parent() {
        let mut scene = Scene::new();
        let child = scene.create_node(None);
        scene.get_mut(child).unwrap().set_x(10.0);
        scene.get_mut(child).unwrap().set_y(20.0);
        scene.get_mut(child).unwrap().set_w(100.0);
        scene.get_mut(child).unwrap().set_h(50.0);

        let viewport = Rect::from_xywh(0.0, 0.0, 1920.0, 1080.0);
        scene.update(viewport, BoundsMargin::default(), 0);

        let node = scene.get(child).unwrap();
        let p = node.world.world_matrix.transform_point2(glam::Vec2::ZERO);
        assert!((p.x - 10.0).abs() < 1e-4);
        assert!((p.y - 20.0).abs() < 1e-4);
    }

    #[test]
    fn world_alpha_is_always_in_unit_range() {
        let mut scene = Scene::new();
        let child = scene.create_node(None);
        scene.get_mut(child).unwrap().set_alpha(2.0);
        let viewport = Rect::from_xywh(0.0, 0.0, 1920.0, 1080.0);
        scene.update(viewport, BoundsMargin::default(), 0);
        let alpha = scene.get(child).unwrap().world.world_alpha;
        assert!((0.0..=1.0).contains(&alpha));
    }

    #[test]
    fn node_entirely_outside_viewport_and_margin_is_out_of_bounds() {
        let mut scene = Scene::new();
        let child = scene.create_node(None);
        {
            let node = scene.get_mut(child).unwrap();
            node.set_x(100_000.0);
            node.set_y(100_000.0);
            node.set_w(10.0);
            node.set_h(10.0);
        }
        let viewport = Rect::from_xywh(0.0, 0.0, 1920.0, 1080.0);
        scene.update(viewport, BoundsMargin::default(), 0);
        assert_eq!(
            scene.get(child).unwrap().world.render_state,
            RenderState::OutOfBounds
        );
    }

    #[test]
    fn orphan_subtree_is_not_reachable_from_root() {
        // Creating nodes always parents them under something reachable from
        // root (or root itself), so there is no API surface to construct a
        // true orphan; this documents that guarantee.
        let mut scene = Scene::new();
        let a = scene.create_node(None);
        let b = scene.create_node(Some(a));
        assert_eq!(scene.get(b).unwrap().parent, Some(a));
    }

    #[test]
    fn destroy_detaches_from_parent_immediately() {
        let mut scene = Scene::new();
        let mut events = EventBus::new();
        let child = scene.create_node(None);
        scene.destroy_node(child, &mut events);
        let root = scene.root();
        assert!(!scene.get(root).unwrap().children.contains(&child));
        // Node data is still reachable until flush_destroyed runs.
        assert!(scene.get(child).is_some());
        scene.flush_destroyed(&mut events);
        assert!(scene.get(child).is_none());
    }
}
