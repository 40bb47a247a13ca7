//! Render-to-texture scheduler.
//!
//! Keeps an ordered list of RTT nodes such that every descendant RTT node
//! renders strictly before its RTT ancestors, so a parent never samples a
//! stale child texture within the same frame.

use crate::id::{NodeId, TextureId};
use crate::scene::Scene;

/// The strictly-ordered list of RTT target nodes.
#[derive(Default)]
pub struct RttScheduler {
    ordered: Vec<NodeId>,
}

impl RttScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `node` into the order: walk up to the
    /// lowest RTT ancestor already present (an upper bound — `node` must
    /// come before it), walk down to the highest-indexed RTT descendant
    /// already present (a lower bound — `node` must come after it), and
    /// insert at `max(lower_bound, min(upper_bound, end_of_list))`.
    pub fn insert(&mut self, scene: &Scene, node: NodeId) {
        if self.ordered.contains(&node) {
            return;
        }
        let upper_bound = self.find_ancestor_bound(scene, node).unwrap_or(self.ordered.len());
        let lower_bound = self.find_descendant_bound(scene, node);
        let index = lower_bound.max(0).min(upper_bound.min(self.ordered.len()));
        self.ordered.insert(index, node);
    }

    pub fn remove(&mut self, node: NodeId) {
        self.ordered.retain(|&n| n != node);
    }

    /// Children-before-parents iteration order for the current frame.
    pub fn iter(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.ordered.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }

    fn find_ancestor_bound(&self, scene: &Scene, node: NodeId) -> Option<usize> {
        let mut current = scene.get(node).and_then(|n| n.parent);
        while let Some(ancestor) = current {
            if let Some(pos) = self.ordered.iter().position(|&n| n == ancestor) {
                return Some(pos);
            }
            current = scene.get(ancestor).and_then(|n| n.parent);
        }
        None
    }

    fn find_descendant_bound(&self, scene: &Scene, node: NodeId) -> usize {
        let mut max_index = None;
        let mut stack = vec![node];
        while let Some(current) = stack.pop() {
            let Some(n) = scene.get(current) else { continue };
            for &child in &n.children {
                if let Some(pos) = self.ordered.iter().position(|&n| n == child) {
                    max_index = Some(max_index.map_or(pos, |m: usize| m.max(pos)));
                }
                stack.push(child);
            }
        }
        max_index.map_or(0, |m| m + 1)
    }
}

/// One RTT node due to be (re-)rendered this frame, per the eligibility
/// criteria: `hasRTTUpdates = true`, `worldAlpha > 0`, and a loaded
/// texture.
pub struct DuePass {
    pub node: NodeId,
    pub target_texture: TextureId,
}

/// Selects the RTT nodes that must actually render this frame, in
/// children-before-parents order. `is_loaded` lets the caller consult the
/// texture cache without this module depending on it directly.
pub fn due_passes(scheduler: &RttScheduler, scene: &Scene, mut is_loaded: impl FnMut(TextureId) -> bool) -> Vec<DuePass> {
    scheduler
        .iter()
        .filter_map(|node_id| {
            let node = scene.get(node_id)?;
            if !node.world.has_rtt_updates || node.world.world_alpha <= 0.0 {
                return None;
            }
            let texture = node.texture?;
            if !is_loaded(texture) {
                return None;
            }
            Some(DuePass { node: node_id, target_texture: texture })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventBus;

    fn make_scene_with_chain() -> (Scene, NodeId, NodeId, NodeId) {
        let mut scene = Scene::new();
        let root = scene.root();
        let parent = scene.create_node(Some(root));
        let child = scene.create_node(Some(parent));
        let grandchild = scene.create_node(Some(child));
        (scene, parent, child, grandchild)
    }

    #[test]
    fn inserting_ancestor_after_descendant_places_it_after() {
        let (scene, parent, child, _grandchild) = make_scene_with_chain();
        let mut scheduler = RttScheduler::new();
        scheduler.insert(&scene, child);
        scheduler.insert(&scene, parent);
        let order: Vec<NodeId> = scheduler.iter().collect();
        assert_eq!(order, vec![child, parent]);
    }

    #[test]
    fn inserting_descendant_after_ancestor_places_it_before() {
        let (scene, parent, child, _grandchild) = make_scene_with_chain();
        let mut scheduler = RttScheduler::new();
        scheduler.insert(&scene, parent);
        scheduler.insert(&scene, child);
        let order: Vec<NodeId> = scheduler.iter().collect();
        assert_eq!(order, vec![child, parent]);
    }

    #[test]
    fn inserting_same_node_twice_is_a_no_op() {
        let (scene, parent, _child, _grandchild) = make_scene_with_chain();
        let mut scheduler = RttScheduler::new();
        scheduler.insert(&scene, parent);
        scheduler.insert(&scene, parent);
        assert_eq!(scheduler.len(), 1);
    }

    #[test]
    fn removed_node_is_gone_from_order() {
        let (scene, parent, child, _grandchild) = make_scene_with_chain();
        let mut scheduler = RttScheduler::new();
        scheduler.insert(&scene, parent);
        scheduler.insert(&scene, child);
        scheduler.remove(parent);
        let order: Vec<NodeId> = scheduler.iter().collect();
        assert_eq!(order, vec![child]);
    }

    #[test]
    fn due_passes_skips_nodes_without_rtt_updates() {
        let (mut scene, parent, _child, _grandchild) = make_scene_with_chain();
        let mut events = EventBus::default();
        let _ = &mut events;
        scene.get_mut(parent).unwrap().texture = Some(TextureId(1));
        scene.get_mut(parent).unwrap().world.has_rtt_updates = false;
        let mut scheduler = RttScheduler::new();
        scheduler.insert(&scene, parent);
        let passes = due_passes(&scheduler, &scene, |_| true);
        assert!(passes.is_empty());
    }
}
