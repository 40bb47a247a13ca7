//! Z-order maintenance for a parent's children.
//!
//! Each parent keeps children in insertion order (stable identity, used to
//! break z-index ties) and a separately-maintained z-sorted render order.
//! When a child's `z_index` changes, the parent re-sorts incrementally:
//! bucket-sort when many children changed z this frame, binary-search-insert
//! when only a few did.

use crate::id::NodeId;
use crate::node::Node;
use slotmap::SlotMap;

/// Above this many z-index changes in one frame, a full bucket-sort is
/// cheaper than repeated binary-search-insert shuffles.
pub const REORDER_BATCH_THRESHOLD: usize = 12;

fn sort_key(nodes: &SlotMap<NodeId, Node>, id: NodeId) -> (i32, u64) {
    let node = &nodes[id];
    (node.z_index, node.insertion_seq)
}

/// Rebuilds `parent`'s `z_order` from `children`, choosing bucket-sort or
/// binary-search-insert based on how many children changed z this frame.
pub fn reorder_children(
    nodes: &mut SlotMap<NodeId, Node>,
    parent: NodeId,
    changed_this_frame: usize,
) {
    let children = nodes[parent].children.clone();
    if children.is_empty() {
        nodes[parent].z_order.clear();
        return;
    }

    if changed_this_frame > REORDER_BATCH_THRESHOLD {
        bucket_sort(nodes, parent, &children);
    } else {
        let mut z_order = std::mem::take(&mut nodes[parent].z_order);
        z_order.retain(|id| children.contains(id));
        for &child in &children {
            if !z_order.contains(&child) {
                binary_search_insert(nodes, &mut z_order, child);
            }
        }
        nodes[parent].z_order = z_order;
    }
}

fn bucket_sort(nodes: &mut SlotMap<NodeId, Node>, parent: NodeId, children: &[NodeId]) {
    let mut sorted = children.to_vec();
    sorted.sort_by_key(|&id| sort_key(nodes, id));
    nodes[parent].z_order = sorted;
}

fn binary_search_insert(nodes: &SlotMap<NodeId, Node>, z_order: &mut Vec<NodeId>, child: NodeId) {
    let key = sort_key(nodes, child);
    let pos = z_order
        .binary_search_by_key(&key, |&id| sort_key(nodes, id))
        .unwrap_or_else(|pos| pos);
    z_order.insert(pos, child);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Node;

    fn make_child(nodes: &mut SlotMap<NodeId, Node>, seq: u64, z: i32) -> NodeId {
        let mut node = Node::new(seq);
        node.z_index = z;
        nodes.insert(node)
    }

    #[test]
    fn ties_broken_by_insertion_order() {
        let mut nodes: SlotMap<NodeId, Node> = SlotMap::with_key();
        let parent = nodes.insert(Node::new(0));
        let a = make_child(&mut nodes, 1, 5);
        let b = make_child(&mut nodes, 2, 5);
        nodes[parent].children = vec![b, a]; // insertion order deliberately b,a but seq a<b... use explicit seqs
        reorder_children(&mut nodes, parent, 0);
        assert_eq!(nodes[parent].z_order, vec![a, b]);
    }

    #[test]
    fn z_index_sorts_ascending() {
        let mut nodes: SlotMap<NodeId, Node> = SlotMap::with_key();
        let parent = nodes.insert(Node::new(0));
        let a = make_child(&mut nodes, 1, 10);
        let b = make_child(&mut nodes, 2, -5);
        let c = make_child(&mut nodes, 3, 0);
        nodes[parent].children = vec![a, b, c];
        reorder_children(&mut nodes, parent, 0);
        assert_eq!(nodes[parent].z_order, vec![b, c, a]);
    }

    #[test]
    fn bucket_sort_path_used_above_threshold() {
        let mut nodes: SlotMap<NodeId, Node> = SlotMap::with_key();
        let parent = nodes.insert(Node::new(0));
        let mut children = Vec::new();
        for i in 0..20 {
            children.push(make_child(&mut nodes, i, 20 - i as i32));
        }
        nodes[parent].children = children.clone();
        reorder_children(&mut nodes, parent, REORDER_BATCH_THRESHOLD + 1);
        let mut expected = children;
        expected.reverse();
        assert_eq!(nodes[parent].z_order, expected);
    }
}
