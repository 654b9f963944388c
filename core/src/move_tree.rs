// SPDX-License-Identifier: MIT OR Apache-2.0

//! Branching move history
//!
//! Nodes live in an arena owned by [`MoveTree`] and refer to each other by
//! [`NodeId`]. A node owns its children (trunk successor and branches) and
//! only points back at its parent. Every node holds its own snapshot of the
//! board, so jumping anywhere in the tree never needs an undo log.

use crate::board::BoardState;
use crate::{Color, Coord};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Handle of a node inside one [`MoveTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Annotations on one intersection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkSet {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub letter: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub triangle: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub square: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub circle: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub cross: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub black: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub white: bool,
}

impl MarkSet {
    pub fn is_empty(&self) -> bool {
        *self == MarkSet::default()
    }
}

/// Free-hand drawing attached to a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PenMark {
    pub color: String,
    pub points: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkJson {
    pub x: i32,
    pub y: i32,
    pub marks: MarkSet,
}

/// Node-local JSON snapshot with nested children. Board positions are not
/// stored; the engine rebuilds them by replaying each node's move.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MoveTreeJson {
    pub x: i32,
    pub y: i32,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub edited: bool,
    #[serde(default, skip_serializing_if = "is_empty_color")]
    pub player: Color,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pen_marks: Vec<PenMark>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub marks: Vec<MarkJson>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trunk_next: Option<Box<MoveTreeJson>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub branches: Vec<MoveTreeJson>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub correct_answer: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub wrong_answer: bool,
}

fn is_empty_color(c: &Color) -> bool {
    *c == Color::Empty
}

#[derive(Debug, Clone)]
pub struct MoveNode {
    pub id: NodeId,
    pub x: i32,
    pub y: i32,
    pub trunk: bool,
    /// Setup placement rather than a played move
    pub edited: bool,
    /// Player to move after this node; the placed color for edited nodes
    pub player: Color,
    pub move_number: u32,
    pub state: BoardState,
    pub marks: BTreeMap<Coord, MarkSet>,
    pub pen_marks: Vec<PenMark>,
    pub text: String,
    pub correct_answer: bool,
    pub wrong_answer: bool,
    parent: Option<NodeId>,
    trunk_next: Option<NodeId>,
    branches: Vec<NodeId>,
    hint_next: Option<NodeId>,
    isobranches: Vec<NodeId>,
    pruned: bool,
}

impl MoveNode {
    pub fn coord(&self) -> Coord {
        Coord::new(self.x, self.y)
    }

    pub fn is_pass(&self) -> bool {
        self.coord().is_pass()
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn trunk_next(&self) -> Option<NodeId> {
        self.trunk_next
    }

    pub fn branches(&self) -> &[NodeId] {
        &self.branches
    }

    /// Nodes elsewhere in the tree reaching the same position, as of the
    /// last [`MoveTree::recompute_isobranches`].
    pub fn isobranches(&self) -> &[NodeId] {
        &self.isobranches
    }

    pub fn children(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.trunk_next.iter().chain(self.branches.iter()).copied()
    }

    fn matches(&self, x: i32, y: i32, edited: bool, player: Color) -> bool {
        self.x == x && self.y == y && self.edited == edited && (!edited || self.player == player)
    }
}

#[derive(Debug, Clone)]
pub struct MoveTree {
    nodes: Vec<MoveNode>,
    root: NodeId,
}

impl MoveTree {
    /// New tree whose root holds `initial_state`.
    pub fn new(initial_state: BoardState) -> Self {
        let player = initial_state.player;
        let mut tree = Self {
            nodes: Vec::new(),
            root: NodeId(0),
        };
        tree.root = tree.push_node(None, -1, -1, true, false, player, 0, initial_state);
        tree
    }

    #[allow(clippy::too_many_arguments)]
    fn push_node(
        &mut self,
        parent: Option<NodeId>,
        x: i32,
        y: i32,
        trunk: bool,
        edited: bool,
        player: Color,
        move_number: u32,
        state: BoardState,
    ) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(MoveNode {
            id,
            x,
            y,
            trunk,
            edited,
            player,
            move_number,
            state,
            marks: BTreeMap::new(),
            pen_marks: Vec::new(),
            text: String::new(),
            correct_answer: false,
            wrong_answer: false,
            parent,
            trunk_next: None,
            branches: Vec::new(),
            hint_next: None,
            isobranches: Vec::new(),
            pruned: false,
        });
        id
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Panics if `id` came from a different tree.
    pub fn node(&self, id: NodeId) -> &MoveNode {
        &self.nodes[id.0]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut MoveNode {
        &mut self.nodes[id.0]
    }

    /// The node, unless it has been pruned.
    pub fn get(&self, id: NodeId) -> Option<&MoveNode> {
        self.nodes.get(id.0).filter(|n| !n.pruned)
    }

    /// Live nodes in creation order.
    pub fn nodes(&self) -> impl Iterator<Item = &MoveNode> {
        self.nodes.iter().filter(|n| !n.pruned)
    }

    pub fn len(&self) -> usize {
        self.nodes().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Existing child of `parent` for this move, trunk successor first.
    pub fn lookup(&self, parent: NodeId, x: i32, y: i32, edited: bool, player: Color) -> Option<NodeId> {
        let node = self.node(parent);
        node.children()
            .find(|child| self.node(*child).matches(x, y, edited, player))
    }

    /// Record a move from `parent` and return the child node.
    ///
    /// An identical existing child is refreshed and returned instead of
    /// duplicated. A trunk move is only possible from a trunk node without a
    /// trunk successor; a matching branch there is folded into the new trunk
    /// node.
    #[allow(clippy::too_many_arguments)]
    pub fn add_move(
        &mut self,
        parent: NodeId,
        x: i32,
        y: i32,
        trunk: bool,
        edited: bool,
        player: Color,
        move_number: u32,
        state: BoardState,
    ) -> NodeId {
        let parent_node = self.node(parent);
        let can_extend_trunk = parent_node.trunk && parent_node.trunk_next.is_none();

        if trunk && can_extend_trunk {
            let id = self.push_node(Some(parent), x, y, true, edited, player, move_number, state);
            self.nodes[parent.0].trunk_next = Some(id);
            self.fold_branch_into_trunk(parent, id);
            return id;
        }

        if let Some(existing) = self.lookup(parent, x, y, edited, player) {
            let node = &mut self.nodes[existing.0];
            node.state = state;
            node.move_number = move_number;
            return existing;
        }

        if trunk {
            tracing::debug!(
                parent = parent.0,
                "Trunk move requested off the trunk, recording as a branch"
            );
        }
        let id = self.push_node(Some(parent), x, y, false, edited, player, move_number, state);
        self.nodes[parent.0].branches.push(id);
        id
    }

    fn fold_branch_into_trunk(&mut self, parent: NodeId, trunk_id: NodeId) {
        let (x, y, edited, player) = {
            let t = self.node(trunk_id);
            (t.x, t.y, t.edited, t.player)
        };
        let position = self.nodes[parent.0]
            .branches
            .iter()
            .position(|b| {
                let b = &self.nodes[b.0];
                b.x == x && b.y == y && b.edited == edited && b.player == player
            });
        let Some(position) = position else {
            return;
        };
        let old = self.nodes[parent.0].branches.remove(position);
        if self.nodes[parent.0].hint_next == Some(old) {
            self.nodes[parent.0].hint_next = Some(trunk_id);
        }

        let old_node = &mut self.nodes[old.0];
        old_node.pruned = true;
        let children = std::mem::take(&mut old_node.branches);
        let marks = std::mem::take(&mut old_node.marks);
        let pen_marks = std::mem::take(&mut old_node.pen_marks);
        let text = std::mem::take(&mut old_node.text);
        let (correct, wrong) = (old_node.correct_answer, old_node.wrong_answer);

        for child in &children {
            self.nodes[child.0].parent = Some(trunk_id);
        }
        let trunk_node = &mut self.nodes[trunk_id.0];
        trunk_node.branches.extend(children);
        trunk_node.marks.extend(marks);
        trunk_node.pen_marks.extend(pen_marks);
        if trunk_node.text.is_empty() {
            trunk_node.text = text;
        }
        trunk_node.correct_answer |= correct;
        trunk_node.wrong_answer |= wrong;
    }

    /// Trunk successor, else the remembered branch, else the first branch.
    pub fn next(&self, id: NodeId) -> Option<NodeId> {
        let node = self.node(id);
        if let Some(t) = node.trunk_next {
            return Some(t);
        }
        if let Some(hint) = node.hint_next {
            if node.branches.contains(&hint) {
                return Some(hint);
            }
        }
        node.branches.first().copied()
    }

    /// Parent of `id`, remembering `id` for later [`MoveTree::next`] calls.
    pub fn prev(&mut self, id: NodeId) -> Option<NodeId> {
        let parent = self.node(id).parent?;
        self.nodes[parent.0].hint_next = Some(id);
        Some(parent)
    }

    /// Root to `id`, inclusive.
    pub fn path_to(&self, id: NodeId) -> Vec<NodeId> {
        let mut path = vec![id];
        let mut cur = id;
        while let Some(parent) = self.node(cur).parent {
            path.push(parent);
            cur = parent;
        }
        path.reverse();
        path
    }

    pub fn is_ancestor(&self, ancestor: NodeId, of: NodeId) -> bool {
        let mut cur = self.node(of).parent;
        while let Some(p) = cur {
            if p == ancestor {
                return true;
            }
            cur = self.node(p).parent;
        }
        false
    }

    /// Last node of the trunk.
    pub fn last_trunk_node(&self) -> NodeId {
        let mut cur = self.root;
        while let Some(next) = self.node(cur).trunk_next {
            cur = next;
        }
        cur
    }

    /// Detach `id` and its subtree from the tree. The root cannot be pruned.
    pub fn prune(&mut self, id: NodeId) {
        let Some(parent) = self.node(id).parent else {
            return;
        };
        let parent_node = &mut self.nodes[parent.0];
        if parent_node.trunk_next == Some(id) {
            parent_node.trunk_next = None;
        }
        parent_node.branches.retain(|b| *b != id);
        if parent_node.hint_next == Some(id) {
            parent_node.hint_next = None;
        }

        let mut stack = vec![id];
        while let Some(cur) = stack.pop() {
            let node = &mut self.nodes[cur.0];
            node.pruned = true;
            stack.extend(node.trunk_next);
            stack.extend(node.branches.iter().copied());
        }
    }

    /// Starting at the root, while a trunk node has no trunk successor, make
    /// its first branch the trunk.
    pub fn promote_first_branches_to_trunk(&mut self) {
        let mut cur = self.root;
        loop {
            if let Some(next) = self.nodes[cur.0].trunk_next {
                cur = next;
                continue;
            }
            if self.nodes[cur.0].branches.is_empty() {
                break;
            }
            let first = self.nodes[cur.0].branches.remove(0);
            self.nodes[cur.0].trunk_next = Some(first);
            self.nodes[first.0].trunk = true;
            cur = first;
        }
    }

    /// Find transpositions: nodes reaching the same board with the same
    /// player to move where neither is an ancestor of the other.
    pub fn recompute_isobranches(&mut self) {
        let mut by_position: HashMap<[u8; 32], Vec<NodeId>> = HashMap::new();
        for node in self.nodes.iter_mut() {
            node.isobranches.clear();
        }
        for node in self.nodes.iter().filter(|n| !n.pruned) {
            by_position.entry(node.state.position_hash()).or_default().push(node.id);
        }

        let mut found: Vec<(NodeId, NodeId)> = Vec::new();
        for group in by_position.values().filter(|g| g.len() > 1) {
            for (i, &a) in group.iter().enumerate() {
                for &b in &group[i + 1..] {
                    if !self.is_ancestor(a, b) && !self.is_ancestor(b, a) {
                        found.push((a, b));
                    }
                }
            }
        }
        for (a, b) in found {
            self.nodes[a.0].isobranches.push(b);
            self.nodes[b.0].isobranches.push(a);
        }
        for node in self.nodes.iter_mut() {
            node.isobranches.sort();
        }
    }

    /// JSON snapshot of `id` and everything below it.
    pub fn to_json(&self, id: NodeId) -> MoveTreeJson {
        let node = self.node(id);
        MoveTreeJson {
            x: node.x,
            y: node.y,
            edited: node.edited,
            player: if node.edited { node.player } else { Color::Empty },
            pen_marks: node.pen_marks.clone(),
            marks: node
                .marks
                .iter()
                .filter(|(_, m)| !m.is_empty())
                .map(|(c, m)| MarkJson {
                    x: c.x,
                    y: c.y,
                    marks: m.clone(),
                })
                .collect(),
            text: node.text.clone(),
            trunk_next: node.trunk_next.map(|t| Box::new(self.to_json(t))),
            branches: node.branches.iter().map(|b| self.to_json(*b)).collect(),
            correct_answer: node.correct_answer,
            wrong_answer: node.wrong_answer,
        }
    }

    /// Apply the node-local parts of `json` (marks, text, flags) to `id`.
    /// Children are the caller's business.
    pub fn load_json_for_this_node(&mut self, id: NodeId, json: &MoveTreeJson) {
        let node = &mut self.nodes[id.0];
        node.marks = json
            .marks
            .iter()
            .map(|m| (Coord::new(m.x, m.y), m.marks.clone()))
            .collect();
        node.pen_marks = json.pen_marks.clone();
        node.text = json.text.clone();
        node.correct_answer = json.correct_answer;
        node.wrong_answer = json.wrong_answer;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree() -> MoveTree {
        MoveTree::new(BoardState::new(9, 9))
    }

    fn state() -> BoardState {
        BoardState::new(9, 9)
    }

    #[test]
    fn same_move_twice_yields_same_node() {
        let mut t = tree();
        let root = t.root();
        let a = t.add_move(root, 2, 2, false, false, Color::White, 1, state());
        let b = t.add_move(root, 2, 2, false, false, Color::White, 1, state());
        assert_eq!(a, b);
        assert_eq!(t.node(root).branches().len(), 1);
    }

    #[test]
    fn trunk_move_folds_matching_branch() {
        let mut t = tree();
        let root = t.root();
        let branch = t.add_move(root, 2, 2, false, false, Color::White, 1, state());
        let child = t.add_move(branch, 3, 3, false, false, Color::Black, 2, state());
        t.node_mut(branch).text = "from a variation".into();

        let trunk = t.add_move(root, 2, 2, true, false, Color::White, 1, state());
        assert_ne!(trunk, branch);
        assert_eq!(t.node(root).trunk_next(), Some(trunk));
        assert!(t.node(root).branches().is_empty());
        assert_eq!(t.node(trunk).branches(), &[child]);
        assert_eq!(t.node(child).parent(), Some(trunk));
        assert_eq!(t.node(trunk).text, "from a variation");
        assert!(t.get(branch).is_none());
    }

    #[test]
    fn next_prefers_trunk_then_hint() {
        let mut t = tree();
        let root = t.root();
        let a = t.add_move(root, 1, 1, false, false, Color::White, 1, state());
        let b = t.add_move(root, 5, 5, false, false, Color::White, 1, state());
        assert_eq!(t.next(root), Some(a));
        assert_eq!(t.prev(b), Some(root));
        assert_eq!(t.next(root), Some(b));

        let trunk = t.add_move(root, 4, 4, true, false, Color::White, 1, state());
        assert_eq!(t.next(root), Some(trunk));
    }

    #[test]
    fn prune_detaches_subtree() {
        let mut t = tree();
        let root = t.root();
        let a = t.add_move(root, 1, 1, false, false, Color::White, 1, state());
        let a2 = t.add_move(a, 2, 2, false, false, Color::Black, 2, state());
        t.prune(a);
        assert!(t.get(a).is_none());
        assert!(t.get(a2).is_none());
        assert_eq!(t.next(root), None);
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn promotion_makes_first_branch_trunk() {
        let mut t = tree();
        let root = t.root();
        let a = t.add_move(root, 1, 1, false, false, Color::White, 1, state());
        let b = t.add_move(a, 2, 2, false, false, Color::Black, 2, state());
        let _alt = t.add_move(a, 3, 3, false, false, Color::Black, 2, state());
        t.promote_first_branches_to_trunk();
        assert_eq!(t.last_trunk_node(), b);
        assert!(t.node(a).trunk);
        assert_eq!(t.node(a).branches().len(), 1);
        assert_eq!(t.path_to(b), vec![root, a, b]);
    }
}
