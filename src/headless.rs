//! `HeadlessScene`: in-memory [`RenderEngine`] with no graphics.
//!
//! The native console host renders into this and summarises it in the log.
//! It keeps a flat node table with parent links so that tests can inspect
//! exactly what the reconciler asked the engine to do.

use std::collections::HashMap;

use crate::scene::{MeshSpec, RenderEngine};
use crate::types::{Euler, Rgb, Vec3};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u64);

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Group,
    Mesh(MeshSpec),
    DashedLine { from: Vec3, to: Vec3 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    pub parent: Option<NodeId>,
    pub position: Vec3,
    pub rotation: Euler,
    pub scale: Vec3,
    pub color: Option<Rgb>,
}

impl Node {
    fn new(kind: NodeKind, parent: Option<NodeId>) -> Self {
        Self {
            kind,
            parent,
            position: Vec3::zero(),
            rotation: Euler::default(),
            scale: Vec3::splat(1.0),
            color: None,
        }
    }
}

#[derive(Debug, Default)]
pub struct HeadlessScene {
    nodes: HashMap<NodeId, Node>,
    next_id: u64,
    /// Nodes ever created / removed (subtrees count every node).
    pub created_total: u64,
    pub removed_total: u64,
}

impl HeadlessScene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Top-level groups (one per live crane): dashed lines excluded.
    pub fn root_groups(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes
            .iter()
            .filter(|(_, n)| n.parent.is_none() && n.kind == NodeKind::Group)
            .map(|(id, n)| (*id, n))
    }

    pub fn dashed_lines(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes
            .iter()
            .filter(|(_, n)| matches!(n.kind, NodeKind::DashedLine { .. }))
            .map(|(id, n)| (*id, n))
    }

    pub fn children_of(&self, parent: NodeId) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self
            .nodes
            .iter()
            .filter(|(_, n)| n.parent == Some(parent))
            .map(|(id, _)| *id)
            .collect();
        ids.sort();
        ids
    }

    fn insert(&mut self, node: Node) -> NodeId {
        self.next_id += 1;
        let id = NodeId(self.next_id);
        self.nodes.insert(id, node);
        self.created_total += 1;
        id
    }

    fn with_node(&mut self, id: &NodeId, f: impl FnOnce(&mut Node)) {
        match self.nodes.get_mut(id) {
            Some(node) => f(node),
            None => log::warn!("[headless] Write to unknown node {:?}", id),
        }
    }
}

impl RenderEngine for HeadlessScene {
    type Handle = NodeId;

    fn create_group(&mut self, parent: Option<&NodeId>) -> NodeId {
        self.insert(Node::new(NodeKind::Group, parent.copied()))
    }

    fn add_mesh(&mut self, parent: &NodeId, mesh: MeshSpec) -> NodeId {
        self.insert(Node::new(NodeKind::Mesh(mesh), Some(*parent)))
    }

    fn set_position(&mut self, node: &NodeId, position: Vec3) {
        self.with_node(node, |n| n.position = position);
    }

    fn set_rotation(&mut self, node: &NodeId, rotation: Euler) {
        self.with_node(node, |n| n.rotation = rotation);
    }

    fn set_scale(&mut self, node: &NodeId, scale: Vec3) {
        self.with_node(node, |n| n.scale = scale);
    }

    fn set_color(&mut self, node: &NodeId, color: Rgb) {
        self.with_node(node, |n| n.color = Some(color));
    }

    fn add_dashed_line(&mut self, from: Vec3, to: Vec3, color: Rgb) -> NodeId {
        let mut node = Node::new(NodeKind::DashedLine { from, to }, None);
        node.color = Some(color);
        self.insert(node)
    }

    fn remove(&mut self, node: NodeId) {
        let mut stack = vec![node];
        while let Some(id) = stack.pop() {
            if self.nodes.remove(&id).is_some() {
                self.removed_total += 1;
            }
            stack.extend(self.children_of(id));
        }
    }
}
