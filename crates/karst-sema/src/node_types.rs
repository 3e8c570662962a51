// node_types.rs
//
// Node-level type slots. Every AST node's inferred type is keyed here by
// NodeId; the slots are the mutable state the fixpoint driver refines.

use rustc_hash::FxHashMap;

use karst_frontend::NodeId;

use crate::type_arena::TypeId;

#[derive(Debug, Default)]
pub struct NodeTypes {
    types: FxHashMap<NodeId, TypeId>,
}

impl NodeTypes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, node: NodeId) -> Option<TypeId> {
        self.types.get(&node).copied()
    }

    pub fn set(&mut self, node: NodeId, ty: TypeId) {
        self.types.insert(node, ty);
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, TypeId)> + '_ {
        self.types.iter().map(|(&n, &t)| (n, t))
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
