//! The flat id arena: dense node, nodespace and element bookkeeping vectors
//! plus the cursor-based allocation scans.
//!
//! Element index 0 is reserved: activator bindings use offset 0 as the
//! "no activator" sentinel, so no node may ever own it.

use ndarray::Array1;

use crate::errors::{NetError, NetResult};
use crate::ids::{NodeId, NodespaceId, ROOT_NODESPACE};
use crate::nodetype::GateType;

#[derive(Debug, Clone)]
pub struct Arena {
    /// Node type code per node id, 0 if free.
    pub allocated_nodes: Array1<i32>,
    /// First element index per node id.
    pub allocated_node_offsets: Array1<i32>,
    /// Parent nodespace id per node id.
    pub allocated_node_parents: Array1<i32>,
    /// Owning node id per element index, 0 if free.
    pub allocated_elements_to_nodes: Array1<i32>,
    /// Parent nodespace id per nodespace id, 0 if free (the root is implicit).
    pub allocated_nodespaces: Array1<i32>,
    /// Element offset of the governing activator per element, 0 if unbound.
    pub allocated_elements_to_activators: Array1<i32>,
    /// Activator node id per nodespace, one vector per direction (por..exp).
    pub nodespace_activators: [Array1<i32>; 6],

    last_allocated_node: usize,
    last_allocated_offset: usize,
    last_allocated_nodespace: usize,
}

impl Arena {
    pub fn new(number_of_nodes: usize, number_of_elements: usize, number_of_nodespaces: usize) -> Self {
        Self {
            allocated_nodes: Array1::zeros(number_of_nodes),
            allocated_node_offsets: Array1::zeros(number_of_nodes),
            allocated_node_parents: Array1::zeros(number_of_nodes),
            allocated_elements_to_nodes: Array1::zeros(number_of_elements),
            allocated_nodespaces: Array1::zeros(number_of_nodespaces),
            allocated_elements_to_activators: Array1::zeros(number_of_elements),
            nodespace_activators: std::array::from_fn(|_| Array1::zeros(number_of_nodespaces)),
            last_allocated_node: 0,
            last_allocated_offset: 0,
            last_allocated_nodespace: 0,
        }
    }

    pub fn node_capacity(&self) -> usize {
        self.allocated_nodes.len()
    }

    pub fn element_capacity(&self) -> usize {
        self.allocated_elements_to_nodes.len()
    }

    pub fn nodespace_capacity(&self) -> usize {
        self.allocated_nodespaces.len()
    }

    pub fn is_node(&self, id: NodeId) -> bool {
        id.0 < self.node_capacity() && self.allocated_nodes[id.0] != 0
    }

    pub fn is_nodespace(&self, id: NodespaceId) -> bool {
        id == ROOT_NODESPACE
            || (id.0 < self.nodespace_capacity() && self.allocated_nodespaces[id.0] != 0)
    }

    pub fn node_type_code(&self, id: NodeId) -> i32 {
        self.allocated_nodes[id.0]
    }

    pub fn node_offset(&self, id: NodeId) -> usize {
        self.allocated_node_offsets[id.0] as usize
    }

    pub fn node_parent(&self, id: NodeId) -> NodespaceId {
        NodespaceId(self.allocated_node_parents[id.0] as usize)
    }

    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.allocated_nodes
            .iter()
            .enumerate()
            .filter(|(_, &t)| t != 0)
            .map(|(id, _)| NodeId(id))
    }

    pub fn nodespace_ids(&self) -> impl Iterator<Item = NodespaceId> + '_ {
        std::iter::once(ROOT_NODESPACE).chain(
            self.allocated_nodespaces
                .iter()
                .enumerate()
                .filter(|&(id, &p)| p != 0 && id != ROOT_NODESPACE.0)
                .map(|(id, _)| NodespaceId(id)),
        )
    }

    pub fn nodes_in_nodespace(&self, nodespace: NodespaceId) -> Vec<NodeId> {
        self.node_ids()
            .filter(|&id| self.node_parent(id) == nodespace)
            .collect()
    }

    pub fn child_nodespaces(&self, nodespace: NodespaceId) -> Vec<NodespaceId> {
        self.allocated_nodespaces
            .iter()
            .enumerate()
            .filter(|&(id, &p)| p as usize == nodespace.0 && id != ROOT_NODESPACE.0)
            .map(|(id, _)| NodespaceId(id))
            .collect()
    }

    pub fn activator_vector(&self, direction: GateType) -> &Array1<i32> {
        &self.nodespace_activators[direction.index() - 1]
    }

    pub fn activator_vector_mut(&mut self, direction: GateType) -> &mut Array1<i32> {
        &mut self.nodespace_activators[direction.index() - 1]
    }

    fn find_free_node_id(&self) -> NetResult<usize> {
        for i in (self.last_allocated_node + 1)..self.node_capacity() {
            if self.allocated_nodes[i] == 0 {
                return Ok(i);
            }
        }
        for i in 1..self.last_allocated_node {
            if self.allocated_nodes[i] == 0 {
                return Ok(i);
            }
        }
        Err(NetError::CapacityExhausted {
            kind: "node",
            capacity: self.node_capacity(),
        })
    }

    /// Finds `count` consecutive free element entries, scanning from the
    /// offset cursor and wrapping once. Element 0 stays reserved.
    fn find_free_element_run(&self, count: usize) -> NetResult<usize> {
        let capacity = self.element_capacity();
        let mut i = self.last_allocated_offset + 1;
        let mut has_restarted = false;
        loop {
            if i + count > capacity {
                if has_restarted {
                    return Err(NetError::CapacityExhausted {
                        kind: "element",
                        capacity,
                    });
                }
                i = 1;
                has_restarted = true;
                continue;
            }
            let mut freecount = 0;
            while freecount < count && self.allocated_elements_to_nodes[i + freecount] == 0 {
                freecount += 1;
            }
            if freecount == count {
                return Ok(i);
            }
            i += freecount + 1;
            if has_restarted && i > self.last_allocated_offset {
                return Err(NetError::CapacityExhausted {
                    kind: "element",
                    capacity,
                });
            }
        }
    }

    /// Reserves a node id (a requested one, or the next free one) together
    /// with a run of `element_count` elements.
    pub fn allocate_node(
        &mut self,
        type_code: i32,
        element_count: usize,
        parent: NodespaceId,
        requested: Option<NodeId>,
    ) -> NetResult<NodeId> {
        let id = match requested {
            Some(id) => {
                if id.0 >= self.node_capacity() {
                    return Err(NetError::CapacityExhausted {
                        kind: "node",
                        capacity: self.node_capacity(),
                    });
                }
                id.0
            }
            None => self.find_free_node_id()?,
        };
        let offset = self.find_free_element_run(element_count)?;

        self.last_allocated_node = id;
        self.last_allocated_offset = offset;
        self.allocated_nodes[id] = type_code;
        self.allocated_node_parents[id] = parent.0 as i32;
        self.allocated_node_offsets[id] = offset as i32;
        for element in 0..element_count {
            self.allocated_elements_to_nodes[offset + element] = id as i32;
        }
        Ok(NodeId(id))
    }

    /// Releases a node's id and element run and rewinds both cursors so the
    /// freed entries are found first by the next allocation.
    pub fn free_node(&mut self, id: NodeId, element_count: usize) {
        let offset = self.node_offset(id);
        self.allocated_nodes[id.0] = 0;
        self.allocated_node_offsets[id.0] = 0;
        self.allocated_node_parents[id.0] = 0;
        for element in 0..element_count {
            self.allocated_elements_to_nodes[offset + element] = 0;
        }
        self.last_allocated_node = id.0.saturating_sub(1);
        self.last_allocated_offset = offset.saturating_sub(1);
    }

    pub fn allocate_nodespace(
        &mut self,
        parent: NodespaceId,
        requested: Option<NodespaceId>,
    ) -> NetResult<NodespaceId> {
        let id = match requested {
            Some(id) => {
                if id.0 >= self.nodespace_capacity() {
                    return Err(NetError::CapacityExhausted {
                        kind: "nodespace",
                        capacity: self.nodespace_capacity(),
                    });
                }
                id.0
            }
            None => {
                let mut found = None;
                for i in (self.last_allocated_nodespace + 1)..self.nodespace_capacity() {
                    if i != ROOT_NODESPACE.0 && self.allocated_nodespaces[i] == 0 {
                        found = Some(i);
                        break;
                    }
                }
                if found.is_none() {
                    for i in 2..self.last_allocated_nodespace {
                        if self.allocated_nodespaces[i] == 0 {
                            found = Some(i);
                            break;
                        }
                    }
                }
                found.ok_or(NetError::CapacityExhausted {
                    kind: "nodespace",
                    capacity: self.nodespace_capacity(),
                })?
            }
        };
        self.last_allocated_nodespace = id;
        self.allocated_nodespaces[id] = parent.0 as i32;
        Ok(NodespaceId(id))
    }

    pub fn free_nodespace(&mut self, id: NodespaceId) {
        self.allocated_nodespaces[id.0] = 0;
        for direction in GateType::DIRECTIONS {
            self.activator_vector_mut(direction)[id.0] = 0;
        }
        self.last_allocated_nodespace = id.0.saturating_sub(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arena() -> Arena {
        Arena::new(16, 64, 8)
    }

    #[test]
    fn test_node_ids_are_dense_and_skip_zero() {
        let mut arena = arena();
        let a = arena.allocate_node(1, 1, ROOT_NODESPACE, None).unwrap();
        let b = arena.allocate_node(1, 1, ROOT_NODESPACE, None).unwrap();
        assert_eq!(a, NodeId(1));
        assert_eq!(b, NodeId(2));
        assert_eq!(arena.node_offset(a), 1);
        assert_eq!(arena.node_offset(b), 2);
    }

    #[test]
    fn test_element_runs_are_contiguous_and_owned() {
        let mut arena = arena();
        let pipe = arena.allocate_node(5, 7, ROOT_NODESPACE, None).unwrap();
        let offset = arena.node_offset(pipe);
        for k in 0..7 {
            assert_eq!(arena.allocated_elements_to_nodes[offset + k] as usize, pipe.0);
        }
        assert_eq!(arena.allocated_elements_to_nodes[offset + 7], 0);
    }

    #[test]
    fn test_freed_run_is_reused() {
        let mut arena = arena();
        let mut offsets = Vec::new();
        for _ in 0..5 {
            let id = arena.allocate_node(5, 7, ROOT_NODESPACE, None).unwrap();
            offsets.push(arena.node_offset(id));
        }
        let third = NodeId(3);
        let freed_offset = arena.node_offset(third);
        arena.free_node(third, 7);
        let fresh = arena.allocate_node(5, 7, ROOT_NODESPACE, None).unwrap();
        assert_eq!(fresh, third);
        assert_eq!(arena.node_offset(fresh), freed_offset);
    }

    #[test]
    fn test_wraparound_allocation() {
        let mut arena = Arena::new(6, 16, 4);
        for _ in 0..5 {
            arena.allocate_node(1, 1, ROOT_NODESPACE, None).unwrap();
        }
        arena.free_node(NodeId(2), 1);
        arena.free_node(NodeId(4), 1);
        // the cursor hint points at the later hole
        let first = arena.allocate_node(1, 1, ROOT_NODESPACE, None).unwrap();
        assert_eq!(first, NodeId(4));
        // the earlier hole is only reachable by wrapping
        let second = arena.allocate_node(1, 1, ROOT_NODESPACE, None).unwrap();
        assert_eq!(second, NodeId(2));
    }

    #[test]
    fn test_capacity_exhausted() {
        let mut arena = Arena::new(3, 16, 4);
        arena.allocate_node(1, 1, ROOT_NODESPACE, None).unwrap();
        arena.allocate_node(1, 1, ROOT_NODESPACE, None).unwrap();
        let err = arena.allocate_node(1, 1, ROOT_NODESPACE, None).unwrap_err();
        assert!(matches!(err, NetError::CapacityExhausted { kind: "node", .. }));
    }

    #[test]
    fn test_element_capacity_exhausted() {
        let mut arena = Arena::new(16, 8, 4);
        arena.allocate_node(5, 7, ROOT_NODESPACE, None).unwrap();
        let err = arena.allocate_node(5, 7, ROOT_NODESPACE, None).unwrap_err();
        assert!(matches!(err, NetError::CapacityExhausted { kind: "element", .. }));
    }

    #[test]
    fn test_element_zero_stays_reserved() {
        let mut arena = Arena::new(16, 64, 8);
        for _ in 0..3 {
            let id = arena.allocate_node(1, 1, ROOT_NODESPACE, None).unwrap();
            assert_ne!(arena.node_offset(id), 0);
            arena.free_node(id, 1);
        }
        assert_eq!(arena.allocated_elements_to_nodes[0], 0);
    }

    #[test]
    fn test_nodespace_allocation_skips_root() {
        let mut arena = arena();
        let s = arena.allocate_nodespace(ROOT_NODESPACE, None).unwrap();
        assert_eq!(s, NodespaceId(2));
        assert!(arena.is_nodespace(s));
        arena.free_nodespace(s);
        assert!(!arena.is_nodespace(s));
        assert!(arena.is_nodespace(ROOT_NODESPACE));
    }
}
