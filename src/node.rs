//! Read proxy mapping `(uid, gate, parameter)` onto arena slots.
//!
//! The view adds no semantics of its own; every value it returns is read
//! straight out of the flat vectors. Mutation goes through the facade.

use crate::gates::GateFunction;
use crate::ids::{NodeId, NodespaceId};
use crate::nodenet::{GateParameter, Nodenet};
use crate::nodetype::Nodetype;
use crate::FloatX;

pub struct NodeView<'a> {
    pub(crate) net: &'a Nodenet,
    pub(crate) id: NodeId,
}

impl<'a> NodeView<'a> {
    pub fn uid(&self) -> String {
        self.id.uid()
    }

    pub fn name(&self) -> Option<&str> {
        self.net.names.get(&self.id.uid()).map(|s| s.as_str())
    }

    pub fn position(&self) -> Option<[f64; 3]> {
        self.net.positions.get(&self.id.uid()).copied()
    }

    pub fn type_code(&self) -> i32 {
        self.net.arena.node_type_code(self.id)
    }

    pub fn nodetype(&self) -> &Nodetype {
        self.net
            .registry
            .get(self.type_code())
            .expect("live node with unregistered type")
    }

    pub fn type_name(&self) -> &str {
        &self.nodetype().name
    }

    pub fn parent_nodespace(&self) -> NodespaceId {
        self.net.arena.node_parent(self.id)
    }

    pub fn offset(&self) -> usize {
        self.net.arena.node_offset(self.id)
    }

    pub fn gate_activation(&self, gate: &str) -> Option<FloatX> {
        let index = self.nodetype().gate_index(gate)?;
        Some(self.net.gates.a[self.offset() + index])
    }

    /// The summed slot input of the gen slot, i.e. the node's activation as
    /// seen by the object-style facade.
    pub fn activation(&self) -> FloatX {
        self.net.gates.a[self.offset()]
    }

    pub fn gate_function(&self, gate: &str) -> Option<GateFunction> {
        let index = self.nodetype().gate_index(gate)?;
        Some(GateFunction::from_selector(
            self.net.gates.g_function_selector[self.offset() + index],
        ))
    }

    pub fn gate_parameter(&self, gate: &str, parameter: GateParameter) -> Option<FloatX> {
        let e = self.offset() + self.nodetype().gate_index(gate)?;
        let gates = &self.net.gates;
        Some(match parameter {
            GateParameter::Minimum => gates.g_min[e],
            GateParameter::Maximum => gates.g_max[e],
            GateParameter::Threshold => gates.g_threshold[e],
            GateParameter::Amplification => gates.g_amplification[e],
            GateParameter::Theta => gates.g_theta[e],
            GateParameter::Decay => gates.g_decay[e],
        })
    }

    /// The datasource a sensor is bound to, if any.
    pub fn datasource(&self) -> Option<&str> {
        self.net
            .inverted_sensor_map
            .get(&self.id.uid())
            .map(|s| s.as_str())
    }

    /// The datatarget an actor is bound to, if any.
    pub fn datatarget(&self) -> Option<&str> {
        self.net
            .inverted_actuator_map
            .get(&self.id.uid())
            .map(|s| s.as_str())
    }

    pub fn parameters(&self) -> Option<&std::collections::HashMap<String, String>> {
        self.net.node_parameters.get(&self.id)
    }
}
