//! The nodenet facade: every public mutation and query of the engine.
//!
//! All state lives in flat vectors (see `arena`, `gates`, `matrix`); the
//! methods here translate uid-level operations into element-level array
//! writes, validating every reference before touching anything.

use std::collections::HashMap;

use ndarray::{Array1, Array2};
use tracing::{debug, info, warn};

use crate::arena::Arena;
use crate::config::NetConfig;
use crate::errors::{NetError, NetResult};
use crate::gates::{shape_output, GateFunction, GateVectors};
use crate::ids::{NodeId, NodespaceId, ROOT_NODESPACE};
use crate::matrix::WeightMatrix;

use crate::native::{NativeContext, NativeModuleDef, NodeFunction};
use crate::node::NodeView;
use crate::nodetype::{GateDefaults, GateType, Nodetype, NodetypeRegistry, ACTIVATOR, PIPE};
use crate::pipe::{self, ShiftedView, NFPG_PIPE_NON, PIPE_SELECTORS};
use crate::step::{standard_operators, StepOperator};
use crate::world::WorldAdapter;
use crate::FloatX;

/// Scalar gate parameters addressable through the facade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateParameter {
    Minimum,
    Maximum,
    Threshold,
    Amplification,
    Theta,
    Decay,
}

/// Optional settings for `create_node`.
#[derive(Default, Clone)]
pub struct NodeOptions {
    pub position: Option<[f64; 3]>,
    pub name: Option<String>,
    pub uid: Option<String>,
    pub parameters: HashMap<String, String>,
    pub gate_parameters: HashMap<String, GateDefaults>,
    pub gate_functions: HashMap<String, GateFunction>,
}

/// One reconstructed link record. The matrix is the authoritative store;
/// these are derived views for enumeration and metadata consumers.
#[derive(Debug, Clone, PartialEq)]
pub struct Link {
    pub uid: String,
    pub source_node_uid: String,
    pub source_gate: String,
    pub target_node_uid: String,
    pub target_slot: String,
    pub weight: FloatX,
    pub certainty: FloatX,
}

pub struct Nodenet {
    pub(crate) uid: String,
    pub(crate) name: String,
    pub(crate) owner: String,
    pub(crate) worldadapter_name: String,
    pub(crate) config: NetConfig,
    pub(crate) current_step: u64,

    pub(crate) arena: Arena,
    pub(crate) gates: GateVectors,
    /// Activations at the start of the running step; the decay blend reads
    /// the previous gate outputs from here.
    pub(crate) a_prev: Array1<FloatX>,
    pub(crate) w: WeightMatrix,
    pub(crate) registry: NodetypeRegistry,
    pub(crate) native_functions: HashMap<i32, NodeFunction>,

    pub(crate) positions: HashMap<String, [f64; 3]>,
    pub(crate) names: HashMap<String, String>,
    pub(crate) sensormap: HashMap<String, Vec<usize>>,
    pub(crate) inverted_sensor_map: HashMap<String, String>,
    pub(crate) actuatormap: HashMap<String, Vec<usize>>,
    pub(crate) inverted_actuator_map: HashMap<String, String>,
    pub(crate) node_parameters: HashMap<NodeId, HashMap<String, String>>,
    pub(crate) nodegroups: HashMap<String, Vec<usize>>,

    pub(crate) stepoperators: Vec<Box<dyn StepOperator>>,
    pub(crate) world: Option<Box<dyn WorldAdapter>>,

    pub(crate) has_pipes: bool,
    pub(crate) has_directional_activators: bool,
}

impl Nodenet {
    pub fn new(name: &str, config: NetConfig) -> Self {
        // the standard registry cannot collide with itself
        Self::with_native_modules(name, config, &[]).expect("standard node types are unique")
    }

    pub fn with_native_modules(
        name: &str,
        config: NetConfig,
        native_modules: &[NativeModuleDef],
    ) -> NetResult<Self> {
        config.validate();
        let registry = NodetypeRegistry::new(native_modules)?;
        let mut native_functions = HashMap::new();
        for def in native_modules {
            let code = registry.code_of(&def.name)?;
            native_functions.insert(code, def.nodefunction.clone());
        }
        info!(
            name,
            sparse = config.sparse,
            nodes = config.number_of_nodes,
            elements = config.number_of_elements,
            "initialising nodenet"
        );
        let mut net = Self {
            uid: uuid::Uuid::new_v4().simple().to_string(),
            name: name.to_string(),
            owner: String::new(),
            worldadapter_name: String::new(),
            arena: Arena::new(
                config.number_of_nodes,
                config.number_of_elements,
                config.number_of_nodespaces,
            ),
            gates: GateVectors::new(config.number_of_elements),
            a_prev: Array1::zeros(config.number_of_elements),
            w: WeightMatrix::zeros(config.number_of_elements, config.sparse),
            registry,
            native_functions,
            config,
            current_step: 0,
            positions: HashMap::new(),
            names: HashMap::new(),
            sensormap: HashMap::new(),
            inverted_sensor_map: HashMap::new(),
            actuatormap: HashMap::new(),
            inverted_actuator_map: HashMap::new(),
            node_parameters: HashMap::new(),
            nodegroups: HashMap::new(),
            stepoperators: standard_operators(),
            world: None,
            has_pipes: false,
            has_directional_activators: false,
        };
        net.names.insert(ROOT_NODESPACE.uid(), "Root".to_string());
        Ok(net)
    }

    /// Drops all runtime state and restores the freshly-constructed layout.
    /// Identity (uid, name, owner) and the registry survive.
    pub(crate) fn reinitialize(&mut self) {
        self.arena = Arena::new(
            self.config.number_of_nodes,
            self.config.number_of_elements,
            self.config.number_of_nodespaces,
        );
        self.gates = GateVectors::new(self.config.number_of_elements);
        self.a_prev = Array1::zeros(self.config.number_of_elements);
        self.w = WeightMatrix::zeros(self.config.number_of_elements, self.config.sparse);
        self.current_step = 0;
        self.positions.clear();
        self.names.clear();
        self.sensormap.clear();
        self.inverted_sensor_map.clear();
        self.actuatormap.clear();
        self.inverted_actuator_map.clear();
        self.node_parameters.clear();
        self.nodegroups.clear();
        self.has_pipes = false;
        self.has_directional_activators = false;
        self.names.insert(ROOT_NODESPACE.uid(), "Root".to_string());
    }

    pub fn uid(&self) -> &str {
        &self.uid
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn set_owner(&mut self, owner: &str) {
        self.owner = owner.to_string();
    }

    pub fn current_step(&self) -> u64 {
        self.current_step
    }

    pub fn config(&self) -> &NetConfig {
        &self.config
    }

    pub fn worldadapter_name(&self) -> &str {
        &self.worldadapter_name
    }

    pub fn set_world_adapter(&mut self, name: &str, adapter: Box<dyn WorldAdapter>) {
        self.worldadapter_name = name.to_string();
        self.world = Some(adapter);
    }

    // ------------------------------------------------------------------
    // id resolution helpers

    fn resolve_node(&self, uid: &str) -> NetResult<NodeId> {
        NodeId::from_uid(uid)
            .filter(|&id| self.arena.is_node(id))
            .ok_or_else(|| NetError::UnknownUid(uid.to_string()))
    }

    fn resolve_nodespace(&self, uid: &str) -> NetResult<NodespaceId> {
        NodespaceId::from_uid(uid)
            .filter(|&id| self.arena.is_nodespace(id))
            .ok_or_else(|| NetError::UnknownNodespace(uid.to_string()))
    }

    fn nodetype_of(&self, id: NodeId) -> &Nodetype {
        self.registry
            .get(self.arena.node_type_code(id))
            .expect("live node with unregistered type")
    }

    fn gate_element(&self, uid: &str, gate: &str) -> NetResult<usize> {
        let id = self.resolve_node(uid)?;
        let nodetype = self.nodetype_of(id);
        let index = nodetype.gate_index(gate).ok_or_else(|| NetError::UnknownGate {
            nodetype: nodetype.name.clone(),
            gate: gate.to_string(),
        })?;
        Ok(self.arena.node_offset(id) + index)
    }

    // ------------------------------------------------------------------
    // nodes

    pub fn create_node(&mut self, nodetype: &str, nodespace: &str, options: NodeOptions) -> NetResult<String> {
        let type_code = self.registry.code_of(nodetype)?;
        let parent = self.resolve_nodespace(nodespace)?;
        let definition = self
            .registry
            .get(type_code)
            .expect("resolved code without definition")
            .clone();

        // validate everything up front; nothing may be half-created
        let requested = match &options.uid {
            Some(uid) => {
                let id = NodeId::from_uid(uid).ok_or_else(|| NetError::UnknownUid(uid.clone()))?;
                if self.arena.is_node(id) {
                    return Err(NetError::DuplicateUid(uid.clone()));
                }
                Some(id)
            }
            None => None,
        };
        for gate in options.gate_parameters.keys().chain(options.gate_functions.keys()) {
            if definition.gate_index(gate).is_none() {
                return Err(NetError::UnknownGate {
                    nodetype: definition.name.clone(),
                    gate: gate.clone(),
                });
            }
        }
        let activator_direction = if type_code == ACTIVATOR {
            match options.parameters.get("type") {
                Some(direction) => Some(
                    GateType::from_name(direction)
                        .filter(|d| *d != GateType::Gen)
                        .ok_or_else(|| NetError::UnknownGate {
                            nodetype: definition.name.clone(),
                            gate: direction.clone(),
                        })?,
                ),
                None => None,
            }
        } else {
            None
        };

        let element_count = definition.element_count();
        let id = self.arena.allocate_node(type_code, element_count, parent, requested)?;
        let offset = self.arena.node_offset(id);
        let uid = id.uid();

        if let Some(position) = options.position {
            self.positions.insert(uid.clone(), position);
        }
        if let Some(name) = &options.name {
            if !name.is_empty() && name != &uid {
                self.names.insert(uid.clone(), name.clone());
            }
        }
        if !options.parameters.is_empty() {
            self.node_parameters.insert(id, options.parameters.clone());
        }

        match definition.name.as_str() {
            "Sensor" => {
                if let Some(datasource) = options.parameters.get("datasource") {
                    self.sensormap.entry(datasource.clone()).or_default().push(id.0);
                    self.inverted_sensor_map.insert(uid.clone(), datasource.clone());
                }
            }
            "Actor" => {
                if let Some(datatarget) = options.parameters.get("datatarget") {
                    self.actuatormap.entry(datatarget.clone()).or_default().push(id.0);
                    self.inverted_actuator_map.insert(uid.clone(), datatarget.clone());
                }
            }
            "Pipe" => {
                self.has_pipes = true;
                for (k, selector) in PIPE_SELECTORS.iter().enumerate() {
                    self.gates.n_function_selector[offset + k] = *selector;
                }
                // new pipes inherit the nodespace's current activator bindings
                for direction in GateType::DIRECTIONS {
                    let activator = self.arena.activator_vector(direction)[parent.0] as usize;
                    let activator_offset = self.arena.allocated_node_offsets[activator];
                    self.arena.allocated_elements_to_activators[offset + direction.index()] =
                        activator_offset;
                }
            }
            "Activator" => {
                self.has_directional_activators = true;
                if let Some(direction) = activator_direction {
                    self.set_nodespace_gatetype_activator(nodespace, direction, Some(&uid))?;
                }
            }
            _ => {}
        }

        for (gate, defaults) in &definition.gate_defaults {
            let index = definition.gate_index(gate).expect("default for undeclared gate");
            self.apply_gate_defaults(offset + index, defaults);
        }
        for (gate, overrides) in &options.gate_parameters {
            let index = definition.gate_index(gate).expect("validated above");
            self.apply_gate_defaults(offset + index, overrides);
        }
        for (gate, function) in &options.gate_functions {
            let index = definition.gate_index(gate).expect("validated above");
            self.gates.g_function_selector[offset + index] = function.selector();
        }

        debug!(uid = %uid, nodetype = definition.name.as_str(), offset, "created node");
        Ok(uid)
    }

    fn apply_gate_defaults(&mut self, e: usize, defaults: &GateDefaults) {
        if let Some(v) = defaults.minimum {
            self.gates.g_min[e] = v;
        }
        if let Some(v) = defaults.maximum {
            self.gates.g_max[e] = v;
        }
        if let Some(v) = defaults.threshold {
            self.gates.g_threshold[e] = v;
        }
        if let Some(v) = defaults.amplification {
            self.gates.g_amplification[e] = v;
        }
        if let Some(v) = defaults.theta {
            self.gates.g_theta[e] = v;
        }
        if let Some(v) = defaults.decay {
            self.gates.g_decay[e] = v;
        }
    }

    pub fn delete_node(&mut self, uid: &str) -> NetResult<()> {
        let id = self.resolve_node(uid)?;
        let element_count = self.nodetype_of(id).element_count();
        let offset = self.arena.node_offset(id);

        // unlink completely, remembering pipes whose por/ret slots lose links
        let mut affected_pipes: Vec<NodeId> = Vec::new();
        for e in offset..offset + element_count {
            for (target_element, _) in self.w.col_nonzeros(e) {
                let target = NodeId(self.arena.allocated_elements_to_nodes[target_element] as usize);
                if target != id && self.arena.node_type_code(target) == PIPE {
                    let slot = target_element - self.arena.node_offset(target);
                    if slot == GateType::Por.index() || slot == GateType::Ret.index() {
                        affected_pipes.push(target);
                    }
                }
            }
            self.w.clear_row(e);
            self.w.clear_column(e);
        }
        affected_pipes.sort_unstable();
        affected_pipes.dedup();
        for pipe in affected_pipes {
            self.recompute_por_ret_flags(pipe);
        }

        for e in offset..offset + element_count {
            self.gates.reset_element(e);
            self.a_prev[e] = 0.0;
        }

        // drop activator bindings that pointed at this node
        for e in 0..self.arena.element_capacity() {
            if self.arena.allocated_elements_to_activators[e] as usize == offset {
                self.arena.allocated_elements_to_activators[e] = 0;
            }
        }
        for direction in GateType::DIRECTIONS {
            let vector = self.arena.activator_vector_mut(direction);
            for entry in vector.iter_mut() {
                if *entry as usize == id.0 {
                    *entry = 0;
                }
            }
        }

        self.arena.free_node(id, element_count);
        self.names.remove(uid);
        self.positions.remove(uid);
        self.node_parameters.remove(&id);

        if let Some(datasource) = self.inverted_sensor_map.remove(uid) {
            if let Some(ids) = self.sensormap.get_mut(&datasource) {
                ids.retain(|&i| i != id.0);
                if ids.is_empty() {
                    self.sensormap.remove(&datasource);
                }
            }
        }
        if let Some(datatarget) = self.inverted_actuator_map.remove(uid) {
            if let Some(ids) = self.actuatormap.get_mut(&datatarget) {
                ids.retain(|&i| i != id.0);
                if ids.is_empty() {
                    self.actuatormap.remove(&datatarget);
                }
            }
        }

        debug!(uid, "deleted node");
        Ok(())
    }

    pub fn get_node(&self, uid: &str) -> Option<NodeView<'_>> {
        let id = NodeId::from_uid(uid)?;
        self.arena.is_node(id).then(|| NodeView { net: self, id })
    }

    pub fn is_node(&self, uid: &str) -> bool {
        self.get_node(uid).is_some()
    }

    pub fn get_node_uids(&self) -> Vec<String> {
        self.arena.node_ids().map(NodeId::uid).collect()
    }

    pub fn nodes_in_nodespace(&self, nodespace: &str) -> NetResult<Vec<String>> {
        let id = self.resolve_nodespace(nodespace)?;
        Ok(self.arena.nodes_in_nodespace(id).into_iter().map(NodeId::uid).collect())
    }

    // ------------------------------------------------------------------
    // nodespaces

    pub fn create_nodespace(&mut self, parent: &str, name: Option<&str>, uid: Option<&str>) -> NetResult<String> {
        let parent_id = self.resolve_nodespace(parent)?;
        let requested = match uid {
            Some(uid) => {
                let id = NodespaceId::from_uid(uid)
                    .ok_or_else(|| NetError::UnknownNodespace(uid.to_string()))?;
                if self.arena.is_nodespace(id) {
                    return Err(NetError::DuplicateUid(uid.to_string()));
                }
                Some(id)
            }
            None => None,
        };
        let id = self.arena.allocate_nodespace(parent_id, requested)?;
        let uid = id.uid();
        if let Some(name) = name {
            if !name.is_empty() && name != uid {
                self.names.insert(uid.clone(), name.to_string());
            }
        }
        Ok(uid)
    }

    pub fn delete_nodespace(&mut self, uid: &str) -> NetResult<()> {
        let id = self.resolve_nodespace(uid)?;
        if id == ROOT_NODESPACE {
            return Err(NetError::RootNodespace);
        }
        self.delete_nodespace_recursive(id)
    }

    fn delete_nodespace_recursive(&mut self, id: NodespaceId) -> NetResult<()> {
        for child in self.arena.child_nodespaces(id) {
            self.delete_nodespace_recursive(child)?;
        }
        for node in self.arena.nodes_in_nodespace(id) {
            self.delete_node(&node.uid())?;
        }
        self.names.remove(&id.uid());
        self.positions.remove(&id.uid());
        self.arena.free_nodespace(id);
        Ok(())
    }

    pub fn is_nodespace(&self, uid: &str) -> bool {
        NodespaceId::from_uid(uid).is_some_and(|id| self.arena.is_nodespace(id))
    }

    pub fn get_nodespace_uids(&self) -> Vec<String> {
        self.arena.nodespace_ids().map(NodespaceId::uid).collect()
    }

    pub fn nodespaces_in_nodespace(&self, nodespace: &str) -> NetResult<Vec<String>> {
        let id = self.resolve_nodespace(nodespace)?;
        Ok(self.arena.child_nodespaces(id).into_iter().map(NodespaceId::uid).collect())
    }

    // ------------------------------------------------------------------
    // activators

    /// Binds (or, with `None`, unbinds) the directional activator of a
    /// nodespace and rewires every pipe already living there.
    pub fn set_nodespace_gatetype_activator(
        &mut self,
        nodespace: &str,
        direction: GateType,
        activator_uid: Option<&str>,
    ) -> NetResult<()> {
        if direction == GateType::Gen {
            return Err(NetError::UnknownGate {
                nodetype: "Activator".to_string(),
                gate: direction.name().to_string(),
            });
        }
        let nodespace_id = self.resolve_nodespace(nodespace)?;
        let activator_id = match activator_uid {
            Some(uid) if !uid.is_empty() => self.resolve_node(uid)?,
            _ => NodeId(0),
        };
        if activator_id.0 != 0 {
            self.has_directional_activators = true;
        }
        self.arena.activator_vector_mut(direction)[nodespace_id.0] = activator_id.0 as i32;

        let activator_offset = self.arena.allocated_node_offsets[activator_id.0];
        for node in self.arena.nodes_in_nodespace(nodespace_id) {
            if self.arena.node_type_code(node) == PIPE {
                let e = self.arena.node_offset(node) + direction.index();
                self.arena.allocated_elements_to_activators[e] = activator_offset;
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // links

    pub fn create_link(
        &mut self,
        source: &str,
        gate: &str,
        target: &str,
        slot: &str,
        weight: FloatX,
        _certainty: FloatX,
    ) -> NetResult<()> {
        self.set_link_weight(source, gate, target, slot, weight)
    }

    pub fn set_link_weight(
        &mut self,
        source: &str,
        gate: &str,
        target: &str,
        slot: &str,
        weight: FloatX,
    ) -> NetResult<()> {
        let source_id = self.resolve_node(source)?;
        let target_id = self.resolve_node(target)?;
        let source_type = self.nodetype_of(source_id);
        let gate_index = source_type.gate_index(gate).ok_or_else(|| NetError::UnknownGate {
            nodetype: source_type.name.clone(),
            gate: gate.to_string(),
        })?;
        let target_type = self.nodetype_of(target_id);
        let slot_index = target_type.slot_index(slot).ok_or_else(|| NetError::UnknownSlot {
            nodetype: target_type.name.clone(),
            slot: slot.to_string(),
        })?;

        let x = self.arena.node_offset(target_id) + slot_index;
        let y = self.arena.node_offset(source_id) + gate_index;
        self.w.set(x, y, weight);

        if self.arena.node_type_code(target_id) == PIPE
            && (slot_index == GateType::Por.index() || slot_index == GateType::Ret.index())
        {
            self.recompute_por_ret_flags(target_id);
        }
        Ok(())
    }

    pub fn get_link_weight(&self, source: &str, gate: &str, target: &str, slot: &str) -> NetResult<FloatX> {
        let source_id = self.resolve_node(source)?;
        let target_id = self.resolve_node(target)?;
        let source_type = self.nodetype_of(source_id);
        let gate_index = source_type.gate_index(gate).ok_or_else(|| NetError::UnknownGate {
            nodetype: source_type.name.clone(),
            gate: gate.to_string(),
        })?;
        let target_type = self.nodetype_of(target_id);
        let slot_index = target_type.slot_index(slot).ok_or_else(|| NetError::UnknownSlot {
            nodetype: target_type.name.clone(),
            slot: slot.to_string(),
        })?;
        Ok(self.w.get(
            self.arena.node_offset(target_id) + slot_index,
            self.arena.node_offset(source_id) + gate_index,
        ))
    }

    pub fn delete_link(&mut self, source: &str, gate: &str, target: &str, slot: &str) -> NetResult<()> {
        self.set_link_weight(source, gate, target, slot, 0.0)
    }

    /// Re-derives the por/ret incidence flags of a pipe from the matrix
    /// instead of trusting the last weight assignment, so clearing one of
    /// several incoming links keeps the flag set.
    fn recompute_por_ret_flags(&mut self, id: NodeId) {
        if self.arena.node_type_code(id) != PIPE {
            return;
        }
        let offset = self.arena.node_offset(id);
        let porlinked = self.w.row_has_nonzero(offset + GateType::Por.index()) as i8;
        let retlinked = self.w.row_has_nonzero(offset + GateType::Ret.index()) as i8;
        for k in 0..7 {
            self.gates.n_node_porlinked[offset + k] = porlinked;
            self.gates.n_node_retlinked[offset + k] = retlinked;
        }
    }

    /// Reconstructs all links from the matrix.
    pub fn links(&self) -> Vec<Link> {
        let mut links = Vec::new();
        for x in 0..self.arena.element_capacity() {
            let target_raw = self.arena.allocated_elements_to_nodes[x];
            if target_raw == 0 {
                continue;
            }
            let target = NodeId(target_raw as usize);
            let target_type = self.nodetype_of(target);
            let slot_index = x - self.arena.node_offset(target);
            let Some(slot) = target_type.slottypes.get(slot_index) else {
                continue;
            };
            for (y, weight) in self.w.row_nonzeros(x) {
                let source = NodeId(self.arena.allocated_elements_to_nodes[y] as usize);
                let source_type = self.nodetype_of(source);
                let gate_index = y - self.arena.node_offset(source);
                let Some(gate) = source_type.gatetypes.get(gate_index) else {
                    continue;
                };
                let (source_uid, target_uid) = (source.uid(), target.uid());
                links.push(Link {
                    uid: format!("{source_uid}:{gate}:{target_uid}:{slot}"),
                    source_node_uid: source_uid,
                    source_gate: gate.clone(),
                    target_node_uid: target_uid,
                    target_slot: slot.clone(),
                    weight,
                    certainty: 1.0,
                });
            }
        }
        links
    }

    // ------------------------------------------------------------------
    // gate state

    pub fn set_gate_parameter(
        &mut self,
        uid: &str,
        gate: &str,
        parameter: GateParameter,
        value: FloatX,
    ) -> NetResult<()> {
        let e = self.gate_element(uid, gate)?;
        match parameter {
            GateParameter::Minimum => self.gates.g_min[e] = value,
            GateParameter::Maximum => self.gates.g_max[e] = value,
            GateParameter::Threshold => self.gates.g_threshold[e] = value,
            GateParameter::Amplification => self.gates.g_amplification[e] = value,
            GateParameter::Theta => self.gates.g_theta[e] = value,
            GateParameter::Decay => self.gates.g_decay[e] = value,
        }
        Ok(())
    }

    pub fn get_gate_parameter(&self, uid: &str, gate: &str, parameter: GateParameter) -> NetResult<FloatX> {
        let e = self.gate_element(uid, gate)?;
        Ok(match parameter {
            GateParameter::Minimum => self.gates.g_min[e],
            GateParameter::Maximum => self.gates.g_max[e],
            GateParameter::Threshold => self.gates.g_threshold[e],
            GateParameter::Amplification => self.gates.g_amplification[e],
            GateParameter::Theta => self.gates.g_theta[e],
            GateParameter::Decay => self.gates.g_decay[e],
        })
    }

    pub fn set_gate_function(&mut self, uid: &str, gate: &str, function: GateFunction) -> NetResult<()> {
        let e = self.gate_element(uid, gate)?;
        self.gates.g_function_selector[e] = function.selector();
        Ok(())
    }

    pub fn get_gate_function(&self, uid: &str, gate: &str) -> NetResult<GateFunction> {
        let e = self.gate_element(uid, gate)?;
        Ok(GateFunction::from_selector(self.gates.g_function_selector[e]))
    }

    pub fn set_gate_activation(&mut self, uid: &str, gate: &str, value: FloatX) -> NetResult<()> {
        let e = self.gate_element(uid, gate)?;
        self.gates.a[e] = value;
        Ok(())
    }

    pub fn get_gate_activation(&self, uid: &str, gate: &str) -> NetResult<FloatX> {
        let e = self.gate_element(uid, gate)?;
        Ok(self.gates.a[e])
    }

    // ------------------------------------------------------------------
    // sensors and actuators

    /// Writes datasource values into the bound sensors' gen elements and
    /// datatarget feedback into the bound actors' gen elements.
    pub fn set_sensors_and_actuator_feedback_to_values(
        &mut self,
        datasource_values: &HashMap<String, FloatX>,
        datatarget_values: &HashMap<String, FloatX>,
    ) {
        for (datasource, value) in datasource_values {
            if let Some(ids) = self.sensormap.get(datasource) {
                for &id in ids {
                    self.gates.a[self.arena.allocated_node_offsets[id] as usize] = *value;
                }
            }
        }
        for (datatarget, value) in datatarget_values {
            if let Some(ids) = self.actuatormap.get(datatarget) {
                for &id in ids {
                    self.gates.a[self.arena.allocated_node_offsets[id] as usize] = *value;
                }
            }
        }
    }

    /// Sums each datatarget's actor gen activations for the world adapter.
    pub fn read_actuators(&self) -> HashMap<String, FloatX> {
        let mut values = HashMap::new();
        for (datatarget, ids) in &self.actuatormap {
            let sum = ids
                .iter()
                .map(|&id| self.gates.a[self.arena.allocated_node_offsets[id] as usize])
                .sum();
            values.insert(datatarget.clone(), sum);
        }
        values
    }

    pub fn get_sensors(&self, nodespace: Option<&str>, datasource: Option<&str>) -> NetResult<Vec<String>> {
        self.collect_bound_nodes(&self.sensormap, nodespace, datasource)
    }

    pub fn get_actors(&self, nodespace: Option<&str>, datatarget: Option<&str>) -> NetResult<Vec<String>> {
        self.collect_bound_nodes(&self.actuatormap, nodespace, datatarget)
    }

    fn collect_bound_nodes(
        &self,
        map: &HashMap<String, Vec<usize>>,
        nodespace: Option<&str>,
        key: Option<&str>,
    ) -> NetResult<Vec<String>> {
        let nodespace_id = nodespace.map(|uid| self.resolve_nodespace(uid)).transpose()?;
        let mut ids: Vec<usize> = match key {
            Some(key) => map.get(key).cloned().unwrap_or_default(),
            None => map.values().flatten().copied().collect(),
        };
        ids.sort_unstable();
        Ok(ids
            .into_iter()
            .filter(|&id| {
                nodespace_id.is_none_or(|ns| self.arena.node_parent(NodeId(id)) == ns)
            })
            .map(|id| NodeId(id).uid())
            .collect())
    }

    // ------------------------------------------------------------------
    // node groups

    pub fn group_nodes_by_ids(&mut self, uids: &[String], group: &str) -> NetResult<()> {
        let mut ids = Vec::with_capacity(uids.len());
        for uid in uids {
            ids.push(self.resolve_node(uid)?);
        }
        ids.sort_unstable();
        let offsets = ids.into_iter().map(|id| self.arena.node_offset(id)).collect();
        self.nodegroups.insert(group.to_string(), offsets);
        Ok(())
    }

    pub fn group_nodes_by_names(&mut self, nodespace: Option<&str>, name_prefix: &str) -> NetResult<()> {
        let nodespace_id = nodespace.map(|uid| self.resolve_nodespace(uid)).transpose()?;
        let uids: Vec<String> = self
            .names
            .iter()
            .filter(|(uid, name)| {
                name.starts_with(name_prefix)
                    && NodeId::from_uid(uid).is_some_and(|id| {
                        self.arena.is_node(id)
                            && nodespace_id.is_none_or(|ns| self.arena.node_parent(id) == ns)
                    })
            })
            .map(|(uid, _)| uid.clone())
            .collect();
        self.group_nodes_by_ids(&uids, name_prefix)
    }

    pub fn ungroup_nodes(&mut self, group: &str) {
        self.nodegroups.remove(group);
    }

    fn group_offsets(&self, group: &str) -> NetResult<&[usize]> {
        self.nodegroups
            .get(group)
            .map(|v| v.as_slice())
            .ok_or_else(|| NetError::UnknownGroup(group.to_string()))
    }

    pub fn get_activations(&self, group: &str) -> NetResult<Array1<FloatX>> {
        let offsets = self.group_offsets(group)?;
        Ok(offsets.iter().map(|&e| self.gates.a[e]).collect())
    }

    pub fn get_thetas(&self, group: &str) -> NetResult<Array1<FloatX>> {
        let offsets = self.group_offsets(group)?;
        Ok(offsets.iter().map(|&e| self.gates.g_theta[e]).collect())
    }

    pub fn set_thetas(&mut self, group: &str, thetas: &Array1<FloatX>) -> NetResult<()> {
        let offsets = self.group_offsets(group)?.to_vec();
        if thetas.len() != offsets.len() {
            return Err(NetError::ShapeMismatch {
                expected: vec![offsets.len()],
                found: vec![thetas.len()],
            });
        }
        for (&e, &theta) in offsets.iter().zip(thetas.iter()) {
            self.gates.g_theta[e] = theta;
        }
        Ok(())
    }

    /// Sub-matrix of link weights from one group's gen gates to another's
    /// gen slots: rows follow `group_to`, columns `group_from`.
    pub fn get_link_weights(&self, group_from: &str, group_to: &str) -> NetResult<Array2<FloatX>> {
        let from = self.group_offsets(group_from)?;
        let to = self.group_offsets(group_to)?;
        Ok(Array2::from_shape_fn((to.len(), from.len()), |(i, j)| {
            self.w.get(to[i], from[j])
        }))
    }

    pub fn set_link_weights(&mut self, group_from: &str, group_to: &str, weights: &Array2<FloatX>) -> NetResult<()> {
        let from = self.group_offsets(group_from)?.to_vec();
        let to = self.group_offsets(group_to)?.to_vec();
        if weights.dim() != (to.len(), from.len()) {
            return Err(NetError::ShapeMismatch {
                expected: vec![to.len(), from.len()],
                found: weights.shape().to_vec(),
            });
        }
        for (i, &x) in to.iter().enumerate() {
            for (j, &y) in from.iter().enumerate() {
                self.w.set(x, y, weights[[i, j]]);
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // stepping

    /// One full simulation step: world snapshot, then every operator in
    /// priority order, then the step counter. Atomic with respect to the
    /// public API; there is no suspension point inside.
    pub fn step(&mut self) -> NetResult<()> {
        if let Some(world) = self.world.as_mut() {
            world.snapshot();
        }
        self.a_prev.assign(&self.gates.a);

        let operators = std::mem::take(&mut self.stepoperators);
        let mut outcome = Ok(());
        for operator in &operators {
            outcome = operator.execute(self);
            if outcome.is_err() {
                break;
            }
        }
        self.stepoperators = operators;
        outcome?;

        self.current_step += 1;
        Ok(())
    }

    pub(crate) fn read_sensors_from_world(&mut self) {
        let Some(world) = self.world.as_mut() else {
            return;
        };
        for (datasource, ids) in &self.sensormap {
            let value = world.get_datasource(&self.uid, datasource).unwrap_or(0.0);
            for &id in ids {
                self.gates.a[self.arena.allocated_node_offsets[id] as usize] = value;
            }
        }
    }

    /// Per-element node functions over the post-propagation activations.
    pub(crate) fn compute_node_functions(&self) -> Array1<FloatX> {
        let mut raw = self.gates.a.clone();
        if !self.has_pipes {
            return raw;
        }
        let a = self
            .gates
            .a
            .as_slice()
            .expect("activation vector is contiguous");
        let view = ShiftedView::new(a);
        for e in 0..self.gates.len() {
            let selector = self.gates.n_function_selector[e];
            if selector != NFPG_PIPE_NON {
                raw[e] = pipe::node_function(
                    selector,
                    &view,
                    e,
                    self.gates.g_theta[e],
                    self.gates.n_node_porlinked[e] != 0,
                    self.gates.n_node_retlinked[e] != 0,
                );
            }
        }
        raw
    }

    /// Runs registered native-module node functions. A failing function is
    /// trapped: its node's gates are zeroed and the step goes on.
    pub(crate) fn run_native_modules(&mut self, raw: &mut Array1<FloatX>) {
        let native_ids: Vec<NodeId> = self
            .arena
            .node_ids()
            .filter(|&id| NodetypeRegistry::is_native(self.arena.node_type_code(id)))
            .collect();
        for id in native_ids {
            let code = self.arena.node_type_code(id);
            let nodetype = self.nodetype_of(id);
            let (slot_count, gate_count) = (nodetype.slottypes.len(), nodetype.gatetypes.len());
            let offset = self.arena.node_offset(id);
            let Some(function) = self.native_functions.get(&code) else {
                continue;
            };
            let slots: Vec<FloatX> = (0..slot_count).map(|k| self.gates.a[offset + k]).collect();
            let mut outputs = vec![0.0 as FloatX; gate_count];
            let empty = HashMap::new();
            let parameters = self.node_parameters.get(&id).unwrap_or(&empty);
            let mut context = NativeContext {
                slots: &slots,
                gates: &mut outputs,
                parameters,
            };
            match function(&mut context) {
                Ok(()) => {
                    for (k, value) in outputs.into_iter().enumerate() {
                        raw[offset + k] = value;
                    }
                }
                Err(error) => {
                    warn!(uid = %id.uid(), %error, "node function failed, zeroing gates");
                    for k in 0..gate_count {
                        raw[offset + k] = 0.0;
                    }
                }
            }
        }
    }

    /// The gate pass: transfer function, then output shaping with the
    /// activator factor, writing the new activation vector.
    pub(crate) fn apply_gate_functions(&mut self, raw: &Array1<FloatX>) {
        let mut out = self.gates.a.clone();
        for e in 0..self.gates.len() {
            if self.arena.allocated_elements_to_nodes[e] == 0 {
                continue;
            }
            let factor = if self.has_directional_activators {
                let binding = self.arena.allocated_elements_to_activators[e] as usize;
                if binding == 0 {
                    1.0
                } else {
                    self.gates.a[binding]
                }
            } else {
                1.0
            };
            let function = GateFunction::from_selector(self.gates.g_function_selector[e]);
            let transferred = function.transfer(raw[e], self.gates.g_theta[e]);
            out[e] = shape_output(
                transferred,
                self.a_prev[e],
                self.gates.g_threshold[e],
                self.gates.g_amplification[e],
                factor,
                self.gates.g_decay[e],
                self.gates.g_min[e],
                self.gates.g_max[e],
            );
        }
        self.gates.a = out;
    }

    pub(crate) fn write_actuators_to_world(&mut self) {
        if self.world.is_none() {
            return;
        }
        let values = self.read_actuators();
        let uid = self.uid.clone();
        if let Some(world) = self.world.as_mut() {
            for (datatarget, value) in values {
                world.set_datatarget(&uid, &datatarget, value);
            }
        }
    }
}
