//! Node type descriptors: the closed set of standard types plus native
//! modules registered at construction time.

use std::collections::{BTreeMap, HashMap};

use crate::errors::{NetError, NetResult};
use crate::native::NativeModuleDef;
use crate::FloatX;

/// Numeric codes of the standard node types, as stored in `allocated_nodes`.
pub const REGISTER: i32 = 1;
pub const SENSOR: i32 = 2;
pub const ACTOR: i32 = 3;
pub const CONCEPT: i32 = 4;
pub const PIPE: i32 = 5;
pub const ACTIVATOR: i32 = 6;

/// Native module codes start above this.
pub const MAX_STD_NODETYPE: i32 = ACTIVATOR;

/// The seven canonical gate/slot types, in element order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum GateType {
    Gen = 0,
    Por = 1,
    Ret = 2,
    Sub = 3,
    Sur = 4,
    Cat = 5,
    Exp = 6,
}

impl GateType {
    pub const ALL: [GateType; 7] = [
        GateType::Gen,
        GateType::Por,
        GateType::Ret,
        GateType::Sub,
        GateType::Sur,
        GateType::Cat,
        GateType::Exp,
    ];

    /// The directional types an activator may govern (everything but gen).
    pub const DIRECTIONS: [GateType; 6] = [
        GateType::Por,
        GateType::Ret,
        GateType::Sub,
        GateType::Sur,
        GateType::Cat,
        GateType::Exp,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            GateType::Gen => "gen",
            GateType::Por => "por",
            GateType::Ret => "ret",
            GateType::Sub => "sub",
            GateType::Sur => "sur",
            GateType::Cat => "cat",
            GateType::Exp => "exp",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        GateType::ALL.into_iter().find(|g| g.name() == name)
    }
}

/// Per-gate parameter defaults, applied at node creation. `None` keeps the
/// arena-wide initialisation value.
#[derive(Debug, Clone, Copy, Default)]
pub struct GateDefaults {
    pub minimum: Option<FloatX>,
    pub maximum: Option<FloatX>,
    pub threshold: Option<FloatX>,
    pub amplification: Option<FloatX>,
    pub theta: Option<FloatX>,
    pub decay: Option<FloatX>,
}

/// A node type: ordered slot and gate lists plus creation-time defaults.
#[derive(Debug, Clone)]
pub struct Nodetype {
    pub name: String,
    pub slottypes: Vec<String>,
    pub gatetypes: Vec<String>,
    pub parameters: Vec<String>,
    pub gate_defaults: HashMap<String, GateDefaults>,
}

impl Nodetype {
    fn standard(name: &str, slottypes: &[&str], gatetypes: &[&str], parameters: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            slottypes: slottypes.iter().map(|s| s.to_string()).collect(),
            gatetypes: gatetypes.iter().map(|s| s.to_string()).collect(),
            parameters: parameters.iter().map(|s| s.to_string()).collect(),
            gate_defaults: HashMap::new(),
        }
    }

    /// Number of contiguous arena elements a node of this type occupies.
    pub fn element_count(&self) -> usize {
        self.slottypes.len().max(self.gatetypes.len()).max(1)
    }

    pub fn gate_index(&self, gate: &str) -> Option<usize> {
        self.gatetypes.iter().position(|g| g == gate)
    }

    pub fn slot_index(&self, slot: &str) -> Option<usize> {
        self.slottypes.iter().position(|s| s == slot)
    }
}

const SEVEN_GATES: [&str; 7] = ["gen", "por", "ret", "sub", "sur", "cat", "exp"];

fn pipe_nodetype() -> Nodetype {
    let mut t = Nodetype::standard("Pipe", &SEVEN_GATES, &SEVEN_GATES, &[]);
    for gate in SEVEN_GATES {
        t.gate_defaults.insert(
            gate.to_string(),
            GateDefaults {
                minimum: Some(-1.0),
                maximum: Some(1.0),
                threshold: Some(-1.0),
                ..GateDefaults::default()
            },
        );
    }
    t
}

/// Resolves type names and numeric codes for the standard types and any
/// native modules registered at construction.
#[derive(Debug, Clone)]
pub struct NodetypeRegistry {
    by_code: HashMap<i32, Nodetype>,
    by_name: HashMap<String, i32>,
}

impl NodetypeRegistry {
    pub fn new(native_modules: &[NativeModuleDef]) -> NetResult<Self> {
        let mut by_code = HashMap::new();
        let mut by_name = HashMap::new();

        let standard = [
            (REGISTER, Nodetype::standard("Register", &["gen"], &["gen"], &[])),
            (SENSOR, Nodetype::standard("Sensor", &[], &["gen"], &["datasource"])),
            (ACTOR, Nodetype::standard("Actor", &["gen"], &["gen"], &["datatarget"])),
            (CONCEPT, Nodetype::standard("Concept", &["gen"], &SEVEN_GATES, &[])),
            (PIPE, pipe_nodetype()),
            (ACTIVATOR, Nodetype::standard("Activator", &["gen"], &[], &["type"])),
        ];
        for (code, nodetype) in standard {
            by_name.insert(nodetype.name.clone(), code);
            by_code.insert(code, nodetype);
        }

        // Sort native modules by name so codes are stable across runs.
        let mut natives: BTreeMap<&str, &NativeModuleDef> = BTreeMap::new();
        for def in native_modules {
            if natives.insert(def.name.as_str(), def).is_some() || by_name.contains_key(&def.name) {
                return Err(NetError::DuplicateUid(def.name.clone()));
            }
        }
        for (i, (_, def)) in natives.into_iter().enumerate() {
            let code = MAX_STD_NODETYPE + 1 + i as i32;
            by_name.insert(def.name.clone(), code);
            by_code.insert(code, def.nodetype());
        }

        Ok(Self { by_code, by_name })
    }

    pub fn code_of(&self, name: &str) -> NetResult<i32> {
        self.by_name
            .get(name)
            .copied()
            .ok_or_else(|| NetError::UnknownType(name.to_string()))
    }

    pub fn get(&self, code: i32) -> Option<&Nodetype> {
        self.by_code.get(&code)
    }

    pub fn element_count(&self, code: i32) -> usize {
        self.get(code).map(|t| t.element_count()).unwrap_or(0)
    }

    pub fn is_native(code: i32) -> bool {
        code > MAX_STD_NODETYPE
    }
}
