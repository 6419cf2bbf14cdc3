//! Native module registration.
//!
//! Native modules are node types beyond the standard set, registered as a
//! closed collection when the nodenet is constructed. Their node function is
//! an opaque callable run during the Calculate pass; a failing callable is
//! trapped, logged, and its node's gates are zeroed for the step.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::errors::NetResult;
use crate::nodetype::Nodetype;
use crate::FloatX;

/// Callable installed for a native module type.
///
/// Reads slot activations, writes raw gate values; the regular gate-function
/// pipeline is applied to the written values afterwards. Failures are
/// usually reported as [`crate::NetError::Nodefunction`].
pub type NodeFunction =
    Arc<dyn Fn(&mut NativeContext<'_>) -> NetResult<()> + Send + Sync>;

/// Registration record for one native module type.
#[derive(Clone)]
pub struct NativeModuleDef {
    pub name: String,
    pub slottypes: Vec<String>,
    pub gatetypes: Vec<String>,
    pub parameters: Vec<String>,
    pub nodefunction: NodeFunction,
}

impl NativeModuleDef {
    pub fn nodetype(&self) -> Nodetype {
        Nodetype {
            name: self.name.clone(),
            slottypes: self.slottypes.clone(),
            gatetypes: self.gatetypes.clone(),
            parameters: self.parameters.clone(),
            gate_defaults: HashMap::new(),
        }
    }
}

impl fmt::Debug for NativeModuleDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeModuleDef")
            .field("name", &self.name)
            .field("slottypes", &self.slottypes)
            .field("gatetypes", &self.gatetypes)
            .field("parameters", &self.parameters)
            .finish()
    }
}

/// Per-invocation view handed to a native node function.
pub struct NativeContext<'a> {
    /// Post-propagation slot activations of the node, in slot order.
    pub slots: &'a [FloatX],
    /// Raw gate outputs to be written, in gate order.
    pub gates: &'a mut [FloatX],
    /// The node's parameter map as given at creation.
    pub parameters: &'a HashMap<String, String>,
}
