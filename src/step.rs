//! The step operators.
//!
//! A step runs every operator in ascending priority order under the net
//! lock: Propagate first, Calculate second. Operators are stateless; the
//! heavy lifting lives in the nodenet's kernel methods.

use crate::errors::NetResult;
use crate::nodenet::Nodenet;

pub trait StepOperator: Send {
    fn priority(&self) -> u32;
    fn execute(&self, net: &mut Nodenet) -> NetResult<()>;
}

/// Spreads activation across the weight matrix: `a <- W * a`.
pub struct Propagate;

impl StepOperator for Propagate {
    fn priority(&self) -> u32 {
        1
    }

    fn execute(&self, net: &mut Nodenet) -> NetResult<()> {
        net.gates.a = net.w.propagate(&net.gates.a);
        Ok(())
    }
}

/// Computes node functions, native modules and gate functions, then feeds
/// the actuators. Sensors are refreshed from the world adapter first so
/// their activations survive the propagation overwrite.
pub struct Calculate;

impl StepOperator for Calculate {
    fn priority(&self) -> u32 {
        10
    }

    fn execute(&self, net: &mut Nodenet) -> NetResult<()> {
        net.read_sensors_from_world();
        let mut raw = net.compute_node_functions();
        net.run_native_modules(&mut raw);
        net.apply_gate_functions(&raw);
        net.write_actuators_to_world();
        Ok(())
    }
}

pub fn standard_operators() -> Vec<Box<dyn StepOperator>> {
    let mut operators: Vec<Box<dyn StepOperator>> = vec![Box::new(Calculate), Box::new(Propagate)];
    operators.sort_by_key(|op| op.priority());
    operators
}
