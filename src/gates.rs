//! Per-element parameter vectors and the gate transfer functions.

use ndarray::Array1;

use crate::FloatX;

/// Gate transfer functions, selected per element via `g_function_selector`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i8)]
pub enum GateFunction {
    Identity = 0,
    Absolute = 1,
    Sigmoid = 2,
    Tanh = 3,
    Rect = 4,
    OneOverX = 5,
}

impl GateFunction {
    pub const ALL: [GateFunction; 6] = [
        GateFunction::Identity,
        GateFunction::Absolute,
        GateFunction::Sigmoid,
        GateFunction::Tanh,
        GateFunction::Rect,
        GateFunction::OneOverX,
    ];

    pub fn selector(self) -> i8 {
        self as i8
    }

    pub fn from_selector(selector: i8) -> Self {
        GateFunction::ALL
            .into_iter()
            .find(|f| f.selector() == selector)
            .unwrap_or(GateFunction::Identity)
    }

    pub fn name(self) -> &'static str {
        match self {
            GateFunction::Identity => "identity",
            GateFunction::Absolute => "absolute",
            GateFunction::Sigmoid => "sigmoid",
            GateFunction::Tanh => "tanh",
            GateFunction::Rect => "rect",
            GateFunction::OneOverX => "one_over_x",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        GateFunction::ALL.into_iter().find(|f| f.name() == name)
    }

    /// Raw transfer value for the post-propagation input `x`.
    pub fn transfer(self, x: FloatX, theta: FloatX) -> FloatX {
        match self {
            GateFunction::Identity => x,
            GateFunction::Absolute => x.abs(),
            GateFunction::Sigmoid => 1.0 / (1.0 + (-(x - theta)).exp()),
            GateFunction::Tanh => (x - theta).tanh(),
            GateFunction::Rect => (x - theta).max(0.0),
            GateFunction::OneOverX => {
                if x != 0.0 {
                    1.0 / x
                } else {
                    0.0
                }
            }
        }
    }
}

/// Output shaping applied after the raw transfer: threshold cut,
/// amplification, activator factor, decay blend, min/max clamp.
///
/// A factor of exactly 0 short-circuits the whole pipeline to 0.
#[allow(clippy::too_many_arguments)]
pub fn shape_output(
    raw: FloatX,
    previous: FloatX,
    threshold: FloatX,
    amplification: FloatX,
    factor: FloatX,
    decay: FloatX,
    minimum: FloatX,
    maximum: FloatX,
) -> FloatX {
    if factor == 0.0 {
        return 0.0;
    }
    let mut y = raw.max(threshold) * amplification;
    y *= factor;
    if decay > 0.0 {
        // decay gradually: the sign is preserved and the magnitude is
        // bounded by the previous activation scaled down by the decay rate
        let floor = previous * (1.0 - decay);
        y = if y < 0.0 { y.min(floor) } else { y.max(floor) };
    }
    y.max(minimum).min(maximum)
}

/// The flat per-element state: activations and gate parameters.
#[derive(Debug, Clone)]
pub struct GateVectors {
    pub a: Array1<FloatX>,
    pub g_theta: Array1<FloatX>,
    pub g_factor: Array1<FloatX>,
    pub g_threshold: Array1<FloatX>,
    pub g_amplification: Array1<FloatX>,
    pub g_min: Array1<FloatX>,
    pub g_max: Array1<FloatX>,
    pub g_decay: Array1<FloatX>,
    pub g_function_selector: Array1<i8>,
    pub n_function_selector: Array1<i8>,
    pub n_node_porlinked: Array1<i8>,
    pub n_node_retlinked: Array1<i8>,
}

impl GateVectors {
    pub fn new(number_of_elements: usize) -> Self {
        Self {
            a: Array1::zeros(number_of_elements),
            g_theta: Array1::zeros(number_of_elements),
            g_factor: Array1::ones(number_of_elements),
            g_threshold: Array1::zeros(number_of_elements),
            g_amplification: Array1::ones(number_of_elements),
            g_min: Array1::zeros(number_of_elements),
            g_max: Array1::ones(number_of_elements),
            g_decay: Array1::zeros(number_of_elements),
            g_function_selector: Array1::zeros(number_of_elements),
            n_function_selector: Array1::zeros(number_of_elements),
            n_node_porlinked: Array1::zeros(number_of_elements),
            n_node_retlinked: Array1::zeros(number_of_elements),
        }
    }

    pub fn len(&self) -> usize {
        self.a.len()
    }

    pub fn is_empty(&self) -> bool {
        self.a.is_empty()
    }

    /// Restores one element to the arena-wide initialisation values, so a
    /// freed slot carries nothing over to its next owner.
    pub fn reset_element(&mut self, e: usize) {
        self.a[e] = 0.0;
        self.g_theta[e] = 0.0;
        self.g_factor[e] = 1.0;
        self.g_threshold[e] = 0.0;
        self.g_amplification[e] = 1.0;
        self.g_min[e] = 0.0;
        self.g_max[e] = 1.0;
        self.g_decay[e] = 0.0;
        self.g_function_selector[e] = 0;
        self.n_function_selector[e] = 0;
        self.n_node_porlinked[e] = 0;
        self.n_node_retlinked[e] = 0;
    }
}
