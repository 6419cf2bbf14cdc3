use serde::{Deserialize, Serialize};
use tracing::warn;

/// Assumed average element usage when sizing the element arena from a node count.
pub const AVERAGE_ELEMENTS_PER_NODE: usize = 3;

pub const DEFAULT_NUMBER_OF_NODES: usize = 2000;
pub const DEFAULT_NUMBER_OF_ELEMENTS: usize = DEFAULT_NUMBER_OF_NODES * AVERAGE_ELEMENTS_PER_NODE;
pub const DEFAULT_NUMBER_OF_NODESPACES: usize = 100;

/// Float width of the activation and parameter vectors.
///
/// The engine is compiled for one width (`f32` by default, `f64` with the
/// `float64` feature); the configured value is checked against the compiled
/// width at construction time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Precision {
    Single,
    Double,
}

impl Precision {
    pub fn compiled() -> Self {
        if cfg!(feature = "float64") {
            Precision::Double
        } else {
            Precision::Single
        }
    }
}

/// Engine configuration: storage mode and arena capacities.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetConfig {
    /// Store the weight matrix as CSR instead of a dense NoE x NoE array.
    pub sparse: bool,
    pub precision: Precision,
    pub number_of_nodes: usize,
    pub number_of_elements: usize,
    pub number_of_nodespaces: usize,
}

impl Default for NetConfig {
    fn default() -> Self {
        Self {
            sparse: true,
            precision: Precision::compiled(),
            number_of_nodes: DEFAULT_NUMBER_OF_NODES,
            number_of_elements: DEFAULT_NUMBER_OF_ELEMENTS,
            number_of_nodespaces: DEFAULT_NUMBER_OF_NODESPACES,
        }
    }
}

impl NetConfig {
    pub fn dense() -> Self {
        Self {
            sparse: false,
            ..Self::default()
        }
    }

    /// Warns about settings the compiled engine cannot honor. The compiled
    /// float width always wins over the configured one.
    pub fn validate(&self) {
        if self.precision != Precision::compiled() {
            warn!(
                configured = ?self.precision,
                compiled = ?Precision::compiled(),
                "unsupported precision in configuration, falling back to the compiled float width"
            );
        }
    }
}
