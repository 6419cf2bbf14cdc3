//! Runtime execution engine for MicroPsi-style spreading-activation
//! networks: typed nodes in flat arenas, links in a sparse weight matrix,
//! advanced one Propagate/Calculate step at a time.

pub mod arena;
pub mod config;
pub mod errors;
pub mod gates;
pub mod ids;
pub mod matrix;
pub mod native;
pub mod node;
pub mod nodenet;
pub mod nodetype;
pub mod persistence;
pub mod pipe;
pub mod shared;
pub mod step;
pub mod world;

/// Element scalar type: `f32` by default, `f64` with the `float64` feature.
#[cfg(not(feature = "float64"))]
pub type FloatX = f32;
#[cfg(feature = "float64")]
pub type FloatX = f64;

pub use config::{NetConfig, Precision};
pub use errors::{NetError, NetResult};
pub use gates::GateFunction;
pub use ids::{NodeId, NodespaceId, ROOT_NODESPACE};
pub use native::{NativeContext, NativeModuleDef, NodeFunction};
pub use nodenet::{GateParameter, Link, NodeOptions, Nodenet};
pub use nodetype::GateType;
pub use shared::SharedNodenet;
pub use world::WorldAdapter;
