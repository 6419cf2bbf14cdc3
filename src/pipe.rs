//! The pipe node functions.
//!
//! Each of a pipe node's seven elements runs its own node function, chosen
//! by `n_function_selector`. The kernel reads the node's slot activations
//! through the shifted view: for the element computing gate `g`, slot `j`
//! of the same node sits at relative offset `j - g`.
//!
//! Semantics of the seven functions:
//! - gen: echoes the gen slot through.
//! - por: fires only if the por input exceeds theta and the sur input is
//!   non-inhibitory.
//! - ret: symmetric to por, running backward along the sequence.
//! - sub: spreads the request downward, sustained by the gen loop.
//! - sur: reports back upward; a por-linked pipe whose predecessor has not
//!   confirmed yet keeps quiet.
//! - cat: categorical side channel, spreads like sub.
//! - exp: expectation side channel; gated by ret-linkedness the way sur is
//!   gated by por-linkedness.

use crate::nodetype::GateType;
use crate::FloatX;

/// Node function selectors stored in `n_function_selector`.
pub const NFPG_PIPE_NON: i8 = 0;
pub const NFPG_PIPE_GEN: i8 = 1;
pub const NFPG_PIPE_POR: i8 = 2;
pub const NFPG_PIPE_RET: i8 = 3;
pub const NFPG_PIPE_SUB: i8 = 4;
pub const NFPG_PIPE_SUR: i8 = 5;
pub const NFPG_PIPE_CAT: i8 = 6;
pub const NFPG_PIPE_EXP: i8 = 7;

pub const PIPE_SELECTORS: [i8; 7] = [
    NFPG_PIPE_GEN,
    NFPG_PIPE_POR,
    NFPG_PIPE_RET,
    NFPG_PIPE_SUB,
    NFPG_PIPE_SUR,
    NFPG_PIPE_CAT,
    NFPG_PIPE_EXP,
];

/// Read-only window over the activation vector giving each element access
/// to the seven entries starting at itself, as the step kernels need it.
/// Reads past either end yield 0.
pub struct ShiftedView<'a> {
    a: &'a [FloatX],
}

impl<'a> ShiftedView<'a> {
    pub fn new(a: &'a [FloatX]) -> Self {
        Self { a }
    }

    /// Activation at relative offset `delta` from element `e`.
    pub fn rel(&self, e: usize, delta: isize) -> FloatX {
        let i = e as isize + delta;
        if i < 0 || i as usize >= self.a.len() {
            0.0
        } else {
            self.a[i as usize]
        }
    }

    /// Slot `slot` of the node whose gate `gate` lives at element `e`.
    fn slot(&self, e: usize, gate: GateType, slot: GateType) -> FloatX {
        self.rel(e, slot.index() as isize - gate.index() as isize)
    }
}

/// One pipe element's node function. `theta` is the element's own bias,
/// `porlinked`/`retlinked` the node-wide incidence flags.
pub fn node_function(
    selector: i8,
    view: &ShiftedView<'_>,
    e: usize,
    theta: FloatX,
    porlinked: bool,
    retlinked: bool,
) -> FloatX {
    use GateType::*;
    match selector {
        NFPG_PIPE_GEN => view.slot(e, Gen, Gen),
        NFPG_PIPE_POR => {
            let por = view.slot(e, Por, Por);
            let sur = view.slot(e, Por, Sur);
            if por > theta && sur >= 0.0 {
                por
            } else {
                0.0
            }
        }
        NFPG_PIPE_RET => {
            let ret = view.slot(e, Ret, Ret);
            let sur = view.slot(e, Ret, Sur);
            if ret > theta && sur >= 0.0 {
                ret
            } else {
                0.0
            }
        }
        NFPG_PIPE_SUB => view.slot(e, Sub, Sub) + view.slot(e, Sub, Gen),
        NFPG_PIPE_SUR => {
            if porlinked && view.slot(e, Sur, Por) <= theta {
                0.0
            } else {
                view.slot(e, Sur, Sur)
            }
        }
        NFPG_PIPE_CAT => view.slot(e, Cat, Cat),
        NFPG_PIPE_EXP => {
            if retlinked && view.slot(e, Exp, Ret) <= theta {
                0.0
            } else {
                view.slot(e, Exp, Exp)
            }
        }
        _ => view.rel(e, 0),
    }
}
