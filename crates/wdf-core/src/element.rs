//! The lumped-element catalog.
//!
//! `Element` is a single tagged enum rather than one struct per kind plus trait objects,
//! following the "tagged variant with two capability traits" design note: elements that
//! contribute to a symbolic MNA stamp implement [`MnaStampable`], elements that expand into
//! simpler primitives implement [`Replaceable`]; both are exposed as `Option<&dyn Trait>`
//! projections off `Element` so callers never need to downcast or match on every variant.
use crate::netlist::LumpedElement;
use crate::symbolic::RationalFn;

/// Value of a [`Resistor`](Element::Resistor)'s resistance: either a known numeric value, or
/// the single symbolic unknown `Rp` used while deriving an R-adaptor's scattering matrix (see
/// [`crate::thevenin`]).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ResistorValue {
    /// A concrete resistance in Ohms.
    Fixed(f64),
    /// The symbolic adapted-port resistance, solved for during Thevenin construction.
    Symbolic,
}

impl ResistorValue {
    fn conductance(&self) -> RationalFn {
        match self {
            ResistorValue::Fixed(r) => RationalFn::constant(1.0 / r),
            ResistorValue::Symbolic => RationalFn::one_over_x(),
        }
    }
}

/// The lumped-element catalog. Every member is a plain value type; behavior lives in the
/// `MnaStampable`/`Replaceable` trait impls below and in the WDF wrappers of
/// [`crate::wdf_leaf`].
#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    /// Two-terminal resistor.
    Resistor {
        /// Resistance (Ohm), or the symbolic unknown.
        r: ResistorValue,
    },
    /// Two-terminal open circuit (used for output probes and SPQR triangulation).
    OpenCircuit,
    /// Two-terminal capacitor.
    Capacitor {
        /// Capacitance (F).
        c: f64,
    },
    /// Two-terminal inductor.
    Inductor {
        /// Inductance (H).
        l: f64,
    },
    /// Ideal (zero-impedance) voltage source, only used inside Thevenin auxiliary netlists.
    IdealVoltageSource {
        /// Source voltage (V). Unused by the MNA stamp, which only depends on topology.
        vs: Option<f64>,
    },
    /// Two-terminal resistive voltage source.
    VoltageSource {
        /// Series resistance (Ohm).
        r: f64,
        /// Source voltage (V); `None` until the first sample is written.
        vs: Option<f64>,
    },
    /// Two-terminal trimmer (time-varying resistor).
    Trimmer {
        /// Current resistance (Ohm); `None` until the first sample is written.
        r: Option<f64>,
    },
    /// Two-terminal nonlinear diode (Shockley-equation, closed-form Wright-omega solve).
    Diode {
        /// Reverse saturation current (A).
        is: f64,
        /// Thermal voltage (V).
        vt: f64,
    },
    /// Four-terminal voltage-controlled voltage source (`IN+, IN-, OUT+, OUT-`).
    Vcvs {
        /// Voltage gain.
        gain: f64,
    },
    /// Four-terminal ideal transformer (`IN+, IN-, OUT+, OUT-`).
    IdealTransformer {
        /// Turns ratio (`N_out / N_in`).
        ratio: f64,
    },
    /// Four-terminal linear (non-ideal) transformer; expands into three inductors and an ideal
    /// transformer via [`Replaceable::replacement`].
    LinearTransformer {
        /// Primary inductance (H).
        l_in: f64,
        /// Secondary inductance (H).
        l_out: f64,
        /// Coupling coefficient, in `[0, 1]`.
        coupling: f64,
    },
}

impl Element {
    /// Number of terminal nodes this element expects.
    pub fn arity(&self) -> usize {
        match self {
            Element::Vcvs { .. }
            | Element::IdealTransformer { .. }
            | Element::LinearTransformer { .. } => 4,
            _ => 2,
        }
    }

    /// Project this element as an [`MnaStampable`], if it is one.
    pub fn as_mna_stampable(&self) -> Option<&dyn MnaStampable> {
        match self {
            Element::Resistor { .. }
            | Element::IdealVoltageSource { .. }
            | Element::Vcvs { .. }
            | Element::IdealTransformer { .. } => Some(self),
            _ => None,
        }
    }

    /// Project this element as a [`Replaceable`], if it is one.
    pub fn as_replaceable(&self) -> Option<&dyn Replaceable> {
        match self {
            Element::LinearTransformer { .. } => Some(self),
            _ => None,
        }
    }
}

/// An element that contributes entries to a symbolic Modified Nodal Analysis matrix.
///
/// `nodes` are the element's own terminal nodes (already relabeled into the auxiliary
/// netlist's compact node space); `port` is this element's own port/extra-source index;
/// `num_nodes`/`num_ports` size the node and port-current blocks of the matrix (see
/// [`crate::thevenin`] for the full layout).
pub trait MnaStampable {
    /// Return the `(row, col) -> added value` entries this element contributes.
    fn mna_stamp(
        &self,
        nodes: &[u32],
        port: usize,
        num_nodes: usize,
        num_ports: usize,
    ) -> Vec<((usize, usize), RationalFn)>;
}

impl MnaStampable for Element {
    fn mna_stamp(
        &self,
        nodes: &[u32],
        port: usize,
        num_nodes: usize,
        num_ports: usize,
    ) -> Vec<((usize, usize), RationalFn)> {
        match self {
            Element::Resistor { r } => {
                let g = r.conductance();
                let (i, j) = (nodes[0] as usize, nodes[1] as usize);
                vec![
                    ((i, i), g.clone()),
                    ((j, j), g.clone()),
                    ((i, j), -g.clone()),
                    ((j, i), -g),
                ]
            }
            Element::IdealVoltageSource { .. } => {
                let (i, j) = (nodes[0] as usize, nodes[1] as usize);
                let k = num_nodes + port;
                let one = RationalFn::constant(1.0);
                let neg_one = RationalFn::constant(-1.0);
                vec![
                    ((k, i), one.clone()),
                    ((k, j), neg_one.clone()),
                    ((i, k), one),
                    ((j, k), neg_one),
                ]
            }
            Element::Vcvs { gain } => {
                let (i, j, k, l) = (
                    nodes[0] as usize,
                    nodes[1] as usize,
                    nodes[2] as usize,
                    nodes[3] as usize,
                );
                let n = num_nodes + num_ports + port;
                vec![
                    ((n, i), RationalFn::constant(-gain)),
                    ((n, j), RationalFn::constant(*gain)),
                    ((n, k), RationalFn::constant(1.0)),
                    ((n, l), RationalFn::constant(-1.0)),
                    ((k, n), RationalFn::constant(1.0)),
                    ((l, n), RationalFn::constant(-1.0)),
                ]
            }
            Element::IdealTransformer { ratio } => {
                let (i, j, k, l) = (
                    nodes[0] as usize,
                    nodes[1] as usize,
                    nodes[2] as usize,
                    nodes[3] as usize,
                );
                let n = num_nodes + num_ports + port;
                vec![
                    ((n, i), RationalFn::constant(1.0)),
                    ((n, j), RationalFn::constant(-1.0)),
                    ((n, k), RationalFn::constant(-ratio)),
                    ((n, l), RationalFn::constant(*ratio)),
                    ((i, n), RationalFn::constant(1.0)),
                    ((j, n), RationalFn::constant(-1.0)),
                    ((k, n), RationalFn::constant(-ratio)),
                    ((l, n), RationalFn::constant(*ratio)),
                ]
            }
            _ => Vec::new(),
        }
    }
}

/// An element that expands into a list of simpler (ideally non-replaceable) elements.
pub trait Replaceable {
    /// Expand `element` (which must wrap `self`) into its replacement, allocating new node
    /// indices starting at `free_node`.
    fn replacement(&self, element: &LumpedElement, free_node: u32) -> Vec<LumpedElement>;
}

impl Replaceable for Element {
    fn replacement(&self, element: &LumpedElement, free_node: u32) -> Vec<LumpedElement> {
        match self {
            Element::LinearTransformer {
                l_in,
                l_out,
                coupling,
            } => {
                let n = free_node;
                let m = free_node + 1;
                let (i, j, k, l) = (
                    element.nodes[0],
                    element.nodes[1],
                    element.nodes[2],
                    element.nodes[3],
                );
                vec![
                    LumpedElement::new(
                        format!("{}.lin_in", element.key),
                        Element::Inductor {
                            l: l_in * (1.0 - coupling),
                        },
                        vec![i, n],
                    ),
                    LumpedElement::new(
                        format!("{}.lin_out", element.key),
                        Element::Inductor {
                            l: l_out * (1.0 - coupling),
                        },
                        vec![m, k],
                    ),
                    LumpedElement::new(
                        format!("{}.lin_mut", element.key),
                        Element::Inductor {
                            l: l_in * coupling,
                        },
                        vec![n, j],
                    ),
                    LumpedElement::new(
                        element.key.clone(),
                        Element::IdealTransformer {
                            ratio: (l_in / l_out).sqrt(),
                        },
                        vec![n, j, m, l],
                    ),
                ]
            }
            _ => vec![element.clone()],
        }
    }
}
