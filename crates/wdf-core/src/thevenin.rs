//! Thevenin auxiliary-netlist construction and symbolic scattering solve for `R`-type adaptors.
//!
//! An `R`-adaptor has no closed-form scattering matrix: its ports may be coupled through
//! arbitrary internal topology (bridges, VCVS/transformer stamps) rather than a pure series or
//! parallel junction. Following `utils/thevenin.py` and `utils/matrices.py` of the reference
//! implementation, this builds a small auxiliary netlist with one `Resistor`/`IdealVoltageSource`
//! port pair per port (plus the node's own internal multiport elements), stamps its Modified
//! Nodal Analysis matrix symbolically in the single unknown `Rp` (the adapted, upward-facing
//! port's resistance), inverts it over the [`RationalFn`] ring, and reads the scattering matrix
//! back off the inverse. If the node is adapted (non-root), `Rp` itself is solved for afterward
//! by requiring the adapted port's self-scattering entry to vanish.
use std::collections::HashMap;

use nalgebra::DMatrix;

use crate::element::{Element, MnaStampable, ResistorValue};
use crate::error::WdfError;
use crate::netlist::LumpedElement;
use crate::symbolic::{rmat_identity, rmat_invert, rmat_mul, rmat_scale, rmat_zeros, RationalFn};

/// One port of the Thevenin netlist: a `Resistor`-`IdealVoltageSource` pair straddling a fresh
/// internal node and `attach`, an edge of the adaptor's own subgraph.
#[derive(Debug, Clone, Copy)]
pub struct ThevPort {
    /// The port's resistance: numeric for a child port, symbolic for the adapted (upward) port.
    pub resistance: ResistorValue,
    /// The two real circuit nodes this port is attached across.
    pub attach: (u32, u32),
}

impl ThevPort {
    /// A port of fixed numeric resistance.
    pub fn fixed(r: f64, attach: (u32, u32)) -> Self {
        Self {
            resistance: ResistorValue::Fixed(r),
            attach,
        }
    }

    /// The adapted (symbolic-resistance) port.
    pub fn adapted(attach: (u32, u32)) -> Self {
        Self {
            resistance: ResistorValue::Symbolic,
            attach,
        }
    }
}

/// Result of solving an `R`-adaptor's Thevenin netlist.
#[derive(Debug, Clone)]
pub struct TheveninSolution {
    /// The purely numeric scattering matrix, sized `ports.len() x ports.len()`.
    pub scattering: DMatrix<f64>,
    /// The solved numeric resistance of the adapted port, `Some` iff `ports[0]` was symbolic.
    pub upward_resistance: Option<f64>,
}

/// Build and solve the Thevenin netlist for an `R`-adaptor.
///
/// `ports` are in port-index order: if `adapted` is true, `ports[0]` must be
/// [`ThevPort::adapted`] and the remaining entries are the node's children, in the adaptor's own
/// child order; if `adapted` is false (the node is the tree root), every port is a fixed child
/// port. `multiports` are the node's internal four-terminal elements (VCVS, ideal transformer),
/// bound directly to this node rather than realized as WDF tree children.
#[profiling::function]
pub fn solve(
    ports: &[ThevPort],
    multiports: &[LumpedElement],
    adapted: bool,
) -> Result<TheveninSolution, WdfError> {
    let num_ports = ports.len();
    let num_extras = multiports.len();

    let mut index_of: HashMap<u32, usize> = HashMap::new();
    for port in ports {
        let len = index_of.len();
        index_of.entry(port.attach.0).or_insert(len);
        let len = index_of.len();
        index_of.entry(port.attach.1).or_insert(len);
    }
    for mp in multiports {
        for &n in &mp.nodes {
            let len = index_of.len();
            index_of.entry(n).or_insert(len);
        }
    }
    let real_nodes = index_of.len();
    let num_nodes = real_nodes + num_ports;
    let dim = num_nodes + num_ports + num_extras;

    let mut x = rmat_zeros(dim, dim);
    let mut stamp = |entries: Vec<((usize, usize), RationalFn)>| {
        for ((r, c), v) in entries {
            x[r][c] = x[r][c].clone() + v;
        }
    };

    for (i, port) in ports.iter().enumerate() {
        let synth = real_nodes + i;
        let a0 = index_of[&port.attach.0];
        let a1 = index_of[&port.attach.1];
        let resistor = Element::Resistor {
            r: port.resistance,
        };
        stamp(resistor.mna_stamp(&[synth as u32, a0 as u32], i, num_nodes, num_ports));
        let source = Element::IdealVoltageSource { vs: None };
        stamp(source.mna_stamp(&[synth as u32, a1 as u32], i, num_nodes, num_ports));
    }
    for (j, mp) in multiports.iter().enumerate() {
        let relabeled: Vec<u32> = mp.nodes.iter().map(|n| index_of[n] as u32).collect();
        stamp(mp.element.mna_stamp(&relabeled, j, num_nodes, num_ports));
    }

    // Remove the datum row/col (index 0, always a real node).
    let reduced_dim = dim - 1;
    if reduced_dim == 0 {
        return Err(WdfError::RAdaptorSolveError {
            reason: "Thevenin netlist has no non-datum node".to_string(),
        });
    }
    let reduced: Vec<Vec<RationalFn>> = x[1..]
        .iter()
        .map(|row| row[1..].to_vec())
        .collect();

    let xinv = rmat_invert(&reduced).ok_or_else(|| WdfError::RAdaptorSolveError {
        reason: "singular MNA matrix after datum removal".to_string(),
    })?;

    // Port-current rows/cols sit at absolute index `num_nodes + i`; after removing row/col 0
    // (always a node row, since node rows come first) every index shifts down by one.
    let port_base = num_nodes - 1;
    let mut v = rmat_zeros(reduced_dim, num_ports);
    for i in 0..num_ports {
        v[port_base + i][i] = RationalFn::constant(1.0);
    }
    let mut h = rmat_zeros(num_ports, reduced_dim);
    for i in 0..num_ports {
        h[i][port_base + i] = RationalFn::constant(1.0);
    }

    let mut rp_diag = rmat_zeros(num_ports, num_ports);
    for (i, port) in ports.iter().enumerate() {
        rp_diag[i][i] = match port.resistance {
            ResistorValue::Fixed(r) => RationalFn::constant(r),
            ResistorValue::Symbolic => RationalFn::x(),
        };
    }

    let hx = rmat_mul(&h, &xinv);
    let hxv = rmat_mul(&hx, &v);
    let scaled = rmat_scale(&rmat_mul(&rp_diag, &hxv), 2.0);
    let identity = rmat_identity(num_ports);
    let s: Vec<Vec<RationalFn>> = identity
        .iter()
        .zip(scaled.iter())
        .map(|(irow, srow)| {
            irow.iter()
                .zip(srow.iter())
                .map(|(a, b)| a.clone() + b.clone())
                .collect()
        })
        .collect();

    let upward_resistance = if adapted {
        let roots = s[0][0].num.positive_real_roots(1e-9);
        let rp = *roots.first().ok_or_else(|| WdfError::RAdaptorSolveError {
            reason: "no positive real solution for the adapted port resistance".to_string(),
        })?;
        Some(rp)
    } else {
        None
    };
    let eval_at = upward_resistance.unwrap_or(0.0);

    let mut scattering = DMatrix::<f64>::zeros(num_ports, num_ports);
    for i in 0..num_ports {
        for j in 0..num_ports {
            scattering[(i, j)] = s[i][j].eval(eval_at);
        }
    }

    log::debug!(
        "thevenin solve: {num_ports} port(s), {num_extras} multiport stamp(s), upward_resistance={upward_resistance:?}"
    );
    Ok(TheveninSolution {
        scattering,
        upward_resistance,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_port_passthrough_matches_child_resistance() {
        // A trivial adaptor with exactly one child: the adapted port must solve to the child's
        // own resistance, and the resulting scattering matrix must null the adapted port.
        let ports = vec![ThevPort::adapted((0, 1)), ThevPort::fixed(600.0, (1, 0))];
        let solution = solve(&ports, &[], true).unwrap();
        assert!((solution.upward_resistance.unwrap() - 600.0).abs() < 1e-6);
        assert!(solution.scattering[(0, 0)].abs() < 1e-9);
    }

    #[test]
    fn root_scope_has_no_upward_resistance() {
        let ports = vec![ThevPort::fixed(100.0, (0, 1)), ThevPort::fixed(200.0, (1, 0))];
        let solution = solve(&ports, &[], false).unwrap();
        assert!(solution.upward_resistance.is_none());
    }
}
