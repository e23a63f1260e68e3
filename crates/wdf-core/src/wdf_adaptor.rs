//! Series, parallel and rigid scattering adaptors.
//!
//! An [`Adaptor`] is a multi-port WDF node built from an [`crate::spqr::SpqrNode`]: port 0 is the
//! upward-facing port to its parent (present whenever the adaptor is not the tree root), and
//! ports `1..=C` (or `0..C` at the root) are its children, in the node's own child order. Series
//! and parallel adaptors have closed-form scattering matrices ([`series_scattering`],
//! [`parallel_scattering`]); rigid adaptors are solved symbolically by [`crate::thevenin::solve`]
//! and installed via [`Adaptor::set_rigid`].
use nalgebra::{DMatrix, DVector};

use crate::error::WdfError;
use crate::{AdaptedWdf, Wave, Wdf};

/// The three WDF adaptor kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdaptorKind {
    /// Series junction: all ports carry the same current.
    Series,
    /// Parallel junction: all ports share the same voltage.
    Parallel,
    /// Rigid junction: scattering solved symbolically via the Thevenin MNA pipeline.
    Rigid,
}

/// A multi-port scattering node.
#[derive(Debug, Clone)]
pub struct Adaptor {
    kind: AdaptorKind,
    has_parent: bool,
    port_resistance: f64,
    scattering: DMatrix<f64>,
    a: DVector<f64>,
    b: DVector<f64>,
}

impl Adaptor {
    /// Create an adaptor of the given kind. It has no ports until [`Adaptor::set_closed_form`]
    /// or [`Adaptor::set_rigid`] is called during tree post-init.
    pub fn new(kind: AdaptorKind) -> Self {
        Self {
            kind,
            has_parent: false,
            port_resistance: f64::NAN,
            scattering: DMatrix::zeros(0, 0),
            a: DVector::zeros(0),
            b: DVector::zeros(0),
        }
    }

    /// This adaptor's kind.
    pub fn kind(&self) -> AdaptorKind {
        self.kind
    }

    /// Whether this node has an upward-facing port (it is not the tree root). Set once, during
    /// tree post-init, before the scattering matrix is computed.
    pub fn set_has_parent(&mut self, has_parent: bool) {
        self.has_parent = has_parent;
    }

    /// Whether this node has an upward-facing port.
    pub fn has_parent(&self) -> bool {
        self.has_parent
    }

    /// Number of ports, including the upward port if present.
    pub fn num_ports(&self) -> usize {
        self.a.len()
    }

    /// Install a closed-form series or parallel scattering matrix computed from the port
    /// resistances of this node's children, in child order.
    pub fn set_closed_form(&mut self, child_resistances: &[f64]) {
        let (scattering, rp) = match self.kind {
            AdaptorKind::Series => series_scattering(child_resistances, self.has_parent),
            AdaptorKind::Parallel => parallel_scattering(child_resistances, self.has_parent),
            AdaptorKind::Rigid => unreachable!("rigid adaptors are solved via thevenin::solve"),
        };
        self.install(scattering, rp);
    }

    /// Install a symbolically-solved rigid scattering matrix and its adapted port resistance
    /// (`rp` is unused, left at `NaN`, when this node is the tree root).
    pub fn set_rigid(&mut self, scattering: DMatrix<f64>, rp: f64) {
        self.install(scattering, rp);
    }

    fn install(&mut self, scattering: DMatrix<f64>, rp: f64) {
        let n = scattering.nrows();
        self.port_resistance = rp;
        self.scattering = scattering;
        self.a = DVector::zeros(n);
        self.b = DVector::zeros(n);
    }

    /// Write the reflected waves gathered from this node's children (in child order) into the
    /// incident vector's child positions, and recompute `b = S * a`. Called during this node's
    /// own `wave_up` step.
    pub fn receive_children(&mut self, values: &[f64]) {
        let shift = if self.has_parent { 1 } else { 0 };
        for (i, v) in values.iter().enumerate() {
            self.a[shift + i] = *v;
        }
        self.b = &self.scattering * &self.a;
    }

    /// Reflected waves destined for this node's children (in child order), read during this
    /// node's own `wave_down` step.
    pub fn child_reflections(&self) -> &[f64] {
        let shift = if self.has_parent { 1 } else { 0 };
        &self.b.as_slice()[shift..]
    }
}

impl Wdf for Adaptor {
    fn wave(&self) -> Wave {
        Wave {
            a: self.a[0],
            b: self.b[0],
        }
    }

    fn incident(&mut self, a: f64) -> Result<(), WdfError> {
        debug_assert!(self.has_parent, "incident() on port 0 requires an upward port");
        self.a[0] = a;
        self.b = &self.scattering * &self.a;
        Ok(())
    }

    fn reflected(&mut self) -> f64 {
        self.b[0]
    }

    fn reset(&mut self) {
        self.a.fill(0.0);
        self.b.fill(0.0);
    }
}

impl AdaptedWdf for Adaptor {
    fn port_resistance(&self) -> f64 {
        self.port_resistance
    }
}

/// Series scattering matrix: `S[i,j] = delta(i,j) - 2*r[i]/sigma`, `sigma = sum(r)`, where `r`
/// is `[Rp, child_resistances...]` if `has_parent`, else just `child_resistances`. Returns the
/// matrix and the upward port resistance `Rp = sum(child_resistances)`.
pub fn series_scattering(child_resistances: &[f64], has_parent: bool) -> (DMatrix<f64>, f64) {
    let rp = child_resistances.iter().sum::<f64>();
    let mut r = Vec::with_capacity(child_resistances.len() + 1);
    if has_parent {
        r.push(rp);
    }
    r.extend_from_slice(child_resistances);
    let sigma: f64 = r.iter().sum();
    let n = r.len();
    let mut s = DMatrix::<f64>::zeros(n, n);
    for i in 0..n {
        for j in 0..n {
            s[(i, j)] = -2.0 * r[i] / sigma;
        }
        s[(i, i)] += 1.0;
    }
    (s, rp)
}

/// Parallel scattering matrix: `S[i,j] = 2*g[j]/gamma - delta(i,j)`, `gamma = sum(g)`, `g` the
/// port conductances (`[1/Rp, 1/child_resistances...]` if `has_parent`). Returns the matrix and
/// the upward port resistance `Rp = 1 / sum(1/child_resistances)`.
pub fn parallel_scattering(child_resistances: &[f64], has_parent: bool) -> (DMatrix<f64>, f64) {
    let g_sum: f64 = child_resistances.iter().map(|r| 1.0 / r).sum();
    let rp = 1.0 / g_sum;
    let mut g = Vec::with_capacity(child_resistances.len() + 1);
    if has_parent {
        g.push(1.0 / rp);
    }
    g.extend(child_resistances.iter().map(|r| 1.0 / r));
    let gamma: f64 = g.iter().sum();
    let n = g.len();
    let mut s = DMatrix::<f64>::zeros(n, n);
    for i in 0..n {
        for j in 0..n {
            s[(i, j)] = 2.0 * g[j] / gamma;
        }
        s[(i, i)] -= 1.0;
    }
    (s, rp)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn series_root_three_equal_resistors_splits_evenly() {
        let (s, rp) = series_scattering(&[100.0, 100.0, 100.0], false);
        assert_eq!(rp, 300.0);
        for i in 0..3 {
            assert!((s[(i, i)] - (1.0 - 2.0 / 3.0)).abs() < 1e-12);
        }
    }

    #[test]
    fn parallel_two_equal_resistors_halves_resistance() {
        let (_, rp) = parallel_scattering(&[200.0, 200.0], false);
        assert!((rp - 100.0).abs() < 1e-9);
    }

    #[test]
    fn series_adapted_port_has_no_delay_free_dependency() {
        let (s, _) = series_scattering(&[50.0, 100.0], true);
        // Port 0 is the adapted upward port; its own reflection must not depend on its own
        // incident wave.
        assert!(s[(0, 0)].abs() < 1e-12);
    }

    #[test]
    fn parallel_adapted_port_has_no_delay_free_dependency() {
        let (s, _) = parallel_scattering(&[50.0, 100.0], true);
        assert!(s[(0, 0)].abs() < 1e-12);
    }

    #[test]
    fn adaptor_propagates_through_closed_form_matrix() {
        let mut a = Adaptor::new(AdaptorKind::Parallel);
        a.set_has_parent(true);
        a.set_closed_form(&[100.0, 100.0]);
        a.receive_children(&[1.0, 1.0]);
        a.incident(0.0).unwrap();
        let reflections = a.child_reflections();
        assert_eq!(reflections.len(), 2);
    }
}
