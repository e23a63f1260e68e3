//! WDF wrappers for the two-terminal linear elements of [`crate::element::Element`].
//!
//! Each leaf owns its own wave state and exposes a fixed or dynamically-updated port
//! resistance. Formulas follow the element catalog's incident-wave laws, one struct per
//! element.
use crate::error::WdfError;
use crate::{AdaptedWdf, DynamicInput, Wave, Wdf};

/// Fully-absorbing resistor: `b = 0` regardless of `a`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Resistor {
    r: f64,
    a: f64,
}

impl Resistor {
    /// Create a resistor of resistance `r` Ohm.
    pub fn new(r: f64) -> Self {
        Self { r, a: 0.0 }
    }
}

impl Wdf for Resistor {
    fn wave(&self) -> Wave {
        Wave { a: self.a, b: 0.0 }
    }

    fn incident(&mut self, a: f64) -> Result<(), WdfError> {
        self.a = a;
        Ok(())
    }

    fn reflected(&mut self) -> f64 {
        0.0
    }

    fn reset(&mut self) {
        self.a = 0.0;
    }
}

impl AdaptedWdf for Resistor {
    fn port_resistance(&self) -> f64 {
        self.r
    }
}

/// Open circuit: reflects its incident wave back delayed by one sample, so that a probe reading
/// `(a+b)/2` after a full up/down pass observes the node voltage that drove it, one sample late.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct OpenCircuit {
    a: f64,
    b: f64,
}

impl OpenCircuit {
    /// Create an open circuit.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Wdf for OpenCircuit {
    fn wave(&self) -> Wave {
        Wave {
            a: self.a,
            b: self.b,
        }
    }

    fn incident(&mut self, a: f64) -> Result<(), WdfError> {
        self.a = self.b;
        self.b = a;
        Ok(())
    }

    fn reflected(&mut self) -> f64 {
        self.b
    }

    fn reset(&mut self) {
        self.a = 0.0;
        self.b = 0.0;
    }
}

impl AdaptedWdf for OpenCircuit {
    fn port_resistance(&self) -> f64 {
        1e20
    }
}

/// Inductor, discretized with the bilinear transform: `Rp = 2*L*fs`, `b = -a` (a sign-inverting
/// delay).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Inductor {
    l: f64,
    samplerate: f64,
    a: f64,
}

impl Inductor {
    /// Create an inductor of inductance `l` Henry, at the given sample rate.
    pub fn new(l: f64, samplerate: f64) -> Self {
        Self {
            l,
            samplerate,
            a: 0.0,
        }
    }
}

impl Wdf for Inductor {
    fn wave(&self) -> Wave {
        Wave {
            a: self.a,
            b: -self.a,
        }
    }

    fn incident(&mut self, a: f64) -> Result<(), WdfError> {
        self.a = a;
        Ok(())
    }

    fn reflected(&mut self) -> f64 {
        -self.a
    }

    fn reset(&mut self) {
        self.a = 0.0;
    }
}

impl AdaptedWdf for Inductor {
    fn port_resistance(&self) -> f64 {
        2.0 * self.l * self.samplerate
    }
}

/// Capacitor, discretized with the bilinear transform: `Rp = 1 / (2*fs*C)`, `b = a` (a unit
/// delay).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Capacitor {
    c: f64,
    samplerate: f64,
    a: f64,
}

impl Capacitor {
    /// Create a capacitor of capacitance `c` Farad, at the given sample rate.
    pub fn new(c: f64, samplerate: f64) -> Self {
        Self {
            c,
            samplerate,
            a: 0.0,
        }
    }
}

impl Wdf for Capacitor {
    fn wave(&self) -> Wave {
        Wave {
            a: self.a,
            b: self.a,
        }
    }

    fn incident(&mut self, a: f64) -> Result<(), WdfError> {
        self.a = a;
        Ok(())
    }

    fn reflected(&mut self) -> f64 {
        self.a
    }

    fn reset(&mut self) {
        self.a = 0.0;
    }
}

impl AdaptedWdf for Capacitor {
    fn port_resistance(&self) -> f64 {
        1.0 / (2.0 * self.samplerate * self.c)
    }
}

/// Resistive voltage source: `Rp = R`, `b = Vs`. `Vs` must be written at least once via
/// [`DynamicInput::set_sample_data`] before [`Wdf::reflected`] is called.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoltageSource {
    r: f64,
    vs: Option<f64>,
    initial_vs: Option<f64>,
    a: f64,
}

impl VoltageSource {
    /// Create a voltage source of series resistance `r` Ohm, optionally with an initial source
    /// voltage.
    pub fn new(r: f64, vs: Option<f64>) -> Self {
        Self {
            r,
            vs,
            initial_vs: vs,
            a: 0.0,
        }
    }
}

impl Wdf for VoltageSource {
    fn wave(&self) -> Wave {
        Wave {
            a: self.a,
            b: self.vs.unwrap_or(0.0),
        }
    }

    fn incident(&mut self, a: f64) -> Result<(), WdfError> {
        self.a = a;
        Ok(())
    }

    fn reflected(&mut self) -> f64 {
        self.vs.unwrap_or(0.0)
    }

    fn reset(&mut self) {
        self.a = 0.0;
        self.vs = self.initial_vs;
    }
}

impl AdaptedWdf for VoltageSource {
    fn port_resistance(&self) -> f64 {
        self.r
    }
}

impl DynamicInput for VoltageSource {
    fn set_sample_data(&mut self, value: f64) {
        self.vs = Some(value);
    }

    fn is_defined(&self) -> bool {
        self.vs.is_some()
    }
}

/// Time-varying resistor: behaves like [`Resistor`] (`b = 0`) but its port resistance can change
/// from sample to sample via [`DynamicInput::set_sample_data`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Trimmer {
    r: Option<f64>,
    initial_r: Option<f64>,
    a: f64,
}

impl Trimmer {
    /// Create a trimmer, optionally with an initial resistance value.
    pub fn new(r: Option<f64>) -> Self {
        Self {
            r,
            initial_r: r,
            a: 0.0,
        }
    }
}

impl Wdf for Trimmer {
    fn wave(&self) -> Wave {
        Wave { a: self.a, b: 0.0 }
    }

    fn incident(&mut self, a: f64) -> Result<(), WdfError> {
        self.a = a;
        Ok(())
    }

    fn reflected(&mut self) -> f64 {
        0.0
    }

    fn reset(&mut self) {
        self.a = 0.0;
        self.r = self.initial_r;
    }
}

impl AdaptedWdf for Trimmer {
    fn port_resistance(&self) -> f64 {
        self.r.unwrap_or(1.0)
    }
}

impl DynamicInput for Trimmer {
    fn set_sample_data(&mut self, value: f64) {
        self.r = Some(value);
    }

    fn is_defined(&self) -> bool {
        self.r.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resistor_fully_absorbs() {
        let mut r = Resistor::new(600.0);
        r.incident(1.0).unwrap();
        assert_eq!(r.reflected(), 0.0);
        assert_eq!(r.port_resistance(), 600.0);
    }

    #[test]
    fn open_circuit_delays_by_one_sample() {
        let mut oc = OpenCircuit::new();
        oc.incident(1.0).unwrap();
        assert_eq!(oc.wave().a, 0.0);
        assert_eq!(oc.reflected(), 1.0);
        oc.incident(2.0).unwrap();
        assert_eq!(oc.wave().a, 1.0);
        assert_eq!(oc.reflected(), 2.0);
    }

    #[test]
    fn inductor_inverts() {
        let mut l = Inductor::new(1e-3, 48_000.0);
        l.incident(0.5).unwrap();
        assert_eq!(l.reflected(), -0.5);
        assert_eq!(l.port_resistance(), 2.0 * 1e-3 * 48_000.0);
    }

    #[test]
    fn capacitor_holds() {
        let mut c = Capacitor::new(1e-6, 48_000.0);
        c.incident(0.5).unwrap();
        assert_eq!(c.reflected(), 0.5);
    }

    #[test]
    fn voltage_source_reflects_vs() {
        let mut vs = VoltageSource::new(600.0, None);
        assert!(!vs.is_defined());
        vs.set_sample_data(5.0);
        assert_eq!(vs.reflected(), 5.0);
        vs.reset();
        assert!(!vs.is_defined());
    }

    #[test]
    fn trimmer_tracks_resistance_and_absorbs() {
        let mut t = Trimmer::new(Some(100.0));
        assert_eq!(t.port_resistance(), 100.0);
        t.set_sample_data(200.0);
        assert_eq!(t.port_resistance(), 200.0);
        t.incident(1.0).unwrap();
        assert_eq!(t.reflected(), 0.0);
    }
}
