//! Top-level WDF simulation scheme: compiles a [`Netlist`] into a [`crate::tree::WdfTree`] and
//! runs sample-by-sample wave propagation through it.
//!
//! Output probes are realized as inserted [`crate::element::Element::OpenCircuit`]s, macro-elements
//! are expanded, every surviving element with three or more terminals gets a triangle of
//! auxiliary open circuits across its first three nodes (forcing the SPQR decomposition to see
//! it as a single triconnected vertex set rather than as isolated edges), then the modified
//! netlist is decomposed and built into a tree.
use std::collections::HashMap;

use crate::element::Element;
use crate::error::WdfError;
use crate::netlist::{LumpedElement, Netlist};
use crate::spqr;
use crate::tree::WdfTree;

/// A key identifying one requested output: either a positional index into the scheme's declared
/// output list, or an arbitrary extra probe key supplied per call.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum OutputKey {
    /// Positional index into the outputs declared at [`WdfScheme::new`].
    Index(usize),
    /// An ad hoc probe, named by its original netlist element key.
    Probe(String),
}

/// A compiled WDF simulation: a built tree plus the netlist keys of its declared output probes.
#[derive(Debug)]
pub struct WdfScheme {
    tree: WdfTree,
    output_keys: Vec<String>,
}

impl WdfScheme {
    /// Compile `netlist` into a WDF tree at the given sample rate, with one output probe per
    /// `(node_a, node_b)` pair in `outputs`, read back as the voltage across that pair (an
    /// inserted open circuit, so the probe draws no current and does not perturb the circuit).
    #[profiling::function]
    pub fn new(samplerate: f64, netlist: Netlist, outputs: &[(u32, u32)]) -> Result<Self, WdfError> {
        if !(samplerate > 0.0) {
            return Err(WdfError::SampleRateError { samplerate });
        }

        let mut modified = netlist;
        let mut output_keys = Vec::with_capacity(outputs.len());
        for (i, &(a, b)) in outputs.iter().enumerate() {
            let key = format!("__output_{i}");
            modified.add(LumpedElement::new(key.clone(), Element::OpenCircuit, vec![a, b]))?;
            output_keys.push(key);
        }

        modified.perform_replacements()?;

        let wide: Vec<(String, [u32; 3])> = modified
            .values()
            .filter(|e| e.n_nodes() >= 3)
            .map(|e| (e.key.clone(), [e.nodes[0], e.nodes[1], e.nodes[2]]))
            .collect();
        for (key, [i, j, k]) in wide {
            modified.add(LumpedElement::new(
                format!("{key}.tri_ij"),
                Element::OpenCircuit,
                vec![i, j],
            ))?;
            modified.add(LumpedElement::new(
                format!("{key}.tri_jk"),
                Element::OpenCircuit,
                vec![j, k],
            ))?;
            modified.add(LumpedElement::new(
                format!("{key}.tri_ik"),
                Element::OpenCircuit,
                vec![i, k],
            ))?;
        }

        let spqr_tree = spqr::decompose(&modified)?;
        let tree = WdfTree::build(samplerate, &spqr_tree)?;

        Ok(Self { tree, output_keys })
    }

    /// Number of declared outputs.
    pub fn num_outputs(&self) -> usize {
        self.output_keys.len()
    }

    /// Read back a single declared output by its positional index, without touching the others.
    /// Errors with [`WdfError::PortIndexError`] if `index` is out of range of the outputs
    /// declared at [`WdfScheme::new`].
    pub fn output(&self, index: usize) -> Result<f64, WdfError> {
        let key = self.output_keys.get(index).ok_or(WdfError::PortIndexError {
            index,
            num_outputs: self.output_keys.len(),
        })?;
        self.tree.voltage(key)
    }

    /// Read back the current flowing through an arbitrary netlist element by key, after a full
    /// wave propagation. Errors with [`WdfError::MissingKey`] if no such element was built into
    /// the tree.
    pub fn current(&self, key: &str) -> Result<f64, WdfError> {
        self.tree.current(key)
    }

    /// Write this sample's dynamic inputs (voltage sources, trimmers, keyed by their original
    /// netlist key), propagate waves up to the root and back down, and read back every declared
    /// output plus any `extra_probe_keys` (arbitrary netlist element keys).
    #[profiling::function]
    pub fn process_sample(
        &mut self,
        inputs: &HashMap<String, f64>,
        extra_probe_keys: &[String],
    ) -> Result<HashMap<OutputKey, f64>, WdfError> {
        for (key, value) in inputs {
            self.tree.set_sample_data(key, *value)?;
        }
        self.tree.check_dynamic_inputs_defined()?;

        self.tree.wave_up();
        self.tree.wave_down();

        let mut outputs = HashMap::with_capacity(self.output_keys.len() + extra_probe_keys.len());
        for (i, key) in self.output_keys.iter().enumerate() {
            outputs.insert(OutputKey::Index(i), self.tree.voltage(key)?);
        }
        for key in extra_probe_keys {
            outputs.insert(OutputKey::Probe(key.clone()), self.tree.voltage(key)?);
        }
        Ok(outputs)
    }

    /// Reset, then run [`WdfScheme::process_sample`] once per sample across `inputs`' longest
    /// signal, returning each output key's full sample sequence.
    pub fn process_signal(
        &mut self,
        inputs: &HashMap<String, Vec<f64>>,
        extra_probe_keys: &[String],
    ) -> Result<HashMap<OutputKey, Vec<f64>>, WdfError> {
        self.reset();
        let n = inputs.values().map(|v| v.len()).max().unwrap_or(0);
        let mut outputs: HashMap<OutputKey, Vec<f64>> = HashMap::new();
        for i in 0..n {
            let sample: HashMap<String, f64> = inputs
                .iter()
                .filter_map(|(k, v)| v.get(i).map(|x| (k.clone(), *x)))
                .collect();
            let step = self.process_sample(&sample, extra_probe_keys)?;
            for (key, value) in step {
                outputs.entry(key).or_default().push(value);
            }
        }
        Ok(outputs)
    }

    /// Reset every node to zero waves and restore dynamic elements to construction-time defaults.
    pub fn reset(&mut self) {
        self.tree.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::ResistorValue;

    fn resistor(r: f64) -> Element {
        Element::Resistor {
            r: ResistorValue::Fixed(r),
        }
    }

    #[test]
    fn dc_voltage_divider_settles_to_half_source() {
        let mut netlist = Netlist::new();
        netlist
            .add(LumpedElement::new(
                "vs",
                Element::VoltageSource {
                    r: 0.0,
                    vs: Some(10.0),
                },
                vec![0, 1],
            ))
            .unwrap();
        netlist
            .add(LumpedElement::new("r1", resistor(1000.0), vec![1, 2]))
            .unwrap();
        netlist
            .add(LumpedElement::new("r2", resistor(1000.0), vec![2, 0]))
            .unwrap();
        let mut scheme = WdfScheme::new(48_000.0, netlist, &[(2, 0)]).unwrap();
        let mut last = 0.0;
        for _ in 0..16 {
            let out = scheme.process_sample(&HashMap::new(), &[]).unwrap();
            last = out[&OutputKey::Index(0)];
        }
        assert!((last - 5.0).abs() < 1e-6);
    }

    #[test]
    fn dc_voltage_divider_current_matches_ohms_law() {
        let mut netlist = Netlist::new();
        netlist
            .add(LumpedElement::new(
                "vs",
                Element::VoltageSource {
                    r: 0.0,
                    vs: Some(10.0),
                },
                vec![0, 1],
            ))
            .unwrap();
        netlist
            .add(LumpedElement::new("r1", resistor(1000.0), vec![1, 2]))
            .unwrap();
        netlist
            .add(LumpedElement::new("r2", resistor(1000.0), vec![2, 0]))
            .unwrap();
        let mut scheme = WdfScheme::new(48_000.0, netlist, &[]).unwrap();
        for _ in 0..16 {
            scheme.process_sample(&HashMap::new(), &[]).unwrap();
        }
        assert!((scheme.current("r1").unwrap() - 5.0e-3).abs() < 1e-9);
    }

    #[test]
    fn reset_restores_dynamic_defaults() {
        let mut netlist = Netlist::new();
        netlist
            .add(LumpedElement::new(
                "vs",
                Element::VoltageSource { r: 600.0, vs: None },
                vec![0, 1],
            ))
            .unwrap();
        netlist
            .add(LumpedElement::new("r1", resistor(600.0), vec![1, 0]))
            .unwrap();
        let mut scheme = WdfScheme::new(48_000.0, netlist, &[]).unwrap();
        let mut inputs = HashMap::new();
        inputs.insert("vs".to_string(), 5.0);
        scheme.process_sample(&inputs, &[]).unwrap();
        scheme.reset();
        assert!(matches!(
            scheme.process_sample(&HashMap::new(), &[]),
            Err(WdfError::UndefinedDynamicInput { .. })
        ));
    }

    #[test]
    fn sample_rate_must_be_positive() {
        let netlist = Netlist::new();
        assert!(matches!(
            WdfScheme::new(0.0, netlist, &[]),
            Err(WdfError::SampleRateError { .. })
        ));
    }

    #[test]
    fn output_index_out_of_range_is_rejected() {
        let mut netlist = Netlist::new();
        netlist
            .add(LumpedElement::new(
                "vs",
                Element::VoltageSource { r: 600.0, vs: Some(1.0) },
                vec![0, 1],
            ))
            .unwrap();
        netlist
            .add(LumpedElement::new("r1", resistor(600.0), vec![1, 0]))
            .unwrap();
        let mut scheme = WdfScheme::new(48_000.0, netlist, &[(1, 0)]).unwrap();
        scheme.process_sample(&HashMap::new(), &[]).unwrap();
        assert!(scheme.output(0).is_ok());
        assert!(matches!(
            scheme.output(1),
            Err(WdfError::PortIndexError { index: 1, num_outputs: 1 })
        ));
    }
}
