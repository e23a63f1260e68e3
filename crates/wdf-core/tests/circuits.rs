//! End-to-end circuit tests driving [`wdf_core::scheme::WdfScheme`] through complete netlists,
//! as opposed to the per-module unit tests that exercise a single leaf or adaptor in isolation.
use std::collections::HashMap;

use wdf_core::element::{Element, ResistorValue};
use wdf_core::netlist::{LumpedElement, Netlist};
use wdf_core::scheme::{OutputKey, WdfScheme};

const FS: f64 = 48_000.0;

fn resistor(r: f64) -> Element {
    Element::Resistor {
        r: ResistorValue::Fixed(r),
    }
}

#[test]
fn voltage_divider_matches_ohms_law_for_unequal_resistors() {
    // vs --r1-- node2 --r2-- ground, probed across r2.
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
        .add(LumpedElement::new("r1", resistor(300.0), vec![1, 2]))
        .unwrap();
    netlist
        .add(LumpedElement::new("r2", resistor(900.0), vec![2, 0]))
        .unwrap();

    let mut scheme = WdfScheme::new(FS, netlist, &[(2, 0)]).unwrap();
    let mut last = 0.0;
    for _ in 0..32 {
        let out = scheme.process_sample(&HashMap::new(), &[]).unwrap();
        last = out[&OutputKey::Index(0)];
    }
    let expected = 10.0 * 900.0 / (300.0 + 900.0);
    assert!((last - expected).abs() < 1e-6);
}

#[test]
fn rc_lowpass_charges_toward_source_voltage_at_dc() {
    // vs --r-- node1 --c-- ground, probed across the capacitor.
    let mut netlist = Netlist::new();
    netlist
        .add(LumpedElement::new(
            "vs",
            Element::VoltageSource {
                r: 100.0,
                vs: Some(5.0),
            },
            vec![0, 1],
        ))
        .unwrap();
    netlist
        .add(LumpedElement::new(
            "c",
            Element::Capacitor { c: 1e-6 },
            vec![1, 0],
        ))
        .unwrap();

    let mut scheme = WdfScheme::new(FS, netlist, &[(1, 0)]).unwrap();
    let mut last = 0.0;
    for _ in 0..20_000 {
        let out = scheme.process_sample(&HashMap::new(), &[]).unwrap();
        last = out[&OutputKey::Index(0)];
    }
    assert!((last - 5.0).abs() < 1e-3);
}

#[test]
fn diode_rectifier_blocks_reverse_bias_and_passes_forward_bias() {
    // vs --r-- node1 --diode-- node2 --rload-- ground, probed across the load.
    let mut netlist = Netlist::new();
    netlist
        .add(LumpedElement::new(
            "vs",
            Element::VoltageSource { r: 50.0, vs: None },
            vec![0, 1],
        ))
        .unwrap();
    netlist
        .add(LumpedElement::new(
            "d",
            Element::Diode {
                is: 1e-9,
                vt: 0.02585,
            },
            vec![1, 2],
        ))
        .unwrap();
    netlist
        .add(LumpedElement::new("rload", resistor(1000.0), vec![2, 0]))
        .unwrap();

    let mut scheme = WdfScheme::new(FS, netlist, &[(2, 0)]).unwrap();
    let mut inputs = HashMap::new();

    inputs.insert("vs".to_string(), -5.0);
    let mut reverse_output = 0.0;
    for _ in 0..64 {
        let out = scheme.process_sample(&inputs, &[]).unwrap();
        reverse_output = out[&OutputKey::Index(0)];
    }
    assert!(reverse_output.abs() < 0.1);

    inputs.insert("vs".to_string(), 5.0);
    let mut forward_output = 0.0;
    for _ in 0..64 {
        let out = scheme.process_sample(&inputs, &[]).unwrap();
        forward_output = out[&OutputKey::Index(0)];
    }
    assert!(forward_output > 3.0 && forward_output < 5.0);
}

#[test]
fn linear_transformer_topology_runs_without_numerical_breakdown() {
    // A transformer with a grounded secondary return, loaded across its secondary.
    let mut netlist = Netlist::new();
    netlist
        .add(LumpedElement::new(
            "vs",
            Element::VoltageSource { r: 50.0, vs: None },
            vec![0, 1],
        ))
        .unwrap();
    netlist
        .add(LumpedElement::new(
            "xfmr",
            Element::LinearTransformer {
                l_in: 1e-3,
                l_out: 4e-3,
                coupling: 0.98,
            },
            vec![1, 0, 2, 0],
        ))
        .unwrap();
    netlist
        .add(LumpedElement::new("rload", resistor(1_000.0), vec![2, 0]))
        .unwrap();

    let mut scheme = WdfScheme::new(FS, netlist, &[(2, 0)]).unwrap();
    let mut inputs = HashMap::new();
    for i in 0..256 {
        let v = 5.0 * (2.0 * std::f64::consts::PI * 440.0 * (i as f64) / FS).sin();
        inputs.insert("vs".to_string(), v);
        let out = scheme.process_sample(&inputs, &[]).unwrap();
        let secondary = out[&OutputKey::Index(0)];
        assert!(secondary.is_finite());
    }
}

#[test]
fn reprocessing_the_same_signal_after_reset_is_deterministic() {
    let mut netlist = Netlist::new();
    netlist
        .add(LumpedElement::new(
            "vs",
            Element::VoltageSource { r: 50.0, vs: None },
            vec![0, 1],
        ))
        .unwrap();
    netlist
        .add(LumpedElement::new(
            "c",
            Element::Capacitor { c: 2.2e-6 },
            vec![1, 0],
        ))
        .unwrap();

    let mut scheme = WdfScheme::new(FS, netlist, &[(1, 0)]).unwrap();
    let mut signal = HashMap::new();
    signal.insert(
        "vs".to_string(),
        (0..512)
            .map(|i| (2.0 * std::f64::consts::PI * 220.0 * (i as f64) / FS).sin())
            .collect::<Vec<_>>(),
    );

    let first = scheme.process_signal(&signal, &[]).unwrap();
    let second = scheme.process_signal(&signal, &[]).unwrap();
    assert_eq!(
        first[&OutputKey::Index(0)],
        second[&OutputKey::Index(0)]
    );
}
