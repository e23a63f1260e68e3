//! Parameterized sweeps over the §8 testable properties, across several component values.
use std::collections::HashMap;

use rstest::rstest;

use wdf_core::element::{Element, ResistorValue};
use wdf_core::netlist::{LumpedElement, Netlist};
use wdf_core::scheme::{OutputKey, WdfScheme};

const FS: f64 = 48_000.0;

fn resistor(r: f64) -> Element {
    Element::Resistor {
        r: ResistorValue::Fixed(r),
    }
}

#[rstest]
#[case(1.0, 1.0, 0.5)]
#[case(100.0, 900.0, 0.9)]
#[case(900.0, 100.0, 0.1)]
#[case(47.0, 47.0, 0.5)]
fn voltage_divider_settles_to_expected_ratio(
    #[case] r1: f64,
    #[case] r2: f64,
    #[case] expected_ratio: f64,
) {
    let mut netlist = Netlist::new();
    netlist
        .add(LumpedElement::new(
            "vs",
            Element::VoltageSource { r: 0.0, vs: Some(1.0) },
            vec![0, 1],
        ))
        .unwrap();
    netlist
        .add(LumpedElement::new("r1", resistor(r1), vec![1, 2]))
        .unwrap();
    netlist
        .add(LumpedElement::new("r2", resistor(r2), vec![2, 0]))
        .unwrap();

    let mut scheme = WdfScheme::new(FS, netlist, &[(2, 0)]).unwrap();
    let mut last = 0.0;
    for _ in 0..32 {
        let out = scheme.process_sample(&HashMap::new(), &[]).unwrap();
        last = out[&OutputKey::Index(0)];
    }
    assert!((last - expected_ratio).abs() < 1e-6);
}

#[rstest]
#[case(1_000.0, 1e-6)]
#[case(4_700.0, 100e-9)]
#[case(10_000.0, 10e-6)]
fn rc_lowpass_settles_within_five_time_constants(#[case] r: f64, #[case] c: f64) {
    let mut netlist = Netlist::new();
    netlist
        .add(LumpedElement::new(
            "vs",
            Element::VoltageSource { r, vs: Some(1.0) },
            vec![0, 1],
        ))
        .unwrap();
    netlist
        .add(LumpedElement::new("c", Element::Capacitor { c }, vec![1, 0]))
        .unwrap();

    let mut scheme = WdfScheme::new(FS, netlist, &[(1, 0)]).unwrap();
    let tau = r * c;
    let samples = ((5.0 * tau * FS).ceil() as usize).max(1);
    let mut last = 0.0;
    for _ in 0..samples {
        let out = scheme.process_sample(&HashMap::new(), &[]).unwrap();
        last = out[&OutputKey::Index(0)];
    }
    assert!((last - 1.0).abs() < 1e-2, "r={r} c={c} tau={tau} last={last}");
}

#[rstest]
#[case(100.0)]
#[case(600.0)]
#[case(100_000.0)]
fn resistor_port_resistance_matches_value(#[case] r: f64) {
    use wdf_core::wdf_leaf::Resistor;
    use wdf_core::AdaptedWdf;
    assert_eq!(Resistor::new(r).port_resistance(), r);
}
