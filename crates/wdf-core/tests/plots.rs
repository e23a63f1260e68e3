//! SVG plots + snapshot regression tests of canonical circuit responses.
//!
//! Requires `--features test-utils`; the plotting half is a debugging aid (SVGs land under
//! `plots/`), the `insta` half pins the numeric output so a silent behavior change fails CI.
#![cfg(feature = "test-utils")]
use std::collections::HashMap;

use plotters::prelude::{BLUE, RED};
use wdf_core::element::{Element, ResistorValue};
use wdf_core::netlist::{LumpedElement, Netlist};
use wdf_core::scheme::{OutputKey, WdfScheme};
use wdf_core::test_util::{Plot, Series};

const FS: f64 = 48_000.0;

fn resistor(r: f64) -> Element {
    Element::Resistor {
        r: ResistorValue::Fixed(r),
    }
}

#[test]
fn rc_lowpass_step_response_plot_and_snapshot() {
    let mut netlist = Netlist::new();
    netlist
        .add(LumpedElement::new(
            "vs",
            Element::VoltageSource { r: 1_000.0, vs: Some(1.0) },
            vec![0, 1],
        ))
        .unwrap();
    netlist
        .add(LumpedElement::new("c", Element::Capacitor { c: 1e-6 }, vec![1, 0]))
        .unwrap();

    let mut scheme = WdfScheme::new(FS, netlist, &[(1, 0)]).unwrap();
    let mut input = Vec::with_capacity(2_400);
    let mut output = Vec::with_capacity(2_400);
    for _ in 0..2_400 {
        input.push(1.0);
        let out = scheme.process_sample(&HashMap::new(), &[]).unwrap();
        output.push(out[&OutputKey::Index(0)]);
    }

    Plot {
        title: "RC Low-Pass Step Response",
        series: &[
            Series {
                label: "Input",
                samplerate: FS,
                series: &input,
                color: &BLUE,
            },
            Series {
                label: "Output",
                samplerate: FS,
                series: &output,
                color: &RED,
            },
        ],
    }
    .create_svg("plots/rc_lowpass_step.svg");

    insta::assert_csv_snapshot!(&output, { "[]" => insta::rounded_redaction(4) });
}

#[test]
fn diode_half_wave_rectifier_plot_and_snapshot() {
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
                is: 1e-12,
                vt: 0.02585,
            },
            vec![1, 2],
        ))
        .unwrap();
    netlist
        .add(LumpedElement::new("rload", resistor(1_000.0), vec![2, 0]))
        .unwrap();

    let mut scheme = WdfScheme::new(96_000.0, netlist, &[(2, 0)]).unwrap();
    let n = 480;
    let mut input = Vec::with_capacity(n);
    let mut output = Vec::with_capacity(n);
    let mut inputs = HashMap::new();
    for i in 0..n {
        let v = (2.0 * std::f64::consts::PI * 1_000.0 * (i as f64) / 96_000.0).sin();
        input.push(v);
        inputs.insert("vs".to_string(), v);
        let out = scheme.process_sample(&inputs, &[]).unwrap();
        output.push(out[&OutputKey::Index(0)]);
    }

    Plot {
        title: "Diode Half-Wave Rectifier",
        series: &[
            Series {
                label: "Input",
                samplerate: 96_000.0,
                series: &input,
                color: &BLUE,
            },
            Series {
                label: "Output",
                samplerate: 96_000.0,
                series: &output,
                color: &RED,
            },
        ],
    }
    .create_svg("plots/diode_rectifier.svg");

    assert!(output.iter().all(|v| *v > -1e-3));
    insta::assert_csv_snapshot!(&output, { "[]" => insta::rounded_redaction(3) });
}
