//! Time-domain SVG plotting helper for the integration tests. Needs the `test-utils` feature.
//!
//! `Series`/`Plot` overlay one or more `f64` sample sequences on a shared time axis and render
//! them to an SVG file via `plotters`, for visual inspection of a circuit's step/transient
//! response alongside the numeric snapshot assertions.
use std::ops::Range;
use std::path::Path;

use plotters::coord::{self, ranged1d::ValueFormatter};
use plotters::{chart::SeriesAnno, prelude::*};

fn assert_ok(res: Result<(), impl std::fmt::Display>) {
    match res {
        Ok(()) => {}
        Err(value) => panic!("Not OK: {value}"),
    }
}

/// A single time series to plot.
pub struct Series<'a> {
    /// Label shown in the plot legend.
    pub label: &'a str,
    /// Sample rate of the series (Hz).
    pub samplerate: f64,
    /// Y-values of the series.
    pub series: &'a [f64],
    /// Display color.
    pub color: &'a RGBColor,
}

impl<'a> Series<'a> {
    /// Validate that the series is well-formed.
    pub fn validate(&self) -> Result<(), String> {
        if self.samplerate <= 0.0 {
            return Err(format!("Series {:?}: samplerate is not positive", self.label));
        }
        if self.series.is_empty() {
            return Err(format!("Series {:?}: no data", self.label));
        }
        Ok(())
    }

    /// The time range (seconds) this series spans.
    pub fn timescale(&self) -> Range<f64> {
        assert_ok(self.validate());
        0.0..(self.series.len() as f64 / self.samplerate)
    }

    /// The y-axis range this series spans.
    pub fn y_range(&self) -> Range<f64> {
        assert_ok(self.validate());
        let min = self.series.iter().copied().fold(f64::INFINITY, f64::min);
        let max = self.series.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        min..max
    }

    fn as_series<DB: DrawingBackend>(&self) -> LineSeries<DB, (f64, f64)> {
        LineSeries::new(
            self.series
                .iter()
                .copied()
                .enumerate()
                .map(|(i, y)| (i as f64 / self.samplerate, y)),
            self.color,
        )
    }

    fn apply_legend(&self, ann: &mut SeriesAnno<impl DrawingBackend>) {
        let color = *self.color;
        ann.label(self.label);
        ann.legend(move |(x, y)| PathElement::new([(x, y), (x + 20, y)], color));
    }
}

/// High-level time-domain plot of one or more [`Series`], rendered to an SVG file.
pub struct Plot<'a> {
    /// Plot title.
    pub title: &'a str,
    /// Series to overlay.
    pub series: &'a [Series<'a>],
}

impl<'a> Plot<'a> {
    /// Validate that the plot is well-formed (non-empty, every series well-formed).
    pub fn validate(&self) -> Result<(), String> {
        if self.series.is_empty() {
            return Err(format!("Plot {:?}: no series", self.title));
        }
        self.series.iter().try_for_each(|s| s.validate())?;
        Ok(())
    }

    fn render_into(&self, output: &DrawingArea<impl DrawingBackend, coord::Shift>) {
        assert_ok(self.validate());
        let timescale = self
            .series
            .iter()
            .map(|s| s.timescale())
            .reduce(|l, r| l.start.min(r.start)..l.end.max(r.end))
            .unwrap();
        let yrange = self
            .series
            .iter()
            .map(|s| s.y_range())
            .reduce(|l, r| l.start.min(r.start)..l.end.max(r.end))
            .unwrap();

        let mut ctx = ChartBuilder::on(output);
        ctx.set_label_area_size(LabelAreaPosition::Left, 40)
            .set_label_area_size(LabelAreaPosition::Bottom, 40)
            .caption(self.title, ("sans-serif", 40));
        let mut ctx = ctx.build_cartesian_2d(timescale, yrange).unwrap();
        self.render(&mut ctx);
    }

    fn render<'ctx, T: 'ctx + Ranged<ValueType = f64> + ValueFormatter<f64>>(
        &self,
        ctx: &mut ChartContext<'ctx, impl 'ctx + DrawingBackend, Cartesian2d<T, T>>,
    ) {
        ctx.configure_mesh().draw().unwrap();
        for series in self.series {
            let ann = ctx.draw_series(series.as_series()).unwrap();
            series.apply_legend(ann);
        }
        ctx.configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .draw()
            .unwrap();
    }

    /// Render this plot into a freshly created SVG file, creating parent directories as needed.
    pub fn create_svg(&self, filename: impl AsRef<Path>) {
        let path = filename.as_ref();
        let _ = std::fs::create_dir_all(path.parent().expect("filename has a parent directory"));
        let root = SVGBackend::new(path, (600, 400)).into_drawing_area();
        root.fill(&WHITE).unwrap();
        self.render_into(&root);
    }
}
