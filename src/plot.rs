//! Raster figure for the feature distributions: a histogram row above a
//! box-plot row, one column per feature.

use crate::analyzer::FeatureDistribution;
use crate::error::{PrepError, Result};
use crate::stats::{BoxSummary, Histogram};
use plotters::coord::Shift;
use plotters::prelude::*;
use std::path::Path;

const PANEL_WIDTH: u32 = 400;
const PANEL_HEIGHT: u32 = 400;

type Panel<'a> = DrawingArea<BitMapBackend<'a>, Shift>;

fn plot_error<E: std::fmt::Display>(e: E) -> PrepError {
    PrepError::Plot(e.to_string())
}

/// Write a PNG with a 2 x n grid of panels for `distributions`.
pub fn render_distributions(path: &Path, distributions: &[FeatureDistribution]) -> Result<()> {
    let columns = distributions.len().max(1);
    let root = BitMapBackend::new(path, (PANEL_WIDTH * columns as u32, PANEL_HEIGHT * 2))
        .into_drawing_area();
    root.fill(&WHITE).map_err(plot_error)?;

    let panels = root.split_evenly((2, columns));
    for (i, distribution) in distributions.iter().enumerate() {
        draw_histogram(&panels[i], &distribution.histogram)?;
        if let Some(summary) = &distribution.box_plot {
            draw_box(&panels[columns + i], summary)?;
        }
    }
    root.present().map_err(plot_error)?;
    Ok(())
}

fn draw_histogram(area: &Panel<'_>, histogram: &Histogram) -> Result<()> {
    let (first, last) = match (histogram.edges.first(), histogram.edges.last()) {
        (Some(first), Some(last)) if first < last => (*first, *last),
        _ => return Ok(()),
    };
    let tallest = histogram.counts.iter().copied().max().unwrap_or(0).max(1) as f64;

    let mut chart = ChartBuilder::on(area)
        .margin(10)
        .build_cartesian_2d(first..last, 0f64..tallest * 1.05)
        .map_err(plot_error)?;
    chart
        .draw_series(
            histogram
                .edges
                .windows(2)
                .zip(&histogram.counts)
                .map(|(w, count)| {
                    Rectangle::new([(w[0], 0.0), (w[1], *count as f64)], BLUE.mix(0.7).filled())
                }),
        )
        .map_err(plot_error)?;
    chart
        .draw_series(std::iter::once(PathElement::new(
            vec![(first, 0.0), (last, 0.0)],
            BLACK.stroke_width(1),
        )))
        .map_err(plot_error)?;
    Ok(())
}

fn draw_box(area: &Panel<'_>, summary: &BoxSummary) -> Result<()> {
    let (mut low, mut high) = (summary.min, summary.max);
    if !(low < high) {
        low -= 0.5;
        high += 0.5;
    }

    let mut chart = ChartBuilder::on(area)
        .margin(10)
        .build_cartesian_2d(0f64..1f64, low..high)
        .map_err(plot_error)?;

    chart
        .draw_series(std::iter::once(Rectangle::new(
            [(0.3, summary.q1), (0.7, summary.q3)],
            BLUE.mix(0.3).filled(),
        )))
        .map_err(plot_error)?;
    chart
        .draw_series(std::iter::once(Rectangle::new(
            [(0.3, summary.q1), (0.7, summary.q3)],
            BLACK.stroke_width(1),
        )))
        .map_err(plot_error)?;

    let whiskers = vec![
        vec![(0.5, summary.q3), (0.5, summary.upper_whisker)],
        vec![(0.5, summary.q1), (0.5, summary.lower_whisker)],
        vec![(0.4, summary.upper_whisker), (0.6, summary.upper_whisker)],
        vec![(0.4, summary.lower_whisker), (0.6, summary.lower_whisker)],
    ];
    chart
        .draw_series(
            whiskers
                .into_iter()
                .map(|points| PathElement::new(points, BLACK.stroke_width(1))),
        )
        .map_err(plot_error)?;
    chart
        .draw_series(std::iter::once(PathElement::new(
            vec![(0.3, summary.median), (0.7, summary.median)],
            RED.stroke_width(2),
        )))
        .map_err(plot_error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn distribution(feature: &str, values: &[f64]) -> FeatureDistribution {
        FeatureDistribution {
            feature: feature.to_string(),
            histogram: Histogram::from_values(values, 30),
            box_plot: BoxSummary::from_values(values),
        }
    }

    #[test]
    fn test_render_writes_png() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("dist.png");
        let values: Vec<f64> = (0..50).map(|v| (v as f64).powi(2)).collect();
        render_distributions(&path, &[distribution("Spend", &values), distribution("Flat", &[3.0, 3.0])])
            .unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert!(bytes.starts_with(b"\x89PNG\r\n\x1a\n"));
    }

    #[test]
    fn test_render_without_features() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("empty.png");
        render_distributions(&path, &[]).unwrap();
        assert!(path.exists());
    }
}
