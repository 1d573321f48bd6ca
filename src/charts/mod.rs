/*!
 * PNG chart rendering for the analysis pipeline.
 *
 * Charts plot against day offsets from the first record so the axes stay
 * numeric; tick labels are formatted back into calendar dates.
 *
 * Text is drawn with DejaVu Sans compiled into the binary and registered as
 * the "sans-serif" family, so rendering does not depend on system fonts.
 */

use std::ops::Range;
use std::path::Path;
use std::sync::OnceLock;

use chrono::{Duration, NaiveDate};
use plotters::coord::cartesian::Cartesian2d;
use plotters::coord::types::RangedCoordf64;
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::{register_font, FontStyle};
use tracing::debug;

use crate::config::ChartConfig;
use crate::ml::{Decomposition, ForecastPoint};

const ACTUAL_COLOR: RGBColor = RGBColor(31, 119, 180);
const FORECAST_COLOR: RGBColor = RGBColor(214, 39, 40);
const TREND_COLOR: RGBColor = RGBColor(44, 160, 44);
const SEASONAL_COLOR: RGBColor = RGBColor(148, 103, 189);
const RESIDUAL_COLOR: RGBColor = RGBColor(127, 127, 127);
/// Each forecast segment is cut into this many pieces; every other one is drawn.
const DASH_PIECES: usize = 6;
const FONT_FAMILY: &str = "sans-serif";
static BUNDLED_FONT: &[u8] = include_bytes!("../../assets/fonts/DejaVuSans.ttf");
static FONT_REGISTRATION: OnceLock<Result<(), String>> = OnceLock::new();

#[derive(Debug, thiserror::Error)]
pub enum ChartError {
    #[error("nothing to plot for {0}")]
    EmptySeries(&'static str),

    #[error("series lengths differ: {dates} dates, {values} values")]
    LengthMismatch { dates: usize, values: usize },

    #[error("chart rendering failed: {0}")]
    Render(String),
}

fn render_error<E: std::fmt::Display>(err: E) -> ChartError {
    ChartError::Render(err.to_string())
}

/// Registers the bundled face once per process. Later calls return the first outcome.
fn ensure_font() -> Result<(), ChartError> {
    FONT_REGISTRATION
        .get_or_init(|| {
            register_font(FONT_FAMILY, FontStyle::Normal, BUNDLED_FONT)
                .map_err(|_| "bundled chart font is not a valid TrueType file".to_string())
        })
        .clone()
        .map_err(ChartError::Render)
}

type Area<'a> = DrawingArea<BitMapBackend<'a>, Shift>;
type DayChart<'a, 'b> = ChartContext<'a, BitMapBackend<'b>, Cartesian2d<RangedCoordf64, RangedCoordf64>>;

/// Renders the raw series, decomposition and forecast charts as PNG files.
#[derive(Debug, Clone)]
pub struct ChartRenderer {
    width: u32,
    height: u32,
}

impl ChartRenderer {
    pub fn new(config: &ChartConfig) -> Self {
        Self {
            width: config.width,
            height: config.height,
        }
    }

    /// Sales totals over time as a line with point markers.
    pub fn series_chart(
        &self,
        path: &Path,
        dates: &[NaiveDate],
        totals: &[f64],
    ) -> Result<(), ChartError> {
        let origin = check_series("series", dates, totals.len())?;
        ensure_font()?;
        let points = day_points(origin, dates, totals);

        let root = BitMapBackend::new(path, (self.width, self.height)).into_drawing_area();
        root.fill(&WHITE).map_err(render_error)?;
        {
            let mut chart = day_chart(
                &root,
                "Evolucion de ventas en el tiempo",
                24,
                x_range(&points),
                y_range(points.iter().map(|p| p.1)),
                origin,
                "Total de ventas",
            )?;
            chart
                .draw_series(
                    LineSeries::new(points, ACTUAL_COLOR.stroke_width(2)).point_size(3),
                )
                .map_err(render_error)?;
        }
        root.present().map_err(render_error)?;

        debug!(path = %path.display(), "series chart written");
        Ok(())
    }

    /// Trend, seasonal and residual components in three stacked panels.
    pub fn decomposition_chart(
        &self,
        path: &Path,
        dates: &[NaiveDate],
        decomposition: &Decomposition,
    ) -> Result<(), ChartError> {
        let origin = check_series("decomposition", dates, decomposition.len())?;
        ensure_font()?;
        let offsets: Vec<f64> = dates.iter().map(|d| day_offset(origin, *d)).collect();
        let defined = |component: &[Option<f64>]| -> Vec<(f64, f64)> {
            offsets
                .iter()
                .zip(component)
                .filter_map(|(x, y)| y.map(|y| (*x, y)))
                .collect()
        };
        let trend = defined(&decomposition.trend);
        let seasonal = day_points(origin, dates, &decomposition.seasonal);
        let residual = defined(&decomposition.residual);
        let x = x_range(&seasonal);

        let root = BitMapBackend::new(path, (self.width, self.height.saturating_mul(2)))
            .into_drawing_area();
        root.fill(&WHITE).map_err(render_error)?;
        let panels = root.split_evenly((3, 1));

        {
            let mut chart = day_chart(
                &panels[0],
                "Tendencia",
                18,
                x.clone(),
                y_range(trend.iter().map(|p| p.1)),
                origin,
                "Ventas",
            )?;
            chart
                .draw_series(LineSeries::new(trend, TREND_COLOR.stroke_width(2)))
                .map_err(render_error)?;
        }
        {
            let mut chart = day_chart(
                &panels[1],
                "Estacionalidad",
                18,
                x.clone(),
                y_range(seasonal.iter().map(|p| p.1)),
                origin,
                "Ventas",
            )?;
            chart
                .draw_series(LineSeries::new(seasonal, SEASONAL_COLOR.stroke_width(2)))
                .map_err(render_error)?;
        }
        {
            let mut chart = day_chart(
                &panels[2],
                "Residuales",
                18,
                x,
                y_range(residual.iter().map(|p| p.1).chain(std::iter::once(0.0))),
                origin,
                "Ventas",
            )?;
            chart
                .draw_series(
                    residual
                        .into_iter()
                        .map(|p| Circle::new(p, 3, RESIDUAL_COLOR.filled())),
                )
                .map_err(render_error)?;
        }
        root.present().map_err(render_error)?;

        debug!(path = %path.display(), "decomposition chart written");
        Ok(())
    }

    /// Historical totals as a solid line and the forecast as a dashed line, with a legend.
    pub fn forecast_chart(
        &self,
        path: &Path,
        dates: &[NaiveDate],
        totals: &[f64],
        forecast: &[ForecastPoint],
    ) -> Result<(), ChartError> {
        let origin = check_series("forecast", dates, totals.len())?;
        ensure_font()?;
        if forecast.is_empty() {
            return Err(ChartError::EmptySeries("forecast"));
        }
        let actual = day_points(origin, dates, totals);
        let predicted: Vec<(f64, f64)> = forecast
            .iter()
            .map(|point| (day_offset(origin, point.date), point.value))
            .collect();
        let mut all = actual.clone();
        all.extend_from_slice(&predicted);

        let root = BitMapBackend::new(path, (self.width, self.height)).into_drawing_area();
        root.fill(&WHITE).map_err(render_error)?;
        {
            let mut chart = day_chart(
                &root,
                "Pronostico de ventas",
                24,
                x_range(&all),
                y_range(all.iter().map(|p| p.1)),
                origin,
                "Total de ventas",
            )?;

            chart
                .draw_series(LineSeries::new(actual, ACTUAL_COLOR.stroke_width(2)).point_size(3))
                .map_err(render_error)?
                .label("Ventas reales")
                .legend(|(x, y)| {
                    PathElement::new(vec![(x, y), (x + 20, y)], ACTUAL_COLOR.stroke_width(2))
                });

            let markers = if predicted.len() == 1 {
                predicted.clone()
            } else {
                Vec::new()
            };
            chart
                .draw_series(
                    dashed_segments(&predicted, DASH_PIECES)
                        .into_iter()
                        .map(|segment| PathElement::new(segment, FORECAST_COLOR.stroke_width(2))),
                )
                .map_err(render_error)?
                .label("Pronostico")
                .legend(|(x, y)| {
                    PathElement::new(vec![(x, y), (x + 8, y)], FORECAST_COLOR.stroke_width(2))
                });
            chart
                .draw_series(
                    markers
                        .into_iter()
                        .map(|p| Circle::new(p, 3, FORECAST_COLOR.filled())),
                )
                .map_err(render_error)?;

            chart
                .configure_series_labels()
                .position(SeriesLabelPosition::UpperLeft)
                .background_style(WHITE.mix(0.8))
                .border_style(BLACK)
                .draw()
                .map_err(render_error)?;
        }
        root.present().map_err(render_error)?;

        debug!(path = %path.display(), "forecast chart written");
        Ok(())
    }
}

fn check_series(
    name: &'static str,
    dates: &[NaiveDate],
    values: usize,
) -> Result<NaiveDate, ChartError> {
    if dates.len() != values {
        return Err(ChartError::LengthMismatch {
            dates: dates.len(),
            values,
        });
    }
    dates.first().copied().ok_or(ChartError::EmptySeries(name))
}

fn day_chart<'a, 'b>(
    area: &'a Area<'b>,
    caption: &str,
    caption_size: u32,
    x: Range<f64>,
    y: Range<f64>,
    origin: NaiveDate,
    y_desc: &str,
) -> Result<DayChart<'a, 'b>, ChartError> {
    let mut chart = ChartBuilder::on(area)
        .caption(caption, (FONT_FAMILY, caption_size))
        .margin(15)
        .x_label_area_size(40)
        .y_label_area_size(70)
        .build_cartesian_2d(x, y)
        .map_err(render_error)?;

    let formatter = |offset: &f64| date_label(origin, *offset);
    chart
        .configure_mesh()
        .x_labels(8)
        .x_label_formatter(&formatter)
        .x_desc("Fecha")
        .y_desc(y_desc)
        .draw()
        .map_err(render_error)?;

    Ok(chart)
}

fn day_offset(origin: NaiveDate, date: NaiveDate) -> f64 {
    (date - origin).num_days() as f64
}

fn day_points(origin: NaiveDate, dates: &[NaiveDate], values: &[f64]) -> Vec<(f64, f64)> {
    dates
        .iter()
        .zip(values)
        .map(|(date, value)| (day_offset(origin, *date), *value))
        .collect()
}

fn date_label(origin: NaiveDate, offset: f64) -> String {
    origin
        .checked_add_signed(Duration::days(offset.round() as i64))
        .map(|date| date.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

fn x_range(points: &[(f64, f64)]) -> Range<f64> {
    let last = points.iter().map(|p| p.0).fold(0.0_f64, f64::max);
    -0.5..last.max(1.0) + 0.5
}

fn y_range(values: impl Iterator<Item = f64>) -> Range<f64> {
    let (min, max) = values
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });
    if !min.is_finite() {
        return 0.0..1.0;
    }
    let span = max - min;
    let pad = if span.abs() < f64::EPSILON {
        min.abs().max(1.0) * 0.1
    } else {
        span * 0.05
    };
    (min - pad)..(max + pad)
}

/// Splits a polyline into alternating visible pieces to draw it dashed.
fn dashed_segments(points: &[(f64, f64)], pieces: usize) -> Vec<Vec<(f64, f64)>> {
    let pieces = pieces.max(2);
    let mut segments = Vec::new();
    for pair in points.windows(2) {
        let ((x0, y0), (x1, y1)) = (pair[0], pair[1]);
        let at = |t: f64| (x0 + (x1 - x0) * t, y0 + (y1 - y0) * t);
        for k in (0..pieces).step_by(2) {
            let start = k as f64 / pieces as f64;
            let end = (k + 1) as f64 / pieces as f64;
            segments.push(vec![at(start), at(end)]);
        }
    }
    segments
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::seasonal_decompose;
    use tempfile::tempdir;

    fn dates(n: usize) -> Vec<NaiveDate> {
        let start = NaiveDate::from_ymd_opt(2024, 2, 20).unwrap();
        (0..n).map(|i| start + Duration::days(i as i64)).collect()
    }

    fn renderer() -> ChartRenderer {
        ChartRenderer::new(&ChartConfig {
            width: 400,
            height: 300,
        })
    }

    fn ink(buffer: &[u8]) -> usize {
        buffer.chunks(3).filter(|px| px.iter().any(|c| *c < 128)).count()
    }

    #[test]
    fn bundled_font_draws_text() {
        ensure_font().unwrap();
        let mut buffer = vec![255u8; 240 * 60 * 3];
        {
            let root = BitMapBackend::with_buffer(&mut buffer, (240, 60)).into_drawing_area();
            let style = (FONT_FAMILY, 32).into_font().color(&BLACK);
            root.draw_text("Pronostico", &style, (4, 8)).unwrap();
            root.present().unwrap();
        }
        assert!(ink(&buffer) > 50);
    }

    #[test]
    fn renders_all_three_charts() {
        let dir = tempdir().unwrap();
        let dates = dates(21);
        let totals: Vec<f64> = (0..21).map(|i| 100.0 + (i % 7) as f64 * 10.0).collect();
        let decomposition = seasonal_decompose(&totals, 7).unwrap();
        let forecast: Vec<ForecastPoint> = (1..=5)
            .map(|i| ForecastPoint {
                date: dates[20] + Duration::days(i),
                value: 150.0,
            })
            .collect();

        let r = renderer();
        let series = dir.path().join("series.png");
        let decomposed = dir.path().join("decomposition.png");
        let forecasted = dir.path().join("forecast.png");
        r.series_chart(&series, &dates, &totals).unwrap();
        r.decomposition_chart(&decomposed, &dates, &decomposition)
            .unwrap();
        r.forecast_chart(&forecasted, &dates, &totals, &forecast)
            .unwrap();

        assert_png(&series);
        assert_png(&decomposed);
        assert_png(&forecasted);
    }

    #[test]
    fn empty_and_mismatched_series_are_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("x.png");
        assert!(matches!(
            renderer().series_chart(&path, &[], &[]),
            Err(ChartError::EmptySeries(_))
        ));
        assert!(matches!(
            renderer().series_chart(&path, &dates(3), &[1.0]),
            Err(ChartError::LengthMismatch { dates: 3, values: 1 })
        ));
        assert!(!path.exists());
    }

    #[test]
    fn dashes_cover_every_other_piece() {
        let segments = dashed_segments(&[(0.0, 0.0), (6.0, 12.0)], 6);
        assert_eq!(segments.len(), 3);
        let close = |a: (f64, f64), b: (f64, f64)| (a.0 - b.0).abs() < 1e-9 && (a.1 - b.1).abs() < 1e-9;
        assert!(close(segments[0][0], (0.0, 0.0)) && close(segments[0][1], (1.0, 2.0)));
        assert!(close(segments[2][0], (4.0, 8.0)) && close(segments[2][1], (5.0, 10.0)));
        assert!(dashed_segments(&[(0.0, 1.0)], 6).is_empty());
    }

    #[test]
    fn flat_series_gets_a_non_empty_range() {
        let range = y_range([5.0, 5.0].into_iter());
        assert!(range.start < 5.0 && range.end > 5.0);
        assert_eq!(y_range(std::iter::empty()), 0.0..1.0);
    }

    #[test]
    fn labels_map_offsets_back_to_dates() {
        let origin = NaiveDate::from_ymd_opt(2024, 2, 28).unwrap();
        assert_eq!(date_label(origin, 2.0), "2024-03-01");
        assert_eq!(date_label(origin, 0.4), "2024-02-28");
    }
}
