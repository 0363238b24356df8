use std::ops::Range;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use miette::Diagnostic;
use plotters::prelude::*;
use thiserror::Error;
use time::OffsetDateTime;

use crate::forecast::{Forecast, Series};
use crate::location::Request;
use crate::Options;

pub const DEFAULT_OUTPUT: &str = "temp-plot.svg";

const SIZE: (u32, u32) = (1600, 900);
const TEMPERATURE_COLOR: RGBColor = RGBColor(255, 165, 0);
const PRECIPITATION_COLOR: RGBColor = RGBColor(49, 130, 189);
const GRID_COLOR: RGBColor = RGBColor(0xdb, 0xdb, 0xdb);

#[derive(Debug, Error, Diagnostic)]
pub enum ChartError {
    #[error("{measurement} value `{value}` is not a number")]
    #[diagnostic(code(meteogram::chart::non_numeric))]
    NonNumericValue {
        measurement: &'static str,
        value: String,
    },
    #[error("Timestamp {0} can't be drawn")]
    #[diagnostic(code(meteogram::chart::timestamp))]
    TimestampOutOfRange(OffsetDateTime),
    #[error("Could not draw the chart: {0}")]
    #[diagnostic(code(meteogram::chart::drawing))]
    Drawing(String),
    #[error("Could not open {}", .path.display())]
    #[diagnostic(code(meteogram::chart::open))]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn drawing(e: impl std::fmt::Display) -> ChartError {
    ChartError::Drawing(e.to_string())
}

pub fn title(request: &Request) -> String {
    let coordinates = request.coordinates();
    format!(
        "Weather in {} ({}, {})",
        request.display_name(),
        coordinates.latitude,
        coordinates.longitude
    )
}

fn to_chrono(timestamp: OffsetDateTime) -> Result<DateTime<Utc>, ChartError> {
    DateTime::from_timestamp(timestamp.unix_timestamp(), timestamp.nanosecond())
        .ok_or(ChartError::TimestampOutOfRange(timestamp))
}

/// Series samples as plottable points, in series order.
pub fn points(series: &Series) -> Result<Vec<(DateTime<Utc>, f64)>, ChartError> {
    series
        .iter()
        .map(|sample| {
            let value = sample
                .value
                .parse()
                .map_err(|_| ChartError::NonNumericValue {
                    measurement: series.measurement.element_name(),
                    value: sample.value.clone(),
                })?;
            Ok((to_chrono(sample.timestamp)?, value))
        })
        .collect()
}

/// Covers every sample of both series plus one bar width. Never empty.
pub fn time_range(
    forecast: &Forecast,
    bar_width: Duration,
) -> Result<Range<DateTime<Utc>>, ChartError> {
    let span = [
        forecast.temperatures.time_span(),
        forecast.precipitation.time_span(),
    ]
    .into_iter()
    .flatten()
    .reduce(|(start, end), (first, last)| (start.min(first), end.max(last)));

    let Some((start, end)) = span else {
        let now = Utc::now();
        return Ok(now..now + Duration::days(1));
    };
    Ok(to_chrono(start)?..to_chrono(end)? + bar_width)
}

/// Always includes zero, so the temperature area fills towards the axis.
pub fn temperature_range(points: &[(DateTime<Utc>, f64)]) -> Range<f64> {
    let (low, high) = points
        .iter()
        .fold((0.0_f64, 0.0_f64), |(low, high), (_, v)| (low.min(*v), high.max(*v)));
    (low - 1.0).floor()..(high + 1.0).ceil()
}

pub fn precipitation_range(points: &[(DateTime<Utc>, f64)]) -> Range<f64> {
    let high = points
        .iter()
        .map(|(_, v)| *v)
        .max_by(|left, right| left.total_cmp(right))
        .unwrap_or(0.0);
    0.0..(high * 1.2).max(1.0)
}

/// Draws the forecast to `output` as SVG. Returns the written path, or `None`
/// when drawing is turned off.
pub fn render(
    forecast: &Forecast,
    title: &str,
    output: &Path,
    options: &Options,
) -> Result<Option<PathBuf>, ChartError> {
    let temperatures = points(&forecast.temperatures)?;
    let precipitation = points(&forecast.precipitation)?;

    if !options.draw {
        tracing::debug!(message = "drawing disabled, skipping chart");
        return Ok(None);
    }

    let bar_width = Duration::hours(1);
    let x_range = time_range(forecast, bar_width)?;

    let root = SVGBackend::new(output, SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(drawing)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 40).into_font())
        .margin(10)
        .x_label_area_size(60)
        .y_label_area_size(70)
        .right_y_label_area_size(70)
        .build_cartesian_2d(x_range.clone(), temperature_range(&temperatures))
        .map_err(drawing)?
        .set_secondary_coord(x_range, precipitation_range(&precipitation));

    chart
        .configure_mesh()
        .light_line_style(WHITE)
        .bold_line_style(GRID_COLOR)
        .x_label_formatter(&|t: &DateTime<Utc>| t.format("%d.%m. %H:%M").to_string())
        .y_desc("Temperature in °C")
        .draw()
        .map_err(drawing)?;
    chart
        .configure_secondary_axes()
        .y_desc("Precipitation in mm")
        .draw()
        .map_err(drawing)?;

    if !precipitation.is_empty() {
        chart
            .draw_secondary_series(precipitation.iter().map(|&(timestamp, value)| {
                Rectangle::new(
                    [(timestamp, 0.0), (timestamp + bar_width, value)],
                    PRECIPITATION_COLOR.filled(),
                )
            }))
            .map_err(drawing)?
            .label("Precipitation")
            .legend(|(x, y)| {
                Rectangle::new([(x, y - 5), (x + 20, y + 5)], PRECIPITATION_COLOR.filled())
            });
    }

    if !temperatures.is_empty() {
        chart
            .draw_series(
                AreaSeries::new(temperatures.iter().copied(), 0.0, TEMPERATURE_COLOR.mix(0.3))
                    .border_style(TEMPERATURE_COLOR.stroke_width(2)),
            )
            .map_err(drawing)?
            .label("Temperature")
            .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], TEMPERATURE_COLOR));
    }

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()
        .map_err(drawing)?;

    root.present().map_err(drawing)?;

    tracing::info!(message = "chart written", path = %output.display());
    Ok(Some(output.to_path_buf()))
}

/// Opens the chart with whatever the system uses for SVG files.
pub fn open(path: &Path) -> Result<(), ChartError> {
    webbrowser::open(&path.to_string_lossy()).map_err(|source| ChartError::Open {
        path: path.to_path_buf(),
        source,
    })
}
