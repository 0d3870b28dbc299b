use crate::tasks::figures::color::{get_color_from_label, FONT_SIZE, STROKE_WIDTH};
use anyhow::Result;
use log::{debug, error, info};
use plotters::{
    coord::Shift,
    prelude::*,
    style::text_anchor::{HPos, Pos, VPos},
};
use std::path::Path;

pub type Area<'a> = DrawingArea<BitMapBackend<'a>, Shift>;

const LEGEND_HEIGHT_PX: u32 = 50;
const LEGEND_BOX_PX: i32 = 20;
const MAX_LABELS: usize = 25;

/// Range and tick spacing of a value axis. Axes always start at zero.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Axis {
    pub max: f64,
    pub step: f64,
}

impl Axis {
    pub const fn new(max: f64, step: f64) -> Axis {
        Axis { max, step }
    }

    pub fn num_labels(&self) -> usize {
        ((self.max / self.step).round() as usize + 1).min(MAX_LABELS)
    }

    /// Grow the axis to the first multiple of its step that holds `value`.
    pub fn fit(self, value: f64) -> Result<Axis> {
        if !value.is_finite() {
            let reason = format!("cannot fit a non-finite value on an axis (value={value})");
            error!("{reason}");
            anyhow::bail!(reason);
        }

        if value <= self.max {
            return Ok(self);
        }
        Ok(Axis {
            max: (value / self.step).ceil() * self.step,
            step: self.step,
        })
    }
}

pub fn format_tick(value: f64) -> String {
    if value.fract().abs() < 1e-9 {
        format!("{:.0}", value)
    } else {
        format!("{:.1}", value)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LegendMarker {
    Box,
    Line,
    Cross,
}

#[derive(Clone, Debug)]
pub struct LegendItem {
    pub label: String,
    pub color: RGBColor,
    pub marker: LegendMarker,
}

impl LegendItem {
    pub fn new(label: &str, color: RGBColor, marker: LegendMarker) -> LegendItem {
        LegendItem {
            label: label.to_string(),
            color,
            marker,
        }
    }
}

/// Open a white PNG canvas, and split off a strip on top for the legend.
pub fn new_canvas(path: &Path, size: (u32, u32)) -> Result<(Area<'_>, Area<'_>, Area<'_>)> {
    let root = BitMapBackend::new(path, size).into_drawing_area();
    root.fill(&WHITE)?;

    let (legend, body) = root.split_vertically(LEGEND_HEIGHT_PX);
    Ok((root, legend, body))
}

pub fn finish_canvas(root: Area<'_>, path: &Path) -> Result<()> {
    root.present()?;
    info!("generated plot at: {}", path.display());
    Ok(())
}

// Rough width of a label, good enough to lay legends out in a row
fn label_width_px(label: &str) -> i32 {
    (label.chars().count() as f64 * FONT_SIZE as f64 * 0.55) as i32
}

/// Draw legend entries in a single row, centered in `area`.
pub fn draw_legend(area: &Area<'_>, items: &[LegendItem]) -> Result<()> {
    let spacing = 40;
    let total_width: i32 = items
        .iter()
        .map(|item| LEGEND_BOX_PX + 10 + label_width_px(&item.label) + spacing)
        .sum::<i32>()
        - spacing;
    let (area_width, area_height) = area.dim_in_pixel();

    let mut x_pos = ((area_width as i32 - total_width) / 2).max(10);
    let y_pos = (area_height as i32 - LEGEND_BOX_PX) / 2;

    for item in items {
        let (x0, y0, x1, y1) = (x_pos, y_pos, x_pos + LEGEND_BOX_PX, y_pos + LEGEND_BOX_PX);
        match item.marker {
            LegendMarker::Box => {
                area.draw(&Rectangle::new([(x0, y0), (x1, y1)], item.color.filled()))?;
                area.draw(&PathElement::new(
                    vec![(x0, y0), (x1, y0), (x1, y1), (x0, y1), (x0, y0)],
                    BLACK,
                ))?;
            }
            LegendMarker::Line => {
                area.draw(&PathElement::new(
                    vec![(x0, (y0 + y1) / 2), (x1, (y0 + y1) / 2)],
                    item.color.stroke_width(STROKE_WIDTH),
                ))?;
            }
            LegendMarker::Cross => {
                area.draw(&Cross::new(
                    ((x0 + x1) / 2, (y0 + y1) / 2),
                    LEGEND_BOX_PX / 2,
                    item.color.stroke_width(3),
                ))?;
            }
        }

        area.draw(&Text::new(
            item.label.clone(),
            (x1 + 10, y0 - 2),
            ("sans-serif", FONT_SIZE).into_font(),
        ))?;

        x_pos = x1 + 10 + label_width_px(&item.label) + spacing;
    }

    Ok(())
}

fn label_style(h_pos: HPos, v_pos: VPos) -> TextStyle<'static> {
    TextStyle::from(("sans-serif", FONT_SIZE).into_font()).pos(Pos::new(h_pos, v_pos))
}

/// Map a chart coordinate to a pixel relative to `area`'s top-left corner.
fn to_area_pixel(area: &Area<'_>, abs_pixel: (i32, i32)) -> (i32, i32) {
    let (base_x, base_y) = area.get_base_pixel();
    (abs_pixel.0 - base_x, abs_pixel.1 - base_y)
}

/// One bar per category for each series.
#[derive(Clone, Debug)]
pub struct BarSeries {
    pub label: String,
    pub color: RGBColor,
    pub values: Vec<f64>,
}

#[derive(Clone, Debug)]
pub struct BarPanel {
    pub categories: Vec<String>,
    pub series: Vec<BarSeries>,
    pub y_desc: Option<String>,
    pub y_axis: Axis,
}

const GROUP_WIDTH: f64 = 0.7;

impl BarPanel {
    /// Horizontal extent `[left, right)` of the bar for `series_idx` in
    /// category `category_idx`.
    pub fn bar_extent(&self, category_idx: usize, series_idx: usize) -> (f64, f64) {
        let bar_width = GROUP_WIDTH / self.series.len() as f64;
        let left = category_idx as f64 + (1.0 - GROUP_WIDTH) / 2.0 + series_idx as f64 * bar_width;
        (left, left + bar_width)
    }
}

pub fn draw_bar_panel(area: &Area<'_>, panel: &BarPanel) -> Result<()> {
    let x_max = panel.categories.len() as f64;
    let y_max = panel.y_axis.max;

    let mut chart = ChartBuilder::on(area)
        .x_label_area_size(50)
        .y_label_area_size(80)
        .margin(10)
        .margin_left(if panel.y_desc.is_some() { 40 } else { 10 })
        .build_cartesian_2d(0f64..x_max, 0f64..y_max)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .light_line_style(WHITE)
        .bold_line_style(get_color_from_label("grid")?)
        .y_labels(panel.y_axis.num_labels())
        .y_label_style(("sans-serif", FONT_SIZE).into_font())
        .y_label_formatter(&|y| format_tick(*y))
        .x_labels(0)
        .x_label_formatter(&|_| String::new())
        .draw()?;

    for (s_idx, series) in panel.series.iter().enumerate() {
        chart.draw_series(series.values.iter().enumerate().map(|(c_idx, value)| {
            let (left, right) = panel.bar_extent(c_idx, s_idx);
            let mut bar = Rectangle::new(
                [(left, 0.0), (right, value.min(y_max))],
                series.color.filled(),
            );
            bar.set_margin(0, 0, 1, 1);
            bar
        }))?;
    }

    // Annotate bars that do not fit in the axis with their value
    for (s_idx, series) in panel.series.iter().enumerate() {
        for (c_idx, value) in series.values.iter().enumerate() {
            if *value > y_max {
                let (left, right) = panel.bar_extent(c_idx, s_idx);
                let pixel = chart
                    .plotting_area()
                    .map_coordinate(&((left + right) / 2.0, y_max));
                debug!("bar overflows axis: {} = {value}", series.label);
                area.draw(&Text::new(
                    format_tick(*value),
                    to_area_pixel(area, pixel),
                    label_style(HPos::Center, VPos::Bottom),
                ))?;
            }
        }
    }

    // Category labels under each group
    for (c_idx, category) in panel.categories.iter().enumerate() {
        let pixel = chart
            .plotting_area()
            .map_coordinate(&(c_idx as f64 + 0.5, 0.0));
        let (x, y) = to_area_pixel(area, pixel);
        area.draw(&Text::new(
            category.clone(),
            (x, y + 8),
            label_style(HPos::Center, VPos::Top),
        ))?;
    }

    if let Some(y_desc) = &panel.y_desc {
        let (_, height) = area.dim_in_pixel();
        area.draw(&Text::new(
            y_desc.clone(),
            (5, height as i32 / 2),
            TextStyle::from(
                ("sans-serif", FONT_SIZE)
                    .into_font()
                    .transform(FontTransform::Rotate270),
            )
            .pos(Pos::new(HPos::Center, VPos::Top)),
        ))?;
    }

    // Solid frame around the plotting area
    chart.plotting_area().draw(&PathElement::new(
        vec![(0.0, y_max), (x_max, y_max), (x_max, 0.0)],
        BLACK,
    ))?;

    Ok(())
}

/// Measured points plus a fitted curve, drawn in the same color.
#[derive(Clone, Debug)]
pub struct CurveSeries {
    pub color: RGBColor,
    pub points: Vec<(f64, f64)>,
    pub curve: Vec<(f64, f64)>,
}

#[derive(Clone, Debug)]
pub struct CurvePanel {
    pub title: String,
    pub series: Vec<CurveSeries>,
    pub x_desc: String,
    pub y_desc: Option<String>,
    pub x_axis: Axis,
    pub y_axis: Axis,
}

/// Split a polyline into the pieces that lie at or under `y_max`. Segments
/// crossing `y_max` are cut where they meet it, and non-finite points break
/// the line.
pub fn clip_below(points: &[(f64, f64)], y_max: f64) -> Vec<Vec<(f64, f64)>> {
    let mut pieces = Vec::new();
    let mut current: Vec<(f64, f64)> = Vec::new();
    let mut prev: Option<(f64, f64)> = None;

    for &(x, y) in points {
        if !x.is_finite() || !y.is_finite() {
            if !current.is_empty() {
                pieces.push(std::mem::take(&mut current));
            }
            prev = None;
            continue;
        }

        if let Some((prev_x, prev_y)) = prev {
            let (prev_inside, inside) = (prev_y <= y_max, y <= y_max);
            if prev_inside != inside {
                let t = (y_max - prev_y) / (y - prev_y);
                current.push((prev_x + t * (x - prev_x), y_max));
                if prev_inside {
                    pieces.push(std::mem::take(&mut current));
                }
            }
        }
        if y <= y_max {
            current.push((x, y));
        }
        prev = Some((x, y));
    }

    if !current.is_empty() {
        pieces.push(current);
    }
    pieces
}

pub fn draw_curve_panel(area: &Area<'_>, panel: &CurvePanel) -> Result<()> {
    let (x_max, y_max) = (panel.x_axis.max, panel.y_axis.max);

    let mut chart = ChartBuilder::on(area)
        .caption(&panel.title, ("sans-serif", FONT_SIZE).into_font())
        .x_label_area_size(70)
        .y_label_area_size(90)
        .margin(10)
        .margin_right(20)
        .build_cartesian_2d(0f64..x_max, 0f64..y_max)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .light_line_style(WHITE)
        .bold_line_style(get_color_from_label("grid")?)
        .x_labels(panel.x_axis.num_labels())
        .y_labels(panel.y_axis.num_labels())
        .x_label_formatter(&|x| format_tick(*x))
        .y_label_formatter(&|y| format_tick(*y))
        .label_style(("sans-serif", FONT_SIZE).into_font())
        .axis_desc_style(("sans-serif", FONT_SIZE).into_font())
        .x_desc(panel.x_desc.as_str())
        .y_desc(panel.y_desc.clone().unwrap_or_default())
        .draw()?;

    for series in &panel.series {
        for piece in clip_below(&series.curve, y_max) {
            chart.draw_series(LineSeries::new(
                piece,
                series.color.stroke_width(STROKE_WIDTH),
            ))?;
        }
        chart.draw_series(
            series
                .points
                .iter()
                .map(|point| Cross::new(*point, 10, series.color.stroke_width(3))),
        )?;
    }

    chart.plotting_area().draw(&PathElement::new(
        vec![(0.0, y_max), (x_max, y_max), (x_max, 0.0)],
        BLACK,
    ))?;

    Ok(())
}

/// A horizontal bar starting at `start` on row `row`.
#[derive(Clone, Debug, PartialEq)]
pub struct Span {
    pub row: f64,
    pub start: f64,
    pub len: f64,
    pub color: RGBColor,
}

#[derive(Clone, Debug)]
pub struct SpanPanel {
    pub spans: Vec<Span>,
    /// Labels drawn next to the given rows. When empty the row axis gets
    /// plain numeric ticks.
    pub row_labels: Vec<(f64, String)>,
    pub row_range: (f64, f64),
    pub row_height: f64,
    pub num_row_ticks: usize,
    pub x_desc: String,
    pub y_desc: String,
    pub x_axis: Axis,
}

pub fn draw_span_panel(area: &Area<'_>, panel: &SpanPanel) -> Result<()> {
    let x_max = panel.x_axis.max;
    let (row_min, row_max) = panel.row_range;
    let has_row_labels = !panel.row_labels.is_empty();

    let mut chart = ChartBuilder::on(area)
        .x_label_area_size(70)
        .y_label_area_size(90)
        .margin(10)
        .margin_right(25)
        .build_cartesian_2d(0f64..x_max, row_min..row_max)?;

    chart
        .configure_mesh()
        .light_line_style(WHITE)
        .bold_line_style(get_color_from_label("grid")?)
        .x_labels(panel.x_axis.num_labels())
        .y_labels(if has_row_labels { 0 } else { panel.num_row_ticks })
        .x_label_formatter(&|x| format_tick(*x))
        .y_label_formatter(&|y| format!("{:.0}", y))
        .label_style(("sans-serif", FONT_SIZE).into_font())
        .axis_desc_style(("sans-serif", FONT_SIZE).into_font())
        .x_desc(panel.x_desc.as_str())
        .y_desc(panel.y_desc.as_str())
        .draw()?;

    let half_height = panel.row_height / 2.0;
    chart.draw_series(panel.spans.iter().map(|span| {
        Rectangle::new(
            [
                (span.start, span.row - half_height),
                ((span.start + span.len).min(x_max), span.row + half_height),
            ],
            span.color.filled(),
        )
    }))?;

    for (row, label) in &panel.row_labels {
        let pixel = chart.plotting_area().map_coordinate(&(0.0, *row));
        let (x, y) = to_area_pixel(area, pixel);
        area.draw(&Text::new(
            label.clone(),
            (x - 10, y),
            label_style(HPos::Right, VPos::Center),
        ))?;
    }

    chart.plotting_area().draw(&PathElement::new(
        vec![(0.0, row_max), (x_max, row_max), (x_max, row_min)],
        BLACK,
    ))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_axis_labels_and_fit() {
        let axis = Axis::new(2.0, 0.5);
        assert_eq!(axis.num_labels(), 5);
        assert_eq!(axis.fit(1.5).unwrap(), axis);
        assert_eq!(axis.fit(2.7).unwrap(), Axis::new(3.0, 0.5));
        assert_eq!(Axis::new(1000.0, 200.0).num_labels(), 6);
    }

    #[test]
    fn test_fit_huge_and_non_finite_values() {
        let axis = Axis::new(16.0, 5.0);
        let huge = axis.fit(1e20).unwrap();
        assert!(huge.max >= 1e20);
        assert_eq!(huge.step, 5.0);
        assert_eq!(huge.num_labels(), MAX_LABELS);

        assert!(axis.fit(f64::INFINITY).is_err());
        assert!(axis.fit(f64::NAN).is_err());
    }

    #[test]
    fn test_clip_below_cuts_at_top_edge() {
        let curve = vec![(1.0, 10.0), (2.0, 6.0), (4.0, 3.0)];
        assert_eq!(
            clip_below(&curve, 8.0),
            vec![vec![(1.5, 8.0), (2.0, 6.0), (4.0, 3.0)]]
        );

        let dip = vec![(0.0, 8.0), (1.0, 2.0), (2.0, 8.0)];
        assert_eq!(
            clip_below(&dip, 5.0),
            vec![vec![(0.5, 5.0), (1.0, 2.0), (1.5, 5.0)]]
        );

        let broken = vec![(1.0, 1.0), (2.0, f64::INFINITY), (3.0, 1.0), (4.0, 1.0)];
        assert_eq!(
            clip_below(&broken, 5.0),
            vec![vec![(1.0, 1.0)], vec![(3.0, 1.0), (4.0, 1.0)]]
        );
        assert!(clip_below(&[(1.0, 9.0), (2.0, 7.0)], 5.0).is_empty());
    }

    #[test]
    fn test_format_tick() {
        assert_eq!(format_tick(10.0), "10");
        assert_eq!(format_tick(0.5), "0.5");
        assert_eq!(format_tick(1.96), "2.0");
    }

    #[test]
    fn test_bars_do_not_overlap_within_a_group() {
        let panel = BarPanel {
            categories: vec!["Q1".to_string(), "Q16".to_string()],
            series: vec![
                BarSeries {
                    label: "a".to_string(),
                    color: BLACK,
                    values: vec![1.0, 2.0],
                },
                BarSeries {
                    label: "b".to_string(),
                    color: BLACK,
                    values: vec![1.0, 2.0],
                },
            ],
            y_desc: None,
            y_axis: Axis::new(2.0, 0.5),
        };

        let (l0, r0) = panel.bar_extent(1, 0);
        let (l1, r1) = panel.bar_extent(1, 1);
        assert!(l0 >= 1.0 && r1 <= 2.0);
        assert!((r0 - l1).abs() < 1e-12);
        assert!(((l0 + r1) / 2.0 - 1.5).abs() < 1e-12);
    }
}
