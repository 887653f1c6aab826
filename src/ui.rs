use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    symbols::{Marker, border},
    text::{Line, Span, Text},
    widgets::{
        Bar, BarChart, BarGroup, Block, Cell, Clear, Paragraph, Row, Table, Tabs, Wrap,
        canvas::{Canvas, Line as CanvasLine, Points},
    },
};

use crate::dispatch::{GroupedMeans, Preview, ViewResult};
use crate::domain::DVConfig;
use crate::model::Model;
use crate::stats::{BoxPlot, ColumnSummary, CorrelationMatrix, Histogram};

pub const TITLE_HEIGHT: u16 = 3;
pub const CONTROLS_HEIGHT: u16 = 1;
pub const STATUSLINE_HEIGHT: u16 = 1;
pub const COLUMN_WIDTH_MARGIN: usize = 1;
pub const HEATMAP_CELL_WIDTH: u16 = 8;

const HEADER_STYLE: Style = Style::new().fg(Color::Yellow).add_modifier(Modifier::BOLD);

pub struct DashboardUI {
    max_column_width: usize,
}

impl DashboardUI {
    pub fn new(cfg: &DVConfig) -> Self {
        Self {
            max_column_width: cfg.max_column_width,
        }
    }

    pub fn draw(&self, model: &Model, frame: &mut Frame) {
        let uidata = model.get_uidata();
        let area = frame.area();

        if let Some(error) = &uidata.error {
            self.draw_error(error, frame, area);
            return;
        }

        let [title_area, controls_area, view_area, status_area] = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(TITLE_HEIGHT),
                Constraint::Length(CONTROLS_HEIGHT),
                Constraint::Min(0),
                Constraint::Length(STATUSLINE_HEIGHT),
            ])
            .areas(area);

        let tabs = Tabs::new(uidata.datasets.clone())
            .select(uidata.selected_dataset)
            .highlight_style(Style::new().black().on_yellow().bold())
            .block(
                Block::bordered()
                    .title(Line::from(" Data explorer ".bold()).centered())
                    .border_set(border::THICK),
            );
        frame.render_widget(tabs, title_area);

        let mut spans: Vec<Span> = Vec::new();
        for (label, value) in uidata.controls.iter() {
            spans.push(format!(" {label}: ").into());
            spans.push(value.clone().blue().bold());
        }
        frame.render_widget(Line::from(spans), controls_area);

        let block = Block::bordered().title(format!(" {} ", uidata.view_title));
        match &uidata.view {
            ViewResult::Preview(preview) => self.draw_preview(preview, block, frame, view_area),
            ViewResult::Summary(rows) => self.draw_summary(rows, block, frame, view_area),
            ViewResult::Histogram(hist) => self.draw_histogram(hist, block, frame, view_area),
            ViewResult::Heatmap(matrix) => self.draw_heatmap(matrix, block, frame, view_area),
            ViewResult::BoxPlot(bp) => self.draw_box_plot(bp, block, frame, view_area),
            ViewResult::Grouped(grouped) => self.draw_grouped(grouped, block, frame, view_area),
            ViewResult::Notice(notice) => {
                let text = Paragraph::new(notice.to_string().italic())
                    .centered()
                    .block(block);
                frame.render_widget(text, view_area);
            }
            ViewResult::Failed(message) => {
                let text = Paragraph::new(message.clone().red())
                    .wrap(Wrap { trim: false })
                    .block(block);
                frame.render_widget(text, view_area);
            }
        }

        let status = Line::from(vec![
            format!(" {} rows ", uidata.nrows).black().on_gray(),
            format!(" {}", uidata.status_message).into(),
            "  <?> help  <q> quit".dark_gray(),
        ]);
        frame.render_widget(status, status_area);

        if uidata.show_popup {
            self.draw_popup(&uidata.popup_message, frame, area);
        }
    }

    fn draw_error(&self, error: &str, frame: &mut Frame, area: Rect) {
        let block = Block::bordered()
            .title(Line::from(" Data explorer ".bold()).centered())
            .title_bottom(Line::from(" Quit <q> ").centered())
            .border_set(border::THICK)
            .red();
        let text = Text::from(error.to_string());
        let paragraph = Paragraph::new(text).wrap(Wrap { trim: false }).block(block);
        frame.render_widget(paragraph, area);
    }

    fn draw_popup(&self, message: &str, frame: &mut Frame, area: Rect) {
        let width = area.width * 3 / 5;
        let height = (message.lines().count() as u16 + 2).min(area.height);
        let popup = Rect {
            x: area.x + (area.width - width) / 2,
            y: area.y + (area.height - height) / 2,
            width,
            height,
        };
        frame.render_widget(Clear, popup);
        frame.render_widget(
            Paragraph::new(message.to_string()).block(Block::bordered().title(" Help ")),
            popup,
        );
    }

    fn draw_preview(&self, preview: &Preview, block: Block, frame: &mut Frame, area: Rect) {
        let widths: Vec<Constraint> = preview
            .headers
            .iter()
            .enumerate()
            .map(|(idx, name)| {
                let longest = preview
                    .rows
                    .iter()
                    .map(|r| r[idx].chars().count())
                    .max()
                    .unwrap_or(0);
                let width = longest.max(name.chars().count()) + COLUMN_WIDTH_MARGIN;
                Constraint::Length(width.min(self.max_column_width) as u16)
            })
            .collect();
        let header = Row::new(preview.headers.clone()).style(HEADER_STYLE);
        let rows = preview.rows.iter().map(|r| Row::new(r.clone()));
        let block = block.title_bottom(
            Line::from(format!(" {} of {} rows ", preview.rows.len(), preview.total_rows))
                .right_aligned(),
        );
        frame.render_widget(Table::new(rows, widths).header(header).block(block), area);
    }

    fn draw_summary(&self, rows: &[ColumnSummary], block: Block, frame: &mut Frame, area: Rect) {
        let header = Row::new(["column", "count", "mean", "std", "min", "25%", "50%", "75%", "max"])
            .style(HEADER_STYLE);
        let name_width = rows
            .iter()
            .map(|r| r.column.chars().count())
            .max()
            .unwrap_or(6)
            .clamp(6, self.max_column_width);
        let mut widths = vec![Constraint::Length(name_width as u16 + 1)];
        widths.extend([Constraint::Length(12); 8]);

        let rows = rows.iter().map(|s| {
            Row::new(vec![
                Cell::from(s.column.clone()).bold(),
                Cell::from(s.count.to_string()),
                Cell::from(fmt_stat(s.mean)),
                Cell::from(fmt_stat(s.std)),
                Cell::from(fmt_stat(s.min)),
                Cell::from(fmt_stat(s.q1)),
                Cell::from(fmt_stat(s.median)),
                Cell::from(fmt_stat(s.q3)),
                Cell::from(fmt_stat(s.max)),
            ])
        });
        frame.render_widget(Table::new(rows, widths).header(header).block(block), area);
    }

    fn draw_histogram(&self, hist: &Histogram, block: Block, frame: &mut Frame, area: Rect) {
        let bins = hist.counts.len().max(1) as u16;
        let inner_width = area.width.saturating_sub(2);
        let bar_width = (inner_width / bins).saturating_sub(1).max(1);

        let tallest = hist.tallest();
        let bars: Vec<Bar> = hist
            .counts
            .iter()
            .enumerate()
            .map(|(idx, &count)| {
                let color = if Some(idx) == tallest {
                    Color::LightCyan
                } else {
                    Color::LightBlue
                };
                let label = hist
                    .bin_range(idx)
                    .map(|(lo, _)| compact(lo))
                    .unwrap_or_default();
                Bar::default()
                    .value(count)
                    .label(Line::from(label))
                    .style(Style::new().fg(color))
            })
            .collect();

        let block = block
            .title(Line::from(format!(" {} ", hist.column).bold()).right_aligned())
            .title_bottom(Line::from(" frequency per bin ").centered());
        let chart = BarChart::default()
            .block(block)
            .bar_width(bar_width)
            .bar_gap(1)
            .data(BarGroup::default().bars(&bars));
        frame.render_widget(chart, area);
    }

    fn draw_heatmap(&self, matrix: &CorrelationMatrix, block: Block, frame: &mut Frame, area: Rect) {
        let name_width = matrix
            .columns
            .iter()
            .map(|c| c.chars().count())
            .max()
            .unwrap_or(0)
            .min(self.max_column_width) as u16
            + 1;
        let mut header = vec![Cell::from("")];
        header.extend(matrix.columns.iter().map(|c| {
            Cell::from(truncate(c, HEATMAP_CELL_WIDTH as usize - 1))
        }));

        let rows = matrix.columns.iter().enumerate().map(|(i, name)| {
            let mut cells = vec![Cell::from(truncate(name, self.max_column_width)).bold()];
            for j in 0..matrix.columns.len() {
                let style = match matrix.get(i, j) {
                    Some(r) => Style::new().fg(Color::Black).bg(coolwarm(r)),
                    None => Style::new().dark_gray(),
                };
                cells.push(Cell::from(format!("{:>6}", matrix.annotation(i, j))).style(style));
            }
            Row::new(cells)
        });

        let mut widths = vec![Constraint::Length(name_width)];
        widths.extend(std::iter::repeat_n(
            Constraint::Length(HEATMAP_CELL_WIDTH),
            matrix.columns.len(),
        ));
        let table = Table::new(rows, widths)
            .header(Row::new(header).style(HEADER_STYLE))
            .column_spacing(0)
            .block(block);
        frame.render_widget(table, area);
    }

    fn draw_box_plot(&self, bp: &BoxPlot, block: Block, frame: &mut Frame, area: Rect) {
        let [plot_area, text_area] = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Min(20), Constraint::Length(28)])
            .areas(area);

        let pad = ((bp.max - bp.min) * 0.05).max(0.5);
        let outliers: Vec<(f64, f64)> = bp.outliers.iter().map(|&v| (0.5, v)).collect();
        let (left, right, color) = (0.3, 0.7, Color::LightBlue);

        let canvas = Canvas::default()
            .block(block.title(Line::from(format!(" {} ", bp.column).bold()).right_aligned()))
            .marker(Marker::Braille)
            .x_bounds([0.0, 1.0])
            .y_bounds([bp.min - pad, bp.max + pad])
            .paint(|ctx| {
                // box
                ctx.draw(&CanvasLine::new(left, bp.q1, right, bp.q1, color));
                ctx.draw(&CanvasLine::new(left, bp.q3, right, bp.q3, color));
                ctx.draw(&CanvasLine::new(left, bp.q1, left, bp.q3, color));
                ctx.draw(&CanvasLine::new(right, bp.q1, right, bp.q3, color));
                ctx.draw(&CanvasLine::new(left, bp.median, right, bp.median, Color::Yellow));
                // whiskers
                ctx.draw(&CanvasLine::new(0.5, bp.q3, 0.5, bp.upper_whisker, Color::White));
                ctx.draw(&CanvasLine::new(0.5, bp.q1, 0.5, bp.lower_whisker, Color::White));
                ctx.draw(&CanvasLine::new(0.4, bp.upper_whisker, 0.6, bp.upper_whisker, Color::White));
                ctx.draw(&CanvasLine::new(0.4, bp.lower_whisker, 0.6, bp.lower_whisker, Color::White));
                if !outliers.is_empty() {
                    ctx.draw(&Points {
                        coords: &outliers,
                        color: Color::Red,
                    });
                }
            });
        frame.render_widget(canvas, plot_area);

        let line = |label: &str, value: f64| {
            Line::from(vec![format!("{label:>9} ").yellow(), Span::from(compact(value))])
        };
        let mut lines = vec![
            line("max", bp.max),
            line("whisker", bp.upper_whisker),
            line("Q3", bp.q3),
            line("median", bp.median),
            line("Q1", bp.q1),
            line("whisker", bp.lower_whisker),
            line("min", bp.min),
            Line::from(""),
            Line::from(format!("{:>9} {}", "outliers", bp.outliers.len())),
        ];
        lines.extend(bp.outliers.iter().take(10).map(|&v| Line::from(format!("{:>9} {}", "", compact(v)).red())));
        frame.render_widget(Paragraph::new(lines).block(Block::bordered()), text_area);
    }

    fn draw_grouped(&self, grouped: &GroupedMeans, block: Block, frame: &mut Frame, area: Rect) {
        let [table_area, chart_area] = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
            .areas(area);

        let header = Row::new([grouped.group_column.clone(), grouped.value_column.clone()])
            .style(HEADER_STYLE);
        let rows = grouped
            .rows
            .iter()
            .map(|r| Row::new([r.label.clone(), fmt_stat(r.mean)]));
        let widths = [
            Constraint::Length(self.max_column_width as u16),
            Constraint::Length(14),
        ];
        frame.render_widget(Table::new(rows, widths).header(header).block(block), table_area);

        // Horizontal bars keep long group labels readable. The bar length is
        // the magnitude of the mean, the printed value keeps its sign.
        let bars: Vec<Bar> = grouped
            .rows
            .iter()
            .map(|r| {
                let mean = r.mean.unwrap_or(0.0);
                Bar::default()
                    .value((mean.abs() * 100.0).round() as u64)
                    .text_value(fmt_stat(r.mean))
                    .label(Line::from(truncate(&r.label, self.max_column_width)))
                    .style(Style::new().green())
            })
            .collect();
        let chart = BarChart::default()
            .block(Block::bordered().title(format!(
                " mean {} by {} ",
                grouped.value_column, grouped.group_column
            )))
            .direction(Direction::Horizontal)
            .bar_width(1)
            .bar_gap(0)
            .data(BarGroup::default().bars(&bars));
        frame.render_widget(chart, chart_area);
    }
}

fn fmt_stat(value: Option<f64>) -> String {
    match value {
        Some(v) => compact(v),
        None => "NaN".to_string(),
    }
}

// Short human readable number for table cells and axis labels.
fn compact(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{value:.0}")
    } else if value.abs() >= 1e6 || (value != 0.0 && value.abs() < 1e-3) {
        format!("{value:.3e}")
    } else {
        format!("{value:.3}")
    }
}

fn truncate(name: &str, width: usize) -> String {
    if name.chars().count() <= width {
        return name.to_string();
    }
    if width < 3 {
        return name.chars().take(width).collect();
    }
    let mut reduced: String = name.chars().take(width - 3).collect();
    reduced.push_str("...");
    reduced
}

// Blue for -1, light gray for 0, red for +1.
fn coolwarm(r: f64) -> Color {
    let lerp = |a: u8, b: u8, t: f64| (a as f64 + (b as f64 - a as f64) * t).round() as u8;
    let (from, to, t) = if r < 0.0 {
        ((221, 221, 221), (59, 76, 192), -r)
    } else {
        ((221, 221, 221), (180, 4, 38), r)
    };
    let t = t.clamp(0.0, 1.0);
    Color::Rgb(lerp(from.0, to.0, t), lerp(from.1, to.1, t), lerp(from.2, to.2, t))
}
