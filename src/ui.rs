use crate::app::App;
use roadside_map::braille::BrailleCanvas;
use roadside_map::engine::{MapLayers, PopupOverlay};
use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Widget},
    Frame,
};

const ATTRIBUTION: &str = "© Natural Earth | 国土数値情報(道の駅)";

/// Render the UI
pub fn render(frame: &mut Frame, app: &App) {
    let area = frame.area();

    // Split into map area and status bar
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(3),    // Map
            Constraint::Length(1), // Status bar
        ])
        .split(area);

    render_map(frame, app, chunks[0]);
    render_status_bar(frame, app, chunks[1]);
}

fn render_map(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(Span::styled(
            " 道の駅 Roadside Stations ",
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ))
        .title_bottom(Line::from(Span::styled(ATTRIBUTION, Style::default().fg(Color::DarkGray))).right_aligned());

    let inner = block.inner(area);
    frame.render_widget(block, area);

    // Cursor marker, relative to the map area
    let cursor_pos = app.mouse_pos.and_then(|(col, row)| {
        let (cx, cy) = (col.checked_sub(1)?, row.checked_sub(1)?);
        (cx < inner.width && cy < inner.height).then_some((cx, cy))
    });

    let map_widget = MapWidget {
        layers: app.view.engine().render(),
        cursor_pos,
    };
    frame.render_widget(map_widget, inner);
}

/// Braille map layers with labels and popups overlaid
struct MapWidget {
    layers: MapLayers,
    cursor_pos: Option<(u16, u16)>,
}

impl MapWidget {
    /// Render a braille canvas layer with a specific color
    fn render_layer(canvas: &BrailleCanvas, color: Color, area: Rect, buf: &mut Buffer) {
        let rows = canvas.height().min(area.height as usize);
        let cols = canvas.width().min(area.width as usize);
        for row in 0..rows {
            for col in 0..cols {
                if let Some(ch) = canvas.glyph(col, row) {
                    buf[(area.x + col as u16, area.y + row as u16)].set_char(ch).set_fg(color);
                }
            }
        }
    }

    fn render_popup(popup: &PopupOverlay, area: Rect, buf: &mut Buffer) {
        let rect = Rect::new(area.x + popup.rect.x, area.y + popup.rect.y, popup.rect.width, popup.rect.height)
            .intersection(area);
        if rect.is_empty() {
            return;
        }

        Clear.render(rect, buf);
        Paragraph::new(popup.text.as_str())
            .style(Style::default().fg(Color::White))
            .block(Block::bordered().border_style(Style::default().fg(Color::Gray)))
            .render(rect, buf);

        if let Some((col, row)) = popup.close_cell() {
            let (x, y) = (area.x + col, area.y + row);
            if rect.contains((x, y).into()) {
                buf[(x, y)].set_char('×').set_fg(Color::Gray);
            }
        }
    }
}

impl Widget for MapWidget {
    fn render(self, area: Rect, buf: &mut Buffer) {
        // Back to front: base map, markers, labels, popups
        Self::render_layer(&self.layers.coastlines, Color::Cyan, area, buf);
        Self::render_layer(&self.layers.borders, Color::DarkGray, area, buf);
        for (color, canvas) in &self.layers.points {
            Self::render_layer(canvas, (*color).into(), area, buf);
        }

        let label_style = Style::default().fg(Color::White);
        for (lx, ly, text) in &self.layers.labels {
            if *lx >= area.width || *ly >= area.height {
                continue;
            }
            let max_width = area.width - *lx;
            buf.set_stringn(area.x + *lx, area.y + *ly, text, max_width as usize, label_style);
        }

        for popup in &self.layers.popups {
            Self::render_popup(popup, area, buf);
        }

        if let Some((cx, cy)) = self.cursor_pos {
            buf[(area.x + cx, area.y + cy)].set_char('╋').set_fg(Color::Red);
        }
    }
}

fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let settings = &app.view.engine().settings;
    let toggle = |on: bool, on_text: &'static str, off_text: &'static str| {
        Span::styled(
            if on { on_text } else { off_text },
            Style::default().fg(if on { Color::Green } else { Color::DarkGray }),
        )
    };

    let status = Line::from(vec![
        Span::styled(" Zoom: ", Style::default().fg(Color::DarkGray)),
        Span::styled(app.zoom_level(), Style::default().fg(Color::Yellow)),
        Span::styled(" (", Style::default().fg(Color::DarkGray)),
        Span::styled(app.lod_level(), Style::default().fg(Color::Magenta)),
        Span::styled(") ", Style::default().fg(Color::DarkGray)),
        Span::styled(app.dataset_status(), Style::default().fg(Color::Yellow)),
        Span::styled(" | ", Style::default().fg(Color::DarkGray)),
        toggle(settings.show_borders, "[B]order ", "[b]order "),
        toggle(settings.show_labels, "[L]abels ", "[l]abels "),
        Span::styled("| ", Style::default().fg(Color::DarkGray)),
        Span::styled(app.center_coords(), Style::default().fg(Color::Cyan)),
        Span::styled(
            " | hjkl:pan +/-:zoom click:info r:reset q:quit",
            Style::default().fg(Color::DarkGray),
        ),
    ]);

    frame.render_widget(Paragraph::new(status), area);
}
