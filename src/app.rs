use roadside_map::config::Args;
use roadside_map::data::{self, stations};
use roadside_map::engine::TerminalEngine;
use roadside_map::map::{BaseMap, Lod, Viewport};
use roadside_map::style::StyleResolver;
use roadside_map::view::{DatasetStatus, MapView};
use tracing::{error, info};

/// Application state
pub struct App {
    pub view: MapView<TerminalEngine>,
    pub should_quit: bool,
    /// Last mouse position for drag tracking
    pub last_mouse: Option<(u16, u16)>,
    /// Where the left button went down, cleared once the mouse drags
    press: Option<(u16, u16)>,
    /// Current mouse position for cursor marker
    pub mouse_pos: Option<(u16, u16)>,
}

/// Build the base map from files, or the built-in outline when none load
pub fn load_basemap(args: &Args) -> BaseMap {
    let mut basemap = BaseMap::new();
    if args.basemap.exists() {
        data::load_basemap(&mut basemap, &args.basemap);
    }
    if !basemap.has_data() {
        info!(dir = %args.basemap.display(), "no base map files, using built-in outline");
        data::generate_japan_outline(&mut basemap);
    }
    basemap
}

/// Map area in braille pixels for a terminal of the given size.
/// Border takes 2 columns; border plus status bar take 3 rows.
fn map_pixels(width: usize, height: usize) -> (usize, usize) {
    (width.saturating_sub(2) * 2, height.saturating_sub(3) * 4)
}

impl App {
    pub fn new(width: usize, height: usize, args: &Args) -> Self {
        let (pixel_width, pixel_height) = map_pixels(width, height);
        let viewport = Viewport::new(args.center.lng, args.center.lat, args.zoom, pixel_width, pixel_height);
        let engine = TerminalEngine::new(viewport, load_basemap(args));

        let location = args.data.clone();
        let view = MapView::new(
            engine,
            StyleResolver::new(args.schema(), &args.unnamed_label),
            args.popup_options(),
            move || stations::spawn_fetch(location.clone()),
        );

        Self {
            view,
            should_quit: false,
            last_mouse: None,
            press: None,
            mouse_pos: None,
        }
    }

    fn viewport(&self) -> &Viewport {
        &self.view.engine().viewport
    }

    fn viewport_mut(&mut self) -> &mut Viewport {
        &mut self.view.engine_mut().viewport
    }

    /// Update viewport size when terminal resizes
    pub fn resize(&mut self, width: usize, height: usize) {
        let (pixel_width, pixel_height) = map_pixels(width, height);
        let viewport = self.viewport_mut();
        viewport.width = pixel_width;
        viewport.height = pixel_height;
    }

    /// Deliver engine events to the view and check on the dataset
    pub fn pump(&mut self) {
        for event in self.view.engine_mut().take_events() {
            self.view.handle_event(event);
        }
        if let Err(e) = self.view.poll() {
            error!(error = %e, "station dataset unavailable");
        }
    }

    /// Release the view before the app goes away
    pub fn teardown(&mut self) {
        self.view.teardown();
    }

    pub fn pan(&mut self, dx: i32, dy: i32) {
        self.viewport_mut().pan(dx, dy);
    }

    pub fn zoom_in(&mut self) {
        self.viewport_mut().zoom_in();
    }

    pub fn zoom_out(&mut self) {
        self.viewport_mut().zoom_out();
    }

    /// Zoom in towards a screen position (terminal column/row)
    pub fn zoom_in_at(&mut self, col: u16, row: u16) {
        let (px, py) = to_pixels(col, row);
        self.viewport_mut().zoom_in_at(px, py);
    }

    /// Zoom out from a screen position (terminal column/row)
    pub fn zoom_out_at(&mut self, col: u16, row: u16) {
        let (px, py) = to_pixels(col, row);
        self.viewport_mut().zoom_out_at(px, py);
    }

    pub fn toggle_borders(&mut self) {
        self.view.engine_mut().toggle_borders();
    }

    pub fn toggle_labels(&mut self) {
        self.view.engine_mut().toggle_labels();
    }

    pub fn quit(&mut self) {
        self.should_quit = true;
    }

    pub fn zoom_level(&self) -> String {
        format!("z{:.1}", self.viewport().zoom)
    }

    pub fn center_coords(&self) -> String {
        let viewport = self.viewport();
        format!(
            "{:.2}°{}, {:.2}°{}",
            viewport.center_lat.abs(),
            if viewport.center_lat >= 0.0 { "N" } else { "S" },
            viewport.center_lon.abs(),
            if viewport.center_lon >= 0.0 { "E" } else { "W" }
        )
    }

    pub fn lod_level(&self) -> &'static str {
        Lod::from_zoom(self.viewport().zoom).label()
    }

    pub fn dataset_status(&self) -> String {
        match self.view.status() {
            DatasetStatus::Waiting | DatasetStatus::Loading => "loading stations…".to_string(),
            DatasetStatus::Ready(n) => format!("{n} stations"),
            DatasetStatus::Failed(reason) => format!("stations unavailable: {reason}"),
            DatasetStatus::TornDown => "closed".to_string(),
        }
    }

    /// Left button down: may become a click or a drag
    pub fn press(&mut self, col: u16, row: u16) {
        self.press = Some((col, row));
        self.last_mouse = Some((col, row));
    }

    /// Handle mouse drag
    pub fn handle_drag(&mut self, x: u16, y: u16) {
        if let Some((last_x, last_y)) = self.last_mouse {
            if (last_x, last_y) != (x, y) {
                self.press = None;
            }
            let dx = last_x as i32 - x as i32;
            let dy = last_y as i32 - y as i32;
            // Cells are 2x4 pixels
            self.pan(dx * 2, dy * 4);
        }
        self.last_mouse = Some((x, y));
    }

    /// Left button up: a press without drag is a click on the map
    pub fn release(&mut self, col: u16, row: u16) {
        if self.press.take() == Some((col, row)) {
            if let Some((map_col, map_row)) = self.map_cell(col, row) {
                self.view.engine_mut().click(map_col, map_row);
            }
        }
        self.last_mouse = None;
    }

    /// Terminal position to map cell, `None` on the border or status bar
    fn map_cell(&self, col: u16, row: u16) -> Option<(u16, u16)> {
        let viewport = self.viewport();
        let (cols, rows) = ((viewport.width / 2) as u16, (viewport.height / 4) as u16);
        let (map_col, map_row) = (col.checked_sub(1)?, row.checked_sub(1)?);
        (map_col < cols && map_row < rows).then_some((map_col, map_row))
    }

    pub fn set_mouse_pos(&mut self, col: u16, row: u16) {
        self.mouse_pos = Some((col, row));
    }
}

/// Terminal position to braille pixels, accounting for the 1-cell border
fn to_pixels(col: u16, row: u16) -> (i32, i32) {
    ((col.saturating_sub(1)) as i32 * 2, (row.saturating_sub(1)) as i32 * 4)
}
