use super::{
    Anchor, ClickEvent, EngineEvent, GeoJsonSource, HandlerId, LayerHit, LayerKind, LayerSpec, MapEngine, Popup,
    PopupHandle, PopupId, RenderedFeature,
};
use crate::braille::BrailleCanvas;
use crate::error::EngineError;
use crate::feature::{Feature, LngLat};
use crate::map::{draw_circle, BaseMap, Viewport};
use crate::style::{EvalContext, Expression, Rgb, BLUE};
use glam::IVec2;
use ratatui::text::Span;
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::{debug, info, warn};

/// Circles smaller than this are not drawn and cannot be clicked
const MIN_DRAWN_RADIUS: f64 = 0.5;

/// A rectangle of terminal cells relative to the map area
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CellRect {
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
}

impl CellRect {
    pub fn contains(&self, col: u16, row: u16) -> bool {
        col >= self.x && col < self.x + self.width && row >= self.y && row < self.y + self.height
    }
}

/// A popup positioned for drawing
#[derive(Clone, Debug, PartialEq)]
pub struct PopupOverlay {
    pub id: PopupId,
    pub rect: CellRect,
    pub text: String,
    pub close_button: bool,
}

impl PopupOverlay {
    /// Cell of the close control, on the top border
    pub fn close_cell(&self) -> Option<(u16, u16)> {
        self.close_button
            .then(|| (self.rect.x + self.rect.width.saturating_sub(2), self.rect.y))
    }
}

/// Everything needed to draw one frame, back to front
pub struct MapLayers {
    pub coastlines: BrailleCanvas,
    pub borders: BrailleCanvas,
    /// One canvas per marker color, in first-drawn order
    pub points: Vec<(Rgb, BrailleCanvas)>,
    /// (column, row, text)
    pub labels: Vec<(u16, u16, String)>,
    pub popups: Vec<PopupOverlay>,
}

/// Display settings for map layers
#[derive(Clone, Debug)]
pub struct DisplaySettings {
    pub show_coastlines: bool,
    pub show_borders: bool,
    pub show_labels: bool,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            show_coastlines: true,
            show_borders: true,
            show_labels: true,
        }
    }
}

struct LivePopup {
    id: PopupId,
    popup: Popup,
}

/// Map engine drawing onto a Braille canvas
pub struct TerminalEngine {
    pub viewport: Viewport,
    pub settings: DisplaySettings,
    basemap: BaseMap,
    sources: HashMap<String, Vec<Feature>>,
    layers: Vec<LayerSpec>,
    handlers: Vec<(HandlerId, String)>,
    popups: Vec<LivePopup>,
    events: VecDeque<EngineEvent>,
    next_id: u64,
    removed: bool,
}

impl TerminalEngine {
    /// The base map is ready immediately, so `Load` is queued right away
    pub fn new(viewport: Viewport, basemap: BaseMap) -> Self {
        Self {
            viewport,
            settings: DisplaySettings::default(),
            basemap,
            sources: HashMap::new(),
            layers: Vec::new(),
            handlers: Vec::new(),
            popups: Vec::new(),
            events: VecDeque::from([EngineEvent::Load]),
            next_id: 0,
            removed: false,
        }
    }

    /// Drain events produced since the last call
    pub fn take_events(&mut self) -> Vec<EngineEvent> {
        self.events.drain(..).collect()
    }

    pub fn is_removed(&self) -> bool {
        self.removed
    }

    pub fn has_layer(&self, id: &str) -> bool {
        self.layers.iter().any(|l| l.id == id)
    }

    pub fn popup_count(&self) -> usize {
        self.popups.len()
    }

    pub fn toggle_labels(&mut self) {
        self.settings.show_labels = !self.settings.show_labels;
    }

    pub fn toggle_borders(&mut self) {
        self.settings.show_borders = !self.settings.show_borders;
    }

    /// Map area size in terminal cells
    fn cells(&self) -> (u16, u16) {
        ((self.viewport.width / 2) as u16, (self.viewport.height / 4) as u16)
    }

    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    /// Map cell under a coordinate, `None` when it falls outside the map area
    fn screen_cell(&self, lng_lat: LngLat) -> Option<(u16, u16)> {
        let (px, py) = self.viewport.project(lng_lat.lng, lng_lat.lat);
        if px < 0 || py < 0 || px >= self.viewport.width as i32 || py >= self.viewport.height as i32 {
            return None;
        }
        Some((u16::try_from(px / 2).ok()?, u16::try_from(py / 4).ok()?))
    }

    /// Projected center and drawn radius of a circle marker. `None` when the
    /// marker is too small to draw or lies entirely outside the map area.
    /// Drawing and hit testing both go through here.
    fn marker(&self, radius: &Expression, feature: &Feature) -> Option<(IVec2, i32)> {
        let radius = evaluate_number(radius, self.viewport.zoom, feature);
        if radius < MIN_DRAWN_RADIUS {
            return None;
        }
        let r = radius.round() as i32;
        let (px, py) = self.viewport.project(feature.geometry.lng, feature.geometry.lat);
        let (width, height) = (self.viewport.width as i32, self.viewport.height as i32);
        if px.saturating_add(r) < 0
            || px.saturating_sub(r) >= width
            || py.saturating_add(r) < 0
            || py.saturating_sub(r) >= height
        {
            return None;
        }
        Some((IVec2::new(px, py), r))
    }

    /// Route a click on map cell (col, row). Clicks on a popup stay with the
    /// popup; everything else becomes a `Click` event carrying per-handler hits.
    pub fn click(&mut self, col: u16, row: u16) {
        if self.removed {
            return;
        }

        if let Some(overlay) = self.popup_overlays().into_iter().rev().find(|o| o.rect.contains(col, row)) {
            if overlay.close_cell() == Some((col, row)) {
                self.events.push_back(EngineEvent::PopupCloseRequested(overlay.id));
            }
            return;
        }

        let px = col as i32 * 2 + 1;
        let py = row as i32 * 4 + 2;
        let (lng, lat) = self.viewport.unproject(px, py);

        let hits: Vec<LayerHit> = self
            .handlers
            .iter()
            .filter_map(|(handler, layer_id)| {
                let features = self.query_cell(layer_id, col, row);
                (!features.is_empty()).then(|| LayerHit {
                    handler: *handler,
                    features,
                })
            })
            .collect();

        debug!(col, row, hits = hits.len(), "map click");
        self.events.push_back(EngineEvent::Click(ClickEvent {
            point: (px, py),
            lng_lat: LngLat::new(lng, lat),
            hits,
        }));
    }

    /// Features of a circle layer whose drawn marker overlaps the cell,
    /// top-most (last drawn) first
    pub fn query_cell(&self, layer_id: &str, col: u16, row: u16) -> Vec<RenderedFeature> {
        let Some(layer) = self.layers.iter().find(|l| l.id == layer_id) else {
            return Vec::new();
        };
        let LayerKind::Circle(paint) = &layer.kind else {
            return Vec::new();
        };
        let Some(features) = self.sources.get(&layer.source) else {
            return Vec::new();
        };

        let cell_min = IVec2::new(col as i32 * 2, row as i32 * 4);
        let cell_max = cell_min + IVec2::new(1, 3);

        features
            .iter()
            .rev()
            .filter(|feature| {
                let Some((center, radius)) = self.marker(&paint.radius, feature) else {
                    return false;
                };
                // Nearest dot of the cell lies inside the disc exactly when
                // draw_circle sets a dot in this cell
                (center.clamp(cell_min, cell_max) - center).length_squared() <= radius * radius
            })
            .map(|feature| RenderedFeature {
                layer: layer.id.clone(),
                geometry: Some(feature.geometry),
                attributes: feature.attributes.clone(),
            })
            .collect()
    }

    /// Render all layers for the current viewport
    pub fn render(&self) -> MapLayers {
        let (cols, rows) = self.cells();
        let (cols_usize, rows_usize) = (cols as usize, rows as usize);
        let mut layers = MapLayers {
            coastlines: BrailleCanvas::new(cols_usize, rows_usize),
            borders: BrailleCanvas::new(cols_usize, rows_usize),
            points: Vec::new(),
            labels: Vec::new(),
            popups: Vec::new(),
        };

        if self.removed {
            return layers;
        }

        if self.settings.show_coastlines {
            self.basemap.draw_coastlines(&mut layers.coastlines, &self.viewport);
        }
        if self.settings.show_borders {
            self.basemap.draw_borders(&mut layers.borders, &self.viewport);
        }

        let mut occupied = HashSet::new();
        for layer in &self.layers {
            let Some(features) = self.sources.get(&layer.source) else {
                continue;
            };
            match &layer.kind {
                LayerKind::Circle(paint) => {
                    for feature in features {
                        let Some((center, radius)) = self.marker(&paint.radius, feature) else {
                            continue;
                        };
                        let color = paint
                            .color
                            .evaluate(&EvalContext::new(self.viewport.zoom, &feature.attributes))
                            .as_color()
                            .unwrap_or(BLUE);
                        let idx = match layers.points.iter().position(|(c, _)| *c == color) {
                            Some(idx) => idx,
                            None => {
                                layers.points.push((color, BrailleCanvas::new(cols_usize, rows_usize)));
                                layers.points.len() - 1
                            }
                        };
                        draw_circle(&mut layers.points[idx].1, center.x, center.y, radius);
                    }
                }
                LayerKind::Symbol(layout) if self.settings.show_labels => {
                    for feature in features {
                        let text = layout
                            .text_field
                            .evaluate(&EvalContext::new(self.viewport.zoom, &feature.attributes))
                            .into_text()
                            .unwrap_or_default();
                        if text.is_empty() {
                            continue;
                        }
                        let Some(point) = self.screen_cell(feature.geometry) else {
                            continue;
                        };
                        let offset = layout.radial_offset.ceil().max(1.0) as u16;
                        if let Some((x, y)) =
                            place_label(&text, point, &layout.variable_anchor, offset, (cols, rows), &mut occupied)
                        {
                            layers.labels.push((x, y, text));
                        }
                    }
                }
                LayerKind::Symbol(_) => {}
            }
        }

        layers.popups = self.popup_overlays();
        layers
    }

    /// Place every live popup above its anchor, or below when there is no
    /// room above
    fn popup_overlays(&self) -> Vec<PopupOverlay> {
        let (cols, rows) = self.cells();
        self.popups
            .iter()
            .filter_map(|live| {
                let (cx, cy) = self.screen_cell(live.popup.lng_lat()?)?;
                let text = live.popup.html().to_string();
                let close_button = live.popup.options().close_button;

                let text_width = Span::raw(text.as_str()).width() as u16;
                let width = (text_width + if close_button { 4 } else { 2 }).min(cols.max(1));
                let height = 3u16;

                let x = cx.saturating_sub(width / 2).min(cols.saturating_sub(width));
                let y = if cy >= height + 1 { cy - height - 1 } else { (cy + 1).min(rows.saturating_sub(height)) };

                Some(PopupOverlay {
                    id: live.id,
                    rect: CellRect { x, y, width, height },
                    text,
                    close_button,
                })
            })
            .collect()
    }
}

fn evaluate_number(expr: &Expression, zoom: f64, feature: &Feature) -> f64 {
    expr.evaluate(&EvalContext::new(zoom, &feature.attributes))
        .as_number()
        .unwrap_or(0.0)
}

/// Try each anchor in turn; return the top-left cell of the first placement
/// that stays inside the map and overlaps no earlier label
fn place_label(
    text: &str,
    (cx, cy): (u16, u16),
    anchors: &[Anchor],
    offset: u16,
    (cols, rows): (u16, u16),
    occupied: &mut HashSet<(u16, u16)>,
) -> Option<(u16, u16)> {
    let width = Span::raw(text).width() as i32;
    let (cx, cy, offset) = (cx as i32, cy as i32, offset as i32);

    for anchor in anchors {
        // The anchor names the side of the label that touches the point
        let (x, y) = match anchor {
            Anchor::Top => (cx - width / 2, cy + offset),
            Anchor::Bottom => (cx - width / 2, cy - offset),
            Anchor::Left => (cx + offset + 1, cy),
            Anchor::Right => (cx - offset - width, cy),
        };
        if x < 0 || y < 0 || x + width > cols as i32 || y >= rows as i32 {
            continue;
        }
        let cells: Vec<(u16, u16)> = (x..x + width).map(|col| (col as u16, y as u16)).collect();
        if cells.iter().any(|c| occupied.contains(c)) {
            continue;
        }
        occupied.extend(cells);
        return Some((x as u16, y as u16));
    }
    None
}

impl MapEngine for TerminalEngine {
    fn add_source(&mut self, id: &str, source: GeoJsonSource) -> Result<(), EngineError> {
        if self.removed {
            return Err(EngineError::Removed);
        }
        if self.sources.contains_key(id) {
            return Err(EngineError::DuplicateSource(id.to_string()));
        }

        let total = source.data.features.len();
        let features: Vec<Feature> = source.data.features.iter().filter_map(Feature::from_geojson).collect();
        if features.len() < total {
            warn!(source = id, skipped = total - features.len(), "skipped features without point geometry");
        }
        info!(source = id, features = features.len(), "source added");
        self.sources.insert(id.to_string(), features);
        Ok(())
    }

    fn add_layer(&mut self, layer: LayerSpec) -> Result<(), EngineError> {
        if self.removed {
            return Err(EngineError::Removed);
        }
        if self.has_layer(&layer.id) {
            return Err(EngineError::DuplicateLayer(layer.id));
        }
        if !self.sources.contains_key(&layer.source) {
            return Err(EngineError::UnknownSource(layer.source));
        }
        debug!(layer = %layer.id, "layer added");
        self.layers.push(layer);
        Ok(())
    }

    fn on_click(&mut self, layer_id: &str) -> HandlerId {
        let id = HandlerId(self.next_id());
        if !self.removed {
            self.handlers.push((id, layer_id.to_string()));
        }
        id
    }

    fn off(&mut self, handler: HandlerId) {
        self.handlers.retain(|(id, _)| *id != handler);
    }

    fn add_popup(&mut self, popup: Popup) -> PopupHandle {
        let id = PopupId(self.next_id());
        if !self.removed {
            self.popups.push(LivePopup { id, popup });
        }
        PopupHandle::new(id)
    }

    fn remove_popup(&mut self, popup: PopupHandle) {
        self.popups.retain(|live| live.id != popup.id());
    }

    fn remove(&mut self) {
        info!("map engine removed");
        self.removed = true;
        self.popups.clear();
        self.handlers.clear();
        self.layers.clear();
        self.sources.clear();
        self.events.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::PopupOptions;
    use crate::style::{StyleResolver, ORANGE, RED};
    use geojson::FeatureCollection;

    fn collection(json: &str) -> FeatureCollection {
        json.parse().unwrap()
    }

    fn stations() -> FeatureCollection {
        collection(
            r#"{"type": "FeatureCollection", "features": [
                {"type": "Feature", "geometry": {"type": "Point", "coordinates": [0.0, 0.0]},
                 "properties": {"P35_006": "West", "P35_016": 1}},
                {"type": "Feature", "geometry": {"type": "Point", "coordinates": [0.0, 0.0]},
                 "properties": {"P35_006": "East", "P35_014": 1}},
                {"type": "Feature", "geometry": {"type": "LineString", "coordinates": [[0, 0], [1, 1]]},
                 "properties": {}}
            ]}"#,
        )
    }

    /// 40x20 cell map centered on (0, 0)
    fn engine(zoom: f64) -> TerminalEngine {
        let mut engine = TerminalEngine::new(Viewport::new(0.0, 0.0, zoom, 80, 80), BaseMap::new());
        let resolver = StyleResolver::default();
        engine.add_source("s", GeoJsonSource::new(stations())).unwrap();
        engine.add_layer(resolver.circle_layer("points", "s")).unwrap();
        engine.add_layer(resolver.label_layer("labels", "s")).unwrap();
        engine
    }

    /// Map of one named red station at (lng, 0)
    fn lone_station(lng: f64, zoom: f64) -> TerminalEngine {
        let json = format!(
            r#"{{"type": "FeatureCollection", "features": [
                {{"type": "Feature", "geometry": {{"type": "Point", "coordinates": [{lng}, 0.0]}},
                 "properties": {{"P35_006": "Lone", "P35_016": 1}}}}
            ]}}"#
        );
        let mut engine = TerminalEngine::new(Viewport::new(0.0, 0.0, zoom, 80, 80), BaseMap::new());
        let resolver = StyleResolver::default();
        engine.add_source("s", GeoJsonSource::new(collection(&json))).unwrap();
        engine.add_layer(resolver.circle_layer("points", "s")).unwrap();
        engine.add_layer(resolver.label_layer("labels", "s")).unwrap();
        engine
    }

    #[test]
    fn test_load_is_emitted_once() {
        let mut engine = TerminalEngine::new(Viewport::new(0.0, 0.0, 1.0, 10, 10), BaseMap::new());
        assert_eq!(engine.take_events(), vec![EngineEvent::Load]);
        assert!(engine.take_events().is_empty());
    }

    #[test]
    fn test_layer_requires_source() {
        let mut engine = TerminalEngine::new(Viewport::new(0.0, 0.0, 1.0, 10, 10), BaseMap::new());
        let layer = StyleResolver::default().circle_layer("points", "missing");
        assert_eq!(engine.add_layer(layer), Err(EngineError::UnknownSource("missing".into())));
    }

    #[test]
    fn test_duplicate_source_rejected() {
        let mut engine = engine(10.0);
        assert_eq!(
            engine.add_source("s", GeoJsonSource::new(stations())),
            Err(EngineError::DuplicateSource("s".into()))
        );
    }

    #[test]
    fn test_points_drawn_per_color() {
        let layers = engine(10.0).render();
        let colors: Vec<Rgb> = layers.points.iter().map(|(c, _)| *c).collect();
        assert_eq!(colors, vec![RED, ORANGE]);
        assert!(!colors.contains(&BLUE));
    }

    #[test]
    fn test_tiny_markers_not_drawn() {
        let layers = engine(1.0).render();
        assert!(layers.points.is_empty());
    }

    #[test]
    fn test_hits_are_top_most_first() {
        let mut engine = engine(10.0);
        let handler = engine.on_click("points");
        engine.take_events();
        engine.click(20, 10);

        let events = engine.take_events();
        let [EngineEvent::Click(click)] = events.as_slice() else {
            panic!("expected one click, got {events:?}");
        };
        let names: Vec<String> = click
            .features_for(handler)
            .iter()
            .filter_map(|f| f.attributes.text("P35_006").map(|s| s.into_owned()))
            .collect();
        assert_eq!(names, vec!["East", "West"]);
    }

    #[test]
    fn test_click_far_away_has_no_hits() {
        let mut engine = engine(10.0);
        engine.on_click("points");
        engine.take_events();
        engine.click(0, 0);
        let events = engine.take_events();
        assert!(matches!(events.as_slice(), [EngineEvent::Click(c)] if c.hits.is_empty()));
    }

    #[test]
    fn test_click_on_unknown_layer_is_harmless() {
        let mut engine = engine(10.0);
        let handler = engine.on_click("nope");
        engine.take_events();
        engine.click(20, 10);
        let events = engine.take_events();
        let [EngineEvent::Click(click)] = events.as_slice() else {
            panic!("expected one click");
        };
        assert!(click.features_for(handler).is_empty());
    }

    #[test]
    fn test_popup_swallows_clicks_and_close_control() {
        let mut engine = engine(10.0);
        engine.take_events();
        let options = PopupOptions {
            close_button: true,
            close_on_click: true,
        };
        let handle = engine.add_popup(Popup::new(options).set_lng_lat(LngLat::new(0.0, 0.0)).set_html("West"));
        let overlay = engine.render().popups.remove(0);
        assert_eq!(overlay.rect.height, 3);
        assert!(overlay.rect.y + overlay.rect.height <= 10, "popup sits above the anchor");

        engine.click(overlay.rect.x, overlay.rect.y + 1);
        assert!(engine.take_events().is_empty());

        let (col, row) = overlay.close_cell().unwrap();
        engine.click(col, row);
        assert_eq!(engine.take_events(), vec![EngineEvent::PopupCloseRequested(handle.id())]);

        engine.remove_popup(handle);
        assert_eq!(engine.popup_count(), 0);
    }

    #[test]
    fn test_far_off_screen_station_has_no_label_or_popup() {
        // About 131k px east at z14, past the u16 range of cell columns
        let mut engine = lone_station(11.248, 14.0);
        engine.on_click("points");
        engine.take_events();
        engine.add_popup(Popup::new(PopupOptions::default()).set_lng_lat(LngLat::new(11.248, 0.0)).set_html("Lone"));

        let layers = engine.render();
        assert!(layers.points.is_empty());
        assert!(layers.labels.is_empty());
        assert!(layers.popups.is_empty());

        // Off-screen popups do not swallow clicks either
        engine.click(8, 10);
        let events = engine.take_events();
        assert!(matches!(events.as_slice(), [EngineEvent::Click(c)] if c.hits.is_empty()));
    }

    #[test]
    fn test_marker_past_left_edge_is_drawn_and_clickable() {
        // Center about 15 px left of the map, radius 30 at z20
        let mut engine = lone_station(-0.0000737, 20.0);
        let handler = engine.on_click("points");
        engine.take_events();

        let layers = engine.render();
        assert_eq!(layers.points.len(), 1);
        let canvas = &layers.points[0].1;

        for (col, drawn) in [(0, true), (8, true), (9, false)] {
            assert_eq!(canvas.glyph(col, 10).is_some(), drawn, "glyph at column {col}");
            engine.click(col as u16, 10);
            let events = engine.take_events();
            let [EngineEvent::Click(click)] = events.as_slice() else {
                panic!("expected one click, got {events:?}");
            };
            assert_eq!(!click.features_for(handler).is_empty(), drawn, "hit at column {col}");
        }
    }

    #[test]
    fn test_each_popup_gets_its_own_handle() {
        let mut engine = engine(10.0);
        let popup = || Popup::new(PopupOptions::default()).set_lng_lat(LngLat::new(0.0, 0.0)).set_html("West");
        let first = engine.add_popup(popup());
        let second = engine.add_popup(popup());
        assert_ne!(first.id(), second.id());

        let kept = second.id();
        engine.remove_popup(first);
        assert_eq!(engine.popup_count(), 1);
        assert_eq!(engine.render().popups[0].id, kept);
    }

    #[test]
    fn test_labels_avoid_each_other() {
        let layers = engine(10.0).render();
        assert_eq!(layers.labels.len(), 2);
        let (a, b) = (&layers.labels[0], &layers.labels[1]);
        assert!(a.1 != b.1 || a.0 + a.2.len() as u16 <= b.0 || b.0 + b.2.len() as u16 <= a.0);
    }

    #[test]
    fn test_labels_toggle() {
        let mut engine = engine(10.0);
        engine.toggle_labels();
        assert!(engine.render().labels.is_empty());
    }

    #[test]
    fn test_remove_clears_everything() {
        let mut engine = engine(10.0);
        engine.on_click("points");
        engine.remove();
        assert!(engine.is_removed());
        assert!(!engine.has_layer("points"));
        engine.click(20, 10);
        assert!(engine.take_events().is_empty());
        assert_eq!(engine.add_source("t", GeoJsonSource::new(stations())), Err(EngineError::Removed));
    }
}
