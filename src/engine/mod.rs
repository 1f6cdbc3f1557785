//! The capability interface the styling and interaction core consumes from a
//! map rendering engine, plus the terminal implementation of it.

mod layer;
#[cfg(test)]
pub(crate) mod mock;
mod popup;
mod terminal;

pub use layer::{Anchor, CirclePaint, GeoJsonSource, LayerKind, LayerSpec, SymbolLayout};
pub use popup::{Popup, PopupHandle, PopupId, PopupOptions};
pub use terminal::{CellRect, MapLayers, PopupOverlay, TerminalEngine};

use crate::error::EngineError;
use crate::feature::{Attributes, LngLat};

/// Registration of a click handler
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct HandlerId(pub u64);

/// A feature as returned by an engine hit test
#[derive(Clone, Debug, PartialEq)]
pub struct RenderedFeature {
    pub layer: String,
    /// `None` when the engine could not resolve a point for the feature
    pub geometry: Option<LngLat>,
    pub attributes: Attributes,
}

/// Features of one subscribed layer under a click
#[derive(Clone, Debug, PartialEq)]
pub struct LayerHit {
    pub handler: HandlerId,
    /// Engine order (top-most first)
    pub features: Vec<RenderedFeature>,
}

/// A click on the map surface, outside any popup
#[derive(Clone, Debug, PartialEq)]
pub struct ClickEvent {
    pub point: (i32, i32),
    pub lng_lat: LngLat,
    /// One entry per subscribed layer with at least one feature under the
    /// click
    pub hits: Vec<LayerHit>,
}

impl ClickEvent {
    /// Features delivered to `handler`; empty when its layer was not hit
    pub fn features_for(&self, handler: HandlerId) -> &[RenderedFeature] {
        self.hits
            .iter()
            .find(|hit| hit.handler == handler)
            .map(|hit| hit.features.as_slice())
            .unwrap_or_default()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum EngineEvent {
    /// The base map is ready. Emitted once.
    Load,
    Click(ClickEvent),
    /// The close control of a popup was used
    PopupCloseRequested(PopupId),
}

/// What the core needs from a map engine
pub trait MapEngine {
    fn add_source(&mut self, id: &str, source: GeoJsonSource) -> Result<(), EngineError>;

    fn add_layer(&mut self, layer: LayerSpec) -> Result<(), EngineError>;

    /// Subscribe to clicks on `layer_id`. Subscribing to a layer that does not
    /// exist is allowed; it simply never reports hits.
    fn on_click(&mut self, layer_id: &str) -> HandlerId;

    /// Drop a click subscription. Unknown handlers are ignored.
    fn off(&mut self, handler: HandlerId);

    /// Show a popup (`addTo`)
    fn add_popup(&mut self, popup: Popup) -> PopupHandle;

    fn remove_popup(&mut self, popup: PopupHandle);

    /// Destroy the engine instance and everything it holds
    fn remove(&mut self);
}
