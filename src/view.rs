//! Lifecycle of the station map: wait for the engine, fetch the dataset,
//! install the station layers and route clicks to the popup controller.

use crate::data::stations::PendingDataset;
use crate::engine::{EngineEvent, GeoJsonSource, HandlerId, MapEngine, PopupOptions};
use crate::error::{EngineError, ViewError};
use crate::interaction::{InteractionController, Showing, Transition};
use crate::style::StyleResolver;
use geojson::FeatureCollection;
use tracing::{debug, info};

pub const SOURCE_ID: &str = "station-points";
pub const CIRCLE_LAYER_ID: &str = "station-points";
pub const LABEL_LAYER_ID: &str = "station-points-text";

enum Phase {
    AwaitingLoad,
    Fetching(PendingDataset),
    Ready { click: HandlerId, stations: usize },
    Failed(String),
    TornDown,
}

/// Dataset state as shown to the user
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DatasetStatus {
    Waiting,
    Loading,
    Ready(usize),
    Failed(String),
    TornDown,
}

pub struct MapView<E: MapEngine> {
    engine: E,
    phase: Phase,
    fetch: Box<dyn FnMut() -> PendingDataset>,
    resolver: StyleResolver,
    interaction: InteractionController,
}

impl<E: MapEngine> MapView<E> {
    /// `fetch` starts the dataset retrieval; it is called once, on the
    /// engine's first `Load`
    pub fn new(
        engine: E,
        resolver: StyleResolver,
        options: PopupOptions,
        fetch: impl FnMut() -> PendingDataset + 'static,
    ) -> Self {
        Self {
            engine,
            phase: Phase::AwaitingLoad,
            fetch: Box::new(fetch),
            resolver,
            interaction: InteractionController::new(options),
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn resolver(&self) -> &StyleResolver {
        &self.resolver
    }

    pub fn showing(&self) -> Option<&Showing> {
        self.interaction.showing()
    }

    pub fn status(&self) -> DatasetStatus {
        match &self.phase {
            Phase::AwaitingLoad => DatasetStatus::Waiting,
            Phase::Fetching(_) => DatasetStatus::Loading,
            Phase::Ready { stations, .. } => DatasetStatus::Ready(*stations),
            Phase::Failed(reason) => DatasetStatus::Failed(reason.clone()),
            Phase::TornDown => DatasetStatus::TornDown,
        }
    }

    /// Feed one engine event. Returns the popup transition for clicks and
    /// close requests.
    pub fn handle_event(&mut self, event: EngineEvent) -> Option<Transition> {
        match event {
            EngineEvent::Load => {
                if matches!(self.phase, Phase::AwaitingLoad) {
                    info!("map loaded, fetching stations");
                    self.phase = Phase::Fetching((self.fetch)());
                }
                None
            }
            EngineEvent::Click(click) => {
                let Phase::Ready { click: handler, .. } = &self.phase else {
                    return None;
                };
                let hits = click.features_for(*handler);
                Some(self.interaction.handle_click(&mut self.engine, &self.resolver, hits))
            }
            EngineEvent::PopupCloseRequested(id) => {
                if matches!(self.phase, Phase::TornDown) {
                    return None;
                }
                Some(self.interaction.close_requested(&mut self.engine, id))
            }
        }
    }

    /// Check on the dataset fetch and install the station layers once it
    /// arrives. A failure leaves the base map usable.
    pub fn poll(&mut self) -> Result<(), ViewError> {
        let Phase::Fetching(pending) = &self.phase else {
            return Ok(());
        };
        let Some(result) = pending.try_take() else {
            return Ok(());
        };

        let outcome = match result {
            Ok(data) => self.install(data).map_err(ViewError::from),
            Err(e) => Err(e.into()),
        };
        if let Err(e) = &outcome {
            self.phase = Phase::Failed(e.to_string());
        }
        outcome
    }

    /// Source first, then layers, then the click subscription
    fn install(&mut self, data: FeatureCollection) -> Result<(), EngineError> {
        let stations = data.features.len();
        self.engine.add_source(SOURCE_ID, GeoJsonSource::new(data))?;
        self.engine.add_layer(self.resolver.circle_layer(CIRCLE_LAYER_ID, SOURCE_ID))?;
        self.engine.add_layer(self.resolver.label_layer(LABEL_LAYER_ID, SOURCE_ID))?;
        let click = self.engine.on_click(CIRCLE_LAYER_ID);

        info!(stations, "station layers installed");
        self.phase = Phase::Ready { click, stations };
        Ok(())
    }

    /// Release the popup, the click subscription and the engine, in that
    /// order. An in-flight fetch is abandoned. Safe to call more than once.
    pub fn teardown(&mut self) {
        if matches!(self.phase, Phase::TornDown) {
            return;
        }
        self.interaction.teardown(&mut self.engine);
        if let Phase::Ready { click, .. } = &self.phase {
            self.engine.off(*click);
        }
        self.engine.remove();
        self.phase = Phase::TornDown;
        debug!("map view torn down");
    }
}

impl<E: MapEngine> Drop for MapView<E> {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::stations::FetchResult;
    use crate::engine::mock::{Call, RecordingEngine};
    use crate::engine::{ClickEvent, LayerHit, RenderedFeature};
    use crate::error::FetchError;
    use crate::feature::{attrs, LngLat};
    use serde_json::json;
    use std::cell::Cell;
    use std::rc::Rc;
    use std::sync::mpsc::Sender;

    fn collection() -> FeatureCollection {
        r#"{"type": "FeatureCollection", "features": [
            {"type": "Feature", "geometry": {"type": "Point", "coordinates": [138.0, 35.9]},
             "properties": {"P35_006": "A"}},
            {"type": "Feature", "geometry": {"type": "Point", "coordinates": [139.0, 36.0]},
             "properties": {"P35_006": "B"}}
        ]}"#
        .parse()
        .unwrap()
    }

    /// A view whose fetch is fed through the returned sender
    fn view(engine: RecordingEngine) -> (MapView<RecordingEngine>, Sender<FetchResult>, Rc<Cell<usize>>) {
        let (tx, pending) = PendingDataset::channel();
        let mut pending = Some(pending);
        let fetches = Rc::new(Cell::new(0));
        let counter = fetches.clone();
        let view = MapView::new(engine, StyleResolver::default(), PopupOptions::default(), move || {
            counter.set(counter.get() + 1);
            pending.take().unwrap_or_else(|| PendingDataset::channel().1)
        });
        (view, tx, fetches)
    }

    fn ready_view(engine: RecordingEngine) -> (MapView<RecordingEngine>, HandlerId) {
        let (mut view, tx, _) = view(engine);
        view.handle_event(EngineEvent::Load);
        tx.send(Ok(collection())).unwrap();
        view.poll().unwrap();
        let Phase::Ready { click, .. } = &view.phase else {
            panic!("view not ready");
        };
        let click = *click;
        (view, click)
    }

    fn click_on(handler: HandlerId, names: &[(&str, f64, f64)]) -> EngineEvent {
        let features: Vec<RenderedFeature> = names
            .iter()
            .map(|(name, lng, lat)| RenderedFeature {
                layer: CIRCLE_LAYER_ID.into(),
                geometry: Some(LngLat::new(*lng, *lat)),
                attributes: attrs(&[("P35_006", json!(name))]),
            })
            .collect();
        let hits = if features.is_empty() {
            Vec::new()
        } else {
            vec![LayerHit { handler, features }]
        };
        EngineEvent::Click(ClickEvent {
            point: (0, 0),
            lng_lat: LngLat::new(0.0, 0.0),
            hits,
        })
    }

    #[test]
    fn test_installs_source_layers_then_handler() {
        let engine = RecordingEngine::new();
        let (view, click) = ready_view(engine.clone());

        assert_eq!(
            engine.calls(),
            vec![
                Call::AddSource(SOURCE_ID.into(), 2),
                Call::AddLayer(CIRCLE_LAYER_ID.into()),
                Call::AddLayer(LABEL_LAYER_ID.into()),
                Call::OnClick(CIRCLE_LAYER_ID.into(), click),
            ]
        );
        assert_eq!(view.status(), DatasetStatus::Ready(2));
    }

    #[test]
    fn test_fetch_starts_on_first_load_only() {
        let (mut view, _tx, fetches) = view(RecordingEngine::new());
        assert_eq!(fetches.get(), 0);
        assert_eq!(view.status(), DatasetStatus::Waiting);

        view.handle_event(EngineEvent::Load);
        view.handle_event(EngineEvent::Load);
        assert_eq!(fetches.get(), 1);
        assert_eq!(view.status(), DatasetStatus::Loading);
        view.poll().unwrap();
        assert_eq!(view.status(), DatasetStatus::Loading);
    }

    #[test]
    fn test_click_a_then_b_leaves_one_popup_at_b() {
        let engine = RecordingEngine::new();
        let (mut view, handler) = ready_view(engine.clone());

        view.handle_event(click_on(handler, &[("A", 138.0, 35.9)]));
        let t = view.handle_event(click_on(handler, &[("B", 139.0, 36.0)]));

        assert_eq!(t, Some(Transition::Replaced));
        assert_eq!(engine.live_popups().len(), 1);
        let showing = view.showing().unwrap();
        assert_eq!(showing.label, "B");
        assert_eq!(showing.anchor, LngLat::new(139.0, 36.0));
    }

    #[test]
    fn test_empty_click_closes_popup() {
        let engine = RecordingEngine::new();
        let (mut view, handler) = ready_view(engine.clone());

        view.handle_event(click_on(handler, &[("A", 138.0, 35.9)]));
        let before = engine.calls().len();
        let t = view.handle_event(click_on(handler, &[]));

        assert_eq!(t, Some(Transition::Closed));
        assert!(view.showing().is_none());
        assert!(engine.live_popups().is_empty());
        assert!(matches!(engine.calls()[before..], [Call::RemovePopup(_)]));
    }

    #[test]
    fn test_hits_for_other_handlers_are_ignored() {
        let (mut view, handler) = ready_view(RecordingEngine::new());
        let other = HandlerId(handler.0 + 100);
        view.handle_event(click_on(other, &[("A", 138.0, 35.9)]));
        assert!(view.showing().is_none());
    }

    #[test]
    fn test_teardown_while_fetch_pending() {
        let engine = RecordingEngine::new();
        let (mut view, tx, _) = view(engine.clone());
        view.handle_event(EngineEvent::Load);
        view.teardown();

        // The result arrives after the view is gone and is discarded
        assert!(tx.send(Ok(collection())).is_err());
        view.poll().unwrap();

        assert_eq!(engine.calls(), vec![Call::Remove]);
        assert_eq!(view.status(), DatasetStatus::TornDown);
    }

    #[test]
    fn test_teardown_order_and_idempotence() {
        let engine = RecordingEngine::new();
        let (mut view, handler) = ready_view(engine.clone());
        view.handle_event(click_on(handler, &[("A", 138.0, 35.9)]));
        let popup = view.showing().unwrap().popup_id();
        let before = engine.calls().len();

        view.teardown();
        view.teardown();
        drop(view);

        assert_eq!(
            engine.calls()[before..],
            [Call::RemovePopup(popup), Call::Off(handler), Call::Remove]
        );
        assert!(engine.live_popups().is_empty());
    }

    #[test]
    fn test_drop_tears_down() {
        let engine = RecordingEngine::new();
        let (view, _) = ready_view(engine.clone());
        drop(view);
        assert_eq!(engine.calls().last(), Some(&Call::Remove));
    }

    #[test]
    fn test_fetch_failure_is_reported_and_nothing_installed() {
        let engine = RecordingEngine::new();
        let (mut view, tx, _) = view(engine.clone());
        view.handle_event(EngineEvent::Load);
        tx.send(Err(FetchError::Status(404))).unwrap();

        assert!(matches!(view.poll(), Err(ViewError::Fetch(FetchError::Status(404)))));
        assert!(matches!(view.status(), DatasetStatus::Failed(_)));
        assert!(engine.calls().is_empty());

        // Still usable: later polls and clicks do nothing
        view.poll().unwrap();
        assert_eq!(view.handle_event(click_on(HandlerId(1), &[("A", 0.0, 0.0)])), None);
    }

    #[test]
    fn test_install_failure_is_reported() {
        let mut engine = RecordingEngine::new();
        engine.fail_add_source = true;
        let (mut view, tx, _) = view(engine.clone());
        view.handle_event(EngineEvent::Load);
        tx.send(Ok(collection())).unwrap();

        assert!(matches!(view.poll(), Err(ViewError::Engine(_))));
        assert!(matches!(view.status(), DatasetStatus::Failed(_)));
        assert!(!engine.calls().iter().any(|c| matches!(c, Call::OnClick(..))));
    }

    #[test]
    fn test_loader_gone_is_a_failure() {
        let (mut view, tx, _) = view(RecordingEngine::new());
        view.handle_event(EngineEvent::Load);
        drop(tx);
        assert!(matches!(view.poll(), Err(ViewError::Fetch(FetchError::Disconnected))));
    }
}
