//! Engine double that records every call against it

use super::{GeoJsonSource, HandlerId, LayerSpec, MapEngine, Popup, PopupHandle, PopupId};
use crate::error::EngineError;
use crate::feature::LngLat;
use std::cell::RefCell;
use std::rc::Rc;

#[derive(Clone, Debug, PartialEq)]
pub enum Call {
    AddSource(String, usize),
    AddLayer(String),
    OnClick(String, HandlerId),
    Off(HandlerId),
    AddPopup(PopupId, Option<LngLat>, String),
    RemovePopup(PopupId),
    Remove,
}

#[derive(Clone, Default)]
pub struct RecordingEngine {
    pub calls: Rc<RefCell<Vec<Call>>>,
    pub fail_add_source: bool,
    next_id: u64,
}

impl RecordingEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    /// Popups added and not yet removed
    pub fn live_popups(&self) -> Vec<PopupId> {
        let mut live = Vec::new();
        for call in self.calls.borrow().iter() {
            match call {
                Call::AddPopup(id, ..) => live.push(*id),
                Call::RemovePopup(id) => {
                    let idx = live.iter().position(|p| p == id);
                    assert!(idx.is_some(), "popup {id:?} removed twice or never added");
                    if let Some(idx) = idx {
                        live.remove(idx);
                    }
                }
                _ => {}
            }
        }
        live
    }

    fn next(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn record(&self, call: Call) {
        self.calls.borrow_mut().push(call);
    }
}

impl MapEngine for RecordingEngine {
    fn add_source(&mut self, id: &str, source: GeoJsonSource) -> Result<(), EngineError> {
        if self.fail_add_source {
            return Err(EngineError::DuplicateSource(id.to_string()));
        }
        self.record(Call::AddSource(id.to_string(), source.data.features.len()));
        Ok(())
    }

    fn add_layer(&mut self, layer: LayerSpec) -> Result<(), EngineError> {
        self.record(Call::AddLayer(layer.id));
        Ok(())
    }

    fn on_click(&mut self, layer_id: &str) -> HandlerId {
        let id = HandlerId(self.next());
        self.record(Call::OnClick(layer_id.to_string(), id));
        id
    }

    fn off(&mut self, handler: HandlerId) {
        self.record(Call::Off(handler));
    }

    fn add_popup(&mut self, popup: Popup) -> PopupHandle {
        let id = PopupId(self.next());
        self.record(Call::AddPopup(id, popup.lng_lat(), popup.html().to_string()));
        PopupHandle::new(id)
    }

    fn remove_popup(&mut self, popup: PopupHandle) {
        self.record(Call::RemovePopup(popup.id()));
    }

    fn remove(&mut self) {
        self.record(Call::Remove);
    }
}
