//! Click-to-popup state machine: at most one station popup is live at a time.

use crate::engine::{MapEngine, Popup, PopupHandle, PopupId, PopupOptions, RenderedFeature};
use crate::feature::LngLat;
use crate::style::StyleResolver;
use tracing::{debug, warn};

/// The popup currently shown
#[derive(Debug)]
pub struct Showing {
    popup: PopupHandle,
    pub anchor: LngLat,
    pub label: String,
}

impl Showing {
    pub fn popup_id(&self) -> PopupId {
        self.popup.id()
    }
}

/// Outcome of feeding an input to the controller
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
    /// Idle -> Showing
    Opened,
    /// Showing -> Showing, previous popup closed first
    Replaced,
    /// Showing -> Idle
    Closed,
    /// No state change
    Ignored,
}

pub struct InteractionController {
    options: PopupOptions,
    showing: Option<Showing>,
}

impl InteractionController {
    pub fn new(options: PopupOptions) -> Self {
        Self {
            options,
            showing: None,
        }
    }

    pub fn showing(&self) -> Option<&Showing> {
        self.showing.as_ref()
    }

    /// Handle a map click. `hits` are the features of the station layer under
    /// the click in engine order; the first one wins.
    pub fn handle_click<E: MapEngine + ?Sized>(
        &mut self,
        engine: &mut E,
        resolver: &StyleResolver,
        hits: &[RenderedFeature],
    ) -> Transition {
        let Some(feature) = hits.first() else {
            if self.options.close_on_click && self.close(engine) {
                return Transition::Closed;
            }
            return Transition::Ignored;
        };

        let Some(anchor) = feature.geometry else {
            warn!(layer = %feature.layer, "clicked feature has no coordinate, ignoring");
            return Transition::Ignored;
        };

        let label = resolver.label(&feature.attributes);
        let popup = Popup::new(self.options)
            .set_lng_lat(anchor)
            .set_html(label.as_str());

        let replaced = self.close(engine);
        let handle = engine.add_popup(popup);
        debug!(popup = handle.id().0, %label, lng = anchor.lng, lat = anchor.lat, "popup opened");
        self.showing = Some(Showing {
            popup: handle,
            anchor,
            label,
        });

        if replaced {
            Transition::Replaced
        } else {
            Transition::Opened
        }
    }

    /// The popup's own close control was used
    pub fn close_requested<E: MapEngine + ?Sized>(&mut self, engine: &mut E, id: PopupId) -> Transition {
        match &self.showing {
            Some(showing) if showing.popup.id() == id => {
                self.close(engine);
                Transition::Closed
            }
            _ => Transition::Ignored,
        }
    }

    /// Release the popup, if any, before the hosting view goes away
    pub fn teardown<E: MapEngine + ?Sized>(&mut self, engine: &mut E) -> Transition {
        if self.close(engine) {
            Transition::Closed
        } else {
            Transition::Ignored
        }
    }

    fn close<E: MapEngine + ?Sized>(&mut self, engine: &mut E) -> bool {
        match self.showing.take() {
            Some(showing) => {
                debug!(popup = showing.popup.id().0, "popup closed");
                engine.remove_popup(showing.popup);
                true
            }
            None => false,
        }
    }
}
