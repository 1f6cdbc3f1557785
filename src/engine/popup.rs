use crate::feature::LngLat;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PopupId(pub u64);

/// Popup construction options
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PopupOptions {
    /// Draw a close control on the popup
    pub close_button: bool,
    /// Close when the map is clicked outside the popup
    pub close_on_click: bool,
}

impl Default for PopupOptions {
    fn default() -> Self {
        Self {
            close_button: false,
            close_on_click: true,
        }
    }
}

/// A popup that has not been added to an engine yet
#[derive(Clone, Debug, PartialEq)]
pub struct Popup {
    options: PopupOptions,
    lng_lat: Option<LngLat>,
    html: String,
}

impl Popup {
    pub fn new(options: PopupOptions) -> Self {
        Self {
            options,
            lng_lat: None,
            html: String::new(),
        }
    }

    pub fn set_lng_lat(mut self, lng_lat: LngLat) -> Self {
        self.lng_lat = Some(lng_lat);
        self
    }

    /// Body content. Inserted as-is.
    pub fn set_html(mut self, html: impl Into<String>) -> Self {
        self.html = html.into();
        self
    }

    pub fn options(&self) -> PopupOptions {
        self.options
    }

    pub fn lng_lat(&self) -> Option<LngLat> {
        self.lng_lat
    }

    pub fn html(&self) -> &str {
        &self.html
    }
}

/// Ownership of a popup live on an engine.
///
/// Not `Clone`: `MapEngine::remove_popup` consumes the handle, so a popup can
/// be removed at most once. Only engines mint handles:
///
/// ```compile_fail
/// use roadside_map::engine::{PopupHandle, PopupId};
/// let forged = PopupHandle::new(PopupId(1));
/// ```
#[derive(Debug, PartialEq, Eq)]
pub struct PopupHandle {
    id: PopupId,
}

impl PopupHandle {
    /// Minted by engines when a popup is added
    pub(crate) fn new(id: PopupId) -> Self {
        Self { id }
    }

    pub fn id(&self) -> PopupId {
        self.id
    }
}
