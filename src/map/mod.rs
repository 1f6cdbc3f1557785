mod basemap;
mod geometry;
mod projection;

pub use basemap::{BaseMap, LineString, Lod};
pub use geometry::{draw_circle, draw_line};
pub use projection::{Viewport, MAX_ZOOM, MIN_ZOOM, TILE_SIZE, ZOOM_STEP};
