//! Roadside stations on a Braille terminal map: marker styling, the
//! click-to-popup interaction, and the map engine they drive.

pub mod braille;
pub mod config;
pub mod data;
pub mod engine;
pub mod error;
pub mod feature;
pub mod interaction;
pub mod map;
pub mod style;
pub mod view;
