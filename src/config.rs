use crate::data::stations::DatasetLocation;
use crate::engine::PopupOptions;
use crate::feature::LngLat;
use crate::style::StationSchema;
use clap::Parser;
use std::path::PathBuf;

/// Roadside stations on a terminal map
#[derive(Parser, Debug, Clone)]
#[command(name = "roadside-map", version, about)]
pub struct Args {
    /// Initial zoom level (0 shows the whole world)
    #[arg(long, default_value = "4.5", value_parser = parse_zoom, value_name = "float")]
    pub zoom: f64,

    /// Initial map center
    #[arg(long, default_value = "137.5,37.5", value_parser = parse_center, value_name = "lon,lat")]
    pub center: LngLat,

    /// Station dataset: a GeoJSON file or an http(s) URL
    #[arg(long, default_value = "roadside_station.geojson")]
    pub data: DatasetLocation,

    /// Directory of Natural Earth coastline and border GeoJSON files
    #[arg(long, default_value = "data")]
    pub basemap: PathBuf,

    /// Attribute holding the station name
    #[arg(long, default_value = "P35_006")]
    pub name_key: String,

    /// Flag drawn red when set
    #[arg(long, default_value = "P35_016")]
    pub primary_key: String,

    /// Flag drawn orange when set
    #[arg(long, default_value = "P35_013")]
    pub secondary_a_key: String,

    /// Flag drawn orange when set
    #[arg(long, default_value = "P35_014")]
    pub secondary_b_key: String,

    /// Label shown for stations without a name
    #[arg(long, default_value = "(unnamed)")]
    pub unnamed_label: String,

    /// Draw a close control on popups
    #[arg(long)]
    pub close_button: bool,

    /// Write logs to this file (RUST_LOG sets the filter)
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

impl Args {
    pub fn schema(&self) -> StationSchema {
        StationSchema {
            name: self.name_key.clone(),
            primary: self.primary_key.clone(),
            secondary_a: self.secondary_a_key.clone(),
            secondary_b: self.secondary_b_key.clone(),
        }
    }

    pub fn popup_options(&self) -> PopupOptions {
        PopupOptions {
            close_button: self.close_button,
            close_on_click: true,
        }
    }
}

fn parse_zoom(s: &str) -> Result<f64, String> {
    let zoom: f64 = s.trim().parse().map_err(|e| format!("invalid zoom '{s}': {e}"))?;
    if !zoom.is_finite() {
        return Err(format!("zoom must be a finite number, got '{s}'"));
    }
    Ok(zoom)
}

fn parse_center(s: &str) -> Result<LngLat, String> {
    let (lng, lat) = s
        .split_once(',')
        .ok_or_else(|| format!("expected 'lon,lat', got '{s}'"))?;
    let lng: f64 = lng.trim().parse().map_err(|e| format!("invalid longitude '{lng}': {e}"))?;
    let lat: f64 = lat.trim().parse().map_err(|e| format!("invalid latitude '{lat}': {e}"))?;
    if !lng.is_finite() || !lat.is_finite() {
        return Err(format!("center must be finite, got '{s}'"));
    }
    if !(-90.0..=90.0).contains(&lat) {
        return Err(format!("latitude {lat} is outside [-90, 90]"));
    }
    Ok(LngLat::new(lng, lat))
}
