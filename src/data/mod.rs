pub mod stations;

use crate::map::{BaseMap, Lod};
use anyhow::Result;
use geojson::{GeoJson, Geometry, Value};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// Load all available Natural Earth GeoJSON base map data
pub fn load_basemap(basemap: &mut BaseMap, data_dir: &Path) {
    let coastline_files = [
        ("ne_110m_coastline.json", Lod::Low),
        ("ne_50m_coastline.json", Lod::Medium),
        ("ne_10m_coastline.json", Lod::High),
    ];

    for (filename, lod) in coastline_files {
        let path = data_dir.join(filename);
        if path.exists() {
            match read_lines(&path) {
                Ok(lines) => {
                    info!(file = filename, lines = lines.len(), "loaded coastlines");
                    lines.into_iter().for_each(|line| basemap.add_coastline(line, lod));
                }
                Err(e) => warn!(file = filename, "failed to load coastlines: {e}"),
            }
        }
    }

    let border_files = [
        ("ne_50m_borders.json", Lod::Medium),
        ("ne_10m_borders.json", Lod::High),
    ];

    for (filename, lod) in border_files {
        let path = data_dir.join(filename);
        if path.exists() {
            match read_lines(&path) {
                Ok(lines) => lines.into_iter().for_each(|line| basemap.add_border(line, lod)),
                Err(e) => warn!(file = filename, "failed to load borders: {e}"),
            }
        }
    }
}

/// Read every line-like geometry of a GeoJSON file as a lon/lat polyline
fn read_lines(path: &Path) -> Result<Vec<Vec<(f64, f64)>>> {
    let content = fs::read_to_string(path)?;
    let geojson: GeoJson = content.parse()?;
    let mut lines = Vec::new();
    process_geojson_lines(&geojson, |line| lines.push(line));
    Ok(lines)
}

fn process_geojson_lines<F>(geojson: &GeoJson, mut add_line: F)
where
    F: FnMut(Vec<(f64, f64)>),
{
    match geojson {
        GeoJson::FeatureCollection(fc) => {
            for feature in &fc.features {
                if let Some(ref geometry) = feature.geometry {
                    process_geometry_lines(geometry, &mut add_line);
                }
            }
        }
        GeoJson::Feature(f) => {
            if let Some(ref geometry) = f.geometry {
                process_geometry_lines(geometry, &mut add_line);
            }
        }
        GeoJson::Geometry(geometry) => {
            process_geometry_lines(geometry, &mut add_line);
        }
    }
}

fn process_geometry_lines<F>(geometry: &Geometry, add_line: &mut F)
where
    F: FnMut(Vec<(f64, f64)>),
{
    match &geometry.value {
        Value::LineString(coords) => add_line(to_line(coords)),
        Value::MultiLineString(lines) => lines.iter().for_each(|coords| add_line(to_line(coords))),
        Value::Polygon(rings) => {
            if let Some(exterior) = rings.first() {
                add_line(to_line(exterior));
            }
        }
        Value::MultiPolygon(polygons) => {
            for rings in polygons {
                if let Some(exterior) = rings.first() {
                    add_line(to_line(exterior));
                }
            }
        }
        Value::GeometryCollection(geometries) => {
            for g in geometries {
                process_geometry_lines(g, add_line);
            }
        }
        _ => {}
    }
}

fn to_line(coords: &[Vec<f64>]) -> Vec<(f64, f64)> {
    coords.iter().filter(|c| c.len() >= 2).map(|c| (c[0], c[1])).collect()
}

/// Coarse outline of the four main islands, for when no base map files exist
pub fn generate_japan_outline(basemap: &mut BaseMap) {
    // Hokkaido
    basemap.add_coastline(
        vec![
            (141.9, 45.5), (142.9, 44.7), (144.3, 44.1), (145.3, 44.3),
            (145.8, 43.4), (144.9, 42.9), (143.3, 42.0), (141.7, 42.6),
            (140.9, 41.8), (140.0, 41.4), (139.9, 42.6), (140.5, 43.2),
            (141.4, 43.3), (141.6, 44.3), (141.9, 45.5),
        ],
        Lod::Low,
    );

    // Honshu
    basemap.add_coastline(
        vec![
            (141.5, 41.4), (141.4, 40.5), (142.0, 39.6), (141.5, 38.3),
            (141.0, 37.9), (141.0, 36.9), (140.6, 36.3), (140.8, 35.7),
            (139.8, 35.0), (139.2, 35.2), (138.8, 34.6), (137.3, 34.6),
            (136.8, 34.3), (136.0, 33.5), (135.1, 33.9), (135.4, 34.6),
            (134.2, 34.7), (133.0, 34.4), (132.2, 33.9), (131.0, 34.0),
            (130.9, 34.4), (131.6, 34.7), (132.6, 35.4), (133.3, 35.6),
            (134.5, 35.6), (135.8, 35.6), (136.7, 36.4), (137.3, 36.8),
            (138.6, 37.4), (139.4, 38.2), (140.0, 39.4), (139.9, 40.6),
            (140.4, 41.2), (141.5, 41.4),
        ],
        Lod::Low,
    );

    // Shikoku
    basemap.add_coastline(
        vec![
            (132.4, 33.5), (133.0, 32.7), (133.9, 33.4), (134.7, 33.8),
            (134.6, 34.2), (133.6, 34.4), (132.9, 34.0), (132.4, 33.5),
        ],
        Lod::Low,
    );

    // Kyushu
    basemap.add_coastline(
        vec![
            (130.9, 33.9), (131.7, 33.3), (131.6, 32.1), (131.1, 31.3),
            (130.6, 31.0), (130.2, 31.4), (130.4, 32.2), (129.8, 32.8),
            (129.6, 33.3), (130.4, 33.6), (130.9, 33.9),
        ],
        Lod::Low,
    );
}
