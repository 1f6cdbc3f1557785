use crate::style::Expression;
use geojson::FeatureCollection;
use serde_json::{json, Value as JsonValue};

/// A GeoJSON source as handed to `MapEngine::add_source`
#[derive(Clone, Debug)]
pub struct GeoJsonSource {
    pub data: FeatureCollection,
}

impl GeoJsonSource {
    pub fn new(data: FeatureCollection) -> Self {
        Self { data }
    }

    pub fn to_json(&self) -> JsonValue {
        json!({ "type": "geojson", "data": self.data })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct CirclePaint {
    pub radius: Expression,
    pub color: Expression,
}

/// Label placement relative to the feature point
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Anchor {
    Top,
    Bottom,
    Left,
    Right,
}

impl Anchor {
    pub fn as_str(self) -> &'static str {
        match self {
            Anchor::Top => "top",
            Anchor::Bottom => "bottom",
            Anchor::Left => "left",
            Anchor::Right => "right",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SymbolLayout {
    pub text_field: Expression,
    /// Candidate anchors, tried in order until one fits
    pub variable_anchor: Vec<Anchor>,
    /// Distance between point and label, in ems
    pub radial_offset: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub enum LayerKind {
    Circle(CirclePaint),
    Symbol(SymbolLayout),
}

/// A draw layer as handed to `MapEngine::add_layer`
#[derive(Clone, Debug, PartialEq)]
pub struct LayerSpec {
    pub id: String,
    pub source: String,
    pub kind: LayerKind,
}

impl LayerSpec {
    /// MapLibre style JSON form of this layer
    pub fn to_json(&self) -> JsonValue {
        match &self.kind {
            LayerKind::Circle(paint) => json!({
                "id": self.id,
                "type": "circle",
                "source": self.source,
                "paint": {
                    "circle-radius": paint.radius.to_json(),
                    "circle-color": paint.color.to_json(),
                },
            }),
            LayerKind::Symbol(layout) => json!({
                "id": self.id,
                "type": "symbol",
                "source": self.source,
                "layout": {
                    "text-field": layout.text_field.to_json(),
                    "text-variable-anchor": layout.variable_anchor.iter().map(|a| a.as_str()).collect::<Vec<_>>(),
                    "text-radial-offset": layout.radial_offset,
                    "text-justify": "auto",
                },
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::style::StyleResolver;
    use serde_json::json;

    #[test]
    fn test_symbol_layer_json() {
        let layer = StyleResolver::default().label_layer("station-points-text", "station-points");
        assert_eq!(
            layer.to_json(),
            json!({
                "id": "station-points-text",
                "type": "symbol",
                "source": "station-points",
                "layout": {
                    "text-field": ["coalesce", ["get", "P35_006"], "(unnamed)"],
                    "text-variable-anchor": ["top", "bottom", "left", "right"],
                    "text-radial-offset": 0.5,
                    "text-justify": "auto"
                }
            })
        );
    }

    #[test]
    fn test_source_json() {
        let source = super::GeoJsonSource::new(geojson::FeatureCollection {
            bbox: None,
            features: vec![],
            foreign_members: None,
        });
        assert_eq!(source.to_json()["type"], "geojson");
        assert_eq!(source.to_json()["data"]["type"], "FeatureCollection");
    }
}
