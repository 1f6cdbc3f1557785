use geojson::{JsonObject, JsonValue, Value};
use std::borrow::Cow;

/// A geographic coordinate in degrees
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LngLat {
    pub lng: f64,
    pub lat: f64,
}

impl LngLat {
    pub fn new(lng: f64, lat: f64) -> Self {
        Self { lng, lat }
    }

    /// Read a GeoJSON position, ignoring altitude. `None` when fewer than two
    /// finite components are present.
    pub fn from_position(position: &[f64]) -> Option<Self> {
        match position {
            [lng, lat, ..] if lng.is_finite() && lat.is_finite() => Some(Self::new(*lng, *lat)),
            _ => None,
        }
    }
}

/// Attribute record of a feature (GeoJSON `properties`)
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Attributes(JsonObject);

impl Attributes {
    pub fn new(properties: JsonObject) -> Self {
        Self(properties)
    }

    pub fn get(&self, key: &str) -> Option<&JsonValue> {
        self.0.get(key).filter(|v| !v.is_null())
    }

    /// Text of an attribute: strings verbatim, other scalars in their JSON form
    pub fn text(&self, key: &str) -> Option<Cow<'_, str>> {
        match self.get(key)? {
            JsonValue::String(s) => Some(Cow::Borrowed(s.as_str())),
            other => Some(Cow::Owned(other.to_string())),
        }
    }
}

impl From<JsonObject> for Attributes {
    fn from(properties: JsonObject) -> Self {
        Self::new(properties)
    }
}

/// A point of interest: exactly one point geometry plus its attributes
#[derive(Clone, Debug, PartialEq)]
pub struct Feature {
    pub geometry: LngLat,
    pub attributes: Attributes,
}

impl Feature {
    pub fn new(geometry: LngLat, attributes: Attributes) -> Self {
        Self { geometry, attributes }
    }

    /// Convert a GeoJSON feature. Only point geometries qualify.
    pub fn from_geojson(feature: &geojson::Feature) -> Option<Self> {
        let geometry = feature.geometry.as_ref()?;
        let Value::Point(coords) = &geometry.value else {
            return None;
        };
        let position = LngLat::from_position(coords)?;
        let attributes = feature.properties.clone().unwrap_or_default();
        Some(Self::new(position, Attributes::new(attributes)))
    }
}

#[cfg(test)]
pub(crate) fn attrs(pairs: &[(&str, JsonValue)]) -> Attributes {
    Attributes::new(pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_text_is_verbatim() {
        let a = attrs(&[("name", json!("<b>道の駅 みのわ</b>")), ("code", json!(42))]);
        assert_eq!(a.text("name").as_deref(), Some("<b>道の駅 みのわ</b>"));
        assert_eq!(a.text("code").as_deref(), Some("42"));
        assert_eq!(a.text("missing"), None);
    }

    #[test]
    fn test_from_geojson_point() {
        let gj: geojson::Feature = r#"{
            "type": "Feature",
            "geometry": {"type": "Point", "coordinates": [138.1, 35.9]},
            "properties": {"P35_006": "みのわ"}
        }"#
        .parse()
        .unwrap();
        let f = Feature::from_geojson(&gj).unwrap();
        assert_eq!(f.geometry, LngLat::new(138.1, 35.9));
        assert_eq!(f.attributes.text("P35_006").as_deref(), Some("みのわ"));
    }

    #[test]
    fn test_from_geojson_rejects_non_points() {
        let gj: geojson::Feature = r#"{
            "type": "Feature",
            "geometry": {"type": "LineString", "coordinates": [[0, 0], [1, 1]]},
            "properties": null
        }"#
        .parse()
        .unwrap();
        assert!(Feature::from_geojson(&gj).is_none());
    }

    #[test]
    fn test_missing_properties_are_empty() {
        let gj: geojson::Feature = r#"{
            "type": "Feature",
            "geometry": {"type": "Point", "coordinates": [1, 2]},
            "properties": null
        }"#
        .parse()
        .unwrap();
        let f = Feature::from_geojson(&gj).unwrap();
        assert_eq!(f.attributes, Attributes::default());
    }
}
