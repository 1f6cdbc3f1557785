//! Visual encoding of roadside stations: marker radius by zoom, marker color
//! by facility flags, and the station label.

mod color;
mod expression;

pub use color::{Rgb, BLUE, ORANGE, RED};
pub use expression::{interpolate_linear, EvalContext, Expression, Value};

use crate::engine::{Anchor, CirclePaint, LayerKind, LayerSpec, SymbolLayout};
use crate::feature::Attributes;

/// Marker radius control points as (zoom, radius in pixels)
pub const RADIUS_STOPS: [(f64, f64); 5] = [
    (1.0, 0.1),
    (5.0, 3.0),
    (10.0, 10.0),
    (15.0, 15.0),
    (20.0, 30.0),
];

/// Attribute keys the styling rules read
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StationSchema {
    pub name: String,
    pub primary: String,
    pub secondary_a: String,
    pub secondary_b: String,
}

impl Default for StationSchema {
    /// Keys of the MLIT national land numerical information roadside station
    /// dataset (P35)
    fn default() -> Self {
        Self {
            name: "P35_006".to_string(),
            primary: "P35_016".to_string(),
            secondary_a: "P35_013".to_string(),
            secondary_b: "P35_014".to_string(),
        }
    }
}

/// Resolved marker appearance for one feature at one zoom
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StyleResult {
    pub radius: f64,
    pub color: Rgb,
}

/// Pure mapping from (zoom, attributes) to marker style and label.
///
/// The rules are held as expressions so the exact same rules can be handed
/// to an engine as layer paint and evaluated here.
#[derive(Clone, Debug)]
pub struct StyleResolver {
    schema: StationSchema,
    radius: Expression,
    color: Expression,
    label: Expression,
}

impl StyleResolver {
    pub fn new(schema: StationSchema, unnamed_label: &str) -> Self {
        let flag = |key: &str| Expression::equals(Expression::get(key), Expression::literal(1.0));

        let radius = Expression::interpolate_linear(Expression::Zoom, &RADIUS_STOPS);
        let color = Expression::case(
            vec![
                (flag(&schema.primary), Expression::literal(RED)),
                (
                    Expression::Any(vec![flag(&schema.secondary_a), flag(&schema.secondary_b)]),
                    Expression::literal(ORANGE),
                ),
            ],
            Expression::literal(BLUE),
        );
        let label = Expression::Coalesce(vec![
            Expression::get(schema.name.as_str()),
            Expression::literal(unnamed_label),
        ]);

        Self {
            schema,
            radius,
            color,
            label,
        }
    }

    pub fn schema(&self) -> &StationSchema {
        &self.schema
    }

    pub fn radius(&self, zoom: f64) -> f64 {
        let attributes = Attributes::default();
        self.radius
            .evaluate(&EvalContext::new(zoom, &attributes))
            .as_number()
            .unwrap_or(0.0)
    }

    pub fn color(&self, attributes: &Attributes) -> Rgb {
        self.color
            .evaluate(&EvalContext::new(0.0, attributes))
            .as_color()
            .unwrap_or(BLUE)
    }

    pub fn style(&self, zoom: f64, attributes: &Attributes) -> StyleResult {
        StyleResult {
            radius: self.radius(zoom),
            color: self.color(attributes),
        }
    }

    /// Station name verbatim, or the placeholder when the name is absent
    pub fn label(&self, attributes: &Attributes) -> String {
        self.label
            .evaluate(&EvalContext::new(0.0, attributes))
            .into_text()
            .unwrap_or_default()
    }

    /// Circle layer drawing one marker per station
    pub fn circle_layer(&self, id: &str, source: &str) -> LayerSpec {
        LayerSpec {
            id: id.to_string(),
            source: source.to_string(),
            kind: LayerKind::Circle(CirclePaint {
                radius: self.radius.clone(),
                color: self.color.clone(),
            }),
        }
    }

    /// Symbol layer drawing station names beside their markers
    pub fn label_layer(&self, id: &str, source: &str) -> LayerSpec {
        LayerSpec {
            id: id.to_string(),
            source: source.to_string(),
            kind: LayerKind::Symbol(SymbolLayout {
                text_field: self.label.clone(),
                variable_anchor: vec![Anchor::Top, Anchor::Bottom, Anchor::Left, Anchor::Right],
                radial_offset: 0.5,
            }),
        }
    }
}

impl Default for StyleResolver {
    fn default() -> Self {
        Self::new(StationSchema::default(), "(unnamed)")
    }
}
