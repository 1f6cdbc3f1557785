//! A small subset of the MapLibre style expression language.
//!
//! Expressions are built in Rust, evaluated in-process by the terminal engine
//! and serialised to MapLibre style JSON for engines with their own evaluator.
//! Both paths share one tree so their results cannot drift apart.

use super::color::Rgb;
use crate::feature::Attributes;
use serde_json::{json, Value as JsonValue};

/// Result of evaluating an expression
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Color(Rgb),
}

impl Value {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_color(&self) -> Option<Rgb> {
        match self {
            Value::Color(c) => Some(*c),
            Value::String(s) => Rgb::from_hex(s),
            _ => None,
        }
    }

    /// Text form used for labels and popup bodies. `None` for null.
    pub fn into_text(self) -> Option<String> {
        match self {
            Value::Null => None,
            Value::Bool(b) => Some(b.to_string()),
            Value::Number(n) => Some(number_json(n).to_string()),
            Value::String(s) => Some(s),
            Value::Color(c) => Some(c.to_string()),
        }
    }

    fn from_json(value: &JsonValue) -> Self {
        match value {
            JsonValue::Null => Value::Null,
            JsonValue::Bool(b) => Value::Bool(*b),
            JsonValue::Number(n) => n.as_f64().map_or(Value::Null, Value::Number),
            JsonValue::String(s) => Value::String(s.clone()),
            other => Value::String(other.to_string()),
        }
    }

    fn to_json(&self) -> JsonValue {
        match self {
            Value::Null => JsonValue::Null,
            Value::Bool(b) => json!(b),
            Value::Number(n) => number_json(*n),
            Value::String(s) => json!(s),
            Value::Color(c) => json!(c.to_string()),
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<Rgb> for Value {
    fn from(c: Rgb) -> Self {
        Value::Color(c)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

/// Integral numbers serialise without a fractional part, as a style author
/// would write them.
fn number_json(n: f64) -> JsonValue {
    const MAX_SAFE: f64 = 9_007_199_254_740_992.0;
    if n.fract() == 0.0 && n.abs() < MAX_SAFE {
        json!(n as i64)
    } else {
        json!(n)
    }
}

/// Inputs available while evaluating an expression for one feature
#[derive(Clone, Copy)]
pub struct EvalContext<'a> {
    pub zoom: f64,
    pub attributes: &'a Attributes,
}

impl<'a> EvalContext<'a> {
    pub fn new(zoom: f64, attributes: &'a Attributes) -> Self {
        Self { zoom, attributes }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Expression {
    Literal(Value),
    /// `["zoom"]`
    Zoom,
    /// `["get", key]`
    Get(String),
    /// `["==", a, b]`
    Eq(Box<Expression>, Box<Expression>),
    /// `["any", ...]`
    Any(Vec<Expression>),
    /// `["coalesce", ...]`
    Coalesce(Vec<Expression>),
    /// `["interpolate", ["linear"], input, z0, v0, z1, v1, ...]`
    Interpolate {
        input: Box<Expression>,
        stops: Vec<(f64, f64)>,
    },
    /// `["case", cond0, out0, cond1, out1, ..., fallback]`
    Case {
        branches: Vec<(Expression, Expression)>,
        fallback: Box<Expression>,
    },
}

impl Expression {
    pub fn literal(value: impl Into<Value>) -> Self {
        Expression::Literal(value.into())
    }

    pub fn get(key: impl Into<String>) -> Self {
        Expression::Get(key.into())
    }

    pub fn equals(a: Expression, b: Expression) -> Self {
        Expression::Eq(Box::new(a), Box::new(b))
    }

    /// Linear interpolation over `stops`, which must be sorted by input
    pub fn interpolate_linear(input: Expression, stops: &[(f64, f64)]) -> Self {
        debug_assert!(stops.windows(2).all(|w| w[0].0 < w[1].0));
        Expression::Interpolate {
            input: Box::new(input),
            stops: stops.to_vec(),
        }
    }

    pub fn case(branches: Vec<(Expression, Expression)>, fallback: Expression) -> Self {
        Expression::Case {
            branches,
            fallback: Box::new(fallback),
        }
    }

    pub fn evaluate(&self, ctx: &EvalContext<'_>) -> Value {
        match self {
            Expression::Literal(v) => v.clone(),
            Expression::Zoom => Value::Number(ctx.zoom),
            Expression::Get(key) => ctx.attributes.get(key).map_or(Value::Null, Value::from_json),
            Expression::Eq(a, b) => Value::Bool(a.evaluate(ctx) == b.evaluate(ctx)),
            Expression::Any(items) => Value::Bool(items.iter().any(|e| e.evaluate(ctx) == Value::Bool(true))),
            Expression::Coalesce(items) => items
                .iter()
                .map(|e| e.evaluate(ctx))
                .find(|v| *v != Value::Null)
                .unwrap_or(Value::Null),
            Expression::Interpolate { input, stops } => {
                let x = input.evaluate(ctx).as_number().unwrap_or(f64::NAN);
                interpolate_linear(stops, x).map_or(Value::Null, Value::Number)
            }
            Expression::Case { branches, fallback } => branches
                .iter()
                .find(|(cond, _)| cond.evaluate(ctx) == Value::Bool(true))
                .map_or_else(|| fallback.evaluate(ctx), |(_, out)| out.evaluate(ctx)),
        }
    }

    /// MapLibre style JSON form of this expression
    pub fn to_json(&self) -> JsonValue {
        match self {
            Expression::Literal(v) => v.to_json(),
            Expression::Zoom => json!(["zoom"]),
            Expression::Get(key) => json!(["get", key]),
            Expression::Eq(a, b) => json!(["==", a.to_json(), b.to_json()]),
            Expression::Any(items) => operator("any", items.iter().map(Expression::to_json)),
            Expression::Coalesce(items) => operator("coalesce", items.iter().map(Expression::to_json)),
            Expression::Interpolate { input, stops } => {
                let mut args = vec![json!(["linear"]), input.to_json()];
                for &(z, v) in stops {
                    args.push(number_json(z));
                    args.push(number_json(v));
                }
                operator("interpolate", args)
            }
            Expression::Case { branches, fallback } => {
                let mut args = Vec::with_capacity(branches.len() * 2 + 1);
                for (cond, out) in branches {
                    args.push(cond.to_json());
                    args.push(out.to_json());
                }
                args.push(fallback.to_json());
                operator("case", args)
            }
        }
    }
}

fn operator(name: &str, args: impl IntoIterator<Item = JsonValue>) -> JsonValue {
    JsonValue::Array(std::iter::once(json!(name)).chain(args).collect())
}

/// Piecewise-linear interpolation. Inputs below the first stop (and NaN)
/// take the first output, inputs above the last stop take the last output.
/// `None` only when there are no stops.
pub fn interpolate_linear(stops: &[(f64, f64)], x: f64) -> Option<f64> {
    let &(first_z, first_v) = stops.first()?;
    let &(last_z, last_v) = stops.last()?;
    if x.is_nan() || x <= first_z {
        return Some(first_v);
    }
    if x >= last_z {
        return Some(last_v);
    }
    let upper = stops.partition_point(|&(z, _)| z <= x);
    let (z0, v0) = stops[upper - 1];
    let (z1, v1) = stops[upper];
    let t = (x - z0) / (z1 - z0);
    Some(v0 + t * (v1 - v0))
}
