//! Node attributes: named, typed parameters with bounds and a JSON form.
//!
//! An [`Attribute`] owns its value and declared bounds. Setting a value checks the kind
//! and clamps to the bounds; [`Attribute::to_json`] and [`Attribute::load_json`] give the
//! reversible serialization used by documents and undo snapshots.
use std::collections::BTreeMap;
use std::path::PathBuf;

use glam::Vec2;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{Error, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttributeKind {
    Float,
    Int,
    Seed,
    Bool,
    Vec2Float,
    WaveNb,
    Choice,
    Filename,
    Range,
}

#[derive(Clone, Debug, PartialEq)]
pub enum AttrValue {
    Float(f32),
    Int(i32),
    Seed(u32),
    Bool(bool),
    Vec2(Vec2),
    /// Wave numbers along x and y.
    WaveNb(Vec2),
    Choice(String),
    Filename(PathBuf),
    Range(f32, f32),
}

impl AttrValue {
    pub fn kind(&self) -> AttributeKind {
        match self {
            AttrValue::Float(_) => AttributeKind::Float,
            AttrValue::Int(_) => AttributeKind::Int,
            AttrValue::Seed(_) => AttributeKind::Seed,
            AttrValue::Bool(_) => AttributeKind::Bool,
            AttrValue::Vec2(_) => AttributeKind::Vec2Float,
            AttrValue::WaveNb(_) => AttributeKind::WaveNb,
            AttrValue::Choice(_) => AttributeKind::Choice,
            AttrValue::Filename(_) => AttributeKind::Filename,
            AttrValue::Range(_, _) => AttributeKind::Range,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Attribute {
    value: AttrValue,
    /// Inclusive lower bound, applied component-wise for vector kinds.
    pub min: Option<f32>,
    /// Inclusive upper bound, applied component-wise for vector kinds.
    pub max: Option<f32>,
    /// Allowed values of a [`AttributeKind::Choice`].
    pub choices: Vec<String>,
}

impl Attribute {
    fn plain(value: AttrValue) -> Self {
        Self {
            value,
            min: None,
            max: None,
            choices: Vec::new(),
        }
    }

    fn bounded(value: AttrValue, min: f32, max: f32) -> Self {
        Self {
            value,
            min: Some(min),
            max: Some(max),
            choices: Vec::new(),
        }
    }

    pub fn float(value: f32, min: f32, max: f32) -> Self {
        Self::bounded(AttrValue::Float(value), min, max)
    }

    pub fn int(value: i32, min: i32, max: i32) -> Self {
        Self::bounded(AttrValue::Int(value), min as f32, max as f32)
    }

    pub fn seed(value: u32) -> Self {
        Self::plain(AttrValue::Seed(value))
    }

    pub fn boolean(value: bool) -> Self {
        Self::plain(AttrValue::Bool(value))
    }

    pub fn vec2(value: Vec2, min: f32, max: f32) -> Self {
        Self::bounded(AttrValue::Vec2(value), min, max)
    }

    pub fn wave_nb(value: Vec2, min: f32, max: f32) -> Self {
        Self::bounded(AttrValue::WaveNb(value), min, max)
    }

    pub fn choice(value: &str, choices: &[&str]) -> Self {
        Self {
            value: AttrValue::Choice(value.to_string()),
            min: None,
            max: None,
            choices: choices.iter().map(|c| c.to_string()).collect(),
        }
    }

    pub fn filename(path: impl Into<PathBuf>) -> Self {
        Self::plain(AttrValue::Filename(path.into()))
    }

    pub fn range(lo: f32, hi: f32, min: f32, max: f32) -> Self {
        Self::bounded(AttrValue::Range(lo, hi), min, max)
    }

    pub fn kind(&self) -> AttributeKind {
        self.value.kind()
    }

    pub fn value(&self) -> &AttrValue {
        &self.value
    }

    /// Replaces the value, checking its kind and clamping it to the declared bounds.
    pub fn set(&mut self, key: &str, value: AttrValue) -> Result<()> {
        if value.kind() != self.kind() {
            return Err(Error::InvalidAttribute {
                key: key.to_string(),
                reason: format!("expected {:?}, got {:?}", self.kind(), value.kind()),
            });
        }
        let value = match value {
            AttrValue::Float(v) => AttrValue::Float(self.clamp(v)),
            AttrValue::Int(v) => AttrValue::Int(self.clamp(v as f32) as i32),
            AttrValue::Vec2(v) => AttrValue::Vec2(Vec2::new(self.clamp(v.x), self.clamp(v.y))),
            AttrValue::WaveNb(v) => {
                AttrValue::WaveNb(Vec2::new(self.clamp(v.x), self.clamp(v.y)))
            }
            AttrValue::Range(lo, hi) => {
                let (lo, hi) = (self.clamp(lo), self.clamp(hi));
                AttrValue::Range(lo.min(hi), lo.max(hi))
            }
            AttrValue::Choice(c) => {
                if !self.choices.is_empty() && !self.choices.contains(&c) {
                    return Err(Error::InvalidAttribute {
                        key: key.to_string(),
                        reason: format!("'{c}' is not one of {:?}", self.choices),
                    });
                }
                AttrValue::Choice(c)
            }
            other => other,
        };
        self.value = value;
        Ok(())
    }

    fn clamp(&self, v: f32) -> f32 {
        let lo = self.min.unwrap_or(f32::NEG_INFINITY);
        let hi = self.max.unwrap_or(f32::INFINITY);
        v.clamp(lo, hi)
    }

    pub fn to_json(&self) -> Value {
        match &self.value {
            AttrValue::Float(v) => json!(v),
            AttrValue::Int(v) => json!(v),
            AttrValue::Seed(v) => json!(v),
            AttrValue::Bool(v) => json!(v),
            AttrValue::Vec2(v) | AttrValue::WaveNb(v) => json!([v.x, v.y]),
            AttrValue::Choice(v) => json!(v),
            AttrValue::Filename(p) => json!(p.to_string_lossy()),
            AttrValue::Range(lo, hi) => json!([lo, hi]),
        }
    }

    /// Parses `value` according to this attribute's kind and stores it.
    pub fn load_json(&mut self, key: &str, value: &Value) -> Result<()> {
        let bad = |what: &str| Error::InvalidAttribute {
            key: key.to_string(),
            reason: format!("expected {what}, got {value}"),
        };
        let pair = |v: &Value| -> Option<(f32, f32)> {
            let arr = v.as_array()?;
            if arr.len() != 2 {
                return None;
            }
            Some((arr[0].as_f64()? as f32, arr[1].as_f64()? as f32))
        };
        let parsed = match self.kind() {
            AttributeKind::Float => {
                AttrValue::Float(value.as_f64().ok_or_else(|| bad("a number"))? as f32)
            }
            AttributeKind::Int => {
                let v = value.as_i64().ok_or_else(|| bad("an integer"))?;
                AttrValue::Int(i32::try_from(v).map_err(|_| bad("a 32-bit integer"))?)
            }
            AttributeKind::Seed => {
                let v = value.as_u64().ok_or_else(|| bad("a seed"))?;
                AttrValue::Seed(u32::try_from(v).map_err(|_| bad("a 32-bit seed"))?)
            }
            AttributeKind::Bool => AttrValue::Bool(value.as_bool().ok_or_else(|| bad("a bool"))?),
            AttributeKind::Vec2Float => {
                let (x, y) = pair(value).ok_or_else(|| bad("[x, y]"))?;
                AttrValue::Vec2(Vec2::new(x, y))
            }
            AttributeKind::WaveNb => {
                let (x, y) = pair(value).ok_or_else(|| bad("[kx, ky]"))?;
                AttrValue::WaveNb(Vec2::new(x, y))
            }
            AttributeKind::Choice => {
                AttrValue::Choice(value.as_str().ok_or_else(|| bad("a string"))?.to_string())
            }
            AttributeKind::Filename => {
                AttrValue::Filename(PathBuf::from(value.as_str().ok_or_else(|| bad("a path"))?))
            }
            AttributeKind::Range => {
                let (lo, hi) = pair(value).ok_or_else(|| bad("[lo, hi]"))?;
                AttrValue::Range(lo, hi)
            }
        };
        self.set(key, parsed)
    }
}

/// The attribute map owned by a node, ordered by key.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Attributes {
    map: BTreeMap<String, Attribute>,
}

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, attr: Attribute) {
        self.map.insert(key.into(), attr);
    }

    pub fn get(&self, key: &str) -> Option<&Attribute> {
        self.map.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Attribute> {
        self.map.get_mut(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.map.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.map.keys().map(|k| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Attribute)> {
        self.map.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    fn require(&self, key: &str) -> Result<&AttrValue> {
        self.map
            .get(key)
            .map(|a| a.value())
            .ok_or_else(|| Error::InvalidAttribute {
                key: key.to_string(),
                reason: "missing".into(),
            })
    }

    fn wrong(key: &str, expected: &str) -> Error {
        Error::InvalidAttribute {
            key: key.to_string(),
            reason: format!("not a {expected}"),
        }
    }

    pub fn float(&self, key: &str) -> Result<f32> {
        match self.require(key)? {
            AttrValue::Float(v) => Ok(*v),
            _ => Err(Self::wrong(key, "float")),
        }
    }

    pub fn int(&self, key: &str) -> Result<i32> {
        match self.require(key)? {
            AttrValue::Int(v) => Ok(*v),
            _ => Err(Self::wrong(key, "int")),
        }
    }

    pub fn seed(&self, key: &str) -> Result<u32> {
        match self.require(key)? {
            AttrValue::Seed(v) => Ok(*v),
            _ => Err(Self::wrong(key, "seed")),
        }
    }

    pub fn boolean(&self, key: &str) -> Result<bool> {
        match self.require(key)? {
            AttrValue::Bool(v) => Ok(*v),
            _ => Err(Self::wrong(key, "bool")),
        }
    }

    pub fn vec2(&self, key: &str) -> Result<Vec2> {
        match self.require(key)? {
            AttrValue::Vec2(v) | AttrValue::WaveNb(v) => Ok(*v),
            _ => Err(Self::wrong(key, "vec2")),
        }
    }

    pub fn choice(&self, key: &str) -> Result<&str> {
        match self.require(key)? {
            AttrValue::Choice(v) => Ok(v.as_str()),
            _ => Err(Self::wrong(key, "choice")),
        }
    }

    pub fn range(&self, key: &str) -> Result<(f32, f32)> {
        match self.require(key)? {
            AttrValue::Range(lo, hi) => Ok((*lo, *hi)),
            _ => Err(Self::wrong(key, "range")),
        }
    }

    /// `{key: value}` JSON object of every attribute.
    pub fn to_json(&self) -> serde_json::Map<String, Value> {
        self.map
            .iter()
            .map(|(k, a)| (k.clone(), a.to_json()))
            .collect()
    }

    /// Loads values from a `{key: value}` object. Unknown keys are ignored and missing
    /// keys keep their current value. On error no value changes.
    pub fn load_json(&mut self, settings: &serde_json::Map<String, Value>) -> Result<()> {
        let mut staged = self.map.clone();
        for (key, value) in settings {
            if let Some(attr) = staged.get_mut(key) {
                attr.load_json(key, value)?;
            }
        }
        self.map = staged;
        Ok(())
    }
}
