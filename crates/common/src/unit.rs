use serde::{Deserialize, Serialize};

/// A price, volume or money level used by threshold rules.
///
/// `Limit` is an absolute level. `Absolute` and `Percent` are offsets,
/// resolved against a base value (typically the value when the rule was
/// created).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum Unit {
    Limit(f64),
    Absolute(f64),
    Percent(f64),
}

impl Unit {
    pub fn is_limit(&self) -> bool {
        matches!(self, Unit::Limit(_))
    }

    /// Offset size relative to `base`. For `Limit` this is the level itself.
    pub fn offset(&self, base: f64) -> f64 {
        match *self {
            Unit::Limit(v) | Unit::Absolute(v) => v,
            Unit::Percent(p) => base.abs() * p / 100.0,
        }
    }

    pub fn level_above(&self, base: f64) -> f64 {
        match *self {
            Unit::Limit(v) => v,
            _ => base + self.offset(base),
        }
    }

    pub fn level_below(&self, base: f64) -> f64 {
        match *self {
            Unit::Limit(v) => v,
            _ => base - self.offset(base),
        }
    }
}

impl std::fmt::Display for Unit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Unit::Limit(v) => write!(f, "{v}"),
            Unit::Absolute(v) => write!(f, "{v:+}"),
            Unit::Percent(p) => write!(f, "{p:+}%"),
        }
    }
}
