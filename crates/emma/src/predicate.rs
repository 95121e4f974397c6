use crate::error::{EmmError, Result};
use crate::value::Value;
use core::fmt;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::hash::{Hash, Hasher};

/// Row access used by [`Predicate::matches`]. A missing column reads as null.
pub trait Row {
    fn field(&self, column: &str) -> Option<&Value>;
}

impl Row for HashMap<String, Value> {
    fn field(&self, column: &str) -> Option<&Value> {
        self.get(column)
    }
}

impl Row for BTreeMap<String, Value> {
    fn field(&self, column: &str) -> Option<&Value> {
        self.get(column)
    }
}

/// Variant tag, used by the merge table and the canonical order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PredicateKind {
    Equals,
    NotEquals,
    InSet,
    InRange,
}

/// -------------------
/// Predicate
/// -------------------
/// An atomic, immutable condition on one column.
///
/// `InSet` always holds at least two values and `InRange` always satisfies
/// `low <= high`; use the checked constructors to build them.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(try_from = "PredicateRepr", into = "PredicateRepr")]
pub enum Predicate {
    Equals {
        column: String,
        value: Value,
    },
    NotEquals {
        column: String,
        value: Value,
    },
    InSet {
        column: String,
        values: BTreeSet<Value>,
    },
    InRange {
        column: String,
        low: f64,
        high: f64,
    },
}

// Wire form; deserialization goes through the checked constructors.
#[derive(Serialize, Deserialize)]
enum PredicateRepr {
    Equals {
        column: String,
        value: Value,
    },
    NotEquals {
        column: String,
        value: Value,
    },
    InSet {
        column: String,
        values: Vec<Value>,
    },
    InRange {
        column: String,
        low: f64,
        high: f64,
    },
}

impl TryFrom<PredicateRepr> for Predicate {
    type Error = EmmError;

    fn try_from(repr: PredicateRepr) -> Result<Self> {
        match repr {
            PredicateRepr::Equals { column, value } => Ok(Predicate::equals(column, value)),
            PredicateRepr::NotEquals { column, value } => Ok(Predicate::not_equals(column, value)),
            PredicateRepr::InSet { column, values } => Predicate::in_set(column, values),
            PredicateRepr::InRange { column, low, high } => Predicate::in_range(column, low, high),
        }
    }
}

impl From<Predicate> for PredicateRepr {
    fn from(predicate: Predicate) -> Self {
        match predicate {
            Predicate::Equals { column, value } => PredicateRepr::Equals { column, value },
            Predicate::NotEquals { column, value } => PredicateRepr::NotEquals { column, value },
            Predicate::InSet { column, values } => PredicateRepr::InSet {
                column,
                values: values.into_iter().collect(),
            },
            Predicate::InRange { column, low, high } => PredicateRepr::InRange { column, low, high },
        }
    }
}

impl Predicate {
    pub fn equals(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Predicate::Equals {
            column: column.into(),
            value: value.into(),
        }
    }

    pub fn not_equals(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Predicate::NotEquals {
            column: column.into(),
            value: value.into(),
        }
    }

    /// Membership in a set of at least two distinct values.
    /// A single value must be expressed with [`Predicate::equals`].
    pub fn in_set<I, V>(column: impl Into<String>, values: I) -> Result<Self>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let column = column.into();
        let values: BTreeSet<Value> = values.into_iter().map(Into::into).collect();
        if values.len() < 2 {
            return Err(EmmError::InvalidPredicate(format!(
                "InSet on '{}' needs at least 2 distinct values, got {}",
                column,
                values.len()
            )));
        }
        Ok(Predicate::InSet { column, values })
    }

    /// Inclusive numeric range `[low, high]`.
    pub fn in_range(column: impl Into<String>, low: f64, high: f64) -> Result<Self> {
        let column = column.into();
        if low.is_nan() || high.is_nan() {
            return Err(EmmError::InvalidPredicate(format!(
                "InRange on '{}' has a NaN bound",
                column
            )));
        }
        if low > high {
            return Err(EmmError::InvalidPredicate(format!(
                "InRange on '{}' has low {} > high {}",
                column, low, high
            )));
        }
        Ok(Predicate::InRange { column, low, high })
    }

    /// Collapse a value set into the narrowest predicate: a singleton becomes
    /// `Equals`, larger sets stay `InSet`. Empty sets have no predicate.
    pub fn from_value_set(column: impl Into<String>, values: BTreeSet<Value>) -> Option<Self> {
        let column = column.into();
        match values.len() {
            0 => None,
            1 => values
                .into_iter()
                .next()
                .map(|value| Predicate::Equals { column, value }),
            _ => Some(Predicate::InSet { column, values }),
        }
    }

    pub fn column(&self) -> &str {
        match self {
            Predicate::Equals { column, .. }
            | Predicate::NotEquals { column, .. }
            | Predicate::InSet { column, .. }
            | Predicate::InRange { column, .. } => column,
        }
    }

    pub fn kind(&self) -> PredicateKind {
        match self {
            Predicate::Equals { .. } => PredicateKind::Equals,
            Predicate::NotEquals { .. } => PredicateKind::NotEquals,
            Predicate::InSet { .. } => PredicateKind::InSet,
            Predicate::InRange { .. } => PredicateKind::InRange,
        }
    }

    // Null never satisfies a predicate, not even NotEquals.
    fn evaluate_some(&self, field: &Value) -> bool {
        match self {
            Predicate::Equals { value, .. } => field == value,
            Predicate::NotEquals { value, .. } => field != value,
            Predicate::InSet { values, .. } => values.contains(field),
            Predicate::InRange { low, high, .. } => field
                .as_f64()
                .map(|x| *low <= x && x <= *high)
                .unwrap_or(false),
        }
    }

    pub fn evaluate_value(&self, field: Option<&Value>) -> bool {
        match field {
            None => false,
            Some(v) => self.evaluate_some(v),
        }
    }

    /// Column-wise evaluation over the values of this predicate's column.
    pub fn evaluate(&self, data: &[Option<Value>]) -> Vec<bool> {
        data.iter().map(|x| self.evaluate_value(x.as_ref())).collect()
    }

    pub fn matches<R: Row + ?Sized>(&self, row: &R) -> bool {
        self.evaluate_value(row.field(self.column()))
    }
}

impl PartialEq for Predicate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Predicate {}

impl PartialOrd for Predicate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Predicate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.column()
            .cmp(other.column())
            .then_with(|| self.kind().cmp(&other.kind()))
            .then_with(|| match (self, other) {
                (Predicate::Equals { value: a, .. }, Predicate::Equals { value: b, .. })
                | (Predicate::NotEquals { value: a, .. }, Predicate::NotEquals { value: b, .. }) => {
                    a.cmp(b)
                }
                (Predicate::InSet { values: a, .. }, Predicate::InSet { values: b, .. }) => {
                    a.cmp(b)
                }
                (
                    Predicate::InRange {
                        low: al, high: ah, ..
                    },
                    Predicate::InRange {
                        low: bl, high: bh, ..
                    },
                ) => al.total_cmp(bl).then_with(|| ah.total_cmp(bh)),
                _ => Ordering::Equal,
            })
    }
}

impl Hash for Predicate {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.column().hash(state);
        self.kind().hash(state);
        match self {
            Predicate::Equals { value, .. } | Predicate::NotEquals { value, .. } => {
                value.hash(state)
            }
            Predicate::InSet { values, .. } => values.hash(state),
            Predicate::InRange { low, high, .. } => {
                low.to_bits().hash(state);
                high.to_bits().hash(state);
            }
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Equals { column, value } => write!(f, "{} == {}", column, value),
            Predicate::NotEquals { column, value } => write!(f, "{} != {}", column, value),
            Predicate::InSet { column, values } => {
                write!(f, "{} in {{{}}}", column, values.iter().join(", "))
            }
            Predicate::InRange { column, low, high } => {
                write!(f, "{} in [{:?}, {:?}]", column, low, high)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_set_requires_two_values() {
        assert!(Predicate::in_set("c", [1i64]).is_err());
        // duplicates collapse before the size check
        assert!(Predicate::in_set("c", [1i64, 1i64]).is_err());
        assert!(Predicate::in_set("c", [1i64, 2i64]).is_ok());
    }

    #[test]
    fn in_range_rejects_inverted_bounds() {
        assert!(Predicate::in_range("x", 2.0, 1.0).is_err());
        assert!(Predicate::in_range("x", f64::NAN, 1.0).is_err());
        assert!(Predicate::in_range("x", 1.0, 1.0).is_ok());
    }

    #[test]
    fn display_forms() {
        assert_eq!(Predicate::equals("sex", "Male").to_string(), "sex == \"Male\"");
        assert_eq!(Predicate::not_equals("n", 3i64).to_string(), "n != 3");
        assert_eq!(
            Predicate::in_set("n", [3i64, 1i64]).unwrap().to_string(),
            "n in {1, 3}"
        );
        assert_eq!(
            Predicate::in_range("age", 18.0, 30.5).unwrap().to_string(),
            "age in [18.0, 30.5]"
        );
    }
}
