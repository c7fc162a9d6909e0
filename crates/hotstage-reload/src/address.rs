//! Wildcard process addresses and their reduction.
//!
//! A backend process is addressed by four dot-separated fields. A pattern
//! names a class of processes: each field is either a literal or `*`.
//! [`reduce`] folds any number of patterns into one pattern that covers all
//! of them, field by field.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::error::{ReloadError, Result};

/// Number of fields in a process address.
pub const FIELD_COUNT: usize = 4;

/// Pattern text that matches every process.
pub const ALL_PROCESSES: &str = "*.*.*.*";

/// One field of an [`AddressPattern`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AddressField {
    /// `*`: every value.
    Any,
    /// A single literal value.
    Literal(String),
}

impl fmt::Display for AddressField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressField::Any => f.write_str("*"),
            AddressField::Literal(value) => f.write_str(value),
        }
    }
}

/// A four-field wildcard address such as `*.*.13.*`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AddressPattern {
    fields: [AddressField; FIELD_COUNT],
}

impl AddressPattern {
    pub fn new(fields: [AddressField; FIELD_COUNT]) -> Self {
        Self { fields }
    }

    /// Pattern matching every process.
    pub fn all() -> Self {
        Self {
            fields: std::array::from_fn(|_| AddressField::Any),
        }
    }

    /// Fields in address order.
    pub fn fields(&self) -> &[AddressField; FIELD_COUNT] {
        &self.fields
    }

    /// True if every field is `*`.
    pub fn is_all(&self) -> bool {
        self.fields.iter().all(|f| *f == AddressField::Any)
    }
}

impl FromStr for AddressPattern {
    type Err = ReloadError;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.trim().split('.').collect();
        if parts.len() != FIELD_COUNT {
            return Err(ReloadError::InvalidPattern(s.to_string()));
        }

        let mut fields: [AddressField; FIELD_COUNT] = std::array::from_fn(|_| AddressField::Any);
        for (slot, part) in fields.iter_mut().zip(parts) {
            *slot = match part {
                "*" => AddressField::Any,
                literal if is_literal(literal) => AddressField::Literal(literal.to_string()),
                _ => return Err(ReloadError::InvalidPattern(s.to_string())),
            };
        }
        Ok(Self { fields })
    }
}

fn is_literal(s: &str) -> bool {
    !s.is_empty()
        && !s
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '*' | '[' | ']' | ','))
}

impl fmt::Display for AddressPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{}", field)?;
        }
        Ok(())
    }
}

/// One resolved field of a [`ReducedPattern`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReducedField {
    /// Some input carried `*` here.
    Any,
    /// Distinct literals seen here, rendered as `[a,b]`.
    OneOf(BTreeSet<String>),
}

impl fmt::Display for ReducedField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReducedField::Any => f.write_str("*"),
            ReducedField::OneOf(values) => {
                f.write_str("[")?;
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    f.write_str(value)?;
                }
                f.write_str("]")
            }
        }
    }
}

/// The single pattern covering a set of [`AddressPattern`]s.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReducedPattern {
    fields: [ReducedField; FIELD_COUNT],
}

impl ReducedPattern {
    /// Resolved fields in address order.
    pub fn fields(&self) -> &[ReducedField; FIELD_COUNT] {
        &self.fields
    }

    /// True if every field resolved to `*`.
    pub fn is_all(&self) -> bool {
        self.fields.iter().all(|f| *f == ReducedField::Any)
    }
}

impl fmt::Display for ReducedPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{}", field)?;
        }
        Ok(())
    }
}

/// Reduce patterns to one covering pattern, or `None` for empty input.
///
/// Fields are independent. A field resolves to `*` if any input has `*`
/// there, whatever order the inputs come in; otherwise it resolves to the
/// distinct literals seen.
pub fn reduce<'a, I>(patterns: I) -> Option<ReducedPattern>
where
    I: IntoIterator<Item = &'a AddressPattern>,
{
    let mut wildcard = [false; FIELD_COUNT];
    let mut literals: [BTreeSet<String>; FIELD_COUNT] = Default::default();
    let mut seen = false;

    for pattern in patterns {
        seen = true;
        for (i, field) in pattern.fields.iter().enumerate() {
            match field {
                AddressField::Any => wildcard[i] = true,
                AddressField::Literal(value) => {
                    literals[i].insert(value.clone());
                }
            }
        }
    }

    if !seen {
        return None;
    }

    let mut fields: [ReducedField; FIELD_COUNT] = std::array::from_fn(|_| ReducedField::Any);
    for (i, (slot, values)) in fields.iter_mut().zip(literals).enumerate() {
        if !wildcard[i] {
            *slot = ReducedField::OneOf(values);
        }
    }
    Some(ReducedPattern { fields })
}

/// What a reload request should restart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReloadTarget {
    /// Every process (`*.*.*.*`).
    All,
    /// Processes matching the reduced pattern.
    Selective(ReducedPattern),
    /// No staged artifact maps to any process.
    Nothing,
}

impl ReloadTarget {
    /// Target expression handed to the reload command, `None` for
    /// [`ReloadTarget::Nothing`].
    pub fn expression(&self) -> Option<String> {
        match self {
            ReloadTarget::All => Some(ALL_PROCESSES.to_string()),
            ReloadTarget::Selective(pattern) => Some(pattern.to_string()),
            ReloadTarget::Nothing => None,
        }
    }

    pub fn is_nothing(&self) -> bool {
        matches!(self, ReloadTarget::Nothing)
    }
}

impl fmt::Display for ReloadTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReloadTarget::All => f.write_str(ALL_PROCESSES),
            ReloadTarget::Selective(pattern) => write!(f, "{}", pattern),
            ReloadTarget::Nothing => Ok(()),
        }
    }
}
