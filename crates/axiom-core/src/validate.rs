//! Field-level validation shared by the four record kinds.
//!
//! Everything here is pure: a predicate either accepts the value or returns a
//! [`ValidationError`] naming the record kind and the offending field.

use std::fmt;

use thiserror::Error;

use crate::entity::EntityKind;

/// What was wrong with a field.
#[derive(Debug, Clone, PartialEq)]
pub enum Problem {
  /// A required text field was empty or whitespace only.
  Blank,
  /// A number fell outside its closed range (or was NaN).
  OutOfRange { value: f64, min: f64, max: f64 },
  /// Text that should name an enum member did not.
  UnknownVariant(String),
  /// The value had the wrong JSON shape for the field.
  WrongType { expected: &'static str },
  /// A timestamp earlier than the record's creation.
  BeforeCreation,
  /// A new record must start in its initial state.
  NotInitial,
  /// A list filter that does not apply to the listed kind.
  NotApplicable,
}

impl fmt::Display for Problem {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Blank => f.write_str("must not be blank"),
      Self::OutOfRange { value, min, max } => {
        write!(f, "{value} is outside [{min}, {max}]")
      }
      Self::UnknownVariant(v) => write!(f, "unknown value {v:?}"),
      Self::WrongType { expected } => write!(f, "expected {expected}"),
      Self::BeforeCreation => f.write_str("precedes the record's creation"),
      Self::NotInitial => f.write_str("must start in its initial state"),
      Self::NotApplicable => f.write_str("does not apply to this kind"),
    }
  }
}

/// A single field-level violation, local to one record.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("invalid {entity}.{field}: {problem}")]
pub struct ValidationError {
  pub entity:  EntityKind,
  pub field:   &'static str,
  pub problem: Problem,
}

impl ValidationError {
  pub fn new(entity: EntityKind, field: &'static str, problem: Problem) -> Self {
    Self { entity, field, problem }
  }
}

/// Reject empty or whitespace-only text.
pub fn require_text(
  entity: EntityKind,
  field: &'static str,
  value: &str,
) -> Result<(), ValidationError> {
  if value.trim().is_empty() {
    return Err(ValidationError::new(entity, field, Problem::Blank));
  }
  Ok(())
}

/// Reject any blank entry in a list of text values.
pub fn require_each(
  entity: EntityKind,
  field: &'static str,
  values: &[String],
) -> Result<(), ValidationError> {
  values
    .iter()
    .try_for_each(|v| require_text(entity, field, v))
}

/// Accept only values inside the closed unit interval. NaN is rejected.
pub fn require_unit_interval(
  entity: EntityKind,
  field: &'static str,
  value: f64,
) -> Result<(), ValidationError> {
  if !(0.0..=1.0).contains(&value) {
    return Err(ValidationError::new(entity, field, Problem::OutOfRange {
      value,
      min: 0.0,
      max: 1.0,
    }));
  }
  Ok(())
}
