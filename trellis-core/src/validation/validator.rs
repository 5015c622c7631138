//! Validators.
//!
//! A [`Validator`] checks one property value and returns a message when the
//! value is invalid. Closures of the shape `Fn(&T) -> Result<(), String>`
//! are validators, and a few stock ones cover the common cases.

use std::fmt::Display;
use std::sync::atomic::{AtomicU64, Ordering};

/// Identity of one registered validator, used to remove it again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ValidatorId(u64);

impl ValidatorId {
    pub(crate) fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// Checks a property value.
pub trait Validator<T: ?Sized>: Send + Sync + 'static {
    /// `Err(message)` when `value` is invalid.
    fn validate(&self, value: &T) -> Result<(), String>;
}

impl<T, F> Validator<T> for F
where
    T: ?Sized,
    F: Fn(&T) -> Result<(), String> + Send + Sync + 'static,
{
    fn validate(&self, value: &T) -> Result<(), String> {
        self(value)
    }
}

/// Fails with a fixed message whenever the predicate returns `false`.
pub struct Predicate<F> {
    check: F,
    message: String,
}

impl<F> Predicate<F> {
    pub fn new(message: impl Into<String>, check: F) -> Self {
        Self {
            check,
            message: message.into(),
        }
    }
}

impl<T, F> Validator<T> for Predicate<F>
where
    T: ?Sized,
    F: Fn(&T) -> bool + Send + Sync + 'static,
{
    fn validate(&self, value: &T) -> Result<(), String> {
        if (self.check)(value) {
            Ok(())
        } else {
            Err(self.message.clone())
        }
    }
}

/// Text must contain something other than whitespace.
#[derive(Debug, Clone)]
pub struct Required {
    message: String,
}

impl Required {
    pub fn new() -> Self {
        Self::with_message("a value is required")
    }

    pub fn with_message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl Default for Required {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: AsRef<str> + ?Sized> Validator<T> for Required {
    fn validate(&self, value: &T) -> Result<(), String> {
        if value.as_ref().trim().is_empty() {
            Err(self.message.clone())
        } else {
            Ok(())
        }
    }
}

/// Value must lie within inclusive bounds.
#[derive(Debug, Clone)]
pub struct Range<T> {
    min: Option<T>,
    max: Option<T>,
}

impl<T> Range<T> {
    pub fn between(min: T, max: T) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
        }
    }

    pub fn at_least(min: T) -> Self {
        Self {
            min: Some(min),
            max: None,
        }
    }

    pub fn at_most(max: T) -> Self {
        Self {
            min: None,
            max: Some(max),
        }
    }
}

impl<T> Validator<T> for Range<T>
where
    T: PartialOrd + Display + Send + Sync + 'static,
{
    fn validate(&self, value: &T) -> Result<(), String> {
        if let Some(min) = &self.min {
            if value < min {
                return Err(format!("must be at least {min}"));
            }
        }
        if let Some(max) = &self.max {
            if value > max {
                return Err(format!("must be at most {max}"));
            }
        }
        Ok(())
    }
}

/// Text must not exceed a number of characters.
#[derive(Debug, Clone, Copy)]
pub struct MaxLength(pub usize);

impl<T: AsRef<str> + ?Sized> Validator<T> for MaxLength {
    fn validate(&self, value: &T) -> Result<(), String> {
        let length = value.as_ref().chars().count();
        if length > self.0 {
            Err(format!("must be at most {} characters", self.0))
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closures_are_validators() {
        let even = |value: &i32| {
            if value % 2 == 0 {
                Ok(())
            } else {
                Err("must be even".to_string())
            }
        };
        assert!(even.validate(&4).is_ok());
        assert_eq!(even.validate(&3), Err("must be even".to_string()));
    }

    #[test]
    fn predicate_uses_its_message() {
        let positive = Predicate::new("must be positive", |value: &i64| *value > 0);
        assert!(positive.validate(&1).is_ok());
        assert_eq!(positive.validate(&0).unwrap_err(), "must be positive");
    }

    #[test]
    fn required_rejects_blank_text() {
        let required = Required::new();
        assert!(Validator::<str>::validate(&required, "x").is_ok());
        assert!(Validator::<String>::validate(&required, &"  ".to_string()).is_err());
    }

    #[test]
    fn range_bounds_are_inclusive() {
        let range = Range::between(1, 10);
        assert!(range.validate(&1).is_ok());
        assert!(range.validate(&10).is_ok());
        assert_eq!(range.validate(&0).unwrap_err(), "must be at least 1");
        assert_eq!(range.validate(&11).unwrap_err(), "must be at most 10");
        assert!(Range::at_least(5).validate(&100).is_ok());
        assert!(Range::at_most(0.5).validate(&0.75).is_err());
    }

    #[test]
    fn max_length_counts_characters() {
        let max = MaxLength(3);
        assert!(Validator::<str>::validate(&max, "äöü").is_ok());
        assert!(Validator::<str>::validate(&max, "abcd").is_err());
    }
}
