// Copyright (c) 2025 - Cowboy AI, Inc.
//! Outcome: success value or a non-empty list of errors
//!
//! Two composition modes are provided and they are deliberately separate:
//!
//! - **Accumulating** ([`Validation`], [`zip2`], [`zip3`]): independent checks
//!   all run and every failure is collected. Used for multi-field validation.
//! - **Short-circuiting** (`?` and [`Result::and_then`]): each step depends on
//!   the previous one, so the first failure stops the pipeline.
//!
//! ```rust
//! use cim_aggregate_store::outcome::{Outcome, Validation};
//! use cim_aggregate_store::DomainError;
//!
//! fn non_empty(field: &str, value: &str) -> Outcome<()> {
//!     if value.trim().is_empty() {
//!         return Err(DomainError::validation(format!("{field} is required")).into());
//!     }
//!     Ok(())
//! }
//!
//! let result = Validation::new()
//!     .check(non_empty("name", ""))
//!     .check(non_empty("callsign", ""))
//!     .finish(|| ());
//!
//! assert_eq!(result.unwrap_err().len(), 2);
//! ```

use crate::errors::{DomainError, Failures};

/// Result type used across the crate
pub type Outcome<T> = Result<T, Failures>;

/// Lift a single error into a failed outcome
pub fn fail<T>(error: DomainError) -> Outcome<T> {
    Err(Failures::new(error))
}

/// Accumulating validator
///
/// Collects the failures of every check it is given; nothing short-circuits.
#[derive(Debug, Default)]
pub struct Validation {
    failures: Option<Failures>,
}

impl Validation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the outcome of an independent check
    pub fn check<T>(mut self, outcome: Outcome<T>) -> Self {
        if let Err(errors) = outcome {
            self.record(errors);
        }
        self
    }

    /// Run a check and keep its value if it succeeded
    ///
    /// The returned `Option` is `None` when the check failed, which lets later
    /// independent checks still run.
    pub fn value<T>(&mut self, outcome: Outcome<T>) -> Option<T> {
        match outcome {
            Ok(value) => Some(value),
            Err(errors) => {
                self.record(errors);
                None
            }
        }
    }

    /// Record a failed check when `condition` is false
    pub fn ensure(self, condition: bool, error: impl FnOnce() -> DomainError) -> Self {
        if condition {
            self
        } else {
            self.check::<()>(fail(error()))
        }
    }

    /// Produce the value if every check passed, otherwise all failures
    pub fn finish<T>(self, build: impl FnOnce() -> T) -> Outcome<T> {
        match self.failures {
            None => Ok(build()),
            Some(failures) => Err(failures),
        }
    }

    fn record(&mut self, errors: Failures) {
        match &mut self.failures {
            Some(existing) => existing.extend(errors),
            None => self.failures = Some(errors),
        }
    }
}

/// Combine two independent outcomes, accumulating both failure lists
pub fn zip2<A, B>(a: Outcome<A>, b: Outcome<B>) -> Outcome<(A, B)> {
    match (a, b) {
        (Ok(a), Ok(b)) => Ok((a, b)),
        (Err(e), Ok(_)) | (Ok(_), Err(e)) => Err(e),
        (Err(mut e1), Err(e2)) => {
            e1.extend(e2);
            Err(e1)
        }
    }
}

/// Combine three independent outcomes, accumulating every failure list
pub fn zip3<A, B, C>(a: Outcome<A>, b: Outcome<B>, c: Outcome<C>) -> Outcome<(A, B, C)> {
    match (zip2(a, b), c) {
        (Ok((a, b)), Ok(c)) => Ok((a, b, c)),
        (Err(e), Ok(_)) | (Ok(_), Err(e)) => Err(e),
        (Err(mut e1), Err(e2)) => {
            e1.extend(e2);
            Err(e1)
        }
    }
}

/// Collect a sequence of independent outcomes
///
/// All items are evaluated; the result holds either every value or every error.
pub fn collect_all<T>(outcomes: impl IntoIterator<Item = Outcome<T>>) -> Outcome<Vec<T>> {
    let mut values = Vec::new();
    let mut validation = Validation::new();
    for outcome in outcomes {
        if let Some(value) = validation.value(outcome) {
            values.push(value);
        }
    }
    validation.finish(|| values)
}
