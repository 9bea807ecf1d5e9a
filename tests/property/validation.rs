// Copyright (c) 2025 - Cowboy AI, Inc.
//! Property-Based Tests for Outcome Composition
//!
//! Accumulating combinators keep every failure in input order; the
//! short-circuiting chain stops at the first one.

use cim_aggregate_store::errors::{DomainError, Failures};
use cim_aggregate_store::outcome::{collect_all, fail, zip2, zip3, Outcome, Validation};
use proptest::prelude::*;

/// `Ok(n)` or a failure list of `k` distinct messages
fn outcome() -> impl Strategy<Value = Outcome<u32>> {
    prop_oneof![
        any::<u32>().prop_map(Ok::<u32, Failures>),
        (1usize..4, any::<u16>()).prop_map(|(count, tag)| {
            let mut errors = (0..count)
                .map(|i| DomainError::validation(format!("check {tag}-{i}")));
            let mut failures = Failures::new(errors.next().unwrap());
            for error in errors {
                failures.push(error);
            }
            Err(failures)
        }),
    ]
}

fn messages<T>(outcome: &Outcome<T>) -> Vec<String> {
    match outcome {
        Ok(_) => Vec::new(),
        Err(failures) => failures.messages(),
    }
}

fn chain(outcomes: Vec<Outcome<u32>>) -> Outcome<()> {
    for outcome in outcomes {
        outcome?;
    }
    Ok(())
}

proptest! {
    /// Property: collect_all keeps every failure, in order
    #[test]
    fn prop_collect_all_accumulates(outcomes in prop::collection::vec(outcome(), 0..10)) {
        let expected: Vec<String> = outcomes.iter().flat_map(|o| messages(o)).collect();
        let values: Vec<u32> = outcomes.iter().filter_map(|o| o.as_ref().ok().copied()).collect();

        match collect_all(outcomes) {
            Ok(collected) => {
                prop_assert!(expected.is_empty());
                prop_assert_eq!(collected, values);
            }
            Err(failures) => prop_assert_eq!(failures.messages(), expected),
        }
    }

    /// Property: zip3 is zip2 applied twice
    #[test]
    fn prop_zip3_matches_nested_zip2(a in outcome(), b in outcome(), c in outcome()) {
        let flat = zip3(a.clone(), b.clone(), c.clone());
        let nested = zip2(zip2(a, b), c).map(|((a, b), c)| (a, b, c));
        prop_assert_eq!(flat, nested);
    }

    /// Property: a Validation reports as many failures as its checks produced
    #[test]
    fn prop_validation_counts_failures(outcomes in prop::collection::vec(outcome(), 0..10)) {
        let total: usize = outcomes.iter().map(|o| messages(o).len()).sum();
        let result = outcomes
            .into_iter()
            .fold(Validation::new(), |validation, outcome| validation.check(outcome))
            .finish(|| ());

        prop_assert_eq!(result.err().map_or(0, |f| f.len()), total);
    }

    /// Property: the `?` chain stops at its first failure
    #[test]
    fn prop_short_circuit_keeps_only_first(outcomes in prop::collection::vec(outcome(), 1..10)) {
        let first_failure = outcomes.iter().find(|o| o.is_err()).cloned();

        let chained = chain(outcomes);

        match first_failure {
            Some(expected) => prop_assert_eq!(chained.unwrap_err(), expected.unwrap_err()),
            None => prop_assert!(chained.is_ok()),
        }
    }
}

#[test]
fn test_fail_holds_exactly_one_error() {
    let outcome: Outcome<()> = fail(DomainError::validation("name is required"));
    assert_eq!(outcome.unwrap_err().len(), 1);
}
