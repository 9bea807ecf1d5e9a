// Copyright (c) 2025 - Cowboy AI, Inc.
//! Property-Based Tests Module
//!
//! This module contains property-based tests using proptest to verify
//! fundamental properties of aggregate replay, projections and outcome
//! composition.

mod event_application;
mod validation;
