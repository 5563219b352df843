// Copyright (c) 2025 - Cowboy AI, Inc.
//! Property-Based Tests Module
//!
//! Properties of the reducers that must hold for every history.

mod state_derivation;
