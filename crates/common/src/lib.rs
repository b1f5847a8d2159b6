// Copyright (C) 2025 Zhuo Zhang and Wuqi Zhang
// SPDX-License-Identifier: AGPL-3.0
//! CPG Common - Shared functionality for CPG components
//!
//! This crate provides the graph model shared by the analyzer engine and any
//! graph backend implementation: node and edge records, the [`GraphStore`]
//! trait, logging setup, and an in-memory store for tests.

pub mod graph;
pub mod logging;
pub mod test_utils;
pub mod types;

pub use graph::*;
pub use logging::*;
pub use types::*;
