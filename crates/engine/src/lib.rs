// CPG - Code Property Graph Engine for JavaScript and TypeScript
// Copyright (C) 2025 Zhuo Zhang and Wuqi Zhang
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! CPG Engine - the per-module AST analyzer.
//!
//! Walks the syntax tree of JavaScript/TypeScript modules and emits a
//! property graph of declarations, control flow, data flow, and cross-module
//! references. Parsing is handled by swc with the full superset grammar;
//! persistence goes through the [`cpg_common::GraphStore`] interface.

pub mod analysis;
pub mod config;
pub mod orchestration;
pub mod parser;

pub use analysis::{AnalysisError, JsAstAnalyzer, ModuleInfo, ModuleRecords};
pub use config::{EngineConfig, WorkerMode};
pub use orchestration::{HashGate, ModuleTask, RunSummary, WorkerOrchestrator};
pub use parser::{ParseError, ParsedModule, SourceParser};
