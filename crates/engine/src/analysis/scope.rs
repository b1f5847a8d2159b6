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

//! Lexical scope tracking during traversal.
//!
//! The tracker maintains a stack of named scopes from the module root down to
//! the current position, plus the counters that disambiguate anonymous
//! siblings. Scope paths rendered by [`ScopeTracker::scope_path`] are the
//! backbone of semantic node identifiers, so their shape must stay stable.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Kinds of lexical scopes tracked during traversal.
///
/// `Module` and `Class` segments participate in scope paths and enclosing
/// lookups but are never emitted as SCOPE nodes themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeKind {
    /// The module root.
    Module,
    /// A class body (path segment only).
    Class,
    /// A named function's body.
    FunctionBody,
    /// A named function expression's body.
    Closure,
    /// An arrow function's body.
    ArrowBody,
    /// An inline callback's body.
    CallbackBody,
    /// The consequent of an if statement.
    If,
    /// The alternate of an if statement.
    Else,
    /// A try block body.
    TryBlock,
    /// A catch block body.
    CatchBlock,
    /// A finally block body.
    FinallyBlock,
    /// A classic for loop body.
    For,
    /// A for-in loop body.
    ForIn,
    /// A for-of loop body.
    ForOf,
    /// A while loop body.
    While,
    /// A do-while loop body.
    DoWhile,
    /// A switch case body.
    SwitchCase,
}

impl ScopeKind {
    /// The `scopeType` attribute value stored on SCOPE nodes.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Module => "module",
            Self::Class => "class",
            Self::FunctionBody => "function_body",
            Self::Closure => "closure",
            Self::ArrowBody => "arrow_body",
            Self::CallbackBody => "callback_body",
            Self::If => "if_statement",
            Self::Else => "else_statement",
            Self::TryBlock => "try-block",
            Self::CatchBlock => "catch-block",
            Self::FinallyBlock => "finally-block",
            Self::For => "for-loop",
            Self::ForIn => "for-in-loop",
            Self::ForOf => "for-of-loop",
            Self::While => "while-loop",
            Self::DoWhile => "do-while-loop",
            Self::SwitchCase => "switch-case",
        }
    }

    /// Short tag used for counted path segments (`if[1]`, `arrow[2]`, ...).
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Module => "module",
            Self::Class => "class",
            Self::FunctionBody => "function",
            Self::Closure => "closure",
            Self::ArrowBody => "arrow",
            Self::CallbackBody => "callback",
            Self::If => "if",
            Self::Else => "else",
            Self::TryBlock => "try",
            Self::CatchBlock => "catch",
            Self::FinallyBlock => "finally",
            Self::For => "for",
            Self::ForIn => "forin",
            Self::ForOf => "forof",
            Self::While => "while",
            Self::DoWhile => "dowhile",
            Self::SwitchCase => "case",
        }
    }

    /// Returns true for scopes only entered when a condition holds.
    pub fn is_conditional(&self) -> bool {
        matches!(
            self,
            Self::If
                | Self::Else
                | Self::CatchBlock
                | Self::For
                | Self::ForIn
                | Self::ForOf
                | Self::While
                | Self::DoWhile
                | Self::SwitchCase
        )
    }
}

#[derive(Debug)]
struct ScopeFrame {
    name: String,
    kind: ScopeKind,
    /// Per-tag counters confined to this scope's lifetime.
    sibling_counters: HashMap<&'static str, usize>,
}

/// A stack of named scopes with per-scope sibling counters and a
/// traversal-global item counter.
///
/// Enter/exit is strictly LIFO; exiting more scopes than were entered is a
/// programmer error and panics.
#[derive(Debug)]
pub struct ScopeTracker {
    stack: Vec<ScopeFrame>,
    /// Per-tag counters keyed across the whole traversal.
    item_counters: HashMap<String, usize>,
}

impl ScopeTracker {
    /// Creates a tracker rooted at the module's file name.
    pub fn new(module_name: &str) -> Self {
        Self {
            stack: vec![ScopeFrame {
                name: module_name.to_string(),
                kind: ScopeKind::Module,
                sibling_counters: HashMap::new(),
            }],
            item_counters: HashMap::new(),
        }
    }

    /// Pushes a named scope.
    pub fn enter_scope(&mut self, name: &str, kind: ScopeKind) {
        self.stack.push(ScopeFrame {
            name: name.to_string(),
            kind,
            sibling_counters: HashMap::new(),
        });
    }

    /// Pushes an anonymous scope named `tag[n]`, where `n` is a monotonic
    /// index unique within the current sibling group. Returns `n`.
    pub fn enter_counted_scope(&mut self, kind: ScopeKind) -> usize {
        let index = self.sibling_index(kind.tag());
        self.enter_scope(&format!("{}[{index}]", kind.tag()), kind);
        index
    }

    /// Pops the current scope. Panics on underflow past the module root.
    pub fn exit_scope(&mut self) {
        assert!(self.stack.len() > 1, "scope stack underflow: exit without matching enter");
        self.stack.pop();
    }

    /// Number of scopes below the module root.
    pub fn depth(&self) -> usize {
        self.stack.len() - 1
    }

    /// Dotted scope path from the module root, e.g.
    /// `"file.ts->MyClass->myMethod->if[1]"`.
    pub fn scope_path(&self) -> String {
        self.stack.iter().map(|f| f.name.as_str()).collect::<Vec<_>>().join("->")
    }

    /// Name of the current scope.
    pub fn current_name(&self) -> &str {
        &self.stack.last().expect("stack always holds the module root").name
    }

    /// Kind of the current scope.
    pub fn current_kind(&self) -> ScopeKind {
        self.stack.last().expect("stack always holds the module root").kind
    }

    /// Next per-scope index for `tag` within the current scope. Starts at 1
    /// and is confined to the current scope's lifetime.
    pub fn sibling_index(&mut self, tag: &'static str) -> usize {
        let frame = self.stack.last_mut().expect("stack always holds the module root");
        let counter = frame.sibling_counters.entry(tag).or_insert(0);
        *counter += 1;
        *counter
    }

    /// Next traversal-global index for `tag`. Starts at 1 and keys across
    /// the whole traversal regardless of scope.
    pub fn item_counter(&mut self, tag: &str) -> usize {
        let counter = self.item_counters.entry(tag.to_string()).or_insert(0);
        *counter += 1;
        *counter
    }

    /// Name of the nearest enclosing scope of the given kind, if any.
    pub fn enclosing_scope(&self, kind: ScopeKind) -> Option<&str> {
        self.stack.iter().rev().find(|f| f.kind == kind).map(|f| f.name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_path_rendering() {
        let mut scopes = ScopeTracker::new("file.ts");
        scopes.enter_scope("MyClass", ScopeKind::Class);
        scopes.enter_scope("myMethod", ScopeKind::FunctionBody);
        let index = scopes.enter_counted_scope(ScopeKind::If);
        assert_eq!(index, 1);
        assert_eq!(scopes.scope_path(), "file.ts->MyClass->myMethod->if[1]");
    }

    #[test]
    fn test_sibling_counters_are_scope_confined() {
        let mut scopes = ScopeTracker::new("file.ts");
        scopes.enter_scope("f", ScopeKind::FunctionBody);
        assert_eq!(scopes.sibling_index("arrow"), 1);
        assert_eq!(scopes.sibling_index("arrow"), 2);
        scopes.enter_scope("g", ScopeKind::Closure);
        // Fresh scope, fresh counter.
        assert_eq!(scopes.sibling_index("arrow"), 1);
        scopes.exit_scope();
        // Back in `f`, the old counter resumes.
        assert_eq!(scopes.sibling_index("arrow"), 3);
    }

    #[test]
    fn test_item_counter_spans_scopes() {
        let mut scopes = ScopeTracker::new("file.ts");
        assert_eq!(scopes.item_counter("call"), 1);
        scopes.enter_scope("f", ScopeKind::FunctionBody);
        assert_eq!(scopes.item_counter("call"), 2);
        scopes.exit_scope();
        assert_eq!(scopes.item_counter("call"), 3);
    }

    #[test]
    fn test_enclosing_scope_lookup() {
        let mut scopes = ScopeTracker::new("file.ts");
        scopes.enter_scope("Outer", ScopeKind::Class);
        scopes.enter_scope("m", ScopeKind::FunctionBody);
        scopes.enter_counted_scope(ScopeKind::If);
        assert_eq!(scopes.enclosing_scope(ScopeKind::Class), Some("Outer"));
        assert_eq!(scopes.enclosing_scope(ScopeKind::While), None);
    }

    #[test]
    fn test_two_anonymous_arrows_get_distinct_paths() {
        let mut scopes = ScopeTracker::new("file.ts");
        scopes.enter_scope("f", ScopeKind::FunctionBody);
        scopes.enter_counted_scope(ScopeKind::ArrowBody);
        let first = scopes.scope_path();
        scopes.exit_scope();
        scopes.enter_counted_scope(ScopeKind::ArrowBody);
        let second = scopes.scope_path();
        assert_ne!(first, second);
    }

    #[test]
    #[should_panic(expected = "scope stack underflow")]
    fn test_exit_underflow_panics() {
        let mut scopes = ScopeTracker::new("file.ts");
        scopes.exit_scope();
    }
}
