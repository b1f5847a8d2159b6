// Copyright (C) 2025 Zhuo Zhang and Wuqi Zhang
// SPDX-License-Identifier: AGPL-3.0
//! Edge types emitted into the property graph.

use serde::{Deserialize, Serialize};

/// The closed set of edge types the analyzer emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EdgeKind {
    /// Structural containment (module → declaration, scope → node).
    Contains,
    /// A scope declares a binding.
    Declares,
    /// A caller reaches a call site.
    Calls,
    /// A construct owns its body scope.
    HasScope,
    /// A closure scope captures from an enclosing scope.
    Captures,
    /// A mutation record targets a binding.
    Modifies,
    /// An object mutation writes to a target.
    WritesTo,
    /// A module imports a declaration.
    Imports,
    /// A constructor call instantiates a class.
    InstanceOf,
    /// An error flow is handled by a catch block.
    HandledBy,
    /// A call receives an inline callback.
    HasCallback,
    /// A call passes an argument value.
    PassesArgument,
    /// A call performs a network request.
    MakesRequest,
    /// An import pulls from an external module.
    ImportsFrom,
    /// A binding is assigned from a value source.
    AssignedFrom,
    /// A class implements an interface.
    Implements,
    /// A class or interface extends another.
    Extends,
    /// A construct is decorated.
    DecoratedBy,
    /// A generic construct declares a type parameter.
    HasTypeParameter,
    /// A resolve/reject call resolves a promise constructor.
    ResolvesTo,
    /// A branch or loop owns its condition expression.
    HasCondition,
    /// A branch owns its consequent.
    HasConsequent,
    /// A branch owns its alternate.
    HasAlternate,
    /// A try block owns its catch block.
    HasCatch,
    /// A try block owns its finally block.
    HasFinally,
    /// A catch block receives errors from a try block.
    CatchesFrom,
    /// A function throws an error value.
    Throws,
    /// A function rejects with an error value.
    Rejects,
    /// A destructured binding derives from a source.
    DerivesFrom,
    /// A value flows into a target (promise resolution arguments).
    FlowsInto,
    /// A function returns a value source.
    Returns,
    /// A generator yields a value source.
    Yields,
    /// A delegating yield hands control to another iterable.
    DelegatesTo,
    /// A property access reads from an object.
    ReadsFrom,
    /// A loop iterates over a target.
    IteratesOver,
}

impl EdgeKind {
    /// Returns the stable string token for this edge kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Contains => "CONTAINS",
            Self::Declares => "DECLARES",
            Self::Calls => "CALLS",
            Self::HasScope => "HAS_SCOPE",
            Self::Captures => "CAPTURES",
            Self::Modifies => "MODIFIES",
            Self::WritesTo => "WRITES_TO",
            Self::Imports => "IMPORTS",
            Self::InstanceOf => "INSTANCE_OF",
            Self::HandledBy => "HANDLED_BY",
            Self::HasCallback => "HAS_CALLBACK",
            Self::PassesArgument => "PASSES_ARGUMENT",
            Self::MakesRequest => "MAKES_REQUEST",
            Self::ImportsFrom => "IMPORTS_FROM",
            Self::AssignedFrom => "ASSIGNED_FROM",
            Self::Implements => "IMPLEMENTS",
            Self::Extends => "EXTENDS",
            Self::DecoratedBy => "DECORATED_BY",
            Self::HasTypeParameter => "HAS_TYPE_PARAMETER",
            Self::ResolvesTo => "RESOLVES_TO",
            Self::HasCondition => "HAS_CONDITION",
            Self::HasConsequent => "HAS_CONSEQUENT",
            Self::HasAlternate => "HAS_ALTERNATE",
            Self::HasCatch => "HAS_CATCH",
            Self::HasFinally => "HAS_FINALLY",
            Self::CatchesFrom => "CATCHES_FROM",
            Self::Throws => "THROWS",
            Self::Rejects => "REJECTS",
            Self::DerivesFrom => "DERIVES_FROM",
            Self::FlowsInto => "FLOWS_INTO",
            Self::Returns => "RETURNS",
            Self::Yields => "YIELDS",
            Self::DelegatesTo => "DELEGATES_TO",
            Self::ReadsFrom => "READS_FROM",
            Self::IteratesOver => "ITERATES_OVER",
        }
    }
}

impl std::fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
