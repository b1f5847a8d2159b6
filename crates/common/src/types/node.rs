// Copyright (C) 2025 Zhuo Zhang and Wuqi Zhang
// SPDX-License-Identifier: AGPL-3.0
//! Node types emitted into the property graph.

use serde::{Deserialize, Serialize};

/// The closed set of node types the analyzer emits.
///
/// The string token returned by [`NodeKind::as_str`] is the `KIND` component
/// of semantic node identifiers and the value persisted by graph backends, so
/// it must never change for an existing variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum NodeKind {
    /// A source file.
    Module,
    /// A free-standing callable (declaration, expression, or arrow).
    Function,
    /// A callable attached to a class.
    Method,
    /// A class declaration or expression.
    Class,
    /// A TypeScript interface.
    Interface,
    /// A TypeScript type alias.
    TypeAlias,
    /// A TypeScript enum.
    Enum,
    /// A decorator applied to a class or member.
    Decorator,
    /// A mutable binding.
    Variable,
    /// An immutable binding with a literal, new-expression, or loop-binding initializer.
    Constant,
    /// A lexical region.
    Scope,
    /// A call site.
    Call,
    /// A `new X()` site.
    ConstructorCall,
    /// An import declaration.
    Import,
    /// An export declaration.
    Export,
    /// A module outside the analyzed project.
    ExternalModule,
    /// A literal value anchor.
    Literal,
    /// A generic expression anchor.
    Expression,
    /// An object literal anchor.
    ObjectLiteral,
    /// An array literal anchor.
    ArrayLiteral,
    /// A member-expression read.
    PropertyAccess,
    /// An if / switch / ternary.
    Branch,
    /// A switch clause.
    Case,
    /// One of the five loop kinds.
    Loop,
    /// A try block anchor, distinct from its body scope.
    TryBlock,
    /// A catch block anchor.
    CatchBlock,
    /// A finally block anchor.
    FinallyBlock,
    /// An array write (indexed or via mutating method).
    ArrayMutation,
    /// An object property write.
    ObjectMutation,
    /// An `++`/`--` expression.
    UpdateExpression,
    /// Standard stream interaction (emitted by companion plugins).
    NetStdio,
    /// A generic network request (emitted by companion plugins).
    NetRequest,
    /// An event listener registration (emitted by companion plugins).
    EventListener,
    /// An HTTP request (emitted by companion plugins).
    HttpRequest,
}

impl NodeKind {
    /// Returns the stable string token for this node kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Module => "MODULE",
            Self::Function => "FUNCTION",
            Self::Method => "METHOD",
            Self::Class => "CLASS",
            Self::Interface => "INTERFACE",
            Self::TypeAlias => "TYPE",
            Self::Enum => "ENUM",
            Self::Decorator => "DECORATOR",
            Self::Variable => "VARIABLE",
            Self::Constant => "CONSTANT",
            Self::Scope => "SCOPE",
            Self::Call => "CALL",
            Self::ConstructorCall => "CONSTRUCTOR_CALL",
            Self::Import => "IMPORT",
            Self::Export => "EXPORT",
            Self::ExternalModule => "EXTERNAL_MODULE",
            Self::Literal => "LITERAL",
            Self::Expression => "EXPRESSION",
            Self::ObjectLiteral => "OBJECT_LITERAL",
            Self::ArrayLiteral => "ARRAY_LITERAL",
            Self::PropertyAccess => "PROPERTY_ACCESS",
            Self::Branch => "BRANCH",
            Self::Case => "CASE",
            Self::Loop => "LOOP",
            Self::TryBlock => "TRY_BLOCK",
            Self::CatchBlock => "CATCH_BLOCK",
            Self::FinallyBlock => "FINALLY_BLOCK",
            Self::ArrayMutation => "ARRAY_MUTATION",
            Self::ObjectMutation => "OBJECT_MUTATION",
            Self::UpdateExpression => "UPDATE_EXPRESSION",
            Self::NetStdio => "net:stdio",
            Self::NetRequest => "net:request",
            Self::EventListener => "event:listener",
            Self::HttpRequest => "http:request",
        }
    }

    /// All node kinds, in declaration order.
    pub const ALL: [Self; 34] = [
        Self::Module,
        Self::Function,
        Self::Method,
        Self::Class,
        Self::Interface,
        Self::TypeAlias,
        Self::Enum,
        Self::Decorator,
        Self::Variable,
        Self::Constant,
        Self::Scope,
        Self::Call,
        Self::ConstructorCall,
        Self::Import,
        Self::Export,
        Self::ExternalModule,
        Self::Literal,
        Self::Expression,
        Self::ObjectLiteral,
        Self::ArrayLiteral,
        Self::PropertyAccess,
        Self::Branch,
        Self::Case,
        Self::Loop,
        Self::TryBlock,
        Self::CatchBlock,
        Self::FinallyBlock,
        Self::ArrayMutation,
        Self::ObjectMutation,
        Self::UpdateExpression,
        Self::NetStdio,
        Self::NetRequest,
        Self::EventListener,
        Self::HttpRequest,
    ];
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<NodeKind> for String {
    fn from(kind: NodeKind) -> Self {
        kind.as_str().to_string()
    }
}

impl TryFrom<String> for NodeKind {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::ALL
            .iter()
            .find(|kind| kind.as_str() == value)
            .copied()
            .ok_or_else(|| format!("unknown node kind: {value}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_kind_tokens_round_trip() {
        for kind in NodeKind::ALL {
            let token = kind.as_str().to_string();
            assert_eq!(NodeKind::try_from(token).unwrap(), kind);
        }
    }

    #[test]
    fn test_node_kind_tokens_are_unique() {
        let mut tokens: Vec<_> = NodeKind::ALL.iter().map(|k| k.as_str()).collect();
        tokens.sort_unstable();
        tokens.dedup();
        assert_eq!(tokens.len(), NodeKind::ALL.len());
    }
}
