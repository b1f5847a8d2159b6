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

//! Module-scoped record buffers.
//!
//! Everything the traversal learns about one module lands here as a typed
//! record. Records live in plain `Vec` buffers owned by [`ModuleRecords`];
//! cross-references between records use [`RecordHandle`]s rather than shared
//! pointers, so the collision resolver can rewrite identifiers in place
//! without reference-counting gymnastics. The buffers are handed to the
//! graph writer in one `build()` call after collision resolution and dropped
//! with the module.

use serde::{Deserialize, Serialize};

use crate::analysis::{ScopeKind, ValueSource};
use cpg_common::NodeKind;

/// Identifies which buffer of [`ModuleRecords`] a record lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BufferKind {
    /// [`ModuleRecords::functions`].
    Function,
    /// [`ModuleRecords::classes`].
    Class,
    /// [`ModuleRecords::ts_constructs`].
    TsConstruct,
    /// [`ModuleRecords::variables`].
    Variable,
    /// [`ModuleRecords::scopes`].
    Scope,
    /// [`ModuleRecords::branches`].
    Branch,
    /// [`ModuleRecords::cases`].
    Case,
    /// [`ModuleRecords::loops`].
    Loop,
    /// [`ModuleRecords::try_blocks`].
    TryBlock,
    /// [`ModuleRecords::catch_blocks`].
    CatchBlock,
    /// [`ModuleRecords::finally_blocks`].
    FinallyBlock,
    /// [`ModuleRecords::calls`].
    Call,
    /// [`ModuleRecords::constructor_calls`].
    ConstructorCall,
    /// [`ModuleRecords::property_accesses`].
    PropertyAccess,
    /// [`ModuleRecords::imports`].
    Import,
    /// [`ModuleRecords::exports`].
    Export,
    /// [`ModuleRecords::external_modules`].
    ExternalModule,
    /// [`ModuleRecords::expressions`].
    Expression,
    /// [`ModuleRecords::object_literals`].
    ObjectLiteral,
    /// [`ModuleRecords::array_literals`].
    ArrayLiteral,
    /// [`ModuleRecords::array_mutations`].
    ArrayMutation,
    /// [`ModuleRecords::object_mutations`].
    ObjectMutation,
    /// [`ModuleRecords::updates`].
    Update,
}

/// A stable reference to a record in one of the module buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordHandle {
    /// The buffer the record lives in.
    pub buffer: BufferKind,
    /// Index within that buffer.
    pub index: usize,
}

/// Source position shared by most records. Lines are 1-based, columns
/// 0-based, matching what the parser reports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLoc {
    /// 1-based line.
    pub line: usize,
    /// 0-based column.
    pub column: usize,
}

impl SourceLoc {
    /// Creates a location.
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

/// Control-flow summary attached to a FUNCTION node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ControlFlowSummary {
    /// The function contains at least one branch.
    pub has_branches: bool,
    /// The function contains at least one loop.
    pub has_loops: bool,
    /// The function contains a try/catch.
    pub has_try_catch: bool,
    /// A return sits inside a conditional ancestor.
    pub has_early_return: bool,
    /// The function contains a throw statement.
    pub has_throw: bool,
    /// 1 + branches + loops + non-default cases + logical operators in conditions.
    pub cyclomatic_complexity: u32,
}

/// A callable: declaration, expression, arrow, or class method.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionRecord {
    /// Node id (rewritten by collision resolution).
    pub id: String,
    /// Function name, or a generated name for anonymous callables.
    pub name: String,
    /// Source position.
    pub loc: SourceLoc,
    /// Declared with `async`.
    pub is_async: bool,
    /// Declared with `*`.
    pub is_generator: bool,
    /// An arrow function.
    pub is_arrow: bool,
    /// A class method (emitted as METHOD).
    pub is_method: bool,
    /// Bound to a name through an assignment expression.
    pub is_assignment: bool,
    /// Passed inline as a call argument.
    pub is_callback: bool,
    /// Enclosing class name for methods.
    pub class_name: Option<String>,
    /// Id of the scope the function is declared in.
    pub parent_scope_id: String,
    /// Control-flow summary, filled when the body traversal finishes.
    pub control_flow: ControlFlowSummary,
    /// Parameter indexes observed to be invoked inside the body.
    pub invoked_param_indexes: Vec<usize>,
}

/// A class declaration or expression.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassRecord {
    /// Node id.
    pub id: String,
    /// Class name.
    pub name: String,
    /// Source position.
    pub loc: SourceLoc,
    /// Name of the extended superclass, if any.
    pub super_class: Option<String>,
    /// Implemented interface names.
    pub implements: Vec<String>,
    /// Decorator names applied to the class.
    pub decorators: Vec<String>,
    /// Id of the scope the class is declared in.
    pub parent_scope_id: String,
}

/// An interface, type alias, enum, or decorator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TsConstructRecord {
    /// Node id.
    pub id: String,
    /// INTERFACE, TYPE, ENUM, or DECORATOR.
    pub kind: NodeKind,
    /// Construct name.
    pub name: String,
    /// Source position.
    pub loc: SourceLoc,
    /// Extended names (interfaces only).
    pub extends: Vec<String>,
    /// Id of the decorated node (decorators only).
    pub target_id: Option<String>,
}

/// A variable or constant binding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariableRecord {
    /// Node id.
    pub id: String,
    /// VARIABLE or CONSTANT.
    pub kind: NodeKind,
    /// Binding name.
    pub name: String,
    /// Source position.
    pub loc: SourceLoc,
    /// Id of the declaring scope.
    pub scope_id: String,
    /// Scope path at the declaration site.
    pub scope_path: String,
}

/// A lexical region emitted as a SCOPE node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScopeRecord {
    /// Node id (also the semantic id).
    pub id: String,
    /// Scope kind.
    pub scope_type: ScopeKind,
    /// Scope name (function name or counted tag).
    pub name: String,
    /// The scope is only entered when a condition holds.
    pub conditional: bool,
    /// Source text of the governing condition, when there is one.
    pub condition: Option<String>,
    /// Id of the parent construct (SCOPE, BRANCH, LOOP, TRY_BLOCK, FUNCTION, or MODULE).
    pub parent_scope_id: String,
    /// Id of the nearest enclosing function, when inside one.
    pub parent_function_id: Option<String>,
    /// Id of the scope a closure captures from.
    pub captures_from: Option<String>,
    /// Source position.
    pub loc: SourceLoc,
}

/// Branch kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BranchKind {
    /// An if statement.
    If,
    /// A conditional expression.
    Ternary,
    /// A switch statement.
    Switch,
}

impl BranchKind {
    /// The `branchType` attribute value.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::If => "if",
            Self::Ternary => "ternary",
            Self::Switch => "switch",
        }
    }
}

/// An if / ternary / switch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BranchRecord {
    /// Node id.
    pub id: String,
    /// Branch kind.
    pub branch_type: BranchKind,
    /// Source text of the test / discriminant.
    pub condition: Option<String>,
    /// Id of the parent scope, or of the outer BRANCH for else-if chains.
    pub parent_id: String,
    /// Source position.
    pub loc: SourceLoc,
}

/// A switch clause.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseRecord {
    /// Node id.
    pub id: String,
    /// The owning switch BRANCH.
    pub branch: RecordHandle,
    /// Source text of the case test; `None` for `default:`.
    pub value: Option<String>,
    /// This is the `default:` clause.
    pub is_default: bool,
    /// The clause falls through into the next one.
    pub falls_through: bool,
    /// The clause has an empty consequent.
    pub is_empty: bool,
    /// Source position.
    pub loc: SourceLoc,
}

/// Loop kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LoopKind {
    /// `for (;;)`.
    For,
    /// `for (x in y)`.
    ForIn,
    /// `for (x of y)`.
    ForOf,
    /// `while`.
    While,
    /// `do {} while`.
    DoWhile,
}

impl LoopKind {
    /// The `loopType` attribute value.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::For => "for",
            Self::ForIn => "for-in",
            Self::ForOf => "for-of",
            Self::While => "while",
            Self::DoWhile => "do-while",
        }
    }

    /// The body scope kind for this loop.
    pub fn body_scope(&self) -> ScopeKind {
        match self {
            Self::For => ScopeKind::For,
            Self::ForIn => ScopeKind::ForIn,
            Self::ForOf => ScopeKind::ForOf,
            Self::While => ScopeKind::While,
            Self::DoWhile => ScopeKind::DoWhile,
        }
    }
}

/// One of the five loop kinds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoopRecord {
    /// Node id.
    pub id: String,
    /// Loop kind.
    pub kind: LoopKind,
    /// Id of the parent scope.
    pub parent_scope_id: String,
    /// Name of the iterated target (for-in / for-of).
    pub iterates_over: Option<String>,
    /// Source text of the init clause (classic for).
    pub init: Option<String>,
    /// Source text of the test clause (classic for).
    pub test: Option<String>,
    /// Source text of the update clause (classic for).
    pub update: Option<String>,
    /// Source text of the condition (while / do-while).
    pub condition: Option<String>,
    /// `for await (... of ...)`.
    pub is_await: bool,
    /// Source position.
    pub loc: SourceLoc,
}

/// A try block anchor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TryBlockRecord {
    /// Node id.
    pub id: String,
    /// Id of the parent scope.
    pub parent_scope_id: String,
    /// Source position.
    pub loc: SourceLoc,
}

/// A catch block anchor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatchBlockRecord {
    /// Node id.
    pub id: String,
    /// The owning try block.
    pub try_block: RecordHandle,
    /// Name of the catch parameter, if bound.
    pub param: Option<String>,
    /// Source position.
    pub loc: SourceLoc,
}

/// A finally block anchor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinallyBlockRecord {
    /// Node id.
    pub id: String,
    /// The owning try block.
    pub try_block: RecordHandle,
    /// Source position.
    pub loc: SourceLoc,
}

/// A call site.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallRecord {
    /// Node id.
    pub id: String,
    /// Callee name (function name, or method name for method calls).
    pub name: String,
    /// Receiver object name for method calls.
    pub object: Option<String>,
    /// Method name for method calls.
    pub method: Option<String>,
    /// The member callee used a computed property.
    pub computed: bool,
    /// This CALL mirrors a `new` expression.
    pub is_new: bool,
    /// The call is wrapped in `await`.
    pub is_awaited: bool,
    /// The call sits syntactically inside a try block.
    pub is_inside_try: bool,
    /// Awaited call inside a loop body.
    pub is_inside_loop: bool,
    /// The callee is a member expression.
    pub is_method_call: bool,
    /// Id of the enclosing scope.
    pub parent_scope_id: String,
    /// Enclosing function record, when inside one.
    pub enclosing_function: Option<RecordHandle>,
    /// Source position (column used for coordinate lookup).
    pub loc: SourceLoc,
}

/// Argument value shapes recorded per call argument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ArgValue {
    /// A plain identifier.
    Variable {
        /// Identifier name.
        name: String,
    },
    /// A literal.
    Literal {
        /// Rendered literal value.
        value: String,
        /// Literal type tag.
        literal_type: String,
    },
    /// An inline callback.
    Function {
        /// Callback name, when named.
        name: Option<String>,
        /// Callback position for coordinate lookup.
        line: usize,
        /// Callback column.
        column: usize,
    },
    /// A nested call.
    Call {
        /// Callee name.
        name: String,
        /// Nested call position.
        line: usize,
        /// Nested call column.
        column: usize,
    },
    /// A member expression.
    Member {
        /// Receiver name.
        object: String,
        /// Property name.
        property: String,
        /// Enclosing class name when the receiver is `this`.
        class_name: Option<String>,
    },
    /// Anything else.
    Expression {
        /// Source snippet.
        repr: String,
    },
}

/// One positional argument of a call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallArgumentRecord {
    /// The owning call.
    pub call: RecordHandle,
    /// Id of the owning call; patched when collision resolution renames it.
    pub call_id: String,
    /// Zero-based argument position.
    pub index: usize,
    /// Argument value shape.
    pub value: ArgValue,
    /// The argument was spread.
    pub spread: bool,
}

/// A `new X()` site.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstructorCallRecord {
    /// Node id (coordinate-based).
    pub id: String,
    /// Constructed class name.
    pub class_name: String,
    /// Wrapped in `await`.
    pub is_awaited: bool,
    /// Id of the enclosing scope.
    pub parent_scope_id: String,
    /// Source position.
    pub loc: SourceLoc,
}

/// A member-expression read (`a.b`, `a?.b`, `new.target`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertyAccessRecord {
    /// Node id.
    pub id: String,
    /// Receiver name.
    pub object: String,
    /// Property name, or `<computed>`.
    pub property: String,
    /// Computed access.
    pub computed: bool,
    /// Optional chaining access.
    pub optional: bool,
    /// The meta-property `new.target`.
    pub is_new_target: bool,
    /// Id of the enclosing scope.
    pub parent_scope_id: String,
    /// Source position.
    pub loc: SourceLoc,
}

/// Import specifier kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportSpecKind {
    /// `import x from "m"`.
    Default,
    /// `import { x } from "m"`.
    Named,
    /// `import * as x from "m"`.
    Namespace,
}

/// One bound name of an import declaration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportSpecRecord {
    /// Local binding name.
    pub local: String,
    /// Imported name when it differs from the local one.
    pub imported: Option<String>,
    /// Specifier kind.
    pub kind: ImportSpecKind,
    /// Type-only import.
    pub type_only: bool,
}

/// An import declaration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportRecord {
    /// Node id.
    pub id: String,
    /// Import source specifier.
    pub source: String,
    /// The source is a bare specifier (package, not a relative path).
    pub is_external: bool,
    /// Bound names.
    pub specifiers: Vec<ImportSpecRecord>,
    /// Source position.
    pub loc: SourceLoc,
}

/// An external module referenced by a bare import specifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalModuleRecord {
    /// Node id.
    pub id: String,
    /// Package specifier.
    pub name: String,
}

/// Export kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportKind {
    /// `export { x }`.
    Named,
    /// `export default ...`.
    Default,
    /// `export * from "m"`.
    All,
    /// `export <declaration>`.
    Decl,
}

/// An export declaration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportRecord {
    /// Node id.
    pub id: String,
    /// Exported name (`default` / `*` for the corresponding kinds).
    pub name: String,
    /// Export kind.
    pub kind: ExportKind,
    /// Re-export source, when present.
    pub source: Option<String>,
    /// Source position.
    pub loc: SourceLoc,
}

/// Detail payload of an EXPRESSION anchor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExpressionDetail {
    /// A member expression.
    Member {
        /// Receiver name.
        object: String,
        /// Property name, or `<computed>`.
        property: String,
        /// Computed access.
        computed: bool,
        /// Key variable name for computed access.
        computed_var: Option<String>,
    },
    /// A binary or logical expression.
    Binary {
        /// Operator token.
        operator: String,
        /// Left operand name, when it is an identifier.
        left: Option<String>,
        /// Right operand name, when it is an identifier.
        right: Option<String>,
    },
    /// A conditional expression.
    Conditional {
        /// Consequent source name, when it is an identifier.
        consequent: Option<String>,
        /// Alternate source name, when it is an identifier.
        alternate: Option<String>,
    },
    /// A template literal.
    Template {
        /// Embedded identifier names.
        identifiers: Vec<String>,
    },
    /// Any other expression shape.
    Other {
        /// Source snippet.
        repr: String,
    },
}

/// A generic expression anchor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpressionRecord {
    /// Node id (`<file>:EXPRESSION:<astKind>:<line>:<column>`).
    pub id: String,
    /// AST kind token used in the id.
    pub ast_kind: String,
    /// Shape-specific detail.
    pub detail: ExpressionDetail,
    /// Source position.
    pub loc: SourceLoc,
}

/// One property of an object literal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectPropertyRecord {
    /// The owning object literal.
    pub object: RecordHandle,
    /// Property key, or `<computed>`.
    pub key: String,
    /// Computed key.
    pub computed: bool,
    /// A spread entry.
    pub is_spread: bool,
    /// A method shorthand entry.
    pub is_method: bool,
    /// Classified property value, when one exists.
    pub value: Option<ValueSource>,
}

/// An object literal anchor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectLiteralRecord {
    /// Node id.
    pub id: String,
    /// Source position.
    pub loc: SourceLoc,
}

/// An array literal anchor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArrayLiteralRecord {
    /// Node id.
    pub id: String,
    /// Classified element values.
    pub elements: Vec<ValueSource>,
    /// Source position.
    pub loc: SourceLoc,
}

/// Array mutation kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArrayMutationKind {
    /// `arr.push(...)`.
    Push,
    /// `arr.unshift(...)`.
    Unshift,
    /// `arr.splice(...)`.
    Splice,
    /// `arr[0] = x`.
    IndexedWrite,
}

impl ArrayMutationKind {
    /// The `method` attribute value.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Push => "push",
            Self::Unshift => "unshift",
            Self::Splice => "splice",
            Self::IndexedWrite => "indexed_write",
        }
    }
}

/// A value inserted by an array mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsertedValue {
    /// Classified value.
    pub value: ValueSource,
    /// The value was spread.
    pub spread: bool,
}

/// An array write.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArrayMutationRecord {
    /// Node id.
    pub id: String,
    /// Mutation kind.
    pub kind: ArrayMutationKind,
    /// Name of the mutated array binding.
    pub array_name: String,
    /// The array is reached through a property (`obj.arr.push(...)`).
    pub is_nested: bool,
    /// Base object name for nested mutations.
    pub base_object: Option<String>,
    /// Property name for nested mutations.
    pub property_name: Option<String>,
    /// Numeric index for indexed writes.
    pub index: Option<f64>,
    /// Inserted values.
    pub inserted: Vec<InsertedValue>,
    /// Scope path at the mutation site.
    pub scope_path: String,
    /// Source position.
    pub loc: SourceLoc,
}

/// Object mutation kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectMutationKind {
    /// `obj.p = x` or `obj["p"] = x`.
    Property,
    /// `obj[key] = x` with a non-literal key.
    Computed,
    /// `Object.assign(obj, ...)`.
    Assign,
}

/// An object property write.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectMutationRecord {
    /// Node id.
    pub id: String,
    /// Name of the mutated object (`this` resolves to the class name).
    pub object_name: String,
    /// Enclosing class name when the target is `this`.
    pub class_name: Option<String>,
    /// Mutation kind.
    pub kind: ObjectMutationKind,
    /// Property name for property-type mutations.
    pub property: Option<String>,
    /// Key variable name for computed-type mutations.
    pub computed_var: Option<String>,
    /// Classified written value.
    pub value: Option<ValueSource>,
    /// Scope path at the mutation site.
    pub scope_path: String,
    /// Source position.
    pub loc: SourceLoc,
}

/// An `++`/`--` expression.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateRecord {
    /// Node id.
    pub id: String,
    /// Updated binding name, or property name for member targets.
    pub target: String,
    /// Receiver name for member targets.
    pub object: Option<String>,
    /// Property name for member targets, or `<computed>`.
    pub property: Option<String>,
    /// Key variable name for computed member targets.
    pub computed_var: Option<String>,
    /// Enclosing class name when the receiver is `this`.
    pub class_name: Option<String>,
    /// Prefix form.
    pub prefix: bool,
    /// `++` or `--`.
    pub op: String,
    /// Scope path at the update site.
    pub scope_path: String,
    /// Source position.
    pub loc: SourceLoc,
}

/// A simple variable assignment (`const x = <expr>` or `x = <expr>`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignmentRecord {
    /// The assigned binding.
    pub variable: RecordHandle,
    /// Classified right-hand side.
    pub source: ValueSource,
    /// Source position.
    pub loc: SourceLoc,
}

/// Where a destructured value comes from when the initializer is a call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallSource {
    /// Callee name.
    pub name: String,
    /// Call line.
    pub line: usize,
    /// Call column.
    pub column: usize,
}

/// One bound name of a destructuring pattern with its access chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DestructuringRecord {
    /// The bound variable.
    pub variable: RecordHandle,
    /// Bound name.
    pub variable_name: String,
    /// Rendered source object (`src` or `f()`).
    pub object: String,
    /// Joined property path for object patterns (`headers.type`).
    pub property_path: Option<String>,
    /// Element index for array patterns.
    pub array_index: Option<usize>,
    /// A rest binding.
    pub is_rest: bool,
    /// Present when the initializer was a call; the derives-from edge then
    /// targets the call's CALL node directly.
    pub call_source: Option<CallSource>,
    /// Source position.
    pub loc: SourceLoc,
}

/// Return record kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnKind {
    /// `return`.
    Return,
    /// `yield`.
    Yield,
    /// The expression body of an arrow function.
    ImplicitReturn,
}

/// A return, yield, or implicit arrow return.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReturnRecord {
    /// The owning function.
    pub function: RecordHandle,
    /// Record kind.
    pub kind: ReturnKind,
    /// A delegating yield (`yield*`).
    pub delegate: bool,
    /// Classified value.
    pub value: Option<ValueSource>,
    /// The return sits inside a conditional ancestor.
    pub is_early: bool,
    /// Source position.
    pub loc: SourceLoc,
}

/// Ways a function surfaces an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionKind {
    /// `throw` in a sync function.
    SyncThrow,
    /// `throw` in an async function.
    AsyncThrow,
    /// `Promise.reject(...)`.
    PromiseReject,
    /// The reject parameter of a promise executor.
    ExecutorReject,
    /// `throw param` where param is a function parameter.
    VariableParameter,
    /// `throw v` traced to a constructor call.
    VariableTraced,
    /// `throw v` that could not be traced.
    VariableUnknown,
}

impl RejectionKind {
    /// The `patternType` attribute value.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SyncThrow => "sync_throw",
            Self::AsyncThrow => "async_throw",
            Self::PromiseReject => "promise_reject",
            Self::ExecutorReject => "executor_reject",
            Self::VariableParameter => "variable_parameter",
            Self::VariableTraced => "variable_traced",
            Self::VariableUnknown => "variable_unknown",
        }
    }
}

/// A throw-point or rejection pattern.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThrowRecord {
    /// The function surfacing the error, when inside one.
    pub function: Option<RecordHandle>,
    /// Pattern kind.
    pub kind: RejectionKind,
    /// Resolved error class name, when known.
    pub error_class: Option<String>,
    /// Thrown variable name for variable patterns.
    pub variable: Option<String>,
    /// Micro-trace path from the thrown name to the resolving assignment.
    pub trace_path: Vec<String>,
    /// Source position.
    pub loc: SourceLoc,
}

/// Promise resolution kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionKind {
    /// The executor's resolve parameter was called.
    Resolve,
    /// The executor's reject parameter was called.
    Reject,
}

/// A call of a promise executor's resolve/reject parameter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolutionRecord {
    /// The Promise CONSTRUCTOR_CALL being resolved.
    pub constructor_call: RecordHandle,
    /// Resolve or reject.
    pub kind: ResolutionKind,
    /// The resolve/reject CALL record.
    pub call: RecordHandle,
    /// Classified argument, when one was passed.
    pub argument: Option<ValueSource>,
    /// Source position.
    pub loc: SourceLoc,
}

/// All records collected while analyzing one module.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ModuleRecords {
    /// Module node id (pre-existing, created by the indexer).
    pub module_id: String,
    /// Project-relative file path.
    pub file: String,
    /// Functions and methods.
    pub functions: Vec<FunctionRecord>,
    /// Classes.
    pub classes: Vec<ClassRecord>,
    /// Interfaces, type aliases, enums, decorators.
    pub ts_constructs: Vec<TsConstructRecord>,
    /// Variables and constants.
    pub variables: Vec<VariableRecord>,
    /// Scopes.
    pub scopes: Vec<ScopeRecord>,
    /// Branches.
    pub branches: Vec<BranchRecord>,
    /// Switch cases.
    pub cases: Vec<CaseRecord>,
    /// Loops.
    pub loops: Vec<LoopRecord>,
    /// Try blocks.
    pub try_blocks: Vec<TryBlockRecord>,
    /// Catch blocks.
    pub catch_blocks: Vec<CatchBlockRecord>,
    /// Finally blocks.
    pub finally_blocks: Vec<FinallyBlockRecord>,
    /// Call sites.
    pub calls: Vec<CallRecord>,
    /// Call arguments.
    pub call_arguments: Vec<CallArgumentRecord>,
    /// Constructor calls.
    pub constructor_calls: Vec<ConstructorCallRecord>,
    /// Property accesses.
    pub property_accesses: Vec<PropertyAccessRecord>,
    /// Imports.
    pub imports: Vec<ImportRecord>,
    /// External modules.
    pub external_modules: Vec<ExternalModuleRecord>,
    /// Exports.
    pub exports: Vec<ExportRecord>,
    /// Expression anchors.
    pub expressions: Vec<ExpressionRecord>,
    /// Object literal anchors.
    pub object_literals: Vec<ObjectLiteralRecord>,
    /// Object literal properties.
    pub object_properties: Vec<ObjectPropertyRecord>,
    /// Array literal anchors.
    pub array_literals: Vec<ArrayLiteralRecord>,
    /// Array mutations.
    pub array_mutations: Vec<ArrayMutationRecord>,
    /// Object mutations.
    pub object_mutations: Vec<ObjectMutationRecord>,
    /// Update expressions.
    pub updates: Vec<UpdateRecord>,
    /// Variable assignments.
    pub assignments: Vec<AssignmentRecord>,
    /// Destructuring data-flow records.
    pub destructurings: Vec<DestructuringRecord>,
    /// Returns and yields.
    pub returns: Vec<ReturnRecord>,
    /// Throw-points and rejection patterns.
    pub throws: Vec<ThrowRecord>,
    /// Promise resolutions.
    pub resolutions: Vec<ResolutionRecord>,
    /// The module contains a top-level `await`.
    pub has_top_level_await: bool,
    /// Count of `for await` loops at the top level.
    pub for_await_count: usize,
}

impl ModuleRecords {
    /// Creates empty buffers for one module.
    pub fn new(module_id: impl Into<String>, file: impl Into<String>) -> Self {
        Self { module_id: module_id.into(), file: file.into(), ..Self::default() }
    }

    /// Returns the current id of a node-backed record.
    pub fn id_of(&self, handle: RecordHandle) -> &str {
        let RecordHandle { buffer, index } = handle;
        match buffer {
            BufferKind::Function => &self.functions[index].id,
            BufferKind::Class => &self.classes[index].id,
            BufferKind::TsConstruct => &self.ts_constructs[index].id,
            BufferKind::Variable => &self.variables[index].id,
            BufferKind::Scope => &self.scopes[index].id,
            BufferKind::Branch => &self.branches[index].id,
            BufferKind::Case => &self.cases[index].id,
            BufferKind::Loop => &self.loops[index].id,
            BufferKind::TryBlock => &self.try_blocks[index].id,
            BufferKind::CatchBlock => &self.catch_blocks[index].id,
            BufferKind::FinallyBlock => &self.finally_blocks[index].id,
            BufferKind::Call => &self.calls[index].id,
            BufferKind::ConstructorCall => &self.constructor_calls[index].id,
            BufferKind::PropertyAccess => &self.property_accesses[index].id,
            BufferKind::Import => &self.imports[index].id,
            BufferKind::Export => &self.exports[index].id,
            BufferKind::ExternalModule => &self.external_modules[index].id,
            BufferKind::Expression => &self.expressions[index].id,
            BufferKind::ObjectLiteral => &self.object_literals[index].id,
            BufferKind::ArrayLiteral => &self.array_literals[index].id,
            BufferKind::ArrayMutation => &self.array_mutations[index].id,
            BufferKind::ObjectMutation => &self.object_mutations[index].id,
            BufferKind::Update => &self.updates[index].id,
        }
    }

    /// Rewrites the id of a node-backed record in place. For call records,
    /// argument records referencing the call are patched as well; every other
    /// cross-record reference is coordinate-based and unaffected.
    pub fn rewrite_id(&mut self, handle: RecordHandle, new_id: String) {
        let RecordHandle { buffer, index } = handle;
        match buffer {
            BufferKind::Function => self.functions[index].id = new_id,
            BufferKind::Class => self.classes[index].id = new_id,
            BufferKind::TsConstruct => self.ts_constructs[index].id = new_id,
            BufferKind::Variable => self.variables[index].id = new_id,
            BufferKind::Scope => self.scopes[index].id = new_id,
            BufferKind::Branch => self.branches[index].id = new_id,
            BufferKind::Case => self.cases[index].id = new_id,
            BufferKind::Loop => self.loops[index].id = new_id,
            BufferKind::TryBlock => self.try_blocks[index].id = new_id,
            BufferKind::CatchBlock => self.catch_blocks[index].id = new_id,
            BufferKind::FinallyBlock => self.finally_blocks[index].id = new_id,
            BufferKind::Call => {
                for argument in &mut self.call_arguments {
                    if argument.call == handle {
                        argument.call_id.clone_from(&new_id);
                    }
                }
                self.calls[index].id = new_id;
            }
            BufferKind::ConstructorCall => self.constructor_calls[index].id = new_id,
            BufferKind::PropertyAccess => self.property_accesses[index].id = new_id,
            BufferKind::Import => self.imports[index].id = new_id,
            BufferKind::Export => self.exports[index].id = new_id,
            BufferKind::ExternalModule => self.external_modules[index].id = new_id,
            BufferKind::Expression => self.expressions[index].id = new_id,
            BufferKind::ObjectLiteral => self.object_literals[index].id = new_id,
            BufferKind::ArrayLiteral => self.array_literals[index].id = new_id,
            BufferKind::ArrayMutation => self.array_mutations[index].id = new_id,
            BufferKind::ObjectMutation => self.object_mutations[index].id = new_id,
            BufferKind::Update => self.updates[index].id = new_id,
        }
    }

    /// Total number of node-backed records.
    pub fn node_count(&self) -> usize {
        self.functions.len()
            + self.classes.len()
            + self.ts_constructs.len()
            + self.variables.len()
            + self.scopes.len()
            + self.branches.len()
            + self.cases.len()
            + self.loops.len()
            + self.try_blocks.len()
            + self.catch_blocks.len()
            + self.finally_blocks.len()
            + self.calls.len()
            + self.constructor_calls.len()
            + self.property_accesses.len()
            + self.imports.len()
            + self.external_modules.len()
            + self.exports.len()
            + self.expressions.len()
            + self.object_literals.len()
            + self.array_literals.len()
            + self.array_mutations.len()
            + self.object_mutations.len()
            + self.updates.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rewrite_call_id_patches_arguments() {
        let mut records = ModuleRecords::new("MODULE#a.ts", "a.ts");
        records.calls.push(CallRecord {
            id: "CALL#f#a.ts".to_string(),
            name: "f".to_string(),
            object: None,
            method: None,
            computed: false,
            is_new: false,
            is_awaited: false,
            is_inside_try: false,
            is_inside_loop: false,
            is_method_call: false,
            parent_scope_id: "MODULE#a.ts".to_string(),
            enclosing_function: None,
            loc: SourceLoc::new(1, 0),
        });
        let call = RecordHandle { buffer: BufferKind::Call, index: 0 };
        records.call_arguments.push(CallArgumentRecord {
            call,
            call_id: "CALL#f#a.ts".to_string(),
            index: 0,
            value: ArgValue::Variable { name: "x".to_string() },
            spread: false,
        });

        records.rewrite_id(call, "CALL#f#a.ts#2".to_string());
        assert_eq!(records.id_of(call), "CALL#f#a.ts#2");
        assert_eq!(records.call_arguments[0].call_id, "CALL#f#a.ts#2");
    }
}
