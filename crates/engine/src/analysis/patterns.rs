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

//! Destructuring pattern flattening.
//!
//! Turns arbitrarily nested binding patterns into a flat list of bound names,
//! each carrying the object property path and/or array index needed to reach
//! its value from the initializer.

use swc_common::Span;
use swc_ecma_ast::{ObjectPatProp, Pat};

use crate::analysis::classify::prop_key;

/// One name bound by a pattern.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundName {
    /// The bound identifier.
    pub name: String,
    /// Object-pattern keys from the initializer down to this name.
    pub property_path: Vec<String>,
    /// Element index for array patterns (innermost).
    pub array_index: Option<usize>,
    /// Bound through a rest element.
    pub is_rest: bool,
    /// The pattern supplies a default value.
    pub has_default: bool,
    /// Span of the binding identifier.
    pub span: Span,
}

/// Flattens a binding pattern into its bound names.
///
/// Plain identifiers yield a single entry with an empty path. Unsupported
/// pattern shapes (expressions, invalid nodes) are skipped.
pub fn extract_bound_names(pat: &Pat) -> Vec<BoundName> {
    let mut bound = Vec::new();
    walk_pattern(pat, &mut PatternPosition::default(), &mut bound);
    bound
}

#[derive(Debug, Default, Clone)]
struct PatternPosition {
    path: Vec<String>,
    index: Option<usize>,
    is_rest: bool,
    has_default: bool,
}

fn walk_pattern(pat: &Pat, position: &mut PatternPosition, bound: &mut Vec<BoundName>) {
    match pat {
        Pat::Ident(ident) => bound.push(BoundName {
            name: ident.id.sym.to_string(),
            property_path: position.path.clone(),
            array_index: position.index,
            is_rest: position.is_rest,
            has_default: position.has_default,
            span: ident.id.span,
        }),
        Pat::Object(object) => {
            for prop in &object.props {
                match prop {
                    ObjectPatProp::KeyValue(entry) => {
                        let (key, _computed) = prop_key(&entry.key);
                        position.path.push(key);
                        walk_pattern(&entry.value, position, bound);
                        position.path.pop();
                    }
                    ObjectPatProp::Assign(entry) => {
                        let key = entry.key.sym.to_string();
                        bound.push(BoundName {
                            name: key.clone(),
                            property_path: {
                                let mut path = position.path.clone();
                                path.push(key);
                                path
                            },
                            array_index: position.index,
                            is_rest: false,
                            has_default: entry.value.is_some(),
                            span: entry.key.span,
                        });
                    }
                    ObjectPatProp::Rest(rest) => {
                        let was_rest = position.is_rest;
                        position.is_rest = true;
                        walk_pattern(&rest.arg, position, bound);
                        position.is_rest = was_rest;
                    }
                }
            }
        }
        Pat::Array(array) => {
            for (element_index, element) in array.elems.iter().enumerate() {
                if let Some(element) = element {
                    let previous = position.index;
                    position.index = Some(element_index);
                    walk_pattern(element, position, bound);
                    position.index = previous;
                }
            }
        }
        Pat::Assign(assign) => {
            let had_default = position.has_default;
            position.has_default = true;
            walk_pattern(&assign.left, position, bound);
            position.has_default = had_default;
        }
        Pat::Rest(rest) => {
            let was_rest = position.is_rest;
            position.is_rest = true;
            walk_pattern(&rest.arg, position, bound);
            position.is_rest = was_rest;
        }
        // Assignment-target expressions and invalid nodes bind nothing.
        Pat::Expr(_) | Pat::Invalid(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::SourceParser;
    use swc_ecma_ast::{Decl, ModuleItem, Stmt};

    fn first_pattern(source: &str) -> Pat {
        let parsed = SourceParser.parse("a.ts", source).unwrap();
        match &parsed.module.body[0] {
            ModuleItem::Stmt(Stmt::Decl(Decl::Var(var))) => var.decls[0].name.clone(),
            other => panic!("unexpected item: {other:?}"),
        }
    }

    #[test]
    fn test_plain_identifier() {
        let bound = extract_bound_names(&first_pattern("const x = y;"));
        assert_eq!(bound.len(), 1);
        assert_eq!(bound[0].name, "x");
        assert!(bound[0].property_path.is_empty());
        assert_eq!(bound[0].array_index, None);
    }

    #[test]
    fn test_nested_object_pattern() {
        let bound = extract_bound_names(&first_pattern("const { headers: { type } } = res;"));
        assert_eq!(bound.len(), 1);
        assert_eq!(bound[0].name, "type");
        assert_eq!(bound[0].property_path, vec!["headers", "type"]);
    }

    #[test]
    fn test_renamed_key_keeps_source_path() {
        let bound = extract_bound_names(&first_pattern("const { status: code } = res;"));
        assert_eq!(bound[0].name, "code");
        assert_eq!(bound[0].property_path, vec!["status"]);
    }

    #[test]
    fn test_array_pattern_indices_and_rest() {
        let bound = extract_bound_names(&first_pattern("const [first, , third, ...rest] = xs;"));
        assert_eq!(bound.len(), 3);
        assert_eq!((bound[0].name.as_str(), bound[0].array_index), ("first", Some(0)));
        assert_eq!((bound[1].name.as_str(), bound[1].array_index), ("third", Some(2)));
        assert_eq!((bound[2].name.as_str(), bound[2].is_rest), ("rest", true));
        assert_eq!(bound[2].array_index, Some(3));
    }

    #[test]
    fn test_defaults_are_flagged() {
        let bound = extract_bound_names(&first_pattern("const { a = 1, b } = o;"));
        assert_eq!(bound.len(), 2);
        assert!(bound[0].has_default);
        assert!(!bound[1].has_default);
    }

    #[test]
    fn test_object_rest() {
        let bound = extract_bound_names(&first_pattern("const { a, ...others } = o;"));
        assert_eq!(bound.len(), 2);
        assert_eq!(bound[1].name, "others");
        assert!(bound[1].is_rest);
    }

    #[test]
    fn test_mixed_object_array_pattern() {
        let bound = extract_bound_names(&first_pattern("const { rows: [head] } = table;"));
        assert_eq!(bound.len(), 1);
        assert_eq!(bound[0].name, "head");
        assert_eq!(bound[0].property_path, vec!["rows"]);
        assert_eq!(bound[0].array_index, Some(0));
    }
}
