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

//! Parser front-end over swc.
//!
//! Parses the full TypeScript superset grammar with JSX and legacy decorators
//! enabled, and wraps the resulting AST together with the source map so the
//! analysis passes can resolve spans to line/column pairs and source
//! snippets. Recoverable parse errors are collected rather than failing the
//! module.

use std::path::PathBuf;

use swc_common::{sync::Lrc, BytePos, FileName, SourceFile, SourceMap, SourceMapper, Span};
use swc_ecma_ast::Module;
use swc_ecma_parser::{lexer::Lexer, Parser, StringInput, Syntax, TsConfig};
use thiserror::Error;
use tracing::debug;

use crate::analysis::SourceLoc;

/// A parse failure that could not be recovered from.
#[derive(Debug, Error)]
#[error("failed to parse {file}: {message}")]
pub struct ParseError {
    /// The file that failed to parse.
    pub file: String,
    /// Parser diagnostic.
    pub message: String,
}

/// A parsed module plus everything needed to map spans back to the source.
pub struct ParsedModule {
    /// The module AST.
    pub module: Module,
    /// Parse errors the parser recovered from.
    pub recovered_errors: Vec<String>,
    source_map: Lrc<SourceMap>,
    source_file: Lrc<SourceFile>,
}

impl ParsedModule {
    /// Resolves a byte position to a 1-based line and 0-based column.
    pub fn line_col(&self, pos: BytePos) -> SourceLoc {
        let loc = self.source_map.lookup_char_pos(pos);
        SourceLoc::new(loc.line, loc.col_display)
    }

    /// Resolves the start of a span.
    pub fn loc(&self, span: Span) -> SourceLoc {
        self.line_col(span.lo)
    }

    /// Returns the source text of a span, or an empty string when the span
    /// cannot be sliced (synthetic nodes).
    pub fn snippet(&self, span: Span) -> String {
        self.source_map.span_to_snippet(span).unwrap_or_default()
    }

    /// Byte range of a span relative to the file start. Used to deduplicate
    /// AST nodes visited by more than one pass.
    pub fn byte_range(&self, span: Span) -> (u32, u32) {
        let base = self.source_file.start_pos;
        (span.lo.0 - base.0, span.hi.0 - base.0)
    }
}

/// Parses modules with the full superset grammar.
#[derive(Debug, Default)]
pub struct SourceParser;

impl SourceParser {
    /// Parses `source` as the module at `path`.
    ///
    /// JSX and legacy decorators are always enabled; the grammar accepts both
    /// plain JavaScript and TypeScript input. Recoverable diagnostics are
    /// collected into [`ParsedModule::recovered_errors`].
    pub fn parse(&self, path: &str, source: &str) -> Result<ParsedModule, ParseError> {
        let source_map: Lrc<SourceMap> = Lrc::default();
        let source_file = source_map
            .new_source_file(FileName::Real(PathBuf::from(path)), source.to_string());

        let syntax = Syntax::Typescript(TsConfig {
            tsx: true,
            decorators: true,
            dts: false,
            no_early_errors: true,
            disallow_ambiguous_jsx_like: false,
        });
        let lexer = Lexer::new(syntax, Default::default(), StringInput::from(&*source_file), None);
        let mut parser = Parser::new_from(lexer);

        let module = parser.parse_module().map_err(|e| ParseError {
            file: path.to_string(),
            message: format!("{:?}", e.kind()),
        })?;

        let recovered_errors: Vec<String> =
            parser.take_errors().into_iter().map(|e| format!("{:?}", e.kind())).collect();
        if !recovered_errors.is_empty() {
            debug!(file = path, count = recovered_errors.len(), "recovered from parse errors");
        }

        Ok(ParsedModule { module, recovered_errors, source_map, source_file })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use swc_common::Spanned;

    #[test]
    fn test_parses_typescript_superset() {
        let source = r#"
            interface Props { name: string }
            export const Hello = (props: Props) => <div>{props.name}</div>;
        "#;
        let parsed = SourceParser.parse("hello.tsx", source).unwrap();
        assert_eq!(parsed.module.body.len(), 2);
        assert!(parsed.recovered_errors.is_empty());
    }

    #[test]
    fn test_locations_are_one_based_lines() {
        let source = "const x = 1;\nconst y = 2;\n";
        let parsed = SourceParser.parse("a.ts", source).unwrap();
        let span = match &parsed.module.body[1] {
            swc_ecma_ast::ModuleItem::Stmt(swc_ecma_ast::Stmt::Decl(
                swc_ecma_ast::Decl::Var(var),
            )) => var.span,
            other => panic!("unexpected item: {other:?}"),
        };
        let loc = parsed.loc(span);
        assert_eq!(loc.line, 2);
        assert_eq!(loc.column, 0);
    }

    #[test]
    fn test_snippet_slices_source() {
        let source = "if (ready && open) {}\n";
        let parsed = SourceParser.parse("a.ts", source).unwrap();
        let test_span = match &parsed.module.body[0] {
            swc_ecma_ast::ModuleItem::Stmt(swc_ecma_ast::Stmt::If(stmt)) => stmt.test.span(),
            other => panic!("unexpected item: {other:?}"),
        };
        assert_eq!(parsed.snippet(test_span), "ready && open");
    }

    #[test]
    fn test_invalid_syntax_is_an_error() {
        let result = SourceParser.parse("a.ts", "const = ;;;[");
        assert!(result.is_err());
    }
}
