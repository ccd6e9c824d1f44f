//! Java parsing wrapper used by the declaration and interface passes.
//!
//! Sources are parsed with the native tree-sitter Java grammar. The tree
//! carries no name bindings, so every type reference goes through the
//! resolver.

use std::path::{Path, PathBuf};

use tracing::debug;
use tree_sitter::{Node, Parser, Tree};

use crate::errors::{StirrinError, StirrinResult};
use crate::models::{Diagnostic, DiagnosticKind};
use crate::source::resolver::ImportScope;

/// Node kinds that declare a type.
pub const TYPE_DECLARATION_KINDS: &[&str] = &[
    "class_declaration",
    "interface_declaration",
    "enum_declaration",
    "record_declaration",
    "annotation_type_declaration",
];

/// Parsed Java compilation unit: raw source plus the tree-sitter tree.
pub struct ParsedUnit {
    pub path: PathBuf,
    pub source: String,
    pub tree: Tree,
}

pub fn parse_java_file(path: &Path) -> StirrinResult<ParsedUnit> {
    let source = std::fs::read_to_string(path).map_err(|e| StirrinError::io(path, e))?;
    parse_java_source(path, source)
}

pub fn parse_java_source(path: &Path, source: String) -> StirrinResult<ParsedUnit> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_java::LANGUAGE.into())
        .map_err(|e| StirrinError::Parse {
            path: path.to_path_buf(),
            message: format!("failed to load Java grammar: {e}"),
        })?;

    let tree = parser
        .parse(source.as_bytes(), None)
        .ok_or_else(|| StirrinError::Parse {
            path: path.to_path_buf(),
            message: "parser produced no tree".to_string(),
        })?;

    debug!(path = %path.display(), "parsed java source");
    Ok(ParsedUnit {
        path: path.to_path_buf(),
        source,
        tree,
    })
}

impl ParsedUnit {
    pub fn root(&self) -> Node<'_> {
        self.tree.root_node()
    }

    pub fn text(&self, node: Node<'_>) -> &str {
        node.utf8_text(self.source.as_bytes()).unwrap_or("")
    }

    /// Node text with all whitespace removed, for dotted names that may be
    /// split across lines.
    pub fn compact_text(&self, node: Node<'_>) -> String {
        self.text(node).chars().filter(|c| !c.is_whitespace()).collect()
    }

    /// 1-based line of `node`.
    pub fn line(&self, node: Node<'_>) -> usize {
        node.start_position().row + 1
    }

    pub fn unsupported(&self, node: Node<'_>, message: impl Into<String>) -> StirrinError {
        StirrinError::UnsupportedSyntax {
            path: self.path.clone(),
            line: self.line(node),
            message: message.into(),
        }
    }

    /// A diagnostic when tree-sitter had to recover from syntax errors.
    pub fn syntax_recovery(&self) -> Option<Diagnostic> {
        if !self.root().has_error() {
            return None;
        }
        Some(Diagnostic::warn(
            DiagnosticKind::SyntaxRecovery,
            self.path.display().to_string(),
            "source contains syntax errors; continuing with the recovered tree",
        ))
    }

    pub fn package_name(&self) -> String {
        let root = self.root();
        let mut cursor = root.walk();
        let package = root
            .named_children(&mut cursor)
            .find(|n| n.kind() == "package_declaration");
        let Some(package) = package else {
            return String::new();
        };
        let mut cursor = package.walk();
        let name = package
            .named_children(&mut cursor)
            .find(|n| matches!(n.kind(), "scoped_identifier" | "identifier"));
        name.map(|n| self.compact_text(n)).unwrap_or_default()
    }

    /// Import names in declaration order; wildcard imports end in `.*`.
    pub fn import_names(&self) -> Vec<String> {
        let root = self.root();
        let mut cursor = root.walk();
        let mut imports = Vec::new();
        for decl in root
            .named_children(&mut cursor)
            .filter(|n| n.kind() == "import_declaration")
        {
            let mut inner = decl.walk();
            // Static imports bring in members, not types.
            if decl.children(&mut inner).any(|n| n.kind() == "static") {
                continue;
            }
            let mut name = String::new();
            let mut wildcard = false;
            for child in decl.named_children(&mut inner) {
                match child.kind() {
                    "scoped_identifier" | "identifier" => name = self.compact_text(child),
                    "asterisk" => wildcard = true,
                    _ => {}
                }
            }
            if name.is_empty() {
                continue;
            }
            if wildcard {
                name.push_str(".*");
            }
            imports.push(name);
        }
        imports
    }

    pub fn import_scope(&self) -> ImportScope {
        ImportScope::new(self.package_name(), self.import_names())
    }

    /// Top-level type declarations in source order.
    pub fn type_declarations(&self) -> Vec<Node<'_>> {
        let root = self.root();
        let mut cursor = root.walk();
        root.named_children(&mut cursor)
            .filter(|n| TYPE_DECLARATION_KINDS.contains(&n.kind()))
            .collect()
    }
}

/// Simple name of a type declaration.
pub fn declaration_name<'a>(unit: &'a ParsedUnit, decl: Node<'_>) -> &'a str {
    decl.child_by_field_name("name")
        .map(|n| unit.text(n))
        .unwrap_or("")
}

/// Member declarations of a type body; enum bodies keep their members in a
/// nested `enum_body_declarations` node.
pub fn body_members(decl: Node<'_>) -> Vec<Node<'_>> {
    let Some(body) = decl.child_by_field_name("body") else {
        return Vec::new();
    };
    let mut cursor = body.walk();
    let mut members = Vec::new();
    for child in body.named_children(&mut cursor) {
        if child.kind() == "enum_body_declarations" {
            let mut inner = child.walk();
            members.extend(child.named_children(&mut inner));
        } else {
            members.push(child);
        }
    }
    members
}

/// Type declarations nested directly in `decl`'s body.
pub fn nested_types(decl: Node<'_>) -> Vec<Node<'_>> {
    body_members(decl)
        .into_iter()
        .filter(|n| TYPE_DECLARATION_KINDS.contains(&n.kind()))
        .collect()
}

/// The `modifiers` child of a declaration, if any.
pub fn modifiers_of(decl: Node<'_>) -> Option<Node<'_>> {
    let mut cursor = decl.walk();
    let found = decl
        .children(&mut cursor)
        .find(|n| n.kind() == "modifiers");
    found
}

/// Keyword modifiers (`public`, `static`, ...) of a declaration.
pub fn keyword_modifiers(decl: Node<'_>) -> Vec<&'static str> {
    let Some(modifiers) = modifiers_of(decl) else {
        return Vec::new();
    };
    let mut cursor = modifiers.walk();
    modifiers
        .children(&mut cursor)
        .filter(|n| !n.is_named())
        .map(|n| n.kind())
        .collect()
}

/// Annotation nodes (`@A` and `@A(...)`) attached to a declaration.
pub fn annotations_of(decl: Node<'_>) -> Vec<Node<'_>> {
    let Some(modifiers) = modifiers_of(decl) else {
        return Vec::new();
    };
    let mut cursor = modifiers.walk();
    modifiers
        .named_children(&mut cursor)
        .filter(|n| matches!(n.kind(), "annotation" | "marker_annotation"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(src: &str) -> ParsedUnit {
        parse_java_source(Path::new("Test.java"), src.to_string()).unwrap()
    }

    #[test]
    fn test_package_and_imports() {
        let unit = parse(
            "\
package com.example.app;

import java.util.List;
import java.io.*;
import static java.util.Objects.requireNonNull;

public class App {}
",
        );
        assert_eq!(unit.package_name(), "com.example.app");
        assert_eq!(
            unit.import_names(),
            vec![
                "java.util.List".to_string(),
                "java.io.*".to_string(),
                "java.util.Objects.requireNonNull".to_string(),
            ]
        );
    }

    #[test]
    fn test_default_package() {
        let unit = parse("class A {}");
        assert_eq!(unit.package_name(), "");
        assert!(unit.import_names().is_empty());
    }

    #[test]
    fn test_type_declarations_and_nested() {
        let unit = parse(
            "\
package p;
public class Outer {
    interface Inner {}
    enum Kind { A, B; class Deep {} }
}
interface Second {}
",
        );
        let decls = unit.type_declarations();
        assert_eq!(decls.len(), 2);
        assert_eq!(declaration_name(&unit, decls[0]), "Outer");
        assert_eq!(declaration_name(&unit, decls[1]), "Second");
        let nested = nested_types(decls[0]);
        assert_eq!(nested.len(), 2);
        assert_eq!(declaration_name(&unit, nested[0]), "Inner");
        let deep = nested_types(nested[1]);
        assert_eq!(deep.len(), 1);
        assert_eq!(declaration_name(&unit, deep[0]), "Deep");
    }

    #[test]
    fn test_modifiers_and_annotations() {
        let unit = parse(
            "\
@Deprecated
@Mixin(Foo.class)
public abstract class A {}
",
        );
        let decl = unit.type_declarations()[0];
        assert_eq!(keyword_modifiers(decl), vec!["public", "abstract"]);
        assert_eq!(annotations_of(decl).len(), 2);
    }

    #[test]
    fn test_syntax_recovery_diagnostic() {
        let unit = parse("class A { void broken( }");
        assert!(unit.syntax_recovery().is_some());
        let clean = parse("class A { void ok() {} }");
        assert!(clean.syntax_recovery().is_none());
    }

    #[test]
    fn test_static_imports_are_not_type_imports() {
        let unit = parse("import static a.B.*;\nimport static a.B.c;\nimport java.util.List;\nimport java.io.*;\nclass A {}");
        assert_eq!(unit.import_names(), vec!["java.util.List".to_string(), "java.io.*".to_string()]);
    }
}
