//! Discovery of mixin declarations: annotated types, their targets and the
//! interfaces they implement.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use tracing::debug;
use tree_sitter::Node;

use crate::errors::{StirrinError, StirrinResult};
use crate::models::{Diagnostic, DiagnosticKind, MixinDeclaration};
use crate::source::parser::{annotations_of, declaration_name, nested_types, parse_java_file, ParsedUnit};
use crate::source::resolver::{ImportScope, NameResolver};
use crate::source::types::local_types;

/// Binary name of the mixin marker annotation.
pub const MIXIN_ANNOTATION: &str = "org.spongepowered.asm.mixin.Mixin";

/// Annotation keys whose values name targets.
const TARGET_KEYS: &[&str] = &["value", "targets"];

const COMMENT_KINDS: &[&str] = &["line_comment", "block_comment"];

/// Declarations and diagnostics of one source file.
#[derive(Debug, Default)]
pub struct MixinFile {
    pub declarations: Vec<MixinDeclaration>,
    pub diagnostics: Vec<Diagnostic>,
}

pub fn parse_mixin_file(path: &Path, resolver: NameResolver<'_>) -> StirrinResult<MixinFile> {
    let unit = parse_java_file(path)?;
    parse_mixin_unit(&unit, resolver)
}

/// Every mixin declaration in `unit`, nested declarations included.
pub fn parse_mixin_unit(unit: &ParsedUnit, resolver: NameResolver<'_>) -> StirrinResult<MixinFile> {
    let scope = unit.import_scope();
    let locals = local_types(unit, &scope);
    let mut parser = MixinParser {
        unit,
        scope: &scope,
        resolver,
        locals: &locals,
        out: MixinFile::default(),
    };
    if let Some(diagnostic) = unit.syntax_recovery() {
        parser.out.diagnostics.push(diagnostic);
    }
    for decl in unit.type_declarations() {
        parser.visit(decl, None)?;
    }
    debug!(
        path = %unit.path.display(),
        mixins = parser.out.declarations.len(),
        "parsed mixin source"
    );
    Ok(parser.out)
}

struct MixinParser<'a> {
    unit: &'a ParsedUnit,
    scope: &'a ImportScope,
    resolver: NameResolver<'a>,
    locals: &'a BTreeMap<String, String>,
    out: MixinFile,
}

impl MixinParser<'_> {
    fn visit(&mut self, decl: Node<'_>, outer: Option<&str>) -> StirrinResult<()> {
        let name = declaration_name(self.unit, decl);
        let path = match outer {
            Some(outer) => format!("{outer}${name}"),
            None => name.to_string(),
        };

        let targets = self.targets_of(decl)?;
        if !targets.is_empty() {
            let interfaces = self.interfaces_of(decl, &path)?;
            self.out.declarations.push(MixinDeclaration {
                source_file: self.unit.path.clone(),
                class_name: self.scope.qualify(&path),
                targets,
                interfaces,
            });
        }

        // Nested mixins are independent of their enclosing type.
        for nested in nested_types(decl) {
            self.visit(nested, Some(&path))?;
        }
        Ok(())
    }

    /// Targets of the mixin annotation on `decl`; empty when there is none.
    fn targets_of(&self, decl: Node<'_>) -> StirrinResult<BTreeSet<String>> {
        let mut targets = BTreeSet::new();
        for annotation in annotations_of(decl) {
            if !self.is_mixin_annotation(annotation)? {
                continue;
            }
            let Some(arguments) = annotation.child_by_field_name("arguments") else {
                continue;
            };
            let mut cursor = arguments.walk();
            for arg in arguments.named_children(&mut cursor) {
                if COMMENT_KINDS.contains(&arg.kind()) {
                    continue;
                }
                if arg.kind() == "element_value_pair" {
                    let key = arg
                        .child_by_field_name("key")
                        .map(|k| self.unit.text(k))
                        .unwrap_or("");
                    if !TARGET_KEYS.contains(&key) {
                        continue;
                    }
                    if let Some(value) = arg.child_by_field_name("value") {
                        self.collect_targets(value, true, &mut targets)?;
                    }
                } else {
                    self.collect_targets(arg, true, &mut targets)?;
                }
            }
        }
        Ok(targets)
    }

    fn is_mixin_annotation(&self, annotation: Node<'_>) -> StirrinResult<bool> {
        let Some(name) = annotation.child_by_field_name("name") else {
            return Ok(false);
        };
        let name = self.unit.compact_text(name);
        if name == MIXIN_ANNOTATION {
            return Ok(true);
        }
        match self.resolver.resolve_class(&name, self.scope) {
            Some(resolved) => Ok(resolved == MIXIN_ANNOTATION),
            None if name.rsplit('.').next() == Some("Mixin") => Err(StirrinError::Unresolved {
                path: self.unit.path.clone(),
                name,
            }),
            None => Ok(false),
        }
    }

    fn collect_targets(
        &self,
        value: Node<'_>,
        allow_array: bool,
        targets: &mut BTreeSet<String>,
    ) -> StirrinResult<()> {
        match value.kind() {
            "class_literal" => {
                targets.insert(self.class_literal_target(value)?);
            }
            "string_literal" => {
                let text = self.unit.text(value).trim_matches('"').trim();
                if !text.is_empty() {
                    targets.insert(text.replace('/', "."));
                }
            }
            "element_value_array_initializer" if allow_array => {
                let mut cursor = value.walk();
                for element in value.named_children(&mut cursor) {
                    if COMMENT_KINDS.contains(&element.kind()) {
                        continue;
                    }
                    self.collect_targets(element, false, targets)?;
                }
            }
            other => {
                return Err(self.unit.unsupported(
                    value,
                    format!(
                        "unsupported mixin annotation value `{}` ({other})",
                        self.unit.compact_text(value)
                    ),
                ));
            }
        }
        Ok(())
    }

    fn class_literal_target(&self, literal: Node<'_>) -> StirrinResult<String> {
        let mut cursor = literal.walk();
        let ty = literal.named_children(&mut cursor).next();
        let Some(ty) = ty.filter(|t| matches!(t.kind(), "type_identifier" | "scoped_type_identifier"))
        else {
            return Err(self.unit.unsupported(
                literal,
                format!(
                    "mixin target `{}` is not a class type",
                    self.unit.compact_text(literal)
                ),
            ));
        };
        let name = self.unit.compact_text(ty);
        self.resolve_strict(&name)
    }

    fn interfaces_of(&mut self, decl: Node<'_>, path: &str) -> StirrinResult<BTreeSet<String>> {
        let mut interfaces = BTreeSet::new();
        let clause = decl.child_by_field_name("interfaces").or_else(|| {
            let mut cursor = decl.walk();
            let found = decl
                .named_children(&mut cursor)
                .find(|n| matches!(n.kind(), "super_interfaces" | "extends_interfaces"));
            found
        });
        let Some(clause) = clause else {
            return Ok(interfaces);
        };
        let mut cursor = clause.walk();
        let Some(list) = clause.named_children(&mut cursor).find(|n| n.kind() == "type_list") else {
            return Ok(interfaces);
        };
        let mut cursor = list.walk();
        for ty in list.named_children(&mut cursor) {
            if ty.kind() != "type_identifier" {
                self.out.diagnostics.push(Diagnostic::warn(
                    DiagnosticKind::UnsupportedSupertype,
                    self.scope.qualify(path),
                    format!(
                        "skipping supertype `{}`: only simple interface names are supported",
                        self.unit.compact_text(ty)
                    ),
                ));
                continue;
            }
            let name = self.unit.text(ty).to_string();
            interfaces.insert(self.resolve_strict(&name)?);
        }
        Ok(interfaces)
    }

    fn resolve_strict(&self, name: &str) -> StirrinResult<String> {
        let (outer, nested) = match name.find('.') {
            Some(dot) => (&name[..dot], Some(&name[dot + 1..])),
            None => (name, None),
        };
        if let Some(binary) = self.locals.get(outer) {
            return Ok(match nested {
                Some(rest) => format!("{binary}${}", rest.replace('.', "$")),
                None => binary.clone(),
            });
        }
        self.resolver
            .resolve_class(name, self.scope)
            .ok_or_else(|| StirrinError::Unresolved {
                path: self.unit.path.clone(),
                name: name.to_string(),
            })
    }
}
