//! Interface method tables: the methods a target must provide once it
//! implements an interface.
//!
//! Interfaces are grouped by the source file that declares them so each file
//! is parsed once, however many of its (nested) interfaces are referenced.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use indexmap::IndexMap;
use tracing::debug;
use tree_sitter::Node;

use crate::errors::{StirrinError, StirrinResult};
use crate::models::{Diagnostic, DiagnosticKind, InterfaceDescriptor, MethodSignature, ResolvedType};
use crate::signature;
use crate::source::filesystem::SourceRoots;
use crate::source::parser::{body_members, declaration_name, keyword_modifiers, nested_types, parse_java_file, ParsedUnit};
use crate::source::resolver::NameResolver;
use crate::source::types::{count_dimensions, local_types, TypeContext};

/// Any of these keywords marks a method as not part of the interface
/// contract.
pub const EXCLUDED_MODIFIERS: &[&str] = &[
    "public",
    "protected",
    "private",
    "abstract",
    "native",
    "default",
    "static",
];

/// Extracted method tables of one source file.
#[derive(Debug, Default)]
pub struct ExtractedInterfaces {
    pub interfaces: Vec<InterfaceDescriptor>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Interface names grouped by declaring source file. Names without a source
/// file are returned separately.
pub fn group_by_source(
    names: &BTreeSet<String>,
    roots: &SourceRoots,
) -> (BTreeMap<PathBuf, Vec<String>>, Vec<String>) {
    let mut grouped: BTreeMap<PathBuf, Vec<String>> = BTreeMap::new();
    let mut missing = Vec::new();
    for name in names {
        match roots.locate_type(name) {
            Some(path) => grouped.entry(path).or_default().push(name.clone()),
            None => missing.push(name.clone()),
        }
    }
    (grouped, missing)
}

/// An empty descriptor plus a diagnostic for an interface with no source.
pub fn missing_interface(name: &str) -> (InterfaceDescriptor, Diagnostic) {
    let diagnostic = Diagnostic::warn(
        DiagnosticKind::MissingInterfaceSource,
        name,
        "no source file found under the source roots; the interface is added without stubs",
    );
    (
        InterfaceDescriptor {
            name: name.to_string(),
            methods: Vec::new(),
        },
        diagnostic,
    )
}

pub fn extract_from_file(
    path: &std::path::Path,
    names: &[String],
    resolver: NameResolver<'_>,
) -> StirrinResult<ExtractedInterfaces> {
    let unit = parse_java_file(path)?;
    extract_from_unit(&unit, names, resolver)
}

/// Method tables of `names`, every one of which is declared in `unit`.
pub fn extract_from_unit(
    unit: &ParsedUnit,
    names: &[String],
    resolver: NameResolver<'_>,
) -> StirrinResult<ExtractedInterfaces> {
    let scope = unit.import_scope();
    let locals = local_types(unit, &scope);
    let base = TypeContext::new(unit, &scope, resolver, &locals);

    let mut out = ExtractedInterfaces::default();
    if let Some(diagnostic) = unit.syntax_recovery() {
        out.diagnostics.push(diagnostic);
    }

    for name in names {
        let Some(decl) = find_declaration(unit, scope.package(), name) else {
            let (descriptor, diagnostic) = missing_interface(name);
            out.interfaces.push(descriptor);
            out.diagnostics.push(diagnostic);
            continue;
        };
        let methods = extract_methods(&base, decl, name, &mut out.diagnostics)?;
        debug!(interface = %name, methods = methods.len(), "extracted interface");
        out.interfaces.push(InterfaceDescriptor {
            name: name.clone(),
            methods,
        });
    }
    Ok(out)
}

/// The declaration of binary name `name` (`pkg.Outer$Inner`) in `unit`.
fn find_declaration<'t>(unit: &'t ParsedUnit, package: &str, name: &str) -> Option<Node<'t>> {
    let local = if package.is_empty() {
        name
    } else {
        name.strip_prefix(package)?.strip_prefix('.')?
    };
    let mut segments = local.split('$');
    let first = segments.next()?;
    let mut decl = unit
        .type_declarations()
        .into_iter()
        .find(|d| declaration_name(unit, *d) == first)?;
    for segment in segments {
        decl = nested_types(decl)
            .into_iter()
            .find(|d| declaration_name(unit, *d) == segment)?;
    }
    Some(decl)
}

/// Whether a method declaration belongs to the interface contract.
pub fn is_contract_method(method: Node<'_>) -> bool {
    !keyword_modifiers(method)
        .iter()
        .any(|m| EXCLUDED_MODIFIERS.contains(m))
}

fn extract_methods(
    base: &TypeContext<'_>,
    decl: Node<'_>,
    interface: &str,
    diagnostics: &mut Vec<Diagnostic>,
) -> StirrinResult<Vec<MethodSignature>> {
    // Interface-level parameters cannot be named from an implementing
    // class, so they are erased in descriptors and signatures alike.
    let ctx = match child_of_kind(decl, "type_parameters") {
        Some(tp) => {
            let params = base.type_parameters(tp, diagnostics)?;
            base.with_erased(&params)
        }
        None => base.clone(),
    };

    let mut methods: IndexMap<(String, String), MethodSignature> = IndexMap::new();
    for member in body_members(decl) {
        if member.kind() != "method_declaration" || !is_contract_method(member) {
            continue;
        }
        let method = extract_method(&ctx, member, interface, diagnostics)?;
        let key = (method.name.clone(), method.descriptor.clone());
        methods.entry(key).or_insert(method);
    }
    Ok(methods.into_values().collect())
}

fn extract_method(
    ctx: &TypeContext<'_>,
    method: Node<'_>,
    interface: &str,
    diagnostics: &mut Vec<Diagnostic>,
) -> StirrinResult<MethodSignature> {
    let unit = ctx.unit();
    let name = method
        .child_by_field_name("name")
        .map(|n| unit.text(n).to_string())
        .ok_or_else(|| unit.unsupported(method, "method without a name"))?;

    let type_parameters = match child_of_kind(method, "type_parameters") {
        Some(tp) => ctx.type_parameters(tp, diagnostics)?,
        None => Vec::new(),
    };
    let ctx = ctx.with_variables(type_parameters.iter().map(|p| p.name.clone()));

    let return_node = method
        .child_by_field_name("type")
        .ok_or_else(|| unit.unsupported(method, format!("method `{name}` without a return type")))?;
    let mut return_type = ctx.resolve(return_node, diagnostics)?;
    if let Some(dims) = method.child_by_field_name("dimensions") {
        return_type = ResolvedType::array(count_dimensions(dims), return_type);
    }

    let mut parameters = Vec::new();
    let mut parameter_names = Vec::new();
    if let Some(list) = method.child_by_field_name("parameters") {
        let mut cursor = list.walk();
        for param in list.named_children(&mut cursor) {
            let Some((ty, param_name)) = parameter(&ctx, param, diagnostics)? else {
                continue;
            };
            parameters.push(ty);
            parameter_names.push(param_name);
        }
    }

    let mut thrown = Vec::new();
    if let Some(throws) = child_of_kind(method, "throws") {
        let mut cursor = throws.walk();
        for ty in throws.named_children(&mut cursor) {
            thrown.push(ctx.resolve(ty, diagnostics)?);
        }
    }

    let descriptor = signature::method_descriptor(&parameters, &return_type, &type_parameters);
    let generic = !type_parameters.is_empty()
        || signature::is_generic(&return_type)
        || parameters.iter().any(signature::is_generic)
        || thrown.iter().any(signature::is_generic);
    let generic_signature = if generic {
        let sig = signature::method_signature(&type_parameters, &parameters, &return_type, &thrown)
            .map_err(|e| match e {
                StirrinError::Signature(msg) => {
                    StirrinError::Signature(format!("{interface}.{name}{descriptor}: {msg}"))
                }
                other => other,
            })?;
        Some(sig)
    } else {
        None
    };

    Ok(MethodSignature {
        thrown_exceptions: thrown
            .iter()
            .map(|t| signature::erased_internal_name(t, &type_parameters))
            .collect(),
        type_parameters: type_parameters.into_iter().map(|p| p.name).collect(),
        parameter_names: Some(parameter_names),
        generic_signature,
        descriptor,
        name,
    })
}

/// Type and name of one parameter node; receiver parameters yield `None`.
fn parameter(
    ctx: &TypeContext<'_>,
    node: Node<'_>,
    diagnostics: &mut Vec<Diagnostic>,
) -> StirrinResult<Option<(ResolvedType, String)>> {
    let unit = ctx.unit();
    match node.kind() {
        "formal_parameter" => {
            let ty = node
                .child_by_field_name("type")
                .ok_or_else(|| unit.unsupported(node, "parameter without a type"))?;
            let mut ty = ctx.resolve(ty, diagnostics)?;
            if let Some(dims) = node.child_by_field_name("dimensions") {
                ty = ResolvedType::array(count_dimensions(dims), ty);
            }
            let name = node
                .child_by_field_name("name")
                .map(|n| unit.text(n).to_string())
                .unwrap_or_default();
            Ok(Some((ty, name)))
        }
        "spread_parameter" => {
            let mut cursor = node.walk();
            let children: Vec<Node<'_>> = node.named_children(&mut cursor).collect();
            let ty = children
                .iter()
                .find(|n| !matches!(n.kind(), "modifiers" | "variable_declarator" | "annotation" | "marker_annotation"))
                .ok_or_else(|| unit.unsupported(node, "varargs parameter without a type"))?;
            let declarator = children.iter().find(|n| n.kind() == "variable_declarator");
            let mut dimensions: u8 = 1;
            if let Some(dims) = declarator.and_then(|d| d.child_by_field_name("dimensions")) {
                dimensions = dimensions.saturating_add(count_dimensions(dims));
            }
            let name = declarator
                .and_then(|d| d.child_by_field_name("name"))
                .map(|n| unit.text(n).to_string())
                .unwrap_or_default();
            Ok(Some((ResolvedType::array(dimensions, ctx.resolve(*ty, diagnostics)?), name)))
        }
        "receiver_parameter" | "line_comment" | "block_comment" => Ok(None),
        other => Err(unit.unsupported(node, format!("unsupported parameter syntax `{other}`"))),
    }
}

fn child_of_kind<'t>(node: Node<'t>, kind: &str) -> Option<Node<'t>> {
    let mut cursor = node.walk();
    let found = node.children(&mut cursor).find(|n| n.kind() == kind);
    found
}
