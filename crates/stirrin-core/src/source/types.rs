//! Conversion of tree-sitter type nodes into [`ResolvedType`] values.

use std::collections::BTreeMap;

use tree_sitter::Node;

use crate::errors::StirrinResult;
use crate::models::{Diagnostic, DiagnosticKind, PrimitiveType, ResolvedType, TypeArgument, TypeParameter};
use crate::signature;
use crate::source::parser::{declaration_name, nested_types, ParsedUnit};
use crate::source::resolver::{ImportScope, NameResolver};

/// Simple name → binary name of every type declared in one unit. Nested
/// types shadow outer ones of the same simple name only by declaration order.
pub fn local_types(unit: &ParsedUnit, scope: &ImportScope) -> BTreeMap<String, String> {
    fn walk(
        unit: &ParsedUnit,
        scope: &ImportScope,
        decl: Node<'_>,
        prefix: Option<&str>,
        out: &mut BTreeMap<String, String>,
    ) {
        let name = declaration_name(unit, decl);
        if name.is_empty() {
            return;
        }
        let path = match prefix {
            Some(p) => format!("{p}${name}"),
            None => name.to_string(),
        };
        out.entry(name.to_string())
            .or_insert_with(|| scope.qualify(&path));
        for nested in nested_types(decl) {
            walk(unit, scope, nested, Some(&path), out);
        }
    }

    let mut out = BTreeMap::new();
    for decl in unit.type_declarations() {
        walk(unit, scope, decl, None, &mut out);
    }
    out
}

/// Everything needed to turn type nodes of one declaration into resolved
/// types.
#[derive(Clone)]
pub struct TypeContext<'a> {
    unit: &'a ParsedUnit,
    scope: &'a ImportScope,
    resolver: NameResolver<'a>,
    locals: &'a BTreeMap<String, String>,
    /// Type parameters that stay type variables.
    variables: Vec<String>,
    /// Type parameters replaced by a fixed type.
    erased: BTreeMap<String, ResolvedType>,
}

impl<'a> TypeContext<'a> {
    pub fn new(
        unit: &'a ParsedUnit,
        scope: &'a ImportScope,
        resolver: NameResolver<'a>,
        locals: &'a BTreeMap<String, String>,
    ) -> Self {
        Self {
            unit,
            scope,
            resolver,
            locals,
            variables: Vec::new(),
            erased: BTreeMap::new(),
        }
    }

    pub fn unit(&self) -> &'a ParsedUnit {
        self.unit
    }

    /// A child context in which `names` are type variables.
    pub fn with_variables(&self, names: impl IntoIterator<Item = String>) -> Self {
        let mut next = self.clone();
        for name in names {
            next.erased.remove(&name);
            next.variables.push(name);
        }
        next
    }

    /// A child context in which each of `params` is replaced by the erasure
    /// of its first bound.
    pub fn with_erased(&self, params: &[TypeParameter]) -> Self {
        let mut next = self.clone();
        for param in params {
            let erased = signature::binary_name(&signature::erased_internal_name(
                &ResolvedType::TypeVariable(param.name.clone()),
                params,
            ));
            let erased = match erased.strip_prefix('[') {
                // Array bounds cannot occur; keep the root type if one does.
                Some(_) => ResolvedType::object(),
                None => ResolvedType::Class(erased),
            };
            next.variables.retain(|v| *v != param.name);
            next.erased.insert(param.name.clone(), erased);
        }
        next
    }

    /// Parse a `type_parameters` node. Names are visible in every bound, so
    /// `<T, U extends List<T>>` resolves.
    pub fn type_parameters(
        &self,
        node: Node<'_>,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> StirrinResult<Vec<TypeParameter>> {
        let mut cursor = node.walk();
        let declared: Vec<Node<'_>> = node
            .named_children(&mut cursor)
            .filter(|n| n.kind() == "type_parameter")
            .collect();
        let names: Vec<String> = declared
            .iter()
            .map(|p| {
                let mut c = p.walk();
                let name = p
                    .named_children(&mut c)
                    .find(|n| matches!(n.kind(), "type_identifier" | "identifier"));
                name.map(|n| self.unit.text(n).to_string())
                    .unwrap_or_default()
            })
            .collect();
        let inner = self.with_variables(names.iter().cloned());

        let mut params = Vec::with_capacity(declared.len());
        for (decl, name) in declared.iter().zip(names) {
            let mut bounds = Vec::new();
            let mut c = decl.walk();
            let bound = decl.named_children(&mut c).find(|n| n.kind() == "type_bound");
            if let Some(bound) = bound {
                let mut bc = bound.walk();
                for ty in bound.named_children(&mut bc) {
                    bounds.push(inner.resolve(ty, diagnostics)?);
                }
            }
            params.push(TypeParameter { name, bounds });
        }
        Ok(params)
    }

    /// Convert a type node. Unresolvable class names degrade to the root
    /// object type with an [`DiagnosticKind::UnresolvedType`] diagnostic.
    pub fn resolve(&self, node: Node<'_>, diagnostics: &mut Vec<Diagnostic>) -> StirrinResult<ResolvedType> {
        match node.kind() {
            "void_type" | "integral_type" | "floating_point_type" | "boolean_type" => {
                let keyword = self.unit.text(node);
                PrimitiveType::from_keyword(keyword)
                    .map(ResolvedType::Primitive)
                    .ok_or_else(|| self.unit.unsupported(node, format!("unknown primitive type `{keyword}`")))
            }
            "type_identifier" | "scoped_type_identifier" => {
                let name = self.unit.compact_text(node);
                Ok(self.resolve_name(node, &name, diagnostics))
            }
            "generic_type" => self.resolve_generic(node, diagnostics),
            "array_type" => {
                let element = node
                    .child_by_field_name("element")
                    .ok_or_else(|| self.unit.unsupported(node, "array type without element"))?;
                let dimensions = node
                    .child_by_field_name("dimensions")
                    .map(count_dimensions)
                    .unwrap_or(1);
                Ok(ResolvedType::array(dimensions, self.resolve(element, diagnostics)?))
            }
            "annotated_type" => {
                let mut cursor = node.walk();
                let inner = node
                    .named_children(&mut cursor)
                    .filter(|n| !matches!(n.kind(), "annotation" | "marker_annotation"))
                    .last();
                match inner {
                    Some(inner) => self.resolve(inner, diagnostics),
                    None => Err(self.unit.unsupported(node, "annotated type without a type")),
                }
            }
            other => Err(self
                .unit
                .unsupported(node, format!("unsupported type syntax `{other}`"))),
        }
    }

    fn resolve_generic(&self, node: Node<'_>, diagnostics: &mut Vec<Diagnostic>) -> StirrinResult<ResolvedType> {
        let mut cursor = node.walk();
        let children: Vec<Node<'_>> = node.named_children(&mut cursor).collect();
        let raw = children
            .iter()
            .find(|n| matches!(n.kind(), "type_identifier" | "scoped_type_identifier"))
            .ok_or_else(|| self.unit.unsupported(node, "generic type without a class"))?;
        let raw_name = self.unit.compact_text(*raw);
        if raw_name.contains('<') {
            return Err(self
                .unit
                .unsupported(node, format!("type arguments on an enclosing type `{raw_name}`")));
        }
        let class = match self.lookup_name(&raw_name) {
            Some(ResolvedType::Class(class)) => class,
            // A type variable cannot take arguments; keep what was resolved.
            Some(other) => return Ok(other),
            // The arguments belonged to the unknown class; drop them with it.
            None => return Ok(self.unresolved(*raw, &raw_name, diagnostics)),
        };

        let mut arguments = Vec::new();
        if let Some(args) = children.iter().find(|n| n.kind() == "type_arguments") {
            let mut ac = args.walk();
            for arg in args.named_children(&mut ac) {
                arguments.push(self.type_argument(arg, diagnostics)?);
            }
        }
        if arguments.is_empty() {
            // Diamond or empty argument list: the raw type.
            return Ok(ResolvedType::Class(class));
        }
        Ok(ResolvedType::Parameterized { class, arguments })
    }

    fn type_argument(&self, node: Node<'_>, diagnostics: &mut Vec<Diagnostic>) -> StirrinResult<TypeArgument> {
        if node.kind() != "wildcard" {
            return Ok(TypeArgument::Type(self.resolve(node, diagnostics)?));
        }
        let mut cursor = node.walk();
        let children: Vec<Node<'_>> = node.named_children(&mut cursor).collect();
        let is_super = children.iter().any(|n| n.kind() == "super");
        let bound = children
            .iter()
            .find(|n| !matches!(n.kind(), "super" | "annotation" | "marker_annotation"));
        match bound {
            None => Ok(TypeArgument::Wildcard),
            Some(bound) => {
                let bound = self.resolve(*bound, diagnostics)?;
                Ok(if is_super {
                    TypeArgument::Super(bound)
                } else {
                    TypeArgument::Extends(bound)
                })
            }
        }
    }

    fn resolve_name(&self, node: Node<'_>, name: &str, diagnostics: &mut Vec<Diagnostic>) -> ResolvedType {
        self.lookup_name(name)
            .unwrap_or_else(|| self.unresolved(node, name, diagnostics))
    }

    fn lookup_name(&self, name: &str) -> Option<ResolvedType> {
        if let Some(erased) = self.erased.get(name) {
            return Some(erased.clone());
        }
        if self.variables.iter().any(|v| v == name) {
            return Some(ResolvedType::TypeVariable(name.to_string()));
        }
        let (outer, nested) = match name.find('.') {
            Some(dot) => (&name[..dot], Some(&name[dot + 1..])),
            None => (name, None),
        };
        if let Some(binary) = self.locals.get(outer) {
            return Some(ResolvedType::Class(match nested {
                Some(rest) => format!("{binary}${}", rest.replace('.', "$")),
                None => binary.clone(),
            }));
        }
        self.resolver.resolve_class(name, self.scope).map(ResolvedType::Class)
    }

    fn unresolved(&self, node: Node<'_>, name: &str, diagnostics: &mut Vec<Diagnostic>) -> ResolvedType {
        diagnostics.push(Diagnostic::warn(
            DiagnosticKind::UnresolvedType,
            format!("{}:{}", self.unit.path.display(), self.unit.line(node)),
            format!("could not resolve type `{name}`; using the root object type"),
        ));
        ResolvedType::object()
    }
}

/// Number of `[]` pairs in a `dimensions` node.
pub fn count_dimensions(node: Node<'_>) -> u8 {
    let mut cursor = node.walk();
    let count = node.children(&mut cursor).filter(|n| n.kind() == "[").count();
    u8::try_from(count.max(1)).unwrap_or(u8::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::filesystem::SourceRoots;
    use crate::source::parser::{body_members, parse_java_source};
    use crate::source::resolver::{ClassPath, ResolutionCache};
    use std::path::Path;

    /// Resolve the declared type of every field in the first declaration.
    fn field_types(src: &str, erase: bool) -> (Vec<ResolvedType>, Vec<Diagnostic>) {
        let unit = parse_java_source(Path::new("p/A.java"), src.to_string()).unwrap();
        let scope = unit.import_scope();
        let roots = SourceRoots::new(Vec::new());
        let class_path = ClassPath::default();
        let cache = ResolutionCache::new();
        let resolver = NameResolver::new(&roots, &class_path, &cache);
        let locals = local_types(&unit, &scope);
        let decl = unit.type_declarations()[0];
        let mut diagnostics = Vec::new();

        let mut ctx = TypeContext::new(&unit, &scope, resolver, &locals);
        if let Some(tp) = decl.child_by_field_name("type_parameters") {
            let params = ctx.type_parameters(tp, &mut diagnostics).unwrap();
            ctx = if erase {
                ctx.with_erased(&params)
            } else {
                ctx.with_variables(params.into_iter().map(|p| p.name))
            };
        }
        let mut types = Vec::new();
        for member in body_members(decl) {
            if member.kind() == "field_declaration" {
                let ty = member.child_by_field_name("type").unwrap();
                types.push(ctx.resolve(ty, &mut diagnostics).unwrap());
            }
        }
        (types, diagnostics)
    }

    #[test]
    fn test_primitives_and_arrays() {
        let (types, diags) = field_types(
            "package p; class A { int a; double[] b; String[][] c; boolean d; }",
            false,
        );
        assert!(diags.is_empty());
        assert_eq!(types[0], ResolvedType::Primitive(PrimitiveType::Int));
        assert_eq!(
            types[1],
            ResolvedType::array(1, ResolvedType::Primitive(PrimitiveType::Double))
        );
        assert_eq!(types[2], ResolvedType::array(2, ResolvedType::class("java.lang.String")));
        assert_eq!(types[3], ResolvedType::Primitive(PrimitiveType::Boolean));
    }

    #[test]
    fn test_generic_and_wildcards() {
        let (types, _) = field_types(
            "package p; import java.util.List; import java.util.Map; \
             class A<T> { List<T> a; Map<?, String> b; List<? extends Number> c; }",
            false,
        );
        assert_eq!(
            types[0],
            ResolvedType::Parameterized {
                class: "java.util.List".into(),
                arguments: vec![TypeArgument::Type(ResolvedType::TypeVariable("T".into()))],
            }
        );
        assert_eq!(
            types[1],
            ResolvedType::Parameterized {
                class: "java.util.Map".into(),
                arguments: vec![
                    TypeArgument::Wildcard,
                    TypeArgument::Type(ResolvedType::class("java.lang.String")),
                ],
            }
        );
        assert!(matches!(
            &types[2],
            ResolvedType::Parameterized { arguments, .. }
                if matches!(arguments[0], TypeArgument::Extends(_))
        ));
    }

    #[test]
    fn test_erased_class_parameters() {
        let (types, _) = field_types(
            "package p; class A<T extends Number, U> { T a; U b; T[] c; }",
            true,
        );
        assert_eq!(types[0], ResolvedType::class("java.lang.Number"));
        assert_eq!(types[1], ResolvedType::object());
        assert_eq!(types[2], ResolvedType::array(1, ResolvedType::class("java.lang.Number")));
    }

    #[test]
    fn test_local_nested_types_and_qualified() {
        let (types, _) = field_types(
            "package p; class A { Inner a; A.Inner b; java.util.Map.Entry c; interface Inner {} }",
            false,
        );
        assert_eq!(types[0], ResolvedType::class("p.A$Inner"));
        assert_eq!(types[1], ResolvedType::class("p.A$Inner"));
        assert_eq!(types[2], ResolvedType::class("java.util.Map.Entry"));
    }

    #[test]
    fn test_unresolved_degrades_to_object() {
        let (types, diags) = field_types("package p; class A { Missing a; }", false);
        assert_eq!(types[0], ResolvedType::object());
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].kind, DiagnosticKind::UnresolvedType);
    }

    #[test]
    fn test_unresolved_generic_drops_arguments() {
        let (types, diags) = field_types("package p; class A { Missing<String> a; }", false);
        assert_eq!(types[0], ResolvedType::object());
        assert_eq!(crate::signature::type_signature(&types[0]).unwrap(), "Ljava/lang/Object;");
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].kind, DiagnosticKind::UnresolvedType);
        assert!(diags[0].message.contains("`Missing`"));
    }
}
