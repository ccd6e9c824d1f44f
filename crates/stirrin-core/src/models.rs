//! Shared data model: resolved types, mixin declarations, interface method
//! tables, the per-target augmentation plan and diagnostics.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::PathBuf;

use tracing::warn;

// ---------------------------------------------------------------------------
// Resolved types
// ---------------------------------------------------------------------------

/// Binary name of the root object type.
pub const OBJECT_CLASS: &str = "java.lang.Object";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PrimitiveType {
    Void,
    Boolean,
    Char,
    Byte,
    Short,
    Int,
    Float,
    Long,
    Double,
}

impl PrimitiveType {
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        Some(match keyword {
            "void" => PrimitiveType::Void,
            "boolean" => PrimitiveType::Boolean,
            "char" => PrimitiveType::Char,
            "byte" => PrimitiveType::Byte,
            "short" => PrimitiveType::Short,
            "int" => PrimitiveType::Int,
            "float" => PrimitiveType::Float,
            "long" => PrimitiveType::Long,
            "double" => PrimitiveType::Double,
            _ => return None,
        })
    }

    pub fn keyword(self) -> &'static str {
        match self {
            PrimitiveType::Void => "void",
            PrimitiveType::Boolean => "boolean",
            PrimitiveType::Char => "char",
            PrimitiveType::Byte => "byte",
            PrimitiveType::Short => "short",
            PrimitiveType::Int => "int",
            PrimitiveType::Float => "float",
            PrimitiveType::Long => "long",
            PrimitiveType::Double => "double",
        }
    }
}

/// A type as it appears in a signature, after name resolution.
///
/// Class names are binary names in dotted form: packages separated by `.`,
/// nested classes by `$` (`java.util.Map$Entry`).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResolvedType {
    Primitive(PrimitiveType),
    /// `element` is never itself an array; see [`ResolvedType::array`].
    Array {
        dimensions: u8,
        element: Box<ResolvedType>,
    },
    Class(String),
    Parameterized {
        class: String,
        arguments: Vec<TypeArgument>,
    },
    TypeVariable(String),
}

impl ResolvedType {
    pub fn class(name: impl Into<String>) -> Self {
        ResolvedType::Class(name.into())
    }

    pub fn object() -> Self {
        ResolvedType::Class(OBJECT_CLASS.to_string())
    }

    /// Wrap `element` in `dimensions` array levels, flattening nested arrays.
    pub fn array(dimensions: u8, element: ResolvedType) -> Self {
        if dimensions == 0 {
            return element;
        }
        match element {
            ResolvedType::Array {
                dimensions: inner,
                element,
            } => ResolvedType::Array {
                dimensions: inner.saturating_add(dimensions),
                element,
            },
            other => ResolvedType::Array {
                dimensions,
                element: Box::new(other),
            },
        }
    }

    /// Binary class name for class-like types.
    pub fn class_name(&self) -> Option<&str> {
        match self {
            ResolvedType::Class(name) => Some(name),
            ResolvedType::Parameterized { class, .. } => Some(class),
            _ => None,
        }
    }
}

impl fmt::Display for ResolvedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolvedType::Primitive(p) => f.write_str(p.keyword()),
            ResolvedType::Array {
                dimensions,
                element,
            } => {
                write!(f, "{element}")?;
                for _ in 0..*dimensions {
                    f.write_str("[]")?;
                }
                Ok(())
            }
            ResolvedType::Class(name) => f.write_str(name),
            ResolvedType::Parameterized { class, arguments } => {
                write!(f, "{class}<")?;
                for (i, arg) in arguments.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    match arg {
                        TypeArgument::Type(ty) => write!(f, "{ty}")?,
                        TypeArgument::Wildcard => f.write_str("?")?,
                        TypeArgument::Extends(ty) => write!(f, "? extends {ty}")?,
                        TypeArgument::Super(ty) => write!(f, "? super {ty}")?,
                    }
                }
                f.write_str(">")
            }
            ResolvedType::TypeVariable(name) => f.write_str(name),
        }
    }
}

/// One argument of a parameterized type.
///
/// Bounded wildcards are kept in the model so the synthesizer can reject
/// them explicitly.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TypeArgument {
    Type(ResolvedType),
    Wildcard,
    Extends(ResolvedType),
    Super(ResolvedType),
}

/// A formal type parameter with its bounds, in declaration order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypeParameter {
    pub name: String,
    pub bounds: Vec<ResolvedType>,
}

// ---------------------------------------------------------------------------
// Mixin declarations and interface method tables
// ---------------------------------------------------------------------------

/// One mixin-annotated type found in a source file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MixinDeclaration {
    pub source_file: PathBuf,
    /// Binary name of the annotated type (`pkg.Outer$InnerMixin`).
    pub class_name: String,
    pub targets: BTreeSet<String>,
    /// Binary names of the interfaces the mixin type implements.
    pub interfaces: BTreeSet<String>,
}

/// A method an interface requires implementors to provide.
///
/// Equality and hashing consider only `(name, descriptor)`.
#[derive(Clone, Debug)]
pub struct MethodSignature {
    pub name: String,
    /// Erased method descriptor, e.g. `(ILjava/lang/String;)V`.
    pub descriptor: String,
    pub generic_signature: Option<String>,
    pub parameter_names: Option<Vec<String>>,
    pub type_parameters: BTreeSet<String>,
    /// Internal names (`java/io/IOException`) of the erased thrown types.
    pub thrown_exceptions: Vec<String>,
}

impl MethodSignature {
    pub fn key(&self) -> (&str, &str) {
        (&self.name, &self.descriptor)
    }

    /// Parameter names, or `arg0, arg1, ...` when none were recovered.
    pub fn parameter_names_or_default(&self, parameter_count: usize) -> Vec<String> {
        match &self.parameter_names {
            Some(names) if names.len() == parameter_count => names.clone(),
            _ => (0..parameter_count).map(|i| format!("arg{i}")).collect(),
        }
    }
}

impl PartialEq for MethodSignature {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for MethodSignature {}

impl Hash for MethodSignature {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

#[derive(Clone, Debug, Default)]
pub struct InterfaceDescriptor {
    pub name: String,
    pub methods: Vec<MethodSignature>,
}

// ---------------------------------------------------------------------------
// Augmentation plan
// ---------------------------------------------------------------------------

/// What a single target class gains.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TargetPlan {
    pub interfaces: BTreeSet<String>,
    /// Every key is also in `interfaces`; interfaces without extractable
    /// methods map to an empty list.
    pub methods: BTreeMap<String, Vec<MethodSignature>>,
}

/// Target class binary name → what it gains. Ordered containers keep the
/// plan, and everything encoded from it, independent of discovery order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TargetAugmentation {
    pub targets: BTreeMap<String, TargetPlan>,
}

impl TargetAugmentation {
    /// Union the interfaces of every declaration per target and attach the
    /// extracted method tables.
    pub fn build<'a>(
        declarations: impl IntoIterator<Item = &'a MixinDeclaration>,
        interfaces: &BTreeMap<String, InterfaceDescriptor>,
    ) -> Self {
        let mut targets: BTreeMap<String, TargetPlan> = BTreeMap::new();
        for declaration in declarations {
            for target in &declaration.targets {
                let plan = targets.entry(target.clone()).or_default();
                for itf in &declaration.interfaces {
                    if plan.interfaces.insert(itf.clone()) {
                        let methods = interfaces
                            .get(itf)
                            .map(|d| d.methods.clone())
                            .unwrap_or_default();
                        plan.methods.insert(itf.clone(), methods);
                    }
                }
            }
        }
        Self { targets }
    }

    pub fn get(&self, target: &str) -> Option<&TargetPlan> {
        self.targets.get(target)
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Distinct interfaces referenced by any target.
    pub fn interface_names(&self) -> BTreeSet<String> {
        self.targets
            .values()
            .flat_map(|plan| plan.interfaces.iter().cloned())
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Diagnostics
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DiagnosticKind {
    UnsupportedSupertype,
    UnresolvedType,
    MissingInterfaceSource,
    SyntaxRecovery,
    DuplicateInterface,
    ExistingMethod,
    MissingMixinSource,
}

impl DiagnosticKind {
    pub fn as_str(self) -> &'static str {
        match self {
            DiagnosticKind::UnsupportedSupertype => "unsupported_supertype",
            DiagnosticKind::UnresolvedType => "unresolved_type",
            DiagnosticKind::MissingInterfaceSource => "missing_interface_source",
            DiagnosticKind::SyntaxRecovery => "syntax_recovery",
            DiagnosticKind::DuplicateInterface => "duplicate_interface",
            DiagnosticKind::ExistingMethod => "existing_method",
            DiagnosticKind::MissingMixinSource => "missing_mixin_source",
        }
    }
}

/// A non-fatal event worth reporting; created through [`Diagnostic::warn`]
/// so that it is also logged.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub subject: String,
    pub message: String,
}

impl Diagnostic {
    pub fn warn(kind: DiagnosticKind, subject: impl Into<String>, message: impl Into<String>) -> Self {
        let diagnostic = Diagnostic {
            kind,
            subject: subject.into(),
            message: message.into(),
        };
        warn!(
            kind = diagnostic.kind.as_str(),
            subject = %diagnostic.subject,
            "{}",
            diagnostic.message
        );
        diagnostic
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.kind.as_str(), self.subject, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn declaration(class: &str, targets: &[&str], interfaces: &[&str]) -> MixinDeclaration {
        MixinDeclaration {
            source_file: PathBuf::from(format!("{class}.java")),
            class_name: class.to_string(),
            targets: targets.iter().map(|s| s.to_string()).collect(),
            interfaces: interfaces.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn method(name: &str, descriptor: &str) -> MethodSignature {
        MethodSignature {
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            generic_signature: None,
            parameter_names: None,
            type_parameters: BTreeSet::new(),
            thrown_exceptions: Vec::new(),
        }
    }

    #[test]
    fn test_array_flattens_nested_arrays() {
        let inner = ResolvedType::array(2, ResolvedType::class("java.lang.String"));
        let outer = ResolvedType::array(1, inner);
        assert_eq!(
            outer,
            ResolvedType::Array {
                dimensions: 3,
                element: Box::new(ResolvedType::class("java.lang.String")),
            }
        );
        assert_eq!(outer.to_string(), "java.lang.String[][][]");
    }

    #[test]
    fn test_method_equality_is_name_and_descriptor() {
        let mut a = method("get", "()I");
        a.parameter_names = Some(vec![]);
        let b = method("get", "()I");
        assert_eq!(a, b);
        assert_ne!(a, method("get", "()J"));
    }

    #[test]
    fn test_default_parameter_names() {
        let m = method("set", "(IJ)V");
        assert_eq!(m.parameter_names_or_default(2), vec!["arg0", "arg1"]);
        let mut named = method("set", "(IJ)V");
        named.parameter_names = Some(vec!["a".into(), "b".into()]);
        assert_eq!(named.parameter_names_or_default(2), vec!["a", "b"]);
    }

    #[test]
    fn test_build_unions_interfaces_per_target() {
        let mut interfaces = BTreeMap::new();
        interfaces.insert(
            "pkg.IBar".to_string(),
            InterfaceDescriptor {
                name: "pkg.IBar".to_string(),
                methods: vec![method("get", "()I")],
            },
        );
        let decls = vec![
            declaration("pkg.MixinA", &["pkg.Foo"], &["pkg.IBar"]),
            declaration("pkg.MixinB", &["pkg.Foo"], &["pkg.IBar", "pkg.IEmpty"]),
        ];
        let plan = TargetAugmentation::build(&decls, &interfaces);
        assert_eq!(plan.len(), 1);
        let foo = plan.get("pkg.Foo").unwrap();
        assert_eq!(foo.interfaces.len(), 2);
        assert_eq!(foo.methods["pkg.IBar"].len(), 1);
        assert!(foo.methods["pkg.IEmpty"].is_empty());
        for key in foo.methods.keys() {
            assert!(foo.interfaces.contains(key));
        }
    }

    #[test]
    fn test_build_is_order_independent() {
        let interfaces = BTreeMap::new();
        let a = declaration("pkg.MixinA", &["pkg.Foo", "pkg.Baz"], &["pkg.IA"]);
        let b = declaration("pkg.MixinB", &["pkg.Foo"], &["pkg.IB"]);
        let forward = TargetAugmentation::build([&a, &b], &interfaces);
        let backward = TargetAugmentation::build([&b, &a], &interfaces);
        assert_eq!(forward, backward);
        assert_eq!(
            forward.interface_names().into_iter().collect::<Vec<_>>(),
            vec!["pkg.IA".to_string(), "pkg.IB".to_string()]
        );
    }
}
