//! Resolution of simple and qualified type names used in a Java source file
//! to binary class names.
//!
//! Lookup order, first match wins:
//! 1. in-scope type parameters
//! 2. single-type imports (`import a.b.C;`)
//! 3. wildcard imports (`import a.b.*;`), verified against the source roots
//! 4. the enclosing package, verified against the source roots
//! 5. the default `java.lang` package, verified by probing for the class
//! 6. names that already look fully qualified (`java.util.List`)

use std::collections::HashMap;
use std::io::Read as _;
use std::path::PathBuf;

use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use tracing::{debug, trace};

use crate::models::ResolvedType;
use crate::source::filesystem::SourceRoots;

const DEFAULT_PACKAGE: &str = "java.lang";

/// Public top-level types of `java.lang`, used when no class path entry
/// answers a probe.
const JAVA_LANG_TYPES: &[&str] = &[
    "AbstractMethodError", "Appendable", "ArithmeticException",
    "ArrayIndexOutOfBoundsException", "ArrayStoreException", "AssertionError",
    "AutoCloseable", "Boolean", "BootstrapMethodError", "Byte", "Character",
    "CharSequence", "Class", "ClassCastException", "ClassCircularityError",
    "ClassFormatError", "ClassLoader", "ClassNotFoundException", "ClassValue",
    "CloneNotSupportedException", "Cloneable", "Comparable", "Deprecated",
    "Double", "Enum", "EnumConstantNotPresentException", "Error", "Exception",
    "ExceptionInInitializerError", "Float", "FunctionalInterface",
    "IllegalAccessError", "IllegalAccessException", "IllegalArgumentException",
    "IllegalCallerException", "IllegalMonitorStateException",
    "IllegalStateException", "IllegalThreadStateException",
    "IncompatibleClassChangeError", "IndexOutOfBoundsException",
    "InheritableThreadLocal", "InstantiationError", "InstantiationException",
    "Integer", "InternalError", "InterruptedException", "Iterable",
    "LayerInstantiationException", "LinkageError", "Long", "Math",
    "MatchException", "Module", "ModuleLayer", "NegativeArraySizeException",
    "NoClassDefFoundError", "NoSuchFieldError", "NoSuchFieldException",
    "NoSuchMethodError", "NoSuchMethodException", "NullPointerException",
    "Number", "NumberFormatException", "Object", "OutOfMemoryError", "Override",
    "Package", "Process", "ProcessBuilder", "ProcessHandle", "Readable",
    "Record", "ReflectiveOperationException", "Runnable", "Runtime",
    "RuntimeException", "RuntimePermission", "SafeVarargs", "SecurityException",
    "SecurityManager", "Short", "StackOverflowError", "StackTraceElement",
    "StackWalker", "StrictMath", "String", "StringBuffer", "StringBuilder",
    "StringIndexOutOfBoundsException", "SuppressWarnings", "System", "Thread",
    "ThreadDeath", "ThreadGroup", "ThreadLocal", "Throwable",
    "TypeNotPresentException", "UnknownError", "UnsatisfiedLinkError",
    "UnsupportedClassVersionError", "UnsupportedOperationException",
    "VerifyError", "VirtualMachineError", "Void", "WrongThreadException",
];

// ---------------------------------------------------------------------------
// Import scope
// ---------------------------------------------------------------------------

/// Package and imports of one compilation unit.
#[derive(Clone, Debug)]
pub struct ImportScope {
    package: String,
    imports: Vec<String>,
    fingerprint: String,
}

impl ImportScope {
    pub fn new(package: impl Into<String>, imports: Vec<String>) -> Self {
        let package = package.into();
        let mut sorted = imports.clone();
        sorted.sort();
        let mut hasher = Sha256::new();
        hasher.update(package.as_bytes());
        for import in &sorted {
            hasher.update([0u8]);
            hasher.update(import.as_bytes());
        }
        let fingerprint = format!("{:x}", hasher.finalize())[..16].to_string();
        Self {
            package,
            imports,
            fingerprint,
        }
    }

    pub fn package(&self) -> &str {
        &self.package
    }

    pub fn imports(&self) -> &[String] {
        &self.imports
    }

    /// Binary name of a type declared in this unit (`Outer`, `Outer$Inner`).
    pub fn qualify(&self, nested_path: &str) -> String {
        if self.package.is_empty() {
            nested_path.to_string()
        } else {
            format!("{}.{}", self.package, nested_path)
        }
    }
}

// ---------------------------------------------------------------------------
// Shared cache
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct ResolutionKey {
    name: String,
    scope: String,
    roots: String,
}

/// Memoized resolutions, shared by every worker of a run. Entries are
/// idempotent, so a concurrent miss only costs a redundant probe.
#[derive(Debug, Default)]
pub struct ResolutionCache {
    resolved: RwLock<HashMap<ResolutionKey, Option<String>>>,
    default_package: RwLock<HashMap<String, bool>>,
}

impl ResolutionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.resolved.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ---------------------------------------------------------------------------
// Default-package class probe
// ---------------------------------------------------------------------------

/// Directories and archives searched for compiled classes of the default
/// package, backed by a built-in table of `java.lang` types.
#[derive(Clone, Debug, Default)]
pub struct ClassPath {
    entries: Vec<PathBuf>,
}

impl ClassPath {
    pub fn new(entries: Vec<PathBuf>) -> Self {
        Self { entries }
    }

    /// Whether a compiled `internal_name` class exists on this class path or
    /// in the built-in table.
    pub fn probe(&self, internal_name: &str) -> bool {
        let entry_name = format!("{internal_name}.class");
        for entry in &self.entries {
            if entry.is_dir() {
                if entry.join(&entry_name).is_file() {
                    return true;
                }
            } else if entry.is_file() && archive_contains(entry, &entry_name) {
                return true;
            }
        }
        internal_name
            .strip_prefix("java/lang/")
            .is_some_and(|simple| JAVA_LANG_TYPES.contains(&simple))
    }
}

fn archive_contains(path: &std::path::Path, entry_name: &str) -> bool {
    let Ok(file) = std::fs::File::open(path) else {
        return false;
    };
    let Ok(mut archive) = zip::ZipArchive::new(file) else {
        return false;
    };
    let found = archive.by_name(entry_name).map(|mut f| {
        let mut magic = [0u8; 4];
        f.read_exact(&mut magic).is_ok() && magic == [0xCA, 0xFE, 0xBA, 0xBE]
    });
    matches!(found, Ok(true))
}

// ---------------------------------------------------------------------------
// Resolver
// ---------------------------------------------------------------------------

/// Name resolver bound to one run's source roots, class path and cache.
#[derive(Clone, Copy)]
pub struct NameResolver<'a> {
    roots: &'a SourceRoots,
    class_path: &'a ClassPath,
    cache: &'a ResolutionCache,
}

impl<'a> NameResolver<'a> {
    pub fn new(roots: &'a SourceRoots, class_path: &'a ClassPath, cache: &'a ResolutionCache) -> Self {
        Self {
            roots,
            class_path,
            cache,
        }
    }

    pub fn roots(&self) -> &'a SourceRoots {
        self.roots
    }

    /// Resolve `name` as written in a unit with `scope`. Returns `None` when
    /// nothing matches; callers decide whether that is fatal.
    pub fn resolve(
        &self,
        name: &str,
        scope: &ImportScope,
        type_parameters: &[String],
    ) -> Option<ResolvedType> {
        let name: String = name.chars().filter(|c| !c.is_whitespace()).collect();
        if type_parameters.iter().any(|p| *p == name) {
            return Some(ResolvedType::TypeVariable(name));
        }
        self.resolve_class(&name, scope).map(ResolvedType::Class)
    }

    /// Resolve to a binary class name, ignoring type parameters.
    pub fn resolve_class(&self, name: &str, scope: &ImportScope) -> Option<String> {
        let key = ResolutionKey {
            name: name.to_string(),
            scope: scope.fingerprint.clone(),
            roots: self.roots.fingerprint().to_string(),
        };
        if let Some(hit) = self.cache.resolved.read().get(&key) {
            trace!(name, "resolution cache hit");
            return hit.clone();
        }
        let resolved = self.resolve_uncached(name, scope);
        debug!(name, resolved = ?resolved, "resolved type name");
        self.cache.resolved.write().insert(key, resolved.clone());
        resolved
    }

    fn resolve_uncached(&self, name: &str, scope: &ImportScope) -> Option<String> {
        let (outer, nested) = match name.find('.') {
            Some(dot) => (&name[..dot], &name[dot + 1..]),
            None => (name, ""),
        };
        let with_nested = |base: String| -> String {
            if nested.is_empty() {
                base
            } else {
                format!("{base}${}", nested.replace('.', "$"))
            }
        };

        // Single-type imports.
        for import in scope.imports().iter().filter(|i| !i.ends_with(".*")) {
            let simple = import.rsplit('.').next().unwrap_or(import);
            if simple == outer {
                return Some(with_nested(self.roots.binary_name_of(import)));
            }
        }

        // Wildcard imports.
        for import in scope.imports() {
            if let Some(package) = import.strip_suffix(".*") {
                if self.roots.find_source(package, outer).is_some() {
                    return Some(with_nested(format!("{package}.{outer}")));
                }
            }
        }

        // Same package.
        if self.roots.find_source(scope.package(), outer).is_some() {
            return Some(with_nested(scope.qualify(outer)));
        }

        // Default package.
        if self.default_package_has(outer) {
            return Some(with_nested(format!("{DEFAULT_PACKAGE}.{outer}")));
        }

        // Already qualified.
        if !nested.is_empty() && outer.starts_with(|c: char| c.is_ascii_lowercase()) {
            return Some(self.roots.binary_name_of(name));
        }

        None
    }

    fn default_package_has(&self, simple: &str) -> bool {
        if let Some(&known) = self.cache.default_package.read().get(simple) {
            return known;
        }
        let internal = format!("{}/{simple}", DEFAULT_PACKAGE.replace('.', "/"));
        let found = self.class_path.probe(&internal);
        self.cache
            .default_package
            .write()
            .insert(simple.to_string(), found);
        found
    }
}
