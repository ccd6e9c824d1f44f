//! Source-root lookups and scanning for mixin-bearing files.

use std::path::PathBuf;

use sha2::{Digest, Sha256};
use tracing::{debug, warn};
use walkdir::WalkDir;

const JAVA_EXTENSION: &str = "java";

/// Directories that are never descended into while scanning.
const IMPLICIT_IGNORED_DIRS: &[&str] = &[".git", ".gradle", "build", "out"];

/// The ordered set of source root directories used for name resolution and
/// interface lookup.
#[derive(Clone, Debug)]
pub struct SourceRoots {
    roots: Vec<PathBuf>,
    fingerprint: String,
}

impl SourceRoots {
    pub fn new(roots: impl IntoIterator<Item = PathBuf>) -> Self {
        let mut deduped: Vec<PathBuf> = Vec::new();
        for root in roots {
            if !root.is_dir() {
                warn!(root = %root.display(), "source root does not exist; ignoring");
                continue;
            }
            if !deduped.contains(&root) {
                deduped.push(root);
            }
        }
        let fingerprint = compute_fingerprint(&deduped);
        Self {
            roots: deduped,
            fingerprint,
        }
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Stable identity of this root set, used in resolver cache keys.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Source file declaring top-level type `simple_name` in `package`.
    pub fn find_source(&self, package: &str, simple_name: &str) -> Option<PathBuf> {
        let mut relative = PathBuf::new();
        for segment in package.split('.').filter(|s| !s.is_empty()) {
            relative.push(segment);
        }
        relative.push(format!("{simple_name}.{JAVA_EXTENSION}"));
        self.roots
            .iter()
            .map(|root| root.join(&relative))
            .find(|candidate| candidate.is_file())
    }

    /// Source file declaring the (possibly nested) binary class name.
    pub fn locate_type(&self, binary_name: &str) -> Option<PathBuf> {
        let outer = binary_name.split('$').next().unwrap_or(binary_name);
        let (package, simple) = split_package(outer);
        self.find_source(package, simple)
    }

    /// Turn a dotted qualified name into a binary name by finding the
    /// longest prefix with a source file; the rest are nested classes.
    /// Names with no matching source are returned unchanged.
    pub fn binary_name_of(&self, qualified: &str) -> String {
        let segments: Vec<&str> = qualified.split('.').collect();
        for split in (1..=segments.len()).rev() {
            let outer = segments[..split].join(".");
            let (package, simple) = split_package(&outer);
            if self.find_source(package, simple).is_some() {
                let mut name = outer;
                for nested in &segments[split..] {
                    name.push('$');
                    name.push_str(nested);
                }
                return name;
            }
        }
        qualified.to_string()
    }

    /// Java files under every root whose text mentions `marker`.
    pub fn scan_for_marker(&self, marker: &str) -> Vec<PathBuf> {
        let mut found = Vec::new();
        for root in &self.roots {
            let walker = WalkDir::new(root)
                .sort_by_file_name()
                .into_iter()
                .filter_entry(|e| {
                    !(e.file_type().is_dir()
                        && e.depth() > 0
                        && e.file_name()
                            .to_str()
                            .is_some_and(|n| IMPLICIT_IGNORED_DIRS.contains(&n)))
                });
            for entry in walker {
                let entry = match entry {
                    Ok(e) => e,
                    Err(e) => {
                        warn!(root = %root.display(), error = %e, "failed to read directory entry");
                        continue;
                    }
                };
                let path = entry.path();
                if !entry.file_type().is_file()
                    || path.extension().and_then(|e| e.to_str()) != Some(JAVA_EXTENSION)
                {
                    continue;
                }
                match std::fs::read_to_string(path) {
                    Ok(text) if text.contains(marker) => found.push(path.to_path_buf()),
                    Ok(_) => {}
                    Err(e) => warn!(path = %path.display(), error = %e, "failed to read source"),
                }
            }
        }
        debug!(count = found.len(), marker, "scanned source roots");
        found
    }
}

/// `a.b.C` → (`a.b`, `C`); a bare name has an empty package.
pub fn split_package(qualified: &str) -> (&str, &str) {
    match qualified.rfind('.') {
        Some(dot) => (&qualified[..dot], &qualified[dot + 1..]),
        None => ("", qualified),
    }
}

/// First 16 hex characters of the SHA-256 of the root paths.
fn compute_fingerprint(roots: &[PathBuf]) -> String {
    let mut hasher = Sha256::new();
    for root in roots {
        hasher.update(root.to_string_lossy().as_bytes());
        hasher.update([0u8]);
    }
    let digest = format!("{:x}", hasher.finalize());
    digest[..16].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use tempfile::TempDir;

    fn write(root: &Path, relative: &str, text: &str) {
        let path = root.join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, text).unwrap();
    }

    #[test]
    fn test_find_source_across_roots() {
        let a = TempDir::new().unwrap();
        let b = TempDir::new().unwrap();
        write(b.path(), "pkg/IBar.java", "package pkg; interface IBar {}");
        let roots = SourceRoots::new(vec![a.path().to_path_buf(), b.path().to_path_buf()]);
        assert_eq!(
            roots.find_source("pkg", "IBar"),
            Some(b.path().join("pkg/IBar.java"))
        );
        assert!(roots.find_source("pkg", "Missing").is_none());
        assert_eq!(
            roots.locate_type("pkg.IBar$Inner"),
            Some(b.path().join("pkg/IBar.java"))
        );
    }

    #[test]
    fn test_missing_roots_ignored() {
        let roots = SourceRoots::new(vec![PathBuf::from("/definitely/not/here")]);
        assert!(roots.is_empty());
    }

    #[test]
    fn test_binary_name_of_nested() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "pkg/Outer.java", "package pkg; class Outer {}");
        let roots = SourceRoots::new(vec![dir.path().to_path_buf()]);
        assert_eq!(roots.binary_name_of("pkg.Outer.Inner"), "pkg.Outer$Inner");
        assert_eq!(roots.binary_name_of("pkg.Outer"), "pkg.Outer");
        assert_eq!(roots.binary_name_of("java.util.List"), "java.util.List");
    }

    #[test]
    fn test_fingerprint_depends_on_roots() {
        let a = TempDir::new().unwrap();
        let b = TempDir::new().unwrap();
        let one = SourceRoots::new(vec![a.path().to_path_buf()]);
        let same = SourceRoots::new(vec![a.path().to_path_buf()]);
        let two = SourceRoots::new(vec![a.path().to_path_buf(), b.path().to_path_buf()]);
        assert_eq!(one.fingerprint(), same.fingerprint());
        assert_ne!(one.fingerprint(), two.fingerprint());
        assert_eq!(one.fingerprint().len(), 16);
    }

    #[test]
    fn test_scan_for_marker() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "pkg/MixinFoo.java", "@Mixin(Foo.class) class MixinFoo {}");
        write(dir.path(), "pkg/Plain.java", "class Plain {}");
        write(dir.path(), "build/Gen.java", "@Mixin(Foo.class) class Gen {}");
        let roots = SourceRoots::new(vec![dir.path().to_path_buf()]);
        let found = roots.scan_for_marker("@Mixin");
        assert_eq!(found, vec![dir.path().join("pkg/MixinFoo.java")]);
    }
}
