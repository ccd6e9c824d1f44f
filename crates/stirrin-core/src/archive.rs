//! Archive rewriting: add interfaces and stubs to target classes and copy
//! everything else through untouched.
//!
//! Output is written to a temporary file next to the destination and only
//! renamed into place once complete, so a failed run never leaves a
//! half-written archive behind.

use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufWriter, Read, Seek, Write};
use std::path::Path;

use tracing::{debug, info};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::classfile::{mutf8, stub, ClassRecord};
use crate::errors::{StirrinError, StirrinResult};
use crate::models::{Diagnostic, DiagnosticKind, TargetAugmentation, TargetPlan};
use crate::signature::{binary_name, class_descriptor, internal_name};

const CLASS_SUFFIX: &str = ".class";

/// Counters and diagnostics of one archive transform.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransformReport {
    pub entries: usize,
    pub classes_augmented: usize,
    pub interfaces_added: usize,
    pub stubs_added: usize,
    pub diagnostics: Vec<Diagnostic>,
}

/// What augmenting one class changed.
#[derive(Debug, Default)]
pub struct ClassChanges {
    pub interfaces_added: usize,
    pub stubs_added: usize,
    pub diagnostics: Vec<Diagnostic>,
}

impl ClassChanges {
    pub fn is_empty(&self) -> bool {
        self.interfaces_added == 0 && self.stubs_added == 0
    }
}

/// Add the interfaces and stubs of `plan` to `record`.
///
/// Interfaces the class already implements are skipped together with their
/// methods; methods the class already declares are never stubbed.
pub fn augment_class(record: &mut ClassRecord, plan: &TargetPlan) -> Result<ClassChanges, String> {
    let class = binary_name(&record.name()?);
    let mut changes = ClassChanges::default();
    let mut existing: BTreeSet<(Vec<u8>, Vec<u8>)> = record.method_keys()?.into_iter().collect();
    let mut stubbed: BTreeSet<(Vec<u8>, Vec<u8>)> = BTreeSet::new();
    let mut added = Vec::new();

    for interface in &plan.interfaces {
        let internal = internal_name(interface);
        if record.has_interface(&internal) {
            changes.diagnostics.push(Diagnostic::warn(
                DiagnosticKind::DuplicateInterface,
                &class,
                format!("already implements {interface}; skipping it and its methods"),
            ));
            continue;
        }
        record.add_interface(&internal)?;
        added.push(interface);
        changes.interfaces_added += 1;

        for method in plan.methods.get(interface).into_iter().flatten() {
            let key = (mutf8::encode(&method.name), mutf8::encode(&method.descriptor));
            if existing.contains(&key) {
                if !stubbed.contains(&key) {
                    changes.diagnostics.push(Diagnostic::warn(
                        DiagnosticKind::ExistingMethod,
                        &class,
                        format!(
                            "keeps its own {}{} required by {interface}",
                            method.name, method.descriptor
                        ),
                    ));
                }
                continue;
            }
            stub::add_stub(record, method)?;
            existing.insert(key.clone());
            stubbed.insert(key);
            changes.stubs_added += 1;
        }
    }

    if !added.is_empty() {
        if let Some(signature) = record.signature() {
            let mut extended = signature;
            for interface in &added {
                extended.push_str(&class_descriptor(interface));
            }
            record.set_signature(&extended)?;
        }
    }
    Ok(changes)
}

/// Rewrite `input` into `output`, augmenting every class named in `plan`.
pub fn transform_archive(
    input: &Path,
    output: &Path,
    plan: &TargetAugmentation,
) -> StirrinResult<TransformReport> {
    let file = File::open(input).map_err(|e| StirrinError::io(input, e))?;
    let mut archive = ZipArchive::new(file)?;
    let report = publish(output, |out| rewrite(&mut archive, out, plan))?;
    info!(
        input = %input.display(),
        output = %output.display(),
        classes = report.classes_augmented,
        interfaces = report.interfaces_added,
        stubs = report.stubs_added,
        "transformed archive"
    );
    Ok(report)
}

/// Copy `input` to `output` unchanged, with the same atomic publish.
pub fn copy_archive(input: &Path, output: &Path) -> StirrinResult<()> {
    let mut source = File::open(input).map_err(|e| StirrinError::io(input, e))?;
    publish(output, |out| {
        std::io::copy(&mut source, out).map_err(|e| StirrinError::io(input, e))?;
        Ok(())
    })?;
    debug!(input = %input.display(), output = %output.display(), "copied archive unchanged");
    Ok(())
}

fn rewrite<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    out: &mut File,
    plan: &TargetAugmentation,
) -> StirrinResult<TransformReport> {
    let mut writer = ZipWriter::new(BufWriter::new(out));
    let mut report = TransformReport::default();

    for index in 0..archive.len() {
        report.entries += 1;
        let name = archive.by_index_raw(index)?.name().to_string();
        let rewritten = if name.ends_with(CLASS_SUFFIX) {
            rewrite_class(archive, index, &name, plan, &mut report)?
        } else {
            None
        };

        match rewritten {
            Some(bytes) => {
                let options = {
                    let entry = archive.by_index_raw(index)?;
                    let method = match entry.compression() {
                        CompressionMethod::Stored => CompressionMethod::Stored,
                        _ => CompressionMethod::Deflated,
                    };
                    let mut options = SimpleFileOptions::default().compression_method(method);
                    if let Some(modified) = entry.last_modified() {
                        options = options.last_modified_time(modified);
                    }
                    if let Some(mode) = entry.unix_mode() {
                        options = options.unix_permissions(mode);
                    }
                    options
                };
                writer.start_file(name.as_str(), options)?;
                writer
                    .write_all(&bytes)
                    .map_err(|e| StirrinError::io(&name, e))?;
            }
            None => writer.raw_copy_file(archive.by_index_raw(index)?)?,
        }
    }

    writer.set_raw_comment(archive.comment().to_vec().into_boxed_slice());
    let mut buffered = writer.finish()?;
    buffered
        .flush()
        .map_err(|e| StirrinError::io("<output archive>", e))?;
    Ok(report)
}

/// New bytes for a class entry, or `None` when it passes through as is.
fn rewrite_class<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    index: usize,
    name: &str,
    plan: &TargetAugmentation,
    report: &mut TransformReport,
) -> StirrinResult<Option<Vec<u8>>> {
    let mut bytes = Vec::new();
    archive
        .by_index(index)?
        .read_to_end(&mut bytes)
        .map_err(|e| StirrinError::io(name, e))?;
    let mut record = ClassRecord::decode(&bytes).map_err(|e| StirrinError::class_format(name, e))?;
    let class = binary_name(&record.name().map_err(|e| StirrinError::class_format(name, e))?);

    let Some(target) = plan.get(&class) else {
        return Ok(None);
    };
    let changes = augment_class(&mut record, target).map_err(|e| StirrinError::class_format(name, e))?;
    report.diagnostics.extend(changes.diagnostics.iter().cloned());
    if changes.is_empty() {
        debug!(class = %class, "target already augmented");
        return Ok(None);
    }
    report.classes_augmented += 1;
    report.interfaces_added += changes.interfaces_added;
    report.stubs_added += changes.stubs_added;
    debug!(
        class = %class,
        interfaces = changes.interfaces_added,
        stubs = changes.stubs_added,
        "augmented class"
    );
    let encoded = record
        .encode()
        .map_err(|e| StirrinError::class_format(name, e))?;
    Ok(Some(encoded))
}

/// Run `write` against a temporary file beside `output` and move it into
/// place when it succeeds.
fn publish<T>(output: &Path, write: impl FnOnce(&mut File) -> StirrinResult<T>) -> StirrinResult<T> {
    let parent = match output.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => std::path::PathBuf::from("."),
    };
    std::fs::create_dir_all(&parent).map_err(|e| StirrinError::io(&parent, e))?;
    let mut temp = tempfile::NamedTempFile::new_in(&parent).map_err(|e| StirrinError::io(&parent, e))?;
    let value = write(temp.as_file_mut())?;
    temp.as_file()
        .sync_all()
        .map_err(|e| StirrinError::io(temp.path(), e))?;
    temp.persist(output)
        .map_err(|e| StirrinError::io(output, e.error))?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classfile::record::ACC_PUBLIC;
    use crate::models::MethodSignature;
    use std::collections::{BTreeMap, BTreeSet};
    use tempfile::TempDir;

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

    fn plan(target: &str, interfaces: &[(&str, Vec<MethodSignature>)]) -> TargetAugmentation {
        let mut target_plan = TargetPlan::default();
        for (name, methods) in interfaces {
            target_plan.interfaces.insert(name.to_string());
            target_plan.methods.insert(name.to_string(), methods.clone());
        }
        let mut targets = BTreeMap::new();
        targets.insert(target.to_string(), target_plan);
        TargetAugmentation { targets }
    }

    fn class_bytes(name: &str, methods: &[(&str, &str)], signature: Option<&str>) -> Vec<u8> {
        let mut record = ClassRecord::new_class(name, Some("java/lang/Object")).unwrap();
        for (n, d) in methods {
            record.add_method(ACC_PUBLIC, n, d, Vec::new()).unwrap();
        }
        if let Some(sig) = signature {
            record.set_signature(sig).unwrap();
        }
        record.encode().unwrap()
    }

    fn write_jar(path: &Path, entries: &[(&str, Vec<u8>)]) {
        let mut writer = ZipWriter::new(File::create(path).unwrap());
        for (name, bytes) in entries {
            let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
            writer.start_file(*name, options).unwrap();
            writer.write_all(bytes).unwrap();
        }
        writer.set_raw_comment(b"built by tests".to_vec().into_boxed_slice());
        writer.finish().unwrap();
    }

    fn read_entry(path: &Path, name: &str) -> Vec<u8> {
        let mut archive = ZipArchive::new(File::open(path).unwrap()).unwrap();
        let mut bytes = Vec::new();
        archive.by_name(name).unwrap().read_to_end(&mut bytes).unwrap();
        bytes
    }

    fn ibar() -> TargetAugmentation {
        plan("pkg.Foo", &[("pkg.IBar", vec![method("get", "()I")])])
    }

    #[test]
    fn test_augment_adds_interface_and_stub() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("in.jar");
        let output = dir.path().join("out.jar");
        write_jar(
            &input,
            &[
                ("META-INF/MANIFEST.MF", b"Manifest-Version: 1.0\n".to_vec()),
                ("pkg/Foo.class", class_bytes("pkg/Foo", &[], None)),
            ],
        );

        let report = transform_archive(&input, &output, &ibar()).unwrap();
        assert_eq!(report.entries, 2);
        assert_eq!(report.classes_augmented, 1);
        assert_eq!(report.stubs_added, 1);

        let foo = ClassRecord::decode(&read_entry(&output, "pkg/Foo.class")).unwrap();
        assert_eq!(foo.interface_names(), vec!["pkg/IBar"]);
        assert!(foo.has_method("get", "()I"));
        assert!(foo.signature().is_none());
        assert_eq!(
            read_entry(&output, "META-INF/MANIFEST.MF"),
            b"Manifest-Version: 1.0\n".to_vec()
        );
        let archive = ZipArchive::new(File::open(&output).unwrap()).unwrap();
        assert_eq!(archive.comment(), b"built by tests");
    }

    #[test]
    fn test_existing_method_wins() {
        let mut record = ClassRecord::decode(&class_bytes("pkg/Foo", &[("get", "()I")], None)).unwrap();
        let target = ibar();
        let changes = augment_class(&mut record, target.get("pkg.Foo").unwrap()).unwrap();
        assert_eq!(changes.interfaces_added, 1);
        assert_eq!(changes.stubs_added, 0);
        assert_eq!(changes.diagnostics[0].kind, DiagnosticKind::ExistingMethod);
        assert_eq!(record.methods.len(), 1);
        assert!(record.methods[0].attributes.is_empty());
    }

    #[test]
    fn test_duplicate_interface_skipped_with_methods() {
        let mut record = ClassRecord::new_class("pkg/Foo", Some("java/lang/Object")).unwrap();
        record.add_interface("pkg/IBar").unwrap();
        let target = ibar();
        let changes = augment_class(&mut record, target.get("pkg.Foo").unwrap()).unwrap();
        assert!(changes.is_empty());
        assert_eq!(changes.diagnostics[0].kind, DiagnosticKind::DuplicateInterface);
        assert!(record.methods.is_empty());
    }

    #[test]
    fn test_shared_method_stubbed_once() {
        let mut record = ClassRecord::new_class("pkg/Foo", Some("java/lang/Object")).unwrap();
        let target = plan(
            "pkg.Foo",
            &[
                ("pkg.IA", vec![method("size", "()I")]),
                ("pkg.IB", vec![method("size", "()I"), method("clear", "()V")]),
            ],
        );
        let changes = augment_class(&mut record, target.get("pkg.Foo").unwrap()).unwrap();
        assert_eq!(changes.interfaces_added, 2);
        assert_eq!(changes.stubs_added, 2);
        assert!(changes.diagnostics.is_empty());
    }

    #[test]
    fn test_class_signature_extended_only_when_present() {
        let mut record = ClassRecord::decode(&class_bytes(
            "pkg/Foo",
            &[],
            Some("<T:Ljava/lang/Object;>Ljava/lang/Object;"),
        ))
        .unwrap();
        let target = ibar();
        augment_class(&mut record, target.get("pkg.Foo").unwrap()).unwrap();
        assert_eq!(
            record.signature().as_deref(),
            Some("<T:Ljava/lang/Object;>Ljava/lang/Object;Lpkg/IBar;")
        );
    }

    #[test]
    fn test_passthrough_is_byte_identical() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("in.jar");
        let output = dir.path().join("out.jar");
        let other = class_bytes("pkg/Other", &[("x", "()V")], None);
        write_jar(
            &input,
            &[
                ("pkg/Other.class", other.clone()),
                ("assets/data.bin", vec![0, 1, 2, 3, 255]),
            ],
        );
        let report = transform_archive(&input, &output, &ibar()).unwrap();
        assert_eq!(report.classes_augmented, 0);
        assert_eq!(read_entry(&output, "pkg/Other.class"), other);
        assert_eq!(read_entry(&output, "assets/data.bin"), vec![0, 1, 2, 3, 255]);
    }

    #[test]
    fn test_transform_is_idempotent_and_deterministic() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("in.jar");
        write_jar(&input, &[("pkg/Foo.class", class_bytes("pkg/Foo", &[], None))]);

        let once = dir.path().join("once.jar");
        let again = dir.path().join("again.jar");
        let twice = dir.path().join("twice.jar");
        transform_archive(&input, &once, &ibar()).unwrap();
        transform_archive(&input, &again, &ibar()).unwrap();
        assert_eq!(std::fs::read(&once).unwrap(), std::fs::read(&again).unwrap());

        let report = transform_archive(&once, &twice, &ibar()).unwrap();
        assert_eq!(report.classes_augmented, 0);
        assert_eq!(report.diagnostics[0].kind, DiagnosticKind::DuplicateInterface);
        let foo = ClassRecord::decode(&read_entry(&twice, "pkg/Foo.class")).unwrap();
        assert_eq!(foo.interface_names(), vec!["pkg/IBar"]);
        assert_eq!(foo.methods.len(), 1);
    }

    #[test]
    fn test_corrupt_class_aborts_without_output() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("in.jar");
        let output = dir.path().join("out.jar");
        write_jar(&input, &[("pkg/Broken.class", vec![0xCA, 0xFE, 0x00])]);
        let err = transform_archive(&input, &output, &ibar()).unwrap_err();
        assert!(matches!(err, StirrinError::ClassFormat { .. }));
        assert!(!output.exists());
        let leftovers: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(leftovers.len(), 1);
    }

    #[test]
    fn test_copy_archive() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("in.jar");
        let output = dir.path().join("nested/out.jar");
        write_jar(&input, &[("a.txt", b"a".to_vec())]);
        copy_archive(&input, &output).unwrap();
        assert_eq!(std::fs::read(&input).unwrap(), std::fs::read(&output).unwrap());
    }
}
