//! End-to-end batch run: discover mixins, extract interface method tables
//! and rewrite one archive.
//!
//! Source parsing runs on a Rayon pool; the resolution cache is the only
//! state shared between workers. Every failure of a parallel stage is
//! collected and reported together, and nothing is written unless all of
//! them succeed.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::time::Instant;

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::archive::{copy_archive, transform_archive, TransformReport};
use crate::config::StirrinConfig;
use crate::errors::{StirrinError, StirrinResult};
use crate::models::{Diagnostic, InterfaceDescriptor, MixinDeclaration, TargetAugmentation};
use crate::source::filesystem::SourceRoots;
use crate::source::interfaces::{extract_from_file, group_by_source, missing_interface};
use crate::source::mixin_config::mixin_sources;
use crate::source::mixins::parse_mixin_file;
use crate::source::resolver::{ClassPath, NameResolver, ResolutionCache};

/// Text a candidate file must contain when scanning source roots.
const SCAN_MARKER: &str = "@Mixin";

/// Outcome of [`run`].
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    /// False when the archive name did not match the accepted pattern and
    /// the archive was copied unchanged.
    pub accepted: bool,
    pub mixin_files: usize,
    pub mixins: usize,
    pub targets: usize,
    pub interfaces_extracted: usize,
    pub transform: TransformReport,
    /// Source-side diagnostics first, then those of the archive rewrite.
    pub diagnostics: Vec<Diagnostic>,
    pub elapsed_ms: u128,
}

/// The augmentation plan for a set of sources, before any archive is read.
#[derive(Debug, Default)]
pub struct Plan {
    pub mixin_files: usize,
    pub declarations: Vec<MixinDeclaration>,
    pub interfaces: BTreeMap<String, InterfaceDescriptor>,
    pub augmentation: TargetAugmentation,
    pub diagnostics: Vec<Diagnostic>,
}

/// Transform `input` into `output` as configured. `config` is expected to
/// have passed [`StirrinConfig::validate`].
pub fn run(config: &StirrinConfig, input: &Path, output: &Path) -> StirrinResult<RunReport> {
    let start = Instant::now();

    if !is_accepted(config, input)? {
        info!(input = %input.display(), "archive not accepted; copying unchanged");
        copy_archive(input, output)?;
        return Ok(RunReport {
            accepted: false,
            elapsed_ms: start.elapsed().as_millis(),
            ..RunReport::default()
        });
    }

    let roots = SourceRoots::new(config.source_roots.iter().cloned());
    let class_path = ClassPath::new(config.class_path.clone());
    let cache = ResolutionCache::new();
    let resolver = NameResolver::new(&roots, &class_path, &cache);

    let plan = build_plan(config, resolver)?;
    let transform = transform_archive(input, output, &plan.augmentation)?;

    let mut diagnostics = plan.diagnostics;
    diagnostics.extend(transform.diagnostics.iter().cloned());
    let report = RunReport {
        accepted: true,
        mixin_files: plan.mixin_files,
        mixins: plan.declarations.len(),
        targets: plan.augmentation.len(),
        interfaces_extracted: plan.interfaces.len(),
        transform,
        diagnostics,
        elapsed_ms: start.elapsed().as_millis(),
    };
    debug!(
        resolutions = cache.len(),
        elapsed_ms = report.elapsed_ms as u64,
        "run finished"
    );
    Ok(report)
}

/// Whether the input archive's file name matches the accepted pattern.
pub fn is_accepted(config: &StirrinConfig, input: &Path) -> StirrinResult<bool> {
    let Some(regex) = config.accepted_regex()? else {
        return Ok(true);
    };
    let name = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(regex.is_match(&name))
}

/// Discover mixins and extract every interface they implement.
pub fn build_plan(config: &StirrinConfig, resolver: NameResolver<'_>) -> StirrinResult<Plan> {
    let mut plan = Plan::default();
    let files = collect_mixin_files(config, resolver.roots(), &mut plan.diagnostics)?;
    plan.mixin_files = files.len();
    let workers = config.workers;

    // Mixin declarations.
    let parsed = parallel_map(workers, &files, |path| parse_mixin_file(path, resolver));
    for file in collect_results(parsed)? {
        plan.declarations.extend(file.declarations);
        plan.diagnostics.extend(file.diagnostics);
    }

    // Interface method tables, one parse per declaring file.
    let names: BTreeSet<String> = plan
        .declarations
        .iter()
        .flat_map(|d| d.interfaces.iter().cloned())
        .collect();
    let (grouped, missing) = group_by_source(&names, resolver.roots());
    let jobs: Vec<(PathBuf, Vec<String>)> = grouped.into_iter().collect();
    let extracted = parallel_map(workers, &jobs, |(path, names)| {
        extract_from_file(path, names, resolver)
    });
    for file in collect_results(extracted)? {
        for descriptor in file.interfaces {
            plan.interfaces.insert(descriptor.name.clone(), descriptor);
        }
        plan.diagnostics.extend(file.diagnostics);
    }
    for name in &missing {
        let (descriptor, diagnostic) = missing_interface(name);
        plan.interfaces.insert(descriptor.name.clone(), descriptor);
        plan.diagnostics.push(diagnostic);
    }

    plan.augmentation = TargetAugmentation::build(&plan.declarations, &plan.interfaces);
    info!(
        files = plan.mixin_files,
        mixins = plan.declarations.len(),
        interfaces = plan.interfaces.len(),
        targets = plan.augmentation.len(),
        "built augmentation plan"
    );
    Ok(plan)
}

/// Mixin source files from explicit paths, mixin configs and, when enabled,
/// a scan of the source roots. Sorted and deduplicated.
pub fn collect_mixin_files(
    config: &StirrinConfig,
    roots: &SourceRoots,
    diagnostics: &mut Vec<Diagnostic>,
) -> StirrinResult<Vec<PathBuf>> {
    let mut files: BTreeSet<PathBuf> = config.mixin_sources.iter().cloned().collect();
    for mixin_config in &config.mixin_configs {
        for source in mixin_sources(mixin_config, roots, diagnostics)? {
            files.insert(source.path);
        }
    }
    if config.scan_source_roots {
        files.extend(roots.scan_for_marker(SCAN_MARKER));
    }
    debug!(count = files.len(), "collected mixin source files");
    Ok(files.into_iter().collect())
}

/// Map `items` on a pool of `workers` threads, keeping input order. Falls
/// back to the current thread when the pool cannot be built.
fn parallel_map<T, R, F>(workers: usize, items: &[T], f: F) -> Vec<R>
where
    T: Sync,
    R: Send,
    F: Fn(&T) -> R + Sync + Send,
{
    if items.is_empty() {
        return Vec::new();
    }
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers.max(1))
        .build();
    match pool {
        Ok(pool) => pool.install(|| items.par_iter().map(&f).collect()),
        Err(e) => {
            warn!(error = %e, "failed to build worker pool; running sequentially");
            items.iter().map(&f).collect()
        }
    }
}

fn collect_results<T>(results: Vec<StirrinResult<T>>) -> StirrinResult<Vec<T>> {
    let mut values = Vec::with_capacity(results.len());
    let mut errors = Vec::new();
    for result in results {
        match result {
            Ok(value) => values.push(value),
            Err(e) => errors.push(e),
        }
    }
    if errors.is_empty() {
        Ok(values)
    } else {
        Err(StirrinError::aggregate(errors))
    }
}
