//! Run configuration: a JSON file, environment overrides and command-line
//! values layered on top of each other.

use std::path::{Path, PathBuf};

use regex::Regex;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::errors::{StirrinError, StirrinResult};

pub const DEFAULT_WORKERS: usize = 4;
pub const OUTPUT_SUFFIX: &str = "-mixinInterfaces";

const WORKERS_ENV: &str = "STIRRIN_WORKERS";
const SCAN_ENV: &str = "STIRRIN_SCAN_SOURCES";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StirrinConfig {
    /// Pattern the input archive's whole file name must match; archives that
    /// do not match are copied unchanged.
    pub accepted_archives: Option<String>,
    pub source_roots: Vec<PathBuf>,
    pub mixin_configs: Vec<PathBuf>,
    pub mixin_sources: Vec<PathBuf>,
    /// Treat every source file mentioning the mixin annotation as a
    /// candidate.
    pub scan_source_roots: bool,
    /// Directories and archives probed for default-package classes.
    pub class_path: Vec<PathBuf>,
    pub workers: usize,
}

impl Default for StirrinConfig {
    fn default() -> Self {
        Self {
            accepted_archives: None,
            source_roots: Vec::new(),
            mixin_configs: Vec::new(),
            mixin_sources: Vec::new(),
            scan_source_roots: false,
            class_path: Vec::new(),
            workers: DEFAULT_WORKERS,
        }
    }
}

impl StirrinConfig {
    /// Load a configuration file. Relative paths inside it are taken
    /// relative to the file's directory.
    pub fn load(path: &Path) -> StirrinResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| StirrinError::io(path, e))?;
        let mut config: StirrinConfig = serde_json::from_str(&text)?;
        if let Some(base) = path.parent() {
            config.rebase(base);
        }
        debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    fn rebase(&mut self, base: &Path) {
        let fix = |paths: &mut Vec<PathBuf>| {
            for p in paths.iter_mut() {
                if p.is_relative() {
                    *p = base.join(&*p);
                }
            }
        };
        fix(&mut self.source_roots);
        fix(&mut self.mixin_configs);
        fix(&mut self.mixin_sources);
        fix(&mut self.class_path);
    }

    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(val) = lookup(WORKERS_ENV) {
            match val.trim().parse::<usize>() {
                Ok(workers) => self.workers = workers,
                Err(_) => warn!(var = WORKERS_ENV, value = %val, "ignoring invalid worker count"),
            }
        }
        if let Some(val) = lookup(SCAN_ENV) {
            let v = val.trim().to_lowercase();
            self.scan_source_roots = !matches!(v.as_str(), "0" | "false" | "no" | "off");
        }
    }

    /// Check the configuration and clamp the worker count.
    pub fn validate(&mut self) -> StirrinResult<()> {
        self.accepted_regex()?;
        if self.source_roots.is_empty() {
            return Err(StirrinError::Config(
                "at least one source root is required".to_string(),
            ));
        }
        self.workers = self.workers.max(1);
        Ok(())
    }

    pub fn accepted_regex(&self) -> StirrinResult<Option<Regex>> {
        match &self.accepted_archives {
            Some(pattern) => Regex::new(&format!("^(?:{pattern})$")).map(Some).map_err(|e| {
                StirrinError::Config(format!("invalid accepted-archives pattern `{pattern}`: {e}"))
            }),
            None => Ok(None),
        }
    }
}

/// `<dir>/<stem>-mixinInterfaces.jar` beside `input`.
pub fn default_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    input.with_file_name(format!("{stem}{OUTPUT_SUFFIX}.jar"))
}
