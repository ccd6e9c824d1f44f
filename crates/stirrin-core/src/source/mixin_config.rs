//! Mixin configuration files (`modid.mixins.json`) as a source of mixin
//! source files.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::errors::{StirrinError, StirrinResult};
use crate::models::{Diagnostic, DiagnosticKind};
use crate::source::filesystem::SourceRoots;

/// The parts of a mixin configuration that name mixin classes. Every other
/// key is ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MixinConfig {
    pub package: String,
    #[serde(default)]
    pub mixins: Vec<String>,
    #[serde(default)]
    pub client: Option<Vec<String>>,
    #[serde(default)]
    pub server: Option<Vec<String>>,
}

impl MixinConfig {
    pub fn load(path: &Path) -> StirrinResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            StirrinError::Config(format!("could not read mixin config {}: {e}", path.display()))
        })?;
        serde_json::from_str(&text).map_err(|e| {
            StirrinError::Config(format!("could not parse mixin config {}: {e}", path.display()))
        })
    }

    /// Fully qualified names of every listed mixin, common then client then
    /// server.
    pub fn class_names(&self) -> Vec<String> {
        let client = self.client.iter().flatten();
        let server = self.server.iter().flatten();
        self.mixins
            .iter()
            .chain(client)
            .chain(server)
            .map(|name| {
                if self.package.is_empty() {
                    name.clone()
                } else {
                    format!("{}.{name}", self.package)
                }
            })
            .collect()
    }
}

/// A mixin source file and the class it is expected to declare.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct MixinSource {
    pub path: PathBuf,
    pub class_name: String,
}

/// Mixin sources listed by the configuration at `path`. Classes whose
/// source file cannot be found are reported and skipped.
pub fn mixin_sources(
    path: &Path,
    roots: &SourceRoots,
    diagnostics: &mut Vec<Diagnostic>,
) -> StirrinResult<Vec<MixinSource>> {
    let config = MixinConfig::load(path)?;
    let mut sources = Vec::new();
    for class_name in config.class_names() {
        match roots.locate_type(&class_name) {
            Some(source) => sources.push(MixinSource {
                path: source,
                class_name,
            }),
            None => {
                diagnostics.push(Diagnostic::warn(
                    DiagnosticKind::MissingMixinSource,
                    class_name,
                    format!("listed in {} but no source file was found", path.display()),
                ));
            }
        }
    }
    debug!(config = %path.display(), count = sources.len(), "loaded mixin config");
    Ok(sources)
}
