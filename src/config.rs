//! Compile and codec settings, passed explicitly to the loader, linker and registry.

use std::path::PathBuf;

/// Settings for loading and linking schema files.
#[derive(Debug, Clone)]
pub struct CompileConfig {
    /// Directories searched, in order, for imported paths.
    pub source_roots: Vec<PathBuf>,

    /// When set, an option name that resolves to nothing is skipped with a warning
    /// instead of failing the link.
    pub allow_unknown_options: bool,
}

impl Default for CompileConfig {
    fn default() -> Self {
        Self {
            source_roots: Vec::new(),
            allow_unknown_options: false,
        }
    }
}

impl CompileConfig {
    pub fn with_source_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.source_roots.push(root.into());
        self
    }
}

/// Settings for the adapter registry.
#[derive(Debug, Clone, Copy)]
pub struct CodecConfig {
    /// Deepest message nesting accepted on decode.
    pub recursion_limit: usize,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self { recursion_limit: 100 }
    }
}
