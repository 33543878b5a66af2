//! Read schema files from disk, following imports.

use crate::ast::{Location, ProtoFile};
use crate::config::CompileConfig;
use crate::diagnostic::{Diagnostic, DiagnosticKind, LinkError};
use crate::parser;
use crate::well_known;
use std::collections::{HashSet, VecDeque};
use std::path::PathBuf;
use tracing::{debug, warn};

/// Load `roots` and everything they import, transitively.
///
/// Paths are relative to the configured source roots, searched in order.
/// Built-in paths are left to the linker. Every reachable file is attempted
/// before failing: a missing file or a syntax error in one file does not stop
/// the others from being read.
pub fn load(config: &CompileConfig, roots: &[&str]) -> Result<Vec<ProtoFile>, LinkError> {
    let mut files = Vec::new();
    let mut diagnostics = Vec::new();
    let mut seen = HashSet::new();
    let mut queue: VecDeque<(String, Option<Location>)> = roots.iter().map(|r| (r.to_string(), None)).collect();

    while let Some((path, imported_by)) = queue.pop_front() {
        if !seen.insert(path.clone()) || well_known::is_builtin(&path) {
            continue;
        }
        let Some(full) = find(config, &path) else {
            let (location, message) = match &imported_by {
                Some(import_at) => (
                    import_at.clone(),
                    format!("import \"{}\" not found in any source root", path),
                ),
                None => (Location::new(path.as_str(), 0, 0), format!("{} not found in any source root", path)),
            };
            diagnostics.push(Diagnostic::new(DiagnosticKind::Linkage, location, message));
            continue;
        };
        let source = match std::fs::read_to_string(&full) {
            Ok(s) => s,
            Err(e) => {
                diagnostics.push(Diagnostic::new(
                    DiagnosticKind::Linkage,
                    Location::new(path.as_str(), 0, 0),
                    format!("cannot read {}: {}", full.display(), e),
                ));
                continue;
            }
        };
        match parser::parse(&path, &source) {
            Ok(file) => {
                debug!(path = %path, from = %full.display(), imports = file.imports.len() + file.public_imports.len(), "loaded");
                for import in file.all_imports() {
                    queue.push_back((import.to_string(), Some(file.import_location(import))));
                }
                files.push(file);
            }
            Err(e) => diagnostics.push(e.into()),
        }
    }

    if diagnostics.is_empty() {
        Ok(files)
    } else {
        for d in &diagnostics {
            warn!("{}", d);
        }
        Err(LinkError { diagnostics })
    }
}

fn find(config: &CompileConfig, path: &str) -> Option<PathBuf> {
    config.source_roots.iter().map(|root| root.join(path)).find(|p| p.is_file())
}
