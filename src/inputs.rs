//! Expansion of command-line path arguments into PDF files.

use std::path::{Path, PathBuf};

use tracing::warn;
use walkdir::WalkDir;

/// Expand files and directories into an ordered list of inputs.
///
/// Files are kept as given, whatever their extension, so a bad argument is
/// reported by extraction rather than silently dropped. Directories are
/// walked recursively for `*.pdf` files (case-insensitive), sorted by path.
/// Duplicates are removed, keeping the first occurrence.
pub fn collect_pdfs(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut out: Vec<PathBuf> = Vec::new();

    for path in paths {
        if path.is_dir() {
            let mut found: Vec<PathBuf> = WalkDir::new(path)
                .follow_links(true)
                .into_iter()
                .filter_map(|entry| match entry {
                    Ok(entry) => Some(entry),
                    Err(e) => {
                        warn!("Skipping unreadable entry under {}: {}", path.display(), e);
                        None
                    }
                })
                .filter(|entry| entry.file_type().is_file() && is_pdf(entry.path()))
                .map(|entry| entry.into_path())
                .collect();
            found.sort();
            if found.is_empty() {
                warn!("No PDF files found under {}", path.display());
            }
            out.extend(found);
        } else {
            out.push(path.clone());
        }
    }

    let mut seen = std::collections::HashSet::new();
    out.retain(|p| seen.insert(p.clone()));
    out
}

fn is_pdf(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false)
}
