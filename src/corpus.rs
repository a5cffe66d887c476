//! Filesystem corpus loader.
//!
//! Walks the configured corpus root, filters files through
//! include/exclude globsets, and produces one [`Document`] per readable
//! UTF-8 file. Documents are sorted by relative path so the build ordinal
//! order (and with it every ranking tie-break) is reproducible run to run.

use anyhow::{bail, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use tracing::warn;
use uuid::Uuid;
use walkdir::WalkDir;

use askdocs_core::models::Document;

use crate::config::Config;

pub fn load_corpus(config: &Config) -> Result<Vec<Document>> {
    let root = &config.corpus.root;
    if !root.exists() {
        bail!("Corpus root does not exist: {}", root.display());
    }

    let include_set = build_globset(&config.corpus.include_globs)?;

    let mut default_excludes = vec![
        "**/.git/**".to_string(),
        "**/target/**".to_string(),
        "**/node_modules/**".to_string(),
    ];
    default_excludes.extend(config.corpus.exclude_globs.clone());
    let exclude_set = build_globset(&default_excludes)?;

    let mut documents = Vec::new();

    for entry in WalkDir::new(root) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = relative.to_string_lossy().to_string();

        if exclude_set.is_match(&rel_str) {
            continue;
        }
        if !include_set.is_match(&rel_str) {
            continue;
        }

        let raw_text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping unreadable file");
                continue;
            }
        };

        documents.push(Document {
            id: Uuid::new_v4().to_string(),
            source_path: rel_str,
            raw_text,
        });
    }

    // Path order fixes the document order the build ordinal depends on.
    documents.sort_by(|a, b| a.source_path.cmp(&b.source_path));

    Ok(documents)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, CorpusConfig};
    use std::fs;
    use tempfile::TempDir;

    fn config_for(root: &std::path::Path) -> Config {
        Config {
            corpus: CorpusConfig {
                root: root.to_path_buf(),
                include_globs: vec!["**/*.md".to_string(), "**/*.txt".to_string()],
                exclude_globs: vec!["**/drafts/**".to_string()],
            },
            chunking: Default::default(),
            retrieval: Default::default(),
            embedding: Default::default(),
            completion: Default::default(),
        }
    }

    #[test]
    fn test_loads_matching_files_in_path_order() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("b.txt"), "beta").unwrap();
        fs::write(tmp.path().join("a.md"), "alpha").unwrap();
        fs::write(tmp.path().join("ignored.rs"), "fn main() {}").unwrap();

        let documents = load_corpus(&config_for(tmp.path())).unwrap();
        let paths: Vec<&str> = documents.iter().map(|d| d.source_path.as_str()).collect();
        assert_eq!(paths, vec!["a.md", "b.txt"]);
        assert_eq!(documents[0].raw_text, "alpha");
    }

    #[test]
    fn test_exclude_globs_apply() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("drafts")).unwrap();
        fs::write(tmp.path().join("drafts/wip.md"), "draft").unwrap();
        fs::write(tmp.path().join("final.md"), "done").unwrap();

        let documents = load_corpus(&config_for(tmp.path())).unwrap();
        assert_eq!(documents.len(), 1);
        assert_eq!(documents[0].source_path, "final.md");
    }

    #[test]
    fn test_missing_root_fails() {
        let tmp = TempDir::new().unwrap();
        let missing = tmp.path().join("nope");
        let err = load_corpus(&config_for(&missing)).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }
}
