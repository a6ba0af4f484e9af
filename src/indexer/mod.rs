//! File-context indexer: bounded, governed discovery of working-directory
//! files, used to resolve `@path` references in prompts and drive tab
//! completion. Built once per session and treated as read-only afterward.

pub mod expand;

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::process::Command;
use walkdir::WalkDir;

const MAX_FILE_SIZE: u64 = 1024 * 1024;
const MAX_FILES: usize = 5_000;
const MAX_DEPTH: usize = 4;
const GIT_TIMEOUT: Duration = Duration::from_secs(10);
const TOTAL_DEADLINE: Duration = Duration::from_secs(10);

/// Extensions treated as likely-text. Not exhaustive, but broad enough to
/// cover the languages and config formats a coding agent commonly touches.
const TEXT_EXTENSIONS: &[&str] = &[
    "rs", "toml", "md", "txt", "json", "jsonc", "yaml", "yml", "js", "jsx", "ts", "tsx", "mjs",
    "cjs", "py", "pyi", "rb", "go", "java", "kt", "kts", "scala", "c", "h", "cc", "cpp", "cxx",
    "hpp", "hh", "cs", "swift", "m", "mm", "php", "pl", "pm", "lua", "sh", "bash", "zsh", "fish",
    "ps1", "psm1", "sql", "html", "htm", "css", "scss", "sass", "less", "xml", "svg", "vue",
    "svelte", "astro", "proto", "graphql", "gql", "ini", "cfg", "conf", "env", "gitignore",
    "dockerignore", "editorconfig", "lock", "csv", "tsv", "rst", "adoc", "tex", "bib", "gradle",
    "cmake", "make", "mk", "r", "jl", "ex", "exs", "erl", "hrl", "clj", "cljs", "cljc", "elm",
    "ml", "mli", "fs", "fsi", "fsx", "nim", "zig", "d", "dart", "vim", "el", "asm", "s", "bat",
    "cmd", "groovy", "gradle.kts", "properties", "diff", "patch", "rego", "hcl", "tf", "tfvars",
    "feature", "cabal", "hs", "lhs", "purs", "re", "rei", "sol", "wat", "wasm.txt", "avsc",
    "thrift", "tpl", "mustache", "hbs", "handlebars", "njk", "liquid", "pug", "jade", "coffee",
    "ron", "toml.dist", "env.example", "http", "rest", "prisma", "proto3", "td",
];

/// Extensionless filenames treated as likely-text by basename.
const TEXT_BASENAMES: &[&str] = &[
    "Makefile",
    "Dockerfile",
    "Containerfile",
    "LICENSE",
    "LICENSE-MIT",
    "LICENSE-APACHE",
    "README",
    "CHANGELOG",
    "CONTRIBUTING",
    "AUTHORS",
    "NOTICE",
    "Gemfile",
    "Rakefile",
    "Procfile",
    "Vagrantfile",
    "Pipfile",
    "Brewfile",
    "Justfile",
    ".gitignore",
    ".gitattributes",
    ".editorconfig",
    ".env",
    ".npmrc",
    ".nvmrc",
    ".dockerignore",
];

/// Directories skipped outright in walk mode, regardless of ignore rules.
const SKIP_DIRS: &[&str] = &[
    "node_modules",
    ".git",
    "dist",
    "build",
    "target",
    "venv",
    ".venv",
    "__pycache__",
    ".mypy_cache",
    ".pytest_cache",
    ".tox",
    "vendor",
    ".cargo",
    ".next",
    ".nuxt",
    "coverage",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscoveryMethod {
    Git,
    Walk,
}

/// A working-directory-relative path plus its byte size.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexedFile {
    pub path: String,
    pub size: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexCounters {
    pub skipped_binary: u64,
    pub skipped_large: u64,
    pub skipped_ignored: u64,
}

#[derive(Debug, Clone)]
pub struct FileIndex {
    pub files: Vec<IndexedFile>,
    pub method: DiscoveryMethod,
    pub timed_out: bool,
    pub counters: IndexCounters,
    root: PathBuf,
}

struct IgnoreRules {
    exact: HashSet<String>,
    dir_prefixes: Vec<String>,
    suffixes: Vec<String>,
    basenames: HashSet<String>,
}

impl IgnoreRules {
    fn load(root: &Path) -> Self {
        let mut rules = Self {
            exact: HashSet::new(),
            dir_prefixes: Vec::new(),
            suffixes: Vec::new(),
            basenames: HashSet::new(),
        };

        let Ok(content) = std::fs::read_to_string(root.join(".caretforgeignore")) else {
            return rules;
        };

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some(dir) = line.strip_suffix('/') {
                rules.dir_prefixes.push(dir.to_string());
            } else if let Some(ext) = line.strip_prefix("*.") {
                rules.suffixes.push(ext.to_string());
            } else if line.contains('/') {
                rules.exact.insert(line.to_string());
            } else {
                rules.basenames.insert(line.to_string());
            }
        }

        rules
    }

    fn matches(&self, relative: &str, basename: &str) -> bool {
        if self.exact.contains(relative) || self.basenames.contains(basename) {
            return true;
        }
        if self
            .dir_prefixes
            .iter()
            .any(|p| relative.starts_with(&format!("{p}/")))
        {
            return true;
        }
        if let Some(ext) = basename.rsplit('.').next() {
            if self.suffixes.iter().any(|s| s == ext) {
                return true;
            }
        }
        false
    }
}

pub(crate) fn is_text_like(path: &Path) -> bool {
    if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
        if TEXT_BASENAMES.contains(&name) {
            return true;
        }
    }
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| TEXT_EXTENSIONS.contains(&ext))
}

impl FileIndex {
    /// Build the index for `root`. Tries `git ls-files` first; falls back
    /// to a depth-bounded directory walk on failure or a non-git root.
    pub async fn build(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let rules = IgnoreRules::load(&root);

        if let Some((paths, timed_out)) = Self::try_git_ls_files(&root).await {
            let (files, counters) = Self::filter_candidates(&root, paths, &rules, false);
            return Self {
                files,
                method: DiscoveryMethod::Git,
                timed_out,
                counters,
                root,
            };
        }

        let (paths, timed_out) = Self::walk(&root);
        let (files, counters) = Self::filter_candidates(&root, paths, &rules, true);
        Self {
            files,
            method: DiscoveryMethod::Walk,
            timed_out,
            counters,
            root,
        }
    }

    async fn try_git_ls_files(root: &Path) -> Option<(Vec<PathBuf>, bool)> {
        let output = tokio::time::timeout(
            GIT_TIMEOUT,
            Command::new("git")
                .args(["ls-files", "--cached", "--others", "--exclude-standard"])
                .current_dir(root)
                .output(),
        )
        .await;

        match output {
            Ok(Ok(out)) if out.status.success() => {
                let paths = String::from_utf8_lossy(&out.stdout)
                    .lines()
                    .map(|l| root.join(l))
                    .collect();
                Some((paths, false))
            }
            Ok(Ok(_)) => None,
            Ok(Err(_)) => None,
            Err(_) => Some((Vec::new(), true)),
        }
    }

    fn walk(root: &Path) -> (Vec<PathBuf>, bool) {
        let deadline = Instant::now() + TOTAL_DEADLINE;
        let mut visited_real_paths: HashSet<PathBuf> = HashSet::new();
        let mut paths = Vec::new();
        let mut timed_out = false;

        let walker = WalkDir::new(root)
            .max_depth(MAX_DEPTH)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| {
                if e.file_type().is_dir() {
                    let name = e.file_name().to_string_lossy();
                    if name.starts_with('.') && e.depth() > 0 {
                        return false;
                    }
                    return !SKIP_DIRS.contains(&name.as_ref());
                }
                true
            });

        for entry in walker {
            if Instant::now() > deadline {
                timed_out = true;
                break;
            }
            if paths.len() >= MAX_FILES {
                break;
            }
            let Ok(entry) = entry else { continue };
            if !entry.file_type().is_file() && !entry.file_type().is_symlink() {
                continue;
            }

            let path = entry.path().to_path_buf();
            if entry.file_type().is_symlink() {
                match std::fs::canonicalize(&path) {
                    Ok(real) => {
                        if !visited_real_paths.insert(real) {
                            continue;
                        }
                    }
                    Err(_) => continue,
                }
            }

            paths.push(path);
        }

        (paths, timed_out)
    }

    fn filter_candidates(
        root: &Path,
        candidates: Vec<PathBuf>,
        rules: &IgnoreRules,
        apply_build_dir_skip: bool,
    ) -> (Vec<IndexedFile>, IndexCounters) {
        let mut files = Vec::new();
        let mut counters = IndexCounters::default();

        for path in candidates {
            if files.len() >= MAX_FILES {
                break;
            }

            let relative = path
                .strip_prefix(root)
                .unwrap_or(&path)
                .to_string_lossy()
                .replace('\\', "/");
            let basename = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();

            if apply_build_dir_skip
                && SKIP_DIRS.iter().any(|d| relative.starts_with(&format!("{d}/")))
            {
                continue;
            }

            if rules.matches(&relative, &basename) {
                counters.skipped_ignored += 1;
                continue;
            }

            let Ok(metadata) = std::fs::metadata(&path) else {
                continue;
            };
            if !metadata.is_file() {
                continue;
            }
            if metadata.len() > MAX_FILE_SIZE {
                counters.skipped_large += 1;
                continue;
            }
            if !is_text_like(&path) {
                counters.skipped_binary += 1;
                continue;
            }

            files.push(IndexedFile {
                path: relative,
                size: metadata.len(),
            });
        }

        (files, counters)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn find(&self, relative_path: &str) -> Option<&IndexedFile> {
        self.files.iter().find(|f| f.path == relative_path)
    }

    /// Paths in the index starting with `prefix`, for `@`-tab-completion.
    pub fn complete(&self, prefix: &str) -> Vec<&str> {
        self.files
            .iter()
            .filter(|f| f.path.starts_with(prefix))
            .map(|f| f.path.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ignore_rules_match_exact_prefix_and_suffix_forms() {
        let root = tempfile::tempdir().unwrap();
        std::fs::write(
            root.path().join(".caretforgeignore"),
            "secrets.txt\nbuild/\n*.log\n",
        )
        .unwrap();

        let rules = IgnoreRules::load(root.path());
        assert!(rules.matches("secrets.txt", "secrets.txt"));
        assert!(rules.matches("build/output.rs", "output.rs"));
        assert!(rules.matches("nested/debug.log", "debug.log"));
        assert!(!rules.matches("src/lib.rs", "lib.rs"));
    }

    #[test]
    fn text_like_recognizes_extension_and_basename() {
        assert!(is_text_like(Path::new("src/main.rs")));
        assert!(is_text_like(Path::new("Dockerfile")));
        assert!(!is_text_like(Path::new("logo.png")));
    }

    #[tokio::test]
    async fn build_discovers_files_via_walk_in_non_git_dir() {
        let root = tempfile::tempdir().unwrap();
        std::fs::write(root.path().join("a.rs"), "fn main() {}").unwrap();
        std::fs::write(root.path().join("image.png"), [0u8, 1, 2]).unwrap();
        std::fs::create_dir(root.path().join("node_modules")).unwrap();
        std::fs::write(root.path().join("node_modules/dep.js"), "x").unwrap();

        let index = FileIndex::build(root.path().to_path_buf()).await;
        assert!(index.files.iter().any(|f| f.path == "a.rs"));
        assert!(!index.files.iter().any(|f| f.path.starts_with("node_modules")));
    }
}
