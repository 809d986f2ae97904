//! Project-shape helpers shared by checks.
//!
//! Checks compose these in their `is_applicable` and `measure_scope`
//! implementations.

use gatehouse_core::ScopeInfo;
use std::fs;
use std::path::Path;
use walkdir::{DirEntry, WalkDir};

/// Directories never descended into when scanning a project.
pub const ALWAYS_EXCLUDE: &[&str] = &[
    ".git",
    ".hg",
    ".svn",
    ".venv",
    "venv",
    "node_modules",
    "__pycache__",
    "target",
    "dist",
    "build",
    ".tox",
    ".mypy_cache",
    ".pytest_cache",
    ".ruff_cache",
];

/// Check if a file exists relative to project root.
pub fn file_exists(project_root: &Path, file: &str) -> bool {
    project_root.join(file).exists()
}

/// First of `files` that exists, if any.
pub fn any_file_exists(project_root: &Path, files: &[&str]) -> Option<String> {
    files
        .iter()
        .find(|f| project_root.join(f).exists())
        .map(|f| f.to_string())
}

/// Whether any source file with one of `extensions` exists under the root.
pub fn has_files_with_extension(project_root: &Path, extensions: &[&str]) -> bool {
    source_files(project_root, extensions).next().is_some()
}

/// Count files with one of `extensions` and their lines.
pub fn measure_files(project_root: &Path, extensions: &[&str]) -> ScopeInfo {
    source_files(project_root, extensions).fold(ScopeInfo::default(), |mut scope, entry| {
        scope.files += 1;
        if let Ok(content) = fs::read_to_string(entry.path()) {
            scope.lines += content.lines().count() as u64;
        }
        scope
    })
}

/// Whether this looks like a Python project.
pub fn is_python_project(project_root: &Path) -> bool {
    any_file_exists(
        project_root,
        &["pyproject.toml", "setup.py", "setup.cfg", "requirements.txt"],
    )
    .is_some()
        || has_files_with_extension(project_root, &["py"])
}

/// Whether this looks like a JavaScript or TypeScript project.
pub fn is_javascript_project(project_root: &Path) -> bool {
    file_exists(project_root, "package.json") || has_files_with_extension(project_root, &["js", "ts"])
}

/// Whether this looks like a Rust project.
pub fn is_rust_project(project_root: &Path) -> bool {
    file_exists(project_root, "Cargo.toml")
}

// Files under the root with a matching extension, skipping excluded dirs.
fn source_files<'a>(
    project_root: &Path,
    extensions: &'a [&'a str],
) -> impl Iterator<Item = DirEntry> + 'a {
    WalkDir::new(project_root)
        .into_iter()
        .filter_entry(|e| !is_excluded_dir(e))
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter(move |e| {
            e.path()
                .extension()
                .and_then(|x| x.to_str())
                .is_some_and(|x| extensions.contains(&x))
        })
}

fn is_excluded_dir(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .is_some_and(|n| ALWAYS_EXCLUDE.contains(&n))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_file_exists() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("package.json"), "{}").unwrap();

        assert!(file_exists(temp.path(), "package.json"));
        assert!(!file_exists(temp.path(), "Cargo.toml"));
        assert_eq!(
            any_file_exists(temp.path(), &["yarn.lock", "package.json"]),
            Some("package.json".to_string())
        );
        assert!(is_javascript_project(temp.path()));
        assert!(!is_rust_project(temp.path()));
    }

    #[test]
    fn test_nested_extension_detection() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("src/pkg")).unwrap();
        fs::write(temp.path().join("src/pkg/mod.py"), "x = 1\n").unwrap();

        assert!(has_files_with_extension(temp.path(), &["py"]));
        assert!(is_python_project(temp.path()));
        assert!(!has_files_with_extension(temp.path(), &["rs"]));
    }

    #[test]
    fn test_excluded_dirs_are_ignored() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("node_modules/lib")).unwrap();
        fs::write(temp.path().join("node_modules/lib/index.js"), "").unwrap();

        assert!(!has_files_with_extension(temp.path(), &["js"]));

        fs::create_dir_all(temp.path().join("src/target")).unwrap();
        fs::write(temp.path().join("src/target/gen.js"), "a\n").unwrap();
        fs::write(temp.path().join("src/app.js"), "a\nb\n").unwrap();
        assert_eq!(measure_files(temp.path(), &["js"]), ScopeInfo::new(1, 2));
    }

    #[test]
    fn test_excluded_name_at_root_is_still_scanned() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("build");
        fs::create_dir_all(&root).unwrap();
        fs::write(root.join("main.py"), "x = 1\n").unwrap();

        assert!(has_files_with_extension(&root, &["py"]));
    }

    #[test]
    fn test_measure_files() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("a.py"), "a\nb\nc\n").unwrap();
        fs::write(temp.path().join("b.py"), "d\n").unwrap();
        fs::write(temp.path().join("notes.txt"), "ignored\n").unwrap();

        assert_eq!(measure_files(temp.path(), &["py"]), ScopeInfo::new(2, 4));
    }
}
