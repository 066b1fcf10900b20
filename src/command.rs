//! Search command construction.
//!
//! Builds the argv for the external search tool. The space-joined base form
//! is recorded in the task result for audit only and must never be re-parsed
//! as shell input.

use std::path::{Path, PathBuf};

/// Default search program. Extended regex, case-insensitive, binary-safe.
pub const SEARCH_PROGRAM: &str = "grep";
const BASE_FLAGS: [&str; 3] = ["-E", "-i", "-a"];

#[derive(Debug, Clone)]
pub struct CommandSpec {
    program: String,
    regex: String,
}

impl CommandSpec {
    pub fn new(regex: impl Into<String>) -> Self {
        Self {
            program: SEARCH_PROGRAM.to_string(),
            regex: regex.into(),
        }
    }

    /// Override the search program. Test seam; production always uses grep.
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    fn base_argv(&self) -> Vec<String> {
        let mut argv = Vec::with_capacity(BASE_FLAGS.len() + 2);
        argv.push(self.program.clone());
        argv.extend(BASE_FLAGS.iter().map(|f| f.to_string()));
        argv.push(self.regex.clone());
        argv
    }

    /// Argv for searching one plain input file.
    pub fn argv_for_file(&self, path: &Path) -> Vec<String> {
        let mut argv = self.base_argv();
        argv.push(path.to_string_lossy().into_owned());
        argv
    }

    /// Argv for searching mounted partition roots recursively. Each root is
    /// appended with a trailing separator so the search descends into the
    /// mountpoint rather than matching the directory entry itself.
    pub fn argv_for_mountpoints(&self, roots: &[PathBuf]) -> Vec<String> {
        let mut argv = self.base_argv();
        argv.push("-r".to_string());
        for root in roots {
            argv.push(format!("{}/", root.to_string_lossy().trim_end_matches('/')));
        }
        argv
    }

    /// Space-joined base command recorded in the task result. Independent of
    /// which and how many input files were processed.
    pub fn audit_string(&self) -> String {
        self.base_argv().join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audit_string_contains_regex_verbatim() {
        let spec = CommandSpec::new("[a-f][0-9]+");
        assert_eq!(spec.audit_string(), "grep -E -i -a [a-f][0-9]+");
    }

    #[test]
    fn file_argv_ends_with_path() {
        let spec = CommandSpec::new("foo");
        let argv = spec.argv_for_file(Path::new("/data/evidence.txt"));
        assert_eq!(argv[0], "grep");
        assert_eq!(argv.last().map(String::as_str), Some("/data/evidence.txt"));
        assert!(!argv.contains(&"-r".to_string()));
    }

    #[test]
    fn mountpoint_argv_is_recursive_with_trailing_separators() {
        let spec = CommandSpec::new("foo");
        let roots = vec![PathBuf::from("/mnt/p1"), PathBuf::from("/mnt/p2/")];
        let argv = spec.argv_for_mountpoints(&roots);
        assert!(argv.contains(&"-r".to_string()));
        assert_eq!(argv[argv.len() - 2], "/mnt/p1/");
        assert_eq!(argv[argv.len() - 1], "/mnt/p2/");
    }

    #[test]
    fn program_override_flows_into_argv() {
        let spec = CommandSpec::new("foo").with_program("/bin/false");
        assert!(spec.audit_string().starts_with("/bin/false"));
    }
}
