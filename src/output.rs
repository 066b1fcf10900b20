//! Output file allocation.
//!
//! One output file is created per input file; the child process writes into
//! it via redirected stdout and its descriptor is handed to the result
//! aggregator once the search finishes.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Serialized descriptor of a finished output file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputFileRecord {
    pub path: String,
    pub display_name: String,
}

/// A writable output file owned by the current processing iteration.
#[derive(Debug)]
pub struct OutputFile {
    pub path: PathBuf,
    pub display_name: String,
}

impl OutputFile {
    pub fn into_record(self) -> OutputFileRecord {
        OutputFileRecord {
            path: self.path.to_string_lossy().into_owned(),
            display_name: self.display_name,
        }
    }
}

/// Allocate an output file under `output_dir` for the given display name.
///
/// The on-disk name is unique per allocation so repeated runs over the same
/// output directory never clobber earlier results; the display name is what
/// the framework shows the user.
pub fn create_output_file(output_dir: &Path, display_name: &str) -> std::io::Result<OutputFile> {
    std::fs::create_dir_all(output_dir)?;
    let filename = format!("{}_{}", generate_file_id(), sanitize(display_name));
    let path = output_dir.join(filename);
    // Reserve the name now; the supervisor reopens it in truncate mode.
    std::fs::File::create(&path)?;
    Ok(OutputFile {
        path,
        display_name: display_name.to_string(),
    })
}

fn generate_file_id() -> String {
    let now = chrono::Utc::now();
    format!("{}_{}", now.format("%Y%m%dT%H%M%SZ"), rand_suffix())
}

fn rand_suffix() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    format!("{:08x}", nanos)
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect()
}
