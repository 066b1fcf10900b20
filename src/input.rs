//! Input file descriptors and previous-stage result decoding.

use serde::{Deserialize, Serialize};

use crate::task::TaskResult;

/// One input file as supplied by the framework or a previous task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputFile {
    pub path: String,
    pub display_name: String,
}

impl InputFile {
    pub fn new(path: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            display_name: display_name.into(),
        }
    }
}

/// Resolve the effective input list for this invocation.
///
/// A previous-stage result takes precedence: its output files become this
/// task's inputs. The explicit list is only used when no pipe result exists.
pub fn resolve_input_files(
    pipe_result: Option<&str>,
    explicit: Vec<InputFile>,
) -> Result<Vec<InputFile>, serde_json::Error> {
    match pipe_result {
        Some(encoded) => {
            let prior: TaskResult = serde_json::from_str(encoded)?;
            Ok(prior
                .output_files
                .into_iter()
                .map(|f| InputFile::new(f.path, f.display_name))
                .collect())
        }
        None => Ok(explicit),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_list_used_without_pipe_result() {
        let inputs = vec![InputFile::new("/data/a.txt", "a.txt")];
        let resolved = resolve_input_files(None, inputs).expect("resolve");
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].display_name, "a.txt");
    }

    #[test]
    fn pipe_result_takes_precedence() {
        let encoded = r#"{
            "output_files": [
                {"path": "/out/prev.grep", "display_name": "prev.grep"}
            ],
            "workflow_id": "wf-1",
            "command": "grep -E -i -a foo",
            "meta": {}
        }"#;
        let explicit = vec![InputFile::new("/data/ignored.txt", "ignored.txt")];
        let resolved = resolve_input_files(Some(encoded), explicit).expect("resolve");
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].path, "/out/prev.grep");
    }

    #[test]
    fn malformed_pipe_result_is_an_error() {
        assert!(resolve_input_files(Some("not json"), Vec::new()).is_err());
    }
}
