//! Task entry point: per-file processing loop, error boundary and result
//! aggregation.
//!
//! Each input file is processed independently and strictly in order. A
//! failure while mounting or searching one file is logged and that file is
//! skipped; sibling files still run. Every device mounted along the way is
//! released before the task returns, on every exit path.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, info_span, warn};

use crate::command::CommandSpec;
use crate::config::{ConfigError, TaskConfig};
use crate::input::{InputFile, resolve_input_files};
use crate::mount::{DiskImageMounter, MountError, MountSet, MIN_PARTITION_BYTES};
use crate::output::{OutputFileRecord, create_output_file};
use crate::progress::{Clock, ProgressReporter};
use crate::supervisor::{SupervisorError, SupervisorOptions, supervise};
use crate::util::ensure_output_dir;

/// Suffix appended to each input's display name for its output file.
pub const OUTPUT_SUFFIX: &str = ".grep";

#[derive(Debug, Error)]
pub enum TaskError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("invalid previous-stage result: {0}")]
    PipeResult(#[from] serde_json::Error),
    #[error("output directory unusable: {0}")]
    OutputDir(String),
    #[error("grep task yielded no results")]
    NoResults,
    #[error("task cancelled")]
    Cancelled,
}

/// Everything the framework hands a task invocation.
#[derive(Debug)]
pub struct TaskRequest {
    /// Encoded result of the previous stage, if this task is piped.
    pub pipe_result: Option<String>,
    /// Explicit input list, used only without a pipe result.
    pub input_files: Vec<InputFile>,
    pub output_path: PathBuf,
    pub workflow_id: String,
    pub config: TaskConfig,
}

/// Collaborators injected into [`run_task`]. Production wiring lives in the
/// binary; tests substitute mock mounters, fake clocks and collecting
/// reporters.
pub struct TaskDeps<'a> {
    pub mounter: &'a dyn DiskImageMounter,
    pub reporter: &'a dyn ProgressReporter,
    pub cancel: &'a AtomicBool,
    pub clock: &'a dyn Clock,
    pub options: SupervisorOptions,
    /// Test seam; production leaves this `None` and searches with grep.
    pub program_override: Option<String>,
}

/// Final task result handed back to the framework. Immutable once built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult {
    pub output_files: Vec<OutputFileRecord>,
    pub workflow_id: String,
    pub command: String,
    pub meta: BTreeMap<String, String>,
}

/// Encode a task result for the framework boundary.
pub fn encode_result(result: &TaskResult) -> Result<String, serde_json::Error> {
    serde_json::to_string(result)
}

/// Decode a task result received from the framework boundary.
pub fn decode_result(encoded: &str) -> Result<TaskResult, serde_json::Error> {
    serde_json::from_str(encoded)
}

/// Run the grep task over all resolved input files.
///
/// Policy: an invocation that produces zero output files is a hard failure
/// ([`TaskError::NoResults`]), matching the upstream worker behavior.
pub fn run_task(request: TaskRequest, deps: &TaskDeps<'_>) -> Result<TaskResult, TaskError> {
    let span = info_span!("grep_task", workflow_id = %request.workflow_id);
    let _guard = span.enter();

    request.config.validate()?;
    ensure_output_dir(&request.output_path)
        .map_err(|err| TaskError::OutputDir(err.to_string()))?;

    let input_files = resolve_input_files(request.pipe_result.as_deref(), request.input_files.clone())?;
    info!(inputs = input_files.len(), "starting grep task");

    let mut spec = CommandSpec::new(&request.config.regex);
    if let Some(program) = &deps.program_override {
        spec = spec.with_program(program);
    }
    let command_string = spec.audit_string();

    let mut mounts = MountSet::new();
    let outcome = process_all(&request, deps, &spec, &input_files, &mut mounts);
    // Guaranteed release before the task returns, success or not.
    mounts.release_all();
    let output_files = outcome?;

    if output_files.is_empty() {
        return Err(TaskError::NoResults);
    }

    let mut meta = BTreeMap::new();
    meta.insert(
        "tool_version".to_string(),
        env!("CARGO_PKG_VERSION").to_string(),
    );
    meta.insert("config_hash".to_string(), request.config.config_hash());
    meta.insert(
        "finished_at".to_string(),
        chrono::Utc::now().to_rfc3339(),
    );

    info!(outputs = output_files.len(), "grep task finished");
    Ok(TaskResult {
        output_files,
        workflow_id: request.workflow_id,
        command: command_string,
        meta,
    })
}

fn process_all(
    request: &TaskRequest,
    deps: &TaskDeps<'_>,
    spec: &CommandSpec,
    input_files: &[InputFile],
    mounts: &mut MountSet,
) -> Result<Vec<OutputFileRecord>, TaskError> {
    let mut output_files = Vec::new();

    for input_file in input_files {
        match process_one(request, deps, spec, input_file, mounts) {
            Ok(record) => output_files.push(record),
            Err(FileError::Cancelled) => return Err(TaskError::Cancelled),
            Err(err) => {
                warn!(
                    input = %input_file.display_name,
                    "skipping input file: {err}"
                );
            }
        }
    }

    Ok(output_files)
}

#[derive(Debug, Error)]
enum FileError {
    #[error("mount failed: {0}")]
    Mount(#[from] MountError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("search failed: {0}")]
    Search(SupervisorError),
    #[error("cancelled")]
    Cancelled,
}

impl From<SupervisorError> for FileError {
    fn from(err: SupervisorError) -> Self {
        match err {
            SupervisorError::Cancelled => FileError::Cancelled,
            other => FileError::Search(other),
        }
    }
}

fn process_one(
    request: &TaskRequest,
    deps: &TaskDeps<'_>,
    spec: &CommandSpec,
    input_file: &InputFile,
    mounts: &mut MountSet,
) -> Result<OutputFileRecord, FileError> {
    let input_path = PathBuf::from(&input_file.path);

    let argv = if request.config.mount_disk_images
        && deps.mounter.is_disk_image(&input_path)
    {
        let device = deps.mounter.acquire(&input_path, MIN_PARTITION_BYTES)?;
        // Tracked before setup so a half-acquired device is still released.
        let device = mounts.track(device);
        device.setup()?;
        let mountpoints = device.mount()?;
        info!(
            input = %input_file.display_name,
            mountpoints = mountpoints.len(),
            "searching mounted partitions"
        );
        spec.argv_for_mountpoints(&mountpoints)
    } else {
        spec.argv_for_file(&input_path)
    };

    let display_name = format!("{}{}", input_file.display_name, OUTPUT_SUFFIX);
    let output_file = create_output_file(&request.output_path, &display_name)?;

    supervise(
        &argv,
        &output_file.path,
        deps.reporter,
        deps.cancel,
        deps.clock,
        &deps.options,
    )?;

    Ok(output_file.into_record())
}
