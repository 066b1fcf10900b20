use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{info, warn};

use relikgrep::{
    cli,
    config::{self, TaskConfig},
    input::InputFile,
    logging,
    mount::LoopDeviceMounter,
    progress::{ChannelReporter, SystemClock},
    supervisor::SupervisorOptions,
    task::{self, TaskRequest},
};

fn main() -> Result<()> {
    logging::init_logging();

    let cli_opts = cli::parse();

    if cli_opts.print_metadata {
        println!("{}", serde_json::to_string_pretty(&config::task_metadata())?);
        return Ok(());
    }

    let mut task_config = if let Some(path) = cli_opts.config_path.as_deref() {
        config::load_config(path)
            .with_context(|| format!("loading config from {}", path.display()))?
    } else {
        TaskConfig::new("")
    };
    if let Some(regex) = cli_opts.regex.clone() {
        task_config.regex = regex;
    }
    if cli_opts.mount_disk_images {
        task_config.mount_disk_images = true;
    }

    let pipe_result = match cli_opts.pipe_result.as_deref() {
        Some(path) => Some(
            std::fs::read_to_string(path)
                .with_context(|| format!("reading pipe result {}", path.display()))?,
        ),
        None => None,
    };

    let input_files: Vec<InputFile> = cli_opts
        .inputs
        .iter()
        .map(|arg| {
            let (path, display_name) = cli::parse_input_arg(arg);
            InputFile::new(path, display_name)
        })
        .collect();

    info!(
        "starting workflow_id={} inputs={} output={}",
        cli_opts.workflow_id,
        input_files.len(),
        cli_opts.output.display()
    );

    let cancel = Arc::new(AtomicBool::new(false));
    {
        let cancel = cancel.clone();
        ctrlc::set_handler(move || {
            warn!("interrupt received, cancelling task");
            cancel.store(true, Ordering::Relaxed);
        })
        .context("installing interrupt handler")?;
    }

    // Progress events are drained off-thread and printed as JSON lines,
    // standing in for the framework's progress channel.
    let (reporter, progress_rx) = ChannelReporter::new(64);
    let printer = std::thread::spawn(move || {
        for event in progress_rx {
            match serde_json::to_string(&event) {
                Ok(line) => eprintln!("{line}"),
                Err(err) => warn!("failed to serialize progress event: {err}"),
            }
        }
    });

    let options = SupervisorOptions {
        poll_interval: Duration::from_secs(cli_opts.poll_interval_secs),
        deadline: cli_opts.deadline_secs.map(Duration::from_secs),
    };

    let request = TaskRequest {
        pipe_result,
        input_files,
        output_path: cli_opts.output.clone(),
        workflow_id: cli_opts.workflow_id.clone(),
        config: task_config,
    };

    let mounter = LoopDeviceMounter;
    let clock = SystemClock;
    let deps = task::TaskDeps {
        mounter: &mounter,
        reporter: &reporter,
        cancel: &cancel,
        clock: &clock,
        options,
        program_override: None,
    };

    let result = task::run_task(request, &deps);
    drop(deps);
    drop(reporter);
    let _ = printer.join();

    let result = result.context("grep task failed")?;
    println!("{}", task::encode_result(&result)?);
    info!("relikgrep run finished");
    Ok(())
}
