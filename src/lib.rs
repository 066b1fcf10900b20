//! # relikgrep
//!
//! Forensic worker task that runs `grep` over a batch of input files,
//! optionally loop-mounting disk images first. The child process is
//! supervised by a polling loop that samples the growing output file and
//! emits progress events; one output file is produced per input file and the
//! batch is summarised in a structured task result for the surrounding
//! task-queue framework.

pub mod cli;
pub mod command;
pub mod config;
pub mod input;
pub mod logging;
pub mod mount;
pub mod output;
pub mod progress;
pub mod supervisor;
pub mod task;
pub mod util;
