//! Disk-image mounting.
//!
//! Mounting is delegated to the system tools (`losetup`, `lsblk`, `mount`,
//! `umount`) behind trait seams so tests can substitute a mock. Every device
//! acquired during a task invocation is tracked in a [`MountSet`] and
//! released before the task returns, on every exit path.

use std::path::{Path, PathBuf};
use std::process::Command;

use thiserror::Error;
use tracing::{debug, info, warn};

/// Minimum partition size considered worth mounting. Partitions below this
/// are typically boot stubs or alignment gaps.
pub const MIN_PARTITION_BYTES: u64 = 100 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum MountError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{tool} failed: {message}")]
    Tool { tool: &'static str, message: String },
    #[error("device not set up")]
    NotSetUp,
    #[error("no mountable partitions in {0}")]
    NoPartitions(String),
}

/// Lifecycle of one mounted disk image.
///
/// Call order is `setup` then `mount`; `unmount` is idempotent and releases
/// everything the earlier calls acquired.
pub trait MountedDevice: Send {
    fn setup(&mut self) -> Result<(), MountError>;
    fn mount(&mut self) -> Result<Vec<PathBuf>, MountError>;
    fn unmount(&mut self) -> Result<(), MountError>;
}

/// Capability probe and handle acquisition for disk-image inputs.
pub trait DiskImageMounter: Send + Sync {
    fn is_disk_image(&self, path: &Path) -> bool;
    fn acquire(
        &self,
        image: &Path,
        min_partition_bytes: u64,
    ) -> Result<Box<dyn MountedDevice>, MountError>;
}

/// Ownership list of acquired devices, drained via [`MountSet::release_all`].
/// Dropping an undrained set also releases, so no exit path can leak a mount.
#[derive(Default)]
pub struct MountSet {
    devices: Vec<Box<dyn MountedDevice>>,
}

impl MountSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of a device, returning a borrow for further lifecycle
    /// calls. Tracking happens at acquisition so a device whose setup or
    /// mount later fails is still released.
    pub fn track(&mut self, device: Box<dyn MountedDevice>) -> &mut dyn MountedDevice {
        self.devices.push(device);
        self.devices.last_mut().expect("just pushed").as_mut()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Unmount every tracked device. Failures are logged, never re-raised:
    /// release is best-effort cleanup and must not mask the task outcome.
    pub fn release_all(&mut self) {
        for mut device in self.devices.drain(..) {
            if let Err(err) = device.unmount() {
                warn!("unmount failed: {err}");
            }
        }
    }
}

impl Drop for MountSet {
    fn drop(&mut self) {
        self.release_all();
    }
}

/// Loop-device mounter for raw disk images (Linux).
pub struct LoopDeviceMounter;

const IMAGE_EXTENSIONS: [&str; 5] = ["dd", "raw", "img", "image", "dmg"];

impl DiskImageMounter for LoopDeviceMounter {
    fn is_disk_image(&self, path: &Path) -> bool {
        let by_extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
            .unwrap_or(false);
        by_extension && std::fs::metadata(path).map(|m| m.len() > 0).unwrap_or(false)
    }

    fn acquire(
        &self,
        image: &Path,
        min_partition_bytes: u64,
    ) -> Result<Box<dyn MountedDevice>, MountError> {
        Ok(Box::new(LoopDevice {
            image: image.to_path_buf(),
            min_partition_bytes,
            loop_path: None,
            mounts: Vec::new(),
            released: false,
        }))
    }
}

struct LoopDevice {
    image: PathBuf,
    min_partition_bytes: u64,
    loop_path: Option<String>,
    mounts: Vec<PathBuf>,
    released: bool,
}

impl LoopDevice {
    fn partitions(&self, loop_path: &str) -> Result<Vec<String>, MountError> {
        let output = run_tool(
            "lsblk",
            Command::new("lsblk").args(["-lnb", "-o", "NAME,SIZE,TYPE", loop_path]),
        )?;
        let mut parts = Vec::new();
        for line in output.lines() {
            let mut fields = line.split_whitespace();
            let (Some(name), Some(size), Some(kind)) =
                (fields.next(), fields.next(), fields.next())
            else {
                continue;
            };
            if kind != "part" {
                continue;
            }
            let size: u64 = size.parse().unwrap_or(0);
            if size < self.min_partition_bytes {
                debug!("skipping small partition {name} ({size} bytes)");
                continue;
            }
            parts.push(format!("/dev/{name}"));
        }
        Ok(parts)
    }
}

impl MountedDevice for LoopDevice {
    fn setup(&mut self) -> Result<(), MountError> {
        let output = run_tool(
            "losetup",
            Command::new("losetup").args(["--find", "--show", "-P", "-r"]).arg(&self.image),
        )?;
        let loop_path = output.trim().to_string();
        if loop_path.is_empty() {
            return Err(MountError::Tool {
                tool: "losetup",
                message: "no loop device returned".to_string(),
            });
        }
        info!("attached {} at {}", self.image.display(), loop_path);
        self.loop_path = Some(loop_path);
        Ok(())
    }

    fn mount(&mut self) -> Result<Vec<PathBuf>, MountError> {
        let loop_path = self.loop_path.clone().ok_or(MountError::NotSetUp)?;
        let mut devices = self.partitions(&loop_path)?;
        if devices.is_empty() {
            // Partitionless image: mount the loop device itself.
            devices.push(loop_path.clone());
        }

        for device in &devices {
            let mountpoint = std::env::temp_dir().join(format!(
                "relikgrep_{}",
                device.trim_start_matches("/dev/").replace('/', "_")
            ));
            std::fs::create_dir_all(&mountpoint)?;
            run_tool(
                "mount",
                Command::new("mount")
                    .args(["-o", "ro,noexec,nosuid"])
                    .arg(device)
                    .arg(&mountpoint),
            )?;
            info!("mounted {device} at {}", mountpoint.display());
            self.mounts.push(mountpoint);
        }

        if self.mounts.is_empty() {
            return Err(MountError::NoPartitions(
                self.image.display().to_string(),
            ));
        }
        Ok(self.mounts.clone())
    }

    fn unmount(&mut self) -> Result<(), MountError> {
        if self.released {
            return Ok(());
        }
        self.released = true;

        let mut first_err = None;
        for mountpoint in self.mounts.drain(..) {
            match run_tool("umount", Command::new("umount").arg(&mountpoint)) {
                Ok(_) => {
                    let _ = std::fs::remove_dir(&mountpoint);
                }
                Err(err) => {
                    warn!("umount {} failed: {err}", mountpoint.display());
                    first_err.get_or_insert(err);
                }
            }
        }
        if let Some(loop_path) = self.loop_path.take() {
            if let Err(err) = run_tool("losetup", Command::new("losetup").args(["-d", &loop_path]))
            {
                warn!("detaching {loop_path} failed: {err}");
                first_err.get_or_insert(err);
            }
        }
        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

fn run_tool(tool: &'static str, command: &mut Command) -> Result<String, MountError> {
    let output = command.output()?;
    if !output.status.success() {
        return Err(MountError::Tool {
            tool,
            message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingDevice {
        released: Arc<AtomicUsize>,
        done: bool,
    }

    impl MountedDevice for CountingDevice {
        fn setup(&mut self) -> Result<(), MountError> {
            Ok(())
        }
        fn mount(&mut self) -> Result<Vec<PathBuf>, MountError> {
            Ok(vec![PathBuf::from("/tmp/fake")])
        }
        fn unmount(&mut self) -> Result<(), MountError> {
            if !self.done {
                self.done = true;
                self.released.fetch_add(1, Ordering::SeqCst);
            }
            Ok(())
        }
    }

    #[test]
    fn release_all_drains_every_device() {
        let released = Arc::new(AtomicUsize::new(0));
        let mut set = MountSet::new();
        for _ in 0..3 {
            set.track(Box::new(CountingDevice {
                released: released.clone(),
                done: false,
            }));
        }
        assert_eq!(set.len(), 3);
        set.release_all();
        assert!(set.is_empty());
        assert_eq!(released.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn dropping_an_undrained_set_releases() {
        let released = Arc::new(AtomicUsize::new(0));
        {
            let mut set = MountSet::new();
            set.track(Box::new(CountingDevice {
                released: released.clone(),
                done: false,
            }));
        }
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn probe_rejects_non_image_extensions() {
        let mounter = LoopDeviceMounter;
        assert!(!mounter.is_disk_image(Path::new("/data/report.txt")));
        assert!(!mounter.is_disk_image(Path::new("/data/no_extension")));
    }

    #[test]
    fn probe_accepts_existing_raw_image() {
        let dir = tempfile::tempdir().expect("tempdir");
        let image = dir.path().join("evidence.dd");
        std::fs::write(&image, vec![0u8; 512]).expect("write");
        let mounter = LoopDeviceMounter;
        assert!(mounter.is_disk_image(&image));
    }

    #[test]
    fn probe_rejects_empty_image_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let image = dir.path().join("empty.img");
        std::fs::write(&image, b"").expect("write");
        let mounter = LoopDeviceMounter;
        assert!(!mounter.is_disk_image(&image));
    }

    #[test]
    fn mount_before_setup_is_rejected() {
        let mounter = LoopDeviceMounter;
        let mut device = mounter
            .acquire(Path::new("/nonexistent.dd"), MIN_PARTITION_BYTES)
            .expect("acquire");
        assert!(matches!(device.mount(), Err(MountError::NotSetUp)));
    }
}
