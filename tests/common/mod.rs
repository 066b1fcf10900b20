//! Shared test infrastructure: fake clock, collecting reporter and mock
//! mounters used across the integration tests.
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use relikgrep::mount::{DiskImageMounter, MountError, MountedDevice};
use relikgrep::progress::{Clock, ProgressReporter, ProgressSample};

/// Clock that never advances and never sleeps, so supervisor tests run
/// without real delays.
pub struct FakeClock {
    origin: Instant,
}

impl FakeClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Instant {
        self.origin
    }

    fn sleep(&self, _duration: Duration) {}
}

/// Real clock with a shortened poll interval; tests that exercise timing use
/// this instead of the 3 s production default.
pub struct FastClock;

impl Clock for FastClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, _duration: Duration) {
        std::thread::sleep(Duration::from_millis(5));
    }
}

/// Captures every emitted progress sample.
#[derive(Default)]
pub struct CollectingReporter {
    samples: Mutex<Vec<ProgressSample>>,
}

impl CollectingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn samples(&self) -> Vec<ProgressSample> {
        self.samples.lock().unwrap().clone()
    }
}

impl ProgressReporter for CollectingReporter {
    fn on_progress(&self, sample: &ProgressSample) {
        self.samples.lock().unwrap().push(*sample);
    }
}

/// Shared counters for asserting the acquire/release invariant.
#[derive(Default)]
pub struct MountCounters {
    pub acquired: AtomicUsize,
    pub released: AtomicUsize,
}

impl MountCounters {
    pub fn balanced(&self) -> bool {
        self.acquired.load(Ordering::SeqCst) == self.released.load(Ordering::SeqCst)
    }
}

/// Behavior knobs for the mock mounter.
#[derive(Clone)]
pub enum MockBehavior {
    /// Mount succeeds, exposing these directories as mountpoints.
    Mount(Vec<PathBuf>),
    /// Device setup fails.
    FailSetup,
}

/// Mock disk-image mounter: treats `.dd` inputs as disk images.
pub struct MockMounter {
    pub behavior: MockBehavior,
    pub counters: Arc<MountCounters>,
}

impl DiskImageMounter for MockMounter {
    fn is_disk_image(&self, path: &Path) -> bool {
        path.extension().and_then(|e| e.to_str()) == Some("dd")
    }

    fn acquire(
        &self,
        _image: &Path,
        _min_partition_bytes: u64,
    ) -> Result<Box<dyn MountedDevice>, MountError> {
        self.counters.acquired.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockDevice {
            behavior: self.behavior.clone(),
            counters: self.counters.clone(),
            released: false,
        }))
    }
}

struct MockDevice {
    behavior: MockBehavior,
    counters: Arc<MountCounters>,
    released: bool,
}

impl MountedDevice for MockDevice {
    fn setup(&mut self) -> Result<(), MountError> {
        match self.behavior {
            MockBehavior::FailSetup => Err(MountError::Tool {
                tool: "losetup",
                message: "simulated setup failure".to_string(),
            }),
            _ => Ok(()),
        }
    }

    fn mount(&mut self) -> Result<Vec<PathBuf>, MountError> {
        match &self.behavior {
            MockBehavior::Mount(roots) => Ok(roots.clone()),
            MockBehavior::FailSetup => Err(MountError::NotSetUp),
        }
    }

    fn unmount(&mut self) -> Result<(), MountError> {
        if !self.released {
            self.released = true;
            self.counters.released.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}
