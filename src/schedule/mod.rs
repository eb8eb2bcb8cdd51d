//! Process-side scheduling state.
//!
//! The trigger engine that decides *when* a job fires lives outside this
//! crate; it is represented here by [`ScheduleController`]. The
//! [`JobRegistry`] tracks, per job name, the local instance identity, the
//! controller and the shutdown flag, and [`SchedulerFacade`] bundles the
//! start-up and shutdown sequences that touch the registry.

pub mod facade;
pub mod registry;

use std::sync::atomic::{AtomicBool, Ordering};

use tokio_util::sync::CancellationToken;

pub use facade::SchedulerFacade;
pub use registry::JobRegistry;

/// Handle on the trigger engine running a job in this process.
pub trait ScheduleController: Send + Sync {
    fn is_paused(&self) -> bool;

    /// Stop firing for good.
    fn shutdown(&self);
}

/// Controller for an engine driven by a [`CancellationToken`].
#[derive(Debug, Default)]
pub struct LocalScheduleController {
    paused: AtomicBool,
    stopped: CancellationToken,
}

impl LocalScheduleController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    pub fn is_shut_down(&self) -> bool {
        self.stopped.is_cancelled()
    }

    /// Cancelled when the controller is shut down; trigger loops select on it.
    pub fn stopped(&self) -> CancellationToken {
        self.stopped.clone()
    }
}

impl ScheduleController for LocalScheduleController {
    fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    fn shutdown(&self) {
        self.stopped.cancel();
    }
}
