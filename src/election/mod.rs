//! Leader election for a job.
//!
//! At most one instance of a job holds the ephemeral leader record at a time.
//! Elections are triggered by events, never by timers:
//!
//! - **Active**: the local server is enabled, or the local instance came
//!   online, while no leader exists.
//! - **Passive**: the leader record was removed (leader crashed or abdicated)
//!   and the local host is available.
//! - **Abdication**: the local server was disabled while this process leads.
//!
//! Every attempt is a single atomic create-if-absent, so duplicated or
//! reordered events can never produce two leaders.

pub mod leader;
pub mod listener;

pub use leader::LeaderService;
pub use listener::ElectionListenerManager;
