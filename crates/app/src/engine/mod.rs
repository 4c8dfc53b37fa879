//! The always-on hotword engine: capture loop, state machine, retry and
//! watchdog policy, and the coordination surface for the external
//! conversational loop.

pub mod capture_loop;
pub mod config;
pub mod coordination;
pub mod events;
pub mod retry;
pub mod state_machine;
pub mod watchdog;

pub use capture_loop::{CaptureLoop, CaptureLoopHandle, CaptureSessionBuilder};
pub use config::EngineConfig;
pub use coordination::{coordination_channel, CoordinationHandle, ListenerControl};
pub use events::{CaptureEvent, FaultReason, HotwordFired, TerminalFailure};
pub use retry::{RetryDecision, RetryScheduler};
pub use state_machine::{build_engine, EngineHooks, EngineSetup, HotwordEngine};
pub use watchdog::Watchdog;
