//! Isolated execution host for untrusted generated UI source.
//!
//! The host owns a sandboxed Luau interpreter on a dedicated thread and
//! speaks to the rest of the process only through channels carrying the
//! JSON wire messages defined in [`protocol`]. It announces readiness
//! exactly once, then compiles and executes each delivered source
//! document, clearing the previous render first. Compile and runtime
//! failures are caught at the host boundary and rendered as an in-host
//! diagnostic panel; they never terminate the listener loop.

pub mod error;
pub mod host;
pub mod protocol;
pub mod runtime;

pub use error::SandboxError;
pub use host::{ExecutionHost, ExecutionHostHandle};
pub use protocol::{HostCommand, HostEvent, HostSignal, READY_SENTINEL};
pub use runtime::UiRuntime;
