//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! reply / http subsystems produce:
//!     → tracing events (render errors, aborted commits, dispatch)
//!     → metrics.rs (commit counters and latency)
//!
//! Consumers:
//!     → logging.rs subscriber (stdout)
//!     → whatever metrics recorder the host installs
//! ```

pub mod logging;
pub mod metrics;
