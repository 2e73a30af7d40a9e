#![forbid(unsafe_code)]

pub mod config;
pub mod context;
pub mod credentials;
pub mod engine;
pub mod error;
pub mod event;
pub mod invocation;
pub mod notify;
pub mod policy;
pub mod queue;
pub mod resources;
pub mod telemetry;

pub use config::{CliArgs, Command, InvokeArgs, OrchestratorConfig, OutputFormat};
pub use context::Context;
pub use error::{OrchestratorError, Result};
pub use invocation::{Handler, InvocationResult, PolicyOutcome, PolicyResult, PreValidator};
