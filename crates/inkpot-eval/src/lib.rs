//! Suspend-capable interpreter and cell execution pipeline for inkpot.
//!
//! The [`Interpreter`] runs inkpot Python cells. Awaiting an `input(...)`
//! coroutine suspends evaluation until the host answers through a
//! [`Resumer`]. The [`Pipeline`] wraps an evaluator: it captures everything a
//! cell prints on an explicit [`OutputTarget`], formats the cell's value
//! through a [`DisplayFormatter`], and reports an [`ExecutionResult`].

mod builtins;
pub mod display;
pub mod error;
mod eval;
pub mod exception;
pub mod host;
pub mod interpreter;
mod methods;
mod modules;
mod ops;
pub mod output;
pub mod pipeline;
pub mod scope;
pub mod suspend;
pub mod value;

pub use display::{DisplayFormatter, FormatError, MimeBundle, ReprFormatter};
pub use error::Error;
pub use exception::{Exception, ExceptionKind};
pub use eval::MAX_DEPTH;
pub use host::HostChannel;
pub use interpreter::Interpreter;
pub use output::{CaptureBuffer, CaptureScope, NullSink, OutputSink, OutputTarget, StdioSink, Stream};
pub use pipeline::{Cell, CellId, Evaluation, Evaluator, ExecutionResult, Pipeline};
pub use suspend::{Resumer, SuspendEvent, Suspender, SuspensionId};
pub use value::Value;
