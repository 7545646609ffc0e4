//! Cell execution pipeline.
//!
//! `Pipeline::run_cell` runs one cell under an `Evaluator` with its output
//! captured, formats the produced value, and always returns an
//! `ExecutionResult`: evaluation failures, formatter failures and panics are
//! all folded into the result rather than propagated.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use futures_util::FutureExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::display::{DisplayFormatter, MimeBundle};
use crate::output::{OutputTarget, Stream};

/// Opaque identifier of a cell, used only to correlate results.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CellId(String);

impl CellId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for CellId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for CellId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One unit of submitted source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    pub id: CellId,
    pub source: String,
}

impl Cell {
    pub fn new(id: impl Into<CellId>, source: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
        }
    }
}

/// Outcome of running one cell, with everything it printed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ExecutionResult {
    Success {
        formatted_value: Option<MimeBundle>,
        stdout: String,
        stderr: String,
    },
    Failure {
        message: String,
        stdout: String,
        stderr: String,
    },
}

impl ExecutionResult {
    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionResult::Success { .. })
    }

    pub fn stdout(&self) -> &str {
        match self {
            ExecutionResult::Success { stdout, .. } | ExecutionResult::Failure { stdout, .. } => stdout,
        }
    }

    pub fn stderr(&self) -> &str {
        match self {
            ExecutionResult::Success { stderr, .. } | ExecutionResult::Failure { stderr, .. } => stderr,
        }
    }
}

/// What an evaluator reports for one unit of source.
pub enum Evaluation<V> {
    /// Ran to completion, producing a value or nothing.
    Success(Option<V>),
    /// Raised; the message describes the error.
    Failure(String),
}

impl<V: fmt::Debug> fmt::Debug for Evaluation<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Evaluation::Success(value) => f.debug_tuple("Success").field(value).finish(),
            Evaluation::Failure(message) => f.debug_tuple("Failure").field(message).finish(),
        }
    }
}

/// A suspend-capable evaluator that runs source against persistent state.
///
/// Output must go to `output`; the pipeline captures it there.
#[allow(async_fn_in_trait)]
pub trait Evaluator {
    type Value;

    async fn evaluate(
        &mut self,
        source: &str,
        unit: &CellId,
        output: &OutputTarget,
    ) -> Evaluation<Self::Value>;
}

pub struct Pipeline<E, F> {
    evaluator: E,
    formatter: F,
}

impl<E, F> Pipeline<E, F>
where
    E: Evaluator,
    F: DisplayFormatter<E::Value>,
{
    pub fn new(evaluator: E, formatter: F) -> Self {
        Self {
            evaluator,
            formatter,
        }
    }

    pub fn evaluator(&self) -> &E {
        &self.evaluator
    }

    /// Run `cell` with its output captured from `output`.
    ///
    /// `output` is restored to its previous sink before this returns, on
    /// every path.
    pub async fn run_cell(&mut self, output: &OutputTarget, cell: &Cell) -> ExecutionResult {
        debug!(cell = %cell.id, "running cell");
        let scope = output.capture();

        let evaluation = AssertUnwindSafe(self.evaluator.evaluate(&cell.source, &cell.id, output))
            .catch_unwind()
            .await;

        let outcome = match evaluation {
            Ok(Evaluation::Success(value)) => Ok(value.and_then(|value| self.format(output, &value))),
            Ok(Evaluation::Failure(message)) => Err(message),
            Err(payload) => {
                warn!(cell = %cell.id, panic = panic_message(&*payload), "evaluator panicked");
                Err(format!("internal error while running cell {}", cell.id))
            }
        };

        let (stdout, stderr) = scope.finish();
        debug!(cell = %cell.id, ok = outcome.is_ok(), "cell finished");
        match outcome {
            Ok(formatted_value) => ExecutionResult::Success {
                formatted_value,
                stdout,
                stderr,
            },
            Err(message) => ExecutionResult::Failure {
                message,
                stdout,
                stderr,
            },
        }
    }

    /// Format a produced value; failures become a note on captured stderr.
    fn format(&self, output: &OutputTarget, value: &E::Value) -> Option<MimeBundle> {
        let formatted = panic::catch_unwind(AssertUnwindSafe(|| self.formatter.format(value)));
        let reason = match formatted {
            Ok(Ok(bundle)) => return Some(bundle),
            Ok(Err(err)) => err.to_string(),
            Err(payload) => panic_message(&*payload).to_string(),
        };
        warn!(%reason, "display formatting failed");
        output.write(
            Stream::Stderr,
            &format!("display formatting failed: {}\n", reason),
        );
        None
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execution_result_serializes_with_status_tag() {
        let result = ExecutionResult::Success {
            formatted_value: Some(MimeBundle::text("42")),
            stdout: "hi\n".to_string(),
            stderr: String::new(),
        };
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            serde_json::json!({
                "status": "success",
                "formattedValue": { "text/plain": "42" },
                "stdout": "hi\n",
                "stderr": "",
            })
        );

        let failure = ExecutionResult::Failure {
            message: "boom".to_string(),
            stdout: String::new(),
            stderr: String::new(),
        };
        assert_eq!(serde_json::to_value(&failure).unwrap()["status"], "failure");
    }

    #[test]
    fn test_panic_message() {
        let payload = std::panic::catch_unwind(|| panic!("bad {}", 1)).unwrap_err();
        assert_eq!(panic_message(&*payload), "bad 1");
    }
}
