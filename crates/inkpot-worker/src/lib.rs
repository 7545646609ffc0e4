//! inkpot notebook worker.
//!
//! Speaks a JSON-lines protocol on stdio: the host sends `run` requests with
//! cell source, the worker rewrites each cell so calls to the input
//! primitive suspend, runs it through the execution pipeline, and reports
//! results. A suspended cell surfaces as an `input_request`, answered by a
//! `resume` request.

pub mod protocol;
pub mod worker;

pub use protocol::{Message, Request};
pub use worker::{serve, Options};
