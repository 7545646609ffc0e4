//! The worker loop: read requests, run cells one at a time, answer suspensions.

use std::rc::Rc;

use anyhow::Context;
use inkpot_eval::suspend::{self, Resumer};
use inkpot_eval::{
    Cell, CellId, ExecutionResult, HostChannel, Interpreter, MimeBundle, OutputSink, OutputTarget,
    Pipeline, ReprFormatter, Stream,
};
use inkpot_rewrite::{Rewriter, DEFAULT_PRIMITIVE};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::{self, JoinError, JoinHandle};
use tracing::{debug, info, warn};

use crate::protocol::{Message, Request};

type CellPipeline = Pipeline<Interpreter, ReprFormatter>;
type Outbox = mpsc::UnboundedSender<Message>;

#[derive(Debug, Clone)]
pub struct Options {
    /// Insert suspension points before running each cell.
    pub rewrite: bool,
    /// Input primitive the rewriter wraps.
    pub primitive: String,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            rewrite: true,
            primitive: DEFAULT_PRIMITIVE.to_string(),
        }
    }
}

/// Host channel that forwards to the host as protocol messages.
struct MessageHost {
    outbox: Outbox,
}

impl HostChannel for MessageHost {
    fn send_text(&self, text: &str) {
        post(
            &self.outbox,
            Message::Stdout {
                text: text.to_string(),
            },
        );
    }

    fn send_image(&self, png_base64: &str) {
        post(
            &self.outbox,
            Message::ExecuteResult {
                cell_id: None,
                result: MimeBundle::png(png_base64),
            },
        );
    }
}

/// Sink for output written while no cell capture is installed.
struct MessageSink {
    outbox: Outbox,
}

impl OutputSink for MessageSink {
    fn write(&mut self, stream: Stream, text: &str) {
        match stream {
            Stream::Stdout => post(
                &self.outbox,
                Message::Stdout {
                    text: text.to_string(),
                },
            ),
            Stream::Stderr => warn!(text, "stderr output outside a cell"),
        }
    }
}

fn post(outbox: &Outbox, message: Message) {
    if outbox.send(message).is_err() {
        debug!("dropping message after shutdown");
    }
}

/// A cell in flight: it owns the pipeline until it finishes.
type Running = JoinHandle<(CellPipeline, CellId, ExecutionResult)>;

async fn join_running(running: &mut Option<Running>) -> Result<(CellPipeline, CellId, ExecutionResult), JoinError> {
    match running {
        Some(handle) => handle.await,
        None => std::future::pending().await,
    }
}

/// Serve requests from `reader`, writing messages to `writer`, until the
/// reader reaches end of input.
///
/// Must run inside a `LocalSet`: cells execute on `spawn_local` tasks.
pub async fn serve<R, W>(reader: R, mut writer: W, options: Options) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let (outbox, mut outgoing) = mpsc::unbounded_channel();
    let (suspender, resumer, mut suspensions) = suspend::channel();
    let interpreter = Interpreter::new(suspender).with_host(Rc::new(MessageHost {
        outbox: outbox.clone(),
    }));
    let output = OutputTarget::new(MessageSink {
        outbox: outbox.clone(),
    });
    let rewriter = Rewriter::new().primitive(&options.primitive);

    let mut idle = Some(Pipeline::new(interpreter, ReprFormatter));
    let mut running: Option<Running> = None;
    let mut lines = reader.lines();
    info!(rewrite = options.rewrite, primitive = %options.primitive, "worker ready");

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read request")? else {
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<Request>(&line) {
                    Ok(request) => handle_request(
                        request,
                        &outbox,
                        &resumer,
                        &rewriter,
                        &options,
                        &output,
                        &mut idle,
                        &mut running,
                    ),
                    Err(err) => {
                        warn!(%err, "malformed request");
                        post(&outbox, Message::error(None, format!("invalid request: {}", err)));
                    }
                }
            }
            Some(event) = suspensions.recv() => {
                post(&outbox, Message::InputRequest {
                    suspension: event.id,
                    cell_id: CellId::from(event.cell),
                    prompt: event.prompt,
                });
            }
            joined = join_running(&mut running) => {
                running = None;
                let (pipeline, cell_id, result) = joined.context("cell task failed")?;
                idle = Some(pipeline);
                for message in completion_messages(cell_id, result) {
                    post(&outbox, message);
                }
            }
            Some(message) = outgoing.recv() => {
                write_message(&mut writer, &message).await?;
            }
        }
    }

    info!("input closed, shutting down");
    if let Some(handle) = running.take() {
        handle.abort();
    }
    while let Ok(message) = outgoing.try_recv() {
        write_message(&mut writer, &message).await?;
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn handle_request(
    request: Request,
    outbox: &Outbox,
    resumer: &Resumer,
    rewriter: &Rewriter,
    options: &Options,
    output: &OutputTarget,
    idle: &mut Option<CellPipeline>,
    running: &mut Option<Running>,
) {
    match request {
        Request::Initialize => post(outbox, Message::Initialized),
        Request::Run { cell_id, code } => {
            let Some(mut pipeline) = idle.take() else {
                warn!(cell = %cell_id, "run refused: a cell is already running");
                post(
                    outbox,
                    Message::error(Some(cell_id), "another cell is already in progress"),
                );
                return;
            };
            let source = if options.rewrite {
                rewriter.rewrite(&code)
            } else {
                code
            };
            debug!(cell = %cell_id, %source, "starting cell");
            let output = output.clone();
            *running = Some(task::spawn_local(async move {
                let cell = Cell::new(cell_id, source);
                let result = pipeline.run_cell(&output, &cell).await;
                (pipeline, cell.id, result)
            }));
        }
        Request::Resume { suspension, value } => {
            if let Err(err) = resumer.resume(suspension, value) {
                warn!(%err, "resume failed");
                post(outbox, Message::error(None, err.to_string()));
            }
        }
    }
}

fn completion_messages(cell_id: CellId, result: ExecutionResult) -> Vec<Message> {
    match result {
        ExecutionResult::Success {
            formatted_value,
            stdout,
            stderr,
        } => {
            let mut messages = Vec::with_capacity(2);
            if let Some(result) = formatted_value {
                messages.push(Message::ExecuteResult {
                    cell_id: Some(cell_id.clone()),
                    result,
                });
            }
            messages.push(Message::ExecuteCompleted {
                cell_id,
                stdout,
                stderr,
            });
            messages
        }
        ExecutionResult::Failure {
            message,
            stdout,
            stderr,
        } => vec![Message::Error {
            cell_id: Some(cell_id),
            error: message,
            stdout,
            stderr,
        }],
    }
}

async fn write_message<W: AsyncWrite + Unpin>(writer: &mut W, message: &Message) -> anyhow::Result<()> {
    let mut line = serde_json::to_string(message)?;
    line.push('\n');
    writer
        .write_all(line.as_bytes())
        .await
        .context("failed to write message")?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_without_value_only_completes() {
        let result = ExecutionResult::Success {
            formatted_value: None,
            stdout: "hi\n".to_string(),
            stderr: String::new(),
        };
        let messages = completion_messages(CellId::from("c"), result);
        assert_eq!(
            messages,
            vec![Message::ExecuteCompleted {
                cell_id: CellId::from("c"),
                stdout: "hi\n".to_string(),
                stderr: String::new(),
            }]
        );
    }

    #[test]
    fn test_failure_becomes_error_message() {
        let result = ExecutionResult::Failure {
            message: "ValueError: x".to_string(),
            stdout: String::new(),
            stderr: "warn".to_string(),
        };
        let messages = completion_messages(CellId::from("c"), result);
        assert!(matches!(
            &messages[..],
            [Message::Error { cell_id: Some(_), error, stderr, .. }] if error == "ValueError: x" && stderr == "warn"
        ));
    }
}
