use std::cell::RefCell;
use std::rc::Rc;

use inkpot_eval::suspend::{self, Resumer, SuspendEvent};
use inkpot_eval::{
    Cell, CellId, DisplayFormatter, Evaluation, Evaluator, ExecutionResult, FormatError,
    Interpreter, MimeBundle, OutputSink, OutputTarget, Pipeline, ReprFormatter, Stream, Value,
};
use tokio::sync::mpsc::UnboundedReceiver;

/// Sink that records everything written outside a capture.
#[derive(Clone, Default)]
struct Recording(Rc<RefCell<String>>);

impl OutputSink for Recording {
    fn write(&mut self, _stream: Stream, text: &str) {
        self.0.borrow_mut().push_str(text);
    }
}

fn interpreter_pipeline() -> (
    Pipeline<Interpreter, ReprFormatter>,
    Resumer,
    UnboundedReceiver<SuspendEvent>,
) {
    let (suspender, resumer, events) = suspend::channel();
    (
        Pipeline::new(Interpreter::new(suspender), ReprFormatter),
        resumer,
        events,
    )
}

fn success(formatted_value: Option<MimeBundle>, stdout: &str, stderr: &str) -> ExecutionResult {
    ExecutionResult::Success {
        formatted_value,
        stdout: stdout.to_string(),
        stderr: stderr.to_string(),
    }
}

#[tokio::test]
async fn test_input_cell_suspends_and_binds_resumed_value() {
    let (mut pipeline, resumer, mut events) = interpreter_pipeline();
    let source = inkpot_rewrite::rewrite("x = input(\"name: \")");
    assert_eq!(source, "x = await input('name: ')");

    let output = OutputTarget::default();
    let cell = Cell::new("c1", source);
    let host = async {
        let event = events.recv().await.unwrap();
        assert_eq!(event.cell, "c1");
        assert_eq!(event.prompt, "name: ");
        resumer.resume(event.id, "Ada").unwrap();
    };
    let (result, ()) = tokio::join!(pipeline.run_cell(&output, &cell), host);

    assert_eq!(result, success(None, "", ""));
    assert_eq!(pipeline.evaluator().global("x"), Some(Value::str("Ada")));
}

#[tokio::test]
async fn test_failure_keeps_output_printed_before_the_error() {
    let (mut pipeline, _resumer, _events) = interpreter_pipeline();
    let output = OutputTarget::default();
    let cell = Cell::new("c2", inkpot_rewrite::rewrite("print(\"hi\"); 1/0"));

    let result = pipeline.run_cell(&output, &cell).await;
    assert_eq!(
        result,
        ExecutionResult::Failure {
            message: "ZeroDivisionError: division by zero".to_string(),
            stdout: "hi\n".to_string(),
            stderr: String::new(),
        }
    );
}

#[tokio::test]
async fn test_value_is_formatted() {
    let (mut pipeline, _resumer, _events) = interpreter_pipeline();
    let output = OutputTarget::default();
    let result = pipeline.run_cell(&output, &Cell::new("c", "[1, 'a']")).await;
    assert_eq!(result, success(Some(MimeBundle::text("[1, 'a']")), "", ""));
}

#[tokio::test]
async fn test_capture_is_per_cell_and_target_is_restored() {
    let (mut pipeline, _resumer, _events) = interpreter_pipeline();
    let recording = Recording::default();
    let output = OutputTarget::new(recording.clone());

    let first = pipeline
        .run_cell(&output, &Cell::new("a", "import sys\nprint('one')\nsys.stderr.write('e1')\nraise ValueError('x')"))
        .await;
    let second = pipeline.run_cell(&output, &Cell::new("b", "print('two')")).await;

    assert!(!first.is_success());
    assert_eq!(first.stdout(), "one\n");
    assert_eq!(first.stderr(), "e1");
    assert_eq!(second, success(None, "two\n", ""));

    assert_eq!(*recording.0.borrow(), "");
    output.write(Stream::Stdout, "after");
    assert_eq!(*recording.0.borrow(), "after");
}

#[tokio::test]
async fn test_syntax_error_is_reported_and_next_cell_runs() {
    let (mut pipeline, _resumer, _events) = interpreter_pipeline();
    let output = OutputTarget::default();
    let source = inkpot_rewrite::rewrite("x = = 1");
    assert_eq!(source, "x = = 1");

    let result = pipeline.run_cell(&output, &Cell::new("bad", source)).await;
    match result {
        ExecutionResult::Failure { message, .. } => {
            assert!(message.starts_with("SyntaxError: "), "{}", message);
            assert!(message.contains("line 1"), "{}", message);
        }
        other => panic!("expected failure, got {:?}", other),
    }

    let result = pipeline.run_cell(&output, &Cell::new("good", "1 + 1")).await;
    assert_eq!(result, success(Some(MimeBundle::text("2")), "", ""));
}

struct FailingFormatter;

impl DisplayFormatter<Value> for FailingFormatter {
    fn format(&self, _value: &Value) -> Result<MimeBundle, FormatError> {
        Err(FormatError::Unsupported("no display for this value".to_string()))
    }
}

struct PanickingFormatter;

impl DisplayFormatter<Value> for PanickingFormatter {
    fn format(&self, _value: &Value) -> Result<MimeBundle, FormatError> {
        panic!("formatter exploded")
    }
}

#[tokio::test]
async fn test_formatter_errors_degrade_to_valueless_success() {
    let (suspender, _resumer, _events) = suspend::channel();
    let mut pipeline = Pipeline::new(Interpreter::new(suspender), FailingFormatter);
    let output = OutputTarget::default();

    let result = pipeline.run_cell(&output, &Cell::new("f", "print('out')\n42")).await;
    assert_eq!(
        result,
        success(None, "out\n", "display formatting failed: no display for this value\n")
    );
}

#[tokio::test]
async fn test_formatter_panic_degrades_to_valueless_success() {
    let (suspender, _resumer, _events) = suspend::channel();
    let mut pipeline = Pipeline::new(Interpreter::new(suspender), PanickingFormatter);
    let output = OutputTarget::default();

    let result = pipeline.run_cell(&output, &Cell::new("p", "42")).await;
    assert_eq!(
        result,
        success(None, "", "display formatting failed: formatter exploded\n")
    );

    let result = pipeline.run_cell(&output, &Cell::new("q", "x = 1")).await;
    assert_eq!(result, success(None, "", ""));
}

/// Prints, then panics on the first cell; behaves on later ones.
#[derive(Default)]
struct FlakyEvaluator {
    runs: usize,
}

impl Evaluator for FlakyEvaluator {
    type Value = Value;

    async fn evaluate(
        &mut self,
        source: &str,
        _unit: &CellId,
        output: &OutputTarget,
    ) -> Evaluation<Value> {
        self.runs += 1;
        output.write(Stream::Stdout, source);
        if self.runs == 1 {
            panic!("evaluator bug");
        }
        Evaluation::Success(Some(Value::Int(self.runs as i64)))
    }
}

#[tokio::test]
async fn test_evaluator_panic_becomes_generic_failure() {
    let recording = Recording::default();
    let output = OutputTarget::new(recording.clone());
    let mut pipeline = Pipeline::new(FlakyEvaluator::default(), ReprFormatter);

    let result = pipeline.run_cell(&output, &Cell::new("c7", "first")).await;
    assert_eq!(
        result,
        ExecutionResult::Failure {
            message: "internal error while running cell c7".to_string(),
            stdout: "first".to_string(),
            stderr: String::new(),
        }
    );

    let result = pipeline.run_cell(&output, &Cell::new("c8", "second")).await;
    assert_eq!(result, success(Some(MimeBundle::text("2")), "second", ""));
    assert_eq!(*recording.0.borrow(), "");
    assert_eq!(pipeline.evaluator().runs, 2);
}

#[tokio::test]
async fn test_rewritten_def_body_suspends_inside_function() {
    let (mut pipeline, resumer, mut events) = interpreter_pipeline();
    let output = OutputTarget::default();
    let source = inkpot_rewrite::rewrite("async def ask():\n    return input('q')\nawait ask()");
    let cell = Cell::new("d", source);

    let host = async {
        let event = events.recv().await.unwrap();
        assert_eq!(event.prompt, "q");
        resumer.resume(event.id, "42").unwrap();
    };
    let (result, ()) = tokio::join!(pipeline.run_cell(&output, &cell), host);
    assert_eq!(result, success(Some(MimeBundle::text("'42'")), "", ""));
}
