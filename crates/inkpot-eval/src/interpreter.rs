//! The inkpot interpreter with suspend/resume capability.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use inkpot_lexer::Position;
use inkpot_parser::ast::{Stmt, StmtKind};
use tracing::debug;

use crate::eval::{self, Context, Env};
use crate::host::HostChannel;
use crate::output::OutputTarget;
use crate::pipeline::{CellId, Evaluation, Evaluator};
use crate::scope::Scope;
use crate::suspend::Suspender;
use crate::value::Value;

/// Runs cells against one persistent global namespace.
///
/// Evaluation may suspend at `await input(...)`: the interpreter announces
/// the suspension through its `Suspender` and waits for the host to resume
/// it through the matching `Resumer`.
pub struct Interpreter {
    globals: Rc<Scope>,
    modules: Rc<RefCell<HashMap<String, Value>>>,
    suspender: Suspender,
    host: Option<Rc<dyn HostChannel>>,
}

impl Interpreter {
    pub fn new(suspender: Suspender) -> Self {
        Self {
            globals: Scope::global(),
            modules: Rc::default(),
            suspender,
            host: None,
        }
    }

    /// Attach a host channel, which also makes the `host` module importable.
    pub fn with_host(mut self, host: Rc<dyn HostChannel>) -> Self {
        self.host = Some(host);
        self
    }

    /// Current binding of a global name.
    pub fn global(&self, name: &str) -> Option<Value> {
        self.globals.get(name)
    }

    /// Parse and run `source`, returning the cell value or a failure message.
    pub async fn run(
        &self,
        source: &str,
        cell: &CellId,
        output: &OutputTarget,
    ) -> Result<Option<Value>, String> {
        let module = inkpot_parser::parse(source).map_err(|err| format!("SyntaxError: {}", err))?;
        if let Some((message, offset)) = misplaced_control_flow(&module.body, false, false) {
            return Err(format!(
                "SyntaxError: {} ({})",
                message,
                Position::of(source, offset)
            ));
        }

        let env = Rc::new(Env {
            output: output.clone(),
            cell: cell.to_string(),
            suspender: self.suspender.clone(),
            host: self.host.clone(),
            modules: self.modules.clone(),
        });
        let ctx = Context::new(env, self.globals.clone());
        eval::eval_module(&ctx, &module)
            .await
            .map_err(|exc| exc.to_string())
    }
}

impl Evaluator for Interpreter {
    type Value = Value;

    async fn evaluate(&mut self, source: &str, unit: &CellId, output: &OutputTarget) -> Evaluation<Value> {
        match self.run(source, unit, output).await {
            Ok(value) => Evaluation::Success(value),
            Err(message) => {
                debug!(cell = %unit, %message, "cell raised");
                Evaluation::Failure(message)
            }
        }
    }
}

/// Find a `return` outside any function, or a `break`/`continue` outside a
/// loop, returning its message and byte offset.
fn misplaced_control_flow(
    body: &[Stmt],
    in_function: bool,
    in_loop: bool,
) -> Option<(&'static str, usize)> {
    body.iter().find_map(|stmt| {
        let offset = stmt.location.start.unwrap_or(0);
        match &stmt.kind {
            StmtKind::Return(_) if !in_function => Some(("'return' outside function", offset)),
            StmtKind::Break if !in_loop => Some(("'break' outside loop", offset)),
            StmtKind::Continue if !in_loop => Some(("'continue' not properly in loop", offset)),
            StmtKind::FunctionDef { body, .. } => misplaced_control_flow(body, true, false),
            StmtKind::While { body, .. } | StmtKind::For { body, .. } => {
                misplaced_control_flow(body, in_function, true)
            }
            StmtKind::If { body, orelse, .. } => misplaced_control_flow(body, in_function, in_loop)
                .or_else(|| misplaced_control_flow(orelse, in_function, in_loop)),
            _ => None,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exception::ExceptionKind;
    use crate::suspend;

    struct Run {
        result: Result<Option<Value>, String>,
        stdout: String,
        stderr: String,
    }

    async fn run_in(interpreter: &Interpreter, source: &str) -> Run {
        let output = OutputTarget::default();
        let scope = output.capture();
        let result = interpreter.run(source, &CellId::from("test"), &output).await;
        let (stdout, stderr) = scope.finish();
        Run {
            result,
            stdout,
            stderr,
        }
    }

    async fn run(source: &str) -> Run {
        let (suspender, _resumer, _events) = suspend::channel();
        run_in(&Interpreter::new(suspender), source).await
    }

    async fn value_of(source: &str) -> String {
        match run(source).await.result {
            Ok(Some(value)) => value.repr(),
            Ok(None) => "<no value>".to_string(),
            Err(message) => message,
        }
    }

    #[tokio::test]
    async fn test_cell_value_is_last_expression() {
        assert_eq!(value_of("x = 2\nx * 21").await, "42");
        assert_eq!(value_of("x = 2").await, "<no value>");
        assert_eq!(value_of("None").await, "<no value>");
        assert_eq!(value_of("1\nx = 3").await, "<no value>");
    }

    #[tokio::test]
    async fn test_print_writes_to_captured_streams() {
        let out = run("import sys\nprint('a', 1, sep='-', end='!')\nprint('err', file=sys.stderr)\nsys.stdout.write('w')").await;
        assert_eq!(out.stdout, "a-1!w");
        assert_eq!(out.stderr, "err\n");
        assert_eq!(out.result, Ok(Some(Value::Int(1))));
    }

    #[tokio::test]
    async fn test_uncaught_exception_message() {
        let out = run("print('hi')\n1/0").await;
        assert_eq!(out.result, Err("ZeroDivisionError: division by zero".to_string()));
        assert_eq!(out.stdout, "hi\n");

        assert_eq!(value_of("undefined_name").await, "NameError: name 'undefined_name' is not defined");
        assert_eq!(value_of("raise ValueError('bad')").await, "ValueError: bad");
        assert_eq!(value_of("raise KeyError").await, "KeyError");
    }

    #[tokio::test]
    async fn test_syntax_errors_carry_position() {
        let message = value_of("x = (1,\n").await;
        assert!(message.starts_with("SyntaxError: "), "{}", message);
        assert!(message.contains("line "), "{}", message);
        assert_eq!(
            value_of("x = 1\nreturn x").await,
            "SyntaxError: 'return' outside function (line 2, column 1)"
        );
        assert_eq!(
            value_of("def f():\n    break").await,
            "SyntaxError: 'break' outside loop (line 2, column 5)"
        );
    }

    #[tokio::test]
    async fn test_control_flow_statements() {
        let source = "\
total = 0
for i in range(10):
    if i % 2 == 0:
        continue
    if i > 7:
        break
    total += i
total";
        assert_eq!(value_of(source).await, "16");

        let source = "\
n = 0
while True:
    n += 1
    if n == 5:
        break
n";
        assert_eq!(value_of(source).await, "5");
    }

    #[tokio::test]
    async fn test_functions_defaults_keywords_and_closures() {
        let source = "\
def make_adder(n):
    def add(x, scale=1):
        return x * scale + n
    return add
add = make_adder(10)
[add(1), add(2, scale=3), add(scale=2, x=5)]";
        assert_eq!(value_of(source).await, "[11, 16, 20]");
    }

    #[tokio::test]
    async fn test_argument_binding_errors() {
        assert_eq!(
            value_of("def f(a, b):\n    pass\nf(1)").await,
            "TypeError: f() missing 1 required positional argument: 'b'"
        );
        assert_eq!(
            value_of("def f(a):\n    pass\nf(1, 2)").await,
            "TypeError: f() takes 1 positional argument but 2 were given"
        );
        assert_eq!(
            value_of("def f(a):\n    pass\nf(1, a=2)").await,
            "TypeError: f() got multiple values for argument 'a'"
        );
        assert_eq!(
            value_of("def f(a):\n    pass\nf(b=2)").await,
            "TypeError: f() got an unexpected keyword argument 'b'"
        );
    }

    #[tokio::test]
    async fn test_tuple_unpacking_and_containers() {
        let source = "\
a, b = 1, 2
a, b = b, a
d = {'x': [a, b]}
d['y'] = (a,)
for k, v in d.items():
    print(k, v)
d";
        let out = run(source).await;
        assert_eq!(out.stdout, "x [2, 1]\ny (2,)\n");
        assert_eq!(out.result.unwrap().unwrap().repr(), "{'x': [2, 1], 'y': (2,)}");
    }

    #[tokio::test]
    async fn test_string_and_builtin_functions() {
        assert_eq!(value_of("' a b '.strip().upper().split()").await, "['A', 'B']");
        assert_eq!(value_of("sorted([3, 1, 2], reverse=True)").await, "[3, 2, 1]");
        assert_eq!(value_of("sum(range(5)), min(4, 2, 8), max([1, 9])").await, "(10, 2, 9)");
        assert_eq!(value_of("int('12') + len('abc') + round(2.5)").await, "17");
        assert_eq!(value_of("str(1.5) + repr('x')").await, "\"1.5'x'\"");
        assert_eq!(value_of("1 < 2 < 3 and 'b' in 'abc' and None is None").await, "True");
        assert_eq!(value_of("'yes' if [] else 'no'").await, "'no'");
    }

    #[tokio::test]
    async fn test_math_module_and_import_errors() {
        assert_eq!(value_of("import math\nmath.floor(math.pi)").await, "3");
        assert_eq!(value_of("from math import sqrt as root\nroot(16)").await, "4.0");
        assert_eq!(value_of("import numpy").await, "ModuleNotFoundError: No module named 'numpy'");
        assert_eq!(
            value_of("from math import tau").await,
            "ImportError: cannot import name 'tau' from 'math'"
        );
        assert_eq!(value_of("import host").await, "ModuleNotFoundError: No module named 'host'");
    }

    #[tokio::test]
    async fn test_globals_persist_across_cells() {
        let (suspender, _resumer, _events) = suspend::channel();
        let interpreter = Interpreter::new(suspender);
        run_in(&interpreter, "counter = 1\ndef bump():\n    return counter + 1").await;
        let out = run_in(&interpreter, "bump()").await;
        assert_eq!(out.result, Ok(Some(Value::Int(2))));
        assert_eq!(interpreter.global("counter"), Some(Value::Int(1)));
    }

    #[tokio::test]
    async fn test_await_input_suspends_until_resumed() {
        let (suspender, resumer, mut events) = suspend::channel();
        let interpreter = Interpreter::new(suspender);
        let cell = run_in(&interpreter, "name = await input('name: ')\n'hello ' + name");
        let host = async {
            let event = events.recv().await.unwrap();
            assert_eq!(event.prompt, "name: ");
            assert_eq!(event.cell, "test");
            resumer.resume(event.id, "Ada").unwrap();
        };
        let (out, ()) = tokio::join!(cell, host);
        assert_eq!(out.result, Ok(Some(Value::str("hello Ada"))));
        assert_eq!(out.stdout, "");
        assert_eq!(interpreter.global("name"), Some(Value::str("Ada")));
    }

    #[tokio::test]
    async fn test_async_def_runs_when_awaited() {
        let source = "\
async def ask(q):
    return (await input(q)).upper()
answer = ask('q? ')
print('before')
await answer";
        let (suspender, resumer, mut events) = suspend::channel();
        let interpreter = Interpreter::new(suspender);
        let host = async {
            let event = events.recv().await.unwrap();
            resumer.resume(event.id, "yes").unwrap();
        };
        let (out, ()) = tokio::join!(run_in(&interpreter, source), host);
        assert_eq!(out.stdout, "before\n");
        assert_eq!(out.result, Ok(Some(Value::str("YES"))));
    }

    #[tokio::test]
    async fn test_await_errors() {
        assert_eq!(
            value_of("await 1").await,
            "TypeError: object int can't be used in 'await' expression"
        );
        assert_eq!(
            value_of("async def f():\n    return 1\nc = f()\nawait c\nawait c").await,
            "RuntimeError: cannot reuse already awaited coroutine"
        );
    }

    #[tokio::test]
    async fn test_dropped_host_raises_eof() {
        let (suspender, resumer, events) = suspend::channel();
        drop(events);
        drop(resumer);
        let out = run_in(&Interpreter::new(suspender), "await input()").await;
        let message = out.result.unwrap_err();
        assert!(message.starts_with(ExceptionKind::EOFError.name()), "{}", message);
    }

    #[tokio::test]
    async fn test_runtime_limits_raise_exceptions() {
        assert_eq!(
            value_of("x = []\nx.append(x)\ny = []\ny.append(y)\nx == y").await,
            "RecursionError: maximum recursion depth exceeded in comparison"
        );
        assert_eq!(value_of("x = []\nx.append(x)\nx == x").await, "True");
        assert_eq!(value_of("[1] * 1000000000000").await, "MemoryError");
        assert_eq!(value_of("'ab' * 4611686018427387904").await, "MemoryError");
        assert_eq!(
            value_of("len(range(-(2**62) * 2, 2**62 - 1 + 2**62))").await,
            "OverflowError: Python int too large to convert to C ssize_t"
        );
    }

    #[tokio::test]
    async fn test_deeply_nested_cell_is_a_syntax_error() {
        let message = value_of(&format!("x = {}1", "-".repeat(100_000))).await;
        assert!(
            message.starts_with("SyntaxError: expression is too deeply nested"),
            "{}",
            message
        );
        assert_eq!(value_of(&format!("{}1", "-".repeat(100))).await, "1");
    }

    #[tokio::test]
    async fn test_numeric_equality_does_not_round() {
        assert_eq!(value_of("2**53 + 1 == float(2**53)").await, "False");
        assert_eq!(value_of("2**53 + 1 > float(2**53)").await, "True");
        assert_eq!(value_of("{1: 'a', 1.0: 'b', True: 'c'}").await, "{1: 'c'}");
    }

    #[tokio::test]
    async fn test_for_loop_visits_items_appended_during_iteration() {
        let source = "\
items = [1, 2]
seen = []
for x in items:
    seen.append(x)
    if len(items) < 4:
        items.append(x * 10)
seen";
        assert_eq!(value_of(source).await, "[1, 2, 10, 20]");
    }

    #[test]
    fn test_recursion_limit() {
        // Deep recursion needs more stack than the default test thread has.
        let handle = std::thread::Builder::new()
            .stack_size(64 * 1024 * 1024)
            .spawn(|| {
                let runtime = tokio::runtime::Builder::new_current_thread()
                    .build()
                    .unwrap();
                runtime.block_on(value_of("def f(n):\n    return f(n + 1)\nf(0)"))
            })
            .unwrap();
        assert_eq!(
            handle.join().unwrap(),
            "RecursionError: maximum recursion depth exceeded"
        );
    }

    struct Recorder(RefCell<Vec<String>>);

    impl HostChannel for Recorder {
        fn send_text(&self, text: &str) {
            self.0.borrow_mut().push(format!("text:{}", text));
        }

        fn send_image(&self, png_base64: &str) {
            self.0.borrow_mut().push(format!("image:{}", png_base64));
        }
    }

    #[tokio::test]
    async fn test_host_module_bypasses_capture() {
        let recorder = Rc::new(Recorder(RefCell::new(Vec::new())));
        let (suspender, _resumer, _events) = suspend::channel();
        let interpreter = Interpreter::new(suspender).with_host(recorder.clone());
        let out = run_in(&interpreter, "import host\nhost.text('hi')\nhost.image('iVBOR')").await;
        assert_eq!(out.result, Ok(None));
        assert_eq!(out.stdout, "");
        assert_eq!(*recorder.0.borrow(), vec!["text:hi", "image:iVBOR"]);
    }
}
