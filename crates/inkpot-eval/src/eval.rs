//! Tree-walking evaluation of statements and expressions.
//!
//! Evaluation is async so that `await input(...)` can suspend the whole cell
//! while the host collects a value. Statement and expression dispatch return
//! boxed futures, which keeps the future types finite across recursive calls
//! and keeps each nested frame small.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use futures_util::future::{self, FutureExt, LocalBoxFuture};
use inkpot_parser::ast::{Alias, BinOp, BoolOp, Expr, ExprKind, Module, Stmt, StmtKind};

use crate::builtins::{self, CallArgs};
use crate::exception::{EvalResult, Exception, ExceptionKind};
use crate::host::HostChannel;
use crate::methods;
use crate::modules;
use crate::ops;
use crate::output::OutputTarget;
use crate::scope::Scope;
use crate::suspend::Suspender;
use crate::value::{Builtin, Coroutine, CoroutineState, Dict, Function, ParamSpec, Value};

/// Deepest call nesting allowed before `RecursionError`.
pub const MAX_DEPTH: usize = 200;

/// State shared by every frame of one cell's evaluation.
pub struct Env {
    pub output: OutputTarget,
    /// Id of the cell being evaluated, reported with suspensions.
    pub cell: String,
    pub suspender: Suspender,
    pub host: Option<Rc<dyn HostChannel>>,
    /// Imported modules, shared across cells.
    pub modules: Rc<RefCell<HashMap<String, Value>>>,
}

/// One frame: the environment, the scope names resolve in, and call depth.
#[derive(Clone)]
pub struct Context {
    pub env: Rc<Env>,
    pub scope: Rc<Scope>,
    pub depth: usize,
}

impl Context {
    pub fn new(env: Rc<Env>, scope: Rc<Scope>) -> Self {
        Self {
            env,
            scope,
            depth: 0,
        }
    }
}

/// How a statement finished.
pub enum Flow {
    Normal,
    Return(Value),
    Break,
    Continue,
}

/// Run a cell. The result is the value of the final statement when it is an
/// expression statement whose value is not `None`.
pub async fn eval_module(ctx: &Context, module: &Module) -> EvalResult<Option<Value>> {
    let mut last = None;
    for stmt in &module.body {
        last = None;
        if let StmtKind::Expr(expr) = &stmt.kind {
            last = Some(eval_expr(ctx, expr).await?);
            continue;
        }
        match exec_stmt(ctx, stmt).await? {
            Flow::Normal => {}
            Flow::Return(_) => return Err(syntax_error("'return' outside function")),
            Flow::Break => return Err(syntax_error("'break' outside loop")),
            Flow::Continue => return Err(syntax_error("'continue' not properly in loop")),
        }
    }
    Ok(last.filter(|value| !value.is_none()))
}

fn syntax_error(message: &str) -> Exception {
    Exception::new(ExceptionKind::SyntaxError, message)
}

pub async fn exec_block(ctx: &Context, body: &[Stmt]) -> EvalResult<Flow> {
    for stmt in body {
        match exec_stmt(ctx, stmt).await? {
            Flow::Normal => {}
            flow => return Ok(flow),
        }
    }
    Ok(Flow::Normal)
}

pub fn exec_stmt<'a>(ctx: &'a Context, stmt: &'a Stmt) -> LocalBoxFuture<'a, EvalResult<Flow>> {
    match &stmt.kind {
        StmtKind::Expr(expr) => async move {
            eval_expr(ctx, expr).await?;
            Ok(Flow::Normal)
        }
        .boxed_local(),
        StmtKind::Assign { targets, value } => async move {
            let value = eval_expr(ctx, value).await?;
            for target in targets {
                assign(ctx, target, value.clone()).await?;
            }
            Ok(Flow::Normal)
        }
        .boxed_local(),
        StmtKind::AugAssign { target, op, value } => async move {
            exec_aug_assign(ctx, target, *op, value).await?;
            Ok(Flow::Normal)
        }
        .boxed_local(),
        StmtKind::If { test, body, orelse } => async move {
            if eval_expr(ctx, test).await?.truthy() {
                exec_block(ctx, body).await
            } else {
                exec_block(ctx, orelse).await
            }
        }
        .boxed_local(),
        StmtKind::While { test, body } => async move {
            while eval_expr(ctx, test).await?.truthy() {
                match exec_block(ctx, body).await? {
                    Flow::Break => break,
                    Flow::Normal | Flow::Continue => {}
                    flow @ Flow::Return(_) => return Ok(flow),
                }
            }
            Ok(Flow::Normal)
        }
        .boxed_local(),
        StmtKind::For { target, iter, body } => async move {
            let iterable = eval_expr(ctx, iter).await?;
            for item in ops::iterate(&iterable)? {
                assign(ctx, target, item).await?;
                match exec_block(ctx, body).await? {
                    Flow::Break => break,
                    Flow::Normal | Flow::Continue => {}
                    flow @ Flow::Return(_) => return Ok(flow),
                }
            }
            Ok(Flow::Normal)
        }
        .boxed_local(),
        StmtKind::FunctionDef {
            name,
            params,
            body,
            is_async,
        } => async move {
            let mut specs = Vec::with_capacity(params.len());
            for param in params {
                let default = match &param.default {
                    Some(default) => Some(eval_expr(ctx, default).await?),
                    None => None,
                };
                specs.push(ParamSpec {
                    name: param.name.clone(),
                    default,
                });
            }
            let function = Function {
                name: name.clone(),
                params: specs,
                body: Rc::new(body.clone()),
                closure: ctx.scope.clone(),
                is_async: *is_async,
            };
            ctx.scope.set(name.clone(), Value::Function(Rc::new(function)));
            Ok(Flow::Normal)
        }
        .boxed_local(),
        StmtKind::Return(value) => async move {
            let value = match value {
                Some(value) => eval_expr(ctx, value).await?,
                None => Value::None,
            };
            Ok(Flow::Return(value))
        }
        .boxed_local(),
        StmtKind::Raise(value) => async move {
            let Some(value) = value else {
                return Err(Exception::new(
                    ExceptionKind::RuntimeError,
                    "No active exception to reraise",
                ));
            };
            Err(match eval_expr(ctx, value).await? {
                Value::Exception(exc) => (*exc).clone(),
                Value::Builtin(Builtin::Exception(kind)) => Exception::new(kind, ""),
                _ => Exception::type_error("exceptions must derive from BaseException"),
            })
        }
        .boxed_local(),
        StmtKind::Import(aliases) => future::ready(exec_import(ctx, aliases)).boxed_local(),
        StmtKind::ImportFrom { module, names } => {
            future::ready(exec_import_from(ctx, module, names)).boxed_local()
        }
        StmtKind::Pass => future::ready(Ok(Flow::Normal)).boxed_local(),
        StmtKind::Break => future::ready(Ok(Flow::Break)).boxed_local(),
        StmtKind::Continue => future::ready(Ok(Flow::Continue)).boxed_local(),
    }
}

fn exec_import(ctx: &Context, aliases: &[Alias]) -> EvalResult<Flow> {
    for alias in aliases {
        let module = modules::load(&ctx.env, &alias.name)?;
        let binding = alias.asname.as_deref().unwrap_or(&alias.name);
        ctx.scope.set(binding, module);
    }
    Ok(Flow::Normal)
}

fn exec_import_from(ctx: &Context, module: &str, names: &[Alias]) -> EvalResult<Flow> {
    let loaded = modules::load(&ctx.env, module)?;
    for alias in names {
        let value = modules::import_name(&loaded, module, &alias.name)?;
        let binding = alias.asname.as_deref().unwrap_or(&alias.name);
        ctx.scope.set(binding, value);
    }
    Ok(Flow::Normal)
}

/// Bind `value` to an assignment target.
fn assign<'a>(ctx: &'a Context, target: &'a Expr, value: Value) -> LocalBoxFuture<'a, EvalResult<()>> {
    match &target.kind {
        ExprKind::Name(name) => {
            ctx.scope.set(name.clone(), value);
            future::ready(Ok(())).boxed_local()
        }
        ExprKind::Tuple(targets) | ExprKind::List(targets) => async move {
            let items = ops::unpack(&value, targets.len())?;
            for (target, item) in targets.iter().zip(items) {
                assign(ctx, target, item).await?;
            }
            Ok(())
        }
        .boxed_local(),
        ExprKind::Subscript { value: container, index } => async move {
            let container = eval_expr(ctx, container).await?;
            let index = eval_expr(ctx, index).await?;
            ops::set_item(&container, index, value)
        }
        .boxed_local(),
        ExprKind::Attribute { value: object, attr } => async move {
            let object = eval_expr(ctx, object).await?;
            ops::set_attr(&object, attr, value)
        }
        .boxed_local(),
        _ => future::ready(Err(syntax_error(&format!(
            "cannot assign to {}",
            target.describe()
        ))))
        .boxed_local(),
    }
}

async fn exec_aug_assign(
    ctx: &Context,
    target: &Expr,
    op: BinOp,
    value: &Expr,
) -> EvalResult<()> {
    match &target.kind {
        ExprKind::Name(name) => {
            let current = lookup_name(ctx, name)?;
            let value = eval_expr(ctx, value).await?;
            ctx.scope.set(name.clone(), ops::augmented(op, &current, &value)?);
            Ok(())
        }
        ExprKind::Subscript {
            value: container,
            index,
        } => {
            let container = eval_expr(ctx, container).await?;
            let index = eval_expr(ctx, index).await?;
            let current = ops::get_item(&container, &index)?;
            let value = eval_expr(ctx, value).await?;
            ops::set_item(&container, index, ops::augmented(op, &current, &value)?)
        }
        ExprKind::Attribute { value: object, attr } => {
            let object = eval_expr(ctx, object).await?;
            let current = ops::get_attr(&object, attr)?;
            let value = eval_expr(ctx, value).await?;
            ops::set_attr(&object, attr, ops::augmented(op, &current, &value)?)
        }
        _ => Err(syntax_error(&format!(
            "'{}' is an illegal expression for augmented assignment",
            target.describe()
        ))),
    }
}

fn lookup_name(ctx: &Context, name: &str) -> EvalResult<Value> {
    ctx.scope
        .get(name)
        .or_else(|| builtins::lookup(name))
        .ok_or_else(|| {
            Exception::new(
                ExceptionKind::NameError,
                format!("name '{}' is not defined", name),
            )
        })
}

pub fn eval_expr<'a>(ctx: &'a Context, expr: &'a Expr) -> LocalBoxFuture<'a, EvalResult<Value>> {
    match &expr.kind {
        ExprKind::Name(name) => future::ready(lookup_name(ctx, name)).boxed_local(),
        ExprKind::Int(n) => future::ready(Ok(Value::Int(*n))).boxed_local(),
        ExprKind::Float(f) => future::ready(Ok(Value::Float(*f))).boxed_local(),
        ExprKind::Str(s) => future::ready(Ok(Value::str(s))).boxed_local(),
        ExprKind::Bool(b) => future::ready(Ok(Value::Bool(*b))).boxed_local(),
        ExprKind::NoneLit => future::ready(Ok(Value::None)).boxed_local(),
        ExprKind::List(items) => async move { Ok(Value::list(eval_all(ctx, items).await?)) }.boxed_local(),
        ExprKind::Tuple(items) => async move { Ok(Value::tuple(eval_all(ctx, items).await?)) }.boxed_local(),
        ExprKind::Dict(entries) => async move {
            let mut dict = Dict::new();
            for (key, value) in entries {
                let key = eval_expr(ctx, key).await?;
                let value = eval_expr(ctx, value).await?;
                dict.insert(key, value)?;
            }
            Ok(Value::dict(dict))
        }
        .boxed_local(),
        ExprKind::Binary { left, op, right } => async move {
            let left = eval_expr(ctx, left).await?;
            let right = eval_expr(ctx, right).await?;
            ops::binary(*op, &left, &right)
        }
        .boxed_local(),
        ExprKind::Unary { op, operand } => async move {
            let operand = eval_expr(ctx, operand).await?;
            ops::unary(*op, &operand)
        }
        .boxed_local(),
        ExprKind::Logical { op, left, right } => async move {
            let left = eval_expr(ctx, left).await?;
            match (op, left.truthy()) {
                (BoolOp::And, false) | (BoolOp::Or, true) => Ok(left),
                _ => eval_expr(ctx, right).await,
            }
        }
        .boxed_local(),
        ExprKind::Compare {
            left,
            ops: operators,
            comparators,
        } => async move {
            let mut left = eval_expr(ctx, left).await?;
            for (op, comparator) in operators.iter().zip(comparators) {
                let right = eval_expr(ctx, comparator).await?;
                if !ops::compare(*op, &left, &right)? {
                    return Ok(Value::Bool(false));
                }
                left = right;
            }
            Ok(Value::Bool(true))
        }
        .boxed_local(),
        ExprKind::IfExp { test, body, orelse } => async move {
            if eval_expr(ctx, test).await?.truthy() {
                eval_expr(ctx, body).await
            } else {
                eval_expr(ctx, orelse).await
            }
        }
        .boxed_local(),
        ExprKind::Call {
            func,
            args,
            keywords,
        } => async move {
            let callee = eval_expr(ctx, func).await?;
            let positional = eval_all(ctx, args).await?;
            let mut named = Vec::with_capacity(keywords.len());
            for keyword in keywords {
                named.push((keyword.name.clone(), eval_expr(ctx, &keyword.value).await?));
            }
            call_value(ctx, callee, CallArgs::new(positional, named)).await
        }
        .boxed_local(),
        ExprKind::Attribute { value, attr } => async move {
            let value = eval_expr(ctx, value).await?;
            ops::get_attr(&value, attr)
        }
        .boxed_local(),
        ExprKind::Subscript { value, index } => async move {
            let value = eval_expr(ctx, value).await?;
            let index = eval_expr(ctx, index).await?;
            ops::get_item(&value, &index)
        }
        .boxed_local(),
        ExprKind::Await(value) => async move {
            let value = eval_expr(ctx, value).await?;
            await_value(ctx, value).await
        }
        .boxed_local(),
    }
}

async fn eval_all(ctx: &Context, exprs: &[Expr]) -> EvalResult<Vec<Value>> {
    let mut values = Vec::with_capacity(exprs.len());
    for expr in exprs {
        values.push(eval_expr(ctx, expr).await?);
    }
    Ok(values)
}

pub fn call_value<'a>(ctx: &'a Context, callee: Value, args: CallArgs) -> LocalBoxFuture<'a, EvalResult<Value>> {
    match callee {
        Value::Builtin(builtin) => future::ready(builtins::call(&ctx.env, builtin, args)).boxed_local(),
        Value::Method(method) => future::ready(methods::call(
            &ctx.env.output,
            &method.receiver,
            &method.name,
            args,
        ))
        .boxed_local(),
        Value::Function(function) => call_function(ctx, function, args).boxed_local(),
        other => future::ready(Err(Exception::type_error(format!(
            "'{}' object is not callable",
            other.type_name()
        ))))
        .boxed_local(),
    }
}

async fn call_function(ctx: &Context, function: Rc<Function>, args: CallArgs) -> EvalResult<Value> {
    let frame = enter_frame(ctx, &function, args)?;
    if function.is_async {
        let name = function.name.clone();
        let body = run_body(frame, function).boxed_local();
        return Ok(Value::Coroutine(Rc::new(Coroutine::running(name, body))));
    }
    run_body(frame, function).await
}

async fn run_body(frame: Context, function: Rc<Function>) -> EvalResult<Value> {
    match exec_block(&frame, &function.body).await? {
        Flow::Return(value) => Ok(value),
        Flow::Normal => Ok(Value::None),
        Flow::Break => Err(syntax_error("'break' outside loop")),
        Flow::Continue => Err(syntax_error("'continue' not properly in loop")),
    }
}

/// Create the frame for a call, binding arguments to parameters.
fn enter_frame(ctx: &Context, function: &Function, args: CallArgs) -> EvalResult<Context> {
    if ctx.depth >= MAX_DEPTH {
        return Err(Exception::new(
            ExceptionKind::RecursionError,
            "maximum recursion depth exceeded",
        ));
    }

    let name = &function.name;
    let params = &function.params;
    if args.positional.len() > params.len() {
        let required = params.iter().filter(|p| p.default.is_none()).count();
        let takes = if required == params.len() {
            format!(
                "{} positional argument{}",
                params.len(),
                if params.len() == 1 { "" } else { "s" }
            )
        } else {
            format!("from {} to {} positional arguments", required, params.len())
        };
        let given = args.positional.len();
        return Err(Exception::type_error(format!(
            "{}() takes {} but {} {} given",
            name,
            takes,
            given,
            if given == 1 { "was" } else { "were" }
        )));
    }

    let mut bound: Vec<Option<Value>> = args.positional.into_iter().map(Some).collect();
    bound.resize(params.len(), None);
    for (keyword, value) in args.keywords {
        let Some(index) = params.iter().position(|p| p.name == keyword) else {
            return Err(Exception::type_error(format!(
                "{}() got an unexpected keyword argument '{}'",
                name, keyword
            )));
        };
        if bound[index].is_some() {
            return Err(Exception::type_error(format!(
                "{}() got multiple values for argument '{}'",
                name, keyword
            )));
        }
        bound[index] = Some(value);
    }

    let scope = Scope::child(function.closure.clone());
    let mut missing = Vec::new();
    for (param, value) in params.iter().zip(bound) {
        match value.or_else(|| param.default.clone()) {
            Some(value) => scope.set(param.name.clone(), value),
            None => missing.push(format!("'{}'", param.name)),
        }
    }
    if !missing.is_empty() {
        return Err(Exception::type_error(format!(
            "{}() missing {} required positional argument{}: {}",
            name,
            missing.len(),
            if missing.len() == 1 { "" } else { "s" },
            join_names(&missing)
        )));
    }

    Ok(Context {
        env: ctx.env.clone(),
        scope,
        depth: ctx.depth + 1,
    })
}

/// `'a'`, `'a' and 'b'`, `'a', 'b', and 'c'`
fn join_names(names: &[String]) -> String {
    match names {
        [] => String::new(),
        [one] => one.clone(),
        [first, second] => format!("{} and {}", first, second),
        [rest @ .., last] => format!("{}, and {}", rest.join(", "), last),
    }
}

async fn await_value(ctx: &Context, value: Value) -> EvalResult<Value> {
    let Value::Coroutine(coroutine) = &value else {
        return Err(Exception::type_error(format!(
            "object {} can't be used in 'await' expression",
            value.type_name()
        )));
    };
    match coroutine.take() {
        CoroutineState::Input { prompt } => ctx
            .env
            .suspender
            .suspend(&ctx.env.cell, &prompt)
            .await
            .map(Value::str)
            .map_err(|err| Exception::new(ExceptionKind::EOFError, err.to_string())),
        CoroutineState::Running(body) => body.await,
        CoroutineState::Done => Err(Exception::new(
            ExceptionKind::RuntimeError,
            "cannot reuse already awaited coroutine",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_names() {
        let names = |n: &[&str]| n.iter().map(|s| format!("'{}'", s)).collect::<Vec<_>>();
        assert_eq!(join_names(&names(&["a"])), "'a'");
        assert_eq!(join_names(&names(&["a", "b"])), "'a' and 'b'");
        assert_eq!(join_names(&names(&["a", "b", "c"])), "'a', 'b', and 'c'");
    }
}
