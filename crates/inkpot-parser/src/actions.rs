//! Node constructors used by the grammar's actions.

use inkpot_lexer::Token;

use crate::adapter::GrammarError;
use crate::ast::*;

pub type ActionResult<T> = Result<T, lalrpop_util::ParseError<usize, Token, GrammarError>>;

/// A call argument before positional and keyword arguments are separated.
pub enum Argument {
    Positional(Expr),
    Keyword(Keyword),
}

fn user_error<T>(message: impl Into<String>, l: usize, r: usize) -> ActionResult<T> {
    Err(lalrpop_util::ParseError::User {
        error: GrammarError::new(message, l, r),
    })
}

/// Deepest expression a cell may contain.
pub const MAX_EXPR_NESTING: u32 = 200;

/// Deepest statement tree, expressions included, a cell may contain.
pub const MAX_STMT_NESTING: u32 = 400;

pub fn expr(kind: ExprKind, l: usize, r: usize) -> ActionResult<Expr> {
    let expr = Expr::new(kind, Location::new(l, r));
    if expr.nesting() > MAX_EXPR_NESTING {
        return user_error("expression is too deeply nested", l, r);
    }
    Ok(expr)
}

pub fn stmt(kind: StmtKind, l: usize, r: usize) -> ActionResult<Stmt> {
    let stmt = Stmt::new(kind, Location::new(l, r));
    if stmt.nesting() > MAX_STMT_NESTING {
        return user_error("too many statically nested blocks", l, r);
    }
    Ok(stmt)
}

pub fn binary(left: Expr, op: BinOp, right: Expr, l: usize, r: usize) -> ActionResult<Expr> {
    expr(
        ExprKind::Binary {
            left: Box::new(left),
            op,
            right: Box::new(right),
        },
        l,
        r,
    )
}

pub fn unary(op: UnaryOp, operand: Expr, l: usize, r: usize) -> ActionResult<Expr> {
    expr(
        ExprKind::Unary {
            op,
            operand: Box::new(operand),
        },
        l,
        r,
    )
}

pub fn logical(op: BoolOp, left: Expr, right: Expr, l: usize, r: usize) -> ActionResult<Expr> {
    expr(
        ExprKind::Logical {
            op,
            left: Box::new(left),
            right: Box::new(right),
        },
        l,
        r,
    )
}

pub fn compare(left: Expr, rest: Vec<(CmpOp, Expr)>, l: usize, r: usize) -> ActionResult<Expr> {
    let (ops, comparators) = rest.into_iter().unzip();
    expr(
        ExprKind::Compare {
            left: Box::new(left),
            ops,
            comparators,
        },
        l,
        r,
    )
}

pub fn tuple(first: Expr, rest: Vec<Expr>, l: usize, r: usize) -> ActionResult<Expr> {
    let mut items = vec![first];
    items.extend(rest);
    expr(ExprKind::Tuple(items), l, r)
}

pub fn keyword(target: Expr, value: Expr, l: usize, r: usize) -> ActionResult<Argument> {
    match target.kind {
        ExprKind::Name(name) => Ok(Argument::Keyword(Keyword { name, value })),
        _ => user_error(
            "expression cannot contain assignment, perhaps you meant \"==\"?",
            l,
            r,
        ),
    }
}

pub fn call(func: Expr, arguments: Vec<Argument>, l: usize, r: usize) -> ActionResult<Expr> {
    let mut args = Vec::new();
    let mut keywords: Vec<Keyword> = Vec::new();
    for argument in arguments {
        match argument {
            Argument::Positional(arg) => {
                if !keywords.is_empty() {
                    return user_error("positional argument follows keyword argument", l, r);
                }
                args.push(arg);
            }
            Argument::Keyword(kw) => {
                if keywords.iter().any(|k| k.name == kw.name) {
                    return user_error(format!("keyword argument repeated: {}", kw.name), l, r);
                }
                keywords.push(kw);
            }
        }
    }
    expr(
        ExprKind::Call {
            func: Box::new(func),
            args,
            keywords,
        },
        l,
        r,
    )
}

fn check_target(target: &Expr) -> Result<(), String> {
    match &target.kind {
        ExprKind::Name(_) | ExprKind::Attribute { .. } | ExprKind::Subscript { .. } => Ok(()),
        ExprKind::Tuple(items) | ExprKind::List(items) => items.iter().try_for_each(check_target),
        _ => Err(format!("cannot assign to {}", target.describe())),
    }
}

/// Build an expression statement or a (possibly chained) assignment from
/// `first = rest[0] = ... = rest[n-1]`.
pub fn assignment(first: Expr, mut rest: Vec<Expr>, l: usize, r: usize) -> ActionResult<Stmt> {
    let Some(value) = rest.pop() else {
        return stmt(StmtKind::Expr(first), l, r);
    };
    let mut targets = vec![first];
    targets.extend(rest);
    for target in &targets {
        if let Err(message) = check_target(target) {
            let (start, end) = target.location.span().unwrap_or((l, r));
            return user_error(message, start, end);
        }
    }
    stmt(StmtKind::Assign { targets, value }, l, r)
}

pub fn aug_assignment(target: Expr, op: BinOp, value: Expr, l: usize, r: usize) -> ActionResult<Stmt> {
    match target.kind {
        ExprKind::Name(_) | ExprKind::Attribute { .. } | ExprKind::Subscript { .. } => {
            stmt(StmtKind::AugAssign { target, op, value }, l, r)
        }
        _ => user_error(
            format!("'{}' is an illegal expression for augmented assignment", target.describe()),
            l,
            r,
        ),
    }
}

/// An `elif` clause: start, test, body, end.
pub type ElifClause = (usize, Expr, Vec<Stmt>, usize);

/// Fold `elif` clauses into nested `If` statements in `orelse`.
pub fn if_chain(
    test: Expr,
    body: Vec<Stmt>,
    elifs: Vec<ElifClause>,
    orelse: Option<Vec<Stmt>>,
    l: usize,
    r: usize,
) -> ActionResult<Stmt> {
    let mut orelse = orelse.unwrap_or_default();
    for (el, test, body, er) in elifs.into_iter().rev() {
        orelse = vec![stmt(StmtKind::If { test, body, orelse }, el, er)?];
    }
    stmt(StmtKind::If { test, body, orelse }, l, r)
}

pub fn dotted_name(first: String, rest: Vec<String>) -> String {
    std::iter::once(first).chain(rest).collect::<Vec<_>>().join(".")
}
