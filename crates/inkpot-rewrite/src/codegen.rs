/// Source generation
///
/// Turns a syntax tree back into canonical inkpot source: four-space
/// indentation, one statement per line, repr-style literals, and only the
/// parentheses that precedence requires. Output never ends in a newline.

use inkpot_parser::ast::*;
use inkpot_parser::literal::{float_repr, string_repr};
use crate::error::Result;
use std::fmt::Write as _;

/// Binding strength of an expression position, loosest first.
type Precedence = u8;

const TUPLE: Precedence = 0;
const TEST: Precedence = 1;
const OR: Precedence = 2;
const AND: Precedence = 3;
const NOT: Precedence = 4;
const CMP: Precedence = 5;
const ARITH: Precedence = 6;
const TERM: Precedence = 7;
const FACTOR: Precedence = 8;
const POWER: Precedence = 9;
const AWAIT: Precedence = 10;
const ATOM: Precedence = 11;

/// Inkpot source generator
pub struct SourceGenerator {
    /// Indentation level for pretty-printing
    indent: usize,
    /// Output buffer
    output: String,
}

impl Default for SourceGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceGenerator {
    pub fn new() -> Self {
        Self {
            indent: 0,
            output: String::new(),
        }
    }

    /// Generate source for a whole module
    pub fn generate(&mut self, module: &Module) -> Result<String> {
        self.generate_block(&module.body)?;
        Ok(std::mem::take(&mut self.output))
    }

    fn generate_block(&mut self, body: &[Stmt]) -> Result<()> {
        for stmt in body {
            self.start_line();
            self.generate_statement(stmt)?;
        }
        Ok(())
    }

    fn generate_suite(&mut self, body: &[Stmt]) -> Result<()> {
        self.output.push(':');
        self.indent += 1;
        self.generate_block(body)?;
        self.indent -= 1;
        Ok(())
    }

    fn generate_statement(&mut self, stmt: &Stmt) -> Result<()> {
        match &stmt.kind {
            StmtKind::Expr(expr) => self.generate_expr(expr, TEST)?,
            StmtKind::Assign { targets, value } => {
                for target in targets {
                    self.generate_expr(target, TUPLE)?;
                    self.output.push_str(" = ");
                }
                self.generate_expr(value, TEST)?;
            }
            StmtKind::AugAssign { target, op, value } => {
                self.generate_expr(target, TUPLE)?;
                write!(self.output, " {}= ", op.symbol())?;
                self.generate_expr(value, TEST)?;
            }
            StmtKind::If { test, body, orelse } => self.generate_if("if", test, body, orelse)?,
            StmtKind::While { test, body } => {
                self.output.push_str("while ");
                self.generate_expr(test, TEST)?;
                self.generate_suite(body)?;
            }
            StmtKind::For { target, iter, body } => {
                self.output.push_str("for ");
                self.generate_expr(target, TUPLE)?;
                self.output.push_str(" in ");
                self.generate_expr(iter, TEST)?;
                self.generate_suite(body)?;
            }
            StmtKind::FunctionDef {
                name,
                params,
                body,
                is_async,
            } => {
                if *is_async {
                    self.output.push_str("async ");
                }
                write!(self.output, "def {}(", name)?;
                for (i, param) in params.iter().enumerate() {
                    if i > 0 {
                        self.output.push_str(", ");
                    }
                    self.output.push_str(&param.name);
                    if let Some(default) = &param.default {
                        self.output.push('=');
                        self.generate_expr(default, TEST)?;
                    }
                }
                self.output.push(')');
                self.generate_suite(body)?;
            }
            StmtKind::Return(value) => self.generate_keyword_statement("return", value.as_ref())?,
            StmtKind::Raise(exc) => self.generate_keyword_statement("raise", exc.as_ref())?,
            StmtKind::Import(names) => {
                self.output.push_str("import ");
                self.generate_aliases(names);
            }
            StmtKind::ImportFrom { module, names } => {
                write!(self.output, "from {} import ", module)?;
                self.generate_aliases(names);
            }
            StmtKind::Pass => self.output.push_str("pass"),
            StmtKind::Break => self.output.push_str("break"),
            StmtKind::Continue => self.output.push_str("continue"),
        }
        Ok(())
    }

    fn generate_if(&mut self, keyword: &str, test: &Expr, body: &[Stmt], orelse: &[Stmt]) -> Result<()> {
        write!(self.output, "{} ", keyword)?;
        self.generate_expr(test, TEST)?;
        self.generate_suite(body)?;

        match orelse {
            [] => {}
            // A lone nested `if` in the else-branch prints as `elif`.
            [Stmt {
                kind: StmtKind::If { test, body, orelse },
                ..
            }] => {
                self.start_line();
                self.generate_if("elif", test, body, orelse)?;
            }
            _ => {
                self.start_line();
                self.output.push_str("else");
                self.generate_suite(orelse)?;
            }
        }
        Ok(())
    }

    fn generate_keyword_statement(&mut self, keyword: &str, value: Option<&Expr>) -> Result<()> {
        self.output.push_str(keyword);
        if let Some(value) = value {
            self.output.push(' ');
            self.generate_expr(value, TEST)?;
        }
        Ok(())
    }

    fn generate_aliases(&mut self, names: &[Alias]) {
        for (i, alias) in names.iter().enumerate() {
            if i > 0 {
                self.output.push_str(", ");
            }
            self.output.push_str(&alias.name);
            if let Some(asname) = &alias.asname {
                self.output.push_str(" as ");
                self.output.push_str(asname);
            }
        }
    }

    /// Generate `expr` in a position that binds at least as tightly as `context`
    fn generate_expr(&mut self, expr: &Expr, context: Precedence) -> Result<()> {
        let own = precedence(expr);
        let parens = own < context;
        if parens {
            self.output.push('(');
        }

        match &expr.kind {
            ExprKind::Name(name) => self.output.push_str(name),
            ExprKind::Int(value) => write!(self.output, "{}", value)?,
            ExprKind::Float(value) => {
                if value.is_infinite() {
                    // Reads back as infinity.
                    self.output.push_str("1e309");
                } else {
                    self.output.push_str(&float_repr(*value));
                }
            }
            ExprKind::Str(value) => self.output.push_str(&string_repr(value)),
            ExprKind::Bool(true) => self.output.push_str("True"),
            ExprKind::Bool(false) => self.output.push_str("False"),
            ExprKind::NoneLit => self.output.push_str("None"),
            ExprKind::List(items) => {
                self.output.push('[');
                self.generate_comma_list(items)?;
                self.output.push(']');
            }
            ExprKind::Tuple(items) => {
                // Brackets come from the precedence check, except for `()`.
                if items.is_empty() && !parens {
                    self.output.push_str("()");
                } else {
                    self.generate_comma_list(items)?;
                    if items.len() == 1 {
                        self.output.push(',');
                    }
                }
            }
            ExprKind::Dict(entries) => {
                self.output.push('{');
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        self.output.push_str(", ");
                    }
                    self.generate_expr(key, TEST)?;
                    self.output.push_str(": ");
                    self.generate_expr(value, TEST)?;
                }
                self.output.push('}');
            }
            ExprKind::Binary { left, op, right } => {
                let (left_context, right_context) = match op {
                    BinOp::Pow => (AWAIT, FACTOR),
                    _ => (own, own + 1),
                };
                self.generate_expr(left, left_context)?;
                write!(self.output, " {} ", op.symbol())?;
                self.generate_expr(right, right_context)?;
            }
            ExprKind::Unary { op, operand } => {
                self.output.push_str(match op {
                    UnaryOp::Neg => "-",
                    UnaryOp::Pos => "+",
                    UnaryOp::Not => "not ",
                });
                self.generate_expr(operand, own)?;
            }
            ExprKind::Logical { op, left, right } => {
                self.generate_expr(left, own)?;
                self.output.push_str(match op {
                    BoolOp::And => " and ",
                    BoolOp::Or => " or ",
                });
                self.generate_expr(right, own + 1)?;
            }
            ExprKind::Compare {
                left,
                ops,
                comparators,
            } => {
                self.generate_expr(left, CMP + 1)?;
                for (op, comparator) in ops.iter().zip(comparators) {
                    write!(self.output, " {} ", op.symbol())?;
                    self.generate_expr(comparator, CMP + 1)?;
                }
            }
            ExprKind::IfExp { test, body, orelse } => {
                self.generate_expr(body, OR)?;
                self.output.push_str(" if ");
                self.generate_expr(test, OR)?;
                self.output.push_str(" else ");
                self.generate_expr(orelse, TEST)?;
            }
            ExprKind::Call {
                func,
                args,
                keywords,
            } => {
                self.generate_expr(func, ATOM)?;
                self.output.push('(');
                self.generate_comma_list(args)?;
                for (i, keyword) in keywords.iter().enumerate() {
                    if i > 0 || !args.is_empty() {
                        self.output.push_str(", ");
                    }
                    write!(self.output, "{}=", keyword.name)?;
                    self.generate_expr(&keyword.value, TEST)?;
                }
                self.output.push(')');
            }
            ExprKind::Attribute { value, attr } => {
                // `1.real` would lex as a float.
                let context = if matches!(value.kind, ExprKind::Int(_)) { ATOM + 1 } else { ATOM };
                self.generate_expr(value, context)?;
                write!(self.output, ".{}", attr)?;
            }
            ExprKind::Subscript { value, index } => {
                self.generate_expr(value, ATOM)?;
                self.output.push('[');
                self.generate_expr(index, TEST)?;
                self.output.push(']');
            }
            ExprKind::Await(value) => {
                self.output.push_str("await ");
                self.generate_expr(value, ATOM)?;
            }
        }

        if parens {
            self.output.push(')');
        }
        Ok(())
    }

    fn generate_comma_list(&mut self, items: &[Expr]) -> Result<()> {
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                self.output.push_str(", ");
            }
            self.generate_expr(item, TEST)?;
        }
        Ok(())
    }

    fn start_line(&mut self) {
        if !self.output.is_empty() {
            self.output.push('\n');
        }
        self.write_indent();
    }

    fn write_indent(&mut self) {
        for _ in 0..self.indent {
            self.output.push_str("    ");
        }
    }
}

fn precedence(expr: &Expr) -> Precedence {
    match &expr.kind {
        ExprKind::Tuple(_) => TUPLE,
        ExprKind::IfExp { .. } => TEST,
        ExprKind::Logical { op: BoolOp::Or, .. } => OR,
        ExprKind::Logical { op: BoolOp::And, .. } => AND,
        ExprKind::Unary { op: UnaryOp::Not, .. } => NOT,
        ExprKind::Compare { .. } => CMP,
        ExprKind::Binary { op, .. } => match op {
            BinOp::Add | BinOp::Sub => ARITH,
            BinOp::Mul | BinOp::Div | BinOp::FloorDiv | BinOp::Mod => TERM,
            BinOp::Pow => POWER,
        },
        ExprKind::Unary { .. } => FACTOR,
        ExprKind::Await(_) => AWAIT,
        _ => ATOM,
    }
}
