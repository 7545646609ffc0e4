//! Tree traversal over a `Module`.
//!
//! Implementors override the hooks they care about and call the matching
//! `walk_*` function to keep descending.

use crate::ast::{Expr, Module, Stmt};

pub trait Visitor {
    fn visit_stmt(&mut self, stmt: &Stmt) {
        walk_stmt(self, stmt);
    }

    fn visit_expr(&mut self, expr: &Expr) {
        walk_expr(self, expr);
    }
}

pub fn walk_module<V: Visitor + ?Sized>(visitor: &mut V, module: &Module) {
    for stmt in &module.body {
        visitor.visit_stmt(stmt);
    }
}

pub fn walk_stmt<V: Visitor + ?Sized>(visitor: &mut V, stmt: &Stmt) {
    for expr in stmt.exprs() {
        visitor.visit_expr(expr);
    }
    for child in stmt.stmts() {
        visitor.visit_stmt(child);
    }
}

pub fn walk_expr<V: Visitor + ?Sized>(visitor: &mut V, expr: &Expr) {
    for child in expr.children() {
        visitor.visit_expr(child);
    }
}

/// Mutable counterpart of `Visitor`.
pub trait VisitorMut {
    fn visit_stmt_mut(&mut self, stmt: &mut Stmt) {
        walk_stmt_mut(self, stmt);
    }

    fn visit_expr_mut(&mut self, expr: &mut Expr) {
        walk_expr_mut(self, expr);
    }
}

pub fn walk_module_mut<V: VisitorMut + ?Sized>(visitor: &mut V, module: &mut Module) {
    for stmt in &mut module.body {
        visitor.visit_stmt_mut(stmt);
    }
}

pub fn walk_stmt_mut<V: VisitorMut + ?Sized>(visitor: &mut V, stmt: &mut Stmt) {
    for expr in stmt.exprs_mut() {
        visitor.visit_expr_mut(expr);
    }
    for child in stmt.stmts_mut() {
        visitor.visit_stmt_mut(child);
    }
}

pub fn walk_expr_mut<V: VisitorMut + ?Sized>(visitor: &mut V, expr: &mut Expr) {
    for child in expr.children_mut() {
        visitor.visit_expr_mut(child);
    }
}
