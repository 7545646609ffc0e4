//! Parent links for every node of a `Module`.
//!
//! The syntax tree only points downward; transformations that need to know
//! a node's ancestors build a `ParentMap` once and query it by `NodeId`.

use std::collections::HashMap;

use crate::ast::{Expr, ExprKind, Module, NodeId, Stmt};

/// Coarse classification of a node, enough for ancestor queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Stmt,
    Call,
    Await,
    Expr,
}

impl NodeKind {
    fn of(expr: &Expr) -> Self {
        match expr.kind {
            ExprKind::Call { .. } => NodeKind::Call,
            ExprKind::Await(_) => NodeKind::Await,
            _ => NodeKind::Expr,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    parent: Option<NodeId>,
    kind: NodeKind,
}

#[derive(Debug, Default)]
pub struct ParentMap {
    entries: HashMap<NodeId, Entry>,
}

impl ParentMap {
    pub fn build(module: &Module) -> Self {
        let mut map = Self::default();
        for stmt in &module.body {
            map.record_stmt(stmt, None);
        }
        map
    }

    fn record_stmt(&mut self, stmt: &Stmt, parent: Option<NodeId>) {
        self.entries.insert(
            stmt.id,
            Entry {
                parent,
                kind: NodeKind::Stmt,
            },
        );
        for expr in stmt.exprs() {
            self.record_expr(expr, stmt.id);
        }
        for child in stmt.stmts() {
            self.record_stmt(child, Some(stmt.id));
        }
    }

    fn record_expr(&mut self, expr: &Expr, parent: NodeId) {
        self.entries.insert(
            expr.id,
            Entry {
                parent: Some(parent),
                kind: NodeKind::of(expr),
            },
        );
        for child in expr.children() {
            self.record_expr(child, expr.id);
        }
    }

    /// The parent of `id`, or `None` for top-level statements and unknown ids.
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.entries.get(&id).and_then(|entry| entry.parent)
    }

    pub fn kind(&self, id: NodeId) -> Option<NodeKind> {
        self.entries.get(&id).map(|entry| entry.kind)
    }

    /// Whether any proper ancestor of `id` is of the given kind.
    pub fn has_ancestor(&self, id: NodeId, kind: NodeKind) -> bool {
        let mut current = self.parent(id);
        while let Some(node) = current {
            if self.kind(node) == Some(kind) {
                return true;
            }
            current = self.parent(node);
        }
        false
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
