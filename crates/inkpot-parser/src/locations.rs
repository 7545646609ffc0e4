//! Completing the locations of synthesized nodes.
//!
//! A missing start or end is first taken from the node's children (the
//! smallest start and largest end among them), then from the enclosing
//! node. Top-level statements with nothing to borrow from get `0`.

use crate::ast::{Expr, Location, Module, NodeId, Stmt};

pub fn fix_missing_locations(module: &mut Module) {
    let root = Location::new(0, 0);
    for stmt in &mut module.body {
        fix_stmt(stmt, root);
    }
}

/// Ids of nodes whose location is still incomplete, in pre-order.
pub fn missing_locations(module: &Module) -> Vec<NodeId> {
    let mut missing = Vec::new();
    for stmt in &module.body {
        collect_stmt(stmt, &mut missing);
    }
    missing
}

fn fix_stmt(stmt: &mut Stmt, parent: Location) {
    let mut from_children: Vec<Location> = stmt
        .exprs()
        .into_iter()
        .map(covered_expr)
        .collect();
    from_children.extend(stmt.stmts().into_iter().map(covered_stmt));
    fill(&mut stmt.location, &from_children, parent);

    let own = stmt.location;
    for expr in stmt.exprs_mut() {
        fix_expr(expr, own);
    }
    for child in stmt.stmts_mut() {
        fix_stmt(child, own);
    }
}

fn fix_expr(expr: &mut Expr, parent: Location) {
    let from_children: Vec<Location> = expr.children().into_iter().map(covered_expr).collect();
    fill(&mut expr.location, &from_children, parent);

    let own = expr.location;
    for child in expr.children_mut() {
        fix_expr(child, own);
    }
}

fn fill(location: &mut Location, children: &[Location], parent: Location) {
    if location.start.is_none() {
        location.start = children.iter().filter_map(|l| l.start).min().or(parent.start);
    }
    if location.end.is_none() {
        location.end = children.iter().filter_map(|l| l.end).max().or(parent.end);
    }
}

// The span a subtree covers, without mutating it.
fn covered_expr(expr: &Expr) -> Location {
    let children: Vec<Location> = expr.children().into_iter().map(covered_expr).collect();
    covered(expr.location, &children)
}

fn covered_stmt(stmt: &Stmt) -> Location {
    let mut children: Vec<Location> = stmt.exprs().into_iter().map(covered_expr).collect();
    children.extend(stmt.stmts().into_iter().map(covered_stmt));
    covered(stmt.location, &children)
}

fn covered(own: Location, children: &[Location]) -> Location {
    Location {
        start: own.start.or_else(|| children.iter().filter_map(|l| l.start).min()),
        end: own.end.or_else(|| children.iter().filter_map(|l| l.end).max()),
    }
}

fn collect_stmt(stmt: &Stmt, missing: &mut Vec<NodeId>) {
    if !stmt.location.is_complete() {
        missing.push(stmt.id);
    }
    for expr in stmt.exprs() {
        collect_expr(expr, missing);
    }
    for child in stmt.stmts() {
        collect_stmt(child, missing);
    }
}

fn collect_expr(expr: &Expr, missing: &mut Vec<NodeId>) {
    if !expr.location.is_complete() {
        missing.push(expr.id);
    }
    for child in expr.children() {
        collect_expr(child, missing);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{ExprKind, StmtKind};
    use crate::parse;

    #[test]
    fn test_parsed_module_has_no_missing_locations() {
        let module = parse("x = input('a')\nif x:\n    print(x)\n").unwrap();
        assert!(missing_locations(&module).is_empty());
    }

    #[test]
    fn test_synthesized_wrapper_takes_end_from_child() {
        let mut module = parse("input('a')\n").unwrap();
        let id = module.fresh_id();
        let StmtKind::Expr(value) = &mut module.body[0].kind else {
            panic!("expected expression statement");
        };
        let call = std::mem::replace(value, Expr::new(ExprKind::NoneLit, Location::default()));
        let start = call.location.start;
        let end = call.location.end;
        let mut wrapper = Expr::new(ExprKind::Await(Box::new(call)), Location::starting_at(start));
        wrapper.id = id;
        *value = wrapper;

        assert_eq!(missing_locations(&module), vec![id]);
        fix_missing_locations(&mut module);
        assert!(missing_locations(&module).is_empty());

        let StmtKind::Expr(value) = &module.body[0].kind else {
            panic!("expected expression statement");
        };
        assert_eq!(value.location.start, start);
        assert_eq!(value.location.end, end);
    }

    #[test]
    fn test_leaf_without_location_inherits_from_parent() {
        let mut module = parse("print(1)\n").unwrap();
        let StmtKind::Expr(call) = &mut module.body[0].kind else {
            panic!("expected expression statement");
        };
        let parent = call.location;
        let ExprKind::Call { args, .. } = &mut call.kind else {
            panic!("expected call");
        };
        args[0].location = Location::default();

        fix_missing_locations(&mut module);

        let StmtKind::Expr(call) = &module.body[0].kind else {
            panic!("expected expression statement");
        };
        let ExprKind::Call { args, .. } = &call.kind else {
            panic!("expected call");
        };
        assert_eq!(args[0].location, parent);
    }

    #[test]
    fn test_top_level_statement_falls_back_to_zero() {
        let mut module = parse("pass\n").unwrap();
        module.body[0].location = Location::default();
        fix_missing_locations(&mut module);
        assert_eq!(module.body[0].location, Location::new(0, 0));
    }
}
