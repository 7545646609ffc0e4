//! Suspension-point insertion
//!
//! Wraps every call to the input primitive in an `await`, unless the call
//! already sits somewhere beneath an `await`.

use inkpot_parser::visit::{self, VisitorMut};
use inkpot_parser::{Expr, ExprKind, Location, Module, NodeId, NodeKind, ParentMap};

pub struct AwaitInserter<'a> {
    primitive: &'a str,
    parents: ParentMap,
    /// Ids reserved for the wrappers, handed out in visiting order.
    fresh: Vec<NodeId>,
    wrapped: usize,
}

impl<'a> AwaitInserter<'a> {
    /// Rewrite `module` in place and return how many calls were wrapped.
    pub fn run(primitive: &'a str, module: &mut Module) -> usize {
        let parents = ParentMap::build(module);
        let candidates = count_candidates(primitive, module, &parents);
        let fresh = (0..candidates).map(|_| module.fresh_id()).rev().collect();

        let mut inserter = AwaitInserter {
            primitive,
            parents,
            fresh,
            wrapped: 0,
        };
        visit::walk_module_mut(&mut inserter, module);
        inserter.wrapped
    }

    fn needs_await(&self, expr: &Expr) -> bool {
        expr.call_target_name() == Some(self.primitive)
            && !self.parents.has_ancestor(expr.id, NodeKind::Await)
    }
}

impl VisitorMut for AwaitInserter<'_> {
    fn visit_expr_mut(&mut self, expr: &mut Expr) {
        // Children first, so nested primitive calls are wrapped innermost-out.
        visit::walk_expr_mut(self, expr);

        if !self.needs_await(expr) {
            return;
        }
        let Some(id) = self.fresh.pop() else {
            return;
        };

        let start = expr.location.start;
        let call = std::mem::replace(expr, Expr::new(ExprKind::NoneLit, Location::default()));
        let mut wrapper = Expr::new(ExprKind::Await(Box::new(call)), Location::starting_at(start));
        wrapper.id = id;
        *expr = wrapper;
        self.wrapped += 1;
    }
}

fn count_candidates(primitive: &str, module: &Module, parents: &ParentMap) -> usize {
    struct Counter<'p> {
        primitive: &'p str,
        parents: &'p ParentMap,
        count: usize,
    }

    impl visit::Visitor for Counter<'_> {
        fn visit_expr(&mut self, expr: &Expr) {
            if expr.call_target_name() == Some(self.primitive)
                && !self.parents.has_ancestor(expr.id, NodeKind::Await)
            {
                self.count += 1;
            }
            visit::walk_expr(self, expr);
        }
    }

    let mut counter = Counter {
        primitive,
        parents,
        count: 0,
    };
    visit::walk_module(&mut counter, module);
    counter.count
}
