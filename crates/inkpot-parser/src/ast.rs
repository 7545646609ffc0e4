//! Abstract Syntax Tree types for inkpot cells
//!
//! Every statement and expression carries a `NodeId`, unique within its
//! `Module`, and a `Location` giving its byte span in the source. Nodes
//! synthesized after parsing may start out with an incomplete location;
//! see `crate::locations`.

/// Identifier of a node within one `Module`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl NodeId {
    /// Placeholder carried by nodes until the module numbers them.
    pub const UNASSIGNED: NodeId = NodeId(u32::MAX);
}

/// Byte span of a node; either end may be missing on synthesized nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Location {
    pub start: Option<usize>,
    pub end: Option<usize>,
}

impl Location {
    pub fn new(start: usize, end: usize) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
        }
    }

    /// A location that only knows where it starts.
    pub fn starting_at(start: Option<usize>) -> Self {
        Self { start, end: None }
    }

    pub fn is_complete(&self) -> bool {
        self.start.is_some() && self.end.is_some()
    }

    pub fn span(&self) -> Option<(usize, usize)> {
        Some((self.start?, self.end?))
    }
}

/// A parsed cell: the syntax tree of one source unit
#[derive(Debug, Clone, PartialEq)]
pub struct Module {
    pub body: Vec<Stmt>,
    next_id: u32,
}

impl Module {
    /// Wrap parsed statements, assigning every node a fresh id in source order.
    pub fn new(body: Vec<Stmt>) -> Self {
        let mut module = Self { body, next_id: 0 };
        let mut next = 0;
        for stmt in &mut module.body {
            number_stmt(stmt, &mut next);
        }
        module.next_id = next;
        module
    }

    /// Allocate an id for a node synthesized after parsing.
    pub fn fresh_id(&mut self) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Number of ids handed out so far.
    pub fn node_count(&self) -> usize {
        self.next_id as usize
    }
}

fn number_stmt(stmt: &mut Stmt, next: &mut u32) {
    stmt.id = NodeId(*next);
    *next += 1;
    for expr in stmt.exprs_mut() {
        number_expr(expr, next);
    }
    for child in stmt.stmts_mut() {
        number_stmt(child, next);
    }
}

fn number_expr(expr: &mut Expr, next: &mut u32) {
    expr.id = NodeId(*next);
    *next += 1;
    for child in expr.children_mut() {
        number_expr(child, next);
    }
}

/// Statement
#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub id: NodeId,
    pub location: Location,
    pub kind: StmtKind,
    nesting: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    /// Expression evaluated for its effect (or as the cell's value)
    Expr(Expr),
    /// `a = b = value`
    Assign { targets: Vec<Expr>, value: Expr },
    /// `target += value`
    AugAssign { target: Expr, op: BinOp, value: Expr },
    /// `if`/`elif`/`else`; an `elif` is an `If` alone in `orelse`
    If {
        test: Expr,
        body: Vec<Stmt>,
        orelse: Vec<Stmt>,
    },
    While { test: Expr, body: Vec<Stmt> },
    /// `for target in iter:`; target is a name or a tuple of names
    For {
        target: Expr,
        iter: Expr,
        body: Vec<Stmt>,
    },
    /// `def` or `async def`
    FunctionDef {
        name: String,
        params: Vec<Param>,
        body: Vec<Stmt>,
        is_async: bool,
    },
    Return(Option<Expr>),
    Raise(Option<Expr>),
    /// `import a.b as c, d`
    Import(Vec<Alias>),
    /// `from module import a as b`
    ImportFrom { module: String, names: Vec<Alias> },
    Pass,
    Break,
    Continue,
}

impl Stmt {
    pub fn new(kind: StmtKind, location: Location) -> Self {
        let mut stmt = Self {
            id: NodeId::UNASSIGNED,
            location,
            kind,
            nesting: 1,
        };
        let exprs = stmt.exprs().into_iter().map(Expr::nesting);
        let stmts = stmt.stmts().into_iter().map(Stmt::nesting);
        stmt.nesting = 1 + exprs.chain(stmts).max().unwrap_or(0);
        stmt
    }

    /// Depth of the tree under this statement as it was built, counting
    /// both statements and expressions.
    pub fn nesting(&self) -> u32 {
        self.nesting
    }

    /// Expressions owned directly by this statement, in evaluation order.
    pub fn exprs(&self) -> Vec<&Expr> {
        match &self.kind {
            StmtKind::Expr(expr) => vec![expr],
            StmtKind::Assign { targets, value } => {
                let mut exprs = vec![value];
                exprs.extend(targets);
                exprs
            }
            StmtKind::AugAssign { target, value, .. } => vec![target, value],
            StmtKind::If { test, .. } | StmtKind::While { test, .. } => vec![test],
            StmtKind::For { target, iter, .. } => vec![iter, target],
            StmtKind::FunctionDef { params, .. } => {
                params.iter().filter_map(|p| p.default.as_ref()).collect()
            }
            StmtKind::Return(value) | StmtKind::Raise(value) => value.iter().collect(),
            StmtKind::Import(_)
            | StmtKind::ImportFrom { .. }
            | StmtKind::Pass
            | StmtKind::Break
            | StmtKind::Continue => Vec::new(),
        }
    }

    pub fn exprs_mut(&mut self) -> Vec<&mut Expr> {
        match &mut self.kind {
            StmtKind::Expr(expr) => vec![expr],
            StmtKind::Assign { targets, value } => {
                let mut exprs = vec![value];
                exprs.extend(targets.iter_mut());
                exprs
            }
            StmtKind::AugAssign { target, value, .. } => vec![target, value],
            StmtKind::If { test, .. } | StmtKind::While { test, .. } => vec![test],
            StmtKind::For { target, iter, .. } => vec![iter, target],
            StmtKind::FunctionDef { params, .. } => {
                params.iter_mut().filter_map(|p| p.default.as_mut()).collect()
            }
            StmtKind::Return(value) | StmtKind::Raise(value) => value.iter_mut().collect(),
            StmtKind::Import(_)
            | StmtKind::ImportFrom { .. }
            | StmtKind::Pass
            | StmtKind::Break
            | StmtKind::Continue => Vec::new(),
        }
    }

    /// Nested statements (bodies and else-branches).
    pub fn stmts(&self) -> Vec<&Stmt> {
        match &self.kind {
            StmtKind::If { body, orelse, .. } => body.iter().chain(orelse).collect(),
            StmtKind::While { body, .. }
            | StmtKind::For { body, .. }
            | StmtKind::FunctionDef { body, .. } => body.iter().collect(),
            _ => Vec::new(),
        }
    }

    pub fn stmts_mut(&mut self) -> Vec<&mut Stmt> {
        match &mut self.kind {
            StmtKind::If { body, orelse, .. } => body.iter_mut().chain(orelse.iter_mut()).collect(),
            StmtKind::While { body, .. }
            | StmtKind::For { body, .. }
            | StmtKind::FunctionDef { body, .. } => body.iter_mut().collect(),
            _ => Vec::new(),
        }
    }
}

/// Expression
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub id: NodeId,
    pub location: Location,
    pub kind: ExprKind,
    nesting: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Name(String),
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    NoneLit,
    List(Vec<Expr>),
    Tuple(Vec<Expr>),
    Dict(Vec<(Expr, Expr)>),
    Binary {
        left: Box<Expr>,
        op: BinOp,
        right: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    /// `and` / `or`
    Logical {
        op: BoolOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// Chained comparison: `left op0 c0 op1 c1 ...`
    Compare {
        left: Box<Expr>,
        ops: Vec<CmpOp>,
        comparators: Vec<Expr>,
    },
    /// `body if test else orelse`
    IfExp {
        test: Box<Expr>,
        body: Box<Expr>,
        orelse: Box<Expr>,
    },
    Call {
        func: Box<Expr>,
        args: Vec<Expr>,
        keywords: Vec<Keyword>,
    },
    Attribute {
        value: Box<Expr>,
        attr: String,
    },
    Subscript {
        value: Box<Expr>,
        index: Box<Expr>,
    },
    /// Suspend point: `await value`
    Await(Box<Expr>),
}

impl Expr {
    pub fn new(kind: ExprKind, location: Location) -> Self {
        let mut expr = Self {
            id: NodeId::UNASSIGNED,
            location,
            kind,
            nesting: 1,
        };
        expr.nesting = 1 + expr.children().into_iter().map(Expr::nesting).max().unwrap_or(0);
        expr
    }

    /// Depth of the expression tree as it was built.
    pub fn nesting(&self) -> u32 {
        self.nesting
    }

    /// Direct sub-expressions, in evaluation order.
    pub fn children(&self) -> Vec<&Expr> {
        match &self.kind {
            ExprKind::Name(_)
            | ExprKind::Int(_)
            | ExprKind::Float(_)
            | ExprKind::Str(_)
            | ExprKind::Bool(_)
            | ExprKind::NoneLit => Vec::new(),
            ExprKind::List(items) | ExprKind::Tuple(items) => items.iter().collect(),
            ExprKind::Dict(entries) => entries.iter().flat_map(|(k, v)| [k, v]).collect(),
            ExprKind::Binary { left, right, .. } | ExprKind::Logical { left, right, .. } => {
                vec![&**left, &**right]
            }
            ExprKind::Unary { operand, .. } => vec![&**operand],
            ExprKind::Compare {
                left, comparators, ..
            } => std::iter::once(&**left).chain(comparators).collect(),
            ExprKind::IfExp { test, body, orelse } => vec![&**test, &**body, &**orelse],
            ExprKind::Call {
                func,
                args,
                keywords,
            } => std::iter::once(&**func)
                .chain(args)
                .chain(keywords.iter().map(|k| &k.value))
                .collect(),
            ExprKind::Attribute { value, .. } => vec![&**value],
            ExprKind::Subscript { value, index } => vec![&**value, &**index],
            ExprKind::Await(value) => vec![&**value],
        }
    }

    pub fn children_mut(&mut self) -> Vec<&mut Expr> {
        match &mut self.kind {
            ExprKind::Name(_)
            | ExprKind::Int(_)
            | ExprKind::Float(_)
            | ExprKind::Str(_)
            | ExprKind::Bool(_)
            | ExprKind::NoneLit => Vec::new(),
            ExprKind::List(items) | ExprKind::Tuple(items) => items.iter_mut().collect(),
            ExprKind::Dict(entries) => entries.iter_mut().flat_map(|(k, v)| [k, v]).collect(),
            ExprKind::Binary { left, right, .. } | ExprKind::Logical { left, right, .. } => {
                vec![&mut **left, &mut **right]
            }
            ExprKind::Unary { operand, .. } => vec![&mut **operand],
            ExprKind::Compare {
                left, comparators, ..
            } => std::iter::once(&mut **left)
                .chain(comparators.iter_mut())
                .collect(),
            ExprKind::IfExp { test, body, orelse } => vec![&mut **test, &mut **body, &mut **orelse],
            ExprKind::Call {
                func,
                args,
                keywords,
            } => std::iter::once(&mut **func)
                .chain(args.iter_mut())
                .chain(keywords.iter_mut().map(|k| &mut k.value))
                .collect(),
            ExprKind::Attribute { value, .. } => vec![&mut **value],
            ExprKind::Subscript { value, index } => vec![&mut **value, &mut **index],
            ExprKind::Await(value) => vec![&mut **value],
        }
    }

    /// Name of the called function when this is a call to a bare identifier.
    pub fn call_target_name(&self) -> Option<&str> {
        match &self.kind {
            ExprKind::Call { func, .. } => match &func.kind {
                ExprKind::Name(name) => Some(name),
                _ => None,
            },
            _ => None,
        }
    }

    /// Short description used in "cannot assign to ..." diagnostics.
    pub fn describe(&self) -> &'static str {
        match &self.kind {
            ExprKind::Name(_) => "name",
            ExprKind::Int(_)
            | ExprKind::Float(_)
            | ExprKind::Str(_)
            | ExprKind::Bool(_)
            | ExprKind::NoneLit => "literal",
            ExprKind::List(_) => "list",
            ExprKind::Tuple(_) => "tuple",
            ExprKind::Dict(_) => "dict literal",
            ExprKind::Binary { .. } | ExprKind::Unary { .. } => "expression",
            ExprKind::Logical { .. } => "expression",
            ExprKind::Compare { .. } => "comparison",
            ExprKind::IfExp { .. } => "conditional expression",
            ExprKind::Call { .. } => "function call",
            ExprKind::Attribute { .. } => "attribute",
            ExprKind::Subscript { .. } => "subscript",
            ExprKind::Await(_) => "await expression",
        }
    }
}

/// Keyword argument in a call: `name=value`
#[derive(Debug, Clone, PartialEq)]
pub struct Keyword {
    pub name: String,
    pub value: Expr,
}

/// Function parameter, optionally with a default
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub default: Option<Expr>,
}

/// `name as asname` in an import
#[derive(Debug, Clone, PartialEq)]
pub struct Alias {
    pub name: String,
    pub asname: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Pow,
}

impl BinOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::FloorDiv => "//",
            BinOp::Mod => "%",
            BinOp::Pow => "**",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Pos,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolOp {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    NotEq,
    Lt,
    LtE,
    Gt,
    GtE,
    In,
    NotIn,
    Is,
    IsNot,
}

impl CmpOp {
    pub fn symbol(self) -> &'static str {
        match self {
            CmpOp::Eq => "==",
            CmpOp::NotEq => "!=",
            CmpOp::Lt => "<",
            CmpOp::LtE => "<=",
            CmpOp::Gt => ">",
            CmpOp::GtE => ">=",
            CmpOp::In => "in",
            CmpOp::NotIn => "not in",
            CmpOp::Is => "is",
            CmpOp::IsNot => "is not",
        }
    }
}
