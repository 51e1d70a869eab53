//! Generic tree operations over the closed node set: [`walk`], [`print`],
//! [`equal`] and [`clone_node`].
//!
//! Every operation matches exhaustively on [`Stmt`] and [`Expr`], so adding a
//! variant fails to compile until each operation handles it.

use std::fmt::Write as _;

use crate::ast::*;

/// Borrowed view of any node.
#[derive(Debug, Clone, Copy)]
pub enum NodeRef<'a> {
    Program(&'a Program),
    Stmt(&'a Stmt),
    /// A body block owned directly by an `if`, `for` or `function`.
    Block(&'a Block),
    Expr(&'a Expr),
}

impl<'a> NodeRef<'a> {
    pub fn kind(&self) -> NodeKind {
        match self {
            Self::Program(_) => NodeKind::Program,
            Self::Stmt(s) => s.kind(),
            Self::Block(_) => NodeKind::Block,
            Self::Expr(e) => e.kind(),
        }
    }

    pub fn pos(&self) -> &'a Position {
        match self {
            Self::Program(p) => &p.pos,
            Self::Stmt(s) => s.pos(),
            Self::Block(b) => &b.pos,
            Self::Expr(e) => e.pos(),
        }
    }

    fn as_block(&self) -> Option<&'a Block> {
        match self {
            Self::Block(b) => Some(b),
            Self::Stmt(Stmt::Block(b)) => Some(b),
            _ => None,
        }
    }
}

impl<'a> From<&'a Program> for NodeRef<'a> {
    fn from(p: &'a Program) -> Self {
        Self::Program(p)
    }
}

impl<'a> From<&'a Stmt> for NodeRef<'a> {
    fn from(s: &'a Stmt) -> Self {
        Self::Stmt(s)
    }
}

impl<'a> From<&'a Block> for NodeRef<'a> {
    fn from(b: &'a Block) -> Self {
        Self::Block(b)
    }
}

impl<'a> From<&'a Expr> for NodeRef<'a> {
    fn from(e: &'a Expr) -> Self {
        Self::Expr(e)
    }
}

/// Owned node returned by [`clone_node`].
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Program(Program),
    Stmt(Stmt),
    Block(Block),
    Expr(Expr),
}

impl Node {
    pub fn as_node_ref(&self) -> NodeRef<'_> {
        match self {
            Self::Program(p) => NodeRef::Program(p),
            Self::Stmt(s) => NodeRef::Stmt(s),
            Self::Block(b) => NodeRef::Block(b),
            Self::Expr(e) => NodeRef::Expr(e),
        }
    }
}

/// Visitor verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visit {
    Continue,
    Stop,
}

// ============================================================================
// Walk
// ============================================================================

/// Pre-order depth-first traversal.
///
/// Returns [`Visit::Stop`] as soon as any visitor call does; no further node
/// is visited after that. `walk(None, _)` visits nothing and continues.
pub fn walk<'a, F>(node: Option<NodeRef<'a>>, visitor: &mut F) -> Visit
where
    F: FnMut(NodeRef<'a>) -> Visit,
{
    match node {
        None => Visit::Continue,
        Some(n) => walk_node(n, visitor),
    }
}

fn walk_node<'a, F>(node: NodeRef<'a>, f: &mut F) -> Visit
where
    F: FnMut(NodeRef<'a>) -> Visit,
{
    if f(node) == Visit::Stop {
        return Visit::Stop;
    }
    match node {
        NodeRef::Program(p) => walk_stmts(&p.statements, f),
        NodeRef::Block(b) => walk_stmts(&b.statements, f),
        NodeRef::Stmt(s) => walk_stmt_children(s, f),
        NodeRef::Expr(e) => walk_expr_children(e, f),
    }
}

fn walk_stmts<'a, F>(stmts: &'a [Stmt], f: &mut F) -> Visit
where
    F: FnMut(NodeRef<'a>) -> Visit,
{
    for s in stmts {
        if walk_node(NodeRef::Stmt(s), f) == Visit::Stop {
            return Visit::Stop;
        }
    }
    Visit::Continue
}

fn walk_exprs<'a, F>(exprs: impl IntoIterator<Item = &'a Expr>, f: &mut F) -> Visit
where
    F: FnMut(NodeRef<'a>) -> Visit,
{
    for e in exprs {
        if walk_node(NodeRef::Expr(e), f) == Visit::Stop {
            return Visit::Stop;
        }
    }
    Visit::Continue
}

fn walk_properties<'a, F>(props: &'a [Property], f: &mut F) -> Visit
where
    F: FnMut(NodeRef<'a>) -> Visit,
{
    walk_exprs(props.iter().map(|p| &p.value), f)
}

fn walk_steps<'a, F>(steps: &'a [WorkflowStep], f: &mut F) -> Visit
where
    F: FnMut(NodeRef<'a>) -> Visit,
{
    for step in steps {
        if walk_properties(&step.input, f) == Visit::Stop
            || walk_steps(&step.branches, f) == Visit::Stop
        {
            return Visit::Stop;
        }
    }
    Visit::Continue
}

fn walk_stmt_children<'a, F>(stmt: &'a Stmt, f: &mut F) -> Visit
where
    F: FnMut(NodeRef<'a>) -> Visit,
{
    match stmt {
        Stmt::VarDecl(v) => walk_exprs(v.value.iter(), f),
        Stmt::Assignment(a) => walk_exprs([&a.value], f),
        Stmt::ExprStmt(e) => walk_exprs([&e.expr], f),
        Stmt::If(i) => {
            if walk_exprs([&i.condition], f) == Visit::Stop
                || walk_node(NodeRef::Block(&i.then_block), f) == Visit::Stop
            {
                return Visit::Stop;
            }
            match &i.else_block {
                Some(b) => walk_node(NodeRef::Block(b), f),
                None => Visit::Continue,
            }
        }
        Stmt::For(l) => {
            if walk_exprs([&l.iterable], f) == Visit::Stop {
                return Visit::Stop;
            }
            walk_node(NodeRef::Block(&l.body), f)
        }
        Stmt::Function(d) => walk_node(NodeRef::Block(&d.body), f),
        Stmt::Exec(_) => Visit::Continue,
        Stmt::Block(b) => walk_stmts(&b.statements, f),
        Stmt::Return(r) => walk_exprs(r.value.iter(), f),
        Stmt::Config(c) => walk_properties(&c.properties, f),
        Stmt::Database(d) => walk_stmts(&d.declarations, f),
        Stmt::Model(_) | Stmt::Collection(_) => Visit::Continue,
        Stmt::Auth(a) => walk_properties(&a.properties, f),
        Stmt::Role(r) => walk_properties(&r.properties, f),
        Stmt::Middleware(m) => walk_properties(&m.properties, f),
        Stmt::Event(_) | Stmt::EventHandler(_) => Visit::Continue,
        Stmt::Integration(i) => {
            if let Some(auth) = &i.auth {
                if walk_properties(&auth.properties, f) == Visit::Stop {
                    return Visit::Stop;
                }
            }
            walk_properties(&i.properties, f)
        }
        Stmt::Webhook(w) => walk_properties(&w.properties, f),
        Stmt::Endpoint(_) => Visit::Continue,
        Stmt::Workflow(w) => walk_steps(&w.steps, f),
        Stmt::Job(j) => walk_steps(&j.steps, f),
    }
}

fn walk_expr_children<'a, F>(expr: &'a Expr, f: &mut F) -> Visit
where
    F: FnMut(NodeRef<'a>) -> Visit,
{
    match expr {
        Expr::String(_) | Expr::Number(_) | Expr::Bool(_) | Expr::Ident(_) => Visit::Continue,
        Expr::Array(a) => walk_exprs(&a.elements, f),
        Expr::Call(c) => walk_exprs(&c.args, f),
        Expr::Binary(b) => walk_exprs([b.left.as_ref(), b.right.as_ref()], f),
        Expr::Unary(u) => walk_exprs([u.operand.as_ref()], f),
    }
}

// ============================================================================
// Equal / Clone
// ============================================================================

/// Deep structural equality; positions are ignored.
///
/// `equal(None, None)` is true and nodes of different kinds are never equal.
/// An `if`/`for`/`function` body block compares like a block statement.
pub fn equal(a: Option<NodeRef<'_>>, b: Option<NodeRef<'_>>) -> bool {
    let (a, b) = match (a, b) {
        (None, None) => return true,
        (Some(a), Some(b)) => (a, b),
        (None, Some(_)) | (Some(_), None) => return false,
    };
    if let (Some(x), Some(y)) = (a.as_block(), b.as_block()) {
        return x == y;
    }
    match (a, b) {
        (NodeRef::Program(x), NodeRef::Program(y)) => x == y,
        (NodeRef::Stmt(x), NodeRef::Stmt(y)) => x == y,
        (NodeRef::Expr(x), NodeRef::Expr(y)) => x == y,
        (NodeRef::Program(_), NodeRef::Stmt(_) | NodeRef::Block(_) | NodeRef::Expr(_))
        | (NodeRef::Stmt(_), NodeRef::Program(_) | NodeRef::Block(_) | NodeRef::Expr(_))
        | (NodeRef::Block(_), _)
        | (NodeRef::Expr(_), NodeRef::Program(_) | NodeRef::Stmt(_) | NodeRef::Block(_)) => false,
    }
}

/// Deep, fully independent copy. `clone_node(None)` is `None`.
pub fn clone_node(node: Option<NodeRef<'_>>) -> Option<Node> {
    node.map(|n| match n {
        NodeRef::Program(p) => Node::Program(p.clone()),
        NodeRef::Stmt(s) => Node::Stmt(s.clone()),
        NodeRef::Block(b) => Node::Block(b.clone()),
        NodeRef::Expr(e) => Node::Expr(e.clone()),
    })
}

// ============================================================================
// Print
// ============================================================================

/// Indented, human-readable dump. `print(None)` is `"<nil>"`.
pub fn print(node: Option<NodeRef<'_>>) -> String {
    let Some(node) = node else {
        return "<nil>".to_string();
    };
    let mut p = Printer::default();
    match node {
        NodeRef::Program(prog) => {
            p.line("Program");
            p.nested(|p| {
                for s in &prog.statements {
                    p.stmt(s);
                }
            });
        }
        NodeRef::Stmt(s) => p.stmt(s),
        NodeRef::Block(b) => p.block("Block", b),
        NodeRef::Expr(e) => p.expr(e),
    }
    p.out
}

#[derive(Default)]
struct Printer {
    out: String,
    depth: usize,
}

impl Printer {
    fn line(&mut self, text: impl AsRef<str>) {
        for _ in 0..self.depth {
            self.out.push_str("  ");
        }
        self.out.push_str(text.as_ref());
        self.out.push('\n');
    }

    fn nested(&mut self, body: impl FnOnce(&mut Self)) {
        self.depth += 1;
        body(self);
        self.depth -= 1;
    }

    fn opt(&mut self, label: &str, value: Option<&str>) {
        if let Some(v) = value {
            self.line(format!("{}: {}", label, v));
        }
    }

    fn block(&mut self, label: &str, block: &Block) {
        self.line(label);
        self.nested(|p| {
            for s in &block.statements {
                p.stmt(s);
            }
        });
    }

    fn properties(&mut self, props: &[Property]) {
        for prop in props {
            self.line(format!("{}: {}", prop.key, prop.value));
        }
    }

    fn fields(&mut self, fields: &[FieldDecl]) {
        for field in fields {
            let mut text = format!("Field {}: {}", field.name, field.field_type);
            for m in &field.modifiers {
                match &m.argument {
                    Some(arg) => {
                        let _ = write!(text, " @{}({})", m.name, arg);
                    }
                    None => {
                        let _ = write!(text, " @{}", m.name);
                    }
                }
            }
            self.line(text);
            self.nested(|p| p.fields(&field.fields));
        }
    }

    fn indexes(&mut self, indexes: &[IndexDecl]) {
        for idx in indexes {
            self.line(format!(
                "Index{} [{}]",
                if idx.unique { " unique" } else { "" },
                idx.fields.join(", ")
            ));
        }
    }

    fn retry(&mut self, retry: &RetryPolicy) {
        let mut parts = Vec::new();
        if let Some(n) = retry.max_attempts {
            parts.push(format!("max_attempts={}", n));
        }
        if let Some(c) = retry.backoff_coefficient {
            parts.push(format!("backoff_coefficient={}", c));
        }
        if let Some(i) = &retry.initial_interval {
            parts.push(format!("initial_interval={}", i));
        }
        if let Some(i) = &retry.max_interval {
            parts.push(format!("max_interval={}", i));
        }
        self.line(format!("Retry {}", parts.join(" ")));
    }

    fn trigger(&mut self, trigger: &Trigger) {
        match &trigger.value {
            Some(v) => self.line(format!("Trigger {} {:?}", trigger.kind.as_str(), v)),
            None => self.line(format!("Trigger {}", trigger.kind.as_str())),
        }
    }

    fn steps(&mut self, steps: &[WorkflowStep]) {
        for step in steps {
            let head = match step.kind {
                StepKind::Activity => format!("Step {}", step.name),
                StepKind::Parallel => format!("Parallel {}", step.name),
            };
            self.line(head);
            self.nested(|p| {
                p.opt("description", step.description.as_deref());
                p.opt("activity", step.activity.as_deref());
                p.opt("timeout", step.timeout.as_deref());
                if !step.depends_on.is_empty() {
                    p.line(format!("depends_on: [{}]", step.depends_on.join(", ")));
                }
                if !step.input.is_empty() {
                    p.line("Input");
                    p.nested(|p| p.properties(&step.input));
                }
                if let Some(r) = &step.retry {
                    p.retry(r);
                }
                p.steps(&step.branches);
            });
        }
    }

    fn flow(
        &mut self,
        description: Option<&str>,
        trigger: Option<&Trigger>,
        timeout: Option<&str>,
        retry: Option<&RetryPolicy>,
        steps: &[WorkflowStep],
    ) {
        self.opt("description", description);
        if let Some(t) = trigger {
            self.trigger(t);
        }
        self.opt("timeout", timeout);
        if let Some(r) = retry {
            self.retry(r);
        }
        self.steps(steps);
    }

    fn stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::VarDecl(v) => {
                self.line(format!("VarDecl {}", v.name));
                if let Some(value) = &v.value {
                    self.nested(|p| p.expr(value));
                }
            }
            Stmt::Assignment(a) => {
                self.line(format!("Assignment {}", a.name));
                self.nested(|p| p.expr(&a.value));
            }
            Stmt::ExprStmt(e) => {
                self.line("ExprStmt");
                self.nested(|p| p.expr(&e.expr));
            }
            Stmt::If(i) => {
                self.line("IfStmt");
                self.nested(|p| {
                    p.expr(&i.condition);
                    p.block("Then", &i.then_block);
                    if let Some(b) = &i.else_block {
                        p.block("Else", b);
                    }
                });
            }
            Stmt::For(l) => {
                self.line(format!("ForLoop {}", l.variable));
                self.nested(|p| {
                    p.expr(&l.iterable);
                    p.block("Body", &l.body);
                });
            }
            Stmt::Function(d) => {
                self.line(format!("FunctionDecl {}({})", d.name, d.params.join(", ")));
                self.nested(|p| p.block("Body", &d.body));
            }
            Stmt::Exec(e) => self.line(format!("ExecBlock {:?}", e.command)),
            Stmt::Block(b) => self.block("Block", b),
            Stmt::Return(r) => {
                self.line("ReturnStmt");
                if let Some(value) = &r.value {
                    self.nested(|p| p.expr(value));
                }
            }
            Stmt::Config(c) => {
                self.line(format!("ConfigDecl {}", c.engine));
                self.nested(|p| p.properties(&c.properties));
            }
            Stmt::Database(d) => {
                self.line(format!("DatabaseBlock {}", d.engine));
                self.nested(|p| {
                    for s in &d.declarations {
                        p.stmt(s);
                    }
                });
            }
            Stmt::Model(m) => {
                self.line(format!("ModelDecl {}", m.name));
                self.nested(|p| {
                    p.opt("description", m.description.as_deref());
                    p.fields(&m.fields);
                    p.indexes(&m.indexes);
                });
            }
            Stmt::Collection(c) => {
                self.line(format!("CollectionDecl {}", c.name));
                self.nested(|p| {
                    p.opt("description", c.description.as_deref());
                    p.fields(&c.fields);
                    p.indexes(&c.indexes);
                });
            }
            Stmt::Auth(a) => {
                self.line(match &a.provider {
                    Some(provider) => format!("AuthDecl {}", provider),
                    None => "AuthDecl".to_string(),
                });
                self.nested(|p| p.properties(&a.properties));
            }
            Stmt::Role(r) => {
                self.line(format!("RoleDecl {}", r.name));
                self.nested(|p| p.properties(&r.properties));
            }
            Stmt::Middleware(m) => {
                self.line(format!("MiddlewareDecl {}", m.name));
                self.nested(|p| p.properties(&m.properties));
            }
            Stmt::Event(e) => {
                self.line(format!("EventDecl {}", e.name));
                if let Some(schema) = &e.schema {
                    self.nested(|p| {
                        for field in schema {
                            p.line(format!(
                                "{}: {}{}",
                                field.name,
                                field.field_type,
                                if field.required { "" } else { "?" }
                            ));
                        }
                    });
                }
            }
            Stmt::EventHandler(h) => self.line(format!(
                "EventHandlerDecl {} -> {} {}{}",
                h.event,
                h.action,
                h.target,
                if h.is_async { " async" } else { "" }
            )),
            Stmt::Integration(i) => {
                self.line(format!("IntegrationDecl {}", i.name));
                self.nested(|p| {
                    p.opt("base_url", i.base_url.as_deref());
                    if let Some(auth) = &i.auth {
                        p.line(format!("Auth {}", auth.kind));
                        p.nested(|p| p.properties(&auth.properties));
                    }
                    if let Some(cb) = &i.circuit_breaker {
                        p.line(format!(
                            "CircuitBreaker threshold={} timeout={:?} max_concurrent={}",
                            cb.threshold, cb.timeout, cb.max_concurrent
                        ));
                    }
                    p.properties(&i.properties);
                });
            }
            Stmt::Webhook(w) => {
                self.line(format!("WebhookDecl {}", w.name));
                self.nested(|p| {
                    p.opt("url", w.url.as_deref());
                    if !w.events.is_empty() {
                        p.line(format!("events: [{}]", w.events.join(", ")));
                    }
                    p.opt("secret", w.secret.as_deref());
                    p.properties(&w.properties);
                });
            }
            Stmt::Endpoint(e) => self.endpoint(e),
            Stmt::Workflow(w) => {
                self.line(format!("WorkflowDecl {}", w.name));
                self.nested(|p| {
                    p.flow(
                        w.description.as_deref(),
                        w.trigger.as_ref(),
                        w.timeout.as_deref(),
                        w.retry.as_ref(),
                        &w.steps,
                    )
                });
            }
            Stmt::Job(j) => {
                self.line(format!("JobDecl {}", j.name));
                self.nested(|p| {
                    if let Some(c) = j.concurrency {
                        p.line(format!("concurrency: {}", c));
                    }
                    p.flow(
                        j.description.as_deref(),
                        j.trigger.as_ref(),
                        j.timeout.as_deref(),
                        j.retry.as_ref(),
                        &j.steps,
                    )
                });
            }
        }
    }

    fn endpoint(&mut self, e: &EndpointDecl) {
        self.line(format!("EndpointDecl {} {}", e.method, e.path));
        self.nested(|p| {
            for a in &e.annotations {
                match &a.value {
                    Some(v) => p.line(format!("@{}({:?})", a.name, v)),
                    None => p.line(format!("@{}", a.name)),
                }
            }
            p.opt("description", e.description.as_deref());
            p.opt("handler", e.handler.as_deref());
            if !e.middleware.is_empty() {
                p.line(format!("middleware: [{}]", e.middleware.join(", ")));
            }
            p.opt("role", e.role.as_deref());
            if let Some(req) = &e.request {
                match req.source {
                    Some(src) => p.line(format!("request: {} from {}", req.type_name, src.as_str())),
                    None => p.line(format!("request: {}", req.type_name)),
                }
            }
            if let Some(resp) = &e.response {
                p.line(format!("response: {} status {}", resp.type_name, resp.status));
            }
            if !e.logic.is_empty() {
                p.line("Logic");
                p.nested(|p| {
                    for step in &e.logic {
                        let mut text = step.action.clone();
                        if let Some(t) = &step.target {
                            let _ = write!(text, " {}", t);
                        }
                        if !step.args.is_empty() {
                            let args: Vec<String> = step.args.iter().map(ToString::to_string).collect();
                            let _ = write!(text, "({})", args.join(", "));
                        }
                        for opt in &step.options {
                            let _ = write!(text, " {}={}", opt.key, opt.value);
                        }
                        p.line(text);
                    }
                });
            }
        });
    }

    fn expr(&mut self, expr: &Expr) {
        match expr {
            Expr::String(s) => self.line(format!("StringLiteral {:?}", s.value)),
            Expr::Number(n) => self.line(format!("NumberLiteral {}", n.value)),
            Expr::Bool(b) => self.line(format!("BoolLiteral {}", b.value)),
            Expr::Ident(i) => self.line(format!("Identifier {}", i.name)),
            Expr::Array(a) => {
                self.line("ArrayLiteral");
                self.nested(|p| {
                    for e in &a.elements {
                        p.expr(e);
                    }
                });
            }
            Expr::Call(c) => {
                self.line(format!("FunctionCall {}", c.name));
                self.nested(|p| {
                    for e in &c.args {
                        p.expr(e);
                    }
                });
            }
            Expr::Binary(b) => {
                self.line(format!("BinaryExpr {}", b.op));
                self.nested(|p| {
                    p.expr(&b.left);
                    p.expr(&b.right);
                });
            }
            Expr::Unary(u) => {
                self.line(match u.op {
                    UnaryOp::Not => "UnaryExpr not",
                    UnaryOp::Neg => "UnaryExpr -",
                });
                self.nested(|p| p.expr(&u.operand));
            }
        }
    }
}
