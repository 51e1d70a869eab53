//! # Abstract Syntax Tree
//!
//! Typed, closed-variant program tree produced by the converter.
//!
//! ## Structure
//!
//! A Conduit program is an ordered list of [`Stmt`]s. Statements fall into
//! two groups:
//! - **General statements**: variables, assignments, control flow,
//!   functions, shell `exec` blocks and nested blocks
//! - **Declarations**: config, databases with models/collections, auth,
//!   roles, middleware, events and handlers, integrations, webhooks,
//!   endpoints, workflows and jobs
//!
//! Expressions ([`Expr`]) are literals, identifiers, arrays, calls and
//! unary/binary operations. Numbers are stored as parsed `f64` values.
//!
//! Every node owns its children; there are no back-references. Every node
//! carries a [`Position`], which never participates in equality.

use std::fmt;

use serde::Serialize;

pub use crate::errors::Position;

/// The root of a parsed Conduit program.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Program {
    pub pos: Position,
    /// Statements in evaluation order; endpoint declarations come last.
    pub statements: Vec<Stmt>,
}

impl Program {
    pub fn endpoints(&self) -> impl Iterator<Item = &EndpointDecl> {
        self.statements.iter().filter_map(|s| match s {
            Stmt::Endpoint(e) => Some(e),
            _ => None,
        })
    }

    pub fn workflows(&self) -> impl Iterator<Item = &WorkflowDecl> {
        self.statements.iter().filter_map(|s| match s {
            Stmt::Workflow(w) => Some(w),
            _ => None,
        })
    }

    pub fn jobs(&self) -> impl Iterator<Item = &JobDecl> {
        self.statements.iter().filter_map(|s| match s {
            Stmt::Job(j) => Some(j),
            _ => None,
        })
    }
}

/// Statement variants.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind")]
pub enum Stmt {
    VarDecl(VarDecl),
    Assignment(Assignment),
    ExprStmt(ExprStmt),
    If(IfStmt),
    For(ForLoop),
    Function(FunctionDecl),
    Exec(ExecBlock),
    Block(Block),
    Return(ReturnStmt),
    Config(ConfigDecl),
    Database(DatabaseBlock),
    Model(ModelDecl),
    Collection(CollectionDecl),
    Auth(AuthDecl),
    Role(RoleDecl),
    Middleware(MiddlewareDecl),
    Event(EventDecl),
    EventHandler(EventHandlerDecl),
    Integration(IntegrationDecl),
    Webhook(WebhookDecl),
    Endpoint(EndpointDecl),
    Workflow(WorkflowDecl),
    Job(JobDecl),
}

impl Stmt {
    pub fn pos(&self) -> &Position {
        match self {
            Self::VarDecl(s) => &s.pos,
            Self::Assignment(s) => &s.pos,
            Self::ExprStmt(s) => &s.pos,
            Self::If(s) => &s.pos,
            Self::For(s) => &s.pos,
            Self::Function(s) => &s.pos,
            Self::Exec(s) => &s.pos,
            Self::Block(s) => &s.pos,
            Self::Return(s) => &s.pos,
            Self::Config(s) => &s.pos,
            Self::Database(s) => &s.pos,
            Self::Model(s) => &s.pos,
            Self::Collection(s) => &s.pos,
            Self::Auth(s) => &s.pos,
            Self::Role(s) => &s.pos,
            Self::Middleware(s) => &s.pos,
            Self::Event(s) => &s.pos,
            Self::EventHandler(s) => &s.pos,
            Self::Integration(s) => &s.pos,
            Self::Webhook(s) => &s.pos,
            Self::Endpoint(s) => &s.pos,
            Self::Workflow(s) => &s.pos,
            Self::Job(s) => &s.pos,
        }
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            Self::VarDecl(_) => NodeKind::VarDecl,
            Self::Assignment(_) => NodeKind::Assignment,
            Self::ExprStmt(_) => NodeKind::ExprStmt,
            Self::If(_) => NodeKind::IfStmt,
            Self::For(_) => NodeKind::ForLoop,
            Self::Function(_) => NodeKind::FunctionDecl,
            Self::Exec(_) => NodeKind::ExecBlock,
            Self::Block(_) => NodeKind::Block,
            Self::Return(_) => NodeKind::ReturnStmt,
            Self::Config(_) => NodeKind::ConfigDecl,
            Self::Database(_) => NodeKind::DatabaseBlock,
            Self::Model(_) => NodeKind::ModelDecl,
            Self::Collection(_) => NodeKind::CollectionDecl,
            Self::Auth(_) => NodeKind::AuthDecl,
            Self::Role(_) => NodeKind::RoleDecl,
            Self::Middleware(_) => NodeKind::MiddlewareDecl,
            Self::Event(_) => NodeKind::EventDecl,
            Self::EventHandler(_) => NodeKind::EventHandlerDecl,
            Self::Integration(_) => NodeKind::IntegrationDecl,
            Self::Webhook(_) => NodeKind::WebhookDecl,
            Self::Endpoint(_) => NodeKind::EndpointDecl,
            Self::Workflow(_) => NodeKind::WorkflowDecl,
            Self::Job(_) => NodeKind::JobDecl,
        }
    }
}

/// Kind tag for every node variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum NodeKind {
    Program,
    VarDecl,
    Assignment,
    ExprStmt,
    IfStmt,
    ForLoop,
    FunctionDecl,
    ExecBlock,
    Block,
    ReturnStmt,
    ConfigDecl,
    DatabaseBlock,
    ModelDecl,
    CollectionDecl,
    AuthDecl,
    RoleDecl,
    MiddlewareDecl,
    EventDecl,
    EventHandlerDecl,
    IntegrationDecl,
    WebhookDecl,
    EndpointDecl,
    WorkflowDecl,
    JobDecl,
    StringLiteral,
    NumberLiteral,
    BoolLiteral,
    Identifier,
    ArrayLiteral,
    FunctionCall,
    BinaryExpr,
    UnaryExpr,
}

impl NodeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Program => "Program",
            Self::VarDecl => "VarDecl",
            Self::Assignment => "Assignment",
            Self::ExprStmt => "ExprStmt",
            Self::IfStmt => "IfStmt",
            Self::ForLoop => "ForLoop",
            Self::FunctionDecl => "FunctionDecl",
            Self::ExecBlock => "ExecBlock",
            Self::Block => "Block",
            Self::ReturnStmt => "ReturnStmt",
            Self::ConfigDecl => "ConfigDecl",
            Self::DatabaseBlock => "DatabaseBlock",
            Self::ModelDecl => "ModelDecl",
            Self::CollectionDecl => "CollectionDecl",
            Self::AuthDecl => "AuthDecl",
            Self::RoleDecl => "RoleDecl",
            Self::MiddlewareDecl => "MiddlewareDecl",
            Self::EventDecl => "EventDecl",
            Self::EventHandlerDecl => "EventHandlerDecl",
            Self::IntegrationDecl => "IntegrationDecl",
            Self::WebhookDecl => "WebhookDecl",
            Self::EndpointDecl => "EndpointDecl",
            Self::WorkflowDecl => "WorkflowDecl",
            Self::JobDecl => "JobDecl",
            Self::StringLiteral => "StringLiteral",
            Self::NumberLiteral => "NumberLiteral",
            Self::BoolLiteral => "BoolLiteral",
            Self::Identifier => "Identifier",
            Self::ArrayLiteral => "ArrayLiteral",
            Self::FunctionCall => "FunctionCall",
            Self::BinaryExpr => "BinaryExpr",
            Self::UnaryExpr => "UnaryExpr",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// General statements
// ============================================================================

/// `var name [= value]`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VarDecl {
    pub pos: Position,
    pub name: String,
    pub value: Option<Expr>,
}

/// `name = value`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Assignment {
    pub pos: Position,
    pub name: String,
    pub value: Expr,
}

/// A call evaluated for its effect.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExprStmt {
    pub pos: Position,
    pub expr: Expr,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IfStmt {
    pub pos: Position,
    pub condition: Expr,
    pub then_block: Block,
    /// `else if` chains are lowered to an else block holding a single `IfStmt`.
    pub else_block: Option<Block>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForLoop {
    pub pos: Position,
    pub variable: String,
    pub iterable: Expr,
    pub body: Block,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunctionDecl {
    pub pos: Position,
    pub name: String,
    pub params: Vec<String>,
    pub body: Block,
}

/// Raw shell text captured verbatim from an `exec { ... }` body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecBlock {
    pub pos: Position,
    pub command: String,
}

/// A braced statement list. Introduces a scope.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Block {
    pub pos: Position,
    pub statements: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReturnStmt {
    pub pos: Position,
    pub value: Option<Expr>,
}

// ============================================================================
// Data declarations
// ============================================================================

/// `key: value` entry inside a declaration body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Property {
    pub pos: Position,
    pub key: String,
    pub value: Expr,
}

/// Finds a property by key.
pub fn find_property<'a>(properties: &'a [Property], key: &str) -> Option<&'a Property> {
    properties.iter().find(|p| p.key == key)
}

/// Returns the string value of a property, if present and a string literal.
pub fn property_str<'a>(properties: &'a [Property], key: &str) -> Option<&'a str> {
    find_property(properties, key).and_then(|p| p.value.as_str())
}

/// Storage engines a database block or config can name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum DatabaseEngine {
    #[default]
    Postgres,
    Mysql,
    Sqlite,
    Mongodb,
}

impl DatabaseEngine {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Some(Self::Postgres),
            "mysql" => Some(Self::Mysql),
            "sqlite" => Some(Self::Sqlite),
            "mongodb" | "mongo" => Some(Self::Mongodb),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Postgres => "postgres",
            Self::Mysql => "mysql",
            Self::Sqlite => "sqlite",
            Self::Mongodb => "mongodb",
        }
    }

    /// Document engines use collections; the rest use relational models.
    pub fn is_document(self) -> bool {
        matches!(self, Self::Mongodb)
    }
}

impl fmt::Display for DatabaseEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `config { ... }`. `engine` is lowered from the `database_type` property.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfigDecl {
    pub pos: Position,
    pub engine: DatabaseEngine,
    pub properties: Vec<Property>,
}

impl ConfigDecl {
    pub fn get(&self, key: &str) -> Option<&str> {
        property_str(&self.properties, key)
    }
}

/// `database <engine> { model ... collection ... }`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatabaseBlock {
    pub pos: Position,
    pub engine: DatabaseEngine,
    /// Only `Stmt::Model` and `Stmt::Collection` are well formed here.
    pub declarations: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelDecl {
    pub pos: Position,
    pub name: String,
    pub description: Option<String>,
    pub fields: Vec<FieldDecl>,
    pub indexes: Vec<IndexDecl>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectionDecl {
    pub pos: Position,
    pub name: String,
    pub description: Option<String>,
    pub fields: Vec<FieldDecl>,
    pub indexes: Vec<IndexDecl>,
}

/// A model or collection field. `fields` holds embedded-document members.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldDecl {
    pub pos: Position,
    pub name: String,
    pub field_type: String,
    pub modifiers: Vec<FieldModifier>,
    pub fields: Vec<FieldDecl>,
}

/// `@name` or `@name(argument)` after a field type.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldModifier {
    pub pos: Position,
    pub name: String,
    pub argument: Option<String>,
}

/// `index [a, b]` or `index unique [a]`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexDecl {
    pub pos: Position,
    pub fields: Vec<String>,
    pub unique: bool,
}

// ============================================================================
// Access control
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuthDecl {
    pub pos: Position,
    pub provider: Option<String>,
    pub properties: Vec<Property>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoleDecl {
    pub pos: Position,
    pub name: String,
    pub properties: Vec<Property>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MiddlewareDecl {
    pub pos: Position,
    pub name: String,
    pub properties: Vec<Property>,
}

// ============================================================================
// Events, integrations and webhooks
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventDecl {
    pub pos: Position,
    pub name: String,
    pub schema: Option<Vec<SchemaField>>,
}

/// Event payload field; a trailing `?` on the type marks it optional.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchemaField {
    pub pos: Position,
    pub name: String,
    pub field_type: String,
    pub required: bool,
}

/// `on <event> -> <action> <target> [async]`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventHandlerDecl {
    pub pos: Position,
    pub event: String,
    pub action: String,
    pub target: String,
    pub is_async: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntegrationDecl {
    pub pos: Position,
    pub name: String,
    pub base_url: Option<String>,
    pub auth: Option<IntegrationAuth>,
    pub circuit_breaker: Option<CircuitBreakerConfig>,
    /// Remaining properties other than `base_url`.
    pub properties: Vec<Property>,
}

/// `auth <kind> { ... }` inside an integration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntegrationAuth {
    pub pos: Position,
    pub kind: String,
    pub properties: Vec<Property>,
}

/// Missing numeric settings lower to 0 and a missing timeout to "".
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CircuitBreakerConfig {
    pub pos: Position,
    pub threshold: i64,
    pub timeout: String,
    pub max_concurrent: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WebhookDecl {
    pub pos: Position,
    pub name: String,
    pub url: Option<String>,
    pub events: Vec<String>,
    pub secret: Option<String>,
    pub properties: Vec<Property>,
}

// ============================================================================
// Endpoints
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
}

impl HttpMethod {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "GET" => Some(Self::Get),
            "POST" => Some(Self::Post),
            "PUT" => Some(Self::Put),
            "PATCH" => Some(Self::Patch),
            "DELETE" => Some(Self::Delete),
            "HEAD" => Some(Self::Head),
            "OPTIONS" => Some(Self::Options),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EndpointDecl {
    pub pos: Position,
    pub method: HttpMethod,
    pub path: String,
    pub description: Option<String>,
    pub handler: Option<String>,
    pub middleware: Vec<String>,
    pub role: Option<String>,
    pub annotations: Vec<Annotation>,
    pub request: Option<RequestSpec>,
    pub response: Option<ResponseSpec>,
    pub logic: Vec<LogicStep>,
}

/// `@name` or `@name(value)` preceding an endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Annotation {
    pub pos: Position,
    pub name: String,
    pub value: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RequestSource {
    Body,
    Query,
    Params,
    Headers,
    Form,
}

impl RequestSource {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "body" => Some(Self::Body),
            "query" => Some(Self::Query),
            "params" => Some(Self::Params),
            "headers" => Some(Self::Headers),
            "form" => Some(Self::Form),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Body => "body",
            Self::Query => "query",
            Self::Params => "params",
            Self::Headers => "headers",
            Self::Form => "form",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestSpec {
    pub pos: Position,
    pub type_name: String,
    pub source: Option<RequestSource>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponseSpec {
    pub pos: Position,
    pub type_name: String,
    pub status: i64,
}

/// One handler logic step: `action target [(args)] [{options}]`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogicStep {
    pub pos: Position,
    pub action: String,
    pub target: Option<StepArg>,
    pub args: Vec<StepArg>,
    pub options: Vec<StepOption>,
}

/// A logic-step word; `quoted` is set for string literals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepArg {
    pub value: String,
    pub quoted: bool,
}

impl StepArg {
    pub fn word(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            quoted: false,
        }
    }

    pub fn quoted(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            quoted: true,
        }
    }
}

impl fmt::Display for StepArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.quoted {
            write!(f, "{:?}", self.value)
        } else {
            f.write_str(&self.value)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepOption {
    pub key: String,
    pub value: StepArg,
}

// ============================================================================
// Workflows and jobs
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TriggerKind {
    Event,
    Schedule,
    Webhook,
    Manual,
}

impl TriggerKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Event => "event",
            Self::Schedule => "schedule",
            Self::Webhook => "webhook",
            Self::Manual => "manual",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trigger {
    pub pos: Position,
    pub kind: TriggerKind,
    pub value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetryPolicy {
    pub pos: Position,
    pub max_attempts: Option<i64>,
    pub backoff_coefficient: Option<f64>,
    pub initial_interval: Option<String>,
    pub max_interval: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StepKind {
    Activity,
    Parallel,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkflowStep {
    pub pos: Position,
    pub name: String,
    pub kind: StepKind,
    pub description: Option<String>,
    pub activity: Option<String>,
    pub input: Vec<Property>,
    pub timeout: Option<String>,
    pub retry: Option<RetryPolicy>,
    pub depends_on: Vec<String>,
    /// Branches of a parallel step; empty for activity steps.
    pub branches: Vec<WorkflowStep>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkflowDecl {
    pub pos: Position,
    pub name: String,
    pub description: Option<String>,
    pub trigger: Option<Trigger>,
    pub steps: Vec<WorkflowStep>,
    pub timeout: Option<String>,
    pub retry: Option<RetryPolicy>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobDecl {
    pub pos: Position,
    pub name: String,
    pub description: Option<String>,
    pub trigger: Option<Trigger>,
    pub steps: Vec<WorkflowStep>,
    pub timeout: Option<String>,
    pub retry: Option<RetryPolicy>,
    pub concurrency: Option<i64>,
}

// ============================================================================
// Expressions
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind")]
pub enum Expr {
    String(StringLiteral),
    Number(NumberLiteral),
    Bool(BoolLiteral),
    Ident(Identifier),
    Array(ArrayLiteral),
    Call(FunctionCall),
    Binary(BinaryExpr),
    Unary(UnaryExpr),
}

impl Expr {
    pub fn pos(&self) -> &Position {
        match self {
            Self::String(e) => &e.pos,
            Self::Number(e) => &e.pos,
            Self::Bool(e) => &e.pos,
            Self::Ident(e) => &e.pos,
            Self::Array(e) => &e.pos,
            Self::Call(e) => &e.pos,
            Self::Binary(e) => &e.pos,
            Self::Unary(e) => &e.pos,
        }
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            Self::String(_) => NodeKind::StringLiteral,
            Self::Number(_) => NodeKind::NumberLiteral,
            Self::Bool(_) => NodeKind::BoolLiteral,
            Self::Ident(_) => NodeKind::Identifier,
            Self::Array(_) => NodeKind::ArrayLiteral,
            Self::Call(_) => NodeKind::FunctionCall,
            Self::Binary(_) => NodeKind::BinaryExpr,
            Self::Unary(_) => NodeKind::UnaryExpr,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(&s.value),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(n.value),
            _ => None,
        }
    }

    pub fn string(value: impl Into<String>) -> Self {
        Self::String(StringLiteral {
            pos: Position::default(),
            value: value.into(),
        })
    }

    pub fn number(value: f64) -> Self {
        Self::Number(NumberLiteral {
            pos: Position::default(),
            value,
        })
    }

    pub fn boolean(value: bool) -> Self {
        Self::Bool(BoolLiteral {
            pos: Position::default(),
            value,
        })
    }

    pub fn ident(name: impl Into<String>) -> Self {
        Self::Ident(Identifier {
            pos: Position::default(),
            name: name.into(),
        })
    }

    pub fn binary(left: Expr, op: BinaryOp, right: Expr) -> Self {
        Self::Binary(BinaryExpr {
            pos: Position::default(),
            left: Box::new(left),
            op,
            right: Box::new(right),
        })
    }

    pub fn unary(op: UnaryOp, operand: Expr) -> Self {
        Self::Unary(UnaryExpr {
            pos: Position::default(),
            op,
            operand: Box::new(operand),
        })
    }

    pub fn call(name: impl Into<String>, args: Vec<Expr>) -> Self {
        Self::Call(FunctionCall {
            pos: Position::default(),
            name: name.into(),
            args,
        })
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => write!(f, "{:?}", s.value),
            Self::Number(n) => write!(f, "{}", n.value),
            Self::Bool(b) => write!(f, "{}", b.value),
            Self::Ident(i) => f.write_str(&i.name),
            Self::Array(a) => {
                f.write_str("[")?;
                for (i, e) in a.elements.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", e)?;
                }
                f.write_str("]")
            }
            Self::Call(c) => {
                write!(f, "{}(", c.name)?;
                for (i, e) in c.args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", e)?;
                }
                f.write_str(")")
            }
            Self::Binary(b) => write!(f, "({} {} {})", b.left, b.op, b.right),
            Self::Unary(u) => match u.op {
                UnaryOp::Not => write!(f, "(not {})", u.operand),
                UnaryOp::Neg => write!(f, "(-{})", u.operand),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StringLiteral {
    pub pos: Position,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NumberLiteral {
    pub pos: Position,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoolLiteral {
    pub pos: Position,
    pub value: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Identifier {
    pub pos: Position,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArrayLiteral {
    pub pos: Position,
    pub elements: Vec<Expr>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunctionCall {
    pub pos: Position,
    pub name: String,
    pub args: Vec<Expr>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BinaryExpr {
    pub pos: Position,
    pub left: Box<Expr>,
    pub op: BinaryOp,
    pub right: Box<Expr>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnaryExpr {
    pub pos: Position,
    pub op: UnaryOp,
    pub operand: Box<Expr>,
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl BinaryOp {
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "+" => Some(Self::Add),
            "-" => Some(Self::Sub),
            "*" => Some(Self::Mul),
            "/" => Some(Self::Div),
            "%" => Some(Self::Mod),
            "==" => Some(Self::Eq),
            "!=" => Some(Self::Ne),
            "<" => Some(Self::Lt),
            "<=" => Some(Self::Le),
            ">" => Some(Self::Gt),
            ">=" => Some(Self::Ge),
            "and" | "&&" => Some(Self::And),
            "or" | "||" => Some(Self::Or),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Mod => "%",
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::And => "and",
            Self::Or => "or",
        }
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            Self::Eq | Self::Ne | Self::Lt | Self::Le | Self::Gt | Self::Ge
        )
    }

    pub fn is_logical(self) -> bool {
        matches!(self, Self::And | Self::Or)
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unary operators. `!` and `not` both lower to `Not`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum UnaryOp {
    Not,
    Neg,
}

impl UnaryOp {
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "!" | "not" => Some(Self::Not),
            "-" => Some(Self::Neg),
            _ => None,
        }
    }
}
