//! Scope resolution and type inference for general statements.
//!
//! Scopes live in an arena ([`SymbolTable`]) and refer to their parent by
//! [`ScopeId`]; the checker keeps the current scope as an index. The global
//! scope is seeded with the built-in functions.

use std::fmt;

use rustc_hash::FxHashMap;
use tracing::debug;

use super::Diagnostics;
use crate::ast::*;

/// Inferred value types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Type {
    String,
    Number,
    Bool,
    Array,
    Function,
    Unknown,
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Bool => "bool",
            Self::Array => "array",
            Self::Function => "function",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Built-in functions: name, arity, result type.
pub const BUILTINS: &[(&str, usize, Type)] = &[
    ("print", 1, Type::Unknown),
    ("len", 1, Type::Number),
    ("upper", 1, Type::String),
    ("lower", 1, Type::String),
    ("trim", 1, Type::String),
    ("concat", 2, Type::String),
    ("env", 1, Type::String),
    ("to_string", 1, Type::String),
    ("to_number", 1, Type::Number),
    ("contains", 2, Type::Bool),
    ("split", 2, Type::Array),
    ("join", 2, Type::String),
    ("keys", 1, Type::Array),
    ("range", 2, Type::Array),
    ("now", 0, Type::Number),
    ("uuid", 0, Type::String),
];

#[derive(Debug, Clone, PartialEq)]
pub enum SymbolKind {
    Variable,
    Parameter,
    Function { arity: usize, returns: Type },
}

#[derive(Debug, Clone)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    pub ty: Type,
    pub pos: Position,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScopeId(usize);

#[derive(Debug, Default)]
struct Scope {
    parent: Option<ScopeId>,
    symbols: FxHashMap<String, Symbol>,
}

/// Arena of lexical scopes.
#[derive(Debug)]
pub struct SymbolTable {
    scopes: Vec<Scope>,
    current: ScopeId,
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolTable {
    /// A table holding only the global scope with every built-in declared.
    pub fn new() -> Self {
        let mut table = Self {
            scopes: vec![Scope::default()],
            current: ScopeId(0),
        };
        for &(name, arity, returns) in BUILTINS {
            // Built-in names are distinct, so this cannot collide.
            let _ = table.declare(Symbol {
                name: name.to_string(),
                kind: SymbolKind::Function { arity, returns },
                ty: Type::Function,
                pos: Position::default(),
            });
        }
        table
    }

    pub fn current(&self) -> ScopeId {
        self.current
    }

    /// Opens a child of the current scope and makes it current.
    pub fn push(&mut self) -> ScopeId {
        let id = ScopeId(self.scopes.len());
        self.scopes.push(Scope {
            parent: Some(self.current),
            symbols: FxHashMap::default(),
        });
        self.current = id;
        id
    }

    /// Returns to the parent scope. The global scope is never popped.
    pub fn pop(&mut self) {
        if let Some(parent) = self.scopes[self.current.0].parent {
            self.current = parent;
        }
    }

    /// Declares in the current scope. On a same-scope collision returns the
    /// existing symbol and leaves the table unchanged.
    pub fn declare(&mut self, symbol: Symbol) -> Result<(), &Symbol> {
        let scope = &mut self.scopes[self.current.0];
        if scope.symbols.contains_key(&symbol.name) {
            return Err(&scope.symbols[&symbol.name]);
        }
        scope.symbols.insert(symbol.name.clone(), symbol);
        Ok(())
    }

    /// Resolves through the scope chain, innermost first.
    pub fn lookup(&self, name: &str) -> Option<&Symbol> {
        let mut id = Some(self.current);
        while let Some(ScopeId(i)) = id {
            let scope = &self.scopes[i];
            if let Some(sym) = scope.symbols.get(name) {
                return Some(sym);
            }
            id = scope.parent;
        }
        None
    }
}

/// Runs the scope/type pass over every statement.
pub fn check_program(program: &Program, diags: &mut Diagnostics) {
    let before = diags.len();
    let mut checker = ScopeChecker {
        table: SymbolTable::new(),
        diags,
        function_depth: 0,
        nesting: 0,
    };
    checker.check_statements(&program.statements);
    let found = checker.diags.len() - before;
    debug!(errors = found, "scope/type pass finished");
}

struct ScopeChecker<'d> {
    table: SymbolTable,
    diags: &'d mut Diagnostics,
    function_depth: usize,
    nesting: usize,
}

impl<'d> ScopeChecker<'d> {
    fn check_statements(&mut self, statements: &[Stmt]) {
        for stmt in statements {
            self.check_stmt(stmt);
        }
    }

    fn in_child_scope(&mut self, f: impl FnOnce(&mut Self)) {
        self.table.push();
        self.nesting += 1;
        f(self);
        self.nesting -= 1;
        self.table.pop();
    }

    fn declare(&mut self, name: &str, kind: SymbolKind, ty: Type, pos: &Position) {
        let symbol = Symbol {
            name: name.to_string(),
            kind,
            ty,
            pos: pos.clone(),
        };
        if let Err(existing) = self.table.declare(symbol) {
            let message = if existing.pos.is_valid() {
                format!(
                    "duplicate declaration of '{}' (previously declared at {})",
                    name, existing.pos
                )
            } else {
                format!("duplicate declaration of '{}' shadows a built-in in the same scope", name)
            };
            self.diags.scope(pos, message);
        }
    }

    fn check_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::VarDecl(v) => {
                let ty = v.value.as_ref().map_or(Type::Unknown, |e| self.infer(e));
                self.declare(&v.name, SymbolKind::Variable, ty, &v.pos);
            }
            Stmt::Assignment(a) => {
                match self.table.lookup(&a.name) {
                    None => self
                        .diags
                        .scope(&a.pos, format!("undefined variable '{}'", a.name)),
                    Some(sym) if matches!(sym.kind, SymbolKind::Function { .. }) => self
                        .diags
                        .type_check(&a.pos, format!("cannot assign to function '{}'", a.name)),
                    Some(_) => {}
                }
                self.infer(&a.value);
            }
            Stmt::ExprStmt(e) => {
                self.infer(&e.expr);
            }
            Stmt::If(i) => {
                self.infer(&i.condition);
                self.in_child_scope(|c| c.check_statements(&i.then_block.statements));
                if let Some(else_block) = &i.else_block {
                    self.in_child_scope(|c| c.check_statements(&else_block.statements));
                }
            }
            Stmt::For(f) => {
                let ty = self.infer(&f.iterable);
                if !matches!(ty, Type::Array | Type::Unknown) {
                    self.diags.type_check(
                        f.iterable.pos(),
                        format!("cannot iterate over non-array value of type {}", ty),
                    );
                }
                self.in_child_scope(|c| {
                    c.declare(&f.variable, SymbolKind::Variable, Type::Unknown, &f.pos);
                    c.check_statements(&f.body.statements);
                });
            }
            Stmt::Function(func) => {
                self.declare(
                    &func.name,
                    SymbolKind::Function {
                        arity: func.params.len(),
                        returns: Type::Unknown,
                    },
                    Type::Function,
                    &func.pos,
                );
                self.function_depth += 1;
                self.in_child_scope(|c| {
                    for param in &func.params {
                        c.declare(param, SymbolKind::Parameter, Type::Unknown, &func.pos);
                    }
                    c.check_statements(&func.body.statements);
                });
                self.function_depth -= 1;
            }
            Stmt::Exec(_) => {}
            Stmt::Block(b) => self.in_child_scope(|c| c.check_statements(&b.statements)),
            Stmt::Return(r) => {
                if self.function_depth == 0 {
                    self.diags.semantic(&r.pos, "return outside of a function");
                }
                if let Some(value) = &r.value {
                    self.infer(value);
                }
            }
            Stmt::Config(_)
            | Stmt::Database(_)
            | Stmt::Model(_)
            | Stmt::Collection(_)
            | Stmt::Auth(_)
            | Stmt::Role(_)
            | Stmt::Middleware(_)
            | Stmt::Event(_)
            | Stmt::EventHandler(_)
            | Stmt::Integration(_)
            | Stmt::Webhook(_)
            | Stmt::Endpoint(_)
            | Stmt::Workflow(_)
            | Stmt::Job(_) => {
                if self.nesting > 0 {
                    self.diags.semantic(
                        stmt.pos(),
                        format!("{} is only allowed at the top level", stmt.kind()),
                    );
                }
            }
        }
    }

    /// Bottom-up inference; reports unresolved names and bad calls on the way.
    fn infer(&mut self, expr: &Expr) -> Type {
        match expr {
            Expr::String(_) => Type::String,
            Expr::Number(_) => Type::Number,
            Expr::Bool(_) => Type::Bool,
            Expr::Ident(id) => match self.table.lookup(&id.name) {
                Some(sym) => sym.ty,
                None => {
                    self.diags
                        .scope(&id.pos, format!("undefined variable '{}'", id.name));
                    Type::Unknown
                }
            },
            Expr::Array(arr) => {
                for e in &arr.elements {
                    self.infer(e);
                }
                Type::Array
            }
            Expr::Call(call) => {
                for arg in &call.args {
                    self.infer(arg);
                }
                let kind = self.table.lookup(&call.name).map(|s| s.kind.clone());
                match kind {
                    None => {
                        self.diags
                            .function(&call.pos, format!("undefined function '{}'", call.name));
                        Type::Unknown
                    }
                    Some(SymbolKind::Function { arity, returns }) => {
                        if arity != call.args.len() {
                            self.diags.function(
                                &call.pos,
                                format!(
                                    "wrong argument count for '{}': expected {}, got {}",
                                    call.name,
                                    arity,
                                    call.args.len()
                                ),
                            );
                        }
                        returns
                    }
                    Some(_) => {
                        self.diags
                            .function(&call.pos, format!("'{}' is not a function", call.name));
                        Type::Unknown
                    }
                }
            }
            Expr::Binary(b) => {
                let left = self.infer(&b.left);
                let right = self.infer(&b.right);
                if b.op.is_comparison() || b.op.is_logical() {
                    Type::Bool
                } else if b.op == BinaryOp::Add && (left == Type::String || right == Type::String) {
                    Type::String
                } else {
                    Type::Number
                }
            }
            Expr::Unary(u) => {
                self.infer(&u.operand);
                match u.op {
                    UnaryOp::Not => Type::Bool,
                    UnaryOp::Neg => Type::Number,
                }
            }
        }
    }
}

/// Infers the type of `expr` in a fresh global scope. Used by tests and tools
/// that only need the type rules.
pub fn infer_type(expr: &Expr) -> Type {
    let mut diags = Diagnostics::default();
    let mut checker = ScopeChecker {
        table: SymbolTable::new(),
        diags: &mut diags,
        function_depth: 0,
        nesting: 0,
    };
    checker.infer(expr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorCategory;
    use crate::parser::parse_program;

    fn check(src: &str) -> Diagnostics {
        let program = parse_program(src).expect("parse");
        let mut diags = Diagnostics::default();
        check_program(&program, &mut diags);
        diags
    }

    fn messages(src: &str) -> Vec<String> {
        check(src).errors.into_iter().map(|e| e.message).collect()
    }

    // ============================================================================
    // Symbol table
    // ============================================================================

    #[test]
    fn symbol_table_resolves_through_parents() {
        let mut table = SymbolTable::new();
        let var = |name: &str| Symbol {
            name: name.to_string(),
            kind: SymbolKind::Variable,
            ty: Type::Number,
            pos: Position::default(),
        };
        table.declare(var("outer")).expect("declare outer");
        let global = table.current();
        table.push();
        table.declare(var("inner")).expect("declare inner");
        assert!(table.lookup("outer").is_some());
        assert!(table.lookup("len").is_some());
        table.pop();
        assert_eq!(table.current(), global);
        assert!(table.lookup("inner").is_none());
        assert!(table.declare(var("outer")).is_err());
    }

    // ============================================================================
    // Declarations and resolution
    // ============================================================================

    #[test]
    fn redeclaration_in_same_scope_fails() {
        let diags = check("var x = 1\nvar x = 2");
        assert_eq!(diags.len(), 1);
        assert_eq!(diags.errors[0].category, ErrorCategory::Scope);
        assert!(diags.errors[0].message.contains("duplicate declaration of 'x'"));
    }

    #[test]
    fn shadowing_in_nested_scope_is_allowed() {
        assert!(messages("var x = 1\n{ var x = \"s\" }\nif true { var x = 3 }").is_empty());
    }

    #[test]
    fn assignment_without_declaration_fails() {
        let msgs = messages("x = 1");
        assert_eq!(msgs, vec!["undefined variable 'x'"]);
    }

    #[test]
    fn loop_variable_is_invisible_after_loop() {
        let msgs = messages("var items = [1, 2]\nfor item in items { print(item) }\nprint(item)");
        assert_eq!(msgs, vec!["undefined variable 'item'"]);
    }

    #[test]
    fn function_params_are_local_and_recursion_resolves() {
        let src = "function fact(n) { if n < 2 { return 1 } return n * fact(n - 1) }\nprint(n)";
        assert_eq!(messages(src), vec!["undefined variable 'n'"]);
    }

    #[test]
    fn duplicate_parameters_are_duplicate_declarations() {
        let msgs = messages("function f(a, a) { return a }");
        assert!(msgs[0].contains("duplicate declaration of 'a'"));
    }

    // ============================================================================
    // Calls
    // ============================================================================

    #[test]
    fn call_arity_and_target_are_checked() {
        let diags = check("var s = \"x\"\nprint(len(s, s))\ns(1)\nmissing()");
        let msgs: Vec<_> = diags.errors.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(
            msgs,
            vec![
                "wrong argument count for 'len': expected 1, got 2",
                "'s' is not a function",
                "undefined function 'missing'",
            ]
        );
        assert!(diags
            .errors
            .iter()
            .all(|e| e.category == ErrorCategory::Function));
    }

    #[test]
    fn assigning_to_function_is_a_type_error() {
        let diags = check("function f() { }\nf = 1");
        assert_eq!(diags.errors[0].category, ErrorCategory::TypeCheck);
    }

    // ============================================================================
    // Type inference
    // ============================================================================

    #[test]
    fn inference_rules() {
        assert_eq!(infer_type(&Expr::string("a")), Type::String);
        let add = |l, r| Expr::binary(l, BinaryOp::Add, r);
        assert_eq!(infer_type(&add(Expr::string("a"), Expr::number(1.0))), Type::String);
        assert_eq!(infer_type(&add(Expr::number(1.0), Expr::number(2.0))), Type::Number);
        assert_eq!(
            infer_type(&Expr::binary(Expr::number(1.0), BinaryOp::Lt, Expr::number(2.0))),
            Type::Bool
        );
        assert_eq!(
            infer_type(&Expr::binary(Expr::string("a"), BinaryOp::Mul, Expr::number(2.0))),
            Type::Number
        );
        assert_eq!(infer_type(&Expr::unary(UnaryOp::Not, Expr::number(0.0))), Type::Bool);
        assert_eq!(infer_type(&Expr::unary(UnaryOp::Neg, Expr::boolean(true))), Type::Number);
        assert_eq!(infer_type(&Expr::call("split", vec![Expr::string("a,b"), Expr::string(",")])), Type::Array);
    }

    #[test]
    fn iterating_non_arrays_fails() {
        let msgs = messages("var n = 3\nfor i in n { }\nfor c in split(\"a b\", \" \") { }\nfunction f() { }\nfor x in f() { }");
        assert_eq!(msgs, vec!["cannot iterate over non-array value of type number"]);
    }

    // ============================================================================
    // Placement
    // ============================================================================

    #[test]
    fn return_outside_function_is_semantic_error() {
        let diags = check("return 1");
        assert_eq!(diags.errors[0].category, ErrorCategory::Semantic);
    }

    #[test]
    fn nested_declarations_are_rejected() {
        let msgs = messages("if true { role admin }");
        assert_eq!(msgs, vec!["RoleDecl is only allowed at the top level"]);
    }
}
