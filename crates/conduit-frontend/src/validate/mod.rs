//! # Semantic Validation
//!
//! Runs independent passes over a parsed [`Program`] and accumulates every
//! problem into one ordered list:
//!
//! - **Scope/type** ([`scope`]): lexical scopes, built-ins, call arity, type
//!   inference for loop iterables
//! - **Config/database** ([`database`]): engine consistency, model and
//!   collection fields, modifiers, indexes
//! - **Endpoint** ([`endpoint`]): route uniqueness, paths, annotations,
//!   middleware, request/response specs, logic steps
//! - **Workflow/job** ([`workflow`]): triggers, steps, retry policies
//! - **Event/integration/webhook** ([`integration`])
//!
//! Validation never stops at the first error. A malformed node only skips
//! the checks local to it.
//!
//! ## Example
//!
//! ```rust
//! use conduit_frontend::parser::parse_program;
//! use conduit_frontend::validate::Validator;
//!
//! let program = parse_program("var x = 1\nx = x + 1").unwrap();
//! assert!(Validator::new().validate(&program).is_ok());
//! ```

pub mod database;
pub mod endpoint;
pub mod formats;
pub mod integration;
pub mod scope;
pub mod workflow;

use rustc_hash::{FxHashMap, FxHashSet};
use serde::Deserialize;
use tracing::debug;

use crate::ast::*;
use crate::errors::{ErrorCategory, FrontendError, ValidationError, ValidationErrors};

/// Known names for the membership checks of the endpoint pass.
///
/// `None` disables the check for that list.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Registry {
    pub middleware: Option<FxHashSet<String>>,
    pub annotations: Option<FxHashSet<String>>,
    pub actions: Option<FxHashSet<String>>,
}

fn name_set<I, S>(names: I) -> Option<FxHashSet<String>>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    Some(names.into_iter().map(Into::into).collect())
}

impl Registry {
    pub fn with_middleware<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.middleware = name_set(names);
        self
    }

    pub fn with_annotations<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.annotations = name_set(names);
        self
    }

    pub fn with_actions<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.actions = name_set(names);
        self
    }
}

/// Ordered error sink shared by every pass.
#[derive(Debug, Default)]
pub struct Diagnostics {
    pub(crate) errors: Vec<ValidationError>,
}

impl Diagnostics {
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn push(&mut self, pos: &Position, category: ErrorCategory, message: impl Into<String>) {
        self.errors
            .push(ValidationError::new(pos.clone(), category, message));
    }

    pub fn scope(&mut self, pos: &Position, message: impl Into<String>) {
        self.push(pos, ErrorCategory::Scope, message);
    }

    pub fn type_check(&mut self, pos: &Position, message: impl Into<String>) {
        self.push(pos, ErrorCategory::TypeCheck, message);
    }

    pub fn function(&mut self, pos: &Position, message: impl Into<String>) {
        self.push(pos, ErrorCategory::Function, message);
    }

    pub fn semantic(&mut self, pos: &Position, message: impl Into<String>) {
        self.push(pos, ErrorCategory::Semantic, message);
    }

    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationErrors(self.errors))
        }
    }
}

/// Top-level declaration names, indexed once and shared by the domain passes.
#[derive(Debug, Default)]
pub struct Declarations<'p> {
    pub roles: FxHashMap<&'p str, &'p Position>,
    pub middleware: FxHashMap<&'p str, &'p Position>,
    pub events: FxHashMap<&'p str, &'p Position>,
    pub workflows: FxHashMap<&'p str, &'p Position>,
    pub jobs: FxHashMap<&'p str, &'p Position>,
    pub integrations: FxHashMap<&'p str, &'p Position>,
    pub webhooks: FxHashMap<&'p str, &'p Position>,
}

impl<'p> Declarations<'p> {
    /// Indexes top-level declarations, reporting duplicate names.
    pub fn collect(program: &'p Program, diags: &mut Diagnostics) -> Self {
        let mut decls = Self::default();
        for stmt in &program.statements {
            let (map, kind, name, pos) = match stmt {
                Stmt::Role(r) => (&mut decls.roles, "role", r.name.as_str(), &r.pos),
                Stmt::Middleware(m) => (&mut decls.middleware, "middleware", m.name.as_str(), &m.pos),
                Stmt::Event(e) => (&mut decls.events, "event", e.name.as_str(), &e.pos),
                Stmt::Workflow(w) => (&mut decls.workflows, "workflow", w.name.as_str(), &w.pos),
                Stmt::Job(j) => (&mut decls.jobs, "job", j.name.as_str(), &j.pos),
                Stmt::Integration(i) => {
                    (&mut decls.integrations, "integration", i.name.as_str(), &i.pos)
                }
                Stmt::Webhook(w) => (&mut decls.webhooks, "webhook", w.name.as_str(), &w.pos),
                _ => continue,
            };
            if let Some(first) = map.get(name) {
                diags.semantic(
                    pos,
                    format!("duplicate {} '{}' (first declared at {})", kind, name, first),
                );
            } else {
                map.insert(name, pos);
            }
        }
        decls
    }
}

/// Validator for exactly one compile unit.
///
/// `validate` consumes the validator; build a new one per program.
#[derive(Debug, Default)]
pub struct Validator {
    registry: Registry,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_registry(registry: Registry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Runs every pass and returns all errors found, in discovery order.
    pub fn validate(self, program: &Program) -> Result<(), ValidationErrors> {
        debug!(statements = program.statements.len(), "validating program");
        let mut diags = Diagnostics::default();
        let decls = Declarations::collect(program, &mut diags);
        scope::check_program(program, &mut diags);
        database::check_program(program, &mut diags);
        endpoint::check_program(program, &self.registry, &decls, &mut diags);
        workflow::check_program(program, &mut diags);
        integration::check_program(program, &decls, &mut diags);
        debug!(errors = diags.len(), "validation finished");
        diags.into_result()
    }
}

/// Validates with an empty registry.
pub fn validate_program(program: &Program) -> Result<(), FrontendError> {
    Validator::new().validate(program).map_err(FrontendError::from)
}
