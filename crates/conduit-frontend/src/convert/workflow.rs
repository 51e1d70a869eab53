//! Lowering for the workflow/job grammar.

use pest::iterators::Pair;

use super::{parse_int, parse_number, string_value, Ctx};
use crate::ast::*;
use crate::errors::FrontendError;
use crate::grammar::workflow::Rule;

type Result<T> = std::result::Result<T, FrontendError>;

/// Members shared by workflows and jobs.
#[derive(Default)]
struct FlowParts {
    name: String,
    description: Option<String>,
    trigger: Option<Trigger>,
    steps: Vec<WorkflowStep>,
    timeout: Option<String>,
    retry: Option<RetryPolicy>,
    concurrency: Option<i64>,
}

/// Lowers a `workflow_file` pair into a `Workflow` or `Job` statement.
pub fn build_flow_file(ctx: Ctx<'_, '_>, pair: Pair<'_, Rule>) -> Result<Stmt> {
    let span = pair.as_span();
    for p in pair.into_inner() {
        match p.as_rule() {
            Rule::workflow_decl => {
                let pos = ctx.pos(p.as_span());
                let parts = build_parts(ctx, p, false)?;
                return Ok(Stmt::Workflow(WorkflowDecl {
                    pos,
                    name: parts.name,
                    description: parts.description,
                    trigger: parts.trigger,
                    steps: parts.steps,
                    timeout: parts.timeout,
                    retry: parts.retry,
                }));
            }
            Rule::job_decl => {
                let pos = ctx.pos(p.as_span());
                let parts = build_parts(ctx, p, true)?;
                return Ok(Stmt::Job(JobDecl {
                    pos,
                    name: parts.name,
                    description: parts.description,
                    trigger: parts.trigger,
                    steps: parts.steps,
                    timeout: parts.timeout,
                    retry: parts.retry,
                    concurrency: parts.concurrency,
                }));
            }
            _ => {}
        }
    }
    Err(ctx.error(span, "expected workflow or job declaration"))
}

fn build_parts(ctx: Ctx<'_, '_>, pair: Pair<'_, Rule>, is_job: bool) -> Result<FlowParts> {
    let mut parts = FlowParts::default();
    for p in pair.into_inner() {
        match p.as_rule() {
            Rule::ident => parts.name = p.as_str().to_string(),
            Rule::description_prop => parts.description = first_string(p),
            Rule::trigger_prop => parts.trigger = Some(build_trigger(ctx, p)?),
            Rule::schedule_prop => {
                parts.trigger = Some(Trigger {
                    pos: ctx.pos(p.as_span()),
                    kind: TriggerKind::Schedule,
                    value: first_string(p),
                });
            }
            Rule::timeout_prop => parts.timeout = first_string(p),
            Rule::concurrency_prop => {
                if !is_job {
                    return Err(ctx.error(p.as_span(), "concurrency is only allowed on jobs"));
                }
                let span = p.as_span();
                let value = p
                    .into_inner()
                    .find(|i| i.as_rule() == Rule::signed_number)
                    .ok_or_else(|| ctx.error(span, "concurrency needs a value"))?;
                parts.concurrency = Some(parse_int(ctx, &value, "concurrency")?);
            }
            Rule::retry_block => parts.retry = Some(build_retry(ctx, p)?),
            Rule::step_decl => parts.steps.push(build_step(ctx, p)?),
            Rule::parallel_step => parts.steps.push(build_parallel(ctx, p)?),
            _ => {}
        }
    }
    Ok(parts)
}

fn first_string(pair: Pair<'_, Rule>) -> Option<String> {
    pair.into_inner()
        .find(|p| p.as_rule() == Rule::string)
        .map(string_value)
}

fn build_trigger(ctx: Ctx<'_, '_>, pair: Pair<'_, Rule>) -> Result<Trigger> {
    let span = pair.as_span();
    let pos = ctx.pos(span);
    let mut kind = None;
    let mut value = None;
    for p in pair.into_inner() {
        match p.as_rule() {
            Rule::trigger_kind => {
                kind = Some(match p.as_str() {
                    "event" => TriggerKind::Event,
                    "schedule" => TriggerKind::Schedule,
                    "webhook" => TriggerKind::Webhook,
                    "manual" => TriggerKind::Manual,
                    other => {
                        return Err(ctx.error(p.as_span(), format!("unknown trigger kind '{}'", other)))
                    }
                });
            }
            Rule::string => value = Some(string_value(p)),
            _ => {}
        }
    }
    let kind = kind.ok_or_else(|| ctx.error(span, "trigger needs a kind"))?;
    Ok(Trigger { pos, kind, value })
}

fn build_retry(ctx: Ctx<'_, '_>, pair: Pair<'_, Rule>) -> Result<RetryPolicy> {
    let mut retry = RetryPolicy {
        pos: ctx.pos(pair.as_span()),
        max_attempts: None,
        backoff_coefficient: None,
        initial_interval: None,
        max_interval: None,
    };
    for entry in pair.into_inner().filter(|p| p.as_rule() == Rule::retry_entry) {
        let span = entry.as_span();
        let mut inner = entry.into_inner();
        let key = inner
            .next()
            .ok_or_else(|| ctx.error(span, "retry entry needs a key"))?;
        let value = inner
            .next()
            .ok_or_else(|| ctx.error(span, format!("retry '{}' needs a value", key.as_str())))?;
        let is_number = value.as_rule() == Rule::signed_number;
        match (key.as_str(), is_number) {
            ("max_attempts", true) => retry.max_attempts = Some(parse_int(ctx, &value, "max_attempts")?),
            ("backoff_coefficient", true) => {
                retry.backoff_coefficient = Some(parse_number(ctx, &value)?)
            }
            ("initial_interval", false) => retry.initial_interval = Some(string_value(value)),
            ("max_interval", false) => retry.max_interval = Some(string_value(value)),
            (k, true) => {
                return Err(ctx.error(value.as_span(), format!("retry '{}' must be a duration string", k)))
            }
            (k, false) => {
                return Err(ctx.error(value.as_span(), format!("retry '{}' must be a number", k)))
            }
        }
    }
    Ok(retry)
}

fn new_step(pos: Position, kind: StepKind) -> WorkflowStep {
    WorkflowStep {
        pos,
        name: String::new(),
        kind,
        description: None,
        activity: None,
        input: Vec::new(),
        timeout: None,
        retry: None,
        depends_on: Vec::new(),
        branches: Vec::new(),
    }
}

fn build_step(ctx: Ctx<'_, '_>, pair: Pair<'_, Rule>) -> Result<WorkflowStep> {
    let mut step = new_step(ctx.pos(pair.as_span()), StepKind::Activity);
    for p in pair.into_inner() {
        match p.as_rule() {
            Rule::ident => step.name = p.as_str().to_string(),
            Rule::description_prop => step.description = first_string(p),
            Rule::activity_prop => {
                step.activity = p
                    .into_inner()
                    .find(|i| i.as_rule() == Rule::ident)
                    .map(|i| i.as_str().to_string());
            }
            Rule::input_block => {
                for entry in p.into_inner().filter(|e| e.as_rule() == Rule::input_entry) {
                    step.input.push(build_input_entry(ctx, entry)?);
                }
            }
            Rule::timeout_prop => step.timeout = first_string(p),
            Rule::retry_block => step.retry = Some(build_retry(ctx, p)?),
            Rule::depends_prop => {
                step.depends_on = p
                    .into_inner()
                    .filter(|i| i.as_rule() == Rule::ident)
                    .map(|i| i.as_str().to_string())
                    .collect();
            }
            _ => {}
        }
    }
    Ok(step)
}

fn build_parallel(ctx: Ctx<'_, '_>, pair: Pair<'_, Rule>) -> Result<WorkflowStep> {
    let mut step = new_step(ctx.pos(pair.as_span()), StepKind::Parallel);
    for p in pair.into_inner() {
        match p.as_rule() {
            Rule::ident => step.name = p.as_str().to_string(),
            Rule::description_prop => step.description = first_string(p),
            Rule::step_decl => step.branches.push(build_step(ctx, p)?),
            _ => {}
        }
    }
    Ok(step)
}

fn build_input_entry(ctx: Ctx<'_, '_>, pair: Pair<'_, Rule>) -> Result<Property> {
    let pos = ctx.pos(pair.as_span());
    let span = pair.as_span();
    let mut inner = pair.into_inner();
    let key = inner
        .next()
        .ok_or_else(|| ctx.error(span, "input entry needs a key"))?
        .as_str()
        .to_string();
    let value = inner
        .next()
        .ok_or_else(|| ctx.error(span, format!("input '{}' needs a value", key)))?;
    Ok(Property {
        pos,
        key,
        value: build_value(ctx, value)?,
    })
}

fn build_value(ctx: Ctx<'_, '_>, pair: Pair<'_, Rule>) -> Result<Expr> {
    let pos = ctx.pos(pair.as_span());
    let expr = match pair.as_rule() {
        Rule::string => Expr::String(StringLiteral {
            pos,
            value: string_value(pair),
        }),
        Rule::signed_number => Expr::Number(NumberLiteral {
            pos,
            value: parse_number(ctx, &pair)?,
        }),
        Rule::bool_lit => Expr::Bool(BoolLiteral {
            pos,
            value: pair.as_str() == "true",
        }),
        Rule::ident => Expr::Ident(Identifier {
            pos,
            name: pair.as_str().to_string(),
        }),
        Rule::array_value => Expr::Array(ArrayLiteral {
            pos,
            elements: pair
                .into_inner()
                .map(|p| build_value(ctx, p))
                .collect::<Result<Vec<_>>>()?,
        }),
        other => {
            return Err(ctx.error(pair.as_span(), format!("unexpected {:?} in value position", other)))
        }
    };
    Ok(expr)
}
