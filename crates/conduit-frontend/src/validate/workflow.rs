//! Workflow and job checks: triggers, timeouts, steps and retry policies.
//!
//! Workflows and jobs share every rule except two: a job must have a trigger,
//! and only jobs carry a concurrency limit.

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

use super::formats::{is_event_name, parse_duration, validate_cron};
use super::Diagnostics;
use crate::ast::*;

/// Borrowed view over the members workflows and jobs have in common.
struct Flow<'p> {
    kind: &'static str,
    pos: &'p Position,
    name: &'p str,
    trigger: Option<&'p Trigger>,
    steps: &'p [WorkflowStep],
    timeout: Option<&'p str>,
    retry: Option<&'p RetryPolicy>,
}

pub fn check_program(program: &Program, diags: &mut Diagnostics) {
    let before = diags.len();
    let mut count = 0usize;

    for w in program.workflows() {
        count += 1;
        check_flow(
            &Flow {
                kind: "workflow",
                pos: &w.pos,
                name: &w.name,
                trigger: w.trigger.as_ref(),
                steps: &w.steps,
                timeout: w.timeout.as_deref(),
                retry: w.retry.as_ref(),
            },
            diags,
        );
    }

    for j in program.jobs() {
        count += 1;
        let flow = Flow {
            kind: "job",
            pos: &j.pos,
            name: &j.name,
            trigger: j.trigger.as_ref(),
            steps: &j.steps,
            timeout: j.timeout.as_deref(),
            retry: j.retry.as_ref(),
        };
        if flow.trigger.is_none() {
            diags.semantic(
                &j.pos,
                format!("job '{}' requires a trigger or schedule", j.name),
            );
        }
        check_flow(&flow, diags);
        if let Some(n) = j.concurrency {
            if n <= 0 {
                diags.semantic(
                    &j.pos,
                    format!("job '{}' concurrency must be positive, got {}", j.name, n),
                );
            }
        }
    }

    debug!(flows = count, errors = diags.len() - before, "workflow pass finished");
}

fn check_flow(flow: &Flow<'_>, diags: &mut Diagnostics) {
    if let Some(trigger) = flow.trigger {
        check_trigger(flow, trigger, diags);
    }
    if let Some(timeout) = flow.timeout {
        check_duration(flow.pos, &format!("{} '{}' timeout", flow.kind, flow.name), timeout, diags);
    }
    if let Some(retry) = flow.retry {
        check_retry(retry, diags);
    }

    // Every step name in the flow, parallel branches included.
    let mut names: FxHashMap<&str, &Position> = FxHashMap::default();
    for step in flow.steps.iter().flat_map(|s| std::iter::once(s).chain(&s.branches)) {
        match names.get(step.name.as_str()) {
            Some(first) => diags.semantic(
                &step.pos,
                format!(
                    "duplicate step '{}' in {} '{}' (first declared at {})",
                    step.name, flow.kind, flow.name, first
                ),
            ),
            None => {
                names.insert(&step.name, &step.pos);
            }
        }
    }
    let known: FxHashSet<&str> = names.keys().copied().collect();

    for step in flow.steps {
        check_step(flow, step, &known, diags);
    }
}

fn check_trigger(flow: &Flow<'_>, trigger: &Trigger, diags: &mut Diagnostics) {
    let value = trigger.value.as_deref().unwrap_or("");
    match trigger.kind {
        TriggerKind::Event | TriggerKind::Schedule if value.is_empty() => diags.semantic(
            &trigger.pos,
            format!(
                "{} trigger of {} '{}' requires a value",
                trigger.kind.as_str(),
                flow.kind,
                flow.name
            ),
        ),
        TriggerKind::Event if !is_event_name(value) => diags.semantic(
            &trigger.pos,
            format!("invalid event name '{}' in trigger of {} '{}'", value, flow.kind, flow.name),
        ),
        TriggerKind::Schedule => {
            if let Err(err) = validate_cron(value) {
                diags.semantic(
                    &trigger.pos,
                    format!("invalid cron expression '{}': {}", value, err),
                );
            }
        }
        _ => {}
    }
}

fn check_duration(pos: &Position, what: &str, value: &str, diags: &mut Diagnostics) {
    if let Err(err) = parse_duration(value) {
        diags.semantic(pos, format!("invalid {} '{}': {}", what, value, err));
    }
}

fn check_retry(retry: &RetryPolicy, diags: &mut Diagnostics) {
    if let Some(n) = retry.max_attempts {
        if n < 0 {
            diags.semantic(&retry.pos, format!("retry max_attempts must not be negative, got {}", n));
        }
    }
    if let Some(b) = retry.backoff_coefficient {
        if b < 0.0 {
            diags.semantic(
                &retry.pos,
                format!("retry backoff_coefficient must not be negative, got {}", b),
            );
        }
    }
    if let Some(v) = &retry.initial_interval {
        check_duration(&retry.pos, "retry initial_interval", v, diags);
    }
    if let Some(v) = &retry.max_interval {
        check_duration(&retry.pos, "retry max_interval", v, diags);
    }
}

fn check_step(flow: &Flow<'_>, step: &WorkflowStep, known: &FxHashSet<&str>, diags: &mut Diagnostics) {
    match step.kind {
        StepKind::Parallel => {
            if step.branches.is_empty() {
                diags.semantic(
                    &step.pos,
                    format!("parallel step '{}' has no branches", step.name),
                );
            }
            for branch in &step.branches {
                check_step(flow, branch, known, diags);
            }
        }
        StepKind::Activity => {
            if step.activity.as_deref().map_or(true, str::is_empty) {
                diags.semantic(
                    &step.pos,
                    format!("step '{}' in {} '{}' requires an activity", step.name, flow.kind, flow.name),
                );
            }
        }
    }
    if let Some(timeout) = &step.timeout {
        check_duration(&step.pos, &format!("step '{}' timeout", step.name), timeout, diags);
    }
    if let Some(retry) = &step.retry {
        check_retry(retry, diags);
    }
    for dep in &step.depends_on {
        if *dep == step.name {
            diags.semantic(&step.pos, format!("step '{}' depends on itself", step.name));
        } else if !known.contains(dep.as_str()) {
            diags.semantic(
                &step.pos,
                format!("step '{}' depends on unknown step '{}'", step.name, dep),
            );
        }
    }
}
