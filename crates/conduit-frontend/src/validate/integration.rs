//! Event, handler, integration and webhook checks.

use rustc_hash::FxHashSet;
use tracing::debug;

use super::formats::{is_event_name, parse_duration, validate_url};
use super::{Declarations, Diagnostics};
use crate::ast::*;

const SCHEMA_TYPES: &[&str] = &[
    "string", "number", "int", "integer", "float", "boolean", "bool", "object", "array", "date",
    "datetime", "timestamp", "uuid",
];

const HANDLER_ACTIONS: &[&str] = &["workflow", "integration", "emit", "webhook"];

/// Auth kind and the property keys it requires.
const AUTH_KINDS: &[(&str, &[&str])] = &[
    ("bearer", &["token"]),
    ("apikey", &["header", "value"]),
    ("basic", &["username", "password"]),
];

pub fn check_program(program: &Program, decls: &Declarations<'_>, diags: &mut Diagnostics) {
    let before = diags.len();
    for stmt in &program.statements {
        match stmt {
            Stmt::Event(e) => check_event(e, diags),
            Stmt::EventHandler(h) => check_handler(h, decls, diags),
            Stmt::Integration(i) => check_integration(i, diags),
            Stmt::Webhook(w) => check_webhook(w, diags),
            _ => {}
        }
    }
    debug!(errors = diags.len() - before, "integration pass finished");
}

fn check_event(event: &EventDecl, diags: &mut Diagnostics) {
    if !is_event_name(&event.name) {
        diags.semantic(
            &event.pos,
            format!(
                "invalid event name '{}' (expected lowercase dotted segments like user.created)",
                event.name
            ),
        );
    }
    let Some(schema) = &event.schema else {
        return;
    };
    let mut seen = FxHashSet::default();
    for field in schema {
        if !seen.insert(field.name.as_str()) {
            diags.semantic(
                &field.pos,
                format!("duplicate field '{}' in event '{}'", field.name, event.name),
            );
        }
        if !SCHEMA_TYPES.contains(&field.field_type.as_str()) {
            diags.semantic(
                &field.pos,
                format!(
                    "unknown type '{}' for field '{}' in event '{}'",
                    field.field_type, field.name, event.name
                ),
            );
        }
    }
}

fn check_handler(handler: &EventHandlerDecl, decls: &Declarations<'_>, diags: &mut Diagnostics) {
    if !decls.events.contains_key(handler.event.as_str()) {
        diags.semantic(
            &handler.pos,
            format!("handler references undefined event '{}'", handler.event),
        );
    }
    let declared = match handler.action.as_str() {
        "workflow" => &decls.workflows,
        "integration" => &decls.integrations,
        "webhook" => &decls.webhooks,
        "emit" => {
            if !is_event_name(&handler.target) {
                diags.semantic(
                    &handler.pos,
                    format!("invalid event name '{}' in emit target", handler.target),
                );
            }
            return;
        }
        other => {
            diags.semantic(
                &handler.pos,
                format!(
                    "unknown handler action '{}' (expected {})",
                    other,
                    HANDLER_ACTIONS.join(", ")
                ),
            );
            return;
        }
    };
    if !declared.contains_key(handler.target.as_str()) {
        diags.semantic(
            &handler.pos,
            format!("handler target {} '{}' is not declared", handler.action, handler.target),
        );
    }
}

fn check_integration(integration: &IntegrationDecl, diags: &mut Diagnostics) {
    let name = &integration.name;
    match integration.base_url.as_deref() {
        None => diags.semantic(
            &integration.pos,
            format!("integration '{}' requires a base_url", name),
        ),
        Some(url) => {
            if let Err(err) = validate_url(url) {
                diags.semantic(
                    &integration.pos,
                    format!("invalid base_url '{}' for integration '{}': {}", url, name, err),
                );
            }
        }
    }

    if let Some(auth) = &integration.auth {
        match AUTH_KINDS.iter().find(|(kind, _)| *kind == auth.kind) {
            None => diags.semantic(
                &auth.pos,
                format!("unsupported auth type '{}' for integration '{}'", auth.kind, name),
            ),
            Some((kind, required)) => {
                for key in *required {
                    if find_property(&auth.properties, key).is_none() {
                        diags.semantic(
                            &auth.pos,
                            format!("{} auth for integration '{}' requires '{}'", kind, name, key),
                        );
                    }
                }
            }
        }
    }

    if let Some(cb) = &integration.circuit_breaker {
        if cb.threshold <= 0 {
            diags.semantic(
                &cb.pos,
                format!("circuit breaker threshold for '{}' must be positive", name),
            );
        }
        if cb.max_concurrent <= 0 {
            diags.semantic(
                &cb.pos,
                format!("circuit breaker max_concurrent for '{}' must be positive", name),
            );
        }
        if cb.timeout.is_empty() {
            diags.semantic(
                &cb.pos,
                format!("circuit breaker timeout for '{}' is required", name),
            );
        } else if let Err(err) = parse_duration(&cb.timeout) {
            diags.semantic(
                &cb.pos,
                format!("invalid circuit breaker timeout '{}' for '{}': {}", cb.timeout, name, err),
            );
        }
    }
}

fn check_webhook(webhook: &WebhookDecl, diags: &mut Diagnostics) {
    match webhook.url.as_deref() {
        None => diags.semantic(
            &webhook.pos,
            format!("webhook '{}' requires a url", webhook.name),
        ),
        Some(url) => {
            if let Err(err) = validate_url(url) {
                diags.semantic(
                    &webhook.pos,
                    format!("invalid url '{}' for webhook '{}': {}", url, webhook.name, err),
                );
            }
        }
    }
    for event in &webhook.events {
        if !is_event_name(event) {
            diags.semantic(
                &webhook.pos,
                format!("invalid event name '{}' in webhook '{}'", event, webhook.name),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_program;

    fn messages(src: &str) -> Vec<String> {
        let program = parse_program(src).expect("parse");
        let mut diags = Diagnostics::default();
        let decls = Declarations::collect(&program, &mut diags);
        check_program(&program, &decls, &mut diags);
        diags.errors.into_iter().map(|e| e.message).collect()
    }

    // ============================================================================
    // Events and handlers
    // ============================================================================

    #[test]
    fn event_schema_rules() {
        let msgs = messages("event user.created { id: string, id: uuid, tags: list, note: string? }");
        assert_eq!(
            msgs,
            vec![
                "duplicate field 'id' in event 'user.created'",
                "unknown type 'list' for field 'tags' in event 'user.created'",
            ]
        );
    }

    #[test]
    fn event_name_pattern() {
        let msgs = messages("event UserCreated");
        assert_eq!(msgs.len(), 1);
        assert!(msgs[0].starts_with("invalid event name 'UserCreated'"));
    }

    #[test]
    fn handler_targets_must_exist() {
        let msgs = messages(
            r#"event user.created
webhook audit { url: "https://hooks.example.com/a" }
on user.created -> webhook audit async
on user.created -> workflow onboard
on user.deleted -> emit Cleanup
on user.created -> notify someone"#,
        );
        assert_eq!(
            msgs,
            vec![
                "handler target workflow 'onboard' is not declared",
                "handler references undefined event 'user.deleted'",
                "invalid event name 'Cleanup' in emit target",
                "unknown handler action 'notify' (expected workflow, integration, emit, webhook)",
            ]
        );
    }

    // ============================================================================
    // Integrations and webhooks
    // ============================================================================

    #[test]
    fn complete_integration_passes() {
        let msgs = messages(
            r#"integration stripe {
  base_url: "https://api.stripe.com/v1"
  auth bearer { token: "STRIPE_KEY" }
  circuit_breaker { threshold: 5, timeout: "30s", max_concurrent: 10 }
}"#,
        );
        assert!(msgs.is_empty(), "{:?}", msgs);
    }

    #[test]
    fn ipv6_hosts_and_empty_ports_are_valid_urls() {
        let msgs = messages(
            r#"integration local { base_url: "http://[::1]:8080/api" }
webhook w { url: "http://localhost:/hook" }"#,
        );
        assert!(msgs.is_empty(), "{:?}", msgs);
    }

    #[test]
    fn integration_rules() {
        let msgs = messages(
            r#"integration crm {
  base_url: "ftp://crm.example.com"
  auth apikey { header: "X-Key" }
  circuit_breaker { threshold: 0, timeout: "soon" }
}
integration mail { auth oauth { } }"#,
        );
        assert_eq!(
            msgs,
            vec![
                "invalid base_url 'ftp://crm.example.com' for integration 'crm': unsupported scheme 'ftp' (expected http or https)",
                "apikey auth for integration 'crm' requires 'value'",
                "circuit breaker threshold for 'crm' must be positive",
                "circuit breaker max_concurrent for 'crm' must be positive",
                "invalid circuit breaker timeout 'soon' for 'crm': expected a number at 'soon'",
                "integration 'mail' requires a base_url",
                "unsupported auth type 'oauth' for integration 'mail'",
            ]
        );
    }

    #[test]
    fn webhook_rules() {
        let msgs = messages(
            r#"webhook a { events: ["user.created", "Bad"] }
webhook b { url: "https://" }"#,
        );
        assert_eq!(
            msgs,
            vec![
                "webhook 'a' requires a url",
                "invalid event name 'Bad' in webhook 'a'",
                "invalid url 'https://' for webhook 'b': empty host",
            ]
        );
    }
}
