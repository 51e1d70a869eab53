//! Endpoint checks: route uniqueness, path shape, annotations, middleware,
//! request/response specs and handler logic steps.

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

use super::formats::{is_identifier, is_identifier_path, is_numeric, is_pascal_case, is_version};
use super::{Declarations, Diagnostics, Registry};
use crate::ast::*;

pub fn check_program(
    program: &Program,
    registry: &Registry,
    decls: &Declarations<'_>,
    diags: &mut Diagnostics,
) {
    let before = diags.len();

    // With a registry, middleware declared in the program count as known too.
    let known_middleware: Option<FxHashSet<&str>> = registry.middleware.as_ref().map(|extra| {
        decls
            .middleware
            .keys()
            .copied()
            .chain(extra.iter().map(String::as_str))
            .collect()
    });

    let mut routes: FxHashMap<(HttpMethod, &str), &Position> = FxHashMap::default();
    let mut count = 0usize;
    for endpoint in program.endpoints() {
        count += 1;
        let route = format!("{} {}", endpoint.method, endpoint.path);
        match routes.get(&(endpoint.method, endpoint.path.as_str())) {
            Some(first) => diags.semantic(
                &endpoint.pos,
                format!("duplicate endpoint {} (first declared at {})", route, first),
            ),
            None => {
                routes.insert((endpoint.method, endpoint.path.as_str()), &endpoint.pos);
            }
        }

        check_path(endpoint, diags);
        check_annotations(endpoint, registry, diags);
        check_middleware(endpoint, known_middleware.as_ref(), diags);

        if let Some(handler) = &endpoint.handler {
            if !is_identifier(handler) {
                diags.semantic(
                    &endpoint.pos,
                    format!("invalid handler name '{}' for {}", handler, route),
                );
            }
        }
        if let Some(role) = &endpoint.role {
            if !decls.roles.is_empty() && !decls.roles.contains_key(role.as_str()) {
                diags.semantic(
                    &endpoint.pos,
                    format!("undefined role '{}' for {}", role, route),
                );
            }
        }
        if let Some(request) = &endpoint.request {
            check_request(endpoint.method, request, diags);
        }
        if let Some(response) = &endpoint.response {
            if !is_pascal_case(&response.type_name) {
                diags.semantic(
                    &response.pos,
                    format!("response type '{}' must be PascalCase", response.type_name),
                );
            }
            if !(100..=599).contains(&response.status) {
                diags.semantic(
                    &response.pos,
                    format!("invalid status code {} (expected 100-599)", response.status),
                );
            }
        }
        for step in &endpoint.logic {
            check_logic_step(step, registry, diags);
        }
    }

    debug!(endpoints = count, errors = diags.len() - before, "endpoint pass finished");
}

fn check_path(endpoint: &EndpointDecl, diags: &mut Diagnostics) {
    let path = &endpoint.path;
    if !path.starts_with('/') {
        diags.semantic(&endpoint.pos, format!("path '{}' must start with '/'", path));
    }
    if path.contains("//") {
        diags.semantic(&endpoint.pos, format!("path '{}' contains an empty segment", path));
    }
    let mut params = FxHashSet::default();
    for segment in path.split('/') {
        if let Some(name) = segment.strip_prefix(':') {
            if !params.insert(name) {
                diags.semantic(
                    &endpoint.pos,
                    format!("duplicate path parameter ':{}' in '{}'", name, path),
                );
            }
        }
    }
}

fn check_annotations(endpoint: &EndpointDecl, registry: &Registry, diags: &mut Diagnostics) {
    let mut seen = FxHashSet::default();
    for annotation in &endpoint.annotations {
        let name = annotation.name.as_str();
        if !seen.insert(name) {
            diags.semantic(&annotation.pos, format!("duplicate annotation @{}", name));
            continue;
        }
        if let Some(known) = &registry.annotations {
            if !known.contains(name) {
                diags.semantic(&annotation.pos, format!("unknown annotation @{}", name));
            }
        }
        let value = annotation.value.as_deref();
        match name {
            "auth" if value.map_or(true, str::is_empty) => {
                diags.semantic(&annotation.pos, "@auth requires a value");
            }
            "rate_limit" if !value.is_some_and(is_numeric) => diags.semantic(
                &annotation.pos,
                format!("@rate_limit value '{}' must be numeric", value.unwrap_or("")),
            ),
            "version" if !value.is_some_and(is_version) => diags.semantic(
                &annotation.pos,
                format!("@version value '{}' must look like v1 or 1.2", value.unwrap_or("")),
            ),
            _ => {}
        }
    }
}

fn check_middleware(
    endpoint: &EndpointDecl,
    known: Option<&FxHashSet<&str>>,
    diags: &mut Diagnostics,
) {
    let mut seen = FxHashSet::default();
    for name in &endpoint.middleware {
        if !seen.insert(name.as_str()) {
            diags.semantic(&endpoint.pos, format!("duplicate middleware '{}' on endpoint", name));
            continue;
        }
        if let Some(known) = known {
            if !known.contains(name.as_str()) {
                diags.semantic(&endpoint.pos, format!("unknown middleware '{}'", name));
            }
        }
    }
}

fn check_request(method: HttpMethod, request: &RequestSpec, diags: &mut Diagnostics) {
    if !is_pascal_case(&request.type_name) {
        diags.semantic(
            &request.pos,
            format!("request type '{}' must be PascalCase", request.type_name),
        );
    }
    if request.source == Some(RequestSource::Body)
        && matches!(method, HttpMethod::Get | HttpMethod::Delete)
    {
        diags.semantic(
            &request.pos,
            format!("{} endpoints cannot read the request from body", method),
        );
    }
}

fn is_step_word(arg: &StepArg) -> bool {
    arg.quoted || is_identifier_path(&arg.value) || is_numeric(&arg.value)
}

fn check_logic_step(step: &LogicStep, registry: &Registry, diags: &mut Diagnostics) {
    if !is_identifier(&step.action) {
        // Nothing else about the step is meaningful without a valid action.
        diags.semantic(&step.pos, format!("invalid logic action '{}'", step.action));
        return;
    }
    if let Some(actions) = &registry.actions {
        if !actions.contains(&step.action) {
            diags.semantic(&step.pos, format!("unknown logic action '{}'", step.action));
        }
    }
    if let Some(target) = &step.target {
        if !is_step_word(target) {
            diags.semantic(
                &step.pos,
                format!("invalid target '{}' for '{}'", target, step.action),
            );
        }
    }
    for arg in &step.args {
        if !is_step_word(arg) {
            diags.semantic(
                &step.pos,
                format!("invalid argument '{}' for '{}'", arg, step.action),
            );
        }
    }
    for option in &step.options {
        if !is_identifier(&option.key) {
            diags.semantic(
                &step.pos,
                format!("invalid option name '{}' for '{}'", option.key, step.action),
            );
        }
        if !is_step_word(&option.value) {
            diags.semantic(
                &step.pos,
                format!("invalid value '{}' for option '{}'", option.value, option.key),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_program;

    fn check_with(src: &str, registry: &Registry) -> Vec<String> {
        let program = parse_program(src).expect("parse");
        let mut diags = Diagnostics::default();
        let decls = Declarations::collect(&program, &mut diags);
        check_program(&program, registry, &decls, &mut diags);
        diags.errors.into_iter().map(|e| e.message).collect()
    }

    fn check(src: &str) -> Vec<String> {
        check_with(src, &Registry::default())
    }

    // ============================================================================
    // Routes and paths
    // ============================================================================

    #[test]
    fn duplicate_routes_are_reported_per_method() {
        let msgs = check(
            r#"endpoint GET "/users" { }
endpoint GET "/users" { }
endpoint POST "/users" { }"#,
        );
        assert_eq!(msgs.len(), 1);
        assert!(msgs[0].starts_with("duplicate endpoint GET /users"));
    }

    #[test]
    fn path_shape() {
        let msgs = check(r#"endpoint GET "users//:id/:id" { }"#);
        assert_eq!(
            msgs,
            vec![
                "path 'users//:id/:id' must start with '/'",
                "path 'users//:id/:id' contains an empty segment",
                "duplicate path parameter ':id' in 'users//:id/:id'",
            ]
        );
    }

    // ============================================================================
    // Annotations and middleware
    // ============================================================================

    #[test]
    fn annotation_values() {
        let msgs = check(
            r#"@auth @rate_limit(fast) @version("2.x") @auth("x")
endpoint GET "/a" { }"#,
        );
        assert_eq!(
            msgs,
            vec![
                "@auth requires a value",
                "@rate_limit value 'fast' must be numeric",
                "@version value '2.x' must look like v1 or 1.2",
                "duplicate annotation @auth",
            ]
        );
    }

    #[test]
    fn valid_annotations_pass() {
        let msgs = check(
            r#"@auth("admin") @rate_limit(100) @version(v2)
endpoint GET "/a" { }"#,
        );
        assert!(msgs.is_empty(), "{:?}", msgs);
    }

    #[test]
    fn registry_restricts_annotations_and_actions() {
        let registry = Registry::default()
            .with_annotations(["auth"])
            .with_actions(["fetch", "return"]);
        let msgs = check_with(
            r#"@cache("1m")
endpoint GET "/a" {
  logic {
    fetch user
    explode everything
  }
}"#,
            &registry,
        );
        assert_eq!(msgs, vec!["unknown annotation @cache", "unknown logic action 'explode'"]);
    }

    #[test]
    fn middleware_unchecked_without_registry() {
        let src = r#"middleware cors
endpoint GET "/a" { middleware: [cors, logging, cors] }"#;
        assert_eq!(check(src), vec!["duplicate middleware 'cors' on endpoint"]);
    }

    #[test]
    fn declared_middleware_extend_the_registry() {
        let src = r#"middleware cors
endpoint GET "/a" { middleware: [cors, logging, tracing] }"#;
        let registry = Registry::default().with_middleware(["logging"]);
        assert_eq!(check_with(src, &registry), vec!["unknown middleware 'tracing'"]);
    }

    #[test]
    fn middleware_unchecked_without_any_source() {
        assert!(check(r#"endpoint GET "/a" { middleware: [anything] }"#).is_empty());
    }

    // ============================================================================
    // Request, response, role, handler
    // ============================================================================

    #[test]
    fn request_and_response_rules() {
        let msgs = check(
            r#"endpoint GET "/a" {
  handler: get-user
  request: query_args from body
  response: User status 700
}"#,
        );
        assert_eq!(
            msgs,
            vec![
                "invalid handler name 'get-user' for GET /a",
                "request type 'query_args' must be PascalCase",
                "GET endpoints cannot read the request from body",
                "invalid status code 700 (expected 100-599)",
            ]
        );
    }

    #[test]
    fn roles_checked_once_any_role_is_declared() {
        let ep = r#"endpoint GET "/a" { role: admin }"#;
        assert!(check(ep).is_empty());
        let msgs = check(&format!("role editor\n{}", ep));
        assert_eq!(msgs, vec!["undefined role 'admin' for GET /a"]);
    }

    // ============================================================================
    // Logic steps
    // ============================================================================

    #[test]
    fn logic_step_words() {
        let msgs = check(
            r#"endpoint POST "/a" {
  logic {
    fetch user.profile(42, "free text", $bad) { ttl: "60s", 9lives: x }
    3d-print model
  }
}"#,
        );
        assert_eq!(
            msgs,
            vec![
                "invalid argument '$bad' for 'fetch'",
                "invalid option name '9lives' for 'fetch'",
                "invalid logic action '3d-print'",
            ]
        );
    }
}
