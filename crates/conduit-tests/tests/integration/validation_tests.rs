use conduit_frontend::errors::{ErrorCategory, ValidationErrors};
use conduit_frontend::{parse_and_validate, parse_program, Registry, Validator};

fn validate(src: &str) -> Result<(), ValidationErrors> {
    let program = parse_program(src).expect("parse");
    Validator::new().validate(&program)
}

fn errors(src: &str) -> ValidationErrors {
    validate(src).expect_err("expected validation errors")
}

// ============================================================================
// Scope and types
// ============================================================================

#[test]
fn redeclaration_in_same_scope_fails() {
    let errs = errors("var x = 1\nvar x = 2");
    assert_eq!(errs.len(), 1);
    let err = errs.iter().next().expect("one error");
    assert_eq!(err.category, ErrorCategory::Scope);
    assert!(err.message.starts_with("duplicate declaration of 'x'"));
    assert_eq!(err.position.line, 2);
}

#[test]
fn shadowing_in_nested_scope_is_allowed() {
    validate("var x = 1\nif true { var x = \"inner\" }").expect("shadowing is fine");
}

#[test]
fn assignment_without_declaration_fails() {
    let errs = errors("x = 1");
    assert!(errs.contains_message("undefined variable 'x'"));
}

#[test]
fn loop_variable_is_invisible_after_the_loop() {
    let errs = errors("for item in [1, 2] { print(item) }\nprint(item)");
    assert_eq!(errs.len(), 1);
    assert!(errs.contains_message("undefined variable 'item'"));
}

#[test]
fn iterating_a_number_is_a_type_error() {
    let errs = errors("var n = 3\nfor i in n { }");
    let err = errs.iter().next().expect("one error");
    assert_eq!(err.category, ErrorCategory::TypeCheck);
    assert_eq!(err.message, "cannot iterate over non-array value of type number");
}

#[test]
fn call_checks() {
    let errs = errors("var s = \"x\"\nprint(len(s, s))\ns(1)\nmissing()");
    let categories: Vec<_> = errs.iter().map(|e| e.category).collect();
    assert_eq!(categories, vec![ErrorCategory::Function; 3]);
    assert!(errs.contains_message("wrong argument count for 'len': expected 1, got 2"));
    assert!(errs.contains_message("'s' is not a function"));
    assert!(errs.contains_message("undefined function 'missing'"));
}

#[test]
fn recursion_is_allowed() {
    validate("function fact(n) {\n  if n <= 1 { return 1 }\n  return n * fact(n - 1)\n}\nprint(fact(5))")
        .expect("recursive function validates");
}

#[test]
fn domain_declarations_must_be_top_level() {
    let errs = errors("if true {\n  role admin\n}");
    assert!(errs.contains_message("RoleDecl is only allowed at the top level"));
}

// ============================================================================
// Endpoints
// ============================================================================

#[test]
fn duplicate_endpoint_fails_but_other_method_passes() {
    let errs = errors("endpoint GET \"/users\" { }\nendpoint GET \"/users\" { }");
    assert!(errs.contains_message("duplicate endpoint"));

    validate("endpoint GET \"/users\" { }\nendpoint POST \"/users\" { }")
        .expect("same path with different methods");
}

#[test]
fn middleware_registry_restricts_names() {
    let registry = Registry::default().with_middleware(["cors"]);
    let program = parse_program("endpoint GET \"/a\" { middleware: [cors, gzip] }").expect("parse");
    let errs = Validator::with_registry(registry)
        .validate(&program)
        .expect_err("gzip unknown");
    assert_eq!(errs.len(), 1);
    assert!(errs.contains_message("unknown middleware 'gzip'"));
}

// ============================================================================
// Workflows, config, aggregation
// ============================================================================

#[test]
fn schedules_and_timeouts() {
    validate("job j {\n  schedule \"0 8 * * *\"\n  timeout \"30m\"\n  step s { activity: a }\n}")
        .expect("valid schedule and timeout");

    let errs = errors("job j {\n  schedule \"not-a-cron\"\n  step s { activity: a }\n}");
    assert!(errs.contains_message("invalid cron expression 'not-a-cron'"));

    let errs = errors("workflow w {\n  timeout \"soon\"\n  step s { activity: a }\n}");
    assert!(errs.contains_message("invalid workflow 'w' timeout 'soon'"));
}

#[test]
fn mongodb_config_rules() {
    let errs = errors("config { database_type: \"mongodb\" }");
    assert!(errs.contains_message("mongodb_uri"));

    let errs = errors(
        "config { database_type: \"mongodb\", mongodb_uri: \"mongodb://db\", mongodb_database: \"app\" }\ndatabase postgres { }",
    );
    assert!(errs.contains_message("database engine mismatch"));
}

#[test]
fn every_error_is_reported_in_one_run() {
    let src = r#"var x = 1
var x = 2
y = 3
event Bad
endpoint GET "no-slash" { response: user status 42 }
"#;
    let errs = errors(src);
    assert_eq!(errs.len(), 6, "{}", errs);
    let report = errs.to_string();
    assert!(report.starts_with("6 validation errors"));
    assert!(report.contains("[scope]"));
    assert!(report.contains("[semantic]"));
}

#[test]
fn parse_and_validate_reports_validation_errors() {
    let err = parse_and_validate("print(undefined_name)").expect_err("invalid");
    assert_eq!(err.validation_errors().map(|e| e.len()), Some(1));
    assert!(err.syntax_error().is_none());
}
