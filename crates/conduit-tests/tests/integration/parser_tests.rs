use conduit_frontend::errors::SyntaxErrorKind;
use conduit_frontend::{parse_file, parse_program, parse_source, FrontendError, Stmt};

#[test]
fn statements_keep_source_order_with_endpoints_last() {
    let src = r#"var a = 1
endpoint GET "/first" { }
workflow w { step s { activity: x } }
var b = 2
endpoint POST "/second" { }
job j { schedule "@daily" step s { activity: y } }
"#;
    let program = parse_program(src).expect("parse");
    let kinds: Vec<&str> = program
        .statements
        .iter()
        .map(|s| s.kind().as_str())
        .collect();
    assert_eq!(
        kinds,
        vec!["VarDecl", "WorkflowDecl", "VarDecl", "JobDecl", "EndpointDecl", "EndpointDecl"]
    );
    let paths: Vec<_> = program.endpoints().map(|e| e.path.as_str()).collect();
    assert_eq!(paths, vec!["/first", "/second"]);
}

#[test]
fn positions_are_rebased_to_the_full_source() {
    let src = "var a = 1\n\n  workflow w {\n    step s { activity: x }\n  }\n";
    let program = parse_source("flows.cdt", src).expect("parse");
    let w = program.workflows().next().expect("workflow");
    assert_eq!((w.pos.line, w.pos.column), (3, 3));
    assert_eq!(&*w.pos.filename, "flows.cdt");
    assert_eq!(w.steps[0].pos.line, 4);
    assert_eq!(w.steps[0].pos.column, 5);
}

#[test]
fn contextual_keywords_are_usable_as_names() {
    let src = r#"var status = 200
var type = "json"
var model = 1
model = model + 1
var config = [status, type]
"#;
    let program = parse_program(src).expect("parse");
    assert_eq!(program.statements.len(), 5);
    assert!(matches!(&program.statements[3], Stmt::Assignment(a) if a.name == "model"));
    conduit_frontend::validate_program(&program).expect("validates");
}

#[test]
fn endpoint_is_usable_as_a_variable() {
    let program = parse_program("var eps = [1, 2]\nfor endpoint in eps { print(endpoint) }")
        .expect("loop variable named endpoint");
    assert!(matches!(&program.statements[1], Stmt::For(l) if l.variable == "endpoint"));
    conduit_frontend::validate_program(&program).expect("validates");

    let program = parse_program("var endpoint\nprint(endpoint)").expect("var named endpoint");
    assert_eq!(program.statements.len(), 2);
    assert_eq!(program.endpoints().count(), 0);
}

#[test]
fn reserved_words_are_not_identifiers() {
    let err = parse_program("var for = 1").expect_err("reserved word");
    let syntax = err.syntax_error().expect("syntax error");
    assert_eq!(syntax.kind, SyntaxErrorKind::Grammar);
    assert_eq!(syntax.position.line, 1);
}

#[test]
fn grammar_error_in_endpoint_region_aborts_parse() {
    let src = "var a = 1\nendpoint GET \"/a\" {\n  handler getUser\n}\n";
    let err = parse_source("api.cdt", src).expect_err("missing colon");
    let syntax = err.syntax_error().expect("syntax error");
    assert_eq!(syntax.kind, SyntaxErrorKind::Grammar);
    assert_eq!(syntax.position.line, 3);
    assert!(err.to_string().starts_with("syntax error: api.cdt:3:"));
}

#[test]
fn lexical_errors_are_positioned() {
    let err = parse_source("bad.cdt", "var a = 1\nvar b = \u{1}").expect_err("control char");
    let syntax = err.syntax_error().expect("syntax error");
    assert_eq!(syntax.kind, SyntaxErrorKind::Lexical);
    assert_eq!((syntax.position.line, syntax.position.column), (2, 9));
    assert!(syntax.message.contains("U+0001"));
}

#[test]
fn unterminated_workflow_is_lexical_error() {
    let err = parse_program("workflow w {\n  step s { activity: x }\n").expect_err("open region");
    let syntax = err.syntax_error().expect("syntax error");
    assert_eq!(syntax.kind, SyntaxErrorKind::Lexical);
    assert!(syntax.message.contains("unterminated workflow block"));
}

#[test]
fn concurrency_on_workflow_is_rejected_at_parse_time() {
    let err = parse_program("workflow w {\n  concurrency: 2\n}").expect_err("workflow concurrency");
    assert!(err.to_string().contains("concurrency is only allowed on jobs"));
}

#[test]
fn missing_file_is_io_error() {
    let err = parse_file("definitely/not/here.cdt").expect_err("missing file");
    assert!(matches!(err, FrontendError::Io { .. }));
    assert!(err.to_string().contains("here.cdt"));
}

#[test]
fn empty_source_is_an_empty_program() {
    let program = parse_program("  // nothing here\n/* at all */\n").expect("parse");
    assert!(program.statements.is_empty());
}
