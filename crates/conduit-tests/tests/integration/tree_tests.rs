use conduit_frontend::{
    clone_node, equal, parse_program, print, walk, Expr, Node, NodeKind, NodeRef, Program, Stmt,
    Visit,
};

const SOURCE: &str = r#"var total = 1 + 2 * 3
function double(n) { return n * 2 }
if total > 3 { print(double(total)) } else { print("small") }
role admin { level: 3 }
"#;

fn program() -> Program {
    parse_program(SOURCE).expect("parse")
}

fn visit_all(program: &Program) -> Vec<NodeKind> {
    let mut kinds = Vec::new();
    let verdict = walk(Some(NodeRef::from(program)), &mut |n: NodeRef<'_>| {
        kinds.push(n.kind());
        Visit::Continue
    });
    assert_eq!(verdict, Visit::Continue);
    kinds
}

// ============================================================================
// Walk
// ============================================================================

#[test]
fn walk_is_preorder_over_every_node() {
    let program = program();
    let kinds = visit_all(&program);
    assert_eq!(
        &kinds[..6],
        &[
            NodeKind::Program,
            NodeKind::VarDecl,
            NodeKind::BinaryExpr,
            NodeKind::NumberLiteral,
            NodeKind::BinaryExpr,
            NodeKind::NumberLiteral,
        ]
    );
    assert_eq!(kinds.last(), Some(&NodeKind::NumberLiteral));
    assert_eq!(kinds.iter().filter(|k| **k == NodeKind::FunctionCall).count(), 3);
}

#[test]
fn walk_stops_immediately() {
    let program = program();
    let total = visit_all(&program).len();
    for stop_after in 1..=total {
        let mut calls = 0;
        let verdict = walk(Some(NodeRef::from(&program)), &mut |_n: NodeRef<'_>| {
            calls += 1;
            if calls == stop_after {
                Visit::Stop
            } else {
                Visit::Continue
            }
        });
        assert_eq!(verdict, Visit::Stop);
        assert_eq!(calls, stop_after);
    }
}

#[test]
fn walk_of_nothing_visits_nothing() {
    let mut calls = 0;
    let verdict = walk(None, &mut |_n: NodeRef<'_>| {
        calls += 1;
        Visit::Continue
    });
    assert_eq!((verdict, calls), (Visit::Continue, 0));
}

// ============================================================================
// Print / Equal / Clone
// ============================================================================

#[test]
fn print_dumps_an_indented_tree() {
    let program = parse_program("var x = not done").expect("parse");
    assert_eq!(
        print(Some(NodeRef::from(&program))),
        "Program\n  VarDecl x\n    UnaryExpr not\n      Identifier done\n"
    );
    assert_eq!(print(None), "<nil>");
}

#[test]
fn clone_is_equal_and_independent() {
    let program = program();
    let mut copy = match clone_node(Some(NodeRef::from(&program))) {
        Some(Node::Program(p)) => p,
        other => panic!("expected program clone, got {:?}", other),
    };
    assert!(equal(Some(NodeRef::from(&program)), Some(NodeRef::from(&copy))));
    assert_eq!(
        print(Some(NodeRef::from(&program))),
        print(Some(NodeRef::from(&copy)))
    );

    if let Some(Stmt::VarDecl(v)) = copy.statements.first_mut() {
        v.value = Some(Expr::number(7.0));
    }
    assert!(!equal(Some(NodeRef::from(&program)), Some(NodeRef::from(&copy))));
    let original = print(Some(NodeRef::from(&program)));
    assert!(original.contains("BinaryExpr +"));
    assert!(clone_node(None).is_none());
}

#[test]
fn equality_ignores_positions_but_not_kinds() {
    let a = parse_program("var x = 1").expect("parse");
    let b = parse_program("\n\n    var x = 1").expect("parse");
    assert!(equal(Some(NodeRef::from(&a)), Some(NodeRef::from(&b))));
    assert!(!a.statements[0].pos().same_location(b.statements[0].pos()));

    let stmt = &a.statements[0];
    let expr = Expr::number(1.0);
    assert!(!equal(Some(NodeRef::from(stmt)), Some(NodeRef::from(&expr))));
    assert!(equal(None, None));
    assert!(!equal(Some(NodeRef::from(stmt)), None));
}
