//! Property tests for the tree utilities: clone, equality, print and walk.

use conduit_frontend::{
    clone_node, equal, print, walk, ArrayLiteral, BinaryOp, Block, Expr, ExprStmt, ForLoop,
    FunctionDecl, IfStmt, Node, NodeRef, Position, Program, Property, ReturnStmt, RoleDecl,
    StepKind, Stmt, UnaryOp, VarDecl, Visit, WorkflowDecl, WorkflowStep,
};
use proptest::prelude::*;

const BINARY_OPS: &[BinaryOp] = &[
    BinaryOp::Add,
    BinaryOp::Sub,
    BinaryOp::Mul,
    BinaryOp::Div,
    BinaryOp::Mod,
    BinaryOp::Eq,
    BinaryOp::Ne,
    BinaryOp::Lt,
    BinaryOp::Le,
    BinaryOp::Gt,
    BinaryOp::Ge,
    BinaryOp::And,
    BinaryOp::Or,
];

fn name() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,6}"
}

fn expr() -> impl Strategy<Value = Expr> {
    let leaf = prop_oneof![
        (-1e6f64..1e6).prop_map(Expr::number),
        any::<bool>().prop_map(Expr::boolean),
        "[a-z ]{0,8}".prop_map(Expr::string),
        name().prop_map(Expr::ident),
    ];
    leaf.prop_recursive(4, 32, 4, |inner| {
        prop_oneof![
            (inner.clone(), prop::sample::select(BINARY_OPS), inner.clone())
                .prop_map(|(l, op, r)| Expr::binary(l, op, r)),
            (prop::sample::select(&[UnaryOp::Not, UnaryOp::Neg][..]), inner.clone())
                .prop_map(|(op, e)| Expr::unary(op, e)),
            (name(), prop::collection::vec(inner.clone(), 0..4))
                .prop_map(|(n, args)| Expr::call(n, args)),
            prop::collection::vec(inner, 0..4).prop_map(|elements| Expr::Array(ArrayLiteral {
                pos: Position::default(),
                elements,
            })),
        ]
    })
}

fn block(stmts: impl Strategy<Value = Stmt>) -> impl Strategy<Value = Block> {
    prop::collection::vec(stmts, 0..3).prop_map(|statements| Block {
        pos: Position::default(),
        statements,
    })
}

fn properties() -> impl Strategy<Value = Vec<Property>> {
    prop::collection::vec((name(), expr()), 0..3).prop_map(|pairs| {
        pairs
            .into_iter()
            .map(|(key, value)| Property {
                pos: Position::default(),
                key,
                value,
            })
            .collect()
    })
}

fn step(
    kind: StepKind,
    branches: Vec<WorkflowStep>,
    name: String,
    input: Vec<Property>,
) -> WorkflowStep {
    WorkflowStep {
        pos: Position::default(),
        name,
        kind,
        description: None,
        activity: Some("run".to_string()),
        input,
        timeout: Some("5m".to_string()),
        retry: None,
        depends_on: Vec::new(),
        branches,
    }
}

fn workflow_step() -> impl Strategy<Value = WorkflowStep> {
    let activity = (name(), properties())
        .prop_map(|(n, input)| step(StepKind::Activity, Vec::new(), n, input))
        .boxed();
    prop_oneof![
        activity.clone(),
        (name(), prop::collection::vec(activity, 1..3))
            .prop_map(|(n, branches)| step(StepKind::Parallel, branches, n, Vec::new())),
    ]
}

fn stmt() -> impl Strategy<Value = Stmt> {
    let leaf = prop_oneof![
        (name(), prop::option::of(expr())).prop_map(|(name, value)| Stmt::VarDecl(VarDecl {
            pos: Position::default(),
            name,
            value,
        })),
        expr().prop_map(|expr| Stmt::ExprStmt(ExprStmt {
            pos: Position::default(),
            expr,
        })),
        prop::option::of(expr()).prop_map(|value| Stmt::Return(ReturnStmt {
            pos: Position::default(),
            value,
        })),
        (name(), properties()).prop_map(|(name, properties)| Stmt::Role(RoleDecl {
            pos: Position::default(),
            name,
            properties,
        })),
        (name(), prop::collection::vec(workflow_step(), 0..4)).prop_map(|(name, steps)| {
            Stmt::Workflow(WorkflowDecl {
                pos: Position::default(),
                name,
                description: None,
                trigger: None,
                steps,
                timeout: None,
                retry: None,
            })
        }),
    ];
    leaf.prop_recursive(3, 24, 3, |inner| {
        prop_oneof![
            (expr(), block(inner.clone()), prop::option::of(block(inner.clone()))).prop_map(
                |(condition, then_block, else_block)| Stmt::If(IfStmt {
                    pos: Position::default(),
                    condition,
                    then_block,
                    else_block,
                })
            ),
            (name(), expr(), block(inner.clone())).prop_map(|(variable, iterable, body)| {
                Stmt::For(ForLoop {
                    pos: Position::default(),
                    variable,
                    iterable,
                    body,
                })
            }),
            (name(), prop::collection::vec(name(), 0..3), block(inner.clone())).prop_map(
                |(name, params, body)| Stmt::Function(FunctionDecl {
                    pos: Position::default(),
                    name,
                    params,
                    body,
                })
            ),
            block(inner).prop_map(Stmt::Block),
        ]
    })
}

fn program() -> impl Strategy<Value = Program> {
    prop::collection::vec(stmt(), 0..5).prop_map(|statements| Program {
        pos: Position::default(),
        statements,
    })
}

fn count_expr(e: &Expr) -> usize {
    1 + match e {
        Expr::Binary(b) => count_expr(&b.left) + count_expr(&b.right),
        Expr::Unary(u) => count_expr(&u.operand),
        Expr::Call(c) => c.args.iter().map(count_expr).sum(),
        Expr::Array(a) => a.elements.iter().map(count_expr).sum(),
        _ => 0,
    }
}

fn count_stmts(stmts: &[Stmt]) -> usize {
    stmts.iter().map(count_stmt).sum()
}

fn count_properties(props: &[Property]) -> usize {
    props.iter().map(|p| count_expr(&p.value)).sum()
}

// Steps are not nodes; only their input values are.
fn count_steps(steps: &[WorkflowStep]) -> usize {
    steps
        .iter()
        .map(|s| count_properties(&s.input) + count_steps(&s.branches))
        .sum()
}

fn count_stmt(s: &Stmt) -> usize {
    1 + match s {
        Stmt::VarDecl(v) => v.value.as_ref().map_or(0, count_expr),
        Stmt::ExprStmt(e) => count_expr(&e.expr),
        Stmt::Return(r) => r.value.as_ref().map_or(0, count_expr),
        // Body blocks of an if are nodes of their own.
        Stmt::If(i) => {
            count_expr(&i.condition)
                + 1
                + count_stmts(&i.then_block.statements)
                + i.else_block
                    .as_ref()
                    .map_or(0, |b| 1 + count_stmts(&b.statements))
        }
        Stmt::For(l) => count_expr(&l.iterable) + 1 + count_stmts(&l.body.statements),
        Stmt::Function(f) => 1 + count_stmts(&f.body.statements),
        Stmt::Block(b) => count_stmts(&b.statements),
        Stmt::Role(r) => count_properties(&r.properties),
        Stmt::Workflow(w) => count_steps(&w.steps),
        other => panic!("generator produced unexpected statement {:?}", other.kind()),
    }
}

proptest! {
    #[test]
    fn clone_equals_original(p in program()) {
        let copy = match clone_node(Some(NodeRef::from(&p))) {
            Some(Node::Program(copy)) => copy,
            other => panic!("expected program clone, got {:?}", other),
        };
        prop_assert!(equal(Some(NodeRef::from(&p)), Some(NodeRef::from(&copy))));
        prop_assert_eq!(print(Some(NodeRef::from(&p))), print(Some(NodeRef::from(&copy))));
    }

    #[test]
    fn equality_is_reflexive_for_expressions(e in expr()) {
        prop_assert!(equal(Some(NodeRef::from(&e)), Some(NodeRef::from(&e))));
        let wrapped = Expr::unary(UnaryOp::Not, e.clone());
        prop_assert!(!equal(Some(NodeRef::from(&e)), Some(NodeRef::from(&wrapped))));
    }

    #[test]
    fn walk_visits_every_node_once(p in program()) {
        let mut visited = 0usize;
        let verdict = walk(Some(NodeRef::from(&p)), &mut |_n: NodeRef<'_>| {
            visited += 1;
            Visit::Continue
        });
        prop_assert_eq!(verdict, Visit::Continue);
        prop_assert_eq!(visited, 1 + count_stmts(&p.statements));
    }

    #[test]
    fn walk_stops_after_the_requested_visit(p in program(), pick in any::<prop::sample::Index>()) {
        let total = 1 + count_stmts(&p.statements);
        let stop_at = pick.index(total) + 1;
        let mut visited = 0usize;
        let verdict = walk(Some(NodeRef::from(&p)), &mut |_n: NodeRef<'_>| {
            visited += 1;
            if visited == stop_at { Visit::Stop } else { Visit::Continue }
        });
        prop_assert_eq!(verdict, Visit::Stop);
        prop_assert_eq!(visited, stop_at);
    }
}
