use std::collections::HashSet;

use conduit_frontend::{
    clone_node, equal, parse_and_validate, parse_file, print, walk, Block, Expr, HttpMethod,
    Node, NodeKind, NodeRef, Position, Program, Property, Stmt, TriggerKind, Visit,
};
use conduit_tests::{example_files, read_example};

#[test]
fn parse_and_validate_all_examples() {
    let files = example_files().expect("list examples");
    assert!(!files.is_empty(), "no .cdt example files found");
    for path in &files {
        let program = parse_file(path).unwrap_or_else(|e| panic!("{}: {}", path.display(), e));
        if let Err(errs) = conduit_frontend::Validator::new().validate(&program) {
            panic!("{} failed validation:\n{}", path.display(), errs);
        }
    }
}

#[test]
fn example_basics_shape() {
    let src = read_example("basics.cdt").expect("read basics.cdt");
    let program = parse_and_validate(&src).expect("basics validates");
    let kinds: Vec<&str> = program
        .statements
        .iter()
        .map(|s| s.kind().as_str())
        .collect();
    assert_eq!(
        kinds,
        vec![
            "VarDecl",
            "VarDecl",
            "VarDecl",
            "FunctionDecl",
            "ForLoop",
            "IfStmt",
            "Block",
            "ExecBlock"
        ]
    );
    match program.statements.last() {
        Some(Stmt::Exec(e)) => {
            assert_eq!(e.command, "echo \"deploying { $(whoami) }\" | tee deploy.log")
        }
        other => panic!("expected exec block, got {:?}", other),
    }
}

#[test]
fn example_users_api_endpoints_come_last() {
    let src = read_example("users_api.cdt").expect("read users_api.cdt");
    let program = parse_and_validate(&src).expect("users_api validates");

    let endpoints: Vec<_> = program
        .endpoints()
        .map(|e| (e.method, e.path.as_str()))
        .collect();
    assert_eq!(
        endpoints,
        vec![
            (HttpMethod::Get, "/users/:id"),
            (HttpMethod::Post, "/users"),
            (HttpMethod::Delete, "/users/:id"),
        ]
    );
    let first_endpoint = program
        .statements
        .iter()
        .position(|s| matches!(s, Stmt::Endpoint(_)))
        .expect("has endpoints");
    assert!(program.statements[first_endpoint..]
        .iter()
        .all(|s| matches!(s, Stmt::Endpoint(_))));

    let get = program.endpoints().next().expect("GET endpoint");
    assert_eq!(get.annotations.len(), 3);
    assert_eq!(get.logic.len(), 3);
    // Positions point into the full file, not the extracted region.
    assert_eq!(get.pos.line, 42);
}

#[test]
fn example_events_flows() {
    let src = read_example("events.cdt").expect("read events.cdt");
    let program = parse_and_validate(&src).expect("events validates");

    let onboard = program.workflows().next().expect("workflow");
    assert_eq!(onboard.name, "onboard");
    assert_eq!(onboard.steps.len(), 3);
    assert_eq!(onboard.steps[1].branches.len(), 2);

    let jobs: Vec<_> = program.jobs().collect();
    assert_eq!(jobs.len(), 2);
    assert_eq!(jobs[0].concurrency, Some(1));
    let trigger = jobs[0].trigger.as_ref().expect("schedule trigger");
    assert_eq!(trigger.kind, TriggerKind::Schedule);
    assert_eq!(trigger.value.as_deref(), Some("0 3 * * *"));
}

fn node_identity(n: NodeRef<'_>) -> (NodeKind, usize) {
    let addr = match n {
        NodeRef::Program(p) => p as *const Program as usize,
        NodeRef::Stmt(s) => s as *const Stmt as usize,
        NodeRef::Block(b) => b as *const Block as usize,
        NodeRef::Expr(e) => e as *const Expr as usize,
    };
    (n.kind(), addr)
}

/// Changes one semantically meaningful field of a domain declaration.
fn touch(stmt: &mut Stmt) -> bool {
    let marker = || Property {
        pos: Position::default(),
        key: "touched".to_string(),
        value: Expr::boolean(true),
    };
    match stmt {
        Stmt::Config(c) => c.properties.push(marker()),
        Stmt::Database(d) => d.declarations.clear(),
        Stmt::Model(m) => m.name.push_str("_copy"),
        Stmt::Collection(c) => c.name.push_str("_copy"),
        Stmt::Auth(a) => a.properties.push(marker()),
        Stmt::Role(r) => r.name.push_str("_copy"),
        Stmt::Middleware(m) => m.name.push_str("_copy"),
        Stmt::Event(e) => e.name.push_str("_copy"),
        Stmt::EventHandler(h) => h.target.push_str("_copy"),
        Stmt::Integration(i) => i.name.push_str("_copy"),
        Stmt::Webhook(w) => w.name.push_str("_copy"),
        Stmt::Endpoint(e) => e.path.push_str("/copy"),
        Stmt::Workflow(w) => match w.steps.first_mut() {
            Some(step) => step.name.push_str("_copy"),
            None => w.name.push_str("_copy"),
        },
        Stmt::Job(j) => j.name.push_str("_copy"),
        _ => return false,
    }
    true
}

#[test]
fn tree_laws_hold_for_every_example() {
    for path in example_files().expect("list examples") {
        let program = parse_file(&path).unwrap_or_else(|e| panic!("{}: {}", path.display(), e));
        let root = Some(NodeRef::from(&program));
        let copy = match clone_node(root) {
            Some(Node::Program(p)) => p,
            other => panic!("expected program clone, got {:?}", other),
        };
        assert!(equal(root, Some(NodeRef::from(&copy))), "{}", path.display());
        let printed = print(root);
        assert_eq!(printed, print(Some(NodeRef::from(&copy))), "{}", path.display());

        let mut seen = HashSet::new();
        let verdict = walk(root, &mut |n: NodeRef<'_>| {
            assert!(seen.insert(node_identity(n)), "{}: node visited twice", path.display());
            Visit::Continue
        });
        assert_eq!(verdict, Visit::Continue);
        let total = seen.len();
        for stop_at in [1, total / 2 + 1, total] {
            let mut visits = 0;
            let verdict = walk(root, &mut |_n: NodeRef<'_>| {
                visits += 1;
                if visits == stop_at {
                    Visit::Stop
                } else {
                    Visit::Continue
                }
            });
            assert_eq!((verdict, visits), (Visit::Stop, stop_at), "{}", path.display());
        }

        for i in 0..program.statements.len() {
            let mut edited = copy.clone();
            if !touch(&mut edited.statements[i]) {
                continue;
            }
            assert!(
                !equal(Some(NodeRef::from(&program.statements[i])), Some(NodeRef::from(&edited.statements[i]))),
                "{}: statement {} edit not observed",
                path.display(),
                i
            );
            assert_eq!(print(root), printed, "{}: original changed", path.display());
        }
    }
}
