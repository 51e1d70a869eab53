//! Lowering for the main grammar: statements, expressions and the domain
//! declarations that live outside endpoint and workflow regions.

use pest::iterators::Pair;
use pest::Span;
use tracing::warn;

use super::{parse_number, string_value, Ctx};
use crate::ast::*;
use crate::errors::FrontendError;
use crate::grammar::main::Rule;

type Result<T> = std::result::Result<T, FrontendError>;

/// Lowers a `program` pair into its top-level statements.
pub fn build_program(ctx: Ctx<'_, '_>, pair: Pair<'_, Rule>) -> Result<Vec<Stmt>> {
    let mut statements = Vec::new();
    for p in pair.into_inner() {
        match p.as_rule() {
            Rule::EOI => {}
            _ => statements.push(build_statement(ctx, p)?),
        }
    }
    Ok(statements)
}

fn build_statement(ctx: Ctx<'_, '_>, pair: Pair<'_, Rule>) -> Result<Stmt> {
    let stmt = match pair.as_rule() {
        Rule::var_decl => Stmt::VarDecl(build_var_decl(ctx, pair)?),
        Rule::assignment => Stmt::Assignment(build_assignment(ctx, pair)?),
        Rule::expr_stmt => {
            let pos = ctx.pos(pair.as_span());
            let call = first_inner(ctx, pair)?;
            Stmt::ExprStmt(ExprStmt {
                pos,
                expr: build_expr(ctx, call)?,
            })
        }
        Rule::if_stmt => Stmt::If(build_if(ctx, pair)?),
        Rule::for_loop => Stmt::For(build_for(ctx, pair)?),
        Rule::function_decl => Stmt::Function(build_function(ctx, pair)?),
        Rule::return_stmt => {
            let pos = ctx.pos(pair.as_span());
            let mut value = None;
            for p in pair.into_inner() {
                if p.as_rule() == Rule::expr {
                    value = Some(build_expr(ctx, p)?);
                }
            }
            Stmt::Return(ReturnStmt { pos, value })
        }
        Rule::exec_block => {
            let pos = ctx.pos(pair.as_span());
            let command = pair
                .into_inner()
                .find(|p| p.as_rule() == Rule::shell_body)
                .map(|p| p.as_str().trim().to_string())
                .unwrap_or_default();
            Stmt::Exec(ExecBlock { pos, command })
        }
        Rule::block => Stmt::Block(build_block(ctx, pair)?),
        Rule::config_decl => Stmt::Config(build_config(ctx, pair)?),
        Rule::database_decl => Stmt::Database(build_database(ctx, pair)?),
        Rule::auth_decl => {
            let pos = ctx.pos(pair.as_span());
            let mut provider = None;
            let mut properties = Vec::new();
            for p in pair.into_inner() {
                match p.as_rule() {
                    Rule::ident => provider = Some(p.as_str().to_string()),
                    Rule::property => properties.push(build_property(ctx, p)?),
                    _ => {}
                }
            }
            Stmt::Auth(AuthDecl {
                pos,
                provider,
                properties,
            })
        }
        Rule::role_decl => {
            let (pos, name, properties) = build_named_properties(ctx, pair)?;
            Stmt::Role(RoleDecl {
                pos,
                name,
                properties,
            })
        }
        Rule::middleware_decl => {
            let (pos, name, properties) = build_named_properties(ctx, pair)?;
            Stmt::Middleware(MiddlewareDecl {
                pos,
                name,
                properties,
            })
        }
        Rule::event_decl => Stmt::Event(build_event(ctx, pair)?),
        Rule::event_handler => Stmt::EventHandler(build_event_handler(ctx, pair)?),
        Rule::integration_decl => Stmt::Integration(build_integration(ctx, pair)?),
        Rule::webhook_decl => Stmt::Webhook(build_webhook(ctx, pair)?),
        other => {
            return Err(ctx.error(
                pair.as_span(),
                format!("unexpected {:?} in statement position", other),
            ))
        }
    };
    Ok(stmt)
}

fn first_inner<'i>(ctx: Ctx<'_, '_>, pair: Pair<'i, Rule>) -> Result<Pair<'i, Rule>> {
    let span = pair.as_span();
    pair.into_inner()
        .next()
        .ok_or_else(|| ctx.error(span, "empty production"))
}

// ============================================================================
// General statements
// ============================================================================

fn build_var_decl(ctx: Ctx<'_, '_>, pair: Pair<'_, Rule>) -> Result<VarDecl> {
    let pos = ctx.pos(pair.as_span());
    let mut name = String::new();
    let mut value = None;
    for p in pair.into_inner() {
        match p.as_rule() {
            Rule::ident => name = p.as_str().to_string(),
            Rule::expr => value = Some(build_expr(ctx, p)?),
            _ => {}
        }
    }
    Ok(VarDecl { pos, name, value })
}

fn build_assignment(ctx: Ctx<'_, '_>, pair: Pair<'_, Rule>) -> Result<Assignment> {
    let pos = ctx.pos(pair.as_span());
    let span = pair.as_span();
    let mut name = String::new();
    let mut value = None;
    for p in pair.into_inner() {
        match p.as_rule() {
            Rule::ident => name = p.as_str().to_string(),
            Rule::expr => value = Some(build_expr(ctx, p)?),
            _ => {}
        }
    }
    let value = value.ok_or_else(|| ctx.error(span, "assignment is missing a value"))?;
    Ok(Assignment { pos, name, value })
}

fn build_if(ctx: Ctx<'_, '_>, pair: Pair<'_, Rule>) -> Result<IfStmt> {
    let pos = ctx.pos(pair.as_span());
    let span = pair.as_span();
    let mut condition = None;
    let mut then_block = None;
    let mut else_block = None;
    for p in pair.into_inner() {
        match p.as_rule() {
            Rule::expr => condition = Some(build_expr(ctx, p)?),
            Rule::block if then_block.is_none() => then_block = Some(build_block(ctx, p)?),
            Rule::block => else_block = Some(build_block(ctx, p)?),
            Rule::if_stmt => {
                // `else if` lowers to an else block holding one nested if.
                let nested = build_if(ctx, p)?;
                else_block = Some(Block {
                    pos: nested.pos.clone(),
                    statements: vec![Stmt::If(nested)],
                });
            }
            _ => {}
        }
    }
    Ok(IfStmt {
        pos,
        condition: condition.ok_or_else(|| ctx.error(span, "if is missing a condition"))?,
        then_block: then_block.ok_or_else(|| ctx.error(span, "if is missing a body"))?,
        else_block,
    })
}

fn build_for(ctx: Ctx<'_, '_>, pair: Pair<'_, Rule>) -> Result<ForLoop> {
    let pos = ctx.pos(pair.as_span());
    let span = pair.as_span();
    let mut variable = String::new();
    let mut iterable = None;
    let mut body = None;
    for p in pair.into_inner() {
        match p.as_rule() {
            Rule::ident => variable = p.as_str().to_string(),
            Rule::expr => iterable = Some(build_expr(ctx, p)?),
            Rule::block => body = Some(build_block(ctx, p)?),
            _ => {}
        }
    }
    Ok(ForLoop {
        pos,
        variable,
        iterable: iterable.ok_or_else(|| ctx.error(span, "for is missing an iterable"))?,
        body: body.ok_or_else(|| ctx.error(span, "for is missing a body"))?,
    })
}

fn build_function(ctx: Ctx<'_, '_>, pair: Pair<'_, Rule>) -> Result<FunctionDecl> {
    let pos = ctx.pos(pair.as_span());
    let span = pair.as_span();
    let mut name = String::new();
    let mut params = Vec::new();
    let mut body = None;
    for p in pair.into_inner() {
        match p.as_rule() {
            Rule::ident => name = p.as_str().to_string(),
            Rule::param_list => {
                params = p.into_inner().map(|i| i.as_str().to_string()).collect();
            }
            Rule::block => body = Some(build_block(ctx, p)?),
            _ => {}
        }
    }
    Ok(FunctionDecl {
        pos,
        name,
        params,
        body: body.ok_or_else(|| ctx.error(span, "function is missing a body"))?,
    })
}

fn build_block(ctx: Ctx<'_, '_>, pair: Pair<'_, Rule>) -> Result<Block> {
    let pos = ctx.pos(pair.as_span());
    let statements = pair
        .into_inner()
        .map(|p| build_statement(ctx, p))
        .collect::<Result<Vec<_>>>()?;
    Ok(Block { pos, statements })
}

// ============================================================================
// Expressions
// ============================================================================

pub fn build_expr(ctx: Ctx<'_, '_>, pair: Pair<'_, Rule>) -> Result<Expr> {
    let pos = ctx.pos(pair.as_span());
    match pair.as_rule() {
        Rule::expr => build_expr(ctx, first_inner(ctx, pair)?),
        Rule::or_expr | Rule::and_expr | Rule::cmp_expr | Rule::add_expr | Rule::mul_expr => {
            build_binary_chain(ctx, pair)
        }
        Rule::unary_expr => {
            let span = pair.as_span();
            let mut inner = pair.into_inner();
            let first = inner.next().ok_or_else(|| ctx.error(span, "empty expression"))?;
            if first.as_rule() != Rule::unary_op {
                return build_expr(ctx, first);
            }
            let op = UnaryOp::from_symbol(first.as_str()).ok_or_else(|| {
                ctx.error(first.as_span(), format!("unknown operator '{}'", first.as_str()))
            })?;
            let operand = inner
                .next()
                .ok_or_else(|| ctx.error(span, "unary operator is missing an operand"))?;
            Ok(Expr::Unary(UnaryExpr {
                pos,
                op,
                operand: Box::new(build_expr(ctx, operand)?),
            }))
        }
        Rule::bool_lit => Ok(Expr::Bool(BoolLiteral {
            pos,
            value: pair.as_str() == "true",
        })),
        Rule::number => Ok(Expr::Number(NumberLiteral {
            pos,
            value: parse_number(ctx, &pair)?,
        })),
        Rule::string => Ok(Expr::String(StringLiteral {
            pos,
            value: string_value(pair),
        })),
        Rule::ident => Ok(Expr::Ident(Identifier {
            pos,
            name: pair.as_str().to_string(),
        })),
        Rule::array_lit => {
            let elements = pair
                .into_inner()
                .map(|p| build_expr(ctx, p))
                .collect::<Result<Vec<_>>>()?;
            Ok(Expr::Array(ArrayLiteral { pos, elements }))
        }
        Rule::call => {
            let mut name = String::new();
            let mut args = Vec::new();
            for p in pair.into_inner() {
                match p.as_rule() {
                    Rule::ident => name = p.as_str().to_string(),
                    Rule::expr => args.push(build_expr(ctx, p)?),
                    _ => {}
                }
            }
            Ok(Expr::Call(FunctionCall { pos, name, args }))
        }
        other => Err(ctx.error(
            pair.as_span(),
            format!("unexpected {:?} in expression position", other),
        )),
    }
}

/// Folds `operand (op operand)*` left-associatively.
fn build_binary_chain(ctx: Ctx<'_, '_>, pair: Pair<'_, Rule>) -> Result<Expr> {
    let span = pair.as_span();
    let pos = ctx.pos(span);
    let mut inner = pair.into_inner();
    let first = inner.next().ok_or_else(|| ctx.error(span, "empty expression"))?;
    let mut left = build_expr(ctx, first)?;
    while let Some(op_pair) = inner.next() {
        let op = BinaryOp::from_symbol(op_pair.as_str()).ok_or_else(|| {
            ctx.error(op_pair.as_span(), format!("unknown operator '{}'", op_pair.as_str()))
        })?;
        let rhs = inner
            .next()
            .ok_or_else(|| ctx.error(op_pair.as_span(), "operator is missing its right operand"))?;
        left = Expr::Binary(BinaryExpr {
            pos: pos.clone(),
            left: Box::new(left),
            op,
            right: Box::new(build_expr(ctx, rhs)?),
        });
    }
    Ok(left)
}

// ============================================================================
// Declarations
// ============================================================================

fn build_property(ctx: Ctx<'_, '_>, pair: Pair<'_, Rule>) -> Result<Property> {
    let pos = ctx.pos(pair.as_span());
    let span = pair.as_span();
    let mut key = String::new();
    let mut value = None;
    for p in pair.into_inner() {
        match p.as_rule() {
            Rule::property_key => key = p.as_str().to_string(),
            Rule::expr => value = Some(build_expr(ctx, p)?),
            _ => {}
        }
    }
    let value = value.ok_or_else(|| ctx.error(span, format!("property '{}' has no value", key)))?;
    Ok(Property { pos, key, value })
}

fn build_named_properties(
    ctx: Ctx<'_, '_>,
    pair: Pair<'_, Rule>,
) -> Result<(Position, String, Vec<Property>)> {
    let pos = ctx.pos(pair.as_span());
    let mut name = String::new();
    let mut properties = Vec::new();
    for p in pair.into_inner() {
        match p.as_rule() {
            Rule::ident => name = p.as_str().to_string(),
            Rule::property => properties.push(build_property(ctx, p)?),
            _ => {}
        }
    }
    Ok((pos, name, properties))
}

fn build_config(ctx: Ctx<'_, '_>, pair: Pair<'_, Rule>) -> Result<ConfigDecl> {
    let pos = ctx.pos(pair.as_span());
    let properties = pair
        .into_inner()
        .filter(|p| p.as_rule() == Rule::property)
        .map(|p| build_property(ctx, p))
        .collect::<Result<Vec<_>>>()?;
    let mut engine = DatabaseEngine::default();
    if let Some(name) = property_str(&properties, "database_type") {
        match DatabaseEngine::from_name(name) {
            Some(e) => engine = e,
            None => warn!(
                engine = name,
                fallback = engine.as_str(),
                "unrecognized database_type, keeping default engine"
            ),
        }
    }
    Ok(ConfigDecl {
        pos,
        engine,
        properties,
    })
}

fn build_database(ctx: Ctx<'_, '_>, pair: Pair<'_, Rule>) -> Result<DatabaseBlock> {
    let pos = ctx.pos(pair.as_span());
    let mut engine = DatabaseEngine::default();
    let mut declarations = Vec::new();
    for p in pair.into_inner() {
        match p.as_rule() {
            Rule::engine_name => match DatabaseEngine::from_name(p.as_str()) {
                Some(e) => engine = e,
                None => warn!(
                    engine = p.as_str(),
                    fallback = engine.as_str(),
                    "unrecognized database engine, keeping default engine"
                ),
            },
            Rule::model_decl => {
                let (pos, name, description, fields, indexes) = build_model_parts(ctx, p)?;
                declarations.push(Stmt::Model(ModelDecl {
                    pos,
                    name,
                    description,
                    fields,
                    indexes,
                }));
            }
            Rule::collection_decl => {
                let (pos, name, description, fields, indexes) = build_model_parts(ctx, p)?;
                declarations.push(Stmt::Collection(CollectionDecl {
                    pos,
                    name,
                    description,
                    fields,
                    indexes,
                }));
            }
            _ => {}
        }
    }
    Ok(DatabaseBlock {
        pos,
        engine,
        declarations,
    })
}

type ModelParts = (
    Position,
    String,
    Option<String>,
    Vec<FieldDecl>,
    Vec<IndexDecl>,
);

fn build_model_parts(ctx: Ctx<'_, '_>, pair: Pair<'_, Rule>) -> Result<ModelParts> {
    let pos = ctx.pos(pair.as_span());
    let mut name = String::new();
    let mut description = None;
    let mut fields = Vec::new();
    let mut indexes = Vec::new();
    for p in pair.into_inner() {
        match p.as_rule() {
            Rule::ident => name = p.as_str().to_string(),
            Rule::string => description = Some(string_value(p)),
            Rule::field_decl => fields.push(build_field(ctx, p)?),
            Rule::index_decl => {
                let pos = ctx.pos(p.as_span());
                let mut unique = false;
                let mut index_fields = Vec::new();
                for i in p.into_inner() {
                    match i.as_rule() {
                        Rule::kw_unique => unique = true,
                        Rule::field_path => index_fields.push(i.as_str().to_string()),
                        _ => {}
                    }
                }
                indexes.push(IndexDecl {
                    pos,
                    fields: index_fields,
                    unique,
                });
            }
            _ => {}
        }
    }
    Ok((pos, name, description, fields, indexes))
}

fn build_field(ctx: Ctx<'_, '_>, pair: Pair<'_, Rule>) -> Result<FieldDecl> {
    let pos = ctx.pos(pair.as_span());
    let mut name = String::new();
    let mut field_type = String::new();
    let mut modifiers = Vec::new();
    let mut fields = Vec::new();
    for p in pair.into_inner() {
        match p.as_rule() {
            Rule::field_name => name = p.as_str().to_string(),
            Rule::type_name => field_type = p.as_str().to_string(),
            Rule::modifier => modifiers.push(build_modifier(ctx, p)),
            Rule::field_decl => fields.push(build_field(ctx, p)?),
            _ => {}
        }
    }
    Ok(FieldDecl {
        pos,
        name,
        field_type,
        modifiers,
        fields,
    })
}

fn build_modifier(ctx: Ctx<'_, '_>, pair: Pair<'_, Rule>) -> FieldModifier {
    let pos = ctx.pos(pair.as_span());
    let mut name = String::new();
    let mut argument = None;
    for p in pair.into_inner() {
        match p.as_rule() {
            Rule::modifier_name => name = p.as_str().to_string(),
            Rule::string => argument = Some(string_value(p)),
            Rule::number | Rule::bool_lit | Rule::field_path => {
                argument = Some(p.as_str().to_string())
            }
            _ => {}
        }
    }
    FieldModifier {
        pos,
        name,
        argument,
    }
}

fn build_event(ctx: Ctx<'_, '_>, pair: Pair<'_, Rule>) -> Result<EventDecl> {
    let pos = ctx.pos(pair.as_span());
    // The schema braces are literals; their presence shows in the text only.
    let has_schema = pair.as_str().trim_end().ends_with('}');
    let mut name = String::new();
    let mut schema = Vec::new();
    for p in pair.into_inner() {
        match p.as_rule() {
            Rule::event_name => name = p.as_str().to_string(),
            Rule::schema_field => {
                let pos = ctx.pos(p.as_span());
                let mut field_name = String::new();
                let mut field_type = String::new();
                let mut required = true;
                for f in p.into_inner() {
                    match f.as_rule() {
                        Rule::field_name => field_name = f.as_str().to_string(),
                        Rule::type_name => field_type = f.as_str().to_string(),
                        Rule::optional_mark => required = false,
                        _ => {}
                    }
                }
                schema.push(SchemaField {
                    pos,
                    name: field_name,
                    field_type,
                    required,
                });
            }
            _ => {}
        }
    }
    Ok(EventDecl {
        pos,
        name,
        schema: has_schema.then_some(schema),
    })
}

fn build_event_handler(ctx: Ctx<'_, '_>, pair: Pair<'_, Rule>) -> Result<EventHandlerDecl> {
    let pos = ctx.pos(pair.as_span());
    let mut event = None;
    let mut action = String::new();
    let mut target = String::new();
    let mut is_async = false;
    for p in pair.into_inner() {
        match p.as_rule() {
            Rule::event_name if event.is_none() => event = Some(p.as_str().to_string()),
            Rule::event_name => target = p.as_str().to_string(),
            Rule::handler_action => action = p.as_str().to_string(),
            Rule::kw_async => is_async = true,
            _ => {}
        }
    }
    Ok(EventHandlerDecl {
        pos,
        event: event.unwrap_or_default(),
        action,
        target,
        is_async,
    })
}

fn build_integration(ctx: Ctx<'_, '_>, pair: Pair<'_, Rule>) -> Result<IntegrationDecl> {
    let pos = ctx.pos(pair.as_span());
    let mut name = String::new();
    let mut base_url = None;
    let mut auth = None;
    let mut circuit_breaker = None;
    let mut properties = Vec::new();
    for p in pair.into_inner() {
        match p.as_rule() {
            Rule::ident => name = p.as_str().to_string(),
            Rule::integration_auth => {
                let (pos, kind, props) = build_named_properties(ctx, p)?;
                auth = Some(IntegrationAuth {
                    pos,
                    kind,
                    properties: props,
                });
            }
            Rule::circuit_breaker => {
                let mut cb = CircuitBreakerConfig {
                    pos: ctx.pos(p.as_span()),
                    threshold: 0,
                    timeout: String::new(),
                    max_concurrent: 0,
                };
                for i in p.into_inner().filter(|i| i.as_rule() == Rule::property) {
                    let span = i.as_span();
                    let prop = build_property(ctx, i)?;
                    match prop.key.as_str() {
                        "threshold" => cb.threshold = breaker_int(ctx, span, &prop)?,
                        "max_concurrent" => cb.max_concurrent = breaker_int(ctx, span, &prop)?,
                        "timeout" => cb.timeout = prop.value.as_str().unwrap_or_default().to_string(),
                        _ => {}
                    }
                }
                circuit_breaker = Some(cb);
            }
            Rule::property => {
                let prop = build_property(ctx, p)?;
                if prop.key == "base_url" {
                    base_url = prop.value.as_str().map(str::to_string);
                } else {
                    properties.push(prop);
                }
            }
            _ => {}
        }
    }
    Ok(IntegrationDecl {
        pos,
        name,
        base_url,
        auth,
        circuit_breaker,
        properties,
    })
}

/// Circuit breaker limits are integers, optionally negated.
fn breaker_int(ctx: Ctx<'_, '_>, span: Span<'_>, prop: &Property) -> Result<i64> {
    let value = match &prop.value {
        Expr::Number(n) => Some(n.value),
        Expr::Unary(u) if u.op == UnaryOp::Neg => u.operand.as_number().map(|n| -n),
        _ => None,
    };
    match value {
        Some(n) if n.is_finite() && n.fract() == 0.0 => Ok(n as i64),
        Some(n) => Err(ctx.error(
            span,
            format!("circuit breaker {} must be an integer, got {}", prop.key, n),
        )),
        None => Err(ctx.error(
            span,
            format!("circuit breaker {} must be a number, got {}", prop.key, prop.value),
        )),
    }
}

fn build_webhook(ctx: Ctx<'_, '_>, pair: Pair<'_, Rule>) -> Result<WebhookDecl> {
    let (pos, name, all) = build_named_properties(ctx, pair)?;
    let mut url = None;
    let mut events = Vec::new();
    let mut secret = None;
    let mut properties = Vec::new();
    for prop in all {
        match prop.key.as_str() {
            "url" => url = prop.value.as_str().map(str::to_string),
            "secret" => secret = prop.value.as_str().map(str::to_string),
            "events" => {
                if let Expr::Array(arr) = &prop.value {
                    events = arr
                        .elements
                        .iter()
                        .map(|e| match e {
                            Expr::Ident(id) => id.name.clone(),
                            other => other.as_str().map(str::to_string).unwrap_or_else(|| other.to_string()),
                        })
                        .collect();
                }
            }
            _ => properties.push(prop),
        }
    }
    Ok(WebhookDecl {
        pos,
        name,
        url,
        events,
        secret,
        properties,
    })
}
