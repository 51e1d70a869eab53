//! Lowering for the endpoint grammar.

use pest::iterators::Pair;
use tracing::warn;

use super::{parse_int, string_value, Ctx};
use crate::ast::*;
use crate::errors::FrontendError;
use crate::grammar::endpoint::Rule;

type Result<T> = std::result::Result<T, FrontendError>;

const DEFAULT_STATUS: i64 = 200;

/// Lowers an `endpoint_file` pair into one endpoint declaration.
pub fn build_endpoint_file(ctx: Ctx<'_, '_>, pair: Pair<'_, Rule>) -> Result<EndpointDecl> {
    let span = pair.as_span();
    let decl = pair
        .into_inner()
        .find(|p| p.as_rule() == Rule::endpoint_decl)
        .ok_or_else(|| ctx.error(span, "expected endpoint declaration"))?;
    build_endpoint(ctx, decl)
}

fn build_endpoint(ctx: Ctx<'_, '_>, pair: Pair<'_, Rule>) -> Result<EndpointDecl> {
    let mut endpoint = EndpointDecl {
        pos: ctx.pos(pair.as_span()),
        method: HttpMethod::default(),
        path: String::new(),
        description: None,
        handler: None,
        middleware: Vec::new(),
        role: None,
        annotations: Vec::new(),
        request: None,
        response: None,
        logic: Vec::new(),
    };
    for p in pair.into_inner() {
        match p.as_rule() {
            Rule::annotation => endpoint.annotations.push(build_annotation(ctx, p)),
            Rule::kw_endpoint => endpoint.pos = ctx.pos(p.as_span()),
            Rule::http_method => {
                endpoint.method = HttpMethod::from_name(p.as_str()).unwrap_or_else(|| {
                    warn!(method = p.as_str(), "unrecognized HTTP method, defaulting to GET");
                    HttpMethod::Get
                });
            }
            Rule::string => endpoint.path = string_value(p),
            Rule::description_prop => {
                endpoint.description = p
                    .into_inner()
                    .find(|i| i.as_rule() == Rule::string)
                    .map(string_value);
            }
            Rule::handler_prop => endpoint.handler = words(p).into_iter().next(),
            Rule::middleware_prop => endpoint.middleware = words(p),
            Rule::role_prop => {
                endpoint.role = p.into_inner().find_map(|i| match i.as_rule() {
                    Rule::string => Some(string_value(i)),
                    Rule::step_word => Some(i.as_str().to_string()),
                    _ => None,
                });
            }
            Rule::request_prop => endpoint.request = Some(build_request(ctx, p)?),
            Rule::response_prop => endpoint.response = Some(build_response(ctx, p)?),
            Rule::logic_block => {
                endpoint.logic = p
                    .into_inner()
                    .filter(|i| i.as_rule() == Rule::logic_step)
                    .map(|i| build_logic_step(ctx, i))
                    .collect();
            }
            _ => {}
        }
    }
    Ok(endpoint)
}

/// The `step_word` children of a pair, in order.
fn words(pair: Pair<'_, Rule>) -> Vec<String> {
    pair.into_inner()
        .filter(|p| p.as_rule() == Rule::step_word)
        .map(|p| p.as_str().to_string())
        .collect()
}

fn build_annotation(ctx: Ctx<'_, '_>, pair: Pair<'_, Rule>) -> Annotation {
    let pos = ctx.pos(pair.as_span());
    let mut name = String::new();
    let mut value = None;
    for p in pair.into_inner() {
        match p.as_rule() {
            Rule::annotation_name => name = p.as_str().to_string(),
            Rule::string => value = Some(string_value(p)),
            Rule::step_word => value = Some(p.as_str().to_string()),
            _ => {}
        }
    }
    Annotation { pos, name, value }
}

fn build_request(ctx: Ctx<'_, '_>, pair: Pair<'_, Rule>) -> Result<RequestSpec> {
    let pos = ctx.pos(pair.as_span());
    let mut type_name = String::new();
    let mut source = None;
    let mut after_from = false;
    for p in pair.into_inner() {
        match p.as_rule() {
            Rule::kw_from => after_from = true,
            Rule::step_word if after_from => {
                source = Some(RequestSource::from_name(p.as_str()).ok_or_else(|| {
                    ctx.error(
                        p.as_span(),
                        format!(
                            "unknown request source '{}' (expected body, query, params, headers or form)",
                            p.as_str()
                        ),
                    )
                })?);
            }
            Rule::step_word => type_name = p.as_str().to_string(),
            _ => {}
        }
    }
    Ok(RequestSpec {
        pos,
        type_name,
        source,
    })
}

fn build_response(ctx: Ctx<'_, '_>, pair: Pair<'_, Rule>) -> Result<ResponseSpec> {
    let pos = ctx.pos(pair.as_span());
    let mut type_name = String::new();
    let mut status = DEFAULT_STATUS;
    for p in pair.into_inner() {
        match p.as_rule() {
            Rule::step_word => type_name = p.as_str().to_string(),
            Rule::number => status = parse_int(ctx, &p, "status code")?,
            _ => {}
        }
    }
    Ok(ResponseSpec {
        pos,
        type_name,
        status,
    })
}

fn build_step_arg(pair: Pair<'_, Rule>) -> StepArg {
    // step_target and step_arg wrap exactly one string or word.
    match pair.into_inner().next() {
        Some(p) if p.as_rule() == Rule::string => StepArg::quoted(string_value(p)),
        Some(p) => StepArg::word(p.as_str()),
        None => StepArg::word(""),
    }
}

fn build_logic_step(ctx: Ctx<'_, '_>, pair: Pair<'_, Rule>) -> LogicStep {
    let mut step = LogicStep {
        pos: ctx.pos(pair.as_span()),
        action: String::new(),
        target: None,
        args: Vec::new(),
        options: Vec::new(),
    };
    for p in pair.into_inner() {
        match p.as_rule() {
            Rule::step_word => step.action = p.as_str().to_string(),
            Rule::step_target => step.target = Some(build_step_arg(p)),
            Rule::step_args => {
                step.args = p
                    .into_inner()
                    .filter(|a| a.as_rule() == Rule::step_arg)
                    .map(build_step_arg)
                    .collect();
            }
            Rule::step_options => {
                for opt in p.into_inner().filter(|o| o.as_rule() == Rule::step_option) {
                    let mut key = String::new();
                    let mut value = StepArg::word("");
                    for part in opt.into_inner() {
                        match part.as_rule() {
                            Rule::step_word => key = part.as_str().to_string(),
                            Rule::step_arg => value = build_step_arg(part),
                            _ => {}
                        }
                    }
                    step.options.push(StepOption { key, value });
                }
            }
            _ => {}
        }
    }
    step
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::endpoint::EndpointParser;
    use crate::lexer::SourceMap;
    use pest::Parser;

    fn convert(src: &str) -> EndpointDecl {
        let map = SourceMap::new("api.cdt", src);
        let ctx = Ctx::new(&map, 0);
        let pair = EndpointParser::parse(Rule::endpoint_file, src)
            .expect("parse")
            .next()
            .expect("file");
        build_endpoint_file(ctx, pair).expect("convert")
    }

    #[test]
    fn full_endpoint_lowers_every_member() {
        let ep = convert(
            r#"@auth("admin") @rate_limit(100) @deprecated
endpoint POST "/users/:id" {
  description: "Create a user"
  handler: createUser
  middleware: [cors, logging]
  role: admin
  request: CreateUser from body
  response: User status 201
  logic {
    validate request
    insert user(id, "active") { table: users, ttl: "60s" }
    return user
  }
}"#,
        );
        assert_eq!(ep.method, HttpMethod::Post);
        assert_eq!(ep.path, "/users/:id");
        assert_eq!(ep.pos.line, 2);
        assert_eq!(ep.annotations.len(), 3);
        assert_eq!(ep.annotations[1].value.as_deref(), Some("100"));
        assert_eq!(ep.annotations[2].value, None);
        assert_eq!(ep.handler.as_deref(), Some("createUser"));
        assert_eq!(ep.middleware, vec!["cors", "logging"]);
        assert_eq!(ep.role.as_deref(), Some("admin"));
        let req = ep.request.as_ref().expect("request");
        assert_eq!((req.type_name.as_str(), req.source), ("CreateUser", Some(RequestSource::Body)));
        assert_eq!(ep.response.as_ref().map(|r| r.status), Some(201));
        assert_eq!(ep.logic.len(), 3);
        let insert = &ep.logic[1];
        assert_eq!(insert.action, "insert");
        assert_eq!(insert.target, Some(StepArg::word("user")));
        assert_eq!(insert.args, vec![StepArg::word("id"), StepArg::quoted("active")]);
        assert_eq!(insert.options[1].value, StepArg::quoted("60s"));
    }

    #[test]
    fn unknown_method_falls_back_to_get() {
        let ep = convert("endpoint FETCH \"/a\" { }");
        assert_eq!(ep.method, HttpMethod::Get);
    }

    #[test]
    fn lowercase_methods_are_accepted() {
        let ep = convert("endpoint delete \"/a\" { }");
        assert_eq!(ep.method, HttpMethod::Delete);
    }

    #[test]
    fn response_without_status_defaults_to_200() {
        let ep = convert("endpoint GET \"/a\" { response: Item }");
        assert_eq!(ep.response.map(|r| r.status), Some(200));
    }
}
