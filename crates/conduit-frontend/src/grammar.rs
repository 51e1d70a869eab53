//! # Grammars
//!
//! The three Conduit grammars. Each lives in its own module so each derives
//! its own `Rule` enum; all of them share `grammar/common.pest` for trivia,
//! identifiers and literals.
//!
//! - [`main`]: general statements and domain declarations
//! - [`endpoint`]: one `endpoint` declaration with its annotations
//! - [`workflow`]: one `workflow` or `job` declaration
//!
//! The pest parse tree produced by these parsers is the intermediate
//! representation the converter lowers into the AST.

pub mod main {
    use pest_derive::Parser;

    #[derive(Parser)]
    #[grammar = "../grammar/common.pest"]
    #[grammar = "../grammar/main.pest"]
    pub struct MainParser;
}

pub mod endpoint {
    use pest_derive::Parser;

    #[derive(Parser)]
    #[grammar = "../grammar/common.pest"]
    #[grammar = "../grammar/endpoint.pest"]
    pub struct EndpointParser;
}

pub mod workflow {
    use pest_derive::Parser;

    #[derive(Parser)]
    #[grammar = "../grammar/common.pest"]
    #[grammar = "../grammar/workflow.pest"]
    pub struct WorkflowParser;
}
