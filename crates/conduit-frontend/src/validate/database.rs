//! Config and database checks: engine consistency between `config` and
//! `database` blocks, then per-model and per-collection field, modifier and
//! index rules.

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

use super::Diagnostics;
use crate::ast::*;

/// Deepest allowed nesting of embedded documents in a collection.
pub const MAX_EMBED_DEPTH: usize = 5;

const RELATIONAL_TYPES: &[&str] = &[
    "string", "text", "int", "integer", "bigint", "float", "decimal", "boolean", "bool", "date",
    "datetime", "timestamp", "uuid", "json", "binary",
];

const DOCUMENT_TYPES: &[&str] = &[
    "string", "int", "integer", "long", "double", "decimal", "boolean", "bool", "date",
    "timestamp", "objectid", "object", "array", "binary", "uuid",
];

/// Modifier name and whether it takes an argument.
const MODIFIERS: &[(&str, bool)] = &[
    ("primary", false),
    ("unique", false),
    ("required", false),
    ("optional", false),
    ("index", false),
    ("default", true),
    ("auto_increment", false),
    ("foreign_key", true),
    ("references", true),
    ("cascade", false),
];

const RELATIONAL_ONLY_MODIFIERS: &[&str] = &["foreign_key", "references", "cascade"];

pub fn check_program(program: &Program, diags: &mut Diagnostics) {
    let before = diags.len();

    let mut config: Option<&ConfigDecl> = None;
    for stmt in &program.statements {
        if let Stmt::Config(c) = stmt {
            match config {
                Some(first) => diags.semantic(
                    &c.pos,
                    format!("only one config block is allowed (first declared at {})", first.pos),
                ),
                None => {
                    check_config(c, diags);
                    config = Some(c);
                }
            }
        }
    }

    let expected = config.map(|c| c.engine).unwrap_or_default();
    let blocks: Vec<&DatabaseBlock> = program
        .statements
        .iter()
        .filter_map(|s| match s {
            Stmt::Database(db) => Some(db),
            _ => None,
        })
        .collect();

    for db in &blocks {
        if db.engine != expected {
            let source = if config.is_some() { "config declares" } else { "default engine is" };
            diags.semantic(
                &db.pos,
                format!(
                    "database engine mismatch: block uses {} but {} {}",
                    db.engine, source, expected
                ),
            );
        }
    }
    if expected.is_document() && !blocks.is_empty() && !blocks.iter().any(|b| b.engine.is_document()) {
        if let Some(c) = config {
            diags.semantic(
                &c.pos,
                format!("{} config requires at least one {} database block", expected, expected),
            );
        }
    }

    let mut names: FxHashMap<&str, &Position> = FxHashMap::default();
    for db in &blocks {
        for decl in &db.declarations {
            match decl {
                Stmt::Model(m) => {
                    if db.engine.is_document() {
                        diags.semantic(
                            &m.pos,
                            format!(
                                "model '{}' is not allowed in a {} database; use collection",
                                m.name, db.engine
                            ),
                        );
                        continue;
                    }
                    check_unique_name(&mut names, "model", &m.name, &m.pos, diags);
                    check_model(m, diags);
                }
                Stmt::Collection(c) => {
                    if !db.engine.is_document() {
                        diags.semantic(
                            &c.pos,
                            format!(
                                "collection '{}' is not allowed in a {} database; use model",
                                c.name, db.engine
                            ),
                        );
                        continue;
                    }
                    check_unique_name(&mut names, "collection", &c.name, &c.pos, diags);
                    check_collection(c, diags);
                }
                other => diags.semantic(
                    other.pos(),
                    format!("{} is not allowed inside a database block", other.kind()),
                ),
            }
        }
    }

    debug!(
        blocks = blocks.len(),
        errors = diags.len() - before,
        "config/database pass finished"
    );
}

fn check_unique_name<'p>(
    names: &mut FxHashMap<&'p str, &'p Position>,
    kind: &str,
    name: &'p str,
    pos: &'p Position,
    diags: &mut Diagnostics,
) {
    if let Some(first) = names.get(name) {
        diags.semantic(
            pos,
            format!("duplicate {} '{}' (first declared at {})", kind, name, first),
        );
    } else {
        names.insert(name, pos);
    }
}

fn check_config(config: &ConfigDecl, diags: &mut Diagnostics) {
    if !config.engine.is_document() {
        return;
    }
    for key in ["mongodb_uri", "mongodb_database"] {
        match config.get(key) {
            Some(v) if !v.trim().is_empty() => {}
            _ => diags.semantic(
                &config.pos,
                format!("mongodb config requires a non-empty {}", key),
            ),
        }
    }
}

fn check_model(model: &ModelDecl, diags: &mut Diagnostics) {
    let mut seen = FxHashSet::default();
    for field in &model.fields {
        if !seen.insert(field.name.as_str()) {
            diags.semantic(
                &field.pos,
                format!("duplicate field '{}' in model '{}'", field.name, model.name),
            );
        }
        if !RELATIONAL_TYPES.contains(&field.field_type.as_str()) {
            diags.semantic(
                &field.pos,
                format!(
                    "unknown type '{}' for field '{}' in model '{}'",
                    field.field_type, field.name, model.name
                ),
            );
        }
        check_modifiers(field, diags);
        if !field.fields.is_empty() {
            diags.semantic(
                &field.pos,
                format!(
                    "field '{}' declares nested fields; only document collections support embedded fields",
                    field.name
                ),
            );
        }
    }
    for index in &model.indexes {
        for name in &index.fields {
            if !seen.contains(name.as_str()) {
                diags.semantic(
                    &index.pos,
                    format!("index references unknown field '{}' in model '{}'", name, model.name),
                );
            }
        }
    }
}

fn check_collection(collection: &CollectionDecl, diags: &mut Diagnostics) {
    check_document_fields(&collection.name, &collection.fields, 0, diags);
    for index in &collection.indexes {
        for path in &index.fields {
            if !resolve_path(&collection.fields, path) {
                diags.semantic(
                    &index.pos,
                    format!(
                        "index references unknown field '{}' in collection '{}'",
                        path, collection.name
                    ),
                );
            }
        }
    }
}

fn check_document_fields(owner: &str, fields: &[FieldDecl], depth: usize, diags: &mut Diagnostics) {
    let mut seen = FxHashSet::default();
    for field in fields {
        if !seen.insert(field.name.as_str()) {
            diags.semantic(
                &field.pos,
                format!("duplicate field '{}' in collection '{}'", field.name, owner),
            );
        }
        if !DOCUMENT_TYPES.contains(&field.field_type.as_str()) {
            diags.semantic(
                &field.pos,
                format!(
                    "unknown type '{}' for field '{}' in collection '{}'",
                    field.field_type, field.name, owner
                ),
            );
        }
        check_modifiers(field, diags);
        for m in &field.modifiers {
            if RELATIONAL_ONLY_MODIFIERS.contains(&m.name.as_str()) {
                diags.semantic(
                    &m.pos,
                    format!(
                        "modifier @{} is not supported on document field '{}'",
                        m.name, field.name
                    ),
                );
            }
        }
        if field.fields.is_empty() {
            continue;
        }
        if !matches!(field.field_type.as_str(), "object" | "array") {
            diags.semantic(
                &field.pos,
                format!(
                    "field '{}' of type '{}' cannot declare nested fields",
                    field.name, field.field_type
                ),
            );
            continue;
        }
        if depth + 1 > MAX_EMBED_DEPTH {
            diags.semantic(
                &field.pos,
                format!(
                    "embedded document '{}' exceeds the maximum nesting depth of {}",
                    field.name, MAX_EMBED_DEPTH
                ),
            );
            continue;
        }
        check_document_fields(owner, &field.fields, depth + 1, diags);
    }
}

/// Resolves a dotted field path through embedded fields.
fn resolve_path(fields: &[FieldDecl], path: &str) -> bool {
    let mut current = fields;
    for segment in path.split('.') {
        match current.iter().find(|f| f.name == segment) {
            Some(f) => current = &f.fields,
            None => return false,
        }
    }
    true
}

fn check_modifiers(field: &FieldDecl, diags: &mut Diagnostics) {
    let mut seen = FxHashSet::default();
    for m in &field.modifiers {
        if !seen.insert(m.name.as_str()) {
            diags.semantic(
                &m.pos,
                format!("duplicate modifier @{} on field '{}'", m.name, field.name),
            );
            continue;
        }
        match MODIFIERS.iter().find(|(name, _)| *name == m.name) {
            None => diags.semantic(
                &m.pos,
                format!("unknown modifier @{} on field '{}'", m.name, field.name),
            ),
            Some((_, true)) if m.argument.is_none() => diags.semantic(
                &m.pos,
                format!("modifier @{} on field '{}' requires an argument", m.name, field.name),
            ),
            Some((_, false)) if m.argument.is_some() => diags.semantic(
                &m.pos,
                format!("modifier @{} on field '{}' takes no argument", m.name, field.name),
            ),
            Some(_) => {}
        }
    }
    if seen.contains("required") && seen.contains("optional") {
        diags.semantic(
            &field.pos,
            format!("field '{}' cannot be both required and optional", field.name),
        );
    }
}
