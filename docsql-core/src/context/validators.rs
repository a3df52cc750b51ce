//! Argument checks run before an operation's handler.

use serde_json::Value;

use crate::error::{DocsqlError, DocsqlResult};
use crate::syntax::QuerySyntax;
use crate::types::Arg;

pub(super) fn validate(syntax: QuerySyntax, args: &[Arg]) -> DocsqlResult<()> {
    match syntax {
        QuerySyntax::Where | QuerySyntax::Having => validate_keys(syntax, args),
        QuerySyntax::From
        | QuerySyntax::Update
        | QuerySyntax::To
        | QuerySyntax::Insert
        | QuerySyntax::Set
        | QuerySyntax::Union
        | QuerySyntax::UnionAll
        | QuerySyntax::Eq
        | QuerySyntax::Gt
        | QuerySyntax::Lt
        | QuerySyntax::Like
        | QuerySyntax::In
        | QuerySyntax::Between
        | QuerySyntax::OrderBy
        | QuerySyntax::GroupBy => require_args(syntax, args),
        QuerySyntax::Join
        | QuerySyntax::LeftJoin
        | QuerySyntax::RightJoin
        | QuerySyntax::FullJoin
        | QuerySyntax::On
        | QuerySyntax::Using => validate_single_column(syntax, args),
        QuerySyntax::Limit => validate_limit(args),
        QuerySyntax::Exists => validate_exists(args),
        _ => Ok(()),
    }
}

fn clause_name(syntax: QuerySyntax) -> &'static str {
    match syntax {
        QuerySyntax::Having => "HAVING",
        _ => "WHERE",
    }
}

fn validate_keys(syntax: QuerySyntax, args: &[Arg]) -> DocsqlResult<()> {
    match args.first() {
        None => Err(DocsqlError::Validation(format!(
            "Empty {} clause",
            clause_name(syntax)
        ))),
        Some(Arg::Scope(_)) => Err(DocsqlError::Validation(
            "First condition key is logical operator".to_string(),
        )),
        Some(_) => Ok(()),
    }
}

fn require_args(syntax: QuerySyntax, args: &[Arg]) -> DocsqlResult<()> {
    if args.is_empty() {
        return Err(DocsqlError::Validation(format!(
            "{:?} requires at least one argument",
            syntax
        )));
    }
    Ok(())
}

fn validate_single_column(syntax: QuerySyntax, args: &[Arg]) -> DocsqlResult<()> {
    match args {
        [Arg::Property(_) | Arg::Table(_)] => Ok(()),
        [Arg::Value {
            value: Value::String(_),
        }] => Ok(()),
        [other] => Err(DocsqlError::Validation(format!(
            "{:?} expects a column reference, got {:?}",
            syntax, other
        ))),
        _ => Err(DocsqlError::Validation(format!(
            "{:?} expects exactly one argument, got {}",
            syntax,
            args.len()
        ))),
    }
}

fn validate_limit(args: &[Arg]) -> DocsqlResult<()> {
    let integral = |arg: &Arg| match arg {
        Arg::Value {
            value: Value::Number(n),
        } => n.is_i64() || n.as_f64().is_some_and(|f| f.fract() == 0.0),
        _ => false,
    };
    if args.is_empty() || args.len() > 2 || !args.iter().all(integral) {
        return Err(DocsqlError::Validation(
            "LIMIT expects one or two integers".to_string(),
        ));
    }
    Ok(())
}

fn validate_exists(args: &[Arg]) -> DocsqlResult<()> {
    match args {
        [Arg::Subquery(_) | Arg::Reference { .. }] => Ok(()),
        _ => Err(DocsqlError::Validation(
            "EXISTS expects a single sub-query".to_string(),
        )),
    }
}
