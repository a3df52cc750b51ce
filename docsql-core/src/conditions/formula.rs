//! Textual formula of a condition stream against one row, e.g. `(1&&0)||1`.
//!
//! Only used for tracing. Skipped leaves render as nothing and `cleanup`
//! removes the residue they leave behind.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::syntax::LogicalOperator;
use crate::types::Row;

use super::ConditionToken;

static CLEANUP_RULES: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    [
        // (1) -> 1
        (r"\(([01])\)", "${1}"),
        // operator before ')' or end
        (r"(&&|\|\|)+(\)|$)", "${2}"),
        // operator after '(' or start
        (r"(\(|^)(&&|\|\|)+", "${1}"),
        (r"\(\)", ""),
        // doubled operators left by a removed group
        (r"(&&|\|\|)(&&|\|\|)+", "${1}"),
        // negation of nothing
        (r"!+(\)|$|&&|\|\|)", "${1}"),
    ]
    .into_iter()
    .filter_map(|(pattern, replacement)| Regex::new(pattern).ok().map(|re| (re, replacement)))
    .collect()
});

/// Render the token stream for a row.
pub fn render(tokens: &[ConditionToken], row: &Row) -> String {
    let mut formula = String::new();
    for token in tokens {
        match token {
            ConditionToken::Leaf(leaf) => match leaf.evaluator.evaluate(row).as_bool() {
                Some(true) => formula.push('1'),
                Some(false) => formula.push('0'),
                None => {}
            },
            ConditionToken::And => formula.push_str(LogicalOperator::And.symbol()),
            ConditionToken::Or => formula.push_str(LogicalOperator::Or.symbol()),
            ConditionToken::Not => formula.push('!'),
            ConditionToken::Open => formula.push('('),
            ConditionToken::Close => formula.push(')'),
        }
    }
    formula
}

/// Strip redundant parentheses, dangling operators and empty groups until
/// nothing changes. Every rule shortens the string, so this terminates.
pub fn cleanup(formula: &str) -> String {
    let mut current = formula.to_string();
    loop {
        let mut next = current.clone();
        for (rule, replacement) in CLEANUP_RULES.iter() {
            next = rule.replace_all(&next, *replacement).into_owned();
        }
        if next == current {
            return current;
        }
        current = next;
    }
}
