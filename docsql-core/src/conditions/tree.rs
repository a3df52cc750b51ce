//! Boolean tree built from a condition token stream.
//!
//! Precedence is `!` over `&&` over `||`. The parser is tolerant: a connective
//! with a missing operand keeps the operand it has, and an unbalanced `)` is
//! reported and ignored.

use crate::templates::Evaluator;
use crate::types::Row;

use super::ConditionToken;

#[derive(Debug, Clone)]
pub(crate) enum Node {
    Leaf(Evaluator),
    All(Vec<Node>),
    Any(Vec<Node>),
    Not(Box<Node>),
}

impl Node {
    /// `None` when no leaf below applies to the row.
    pub(crate) fn evaluate(&self, row: &Row) -> Option<bool> {
        match self {
            Node::Leaf(evaluator) => evaluator.evaluate(row).as_bool(),
            Node::All(nodes) => {
                let mut seen = false;
                for node in nodes {
                    match node.evaluate(row) {
                        Some(false) => return Some(false),
                        Some(true) => seen = true,
                        None => {}
                    }
                }
                seen.then_some(true)
            }
            Node::Any(nodes) => {
                let mut seen = false;
                for node in nodes {
                    match node.evaluate(row) {
                        Some(true) => return Some(true),
                        Some(false) => seen = true,
                        None => {}
                    }
                }
                seen.then_some(false)
            }
            Node::Not(node) => node.evaluate(row).map(|b| !b),
        }
    }
}

pub(crate) fn parse(tokens: &[ConditionToken]) -> Option<Node> {
    let mut parser = Parser { tokens, pos: 0 };
    let mut nodes = Vec::new();
    while parser.pos < tokens.len() {
        if matches!(parser.peek(), Some(ConditionToken::Close)) {
            tracing::warn!(position = parser.pos, "unbalanced ')' in condition, ignored");
            parser.pos += 1;
            continue;
        }
        let before = parser.pos;
        if let Some(node) = parser.parse_or() {
            nodes.push(node);
        }
        if parser.pos == before {
            parser.pos += 1;
        }
    }
    group(nodes, Node::All)
}

fn group(mut nodes: Vec<Node>, wrap: fn(Vec<Node>) -> Node) -> Option<Node> {
    match nodes.len() {
        0 => None,
        1 => nodes.pop(),
        _ => Some(wrap(nodes)),
    }
}

struct Parser<'a> {
    tokens: &'a [ConditionToken],
    pos: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&ConditionToken> {
        self.tokens.get(self.pos)
    }

    fn eat(&mut self, matcher: fn(&ConditionToken) -> bool) -> bool {
        match self.peek() {
            Some(token) if matcher(token) => {
                self.pos += 1;
                true
            }
            _ => false,
        }
    }

    fn parse_or(&mut self) -> Option<Node> {
        let mut nodes: Vec<Node> = self.parse_and().into_iter().collect();
        while self.eat(|t| matches!(t, ConditionToken::Or)) {
            nodes.extend(self.parse_and());
        }
        group(nodes, Node::Any)
    }

    fn parse_and(&mut self) -> Option<Node> {
        let mut nodes: Vec<Node> = self.parse_unary().into_iter().collect();
        while self.eat(|t| matches!(t, ConditionToken::And)) {
            nodes.extend(self.parse_unary());
        }
        group(nodes, Node::All)
    }

    fn parse_unary(&mut self) -> Option<Node> {
        if self.eat(|t| matches!(t, ConditionToken::Not)) {
            return self.parse_unary().map(|node| Node::Not(Box::new(node)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Option<Node> {
        match self.peek()? {
            ConditionToken::Leaf(leaf) => {
                let node = Node::Leaf(leaf.evaluator.clone());
                self.pos += 1;
                Some(node)
            }
            ConditionToken::Open => {
                self.pos += 1;
                let node = self.parse_or();
                if !self.eat(|t| matches!(t, ConditionToken::Close)) {
                    tracing::warn!(position = self.pos, "unclosed '(' in condition");
                }
                node
            }
            _ => None,
        }
    }
}
