//! Recursive descent over the token stream.
//!
//! ```text
//! program : stat NEWLINE program | stat NEWLINE | stat
//! stat    : assign | ifthenelse | INDENT program DEDENT
//! ifthenelse : IF expr THEN stat ELSE stat
//! assign  : ID ASSIGN expr
//! expr    : expr2 OP1 expr | expr2 | func
//! func    : FUNC farg RASSIGN stat
//! farg    : ID COMMA farg | ID | <e>
//! expr2   : expr3 OP2 expr2 | expr3
//! expr3   : expr4 OP3 expr3 | expr4
//! expr4   : expr5 OP4 expr4 | expr5
//! expr5   : expr6 OP5 expr5 | expr6
//! expr6   : exprU OP6 expr6 | exprU
//! exprU   : OP exprC | exprC
//! exprC   : exprA (OPEN arg CLOSE)*
//! arg     : expr COMMA arg | expr | <e>
//! exprA   : NUM | ID | OPEN expr CLOSE
//! ```
//!
//! The binary tiers are right-associative on purpose: each one parses its
//! left operand at the next-higher tier and then recurses into itself for
//! the right operand. An operator belongs to the tier whose symbol set
//! contains its first character.

use strum_macros::Display;
use thiserror::Error;

use crate::core::{Expression, ExpressionKind, Statement, StatementKind, Token, TokenKind};

/// Token kinds a parse position would have accepted, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Expected {
    Number,
    Identifier,
    Assign,
    Open,
    Close,
    Then,
    Else,
    Indent,
    Dedent,
    If,
    Func,
    RAssign,
    Comma,
}

impl Expected {
    fn matches(self, kind: &TokenKind) -> bool {
        matches!(
            (self, kind),
            (Expected::Number, TokenKind::Number(_))
                | (Expected::Identifier, TokenKind::Identifier(_))
                | (Expected::Assign, TokenKind::Assign)
                | (Expected::Open, TokenKind::Open)
                | (Expected::Close, TokenKind::Close)
                | (Expected::Then, TokenKind::Then)
                | (Expected::Else, TokenKind::Else)
                | (Expected::Indent, TokenKind::Indent)
                | (Expected::Dedent, TokenKind::Dedent)
                | (Expected::If, TokenKind::If)
                | (Expected::Func, TokenKind::Func)
                | (Expected::RAssign, TokenKind::RAssign)
                | (Expected::Comma, TokenKind::Comma)
        )
    }
}

fn expected_list(expected: &[Expected]) -> String {
    expected
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error(
        "unexpected {} at line {}, column {}, expected one of: {}",
        .at.kind, .at.span.start_line, .at.span.start_col, expected_list(.expected)
    )]
    UnexpectedToken { at: Token, expected: Vec<Expected> },
}

/// Parse a scanned token sequence into its statement tree. The first
/// unexpected token terminates parsing; there is no recovery.
pub fn parse(tokens: &[Token]) -> Result<Statement, ParseError> {
    Parser { tokens, offset: 0 }.program()
}

struct Parser<'a> {
    tokens: &'a [Token],
    offset: usize,
}

impl<'a> Parser<'a> {
    fn kind(&self) -> &TokenKind {
        &self.tokens[self.offset].kind
    }

    fn unexpected(&self, expected: Vec<Expected>) -> ParseError {
        ParseError::UnexpectedToken {
            at: self.tokens[self.offset].clone(),
            expected,
        }
    }

    fn skip(&mut self, expect: Expected) -> Result<(), ParseError> {
        if expect.matches(self.kind()) {
            self.offset += 1;
            Ok(())
        } else {
            Err(self.unexpected(vec![expect]))
        }
    }

    fn program(&mut self) -> Result<Statement, ParseError> {
        let start = self.offset;
        let mut statements = Vec::new();
        loop {
            if matches!(self.kind(), TokenKind::End | TokenKind::Dedent) {
                break;
            }
            statements.push(self.stat()?);
            if matches!(self.kind(), TokenKind::Newline) {
                self.offset += 1;
            }
        }
        Ok(Statement {
            kind: StatementKind::Block(statements),
            tokens: start..self.offset,
        })
    }

    fn stat(&mut self) -> Result<Statement, ParseError> {
        match self.kind() {
            TokenKind::Identifier(_) => self.assign(),
            TokenKind::If => self.if_then_else(),
            TokenKind::Indent => {
                self.offset += 1;
                let stat = self.program()?;
                self.skip(Expected::Dedent)?;
                Ok(stat)
            }
            _ => Err(self.unexpected(vec![Expected::Identifier, Expected::If, Expected::Indent])),
        }
    }

    fn assign(&mut self) -> Result<Statement, ParseError> {
        let start = self.offset;
        let name = match self.kind() {
            TokenKind::Identifier(name) => name.clone(),
            _ => unreachable!("stat dispatched on an identifier"),
        };
        self.offset += 1;
        self.skip(Expected::Assign)?;
        let expr = self.expr()?;
        Ok(Statement {
            kind: StatementKind::Assignment(name, expr),
            tokens: start..self.offset,
        })
    }

    fn if_then_else(&mut self) -> Result<Statement, ParseError> {
        let start = self.offset;
        self.offset += 1; // the `if` that got us here
        let condition = self.expr()?;
        self.skip(Expected::Then)?;
        let true_branch = self.stat()?;
        self.skip(Expected::Else)?;
        let false_branch = self.stat()?;
        Ok(Statement {
            kind: StatementKind::Condition(
                condition,
                Box::new(true_branch),
                Box::new(false_branch),
            ),
            tokens: start..self.offset,
        })
    }

    fn expr(&mut self) -> Result<Expression, ParseError> {
        if matches!(self.kind(), TokenKind::Func) {
            self.function()
        } else {
            self.tier("$", Self::expr2)
        }
    }

    /// One right-associative binary tier: a left operand at the next-higher
    /// tier, then optionally an operator from this tier's symbol set and a
    /// right operand parsed by this tier again.
    fn tier(
        &mut self,
        ops: &str,
        next: fn(&mut Self) -> Result<Expression, ParseError>,
    ) -> Result<Expression, ParseError> {
        let start = self.offset;
        let left = next(self)?;
        let op = match self.kind() {
            TokenKind::Operator(op) if op.chars().next().map_or(false, |c| ops.contains(c)) => {
                op.clone()
            }
            _ => return Ok(left),
        };
        let op_pos = self.offset;
        self.offset += 1;
        let right = self.tier(ops, next)?;
        Ok(Expression {
            kind: ExpressionKind::Calling(
                Box::new(Expression {
                    kind: ExpressionKind::Identifier(op),
                    tokens: op_pos..op_pos + 1,
                }),
                vec![left, right],
            ),
            tokens: start..self.offset,
        })
    }

    fn expr2(&mut self) -> Result<Expression, ParseError> {
        self.tier("&|^", Self::expr3)
    }

    fn expr3(&mut self) -> Result<Expression, ParseError> {
        self.tier("~=<>", Self::expr4)
    }

    fn expr4(&mut self) -> Result<Expression, ParseError> {
        self.tier("+-", Self::expr5)
    }

    fn expr5(&mut self) -> Result<Expression, ParseError> {
        self.tier("*/", Self::expr6)
    }

    fn expr6(&mut self) -> Result<Expression, ParseError> {
        self.tier("@", Self::unary)
    }

    /// A prefix operator binds tighter than any binary tier and looser than
    /// a call chain.
    fn unary(&mut self) -> Result<Expression, ParseError> {
        let start = self.offset;
        let op = match self.kind() {
            TokenKind::Operator(op) => op.clone(),
            _ => return self.call_chain(),
        };
        self.offset += 1;
        let operand = self.call_chain()?;
        Ok(Expression {
            kind: ExpressionKind::Calling(
                Box::new(Expression {
                    kind: ExpressionKind::Identifier(op),
                    tokens: start..start + 1,
                }),
                vec![operand],
            ),
            tokens: start..self.offset,
        })
    }

    /// Zero or more argument lists applied successively: `f(a)(b)` is two
    /// nested calls.
    fn call_chain(&mut self) -> Result<Expression, ParseError> {
        let start = self.offset;
        let mut expr = self.atom()?;
        while matches!(self.kind(), TokenKind::Open) {
            self.offset += 1;
            let mut args = Vec::new();
            loop {
                if matches!(self.kind(), TokenKind::Close) {
                    self.offset += 1;
                    break;
                }
                args.push(self.expr()?);
                if matches!(self.kind(), TokenKind::Comma) {
                    self.offset += 1;
                }
            }
            expr = Expression {
                kind: ExpressionKind::Calling(Box::new(expr), args),
                tokens: start..self.offset,
            };
        }
        Ok(expr)
    }

    fn atom(&mut self) -> Result<Expression, ParseError> {
        match self.kind() {
            TokenKind::Number(value) => {
                let value = *value;
                self.offset += 1;
                Ok(Expression {
                    kind: ExpressionKind::Number(value),
                    tokens: self.offset - 1..self.offset,
                })
            }
            TokenKind::Identifier(name) => {
                let name = name.clone();
                self.offset += 1;
                Ok(Expression {
                    kind: ExpressionKind::Identifier(name),
                    tokens: self.offset - 1..self.offset,
                })
            }
            TokenKind::Open => {
                self.offset += 1;
                let expr = self.expr()?;
                self.skip(Expected::Close)?;
                Ok(expr)
            }
            _ => Err(self.unexpected(vec![
                Expected::Number,
                Expected::Identifier,
                Expected::Open,
            ])),
        }
    }

    fn function(&mut self) -> Result<Expression, ParseError> {
        let start = self.offset;
        self.offset += 1; // the `\` that got us here
        let mut params = Vec::new();
        loop {
            match self.kind() {
                TokenKind::RAssign => break,
                TokenKind::Identifier(name) => {
                    params.push(name.clone());
                    self.offset += 1;
                    if matches!(self.kind(), TokenKind::Comma) {
                        self.offset += 1;
                    }
                }
                _ => {
                    return Err(
                        self.unexpected(vec![Expected::Identifier, Expected::RAssign])
                    )
                }
            }
        }
        self.offset += 1; // the RASSIGN the loop stopped on
        let body = self.stat()?;
        Ok(Expression {
            kind: ExpressionKind::Function(params, Box::new(body)),
            tokens: start..self.offset,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::scan;

    /// Compact structural form used by the assertions below, so expected
    /// trees stay readable.
    fn stat_sexpr(stat: &Statement) -> String {
        match &stat.kind {
            StatementKind::Assignment(name, expr) => {
                format!("(assign {} {})", name, expr_sexpr(expr))
            }
            StatementKind::Condition(cond, t, f) => format!(
                "(if {} {} {})",
                expr_sexpr(cond),
                stat_sexpr(t),
                stat_sexpr(f)
            ),
            StatementKind::Block(stats) => {
                let inner: Vec<_> = stats.iter().map(stat_sexpr).collect();
                format!("(block {})", inner.join(" "))
            }
        }
    }

    fn expr_sexpr(expr: &Expression) -> String {
        match &expr.kind {
            ExpressionKind::Number(value) => value.to_string(),
            ExpressionKind::Identifier(name) => name.clone(),
            ExpressionKind::Calling(callee, args) => {
                let mut parts = vec![format!("call {}", expr_sexpr(callee))];
                parts.extend(args.iter().map(expr_sexpr));
                format!("({})", parts.join(" "))
            }
            ExpressionKind::Function(params, body) => {
                format!("(fn [{}] {})", params.join(" "), stat_sexpr(body))
            }
        }
    }

    fn parsed(source: &str) -> String {
        let tokens = scan(source).unwrap();
        stat_sexpr(&parse(&tokens).unwrap())
    }

    #[test]
    fn plain_assignment() {
        assert_eq!(parsed("x <- 42"), "(block (assign x 42))");
    }

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        assert_eq!(
            parsed("x <- 1 + 2 * 3"),
            "(block (assign x (call + 1 (call * 2 3))))"
        );
    }

    #[test]
    fn tiers_are_right_associative() {
        assert_eq!(
            parsed("x <- 1 - 2 - 3"),
            "(block (assign x (call - 1 (call - 2 3))))"
        );
    }

    #[test]
    fn parentheses_override_precedence() {
        assert_eq!(
            parsed("x <- (1 + 2) * 3"),
            "(block (assign x (call * (call + 1 2) 3)))"
        );
    }

    #[test]
    fn unary_operator_inside_a_call() {
        assert_eq!(
            parsed("z <- abs(-x)"),
            "(block (assign z (call abs (call - x))))"
        );
    }

    #[test]
    fn call_chains_apply_left_to_right() {
        assert_eq!(
            parsed("x <- f(a)(b)"),
            "(block (assign x (call (call f a) b)))"
        );
    }

    #[test]
    fn call_arguments_keep_their_order() {
        assert_eq!(parsed("z <- f(a, b)"), "(block (assign z (call f a b)))");
    }

    #[test]
    fn function_literal() {
        assert_eq!(
            parsed("f <- \\a, b -> c <- a"),
            "(block (assign f (fn [a b] (assign c a))))"
        );
    }

    #[test]
    fn function_literal_without_parameters() {
        // `\->` would lex as one operator run, the marker needs its own token
        assert_eq!(
            parsed("f <- \\ -> c <- 1"),
            "(block (assign f (fn [] (assign c 1))))"
        );
    }

    #[test]
    fn single_line_conditional() {
        assert_eq!(
            parsed("if x then a <- 1 else b <- 2"),
            "(block (if x (assign a 1) (assign b 2)))"
        );
    }

    #[test]
    fn indented_conditional() {
        assert_eq!(
            parsed("if x\n  a <- 1\n  b <- 2\nelse\n  c <- 3"),
            "(block (if x (block (assign a 1) (assign b 2)) (block (assign c 3))))"
        );
    }

    #[test]
    fn statements_separated_by_newlines() {
        assert_eq!(
            parsed("x <- 42\ny <- x + 1"),
            "(block (assign x 42) (assign y (call + x 1)))"
        );
    }

    #[test]
    fn missing_expression_is_rejected() {
        let tokens = scan("x <- ").unwrap();
        let ParseError::UnexpectedToken { at, expected } = parse(&tokens).unwrap_err();
        assert_eq!(at.kind, TokenKind::End);
        assert_eq!(
            expected,
            vec![Expected::Number, Expected::Identifier, Expected::Open]
        );
    }

    #[test]
    fn statement_cannot_start_with_an_operator() {
        let tokens = scan("<- 1").unwrap();
        assert!(parse(&tokens).is_err());
    }

    #[test]
    fn nodes_record_their_token_ranges() {
        let tokens = scan("x <- 1 + 2").unwrap();
        let program = parse(&tokens).unwrap();
        assert_eq!(program.tokens, 0..5);
        let StatementKind::Block(stats) = &program.kind else {
            panic!("expected a block");
        };
        assert_eq!(stats[0].tokens, 0..5);
        let StatementKind::Assignment(_, expr) = &stats[0].kind else {
            panic!("expected an assignment");
        };
        assert_eq!(expr.tokens, 2..5);
    }

    /// Canonical single-line printer used for the re-parse check below.
    /// Every call is printed fully parenthesized, so the structure survives
    /// the trip through the scanner unchanged.
    fn print_stat(stat: &Statement) -> String {
        match &stat.kind {
            StatementKind::Assignment(name, expr) => format!("{} <- {}", name, print_expr(expr)),
            StatementKind::Condition(cond, t, f) => format!(
                "if {} then {} else {}",
                print_expr(cond),
                print_stat(t),
                print_stat(f)
            ),
            StatementKind::Block(stats) => stats
                .iter()
                .map(print_stat)
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }

    /// Operator identifiers have to be printed infix (binary) or prefix
    /// (unary) to come back through the expression tiers; only alphabetic
    /// callees re-parse in call syntax.
    fn is_operator_name(name: &str) -> bool {
        name.chars()
            .next()
            .map_or(false, |c| !(c == '_' || c.is_ascii_alphabetic()))
    }

    fn print_expr(expr: &Expression) -> String {
        match &expr.kind {
            ExpressionKind::Number(value) => value.to_string(),
            ExpressionKind::Identifier(name) => name.clone(),
            ExpressionKind::Calling(callee, args) => match &callee.kind {
                ExpressionKind::Identifier(op) if is_operator_name(op) && args.len() == 2 => {
                    format!(
                        "({} {} {})",
                        print_expr(&args[0]),
                        op,
                        print_expr(&args[1])
                    )
                }
                ExpressionKind::Identifier(op) if is_operator_name(op) && args.len() == 1 => {
                    format!("({} {})", op, print_expr(&args[0]))
                }
                _ => {
                    let args: Vec<_> = args.iter().map(print_expr).collect();
                    format!("({}({}))", print_expr(callee), args.join(", "))
                }
            },
            ExpressionKind::Function(params, body) => {
                format!("\\{} -> {}", params.join(", "), print_stat(body))
            }
        }
    }

    #[test]
    fn reparsing_the_printed_tree_is_structurally_identical() {
        let sources = [
            "x <- 1 + 2 * 3",
            "x <- 1 - 2 - 3\ny <- abs(x)",
            "if x then a <- 1 else b <- 2",
            "f <- \\a, b -> c <- a",
            "x <- f(a)(b)",
        ];
        for source in sources {
            let first = parse(&scan(source).unwrap()).unwrap();
            let printed = print_stat(&first);
            let second = parse(&scan(&printed).unwrap()).unwrap();
            assert_eq!(stat_sexpr(&first), stat_sexpr(&second), "source: {}", source);
        }
    }
}
