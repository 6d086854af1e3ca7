use std::rc::Rc;

use crate::cst::{CstConditional, CstStmt, CstStmtKind, CstSwitchCase};
use crate::token::TokenKind;

use super::{ParseResult, Parser};

const ASSIGNMENT_OPS: &[TokenKind] = &[
    TokenKind::Assign,
    TokenKind::PlusAssign,
    TokenKind::DashAssign,
    TokenKind::StarAssign,
    TokenKind::SlashAssign,
    TokenKind::PercentAssign,
    TokenKind::PlusPercentAssign,
    TokenKind::DashPercentAssign,
    TokenKind::StarPercentAssign,
    TokenKind::ShlAssign,
    TokenKind::ShrAssign,
    TokenKind::PipeAssign,
    TokenKind::CaretAssign,
    TokenKind::AmpersandAssign,
];

impl<'a> Parser<'a> {
    pub(super) fn parse_stmt(&mut self) -> ParseResult<CstStmt> {
        if self.check_current(TokenKind::Var)
            || self.check_current(TokenKind::Let)
            || self.check_current(TokenKind::Func)
            || self.check_current(TokenKind::Type)
        {
            let decl = Rc::new(self.parse_decl()?);
            return Ok(CstStmt {
                loc: decl.loc,
                kind: CstStmtKind::Decl(decl),
            });
        }

        if self.check_current(TokenKind::Defer) {
            return self.parse_stmt_defer();
        }
        if self.check_current(TokenKind::If) {
            return self.parse_stmt_if();
        }
        if self.check_current(TokenKind::When) {
            return self.parse_stmt_when();
        }
        if self.check_current(TokenKind::For) {
            return self.parse_stmt_for();
        }
        if self.check_current(TokenKind::Break) {
            let loc = self.expect_current(TokenKind::Break)?.loc;
            self.expect_current(TokenKind::Semicolon)?;
            return Ok(CstStmt {
                loc,
                kind: CstStmtKind::Break,
            });
        }
        if self.check_current(TokenKind::Continue) {
            let loc = self.expect_current(TokenKind::Continue)?.loc;
            self.expect_current(TokenKind::Semicolon)?;
            return Ok(CstStmt {
                loc,
                kind: CstStmtKind::Continue,
            });
        }
        if self.check_current(TokenKind::Switch) {
            return self.parse_stmt_switch();
        }
        if self.check_current(TokenKind::Return) {
            return self.parse_stmt_return();
        }
        if self.check_current(TokenKind::Assert) {
            let loc = self.expect_current(TokenKind::Assert)?.loc;
            let expr = self.parse_expr()?;
            self.expect_current(TokenKind::Semicolon)?;
            return Ok(CstStmt {
                loc,
                kind: CstStmtKind::Assert { expr },
            });
        }

        // Expression statement, or an assignment detected by look-ahead after
        // the leading expression has been parsed.
        let expr = self.parse_expr()?;
        for &op in ASSIGNMENT_OPS {
            if self.check_current(op) {
                let loc = self.expect_current(op)?.loc;
                let rhs = self.parse_expr()?;
                self.expect_current(TokenKind::Semicolon)?;
                return Ok(CstStmt {
                    loc,
                    kind: CstStmtKind::Assign { op, lhs: expr, rhs },
                });
            }
        }

        let loc = expr.loc;
        self.expect_current(TokenKind::Semicolon)?;
        Ok(CstStmt {
            loc,
            kind: CstStmtKind::Expr(expr),
        })
    }

    fn parse_stmt_defer(&mut self) -> ParseResult<CstStmt> {
        let loc = self.expect_current(TokenKind::Defer)?.loc;

        if self.check_current(TokenKind::LBrace) {
            let block = self.parse_block()?;
            return Ok(CstStmt {
                loc,
                kind: CstStmtKind::DeferBlock(block),
            });
        }

        let expr = self.parse_expr()?;
        self.expect_current(TokenKind::Semicolon)?;
        Ok(CstStmt {
            loc,
            kind: CstStmtKind::DeferExpr(expr),
        })
    }

    fn parse_stmt_if(&mut self) -> ParseResult<CstStmt> {
        let mut conditionals = Vec::new();

        let loc = self.expect_current(TokenKind::If)?.loc;
        let condition = self.parse_expr()?;
        let body = self.parse_block()?;
        conditionals.push(CstConditional {
            loc,
            condition: Some(condition),
            body,
        });

        while self.check_current(TokenKind::Elif) {
            let loc = self.advance()?.loc;
            let condition = self.parse_expr()?;
            let body = self.parse_block()?;
            conditionals.push(CstConditional {
                loc,
                condition: Some(condition),
                body,
            });
        }

        if self.check_current(TokenKind::Else) {
            let loc = self.advance()?.loc;
            let body = self.parse_block()?;
            conditionals.push(CstConditional {
                loc,
                condition: None,
                body,
            });
        }

        Ok(CstStmt {
            loc: conditionals[0].loc,
            kind: CstStmtKind::If { conditionals },
        })
    }

    fn parse_stmt_when(&mut self) -> ParseResult<CstStmt> {
        let mut conditionals = Vec::new();

        let loc = self.expect_current(TokenKind::When)?.loc;
        let condition = self.parse_expr()?;
        let body = self.parse_block()?;
        conditionals.push(CstConditional {
            loc,
            condition: Some(condition),
            body,
        });

        while self.check_current(TokenKind::Elwhen) {
            let loc = self.advance()?.loc;
            let condition = self.parse_expr()?;
            let body = self.parse_block()?;
            conditionals.push(CstConditional {
                loc,
                condition: Some(condition),
                body,
            });
        }

        if self.check_current(TokenKind::Else) {
            let loc = self.advance()?.loc;
            let body = self.parse_block()?;
            conditionals.push(CstConditional {
                loc,
                condition: None,
                body,
            });
        }

        Ok(CstStmt {
            loc: conditionals[0].loc,
            kind: CstStmtKind::When { conditionals },
        })
    }

    fn parse_stmt_for(&mut self) -> ParseResult<CstStmt> {
        let loc = self.expect_current(TokenKind::For)?.loc;

        let is_for_range = self.check_current(TokenKind::Identifier)
            && (self.check_peek(TokenKind::Colon) || self.check_peek(TokenKind::In));
        if is_for_range {
            let identifier = self.parse_identifier()?;

            let mut ty = None;
            if self.check_current(TokenKind::Colon) {
                self.expect_current(TokenKind::Colon)?;
                ty = Some(self.parse_type()?);
            }

            self.expect_current(TokenKind::In)?;

            let begin = self.parse_expr()?;
            if self.check_current(TokenKind::Colon) {
                self.expect_current(TokenKind::Colon)?;
                let end = self.parse_expr()?;
                let body = self.parse_block()?;

                return Ok(CstStmt {
                    loc,
                    kind: CstStmtKind::ForRange {
                        identifier,
                        ty,
                        begin: Some(begin),
                        end,
                        body,
                    },
                });
            }

            // `for x in expr` ranges from zero to expr.
            let body = self.parse_block()?;
            return Ok(CstStmt {
                loc,
                kind: CstStmtKind::ForRange {
                    identifier,
                    ty,
                    begin: None,
                    end: begin,
                    body,
                },
            });
        }

        let expr = self.parse_expr()?;
        let body = self.parse_block()?;
        Ok(CstStmt {
            loc,
            kind: CstStmtKind::ForExpr { expr, body },
        })
    }

    fn parse_stmt_switch(&mut self) -> ParseResult<CstStmt> {
        let loc = self.expect_current(TokenKind::Switch)?.loc;

        let expr = self.parse_expr()?;

        let mut cases = Vec::new();
        self.expect_current(TokenKind::LBrace)?;
        while !self.check_current(TokenKind::RBrace) {
            let is_else = self.check_current(TokenKind::Else);
            cases.push(self.parse_switch_case()?);
            if is_else {
                // An `else` case always ends the switch statement.
                break;
            }
        }
        self.expect_current(TokenKind::RBrace)?;

        Ok(CstStmt {
            loc,
            kind: CstStmtKind::Switch { expr, cases },
        })
    }

    fn parse_switch_case(&mut self) -> ParseResult<CstSwitchCase> {
        let loc = self.current.loc;

        let mut symbols = Vec::new();
        if self.check_current(TokenKind::Else) {
            self.expect_current(TokenKind::Else)?;
        } else {
            symbols.push(self.parse_symbol()?);
            while self.check_current(TokenKind::Or) {
                self.expect_current(TokenKind::Or)?;
                symbols.push(self.parse_symbol()?);
            }
        }

        let block = self.parse_block()?;

        Ok(CstSwitchCase {
            loc,
            symbols,
            block,
        })
    }

    fn parse_stmt_return(&mut self) -> ParseResult<CstStmt> {
        let loc = self.expect_current(TokenKind::Return)?.loc;

        let mut expr = None;
        if !self.check_current(TokenKind::Semicolon) {
            expr = Some(self.parse_expr()?);
        }

        self.expect_current(TokenKind::Semicolon)?;
        Ok(CstStmt {
            loc,
            kind: CstStmtKind::Return { expr },
        })
    }
}
