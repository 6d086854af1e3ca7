use crate::cst::{
    CstExpr, CstExprKind, CstMemberInitializer, CstSymbol, CstSymbolElement, CstSymbolStart,
    CstType,
};
use crate::error::Diagnostic;
use crate::token::{TokenData, TokenKind};

use super::{ParseResult, Parser, Precedence};

fn token_kind_precedence(kind: TokenKind) -> Precedence {
    match kind {
        TokenKind::Or => Precedence::Or,
        TokenKind::And => Precedence::And,
        TokenKind::Eq
        | TokenKind::Ne
        | TokenKind::Le
        | TokenKind::Lt
        | TokenKind::Ge
        | TokenKind::Gt => Precedence::Compare,
        TokenKind::PlusPercent
        | TokenKind::DashPercent
        | TokenKind::Plus
        | TokenKind::Dash
        | TokenKind::Pipe
        | TokenKind::Caret => Precedence::Sum,
        TokenKind::StarPercent
        | TokenKind::Star
        | TokenKind::Slash
        | TokenKind::Percent
        | TokenKind::Shl
        | TokenKind::Shr
        | TokenKind::Ampersand => Precedence::Product,
        TokenKind::LParen | TokenKind::LBracket | TokenKind::DotStar | TokenKind::Dot => {
            Precedence::Postfix
        }
        _ => Precedence::Lowest,
    }
}

impl<'a> Parser<'a> {
    pub(super) fn parse_expr(&mut self) -> ParseResult<CstExpr> {
        self.parse_expr_precedence(Precedence::Lowest)
    }

    pub(super) fn parse_expr_precedence(
        &mut self,
        precedence: Precedence,
    ) -> ParseResult<CstExpr> {
        let mut expr = self.parse_expr_nud()?;
        while precedence < token_kind_precedence(self.current.kind) {
            expr = self.parse_expr_led(expr)?;
        }
        Ok(expr)
    }

    fn parse_expr_nud(&mut self) -> ParseResult<CstExpr> {
        match self.current.kind {
            TokenKind::Identifier | TokenKind::Typeof | TokenKind::ColonColon => {
                let symbol = self.parse_symbol()?;
                Ok(CstExpr {
                    loc: symbol.loc,
                    kind: CstExprKind::Symbol(symbol),
                })
            }
            TokenKind::True | TokenKind::False => {
                let token = self.advance()?;
                Ok(CstExpr {
                    loc: token.loc,
                    kind: CstExprKind::Boolean(token.kind == TokenKind::True),
                })
            }
            TokenKind::Integer => {
                let token = self.advance()?;
                match token.data {
                    TokenData::Integer { value, suffix } => Ok(CstExpr {
                        loc: token.loc,
                        kind: CstExprKind::Integer { value, suffix },
                    }),
                    _ => unreachable!(),
                }
            }
            TokenKind::Ieee754 => {
                let token = self.advance()?;
                match token.data {
                    TokenData::Ieee754 { value, suffix } => Ok(CstExpr {
                        loc: token.loc,
                        kind: CstExprKind::Ieee754 { value, suffix },
                    }),
                    _ => unreachable!(),
                }
            }
            TokenKind::Character => {
                let token = self.advance()?;
                match token.data {
                    TokenData::Character(byte) => Ok(CstExpr {
                        loc: token.loc,
                        kind: CstExprKind::Character(byte),
                    }),
                    _ => unreachable!(),
                }
            }
            TokenKind::Bytes => {
                let token = self.advance()?;
                match token.data {
                    TokenData::Bytes(bytes) => Ok(CstExpr {
                        loc: token.loc,
                        kind: CstExprKind::Bytes(bytes),
                    }),
                    _ => unreachable!(),
                }
            }
            TokenKind::LParen => self.parse_expr_lparen(),
            TokenKind::Defined => self.parse_expr_defined(),
            TokenKind::Sizeof => self.parse_expr_sizeof(),
            TokenKind::Alignof => self.parse_expr_alignof(),
            TokenKind::Fileof => self.parse_expr_fileof(),
            TokenKind::Lineof => self.parse_expr_lineof(),
            TokenKind::Embed => self.parse_expr_embed(),
            TokenKind::Not
            | TokenKind::Startof
            | TokenKind::Countof
            | TokenKind::Plus
            | TokenKind::Dash
            | TokenKind::DashPercent
            | TokenKind::Tilde
            | TokenKind::Star
            | TokenKind::Ampersand => self.parse_expr_nud_unary(),
            kind => Err(Diagnostic::error(
                self.current.loc,
                format!(
                    "unrecognized prefix token `{}` in expression",
                    kind.to_str()
                ),
            )),
        }
    }

    fn parse_expr_led(&mut self, lhs: CstExpr) -> ParseResult<CstExpr> {
        match self.current.kind {
            TokenKind::LParen => self.parse_expr_led_lparen(lhs),
            TokenKind::LBracket => self.parse_expr_led_lbracket(lhs),
            TokenKind::DotStar => self.parse_expr_led_dot_star(lhs),
            TokenKind::Dot => self.parse_expr_led_dot(lhs),
            // Every remaining token with a precedence is a binary operator.
            _ => self.parse_expr_led_binary(lhs),
        }
    }

    /// `(expr)` grouped expression, or the `( : T )` family of typed
    /// constructs: array/list literal, struct/union initializer, slice
    /// literal, and cast.
    fn parse_expr_lparen(&mut self) -> ParseResult<CstExpr> {
        let loc = self.expect_current(TokenKind::LParen)?.loc;

        // `(:::T){...}` is parsed as `(:: :T){...}`, not `(: ::T){...}`.
        let adjacent = self.current.loc.span.start + 2 == self.peek.loc.span.start;
        if self.check_current(TokenKind::ColonColon) && self.check_peek(TokenKind::Colon) && adjacent
        {
            self.warnings.push(
                Diagnostic::warning(self.current.loc, "`:::` is parsed as `:: :`")
                    .note(self.current.loc, "write as `: ::` to disambiguate"),
            );
        }

        if !self.check_current(TokenKind::Colon) {
            let expr = self.parse_expr()?;
            self.expect_current(TokenKind::RParen)?;
            return Ok(CstExpr {
                loc,
                kind: CstExprKind::Grouped {
                    expr: Box::new(expr),
                },
            });
        }

        self.expect_current(TokenKind::Colon)?;
        let ty = self.parse_type()?;
        self.expect_current(TokenKind::RParen)?;

        if self.check_current(TokenKind::LBracket) {
            return self.parse_expr_list(loc, ty);
        }

        if self.check_current(TokenKind::LBrace) {
            if self.check_peek(TokenKind::RBrace) || self.check_peek(TokenKind::Dot) {
                // Struct or union initializer.
                self.expect_current(TokenKind::LBrace)?;
                let initializers = self.parse_member_initializer_list()?;
                self.expect_current(TokenKind::RBrace)?;
                return Ok(CstExpr {
                    loc,
                    kind: CstExprKind::Init { ty, initializers },
                });
            }

            // Slice literal `(:[]T){ start, count }`.
            self.expect_current(TokenKind::LBrace)?;
            let start = self.parse_expr()?;
            self.expect_current(TokenKind::Comma)?;
            let count = self.parse_expr()?;
            self.expect_current(TokenKind::RBrace)?;
            return Ok(CstExpr {
                loc,
                kind: CstExprKind::Slice {
                    ty,
                    start: Box::new(start),
                    count: Box::new(count),
                },
            });
        }

        // Cast, binding at prefix precedence.
        let expr = self.parse_expr_precedence(Precedence::Prefix)?;
        Ok(CstExpr {
            loc,
            kind: CstExprKind::Cast {
                ty,
                expr: Box::new(expr),
            },
        })
    }

    fn parse_expr_list(&mut self, loc: crate::token::Loc, ty: CstType) -> ParseResult<CstExpr> {
        self.expect_current(TokenKind::LBracket)?;
        let mut elements = Vec::new();
        let mut ellipsis = None;
        while !self.check_current(TokenKind::RBracket) {
            if !elements.is_empty() {
                self.expect_current(TokenKind::Comma)?;
            }
            if self.check_current(TokenKind::RBracket) {
                break;
            }

            let expr = self.parse_expr()?;
            if self.check_current(TokenKind::Ellipsis) {
                self.expect_current(TokenKind::Ellipsis)?;
                ellipsis = Some(Box::new(expr));
                break;
            }
            elements.push(expr);
        }
        self.expect_current(TokenKind::RBracket)?;

        Ok(CstExpr {
            loc,
            kind: CstExprKind::List {
                ty,
                elements,
                ellipsis,
            },
        })
    }

    fn parse_expr_led_lparen(&mut self, lhs: CstExpr) -> ParseResult<CstExpr> {
        let loc = self.expect_current(TokenKind::LParen)?.loc;
        let mut arguments = Vec::new();
        while !self.check_current(TokenKind::RParen) {
            if !arguments.is_empty() {
                self.expect_current(TokenKind::Comma)?;
                if self.check_current(TokenKind::RParen) {
                    break;
                }
            }
            arguments.push(self.parse_expr()?);
        }
        self.expect_current(TokenKind::RParen)?;

        Ok(CstExpr {
            loc,
            kind: CstExprKind::Call {
                func: Box::new(lhs),
                arguments,
            },
        })
    }

    fn parse_expr_led_lbracket(&mut self, lhs: CstExpr) -> ParseResult<CstExpr> {
        let loc = self.expect_current(TokenKind::LBracket)?.loc;
        let idx = self.parse_expr()?;

        if self.check_current(TokenKind::Colon) {
            self.expect_current(TokenKind::Colon)?;
            let end = self.parse_expr()?;
            self.expect_current(TokenKind::RBracket)?;
            return Ok(CstExpr {
                loc,
                kind: CstExprKind::AccessSlice {
                    lhs: Box::new(lhs),
                    begin: Box::new(idx),
                    end: Box::new(end),
                },
            });
        }

        self.expect_current(TokenKind::RBracket)?;
        Ok(CstExpr {
            loc,
            kind: CstExprKind::AccessIndex {
                lhs: Box::new(lhs),
                idx: Box::new(idx),
            },
        })
    }

    fn parse_expr_led_dot_star(&mut self, lhs: CstExpr) -> ParseResult<CstExpr> {
        let loc = self.expect_current(TokenKind::DotStar)?.loc;
        Ok(CstExpr {
            loc,
            kind: CstExprKind::AccessDereference { lhs: Box::new(lhs) },
        })
    }

    fn parse_expr_led_dot(&mut self, lhs: CstExpr) -> ParseResult<CstExpr> {
        let loc = self.expect_current(TokenKind::Dot)?.loc;
        let member = self.parse_symbol_element()?;
        Ok(CstExpr {
            loc,
            kind: CstExprKind::AccessMember {
                lhs: Box::new(lhs),
                member,
            },
        })
    }

    fn parse_expr_nud_unary(&mut self) -> ParseResult<CstExpr> {
        let op = self.advance()?;
        let paren = op.kind == TokenKind::Startof || op.kind == TokenKind::Countof;

        if paren {
            self.expect_current(TokenKind::LParen)?;
        }
        let rhs = self.parse_expr_precedence(Precedence::Prefix)?;
        if paren {
            self.expect_current(TokenKind::RParen)?;
        }

        Ok(CstExpr {
            loc: op.loc,
            kind: CstExprKind::Unary {
                op: op.kind,
                rhs: Box::new(rhs),
            },
        })
    }

    fn parse_expr_defined(&mut self) -> ParseResult<CstExpr> {
        let loc = self.expect_current(TokenKind::Defined)?.loc;
        self.expect_current(TokenKind::LParen)?;
        let symbol = self.parse_symbol()?;
        self.expect_current(TokenKind::RParen)?;

        Ok(CstExpr {
            loc,
            kind: CstExprKind::Defined(symbol),
        })
    }

    fn parse_expr_sizeof(&mut self) -> ParseResult<CstExpr> {
        let loc = self.expect_current(TokenKind::Sizeof)?.loc;
        self.expect_current(TokenKind::LParen)?;
        let ty = self.parse_type()?;
        self.expect_current(TokenKind::RParen)?;

        Ok(CstExpr {
            loc,
            kind: CstExprKind::Sizeof(Box::new(ty)),
        })
    }

    fn parse_expr_alignof(&mut self) -> ParseResult<CstExpr> {
        let loc = self.expect_current(TokenKind::Alignof)?.loc;
        self.expect_current(TokenKind::LParen)?;
        let ty = self.parse_type()?;
        self.expect_current(TokenKind::RParen)?;

        Ok(CstExpr {
            loc,
            kind: CstExprKind::Alignof(Box::new(ty)),
        })
    }

    fn parse_expr_fileof(&mut self) -> ParseResult<CstExpr> {
        let loc = self.expect_current(TokenKind::Fileof)?.loc;
        self.expect_current(TokenKind::LParen)?;
        self.expect_current(TokenKind::RParen)?;
        Ok(CstExpr {
            loc,
            kind: CstExprKind::Fileof,
        })
    }

    fn parse_expr_lineof(&mut self) -> ParseResult<CstExpr> {
        let loc = self.expect_current(TokenKind::Lineof)?.loc;
        self.expect_current(TokenKind::LParen)?;
        self.expect_current(TokenKind::RParen)?;
        Ok(CstExpr {
            loc,
            kind: CstExprKind::Lineof,
        })
    }

    fn parse_expr_embed(&mut self) -> ParseResult<CstExpr> {
        let loc = self.expect_current(TokenKind::Embed)?.loc;
        self.expect_current(TokenKind::LParen)?;
        let token = self.expect_current(TokenKind::Bytes)?;
        let path = match token.data {
            TokenData::Bytes(bytes) => self.interner().intern_bytes(&bytes),
            _ => unreachable!(),
        };
        self.expect_current(TokenKind::RParen)?;

        Ok(CstExpr {
            loc,
            kind: CstExprKind::Embed(path),
        })
    }

    fn parse_expr_led_binary(&mut self, lhs: CstExpr) -> ParseResult<CstExpr> {
        let op = self.advance()?;
        let rhs = self.parse_expr_precedence(token_kind_precedence(op.kind))?;
        Ok(CstExpr {
            loc: op.loc,
            kind: CstExprKind::Binary {
                op: op.kind,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
        })
    }

    pub(super) fn parse_symbol(&mut self) -> ParseResult<CstSymbol> {
        if self.check_current(TokenKind::ColonColon) {
            let loc = self.expect_current(TokenKind::ColonColon)?.loc;

            let mut elements = vec![self.parse_symbol_element()?];
            while self.check_current(TokenKind::ColonColon) {
                self.expect_current(TokenKind::ColonColon)?;
                elements.push(self.parse_symbol_element()?);
            }

            return Ok(CstSymbol {
                loc,
                start: CstSymbolStart::Root,
                ty: None,
                elements,
            });
        }

        if self.check_current(TokenKind::Typeof) {
            let ty = self.parse_type()?;
            let loc = ty.loc;

            self.expect_current(TokenKind::ColonColon)?;

            let mut elements = vec![self.parse_symbol_element()?];
            while self.check_current(TokenKind::ColonColon) {
                self.expect_current(TokenKind::ColonColon)?;
                elements.push(self.parse_symbol_element()?);
            }

            return Ok(CstSymbol {
                loc,
                start: CstSymbolStart::Type,
                ty: Some(Box::new(ty)),
                elements,
            });
        }

        let mut elements = vec![self.parse_symbol_element()?];
        let loc = elements[0].loc;
        while self.check_current(TokenKind::ColonColon) {
            self.expect_current(TokenKind::ColonColon)?;
            elements.push(self.parse_symbol_element()?);
        }

        Ok(CstSymbol {
            loc,
            start: CstSymbolStart::None,
            ty: None,
            elements,
        })
    }

    pub(super) fn parse_symbol_element(&mut self) -> ParseResult<CstSymbolElement> {
        let identifier = self.parse_identifier()?;
        let mut template_arguments = Vec::new();
        if self.check_current(TokenKind::LBracket) && self.check_peek(TokenKind::LBracket) {
            template_arguments = self.parse_template_argument_list()?;
        }

        Ok(CstSymbolElement {
            loc: identifier.loc,
            identifier,
            template_arguments,
        })
    }

    pub(super) fn parse_template_argument_list(&mut self) -> ParseResult<Vec<CstType>> {
        let lbracket = self.expect_current(TokenKind::LBracket)?;
        self.expect_current(TokenKind::LBracket)?;

        if self.check_current(TokenKind::RBracket) {
            return Err(Diagnostic::error(
                lbracket.loc,
                "template argument list contains zero template arguments",
            ));
        }

        let mut template_arguments = vec![self.parse_type()?];
        while self.check_current(TokenKind::Comma) {
            self.advance()?;
            template_arguments.push(self.parse_type()?);
        }

        self.expect_current(TokenKind::RBracket)?;
        self.expect_current(TokenKind::RBracket)?;

        Ok(template_arguments)
    }

    pub(super) fn parse_member_initializer_list(
        &mut self,
    ) -> ParseResult<Vec<CstMemberInitializer>> {
        let mut initializers = Vec::new();
        if !self.check_current(TokenKind::Dot) {
            return Ok(initializers);
        }

        initializers.push(self.parse_member_initializer()?);
        while self.check_current(TokenKind::Comma) {
            self.advance()?;
            if self.check_current(TokenKind::RBrace) {
                break;
            }
            initializers.push(self.parse_member_initializer()?);
        }

        Ok(initializers)
    }

    fn parse_member_initializer(&mut self) -> ParseResult<CstMemberInitializer> {
        let loc = self.expect_current(TokenKind::Dot)?.loc;
        let identifier = self.parse_identifier()?;
        self.expect_current(TokenKind::Assign)?;
        let mut expr = None;
        if self.check_current(TokenKind::Uninit) {
            self.expect_current(TokenKind::Uninit)?;
        } else {
            expr = Some(self.parse_expr()?);
        }

        Ok(CstMemberInitializer {
            loc,
            identifier,
            expr,
        })
    }
}
