use crate::cst::{CstType, CstTypeKind};
use crate::error::Diagnostic;
use crate::token::TokenKind;

use super::{ParseResult, Parser};

impl<'a> Parser<'a> {
    pub(super) fn parse_type(&mut self) -> ParseResult<CstType> {
        if self.check_current(TokenKind::Identifier) || self.check_current(TokenKind::ColonColon) {
            let symbol = self.parse_symbol()?;
            return Ok(CstType {
                loc: symbol.loc,
                kind: CstTypeKind::Symbol(symbol),
            });
        }
        if self.check_current(TokenKind::Func) {
            return self.parse_type_function();
        }
        if self.check_current(TokenKind::Star) {
            let loc = self.expect_current(TokenKind::Star)?.loc;
            let base = self.parse_type()?;
            return Ok(CstType {
                loc,
                kind: CstTypeKind::Pointer {
                    base: Box::new(base),
                },
            });
        }
        if self.check_current(TokenKind::LBracket) {
            return self.parse_type_array_or_slice();
        }
        if self.check_current(TokenKind::Struct) {
            return self.parse_type_struct();
        }
        if self.check_current(TokenKind::Union) {
            return self.parse_type_union();
        }
        if self.check_current(TokenKind::Enum) {
            return self.parse_type_enum();
        }
        if self.check_current(TokenKind::Typeof) {
            return self.parse_type_typeof();
        }

        Err(Diagnostic::error(
            self.current.loc,
            format!(
                "expected type specifier, found `{}`",
                self.describe_current()
            ),
        ))
    }

    fn parse_type_function(&mut self) -> ParseResult<CstType> {
        let loc = self.expect_current(TokenKind::Func)?.loc;

        self.expect_current(TokenKind::LParen)?;
        let mut parameter_types = Vec::new();
        if !self.check_current(TokenKind::RParen) {
            parameter_types.push(self.parse_type()?);
            while self.check_current(TokenKind::Comma) {
                self.advance()?;
                parameter_types.push(self.parse_type()?);
            }
        }
        self.expect_current(TokenKind::RParen)?;

        let return_type = self.parse_type()?;

        Ok(CstType {
            loc,
            kind: CstTypeKind::Function {
                parameter_types,
                return_type: Box::new(return_type),
            },
        })
    }

    fn parse_type_array_or_slice(&mut self) -> ParseResult<CstType> {
        let loc = self.expect_current(TokenKind::LBracket)?.loc;

        if self.check_current(TokenKind::RBracket) {
            self.expect_current(TokenKind::RBracket)?;
            let base = self.parse_type()?;
            return Ok(CstType {
                loc,
                kind: CstTypeKind::Slice {
                    base: Box::new(base),
                },
            });
        }

        let count = self.parse_expr()?;
        self.expect_current(TokenKind::RBracket)?;
        let base = self.parse_type()?;
        Ok(CstType {
            loc,
            kind: CstTypeKind::Array {
                count: Box::new(count),
                base: Box::new(base),
            },
        })
    }

    fn parse_type_struct(&mut self) -> ParseResult<CstType> {
        let loc = self.expect_current(TokenKind::Struct)?.loc;
        self.expect_current(TokenKind::LBrace)?;
        let mut members = Vec::new();
        while !self.check_current(TokenKind::RBrace) {
            members.push(self.parse_member_variable()?);
        }
        self.expect_current(TokenKind::RBrace)?;

        Ok(CstType {
            loc,
            kind: CstTypeKind::Struct { members },
        })
    }

    fn parse_type_union(&mut self) -> ParseResult<CstType> {
        let loc = self.expect_current(TokenKind::Union)?.loc;
        self.expect_current(TokenKind::LBrace)?;
        let mut members = Vec::new();
        while !self.check_current(TokenKind::RBrace) {
            members.push(self.parse_member_variable()?);
        }
        self.expect_current(TokenKind::RBrace)?;

        Ok(CstType {
            loc,
            kind: CstTypeKind::Union { members },
        })
    }

    fn parse_type_enum(&mut self) -> ParseResult<CstType> {
        let loc = self.expect_current(TokenKind::Enum)?.loc;

        let mut ty = None;
        if self.check_current(TokenKind::Colon) {
            self.expect_current(TokenKind::Colon)?;
            ty = Some(Box::new(self.parse_type()?));
        }

        self.expect_current(TokenKind::LBrace)?;
        let mut values = Vec::new();
        while !self.check_current(TokenKind::RBrace) {
            values.push(self.parse_enum_value()?);
        }
        self.expect_current(TokenKind::RBrace)?;

        Ok(CstType {
            loc,
            kind: CstTypeKind::Enum { ty, values },
        })
    }

    fn parse_type_typeof(&mut self) -> ParseResult<CstType> {
        let loc = self.expect_current(TokenKind::Typeof)?.loc;
        self.expect_current(TokenKind::LParen)?;
        let expr = self.parse_expr()?;
        self.expect_current(TokenKind::RParen)?;

        Ok(CstType {
            loc,
            kind: CstTypeKind::Typeof {
                expr: Box::new(expr),
            },
        })
    }
}
