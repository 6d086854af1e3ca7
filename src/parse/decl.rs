use std::rc::Rc;

use crate::cst::{
    CstDecl, CstDeclKind, CstEnumValue, CstFunctionParameter, CstIdentifier, CstMember,
    CstMemberKind,
};
use crate::error::Diagnostic;
use crate::token::TokenKind;

use super::{ParseResult, Parser};

impl<'a> Parser<'a> {
    pub(super) fn parse_decl(&mut self) -> ParseResult<CstDecl> {
        if self.check_current(TokenKind::Var) {
            return self.parse_decl_variable();
        }
        if self.check_current(TokenKind::Let) {
            return self.parse_decl_constant();
        }
        if self.check_current(TokenKind::Func) {
            return self.parse_decl_function();
        }
        if self.check_current(TokenKind::Struct) {
            return self.parse_decl_struct();
        }
        if self.check_current(TokenKind::Union) {
            return self.parse_decl_union();
        }
        if self.check_current(TokenKind::Enum) {
            return self.parse_decl_enum();
        }
        if self.check_current(TokenKind::Extend) {
            return self.parse_decl_extend();
        }
        if self.check_current(TokenKind::Type) {
            return self.parse_decl_alias();
        }
        if self.check_current(TokenKind::Extern) && self.check_peek(TokenKind::Var) {
            return self.parse_decl_extern_variable();
        }
        if self.check_current(TokenKind::Extern) && self.check_peek(TokenKind::Func) {
            return self.parse_decl_extern_function();
        }
        if self.check_current(TokenKind::Extern) && self.check_peek(TokenKind::Type) {
            return self.parse_decl_extern_type();
        }

        Err(Diagnostic::error(
            self.current.loc,
            format!("expected declaration, found `{}`", self.describe_current()),
        ))
    }

    fn parse_decl_storage(
        &mut self,
        keyword: TokenKind,
        what: &str,
    ) -> ParseResult<(crate::token::Loc, CstIdentifier, Option<crate::cst::CstType>, Option<crate::cst::CstExpr>)>
    {
        let loc = self.expect_current(keyword)?.loc;
        let identifier = self.parse_identifier()?;
        let mut ty = None;
        if self.check_current(TokenKind::Colon) {
            self.expect_current(TokenKind::Colon)?;
            ty = Some(self.parse_type()?);
        }
        self.expect_current(TokenKind::Assign)?;
        let mut expr = None;
        if self.check_current(TokenKind::Uninit) {
            self.expect_current(TokenKind::Uninit)?;
            if ty.is_none() {
                let name = self.interner().resolve(identifier.name).to_string();
                return Err(Diagnostic::error(
                    identifier.loc,
                    format!("uninitialized {} `{}` requires a type specifier", what, name),
                ));
            }
        } else {
            expr = Some(self.parse_expr()?);
        }
        self.expect_current(TokenKind::Semicolon)?;
        Ok((loc, identifier, ty, expr))
    }

    pub(super) fn parse_decl_variable(&mut self) -> ParseResult<CstDecl> {
        let (loc, identifier, ty, expr) = self.parse_decl_storage(TokenKind::Var, "variable")?;
        Ok(CstDecl {
            loc,
            name: identifier.name,
            kind: CstDeclKind::Variable {
                identifier,
                ty,
                expr,
            },
        })
    }

    pub(super) fn parse_decl_constant(&mut self) -> ParseResult<CstDecl> {
        let (loc, identifier, ty, expr) = self.parse_decl_storage(TokenKind::Let, "constant")?;
        Ok(CstDecl {
            loc,
            name: identifier.name,
            kind: CstDeclKind::Constant {
                identifier,
                ty,
                expr,
            },
        })
    }

    pub(super) fn parse_decl_function(&mut self) -> ParseResult<CstDecl> {
        let loc = self.expect_current(TokenKind::Func)?.loc;
        let identifier = self.parse_identifier()?;
        let template_parameters = self.parse_template_parameter_list()?;
        self.expect_current(TokenKind::LParen)?;
        let function_parameters = self.parse_function_parameter_list()?;
        self.expect_current(TokenKind::RParen)?;
        let return_type = self.parse_type()?;
        let body = self.parse_block()?;

        Ok(CstDecl {
            loc,
            name: identifier.name,
            kind: CstDeclKind::Function {
                identifier,
                template_parameters,
                function_parameters,
                return_type,
                body,
            },
        })
    }

    pub(super) fn parse_decl_struct(&mut self) -> ParseResult<CstDecl> {
        let loc = self.expect_current(TokenKind::Struct)?.loc;
        let identifier = self.parse_identifier()?;
        let template_parameters = self.parse_template_parameter_list()?;
        self.expect_current(TokenKind::LBrace)?;
        let members = self.parse_member_list()?;
        self.expect_current(TokenKind::RBrace)?;

        Ok(CstDecl {
            loc,
            name: identifier.name,
            kind: CstDeclKind::Struct {
                identifier,
                template_parameters,
                members,
            },
        })
    }

    pub(super) fn parse_decl_union(&mut self) -> ParseResult<CstDecl> {
        let loc = self.expect_current(TokenKind::Union)?.loc;
        let identifier = self.parse_identifier()?;
        let template_parameters = self.parse_template_parameter_list()?;
        self.expect_current(TokenKind::LBrace)?;
        let members = self.parse_member_list()?;
        self.expect_current(TokenKind::RBrace)?;

        Ok(CstDecl {
            loc,
            name: identifier.name,
            kind: CstDeclKind::Union {
                identifier,
                template_parameters,
                members,
            },
        })
    }

    pub(super) fn parse_decl_enum(&mut self) -> ParseResult<CstDecl> {
        let loc = self.expect_current(TokenKind::Enum)?.loc;
        let identifier = self.parse_identifier()?;

        let mut ty = None;
        if self.check_current(TokenKind::Colon) {
            self.expect_current(TokenKind::Colon)?;
            ty = Some(self.parse_type()?);
        }

        self.expect_current(TokenKind::LBrace)?;

        let mut values = Vec::new();
        while !self.check_current(TokenKind::RBrace) && !self.check_current(TokenKind::Func) {
            values.push(self.parse_enum_value()?);
        }

        let mut member_functions = Vec::new();
        while !self.check_current(TokenKind::RBrace) {
            member_functions.push(self.parse_member_function()?);
        }

        self.expect_current(TokenKind::RBrace)?;

        Ok(CstDecl {
            loc,
            name: identifier.name,
            kind: CstDeclKind::Enum {
                identifier,
                ty,
                values,
                member_functions,
            },
        })
    }

    pub(super) fn parse_decl_extend(&mut self) -> ParseResult<CstDecl> {
        let loc = self.expect_current(TokenKind::Extend)?.loc;
        let ty = self.parse_type()?;
        let decl = Rc::new(self.parse_decl()?);

        Ok(CstDecl {
            loc,
            name: decl.name,
            kind: CstDeclKind::Extend { ty, decl },
        })
    }

    pub(super) fn parse_decl_alias(&mut self) -> ParseResult<CstDecl> {
        let loc = self.expect_current(TokenKind::Type)?.loc;
        let identifier = self.parse_identifier()?;
        self.expect_current(TokenKind::Assign)?;
        let ty = self.parse_type()?;
        self.expect_current(TokenKind::Semicolon)?;

        Ok(CstDecl {
            loc,
            name: identifier.name,
            kind: CstDeclKind::Alias { identifier, ty },
        })
    }

    pub(super) fn parse_decl_extern_variable(&mut self) -> ParseResult<CstDecl> {
        let loc = self.expect_current(TokenKind::Extern)?.loc;
        self.expect_current(TokenKind::Var)?;
        let identifier = self.parse_identifier()?;
        self.expect_current(TokenKind::Colon)?;
        let ty = self.parse_type()?;
        self.expect_current(TokenKind::Semicolon)?;

        Ok(CstDecl {
            loc,
            name: identifier.name,
            kind: CstDeclKind::ExternVariable { identifier, ty },
        })
    }

    pub(super) fn parse_decl_extern_function(&mut self) -> ParseResult<CstDecl> {
        let loc = self.expect_current(TokenKind::Extern)?.loc;
        self.expect_current(TokenKind::Func)?;
        let identifier = self.parse_identifier()?;
        self.expect_current(TokenKind::LParen)?;
        let function_parameters = self.parse_function_parameter_list()?;
        self.expect_current(TokenKind::RParen)?;
        let return_type = self.parse_type()?;
        self.expect_current(TokenKind::Semicolon)?;

        Ok(CstDecl {
            loc,
            name: identifier.name,
            kind: CstDeclKind::ExternFunction {
                identifier,
                function_parameters,
                return_type,
            },
        })
    }

    pub(super) fn parse_decl_extern_type(&mut self) -> ParseResult<CstDecl> {
        let loc = self.expect_current(TokenKind::Extern)?.loc;
        self.expect_current(TokenKind::Type)?;
        let identifier = self.parse_identifier()?;
        self.expect_current(TokenKind::Semicolon)?;

        Ok(CstDecl {
            loc,
            name: identifier.name,
            kind: CstDeclKind::ExternType { identifier },
        })
    }

    pub(super) fn parse_template_parameter_list(&mut self) -> ParseResult<Vec<CstIdentifier>> {
        let mut template_parameters = Vec::new();
        if !self.check_current(TokenKind::LBracket) {
            return Ok(template_parameters);
        }

        let lbracket = self.expect_current(TokenKind::LBracket)?;
        self.expect_current(TokenKind::LBracket)?;

        if self.check_current(TokenKind::RBracket) {
            return Err(Diagnostic::error(
                lbracket.loc,
                "template parameter list declared with zero parameters",
            ));
        }

        template_parameters.push(self.parse_identifier()?);
        while self.check_current(TokenKind::Comma) {
            self.advance()?;
            template_parameters.push(self.parse_identifier()?);
        }

        self.expect_current(TokenKind::RBracket)?;
        self.expect_current(TokenKind::RBracket)?;

        Ok(template_parameters)
    }

    pub(super) fn parse_function_parameter_list(
        &mut self,
    ) -> ParseResult<Vec<CstFunctionParameter>> {
        let mut function_parameters = Vec::new();
        if !self.check_current(TokenKind::Identifier) {
            return Ok(function_parameters);
        }

        function_parameters.push(self.parse_function_parameter()?);
        while self.check_current(TokenKind::Comma) {
            self.advance()?;
            function_parameters.push(self.parse_function_parameter()?);
        }

        Ok(function_parameters)
    }

    fn parse_function_parameter(&mut self) -> ParseResult<CstFunctionParameter> {
        let identifier = self.parse_identifier()?;
        self.expect_current(TokenKind::Colon)?;
        let ty = self.parse_type()?;

        Ok(CstFunctionParameter {
            loc: identifier.loc,
            identifier,
            ty,
        })
    }

    pub(super) fn parse_member_list(&mut self) -> ParseResult<Vec<CstMember>> {
        let mut members = Vec::new();
        while !self.check_current(TokenKind::RBrace) {
            members.push(self.parse_member()?);
        }
        Ok(members)
    }

    fn parse_member(&mut self) -> ParseResult<CstMember> {
        if self.check_current(TokenKind::Var) {
            return self.parse_member_variable();
        }
        if self.check_current(TokenKind::Let) {
            return self.parse_member_constant();
        }
        if self.check_current(TokenKind::Func) {
            return self.parse_member_function();
        }
        if self.check_current(TokenKind::Type) {
            return self.parse_member_alias();
        }

        Err(Diagnostic::error(
            self.current.loc,
            format!(
                "expected member variable, member constant, member function, or type alias, found `{}`",
                self.describe_current()
            ),
        ))
    }

    pub(super) fn parse_member_variable(&mut self) -> ParseResult<CstMember> {
        let loc = self.expect_current(TokenKind::Var)?.loc;
        let identifier = self.parse_identifier()?;
        self.expect_current(TokenKind::Colon)?;
        let ty = self.parse_type()?;
        self.expect_current(TokenKind::Semicolon)?;

        Ok(CstMember {
            loc,
            name: identifier.name,
            kind: CstMemberKind::Variable { identifier, ty },
        })
    }

    fn parse_member_constant(&mut self) -> ParseResult<CstMember> {
        let decl = Rc::new(self.parse_decl_constant()?);
        Ok(CstMember {
            loc: decl.loc,
            name: decl.name,
            kind: CstMemberKind::Constant(decl),
        })
    }

    pub(super) fn parse_member_function(&mut self) -> ParseResult<CstMember> {
        let decl = Rc::new(self.parse_decl_function()?);
        Ok(CstMember {
            loc: decl.loc,
            name: decl.name,
            kind: CstMemberKind::Function(decl),
        })
    }

    fn parse_member_alias(&mut self) -> ParseResult<CstMember> {
        let decl = Rc::new(self.parse_decl_alias()?);
        Ok(CstMember {
            loc: decl.loc,
            name: decl.name,
            kind: CstMemberKind::Alias(decl),
        })
    }

    pub(super) fn parse_enum_value(&mut self) -> ParseResult<CstEnumValue> {
        let identifier = self.parse_identifier()?;
        let mut expr = None;
        if self.check_current(TokenKind::Assign) {
            self.expect_current(TokenKind::Assign)?;
            expr = Some(self.parse_expr()?);
        }
        self.expect_current(TokenKind::Semicolon)?;

        Ok(CstEnumValue {
            loc: identifier.loc,
            identifier,
            expr,
        })
    }
}
