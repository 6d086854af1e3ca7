use num_bigint::BigInt;

use crate::error::{CompileResult, Diagnostic};
use crate::intern::{Interner, Symbol};
use crate::token::{Loc, Span, Token, TokenData, TokenKind, KEYWORDS, SIGILS};

fn is_print(byte: u8) -> bool {
    (0x20..=0x7e).contains(&byte)
}

fn is_ident_start(byte: u8) -> bool {
    byte.is_ascii_alphabetic() || byte == b'_'
}

fn is_ident_continue(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'_'
}

/// Produces one token per `next_token` call from a byte cursor over a
/// module's source text. Out-of-bounds reads yield a NUL byte, so look-ahead
/// at end-of-input is always defined.
pub struct Lexer<'a> {
    source: &'a [u8],
    path: Symbol,
    pos: usize,
    line: usize,
    interner: &'a mut Interner,
}

impl<'a> Lexer<'a> {
    pub fn new(path: Symbol, source: &'a str, interner: &'a mut Interner) -> Self {
        Lexer {
            source: source.as_bytes(),
            path,
            pos: 0,
            line: 1,
            interner,
        }
    }

    pub fn interner(&mut self) -> &mut Interner {
        self.interner
    }

    pub fn interner_ref(&self) -> &Interner {
        self.interner
    }

    fn at(&self, offset: usize) -> u8 {
        self.source.get(self.pos + offset).copied().unwrap_or(0)
    }

    fn current(&self) -> u8 {
        self.at(0)
    }

    fn loc_here(&self) -> Loc {
        Loc::new(self.path, self.line, Span::new(self.pos, self.pos))
    }

    fn loc_from(&self, start: usize, line: usize) -> Loc {
        Loc::new(self.path, line, Span::new(start, self.pos))
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            let byte = self.current();
            if byte.is_ascii_whitespace() {
                if byte == b'\n' {
                    self.line += 1;
                }
                self.pos += 1;
                continue;
            }
            if byte == b'#' {
                while self.current() != 0 && self.current() != b'\n' {
                    self.pos += 1;
                }
                continue;
            }
            break;
        }
    }

    pub fn next_token(&mut self) -> CompileResult<Token> {
        self.skip_whitespace_and_comments();

        let byte = self.current();
        if is_ident_start(byte) {
            return Ok(self.lex_keyword_or_identifier());
        }
        if byte.is_ascii_digit() {
            return self.lex_number();
        }
        if byte == b'\'' {
            return self.lex_character();
        }
        if byte == b'"' {
            return self.lex_bytes();
        }
        if byte.is_ascii_punctuation() {
            return self.lex_sigil();
        }
        if byte == 0 && self.pos >= self.source.len() {
            return Ok(Token::new(TokenKind::Eof, self.loc_here()));
        }

        Err(Diagnostic::error(self.loc_here(), "invalid token"))
    }

    fn lex_keyword_or_identifier(&mut self) -> Token {
        let start = self.pos;
        let line = self.line;
        while is_ident_continue(self.current()) {
            self.pos += 1;
        }
        let lexeme = &self.source[start..self.pos];

        for &(kind, spelling) in KEYWORDS {
            if lexeme == spelling.as_bytes() {
                return Token::new(kind, self.loc_from(start, line));
            }
        }

        let name = self.interner.intern_bytes(lexeme);
        let mut token = Token::new(TokenKind::Identifier, self.loc_from(start, line));
        token.data = TokenData::Identifier(name);
        token
    }

    fn lex_number(&mut self) -> CompileResult<Token> {
        let start = self.pos;
        let line = self.line;

        // Prefix
        let mut radix = 10u32;
        if self.current() == b'0' {
            match self.at(1) {
                b'b' => radix = 2,
                b'o' => radix = 8,
                b'x' => radix = 16,
                _ => {}
            }
            if radix != 10 {
                self.pos += 2;
            }
        }
        let radix_isdigit = |byte: u8| match radix {
            2 => byte == b'0' || byte == b'1',
            8 => (b'0'..=b'7').contains(&byte),
            16 => byte.is_ascii_hexdigit(),
            _ => byte.is_ascii_digit(),
        };

        // Digits
        let digits_start = self.pos;
        if !radix_isdigit(self.current()) {
            return Err(Diagnostic::error(
                self.loc_here(),
                "integer literal has no digits",
            ));
        }
        while radix_isdigit(self.current()) {
            self.pos += 1;
        }

        // Digits (fractional component)
        let is_ieee754 = self.current() == b'.' && !self.at(1).is_ascii_punctuation();
        if is_ieee754 {
            if radix != 10 {
                return Err(Diagnostic::error(
                    self.loc_from(start, line),
                    "floating point literal has non-decimal base",
                ));
            }
            self.pos += 1;
            while radix_isdigit(self.current()) {
                self.pos += 1;
            }
        }
        if self.source[self.pos - 1] == b'.' {
            return Err(Diagnostic::error(
                self.loc_from(start, line),
                "floating point literal requires at least one digit after the decimal separator",
            ));
        }

        let number = &self.source[start..self.pos];
        let digits = &self.source[digits_start..self.pos];

        // Suffix
        let suffix_start = self.pos;
        while self.current().is_ascii_alphanumeric() {
            self.pos += 1;
        }
        let suffix = self
            .interner
            .intern_bytes(&self.source[suffix_start..self.pos]);

        let loc = self.loc_from(start, line);
        if is_ieee754 {
            let text = std::str::from_utf8(number).expect("ascii digits");
            let value: f64 = text.parse().map_err(|_| {
                Diagnostic::error(loc, format!("failed to parse floating point number `{}`", text))
            })?;
            let mut token = Token::new(TokenKind::Ieee754, loc);
            token.data = TokenData::Ieee754 { value, suffix };
            return Ok(token);
        }

        let value = BigInt::parse_bytes(digits, radix).expect("digits match radix");
        let mut token = Token::new(TokenKind::Integer, loc);
        token.data = TokenData::Integer { value, suffix };
        Ok(token)
    }

    /// Read one (possibly escaped) character of a character or bytes literal.
    /// The `what` string names the token being lexed for diagnostics.
    fn advance_character(&mut self, what: &str) -> CompileResult<u8> {
        let byte = self.current();
        if byte == b'\n' {
            return Err(Diagnostic::error(
                self.loc_here(),
                format!("end-of-line encountered in {}", what),
            ));
        }
        if !is_print(byte) {
            return Err(Diagnostic::error(
                self.loc_here(),
                format!("non-printable byte 0x{:02x} in {}", byte, what),
            ));
        }

        if byte != b'\\' {
            self.pos += 1;
            return Ok(byte);
        }

        match self.at(1) {
            b'0' => {
                self.pos += 2;
                Ok(b'\0')
            }
            b't' => {
                self.pos += 2;
                Ok(b'\t')
            }
            b'n' => {
                self.pos += 2;
                Ok(b'\n')
            }
            b'\'' => {
                self.pos += 2;
                Ok(b'\'')
            }
            b'"' => {
                self.pos += 2;
                Ok(b'"')
            }
            b'\\' => {
                self.pos += 2;
                Ok(b'\\')
            }
            b'x' => {
                let hi = self.at(2);
                let lo = self.at(3);
                if !hi.is_ascii_hexdigit() || !lo.is_ascii_hexdigit() {
                    return Err(Diagnostic::error(
                        self.loc_here(),
                        "invalid hexadecimal escape sequence",
                    ));
                }
                self.pos += 4;
                let hex = |b: u8| (b as char).to_digit(16).unwrap() as u8;
                Ok((hex(hi) << 4) | hex(lo))
            }
            _ => Err(Diagnostic::error(
                self.loc_here(),
                "unknown escape sequence",
            )),
        }
    }

    fn lex_character(&mut self) -> CompileResult<Token> {
        let start = self.pos;
        let line = self.line;
        self.pos += 1; // opening quote

        let character = self.advance_character("character literal")?;

        // A missing closing quote followed by a newline is reported as
        // end-of-line rather than an invalid literal.
        if self.current() == b'\n' {
            return Err(Diagnostic::error(
                self.loc_here(),
                "end-of-line encountered in character literal",
            ));
        }
        if self.current() != b'\'' {
            return Err(Diagnostic::error(
                self.loc_from(start, line),
                "invalid character literal",
            ));
        }
        self.pos += 1;

        let mut token = Token::new(TokenKind::Character, self.loc_from(start, line));
        token.data = TokenData::Character(character);
        Ok(token)
    }

    fn lex_bytes(&mut self) -> CompileResult<Token> {
        let start = self.pos;
        let line = self.line;
        self.pos += 1; // opening quote

        let mut bytes = Vec::new();
        while self.current() != b'"' {
            bytes.push(self.advance_character("bytes literal")?);
        }
        self.pos += 1;

        let mut token = Token::new(TokenKind::Bytes, self.loc_from(start, line));
        token.data = TokenData::Bytes(bytes);
        Ok(token)
    }

    fn lex_sigil(&mut self) -> CompileResult<Token> {
        let start = self.pos;
        let line = self.line;

        for &(kind, spelling) in SIGILS {
            if self.source[self.pos..].starts_with(spelling.as_bytes()) {
                self.pos += spelling.len();
                return Ok(Token::new(kind, self.loc_from(start, line)));
            }
        }

        let mut end = self.pos;
        while end < self.source.len()
            && self.source[end].is_ascii_punctuation()
            && self.source[end] != b'#'
        {
            end += 1;
        }
        let run = String::from_utf8_lossy(&self.source[self.pos..end]).into_owned();
        Err(Diagnostic::error(
            self.loc_here(),
            format!("invalid token `{}`", run),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_traits::ToPrimitive;

    fn lex_all(source: &str) -> Vec<Token> {
        let mut interner = Interner::new();
        let path = interner.intern("test.sunder");
        let mut lexer = Lexer::new(path, source, &mut interner);
        let mut tokens = Vec::new();
        loop {
            let token = lexer.next_token().expect("lexing failed");
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                break;
            }
        }
        tokens
    }

    fn lex_err(source: &str) -> Diagnostic {
        let mut interner = Interner::new();
        let path = interner.intern("test.sunder");
        let mut lexer = Lexer::new(path, source, &mut interner);
        loop {
            match lexer.next_token() {
                Ok(token) if token.kind == TokenKind::Eof => panic!("no error produced"),
                Ok(_) => continue,
                Err(diagnostic) => return diagnostic,
            }
        }
    }

    #[test]
    fn keywords_win_over_identifiers() {
        let tokens = lex_all("countof countofx");
        assert_eq!(tokens[0].kind, TokenKind::Countof);
        assert_eq!(tokens[1].kind, TokenKind::Identifier);
    }

    #[test]
    fn identifier_is_interned() {
        let mut interner = Interner::new();
        let path = interner.intern("test.sunder");
        let mut lexer = Lexer::new(path, "foo", &mut interner);
        let token = lexer.next_token().unwrap();
        let sym = token.identifier();
        assert_eq!(interner.resolve(sym), "foo");
    }

    #[test]
    fn integer_with_radix_and_suffix() {
        let mut interner = Interner::new();
        let path = interner.intern("test.sunder");
        let mut lexer = Lexer::new(path, "0x2Au16", &mut interner);
        let token = lexer.next_token().unwrap();
        assert_eq!(token.kind, TokenKind::Integer);
        match token.data {
            TokenData::Integer { value, suffix } => {
                assert_eq!(value.to_u64(), Some(42));
                assert_eq!(interner.resolve(suffix), "u16");
            }
            _ => panic!("expected integer payload"),
        }
    }

    #[test]
    fn binary_and_octal_radixes() {
        let tokens = lex_all("0b1010 0o777");
        match &tokens[0].data {
            TokenData::Integer { value, .. } => assert_eq!(value.to_u64(), Some(10)),
            _ => panic!(),
        }
        match &tokens[1].data {
            TokenData::Integer { value, .. } => assert_eq!(value.to_u64(), Some(511)),
            _ => panic!(),
        }
    }

    #[test]
    fn integer_without_digits_is_fatal() {
        let diagnostic = lex_err("0x");
        assert!(diagnostic.message.contains("no digits"), "{}", diagnostic.message);
    }

    #[test]
    fn float_literal_with_suffix() {
        let tokens = lex_all("123.456f64");
        match &tokens[0].data {
            TokenData::Ieee754 { value, .. } => assert_eq!(*value, 123.456),
            _ => panic!("expected ieee754 payload"),
        }
    }

    #[test]
    fn non_decimal_float_is_fatal() {
        let diagnostic = lex_err("0x1.5");
        assert!(
            diagnostic.message.contains("non-decimal base"),
            "{}",
            diagnostic.message
        );
    }

    #[test]
    fn trailing_dot_without_fraction_is_fatal() {
        let diagnostic = lex_err("1. ");
        assert!(
            diagnostic.message.contains("at least one digit"),
            "{}",
            diagnostic.message
        );
    }

    #[test]
    fn range_punctuation_is_not_a_float() {
        let tokens = lex_all("1..2");
        assert_eq!(tokens[0].kind, TokenKind::Integer);
        assert_eq!(tokens[1].kind, TokenKind::Dot);
        assert_eq!(tokens[2].kind, TokenKind::Dot);
        assert_eq!(tokens[3].kind, TokenKind::Integer);
    }

    #[test]
    fn character_literal_decodes_escapes() {
        let tokens = lex_all(r"'a' '\n' '\x41'");
        assert_eq!(tokens[0].data, TokenData::Character(b'a'));
        assert_eq!(tokens[1].data, TokenData::Character(b'\n'));
        assert_eq!(tokens[2].data, TokenData::Character(b'A'));
    }

    #[test]
    fn unterminated_character_literal_is_fatal() {
        let diagnostic = lex_err("'a\n");
        assert!(
            diagnostic.message.contains("end-of-line"),
            "{}",
            diagnostic.message
        );
    }

    #[test]
    fn bytes_literal_decodes_escapes() {
        let tokens = lex_all(r#""A\tB\x00""#);
        assert_eq!(tokens[0].data, TokenData::Bytes(vec![b'A', b'\t', b'B', 0]));
    }

    #[test]
    fn newline_inside_bytes_literal_is_fatal() {
        let diagnostic = lex_err("\"abc\ndef\"");
        assert!(
            diagnostic.message.contains("end-of-line"),
            "{}",
            diagnostic.message
        );
    }

    #[test]
    fn unknown_escape_is_fatal() {
        let diagnostic = lex_err(r#""\q""#);
        assert!(
            diagnostic.message.contains("unknown escape"),
            "{}",
            diagnostic.message
        );
    }

    #[test]
    fn sigils_match_longest_first() {
        let tokens = lex_all("+%= += +% + <<= << ... .* . :: :");
        let kinds: Vec<TokenKind> = tokens.iter().map(|t| t.kind).collect();
        assert_eq!(
            &kinds[..11],
            &[
                TokenKind::PlusPercentAssign,
                TokenKind::PlusAssign,
                TokenKind::PlusPercent,
                TokenKind::Plus,
                TokenKind::ShlAssign,
                TokenKind::Shl,
                TokenKind::Ellipsis,
                TokenKind::DotStar,
                TokenKind::Dot,
                TokenKind::ColonColon,
                TokenKind::Colon,
            ]
        );
    }

    #[test]
    fn comments_run_to_end_of_line() {
        let tokens = lex_all("var # everything here is skipped ;;;\nlet");
        assert_eq!(tokens[0].kind, TokenKind::Var);
        assert_eq!(tokens[1].kind, TokenKind::Let);
        assert_eq!(tokens[1].loc.line, 2);
    }

    #[test]
    fn line_numbers_advance_with_newlines() {
        let tokens = lex_all("a\nb\n\nc");
        assert_eq!(tokens[0].loc.line, 1);
        assert_eq!(tokens[1].loc.line, 2);
        assert_eq!(tokens[2].loc.line, 4);
    }

    #[test]
    fn eof_token_terminates_stream() {
        let tokens = lex_all("");
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].kind, TokenKind::Eof);
    }
}
