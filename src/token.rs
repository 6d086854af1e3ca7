use num_bigint::BigInt;

use crate::intern::Symbol;

/// Half-open byte range into a module's source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

/// Source location attached to tokens, CST nodes, typed AST nodes, symbols,
/// and diagnostics. `Loc::NONE` is used for errors the compiler cannot
/// attribute to a source position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Loc {
    /// Module name as written in the importing source, or `Symbol::EMPTY`.
    pub path: Symbol,
    /// One-based line number, or zero for no line.
    pub line: usize,
    pub span: Span,
}

impl Loc {
    pub const NONE: Loc = Loc {
        path: Symbol::EMPTY,
        line: 0,
        span: Span { start: 0, end: 0 },
    };

    pub fn new(path: Symbol, line: usize, span: Span) -> Self {
        Self { path, line, span }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    // Keywords
    True,
    False,
    Not,
    Or,
    And,
    Namespace,
    Import,
    Var,
    Let,
    Func,
    Struct,
    Union,
    Enum,
    Type,
    Extend,
    Extern,
    Switch,
    Return,
    Assert,
    Defer,
    If,
    Elif,
    Else,
    When,
    Elwhen,
    For,
    In,
    Break,
    Continue,
    Defined,
    Alignof,
    Startof,
    Countof,
    Sizeof,
    Typeof,
    Fileof,
    Lineof,
    Uninit,
    Embed,
    // Sigils
    PlusPercentAssign, // +%=
    DashPercentAssign, // -%=
    StarPercentAssign, // *%=
    PlusAssign,        // +=
    DashAssign,        // -=
    StarAssign,        // *=
    SlashAssign,       // /=
    PercentAssign,     // %=
    ShlAssign,         // <<=
    ShrAssign,         // >>=
    PipeAssign,        // |=
    CaretAssign,       // ^=
    AmpersandAssign,   // &=
    Shl,               // <<
    Shr,               // >>
    Eq,                // ==
    Ne,                // !=
    Le,                // <=
    Lt,                // <
    Ge,                // >=
    Gt,                // >
    Assign,            // =
    PlusPercent,       // +%
    DashPercent,       // -%
    StarPercent,       // *%
    Plus,              // +
    Dash,              // -
    Star,              // *
    Slash,             // /
    Percent,           // %
    Tilde,             // ~
    Pipe,              // |
    Caret,             // ^
    Ampersand,         // &
    LParen,            // (
    RParen,            // )
    LBrace,            // {
    RBrace,            // }
    LBracket,          // [
    RBracket,          // ]
    Comma,             // ,
    Ellipsis,          // ...
    DotStar,           // .*
    Dot,               // .
    ColonColon,        // ::
    Colon,             // :
    Semicolon,         // ;
    // Identifiers and non-keyword literals
    Identifier,
    Integer,
    Ieee754,
    Character,
    Bytes,
    // Meta
    Eof,
}

/// Keyword spellings in token-kind order.
pub const KEYWORDS: &[(TokenKind, &str)] = &[
    (TokenKind::True, "true"),
    (TokenKind::False, "false"),
    (TokenKind::Not, "not"),
    (TokenKind::Or, "or"),
    (TokenKind::And, "and"),
    (TokenKind::Namespace, "namespace"),
    (TokenKind::Import, "import"),
    (TokenKind::Var, "var"),
    (TokenKind::Let, "let"),
    (TokenKind::Func, "func"),
    (TokenKind::Struct, "struct"),
    (TokenKind::Union, "union"),
    (TokenKind::Enum, "enum"),
    (TokenKind::Type, "type"),
    (TokenKind::Extend, "extend"),
    (TokenKind::Extern, "extern"),
    (TokenKind::Switch, "switch"),
    (TokenKind::Return, "return"),
    (TokenKind::Assert, "assert"),
    (TokenKind::Defer, "defer"),
    (TokenKind::If, "if"),
    (TokenKind::Elif, "elif"),
    (TokenKind::Else, "else"),
    (TokenKind::When, "when"),
    (TokenKind::Elwhen, "elwhen"),
    (TokenKind::For, "for"),
    (TokenKind::In, "in"),
    (TokenKind::Break, "break"),
    (TokenKind::Continue, "continue"),
    (TokenKind::Defined, "defined"),
    (TokenKind::Alignof, "alignof"),
    (TokenKind::Startof, "startof"),
    (TokenKind::Countof, "countof"),
    (TokenKind::Sizeof, "sizeof"),
    (TokenKind::Typeof, "typeof"),
    (TokenKind::Fileof, "fileof"),
    (TokenKind::Lineof, "lineof"),
    (TokenKind::Uninit, "uninit"),
    (TokenKind::Embed, "embed"),
];

/// Sigil spellings in match order. Longer sigils sharing a prefix with a
/// shorter sigil appear first so that a greedy scan over this table performs
/// longest-match (`+%=` before `+=` before `+%` before `+`).
pub const SIGILS: &[(TokenKind, &str)] = &[
    (TokenKind::PlusPercentAssign, "+%="),
    (TokenKind::DashPercentAssign, "-%="),
    (TokenKind::StarPercentAssign, "*%="),
    (TokenKind::PlusAssign, "+="),
    (TokenKind::DashAssign, "-="),
    (TokenKind::StarAssign, "*="),
    (TokenKind::SlashAssign, "/="),
    (TokenKind::PercentAssign, "%="),
    (TokenKind::ShlAssign, "<<="),
    (TokenKind::ShrAssign, ">>="),
    (TokenKind::PipeAssign, "|="),
    (TokenKind::CaretAssign, "^="),
    (TokenKind::AmpersandAssign, "&="),
    (TokenKind::Shl, "<<"),
    (TokenKind::Shr, ">>"),
    (TokenKind::Eq, "=="),
    (TokenKind::Ne, "!="),
    (TokenKind::Le, "<="),
    (TokenKind::Lt, "<"),
    (TokenKind::Ge, ">="),
    (TokenKind::Gt, ">"),
    (TokenKind::Assign, "="),
    (TokenKind::PlusPercent, "+%"),
    (TokenKind::DashPercent, "-%"),
    (TokenKind::StarPercent, "*%"),
    (TokenKind::Plus, "+"),
    (TokenKind::Dash, "-"),
    (TokenKind::Star, "*"),
    (TokenKind::Slash, "/"),
    (TokenKind::Percent, "%"),
    (TokenKind::Tilde, "~"),
    (TokenKind::Pipe, "|"),
    (TokenKind::Caret, "^"),
    (TokenKind::Ampersand, "&"),
    (TokenKind::LParen, "("),
    (TokenKind::RParen, ")"),
    (TokenKind::LBrace, "{"),
    (TokenKind::RBrace, "}"),
    (TokenKind::LBracket, "["),
    (TokenKind::RBracket, "]"),
    (TokenKind::Comma, ","),
    (TokenKind::Ellipsis, "..."),
    (TokenKind::DotStar, ".*"),
    (TokenKind::Dot, "."),
    (TokenKind::ColonColon, "::"),
    (TokenKind::Colon, ":"),
    (TokenKind::Semicolon, ";"),
];

impl TokenKind {
    /// Human-readable spelling used in expected/found diagnostics.
    pub fn to_str(self) -> &'static str {
        if let Some(&(_, s)) = KEYWORDS.iter().find(|&&(k, _)| k == self) {
            return s;
        }
        if let Some(&(_, s)) = SIGILS.iter().find(|&&(k, _)| k == self) {
            return s;
        }
        match self {
            TokenKind::Identifier => "identifier",
            TokenKind::Integer => "integer",
            TokenKind::Ieee754 => "floating point number",
            TokenKind::Character => "character",
            TokenKind::Bytes => "bytes",
            TokenKind::Eof => "end-of-file",
            _ => unreachable!(),
        }
    }
}

/// Kind-specific token payload.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenData {
    None,
    Identifier(Symbol),
    Integer { value: BigInt, suffix: Symbol },
    Ieee754 { value: f64, suffix: Symbol },
    Character(u8),
    Bytes(Vec<u8>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub loc: Loc,
    pub data: TokenData,
}

impl Token {
    pub fn new(kind: TokenKind, loc: Loc) -> Self {
        Token {
            kind,
            loc,
            data: TokenData::None,
        }
    }

    /// The identifier payload. Panics on non-identifier tokens.
    pub fn identifier(&self) -> Symbol {
        match self.data {
            TokenData::Identifier(sym) => sym,
            _ => panic!("token has no identifier payload"),
        }
    }

    /// Rendering of this token for expected/found diagnostics.
    pub fn describe(&self, interner: &crate::intern::Interner) -> String {
        match &self.data {
            TokenData::Identifier(sym) => {
                format!("identifier({})", interner.resolve(*sym))
            }
            TokenData::Integer { value, .. } => format!("integer({})", value),
            _ => self.kind.to_str().to_string(),
        }
    }
}
