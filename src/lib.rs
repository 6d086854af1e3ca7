//! The Sunder compiler front-end and middle-end.
//!
//! The pipeline for a single module is strictly staged: lex, parse, order,
//! resolve, with the compile-time evaluator invoked re-entrantly from the
//! resolver wherever a constant expression is required. A process-wide
//! [`context::Context`] carries the interned vocabulary, builtin types, the
//! type registry, and the module registry shared by every stage.

pub mod ast;
#[cfg(feature = "cli")]
pub mod cli;
pub mod context;
pub mod cst;
pub mod error;
pub mod eval;
pub mod intern;
pub mod ints;
pub mod lexer;
pub mod order;
pub mod parse;
pub mod resolve;
pub mod style;
pub mod symbol;
pub mod token;
pub mod types;
pub mod value;
