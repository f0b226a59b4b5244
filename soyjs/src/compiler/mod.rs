#![allow(missing_docs)]
//! This module contains the internals of the compiler.
pub mod ast;
pub mod attributes;
pub mod codegen;
pub mod expression;
pub mod lexer;
pub mod msg;
pub mod naming;
pub mod parser;
pub mod tokens;
