//! Lexer support shared by the markup parser

pub mod cursor;

pub use cursor::Cursor;
