//! # protolink: schema compiler and wire codec
//!
//! Compiles `.proto` schema files (proto2 and proto3) into a linked, immutable
//! [`Schema`], and encodes/decodes messages of that schema in the protobuf
//! binary wire format through an [`adapter::Registry`].
//!
//! ## Pipeline
//!
//! - **Lexer**: tokens with positions and attached doc comments
//! - **Parser**: one [`ast::ProtoFile`] per source file
//! - **Linker**: resolves type references across files and scopes, validates
//!   tags, reserved ranges, extensions and options, and reports every problem
//!   it finds as a [`Diagnostic`]
//! - **Registry**: builds one adapter per message type on first use
//!
//! ## Example schema
//!
//! ```text
//! syntax = "proto3";
//! package demo;
//!
//! message Person {
//!   string name = 1;
//!   int32 id = 2;
//!   repeated string emails = 3;
//!   map<string, int32> scores = 4;
//! }
//! ```
//!
//! ## Usage
//!
//! ```no_run
//! use protolink::{compile, CompileConfig, MessageValue, Registry, Value};
//! use std::sync::Arc;
//!
//! let config = CompileConfig::default().with_source_root("protos");
//! let schema = compile(&config, &["demo/person.proto"]).expect("schema links");
//! let registry = Registry::new(Arc::new(schema));
//! let person = registry.adapter("demo.Person").expect("known type");
//! let bytes = person
//!     .encode(&MessageValue::new().with(1, Value::from("Ada")))
//!     .expect("encodes");
//! assert_eq!(person.decode(&bytes).expect("decodes").get(1), Some(&Value::from("Ada")));
//! ```
//!
//! See `tests/integration.rs` and `tests/dsl.rs` for more.

pub mod adapter;
pub mod ast;
pub mod codec;
pub mod config;
pub mod diagnostic;
pub mod lexer;
pub mod linker;
pub mod loader;
pub mod options;
pub mod parser;
pub mod schema;
pub mod value;
pub mod well_known;
pub mod wire;

pub use adapter::{AdapterId, ProtoAdapter, Registry, ScalarAdapter};
pub use ast::{Location, ProtoFile, ScalarType, Syntax};
pub use codec::CodecError;
pub use config::{CodecConfig, CompileConfig};
pub use diagnostic::{Diagnostic, DiagnosticKind, LinkError};
pub use lexer::SyntaxError;
pub use linker::link;
pub use parser::parse;
pub use schema::{Field, FieldKind, Schema, Type};
pub use value::{MessageValue, Value};

/// Load `roots` from the configured source roots and link them.
pub fn compile(config: &CompileConfig, roots: &[&str]) -> Result<Schema, LinkError> {
    let files = loader::load(config, roots)?;
    link(&files, config)
}

/// Parse and link in-memory `(path, source)` pairs with the default config.
///
/// Syntax errors from every file are collected before giving up.
pub fn link_sources(sources: &[(&str, &str)]) -> Result<Schema, LinkError> {
    link_sources_with(sources, &CompileConfig::default())
}

pub fn link_sources_with(sources: &[(&str, &str)], config: &CompileConfig) -> Result<Schema, LinkError> {
    let mut files = Vec::with_capacity(sources.len());
    let mut diagnostics = Vec::new();
    for (path, source) in sources {
        match parse(path, source) {
            Ok(file) => files.push(file),
            Err(e) => diagnostics.push(e.into()),
        }
    }
    if !diagnostics.is_empty() {
        return Err(LinkError { diagnostics });
    }
    link(&files, config)
}
