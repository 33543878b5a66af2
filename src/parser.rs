//! Parse schema source into a [`ProtoFile`].
//!
//! Recursive descent over the [`Lexer`] token stream, keyed on the leading keyword
//! of each declaration. The first error aborts the file; no partial tree is returned.

use crate::ast::*;
use crate::lexer::{Lexer, Position, SyntaxError, Token, TokenKind};
use crate::wire::MAX_FIELD_NUMBER;

/// Parse one source file.
pub fn parse(path: &str, source: &str) -> Result<ProtoFile, SyntaxError> {
    let mut parser = Parser {
        lexer: Lexer::new(path, source)?,
        peeked: None,
        last: Position::default(),
        syntax: Syntax::Proto2,
    };
    parser.file()
}

struct Parser<'a> {
    lexer: Lexer<'a>,
    peeked: Option<Token>,
    last: Position,
    syntax: Syntax,
}

/// Context a field is declared in; decides which labels are legal.
#[derive(Clone, Copy, PartialEq)]
enum FieldContext {
    Message,
    Oneof,
    Extend,
}

impl<'a> Parser<'a> {
    // ==================== Token plumbing ====================

    fn peek(&mut self) -> Result<Option<&Token>, SyntaxError> {
        if self.peeked.is_none() {
            self.peeked = self.lexer.next().transpose()?;
        }
        Ok(self.peeked.as_ref())
    }

    fn next_token(&mut self) -> Result<Token, SyntaxError> {
        self.peek()?;
        match self.peeked.take() {
            Some(t) => {
                self.last = t.position;
                Ok(t)
            }
            None => Err(self.error_at(self.last, "unexpected end of input")),
        }
    }

    fn peek_is_symbol(&mut self, s: &str) -> Result<bool, SyntaxError> {
        Ok(self.peek()?.is_some_and(|t| t.is_symbol(s)))
    }

    fn peek_is_ident(&mut self, s: &str) -> Result<bool, SyntaxError> {
        Ok(self.peek()?.is_some_and(|t| t.is_ident(s)))
    }

    /// Consume the symbol if it is next.
    fn accept(&mut self, s: &str) -> Result<bool, SyntaxError> {
        if self.peek_is_symbol(s)? {
            self.next_token()?;
            return Ok(true);
        }
        Ok(false)
    }

    fn expect(&mut self, s: &str) -> Result<Token, SyntaxError> {
        let t = self.next_token()?;
        if t.is_symbol(s) {
            Ok(t)
        } else {
            Err(self.unexpected(&t, &format!("'{}'", s)))
        }
    }

    fn expect_keyword(&mut self, s: &str) -> Result<Token, SyntaxError> {
        let t = self.next_token()?;
        if t.is_ident(s) {
            Ok(t)
        } else {
            Err(self.unexpected(&t, &format!("'{}'", s)))
        }
    }

    fn ident(&mut self) -> Result<Token, SyntaxError> {
        let t = self.next_token()?;
        if t.kind == TokenKind::Ident {
            Ok(t)
        } else {
            Err(self.unexpected(&t, "identifier"))
        }
    }

    /// `[.]ident(.ident)*`
    fn dotted_name(&mut self) -> Result<(String, Token), SyntaxError> {
        let mut name = String::new();
        let first = if self.peek_is_symbol(".")? {
            name.push('.');
            self.next_token()?
        } else {
            self.peek()?.cloned().ok_or_else(|| self.error_at(self.last, "unexpected end of input"))?
        };
        name.push_str(&self.ident()?.text);
        while self.accept(".")? {
            name.push('.');
            name.push_str(&self.ident()?.text);
        }
        Ok((name, first))
    }

    /// One or more adjacent string literals, concatenated, as UTF-8 text.
    fn string(&mut self) -> Result<String, SyntaxError> {
        let position = self.peek()?.map(|t| t.position);
        let bytes = self.string_bytes()?;
        String::from_utf8(bytes)
            .map_err(|_| self.error_at(position.unwrap_or(self.last), "string literal is not valid UTF-8"))
    }

    /// One or more adjacent string literals, concatenated byte for byte.
    fn string_bytes(&mut self) -> Result<Vec<u8>, SyntaxError> {
        let t = self.next_token()?;
        if t.kind != TokenKind::Str {
            return Err(self.unexpected(&t, "string literal"));
        }
        let mut out = t.bytes;
        while self.peek()?.is_some_and(|t| t.kind == TokenKind::Str) {
            out.extend_from_slice(&self.next_token()?.bytes);
        }
        Ok(out)
    }

    /// Integer literal with optional leading `-`.
    fn integer(&mut self) -> Result<(i64, Token), SyntaxError> {
        let negative = self.accept("-")?;
        let t = self.next_token()?;
        if t.kind != TokenKind::Int {
            return Err(self.unexpected(&t, "integer"));
        }
        let out_of_range = || self.error_at(t.position, format!("integer out of range: {}", t.text));
        let magnitude = i128::from(parse_int(&t.text).ok_or_else(out_of_range)?);
        let value = i64::try_from(if negative { -magnitude } else { magnitude }).map_err(|_| out_of_range())?;
        Ok((value, t))
    }

    /// Trailing `;` of a declaration, returning the same-line comment after it.
    fn terminator(&mut self) -> Result<Option<String>, SyntaxError> {
        self.expect(";")?;
        Ok(self.peek()?.and_then(|t| t.trailing_doc.clone()))
    }

    fn location(&self, t: &Token) -> Location {
        Location::new(self.lexer.path(), t.position.line, t.position.column)
    }

    fn error_at(&self, position: Position, message: impl Into<String>) -> SyntaxError {
        SyntaxError::new(self.lexer.path(), position, message)
    }

    fn unexpected(&self, t: &Token, expected: &str) -> SyntaxError {
        self.error_at(t.position, format!("expected {} but was '{}'", expected, t.text))
    }

    // ==================== File ====================

    fn file(&mut self) -> Result<ProtoFile, SyntaxError> {
        let mut file = ProtoFile::new(self.lexer.path());
        let mut seen_declaration = false;
        while let Some(t) = self.peek()?.cloned() {
            if t.is_symbol(";") {
                self.next_token()?;
                continue;
            }
            if t.kind != TokenKind::Ident {
                return Err(self.unexpected(&t, "declaration"));
            }
            match t.text.as_str() {
                "syntax" => {
                    if seen_declaration {
                        return Err(self.error_at(t.position, "'syntax' must be the first declaration in a file"));
                    }
                    self.next_token()?;
                    self.expect("=")?;
                    let value_pos = self.peek()?.map(|t| t.position).unwrap_or(t.position);
                    let value = self.string()?;
                    self.syntax = match value.as_str() {
                        "proto2" => Syntax::Proto2,
                        "proto3" => Syntax::Proto3,
                        other => return Err(self.error_at(value_pos, format!("unexpected syntax: {}", other))),
                    };
                    file.syntax = self.syntax;
                    self.expect(";")?;
                }
                "package" => {
                    if file.package.is_some() {
                        return Err(self.error_at(t.position, "too many package names"));
                    }
                    self.next_token()?;
                    let (name, _) = self.dotted_name()?;
                    file.package = Some(name.trim_start_matches('.').to_string());
                    self.expect(";")?;
                }
                "import" => {
                    self.next_token()?;
                    let public = if self.peek_is_ident("public")? {
                        self.next_token()?;
                        true
                    } else {
                        if self.peek_is_ident("weak")? {
                            self.next_token()?;
                        }
                        false
                    };
                    let path_at = self.peek()?.map(|p| p.position).unwrap_or(t.position);
                    let path = self.string()?;
                    file.import_locations.push((
                        path.clone(),
                        Location::new(self.lexer.path(), path_at.line, path_at.column),
                    ));
                    if public {
                        file.public_imports.push(path);
                    } else {
                        file.imports.push(path);
                    }
                    self.expect(";")?;
                }
                "option" => {
                    self.next_token()?;
                    file.options.push(self.option_statement()?);
                }
                "message" => file.types.push(TypeElement::Message(self.message("")?)),
                "enum" => file.types.push(TypeElement::Enum(self.enumeration("")?)),
                "service" => file.services.push(self.service()?),
                "extend" => file.extends.push(self.extend()?),
                _ => return Err(self.unexpected(&t, "declaration")),
            }
            seen_declaration = true;
        }
        Ok(file)
    }

    // ==================== Messages ====================

    fn message(&mut self, prefix: &str) -> Result<MessageElement, SyntaxError> {
        let keyword = self.expect_keyword("message")?;
        let name = self.ident()?.text;
        let qualified_name = qualify(prefix, &name);
        let mut message = MessageElement {
            location: self.location(&keyword),
            name,
            qualified_name,
            documentation: keyword.doc.unwrap_or_default(),
            fields: Vec::new(),
            oneofs: Vec::new(),
            nested: Vec::new(),
            extends: Vec::new(),
            options: Vec::new(),
            reserveds: Vec::new(),
            extensions: Vec::new(),
        };
        self.expect("{")?;
        loop {
            let t = self.peek()?.cloned().ok_or_else(|| self.error_at(self.last, "unexpected end of input"))?;
            if t.is_symbol("}") {
                self.next_token()?;
                break;
            }
            if t.is_symbol(";") {
                self.next_token()?;
                continue;
            }
            match t.text.as_str() {
                "message" => message.nested.push(TypeElement::Message(self.message(&message.qualified_name)?)),
                "enum" => message.nested.push(TypeElement::Enum(self.enumeration(&message.qualified_name)?)),
                "extend" => message.extends.push(self.extend()?),
                "option" => {
                    self.next_token()?;
                    message.options.push(self.option_statement()?);
                }
                "oneof" => message.oneofs.push(self.oneof()?),
                "reserved" => message.reserveds.push(self.reserved(MAX_FIELD_NUMBER as i64)?),
                "extensions" => message.extensions.push(self.extensions()?),
                "group" => return Err(self.error_at(t.position, "groups are not supported")),
                _ => message.fields.push(self.field(FieldContext::Message)?),
            }
        }
        Ok(message)
    }

    fn field(&mut self, context: FieldContext) -> Result<FieldElement, SyntaxError> {
        let first = self.next_token()?;
        if first.kind != TokenKind::Ident && !first.is_symbol(".") {
            return Err(self.unexpected(&first, "field"));
        }
        let label = match first.text.as_str() {
            "optional" => Some(Label::Optional),
            "required" => Some(Label::Required),
            "repeated" => Some(Label::Repeated),
            _ => None,
        };
        let type_token = if label.is_some() { self.next_token()? } else { first.clone() };
        if label.is_some() && context == FieldContext::Oneof {
            return Err(self.error_at(first.position, "oneof fields may not carry a label"));
        }
        let data_type = self.data_type(type_token)?;
        if let DataType::Map { .. } = data_type {
            if label.is_some() {
                return Err(self.error_at(first.position, "map fields may not carry a label"));
            }
            if context != FieldContext::Message {
                return Err(self.error_at(first.position, "map fields are only allowed directly in messages"));
            }
        } else if label.is_none() && self.syntax == Syntax::Proto2 && context != FieldContext::Oneof {
            return Err(self.error_at(first.position, "field requires a label (optional, required or repeated) in proto2"));
        }
        let name = self.ident()?.text;
        self.expect("=")?;
        let (tag, tag_token) = self.integer()?;
        let tag = u32::try_from(tag)
            .ok()
            .filter(|&t| t <= i32::MAX as u32)
            .ok_or_else(|| self.error_at(tag_token.position, format!("field number out of range: {}", tag)))?;
        let mut options = self.option_list()?;
        let trailing = self.terminator()?;

        let mut default = None;
        let mut json_name = None;
        options.retain(|o| {
            if o.is_named("default") {
                default = Some(o.value.clone());
                false
            } else if o.is_named("json_name") {
                if let OptionValue::Str(s) = &o.value {
                    json_name = String::from_utf8(s.clone()).ok();
                }
                false
            } else {
                true
            }
        });
        Ok(FieldElement {
            location: self.location(&first),
            label,
            data_type,
            name,
            tag,
            default,
            json_name,
            options,
            documentation: join_doc(first.doc, trailing),
        })
    }

    /// Type starting at `first`: a scalar keyword, `map<K, V>`, or a dotted name.
    fn data_type(&mut self, first: Token) -> Result<DataType, SyntaxError> {
        if first.is_ident("map") && self.peek_is_symbol("<")? {
            self.expect("<")?;
            let key_token = self.ident()?;
            let key = ScalarType::from_keyword(&key_token.text)
                .ok_or_else(|| self.error_at(key_token.position, format!("map key must be a scalar type, was '{}'", key_token.text)))?;
            self.expect(",")?;
            let value_first = self.next_token()?;
            let value = self.named_or_scalar(value_first)?;
            self.expect(">")?;
            return Ok(DataType::Map {
                key,
                value: Box::new(value),
            });
        }
        self.named_or_scalar(first)
    }

    fn named_or_scalar(&mut self, first: Token) -> Result<DataType, SyntaxError> {
        let mut name = String::new();
        if first.is_symbol(".") {
            name.push('.');
            name.push_str(&self.ident()?.text);
        } else if first.kind == TokenKind::Ident {
            if let Some(scalar) = ScalarType::from_keyword(&first.text) {
                return Ok(DataType::Scalar(scalar));
            }
            name.push_str(&first.text);
        } else {
            return Err(self.unexpected(&first, "type name"));
        }
        while self.accept(".")? {
            name.push('.');
            name.push_str(&self.ident()?.text);
        }
        Ok(DataType::Named(name))
    }

    fn oneof(&mut self) -> Result<OneofElement, SyntaxError> {
        let keyword = self.expect_keyword("oneof")?;
        let name = self.ident()?.text;
        let mut oneof = OneofElement {
            location: self.location(&keyword),
            name,
            documentation: keyword.doc.unwrap_or_default(),
            fields: Vec::new(),
            options: Vec::new(),
        };
        self.expect("{")?;
        while !self.accept("}")? {
            if self.accept(";")? {
                continue;
            }
            if self.peek_is_ident("option")? {
                self.next_token()?;
                oneof.options.push(self.option_statement()?);
                continue;
            }
            oneof.fields.push(self.field(FieldContext::Oneof)?);
        }
        Ok(oneof)
    }

    /// `reserved 1, 5 to 9, 100 to max;` or `reserved "a", "b";`
    fn reserved(&mut self, max: i64) -> Result<ReservedElement, SyntaxError> {
        let keyword = self.expect_keyword("reserved")?;
        let mut values = Vec::new();
        loop {
            if self.peek()?.is_some_and(|t| t.kind == TokenKind::Str) {
                values.push(Reserved::Name(self.string()?));
            } else {
                values.push(Reserved::Range(self.range(max)?));
            }
            if !self.accept(",")? {
                break;
            }
        }
        self.expect(";")?;
        Ok(ReservedElement {
            location: self.location(&keyword),
            documentation: keyword.doc.unwrap_or_default(),
            values,
        })
    }

    fn extensions(&mut self) -> Result<ExtensionsElement, SyntaxError> {
        let keyword = self.expect_keyword("extensions")?;
        let mut ranges = vec![self.range(MAX_FIELD_NUMBER as i64)?];
        while self.accept(",")? {
            ranges.push(self.range(MAX_FIELD_NUMBER as i64)?);
        }
        // Range options (declarations, verification) carry no wire meaning.
        self.option_list()?;
        self.expect(";")?;
        Ok(ExtensionsElement {
            location: self.location(&keyword),
            documentation: keyword.doc.unwrap_or_default(),
            ranges,
        })
    }

    fn range(&mut self, max: i64) -> Result<TagRange, SyntaxError> {
        let (start, _) = self.integer()?;
        let end = if self.peek_is_ident("to")? {
            self.next_token()?;
            if self.peek_is_ident("max")? {
                self.next_token()?;
                max
            } else {
                self.integer()?.0
            }
        } else {
            start
        };
        if end < start {
            return Err(self.error_at(self.last, format!("range end {} is before start {}", end, start)));
        }
        Ok(TagRange { start, end })
    }

    fn extend(&mut self) -> Result<ExtendElement, SyntaxError> {
        let keyword = self.expect_keyword("extend")?;
        let (name, _) = self.dotted_name()?;
        let mut extend = ExtendElement {
            location: self.location(&keyword),
            name,
            documentation: keyword.doc.unwrap_or_default(),
            fields: Vec::new(),
        };
        self.expect("{")?;
        while !self.accept("}")? {
            if self.accept(";")? {
                continue;
            }
            extend.fields.push(self.field(FieldContext::Extend)?);
        }
        Ok(extend)
    }

    // ==================== Enums ====================

    fn enumeration(&mut self, prefix: &str) -> Result<EnumElement, SyntaxError> {
        let keyword = self.expect_keyword("enum")?;
        let name = self.ident()?.text;
        let qualified_name = qualify(prefix, &name);
        let mut element = EnumElement {
            location: self.location(&keyword),
            name,
            qualified_name,
            documentation: keyword.doc.unwrap_or_default(),
            constants: Vec::new(),
            options: Vec::new(),
            reserveds: Vec::new(),
        };
        self.expect("{")?;
        while !self.accept("}")? {
            if self.accept(";")? {
                continue;
            }
            let t = self.peek()?.cloned().ok_or_else(|| self.error_at(self.last, "unexpected end of input"))?;
            match t.text.as_str() {
                "option" if t.kind == TokenKind::Ident => {
                    self.next_token()?;
                    element.options.push(self.option_statement()?);
                }
                "reserved" if t.kind == TokenKind::Ident => {
                    element.reserveds.push(self.reserved(i32::MAX as i64)?);
                }
                _ => element.constants.push(self.enum_constant()?),
            }
        }
        Ok(element)
    }

    fn enum_constant(&mut self) -> Result<EnumConstantElement, SyntaxError> {
        let name_token = self.ident()?;
        self.expect("=")?;
        let (tag, tag_token) = self.integer()?;
        let tag = i32::try_from(tag).map_err(|_| self.error_at(tag_token.position, format!("enum value out of range: {}", tag)))?;
        let options = self.option_list()?;
        let trailing = self.terminator()?;
        Ok(EnumConstantElement {
            location: self.location(&name_token),
            name: name_token.text,
            tag,
            documentation: join_doc(name_token.doc, trailing),
            options,
        })
    }

    // ==================== Services ====================

    fn service(&mut self) -> Result<ServiceElement, SyntaxError> {
        let keyword = self.expect_keyword("service")?;
        let name = self.ident()?.text;
        let mut service = ServiceElement {
            location: self.location(&keyword),
            name,
            documentation: keyword.doc.unwrap_or_default(),
            rpcs: Vec::new(),
            options: Vec::new(),
        };
        self.expect("{")?;
        while !self.accept("}")? {
            if self.accept(";")? {
                continue;
            }
            let t = self.next_token()?;
            if t.is_ident("option") {
                service.options.push(self.option_statement()?);
            } else if t.is_ident("rpc") {
                service.rpcs.push(self.rpc(t)?);
            } else {
                return Err(self.unexpected(&t, "'rpc' or 'option'"));
            }
        }
        Ok(service)
    }

    fn rpc(&mut self, keyword: Token) -> Result<RpcElement, SyntaxError> {
        let name = self.ident()?.text;
        let (request_streaming, request_type) = self.rpc_type()?;
        self.expect_keyword("returns")?;
        let (response_streaming, response_type) = self.rpc_type()?;
        let mut options = Vec::new();
        if self.accept("{")? {
            while !self.accept("}")? {
                if self.accept(";")? {
                    continue;
                }
                self.expect_keyword("option")?;
                options.push(self.option_statement()?);
            }
        } else {
            self.expect(";")?;
        }
        Ok(RpcElement {
            location: self.location(&keyword),
            name,
            documentation: keyword.doc.unwrap_or_default(),
            request_type,
            response_type,
            request_streaming,
            response_streaming,
            options,
        })
    }

    /// `( [stream] Type )`
    fn rpc_type(&mut self) -> Result<(bool, String), SyntaxError> {
        self.expect("(")?;
        let mut streaming = false;
        if self.peek_is_ident("stream")? {
            let stream = self.next_token()?;
            // `stream` is also a legal type name.
            if self.peek_is_symbol(")")? {
                self.expect(")")?;
                return Ok((false, stream.text));
            }
            streaming = true;
        }
        let (name, _) = self.dotted_name()?;
        self.expect(")")?;
        Ok((streaming, name))
    }

    // ==================== Options ====================

    /// Body of `option name = value;` after the keyword.
    fn option_statement(&mut self) -> Result<OptionElement, SyntaxError> {
        let option = self.option()?;
        self.expect(";")?;
        Ok(option)
    }

    /// `[a = 1, (b).c = "x"]`, or nothing.
    fn option_list(&mut self) -> Result<Vec<OptionElement>, SyntaxError> {
        let mut options = Vec::new();
        if !self.accept("[")? {
            return Ok(options);
        }
        loop {
            options.push(self.option()?);
            if self.accept("]")? {
                break;
            }
            self.expect(",")?;
        }
        Ok(options)
    }

    fn option(&mut self) -> Result<OptionElement, SyntaxError> {
        let start = self.peek()?.cloned().ok_or_else(|| self.error_at(self.last, "unexpected end of input"))?;
        let mut name = vec![self.option_name_part()?];
        while self.accept(".")? {
            name.push(self.option_name_part()?);
        }
        self.expect("=")?;
        let value = self.option_value()?;
        Ok(OptionElement {
            location: self.location(&start),
            name,
            value,
        })
    }

    fn option_name_part(&mut self) -> Result<OptionNamePart, SyntaxError> {
        if self.accept("(")? {
            let (name, _) = self.dotted_name()?;
            self.expect(")")?;
            return Ok(OptionNamePart { name, extension: true });
        }
        Ok(OptionNamePart {
            name: self.ident()?.text,
            extension: false,
        })
    }

    fn option_value(&mut self) -> Result<OptionValue, SyntaxError> {
        let t = self.peek()?.cloned().ok_or_else(|| self.error_at(self.last, "unexpected end of input"))?;
        match t.kind {
            TokenKind::Str => Ok(OptionValue::Str(self.string_bytes()?)),
            TokenKind::Int | TokenKind::Float => {
                self.next_token()?;
                Ok(OptionValue::Number(t.text))
            }
            TokenKind::Ident => {
                self.next_token()?;
                Ok(if t.text == "true" || t.text == "false" {
                    OptionValue::Bool(t.text == "true")
                } else if t.text == "inf" || t.text == "nan" {
                    OptionValue::Number(t.text)
                } else {
                    OptionValue::Enum(t.text)
                })
            }
            TokenKind::Symbol => match t.text.as_str() {
                "-" | "+" => {
                    self.next_token()?;
                    let n = self.next_token()?;
                    let numeric = matches!(n.kind, TokenKind::Int | TokenKind::Float) || n.is_ident("inf") || n.is_ident("nan");
                    if !numeric {
                        return Err(self.unexpected(&n, "number"));
                    }
                    let sign = if t.text == "-" { "-" } else { "" };
                    Ok(OptionValue::Number(format!("{}{}", sign, n.text)))
                }
                "{" => self.aggregate(),
                "[" => {
                    self.next_token()?;
                    let mut items = Vec::new();
                    if !self.accept("]")? {
                        loop {
                            items.push(self.option_value()?);
                            if self.accept("]")? {
                                break;
                            }
                            self.expect(",")?;
                        }
                    }
                    Ok(OptionValue::List(items))
                }
                _ => Err(self.unexpected(&t, "option value")),
            },
        }
    }

    /// `{ key: value, nested { ... } [ext.name]: value }`
    fn aggregate(&mut self) -> Result<OptionValue, SyntaxError> {
        self.expect("{")?;
        let mut entries = Vec::new();
        loop {
            if self.accept("}")? {
                break;
            }
            let start = self.peek()?.cloned().ok_or_else(|| self.error_at(self.last, "unexpected end of input"))?;
            let part = if self.accept("[")? {
                let (name, _) = self.dotted_name()?;
                self.expect("]")?;
                OptionNamePart { name, extension: true }
            } else {
                OptionNamePart {
                    name: self.ident()?.text,
                    extension: false,
                }
            };
            let has_colon = self.accept(":")?;
            if !has_colon && !self.peek_is_symbol("{")? {
                let t = self.next_token()?;
                return Err(self.unexpected(&t, "':'"));
            }
            let value = self.option_value()?;
            entries.push(OptionElement {
                location: self.location(&start),
                name: vec![part],
                value,
            });
            if !self.accept(",")? {
                self.accept(";")?;
            }
        }
        Ok(OptionValue::Aggregate(entries))
    }
}

fn qualify(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", prefix, name)
    }
}

fn join_doc(leading: Option<String>, trailing: Option<String>) -> String {
    match (leading, trailing) {
        (Some(l), Some(t)) => format!("{}\n{}", l, t),
        (Some(l), None) => l,
        (None, Some(t)) => t,
        (None, None) => String::new(),
    }
}

/// Decimal, `0x` hex, or leading-zero octal.
pub(crate) fn parse_int(text: &str) -> Option<u64> {
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        return u64::from_str_radix(hex, 16).ok();
    }
    if text.len() > 1 && text.starts_with('0') {
        return u64::from_str_radix(&text[1..], 8).ok();
    }
    text.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_int_radixes() {
        assert_eq!(parse_int("0"), Some(0));
        assert_eq!(parse_int("42"), Some(42));
        assert_eq!(parse_int("0x1f"), Some(31));
        assert_eq!(parse_int("017"), Some(15));
        assert_eq!(parse_int("09"), None);
    }

    #[test]
    fn parse_integer_extremes() {
        let src = "enum E {\n  A = 0;\n  reserved -9223372036854775808 to -1, 9223372036854775807;\n}\n";
        let file = parse("e.proto", src).expect("parse");
        let TypeElement::Enum(e) = &file.types[0] else {
            panic!("expected enum");
        };
        assert_eq!(
            e.reserveds[0].values,
            vec![
                Reserved::Range(TagRange { start: i64::MIN, end: -1 }),
                Reserved::Range(TagRange { start: i64::MAX, end: i64::MAX }),
            ]
        );

        let err = parse("e.proto", "enum E {\n  reserved -9223372036854775809;\n}\n").expect_err("too small");
        assert!(err.message.contains("out of range"), "{}", err);
        let err = parse("e.proto", "enum E {\n  reserved 9223372036854775808;\n}\n").expect_err("too large");
        assert!(err.message.contains("out of range"), "{}", err);
    }

    #[test]
    fn parse_field_pseudo_options() {
        let src = r#"
message M {
  optional int32 a = 1 [default = -5, json_name = "alpha", deprecated = true];
}
"#;
        let file = parse("m.proto", src).expect("parse");
        let TypeElement::Message(m) = &file.types[0] else {
            panic!("expected message");
        };
        let a = &m.fields[0];
        assert_eq!(a.default, Some(OptionValue::Number("-5".into())));
        assert_eq!(a.json_name.as_deref(), Some("alpha"));
        assert_eq!(a.options.len(), 1);
        assert!(a.is_deprecated());
    }

    #[test]
    fn parse_trailing_comment_documents_field() {
        let src = "syntax = \"proto3\";\nmessage M {\n  // Leading.\n  int32 a = 1; // Trailing.\n  int32 b = 2;\n}\n";
        let file = parse("m.proto", src).expect("parse");
        let TypeElement::Message(m) = &file.types[0] else {
            panic!("expected message");
        };
        assert_eq!(m.fields[0].documentation, "Leading.\nTrailing.");
        assert_eq!(m.fields[1].documentation, "");
    }

    #[test]
    fn parse_stream_as_type_name() {
        let src = "service S { rpc Get (stream) returns (stream Reply); }";
        let file = parse("s.proto", src).expect("parse");
        let rpc = &file.services[0].rpcs[0];
        assert_eq!(rpc.request_type, "stream");
        assert!(!rpc.request_streaming);
        assert!(rpc.response_streaming);
    }
}
