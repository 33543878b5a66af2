//! Schema language tests: syntax (parse success/failure) and semantics (link, diagnostics, options).

use protolink::ast::{DataType, Label, TypeElement};
use protolink::schema::{FieldKind, Type};
use protolink::{
    compile, link_sources, link_sources_with, parse, CompileConfig, DiagnosticKind, LinkError, ScalarType, Syntax, Value,
};
use std::fs;

fn link_err(sources: &[(&str, &str)]) -> LinkError {
    link_sources(sources).expect_err("link should fail")
}

fn messages(err: &LinkError, kind: DiagnosticKind) -> Vec<String> {
    err.of_kind(kind).map(|d| d.message.clone()).collect()
}

// ==================== Syntax: valid files ====================

#[test]
fn parse_empty_file() {
    let file = parse("empty.proto", "").expect("empty file parses");
    assert!(file.types.is_empty());
    assert_eq!(file.syntax, Syntax::Proto2);
    assert_eq!(file.package, None);
}

#[test]
fn parse_minimal_message() {
    let src = r#"
syntax = "proto3";
package a.b;

message M {
  int32 x = 1;
}
"#;
    let file = parse("m.proto", src).expect("parse");
    assert_eq!(file.syntax, Syntax::Proto3);
    assert_eq!(file.package.as_deref(), Some("a.b"));
    let TypeElement::Message(m) = &file.types[0] else {
        panic!("expected message")
    };
    assert_eq!(m.name, "M");
    assert_eq!(m.fields[0].name, "x");
    assert_eq!(m.fields[0].tag, 1);
    assert_eq!(m.fields[0].data_type, DataType::Scalar(ScalarType::Int32));
    assert_eq!(m.location.line, 5);
}

#[test]
fn parse_every_scalar_keyword() {
    let src = r#"
syntax = "proto3";
message AllScalars {
  double a = 1;
  float b = 2;
  int32 c = 3;
  int64 d = 4;
  uint32 e = 5;
  uint64 f = 6;
  sint32 g = 7;
  sint64 h = 8;
  fixed32 i = 9;
  fixed64 j = 10;
  sfixed32 k = 11;
  sfixed64 l = 12;
  bool m = 13;
  string n = 14;
  bytes o = 15;
}
"#;
    let file = parse("s.proto", src).expect("parse");
    let TypeElement::Message(m) = &file.types[0] else {
        panic!("expected message")
    };
    assert_eq!(m.fields.len(), 15);
    assert!(m.fields.iter().all(|f| matches!(f.data_type, DataType::Scalar(_))));
}

#[test]
fn parse_documentation_comments() {
    let src = r#"
syntax = "proto3";

// A greeting.
/* Sent once. */
message Hello {
  string who = 1; // the addressee
}
"#;
    let file = parse("d.proto", src).expect("parse");
    let TypeElement::Message(m) = &file.types[0] else {
        panic!("expected message")
    };
    assert!(m.documentation.contains("A greeting."), "{:?}", m.documentation);
    assert!(m.fields[0].documentation.contains("the addressee"));
}

#[test]
fn parse_nested_types_enums_and_services() {
    let src = r#"
syntax = "proto3";
package shop;

message Order {
  message Line {
    string sku = 1;
    uint32 qty = 2;
  }
  enum State {
    NEW = 0;
    PAID = 1;
  }
  repeated Line lines = 1;
  State state = 2;
  map<string, Line> by_sku = 3;
  reserved 10 to 12, 15;
  reserved "legacy";
}

service Orders {
  rpc Place (Order) returns (Order);
  rpc Watch (Order) returns (stream Order) {
    option deprecated = true;
  }
}
"#;
    let file = parse("shop.proto", src).expect("parse");
    let TypeElement::Message(order) = &file.types[0] else {
        panic!("expected message")
    };
    assert_eq!(order.nested.len(), 2);
    assert_eq!(order.nested[0].qualified_name(), "Order.Line");
    assert_eq!(order.fields[0].label, Some(Label::Repeated));
    assert!(matches!(order.fields[2].data_type, DataType::Map { .. }));
    assert_eq!(order.reserveds.len(), 2);
    assert_eq!(file.services[0].rpcs.len(), 2);
    assert!(file.services[0].rpcs[1].response_streaming);
}

#[test]
fn parse_imports_options_and_extend() {
    let src = r#"
syntax = "proto2";
package p;
import "a.proto";
import public "b.proto";
import weak "c.proto";
option java_package = "com.example.p";
option optimize_for = SPEED;

message Base {
  extensions 100 to 199, 1000 to max;
}

extend Base {
  optional int32 extra = 100;
}
"#;
    let file = parse("p.proto", src).expect("parse");
    assert_eq!(file.imports, vec!["a.proto", "c.proto"]);
    assert_eq!(file.public_imports, vec!["b.proto"]);
    assert_eq!(file.import_location("b.proto").to_string(), "p.proto:5:15");
    assert_eq!(file.import_location("c.proto").to_string(), "p.proto:6:13");
    assert_eq!(file.options.len(), 2);
    assert_eq!(file.extends.len(), 1);
    assert_eq!(file.extends[0].fields[0].name, "extra");
}

// ==================== Syntax: invalid files ====================

#[test]
fn parse_error_reports_position() {
    let src = "syntax = \"proto3\";\nmessage M {\n  int32 x = 1\n}\n";
    let err = parse("bad.proto", src).expect_err("missing semicolon");
    assert_eq!(err.path, "bad.proto");
    assert_eq!(err.line, 4);
    assert!(err.to_string().contains("bad.proto:4"), "{}", err);
}

#[test]
fn parse_rejects_unknown_syntax() {
    assert!(parse("x.proto", "syntax = \"proto4\";").is_err());
}

#[test]
fn parse_rejects_late_syntax_statement() {
    assert!(parse("x.proto", "package p;\nsyntax = \"proto3\";").is_err());
}

#[test]
fn parse_requires_labels_in_proto2() {
    let err = parse("x.proto", "syntax = \"proto2\";\nmessage M { int32 x = 1; }").expect_err("no label");
    assert!(err.message.contains("label"), "{}", err.message);
}

#[test]
fn parse_rejects_labelled_map() {
    assert!(parse("x.proto", "syntax = \"proto3\";\nmessage M { repeated map<string, int32> m = 1; }").is_err());
}

#[test]
fn parse_rejects_unterminated_message() {
    assert!(parse("x.proto", "syntax = \"proto3\";\nmessage M { int32 x = 1;").is_err());
}

#[test]
fn syntax_errors_from_every_file_are_collected() {
    let err = link_err(&[("a.proto", "message {"), ("b.proto", "enum E {")]);
    let files: Vec<&str> = err.of_kind(DiagnosticKind::Syntax).map(|d| d.location.path.as_str()).collect();
    assert_eq!(files, vec!["a.proto", "b.proto"]);
}

// ==================== Linking ====================

#[test]
fn link_resolves_nested_and_qualified_names() {
    let schema = link_sources(&[(
        "shop.proto",
        r#"
syntax = "proto3";
package shop;
message Order {
  message Line { string sku = 1; }
  repeated Line lines = 1;
  .shop.Order.Line first = 2;
  Order.Line last = 3;
}
"#,
    )])
    .expect("link");
    let order = schema.message("shop.Order").expect("Order");
    for f in &order.fields {
        assert_eq!(f.kind, FieldKind::Message("shop.Order.Line".into()), "{}", f.name);
    }
    assert_eq!(order.fields[0].full_name, "shop.Order.lines");
    assert_eq!(order.fields[0].json_name, "lines");
    assert!(schema.message(".shop.Order.Line").is_some());
}

#[test]
fn link_synthesizes_map_entries() {
    let schema = link_sources(&[(
        "m.proto",
        "syntax = \"proto3\";\npackage m;\nmessage M { map<string, int64> string_counts = 1; }",
    )])
    .expect("link");
    let field = schema.message("m.M").and_then(|m| m.field_named("string_counts")).expect("field");
    assert_eq!(field.label, Label::Repeated);
    let FieldKind::Map { entry, key, value } = &field.kind else {
        panic!("expected map kind")
    };
    assert_eq!(entry, "m.M.StringCountsEntry");
    assert_eq!(*key, ScalarType::String);
    assert_eq!(**value, FieldKind::Scalar(ScalarType::Int64));
    let entry = schema.message(entry).expect("entry type");
    assert!(entry.map_entry);
    assert_eq!(entry.fields.iter().map(|f| f.tag).collect::<Vec<_>>(), vec![1, 2]);
}

#[test]
fn link_packs_proto3_repeated_scalars_by_default() {
    let schema = link_sources(&[(
        "p.proto",
        r#"
syntax = "proto3";
package p;
message M {
  repeated int32 a = 1;
  repeated int32 b = 2 [packed = false];
  repeated string c = 3;
}
"#,
    )])
    .expect("link");
    let m = schema.message("p.M").expect("M");
    let packed: Vec<bool> = m.fields.iter().map(|f| f.packed).collect();
    assert_eq!(packed, vec![true, false, false]);
}

#[test]
fn link_marks_proto2_enums_closed() {
    let schema = link_sources(&[
        ("two.proto", "syntax = \"proto2\";\npackage two;\nenum E { A = 1; }"),
        (
            "three.proto",
            "syntax = \"proto3\";\npackage three;\nimport \"two.proto\";\nmessage M { two.E e = 1; }",
        ),
    ])
    .expect("link");
    let field = schema.message("three.M").and_then(|m| m.field(1)).expect("field");
    assert_eq!(
        field.kind,
        FieldKind::Enum {
            type_name: "two.E".into(),
            closed: true
        }
    );
}

#[test]
fn duplicate_tag_names_both_fields() {
    let err = link_err(&[(
        "dup.proto",
        "syntax = \"proto3\";\npackage d;\nmessage M {\n  int32 a = 1;\n  string b = 1;\n}\n",
    )]);
    let found = messages(&err, DiagnosticKind::Schema);
    assert_eq!(found.len(), 1, "{:?}", found);
    assert!(found[0].contains("'a'") && found[0].contains("'b'"), "{}", found[0]);
    assert!(found[0].contains("dup.proto:4"), "{}", found[0]);
}

#[test]
fn missing_import_is_reported_then_fixed_by_importing() {
    let dep = ("dep.proto", "syntax = \"proto3\";\npackage dep;\nmessage Thing {}");
    let err = link_err(&[
        ("main.proto", "syntax = \"proto3\";\npackage main;\nmessage M { dep.Thing t = 1; }"),
        dep,
    ]);
    let found = messages(&err, DiagnosticKind::Linkage);
    assert_eq!(found.len(), 1);
    assert!(found[0].contains("dep.proto"), "{}", found[0]);

    let schema = link_sources(&[
        (
            "main.proto",
            "syntax = \"proto3\";\npackage main;\nimport \"dep.proto\";\nmessage M { dep.Thing t = 1; }",
        ),
        dep,
    ])
    .expect("link after import");
    assert!(schema.message("main.M").is_some());
}

#[test]
fn unresolved_type_is_a_linkage_error() {
    let err = link_err(&[("u.proto", "syntax = \"proto3\";\nmessage M { Missing x = 1; }")]);
    assert!(messages(&err, DiagnosticKind::Linkage)[0].contains("Missing"));
}

#[test]
fn import_of_absent_file_is_reported() {
    let err = link_err(&[("a.proto", "syntax = \"proto3\";\n\nimport public \"nowhere.proto\";")]);
    let missing = err.of_kind(DiagnosticKind::Linkage).next().expect("linkage diagnostic");
    assert!(missing.message.contains("nowhere.proto"));
    assert_eq!(missing.location.to_string(), "a.proto:3:15");
}

#[test]
fn every_problem_is_reported_at_once() {
    let err = link_err(&[(
        "many.proto",
        r#"
syntax = "proto3";
message M {
  required int32 a = 1;
  int32 b = 19500;
  Nope c = 3;
  int32 d = 4 [default = 5];
}
"#,
    )]);
    assert_eq!(err.of_kind(DiagnosticKind::Schema).count(), 3, "{}", err);
    assert_eq!(err.of_kind(DiagnosticKind::Linkage).count(), 1, "{}", err);
}

#[test]
fn duplicate_type_names_are_rejected() {
    let err = link_err(&[
        ("a.proto", "syntax = \"proto3\";\npackage p;\nmessage M {}"),
        ("b.proto", "syntax = \"proto3\";\npackage p;\nmessage M {}"),
    ]);
    assert!(err.diagnostics.iter().any(|d| d.message.contains("already defined")), "{}", err);
}

#[test]
fn field_number_limits() {
    let err = link_err(&[("r.proto", "syntax = \"proto3\";\nmessage M { int32 a = 0; int32 b = 536870912; }")]);
    assert_eq!(err.of_kind(DiagnosticKind::Schema).count(), 2, "{}", err);
    assert!(link_sources(&[("ok.proto", "syntax = \"proto3\";\nmessage M { int32 a = 536870911; }")]).is_ok());
}

#[test]
fn reserved_numbers_and_names_are_enforced() {
    let err = link_err(&[(
        "r.proto",
        r#"
syntax = "proto3";
message M {
  reserved 2, 9 to 11;
  reserved "old";
  int32 a = 10;
  int32 old = 1;
}
"#,
    )]);
    let found = messages(&err, DiagnosticKind::Schema);
    assert_eq!(found.len(), 2, "{:?}", found);
    assert!(found.iter().any(|m| m.contains("reserved field number 10")));
    assert!(found.iter().any(|m| m.contains("'old' is reserved")));
}

#[test]
fn proto3_enum_must_start_at_zero() {
    let err = link_err(&[("e.proto", "syntax = \"proto3\";\nenum E { ONE = 1; }")]);
    assert!(messages(&err, DiagnosticKind::Schema)[0].contains("zero"));
}

#[test]
fn enum_aliases_need_allow_alias() {
    let aliased = "syntax = \"proto3\";\nenum E {\n  A = 0;\n  B = 0;\n}";
    assert!(link_sources(&[("e.proto", aliased)]).is_err());
    let allowed = "syntax = \"proto3\";\nenum E {\n  option allow_alias = true;\n  A = 0;\n  B = 0;\n}";
    let schema = link_sources(&[("e.proto", allowed)]).expect("link");
    let e = schema.enum_type("E").expect("E");
    assert!(e.allow_alias);
    assert_eq!(e.constant_for(0).map(|c| c.name.as_str()), Some("A"));
}

#[test]
fn map_keys_must_be_integral_or_string() {
    let err = link_err(&[("m.proto", "syntax = \"proto3\";\nmessage M { map<double, int32> m = 1; }")]);
    assert!(messages(&err, DiagnosticKind::Schema)[0].contains("map key"));
}

#[test]
fn packed_requires_packable_repeated_field() {
    let err = link_err(&[("p.proto", "syntax = \"proto3\";\nmessage M { repeated string s = 1 [packed = true]; }")]);
    assert!(messages(&err, DiagnosticKind::Schema)[0].contains("packed"));
}

#[test]
fn rpc_types_must_be_messages() {
    let err = link_err(&[(
        "s.proto",
        "syntax = \"proto3\";\nenum E { Z = 0; }\nmessage M {}\nservice S { rpc Call (E) returns (M); }",
    )]);
    assert!(messages(&err, DiagnosticKind::Schema).iter().any(|m| m.contains("request")), "{}", err);
}

#[test]
fn services_link_with_streaming_flags() {
    let schema = link_sources(&[(
        "s.proto",
        "syntax = \"proto3\";\npackage s;\nmessage Req {}\nmessage Resp {}\nservice Api {\n  rpc Call (Req) returns (stream Resp);\n}",
    )])
    .expect("link");
    let service = schema.service("s.Api").expect("service");
    let rpc = &service.rpcs[0];
    assert_eq!((rpc.request_type.as_str(), rpc.response_type.as_str()), ("s.Req", "s.Resp"));
    assert!(!rpc.request_streaming && rpc.response_streaming);
}

// ==================== Proto2 defaults and extensions ====================

#[test]
fn proto2_defaults_are_typed() {
    let schema = link_sources(&[(
        "d.proto",
        r#"
syntax = "proto2";
package d;
enum Mode { FAST = 1; SLOW = 2; }
message M {
  optional int32 retries = 1 [default = -3];
  optional string name = 2 [default = "anon"];
  optional Mode mode = 3 [default = SLOW];
  optional double ratio = 4 [default = inf];
  optional bool on = 5 [default = true];
}
"#,
    )])
    .expect("link");
    let m = schema.message("d.M").expect("M");
    let defaults: Vec<Option<Value>> = m.fields.iter().map(|f| f.default.clone()).collect();
    assert_eq!(
        defaults,
        vec![
            Some(Value::I32(-3)),
            Some(Value::from("anon")),
            Some(Value::Enum(2)),
            Some(Value::F64(f64::INFINITY)),
            Some(Value::Bool(true)),
        ]
    );
}

#[test]
fn bytes_defaults_keep_raw_escaped_bytes() {
    let schema = link_sources(&[(
        "b.proto",
        r#"
syntax = "proto2";
message M {
  optional bytes raw = 1 [default = "\xff\x00\377a"];
  optional string text = 2 [default = "caf\u00e9"];
}
"#,
    )])
    .expect("link");
    let m = schema.message("M").expect("M");
    assert_eq!(m.fields[0].default, Some(Value::Bytes(vec![0xff, 0x00, 0xff, b'a'])));
    assert_eq!(m.fields[1].default, Some(Value::from("caf\u{e9}")));

    let err = link_err(&[(
        "s.proto",
        "syntax = \"proto2\";\nmessage M { optional string s = 1 [default = \"\\xff\"]; }",
    )]);
    assert!(messages(&err, DiagnosticKind::Option)[0].contains("UTF-8"), "{:?}", err);
}

#[test]
fn default_of_wrong_type_is_an_option_error() {
    let err = link_err(&[(
        "d.proto",
        "syntax = \"proto2\";\nmessage M { optional int32 x = 1 [default = \"seven\"]; }",
    )]);
    assert!(messages(&err, DiagnosticKind::Option)[0].contains("default value of 'x'"));
}

#[test]
fn proto3_rejects_explicit_defaults() {
    let err = link_err(&[("d.proto", "syntax = \"proto3\";\nmessage M { int32 x = 1 [default = 1]; }")]);
    assert!(messages(&err, DiagnosticKind::Schema)[0].contains("default"));
}

#[test]
fn extensions_attach_to_their_extendee() {
    let schema = link_sources(&[
        (
            "base.proto",
            "syntax = \"proto2\";\npackage base;\nmessage Base {\n  optional int32 id = 1;\n  extensions 100 to 199;\n}",
        ),
        (
            "ext.proto",
            "syntax = \"proto2\";\npackage ext;\nimport \"base.proto\";\nextend base.Base {\n  optional string note = 100;\n}",
        ),
    ])
    .expect("link");
    let base = schema.message("base.Base").expect("Base");
    assert_eq!(base.extensions.len(), 1);
    let note = schema.extension("ext.note").expect("extension");
    assert_eq!(note.extendee.as_deref(), Some("base.Base"));
    assert_eq!(base.field(100).map(|f| f.name.as_str()), Some("note"));
}

#[test]
fn extension_outside_range_is_rejected() {
    let err = link_err(&[(
        "x.proto",
        "syntax = \"proto2\";\nmessage Base {\n  extensions 100 to 199;\n}\nextend Base {\n  optional int32 far = 300;\n}",
    )]);
    assert!(messages(&err, DiagnosticKind::Schema)[0].contains("extension range"));
}

#[test]
fn field_inside_extension_range_is_rejected() {
    let err = link_err(&[(
        "x.proto",
        "syntax = \"proto2\";\nmessage Base {\n  extensions 100 to 199;\n  optional int32 clash = 150;\n}",
    )]);
    assert!(messages(&err, DiagnosticKind::Schema)[0].contains("overlaps extension range"));
}

#[test]
fn extensions_from_different_files_cannot_share_a_number() {
    let err = link_err(&[
        (
            "base.proto",
            "syntax = \"proto2\";\npackage base;\nmessage Base {\n  extensions 100 to 199;\n}",
        ),
        (
            "a.proto",
            "syntax = \"proto2\";\npackage a;\nimport \"base.proto\";\nextend base.Base { optional int32 x = 100; }",
        ),
        (
            "b.proto",
            "syntax = \"proto2\";\npackage b;\nimport \"base.proto\";\nextend base.Base { optional string y = 100; }",
        ),
    ]);
    let found = messages(&err, DiagnosticKind::Schema);
    assert_eq!(found.len(), 1, "{:?}", found);
    assert!(
        found[0].contains("extension b.y uses field number 100 of base.Base, already used by a.x"),
        "{}",
        found[0]
    );
}

#[test]
fn extension_cannot_reuse_a_declared_field_number() {
    let err = link_err(&[(
        "x.proto",
        "syntax = \"proto2\";\nmessage Base {\n  extensions 100 to 199;\n  optional int32 clash = 150;\n}\nextend Base {\n  optional int32 again = 150;\n}",
    )]);
    let found = messages(&err, DiagnosticKind::Schema);
    assert!(found.iter().any(|m| m.contains("overlaps extension range")), "{:?}", found);
    assert!(
        found.iter().any(|m| m.contains("extension again uses field number 150 of Base, already used by Base.clash")),
        "{:?}",
        found
    );
}

// ==================== Options ====================

const CUSTOM_OPTIONS: &str = r#"
syntax = "proto3";
package acme;
import "google/protobuf/descriptor.proto";

message Rules {
  int32 max_len = 1;
  repeated string tags = 2;
}

extend google.protobuf.FieldOptions {
  Rules rules = 51000;
  bool redacted = 51001;
}

extend google.protobuf.MessageOptions {
  string table = 51002;
}
"#;

#[test]
fn builtin_options_are_typed() {
    let schema = link_sources(&[(
        "o.proto",
        r#"
syntax = "proto3";
package o;
option java_package = "com.o";
option optimize_for = CODE_SIZE;
message M {
  option deprecated = true;
  int32 old = 1 [deprecated = true];
}
"#,
    )])
    .expect("link");
    let file = schema.file("o.proto").expect("file");
    assert_eq!(file.options[0].value, Value::from("com.o"));
    assert_eq!(file.options[1].value, Value::Enum(2));
    let m = schema.message("o.M").expect("M");
    assert_eq!(m.options[0].path, vec!["google.protobuf.MessageOptions.deprecated"]);
    assert!(m.fields[0].deprecated);
}

#[test]
fn custom_options_resolve_through_extensions() {
    let schema = link_sources(&[
        ("acme.proto", CUSTOM_OPTIONS),
        (
            "user.proto",
            r#"
syntax = "proto3";
package user;
import "acme.proto";
message Account {
  option (acme.table) = "accounts";
  string login = 1 [(acme.rules).max_len = 32];
  string password = 2 [(acme.redacted) = true, (acme.rules) = { max_len: 64 tags: "a" tags: "b" }];
}
"#,
        ),
    ])
    .expect("link");
    let account = schema.message("user.Account").expect("Account");
    assert_eq!(account.options[0].value, Value::from("accounts"));

    let login = &account.fields[0];
    assert_eq!(login.options[0].path, vec!["acme.rules", "acme.Rules.max_len"]);
    assert_eq!(login.options[0].value, Value::I32(32));
    assert!(!login.redacted);

    let password = &account.fields[1];
    assert!(password.redacted);
    let rules = password.options[1].value.as_message().expect("aggregate");
    assert_eq!(rules.get(1), Some(&Value::I32(64)));
    assert_eq!(rules.get(2), Some(&Value::List(vec![Value::from("a"), Value::from("b")])));
}

#[test]
fn unknown_option_is_an_error_unless_allowed() {
    let src = "syntax = \"proto3\";\nmessage M { int32 x = 1 [no_such_option = true]; }";
    let err = link_err(&[("o.proto", src)]);
    assert!(messages(&err, DiagnosticKind::Option)[0].contains("no_such_option"));

    let config = CompileConfig {
        allow_unknown_options: true,
        ..CompileConfig::default()
    };
    let schema = link_sources_with(&[("o.proto", src)], &config).expect("unknown option skipped");
    assert!(schema.message("M").is_some_and(|m| m.fields[0].options.is_empty()));
}

#[test]
fn option_value_of_wrong_type_is_an_error() {
    let err = link_err(&[
        ("acme.proto", CUSTOM_OPTIONS),
        (
            "bad.proto",
            "syntax = \"proto3\";\nimport \"acme.proto\";\nmessage M { string s = 1 [(acme.redacted) = 3]; }",
        ),
    ]);
    assert_eq!(err.of_kind(DiagnosticKind::Option).count(), 1, "{}", err);
}

#[test]
fn option_extension_must_extend_the_right_options_message() {
    let err = link_err(&[
        ("acme.proto", CUSTOM_OPTIONS),
        (
            "bad.proto",
            "syntax = \"proto3\";\nimport \"acme.proto\";\nmessage M {\n  option (acme.redacted) = true;\n}",
        ),
    ]);
    assert!(messages(&err, DiagnosticKind::Option)[0].contains("extends"));
}

// ==================== Well-known types ====================

#[test]
fn well_known_types_are_builtin() {
    let schema = link_sources(&[(
        "t.proto",
        r#"
syntax = "proto3";
package t;
import "google/protobuf/timestamp.proto";
import "google/protobuf/any.proto";
message Event {
  google.protobuf.Timestamp at = 1;
  google.protobuf.Any payload = 2;
}
"#,
    )])
    .expect("link");
    let event = schema.message("t.Event").expect("Event");
    assert_eq!(event.fields[0].kind, FieldKind::Message("google.protobuf.Timestamp".into()));
    assert!(matches!(schema.get("google.protobuf.Any"), Some(Type::Message(_))));
}

// ==================== Loading from disk ====================

#[test]
fn compile_follows_imports_across_source_roots() {
    let first = tempfile::tempdir().expect("tempdir");
    let second = tempfile::tempdir().expect("tempdir");
    fs::create_dir_all(first.path().join("app")).expect("mkdir");
    fs::write(
        first.path().join("app/main.proto"),
        "syntax = \"proto3\";\npackage app;\nimport \"lib/common.proto\";\nmessage Main { lib.Common c = 1; }\n",
    )
    .expect("write");
    fs::create_dir_all(second.path().join("lib")).expect("mkdir");
    fs::write(
        second.path().join("lib/common.proto"),
        "syntax = \"proto3\";\npackage lib;\nmessage Common { string id = 1; }\n",
    )
    .expect("write");

    let config = CompileConfig::default()
        .with_source_root(first.path())
        .with_source_root(second.path());
    let schema = compile(&config, &["app/main.proto"]).expect("compile");
    assert!(schema.message("lib.Common").is_some());
    assert!(schema.file("lib/common.proto").is_some());
}

#[test]
fn compile_reports_missing_and_broken_files_together() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(
        dir.path().join("a.proto"),
        "syntax = \"proto3\";\nimport \"gone.proto\";\nimport \"b.proto\";\n",
    )
    .expect("write");
    fs::write(dir.path().join("b.proto"), "syntax = \"proto3\";\nmessage {\n").expect("write");

    let config = CompileConfig::default().with_source_root(dir.path());
    let err = compile(&config, &["a.proto"]).expect_err("compile fails");
    assert_eq!(err.of_kind(DiagnosticKind::Linkage).count(), 1, "{}", err);
    assert_eq!(err.of_kind(DiagnosticKind::Syntax).count(), 1, "{}", err);
    let missing = err.of_kind(DiagnosticKind::Linkage).next().expect("missing import");
    assert_eq!(missing.location.to_string(), "a.proto:2:8");
    assert!(missing.message.contains("gone.proto"));
}
