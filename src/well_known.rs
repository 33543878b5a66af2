//! Built-in schema files, linked into every compile without touching disk.
//!
//! `google/protobuf/descriptor.proto` is a reduced descriptor carrying only the
//! `*Options` messages, which is what option names resolve against. The rest
//! are the common well-known types.

use crate::ast::ProtoFile;
use crate::lexer::SyntaxError;
use crate::parser;

pub const DESCRIPTOR_PATH: &str = "google/protobuf/descriptor.proto";

const DESCRIPTOR: &str = r#"
syntax = "proto2";
package google.protobuf;

message FileOptions {
  optional string java_package = 1;
  optional string java_outer_classname = 8;
  optional bool java_multiple_files = 10 [default = false];
  optional bool java_generate_equals_and_hash = 20 [deprecated = true];
  optional bool java_string_check_utf8 = 27 [default = false];
  enum OptimizeMode {
    SPEED = 1;
    CODE_SIZE = 2;
    LITE_RUNTIME = 3;
  }
  optional OptimizeMode optimize_for = 9 [default = SPEED];
  optional string go_package = 11;
  optional bool cc_generic_services = 16 [default = false];
  optional bool java_generic_services = 17 [default = false];
  optional bool py_generic_services = 18 [default = false];
  optional bool deprecated = 23 [default = false];
  optional bool cc_enable_arenas = 31 [default = true];
  optional string objc_class_prefix = 36;
  optional string csharp_namespace = 37;
  optional string swift_prefix = 39;
  optional string php_namespace = 41;
  optional string ruby_package = 45;
  extensions 1000 to max;
}

message MessageOptions {
  optional bool message_set_wire_format = 1 [default = false];
  optional bool no_standard_descriptor_accessor = 2 [default = false];
  optional bool deprecated = 3 [default = false];
  optional bool map_entry = 7;
  extensions 1000 to max;
}

message FieldOptions {
  enum CType {
    STRING = 0;
    CORD = 1;
    STRING_PIECE = 2;
  }
  optional CType ctype = 1 [default = STRING];
  optional bool packed = 2;
  enum JSType {
    JS_NORMAL = 0;
    JS_STRING = 1;
    JS_NUMBER = 2;
  }
  optional JSType jstype = 6 [default = JS_NORMAL];
  optional bool lazy = 5 [default = false];
  optional bool deprecated = 3 [default = false];
  optional bool weak = 10 [default = false];
  optional bool debug_redact = 16 [default = false];
  extensions 1000 to max;
}

message OneofOptions {
  extensions 1000 to max;
}

message EnumOptions {
  optional bool allow_alias = 2;
  optional bool deprecated = 3 [default = false];
  extensions 1000 to max;
}

message EnumValueOptions {
  optional bool deprecated = 1 [default = false];
  optional bool debug_redact = 3 [default = false];
  extensions 1000 to max;
}

message ServiceOptions {
  optional bool deprecated = 33 [default = false];
  extensions 1000 to max;
}

message MethodOptions {
  optional bool deprecated = 33 [default = false];
  enum IdempotencyLevel {
    IDEMPOTENCY_UNKNOWN = 0;
    NO_SIDE_EFFECTS = 1;
    IDEMPOTENT = 2;
  }
  optional IdempotencyLevel idempotency_level = 34 [default = IDEMPOTENCY_UNKNOWN];
  extensions 1000 to max;
}
"#;

const ANY: &str = r#"
syntax = "proto3";
package google.protobuf;

message Any {
  string type_url = 1;
  bytes value = 2;
}
"#;

const DURATION: &str = r#"
syntax = "proto3";
package google.protobuf;

message Duration {
  int64 seconds = 1;
  int32 nanos = 2;
}
"#;

const EMPTY: &str = r#"
syntax = "proto3";
package google.protobuf;

message Empty {}
"#;

const FIELD_MASK: &str = r#"
syntax = "proto3";
package google.protobuf;

message FieldMask {
  repeated string paths = 1;
}
"#;

const STRUCT: &str = r#"
syntax = "proto3";
package google.protobuf;

message Struct {
  map<string, Value> fields = 1;
}

message Value {
  oneof kind {
    NullValue null_value = 1;
    double number_value = 2;
    string string_value = 3;
    bool bool_value = 4;
    Struct struct_value = 5;
    ListValue list_value = 6;
  }
}

enum NullValue {
  NULL_VALUE = 0;
}

message ListValue {
  repeated Value values = 1;
}
"#;

const TIMESTAMP: &str = r#"
syntax = "proto3";
package google.protobuf;

message Timestamp {
  int64 seconds = 1;
  int32 nanos = 2;
}
"#;

const WRAPPERS: &str = r#"
syntax = "proto3";
package google.protobuf;

message DoubleValue { double value = 1; }
message FloatValue { float value = 1; }
message Int64Value { int64 value = 1; }
message UInt64Value { uint64 value = 1; }
message Int32Value { int32 value = 1; }
message UInt32Value { uint32 value = 1; }
message BoolValue { bool value = 1; }
message StringValue { string value = 1; }
message BytesValue { bytes value = 1; }
"#;

const FILES: &[(&str, &str)] = &[
    (DESCRIPTOR_PATH, DESCRIPTOR),
    ("google/protobuf/any.proto", ANY),
    ("google/protobuf/duration.proto", DURATION),
    ("google/protobuf/empty.proto", EMPTY),
    ("google/protobuf/field_mask.proto", FIELD_MASK),
    ("google/protobuf/struct.proto", STRUCT),
    ("google/protobuf/timestamp.proto", TIMESTAMP),
    ("google/protobuf/wrappers.proto", WRAPPERS),
];

pub fn is_builtin(path: &str) -> bool {
    FILES.iter().any(|(p, _)| *p == path)
}

pub fn source(path: &str) -> Option<&'static str> {
    FILES.iter().find(|(p, _)| *p == path).map(|(_, s)| *s)
}

pub fn paths() -> impl Iterator<Item = &'static str> {
    FILES.iter().map(|(p, _)| *p)
}

/// Parse every built-in file whose path is not already in `present`.
pub fn missing_from<'a>(present: impl IntoIterator<Item = &'a str>) -> Result<Vec<ProtoFile>, SyntaxError> {
    let present: Vec<&str> = present.into_iter().collect();
    FILES
        .iter()
        .filter(|(p, _)| !present.contains(p))
        .map(|(p, s)| parser::parse(p, s))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_builtin_parses() {
        let files = missing_from(std::iter::empty()).expect("builtins parse");
        assert_eq!(files.len(), FILES.len());
        assert!(files.iter().all(|f| f.package.as_deref() == Some("google.protobuf")));
    }

    #[test]
    fn present_files_are_skipped() {
        let files = missing_from([DESCRIPTOR_PATH]).expect("builtins parse");
        assert!(files.iter().all(|f| f.path != DESCRIPTOR_PATH));
        assert!(is_builtin("google/protobuf/timestamp.proto"));
        assert!(source("google/protobuf/any.proto").is_some_and(|s| s.contains("type_url")));
        assert!(!is_builtin("foo.proto"));
    }
}
