//! Decoder fuzz target: arbitrary bytes against a recursive schema with maps,
//! oneofs and packed fields. Decoding may fail but must not panic, and anything
//! that decodes must re-encode to bytes of the reported size.
//! Build with: cargo fuzz run decode_fuzz (requires nightly and cargo fuzz).

#![cfg_attr(fuzzing, no_main)]

#[cfg(fuzzing)]
use libfuzzer_sys::fuzz_target;

#[cfg(fuzzing)]
const SCHEMA: &str = r#"
syntax = "proto3";
package fuzz;
message Node {
  string name = 1;
  repeated sint64 values = 2;
  map<int32, Node> children = 3;
  oneof pick {
    bytes raw = 4;
    Node next = 5;
  }
  fixed64 stamp = 6;
  float ratio = 7;
}
"#;

#[cfg(fuzzing)]
fuzz_target!(|data: &[u8]| {
    let Ok(schema) = protolink::link_sources(&[("fuzz.proto", SCHEMA)]) else {
        return;
    };
    let registry = protolink::Registry::new(std::sync::Arc::new(schema));
    let Ok(node) = registry.adapter("fuzz.Node") else {
        return;
    };
    if let Ok(value) = node.decode(data) {
        if let Ok(bytes) = node.encode(&value) {
            assert_eq!(node.size(&value).ok(), Some(bytes.len()));
        }
    }
});

#[cfg(not(fuzzing))]
fn main() {
    eprintln!("Build with: cargo fuzz run decode_fuzz");
}
