// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[test]
fn canonical_ref_formats_name_and_version() {
    let spec = Codespec::builder().name("echo").version(3).build();
    assert_eq!(spec.canonical_ref(), "echo/versions/3");
}

#[test]
fn validate_rejects_empty_name() {
    let spec = Codespec::builder().name("").build();
    assert!(matches!(spec.validate(), Err(TygerError::Validation(_))));
}

#[test]
fn validate_rejects_name_with_slash() {
    let spec = Codespec::builder().name("foo/bar").build();
    assert!(matches!(spec.validate(), Err(TygerError::Validation(_))));
}

#[test]
fn validate_rejects_empty_image() {
    let spec = Codespec::builder().name("ok").image("").build();
    assert!(matches!(spec.validate(), Err(TygerError::Validation(_))));
}

#[test]
fn validate_accepts_well_formed_spec() {
    let spec = Codespec::builder().name("ok").build();
    assert!(spec.validate().is_ok());
}

#[parameterized(
    duplicate_same_case = { "data", "data" },
    duplicate_cross_case = { "Data", "data" },
    duplicate_mixed_case = { "dAtA", "DATA" },
)]
fn validate_rejects_case_insensitive_duplicate_buffer_names(a: &str, b: &str) {
    let mut buffers = BufferParameters::default();
    buffers.inputs.insert(a.to_string());
    buffers.outputs.insert(b.to_string());
    let spec = Codespec::builder().name("ok").buffers(buffers).build();
    assert!(matches!(spec.validate(), Err(TygerError::Validation(_))));
}

#[test]
fn validate_rejects_buffer_name_with_slash() {
    let mut buffers = BufferParameters::default();
    buffers.inputs.insert("a/b".to_string());
    let spec = Codespec::builder().name("ok").buffers(buffers).build();
    assert!(matches!(spec.validate(), Err(TygerError::Validation(_))));
}

#[test]
fn validate_accepts_distinct_buffer_names_across_inputs_and_outputs() {
    let mut buffers = BufferParameters::default();
    buffers.inputs.insert("input".to_string());
    buffers.outputs.insert("output".to_string());
    let spec = Codespec::builder().name("ok").buffers(buffers).build();
    assert!(spec.validate().is_ok());
}

#[test]
fn content_equals_ignores_version_and_name() {
    let a = Codespec::builder().name("a").version(1).build();
    let b = Codespec::builder().name("b").version(7).build();
    assert!(a.content_equals(&b));
}

#[test]
fn content_equals_treats_empty_working_dir_as_absent() {
    let a = Codespec::builder().name("a").build();
    let b = Codespec::builder().name("a").working_dir("").build();
    assert!(a.content_equals(&b));
}

#[test]
fn content_equals_treats_empty_env_as_absent() {
    let a = Codespec::builder().name("a").build();
    let mut b = Codespec::builder().name("a").build();
    b.env = IndexMap::new();
    assert!(a.content_equals(&b));
}

#[test]
fn content_equals_detects_image_change() {
    let a = Codespec::builder().name("a").image("x:1").build();
    let b = Codespec::builder().name("a").image("x:2").build();
    assert!(!a.content_equals(&b));
}

#[test]
fn content_equals_detects_kind_change() {
    let a = Codespec::builder().name("a").kind(CodespecKind::Job).build();
    let b = Codespec::builder().name("a").kind(CodespecKind::Worker).build();
    assert!(!a.content_equals(&b));
}

#[test]
fn codespec_ref_parse_name_only() {
    let r = CodespecRef::parse("echo").unwrap();
    assert_eq!(r.name, "echo");
    assert_eq!(r.version, None);
}

#[test]
fn codespec_ref_parse_name_and_version() {
    let r = CodespecRef::parse("echo/versions/5").unwrap();
    assert_eq!(r.name, "echo");
    assert_eq!(r.version, Some(5));
}

#[parameterized(
    empty = { "" },
    trailing_slash = { "echo/" },
    bad_suffix = { "echo/versions/abc" },
    double_slash = { "echo/foo/versions/1" },
)]
fn codespec_ref_parse_rejects_malformed_input(input: &str) {
    assert!(CodespecRef::parse(input).is_err());
}

#[test]
fn codespec_kind_displays_lowercase() {
    assert_eq!(CodespecKind::Job.to_string(), "job");
    assert_eq!(CodespecKind::Worker.to_string(), "worker");
}
