#![allow(non_snake_case)]

use super::*;
use liveconnect_core::ObjectId;
use test_case::test_case;

#[test_case("Z", JniType::Boolean)]
#[test_case("J", JniType::Long)]
#[test_case("Ljava/lang/String;", JniType::Object("java/lang/String".into()))]
#[test_case("[I", JniType::Array(Box::new(JniType::Int)))]
#[test_case("[[Ljava/lang/Object;", JniType::Array(Box::new(JniType::Array(Box::new(JniType::Object("java/lang/Object".into()))))))]
fn JniType___parse___valid_descriptor(descriptor: &str, expected: JniType) {
    let ty = JniType::parse(descriptor).unwrap();

    assert_eq!(ty, expected);
    assert_eq!(ty.descriptor(), descriptor);
}

#[test_case("" ; "empty")]
#[test_case("Q" ; "unknown character")]
#[test_case("Ljava/lang/String" ; "unterminated class")]
#[test_case("L;" ; "empty class")]
#[test_case("[V" ; "void array")]
#[test_case("II" ; "leftover")]
#[test_case("Lfoo bar;" ; "space in class")]
#[test_case("Lfoo\tbar;" ; "tab in class")]
#[test_case("Lfoo\u{1}bar;" ; "control in class")]
fn JniType___parse___invalid_descriptor(descriptor: &str) {
    assert!(matches!(
        JniType::parse(descriptor),
        Err(CodecError::InvalidSignature { .. })
    ));
}

#[test_case("I", "int")]
#[test_case("Ljava/lang/String;", "java.lang.String")]
#[test_case("[D", "double[]")]
fn JniType___java_name___dotted_form(descriptor: &str, expected: &str) {
    assert_eq!(JniType::parse(descriptor).unwrap().java_name(), expected);
}

#[test]
fn MethodSignature___parse___mixed_arguments() {
    let sig = MethodSignature::parse("(ILjava/lang/String;[I)V").unwrap();

    assert_eq!(
        sig.args,
        vec![
            JniType::Int,
            JniType::Object("java/lang/String".into()),
            JniType::Array(Box::new(JniType::Int)),
        ]
    );
    assert_eq!(sig.ret, JniType::Void);
    assert_eq!(sig.descriptor(), "(ILjava/lang/String;[I)V");
}

#[test]
fn MethodSignature___parse___no_arguments() {
    let sig = MethodSignature::parse("()Ljava/lang/Object;").unwrap();

    assert!(sig.args.is_empty());
    assert!(sig.ret.is_reference());
}

#[test_case("I)V" ; "missing open paren")]
#[test_case("(I" ; "unterminated list")]
#[test_case("(V)V" ; "void argument")]
#[test_case("(I)" ; "missing return")]
#[test_case("(I)VV" ; "leftover")]
#[test_case("(Lfoo bar;)V" ; "space in argument class")]
fn MethodSignature___parse___invalid(descriptor: &str) {
    assert!(MethodSignature::parse(descriptor).is_err());
}

#[test]
fn MethodSignature___encode_arguments___one_token_per_argument() {
    let sig = MethodSignature::parse("(ZCJLjava/lang/Object;)V").unwrap();

    let tokens = sig
        .encode_arguments(&[
            JValue::Boolean(true),
            JValue::Char(0x41),
            JValue::Long(-9),
            JValue::Object(ObjectId::new(12)),
        ])
        .unwrap();

    assert_eq!(tokens, vec!["true", "65_0", "-9", "12"]);
}

#[test]
fn encode_arguments___count_mismatch___error() {
    let err = encode_arguments(&[JniType::Int], &[]).unwrap_err();

    assert!(matches!(err, CodecError::ArgumentMismatch(_)));
}

#[test]
fn encode_arguments___type_mismatch___error() {
    let err = encode_arguments(&[JniType::Int], &[JValue::Long(1)]).unwrap_err();

    assert!(matches!(err, CodecError::ArgumentMismatch(_)));
}
