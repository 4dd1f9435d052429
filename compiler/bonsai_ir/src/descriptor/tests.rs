#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "test code uses unwrap for concise assertions"
)]

use pretty_assertions::assert_eq;

use super::*;
use crate::error::ReductionError;

// ── Primitive classification ──────────────────────────────────────

#[test]
fn primitive_names_round_trip() {
    for p in Primitive::ALL {
        assert_eq!(Primitive::from_name(p.name()), Some(p), "{p}");
    }
    assert_eq!(Primitive::from_name("Acme.Point"), None);
}

#[test]
fn primitive_classification() {
    assert!(Primitive::I32.is_integer());
    assert!(Primitive::I32.is_signed());
    assert!(!Primitive::U16.is_signed());
    assert!(Primitive::F64.is_float());
    assert!(Primitive::F64.is_numeric());
    assert!(!Primitive::Bool.is_numeric());
    assert!(Primitive::Char.is_value_type());
    assert!(!Primitive::String.is_value_type());
    assert!(!Primitive::Object.is_value_type());
}

// ── Type descriptors ──────────────────────────────────────────────

#[test]
fn type_descriptors_compare_structurally() {
    let a = TypeSlim::generic(
        TypeSlim::generic_definition("System.Collections.Generic.List`1", 1),
        vec![TypeSlim::int32()],
    );
    let b = TypeSlim::generic(
        TypeSlim::generic_definition("System.Collections.Generic.List`1", 1),
        vec![TypeSlim::int32()],
    );
    assert_eq!(a, b);
    assert!(!TypeSlim::ptr_eq(&a, &b));
    assert_eq!(a.to_string(), "System.Collections.Generic.List`1[System.Int32]");
}

#[test]
fn type_classification() {
    assert_eq!(TypeSlim::int32().is_value_type(), Some(true));
    assert_eq!(TypeSlim::string().is_value_type(), Some(false));
    assert_eq!(TypeSlim::simple("Acme.Point").is_value_type(), None);
    assert_eq!(TypeSlim::array(TypeSlim::int32()).is_value_type(), Some(false));

    let nullable = TypeSlim::nullable(TypeSlim::int32());
    assert!(nullable.is_nullable());
    assert_eq!(nullable.is_value_type(), Some(true));
    assert_eq!(nullable.nullable_underlying(), Some(&TypeSlim::int32()));

    assert!(TypeSlim::float64().is_numeric());
    assert!(!TypeSlim::bool().is_numeric());
    assert!(TypeSlim::array(TypeSlim::bool()).is_array());
    assert_eq!(
        TypeSlim::array(TypeSlim::bool()).element_type(),
        Some(&TypeSlim::bool())
    );
}

#[test]
fn array_rank_display() {
    assert_eq!(TypeSlim::array(TypeSlim::int32()).to_string(), "System.Int32[]");
    assert_eq!(
        TypeSlim::array_of_rank(TypeSlim::int32(), 3).to_string(),
        "System.Int32[,,]"
    );
}

#[test]
fn substitute_replaces_generic_parameters() {
    let t = TypeSlim::generic_parameter("T");
    let list_t = TypeSlim::generic(
        TypeSlim::generic_definition("System.Collections.Generic.List`1", 1),
        vec![t.clone()],
    );
    assert!(list_t.contains_generic_parameters());

    let names: Vec<std::sync::Arc<str>> = vec!["T".into()];
    let closed = list_t.substitute(&names, &[TypeSlim::string()]);
    assert!(!closed.contains_generic_parameters());
    assert_eq!(
        closed,
        TypeSlim::generic(
            TypeSlim::generic_definition("System.Collections.Generic.List`1", 1),
            vec![TypeSlim::string()],
        )
    );

    // Nothing to replace: same allocation back.
    let plain = TypeSlim::int32();
    assert!(TypeSlim::ptr_eq(&plain, &plain.substitute(&names, &[TypeSlim::string()])));
}

// ── Member descriptors ────────────────────────────────────────────

#[test]
fn generic_method_closes_signature() {
    let enumerable = TypeSlim::simple("System.Linq.Enumerable");
    let t = TypeSlim::generic_parameter("T");
    let open = MemberSlim::static_method(
        enumerable,
        "Repeat",
        vec![t.clone(), TypeSlim::int32()],
        TypeSlim::array(t),
    );
    let closed = open
        .make_generic_method(&["T"], vec![TypeSlim::string()])
        .unwrap();

    assert_eq!(closed.generic_arguments(), &[TypeSlim::string()]);
    assert_eq!(
        closed.parameter_types(),
        vec![TypeSlim::string(), TypeSlim::int32()]
    );
    assert_eq!(closed.member_type(), TypeSlim::array(TypeSlim::string()));
    assert_ne!(open, closed);

    assert!(open.make_generic_method(&["T", "U"], vec![TypeSlim::string()]).is_none());
}

#[test]
fn member_names_and_kinds() {
    let point = TypeSlim::simple("Acme.Point");
    let ctor = MemberSlim::constructor(point.clone(), vec![TypeSlim::int32(), TypeSlim::int32()]);
    assert_eq!(ctor.name(), ".ctor");
    assert!(ctor.is_constructor());
    assert_eq!(ctor.member_type(), point);

    let x = MemberSlim::field(point.clone(), "X", TypeSlim::int32());
    assert_eq!(x.display_name(), "Acme.Point::X");
    assert!(!x.is_static());

    let to_string = MemberSlim::method(point, "ToString", vec![], TypeSlim::string());
    assert!(!to_string.returns_void());
    assert_eq!(to_string.to_string(), "Acme.Point::ToString()");
}

// ── Boxed constants ───────────────────────────────────────────────

#[test]
fn reduce_integer_to_each_width() {
    let one = ObjectSlim::from(1);
    assert_eq!(
        one.reduce(&ReduceTarget::Primitive(Primitive::I32)).unwrap(),
        Literal::I32(1)
    );
    assert_eq!(
        one.reduce(&ReduceTarget::Primitive(Primitive::U8)).unwrap(),
        Literal::U8(1)
    );
    assert_eq!(
        one.reduce(&ReduceTarget::Primitive(Primitive::F64)).unwrap(),
        Literal::F64(1.0)
    );
    assert_eq!(
        one.reduce(&ReduceTarget::Primitive(Primitive::Object)).unwrap(),
        Literal::I32(1)
    );
}

#[test]
fn reduce_rejects_overflow() {
    let big = ObjectSlim::from(300);
    let err: ReductionError = big
        .reduce(&ReduceTarget::Primitive(Primitive::I8))
        .unwrap_err();
    assert_eq!(err.reason, "value out of range");
    assert_eq!(err.value, "300");
    assert_eq!(err.target, "System.SByte");
}

#[test]
fn reduce_null() {
    let null = ObjectSlim::null();
    assert_eq!(
        null.reduce(&ReduceTarget::Primitive(Primitive::String)).unwrap(),
        Literal::Null
    );
    assert_eq!(
        null.reduce(&ReduceTarget::Nullable(Primitive::I32)).unwrap(),
        Literal::Null
    );
    assert_eq!(null.reduce(&ReduceTarget::Reference).unwrap(), Literal::Null);
    assert!(null.reduce(&ReduceTarget::Primitive(Primitive::I32)).is_err());
}

#[test]
fn reduce_rejects_string_number_mismatch() {
    let s = ObjectSlim::from("42");
    assert!(s.reduce(&ReduceTarget::Primitive(Primitive::I32)).is_err());
    assert!(ObjectSlim::from(42)
        .reduce(&ReduceTarget::Primitive(Primitive::String))
        .is_err());
    assert!(ObjectSlim::from(1.5)
        .reduce(&ReduceTarget::Primitive(Primitive::I64))
        .is_err());
}

#[test]
fn reduce_array() {
    let raw = RawValue::Array(vec![RawValue::Int(1), RawValue::Int(2)].into());
    let value = ObjectSlim::new(raw);
    assert_eq!(
        value
            .reduce(&ReduceTarget::Array(Box::new(ReduceTarget::Primitive(Primitive::I16))))
            .unwrap(),
        Literal::Array(vec![Literal::I16(1), Literal::I16(2)])
    );
}

#[test]
fn literal_boxes_back_to_raw() {
    for literal in [
        Literal::Bool(true),
        Literal::I64(-7),
        Literal::U32(7),
        Literal::Str("hi".into()),
        Literal::Null,
    ] {
        let boxed = ObjectSlim::from_literal(&literal);
        let target = match &literal {
            Literal::Bool(_) => ReduceTarget::Primitive(Primitive::Bool),
            Literal::I64(_) => ReduceTarget::Primitive(Primitive::I64),
            Literal::U32(_) => ReduceTarget::Primitive(Primitive::U32),
            _ => ReduceTarget::Primitive(Primitive::String),
        };
        assert_eq!(boxed.reduce(&target).unwrap(), literal);
    }
}

#[test]
fn single_constants_hold_single_values() {
    let single = TypeSlim::primitive(Primitive::F32);
    let tenth = ObjectSlim::from(0.1_f64).fit_to(&single);
    assert_eq!(tenth, ObjectSlim::from(0.1_f32));

    // Reducing and boxing back reproduces the stored bits.
    let literal = tenth.reduce(&ReduceTarget::Primitive(Primitive::F32)).unwrap();
    assert_eq!(ObjectSlim::from_literal(&literal), tenth);

    let nullable = TypeSlim::nullable(single.clone());
    assert_eq!(ObjectSlim::from(0.1_f64).fit_to(&nullable), tenth);

    let vector = ObjectSlim::new(RawValue::Array(vec![RawValue::Float(0.1_f64.to_bits())].into()));
    assert_eq!(
        vector.fit_to(&TypeSlim::array(single)),
        ObjectSlim::new(RawValue::Array(vec![tenth.raw().clone()].into()))
    );

    let double = ObjectSlim::from(0.1_f64);
    assert_eq!(double.clone().fit_to(&TypeSlim::float64()), double);
}

#[cfg(feature = "serde")]
#[test]
fn descriptors_serialize() {
    let ty = TypeSlim::nullable(TypeSlim::int32());
    let bytes = bincode::serialize(&ty).unwrap();
    let back: TypeSlim = bincode::deserialize(&bytes).unwrap();
    assert_eq!(back, ty);

    let member = MemberSlim::field(TypeSlim::simple("Acme.Point"), "X", TypeSlim::int32());
    let bytes = bincode::serialize(&member).unwrap();
    let back: MemberSlim = bincode::deserialize(&bytes).unwrap();
    assert_eq!(back, member);

    let constant = ObjectSlim::from("text");
    let bytes = bincode::serialize(&constant).unwrap();
    let back: ObjectSlim = bincode::deserialize(&bytes).unwrap();
    assert_eq!(back, constant);
}
