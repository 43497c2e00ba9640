//! Integration tests for info navigation over built typelibs

use gir_repository::{
    BaseInfo, Callable, ConstantInfo, EmptyRegistry, EnumInfo, ErrorDomainInfo, FunctionInfo,
    InfoError, InfoType, InterfaceInfo, ObjectInfo, RegisteredType, Repository, StructInfo,
    UnionInfo,
};
use gir_typelib::builder::*;
use gir_typelib::blob::function;
use gir_typelib::{Direction, FunctionFlags, ReadError, Transfer, TypeTag, Typelib};

fn ann(key: &str, value: &str) -> (String, String) {
    (key.to_owned(), value.to_owned())
}

fn int(name: &str) -> ArgDef {
    ArgDef::new(name, TypeDef::basic(TypeTag::Int32), Direction::In)
}

fn demo_builder() -> TypelibBuilder {
    TypelibBuilder::new("Demo", "1.0")
        .shared_library("libdemo.so.0")
        .dependency("GObject-2.0")
        .entry(StructDef {
            name: "Point".into(),
            fields: vec![
                FieldDef::new("x", TypeDef::basic(TypeTag::Int32), 0),
                FieldDef {
                    bits: 3,
                    ..FieldDef::new("y", TypeDef::basic(TypeTag::Int32), 4)
                },
            ],
            methods: vec![FunctionDef::method(
                "length",
                "demo_point_length",
                SignatureDef::new(TypeDef::basic(TypeTag::Double), vec![]),
            )],
            annotations: vec![ann("a", "1"), ann("b", "2"), ann("c", "3")],
            ..Default::default()
        })
        .entry(EntryDef::Enum(EnumDef {
            name: "Color".into(),
            registration: Some(Registration::new("DemoColor", "demo_color_get_type")),
            values: vec![
                ValueDef::new("red", 0),
                ValueDef::new("green", 1),
                ValueDef::new("blue", -1),
            ],
            methods: vec![FunctionDef::new(
                "to_string",
                "demo_color_to_string",
                SignatureDef::new(TypeDef::basic(TypeTag::Utf8), vec![ArgDef::new(
                    "color",
                    TypeDef::interface_value("Color"),
                    Direction::In,
                )]),
            )],
            ..Default::default()
        }))
        .entry(UnionDef {
            name: "Value".into(),
            fields: vec![
                FieldDef::new("i", TypeDef::basic(TypeTag::Int32), 8),
                FieldDef::new("d", TypeDef::basic(TypeTag::Double), 8),
            ],
            discriminator: Some(DiscriminatorDef {
                offset: 0,
                ty: TypeDef::basic(TypeTag::Int32),
                values: vec![
                    ConstantDef::new("", ConstantValue::Int32(1)),
                    ConstantDef::new("", ConstantValue::Int32(2)),
                ],
            }),
            ..Default::default()
        })
        .entry(InterfaceDef {
            name: "Drawable".into(),
            prerequisites: vec!["GObject.Object".into()],
            methods: vec![FunctionDef::method(
                "draw",
                "demo_drawable_draw",
                SignatureDef::new(TypeDef::default(), vec![]),
            )],
            vfuncs: vec![VFuncDef {
                name: "draw".into(),
                struct_offset: 16,
                invoker: Some(0),
                ..Default::default()
            }],
            ..Default::default()
        })
        .entry(ObjectDef {
            name: "Shape".into(),
            registration: Some(Registration::new("DemoShape", "demo_shape_get_type")),
            parent: Some("GObject.Object".into()),
            is_abstract: true,
            interfaces: vec!["Drawable".into()],
            fields: vec![FieldDef::new("parent_instance", TypeDef::interface_value("GObject.Object"), 0)],
            properties: vec![PropertyDef {
                name: "color".into(),
                ty: TypeDef::interface_value("Color"),
                ..Default::default()
            }],
            methods: vec![
                FunctionDef {
                    flags: FunctionFlags {
                        is_method: true,
                        is_getter: true,
                        ..Default::default()
                    },
                    index: 0,
                    ..FunctionDef::method(
                        "get_color",
                        "demo_shape_get_color",
                        SignatureDef::new(TypeDef::interface_value("Color"), vec![]),
                    )
                },
                FunctionDef::method(
                    "move",
                    "demo_shape_move",
                    SignatureDef::new(TypeDef::default(), vec![int("dx"), int("dy")]),
                ),
                FunctionDef::method(
                    "move",
                    "demo_shape_move_again",
                    SignatureDef::new(TypeDef::default(), vec![]),
                ),
                FunctionDef::method(
                    "emit_changed",
                    "demo_shape_emit_changed",
                    SignatureDef::new(TypeDef::default(), vec![]),
                ),
            ],
            signals: vec![SignalDef {
                name: "changed".into(),
                class_closure: Some(0),
                true_stops_emit: true,
                signature: SignatureDef {
                    return_type: TypeDef::basic(TypeTag::Boolean),
                    args: vec![ArgDef {
                        transfer: Transfer::Everything,
                        ..ArgDef::new("detail", TypeDef::basic(TypeTag::Utf8), Direction::In)
                    }],
                    ..Default::default()
                },
                ..Default::default()
            }],
            vfuncs: vec![VFuncDef {
                name: "changed".into(),
                signal: Some(0),
                invoker: Some(3),
                struct_offset: 24,
                ..Default::default()
            }],
            constants: vec![ConstantDef::new("SIDES", ConstantValue::UInt8(4))],
            ..Default::default()
        })
        .entry(ConstantDef::new("ANSWER", ConstantValue::Int64(-42)))
        .entry(ConstantDef::new("GREETING", ConstantValue::Utf8("hello".into())))
        .entry(ErrorDomainDef {
            name: "ShapeError".into(),
            get_quark: "demo_shape_error_quark".into(),
            codes: "Color".into(),
            ..Default::default()
        })
}

fn demo() -> Typelib {
    Typelib::new(demo_builder().build().unwrap()).unwrap()
}

fn gobject() -> Typelib {
    let bytes = TypelibBuilder::new("GObject", "2.0")
        .entry(ObjectDef {
            name: "Object".into(),
            registration: Some(Registration::new("GObject", "g_object_get_type")),
            ..Default::default()
        })
        .build()
        .unwrap();
    Typelib::new(bytes).unwrap()
}

fn entry(typelib: &Typelib, name: &str) -> BaseInfo {
    let entry = typelib.find_entry(name).unwrap().unwrap();
    BaseInfo::new(
        InfoType::from_blob_type(entry.blob_type),
        None,
        typelib.clone(),
        entry.offset,
    )
}

#[test]
fn test_struct_member_offsets() {
    let tl = demo();
    let sizes = tl.header().sizes;
    let point = StructInfo::try_from(entry(&tl, "Point")).unwrap();
    let base = point.offset().unwrap() + u32::from(sizes.struct_blob);

    assert_eq!(point.n_fields().unwrap(), 2);
    assert_eq!(point.n_methods().unwrap(), 1);
    assert!(!point.is_boxed());

    let y = point.field(1).unwrap();
    assert_eq!(y.offset().unwrap(), base + u32::from(sizes.field));
    assert_eq!(y.name().unwrap(), "y");
    assert_eq!(y.size().unwrap(), 3);
    assert_eq!(y.struct_offset().unwrap(), 4);
    assert!(y.flags().unwrap().readable);

    let length = point.method(0).unwrap();
    assert_eq!(length.offset().unwrap(), base + 2 * u32::from(sizes.field));
    assert_eq!(length.symbol().unwrap(), "demo_point_length");
    assert_eq!(length.return_type().unwrap().tag().unwrap(), TypeTag::Double);

    assert!(matches!(
        point.field(2),
        Err(InfoError::Typelib(_))
    ));
}

#[test]
fn test_annotations_by_key() {
    let tl = demo();
    let point = entry(&tl, "Point");
    assert_eq!(point.annotation("a").unwrap(), Some("1"));
    assert_eq!(point.annotation("b").unwrap(), Some("2"));
    assert_eq!(point.annotation("c").unwrap(), Some("3"));
    assert_eq!(point.annotation("d").unwrap(), None);
    assert_eq!(point.annotations().unwrap().len(), 3);

    let color = entry(&tl, "Color");
    assert!(color.annotations().unwrap().is_empty());
}

#[test]
fn test_find_method_keeps_first_match() {
    let tl = demo();
    let shape = ObjectInfo::try_from(entry(&tl, "Shape")).unwrap();
    assert_eq!(shape.n_methods().unwrap(), 4);

    let first = shape.find_method("move").unwrap().unwrap();
    assert_eq!(first.symbol().unwrap(), "demo_shape_move");
    assert!(first.same_blob(&shape.method(1).unwrap()));
    assert!(shape.find_method("resize").unwrap().is_none());

    // Served from the cached index on the same handle
    let again = shape.find_method("emit_changed").unwrap().unwrap();
    assert_eq!(again.symbol().unwrap(), "demo_shape_emit_changed");
}

#[test]
fn test_callable_signature() {
    let tl = demo();
    let shape = ObjectInfo::try_from(entry(&tl, "Shape")).unwrap();
    let moved = shape.method(1).unwrap();
    assert!(moved.is_method().unwrap());
    assert!(!moved.can_throw().unwrap());
    assert_eq!(moved.n_args().unwrap(), 2);
    let args = moved.args().unwrap();
    assert_eq!(args[1].name().unwrap(), "dy");
    assert_eq!(args[1].direction().unwrap(), Direction::In);
    assert_eq!(args[1].type_info().unwrap().tag().unwrap(), TypeTag::Int32);
    assert!(moved.arg(2).is_err());

    let signal = shape.find_signal("changed").unwrap().unwrap();
    assert_eq!(signal.n_args().unwrap(), 1);
    let detail = signal.arg(0).unwrap();
    assert_eq!(detail.ownership_transfer().unwrap(), Transfer::Everything);
    assert!(detail.type_info().unwrap().is_pointer().unwrap());
    assert_eq!(signal.return_type().unwrap().tag().unwrap(), TypeTag::Boolean);
}

#[test]
fn test_signal_vfunc_cross_links() {
    let tl = demo();
    let shape = ObjectInfo::try_from(entry(&tl, "Shape")).unwrap();
    let signal = shape.signal(0).unwrap();
    assert!(signal.true_stops_emit().unwrap());

    let closure = signal.class_closure().unwrap().unwrap();
    assert_eq!(closure.name().unwrap(), "changed");
    assert_eq!(closure.struct_offset().unwrap(), 24);

    let back = closure.signal().unwrap().unwrap();
    assert!(back.same_blob(&signal));

    let invoker = closure.invoker().unwrap().unwrap();
    assert_eq!(invoker.symbol().unwrap(), "demo_shape_emit_changed");

    let vfunc = shape.find_vfunc("changed").unwrap().unwrap();
    assert!(vfunc.same_blob(&closure));
}

#[test]
fn test_getter_links_to_property() {
    let tl = demo();
    let shape = ObjectInfo::try_from(entry(&tl, "Shape")).unwrap();
    let getter = shape.find_method("get_color").unwrap().unwrap();
    assert!(getter.flags().unwrap().is_getter);

    let property = getter.property().unwrap().unwrap();
    assert_eq!(property.name().unwrap(), "color");
    let ty = property.type_info().unwrap();
    assert_eq!(ty.tag().unwrap(), TypeTag::Interface);
    assert!(!ty.is_pointer().unwrap());
    let color = ty.interface(&EmptyRegistry).unwrap().unwrap();
    assert_eq!(color.kind(), InfoType::Enum);
    assert_eq!(color.name().unwrap(), "Color");

    assert!(shape.method(1).unwrap().property().unwrap().is_none());
}

#[test]
fn test_object_parent_and_interfaces() {
    let tl = demo();
    let shape = ObjectInfo::try_from(entry(&tl, "Shape")).unwrap();
    assert!(shape.is_abstract().unwrap());
    assert_eq!(shape.type_name().unwrap(), Some("DemoShape"));
    assert_eq!(shape.type_init().unwrap(), Some("demo_shape_get_type"));

    let parent = shape.parent(&EmptyRegistry).unwrap().unwrap();
    assert_eq!(parent.kind(), InfoType::Unresolved);
    assert_eq!(parent.namespace().unwrap(), "GObject");
    assert_eq!(parent.name().unwrap(), "Object");

    assert_eq!(shape.n_interfaces().unwrap(), 1);
    let drawable = InterfaceInfo::try_from(shape.interface(&EmptyRegistry, 0).unwrap()).unwrap();
    assert_eq!(drawable.name().unwrap(), "Drawable");
    assert_eq!(drawable.n_prerequisites().unwrap(), 1);
    assert!(drawable.prerequisite(&EmptyRegistry, 0).unwrap().is_unresolved());

    let draw = drawable.find_method("draw").unwrap().unwrap();
    assert_eq!(draw.symbol().unwrap(), "demo_drawable_draw");
    let vfunc = drawable.find_vfunc("draw").unwrap().unwrap();
    assert!(vfunc.invoker().unwrap().unwrap().same_blob(&draw));
    assert!(drawable.find_signal("draw").unwrap().is_none());
}

#[test]
fn test_parent_resolves_through_repository() {
    let repo = Repository::new();
    repo.load_typelib(gobject()).unwrap();
    let tl = repo.load_typelib(demo()).unwrap();

    let shape = ObjectInfo::try_from(entry(&tl, "Shape")).unwrap();
    let parent = shape.parent(&repo).unwrap().unwrap();
    assert_eq!(parent.kind(), InfoType::Object);
    assert_eq!(parent.namespace().unwrap(), "GObject");
    let parent = ObjectInfo::try_from(parent).unwrap();
    assert_eq!(parent.type_name().unwrap(), Some("GObject"));
    assert!(parent.parent(&repo).unwrap().is_none());
}

#[test]
fn test_member_keeps_container_alive() {
    let tl = demo();
    let shape = ObjectInfo::try_from(entry(&tl, "Shape")).unwrap();
    let method = shape.method(0).unwrap();
    assert_eq!(shape.ref_count(), 2);
    assert!(method.container().unwrap().same_blob(&shape));

    let arg_holder: FunctionInfo = shape.method(1).unwrap();
    let arg = arg_holder.arg(0).unwrap();
    drop(arg_holder);
    assert_eq!(arg.container().unwrap().kind(), InfoType::Function);
    assert_eq!(arg.name().unwrap(), "dx");

    drop(method);
    drop(arg);
    assert_eq!(shape.ref_count(), 1);
}

#[test]
fn test_enum_values_and_methods() {
    let tl = demo();
    let color = EnumInfo::try_from(entry(&tl, "Color")).unwrap();
    assert!(!color.is_flags());
    assert_eq!(color.n_values().unwrap(), 3);
    let values: Vec<i64> = color
        .values()
        .unwrap()
        .iter()
        .map(|v| v.value().unwrap())
        .collect();
    assert_eq!(values, vec![0, 1, -1]);
    assert_eq!(color.value(2).unwrap().name().unwrap(), "blue");
    assert_eq!(color.storage_type().unwrap(), TypeTag::Int32);
    assert_eq!(color.type_name().unwrap(), Some("DemoColor"));

    let methods = color.methods().unwrap();
    assert_eq!(methods.len(), 1);
    assert_eq!(methods[0].name().unwrap(), "to_string");

    let to_string = color.find_method("to_string").unwrap().unwrap();
    assert!(!to_string.is_method().unwrap());
    assert_eq!(to_string.return_type().unwrap().tag().unwrap(), TypeTag::Utf8);
}

#[test]
fn test_union_discriminator() {
    let tl = demo();
    let value = UnionInfo::try_from(entry(&tl, "Value")).unwrap();
    assert!(value.is_discriminated().unwrap());
    assert_eq!(value.discriminator_offset().unwrap(), Some(0));
    assert_eq!(
        value.discriminator_type().unwrap().unwrap().tag().unwrap(),
        TypeTag::Int32
    );
    assert_eq!(value.n_fields().unwrap(), 2);
    assert_eq!(value.field(1).unwrap().name().unwrap(), "d");
    let second = value.discriminator(1).unwrap();
    assert_eq!(second.value().unwrap(), ConstantValue::Int32(2));
    assert!(value.discriminator(2).is_err());
}

#[test]
fn test_constants() {
    let tl = demo();
    let answer = ConstantInfo::try_from(entry(&tl, "ANSWER")).unwrap();
    assert_eq!(answer.type_info().unwrap().tag().unwrap(), TypeTag::Int64);
    assert_eq!(answer.value().unwrap(), ConstantValue::Int64(-42));
    assert_eq!(answer.value_bytes().unwrap(), &(-42i64).to_le_bytes());

    let greeting = ConstantInfo::try_from(entry(&tl, "GREETING")).unwrap();
    assert_eq!(greeting.value().unwrap(), ConstantValue::Utf8("hello".into()));

    let shape = ObjectInfo::try_from(entry(&tl, "Shape")).unwrap();
    let sides = shape.constant(0).unwrap();
    assert_eq!(sides.name().unwrap(), "SIDES");
    assert_eq!(sides.value().unwrap(), ConstantValue::UInt8(4));
}

#[test]
fn test_error_domain() {
    let tl = demo();
    let domain = ErrorDomainInfo::try_from(entry(&tl, "ShapeError")).unwrap();
    assert_eq!(domain.quark().unwrap(), "demo_shape_error_quark");
    let codes = domain.codes(&EmptyRegistry).unwrap();
    assert_eq!(codes.kind(), InfoType::Enum);
    assert_eq!(codes.name().unwrap(), "Color");
}

#[test]
fn test_wrong_kind_conversion() {
    let tl = demo();
    match StructInfo::try_from(entry(&tl, "Color")) {
        Err(InfoError::WrongKind { found, .. }) => assert_eq!(found, InfoType::Enum),
        other => panic!("Expected WrongKind, got {:?}", other),
    }
}

#[test]
fn test_corrupt_signature_offset_is_an_error() {
    let bytes = TypelibBuilder::new("Demo", "1.0")
        .entry(FunctionDef::new(
            "add",
            "demo_add",
            SignatureDef::new(TypeDef::basic(TypeTag::Int32), vec![int("a"), int("b")]),
        ))
        .build()
        .unwrap();
    let offset = Typelib::new(bytes.clone())
        .unwrap()
        .find_entry("add")
        .unwrap()
        .unwrap()
        .offset;

    let mut corrupt = bytes;
    let at = (offset + function::SIGNATURE) as usize;
    corrupt[at..at + 4].copy_from_slice(&0xFFFF_FFFEu32.to_le_bytes());
    let tl = Typelib::new(corrupt).unwrap();
    let add = FunctionInfo::try_from(entry(&tl, "add")).unwrap();

    assert!(matches!(
        add.n_args(),
        Err(InfoError::Read(ReadError::OffsetOverflow {
            base: 0xFFFF_FFFE,
            ..
        }))
    ));
    assert!(matches!(
        add.return_type(),
        Err(InfoError::Read(ReadError::OutOfBounds { .. }))
    ));
    assert!(add.arg(0).is_err());
    assert!(gir_typelib::verify_typelib(&tl).is_err());
}
