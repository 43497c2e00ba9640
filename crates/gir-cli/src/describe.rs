//! Text rendering of info objects

use gir_repository::{
    BaseInfo, Callable, CallbackInfo, ConstantInfo, EnumInfo, ErrorDomainInfo, FieldInfo,
    FunctionInfo, InfoError, InfoType, InterfaceInfo, ModuleRegistry, ObjectInfo, PropertyInfo,
    RegisteredType, StructInfo, TypeInfo, UnionInfo,
};
use gir_typelib::builder::ConstantValue;
use gir_typelib::{Direction, TypeTag};
use std::io::Write;

const INDENT: &str = "    ";

/// Print `info` and its members
pub fn describe(
    out: &mut dyn Write,
    info: &BaseInfo,
    registry: &dyn ModuleRegistry,
) -> anyhow::Result<()> {
    let kind = info.kind();
    match kind {
        InfoType::Unresolved => {
            writeln!(out, "unresolved {}", qualified(info)?)?;
        }
        InfoType::Function => {
            let function = FunctionInfo::try_from(info.clone())?;
            writeln!(
                out,
                "function {} [{}]",
                signature(&function, registry)?,
                function.symbol()?
            )?;
        }
        InfoType::Callback => {
            let callback = CallbackInfo::try_from(info.clone())?;
            writeln!(out, "callback {}", signature(&callback, registry)?)?;
        }
        InfoType::Constant => {
            let value = ConstantInfo::try_from(info.clone())?;
            writeln!(out, "constant {}", constant(&value, registry)?)?;
        }
        InfoType::ErrorDomain => {
            let domain = ErrorDomainInfo::try_from(info.clone())?;
            writeln!(out, "error domain {}", info.name()?)?;
            writeln!(out, "{INDENT}quark {}", domain.quark()?)?;
            writeln!(out, "{INDENT}codes {}", qualified(&domain.codes(registry)?)?)?;
        }
        InfoType::Struct | InfoType::Boxed => {
            let record = StructInfo::try_from(info.clone())?;
            writeln!(out, "{} {}", kind, info.name()?)?;
            registration(out, &record)?;
            for field in record.fields()? {
                writeln!(out, "{INDENT}{}", field_line(&field, registry)?)?;
            }
            methods(out, record.methods()?, registry)?;
        }
        InfoType::Union => {
            let union_info = UnionInfo::try_from(info.clone())?;
            writeln!(out, "union {}", info.name()?)?;
            registration(out, &union_info)?;
            if let (Some(offset), Some(ty)) =
                (union_info.discriminator_offset()?, union_info.discriminator_type()?)
            {
                writeln!(
                    out,
                    "{INDENT}discriminator {} @{}",
                    type_string(&ty, registry)?,
                    offset
                )?;
            }
            for field in union_info.fields()? {
                writeln!(out, "{INDENT}{}", field_line(&field, registry)?)?;
            }
            methods(out, union_info.methods()?, registry)?;
        }
        InfoType::Enum | InfoType::Flags => {
            let enumeration = EnumInfo::try_from(info.clone())?;
            writeln!(
                out,
                "{} {} ({})",
                kind,
                info.name()?,
                enumeration.storage_type()?
            )?;
            registration(out, &enumeration)?;
            for value in enumeration.values()? {
                writeln!(out, "{INDENT}value {} = {}", value.name()?, value.value()?)?;
            }
            methods(out, enumeration.methods()?, registry)?;
        }
        InfoType::Object => {
            let object = ObjectInfo::try_from(info.clone())?;
            let abstract_marker = if object.is_abstract()? { "abstract " } else { "" };
            writeln!(out, "{}object {}", abstract_marker, info.name()?)?;
            registration(out, &object)?;
            if let Some(parent) = object.parent(registry)? {
                writeln!(out, "{INDENT}parent {}", qualified(&parent)?)?;
            }
            let interfaces = (0..object.n_interfaces()?)
                .map(|n| object.interface(registry, n).and_then(|i| qualified(&i)))
                .collect::<Result<Vec<_>, _>>()?;
            if !interfaces.is_empty() {
                writeln!(out, "{INDENT}implements {}", interfaces.join(", "))?;
            }
            for field in object.fields()? {
                writeln!(out, "{INDENT}{}", field_line(&field, registry)?)?;
            }
            properties(out, object.properties()?, registry)?;
            methods(out, object.methods()?, registry)?;
            for signal in object.signals()? {
                writeln!(out, "{INDENT}signal {}", signature(&signal, registry)?)?;
            }
            for vfunc in object.vfuncs()? {
                writeln!(out, "{INDENT}vfunc {}", signature(&vfunc, registry)?)?;
            }
            for member in object.constants()? {
                writeln!(out, "{INDENT}constant {}", constant(&member, registry)?)?;
            }
        }
        InfoType::Interface => {
            let interface = InterfaceInfo::try_from(info.clone())?;
            writeln!(out, "interface {}", info.name()?)?;
            registration(out, &interface)?;
            let prerequisites = (0..interface.n_prerequisites()?)
                .map(|n| interface.prerequisite(registry, n).and_then(|i| qualified(&i)))
                .collect::<Result<Vec<_>, _>>()?;
            if !prerequisites.is_empty() {
                writeln!(out, "{INDENT}requires {}", prerequisites.join(", "))?;
            }
            properties(out, interface.properties()?, registry)?;
            methods(out, interface.methods()?, registry)?;
            for signal in interface.signals()? {
                writeln!(out, "{INDENT}signal {}", signature(&signal, registry)?)?;
            }
            for vfunc in interface.vfuncs()? {
                writeln!(out, "{INDENT}vfunc {}", signature(&vfunc, registry)?)?;
            }
            for member in interface.constants()? {
                writeln!(out, "{INDENT}constant {}", constant(&member, registry)?)?;
            }
        }
        other => {
            writeln!(out, "{} {}", other, info.name()?)?;
        }
    }
    Ok(())
}

fn qualified(info: &BaseInfo) -> Result<String, InfoError> {
    Ok(format!("{}.{}", info.namespace()?, info.name()?))
}

fn registration(out: &mut dyn Write, info: &dyn RegisteredType) -> anyhow::Result<()> {
    if let Some(type_name) = info.type_name()? {
        match info.type_init()? {
            Some(init) => writeln!(out, "{INDENT}type {} ({})", type_name, init)?,
            None => writeln!(out, "{INDENT}type {}", type_name)?,
        }
    }
    Ok(())
}

fn methods(
    out: &mut dyn Write,
    methods: Vec<FunctionInfo>,
    registry: &dyn ModuleRegistry,
) -> anyhow::Result<()> {
    for method in methods {
        let flags = method.flags()?;
        let kind = if flags.is_constructor {
            "constructor"
        } else if flags.is_method {
            "method"
        } else {
            "function"
        };
        writeln!(out, "{INDENT}{} {}", kind, signature(&method, registry)?)?;
    }
    Ok(())
}

fn properties(
    out: &mut dyn Write,
    properties: Vec<PropertyInfo>,
    registry: &dyn ModuleRegistry,
) -> anyhow::Result<()> {
    for property in properties {
        writeln!(
            out,
            "{INDENT}property {}: {}",
            property.name()?,
            type_string(&property.type_info()?, registry)?
        )?;
    }
    Ok(())
}

fn field_line(field: &FieldInfo, registry: &dyn ModuleRegistry) -> Result<String, InfoError> {
    let mut line = format!(
        "field {}: {} @{}",
        field.name()?,
        type_string(&field.type_info()?, registry)?,
        field.struct_offset()?
    );
    let bits = field.size()?;
    if bits > 0 {
        line.push_str(&format!(" ({} bits)", bits));
    }
    Ok(line)
}

fn constant(info: &ConstantInfo, registry: &dyn ModuleRegistry) -> Result<String, InfoError> {
    let value = match info.value()? {
        ConstantValue::Boolean(v) => v.to_string(),
        ConstantValue::Int8(v) => v.to_string(),
        ConstantValue::UInt8(v) => v.to_string(),
        ConstantValue::Int16(v) => v.to_string(),
        ConstantValue::UInt16(v) => v.to_string(),
        ConstantValue::Int32(v) => v.to_string(),
        ConstantValue::UInt32(v) => v.to_string(),
        ConstantValue::Int64(v) => v.to_string(),
        ConstantValue::UInt64(v) => v.to_string(),
        ConstantValue::Float(v) => v.to_string(),
        ConstantValue::Double(v) => v.to_string(),
        ConstantValue::Utf8(v) => format!("{:?}", v),
    };
    Ok(format!(
        "{}: {} = {}",
        info.name()?,
        type_string(&info.type_info()?, registry)?,
        value
    ))
}

/// `name(dir type arg, ...) -> type`, with a `throws` suffix
fn signature(callable: &impl Callable, registry: &dyn ModuleRegistry) -> Result<String, InfoError> {
    let args = callable
        .args()?
        .iter()
        .map(|arg| -> Result<String, InfoError> {
            let direction = match arg.direction()? {
                Direction::In => "in",
                Direction::Out => "out",
                Direction::InOut => "inout",
            };
            Ok(format!(
                "{} {} {}",
                direction,
                type_string(&arg.type_info()?, registry)?,
                arg.name()?
            ))
        })
        .collect::<Result<Vec<_>, _>>()?;
    let mut line = format!(
        "{}({}) -> {}",
        callable.as_base().name()?,
        args.join(", "),
        type_string(&callable.return_type()?, registry)?
    );
    if callable.can_throw()? {
        line.push_str(" throws");
    }
    Ok(line)
}

fn type_string(ty: &TypeInfo, registry: &dyn ModuleRegistry) -> Result<String, InfoError> {
    let tag = ty.tag()?;
    let mut text = match tag {
        TypeTag::Interface => match ty.interface(registry)? {
            Some(info) => qualified(&info)?,
            None => tag.name().to_string(),
        },
        TypeTag::Array | TypeTag::GList | TypeTag::GSList | TypeTag::GHash => {
            let mut params = Vec::new();
            for n in 0..ty.n_param_types()? {
                if let Some(param) = ty.param_type(n)? {
                    params.push(type_string(&param, registry)?);
                }
            }
            if tag == TypeTag::Array {
                format!("{}[]", params.join(", "))
            } else {
                format!("{}<{}>", tag, params.join(", "))
            }
        }
        TypeTag::Void if ty.is_pointer()? => return Ok("gpointer".to_string()),
        _ => tag.name().to_string(),
    };
    let implicit_pointer = matches!(tag, TypeTag::Utf8 | TypeTag::Filename | TypeTag::Error)
        || (!tag.is_basic() && tag != TypeTag::Interface);
    if ty.is_pointer()? && !implicit_pointer {
        text.push('*');
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gir_repository::EmptyRegistry;
    use gir_typelib::builder::*;
    use gir_typelib::Typelib;

    fn render(typelib: &Typelib, name: &str) -> String {
        let entry = typelib.find_entry(name).unwrap().unwrap();
        let info = gir_repository::resolve_entry(&EmptyRegistry, typelib, entry.index).unwrap();
        let mut out = Vec::new();
        describe(&mut out, &info, &EmptyRegistry).unwrap();
        String::from_utf8(out).unwrap()
    }

    fn typelib() -> Typelib {
        let bytes = TypelibBuilder::new("Demo", "1.0")
            .entry(EntryDef::Enum(EnumDef {
                name: "Color".into(),
                values: vec![ValueDef::new("red", 0), ValueDef::new("blue", -1)],
                methods: vec![FunctionDef::new(
                    "to_string",
                    "demo_color_to_string",
                    SignatureDef::new(TypeDef::basic(TypeTag::Utf8), vec![]),
                )],
                ..Default::default()
            }))
            .entry(InterfaceDef {
                name: "Drawable".into(),
                prerequisites: vec!["GObject.Object".into()],
                ..Default::default()
            })
            .entry(ObjectDef {
                name: "Shape".into(),
                is_abstract: true,
                interfaces: vec!["Drawable".into()],
                properties: vec![PropertyDef {
                    name: "color".into(),
                    ty: TypeDef::interface_value("Color"),
                    ..Default::default()
                }],
                methods: vec![FunctionDef::method(
                    "rename",
                    "demo_shape_rename",
                    SignatureDef::new(
                        TypeDef::basic(TypeTag::Boolean),
                        vec![ArgDef::new(
                            "name",
                            TypeDef::basic(TypeTag::Utf8),
                            Direction::In,
                        )],
                    ),
                )],
                constants: vec![ConstantDef::new(
                    "LABEL",
                    ConstantValue::Utf8("shape".into()),
                )],
                ..Default::default()
            })
            .entry(FunctionDef {
                flags: gir_typelib::FunctionFlags {
                    throws: true,
                    ..Default::default()
                },
                ..FunctionDef::new(
                    "load",
                    "demo_load",
                    SignatureDef::new(TypeDef::default(), vec![]),
                )
            })
            .build()
            .unwrap();
        Typelib::new(bytes).unwrap()
    }

    #[test]
    fn test_describe_enum() {
        let text = render(&typelib(), "Color");
        assert!(text.starts_with("enum Color"));
        assert!(text.contains("value red = 0"));
        assert!(text.contains("value blue = -1"));
        assert!(text.contains("function to_string() -> utf8"));
    }

    #[test]
    fn test_describe_object() {
        let text = render(&typelib(), "Shape");
        assert!(text.starts_with("abstract object Shape"));
        assert!(text.contains("implements Demo.Drawable"));
        assert!(text.contains("property color: Demo.Color"));
        assert!(text.contains("method rename(in utf8 name) -> gboolean"));
        assert!(text.contains("constant LABEL: utf8 = \"shape\""));
    }

    #[test]
    fn test_describe_interface_with_unresolved_prerequisite() {
        let text = render(&typelib(), "Drawable");
        assert!(text.starts_with("interface Drawable"));
        assert!(text.contains("requires GObject.Object"));
    }

    #[test]
    fn test_describe_throwing_function() {
        let text = render(&typelib(), "load");
        assert_eq!(text, "function load() -> void throws [demo_load]\n");
    }
}
