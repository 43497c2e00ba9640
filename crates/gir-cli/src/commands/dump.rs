//! `gir-inspect dump`: header and directory of a typelib file.

use crate::describe;
use anyhow::Context;
use gir_repository::{resolve_entry, EmptyRegistry};
use gir_typelib::Typelib;
use std::io::Write;
use std::path::Path;

pub fn execute(file: &Path) -> anyhow::Result<()> {
    let typelib = Typelib::from_file(file)
        .with_context(|| format!("Failed to load {}", file.display()))?;
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    dump(&mut out, &typelib)
}

pub fn dump(out: &mut dyn Write, typelib: &Typelib) -> anyhow::Result<()> {
    let header = typelib.header();
    writeln!(out, "Namespace:      {}-{}", typelib.namespace(), typelib.nsversion())?;
    writeln!(
        out,
        "Format:         {}.{}",
        header.major_version, header.minor_version
    )?;
    writeln!(out, "Size:           {} bytes", header.size)?;
    if let Some(library) = typelib.shared_library()? {
        writeln!(out, "Shared library: {}", library)?;
    }
    let dependencies = typelib.dependencies()?;
    if !dependencies.is_empty() {
        writeln!(out, "Dependencies:   {}", dependencies.join(", "))?;
    }
    writeln!(
        out,
        "Entries:        {} ({} local)",
        typelib.n_entries(),
        typelib.n_local_entries()
    )?;
    writeln!(out)?;

    // Cross-module references are printed as such, never followed
    for index in 1..=typelib.n_entries() {
        let info = resolve_entry(&EmptyRegistry, typelib, index)?;
        write!(out, "[{:>3}] ", index)?;
        describe::describe(out, &info, &EmptyRegistry)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use gir_typelib::builder::*;
    use gir_typelib::TypeTag;

    #[test]
    fn test_dump_lists_every_entry() {
        let bytes = TypelibBuilder::new("Demo", "1.0")
            .shared_library("libdemo.so.0")
            .dependency("GObject-2.0")
            .entry(ObjectDef {
                name: "Shape".into(),
                parent: Some("GObject.Object".into()),
                ..Default::default()
            })
            .entry(ConstantDef::new("ANSWER", ConstantValue::Int32(42)))
            .entry(StructDef {
                name: "Point".into(),
                fields: vec![FieldDef::new("x", TypeDef::basic(TypeTag::Int32), 0)],
                ..Default::default()
            })
            .build()
            .unwrap();
        let typelib = Typelib::new(bytes).unwrap();

        let mut out = Vec::new();
        dump(&mut out, &typelib).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Namespace:      Demo-1.0"));
        assert!(text.contains("Shared library: libdemo.so.0"));
        assert!(text.contains("Dependencies:   GObject-2.0"));
        assert!(text.contains("Entries:        4 (3 local)"));
        assert!(text.contains("object Shape"));
        assert!(text.contains("constant ANSWER: gint32 = 42"));
        assert!(text.contains("unresolved GObject.Object"));
    }
}
