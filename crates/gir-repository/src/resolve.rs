//! Directory entry resolution
//!
//! A local entry becomes an info over the blob it points to. A non-local
//! entry is looked up by namespace and name through a [`ModuleRegistry`]
//! passed by the caller; when the registry has no such entity the result is
//! an unresolved reference carrying exactly that namespace and name.

use crate::info::{BaseInfo, InfoType};
use crate::InfoError;
use gir_typelib::{BlobType, Typelib, TypelibError};
use tracing::debug;

/// Lookup of entities in previously loaded namespaces
pub trait ModuleRegistry {
    /// Entity `name` of `namespace`, if that namespace is loaded and has it
    fn lookup(&self, namespace: &str, name: &str) -> Option<BaseInfo>;
}

/// Registry with no namespaces; every cross-module reference stays unresolved
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyRegistry;

impl ModuleRegistry for EmptyRegistry {
    fn lookup(&self, _namespace: &str, _name: &str) -> Option<BaseInfo> {
        None
    }
}

/// Info for directory entry `index` (1-based) of `typelib`
pub fn resolve_entry(
    registry: &dyn ModuleRegistry,
    typelib: &Typelib,
    index: u16,
) -> Result<BaseInfo, InfoError> {
    let entry = typelib.dir_entry(index)?;
    if entry.local {
        if entry.blob_type == BlobType::Invalid {
            return Err(TypelibError::InvalidBlobType {
                value: entry.blob_type as u16,
                offset: entry.offset,
            }
            .into());
        }
        return Ok(BaseInfo::new(
            InfoType::from_blob_type(entry.blob_type),
            None,
            typelib.clone(),
            entry.offset,
        ));
    }

    let namespace = entry.namespace(typelib)?;
    let name = entry.name(typelib)?;
    match registry.lookup(namespace, name) {
        Some(info) => Ok(info),
        None => {
            debug!(%namespace, %name, "Cross-module reference left unresolved");
            Ok(BaseInfo::unresolved(namespace, name))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gir_typelib::builder::*;

    struct OneEntry(BaseInfo);

    impl ModuleRegistry for OneEntry {
        fn lookup(&self, namespace: &str, name: &str) -> Option<BaseInfo> {
            (namespace == "GObject" && name == "Object").then(|| self.0.clone())
        }
    }

    fn typelib() -> Typelib {
        let bytes = TypelibBuilder::new("Gtk", "3.0")
            .entry(ObjectDef {
                name: "Widget".into(),
                parent: Some("GObject.Object".into()),
                interfaces: vec!["Atk.ImplementorIface".into()],
                ..Default::default()
            })
            .build()
            .unwrap();
        Typelib::new(bytes).unwrap()
    }

    #[test]
    fn test_local_entry_resolves_to_its_offset() {
        let tl = typelib();
        let info = resolve_entry(&EmptyRegistry, &tl, 1).unwrap();
        assert_eq!(info.kind(), InfoType::Object);
        assert_eq!(info.offset().unwrap(), tl.dir_entry(1).unwrap().offset);
        assert!(info.container().is_none());
        assert_eq!(info.name().unwrap(), "Widget");
    }

    #[test]
    fn test_unknown_non_local_entry_is_unresolved() {
        let tl = typelib();
        let entry = tl.dir_entry(3).unwrap();
        assert!(!entry.local);
        let info = resolve_entry(&EmptyRegistry, &tl, 3).unwrap();
        assert_eq!(info.kind(), InfoType::Unresolved);
        assert_eq!(info.namespace().unwrap(), "Atk");
        assert_eq!(info.name().unwrap(), "ImplementorIface");
    }

    #[test]
    fn test_non_local_entry_goes_through_registry() {
        let tl = typelib();
        let target = BaseInfo::unresolved("GObject", "Object");
        let registry = OneEntry(target.clone());
        let info = resolve_entry(&registry, &tl, 2).unwrap();
        assert!(info.same_blob(&target));
    }

    #[test]
    fn test_index_out_of_range() {
        let tl = typelib();
        assert!(resolve_entry(&EmptyRegistry, &tl, 0).is_err());
        assert!(resolve_entry(&EmptyRegistry, &tl, 4).is_err());
    }
}
