//! `gir-inspect find`: entity lookup through a repository.

use crate::describe;
use anyhow::{anyhow, Context};
use gir_repository::{Repository, RepositoryConfig};
use std::io::Write;
use tracing::debug;

pub struct FindOptions {
    pub namespace: String,
    pub name: String,
    pub version: Option<String>,
    pub type_name: bool,
}

pub fn execute(config: RepositoryConfig, options: &FindOptions) -> anyhow::Result<()> {
    debug!(search_paths = ?config.search_paths, "Repository configuration");
    let repo = Repository::with_config(config);
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    find(&mut out, &repo, options)
}

pub fn find(out: &mut dyn Write, repo: &Repository, options: &FindOptions) -> anyhow::Result<()> {
    repo.require(&options.namespace, options.version.as_deref())
        .with_context(|| format!("Failed to load {}", options.namespace))?;

    let info = if options.type_name {
        repo.find_by_type_name(&options.name)?
    } else {
        repo.find_by_name(&options.namespace, &options.name)?
    };
    let info = info.ok_or_else(|| {
        anyhow!(
            "No entity named '{}' in {}",
            options.name,
            options.namespace
        )
    })?;
    describe::describe(out, &info, repo)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gir_typelib::builder::*;
    use gir_typelib::{Direction, TypeTag};

    fn options(name: &str, type_name: bool) -> FindOptions {
        FindOptions {
            namespace: "Demo".into(),
            name: name.into(),
            version: None,
            type_name,
        }
    }

    fn search_dir() -> tempfile::TempDir {
        let dir = tempfile::TempDir::new().unwrap();
        let bytes = TypelibBuilder::new("Demo", "1.0")
            .entry(StructDef {
                name: "Point".into(),
                registration: Some(Registration::new("DemoPoint", "demo_point_get_type")),
                fields: vec![FieldDef::new("x", TypeDef::basic(TypeTag::Int32), 0)],
                methods: vec![FunctionDef::method(
                    "scale",
                    "demo_point_scale",
                    SignatureDef::new(
                        TypeDef::default(),
                        vec![ArgDef::new(
                            "factor",
                            TypeDef::basic(TypeTag::Double),
                            Direction::In,
                        )],
                    ),
                )],
                ..Default::default()
            })
            .build()
            .unwrap();
        std::fs::write(dir.path().join("Demo-1.0.typelib"), bytes).unwrap();
        dir
    }

    #[test]
    fn test_find_by_name_and_type_name() {
        let dir = search_dir();
        let repo =
            Repository::with_config(RepositoryConfig::default().with_search_path(dir.path()));

        let mut out = Vec::new();
        find(&mut out, &repo, &options("Point", false)).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("struct Point"));
        assert!(text.contains("x: gint32 @0"));
        assert!(text.contains("method scale(in gdouble factor) -> void"));

        let mut out = Vec::new();
        find(&mut out, &repo, &options("DemoPoint", true)).unwrap();
        assert!(String::from_utf8(out).unwrap().starts_with("struct Point"));
    }

    #[test]
    fn test_find_missing_entity() {
        let dir = search_dir();
        let repo =
            Repository::with_config(RepositoryConfig::default().with_search_path(dir.path()));
        let err = find(&mut Vec::new(), &repo, &options("Line", false)).unwrap_err();
        assert_eq!(err.to_string(), "No entity named 'Line' in Demo");
    }
}
