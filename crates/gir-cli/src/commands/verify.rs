//! `gir-inspect verify`: structural verification of typelib files.

use anyhow::{bail, Context};
use gir_typelib::{verify_typelib, Typelib};
use std::path::{Path, PathBuf};

pub fn execute(files: &[PathBuf]) -> anyhow::Result<()> {
    let mut failed = 0;
    for file in files {
        match verify_file(file) {
            Ok(typelib) => println!(
                "{}: ok ({}-{}, {} entries)",
                file.display(),
                typelib.namespace(),
                typelib.nsversion(),
                typelib.n_entries()
            ),
            Err(e) => {
                println!("{}: {:#}", file.display(), e);
                failed += 1;
            }
        }
    }
    if failed > 0 {
        bail!("{} of {} typelibs failed verification", failed, files.len());
    }
    Ok(())
}

fn verify_file(file: &Path) -> anyhow::Result<Typelib> {
    let typelib = Typelib::from_file(file).context("Failed to load")?;
    verify_typelib(&typelib)?;
    Ok(typelib)
}
