use std::path::PathBuf;

use codemowers_operator::{crd, kind, yaml};
use snafu::{OptionExt, ResultExt, Snafu};

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to get manifest directory"))]
    GetManifestDirectory { source: std::env::VarError },

    #[snafu(display("failed to get parent directory of {path}", path = path.display()))]
    GetParentDirectory { path: PathBuf },

    #[snafu(display("failed to create CRD directory {path}", path = path.display()))]
    CreateDirectory {
        source: std::io::Error,
        path: PathBuf,
    },

    #[snafu(display("failed to write CRDs to file at {path}", path = path.display()))]
    WriteCrd { source: yaml::Error, path: PathBuf },
}

/// Writes one multi-document file per kind, holding the instance, class and
/// claim CRDs.
pub fn generate() -> Result<(), Error> {
    let path = std::env::var("CARGO_MANIFEST_DIR")
        .map(PathBuf::from)
        .context(GetManifestDirectorySnafu)?;

    let path = path
        .parent()
        .with_context(|| GetParentDirectorySnafu { path: path.clone() })?
        .join("codemowers-operator/crds");
    std::fs::create_dir_all(&path).context(CreateDirectorySnafu { path: path.clone() })?;

    for kind in kind::all() {
        let mut file = path.join(kind.plural_name());
        file.set_extension("yaml");

        yaml::write(&crd::crds(kind), &file).with_context(|_| WriteCrdSnafu { path: file.clone() })?;
    }

    Ok(())
}
