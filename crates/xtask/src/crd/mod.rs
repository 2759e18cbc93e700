use std::path::PathBuf;

use resource_builders::{
    CustomResourceExt,
    crd::ibgu::v1alpha1::ImageBasedGroupUpgrade,
    kube::{CustomResourceExt as _, Resource},
    yaml,
};
use snafu::{OptionExt, ResultExt, Snafu};

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to get manifest directory"))]
    GetManifestDirectory { source: std::env::VarError },

    #[snafu(display("failed to get parent directory of {path}", path = path.display()))]
    GetParentDirectory { path: PathBuf },

    #[snafu(display("failed to create CRD directory at {path}", path = path.display()))]
    CreateCrdDirectory {
        source: std::io::Error,
        path: PathBuf,
    },

    #[snafu(display("failed to write CRD to file at {path}", path = path.display()))]
    WriteCrd { source: yaml::Error, path: PathBuf },

    #[snafu(display("failed to print {crd_name:?} CRD"))]
    PrintCrd {
        source: yaml::Error,
        crd_name: &'static str,
    },
}

macro_rules! write_crd {
    ($base_path:expr, $crd:ty) => {
        let mut path = $base_path.join(&*<$crd as Resource>::kind(&()));
        path.set_extension("yaml");

        <$crd as CustomResourceExt>::write_yaml_schema(&path)
            .with_context(|_| WriteCrdSnafu { path: path.clone() })?;
        tracing::info!(path = %path.display(), "wrote CRD");
    };
}

pub fn generate_preview() -> Result<(), Error> {
    let path = std::env::var("CARGO_MANIFEST_DIR")
        .map(PathBuf::from)
        .context(GetManifestDirectorySnafu)?;

    let path = path
        .parent()
        .with_context(|| GetParentDirectorySnafu { path: path.clone() })?
        .join("resource-builders/crds");

    std::fs::create_dir_all(&path)
        .with_context(|_| CreateCrdDirectorySnafu { path: path.clone() })?;

    write_crd!(path, ImageBasedGroupUpgrade);

    Ok(())
}

pub fn print() -> Result<(), Error> {
    ImageBasedGroupUpgrade::print_yaml_schema().context(PrintCrdSnafu {
        crd_name: ImageBasedGroupUpgrade::crd_name(),
    })
}
