//! YAML output of resources and CustomResourceDefinitions.
use std::{io::Write, path::Path};

use serde::Serialize;
use snafu::{ResultExt, Snafu};

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to serialize YAML"))]
    SerializeYaml { source: serde_yaml::Error },

    #[snafu(display("failed to write YAML document separator"))]
    WriteDocumentSeparator { source: std::io::Error },

    #[snafu(display("failed to write YAML to {path:?}"))]
    WriteToFile {
        source: std::io::Error,
        path: std::path::PathBuf,
    },

    #[snafu(display("failed to write YAML to stdout"))]
    WriteToStdout { source: std::io::Error },

    #[snafu(display("serialized YAML is not valid UTF-8"))]
    ParseUtf8Bytes { source: std::string::FromUtf8Error },
}

/// Options for [`serialize`].
///
/// The default emits an explicit document and serializes enums as singleton maps, which is what
/// `kubectl apply` expects for CRDs.
#[derive(Clone, Copy, Debug)]
pub struct SerializeOptions {
    /// Starts the output with a document separator (`---`).
    pub explicit_document: bool,

    /// Serializes enum variants as YAML maps keyed by the variant name instead of YAML tags.
    pub singleton_map: bool,
}

impl Default for SerializeOptions {
    fn default() -> Self {
        Self {
            explicit_document: true,
            singleton_map: true,
        }
    }
}

/// Serializes `value` as YAML into `writer`.
pub fn serialize<T, W>(value: &T, mut writer: W, options: SerializeOptions) -> Result<()>
where
    T: Serialize,
    W: Write,
{
    if options.explicit_document {
        writer
            .write_all(b"---\n")
            .context(WriteDocumentSeparatorSnafu)?;
    }

    let mut serializer = serde_yaml::Serializer::new(writer);

    if options.singleton_map {
        serde_yaml::with::singleton_map_recursive::serialize(value, &mut serializer)
            .context(SerializeYamlSnafu)?;
    } else {
        value
            .serialize(&mut serializer)
            .context(SerializeYamlSnafu)?;
    }

    Ok(())
}

/// Serializes `value` as a YAML [`String`].
pub fn to_string<T>(value: &T, options: SerializeOptions) -> Result<String>
where
    T: Serialize,
{
    let mut buffer = Vec::new();
    serialize(value, &mut buffer, options)?;

    String::from_utf8(buffer).context(ParseUtf8BytesSnafu)
}

/// YAML output of the `CustomResourceDefinition` of a custom resource, as an explicit document.
pub trait CustomResourceExt: kube::CustomResourceExt {
    /// Returns the YAML of the `CustomResourceDefinition`.
    fn yaml_schema() -> Result<String> {
        to_string(&Self::crd(), SerializeOptions::default())
    }

    /// Writes the YAML of the `CustomResourceDefinition` to the file at `path`.
    fn write_yaml_schema<P: AsRef<Path>>(path: P) -> Result<()> {
        let path = path.as_ref();
        let schema = Self::yaml_schema()?;

        tracing::debug!(kind = Self::crd_name(), path = %path.display(), "writing CRD");
        std::fs::write(path, schema).context(WriteToFileSnafu { path })
    }

    /// Prints the YAML of the `CustomResourceDefinition` to [stdout].
    ///
    /// [stdout]: std::io::stdout
    fn print_yaml_schema() -> Result<()> {
        let schema = Self::yaml_schema()?;

        std::io::stdout()
            .write_all(schema.as_bytes())
            .context(WriteToStdoutSnafu)
    }
}

impl<T> CustomResourceExt for T where T: kube::CustomResourceExt {}
