//! YAML output of the generated CRDs.
use std::{io::Write, path::Path};

use snafu::{ResultExt, Snafu};

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to serialize YAML"))]
    SerializeYaml { source: serde_yaml::Error },

    #[snafu(display("failed to write YAML document separator"))]
    WriteDocumentSeparator { source: std::io::Error },

    #[snafu(display("failed to write YAML to file {path:?}"))]
    WriteToFile {
        source: std::io::Error,
        path: std::path::PathBuf,
    },

    #[snafu(display("failed to write YAML to stdout"))]
    WriteToStdout { source: std::io::Error },

    #[snafu(display("failed to parse bytes as valid UTF-8 string"))]
    ParseUtf8Bytes { source: std::string::FromUtf8Error },
}

/// Provides configurable options during YAML serialization.
pub struct SerializeOptions {
    /// Adds leading triple dashes (`---`) to every document.
    pub explicit_document: bool,

    /// Serialize enum variants as YAML maps using the variant name as the key.
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

/// Serializes the given data structure and writes it to a [`Writer`](Write).
pub fn serialize<T, W>(value: &T, mut writer: W, options: &SerializeOptions) -> Result<()>
where
    T: serde::Serialize,
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

/// Serializes all `documents` into one multi-document YAML string.
pub fn to_string<T: serde::Serialize>(documents: &[T]) -> Result<String> {
    let options = SerializeOptions::default();
    let mut buffer = Vec::new();
    for document in documents {
        serialize(document, &mut buffer, &options)?;
    }

    String::from_utf8(buffer).context(ParseUtf8BytesSnafu)
}

pub fn print<T: serde::Serialize>(documents: &[T]) -> Result<()> {
    let yaml = to_string(documents)?;
    std::io::stdout()
        .write_all(yaml.as_bytes())
        .context(WriteToStdoutSnafu)
}

pub fn write<T: serde::Serialize>(documents: &[T], path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let yaml = to_string(documents)?;
    std::fs::write(path, yaml).context(WriteToFileSnafu { path })
}
