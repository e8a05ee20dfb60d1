use std::fs;
use std::io::{self, Write};
use std::path::Path;

use crate::document::Document;

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum Error {
    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Unable to write {0}: {1}")]
    WriteError(String, String),
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum Format {
    #[default]
    Pretty,
    Compact,
}

/// Write the document as JSON to a file, or to stdout without a destination
pub fn write(document: &Document, destination: Option<&Path>, format: Format) -> Result<(), Error> {
    let mut contents = document
        .to_json(format == Format::Pretty)
        .map_err(|error| Error::SerializationError(error.to_string()))?;
    contents.push('\n');

    match destination {
        Some(path) => {
            fs::write(path, contents)
                .map_err(|error| Error::WriteError(path.display().to_string(), error.to_string()))?;
            log::debug!("Template written to {}", path.display());
        }
        None => io::stdout()
            .lock()
            .write_all(contents.as_bytes())
            .map_err(|error| Error::WriteError("stdout".to_string(), error.to_string()))?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{write, Error, Format};
    use crate::template::{Resource, TemplateBuilder};
    use std::fs;
    use tempfile::tempdir;

    fn document() -> crate::document::Document {
        TemplateBuilder::new()
            .resource(Resource::new("Queue", "AWS::SQS::Queue"))
            .build()
            .assemble()
            .unwrap()
    }

    #[test]
    fn writes_pretty_json() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("template.json");

        write(&document(), Some(&file_path), Format::Pretty).unwrap();

        let contents = fs::read_to_string(&file_path).unwrap();
        assert!(contents.starts_with("{\n  \"AWSTemplateFormatVersion\": \"2010-09-09\""));
        assert!(contents.ends_with("}\n"));
    }

    #[test]
    fn writes_compact_json() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("template.json");

        write(&document(), Some(&file_path), Format::Compact).unwrap();

        assert_eq!(
            fs::read_to_string(&file_path).unwrap(),
            "{\"AWSTemplateFormatVersion\":\"2010-09-09\",\"Resources\":{\"Queue\":{\"Type\":\"AWS::SQS::Queue\"}}}\n"
        );
    }

    #[test]
    fn missing_directory() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("missing").join("template.json");

        match write(&document(), Some(&file_path), Format::Pretty) {
            Err(Error::WriteError(path, _)) => assert!(path.ends_with("template.json")),
            _ => panic!("Expected `WriteError` error"),
        }
    }
}
