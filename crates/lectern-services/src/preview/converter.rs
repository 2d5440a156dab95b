//! Document to preview converters.
//!
//! Rendering itself is delegated: [`CommandConverter`] shells out to a configured
//! tool (for example `pdftoppm` or a LibreOffice wrapper) that reads `{input}` and
//! writes `{output}`.

use std::io::Write;

use async_trait::async_trait;
use bytes::Bytes;
use lectern_core::models::DocumentType;
use thiserror::Error;
use tokio::process::Command;

const INPUT_PLACEHOLDER: &str = "{input}";
const OUTPUT_PLACEHOLDER: &str = "{output}";

#[derive(Debug, Error)]
pub enum ConversionError {
    #[error("Cannot convert an empty document")]
    EmptyInput,

    #[error("No preview converter is configured")]
    NotConfigured,

    #[error("Invalid converter command: {0}")]
    InvalidCommand(String),

    #[error("Converter failed: {0}")]
    Failed(String),

    #[error("Converter produced no output")]
    EmptyOutput,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Renders a preview artifact from source document bytes.
#[async_trait]
pub trait PreviewConverter: Send + Sync {
    /// MIME type of every artifact this converter produces.
    fn content_type(&self) -> &str;

    async fn convert(
        &self,
        document_type: DocumentType,
        input: Bytes,
    ) -> Result<Bytes, ConversionError>;

    fn name(&self) -> &str;
}

/// Runs an external command line per conversion.
///
/// The command is split on whitespace; `{input}` and `{output}` are replaced with
/// temp file paths. Callers bound the runtime; the child is killed if the conversion
/// future is dropped.
#[derive(Debug, Clone)]
pub struct CommandConverter {
    program: String,
    args: Vec<String>,
    content_type: String,
}

impl CommandConverter {
    pub fn parse(command_line: &str, content_type: impl Into<String>) -> Result<Self, ConversionError> {
        let mut parts = command_line.split_whitespace().map(String::from);
        let program = parts
            .next()
            .ok_or_else(|| ConversionError::InvalidCommand("command is empty".to_string()))?;
        let args: Vec<String> = parts.collect();

        if !args.iter().any(|a| a.contains(INPUT_PLACEHOLDER))
            || !args.iter().any(|a| a.contains(OUTPUT_PLACEHOLDER))
        {
            return Err(ConversionError::InvalidCommand(format!(
                "command must reference both {} and {}",
                INPUT_PLACEHOLDER, OUTPUT_PLACEHOLDER
            )));
        }

        Ok(Self {
            program,
            args,
            content_type: content_type.into(),
        })
    }

    fn render_args(&self, input: &str, output: &str) -> Vec<String> {
        self.args
            .iter()
            .map(|arg| {
                arg.replace(INPUT_PLACEHOLDER, input)
                    .replace(OUTPUT_PLACEHOLDER, output)
            })
            .collect()
    }
}

#[async_trait]
impl PreviewConverter for CommandConverter {
    fn content_type(&self) -> &str {
        &self.content_type
    }

    async fn convert(
        &self,
        document_type: DocumentType,
        input: Bytes,
    ) -> Result<Bytes, ConversionError> {
        if input.is_empty() {
            return Err(ConversionError::EmptyInput);
        }

        let mut source = tempfile::Builder::new()
            .prefix("lectern-source-")
            .suffix(&format!(".{}", document_type.as_str()))
            .tempfile()?;
        source.write_all(&input)?;
        source.flush()?;

        let workdir = tempfile::Builder::new().prefix("lectern-preview-").tempdir()?;
        let output_path = workdir.path().join("preview");

        let args = self.render_args(
            &source.path().to_string_lossy(),
            &output_path.to_string_lossy(),
        );

        tracing::debug!(program = %self.program, document_type = %document_type, "Running preview converter");

        let output = Command::new(&self.program)
            .args(&args)
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ConversionError::Failed(format!(
                "exit {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let artifact = tokio::fs::read(&output_path).await.map_err(|e| {
            ConversionError::Failed(format!("output file unreadable: {}", e))
        })?;
        if artifact.is_empty() {
            return Err(ConversionError::EmptyOutput);
        }

        Ok(Bytes::from(artifact))
    }

    fn name(&self) -> &str {
        "command"
    }
}

/// Used when no converter command is configured; every conversion fails.
#[derive(Debug, Clone)]
pub struct UnconfiguredConverter {
    content_type: String,
}

impl UnconfiguredConverter {
    pub fn new(content_type: impl Into<String>) -> Self {
        Self {
            content_type: content_type.into(),
        }
    }
}

#[async_trait]
impl PreviewConverter for UnconfiguredConverter {
    fn content_type(&self) -> &str {
        &self.content_type
    }

    async fn convert(
        &self,
        _document_type: DocumentType,
        _input: Bytes,
    ) -> Result<Bytes, ConversionError> {
        Err(ConversionError::NotConfigured)
    }

    fn name(&self) -> &str {
        "unconfigured"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_requires_placeholders() {
        assert!(CommandConverter::parse("pdftoppm -png {input}", "image/png").is_err());
        assert!(CommandConverter::parse("   ", "image/png").is_err());
        let converter =
            CommandConverter::parse("pdftoppm -png -singlefile {input} {output}", "image/png")
                .unwrap();
        assert_eq!(converter.content_type(), "image/png");
        assert_eq!(
            converter.render_args("/tmp/a.pdf", "/tmp/out"),
            vec!["-png", "-singlefile", "/tmp/a.pdf", "/tmp/out"]
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_converter_copies_output() {
        let converter = CommandConverter::parse("cp {input} {output}", "application/pdf").unwrap();
        let output = converter
            .convert(DocumentType::Pdf, Bytes::from_static(b"%PDF-1.7"))
            .await
            .unwrap();
        assert_eq!(output, Bytes::from_static(b"%PDF-1.7"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_converter_reports_failure() {
        let converter = CommandConverter::parse("false {input} {output}", "image/png").unwrap();
        let err = converter
            .convert(DocumentType::Pdf, Bytes::from_static(b"%PDF"))
            .await
            .unwrap_err();
        assert!(matches!(err, ConversionError::Failed(_)));
    }

    #[tokio::test]
    async fn test_empty_input_rejected() {
        let converter = CommandConverter::parse("cp {input} {output}", "image/png").unwrap();
        assert!(matches!(
            converter.convert(DocumentType::Pdf, Bytes::new()).await,
            Err(ConversionError::EmptyInput)
        ));
    }

    #[tokio::test]
    async fn test_unconfigured_converter_fails() {
        let converter = UnconfiguredConverter::new("image/png");
        assert!(matches!(
            converter
                .convert(DocumentType::Pdf, Bytes::from_static(b"x"))
                .await,
            Err(ConversionError::NotConfigured)
        ));
    }
}
