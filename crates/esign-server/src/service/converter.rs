//! DOCX to PDF conversion through a headless office suite.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::process::Command;

use crate::service::{Error, Result};

/// Tracing target for document conversion.
const TRACING_TARGET: &str = "esign_server::service::converter";

/// Maximum number of stderr bytes kept in error messages.
const STDERR_LIMIT: usize = 512;

/// Converts DOCX files to PDF by running a LibreOffice-compatible binary.
///
/// The binary is invoked as
/// `{program} --headless --convert-to pdf --outdir {outdir} {source}` and is
/// expected to write `{outdir}/{source stem}.pdf`.
#[derive(Debug, Clone)]
pub struct DocumentConverter {
    program: Arc<str>,
    timeout: Duration,
}

impl DocumentConverter {
    /// Creates a converter running `program` with the given time limit.
    pub fn new(program: impl AsRef<str>, timeout: Duration) -> Self {
        Self {
            program: Arc::from(program.as_ref()),
            timeout,
        }
    }

    /// Converts `source` and returns the path of the produced PDF.
    ///
    /// The source file is left in place. The child process is killed if the
    /// time limit elapses.
    pub async fn convert_to_pdf(&self, source: &Path, outdir: &Path) -> Result<PathBuf> {
        let expected = expected_output(source, outdir)?;
        let started = Instant::now();

        let child = Command::new(self.program.as_ref())
            .arg("--headless")
            .arg("--convert-to")
            .arg("pdf")
            .arg("--outdir")
            .arg(outdir)
            .arg(source)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                Error::conversion(format!("Failed to start {}", self.program)).with_source(e)
            })?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                Error::conversion(format!(
                    "{} did not finish within {}s",
                    self.program,
                    self.timeout.as_secs()
                ))
            })?
            .map_err(|e| {
                Error::conversion(format!("Failed to wait for {}", self.program)).with_source(e)
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stderr: String = stderr.trim().chars().take(STDERR_LIMIT).collect();

            return Err(Error::conversion(format!(
                "{} exited with {}: {}",
                self.program, output.status, stderr
            )));
        }

        if !tokio::fs::try_exists(&expected).await.unwrap_or(false) {
            return Err(Error::conversion(format!(
                "{} did not produce {}",
                self.program,
                expected.display()
            )));
        }

        tracing::info!(
            target: TRACING_TARGET,
            source = %source.display(),
            output = %expected.display(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Document converted to PDF"
        );

        Ok(expected)
    }
}

fn expected_output(source: &Path, outdir: &Path) -> Result<PathBuf> {
    let stem = source
        .file_stem()
        .ok_or_else(|| Error::conversion("Source file has no name"))?;

    let mut file_name = stem.to_os_string();
    file_name.push(".pdf");
    Ok(outdir.join(file_name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_keeps_the_source_stem() -> anyhow::Result<()> {
        let output = expected_output(Path::new("/srv/uploads/abc.docx"), Path::new("/srv/uploads"))?;
        assert_eq!(output, PathBuf::from("/srv/uploads/abc.pdf"));
        Ok(())
    }

    #[tokio::test]
    async fn missing_binary_is_a_conversion_error() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let source = dir.path().join("abc.docx");
        tokio::fs::write(&source, b"docx").await?;

        let converter =
            DocumentConverter::new("esign-missing-converter", Duration::from_secs(5));
        let error = converter
            .convert_to_pdf(&source, dir.path())
            .await
            .expect_err("conversion should fail");

        assert_eq!(error.kind(), crate::ErrorKind::Conversion);
        Ok(())
    }

    #[tokio::test]
    async fn missing_output_is_a_conversion_error() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let source = dir.path().join("abc.docx");
        tokio::fs::write(&source, b"docx").await?;

        let converter = DocumentConverter::new("true", Duration::from_secs(5));
        let error = converter
            .convert_to_pdf(&source, dir.path())
            .await
            .expect_err("conversion should fail");

        assert_eq!(error.kind(), crate::ErrorKind::Conversion);
        assert!(error.message().contains("did not produce"));
        Ok(())
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn produced_pdf_is_returned() -> anyhow::Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir()?;
        let script = dir.path().join("fake-soffice");
        std::fs::write(
            &script,
            "#!/bin/sh\nname=$(basename \"$6\" .docx)\nprintf '%%PDF-1.5' > \"$5/$name.pdf\"\n",
        )?;
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755))?;

        let source = dir.path().join("abc.docx");
        tokio::fs::write(&source, b"docx").await?;

        let converter = DocumentConverter::new(script.to_string_lossy(), Duration::from_secs(5));
        let output = converter.convert_to_pdf(&source, dir.path()).await?;

        assert_eq!(output, dir.path().join("abc.pdf"));
        assert!(source.exists());
        Ok(())
    }
}
