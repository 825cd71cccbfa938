//! Validation and decoding of submitted signatures.

use std::io::Cursor;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use esign_postgres::types::SignatureType;
use image::ImageOutputFormat;

use crate::service::{Error, Result};

/// Message for a request without a signature.
pub const NO_SIGNATURE: &str = "No signature provided";

/// Message for a signature that cannot be used.
pub const INVALID_SIGNATURE: &str = "Invalid signature format or type";

const DATA_URL_PREFIX: &str = "data:image/";
const BASE64_MARKER: &str = ";base64,";

/// A signature as submitted by the client, checked but not yet decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureSubmission {
    /// Trimmed signature text.
    Typed(String),
    /// A `data:image/<fmt>;base64,<payload>` URL.
    Drawn(String),
}

impl SignatureSubmission {
    /// Checks the raw `signature` and `signatureType` fields of a request.
    ///
    /// A missing or empty signature is reported as [`NO_SIGNATURE`]; every
    /// other unusable combination as [`INVALID_SIGNATURE`].
    pub fn parse(signature: Option<&str>, signature_type: Option<&str>) -> Result<Self> {
        let signature = require_signature(signature)?;
        let signature_type = signature_type
            .and_then(|t| t.parse::<SignatureType>().ok())
            .ok_or_else(|| Error::invalid_input(INVALID_SIGNATURE))?;

        match signature_type {
            SignatureType::Typed => {
                let text = signature.trim();
                if text.is_empty() {
                    return Err(Error::invalid_input(INVALID_SIGNATURE));
                }
                Ok(Self::Typed(text.to_owned()))
            }
            SignatureType::Drawn => {
                split_data_url(signature).ok_or_else(|| Error::invalid_input(INVALID_SIGNATURE))?;
                Ok(Self::Drawn(signature.to_owned()))
            }
        }
    }

    /// Returns the signature type of this submission.
    pub fn signature_type(&self) -> SignatureType {
        match self {
            Self::Typed(_) => SignatureType::Typed,
            Self::Drawn(_) => SignatureType::Drawn,
        }
    }
}

/// Rejects a missing or empty signature with [`NO_SIGNATURE`].
///
/// This is the only check that runs before the document is looked up.
pub fn require_signature(signature: Option<&str>) -> Result<&str> {
    signature
        .filter(|s| !s.is_empty())
        .ok_or_else(|| Error::invalid_input(NO_SIGNATURE))
}

/// A drawn signature re-encoded as PNG.
#[derive(Clone, PartialEq, Eq)]
pub struct SignatureImage {
    png: Vec<u8>,
    width: u32,
    height: u32,
}

impl SignatureImage {
    /// Decodes a base64 image data URL and re-encodes it as PNG.
    ///
    /// This is CPU-bound; async callers should use [`decode`](Self::decode).
    pub fn from_data_url(data_url: &str) -> Result<Self> {
        let (_, payload) =
            split_data_url(data_url).ok_or_else(|| Error::invalid_input(INVALID_SIGNATURE))?;

        let bytes = STANDARD
            .decode(payload)
            .map_err(|e| Error::invalid_input(INVALID_SIGNATURE).with_source(e))?;

        let image = image::load_from_memory(&bytes)
            .map_err(|e| Error::invalid_input(INVALID_SIGNATURE).with_source(e))?;

        let mut png = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut png), ImageOutputFormat::Png)
            .map_err(|e| Error::internal("signature", "Failed to encode PNG").with_source(e))?;

        Ok(Self {
            png,
            width: image.width(),
            height: image.height(),
        })
    }

    /// Decodes a data URL on the blocking thread pool.
    pub async fn decode(data_url: String) -> Result<Self> {
        tokio::task::spawn_blocking(move || Self::from_data_url(&data_url)).await?
    }

    /// Returns the PNG bytes.
    #[inline]
    pub fn as_png(&self) -> &[u8] {
        &self.png
    }

    /// Returns the image dimensions in pixels.
    #[inline]
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

impl std::fmt::Debug for SignatureImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("png_len", &self.png.len())
            .finish()
    }
}

/// Splits `data:image/<fmt>;base64,<payload>` into format and payload.
fn split_data_url(data_url: &str) -> Option<(&str, &str)> {
    let rest = data_url.strip_prefix(DATA_URL_PREFIX)?;
    let (format, payload) = rest.split_once(BASE64_MARKER)?;

    if format.is_empty() || payload.is_empty() {
        return None;
    }

    Some((format, payload))
}

#[cfg(test)]
mod tests {
    use image::{Rgba, RgbaImage};

    use super::*;

    /// Builds a PNG data URL of a small opaque red square.
    fn png_data_url() -> anyhow::Result<String> {
        let image = RgbaImage::from_pixel(4, 2, Rgba([200, 0, 0, 255]));
        let mut png = Vec::new();
        image::DynamicImage::ImageRgba8(image)
            .write_to(&mut Cursor::new(&mut png), ImageOutputFormat::Png)?;

        Ok(format!("data:image/png;base64,{}", STANDARD.encode(png)))
    }

    #[test]
    fn missing_or_empty_signature() {
        for signature in [None, Some("")] {
            let error = SignatureSubmission::parse(signature, Some("typed"))
                .expect_err("signature is required");
            assert_eq!(error.message(), NO_SIGNATURE);
        }
    }

    #[test]
    fn presence_is_checked_without_the_type() -> anyhow::Result<()> {
        assert_eq!(require_signature(Some("   "))?, "   ");
        assert_eq!(require_signature(Some("Jane"))?, "Jane");

        let error = require_signature(None).expect_err("signature is required");
        assert_eq!(error.message(), NO_SIGNATURE);
        Ok(())
    }

    #[test]
    fn typed_signature_is_trimmed() -> anyhow::Result<()> {
        let submission = SignatureSubmission::parse(Some("  Jane Doe "), Some("typed"))?;
        assert_eq!(submission, SignatureSubmission::Typed("Jane Doe".to_owned()));
        assert_eq!(submission.signature_type(), SignatureType::Typed);
        Ok(())
    }

    #[test]
    fn invalid_combinations() {
        let cases = [
            (Some("Jane"), None),
            (Some("Jane"), Some("stamped")),
            (Some("   "), Some("typed")),
            (Some("Jane"), Some("drawn")),
            (Some("data:text/plain;base64,SGk="), Some("drawn")),
            (Some("data:image/png;base64,"), Some("drawn")),
        ];

        for (signature, signature_type) in cases {
            let error = SignatureSubmission::parse(signature, signature_type)
                .expect_err("combination is invalid");
            assert_eq!(error.message(), INVALID_SIGNATURE, "{signature:?} {signature_type:?}");
        }
    }

    #[test]
    fn drawn_signature_keeps_data_url() -> anyhow::Result<()> {
        let data_url = png_data_url()?;
        let submission = SignatureSubmission::parse(Some(&data_url), Some("drawn"))?;
        assert_eq!(submission, SignatureSubmission::Drawn(data_url));
        Ok(())
    }

    #[test]
    fn data_url_is_reencoded_as_png() -> anyhow::Result<()> {
        let image = SignatureImage::from_data_url(&png_data_url()?)?;

        assert_eq!(image.dimensions(), (4, 2));
        assert!(image.as_png().starts_with(b"\x89PNG"));
        Ok(())
    }

    #[test]
    fn undecodable_payloads_are_invalid() {
        for data_url in [
            "data:image/png;base64,@@@@",
            "data:image/png;base64,SGVsbG8gd29ybGQ=",
        ] {
            let error = SignatureImage::from_data_url(data_url).expect_err("payload is invalid");
            assert_eq!(error.message(), INVALID_SIGNATURE);
        }
    }

    #[tokio::test]
    async fn decode_runs_off_the_async_workers() -> anyhow::Result<()> {
        let image = SignatureImage::decode(png_data_url()?).await?;
        assert_eq!(image.dimensions(), (4, 2));
        Ok(())
    }
}
