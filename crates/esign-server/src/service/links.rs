use esign_postgres::types::DocumentId;
use url::Url;

/// Host used when neither a base URL nor a `Host` header is available.
const FALLBACK_HOST: &str = "localhost";

/// Builds absolute links to document resources.
#[derive(Debug, Clone, Default)]
pub struct DocumentLinks {
    base_url: Option<Url>,
}

impl DocumentLinks {
    /// Creates a link builder. Without a base URL, links are derived from
    /// the request host.
    pub fn new(base_url: Option<Url>) -> Self {
        Self { base_url }
    }

    /// Returns the configured base URL.
    #[inline]
    pub fn base_url(&self) -> Option<&Url> {
        self.base_url.as_ref()
    }

    /// Returns the absolute URL of the PDF endpoint of a document.
    pub fn pdf_url(&self, doc_id: DocumentId, host: Option<&str>) -> String {
        let base = match &self.base_url {
            Some(url) => url.as_str().trim_end_matches('/').to_owned(),
            None => format!("http://{}", host.unwrap_or(FALLBACK_HOST)),
        };

        format!("{base}/api/documents/uploads/{doc_id}/pdf")
    }
}
