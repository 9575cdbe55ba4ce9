use std::time::Duration;

use reqwest::multipart::{Form, Part};

use crate::descriptor::{FormEntry, UploadForm};
use crate::error::TransportError;

/// Network side of the upload worker
#[async_trait::async_trait]
pub trait UploadTransport: Send + Sync {
    /// Header-only request; any response at all counts as connectivity
    async fn probe(&self, url: &str) -> Result<(), TransportError>;

    /// Multipart POST, returning the HTTP status code
    async fn submit(&self, url: &str, form: &UploadForm) -> Result<u16, TransportError>;
}

#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    async fn build_form(form: &UploadForm) -> Result<Form, TransportError> {
        let mut multipart = Form::new();
        for entry in form.entries() {
            multipart = match entry {
                FormEntry::Text { name, value } => multipart.text(name.clone(), value.clone()),
                FormEntry::File { name, path } => {
                    let bytes =
                        tokio::fs::read(path)
                            .await
                            .map_err(|source| TransportError::Attachment {
                                path: path.clone(),
                                source,
                            })?;
                    let file_name = path
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_default();
                    let part = Part::bytes(bytes)
                        .file_name(file_name)
                        .mime_str("application/octet-stream")?;
                    multipart.part(name.clone(), part)
                }
            };
        }
        Ok(multipart)
    }
}

#[async_trait::async_trait]
impl UploadTransport for HttpTransport {
    async fn probe(&self, url: &str) -> Result<(), TransportError> {
        self.client.head(url).send().await?;
        Ok(())
    }

    async fn submit(&self, url: &str, form: &UploadForm) -> Result<u16, TransportError> {
        let multipart = Self::build_form(form).await?;
        let response = self.client.post(url).multipart(multipart).send().await?;
        Ok(response.status().as_u16())
    }
}
