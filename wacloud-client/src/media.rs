//! Media endpoints: resolve, download, upload and delete.
//!
//! Download URLs returned by the API expire within minutes, so
//! [`Client::download_media`] resolves a fresh URL on every attempt and
//! retries the whole resolve-and-fetch cycle.

use std::path::PathBuf;

use bytes::Bytes;
use http::{Method, StatusCode};
use serde::{Deserialize, Deserializer, Serialize};
use sha2::{Digest, Sha256};

use crate::config::RetryPolicy;
use crate::request::form::RequestForm;
use crate::response::{DecodeOptions, JsonDecoder, RawDecoder};
use crate::{Client, ClientError, DecodeError, Request};

/// Metadata of an uploaded media object.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaInformation {
    pub id: String,
    /// Short-lived download URL. Requires the bearer token.
    pub url: String,
    pub mime_type: String,
    #[serde(default)]
    pub sha256: String,
    #[serde(default, deserialize_with = "size_from_number_or_string")]
    pub file_size: u64,
    #[serde(default)]
    pub messaging_product: String,
}

/// Media bytes together with the metadata they were resolved from.
#[derive(Clone, Debug)]
pub struct DownloadedMedia {
    pub info: MediaInformation,
    pub content_type: Option<String>,
    pub data: Bytes,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaId {
    pub id: String,
}

#[derive(Deserialize)]
struct DeleteResponse {
    success: bool,
}

fn size_from_number_or_string<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Size {
        Number(u64),
        Text(String),
    }

    match Size::deserialize(deserializer)? {
        Size::Number(n) => Ok(n),
        Size::Text(s) => s.parse().map_err(serde::de::Error::custom),
    }
}

fn api_options() -> DecodeOptions {
    DecodeOptions::new()
        .disallow_empty_response(true)
        .inspect_response_error(true)
}

/// Errors worth another resolve-and-fetch cycle.
fn retry_download(err: &ClientError) -> bool {
    matches!(err, ClientError::Transport(_) | ClientError::Timeout(_))
        || err.status() == Some(StatusCode::NOT_FOUND)
}

impl Client {
    /// Resolve a media id into its metadata and a fresh download URL.
    pub async fn media_info(&self, id: &str) -> Result<MediaInformation, ClientError> {
        let request: Request<()> = self.request(Method::GET, [id]).operation("media_info");
        self.send(request, JsonDecoder::new(api_options()))
            .await?
            .ok_or_else(|| DecodeError::EmptyBody.into())
    }

    /// Download a media object, retrying per `policy`.
    ///
    /// Each attempt resolves the URL again and fetches it. Transport
    /// failures, timeouts and 404s are retried, up to
    /// `policy.max_retries + 1` attempts in total.
    ///
    /// # Errors
    ///
    /// - [`ClientError::MediaNotFound`] if the last attempt still got a 404
    /// - [`ClientError::RetryExhausted`] if the last attempt failed otherwise
    /// - [`ClientError::DownloadFailed`] on any other non-2xx download status
    /// - [`ClientError::MediaIntegrity`] if the bytes do not match the
    ///   advertised sha256
    pub async fn download_media(
        &self,
        id: &str,
        policy: &RetryPolicy,
    ) -> Result<DownloadedMedia, ClientError> {
        if let Err(msg) = policy.validate() {
            return Err(ClientError::aborted(format!("invalid retry policy: {msg}")));
        }

        let mut backoff = policy.backoff();
        let mut attempts = 0;
        loop {
            attempts += 1;
            let err = match self.download_attempt(id).await {
                Ok(media) => return verify_digest(media),
                Err(err) if retry_download(&err) => err,
                Err(err) => return Err(err),
            };

            if !backoff.can_retry() {
                return Err(if err.status() == Some(StatusCode::NOT_FOUND) {
                    ClientError::MediaNotFound { attempts }
                } else {
                    ClientError::RetryExhausted {
                        attempts,
                        last: Box::new(err),
                    }
                });
            }

            let delay = backoff.next_delay();
            #[cfg(feature = "tracing")]
            tracing::warn!(
                media_id = id,
                attempt = attempts,
                error = %err,
                delay_ms = delay.as_millis() as u64,
                "retrying media download"
            );
            tokio::time::sleep(delay).await;
        }
    }

    async fn download_attempt(&self, id: &str) -> Result<DownloadedMedia, ClientError> {
        let info = self.media_info(id).await?;
        let request = Request::<()>::new(Method::GET, info.url.clone())
            .bearer(self.config().access_token.clone())
            .operation("download_media");
        let response = self.send(request, RawDecoder).await?;
        if !response.is_success() {
            return Err(ClientError::DownloadFailed {
                status: response.status,
            });
        }
        Ok(DownloadedMedia {
            content_type: response.content_type().map(str::to_owned),
            data: response.body,
            info,
        })
    }

    /// Upload a file for `phone_number_id` and return its media id.
    pub async fn upload_media(
        &self,
        phone_number_id: &str,
        path: impl Into<PathBuf>,
        mime_type: &str,
    ) -> Result<MediaId, ClientError> {
        let form = RequestForm::new()
            .field("messaging_product", "whatsapp")
            .field("type", mime_type)
            .file("file", path, Some(mime_type));
        let request: Request<()> = self
            .request(Method::POST, [phone_number_id, "media"])
            .form(form)
            .operation("upload_media");
        self.send(request, JsonDecoder::new(api_options()))
            .await?
            .ok_or_else(|| DecodeError::EmptyBody.into())
    }

    pub async fn delete_media(&self, id: &str) -> Result<bool, ClientError> {
        let request: Request<()> = self.request(Method::DELETE, [id]).operation("delete_media");
        let response: Option<DeleteResponse> =
            self.send(request, JsonDecoder::new(api_options())).await?;
        Ok(response.is_some_and(|r| r.success))
    }
}

fn verify_digest(media: DownloadedMedia) -> Result<DownloadedMedia, ClientError> {
    if media.info.sha256.is_empty() {
        return Ok(media);
    }
    let actual = hex::encode(Sha256::digest(&media.data));
    if !actual.eq_ignore_ascii_case(&media.info.sha256) {
        return Err(ClientError::MediaIntegrity {
            expected: media.info.sha256,
            actual,
        });
    }
    Ok(media)
}
