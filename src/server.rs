use std::time::Duration;

use reqwest::blocking::multipart::{Form, Part};
use reqwest::blocking::{Client, Response};
use reqwest::header::{CONTENT_RANGE, HeaderMap, HeaderValue, USER_AGENT};

use crate::domain::{ByteRange, JobParameters, METHOD_TAG, SessionId};
use crate::error::UploadError;

/// Serves `upload` and `run`.
pub const DEFAULT_SERVER_URL: &str = "https://crema.unibas.ch/crumara";
/// Serves `get_sd` and `save_json`.
pub const DEFAULT_SESSION_SERVER_URL: &str = "https://crema.scicore.unibas.ch/crumara";
const OCTET_STREAM: &str = "application/octet-stream";

/// One chunk as it goes over the wire.
#[derive(Debug, Clone, Copy)]
pub struct ChunkUpload<'a> {
    pub file_name: &'a str,
    pub range: ByteRange,
    pub data: &'a [u8],
}

/// The remote contract of the CREMA web server.
pub trait CremaServer: Send + Sync {
    fn allocate_session(&self) -> Result<SessionId, UploadError>;
    fn save_parameters(
        &self,
        session: &SessionId,
        parameters: &JobParameters,
    ) -> Result<(), UploadError>;
    fn upload_chunk(&self, session: &SessionId, chunk: &ChunkUpload<'_>)
    -> Result<(), UploadError>;
    /// Starts the analysis; the response body carries the result link.
    fn run_job(&self, session: &SessionId, parameters: &JobParameters)
    -> Result<String, UploadError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub base_url: String,
    pub session_url: String,
    pub connect_timeout: Duration,
    pub timeout: Duration,
    pub verify_tls: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_SERVER_URL.to_string(),
            session_url: DEFAULT_SESSION_SERVER_URL.to_string(),
            connect_timeout: Duration::from_secs(10),
            timeout: Duration::from_secs(600),
            verify_tls: true,
        }
    }
}

#[derive(Clone)]
pub struct CremaHttpClient {
    client: Client,
    base_url: String,
    session_url: String,
}

impl CremaHttpClient {
    pub fn new(config: &ClientConfig) -> Result<Self, UploadError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("crema-upload/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| UploadError::InvalidConfig(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .connect_timeout(config.connect_timeout)
            .timeout(config.timeout)
            .danger_accept_invalid_certs(!config.verify_tls)
            .build()
            .map_err(|err| UploadError::InvalidConfig(err.to_string()))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            session_url: config.session_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn endpoint_url(&self, endpoint: &str) -> String {
        let base = match endpoint {
            "get_sd" | "save_json" => &self.session_url,
            _ => &self.base_url,
        };
        format!("{base}/{endpoint}")
    }

    fn handle_status(endpoint: &str, response: Response) -> Result<Response, UploadError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let message = response
            .text()
            .unwrap_or_else(|_| format!("{endpoint} request failed"));
        Err(UploadError::Status {
            endpoint: endpoint.to_string(),
            status,
            message,
        })
    }

    fn transport(endpoint: &str, err: reqwest::Error) -> UploadError {
        UploadError::Transport {
            endpoint: endpoint.to_string(),
            message: err.to_string(),
        }
    }
}

impl CremaServer for CremaHttpClient {
    fn allocate_session(&self) -> Result<SessionId, UploadError> {
        let endpoint = "get_sd";
        let response = self
            .client
            .get(self.endpoint_url(endpoint))
            .send()
            .map_err(|err| Self::transport(endpoint, err))?;
        let body = Self::handle_status(endpoint, response)?
            .text()
            .map_err(|err| Self::transport(endpoint, err))?;
        body.parse()
    }

    fn save_parameters(
        &self,
        session: &SessionId,
        parameters: &JobParameters,
    ) -> Result<(), UploadError> {
        let endpoint = "save_json";
        let data = parameters.to_json()?;
        let response = self
            .client
            .post(self.endpoint_url(endpoint))
            .form(&[("sd", session.as_str()), ("data", data.as_str())])
            .send()
            .map_err(|err| Self::transport(endpoint, err))?;
        Self::handle_status(endpoint, response)?;
        Ok(())
    }

    fn upload_chunk(
        &self,
        session: &SessionId,
        chunk: &ChunkUpload<'_>,
    ) -> Result<(), UploadError> {
        let endpoint = "upload";
        let part = Part::bytes(chunk.data.to_vec())
            .file_name(chunk.file_name.to_string())
            .mime_str(OCTET_STREAM)
            .map_err(|err| Self::transport(endpoint, err))?;
        let form = Form::new()
            .text("sd", session.as_str().to_string())
            .part("files[]", part);
        let response = self
            .client
            .post(self.endpoint_url(endpoint))
            .header(CONTENT_RANGE, chunk.range.to_string())
            .multipart(form)
            .send()
            .map_err(|err| Self::transport(endpoint, err))?;
        Self::handle_status(endpoint, response)?;
        Ok(())
    }

    fn run_job(
        &self,
        session: &SessionId,
        parameters: &JobParameters,
    ) -> Result<String, UploadError> {
        let endpoint = "run";
        let response = self
            .client
            .post(self.endpoint_url(endpoint))
            .form(&[
                ("sd", session.as_str()),
                ("email", parameters.email.as_str()),
                ("project", parameters.project.as_str()),
                ("method", METHOD_TAG),
                ("datatype", parameters.datatype.as_str()),
                ("organism", parameters.organism.as_str()),
            ])
            .send()
            .map_err(|err| Self::transport(endpoint, err))?;
        Self::handle_status(endpoint, response)?
            .text()
            .map_err(|err| Self::transport(endpoint, err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_urls_ignore_trailing_slash() {
        let config = ClientConfig {
            base_url: "https://example.org/crumara/".to_string(),
            session_url: "https://sessions.example.org/crumara/".to_string(),
            ..ClientConfig::default()
        };
        let client = CremaHttpClient::new(&config).unwrap();
        assert_eq!(
            client.endpoint_url("get_sd"),
            "https://sessions.example.org/crumara/get_sd"
        );
        assert_eq!(
            client.endpoint_url("save_json"),
            "https://sessions.example.org/crumara/save_json"
        );
        assert_eq!(
            client.endpoint_url("upload"),
            "https://example.org/crumara/upload"
        );
        assert_eq!(client.endpoint_url("run"), "https://example.org/crumara/run");
    }

    #[test]
    fn default_timeouts() {
        let config = ClientConfig::default();
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.timeout, Duration::from_secs(600));
        assert!(config.verify_tls);
    }
}
