use std::fmt;
use std::pin::Pin;

use chat_transport::{ChatRequest, ChatTransport, ChunkReader, OpenedStream, TransportError};
use futures_util::stream::{Stream, StreamExt};
use reqwest::{Client, RequestBuilder, Response};
use tracing::{debug, info, warn};

use crate::config::ChatApiConfig;
use crate::error::{parse_error_message, ChatApiError};
use crate::headers::{build_headers, resume_token, to_header_map, RequestKind};
use crate::payload::ChatPayload;
use crate::url::{chat_url, recover_url};

type ByteStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>, reqwest::Error>> + Send>>;

#[derive(Debug)]
pub struct ChatApiClient {
    http: Client,
    config: ChatApiConfig,
}

impl ChatApiClient {
    pub fn new(config: ChatApiConfig) -> Result<Self, ChatApiError> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.connect_timeout {
            builder = builder.connect_timeout(timeout);
        }
        let http = builder.build().map_err(ChatApiError::Client)?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &ChatApiConfig {
        &self.config
    }

    pub fn build_chat_request(&self, request: &ChatRequest) -> Result<RequestBuilder, ChatApiError> {
        let url = chat_url(&self.config.base_url)?;
        let headers = to_header_map(build_headers(&self.config, RequestKind::Chat))?;
        Ok(self
            .http
            .post(url)
            .headers(headers)
            .json(&ChatPayload::from(request)))
    }

    pub fn build_recover_request(&self, resume_token: &str) -> Result<RequestBuilder, ChatApiError> {
        let url = recover_url(&self.config.base_url, resume_token)?;
        let headers = to_header_map(build_headers(&self.config, RequestKind::Recover))?;
        Ok(self.http.get(url).headers(headers))
    }

    /// Sends the primary chat request and returns the accepted stream.
    pub async fn open_chat_stream(
        &self,
        request: &ChatRequest,
    ) -> Result<OpenedStream<HttpChunkReader>, ChatApiError> {
        let response = self
            .build_chat_request(request)?
            .send()
            .await
            .map_err(ChatApiError::Request)?;
        let opened = accept_response(response).await?;
        match opened.resume_token.as_deref() {
            Some(token) => info!(resume_token = token, "chat stream opened"),
            None => warn!("chat stream opened without a resume token; recovery is unavailable"),
        }
        Ok(opened)
    }

    /// Reattaches to a stream by its resume token.
    pub async fn open_recover_stream(
        &self,
        resume_token: &str,
    ) -> Result<OpenedStream<HttpChunkReader>, ChatApiError> {
        let response = self
            .build_recover_request(resume_token)?
            .send()
            .await
            .map_err(ChatApiError::Request)?;
        let opened = accept_response(response).await?;
        info!(resume_token, "recovery stream opened");
        Ok(OpenedStream::new(Some(resume_token.to_owned()), opened.reader))
    }
}

async fn accept_response(response: Response) -> Result<OpenedStream<HttpChunkReader>, ChatApiError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let message = parse_error_message(status, &body);
        debug!(status = status.as_u16(), %message, "backend rejected request");
        return Err(ChatApiError::Status { status, message });
    }

    let token = resume_token(response.headers());
    Ok(OpenedStream::new(token, HttpChunkReader::new(response)))
}

/// [`ChunkReader`] over a streaming HTTP response body.
pub struct HttpChunkReader {
    body: Option<ByteStream>,
}

impl HttpChunkReader {
    fn new(response: Response) -> Self {
        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()));
        Self {
            body: Some(Box::pin(body)),
        }
    }
}

impl fmt::Debug for HttpChunkReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpChunkReader")
            .field("open", &self.body.is_some())
            .finish()
    }
}

impl ChunkReader for HttpChunkReader {
    async fn pull(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        let Some(body) = self.body.as_mut() else {
            return Ok(None);
        };

        match body.next().await {
            Some(Ok(chunk)) => Ok(Some(chunk)),
            Some(Err(error)) => Err(ChatApiError::Body(error).into()),
            None => {
                self.body = None;
                Ok(None)
            }
        }
    }

    fn release(&mut self) {
        if self.body.take().is_some() {
            debug!("released HTTP response body");
        }
    }
}

impl ChatTransport for ChatApiClient {
    type Reader = HttpChunkReader;

    async fn open_chat(
        &self,
        request: &ChatRequest,
    ) -> Result<OpenedStream<Self::Reader>, TransportError> {
        self.open_chat_stream(request).await.map_err(Into::into)
    }

    async fn open_resume(
        &self,
        resume_token: &str,
    ) -> Result<OpenedStream<Self::Reader>, TransportError> {
        self.open_recover_stream(resume_token)
            .await
            .map_err(Into::into)
    }
}
