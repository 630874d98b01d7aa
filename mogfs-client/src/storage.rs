//! HTTP transfers to and from storage nodes

use std::convert::Infallible;
use std::io;

use bytes::Bytes;
use futures::TryStreamExt;
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Empty, StreamBody};
use hyper::body::{Frame, Incoming};
use hyper::header::CONTENT_TYPE;
use hyper::{Method, Request, Response, Uri};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client as HttpClient;
use hyper_util::rt::TokioExecutor;
use tokio::io::AsyncRead;
use tokio_util::io::ReaderStream;
use tracing::{debug, warn};

use crate::counting::CountingReader;
use crate::{ClientError, Result};

type RequestBody = UnsyncBoxBody<Bytes, io::Error>;

/// Plain-HTTP client for tracker-assigned storage paths
#[derive(Clone)]
pub struct StorageClient {
    http: HttpClient<HttpConnector, RequestBody>,
}

impl StorageClient {
    pub fn new() -> Self {
        let http = HttpClient::builder(TokioExecutor::new()).build(HttpConnector::new());
        StorageClient { http }
    }

    /// PUT everything `reader` yields to `path`.
    ///
    /// Returns the number of bytes actually sent, whether or not the source
    /// knew its length up front.
    pub async fn put<R>(&self, path: &str, content_type: &str, reader: R) -> Result<u64>
    where
        R: AsyncRead + Send + 'static,
    {
        let uri = parse_path(path)?;
        let reader = CountingReader::new(reader);
        let counter = reader.counter();

        let body = StreamBody::new(ReaderStream::new(reader).map_ok(Frame::data)).boxed_unsync();
        let request = Request::builder()
            .method(Method::PUT)
            .uri(uri)
            .header(CONTENT_TYPE, content_type)
            .body(body)
            .map_err(|e| ClientError::Http(e.to_string()))?;

        let response = self
            .http
            .request(request)
            .await
            .map_err(|e| ClientError::Http(e.to_string()))?;

        let status = response.status();
        // Drain so the connection can be reused
        if let Err(e) = response.into_body().collect().await {
            warn!(path, status = status.as_u16(), error = %e, "failed to drain storage node response");
        }

        if !status.is_success() {
            return Err(ClientError::HttpStatus {
                status: status.as_u16(),
                path: path.to_string(),
            });
        }

        let size = counter.get();
        debug!(path, size, "storage node accepted upload");
        Ok(size)
    }

    /// GET `path`, handing back the response with its body unread
    pub async fn get(&self, path: &str) -> Result<Response<Incoming>> {
        let uri = parse_path(path)?;
        let body = Empty::<Bytes>::new()
            .map_err(|never: Infallible| -> io::Error { match never {} })
            .boxed_unsync();
        let request = Request::builder()
            .method(Method::GET)
            .uri(uri)
            .body(body)
            .map_err(|e| ClientError::Http(e.to_string()))?;

        self.http
            .request(request)
            .await
            .map_err(|e| ClientError::Http(e.to_string()))
    }
}

impl Default for StorageClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Storage paths are absolute `http://` URLs issued by the tracker
fn parse_path(path: &str) -> Result<Uri> {
    let uri = path.parse::<Uri>().map_err(|e| ClientError::InvalidPath {
        path: path.to_string(),
        reason: e.to_string(),
    })?;

    if uri.scheme_str() != Some("http") || uri.authority().is_none() {
        return Err(ClientError::InvalidPath {
            path: path.to_string(),
            reason: "expected an absolute http:// URL".to_string(),
        });
    }

    Ok(uri)
}
