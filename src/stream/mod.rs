//! Video range streaming
//!
//! Serves a file, or one byte range of it, as a lazy chunked body. The file
//! is opened per request and seeked once; chunks are read in order until
//! the end of the range. Dropping the response (client gone) drops the
//! stream and with it the file handle.

pub mod range;

use std::io::SeekFrom;
use std::path::Path;

use axum::body::Body;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::Response;
use bytes::Bytes;
use futures_util::stream::{self, Stream};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use crate::error::{LibraryError, Result};

pub use range::{parse_range, ByteRange};

/// Respond with `path`, honouring an optional `Range` header
pub async fn stream_file(
    path: &Path,
    range_header: Option<&str>,
    chunk_size: usize,
) -> Result<Response> {
    let mut file = File::open(path)
        .await
        .map_err(|e| LibraryError::from_io(e, path))?;
    let meta = file.metadata().await?;
    if !meta.is_file() {
        return Err(LibraryError::NotFound(path.display().to_string()));
    }
    let size = meta.len();

    let range = parse_range(range_header, size)?;
    let (status, start, length) = match range {
        Some(r) => (StatusCode::PARTIAL_CONTENT, r.start, r.len()),
        None => (StatusCode::OK, 0, size),
    };
    if start > 0 {
        file.seek(SeekFrom::Start(start)).await?;
    }
    tracing::debug!(
        path = %path.display(),
        size,
        start,
        length,
        partial = range.is_some(),
        "streaming file"
    );

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut builder = Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, content_type_for(path))
        .header(header::CONTENT_LENGTH, length)
        .header(header::ACCEPT_RANGES, "bytes")
        .header(header::CONTENT_DISPOSITION, content_disposition(&name));
    if let Some(r) = range {
        builder = builder.header(header::CONTENT_RANGE, r.content_range(size));
    }

    let body = Body::from_stream(chunked(file, length, chunk_size.max(1)));
    builder
        .body(body)
        .map_err(|e| LibraryError::Internal(format!("response build failed: {}", e)))
}

/// Read `remaining` bytes from the current position in chunks of at most
/// `chunk_size`.
pub fn chunked(
    file: File,
    remaining: u64,
    chunk_size: usize,
) -> impl Stream<Item = std::io::Result<Bytes>> + Send + 'static {
    stream::try_unfold((file, remaining), move |(mut file, remaining)| async move {
        if remaining == 0 {
            return Ok(None);
        }
        let want = remaining.min(chunk_size as u64) as usize;
        let mut buf = vec![0u8; want];
        let n = file.read(&mut buf).await?;
        if n == 0 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "file shrank while streaming",
            ));
        }
        buf.truncate(n);
        Ok(Some((Bytes::from(buf), (file, remaining - n as u64))))
    })
}

/// `Content-Type` from the file extension, `video/mp4` when unknown
pub fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "mkv" => "video/x-matroska",
        "webm" => "video/webm",
        "avi" => "video/x-msvideo",
        "mov" => "video/quicktime",
        "wmv" => "video/x-ms-wmv",
        "flv" => "video/x-flv",
        _ => "video/mp4",
    }
}

/// `inline` disposition. Names that are not plain ASCII get an ASCII
/// fallback plus an RFC 5987 `filename*`.
pub fn content_disposition(name: &str) -> HeaderValue {
    let ascii: String = name
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_ascii_graphic() || c == ' ' => c,
            _ => '_',
        })
        .collect();

    let value = if ascii == name {
        format!("inline; filename=\"{}\"", ascii)
    } else {
        format!(
            "inline; filename=\"{}\"; filename*=UTF-8''{}",
            ascii,
            percent_encode(name)
        )
    };
    HeaderValue::from_str(&value).unwrap_or_else(|_| HeaderValue::from_static("inline"))
}

fn percent_encode(s: &str) -> String {
    let mut out = String::with_capacity(s.len() * 3);
    for b in s.bytes() {
        if b.is_ascii_alphanumeric() || b"-._~".contains(&b) {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{:02X}", b));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;
    use tempfile::TempDir;

    fn sample(dir: &TempDir, name: &str, size: usize) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let data: Vec<u8> = (0..size).map(|i| (i % 251) as u8).collect();
        std::fs::write(&path, data).unwrap();
        path
    }

    async fn body_bytes(response: Response) -> Vec<u8> {
        axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec()
    }

    #[tokio::test]
    async fn test_full_file() {
        let dir = TempDir::new().unwrap();
        let path = sample(&dir, "a.mp4", 1000);

        let response = stream_file(&path, None, 64).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert_eq!(headers[header::CONTENT_LENGTH], "1000");
        assert_eq!(headers[header::ACCEPT_RANGES], "bytes");
        assert_eq!(headers[header::CONTENT_TYPE], "video/mp4");
        assert_eq!(headers[header::CONTENT_DISPOSITION], "inline; filename=\"a.mp4\"");
        assert!(headers.get(header::CONTENT_RANGE).is_none());

        assert_eq!(body_bytes(response).await, std::fs::read(&path).unwrap());
    }

    #[tokio::test]
    async fn test_partial_content() {
        let dir = TempDir::new().unwrap();
        let path = sample(&dir, "clip.mkv", 1000);
        let data = std::fs::read(&path).unwrap();

        let response = stream_file(&path, Some("bytes=100-199"), 30).await.unwrap();
        assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
        assert_eq!(response.headers()[header::CONTENT_RANGE], "bytes 100-199/1000");
        assert_eq!(response.headers()[header::CONTENT_LENGTH], "100");
        assert_eq!(response.headers()[header::CONTENT_TYPE], "video/x-matroska");
        assert_eq!(body_bytes(response).await, &data[100..200]);

        let response = stream_file(&path, Some("bytes=100-"), 1024 * 1024).await.unwrap();
        assert_eq!(response.headers()[header::CONTENT_RANGE], "bytes 100-999/1000");
        assert_eq!(body_bytes(response).await, &data[100..]);
    }

    #[tokio::test]
    async fn test_invalid_range_and_missing_file() {
        let dir = TempDir::new().unwrap();
        let path = sample(&dir, "a.mp4", 10);

        let err = stream_file(&path, Some("bytes=20-"), 64).await.unwrap_err();
        assert!(matches!(err, LibraryError::InvalidRange(_)));

        let err = stream_file(&dir.path().join("nope.mp4"), None, 64)
            .await
            .unwrap_err();
        assert!(matches!(err, LibraryError::NotFound(_)));

        let err = stream_file(dir.path(), None, 64).await.unwrap_err();
        assert!(matches!(err, LibraryError::NotFound(_) | LibraryError::PermissionDenied(_) | LibraryError::Io(_)));
    }

    #[tokio::test]
    async fn test_chunks_respect_size() {
        let dir = TempDir::new().unwrap();
        let path = sample(&dir, "a.mp4", 250);
        let file = File::open(&path).await.unwrap();

        let sizes: Vec<usize> = chunked(file, 250, 100)
            .map(|c| c.unwrap().len())
            .collect()
            .await;
        assert_eq!(sizes, vec![100, 100, 50]);
    }

    #[test]
    fn test_content_type_for() {
        assert_eq!(content_type_for(Path::new("a.MOV")), "video/quicktime");
        assert_eq!(content_type_for(Path::new("a.webm")), "video/webm");
        assert_eq!(content_type_for(Path::new("a")), "video/mp4");
    }

    #[test]
    fn test_content_disposition_non_ascii() {
        let value = content_disposition("电影 1.mp4");
        assert_eq!(
            value.to_str().unwrap(),
            "inline; filename=\"__ 1.mp4\"; filename*=UTF-8''%E7%94%B5%E5%BD%B1%201.mp4"
        );
    }
}
