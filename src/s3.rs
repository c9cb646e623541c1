use std::io::Read;
use std::time::Duration;

use aws_config::BehaviorVersion;
use aws_config::timeout::TimeoutConfig;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use tokio::runtime::Runtime;
use tracing::{debug, warn};

use crate::domain::S3_SCHEME_PREFIX;
use crate::error::SyncError;
use crate::transfer::{FetchedObject, ObjectSink};

const MIB: usize = 1024 * 1024;

/// Bodies larger than one part go through a multipart upload.
pub const DEFAULT_PART_SIZE: usize = 64 * MIB;
/// Smallest part S3 accepts for every part but the last.
pub const MIN_PART_SIZE: usize = 5 * MIB;

#[derive(Debug, Clone)]
pub struct StorageSettings {
    pub region: Option<String>,
    /// S3-compatible endpoint; switches the client to path-style addressing.
    pub endpoint_url: Option<String>,
    /// Upper bound on each storage operation, every multipart call included.
    pub timeout: Option<Duration>,
    pub part_size: usize,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            region: None,
            endpoint_url: None,
            timeout: None,
            part_size: DEFAULT_PART_SIZE,
        }
    }
}

/// The write calls of one object upload. A body that fits in one part is
/// sent with `put_whole`; anything larger uses the multipart calls.
pub trait PartUploader {
    fn put_whole(&self, body: Vec<u8>) -> Result<(), SyncError>;
    fn begin(&self) -> Result<String, SyncError>;
    /// Returns the part's entity tag.
    fn part(&self, upload_id: &str, number: i32, body: Vec<u8>) -> Result<String, SyncError>;
    fn complete(&self, upload_id: &str, parts: Vec<(i32, String)>) -> Result<(), SyncError>;
    fn abort(&self, upload_id: &str) -> Result<(), SyncError>;
}

/// Streams `body` into `uploader` in `part_size` chunks and returns the
/// number of bytes written. At most two chunks are held at once. A failed
/// multipart upload is aborted before the error is returned.
pub fn upload_chunked<R: Read>(
    uploader: &dyn PartUploader,
    mut body: R,
    part_size: usize,
) -> Result<u64, SyncError> {
    let part_size = part_size.max(1);
    let first = read_chunk(&mut body, part_size)?;
    if first.len() < part_size {
        let size = first.len() as u64;
        uploader.put_whole(first)?;
        return Ok(size);
    }
    let second = read_chunk(&mut body, part_size)?;
    if second.is_empty() {
        let size = first.len() as u64;
        uploader.put_whole(first)?;
        return Ok(size);
    }

    let upload_id = uploader.begin()?;
    match upload_parts(uploader, &upload_id, [first, second], &mut body, part_size) {
        Ok(size) => Ok(size),
        Err(err) => {
            if let Err(abort_err) = uploader.abort(&upload_id) {
                warn!(upload_id = %upload_id, error = %abort_err, "multipart abort failed");
            }
            Err(err)
        }
    }
}

fn upload_parts<R: Read>(
    uploader: &dyn PartUploader,
    upload_id: &str,
    pending: [Vec<u8>; 2],
    body: &mut R,
    part_size: usize,
) -> Result<u64, SyncError> {
    let mut parts = Vec::new();
    let mut size = 0u64;
    let mut upload = |chunk: Vec<u8>, parts: &mut Vec<(i32, String)>| {
        let number = parts.len() as i32 + 1;
        size += chunk.len() as u64;
        let tag = uploader.part(upload_id, number, chunk)?;
        parts.push((number, tag));
        Ok::<_, SyncError>(())
    };

    for chunk in pending {
        upload(chunk, &mut parts)?;
    }
    loop {
        let chunk = read_chunk(body, part_size)?;
        if chunk.is_empty() {
            break;
        }
        upload(chunk, &mut parts)?;
    }

    debug!(upload_id, parts = parts.len(), "multipart upload assembled");
    uploader.complete(upload_id, parts)?;
    Ok(size)
}

// A short chunk means the body is exhausted.
fn read_chunk<R: Read>(body: &mut R, part_size: usize) -> Result<Vec<u8>, SyncError> {
    let mut chunk = Vec::with_capacity(part_size);
    Read::take(&mut *body, part_size as u64)
        .read_to_end(&mut chunk)
        .map_err(|err| SyncError::Network(format!("read body: {err}")))?;
    Ok(chunk)
}

/// Object sink backed by the AWS SDK. The SDK is async, the rest of the
/// pipeline is blocking, so the sink owns a runtime and blocks on each call.
pub struct S3Sink {
    runtime: Runtime,
    client: Client,
    part_size: usize,
}

impl S3Sink {
    pub fn new(settings: &StorageSettings) -> Result<Self, SyncError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .map_err(|err| SyncError::Runtime(err.to_string()))?;

        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = &settings.region {
            loader = loader.region(Region::new(region.clone()));
        }
        if let Some(endpoint) = &settings.endpoint_url {
            loader = loader.endpoint_url(endpoint);
        }
        if let Some(timeout) = settings.timeout {
            loader = loader.timeout_config(
                TimeoutConfig::builder().operation_timeout(timeout).build(),
            );
        }
        let sdk_config = runtime.block_on(loader.load());

        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(settings.endpoint_url.is_some())
            .build();
        let client = Client::from_conf(s3_config);

        Ok(Self {
            runtime,
            client,
            part_size: settings.part_size.max(MIN_PART_SIZE),
        })
    }
}

impl ObjectSink for S3Sink {
    fn put(&self, key: &str, object: FetchedObject) -> Result<u64, SyncError> {
        let (bucket, object_key) = split_object_key(key)?;
        let upload = ObjectUpload {
            sink: self,
            bucket,
            key: object_key,
            content_type: object.content_type,
        };
        let size = upload_chunked(&upload, object.body, self.part_size)?;
        debug!(bucket, key = object_key, bytes = size, "object stored");
        Ok(size)
    }
}

struct ObjectUpload<'a> {
    sink: &'a S3Sink,
    bucket: &'a str,
    key: &'a str,
    content_type: Option<String>,
}

impl PartUploader for ObjectUpload<'_> {
    fn put_whole(&self, body: Vec<u8>) -> Result<(), SyncError> {
        let request = self
            .sink
            .client
            .put_object()
            .bucket(self.bucket)
            .key(self.key)
            .set_content_type(self.content_type.clone())
            .body(ByteStream::from(body));
        self.sink
            .runtime
            .block_on(request.send())
            .map_err(storage_error)?;
        Ok(())
    }

    fn begin(&self) -> Result<String, SyncError> {
        let request = self
            .sink
            .client
            .create_multipart_upload()
            .bucket(self.bucket)
            .key(self.key)
            .set_content_type(self.content_type.clone());
        let output = self
            .sink
            .runtime
            .block_on(request.send())
            .map_err(storage_error)?;
        output
            .upload_id()
            .map(str::to_string)
            .ok_or_else(|| SyncError::Storage("multipart upload id missing".to_string()))
    }

    fn part(&self, upload_id: &str, number: i32, body: Vec<u8>) -> Result<String, SyncError> {
        let request = self
            .sink
            .client
            .upload_part()
            .bucket(self.bucket)
            .key(self.key)
            .upload_id(upload_id)
            .part_number(number)
            .body(ByteStream::from(body));
        let output = self
            .sink
            .runtime
            .block_on(request.send())
            .map_err(storage_error)?;
        output
            .e_tag()
            .map(str::to_string)
            .ok_or_else(|| SyncError::Storage(format!("part {number} returned no etag")))
    }

    fn complete(&self, upload_id: &str, parts: Vec<(i32, String)>) -> Result<(), SyncError> {
        let parts = parts
            .into_iter()
            .map(|(number, tag)| CompletedPart::builder().part_number(number).e_tag(tag).build())
            .collect();
        let request = self
            .sink
            .client
            .complete_multipart_upload()
            .bucket(self.bucket)
            .key(self.key)
            .upload_id(upload_id)
            .multipart_upload(
                CompletedMultipartUpload::builder()
                    .set_parts(Some(parts))
                    .build(),
            );
        self.sink
            .runtime
            .block_on(request.send())
            .map_err(storage_error)?;
        Ok(())
    }

    fn abort(&self, upload_id: &str) -> Result<(), SyncError> {
        let request = self
            .sink
            .client
            .abort_multipart_upload()
            .bucket(self.bucket)
            .key(self.key)
            .upload_id(upload_id);
        self.sink
            .runtime
            .block_on(request.send())
            .map_err(storage_error)?;
        Ok(())
    }
}

fn storage_error<E: std::error::Error>(err: E) -> SyncError {
    SyncError::Storage(DisplayErrorContext(err).to_string())
}

/// Splits `s3://bucket/path/to/object` into `("bucket", "path/to/object")`.
pub fn split_object_key(key: &str) -> Result<(&str, &str), SyncError> {
    let rest = key
        .strip_prefix(S3_SCHEME_PREFIX)
        .ok_or_else(|| SyncError::InvalidObjectKey(key.to_string()))?;
    match rest.split_once('/') {
        Some((bucket, object_key)) if !bucket.is_empty() && !object_key.is_empty() => {
            Ok((bucket, object_key))
        }
        _ => Err(SyncError::InvalidObjectKey(key.to_string())),
    }
}
