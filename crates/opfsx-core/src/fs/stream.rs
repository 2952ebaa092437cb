//! Chunked, byte-range-aware transfer between a source and a sink.
//!
//! [`pipe`] pulls one chunk at a time and writes it before issuing the next
//! read, so at most one chunk is ever in flight. The byte sources and sinks
//! are traits so that store files, host files and in-memory buffers can be
//! wired together freely.

use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio_util::io::ReaderStream;
use tokio_util::sync::CancellationToken;

use crate::error::{CoreError, CoreResult};

/// Default read size for sources that chunk their own data.
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// A pull-based producer of byte chunks.
#[async_trait]
pub trait ByteSource: Send {
    /// Reads the next chunk, or `None` once the source is exhausted.
    async fn read_chunk(&mut self) -> CoreResult<Option<Vec<u8>>>;

    /// Abandons the source. Later reads fail with [`CoreError::Cancelled`].
    async fn cancel(&mut self) {}
}

/// A consumer of byte chunks.
#[async_trait]
pub trait ByteSink: Send {
    /// Writes a whole chunk.
    async fn write(&mut self, chunk: &[u8]) -> CoreResult<()>;

    /// Flushes and commits everything written so far.
    async fn close(&mut self) -> CoreResult<()>;

    /// Gives up on the sink after a failure. Bytes already written may stay.
    async fn abort(&mut self) {}
}

/// Snapshot of transfer progress handed to `on_progress`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress {
    /// Bytes written to the sink so far.
    pub loaded: u64,
    /// `loaded / total * 100`, rounded to two decimals.
    pub percent: f64,
    /// The total size the caller announced.
    pub total: u64,
}

type ChunkHook<'a> = Box<dyn FnMut(&[u8]) + Send + 'a>;
type ProgressHook<'a> = Box<dyn FnMut(Progress) + Send + 'a>;
type DoneHook<'a> = Box<dyn FnOnce() + Send + 'a>;
type ErrorHook<'a> = Box<dyn FnOnce(&CoreError) + Send + 'a>;

/// Byte range and callbacks for a single [`pipe`] call.
#[derive(Default)]
pub struct PipeOptions<'a> {
    offset: u64,
    length: Option<u64>,
    on_chunk: Option<ChunkHook<'a>>,
    on_progress: Option<ProgressHook<'a>>,
    on_done: Option<DoneHook<'a>>,
    on_error: Option<ErrorHook<'a>>,
}

impl<'a> PipeOptions<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Skips the first `offset` source bytes.
    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = offset;
        self
    }

    /// Writes at most `length` bytes, then stops reading.
    ///
    /// If the source ends before the budget is spent the transfer fails
    /// with [`CoreError::StoppedPrematurely`].
    pub fn length(mut self, length: u64) -> Self {
        self.length = Some(length);
        self
    }

    pub fn on_chunk(mut self, hook: impl FnMut(&[u8]) + Send + 'a) -> Self {
        self.on_chunk = Some(Box::new(hook));
        self
    }

    pub fn on_progress(mut self, hook: impl FnMut(Progress) + Send + 'a) -> Self {
        self.on_progress = Some(Box::new(hook));
        self
    }

    pub fn on_done(mut self, hook: impl FnOnce() + Send + 'a) -> Self {
        self.on_done = Some(Box::new(hook));
        self
    }

    pub fn on_error(mut self, hook: impl FnOnce(&CoreError) + Send + 'a) -> Self {
        self.on_error = Some(Box::new(hook));
        self
    }
}

/// Copies `source` into `sink`, honouring the byte range in `options`.
///
/// On success the sink is closed, `on_done` fires and the number of bytes
/// written is returned. On any failure the source is cancelled, the sink
/// aborted, `on_error` fires and the error is returned. Exactly one of the
/// two hooks fires per call.
pub async fn pipe(
    source: &mut dyn ByteSource,
    sink: &mut dyn ByteSink,
    total_size: u64,
    mut options: PipeOptions<'_>,
) -> CoreResult<u64> {
    let outcome = match pump(source, sink, total_size, &mut options).await {
        Ok(loaded) => sink.close().await.map(|()| loaded),
        Err(e) => Err(e),
    };

    match outcome {
        Ok(loaded) => {
            tracing::debug!(loaded, total_size, "pipe finished");
            if let Some(hook) = options.on_done.take() {
                hook();
            }
            Ok(loaded)
        }
        Err(e) => {
            tracing::debug!(error = %e, "pipe failed");
            source.cancel().await;
            sink.abort().await;
            if let Some(hook) = options.on_error.take() {
                hook(&e);
            }
            Err(e)
        }
    }
}

async fn pump(
    source: &mut dyn ByteSource,
    sink: &mut dyn ByteSink,
    total_size: u64,
    options: &mut PipeOptions<'_>,
) -> CoreResult<u64> {
    let mut skip = options.offset;
    let mut remaining = options.length;
    let mut loaded = 0u64;

    loop {
        if remaining == Some(0) {
            break;
        }

        let Some(chunk) = source.read_chunk().await? else {
            if let (Some(expected), Some(left)) = (options.length, remaining) {
                if left > 0 {
                    return Err(CoreError::StoppedPrematurely {
                        expected,
                        written: loaded,
                    });
                }
            }
            break;
        };

        let mut data: &[u8] = &chunk;
        if skip > 0 {
            let n = skip.min(data.len() as u64) as usize;
            data = &data[n..];
            skip -= n as u64;
        }
        if let Some(left) = remaining.as_mut() {
            if data.len() as u64 > *left {
                data = &data[..*left as usize];
            }
            *left -= data.len() as u64;
        }
        if data.is_empty() {
            continue;
        }

        sink.write(data).await?;
        loaded += data.len() as u64;

        if let Some(hook) = options.on_chunk.as_mut() {
            hook(data);
        }
        if let Some(hook) = options.on_progress.as_mut() {
            hook(Progress {
                loaded,
                percent: percent(loaded, total_size),
                total: total_size,
            });
        }
    }

    Ok(loaded)
}

/// `loaded / total * 100` rounded to two decimals; `0.0` for an empty total.
pub fn percent(loaded: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (loaded as f64 / total as f64 * 10_000.0).round() / 100.0
}

/// Serves an in-memory buffer in fixed-size chunks.
#[derive(Debug)]
pub struct BufferSource {
    data: Arc<Vec<u8>>,
    position: usize,
    chunk_size: usize,
    cancelled: bool,
}

impl BufferSource {
    pub fn new(data: Arc<Vec<u8>>, chunk_size: usize) -> Self {
        Self {
            data,
            position: 0,
            chunk_size: chunk_size.max(1),
            cancelled: false,
        }
    }
}

#[async_trait]
impl ByteSource for BufferSource {
    async fn read_chunk(&mut self) -> CoreResult<Option<Vec<u8>>> {
        if self.cancelled {
            return Err(CoreError::Cancelled);
        }
        if self.position >= self.data.len() {
            return Ok(None);
        }
        let end = (self.position + self.chunk_size).min(self.data.len());
        let chunk = self.data[self.position..end].to_vec();
        self.position = end;
        Ok(Some(chunk))
    }

    async fn cancel(&mut self) {
        self.cancelled = true;
    }
}

/// Collects written chunks into memory.
#[derive(Debug, Default)]
pub struct VecSink {
    buffer: Vec<u8>,
    closed: bool,
}

impl VecSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.buffer
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }
}

#[async_trait]
impl ByteSink for VecSink {
    async fn write(&mut self, chunk: &[u8]) -> CoreResult<()> {
        self.buffer.extend_from_slice(chunk);
        Ok(())
    }

    async fn close(&mut self) -> CoreResult<()> {
        self.closed = true;
        Ok(())
    }
}

/// Adapts any [`AsyncRead`] into a [`ByteSource`].
pub struct ReaderSource<R> {
    stream: Option<ReaderStream<R>>,
}

impl<R: AsyncRead + Unpin + Send> ReaderSource<R> {
    pub fn new(reader: R, chunk_size: usize) -> Self {
        Self {
            stream: Some(ReaderStream::with_capacity(reader, chunk_size.max(1))),
        }
    }
}

#[async_trait]
impl<R: AsyncRead + Unpin + Send> ByteSource for ReaderSource<R> {
    async fn read_chunk(&mut self) -> CoreResult<Option<Vec<u8>>> {
        let stream = self.stream.as_mut().ok_or(CoreError::Cancelled)?;
        match stream.next().await {
            Some(Ok(chunk)) => Ok(Some(chunk.to_vec())),
            Some(Err(e)) => Err(CoreError::Io(e)),
            None => Ok(None),
        }
    }

    async fn cancel(&mut self) {
        self.stream = None;
    }
}

/// Adapts any [`AsyncWrite`] into a [`ByteSink`].
pub struct WriterSink<W> {
    writer: Option<W>,
}

impl<W: AsyncWrite + Unpin + Send> WriterSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Some(writer),
        }
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> ByteSink for WriterSink<W> {
    async fn write(&mut self, chunk: &[u8]) -> CoreResult<()> {
        let writer = self.writer.as_mut().ok_or(CoreError::Cancelled)?;
        writer.write_all(chunk).await?;
        Ok(())
    }

    async fn close(&mut self) -> CoreResult<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush().await?;
            writer.shutdown().await?;
        }
        Ok(())
    }

    async fn abort(&mut self) {
        self.writer = None;
    }
}

/// Wraps a source so an external [`CancellationToken`] can abort it.
///
/// Cancellation surfaces as a failed read, which [`pipe`] routes through
/// its ordinary error path.
pub struct AbortableSource {
    inner: Box<dyn ByteSource>,
    token: CancellationToken,
}

impl AbortableSource {
    pub fn new(inner: Box<dyn ByteSource>, token: CancellationToken) -> Self {
        Self { inner, token }
    }
}

#[async_trait]
impl ByteSource for AbortableSource {
    async fn read_chunk(&mut self) -> CoreResult<Option<Vec<u8>>> {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(CoreError::Cancelled),
            chunk = self.inner.read_chunk() => chunk,
        }
    }

    async fn cancel(&mut self) {
        self.inner.cancel().await;
    }
}
