//! Audio sources for streaming recognition.
//!
//! A session pulls audio from an [`AudioSource`] in chunks of at most
//! `chunk_size` bytes until the source reports [`AudioChunk::EndOfStream`].
//! Running out of data temporarily is not end of stream: live sources simply
//! wait for more.

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;
use tracing::debug;

use crate::errors::{SpeechToTextError, SttResult};

/// Result of one read from an audio source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioChunk {
    /// Audio bytes. May be empty, which is not end of stream.
    Data(Bytes),
    /// The producer is done; no more data will follow.
    EndOfStream,
}

/// A pull-based source of raw audio bytes.
#[async_trait]
pub trait AudioSource: Send {
    /// Read up to `max_bytes` bytes, waiting until data is available or the
    /// stream has ended.
    async fn read(&mut self, max_bytes: usize) -> SttResult<AudioChunk>;
}

#[async_trait]
impl AudioSource for Box<dyn AudioSource> {
    async fn read(&mut self, max_bytes: usize) -> SttResult<AudioChunk> {
        (**self).read(max_bytes).await
    }
}

// =============================================================================
// Channel Source
// =============================================================================

/// Create a source fed by live writers, for microphones and other producers
/// that push audio as it becomes available.
///
/// `capacity` bounds the number of buffered writes; writers wait when the
/// session falls behind.
pub fn audio_channel(capacity: usize) -> (AudioWriter, ChannelAudioSource) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let writer = AudioWriter {
        tx: Arc::new(Mutex::new(Some(tx))),
    };
    let source = ChannelAudioSource {
        rx,
        pending: Bytes::new(),
    };
    (writer, source)
}

/// Producer half of [`audio_channel`].
///
/// Clones share the same stream. End of stream is signalled by
/// [`AudioWriter::close`] or by dropping every clone.
#[derive(Clone)]
pub struct AudioWriter {
    tx: Arc<Mutex<Option<mpsc::Sender<Bytes>>>>,
}

impl AudioWriter {
    /// Queue audio bytes for the session.
    ///
    /// # Errors
    /// Fails if the writer was closed or the session is gone.
    pub async fn write(&self, data: impl Into<Bytes>) -> SttResult<()> {
        let tx = self.tx.lock().clone().ok_or_else(|| {
            SpeechToTextError::InvalidArgument("audio stream already closed".to_string())
        })?;
        tx.send(data.into()).await.map_err(|_| {
            SpeechToTextError::ConnectionError("recognition session has ended".to_string())
        })
    }

    /// Signal end of stream. Idempotent; writes already queued are still
    /// delivered.
    pub fn close(&self) {
        if self.tx.lock().take().is_some() {
            debug!("Audio writer closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.lock().as_ref().is_none_or(|tx| tx.is_closed())
    }
}

impl std::fmt::Debug for AudioWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioWriter")
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Consumer half of [`audio_channel`].
#[derive(Debug)]
pub struct ChannelAudioSource {
    rx: mpsc::Receiver<Bytes>,
    /// Remainder of a write larger than the last read.
    pending: Bytes,
}

#[async_trait]
impl AudioSource for ChannelAudioSource {
    async fn read(&mut self, max_bytes: usize) -> SttResult<AudioChunk> {
        if self.pending.is_empty() {
            match self.rx.recv().await {
                Some(data) => self.pending = data,
                None => return Ok(AudioChunk::EndOfStream),
            }
        }
        let n = max_bytes.min(self.pending.len());
        Ok(AudioChunk::Data(self.pending.split_to(n)))
    }
}

// =============================================================================
// Reader Source
// =============================================================================

/// Source backed by any [`AsyncRead`], e.g. a file or a pipe. End of file is
/// end of stream.
#[derive(Debug)]
pub struct ReaderAudioSource<R> {
    reader: R,
    buf: BytesMut,
}

impl<R> ReaderAudioSource<R>
where
    R: AsyncRead + Unpin + Send,
{
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: BytesMut::new(),
        }
    }

    pub fn into_inner(self) -> R {
        self.reader
    }
}

impl ReaderAudioSource<tokio::fs::File> {
    /// Open an audio file.
    pub async fn open(path: impl AsRef<Path>) -> SttResult<Self> {
        let file = tokio::fs::File::open(path.as_ref()).await.map_err(|e| {
            SpeechToTextError::Io(format!("Failed to open {}: {e}", path.as_ref().display()))
        })?;
        Ok(Self::new(file))
    }
}

#[async_trait]
impl<R> AudioSource for ReaderAudioSource<R>
where
    R: AsyncRead + Unpin + Send,
{
    async fn read(&mut self, max_bytes: usize) -> SttResult<AudioChunk> {
        if max_bytes == 0 {
            return Ok(AudioChunk::Data(Bytes::new()));
        }
        // reclaims the allocation once earlier chunks are dropped
        self.buf.reserve(max_bytes);
        let n = (&mut self.reader)
            .take(max_bytes as u64)
            .read_buf(&mut self.buf)
            .await?;
        if n == 0 {
            return Ok(AudioChunk::EndOfStream);
        }
        Ok(AudioChunk::Data(self.buf.split().freeze()))
    }
}

// =============================================================================
// In-memory Source
// =============================================================================

/// Source over an in-memory buffer.
#[derive(Debug, Clone, Default)]
pub struct BytesAudioSource {
    data: Bytes,
}

impl BytesAudioSource {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self { data: data.into() }
    }
}

#[async_trait]
impl AudioSource for BytesAudioSource {
    async fn read(&mut self, max_bytes: usize) -> SttResult<AudioChunk> {
        if self.data.is_empty() {
            return Ok(AudioChunk::EndOfStream);
        }
        let n = max_bytes.min(self.data.len());
        Ok(AudioChunk::Data(self.data.split_to(n)))
    }
}
