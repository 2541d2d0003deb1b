//! Read Streams
//!
//! An event stream with the ordering contract of a streamed file read:
//! `Open`, then `Data` chunks, `End` and `Close`; or `Error` followed by
//! `Close`. Events are pulled with [`ReadStream::next_event`] and nothing is
//! delivered before the scheduler has had a turn after the stream was
//! created, so the creator never misses events.

use std::collections::VecDeque;
use std::io::SeekFrom;

use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use super::encoding::{BufferEncoding, ChunkDecoder};
use super::host_fs::host_error;
use super::types::{FileData, FsError, ReadOptions};

/// Largest chunk a host stream delivers at once.
pub const CHUNK_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Open,
    Data(FileData),
    End,
    Error(FsError),
    Close,
}

pub struct ReadStream {
    path: String,
    encoding: Option<BufferEncoding>,
    queue: VecDeque<StreamEvent>,
    source: Option<HostReader>,
    scheduled: bool,
}

impl ReadStream {
    /// A stream over content that is already in memory.
    ///
    /// `content` is the file's bytes, or the error to report after `Open`.
    pub fn from_memory(path: &str, content: Result<&[u8], FsError>, options: &ReadOptions) -> Self {
        let mut queue = VecDeque::with_capacity(4);
        queue.push_back(StreamEvent::Open);
        match content {
            Err(err) => {
                queue.push_back(StreamEvent::Error(err));
                queue.push_back(StreamEvent::Close);
            }
            Ok(bytes) => {
                let slice = &bytes[options.byte_range(bytes.len())];
                if !slice.is_empty() {
                    queue.push_back(StreamEvent::Data(FileData::from_bytes(
                        slice.to_vec(),
                        options.encoding,
                    )));
                }
                queue.push_back(StreamEvent::End);
                queue.push_back(StreamEvent::Close);
            }
        }
        Self {
            path: path.to_string(),
            encoding: options.encoding,
            queue,
            source: None,
            scheduled: false,
        }
    }

    /// A stream reading `path` from the host filesystem in chunks.
    pub fn from_host(path: &str, options: &ReadOptions) -> Self {
        let start = options.start.unwrap_or(0) as u64;
        let end = options.end_offset().map(|e| e as u64);
        Self {
            path: path.to_string(),
            encoding: options.encoding,
            queue: VecDeque::new(),
            source: Some(HostReader {
                path: path.to_string(),
                start,
                remaining: end.map(|e| e.saturating_sub(start)),
                decoder: options.encoding.map(ChunkDecoder::new),
                state: HostState::Unopened,
            }),
            scheduled: false,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Next event, or `None` once `Close` has been delivered.
    pub async fn next_event(&mut self) -> Option<StreamEvent> {
        if !self.scheduled {
            self.scheduled = true;
            tokio::task::yield_now().await;
        }
        loop {
            if let Some(event) = self.queue.pop_front() {
                tracing::trace!(path = %self.path, ?event, "stream event");
                return Some(event);
            }
            let reader = self.source.as_mut()?;
            reader.advance(&mut self.queue).await;
            if reader.is_done() && self.queue.is_empty() {
                self.source = None;
            }
        }
    }

    /// Drain the stream, returning every event in order.
    pub async fn collect_events(mut self) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.next_event().await {
            events.push(event);
        }
        events
    }

    /// Drain the stream and join its data, failing on the first error event.
    pub async fn read_to_end(mut self) -> Result<FileData, FsError> {
        let mut bytes = Vec::new();
        let mut text = String::new();
        while let Some(event) = self.next_event().await {
            match event {
                StreamEvent::Data(FileData::Buffer(chunk)) => bytes.extend_from_slice(&chunk),
                StreamEvent::Data(FileData::Text(chunk)) => text.push_str(&chunk),
                StreamEvent::Error(err) => return Err(err),
                StreamEvent::Open | StreamEvent::End | StreamEvent::Close => {}
            }
        }
        Ok(match self.encoding {
            Some(_) => FileData::Text(text),
            None => FileData::Buffer(bytes),
        })
    }
}

// ============================================================================
// Host reader
// ============================================================================

enum HostState {
    Unopened,
    Reading(File),
    Done,
}

struct HostReader {
    path: String,
    start: u64,
    remaining: Option<u64>,
    decoder: Option<ChunkDecoder>,
    state: HostState,
}

impl HostReader {
    fn is_done(&self) -> bool {
        matches!(self.state, HostState::Done)
    }

    async fn open(&self) -> Result<File, FsError> {
        let mut file = File::open(&self.path)
            .await
            .map_err(|e| host_error(e, "open", Some(&self.path)))?;
        if self.start > 0 {
            file.seek(SeekFrom::Start(self.start))
                .await
                .map_err(|e| host_error(e, "read", None))?;
        }
        Ok(file)
    }

    /// Push the events produced by one step of reading.
    async fn advance(&mut self, queue: &mut VecDeque<StreamEvent>) {
        match std::mem::replace(&mut self.state, HostState::Done) {
            HostState::Unopened => match self.open().await {
                Ok(file) => {
                    queue.push_back(StreamEvent::Open);
                    self.state = HostState::Reading(file);
                }
                Err(err) => {
                    queue.push_back(StreamEvent::Error(err));
                    queue.push_back(StreamEvent::Close);
                }
            },
            HostState::Reading(mut file) => {
                let want = match self.remaining {
                    Some(left) => left.min(CHUNK_SIZE as u64) as usize,
                    None => CHUNK_SIZE,
                };
                if want == 0 {
                    self.finish(queue);
                    return;
                }
                let mut buf = vec![0u8; want];
                match file.read(&mut buf).await {
                    Ok(0) => self.finish(queue),
                    Ok(n) => {
                        buf.truncate(n);
                        if let Some(left) = self.remaining.as_mut() {
                            *left -= n as u64;
                        }
                        self.push_chunk(buf, queue);
                        self.state = HostState::Reading(file);
                    }
                    Err(err) => {
                        queue.push_back(StreamEvent::Error(host_error(err, "read", None)));
                        queue.push_back(StreamEvent::Close);
                    }
                }
            }
            HostState::Done => {}
        }
    }

    fn push_chunk(&mut self, chunk: Vec<u8>, queue: &mut VecDeque<StreamEvent>) {
        match self.decoder.as_mut() {
            Some(decoder) => {
                let text = decoder.write(&chunk);
                if !text.is_empty() {
                    queue.push_back(StreamEvent::Data(FileData::Text(text)));
                }
            }
            None => queue.push_back(StreamEvent::Data(FileData::Buffer(chunk))),
        }
    }

    fn finish(&mut self, queue: &mut VecDeque<StreamEvent>) {
        if let Some(decoder) = self.decoder.as_mut() {
            let tail = decoder.finish();
            if !tail.is_empty() {
                queue.push_back(StreamEvent::Data(FileData::Text(tail)));
            }
        }
        queue.push_back(StreamEvent::End);
        queue.push_back(StreamEvent::Close);
    }
}

// ============================================================================
// Tests
// ============================================================================
