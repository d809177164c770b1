//! Voice message capture.
//!
//! `Idle -> Recording -> Stopped(clip)`, then back to `Idle` by discarding the
//! clip or accepting it. The microphone is claimed for exactly one session and
//! released when that session ends, including when the recorder is dropped
//! mid-recording.

use crate::classify::{VOICE_CONTENT_TYPE, VOICE_MESSAGE_MARKER};
use crate::client::submission::AttachmentFile;
use bytes::{Bytes, BytesMut};
use chrono::Utc;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("could not start recording; check microphone permissions")]
    PermissionDenied,
    #[error("microphone unavailable: {0}")]
    Unavailable(String),
    #[error("a recording session is already active")]
    Busy,
    #[error("not recording")]
    NotRecording,
}

/// An input device that can be claimed for one recording session.
pub trait Microphone {
    type Stream: CaptureStream;

    fn acquire(&self) -> Result<Self::Stream, CaptureError>;
}

/// A claimed device. `stop` releases it.
pub trait CaptureStream {
    fn stop(&mut self);
}

/// Holds the claimed device; releases it exactly once.
struct ActiveStream<S: CaptureStream> {
    stream: Option<S>,
}

impl<S: CaptureStream> ActiveStream<S> {
    fn release(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.stop();
            debug!("microphone released");
        }
    }
}

impl<S: CaptureStream> Drop for ActiveStream<S> {
    fn drop(&mut self) {
        self.release();
    }
}

/// A finished recording.
#[derive(Clone, Debug, PartialEq)]
pub struct RecordedClip {
    pub bytes: Bytes,
    pub duration_secs: u32,
    pub content_type: &'static str,
}

/// A clip handed over for upload.
#[derive(Clone, Debug, PartialEq)]
pub struct AcceptedRecording {
    pub file: AttachmentFile,
    pub duration_secs: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecorderStatus {
    Idle,
    Recording { elapsed_secs: u32 },
    Stopped { duration_secs: u32 },
}

enum State<S: CaptureStream> {
    Idle,
    Recording {
        stream: ActiveStream<S>,
        chunks: Vec<Bytes>,
        elapsed_secs: u32,
    },
    Stopped {
        clip: RecordedClip,
    },
}

pub struct VoiceRecorder<M: Microphone> {
    microphone: M,
    state: State<M::Stream>,
}

impl<M: Microphone> VoiceRecorder<M> {
    pub fn new(microphone: M) -> Self {
        Self {
            microphone,
            state: State::Idle,
        }
    }

    pub fn status(&self) -> RecorderStatus {
        match &self.state {
            State::Idle => RecorderStatus::Idle,
            State::Recording { elapsed_secs, .. } => RecorderStatus::Recording {
                elapsed_secs: *elapsed_secs,
            },
            State::Stopped { clip } => RecorderStatus::Stopped {
                duration_secs: clip.duration_secs,
            },
        }
    }

    /// The finished clip, while one is held.
    pub fn clip(&self) -> Option<&RecordedClip> {
        match &self.state {
            State::Stopped { clip } => Some(clip),
            _ => None,
        }
    }

    /// Claim the microphone and start buffering. Denial leaves the recorder idle.
    pub fn start(&mut self) -> Result<(), CaptureError> {
        if !matches!(self.state, State::Idle) {
            return Err(CaptureError::Busy);
        }
        let stream = self.microphone.acquire()?;
        self.state = State::Recording {
            stream: ActiveStream {
                stream: Some(stream),
            },
            chunks: Vec::new(),
            elapsed_secs: 0,
        };
        debug!("voice recording started");
        Ok(())
    }

    /// Buffer one chunk of encoded audio. Empty chunks are dropped.
    pub fn push_chunk(&mut self, chunk: Bytes) {
        if let State::Recording { chunks, .. } = &mut self.state {
            if !chunk.is_empty() {
                chunks.push(chunk);
            }
        }
    }

    /// Advance the elapsed counter by one second.
    pub fn tick(&mut self) {
        if let State::Recording { elapsed_secs, .. } = &mut self.state {
            *elapsed_secs += 1;
        }
    }

    /// Finalize the buffered chunks into a clip and release the microphone.
    pub fn stop(&mut self) -> Result<&RecordedClip, CaptureError> {
        if !matches!(self.state, State::Recording { .. }) {
            return Err(CaptureError::NotRecording);
        }
        let State::Recording {
            mut stream,
            chunks,
            elapsed_secs,
        } = std::mem::replace(&mut self.state, State::Idle)
        else {
            return Err(CaptureError::NotRecording);
        };
        stream.release();

        let mut bytes = BytesMut::with_capacity(chunks.iter().map(Bytes::len).sum());
        for chunk in chunks {
            bytes.extend_from_slice(&chunk);
        }

        self.state = State::Stopped {
            clip: RecordedClip {
                bytes: bytes.freeze(),
                duration_secs: elapsed_secs,
                content_type: VOICE_CONTENT_TYPE,
            },
        };
        match &self.state {
            State::Stopped { clip } => Ok(clip),
            _ => Err(CaptureError::NotRecording),
        }
    }

    /// Throw the clip away without emitting it.
    pub fn discard(&mut self) {
        if matches!(self.state, State::Stopped { .. }) {
            self.state = State::Idle;
        }
    }

    /// Hand the clip over as an upload-ready file and reset.
    pub fn accept(&mut self) -> Option<AcceptedRecording> {
        if !matches!(self.state, State::Stopped { .. }) {
            return None;
        }
        let State::Stopped { clip } = std::mem::replace(&mut self.state, State::Idle) else {
            return None;
        };
        Some(AcceptedRecording {
            file: AttachmentFile {
                name: format!(
                    "{}{}.webm",
                    VOICE_MESSAGE_MARKER,
                    Utc::now().timestamp_millis()
                ),
                content_type: Some(clip.content_type.to_string()),
                bytes: clip.bytes,
            },
            duration_secs: clip.duration_secs,
        })
    }
}

/// `m:ss`, as shown next to a recording.
pub fn format_duration(secs: u32) -> String {
    format!("{}:{:02}", secs / 60, secs % 60)
}
