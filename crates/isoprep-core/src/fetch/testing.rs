//! Scripted transport for tests: replays canned replies and records URLs.

use super::transport::{BodySink, GetRequest, HttpTransport};
use crate::retry::FetchError;
use std::collections::VecDeque;

/// One canned reply.
#[derive(Debug, Clone)]
pub(crate) enum Reply {
    Body(Vec<u8>),
    BodyNoLength(Vec<u8>),
    Status(u32),
    Reset,
    PartialThenReset(Vec<u8>),
}

#[derive(Debug, Default)]
pub(crate) struct ScriptedTransport {
    replies: VecDeque<Reply>,
    /// Served once the script runs out; `None` means 404.
    pub fallback: Option<Vec<u8>>,
    pub calls: Vec<String>,
}

impl ScriptedTransport {
    pub fn new(replies: Vec<Reply>) -> Self {
        Self {
            replies: replies.into(),
            ..Self::default()
        }
    }

    /// Always serve `body`.
    pub fn serving(body: &[u8]) -> Self {
        Self {
            fallback: Some(body.to_vec()),
            ..Self::default()
        }
    }

    pub fn push(&mut self, reply: Reply) {
        self.replies.push_back(reply);
    }
}

fn reset() -> FetchError {
    FetchError::Io(std::io::Error::from(std::io::ErrorKind::ConnectionReset))
}

fn stream(sink: &mut dyn BodySink, body: &[u8], chunk: usize) -> Result<(), FetchError> {
    for part in body.chunks(chunk.max(1)) {
        sink.write_chunk(part)?;
    }
    Ok(())
}

impl HttpTransport for ScriptedTransport {
    fn get(&mut self, request: &GetRequest<'_>, sink: &mut dyn BodySink) -> Result<(), FetchError> {
        self.calls.push(request.url.to_string());
        let reply = match self.replies.pop_front() {
            Some(r) => r,
            None => match &self.fallback {
                Some(body) => Reply::Body(body.clone()),
                None => Reply::Status(404),
            },
        };
        match reply {
            Reply::Body(body) => {
                sink.content_length(Some(body.len() as u64));
                stream(sink, &body, request.chunk_size)
            }
            Reply::BodyNoLength(body) => {
                sink.content_length(None);
                stream(sink, &body, request.chunk_size)
            }
            Reply::Status(code) => Err(FetchError::Http(code)),
            Reply::Reset => Err(reset()),
            Reply::PartialThenReset(body) => {
                sink.content_length(Some(body.len() as u64 * 2));
                stream(sink, &body, request.chunk_size)?;
                Err(reset())
            }
        }
    }
}
