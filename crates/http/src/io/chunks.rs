#[cfg(test)]
use std::collections::VecDeque;

use bytes::Bytes;
use reqwest::Response;
#[cfg(test)]
use tokio::sync::mpsc;

/// A failure while reading the response body.
#[derive(Debug, PartialEq, Eq)]
pub struct Error(pub String);

/// An adapter for streaming byte chunks.
pub enum Chunks {
    Response(Response),
    #[cfg(test)]
    VecDeque(VecDeque<Bytes>),
    #[cfg(test)]
    Receiver(mpsc::UnboundedReceiver<Result<Bytes, Error>>),
}

impl Chunks {
    pub fn from_response(response: Response) -> Self {
        Chunks::Response(response)
    }

    #[cfg(test)]
    pub fn from_vec_deque(vec: VecDeque<Bytes>) -> Self {
        Chunks::VecDeque(vec)
    }

    #[cfg(test)]
    pub fn from_receiver(
        rx: mpsc::UnboundedReceiver<Result<Bytes, Error>>,
    ) -> Self {
        Chunks::Receiver(rx)
    }

    /// Reads the next chunk, `None` meaning the body has ended.
    #[inline]
    pub async fn next_chunk(&mut self) -> Result<Option<Bytes>, Error> {
        match self {
            Chunks::Response(response) => {
                response.chunk().await.map_err(|err| Error(format!("{err}")))
            }
            #[cfg(test)]
            Chunks::VecDeque(vec) => {
                let chunk = vec.pop_front();
                Ok(chunk)
            }
            #[cfg(test)]
            Chunks::Receiver(rx) => rx.recv().await.transpose(),
        }
    }
}
