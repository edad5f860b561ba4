
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::mpsc;

use crate::{PortfolioError, Result};

/// Fragments buffered between the producer thread and the consumer
pub const DEFAULT_CAPACITY: usize = 32;

/// Ordered text fragments of one generation.
///
/// Dropping the stream closes the channel; the producer notices on its next send.
#[derive(Debug)]
pub struct TokenStream {
    receiver: mpsc::Receiver<Result<String>>,
}

/// Producer half of a [`TokenStream`], used from a blocking thread
#[derive(Debug, Clone)]
pub struct FragmentSender {
    sender: mpsc::Sender<Result<String>>,
}

/// Create a bounded fragment channel
#[inline]
pub fn channel(capacity: usize) -> (FragmentSender, TokenStream) {
    let (sender, receiver) = mpsc::channel(capacity.max(1));
    (FragmentSender { sender }, TokenStream { receiver })
}

impl FragmentSender {
    /// Send a fragment, waiting for room in the buffer.
    ///
    /// Returns `false` once the consumer has gone away. Must not be called from
    /// inside an async runtime.
    #[inline]
    pub fn send(&self, fragment: String) -> bool {
        self.sender.blocking_send(Ok(fragment)).is_ok()
    }

    /// Deliver a terminal error to the consumer
    #[inline]
    pub fn fail(&self, error: PortfolioError) {
        // Nobody is listening if this fails
        let _ = self.sender.blocking_send(Err(error));
    }
}

impl TokenStream {
    /// A finished stream over already generated fragments
    #[inline]
    pub fn from_fragments<I>(fragments: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let fragments: Vec<String> = fragments.into_iter().collect();
        let (sender, receiver) = mpsc::channel(fragments.len().max(1));
        for fragment in fragments {
            // Capacity covers every fragment
            let _ = sender.try_send(Ok(fragment));
        }
        Self { receiver }
    }

    /// Drain the stream and concatenate every fragment
    #[inline]
    pub async fn collect_text(mut self) -> Result<String> {
        let mut text = String::new();
        while let Some(fragment) = self.receiver.recv().await {
            text.push_str(&fragment?);
        }
        Ok(text)
    }
}

impl Stream for TokenStream {
    type Item = Result<String>;

    #[inline]
    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}
