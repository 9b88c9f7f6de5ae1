//! Read-idle timeout for the feed socket.
//!
//! A silently dead connection produces no error, so [`TimeoutStream`] ends the stream once no
//! item has arrived for the configured period and records that it did so.

use futures::Stream;
use std::{
    pin::Pin,
    task::{Context, Poll},
    time::Duration,
};
use tokio::time::{Instant, Sleep};

/// Default read-idle timeout of the feed socket.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug)]
pub struct TimeoutStream<S> {
    inner: S,
    timeout: Duration,
    deadline: Pin<Box<Sleep>>,
    timed_out: bool,
}

impl<S> TimeoutStream<S> {
    pub fn new(inner: S, timeout: Duration) -> Self {
        Self {
            inner,
            timeout,
            deadline: Box::pin(tokio::time::sleep(timeout)),
            timed_out: false,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// True once the stream has ended because the idle deadline elapsed.
    pub fn timed_out(&self) -> bool {
        self.timed_out
    }

    pub fn get_mut(&mut self) -> &mut S {
        &mut self.inner
    }
}

impl<S> Stream for TimeoutStream<S>
where
    S: Stream + Unpin,
{
    type Item = S::Item;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.timed_out {
            return Poll::Ready(None);
        }

        let timeout = self.timeout;

        match Pin::new(&mut self.inner).poll_next(cx) {
            Poll::Ready(Some(item)) => {
                self.deadline.as_mut().reset(Instant::now() + timeout);
                Poll::Ready(Some(item))
            }
            Poll::Ready(None) => Poll::Ready(None),
            Poll::Pending => match self.deadline.as_mut().poll(cx) {
                Poll::Ready(()) => {
                    tracing::warn!(
                        timeout_secs = timeout.as_secs(),
                        "feed read timeout, no data received"
                    );
                    self.timed_out = true;
                    Poll::Ready(None)
                }
                Poll::Pending => Poll::Pending,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test(start_paused = true)]
    async fn test_timeout_stream_ends_after_idle_period() {
        let mut stream = TimeoutStream::new(
            futures::stream::iter(vec![1, 2]).chain(futures::stream::pending()),
            Duration::from_secs(120),
        );

        assert_eq!(stream.next().await, Some(1));
        assert_eq!(stream.next().await, Some(2));
        assert!(!stream.timed_out());

        let started = Instant::now();
        assert_eq!(stream.next().await, None);
        assert!(stream.timed_out());
        assert!(started.elapsed() >= Duration::from_secs(120));

        // Stays terminated once timed out
        assert_eq!(stream.next().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_stream_passes_through_normal_end() {
        let mut stream = TimeoutStream::new(futures::stream::iter(vec![7]), Duration::from_secs(1));

        assert_eq!(stream.next().await, Some(7));
        assert_eq!(stream.next().await, None);
        assert!(!stream.timed_out());
    }
}
