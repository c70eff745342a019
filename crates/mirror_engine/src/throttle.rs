use std::future::Future;
use std::io;
use std::pin::Pin;
use std::task::{ready, Context, Poll};
use std::time::Duration;

use tokio::io::{AsyncRead, ReadBuf};
use tokio::time::{sleep_until, Instant, Sleep};

const WINDOW: Duration = Duration::from_secs(1);

/// Caps the bytes per second read from a single download stream.
///
/// Reads are truncated to what is left of the current one-second window.
/// Once the window's budget is spent, the next read first sleeps until the
/// window ends, so an exhausted budget never spins or yields a zero-byte
/// read (which would look like end of stream).
pub struct BandwidthThrottle<R> {
    inner: R,
    limit: Option<u64>,
    bytes_in_window: u64,
    window_start: Instant,
    pause: Option<Pin<Box<Sleep>>>,
}

impl<R> BandwidthThrottle<R> {
    /// `limit` is bytes per second; `None` or zero reads unthrottled.
    pub fn new(inner: R, limit: Option<u64>) -> Self {
        Self {
            inner,
            limit: limit.filter(|l| *l > 0),
            bytes_in_window: 0,
            window_start: Instant::now(),
            pause: None,
        }
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for BandwidthThrottle<R> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let Some(limit) = this.limit else {
            return Pin::new(&mut this.inner).poll_read(cx, buf);
        };

        let allowed = loop {
            if let Some(pause) = this.pause.as_mut() {
                ready!(pause.as_mut().poll(cx));
                this.pause = None;
            }
            let now = Instant::now();
            if now.duration_since(this.window_start) >= WINDOW {
                this.bytes_in_window = 0;
                this.window_start = now;
            }
            let allowed = limit.saturating_sub(this.bytes_in_window);
            if allowed > 0 {
                break allowed;
            }
            this.pause = Some(Box::pin(sleep_until(this.window_start + WINDOW)));
        };

        let want = buf
            .remaining()
            .min(usize::try_from(allowed).unwrap_or(usize::MAX));
        if want == 0 {
            return Poll::Ready(Ok(()));
        }

        let mut limited = ReadBuf::new(buf.initialize_unfilled_to(want));
        ready!(Pin::new(&mut this.inner).poll_read(cx, &mut limited))?;
        let read = limited.filled().len();
        buf.advance(read);

        this.bytes_in_window += read as u64;
        if this.bytes_in_window >= limit {
            this.pause = Some(Box::pin(sleep_until(this.window_start + WINDOW)));
        }
        Poll::Ready(Ok(()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[tokio::test(start_paused = true)]
    async fn reading_more_than_rate_takes_whole_windows() {
        let data = vec![7u8; 25];
        let mut reader = BandwidthThrottle::new(&data[..], Some(10));

        let start = Instant::now();
        let mut out = Vec::new();
        reader.read_to_end(&mut out).await.unwrap();

        assert_eq!(out, data);
        // floor(25 / 10) = 2 seconds
        assert!(start.elapsed() >= Duration::from_secs(2));
        assert!(start.elapsed() < Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn reads_are_truncated_to_window_budget() {
        let data = vec![1u8; 64];
        let mut reader = BandwidthThrottle::new(&data[..], Some(10));
        let mut buf = [0u8; 64];

        let first = reader.read(&mut buf).await.unwrap();
        assert_eq!(first, 10);

        let start = Instant::now();
        let second = reader.read(&mut buf).await.unwrap();
        assert_eq!(second, 10);
        assert!(start.elapsed() >= Duration::from_millis(999));
    }

    #[tokio::test(start_paused = true)]
    async fn partial_window_reads_accumulate() {
        let data = vec![2u8; 12];
        let mut reader = BandwidthThrottle::new(&data[..], Some(10));
        let mut buf = [0u8; 4];

        let start = Instant::now();
        let mut total = 0;
        for _ in 0..2 {
            total += reader.read(&mut buf).await.unwrap();
        }
        assert_eq!(total, 8);
        assert_eq!(start.elapsed(), Duration::ZERO);

        // 2 bytes left in the window, then the budget is spent
        assert_eq!(reader.read(&mut buf).await.unwrap(), 2);
        assert_eq!(reader.read(&mut buf).await.unwrap(), 2);
        assert!(start.elapsed() >= Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn unlimited_reader_passes_through() {
        let data = vec![3u8; 4096];
        let mut reader = BandwidthThrottle::new(&data[..], None);
        let start = Instant::now();
        let mut out = Vec::new();
        reader.read_to_end(&mut out).await.unwrap();
        assert_eq!(out.len(), 4096);
        assert_eq!(start.elapsed(), Duration::ZERO);

        let zero = BandwidthThrottle::new(&data[..], Some(0));
        assert!(zero.limit.is_none());
    }
}
