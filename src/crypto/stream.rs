//! Repeating-key XOR over byte streams.
//!
//! Byte `i` of a stream is combined with `key[i % KEY_LEN]`. Every direction
//! of every session owns its own [`Obfuscator`], so both ends of a logical
//! stream count positions from zero and their transforms line up.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{ready, Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

use crate::crypto::key::{SecretKey, KEY_LEN};

/// Position-tracking cursor over the key stream.
#[derive(Debug, Clone)]
pub struct Obfuscator {
    key: Arc<SecretKey>,
    position: u64,
}

impl Obfuscator {
    pub fn new(key: Arc<SecretKey>) -> Self {
        Self { key, position: 0 }
    }

    /// Stream offset of the next byte to be transformed.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Transform `data` as the bytes at the current position and advance past them.
    pub fn apply(&mut self, data: &mut [u8]) {
        self.transform(data);
        self.advance(data.len());
    }

    /// Transform `data` as the bytes at the current position without advancing.
    pub fn transform(&self, data: &mut [u8]) {
        let key = self.key.as_bytes();
        let mut index = (self.position % KEY_LEN as u64) as usize;
        for byte in data.iter_mut() {
            *byte ^= key[index];
            index += 1;
            if index == KEY_LEN {
                index = 0;
            }
        }
    }

    pub fn advance(&mut self, n: usize) {
        self.position += n as u64;
    }
}

/// Reader decorator that transforms exactly the bytes each read returns.
#[derive(Debug)]
pub struct ObfuscatedReader<R> {
    inner: R,
    obfuscator: Obfuscator,
}

impl<R> ObfuscatedReader<R> {
    pub fn new(inner: R, key: Arc<SecretKey>) -> Self {
        Self {
            inner,
            obfuscator: Obfuscator::new(key),
        }
    }

    pub fn position(&self) -> u64 {
        self.obfuscator.position()
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for ObfuscatedReader<R> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        let this = self.get_mut();
        let before = buf.filled().len();
        // Errors pass through untouched; nothing was returned so nothing advances.
        ready!(Pin::new(&mut this.inner).poll_read(cx, buf))?;
        this.obfuscator.apply(&mut buf.filled_mut()[before..]);
        Poll::Ready(Ok(()))
    }
}

/// Writer decorator that transforms a copy of each buffer before delegating.
///
/// The position advances by the number of bytes the inner writer accepted, so
/// a caller retrying the unaccepted tail of its own (untransformed) buffer stays
/// aligned with the reader on the other end.
#[derive(Debug)]
pub struct ObfuscatedWriter<W> {
    inner: W,
    obfuscator: Obfuscator,
    scratch: Vec<u8>,
}

impl<W> ObfuscatedWriter<W> {
    pub fn new(inner: W, key: Arc<SecretKey>) -> Self {
        Self {
            inner,
            obfuscator: Obfuscator::new(key),
            scratch: Vec::new(),
        }
    }

    pub fn position(&self) -> u64 {
        self.obfuscator.position()
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: AsyncWrite + Unpin> AsyncWrite for ObfuscatedWriter<W> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        let this = self.get_mut();
        this.scratch.clear();
        this.scratch.extend_from_slice(buf);
        this.obfuscator.transform(&mut this.scratch);

        let written = ready!(Pin::new(&mut this.inner).poll_write(cx, &this.scratch))?;
        this.obfuscator.advance(written);
        Poll::Ready(Ok(written))
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }
}
