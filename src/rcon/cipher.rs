use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{RconError, Result};

/// Repeating-key XOR keystream with a byte-exact running position.
///
/// The position carries across calls: applying a message in chunks produces
/// the same bytes as applying it whole. XOR is its own inverse, so the same
/// routine encrypts and decrypts; a fresh keystream on the decode side
/// recovers what a fresh keystream encoded.
#[derive(Debug, Clone)]
pub struct XorKeystream {
    key: Vec<u8>,
    pos: usize,
}

impl XorKeystream {
    /// The key is server-supplied and must be non-empty.
    pub fn new(key: &[u8]) -> Result<Self> {
        if key.is_empty() {
            return Err(RconError::Protocol("key not established".into()));
        }
        Ok(Self {
            key: key.to_vec(),
            pos: 0,
        })
    }

    /// XOR `data` against the keystream starting at the current position,
    /// then advance the position by `data.len()`.
    pub fn apply(&mut self, data: &[u8]) -> Vec<u8> {
        let out = data
            .iter()
            .enumerate()
            .map(|(i, b)| b ^ self.key[self.pos.wrapping_add(i) % self.key.len()])
            .collect();
        self.pos = self.pos.wrapping_add(data.len());
        out
    }
}

/// A raw bidirectional byte stream with symmetric XOR obfuscation on both
/// directions. Owns the session key; each direction gets its own keystream so
/// inbound and outbound positions stay byte-exact independently.
///
/// Until the key is established, `send` and `recv` refuse to touch the
/// transport.
#[derive(Debug)]
pub struct CipherStream<S> {
    inner: S,
    tx: Option<XorKeystream>,
    rx: Option<XorKeystream>,
}

impl<S> CipherStream<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            tx: None,
            rx: None,
        }
    }

    pub fn has_key(&self) -> bool {
        self.tx.is_some()
    }

    /// Install the session key for both directions. Rejects an empty key.
    pub fn set_key(&mut self, key: &[u8]) -> Result<()> {
        self.tx = Some(XorKeystream::new(key)?);
        self.rx = Some(XorKeystream::new(key)?);
        Ok(())
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin> CipherStream<S> {
    /// Read one raw (unobfuscated) frame of at most `max` bytes. Used for the
    /// key frame, which the server sends in the clear. Returns an empty
    /// buffer on EOF.
    pub async fn recv_raw(&mut self, max: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; max];
        let n = self.inner.read(&mut buf).await?;
        buf.truncate(n);
        Ok(buf)
    }

    /// Obfuscate and send `plaintext` as one frame.
    pub async fn send(&mut self, plaintext: &[u8]) -> Result<()> {
        let tx = self
            .tx
            .as_mut()
            .ok_or_else(|| RconError::Protocol("key not established".into()))?;
        let frame = tx.apply(plaintext);
        self.inner.write_all(&frame).await?;
        Ok(())
    }

    /// Read one obfuscated frame of at most `max` bytes and decode it.
    /// Returns an empty buffer on EOF.
    pub async fn recv(&mut self, max: usize) -> Result<Vec<u8>> {
        let rx = self
            .rx
            .as_mut()
            .ok_or_else(|| RconError::Protocol("key not established".into()))?;
        let mut buf = vec![0u8; max];
        let n = self.inner.read(&mut buf).await?;
        if n == 0 {
            return Ok(Vec::new());
        }
        Ok(rx.apply(&buf[..n]))
    }
}
