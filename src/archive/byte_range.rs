use std::io::{self, Read, Seek, SeekFrom, Write};

/// A window `[offset, offset + len)` over a larger seekable stream.
///
/// Positions are virtual: position 0 is `offset` in the underlying stream.
/// Reads and writes stop at the end of the window, so one entry's payload can
/// be handed out as an independent file without exposing its neighbours.
#[derive(Debug)]
pub struct ByteRange<T> {
    inner: T,
    offset: u64,
    len: u64,
    pos: u64,
}

impl<T: Seek> ByteRange<T> {
    /// Wrap `inner`, positioned at the start of the window
    pub fn new(mut inner: T, offset: u64, len: u64) -> io::Result<Self> {
        inner.seek(SeekFrom::Start(offset))?;
        Ok(Self {
            inner,
            offset,
            len,
            pos: 0,
        })
    }

    /// Window start in the underlying stream
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Window length
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Current virtual position
    pub fn position(&self) -> u64 {
        self.pos
    }

    /// Bytes left before the end of the window
    pub fn remaining(&self) -> u64 {
        self.len.saturating_sub(self.pos)
    }

    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    pub fn into_inner(self) -> T {
        self.inner
    }

    fn clamp(&self, requested: usize) -> usize {
        requested.min(usize::try_from(self.remaining()).unwrap_or(usize::MAX))
    }
}

impl<T: Read + Seek> Read for ByteRange<T> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.clamp(buf.len());
        if n == 0 {
            return Ok(0);
        }
        let read = self.inner.read(&mut buf[..n])?;
        self.pos += read as u64;
        Ok(read)
    }
}

impl<T: Write + Seek> Write for ByteRange<T> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.clamp(buf.len());
        if n == 0 {
            return Ok(0);
        }
        let written = self.inner.write(&buf[..n])?;
        self.pos += written as u64;
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl<T: Seek> Seek for ByteRange<T> {
    fn seek(&mut self, target: SeekFrom) -> io::Result<u64> {
        let (base, delta) = match target {
            SeekFrom::Start(p) => (0i128, p as i128),
            SeekFrom::Current(d) => (self.pos as i128, d as i128),
            SeekFrom::End(d) => (self.len as i128, d as i128),
        };

        let new_pos = base + delta;
        if new_pos < 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek before start of byte range",
            ));
        }
        let new_pos = u64::try_from(new_pos)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "seek position overflow"))?;
        let absolute = self
            .offset
            .checked_add(new_pos)
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "seek position overflow"))?;

        self.inner.seek(SeekFrom::Start(absolute))?;
        self.pos = new_pos;
        Ok(new_pos)
    }

    fn stream_position(&mut self) -> io::Result<u64> {
        Ok(self.pos)
    }
}
