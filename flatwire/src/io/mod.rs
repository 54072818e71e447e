//! [`InputBuffer`] and [`OutputBuffer`] implementations.
//!
//! Buffers are random-access: every accessor takes an absolute byte offset, and every range is
//! checked against the buffer length before a single byte is touched. Out-of-range accesses
//! fail with [`Error::OutOfBounds`](crate::Error::OutOfBounds); nothing is clamped or wrapped.
//!
//! # Capabilities
//!
//! The only required read primitive is [`InputBuffer::copy_span_into`]. Backends that store
//! their bytes in one contiguous region also implement [`InputBuffer::as_contiguous`], which
//! lets [`InputBuffer::read_span`] hand out borrowed slices instead of copies. Accessors are
//! generic over the buffer type, so the branch is resolved per backend at compile time.
use {
    crate::{
        error::{out_of_bounds, Result},
        scalar::Primitive,
    },
    std::borrow::Cow,
};

/// Largest [`Primitive::WIDTH`].
const MAX_SCALAR_WIDTH: usize = 8;

/// End of the span `[offset, offset + len)`, if it lies within `buffer_len` bytes.
#[inline]
pub(crate) fn span_end(buffer_len: usize, offset: usize, len: usize) -> Result<usize> {
    match offset.checked_add(len) {
        Some(end) if end <= buffer_len => Ok(end),
        _ => Err(out_of_bounds(offset, len, buffer_len)),
    }
}

/// Read-only random access to a backing byte region.
pub trait InputBuffer {
    /// Length of the buffer in bytes.
    fn len(&self) -> usize;

    #[inline]
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The whole buffer as one slice, for backends that store it contiguously.
    ///
    /// When `Some`, the slice must be exactly [`InputBuffer::len`] bytes long.
    #[inline]
    fn as_contiguous(&self) -> Option<&[u8]> {
        None
    }

    /// Copy exactly `dst.len()` bytes starting at `offset` into `dst`.
    fn copy_span_into(&self, offset: usize, dst: &mut [u8]) -> Result<()>;

    /// Read `len` bytes starting at `offset`.
    ///
    /// Borrowed when the backend is contiguous, copied otherwise.
    #[inline]
    fn read_span(&self, offset: usize, len: usize) -> Result<Cow<'_, [u8]>> {
        let end = span_end(self.len(), offset, len)?;
        match self.as_contiguous() {
            Some(bytes) => Ok(Cow::Borrowed(&bytes[offset..end])),
            None => {
                let mut owned = vec![0; len];
                self.copy_span_into(offset, &mut owned)?;
                Ok(Cow::Owned(owned))
            }
        }
    }

    /// Read a little-endian scalar at `offset`.
    #[inline]
    fn read_scalar<T: Primitive>(&self, offset: usize) -> Result<T> {
        read_scalar(self, offset)
    }

    /// Generation of the backing storage.
    ///
    /// Views capture it when they are created and compare it on every access. Backends that
    /// are never recycled report a constant.
    #[inline]
    fn generation(&self) -> u64 {
        0
    }

    /// Release the storage for reuse, invalidating every view created before the call.
    ///
    /// A no-op for backends that do not track generations.
    #[inline]
    fn recycle(&self) {}
}

/// Read a little-endian scalar at `offset` of any buffer, sized or not.
#[inline]
pub fn read_scalar<T: Primitive, B: InputBuffer + ?Sized>(buffer: &B, offset: usize) -> Result<T> {
    let end = span_end(buffer.len(), offset, T::WIDTH)?;
    match buffer.as_contiguous() {
        Some(bytes) => Ok(T::from_le_slice(&bytes[offset..end])),
        None => {
            let mut raw = [0u8; MAX_SCALAR_WIDTH];
            let raw = &mut raw[..T::WIDTH];
            buffer.copy_span_into(offset, raw)?;
            Ok(T::from_le_slice(raw))
        }
    }
}

/// Read-write random access to a backing byte region.
///
/// Writable backends are always contiguous.
pub trait OutputBuffer: InputBuffer {
    /// The whole buffer as one mutable slice of exactly [`InputBuffer::len`] bytes.
    fn as_contiguous_mut(&mut self) -> &mut [u8];

    /// Mutable view of `len` bytes starting at `offset`.
    #[inline]
    fn span_mut(&mut self, offset: usize, len: usize) -> Result<&mut [u8]> {
        let end = span_end(self.len(), offset, len)?;
        Ok(&mut self.as_contiguous_mut()[offset..end])
    }

    /// Overwrite `bytes.len()` bytes starting at `offset`.
    #[inline]
    fn write_span(&mut self, offset: usize, bytes: &[u8]) -> Result<()> {
        self.span_mut(offset, bytes.len())?.copy_from_slice(bytes);
        Ok(())
    }

    /// Write a little-endian scalar at `offset`.
    #[inline]
    fn write_scalar<T: Primitive>(&mut self, offset: usize, value: T) -> Result<()> {
        value.write_le_slice(self.span_mut(offset, T::WIDTH)?);
        Ok(())
    }
}

mod external;
mod pooled;
mod segmented;
mod slice;
pub use {pooled::PooledBuffer, segmented::SegmentedBuffer};
