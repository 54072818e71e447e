use {
    super::*,
    crate::error::Result,
    core::sync::atomic::{AtomicU64, Ordering},
    log::debug,
};

/// A backend wrapped with a generation counter, for buffers that are handed back to a pool
/// and reused for later messages.
///
/// Lazy and mutable views capture [`InputBuffer::generation`] when they are created and compare
/// it on every access. [`InputBuffer::recycle`] bumps the generation, so views that outlive the
/// release fail with [`Error::UseAfterRecycle`](crate::Error::UseAfterRecycle) instead of
/// reading the next message's bytes. Getting write access back through
/// [`PooledBuffer::reuse`] takes `&mut self`, which no live view can coexist with.
#[derive(Debug, Default)]
pub struct PooledBuffer<B> {
    inner: B,
    generation: AtomicU64,
}

impl<B> PooledBuffer<B> {
    pub const fn new(inner: B) -> Self {
        Self {
            inner,
            generation: AtomicU64::new(0),
        }
    }

    /// Exclusive access to the backing storage for the next message.
    ///
    /// Bumps the generation, as if [`InputBuffer::recycle`] had been called.
    pub fn reuse(&mut self) -> &mut B {
        *self.generation.get_mut() += 1;
        &mut self.inner
    }

    pub fn get_ref(&self) -> &B {
        &self.inner
    }

    pub fn into_inner(self) -> B {
        self.inner
    }
}

impl<B: InputBuffer> InputBuffer for PooledBuffer<B> {
    #[inline]
    fn len(&self) -> usize {
        self.inner.len()
    }

    #[inline]
    fn as_contiguous(&self) -> Option<&[u8]> {
        self.inner.as_contiguous()
    }

    #[inline]
    fn copy_span_into(&self, offset: usize, dst: &mut [u8]) -> Result<()> {
        self.inner.copy_span_into(offset, dst)
    }

    #[inline]
    fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    fn recycle(&self) {
        let previous = self.generation.fetch_add(1, Ordering::AcqRel);
        debug!("recycled pooled buffer of {} bytes (generation {previous} -> {})", self.len(), previous + 1);
    }
}

impl<B: OutputBuffer> OutputBuffer for PooledBuffer<B> {
    #[inline]
    fn as_contiguous_mut(&mut self) -> &mut [u8] {
        self.inner.as_contiguous_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recycle_and_reuse_bump_the_generation() {
        let mut pooled = PooledBuffer::new(vec![0u8; 8]);
        assert_eq!(pooled.generation(), 0);
        pooled.recycle();
        assert_eq!(pooled.generation(), 1);
        (&pooled).recycle();
        assert_eq!((&pooled).generation(), 2);
        pooled.reuse().fill(7);
        assert_eq!(pooled.generation(), 3);
        assert_eq!(pooled.read_scalar::<u8>(5), Ok(7));
        assert_eq!(pooled.into_inner(), vec![7u8; 8]);
    }

    #[test]
    fn plain_backends_have_a_constant_generation() {
        let bytes = vec![0u8; 4];
        InputBuffer::recycle(&bytes);
        assert_eq!(bytes.generation(), 0);
    }
}
