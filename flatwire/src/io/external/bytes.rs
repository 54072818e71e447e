use {
    crate::{
        error::Result,
        io::{span_end, InputBuffer, OutputBuffer},
    },
    bytes::{Bytes, BytesMut},
};

impl InputBuffer for Bytes {
    #[inline]
    fn len(&self) -> usize {
        Bytes::len(self)
    }

    #[inline]
    fn as_contiguous(&self) -> Option<&[u8]> {
        Some(self.as_ref())
    }

    #[inline]
    fn copy_span_into(&self, offset: usize, dst: &mut [u8]) -> Result<()> {
        let end = span_end(Bytes::len(self), offset, dst.len())?;
        dst.copy_from_slice(&self[offset..end]);
        Ok(())
    }
}

impl InputBuffer for BytesMut {
    #[inline]
    fn len(&self) -> usize {
        BytesMut::len(self)
    }

    #[inline]
    fn as_contiguous(&self) -> Option<&[u8]> {
        Some(self.as_ref())
    }

    #[inline]
    fn copy_span_into(&self, offset: usize, dst: &mut [u8]) -> Result<()> {
        let end = span_end(BytesMut::len(self), offset, dst.len())?;
        dst.copy_from_slice(&self[offset..end]);
        Ok(())
    }
}

impl OutputBuffer for BytesMut {
    #[inline]
    fn as_contiguous_mut(&mut self) -> &mut [u8] {
        self.as_mut()
    }
}
