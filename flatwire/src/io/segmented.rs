use {
    super::*,
    crate::error::{corrupted, Result},
};

/// Read-only buffer made of several owned segments, as handed out by scatter/gather receives.
///
/// Reads that cross a segment boundary are stitched together, so [`InputBuffer::read_span`]
/// always returns an owned copy.
///
/// # Examples
///
/// ```
/// # use flatwire::io::{InputBuffer, SegmentedBuffer};
/// let buffer = SegmentedBuffer::new(vec![vec![0x01, 0x02], vec![0x03, 0x04]]);
/// assert_eq!(buffer.len(), 4);
/// assert_eq!(buffer.read_scalar::<u32>(0).unwrap(), 0x0403_0201);
/// ```
#[derive(Debug, Clone, Default)]
pub struct SegmentedBuffer {
    segments: Vec<Box<[u8]>>,
    /// Absolute offset of the first byte of each segment.
    starts: Vec<usize>,
    len: usize,
}

impl SegmentedBuffer {
    pub fn new<S: Into<Box<[u8]>>>(segments: impl IntoIterator<Item = S>) -> Self {
        let mut buffer = Self::default();
        for segment in segments {
            buffer.push_segment(segment);
        }
        buffer
    }

    /// Append a segment to the end of the buffer. Empty segments are dropped.
    pub fn push_segment(&mut self, segment: impl Into<Box<[u8]>>) {
        let segment = segment.into();
        if segment.is_empty() {
            return;
        }
        self.starts.push(self.len);
        self.len += segment.len();
        self.segments.push(segment);
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// Index of the segment holding the byte at `offset`. `offset` must be in bounds.
    fn locate(&self, offset: usize) -> usize {
        match self.starts.binary_search(&offset) {
            Ok(index) => index,
            Err(insert_at) => insert_at - 1,
        }
    }

    /// Flatten into one contiguous allocation.
    pub fn to_contiguous(&self) -> Vec<u8> {
        self.segments.concat()
    }
}

impl InputBuffer for SegmentedBuffer {
    #[inline]
    fn len(&self) -> usize {
        self.len
    }

    fn copy_span_into(&self, offset: usize, dst: &mut [u8]) -> Result<()> {
        span_end(self.len, offset, dst.len())?;
        if dst.is_empty() {
            return Ok(());
        }
        let mut index = self.locate(offset);
        let mut position = offset - self.starts[index];
        let mut written = 0;
        while written < dst.len() {
            let segment = self
                .segments
                .get(index)
                .ok_or_else(|| corrupted(offset + written, "segment index out of range"))?;
            let take = (segment.len() - position).min(dst.len() - written);
            dst[written..written + take].copy_from_slice(&segment[position..position + take]);
            written += take;
            index += 1;
            position = 0;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{error::Error, proptest_config::proptest_cfg},
        proptest::prelude::*,
    };

    #[test]
    fn reads_stitch_across_segments() {
        let buffer = SegmentedBuffer::new(vec![vec![1u8, 2, 3], vec![], vec![4], vec![5, 6, 7, 8]]);
        assert_eq!(buffer.segment_count(), 3);
        assert_eq!(buffer.as_contiguous(), None);
        let span = buffer.read_span(2, 4).unwrap();
        assert!(matches!(span, Cow::Owned(_)));
        assert_eq!(&*span, &[3, 4, 5, 6]);
        assert_eq!(buffer.read_scalar::<u16>(6), Ok(0x0807));
        assert_eq!(
            buffer.read_scalar::<u16>(7),
            Err(Error::OutOfBounds {
                offset: 7,
                len: 2,
                buffer_len: 8
            })
        );
    }

    proptest! {
        #![proptest_config(proptest_cfg())]

        #[test]
        fn segmented_reads_match_flat_reads(
            segments in proptest::collection::vec(proptest::collection::vec(any::<u8>(), 0..8), 0..8),
            offset in 0usize..64,
            len in 0usize..16,
        ) {
            let buffer = SegmentedBuffer::new(segments.clone());
            let flat = segments.concat();
            prop_assert_eq!(buffer.to_contiguous(), flat.clone());
            let segmented = buffer.read_span(offset, len).map(|span| span.into_owned());
            let contiguous = flat.as_slice().read_span(offset, len).map(|span| span.into_owned());
            prop_assert_eq!(segmented, contiguous);
        }
    }
}
