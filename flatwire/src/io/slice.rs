//! In-memory backends.
use {
    super::*,
    crate::error::Result,
    std::{rc::Rc, sync::Arc},
};

/// Implement [`InputBuffer`] for types that deref to a contiguous byte slice.
macro_rules! impl_contiguous_input {
    ($($ty:ty),* $(,)?) => {
        $(
            impl InputBuffer for $ty {
                #[inline]
                fn len(&self) -> usize {
                    <[u8]>::len(self)
                }

                #[inline]
                fn as_contiguous(&self) -> Option<&[u8]> {
                    Some(&self[..])
                }

                #[inline]
                fn copy_span_into(&self, offset: usize, dst: &mut [u8]) -> Result<()> {
                    let end = span_end(<[u8]>::len(self), offset, dst.len())?;
                    dst.copy_from_slice(&self[offset..end]);
                    Ok(())
                }
            }
        )*
    };
}

impl_contiguous_input!([u8], Vec<u8>, Box<[u8]>, Arc<[u8]>, Rc<[u8]>);

impl<const N: usize> InputBuffer for [u8; N] {
    #[inline]
    fn len(&self) -> usize {
        N
    }

    #[inline]
    fn as_contiguous(&self) -> Option<&[u8]> {
        Some(self.as_slice())
    }

    #[inline]
    fn copy_span_into(&self, offset: usize, dst: &mut [u8]) -> Result<()> {
        self.as_slice().copy_span_into(offset, dst)
    }
}

/// Implement [`OutputBuffer`] for types that deref mutably to a contiguous byte slice.
macro_rules! impl_contiguous_output {
    ($($ty:ty),* $(,)?) => {
        $(
            impl OutputBuffer for $ty {
                #[inline]
                fn as_contiguous_mut(&mut self) -> &mut [u8] {
                    &mut self[..]
                }
            }
        )*
    };
}

impl_contiguous_output!([u8], Vec<u8>, Box<[u8]>);

impl<const N: usize> OutputBuffer for [u8; N] {
    #[inline]
    fn as_contiguous_mut(&mut self) -> &mut [u8] {
        self.as_mut_slice()
    }
}

/// Forward every method, so wrappers with their own generation keep it visible through a
/// reference.
impl<B: InputBuffer + ?Sized> InputBuffer for &B {
    #[inline]
    fn len(&self) -> usize {
        (**self).len()
    }

    #[inline]
    fn as_contiguous(&self) -> Option<&[u8]> {
        (**self).as_contiguous()
    }

    #[inline]
    fn copy_span_into(&self, offset: usize, dst: &mut [u8]) -> Result<()> {
        (**self).copy_span_into(offset, dst)
    }

    #[inline]
    fn generation(&self) -> u64 {
        (**self).generation()
    }

    #[inline]
    fn recycle(&self) {
        (**self).recycle()
    }
}

impl<B: InputBuffer + ?Sized> InputBuffer for &mut B {
    #[inline]
    fn len(&self) -> usize {
        (**self).len()
    }

    #[inline]
    fn as_contiguous(&self) -> Option<&[u8]> {
        (**self).as_contiguous()
    }

    #[inline]
    fn copy_span_into(&self, offset: usize, dst: &mut [u8]) -> Result<()> {
        (**self).copy_span_into(offset, dst)
    }

    #[inline]
    fn generation(&self) -> u64 {
        (**self).generation()
    }

    #[inline]
    fn recycle(&self) {
        (**self).recycle()
    }
}

impl<B: OutputBuffer + ?Sized> OutputBuffer for &mut B {
    #[inline]
    fn as_contiguous_mut(&mut self) -> &mut [u8] {
        (**self).as_contiguous_mut()
    }
}

#[cfg(test)]
mod tests {
    use {super::*, crate::error::Error};

    #[test]
    fn contiguous_reads_borrow() {
        let bytes: Arc<[u8]> = Arc::from(&[1u8, 2, 3, 4, 5][..]);
        let span = bytes.read_span(1, 3).unwrap();
        assert!(matches!(span, Cow::Borrowed(&[2, 3, 4])));
        assert_eq!(
            bytes.read_span(3, 3),
            Err(Error::OutOfBounds {
                offset: 3,
                len: 3,
                buffer_len: 5
            })
        );
    }

    #[test]
    fn references_forward_to_the_backend() {
        let mut bytes = [0u8; 4];
        {
            let mut writer = &mut bytes;
            writer.write_span(1, &[9, 9]).unwrap();
            assert_eq!(writer.read_scalar::<u16>(1), Ok(0x0909));
        }
        let reader = &&bytes;
        assert_eq!(reader.len(), 4);
        assert_eq!(reader.read_scalar::<u8>(0), Ok(0));
    }

    #[test]
    fn boxed_slices_are_writable() {
        let mut boxed: Box<[u8]> = vec![0; 6].into_boxed_slice();
        boxed.write_scalar(2, -1i32).unwrap();
        assert_eq!(&*boxed, &[0, 0, 0xff, 0xff, 0xff, 0xff]);
        assert!(boxed.write_scalar(3, 0i32).is_err());
    }
}
