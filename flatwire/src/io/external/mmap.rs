use {
    crate::{
        error::Result,
        io::{span_end, InputBuffer, OutputBuffer},
    },
    memmap2::{Mmap, MmapMut},
};

impl InputBuffer for Mmap {
    #[inline]
    fn len(&self) -> usize {
        Mmap::len(self)
    }

    #[inline]
    fn as_contiguous(&self) -> Option<&[u8]> {
        Some(&self[..])
    }

    #[inline]
    fn copy_span_into(&self, offset: usize, dst: &mut [u8]) -> Result<()> {
        let end = span_end(Mmap::len(self), offset, dst.len())?;
        dst.copy_from_slice(&self[offset..end]);
        Ok(())
    }
}

impl InputBuffer for MmapMut {
    #[inline]
    fn len(&self) -> usize {
        MmapMut::len(self)
    }

    #[inline]
    fn as_contiguous(&self) -> Option<&[u8]> {
        Some(&self[..])
    }

    #[inline]
    fn copy_span_into(&self, offset: usize, dst: &mut [u8]) -> Result<()> {
        let end = span_end(MmapMut::len(self), offset, dst.len())?;
        dst.copy_from_slice(&self[offset..end]);
        Ok(())
    }
}

impl OutputBuffer for MmapMut {
    #[inline]
    fn as_contiguous_mut(&mut self) -> &mut [u8] {
        &mut self[..]
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{
            protocol::TableRef,
            schema::{FieldDescriptor, TableSchema},
            scalar::{Scalar, ScalarType},
            strategy::mutable::MutableTable,
            value::{TableValue, Value},
            writer,
        },
        std::io::Write,
    };

    static SCHEMA: TableSchema = TableSchema::new(
        "Counter",
        &[FieldDescriptor::scalar("hits", 0, ScalarType::U32)],
    );

    #[test]
    fn mapped_files_are_mutated_in_place() {
        let table = TableValue::new(vec![Some(Value::Scalar(Scalar::U32(1)))]);
        let encoded = writer::serialize(&SCHEMA, &table).unwrap();
        let mut file = tempfile::tempfile().unwrap();
        file.write_all(&encoded).unwrap();

        // SAFETY: the temporary file is private to this test.
        let mut map = unsafe { MmapMut::map_mut(&file).unwrap() };
        let mut counter = MutableTable::root(&mut map, &SCHEMA).unwrap();
        counter.set_scalar("hits", Scalar::U32(2)).unwrap();
        map.flush().unwrap();
        drop(map);

        // SAFETY: as above.
        let map = unsafe { Mmap::map(&file).unwrap() };
        let root = TableRef::root(&map).unwrap();
        assert_eq!(root.scalar::<u32>(0, 0), Ok(2));
    }
}
