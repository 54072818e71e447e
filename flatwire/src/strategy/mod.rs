//! Deserialization strategies.
//!
//! - [`lazy`]: views that read each field when it is asked for.
//! - [`greedy`]: full materialization into an owned [`TableValue`](crate::value::TableValue).
//! - [`mutable`]: lazy views with in-place scalar writes.
//!
//! Lazy and mutable views remember the buffer generation they were created under and fail
//! with [`UseAfterRecycle`](crate::Error::UseAfterRecycle) once the buffer is recycled.
use crate::{
    error::{use_after_recycle, Result},
    io::InputBuffer,
};

pub mod greedy;
pub mod lazy;
pub mod mutable;

#[inline]
pub(crate) fn check_generation<B: InputBuffer + ?Sized>(buffer: &B, generation: u64) -> Result<()> {
    let current = buffer.generation();
    if current != generation {
        return Err(use_after_recycle(generation, current));
    }
    Ok(())
}
