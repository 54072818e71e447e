//! Global configuration for flatwire.
//!
//! Configuration is resolved at compile time: every knob is a const generic parameter of
//! [`Configuration`], and readers and writers are generic over [`ConfigCore`]. Disabled checks
//! cost nothing at runtime.
//!
//! ```
//! use flatwire::config::{Configuration, ConfigCore};
//!
//! let config = Configuration::default()
//!     .enable_alignment_check()
//!     .with_max_depth::<16>();
//!
//! fn depth<C: ConfigCore>(_: C) -> usize {
//!     C::MAX_DEPTH
//! }
//! assert_eq!(depth(config), 16);
//! ```
use core::marker::PhantomData;

pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Shared subtables are decoded once per reference, so the number of tables a decode
/// materializes is not bounded by the buffer size alone.
pub const DEFAULT_MAX_TABLES: usize = 1_000_000;

/// Alignment checks are a verification aid. They are on in debug builds and off in release
/// builds, where the reader trusts the writer.
pub const DEFAULT_ALIGNMENT_CHECK: bool = cfg!(debug_assertions);

/// Compile-time configuration for runtime behavior.
///
/// Defaults:
/// - Alignment check follows [`DEFAULT_ALIGNMENT_CHECK`].
/// - Maximum table nesting depth is [`DEFAULT_MAX_DEPTH`].
/// - Maximum number of tables one owned decode materializes is [`DEFAULT_MAX_TABLES`].
/// - VTable deduplication is enabled.
/// - Scalars equal to their default are still written.
pub struct Configuration<
    const ALIGNMENT_CHECK: bool = DEFAULT_ALIGNMENT_CHECK,
    const MAX_DEPTH: usize = DEFAULT_MAX_DEPTH,
    const VTABLE_DEDUP: bool = true,
    const OMIT_DEFAULTS: bool = false,
    const MAX_TABLES: usize = DEFAULT_MAX_TABLES,
> {
    _p: PhantomData<()>,
}

impl<const A: bool, const D: usize, const V: bool, const O: bool, const T: usize> Clone
    for Configuration<A, D, V, O, T>
{
    fn clone(&self) -> Self {
        *self
    }
}

impl<const A: bool, const D: usize, const V: bool, const O: bool, const T: usize> Copy
    for Configuration<A, D, V, O, T>
{
}

impl<const A: bool, const D: usize, const V: bool, const O: bool, const T: usize> core::fmt::Debug
    for Configuration<A, D, V, O, T>
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Configuration")
            .field("alignment_check", &A)
            .field("max_depth", &D)
            .field("vtable_dedup", &V)
            .field("omit_defaults", &O)
            .field("max_tables", &T)
            .finish()
    }
}

const fn generate<const A: bool, const D: usize, const V: bool, const O: bool, const T: usize>(
) -> Configuration<A, D, V, O, T> {
    Configuration { _p: PhantomData }
}

pub type DefaultConfig = Configuration;

impl Configuration {
    /// Create a new configuration with the default settings.
    #[allow(clippy::should_implement_trait)]
    pub const fn default() -> DefaultConfig {
        generate()
    }
}

impl<const A: bool, const D: usize, const V: bool, const O: bool, const T: usize>
    Configuration<A, D, V, O, T>
{
    #[expect(clippy::new_without_default)]
    pub const fn new() -> Self {
        generate()
    }

    /// Check that every scalar read or written sits at an offset that is a multiple of its
    /// width. Misaligned scalars fail with [`CorruptedData`](crate::Error::CorruptedData).
    pub const fn enable_alignment_check(self) -> Configuration<true, D, V, O, T> {
        generate()
    }

    /// Trust the writer and skip alignment checks.
    pub const fn disable_alignment_check(self) -> Configuration<false, D, V, O, T> {
        generate()
    }

    /// Set the maximum table nesting depth followed by recursive decoding.
    ///
    /// Deeper nesting fails with [`CorruptedData`](crate::Error::CorruptedData) instead of
    /// recursing without bound on hostile input.
    pub const fn with_max_depth<const DEPTH: usize>(self) -> Configuration<A, DEPTH, V, O, T> {
        generate()
    }

    /// Emit one vtable per table even when an identical vtable was already written.
    pub const fn disable_vtable_dedup(self) -> Configuration<A, D, false, O, T> {
        generate()
    }

    /// Leave scalar fields equal to their schema default out of the buffer.
    ///
    /// Readers substitute the default for absent fields, so field values are unchanged, but
    /// greedy decoding reports such fields as absent.
    pub const fn omit_default_scalars(self) -> Configuration<A, D, V, true, T> {
        generate()
    }

    /// Set the maximum number of tables a single owned decode may materialize.
    ///
    /// Every reference to a table counts, so a subtable shared by many offsets counts once per
    /// offset. Exceeding the budget fails with [`CorruptedData`](crate::Error::CorruptedData).
    pub const fn with_max_tables<const TABLES: usize>(self) -> Configuration<A, D, V, O, TABLES> {
        generate()
    }
}

/// Trait for accessing configuration values.
pub trait ConfigCore: 'static + Copy + Sized {
    const ALIGNMENT_CHECK: bool;
    const MAX_DEPTH: usize;
    const VTABLE_DEDUP: bool;
    const OMIT_DEFAULTS: bool;
    const MAX_TABLES: usize;
}

impl<const A: bool, const D: usize, const V: bool, const O: bool, const T: usize> ConfigCore
    for Configuration<A, D, V, O, T>
{
    const ALIGNMENT_CHECK: bool = A;
    const MAX_DEPTH: usize = D;
    const VTABLE_DEDUP: bool = V;
    const OMIT_DEFAULTS: bool = O;
    const MAX_TABLES: usize = T;
}
