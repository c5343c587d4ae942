//! Core I/O traits

use std::io::{Read, Seek};

/// Trait for readers that support both reading and seeking operations
///
/// This trait combines [`Read`] and [`Seek`] to provide a unified interface
/// for file-based I/O operations. It is automatically implemented for any type
/// that implements both traits along with [`Send`] and [`Sync`].
pub trait SeekableReader: Read + Seek + Send + Sync {}

impl<T: Read + Seek + Send + Sync> SeekableReader for T {}
