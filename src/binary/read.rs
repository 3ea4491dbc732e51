use std::io::{Read, Result};

use zerocopy::{ByteOrder, FromBytes, U32};

/// Extends [`Read`] with methods for reading fixed-width numbers.
///
/// The integer methods have an unconstrained byte order parameter that must be explicitly
/// instantiated, typically with [`zerocopy::LittleEndian`].
pub trait ReadBytesExt: Read {
    /// Reads a type that implements [`FromBytes`] from the underlying reader.
    ///
    /// # Errors
    ///
    /// This method returns the same errors as [`Read::read_exact`].
    #[inline]
    fn read_t<T: FromBytes>(&mut self) -> Result<T> {
        T::read_from_io(self)
    }

    /// Reads an unsigned 32-bit integer from the underlying reader.
    #[inline]
    fn read_u32<T: ByteOrder>(&mut self) -> Result<u32> {
        U32::<T>::read_from_io(self).map(U32::get)
    }
}

/// All types that implement `Read` get methods defined in `ReadBytesExt` for free.
impl<R: Read + ?Sized> ReadBytesExt for R {}
