use std::io::{Result, Write};

use zerocopy::{Immutable, IntoBytes};

/// The [`Write`] counterpart of [`ReadBytesExt`](super::ReadBytesExt).
pub trait WriteBytesExt: Write {
    /// Writes the in-memory bytes of a fixed-layout type.
    ///
    /// # Errors
    ///
    /// This method returns the same errors as [`Write::write_all`].
    #[inline]
    fn write_t<T: IntoBytes + Immutable>(&mut self, value: &T) -> Result<()> {
        value.write_to_io(self)
    }
}

impl<W: Write + ?Sized> WriteBytesExt for W {}
