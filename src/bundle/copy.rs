use std::io::{self, ErrorKind, Read, Seek, SeekFrom, Write};

use indicatif::{ProgressBar, ProgressStyle};

use super::ContainerAddress;

const COPY_BUFFER_SIZE: usize = 64 * 1024;

const PROGRESS_THRESHOLD: u64 = 16 * 1024 * 1024;

const PROGRESS_TEMPLATE: &str = "{wide_bar:.magenta/black} {decimal_bytes:.green}/{decimal_total_bytes:.green} {decimal_bytes_per_sec:.red} eta {eta:.blue}";

const PROGRESS_CHARS: &str = "───";

/// Streams the byte range described by `address` from `reader` into `writer`.
///
/// Returns the number of bytes copied, which is less than `address.size` if the reader ran out
/// of data. Callers decide whether a short copy is an error.
pub fn copy_range<R, W>(
    reader: &mut R,
    address: ContainerAddress,
    writer: &mut W,
) -> io::Result<u64>
where
    R: Read + Seek,
    W: Write + ?Sized,
{
    reader.seek(SeekFrom::Start(address.offset))?;

    let progress = if address.size >= PROGRESS_THRESHOLD {
        ProgressBar::new(address.size).with_style(
            ProgressStyle::with_template(PROGRESS_TEMPLATE)
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars(PROGRESS_CHARS),
        )
    } else {
        ProgressBar::hidden()
    };

    let mut source = reader.take(address.size);
    let mut buffer = vec![0; COPY_BUFFER_SIZE];
    let mut copied = 0;

    loop {
        let read = match source.read(&mut buffer) {
            Ok(0) => break,
            Ok(read) => read,
            Err(error) if error.kind() == ErrorKind::Interrupted => continue,
            Err(error) => {
                progress.abandon();
                return Err(error);
            }
        };
        writer.write_all(&buffer[..read])?;
        copied += read as u64;
        progress.inc(read as u64);
    }

    progress.finish_and_clear();

    Ok(copied)
}
