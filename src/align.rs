//! Shared alignment helpers: every on-disc structure in this format family —
//! PAK headers, MREA headers, compressed-block arrays — pads to a fixed byte
//! boundary with zero bytes.

use std::io::{Read, Seek, SeekFrom, Write};

/// Advances a seekable reader to the next `alignment`-byte boundary.
pub fn skip_padding(s: &mut (impl Read + Seek), alignment: u64) -> std::io::Result<()> {
    seek_to_alignment(s, alignment)?;
    Ok(())
}

/// Pads `w` with zero bytes so that `bytes_written_in_region` rounds up to
/// the next multiple of `alignment`.
pub fn write_padding(w: &mut impl Write, bytes_written_in_region: u64, alignment: u64) -> std::io::Result<()> {
    let rem = bytes_written_in_region % alignment;
    if rem != 0 {
        let pad = alignment - rem;
        w.write_all(&vec![0u8; pad as usize])?;
    }
    Ok(())
}

/// Seeks `s` forward to the next `alignment`-byte boundary from its current
/// position.
pub fn seek_to_alignment(s: &mut (impl Seek + ?Sized), alignment: u64) -> std::io::Result<u64> {
    let pos = s.stream_position()?;
    let rem = pos % alignment;
    if rem != 0 {
        let target = pos + (alignment - rem);
        s.seek(SeekFrom::Start(target))?;
        Ok(target)
    } else {
        Ok(pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn write_padding_rounds_up() {
        let mut buf = Vec::new();
        write_padding(&mut buf, 5, 32).unwrap();
        assert_eq!(buf.len(), 27);
    }

    #[test]
    fn write_padding_noop_when_aligned() {
        let mut buf = Vec::new();
        write_padding(&mut buf, 32, 32).unwrap();
        assert!(buf.is_empty());
    }

    #[test]
    fn seek_to_alignment_advances_cursor() {
        let mut cur = Cursor::new(vec![0u8; 64]);
        cur.seek(SeekFrom::Start(5)).unwrap();
        let pos = seek_to_alignment(&mut cur, 32).unwrap();
        assert_eq!(pos, 32);
    }
}
