//! Wire formats for a [`Bsi`]: an in-memory byte-array form
//! (`marshal_binary`/`unmarshal_binary`) framed with an explicit header and
//! length-prefixed bitmaps, and a stream form (`write_to`/`read_from`) that
//! is nothing more than the existence bitmap's serialized stream followed by
//! each plane's, with no header or count of its own -- the end of the plane
//! sequence is discovered by reading until the underlying bitmap stream
//! reader reports EOF.

use std::io::{self, Read, Write};

use bsi_base::{is_end_of_stream, Bitmap};

use crate::container::Bsi;

const MAGIC: u32 = 0xB5_10_0001;

impl Bsi {
    /// Encodes this index as a self-contained byte buffer: a header (magic,
    /// min/max bounds, plane count) followed by the existence bitmap and
    /// each plane, every bitmap framed as a little-endian `u64` byte length
    /// prefix plus its serialized bytes. This is a concrete choice where
    /// the abstract "sequence of k+1 byte arrays" description leaves the
    /// packing unspecified: a length-prefixed `Vec<u8>` is self-describing
    /// and round-trips through a plain byte slice without extra framing
    /// from the caller.
    pub fn marshal_binary(&self) -> bsi_base::Result<Vec<u8>> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&MAGIC.to_le_bytes());
        buf.extend_from_slice(&self.min_value.to_le_bytes());
        buf.extend_from_slice(&self.max_value.to_le_bytes());
        buf.extend_from_slice(&(self.b.len() as u64).to_le_bytes());

        write_framed(&mut buf, &self.e)?;
        for plane in &self.b {
            write_framed(&mut buf, plane)?;
        }
        Ok(buf)
    }

    /// Decodes a buffer produced by [`Bsi::marshal_binary`].
    pub fn unmarshal_binary(data: &[u8]) -> bsi_base::Result<Bsi> {
        let mut cursor = data;

        let magic = read_u32(&mut cursor)?;
        if magic != MAGIC {
            return Err(bsi_base::err("unmarshal_binary: bad magic"));
        }
        let min_value = read_i64(&mut cursor)?;
        let max_value = read_i64(&mut cursor)?;
        let plane_count = read_u64(&mut cursor)? as usize;

        let e = read_framed(&mut cursor)?;
        let mut b = Vec::with_capacity(plane_count);
        for _ in 0..plane_count {
            b.push(read_framed(&mut cursor)?);
        }

        Ok(Bsi {
            e,
            b,
            min_value,
            max_value,
            run_optimized: false,
        })
    }

    /// Writes this index to `w` as a stream of back-to-back serialized
    /// bitmaps: the existence bitmap, then each plane, each written with the
    /// backing bitmap library's own self-delimiting serialization and
    /// nothing else -- no header, no plane count. The stream itself is the
    /// only delimiter: [`Bsi::read_from`] finds the end of the plane
    /// sequence by reading until the stream runs out.
    pub fn write_to<W: Write>(&self, mut w: W) -> bsi_base::Result<()> {
        self.e.serialize_into(&mut w)?;
        for plane in &self.b {
            plane.serialize_into(&mut w)?;
        }
        Ok(())
    }

    /// Reads an index written by [`Bsi::write_to`] from `r`.
    ///
    /// Reads the existence bitmap first (a failure here, including EOF, is a
    /// genuine error -- every index has one), then keeps reading planes
    /// until the underlying bitmap stream reader reports EOF, which is the
    /// normal, expected way this call learns there are no more planes: `r`
    /// carries exactly one index from wherever the caller started reading to
    /// wherever it ends, with no count of its own to consult.
    pub fn read_from<R: Read>(mut r: R) -> bsi_base::Result<Bsi> {
        let e = Bitmap::deserialize_from(&mut r)
            .map_err(|err| wrap_read_error("reading existence bitmap", err))?;

        let mut b = Vec::new();
        loop {
            match Bitmap::deserialize_from(&mut r) {
                Ok(plane) => b.push(plane),
                Err(err) if is_end_of_stream(&err) => break,
                Err(err) => {
                    return Err(wrap_read_error(&format!("reading bit slice index {}", b.len()), err))
                }
            }
        }

        Ok(Bsi {
            e,
            b,
            min_value: 0,
            max_value: 0,
            run_optimized: false,
        })
    }
}

fn wrap_read_error(context: &str, err: io::Error) -> bsi_base::Error {
    bsi_base::err(format!("{context}: {err}"))
}

fn write_framed(buf: &mut Vec<u8>, bm: &Bitmap) -> io::Result<()> {
    let mut body = Vec::new();
    bm.serialize_into(&mut body)?;
    buf.extend_from_slice(&(body.len() as u64).to_le_bytes());
    buf.extend_from_slice(&body);
    Ok(())
}

fn read_framed(cursor: &mut &[u8]) -> bsi_base::Result<Bitmap> {
    let len = read_u64(cursor)? as usize;
    if cursor.len() < len {
        return Err(bsi_base::err("unmarshal_binary: truncated bitmap frame"));
    }
    let (body, rest) = cursor.split_at(len);
    *cursor = rest;
    Ok(Bitmap::deserialize_from(body)?)
}

fn read_u32(cursor: &mut &[u8]) -> bsi_base::Result<u32> {
    if cursor.len() < 4 {
        return Err(bsi_base::err("unmarshal_binary: truncated header"));
    }
    let (head, rest) = cursor.split_at(4);
    *cursor = rest;
    Ok(u32::from_le_bytes(head.try_into().unwrap()))
}

fn read_u64(cursor: &mut &[u8]) -> bsi_base::Result<u64> {
    if cursor.len() < 8 {
        return Err(bsi_base::err("unmarshal_binary: truncated header"));
    }
    let (head, rest) = cursor.split_at(8);
    *cursor = rest;
    Ok(u64::from_le_bytes(head.try_into().unwrap()))
}

fn read_i64(cursor: &mut &[u8]) -> bsi_base::Result<i64> {
    Ok(read_u64(cursor)? as i64)
}
