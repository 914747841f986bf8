use smallvec::SmallVec;

use super::BocTag;
use crate::cell::{Cell, CellRefs, MAX_REF_COUNT};
use crate::error::Error;
use crate::util::unlikely;

/// Decodes a single-root cell tree from the canonical BOC layout.
pub(crate) fn decode(data: &[u8]) -> Result<Cell, Error> {
    let mut reader = Reader { data, offset: 0 };

    // 4 bytes - tag
    // 1 byte - flags
    // 1 byte - offset size
    ok!(reader.require(6));
    let tag = BocTag::from_bytes(ok!(data[0..4].try_into().map_err(|_| Error::MalformedEncoding)));
    let flags = data[4];
    let offset_size = data[5] as usize;

    let has_index;
    let has_crc;
    let ref_size;
    let has_root_list;
    match tag {
        Some(BocTag::Indexed) => {
            has_index = true;
            has_crc = false;
            ref_size = flags as usize;
            has_root_list = false;
        }
        Some(BocTag::IndexedCrc32) => {
            has_index = true;
            has_crc = true;
            ref_size = flags as usize;
            has_root_list = false;
        }
        Some(BocTag::Generic) => {
            has_index = flags & 0b1000_0000 != 0;
            has_crc = flags & 0b0100_0000 != 0;
            ref_size = (flags & 0b0000_0111) as usize;
            has_root_list = true;
        }
        None => return Err(Error::MalformedEncoding),
    }

    if unlikely(!(1..=4).contains(&ref_size) || !(1..=8).contains(&offset_size)) {
        return Err(Error::MalformedEncoding);
    }
    reader.advance(6);

    // The checksum covers everything before it, including the header.
    if has_crc {
        if unlikely(data.len() < 4) {
            return Err(Error::MalformedEncoding);
        }
        let (payload, tail) = data.split_at(data.len() - 4);
        let expected = u32::from_le_bytes(ok!(tail
            .try_into()
            .map_err(|_| Error::MalformedEncoding)));
        if unlikely(crc32c::crc32c(payload) != expected) {
            return Err(Error::MalformedEncoding);
        }
    }

    // {ref_size} bytes - cell count, root count, absent cell count
    // {offset_size} bytes - total cells size
    ok!(reader.require(ref_size * 3 + offset_size));
    let cell_count = ok!(reader.read_be_uint(ref_size)) as usize;
    let root_count = ok!(reader.read_be_uint(ref_size)) as usize;
    let absent_count = ok!(reader.read_be_uint(ref_size)) as usize;
    let total_cells_size = ok!(reader.read_be_uint(offset_size));

    if unlikely(root_count != 1 || absent_count != 0 || cell_count == 0) {
        return Err(Error::MalformedEncoding);
    }
    // Every cell occupies at least its two descriptor bytes.
    if unlikely(cell_count > data.len() / 2) {
        return Err(Error::MalformedEncoding);
    }

    let root_index = if has_root_list {
        ok!(reader.require(ref_size));
        let index = ok!(reader.read_be_uint(ref_size)) as usize;
        if unlikely(index >= cell_count) {
            return Err(Error::MalformedEncoding);
        }
        index
    } else {
        0
    };

    if has_index {
        ok!(reader.require(cell_count * offset_size));
        reader.advance(cell_count * offset_size);
    }

    let cells_start = reader.offset;

    // First pass: split the buffer into per-cell records.
    struct RawCell<'a> {
        data: &'a [u8],
        bit_len: u16,
        refs: SmallVec<[usize; MAX_REF_COUNT]>,
    }

    let mut raw_cells = Vec::<RawCell<'_>>::with_capacity(cell_count);
    for index in 0..cell_count {
        ok!(reader.require(2));
        let d1 = data[reader.offset];
        let d2 = data[reader.offset + 1];
        reader.advance(2);

        let ref_count = (d1 & 0b0000_0111) as usize;
        let is_exotic = d1 & 0b0000_1000 != 0;
        let store_hashes = d1 & 0b0001_0000 != 0;
        let level = d1 >> 5;
        if unlikely(ref_count > MAX_REF_COUNT || is_exotic || level != 0) {
            return Err(Error::MalformedEncoding);
        }

        // Precomputed hashes are not carried in memory, skip them.
        if store_hashes {
            ok!(reader.require(32 + 2));
            reader.advance(32 + 2);
        }

        let byte_len = (d2 as usize + 1) / 2;
        ok!(reader.require(byte_len));
        let cell_data = &data[reader.offset..reader.offset + byte_len];
        reader.advance(byte_len);

        let bit_len = if d2 % 2 == 0 {
            byte_len as u16 * 8
        } else {
            // A partially filled last byte must carry the completion tag.
            let last = match cell_data.last() {
                Some(&last) if last != 0 => last,
                _ => return Err(Error::MalformedEncoding),
            };
            byte_len as u16 * 8 - 1 - last.trailing_zeros() as u16
        };
        if unlikely(crate::util::byte_len(bit_len) != byte_len) {
            return Err(Error::MalformedEncoding);
        }

        let mut refs = SmallVec::new();
        for _ in 0..ref_count {
            ok!(reader.require(ref_size));
            let child = ok!(reader.read_be_uint(ref_size)) as usize;
            // Children always come after their parents.
            if unlikely(child <= index || child >= cell_count) {
                return Err(Error::MalformedEncoding);
            }
            refs.push(child);
        }

        raw_cells.push(RawCell {
            data: cell_data,
            bit_len,
            refs,
        });
    }

    if unlikely((reader.offset - cells_start) as u64 != total_cells_size) {
        return Err(Error::MalformedEncoding);
    }
    if unlikely(reader.offset + has_crc as usize * 4 != data.len()) {
        return Err(Error::MalformedEncoding);
    }

    // Second pass: build cells bottom-up.
    let mut cells = vec![None::<Cell>; cell_count];
    for index in (0..cell_count).rev() {
        let raw = &raw_cells[index];
        let mut references = CellRefs::new();
        for &child in &raw.refs {
            match &cells[child] {
                Some(cell) => references.push(cell.clone()),
                None => return Err(Error::MalformedEncoding),
            }
        }
        let cell = ok!(Cell::new(raw.data.to_vec(), raw.bit_len, references)
            .map_err(|_| Error::MalformedEncoding));
        cells[index] = Some(cell);
    }

    match cells.into_iter().nth(root_index).flatten() {
        Some(root) => Ok(root),
        None => Err(Error::MalformedEncoding),
    }
}

struct Reader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl Reader<'_> {
    #[inline]
    fn require(&self, len: usize) -> Result<(), Error> {
        if self.offset + len <= self.data.len() {
            Ok(())
        } else {
            Err(Error::MalformedEncoding)
        }
    }

    #[inline]
    fn advance(&mut self, len: usize) {
        self.offset += len;
    }

    fn read_be_uint(&mut self, size: usize) -> Result<u64, Error> {
        ok!(self.require(size));
        let mut result = 0u64;
        for &byte in &self.data[self.offset..self.offset + size] {
            result = (result << 8) | byte as u64;
        }
        self.offset += size;
        Ok(result)
    }
}
