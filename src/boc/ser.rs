use ahash::HashMap;

use super::BocTag;
use crate::cell::{Cell, HashBytes};

/// Intermediate BOC encoder state.
///
/// Unique cells are collected in the reverse of the output order:
/// children first, so every reference points to a cell with a larger
/// output index.
pub struct BocHeader {
    root_rev_indices: Vec<u32>,
    rev_indices: HashMap<HashBytes, u32>,
    rev_cells: Vec<Cell>,
    total_data_size: u64,
    reference_count: u64,
    cell_count: u32,
    include_crc: bool,
}

impl BocHeader {
    /// Creates an encoder state with a single root.
    pub fn new(root: Cell) -> Self {
        let mut res = Self {
            root_rev_indices: Vec::new(),
            rev_indices: HashMap::default(),
            rev_cells: Vec::new(),
            total_data_size: 0,
            reference_count: 0,
            cell_count: 0,
            include_crc: false,
        };
        res.add_root(root);
        res
    }

    /// Adds an additional root cell.
    pub fn add_root(&mut self, root: Cell) {
        let root_rev_index = self.fill(&root);
        self.root_rev_indices.push(root_rev_index);
    }

    /// Whether to append a CRC32c of the whole output.
    #[inline]
    pub fn with_crc(mut self, include_crc: bool) -> Self {
        self.include_crc = include_crc;
        self
    }

    /// Writes the collected cells in the canonical generic BOC layout.
    pub fn encode(self, target: &mut Vec<u8>) {
        let root_count = self.root_rev_indices.len();

        let ref_size = number_of_bytes_to_fit(self.cell_count as u64);
        let total_cells_size: u64 = self.total_data_size
            + (self.cell_count as u64 * 2)
            + (ref_size as u64 * self.reference_count);
        let offset_size = number_of_bytes_to_fit(total_cells_size);

        debug_assert!((1..=4).contains(&ref_size));
        debug_assert!((1..=8).contains(&offset_size));

        let flags = (ref_size as u8) | (u8::from(self.include_crc) * 0b0100_0000);

        // 4 bytes - tag
        // 1 byte - flags
        // 1 byte - offset size
        // {ref_size} - cell count, root count, absent cell count
        // {offset_size} - total cells size
        // root_count * {ref_size} - root indices
        // {total_cells_size} - cells
        // include_crc * 4 - optional CRC32
        let total_size = 4
            + 2
            + (ref_size as u64) * (3 + root_count as u64)
            + (offset_size as u64)
            + total_cells_size
            + u64::from(self.include_crc) * 4;
        target.reserve(total_size as usize);

        target.extend_from_slice(&BocTag::Generic.to_bytes());
        target.extend_from_slice(&[flags, offset_size as u8]);
        target.extend_from_slice(&self.cell_count.to_be_bytes()[4 - ref_size..]);
        target.extend_from_slice(&(root_count as u32).to_be_bytes()[4 - ref_size..]);
        target.extend_from_slice(&[0; 4][4 - ref_size..]);
        target.extend_from_slice(&total_cells_size.to_be_bytes()[8 - offset_size..]);

        for rev_index in &self.root_rev_indices {
            let root_index = self.cell_count - rev_index - 1;
            target.extend_from_slice(&root_index.to_be_bytes()[4 - ref_size..]);
        }

        for cell in self.rev_cells.iter().rev() {
            target.extend_from_slice(&cell.descriptor());
            target.extend_from_slice(cell.data());
            for child in cell.references() {
                // Every child was visited before its parent.
                let rev_index = self.rev_indices[child.repr_hash()];
                let index = self.cell_count - rev_index - 1;
                target.extend_from_slice(&index.to_be_bytes()[4 - ref_size..]);
            }
        }

        if self.include_crc {
            let checksum = crc32c::crc32c(target);
            target.extend_from_slice(&checksum.to_le_bytes());
        }
    }

    fn fill(&mut self, cell: &Cell) -> u32 {
        if let Some(index) = self.rev_indices.get(cell.repr_hash()) {
            return *index;
        }

        for child in cell.references() {
            self.fill(child);
        }

        let index = self.cell_count;
        self.rev_indices.insert(*cell.repr_hash(), index);
        self.rev_cells.push(cell.clone());

        self.total_data_size += cell.data().len() as u64;
        self.reference_count += cell.reference_count() as u64;
        self.cell_count += 1;

        index
    }
}

fn number_of_bytes_to_fit(l: u64) -> usize {
    std::cmp::max(1, (8 - l.leading_zeros() / 8) as usize)
}
