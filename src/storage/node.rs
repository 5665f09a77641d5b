//! On-page node format.
//!
//! Exactly one B-tree node lives in each page; the byte layout below is
//! both the in-memory and the on-disk form, so flushing a page is a plain
//! memory copy. All multi-byte fields are little-endian unsigned.
//!
//! | Field        | Bytes | Notes                                   |
//! |--------------|-------|-----------------------------------------|
//! | node_type    | 1     | 0 = internal, 1 = leaf                  |
//! | is_root      | 1     | boolean                                 |
//! | parent       | 4     | parent page number; meaningless on root |
//!
//! A leaf continues with `num_cells (4)` and `next_leaf (4)`, then an
//! array of `(key: 4, value: ROW_SIZE)` cells in ascending key order.
//! An internal node continues with `num_keys (4)` and `right_child (4)`,
//! then an array of `(child: 4, key: 4)` cells where `key[i]` is the
//! maximum key stored under `child[i]`.

use super::row::ROW_SIZE;
use crate::errors::Error;

/// Page size 4 kilobytes because it's the same size as a page used in
/// the virtual memory systems of most computer architectures.
pub const PAGE_SIZE: usize = 4096;

/// Marks an internal node's right child as not yet assigned. Only
/// observable between the steps of an internal split.
pub const INVALID_PAGE_NUM: u32 = u32::MAX;

// Common Node Header Layout

const NODE_TYPE_SIZE: usize = 1;
const NODE_TYPE_OFFSET: usize = 0;
const IS_ROOT_SIZE: usize = 1;
const IS_ROOT_OFFSET: usize = NODE_TYPE_OFFSET + NODE_TYPE_SIZE;
const PARENT_POINTER_SIZE: usize = 4;
const PARENT_POINTER_OFFSET: usize = IS_ROOT_OFFSET + IS_ROOT_SIZE;

/// Total size of the header shared by both node types.
pub const COMMON_NODE_HEADER_SIZE: usize = NODE_TYPE_SIZE + IS_ROOT_SIZE + PARENT_POINTER_SIZE;

// Leaf Node Header Layout

const LEAF_NODE_NUM_CELLS_SIZE: usize = 4;
const LEAF_NODE_NUM_CELLS_OFFSET: usize = COMMON_NODE_HEADER_SIZE;
const LEAF_NODE_NEXT_LEAF_SIZE: usize = 4;
const LEAF_NODE_NEXT_LEAF_OFFSET: usize = LEAF_NODE_NUM_CELLS_OFFSET + LEAF_NODE_NUM_CELLS_SIZE;

/// Total size of a leaf node header (common header + num_cells + next_leaf).
pub const LEAF_NODE_HEADER_SIZE: usize =
    COMMON_NODE_HEADER_SIZE + LEAF_NODE_NUM_CELLS_SIZE + LEAF_NODE_NEXT_LEAF_SIZE;

// Leaf Node Body Layout

/// Size of the key field in a leaf cell.
pub const LEAF_NODE_KEY_SIZE: usize = 4;

/// Size of the value field in a leaf cell: one serialized row.
pub const LEAF_NODE_VALUE_SIZE: usize = ROW_SIZE;

/// Total size of a leaf cell (key + value).
pub const LEAF_NODE_CELL_SIZE: usize = LEAF_NODE_KEY_SIZE + LEAF_NODE_VALUE_SIZE;

/// Space available for cells in a leaf node (page size minus header).
pub const LEAF_NODE_SPACE_FOR_CELLS: usize = PAGE_SIZE - LEAF_NODE_HEADER_SIZE;

/// Maximum number of cells that fit in a leaf node.
pub const LEAF_NODE_MAX_CELLS: usize = LEAF_NODE_SPACE_FOR_CELLS / LEAF_NODE_CELL_SIZE;

/// Number of cells assigned to the right sibling when splitting a leaf.
pub const LEAF_NODE_RIGHT_SPLIT_COUNT: usize = (LEAF_NODE_MAX_CELLS + 1) / 2;

/// Number of cells kept in the left node when splitting a leaf. The two
/// counts sum to `MAX + 1`, so the incoming cell always has a slot.
pub const LEAF_NODE_LEFT_SPLIT_COUNT: usize =
    (LEAF_NODE_MAX_CELLS + 1) - LEAF_NODE_RIGHT_SPLIT_COUNT;

// Internal Node Header Layout

const INTERNAL_NODE_NUM_KEYS_SIZE: usize = 4;
const INTERNAL_NODE_NUM_KEYS_OFFSET: usize = COMMON_NODE_HEADER_SIZE;
const INTERNAL_NODE_RIGHT_CHILD_SIZE: usize = 4;
const INTERNAL_NODE_RIGHT_CHILD_OFFSET: usize =
    INTERNAL_NODE_NUM_KEYS_OFFSET + INTERNAL_NODE_NUM_KEYS_SIZE;

/// Total size of an internal node header (common header + num_keys + right_child).
pub const INTERNAL_NODE_HEADER_SIZE: usize =
    COMMON_NODE_HEADER_SIZE + INTERNAL_NODE_NUM_KEYS_SIZE + INTERNAL_NODE_RIGHT_CHILD_SIZE;

// Internal Node Body Layout

/// Size of a child pointer in an internal cell.
pub const INTERNAL_NODE_CHILD_SIZE: usize = 4;

/// Size of a separator key in an internal cell.
pub const INTERNAL_NODE_KEY_SIZE: usize = 4;

/// Total size of an internal cell (child pointer + key).
pub const INTERNAL_NODE_CELL_SIZE: usize = INTERNAL_NODE_CHILD_SIZE + INTERNAL_NODE_KEY_SIZE;

/// Keep this small so internal splits show up with small datasets.
pub const INTERNAL_NODE_MAX_KEYS: usize = 3;

/// Represents the type of a B-tree node.
///
/// | Property           | Internal Node                  | Leaf Node              |
/// |--------------------|--------------------------------|------------------------|
/// | Stores             | keys and pointers to children  | keys and values        |
/// | Key purpose        | used for routing               | paired with value      |
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    NodeInternal,
    NodeLeaf,
}

/// One fixed-size page buffer.
///
/// The pager hands out `&mut Page` borrows scoped to a single access; the
/// cached buffer is the canonical copy of the page until it is flushed.
#[derive(Clone, Debug)]
pub struct Page {
    pub data: [u8; PAGE_SIZE],
}

fn leaf_cell_offset(cell_num: u32) -> Result<usize, Error> {
    let offset = LEAF_NODE_HEADER_SIZE + cell_num as usize * LEAF_NODE_CELL_SIZE;
    if offset + LEAF_NODE_CELL_SIZE > PAGE_SIZE {
        return Err(err!(
            Storage,
            "Leaf cell number out of bounds (cell_num={}, max_cells={})",
            cell_num,
            LEAF_NODE_MAX_CELLS
        ));
    }
    Ok(offset)
}

fn internal_cell_offset(cell_num: u32) -> Result<usize, Error> {
    let offset = INTERNAL_NODE_HEADER_SIZE + cell_num as usize * INTERNAL_NODE_CELL_SIZE;
    if offset + INTERNAL_NODE_CELL_SIZE > PAGE_SIZE {
        return Err(err!(
            Storage,
            "Internal cell number out of bounds (cell_num={})",
            cell_num
        ));
    }
    Ok(offset)
}

impl Page {
    pub fn new() -> Page {
        Page {
            data: [0; PAGE_SIZE],
        }
    }

    fn read_u32(&self, offset: usize) -> u32 {
        let mut bytes = [0u8; 4];
        bytes.copy_from_slice(&self.data[offset..offset + 4]);
        u32::from_le_bytes(bytes)
    }

    fn write_u32(&mut self, offset: usize, value: u32) {
        self.data[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
    }

    /// Retrieves the type of the node from its data buffer.
    ///
    /// # Errors
    /// Returns an `Error::Storage` if the stored byte is neither 0 nor 1,
    /// which indicates a corrupt page.
    pub fn node_type(&self) -> Result<NodeType, Error> {
        match self.data[NODE_TYPE_OFFSET] {
            0 => Ok(NodeType::NodeInternal),
            1 => Ok(NodeType::NodeLeaf),
            invalid => Err(err!(Storage, "Invalid node type value: {}", invalid)),
        }
    }

    pub fn set_node_type(&mut self, node_type: NodeType) {
        self.data[NODE_TYPE_OFFSET] = match node_type {
            NodeType::NodeInternal => 0,
            NodeType::NodeLeaf => 1,
        };
    }

    pub fn is_root(&self) -> bool {
        self.data[IS_ROOT_OFFSET] == 1
    }

    pub fn set_root(&mut self, is_root: bool) {
        self.data[IS_ROOT_OFFSET] = is_root as u8;
    }

    /// Page number of the parent node. Meaningless on the root.
    pub fn parent(&self) -> u32 {
        self.read_u32(PARENT_POINTER_OFFSET)
    }

    pub fn set_parent(&mut self, parent_page_num: u32) {
        self.write_u32(PARENT_POINTER_OFFSET, parent_page_num);
    }

    /// Resets the page to an empty non-root leaf with no sibling.
    pub fn initialize_leaf(&mut self) {
        self.set_node_type(NodeType::NodeLeaf);
        self.set_root(false);
        self.set_leaf_num_cells(0);
        // 0 represents no sibling; page 0 is always the root, never a
        // member of the leaf chain.
        self.set_leaf_next_leaf(0);
    }

    /// Resets the page to an empty non-root internal node.
    pub fn initialize_internal(&mut self) {
        self.set_node_type(NodeType::NodeInternal);
        self.set_root(false);
        self.set_internal_num_keys(0);
        // The root lives on page 0, so 0 can never be a valid right
        // child; leaving it would make this node a parent of the root.
        self.set_internal_right_child(INVALID_PAGE_NUM);
    }

    // Leaf node accessors

    pub fn leaf_num_cells(&self) -> u32 {
        self.read_u32(LEAF_NODE_NUM_CELLS_OFFSET)
    }

    pub fn set_leaf_num_cells(&mut self, num: u32) {
        self.write_u32(LEAF_NODE_NUM_CELLS_OFFSET, num);
    }

    /// Page number of the next leaf in key order; 0 means no sibling.
    pub fn leaf_next_leaf(&self) -> u32 {
        self.read_u32(LEAF_NODE_NEXT_LEAF_OFFSET)
    }

    pub fn set_leaf_next_leaf(&mut self, next_leaf: u32) {
        self.write_u32(LEAF_NODE_NEXT_LEAF_OFFSET, next_leaf);
    }

    pub fn leaf_key(&self, cell_num: u32) -> Result<u32, Error> {
        let offset = leaf_cell_offset(cell_num)?;
        Ok(self.read_u32(offset))
    }

    pub fn set_leaf_key(&mut self, cell_num: u32, key: u32) -> Result<(), Error> {
        let offset = leaf_cell_offset(cell_num)?;
        self.write_u32(offset, key);
        Ok(())
    }

    /// Value bytes of the specified cell.
    pub fn leaf_value(&self, cell_num: u32) -> Result<&[u8], Error> {
        let offset = leaf_cell_offset(cell_num)? + LEAF_NODE_KEY_SIZE;
        Ok(&self.data[offset..offset + LEAF_NODE_VALUE_SIZE])
    }

    pub fn leaf_value_mut(&mut self, cell_num: u32) -> Result<&mut [u8], Error> {
        let offset = leaf_cell_offset(cell_num)? + LEAF_NODE_KEY_SIZE;
        Ok(&mut self.data[offset..offset + LEAF_NODE_VALUE_SIZE])
    }

    /// Moves cell `src` over cell `dest` within this page.
    pub fn move_leaf_cell(&mut self, src: u32, dest: u32) -> Result<(), Error> {
        let src_offset = leaf_cell_offset(src)?;
        let dest_offset = leaf_cell_offset(dest)?;
        self.data
            .copy_within(src_offset..src_offset + LEAF_NODE_CELL_SIZE, dest_offset);
        Ok(())
    }

    /// Copies a whole cell out of another page into this one.
    pub fn copy_leaf_cell_from(
        &mut self,
        dest_cell: u32,
        src: &Page,
        src_cell: u32,
    ) -> Result<(), Error> {
        let dest_offset = leaf_cell_offset(dest_cell)?;
        let src_offset = leaf_cell_offset(src_cell)?;
        self.data[dest_offset..dest_offset + LEAF_NODE_CELL_SIZE]
            .copy_from_slice(&src.data[src_offset..src_offset + LEAF_NODE_CELL_SIZE]);
        Ok(())
    }

    // Internal node accessors

    pub fn internal_num_keys(&self) -> u32 {
        self.read_u32(INTERNAL_NODE_NUM_KEYS_OFFSET)
    }

    pub fn set_internal_num_keys(&mut self, num_keys: u32) {
        self.write_u32(INTERNAL_NODE_NUM_KEYS_OFFSET, num_keys);
    }

    pub fn internal_right_child(&self) -> u32 {
        self.read_u32(INTERNAL_NODE_RIGHT_CHILD_OFFSET)
    }

    pub fn set_internal_right_child(&mut self, right_child: u32) {
        self.write_u32(INTERNAL_NODE_RIGHT_CHILD_OFFSET, right_child);
    }

    /// Page number of the child at `child_num`. `child_num == num_keys`
    /// addresses the right child.
    ///
    /// # Errors
    /// Returns an `Error::Storage` if `child_num` exceeds `num_keys`.
    pub fn internal_child(&self, child_num: u32) -> Result<u32, Error> {
        let num_keys = self.internal_num_keys();
        if child_num > num_keys {
            return Err(err!(
                Storage,
                "Tried to access child_num {} > num_keys {}",
                child_num,
                num_keys
            ));
        }
        if child_num == num_keys {
            Ok(self.internal_right_child())
        } else {
            let offset = internal_cell_offset(child_num)?;
            Ok(self.read_u32(offset))
        }
    }

    pub fn set_internal_child(&mut self, child_num: u32, child_page_num: u32) -> Result<(), Error> {
        if child_num == self.internal_num_keys() {
            self.set_internal_right_child(child_page_num);
        } else {
            let offset = internal_cell_offset(child_num)?;
            self.write_u32(offset, child_page_num);
        }
        Ok(())
    }

    /// Separator key at `key_num`. Bounds checked against the page, not
    /// `num_keys`: [`Page::update_internal_key`] transiently addresses
    /// the slot one past the last separator.
    pub fn internal_key(&self, key_num: u32) -> Result<u32, Error> {
        let offset = internal_cell_offset(key_num)? + INTERNAL_NODE_CHILD_SIZE;
        Ok(self.read_u32(offset))
    }

    pub fn set_internal_key(&mut self, key_num: u32, key: u32) -> Result<(), Error> {
        let offset = internal_cell_offset(key_num)? + INTERNAL_NODE_CHILD_SIZE;
        self.write_u32(offset, key);
        Ok(())
    }

    /// Moves cell `src` over cell `dest` within this page.
    pub fn move_internal_cell(&mut self, src: u32, dest: u32) -> Result<(), Error> {
        let src_offset = internal_cell_offset(src)?;
        let dest_offset = internal_cell_offset(dest)?;
        self.data.copy_within(
            src_offset..src_offset + INTERNAL_NODE_CELL_SIZE,
            dest_offset,
        );
        Ok(())
    }

    /// Index of the child that should contain `key`: the smallest
    /// separator index whose key is `>= key`, or `num_keys` for the
    /// right child. Equal keys descend left because a separator is the
    /// maximum key of its child.
    pub fn internal_find_child(&self, key: u32) -> Result<u32, Error> {
        let num_keys = self.internal_num_keys();

        let mut min_index = 0;
        let mut max_index = num_keys;
        while min_index != max_index {
            let index = (min_index + max_index) / 2;
            let key_to_right = self.internal_key(index)?;
            if key_to_right >= key {
                max_index = index;
            } else {
                min_index = index + 1;
            }
        }
        Ok(min_index)
    }

    /// Rewrites the separator that covered `old_key` to `new_key`.
    pub fn update_internal_key(&mut self, old_key: u32, new_key: u32) -> Result<(), Error> {
        let old_child_index = self.internal_find_child(old_key)?;
        self.set_internal_key(old_child_index, new_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_constants() {
        assert_eq!(COMMON_NODE_HEADER_SIZE, 6);
        assert_eq!(LEAF_NODE_HEADER_SIZE, 14);
        assert_eq!(LEAF_NODE_CELL_SIZE, 295);
        assert_eq!(LEAF_NODE_SPACE_FOR_CELLS, 4082);
        assert_eq!(LEAF_NODE_MAX_CELLS, 13);
        assert_eq!(LEAF_NODE_LEFT_SPLIT_COUNT + LEAF_NODE_RIGHT_SPLIT_COUNT, 14);
        assert_eq!(INTERNAL_NODE_HEADER_SIZE, 14);
        assert_eq!(INTERNAL_NODE_CELL_SIZE, 8);
    }

    #[test]
    fn leaf_initialization() {
        let mut page = Page::new();
        page.initialize_leaf();
        assert_eq!(page.node_type().unwrap(), NodeType::NodeLeaf);
        assert!(!page.is_root());
        assert_eq!(page.leaf_num_cells(), 0);
        assert_eq!(page.leaf_next_leaf(), 0);
    }

    #[test]
    fn internal_initialization() {
        let mut page = Page::new();
        page.initialize_internal();
        assert_eq!(page.node_type().unwrap(), NodeType::NodeInternal);
        assert_eq!(page.internal_num_keys(), 0);
        assert_eq!(page.internal_right_child(), INVALID_PAGE_NUM);
    }

    #[test]
    fn invalid_node_type_is_rejected() {
        let mut page = Page::new();
        page.data[0] = 7;
        assert!(page.node_type().is_err());
    }

    #[test]
    fn header_fields_round_trip() {
        let mut page = Page::new();
        page.initialize_leaf();
        page.set_root(true);
        page.set_parent(42);
        page.set_leaf_num_cells(5);
        page.set_leaf_next_leaf(9);

        assert!(page.is_root());
        assert_eq!(page.parent(), 42);
        assert_eq!(page.leaf_num_cells(), 5);
        assert_eq!(page.leaf_next_leaf(), 9);
    }

    #[test]
    fn leaf_cells_round_trip() {
        let mut page = Page::new();
        page.initialize_leaf();
        page.set_leaf_key(0, 17).unwrap();
        page.leaf_value_mut(0).unwrap()[0] = 0xAB;

        assert_eq!(page.leaf_key(0).unwrap(), 17);
        assert_eq!(page.leaf_value(0).unwrap()[0], 0xAB);
        assert_eq!(page.leaf_value(0).unwrap().len(), LEAF_NODE_VALUE_SIZE);
    }

    #[test]
    fn leaf_cell_past_capacity_is_rejected() {
        let page = Page::new();
        assert!(page.leaf_key(LEAF_NODE_MAX_CELLS as u32).is_err());
        assert!(page.leaf_key(LEAF_NODE_MAX_CELLS as u32 - 1).is_ok());
    }

    #[test]
    fn internal_child_dispatches_to_right_child() {
        let mut page = Page::new();
        page.initialize_internal();
        page.set_internal_num_keys(2);
        page.set_internal_child(0, 3).unwrap();
        page.set_internal_child(1, 4).unwrap();
        page.set_internal_right_child(5);

        assert_eq!(page.internal_child(0).unwrap(), 3);
        assert_eq!(page.internal_child(1).unwrap(), 4);
        assert_eq!(page.internal_child(2).unwrap(), 5);
        assert!(page.internal_child(3).is_err());
    }

    #[test]
    fn internal_find_child_picks_first_covering_separator() {
        let mut page = Page::new();
        page.initialize_internal();
        page.set_internal_num_keys(3);
        for (i, key) in [5u32, 10, 15].iter().enumerate() {
            page.set_internal_key(i as u32, *key).unwrap();
        }

        assert_eq!(page.internal_find_child(1).unwrap(), 0);
        assert_eq!(page.internal_find_child(5).unwrap(), 0);
        assert_eq!(page.internal_find_child(6).unwrap(), 1);
        assert_eq!(page.internal_find_child(15).unwrap(), 2);
        assert_eq!(page.internal_find_child(16).unwrap(), 3);
    }

    #[test]
    fn update_internal_key_rewrites_covering_separator() {
        let mut page = Page::new();
        page.initialize_internal();
        page.set_internal_num_keys(2);
        page.set_internal_key(0, 7).unwrap();
        page.set_internal_key(1, 20).unwrap();

        page.update_internal_key(7, 9).unwrap();
        assert_eq!(page.internal_key(0).unwrap(), 9);
        assert_eq!(page.internal_key(1).unwrap(), 20);
    }
}
