//! # Database Cursor Module
//!
//! A cursor is a `(page, cell)` position inside the B-tree and the only
//! way to read or insert rows. It holds no borrow of the table; every
//! operation takes the table explicitly and re-fetches pages through the
//! pager, so a cursor stays cheap to copy around between calls.

use super::node::NodeType;
use super::table::Table;
use crate::errors::Error;

/// Represents a position within a database table.
#[derive(Debug, Clone)]
pub struct Cursor {
    /// Current page number in the table.
    pub page_num: u32,

    /// Current cell number within the page.
    pub cell_num: u32,

    /// Indicates a position one past the last element.
    pub end_of_table: bool,
}

impl Cursor {
    /// Creates a cursor positioned at the first row in key order.
    ///
    /// Descends to the leftmost leaf; the table is empty only when that
    /// leaf is the empty root leaf.
    pub fn start(table: &mut Table) -> Result<Cursor, Error> {
        let mut cursor = Cursor::find(table, 0)?;
        let node = table.pager.get_page(cursor.page_num)?;
        cursor.end_of_table = node.leaf_num_cells() == 0;
        Ok(cursor)
    }

    /// Finds the position for `key`: the cell holding it if present,
    /// otherwise the slot where it would be inserted.
    pub fn find(table: &mut Table, key: u32) -> Result<Cursor, Error> {
        let root_page_num = table.root_page_num;
        let root_type = table.pager.get_page(root_page_num)?.node_type()?;
        match root_type {
            NodeType::NodeLeaf => Self::leaf_find(table, root_page_num, key),
            NodeType::NodeInternal => Self::internal_find(table, root_page_num, key),
        }
    }

    fn internal_find(table: &mut Table, page_num: u32, key: u32) -> Result<Cursor, Error> {
        let node = table.pager.get_page(page_num)?;
        let child_index = node.internal_find_child(key)?;
        let child_num = node.internal_child(child_index)?;

        let child_type = table.pager.get_page(child_num)?.node_type()?;
        match child_type {
            NodeType::NodeLeaf => Self::leaf_find(table, child_num, key),
            NodeType::NodeInternal => Self::internal_find(table, child_num, key),
        }
    }

    /// Binary search within one leaf. Lands on the matching cell, or on
    /// the first cell with a larger key (the insertion position), which
    /// may be one past the last cell.
    fn leaf_find(table: &mut Table, page_num: u32, key: u32) -> Result<Cursor, Error> {
        let node = table.pager.get_page(page_num)?;
        let num_cells = node.leaf_num_cells();

        let mut min_index = 0;
        let mut one_past_max_index = num_cells;
        while one_past_max_index != min_index {
            let index = (min_index + one_past_max_index) / 2;
            let key_at_index = node.leaf_key(index)?;
            if key == key_at_index {
                return Ok(Cursor {
                    page_num,
                    cell_num: index,
                    end_of_table: false,
                });
            }
            if key < key_at_index {
                one_past_max_index = index;
            } else {
                min_index = index + 1;
            }
        }

        Ok(Cursor {
            page_num,
            cell_num: min_index,
            end_of_table: false,
        })
    }

    /// Value bytes of the cell under the cursor.
    pub fn value<'a>(&self, table: &'a mut Table) -> Result<&'a [u8], Error> {
        let node = table.pager.get_page(self.page_num)?;
        node.leaf_value(self.cell_num)
    }

    /// Advances to the next cell, following the leaf sibling chain.
    pub fn advance(&mut self, table: &mut Table) -> Result<(), Error> {
        let node = table.pager.get_page(self.page_num)?;
        self.cell_num += 1;
        if self.cell_num >= node.leaf_num_cells() {
            let next_page = node.leaf_next_leaf();
            if next_page == 0 {
                // Page 0 is always the root, so 0 unambiguously means
                // this was the rightmost leaf.
                self.end_of_table = true;
            } else {
                self.page_num = next_page;
                self.cell_num = 0;
            }
        }
        Ok(())
    }
}
