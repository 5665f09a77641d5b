//! Table lifecycle and statement executors.
//!
//! A table is one B-tree in one file. Page 0 is the root for the life of
//! the database; opening an empty file installs an empty root leaf there.

use super::btree;
use super::cursor::Cursor;
use super::node::{
    COMMON_NODE_HEADER_SIZE, LEAF_NODE_CELL_SIZE, LEAF_NODE_HEADER_SIZE, LEAF_NODE_MAX_CELLS,
    LEAF_NODE_SPACE_FOR_CELLS,
};
use super::pager::Pager;
use super::row::{Row, ROW_SIZE};
use crate::errors::Error;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub struct Table {
    pub root_page_num: u32,
    pub pager: Pager,
    path: PathBuf,
}

impl Table {
    /// Opens the database at `path`, creating it if missing. A brand-new
    /// database gets its root leaf installed on page 0.
    pub fn open(path: &Path) -> Result<Table, Error> {
        let mut pager = Pager::open(path)?;

        if pager.num_pages() == 0 {
            let root = pager.get_page(0)?;
            root.initialize_leaf();
            root.set_root(true);
        }

        info!(path = %path.display(), num_pages = pager.num_pages(), "Opened table");
        Ok(Table {
            root_page_num: 0,
            pager,
            path: path.to_path_buf(),
        })
    }

    /// Flushes every cached page and closes the file. Only this persists
    /// writes; a session that never closes loses them.
    pub fn close(&mut self) -> Result<(), Error> {
        self.pager.close()?;
        info!(path = %self.path.display(), "Closed table");
        Ok(())
    }

    /// Inserts one row keyed by its id.
    ///
    /// # Errors
    /// Returns `Error::DuplicateKey` if the id is already present; the
    /// table is left untouched in that case.
    pub fn insert(&mut self, row: &Row) -> Result<(), Error> {
        let key = row.id;
        debug!(key, "Inserting a row...");
        let cursor = Cursor::find(self, key)?;

        let node = self.pager.get_page(cursor.page_num)?;
        if cursor.cell_num < node.leaf_num_cells() && node.leaf_key(cursor.cell_num)? == key {
            return Err(Error::DuplicateKey);
        }

        btree::leaf_insert(self, &cursor, key, row)
    }

    /// Returns every row in ascending id order.
    pub fn select(&mut self) -> Result<Vec<Row>, Error> {
        let mut rows = Vec::new();
        let mut cursor = Cursor::start(self)?;
        while !cursor.end_of_table {
            rows.push(Row::deserialize(cursor.value(self)?)?);
            cursor.advance(self)?;
        }
        Ok(rows)
    }

    /// Renders the whole tree for the `.btree` meta command.
    pub fn btree_to_string(&mut self) -> Result<String, Error> {
        let mut out = String::new();
        btree::print_tree(&mut self.pager, self.root_page_num, 0, &mut out)?;
        Ok(out)
    }

    /// Renders the layout constants for the `.constants` meta command.
    pub fn constants_to_string(&self) -> String {
        format!(
            "ROW_SIZE: {}\n\
             COMMON_NODE_HEADER_SIZE: {}\n\
             LEAF_NODE_HEADER_SIZE: {}\n\
             LEAF_NODE_CELL_SIZE: {}\n\
             LEAF_NODE_SPACE_FOR_CELLS: {}\n\
             LEAF_NODE_MAX_CELLS: {}\n",
            ROW_SIZE,
            COMMON_NODE_HEADER_SIZE,
            LEAF_NODE_HEADER_SIZE,
            LEAF_NODE_CELL_SIZE,
            LEAF_NODE_SPACE_FOR_CELLS,
            LEAF_NODE_MAX_CELLS,
        )
    }
}
