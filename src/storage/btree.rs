//! B-tree operations over pager-resident nodes.
//!
//! Searching is fast (logarithmic), inserting near a found position is
//! cheap, and range scans ride the leaf sibling chain, which is why the
//! table lives in a B-tree rather than a sorted array of rows. Every
//! operation here threads the table explicitly and re-fetches pages
//! through the pager by number; the pager's cached buffer is the only
//! authoritative copy of a node, so nothing below holds a page across a
//! call that may mutate the tree.

use super::cursor::Cursor;
use super::node::{
    NodeType, INTERNAL_NODE_MAX_KEYS, INVALID_PAGE_NUM, LEAF_NODE_LEFT_SPLIT_COUNT,
    LEAF_NODE_MAX_CELLS, LEAF_NODE_RIGHT_SPLIT_COUNT,
};
use super::pager::Pager;
use super::row::Row;
use super::table::Table;
use crate::errors::Error;
use tracing::debug;

/// Largest key stored under `page_num`. For an internal node this chases
/// right children down to a leaf.
pub fn node_max_key(pager: &mut Pager, page_num: u32) -> Result<u32, Error> {
    let node = pager.get_page(page_num)?;
    match node.node_type()? {
        NodeType::NodeLeaf => node.leaf_key(node.leaf_num_cells() - 1),
        NodeType::NodeInternal => {
            let right_child = node.internal_right_child();
            node_max_key(pager, right_child)
        }
    }
}

/// Writes `(key, row)` at the cursor position, shifting later cells
/// right. Splits the leaf when it is already at capacity.
pub fn leaf_insert(table: &mut Table, cursor: &Cursor, key: u32, row: &Row) -> Result<(), Error> {
    let node = table.pager.get_page(cursor.page_num)?;
    let num_cells = node.leaf_num_cells();

    if num_cells >= LEAF_NODE_MAX_CELLS as u32 {
        return leaf_split_and_insert(table, cursor, key, row);
    }

    if cursor.cell_num < num_cells {
        // Make room for the new cell.
        for i in (cursor.cell_num + 1..=num_cells).rev() {
            node.move_leaf_cell(i - 1, i)?;
        }
    }
    node.set_leaf_num_cells(num_cells + 1);
    node.set_leaf_key(cursor.cell_num, key)?;
    row.serialize(node.leaf_value_mut(cursor.cell_num)?)?;
    Ok(())
}

/// Creates a new leaf, moves the upper half of the cells over, inserts
/// the new cell into whichever side owns its slot, and links the new
/// leaf into the parent.
fn leaf_split_and_insert(
    table: &mut Table,
    cursor: &Cursor,
    key: u32,
    row: &Row,
) -> Result<(), Error> {
    let new_page_num = table.pager.get_unused_page_num();
    debug!(page_num = cursor.page_num, new_page_num, "Splitting leaf node");

    // Snapshot the old leaf before any mutation; cell moves below read
    // from the snapshot while both live pages are being rewritten.
    let old = table.pager.get_page(cursor.page_num)?.clone();
    let old_max = old.leaf_key(old.leaf_num_cells() - 1)?;

    {
        let new_node = table.pager.get_page(new_page_num)?;
        new_node.initialize_leaf();
        new_node.set_parent(old.parent());
        // The old leaf's sibling becomes the new leaf, and the new
        // leaf's sibling becomes whatever the old leaf pointed at.
        new_node.set_leaf_next_leaf(old.leaf_next_leaf());
    }
    table
        .pager
        .get_page(cursor.page_num)?
        .set_leaf_next_leaf(new_page_num);

    // All existing cells plus the new one are divided evenly between the
    // old (left) and new (right) nodes. Working from the highest target
    // index down keeps every read from the snapshot ahead of the writes.
    for i in (0..=LEAF_NODE_MAX_CELLS as u32).rev() {
        let dest_page_num = if i >= LEAF_NODE_LEFT_SPLIT_COUNT as u32 {
            new_page_num
        } else {
            cursor.page_num
        };
        let index_within_node = i % LEAF_NODE_LEFT_SPLIT_COUNT as u32;
        let destination = table.pager.get_page(dest_page_num)?;

        if i == cursor.cell_num {
            destination.set_leaf_key(index_within_node, key)?;
            row.serialize(destination.leaf_value_mut(index_within_node)?)?;
        } else if i > cursor.cell_num {
            destination.copy_leaf_cell_from(index_within_node, &old, i - 1)?;
        } else {
            destination.copy_leaf_cell_from(index_within_node, &old, i)?;
        }
    }

    table
        .pager
        .get_page(cursor.page_num)?
        .set_leaf_num_cells(LEAF_NODE_LEFT_SPLIT_COUNT as u32);
    table
        .pager
        .get_page(new_page_num)?
        .set_leaf_num_cells(LEAF_NODE_RIGHT_SPLIT_COUNT as u32);

    if old.is_root() {
        create_new_root(table, new_page_num)
    } else {
        let parent_page_num = old.parent();
        let new_max = node_max_key(&mut table.pager, cursor.page_num)?;
        table
            .pager
            .get_page(parent_page_num)?
            .update_internal_key(old_max, new_max)?;
        internal_node_insert(table, parent_page_num, new_page_num)
    }
}

/// Handles splitting the root: the old root's content moves to a fresh
/// left child so the root keeps page number 0, and the root page is
/// reinitialized as an internal node over the two children.
pub fn create_new_root(table: &mut Table, right_child_page_num: u32) -> Result<(), Error> {
    let root_page_num = table.root_page_num;
    let left_child_page_num = table.pager.get_unused_page_num();
    debug!(
        right_child_page_num,
        left_child_page_num, "Creating a new root"
    );

    let root_was_internal =
        table.pager.get_page(root_page_num)?.node_type()? == NodeType::NodeInternal;
    if root_was_internal {
        table
            .pager
            .get_page(right_child_page_num)?
            .initialize_internal();
        table
            .pager
            .get_page(left_child_page_num)?
            .initialize_internal();
    }

    let root_snapshot = table.pager.get_page(root_page_num)?.clone();
    {
        let left_child = table.pager.get_page(left_child_page_num)?;
        left_child.data.copy_from_slice(&root_snapshot.data);
        left_child.set_root(false);
    }

    if root_was_internal {
        // The copied children still point at the root page; re-home them.
        for i in 0..root_snapshot.internal_num_keys() {
            let child_page_num = root_snapshot.internal_child(i)?;
            table
                .pager
                .get_page(child_page_num)?
                .set_parent(left_child_page_num);
        }
        let right = root_snapshot.internal_right_child();
        table.pager.get_page(right)?.set_parent(left_child_page_num);
    }

    let left_child_max = node_max_key(&mut table.pager, left_child_page_num)?;
    {
        let root = table.pager.get_page(root_page_num)?;
        root.initialize_internal();
        root.set_root(true);
        root.set_internal_num_keys(1);
        root.set_internal_child(0, left_child_page_num)?;
        root.set_internal_key(0, left_child_max)?;
        root.set_internal_right_child(right_child_page_num);
    }

    table
        .pager
        .get_page(left_child_page_num)?
        .set_parent(root_page_num);
    table
        .pager
        .get_page(right_child_page_num)?
        .set_parent(root_page_num);
    Ok(())
}

/// Adds a child/key pair to `parent_page_num` referencing
/// `child_page_num`. The rightmost child is stored separately from the
/// cell array, so a child whose max key exceeds the current right
/// child's demotes the old right child into the array instead of
/// shifting cells.
pub fn internal_node_insert(
    table: &mut Table,
    parent_page_num: u32,
    child_page_num: u32,
) -> Result<(), Error> {
    let child_max_key = node_max_key(&mut table.pager, child_page_num)?;
    let parent = table.pager.get_page(parent_page_num)?;
    let index = parent.internal_find_child(child_max_key)?;
    let original_num_keys = parent.internal_num_keys();

    if original_num_keys >= INTERNAL_NODE_MAX_KEYS as u32 {
        return internal_node_split_and_insert(table, parent_page_num, child_page_num);
    }

    let right_child_page_num = parent.internal_right_child();
    // An internal node with an invalid right child is freshly born and
    // empty; the new child becomes its right child outright.
    if right_child_page_num == INVALID_PAGE_NUM {
        parent.set_internal_right_child(child_page_num);
        return Ok(());
    }

    let right_child_max = node_max_key(&mut table.pager, right_child_page_num)?;
    let parent = table.pager.get_page(parent_page_num)?;
    parent.set_internal_num_keys(original_num_keys + 1);

    if child_max_key > right_child_max {
        // Replace the right child; the old one joins the cell array.
        parent.set_internal_child(original_num_keys, right_child_page_num)?;
        parent.set_internal_key(original_num_keys, right_child_max)?;
        parent.set_internal_right_child(child_page_num);
    } else {
        // Make room for the new cell.
        for i in (index + 1..=original_num_keys).rev() {
            parent.move_internal_cell(i - 1, i)?;
        }
        parent.set_internal_child(index, child_page_num)?;
        parent.set_internal_key(index, child_max_key)?;
    }
    Ok(())
}

/// Splits a full internal node while inserting `child_page_num`.
///
/// The sibling takes the old right child plus the upper half of the cell
/// array; the incoming child then lands on whichever side covers its max
/// key, the grandparent separator for the old node is refreshed, and the
/// sibling is inserted one level up (which may cascade).
pub fn internal_node_split_and_insert(
    table: &mut Table,
    parent_page_num: u32,
    child_page_num: u32,
) -> Result<(), Error> {
    let mut old_page_num = parent_page_num;
    let old_max = node_max_key(&mut table.pager, old_page_num)?;
    let child_max = node_max_key(&mut table.pager, child_page_num)?;

    let new_page_num = table.pager.get_unused_page_num();
    let splitting_root = table.pager.get_page(old_page_num)?.is_root();
    debug!(
        old_page_num,
        child_page_num, new_page_num, splitting_root, "Splitting internal node"
    );

    let parent_page_num = if splitting_root {
        // create_new_root moved the old root's content onto a fresh left
        // child; that left child is now the node being split.
        create_new_root(table, new_page_num)?;
        let root_page_num = table.root_page_num;
        old_page_num = table.pager.get_page(root_page_num)?.internal_child(0)?;
        root_page_num
    } else {
        let parent = table.pager.get_page(old_page_num)?.parent();
        table.pager.get_page(new_page_num)?.initialize_internal();
        parent
    };

    let old_node = table.pager.get_page(old_page_num)?;
    let mut old_num_keys = old_node.internal_num_keys();

    // The old right child moves over first, then the upper half of the
    // cell array, one child at a time.
    let cur_page_num = old_node.internal_right_child();
    internal_node_insert(table, new_page_num, cur_page_num)?;
    table.pager.get_page(cur_page_num)?.set_parent(new_page_num);
    table
        .pager
        .get_page(old_page_num)?
        .set_internal_right_child(INVALID_PAGE_NUM);

    for i in ((INTERNAL_NODE_MAX_KEYS / 2 + 1)..INTERNAL_NODE_MAX_KEYS).rev() {
        let cur_page_num = table.pager.get_page(old_page_num)?.internal_child(i as u32)?;
        internal_node_insert(table, new_page_num, cur_page_num)?;
        table.pager.get_page(cur_page_num)?.set_parent(new_page_num);

        old_num_keys -= 1;
        table
            .pager
            .get_page(old_page_num)?
            .set_internal_num_keys(old_num_keys);
    }

    // The highest remaining child becomes the old node's right child.
    let old_node = table.pager.get_page(old_page_num)?;
    let new_right = old_node.internal_child(old_num_keys - 1)?;
    old_node.set_internal_right_child(new_right);
    old_num_keys -= 1;
    old_node.set_internal_num_keys(old_num_keys);

    let max_after_split = node_max_key(&mut table.pager, old_page_num)?;
    let destination_page_num = if child_max < max_after_split {
        old_page_num
    } else {
        new_page_num
    };

    internal_node_insert(table, destination_page_num, child_page_num)?;
    table
        .pager
        .get_page(child_page_num)?
        .set_parent(destination_page_num);

    let old_max_after = node_max_key(&mut table.pager, old_page_num)?;
    table
        .pager
        .get_page(parent_page_num)?
        .update_internal_key(old_max, old_max_after)?;

    if !splitting_root {
        let grandparent = table.pager.get_page(old_page_num)?.parent();
        internal_node_insert(table, grandparent, new_page_num)?;
        table.pager.get_page(new_page_num)?.set_parent(grandparent);
    }
    Ok(())
}

/// Renders the subtree under `page_num` depth-first into `out`, two
/// spaces per indentation level.
pub fn print_tree(
    pager: &mut Pager,
    page_num: u32,
    indentation_level: usize,
    out: &mut String,
) -> Result<(), Error> {
    let node_type = pager.get_page(page_num)?.node_type()?;
    match node_type {
        NodeType::NodeLeaf => {
            let node = pager.get_page(page_num)?;
            let num_cells = node.leaf_num_cells();
            indent(out, indentation_level);
            out.push_str(&format!("- leaf (size {})\n", num_cells));
            for i in 0..num_cells {
                indent(out, indentation_level + 1);
                out.push_str(&format!("- {}\n", node.leaf_key(i)?));
            }
        }
        NodeType::NodeInternal => {
            let num_keys = pager.get_page(page_num)?.internal_num_keys();
            indent(out, indentation_level);
            out.push_str(&format!("- internal (size {})\n", num_keys));
            if num_keys > 0 {
                for i in 0..num_keys {
                    let child = pager.get_page(page_num)?.internal_child(i)?;
                    print_tree(pager, child, indentation_level + 1, out)?;

                    let key = pager.get_page(page_num)?.internal_key(i)?;
                    indent(out, indentation_level + 1);
                    out.push_str(&format!("- key {}\n", key));
                }
                let right = pager.get_page(page_num)?.internal_right_child();
                print_tree(pager, right, indentation_level + 1, out)?;
            }
        }
    }
    Ok(())
}

fn indent(out: &mut String, level: usize) {
    for _ in 0..level {
        out.push_str("  ");
    }
}
