//! Cursor: a positioned, page-at-a-time traversal over a B-tree's
//! leaves. There are no sibling pointers, so moving past the end of
//! one leaf means climbing to the parent, stepping to the next child,
//! and descending back down to that child's leftmost leaf —
//! [`Cursor::advance`] below does exactly that.

use super::node::{Node, NodeType};
use super::page::PageNum;
use super::pager::Pager;
use crate::error::Result;

pub struct Cursor {
    page_num: PageNum,
    cell_num: u16,
    end_of_table: bool,
}

impl Cursor {
    /// Positions a cursor at the first cell of the tree's leftmost leaf.
    pub fn from_start(pager: &mut Pager, root: PageNum) -> Result<Self> {
        let leaf_num = descend_leftmost(pager, root)?;
        let num_cells = {
            let handle = pager.get_page(leaf_num)?;
            Node::new(&mut handle.borrow_mut()).num_cells()
        };
        Ok(Cursor {
            page_num: leaf_num,
            cell_num: 0,
            end_of_table: num_cells == 0,
        })
    }

    /// Looks up `key` exactly, returning `None` if it isn't present.
    pub fn find(pager: &mut Pager, root: PageNum, key: u64) -> Result<Option<Self>> {
        let mut page_num = root;
        loop {
            let handle = pager.get_page(page_num)?;
            let mut page = handle.borrow_mut();
            let node = Node::new(&mut page);
            match node.node_type()? {
                NodeType::Leaf => {
                    return Ok(node.find_cell(key).ok().map(|cell_num| Cursor {
                        page_num,
                        cell_num,
                        end_of_table: false,
                    }));
                }
                NodeType::Internal => {
                    let child = node.find_child(key);
                    drop(node);
                    drop(page);
                    drop(handle);
                    page_num = child;
                }
            }
        }
    }

    pub fn is_end(&self) -> bool {
        self.end_of_table
    }

    /// The `(key, record)` pair at the cursor's current position, or
    /// `None` once it has run off the end of the table.
    pub fn value(&self, pager: &mut Pager) -> Result<Option<(u64, Vec<u8>)>> {
        if self.end_of_table {
            return Ok(None);
        }
        let handle = pager.get_page(self.page_num)?;
        let mut page = handle.borrow_mut();
        let node = Node::new(&mut page);
        let (key, data) = node.leaf_cell(self.cell_num);
        Ok(Some((key, data.to_vec())))
    }

    /// Moves to the next cell, climbing and re-descending the tree at
    /// leaf boundaries. Sets `is_end()` once there is nothing left.
    pub fn advance(&mut self, pager: &mut Pager) -> Result<()> {
        if self.end_of_table {
            return Ok(());
        }
        self.cell_num += 1;
        let num_cells = {
            let handle = pager.get_page(self.page_num)?;
            Node::new(&mut handle.borrow_mut()).num_cells()
        };
        if self.cell_num < num_cells {
            return Ok(());
        }
        match next_leaf(pager, self.page_num)? {
            Some(next) => {
                self.page_num = next;
                self.cell_num = 0;
            }
            None => self.end_of_table = true,
        }
        Ok(())
    }
}

fn descend_leftmost(pager: &mut Pager, mut page_num: PageNum) -> Result<PageNum> {
    loop {
        let handle = pager.get_page(page_num)?;
        let mut page = handle.borrow_mut();
        let node = Node::new(&mut page);
        match node.node_type()? {
            NodeType::Leaf => return Ok(page_num),
            NodeType::Internal => {
                let first = if node.num_keys() > 0 {
                    node.entry(0).0
                } else {
                    node.right_child()
                };
                drop(node);
                drop(page);
                drop(handle);
                page_num = first;
            }
        }
    }
}

/// The leaf immediately after `leaf_num`'s subtree in key order, found
/// by climbing the parent chain until a sibling to the right exists,
/// then descending that sibling's leftmost path back down.
fn next_leaf(pager: &mut Pager, mut child: PageNum) -> Result<Option<PageNum>> {
    loop {
        let handle = pager.get_page(child)?;
        let (parent, is_root) = {
            let mut page = handle.borrow_mut();
            let node = Node::new(&mut page);
            (node.parent(), node.is_root())
        };
        if is_root {
            return Ok(None);
        }
        let parent_handle = pager.get_page(parent)?;
        let mut parent_page = parent_handle.borrow_mut();
        let parent_node = Node::new(&mut parent_page);
        if let Some(idx) = parent_node.find_child_index(child) {
            let sibling = if idx + 1 < parent_node.num_keys() {
                parent_node.entry(idx + 1).0
            } else {
                parent_node.right_child()
            };
            drop(parent_node);
            drop(parent_page);
            drop(parent_handle);
            return Ok(Some(descend_leftmost(pager, sibling)?));
        }
        // `child` was the parent's right child: there's no sibling at
        // this level, keep climbing.
        drop(parent_node);
        drop(parent_page);
        drop(parent_handle);
        child = parent;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::btree;
    use tempfile::NamedTempFile;

    fn pager_with_root(n: u64) -> (NamedTempFile, Pager, PageNum) {
        let tmp = NamedTempFile::new().unwrap();
        let mut pager = Pager::open(tmp.path()).unwrap();
        let (num, handle) = pager.new_page().unwrap();
        Node::new(&mut handle.borrow_mut()).init_leaf(0, true);
        let mut root = num;
        for key in 0..n {
            root = btree::insert(&mut pager, root, key, b"row").unwrap();
        }
        (tmp, pager, root)
    }

    #[test]
    fn scans_every_row_in_ascending_order_across_splits() {
        let (_tmp, mut pager, root) = pager_with_root(500);
        let mut cursor = Cursor::from_start(&mut pager, root).unwrap();
        let mut keys = Vec::new();
        while let Some((key, _)) = cursor.value(&mut pager).unwrap() {
            keys.push(key);
            cursor.advance(&mut pager).unwrap();
        }
        assert_eq!(keys, (0..500).collect::<Vec<u64>>());
    }

    #[test]
    fn find_locates_an_existing_key_and_misses_a_missing_one() {
        let (_tmp, mut pager, root) = pager_with_root(200);
        let found = Cursor::find(&mut pager, root, 150).unwrap().unwrap();
        assert_eq!(found.value(&mut pager).unwrap().unwrap().0, 150);
        assert!(Cursor::find(&mut pager, root, 9999).unwrap().is_none());
    }

    #[test]
    fn empty_table_starts_at_end() {
        let tmp = NamedTempFile::new().unwrap();
        let mut pager = Pager::open(tmp.path()).unwrap();
        let (root, handle) = pager.new_page().unwrap();
        Node::new(&mut handle.borrow_mut()).init_leaf(0, true);
        let cursor = Cursor::from_start(&mut pager, root).unwrap();
        assert!(cursor.is_end());
        assert_eq!(cursor.value(&mut pager).unwrap(), None);
    }
}
