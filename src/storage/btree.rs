//! The B-tree is the data structure backing both table rows and the
//! catalog. Unlike a binary tree, each node may have many children:
//! leaves hold as many variable-width `(key, record)` cells as fit in
//! a page, and internal nodes hold up to as many `(child, key)`
//! routing entries as fit, plus a trailing right child for keys past
//! the last entry.
//!
//! There are no sibling pointers. A leaf's neighbors are found by
//! climbing to its parent and stepping to the next child — this keeps
//! every node self-contained at the cost of making range scans walk
//! back up the tree at leaf boundaries; see [`super::cursor`].
//!
//! Every mutating operation here takes the tree's current root page
//! number and returns the (possibly new) root: a split at the root
//! always allocates a fresh internal node, so root identity is not
//! stable across inserts. Callers (`Table`, `Catalog`) are expected to
//! persist whatever root this module hands back.

use tracing::{debug, trace, warn};

use super::node::{Node, NodeType};
use super::page::PageNum;
use super::pager::Pager;
use crate::error::{Error, Result};

fn find_leaf(pager: &mut Pager, mut page_num: PageNum, key: u64) -> Result<PageNum> {
    loop {
        let handle = pager.get_page(page_num)?;
        let child = {
            let mut page = handle.borrow_mut();
            let node = Node::new(&mut page);
            match node.node_type()? {
                NodeType::Leaf => return Ok(page_num),
                NodeType::Internal => node.find_child(key),
            }
        };
        page_num = child;
    }
}

pub fn search(pager: &mut Pager, root: PageNum, key: u64) -> Result<Option<Vec<u8>>> {
    let leaf_num = find_leaf(pager, root, key)?;
    let handle = pager.get_page(leaf_num)?;
    let mut page = handle.borrow_mut();
    let node = Node::new(&mut page);
    Ok(match node.find_cell(key) {
        Ok(idx) => Some(node.leaf_cell(idx).1.to_vec()),
        Err(_) => None,
    })
}

/// Overwrites an existing key's record in place. The new encoding
/// must be exactly as long as the old one (see
/// [`super::node::Node::overwrite_cell_data`]) — there is no general
/// update operation, only this narrow same-size republish used by the
/// catalog to track a table's current root page number.
pub fn update_in_place(pager: &mut Pager, root: PageNum, key: u64, data: &[u8]) -> Result<()> {
    let leaf_num = find_leaf(pager, root, key)?;
    let handle = pager.get_page(leaf_num)?;
    let mut page = handle.borrow_mut();
    let mut node = Node::new(&mut page);
    let idx = node
        .find_cell(key)
        .map_err(|_| Error::NotFound(format!("key {key}")))?;
    node.overwrite_cell_data(idx, data)
}

/// Full in-order scan of every `(key, record)` pair in the tree.
pub fn scan(pager: &mut Pager, root: PageNum) -> Result<Vec<(u64, Vec<u8>)>> {
    let mut out = Vec::new();
    walk(pager, root, &mut out)?;
    Ok(out)
}

fn walk(pager: &mut Pager, page_num: PageNum, out: &mut Vec<(u64, Vec<u8>)>) -> Result<()> {
    let handle = pager.get_page(page_num)?;
    let (node_type, children) = {
        let mut page = handle.borrow_mut();
        let node = Node::new(&mut page);
        match node.node_type()? {
            NodeType::Leaf => {
                for i in 0..node.num_cells() {
                    let (key, data) = node.leaf_cell(i);
                    out.push((key, data.to_vec()));
                }
                (NodeType::Leaf, Vec::new())
            }
            NodeType::Internal => {
                let mut children: Vec<PageNum> = (0..node.num_keys()).map(|i| node.entry(i).0).collect();
                children.push(node.right_child());
                (NodeType::Internal, children)
            }
        }
    };
    if node_type == NodeType::Internal {
        for child in children {
            walk(pager, child, out)?;
        }
    }
    Ok(())
}

/// Inserts `(key, data)`. Returns the tree's root page number, which
/// changes when this insert causes the root itself to split.
pub fn insert(pager: &mut Pager, root: PageNum, key: u64, data: &[u8]) -> Result<PageNum> {
    let leaf_num = find_leaf(pager, root, key)?;
    let full = {
        let handle = pager.get_page(leaf_num)?;
        let mut page = handle.borrow_mut();
        let node = Node::new(&mut page);
        if node.find_cell(key).is_ok() {
            return Err(Error::DuplicateKey(key));
        }
        node.leaf_is_full(data.len())
    };
    if !full {
        let handle = pager.get_page(leaf_num)?;
        let mut page = handle.borrow_mut();
        let mut node = Node::new(&mut page);
        let idx = node.find_cell(key).unwrap_err();
        node.leaf_insert_cell(idx, key, data)?;
        trace!(leaf_num, key, "inserted into existing leaf");
        return Ok(root);
    }
    debug!(leaf_num, key, "leaf full, splitting");
    split_leaf_and_insert(pager, root, leaf_num, key, data)
}

fn split_leaf_and_insert(
    pager: &mut Pager,
    root: PageNum,
    leaf_num: PageNum,
    key: u64,
    data: &[u8],
) -> Result<PageNum> {
    let (parent_num, is_root, old_cells) = {
        let handle = pager.get_page(leaf_num)?;
        let mut page = handle.borrow_mut();
        let node = Node::new(&mut page);
        let cells: Vec<(u64, Vec<u8>)> = (0..node.num_cells())
            .map(|i| {
                let (k, d) = node.leaf_cell(i);
                (k, d.to_vec())
            })
            .collect();
        (node.parent(), node.is_root(), cells)
    };

    let mut merged = old_cells;
    let pos = merged.partition_point(|(k, _)| *k < key);
    merged.insert(pos, (key, data.to_vec()));
    let split_at = merged.len() / 2;
    let left_max = merged[split_at - 1].0;
    let right_max = merged.last().unwrap().0;

    if leaf_num == 0 {
        warn!("catalog root leaf full, relocating into two fresh pages");
        let (new_left_num, new_left_handle) = pager.new_page()?;
        let (new_right_num, new_right_handle) = pager.new_page()?;
        populate_leaf(&new_left_handle, 0, false, &merged[..split_at])?;
        populate_leaf(&new_right_handle, 0, false, &merged[split_at..])?;
        rebuild_root_in_page0(pager, new_left_num, left_max, new_right_num)?;
        return Ok(0);
    }

    let (right_num, right_handle) = pager.new_page()?;
    populate_leaf(&right_handle, parent_num, false, &merged[split_at..])?;
    {
        let handle = pager.get_page(leaf_num)?;
        populate_leaf(&handle, parent_num, is_root, &merged[..split_at])?;
    }

    if is_root {
        let new_root_num = rebuild_root_internal(pager, leaf_num, left_max, right_num)?;
        return Ok(new_root_num);
    }

    insert_into_parent(pager, root, parent_num, leaf_num, left_max, right_num, right_max)
}

fn populate_leaf(
    handle: &super::pager::PageHandle,
    parent: PageNum,
    is_root: bool,
    cells: &[(u64, Vec<u8>)],
) -> Result<()> {
    let mut page = handle.borrow_mut();
    let mut node = Node::new(&mut page);
    node.init_leaf(parent, is_root);
    for (k, d) in cells {
        let idx = node.find_cell(*k).unwrap_err();
        node.leaf_insert_cell(idx, *k, d)?;
    }
    Ok(())
}

/// Allocates a new internal root page pointing at `left`/`right`,
/// reparents both children, and returns its page number. `left` keeps
/// its existing page number; only `right` and the new root are fresh.
fn rebuild_root_internal(
    pager: &mut Pager,
    left: PageNum,
    left_max: u64,
    right: PageNum,
) -> Result<PageNum> {
    let (new_root_num, new_root_handle) = pager.new_page()?;
    {
        let mut page = new_root_handle.borrow_mut();
        let mut node = Node::new(&mut page);
        node.init_internal(0, true);
        node.internal_insert_entry(left, left_max)?;
        node.set_right_child(right);
    }
    for child in [left, right] {
        let handle = pager.get_page(child)?;
        let mut page = handle.borrow_mut();
        let mut node = Node::new(&mut page);
        node.set_parent(new_root_num);
        node.set_is_root(false);
    }
    Ok(new_root_num)
}

/// Like [`rebuild_root_internal`], but for the catalog: page 0 must
/// always physically hold the tree's current root, so instead of
/// allocating a fresh page for the new internal root, its contents are
/// written directly into page 0 in place.
fn rebuild_root_in_page0(pager: &mut Pager, left: PageNum, left_max: u64, right: PageNum) -> Result<()> {
    let handle = pager.get_page(0)?;
    {
        let mut page = handle.borrow_mut();
        let mut node = Node::new(&mut page);
        node.init_internal(0, true);
        node.internal_insert_entry(left, left_max)?;
        node.set_right_child(right);
    }
    for child in [left, right] {
        let handle = pager.get_page(child)?;
        let mut page = handle.borrow_mut();
        let mut node = Node::new(&mut page);
        node.set_parent(0);
        node.set_is_root(false);
    }
    Ok(())
}

/// Installs `new_child` as a sibling of `left_child` inside
/// `parent_num`, after `left_child`'s own subtree has shrunk to a new
/// max of `left_new_max`. `new_child_upper` is the key that used to
/// route to `left_child` in `parent_num` before the split (`None` if
/// `left_child` was `parent_num`'s right child) — it becomes
/// `new_child`'s own routing key, since `new_child` inherits whatever
/// upper bound `left_child` used to have.
fn insert_into_parent(
    pager: &mut Pager,
    root: PageNum,
    parent_num: PageNum,
    left_child: PageNum,
    left_new_max: u64,
    new_child: PageNum,
    new_child_upper: u64,
) -> Result<PageNum> {
    let was_right_child = {
        let handle = pager.get_page(parent_num)?;
        let mut page = handle.borrow_mut();
        let node = Node::new(&mut page);
        node.find_child_index(left_child).is_none()
    };

    let full_after_update = {
        let handle = pager.get_page(parent_num)?;
        let mut page = handle.borrow_mut();
        let mut node = Node::new(&mut page);
        if !was_right_child {
            node.update_key_for_child(left_child, left_new_max);
        }
        node.internal_is_full()
    };

    if !full_after_update {
        let handle = pager.get_page(parent_num)?;
        let mut page = handle.borrow_mut();
        let mut node = Node::new(&mut page);
        if was_right_child {
            node.set_right_child(new_child);
            node.internal_insert_entry(left_child, left_new_max)?;
        } else {
            node.internal_insert_entry(new_child, new_child_upper)?;
        }
        drop(node);
        drop(page);
        drop(handle);
        let child_handle = pager.get_page(new_child)?;
        Node::new(&mut child_handle.borrow_mut()).set_parent(parent_num);
        return Ok(root);
    }

    split_internal_and_insert(
        pager,
        root,
        parent_num,
        left_child,
        left_new_max,
        new_child,
        new_child_upper,
        was_right_child,
    )
}

type Entry = (PageNum, Option<u64>);

fn split_internal_and_insert(
    pager: &mut Pager,
    root: PageNum,
    node_num: PageNum,
    left_child: PageNum,
    left_new_max: u64,
    new_child: PageNum,
    new_child_upper: u64,
    was_right_child: bool,
) -> Result<PageNum> {
    let (grandparent, is_root, mut entries) = {
        let handle = pager.get_page(node_num)?;
        let mut page = handle.borrow_mut();
        let node = Node::new(&mut page);
        let mut entries: Vec<Entry> = (0..node.num_keys())
            .map(|i| {
                let (c, k) = node.entry(i);
                (c, Some(k))
            })
            .collect();
        entries.push((node.right_child(), None));
        (node.parent(), node.is_root(), entries)
    };

    if was_right_child {
        entries.last_mut().unwrap().1 = Some(left_new_max);
        entries.push((new_child, None));
    } else {
        if let Some(e) = entries.iter_mut().find(|(c, _)| *c == left_child) {
            e.1 = Some(left_new_max);
        }
        let insert_pos = entries[..entries.len() - 1].partition_point(|(_, k)| k.unwrap() < new_child_upper);
        entries.insert(insert_pos, (new_child, Some(new_child_upper)));
    }

    let split_at = entries.len() / 2;
    let left_entries = entries[..split_at].to_vec();
    let right_entries = entries[split_at..].to_vec();
    let separator = left_entries
        .last()
        .unwrap()
        .1
        .expect("every entry but the global last carries a key");

    if node_num == 0 {
        warn!("catalog root internal node full, relocating into two fresh pages");
        let (new_left_num, new_left_handle) = pager.new_page()?;
        let (new_right_num, new_right_handle) = pager.new_page()?;
        populate_internal(&new_left_handle, 0, false, &left_entries)?;
        populate_internal(&new_right_handle, 0, false, &right_entries)?;
        fix_children_parents(pager, new_left_num, &left_entries)?;
        fix_children_parents(pager, new_right_num, &right_entries)?;
        rebuild_root_in_page0(pager, new_left_num, separator, new_right_num)?;
        return Ok(0);
    }

    let (right_num, right_handle) = pager.new_page()?;
    populate_internal(&right_handle, grandparent, false, &right_entries)?;
    {
        let handle = pager.get_page(node_num)?;
        populate_internal(&handle, grandparent, is_root, &left_entries)?;
    }
    fix_children_parents(pager, node_num, &left_entries)?;
    fix_children_parents(pager, right_num, &right_entries)?;

    if is_root {
        let new_root_num = rebuild_root_internal(pager, node_num, separator, right_num)?;
        return Ok(new_root_num);
    }

    let right_max = right_entries
        .last()
        .map(|(_, k)| *k)
        .unwrap_or(None);
    insert_into_parent_with_optional_upper(pager, root, grandparent, node_num, separator, right_num, right_max)
}

/// Like [`insert_into_parent`], but the new child's upper bound may
/// itself be unbounded (it inherits the original node's own spot as
/// grandparent's right child).
fn insert_into_parent_with_optional_upper(
    pager: &mut Pager,
    root: PageNum,
    parent_num: PageNum,
    left_child: PageNum,
    left_new_max: u64,
    new_child: PageNum,
    new_child_upper: Option<u64>,
) -> Result<PageNum> {
    match new_child_upper {
        Some(upper) => insert_into_parent(pager, root, parent_num, left_child, left_new_max, new_child, upper),
        None => {
            // new_child takes over as parent_num's right child outright.
            let handle = pager.get_page(parent_num)?;
            let mut page = handle.borrow_mut();
            let mut node = Node::new(&mut page);
            node.update_key_for_child(left_child, left_new_max);
            let full = node.internal_is_full();
            drop(node);
            drop(page);
            drop(handle);
            if full {
                return split_internal_and_insert(
                    pager, root, parent_num, left_child, left_new_max, new_child, 0, true,
                );
            }
            let handle = pager.get_page(parent_num)?;
            let mut page = handle.borrow_mut();
            let mut node = Node::new(&mut page);
            node.set_right_child(new_child);
            drop(node);
            drop(page);
            drop(handle);
            let child_handle = pager.get_page(new_child)?;
            Node::new(&mut child_handle.borrow_mut()).set_parent(parent_num);
            Ok(root)
        }
    }
}

fn populate_internal(
    handle: &super::pager::PageHandle,
    parent: PageNum,
    is_root: bool,
    entries: &[Entry],
) -> Result<()> {
    let mut page = handle.borrow_mut();
    let mut node = Node::new(&mut page);
    node.init_internal(parent, is_root);
    for (child, key) in &entries[..entries.len() - 1] {
        node.internal_insert_entry(*child, key.expect("only the final entry is keyless"))?;
    }
    node.set_right_child(entries.last().unwrap().0);
    Ok(())
}

fn fix_children_parents(pager: &mut Pager, new_parent: PageNum, entries: &[Entry]) -> Result<()> {
    for (child, _) in entries {
        let handle = pager.get_page(*child)?;
        Node::new(&mut handle.borrow_mut()).set_parent(new_parent);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn pager() -> (NamedTempFile, Pager) {
        let tmp = NamedTempFile::new().unwrap();
        let pager = Pager::open(tmp.path()).unwrap();
        (tmp, pager)
    }

    fn new_leaf_root(pager: &mut Pager) -> PageNum {
        let (num, handle) = pager.new_page().unwrap();
        Node::new(&mut handle.borrow_mut()).init_leaf(0, true);
        num
    }

    #[test]
    fn search_after_insert_finds_the_value() {
        let (_tmp, mut pager) = pager();
        let root = new_leaf_root(&mut pager);
        insert(&mut pager, root, 5, b"hello").unwrap();
        assert_eq!(search(&mut pager, root, 5).unwrap(), Some(b"hello".to_vec()));
        assert_eq!(search(&mut pager, root, 6).unwrap(), None);
    }

    #[test]
    fn duplicate_key_is_rejected() {
        let (_tmp, mut pager) = pager();
        let root = new_leaf_root(&mut pager);
        insert(&mut pager, root, 1, b"a").unwrap();
        assert!(matches!(insert(&mut pager, root, 1, b"b"), Err(Error::DuplicateKey(1))));
    }

    #[test]
    fn update_in_place_requires_matching_length() {
        let (_tmp, mut pager) = pager();
        let root = new_leaf_root(&mut pager);
        insert(&mut pager, root, 1, b"abc").unwrap();
        update_in_place(&mut pager, root, 1, b"xyz").unwrap();
        assert_eq!(search(&mut pager, root, 1).unwrap(), Some(b"xyz".to_vec()));
        assert!(update_in_place(&mut pager, root, 1, b"too-long").is_err());
    }

    #[test]
    fn scan_returns_keys_in_ascending_order_after_a_split() {
        let (_tmp, mut pager) = pager();
        let mut root = new_leaf_root(&mut pager);
        // Oversized payloads force an early split well before 1000 rows.
        let payload = vec![0u8; 300];
        for key in (0..40).rev() {
            root = insert(&mut pager, root, key, &payload).unwrap();
        }
        let rows = scan(&mut pager, root).unwrap();
        let keys: Vec<u64> = rows.iter().map(|(k, _)| *k).collect();
        let mut expected: Vec<u64> = (0..40).collect();
        expected.sort_unstable();
        assert_eq!(keys, expected);
    }

    #[test]
    fn many_inserts_build_a_multi_level_tree_and_stay_searchable() {
        let (_tmp, mut pager) = pager();
        let mut root = new_leaf_root(&mut pager);
        for key in 0..2000u64 {
            root = insert(&mut pager, root, key, b"row").unwrap();
        }
        for key in [0u64, 999, 1999] {
            assert_eq!(search(&mut pager, root, key).unwrap(), Some(b"row".to_vec()));
        }
        assert_eq!(scan(&mut pager, root).unwrap().len(), 2000);
    }

    /// Wide-enough payloads keep each leaf's fanout low, so enough rows
    /// drives the root internal node past its own capacity and forces
    /// `split_internal_and_insert`/`insert_into_parent_with_optional_upper`
    /// to grow a second internal level above the leaves, not just one.
    #[test]
    fn enough_rows_force_a_second_internal_level_and_stay_correct() {
        let (_tmp, mut pager) = pager();
        let mut root = new_leaf_root(&mut pager);
        let payload = vec![7u8; 200];
        const ROWS: u64 = 8_000;
        for key in 0..ROWS {
            root = insert(&mut pager, root, key, &payload).unwrap();
        }

        let first_child = {
            let handle = pager.get_page(root).unwrap();
            let mut page = handle.borrow_mut();
            let node = Node::new(&mut page);
            assert_eq!(node.node_type().unwrap(), NodeType::Internal);
            node.entry(0).0
        };
        let handle = pager.get_page(first_child).unwrap();
        let mut page = handle.borrow_mut();
        let child = Node::new(&mut page);
        assert_eq!(
            child.node_type().unwrap(),
            NodeType::Internal,
            "root's own child must also be internal for a genuine two-level tree"
        );
        drop(child);
        drop(page);
        drop(handle);

        for key in [0u64, ROWS / 2, ROWS - 1] {
            assert_eq!(search(&mut pager, root, key).unwrap(), Some(payload.clone()));
        }
        let scanned = scan(&mut pager, root).unwrap();
        assert_eq!(scanned.len(), ROWS as usize);
        let keys: Vec<u64> = scanned.iter().map(|(k, _)| *k).collect();
        assert_eq!(keys, (0..ROWS).collect::<Vec<u64>>());
    }
}
