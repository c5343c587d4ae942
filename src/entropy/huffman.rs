//! Canonical Huffman entropy back-end (§4.3).
//!
//! The tree itself travels with the compressed payload: 8 bits of
//! `nLeafs - 1`, then a 1-bit `rootFlag`. A set `rootFlag` is the
//! single-symbol degenerate case — the entire tree is those 9 bits plus
//! the symbol's 8 bits. A clear `rootFlag` is followed by a pre-order
//! traversal: one flag bit per node (`1` = leaf, followed by an 8-bit
//! symbol; `0` = internal, followed by the left then right subtree).
//! Decoding re-parses the same tree before walking it bit by bit for each
//! output symbol, so there is no separate symbol table to ship. A tile
//! with exactly one distinct byte value takes the degenerate path and
//! costs its body nothing but zero-length codes.

use crate::bitstream::{BitInputStream, BitOutputStream};
use crate::error::{Error, Result};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

enum Node {
    Leaf(u8),
    Internal(Box<Node>, Box<Node>),
}

struct HeapEntry {
    freq: u64,
    seq: u64,
    node: Node,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.freq == other.freq && self.seq == other.seq
    }
}
impl Eq for HeapEntry {}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed so `BinaryHeap` (a max-heap) behaves as a min-heap.
        other.freq.cmp(&self.freq).then_with(|| other.seq.cmp(&self.seq))
    }
}
impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

fn build_tree(data: &[u8]) -> Node {
    let mut freq = [0u64; 256];
    for &b in data {
        freq[b as usize] += 1;
    }

    let mut heap: BinaryHeap<HeapEntry> = BinaryHeap::new();
    let mut seq = 0u64;
    for (sym, &count) in freq.iter().enumerate() {
        if count > 0 {
            heap.push(HeapEntry {
                freq: count,
                seq,
                node: Node::Leaf(sym as u8),
            });
            seq += 1;
        }
    }

    if heap.is_empty() {
        // Only reachable if `data` is empty, which callers short-circuit
        // before calling this; kept total for safety.
        return Node::Leaf(0);
    }

    while heap.len() > 1 {
        let a = heap.pop().unwrap();
        let b = heap.pop().unwrap();
        heap.push(HeapEntry {
            freq: a.freq + b.freq,
            seq,
            node: Node::Internal(Box::new(a.node), Box::new(b.node)),
        });
        seq += 1;
    }

    heap.pop().unwrap().node
}

fn count_leaves(node: &Node) -> usize {
    match node {
        Node::Leaf(_) => 1,
        Node::Internal(l, r) => count_leaves(l) + count_leaves(r),
    }
}

fn serialize_tree(node: &Node, out: &mut BitOutputStream) {
    match node {
        Node::Leaf(sym) => {
            out.write_bit(1);
            out.write_bits(*sym as u32, 8);
        }
        Node::Internal(l, r) => {
            out.write_bit(0);
            serialize_tree(l, out);
            serialize_tree(r, out);
        }
    }
}

fn parse_tree(inp: &mut BitInputStream) -> Result<Node> {
    let flag = inp
        .read_bit()
        .ok_or_else(|| Error::CompressionError("truncated huffman tree".to_string()))?;
    if flag != 0 {
        let sym = inp
            .read_bits(8)
            .ok_or_else(|| Error::CompressionError("truncated huffman tree symbol".to_string()))?;
        Ok(Node::Leaf(sym as u8))
    } else {
        let l = parse_tree(inp)?;
        let r = parse_tree(inp)?;
        Ok(Node::Internal(Box::new(l), Box::new(r)))
    }
}

/// Writes the §4.3 tree header: 8 bits for `nLeafs - 1`, then a 1-bit
/// `rootFlag`. A set `rootFlag` means the tree is the single-symbol
/// degenerate case and is followed by nothing but that symbol's 8 bits;
/// a clear `rootFlag` means a full pre-order traversal follows.
fn write_tree(node: &Node, n_leafs: usize, out: &mut BitOutputStream) {
    debug_assert!(n_leafs >= 1 && n_leafs <= 256);
    out.write_bits((n_leafs - 1) as u32, 8);
    if n_leafs == 1 {
        out.write_bit(1);
        match node {
            Node::Leaf(sym) => out.write_bits(*sym as u32, 8),
            Node::Internal(..) => unreachable!("a single-leaf tree cannot have internal nodes"),
        }
    } else {
        out.write_bit(0);
        serialize_tree(node, out);
    }
}

fn read_tree(inp: &mut BitInputStream) -> Result<Node> {
    let n_leafs_minus_1 = inp
        .read_bits(8)
        .ok_or_else(|| Error::CompressionError("truncated huffman tree leaf count".to_string()))?;
    let n_leafs = n_leafs_minus_1 as usize + 1;
    let root_flag = inp
        .read_bit()
        .ok_or_else(|| Error::CompressionError("truncated huffman tree root flag".to_string()))?;
    let tree = if root_flag != 0 {
        let sym = inp
            .read_bits(8)
            .ok_or_else(|| Error::CompressionError("truncated huffman tree symbol".to_string()))?;
        Node::Leaf(sym as u8)
    } else {
        parse_tree(inp)?
    };
    if count_leaves(&tree) != n_leafs {
        return Err(Error::FormatError(format!(
            "huffman tree declared {} leafs but parsed {}",
            n_leafs,
            count_leaves(&tree)
        )));
    }
    Ok(tree)
}

fn build_codes(node: &Node, prefix: u32, len: u8, table: &mut [(u32, u8); 256]) {
    match node {
        Node::Leaf(sym) => table[*sym as usize] = (prefix, len),
        Node::Internal(l, r) => {
            build_codes(l, prefix << 1, len + 1, table);
            build_codes(r, (prefix << 1) | 1, len + 1, table);
        }
    }
}

pub fn compress(data: &[u8]) -> Result<Vec<u8>> {
    if data.is_empty() {
        return Ok(Vec::new());
    }

    let tree = build_tree(data);
    let n_leafs = count_leaves(&tree);
    let mut out = BitOutputStream::new();
    write_tree(&tree, n_leafs, &mut out);

    let mut table = [(0u32, 0u8); 256];
    build_codes(&tree, 0, 0, &mut table);
    for &b in data {
        let (code, len) = table[b as usize];
        if len > 0 {
            out.write_bits(code, len);
        }
    }
    Ok(out.into_bytes())
}

pub fn decompress(data: &[u8], decompressed_len: usize) -> Result<Vec<u8>> {
    if decompressed_len == 0 {
        return Ok(Vec::new());
    }
    if data.is_empty() {
        return Err(Error::CompressionError("empty huffman payload".to_string()));
    }

    let mut inp = BitInputStream::new(data);
    let tree = read_tree(&mut inp)?;

    let mut result = Vec::with_capacity(decompressed_len);
    for _ in 0..decompressed_len {
        let mut node = &tree;
        loop {
            match node {
                Node::Leaf(sym) => {
                    result.push(*sym);
                    break;
                }
                Node::Internal(l, r) => {
                    let bit = inp.read_bit().ok_or_else(|| {
                        Error::CompressionError("truncated huffman payload".to_string())
                    })?;
                    node = if bit != 0 { r } else { l };
                }
            }
        }
    }
    Ok(result)
}
