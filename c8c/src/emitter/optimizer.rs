use super::frame::{FrameCursor, FrameTree, SlotId};
use crate::grammar::Node;
use crate::token::TokenKind;
use indexmap::IndexMap;
use itertools::Itertools;

/// Upper bound on pool registers pinned per function. The rest stay free for
/// expression evaluation.
pub const MAX_PINNED: usize = 6;

/// How often each frame slot of a function is referenced.
pub fn count_uses(function: &Node, frames: &FrameTree) -> IndexMap<SlotId, usize> {
    let mut counter = Counter {
        cursor: FrameCursor::new(frames),
        counts: (0..frames.slots.len()).map(|id| (id, 0)).collect(),
    };
    if let Some(body) = function.children.get(3) {
        for statement in &body.children {
            counter.statement(statement);
        }
    }
    counter.counts
}

/// Slots to pin in registers for the whole function: the most used scalar
/// slots first, ties in declaration order, until `budget` registers are
/// spent. Unused slots are never pinned.
pub fn select(frames: &FrameTree, counts: &IndexMap<SlotId, usize>, budget: usize) -> Vec<SlotId> {
    let mut spent = 0;
    let mut pinned = vec![];
    for (&id, &count) in counts.iter().sorted_by_key(|&(_, &count)| std::cmp::Reverse(count)) {
        let ty = &frames.slots[id].ty;
        if count == 0 || !ty.is_scalar() {
            continue;
        }
        let cost = if ty.is_pointer() { 2 } else { 1 };
        if spent + cost > budget {
            continue;
        }
        spent += cost;
        pinned.push(id);
    }
    pinned
}

struct Counter<'f> {
    cursor: FrameCursor<'f>,
    counts: IndexMap<SlotId, usize>,
}

impl<'f> Counter<'f> {
    fn statement(&mut self, node: &Node) {
        match node.kind() {
            TokenKind::Let => {
                if let Some(init) = node.children.get(2) {
                    self.expression(init);
                }
                self.cursor.declare();
            }
            TokenKind::LeftBrace => self.block(node),
            TokenKind::If => {
                if let Some(cond) = node.children.first() {
                    self.expression(cond);
                }
                if let Some(block) = node.children.get(1) {
                    self.block(block);
                }
                match node.children.get(2) {
                    Some(next) if next.kind() == TokenKind::If => self.statement(next),
                    Some(block) => self.block(block),
                    None => {}
                }
            }
            TokenKind::While => {
                if let Some(cond) = node.children.first() {
                    self.expression(cond);
                }
                if let Some(block) = node.children.get(1) {
                    self.block(block);
                }
            }
            _ => self.expression(node),
        }
    }

    fn block(&mut self, node: &Node) {
        self.cursor.enter();
        for statement in &node.children {
            self.statement(statement);
        }
        self.cursor.leave();
    }

    fn expression(&mut self, node: &Node) {
        match node.kind() {
            TokenKind::Identifier => {
                if let Some(id) = self.cursor.resolve(node.literal()) {
                    *self.counts.entry(id).or_default() += 1;
                }
            }
            // The callee name is not a variable.
            TokenKind::LeftParen => {
                for arg in node.children.iter().skip(1) {
                    self.expression(arg);
                }
            }
            _ => {
                for child in &node.children {
                    self.expression(child);
                }
            }
        }
    }
}
