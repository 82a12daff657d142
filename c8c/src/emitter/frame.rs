use crate::analyzer::{DataTypeFactory, Environment};
use crate::error::{ResourceError, Result};
use crate::grammar::Node;
use crate::token::TokenKind;
use crate::types::{Symbol, Type};
use c8arch::mem::{GLOBAL_BASE, MEMORY_SIZE};

/// Bytes reserved at the end of every frame for saving `V0..VC` around calls.
pub const SAVE_AREA: u16 = 13;

/// Largest frame the stack could ever hold, above an empty global section.
const FRAME_LIMIT: usize = MEMORY_SIZE - GLOBAL_BASE as usize;

pub type FrameId = usize;
pub type SlotId = usize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slot {
    pub name: String,
    pub ty: Type,
    /// Byte offset from the frame base.
    pub offset: u16,
}

#[derive(Debug, Clone, Default)]
pub struct Frame {
    pub slots: Vec<SlotId>,
    pub children: Vec<FrameId>,
}

/// Stack layout of one function, shaped like its scope tree. Frame 0 holds
/// the parameters followed by the locals of the body; every nested block gets
/// a child frame. Offsets are handed out in walk order and never reused, so
/// shadowed names get distinct storage.
#[derive(Debug, Clone)]
pub struct FrameTree {
    pub frames: Vec<Frame>,
    pub slots: Vec<Slot>,
    pub params: usize,
    function: String,
    locals: u16,
}

struct Declarations;

impl Environment for Declarations {
    fn lookup(&self, _: &str) -> Option<Symbol> {
        None
    }
}

impl FrameTree {
    pub const ROOT: FrameId = 0;

    /// Lay out `function` (a `fn` node).
    pub fn build(function: &Node) -> Result<Self> {
        let mut tree = FrameTree {
            frames: vec![Frame::default()],
            slots: vec![],
            params: 0,
            function: function.child(0)?.literal().to_string(),
            locals: 0,
        };
        for param in &function.child(1)?.children {
            tree.slot(Self::ROOT, param, param.child(0)?)?;
            tree.params += 1;
        }
        for statement in &function.child(3)?.children {
            tree.statement(Self::ROOT, statement)?;
        }
        Ok(tree)
    }

    fn slot(&mut self, frame: FrameId, name: &Node, ty: &Node) -> Result<()> {
        let ty = DataTypeFactory::new(&Declarations).data_type(ty)?;
        let end = ty
            .checked_size()
            .and_then(|size| size.checked_add(self.locals as usize))
            .filter(|&end| end + SAVE_AREA as usize <= FRAME_LIMIT);
        let Some(end) = end else {
            return Err(ResourceError::FrameOverflow {
                function: self.function.clone(),
                line: name.line(),
            }
            .into());
        };
        let id = self.slots.len();
        self.slots.push(Slot {
            name: name.literal().to_string(),
            ty,
            offset: self.locals,
        });
        self.locals = end as u16;
        self.frames[frame].slots.push(id);
        Ok(())
    }

    fn child(&mut self, parent: FrameId, block: &Node) -> Result<()> {
        let id = self.frames.len();
        self.frames.push(Frame::default());
        self.frames[parent].children.push(id);
        for statement in &block.children {
            self.statement(id, statement)?;
        }
        Ok(())
    }

    fn statement(&mut self, frame: FrameId, node: &Node) -> Result<()> {
        match node.kind() {
            TokenKind::Let => self.slot(frame, node.child(0)?, node.child(1)?),
            TokenKind::LeftBrace => self.child(frame, node),
            TokenKind::While => self.child(frame, node.child(1)?),
            TokenKind::If => {
                self.child(frame, node.child(1)?)?;
                match node.children.get(2) {
                    Some(next) if next.kind() == TokenKind::If => self.statement(frame, next),
                    Some(block) => self.child(frame, block),
                    None => Ok(()),
                }
            }
            _ => Ok(()),
        }
    }

    /// Bytes of parameters and locals.
    pub fn locals_size(&self) -> u16 {
        self.locals
    }

    /// Full frame including the register save area.
    pub fn frame_size(&self) -> u16 {
        self.locals + SAVE_AREA
    }

    pub fn param_slots(&self) -> &[SlotId] {
        &self.frames[Self::ROOT].slots[..self.params]
    }
}

#[derive(Debug, Clone, Copy)]
struct Level {
    frame: FrameId,
    next_child: usize,
    declared: usize,
}

/// Position of a walk inside a [`FrameTree`]. Entering a block moves to the
/// next unvisited child frame, and only slots declared so far are visible.
#[derive(Debug, Clone)]
pub struct FrameCursor<'f> {
    tree: &'f FrameTree,
    stack: Vec<Level>,
}

impl<'f> FrameCursor<'f> {
    pub fn new(tree: &'f FrameTree) -> Self {
        FrameCursor {
            tree,
            stack: vec![Level {
                frame: FrameTree::ROOT,
                next_child: 0,
                declared: tree.params,
            }],
        }
    }

    pub fn enter(&mut self) {
        let tree = self.tree;
        if let Some(top) = self.stack.last_mut() {
            if let Some(&frame) = tree.frames[top.frame].children.get(top.next_child) {
                top.next_child += 1;
                self.stack.push(Level {
                    frame,
                    next_child: 0,
                    declared: 0,
                });
            }
        }
    }

    pub fn leave(&mut self) {
        if self.stack.len() > 1 {
            self.stack.pop();
        }
    }

    /// Make the next slot of the current frame visible. Returns it.
    pub fn declare(&mut self) -> Option<SlotId> {
        let tree = self.tree;
        let top = self.stack.last_mut()?;
        let id = *tree.frames[top.frame].slots.get(top.declared)?;
        top.declared += 1;
        Some(id)
    }

    pub fn resolve(&self, name: &str) -> Option<SlotId> {
        self.stack.iter().rev().find_map(|level| {
            self.tree.frames[level.frame].slots[..level.declared]
                .iter()
                .rev()
                .copied()
                .find(|&id| self.tree.slots[id].name == name)
        })
    }

    pub fn slot(&self, id: SlotId) -> &'f Slot {
        &self.tree.slots[id]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar;
    use crate::lexer::Lexer;

    fn build(code: &str) -> Result<FrameTree> {
        let tree = grammar::parse(&Lexer::new(code).parse()).into_tree()?;
        FrameTree::build(&tree.statements()?[0])
    }

    fn frames(code: &str) -> FrameTree {
        build(code).unwrap()
    }

    #[test]
    fn params_then_locals() {
        let tree = frames("fn f(a byte, p *byte) void {\nlet x byte\nlet arr [3]bool\n}");
        let offsets: Vec<(String, u16)> = tree
            .slots
            .iter()
            .map(|s| (s.name.clone(), s.offset))
            .collect();
        assert_eq!(
            offsets,
            vec![
                ("a".to_string(), 0),
                ("p".to_string(), 1),
                ("x".to_string(), 3),
                ("arr".to_string(), 4)
            ]
        );
        assert_eq!(tree.locals_size(), 7);
        assert_eq!(tree.frame_size(), 7 + SAVE_AREA);
        assert_eq!(tree.param_slots().len(), 2);
    }

    #[test]
    fn shadowing_gets_its_own_slot() {
        let tree = frames("fn f() void {\nlet x byte\nif true {\nlet x *byte\n}\n}");
        assert_eq!(tree.frames.len(), 2);
        assert_eq!(tree.slots[1].offset, 1);

        let mut cursor = FrameCursor::new(&tree);
        assert_eq!(cursor.resolve("x"), None);
        let outer = cursor.declare();
        assert_eq!(cursor.resolve("x"), outer);
        cursor.enter();
        assert_eq!(cursor.resolve("x"), outer);
        let inner = cursor.declare();
        assert_eq!(cursor.resolve("x"), inner);
        cursor.leave();
        assert_eq!(cursor.resolve("x"), outer);
    }

    #[test]
    fn else_if_blocks_are_siblings() {
        let tree = frames("fn f() void {\nif true {\n} else if false {\nlet y byte\n} else {\n}\n}");
        assert_eq!(tree.frames[FrameTree::ROOT].children, vec![1, 2, 3]);
        assert_eq!(tree.frames[2].slots, vec![0]);
    }

    #[test]
    fn frame_must_fit_above_globals() {
        let largest = FRAME_LIMIT - SAVE_AREA as usize;
        let tree = frames(&format!("fn f() void {{\nlet a [{}]byte\n}}", largest));
        assert_eq!(tree.frame_size() as usize, FRAME_LIMIT);

        let err = build(&format!("fn f(x byte) void {{\nlet a [{}]byte\n}}", largest)).unwrap_err();
        assert!(matches!(
            err,
            crate::error::Error::Resource(ResourceError::FrameOverflow { line: 2, .. })
        ));
    }

    #[test]
    fn oversized_local_is_not_truncated() {
        let err = build("fn g() void {\nlet a [65536]byte\nlet x byte = 7\n}").unwrap_err();
        assert!(matches!(
            err,
            crate::error::Error::Resource(ResourceError::FrameOverflow { ref function, line: 2 })
                if function == "g"
        ));
    }
}
