use super::code::{label, Code, Imm};
use super::frame::{FrameCursor, FrameTree, SlotId};
use super::layout::GlobalLayout;
use super::registers::{Operand, RegisterAllocator};
use crate::analyzer::{byte_literal, DataTypeFactory, Environment, Intrinsic};
use crate::error::{internal, ResourceError, Result};
use crate::grammar::Node;
use crate::token::TokenKind;
use crate::types::{ScopeTree, Symbol, Type};
use c8arch::inst::Inst;
use c8arch::mem::{LDI_OPCODE, MEMORY_SIZE, RETURN_SLOT, TRAMPOLINE};
use c8arch::reg::Reg;
use std::collections::HashMap;

const V0: Reg = Reg::XFER;
const V1: Reg = Reg::XFER_LO;
const VF: Reg = Reg::FLAG;

/// Where a named variable lives.
#[derive(Debug, Clone, Copy)]
enum Storage {
    Pinned(Operand),
    Frame(u16),
    Static(u16),
}

#[derive(Debug, Clone, Copy)]
enum Place {
    Static(u16),
    /// Offset from the frame base `VD:VE`.
    Frame(u16),
    /// Address held in a register pair.
    Pointer(Operand),
}

/// A memory address being assembled: a base plus a constant and any number
/// of scaled index registers.
#[derive(Debug, Clone)]
struct Location {
    place: Place,
    constant: u16,
    indices: Vec<(Reg, u16)>,
}

impl Location {
    fn new(place: Place) -> Self {
        Location {
            place,
            constant: 0,
            indices: vec![],
        }
    }
}

/// Code generator for one function body.
pub struct FunctionCodegen<'a> {
    scopes: &'a ScopeTree,
    layout: &'a GlobalLayout,
    frames: &'a FrameTree,
    cursor: FrameCursor<'a>,
    regs: RegisterAllocator,
    pinned: HashMap<SlotId, Operand>,
    code: Code,
    is_entry: bool,
}

impl<'a> Environment for FunctionCodegen<'a> {
    fn lookup(&self, name: &str) -> Option<Symbol> {
        match self.cursor.resolve(name) {
            Some(id) => Some(Symbol::variable(name, self.cursor.slot(id).ty.clone())),
            None => self.scopes.resolve(ScopeTree::ROOT, name).cloned(),
        }
    }
}

impl<'a> FunctionCodegen<'a> {
    pub fn new(
        name: &str,
        scopes: &'a ScopeTree,
        layout: &'a GlobalLayout,
        frames: &'a FrameTree,
        is_entry: bool,
    ) -> Self {
        FunctionCodegen {
            scopes,
            layout,
            frames,
            cursor: FrameCursor::new(frames),
            regs: RegisterAllocator::new(),
            pinned: HashMap::new(),
            code: Code::new(name),
            is_entry,
        }
    }

    /// Dedicate registers to `slots` for the rest of the function.
    pub fn pin(&mut self, slots: &[SlotId]) -> Result<()> {
        for &id in slots {
            let operand = self.regs.alloc_for(&self.frames.slots[id].ty)?;
            self.pinned.insert(id, operand);
        }
        Ok(())
    }

    pub fn pinned(&self) -> &HashMap<SlotId, Operand> {
        &self.pinned
    }

    /// Emit the whole function (a `fn` node).
    pub fn generate(mut self, function: &Node) -> Result<Code> {
        let name = self.code.name.clone();
        self.code.label(&name);

        for &id in self.frames.param_slots() {
            if let Some(&target) = self.pinned.get(&id) {
                let offset = self.frames.slots[id].offset;
                self.load_into(Location::new(Place::Frame(offset)), target);
            }
        }

        let body = function.child(3)?;
        for statement in &body.children {
            self.statement(statement)?;
        }
        if body.children.last().map(Node::kind) != Some(TokenKind::Return) {
            self.exit();
        }
        Ok(self.code)
    }

    fn emit(&mut self, inst: Inst<Imm>) {
        self.code.emit(inst);
    }

    fn ty(&self, node: &Node) -> Result<Type> {
        DataTypeFactory::new(self).infer(node)
    }

    fn alloc(&mut self) -> Result<Reg> {
        self.regs.alloc()
    }
}

// ----------------------------------------------------------------------------
// Addressing
// ----------------------------------------------------------------------------

impl<'a> FunctionCodegen<'a> {
    /// Load `I` from a register pair by patching the trampoline and calling it.
    fn trampoline(&mut self, hi: Reg, lo: Reg) {
        self.emit(Inst::LD(V0, LDI_OPCODE));
        self.emit(Inst::OR(V0, hi));
        self.emit(Inst::MOV(V1, lo));
        self.emit(Inst::LDI(Imm::Addr(TRAMPOLINE)));
        self.emit(Inst::STM(V1));
        self.emit(Inst::CALL(Imm::Addr(TRAMPOLINE)));
    }

    fn add_i(&mut self, mut amount: u16) {
        while amount > 0 {
            let chunk = amount.min(0xFF);
            self.emit(Inst::LD(V0, chunk as u8));
            self.emit(Inst::ADDI(V0));
            amount -= chunk;
        }
    }

    /// `I += reg * scale`.
    fn add_i_scaled(&mut self, reg: Reg, mut scale: u16) {
        if scale <= 4 {
            for _ in 0..scale {
                self.emit(Inst::ADDI(reg));
            }
            return;
        }
        while scale > 0 {
            let chunk = scale.min(0xFF);
            let top = self.code.fresh_label("scale");
            self.emit(Inst::LD(V1, chunk as u8));
            self.code.label(&top);
            self.emit(Inst::ADDI(reg));
            self.emit(Inst::ADD(V1, 0xFF));
            self.emit(Inst::SE(V1, 0));
            self.emit(Inst::JP(label(&top)));
            scale -= chunk;
        }
    }

    /// Point `I` at `loc`, releasing the registers it held.
    fn load_i(&mut self, loc: Location) {
        match loc.place {
            Place::Static(addr) => self.emit(Inst::LDI(Imm::Addr(addr + loc.constant))),
            Place::Frame(offset) => {
                self.trampoline(Reg::SP_HI, Reg::SP_LO);
                self.add_i(offset + loc.constant);
            }
            Place::Pointer(ptr) => {
                let (hi, lo) = match ptr {
                    Operand::Pair { hi, lo } => (hi, lo),
                    Operand::Single(r) => (r, r),
                };
                self.trampoline(hi, lo);
                self.regs.free(ptr);
                self.add_i(loc.constant);
            }
        }
        for (reg, scale) in loc.indices {
            self.add_i_scaled(reg, scale);
            self.regs.free_reg(reg);
        }
    }

    fn load_into(&mut self, loc: Location, target: Operand) {
        self.load_i(loc);
        match target {
            Operand::Single(r) => {
                self.emit(Inst::LDM(V0));
                self.emit(Inst::MOV(r, V0));
            }
            Operand::Pair { hi, lo } => {
                self.emit(Inst::LDM(V1));
                self.emit(Inst::MOV(hi, V0));
                self.emit(Inst::MOV(lo, V1));
            }
        }
    }

    fn load(&mut self, loc: Location, ty: &Type) -> Result<Operand> {
        self.load_i(loc);
        let target = self.regs.alloc_for(ty)?;
        match target {
            Operand::Single(r) => {
                self.emit(Inst::LDM(V0));
                self.emit(Inst::MOV(r, V0));
            }
            Operand::Pair { hi, lo } => {
                self.emit(Inst::LDM(V1));
                self.emit(Inst::MOV(hi, V0));
                self.emit(Inst::MOV(lo, V1));
            }
        }
        Ok(target)
    }

    /// Write `value` at the address `I` currently holds.
    fn store_at_i(&mut self, value: Operand) {
        match value {
            Operand::Single(r) => {
                self.emit(Inst::MOV(V0, r));
                self.emit(Inst::STM(V0));
            }
            Operand::Pair { hi, lo } => {
                self.emit(Inst::MOV(V0, hi));
                self.emit(Inst::MOV(V1, lo));
                self.emit(Inst::STM(V1));
            }
        }
    }

    fn store(&mut self, loc: Location, value: Operand) {
        self.load_i(loc);
        self.store_at_i(value);
    }

    fn storage(&self, node: &Node) -> Result<Storage> {
        let name = node.literal();
        if let Some(id) = self.cursor.resolve(name) {
            return Ok(match self.pinned.get(&id) {
                Some(&operand) => Storage::Pinned(operand),
                None => Storage::Frame(self.cursor.slot(id).offset),
            });
        }
        match self.layout.globals.get(name) {
            Some(global) => Ok(Storage::Static(global.addr)),
            None => internal(format!("no storage for `{}` on line {}", name, node.line())),
        }
    }

    fn location(&mut self, node: &Node) -> Result<Location> {
        match node.kind() {
            TokenKind::Identifier => match self.storage(node)? {
                Storage::Frame(offset) => Ok(Location::new(Place::Frame(offset))),
                Storage::Static(addr) => Ok(Location::new(Place::Static(addr))),
                Storage::Pinned(_) => internal(format!("`{}` lives in registers", node.literal())),
            },
            TokenKind::LeftBracket => {
                let (array, index) = node.operands()?;
                let out_of_range = || ResourceError::OffsetOutOfRange(node.line());
                let scale = self
                    .ty(node)?
                    .checked_size()
                    .filter(|&size| size < MEMORY_SIZE)
                    .ok_or_else(out_of_range)? as u16;
                if let Some(i) = byte_literal(index) {
                    let mut loc = self.location(array)?;
                    loc.constant = (i as u16)
                        .checked_mul(scale)
                        .and_then(|offset| offset.checked_add(loc.constant))
                        .filter(|&offset| (offset as usize) < MEMORY_SIZE)
                        .ok_or_else(out_of_range)?;
                    return Ok(loc);
                }
                let index = self.value(index)?;
                let mut loc = self.location(array)?;
                loc.indices.push((index.low(), scale));
                Ok(loc)
            }
            TokenKind::Star => {
                let ptr = self.value(node.child(0)?)?;
                Ok(Location::new(Place::Pointer(ptr)))
            }
            other => internal(format!("`{}` has no address on line {}", other, node.line())),
        }
    }
}

// ----------------------------------------------------------------------------
// Stack pointer
// ----------------------------------------------------------------------------

impl<'a> FunctionCodegen<'a> {
    fn sp_add(&mut self, amount: u16) {
        let [hi, lo] = amount.to_be_bytes();
        self.emit(Inst::LD(V0, lo));
        self.emit(Inst::ADDR(Reg::SP_LO, V0));
        self.emit(Inst::ADDR(Reg::SP_HI, VF));
        if hi != 0 {
            self.emit(Inst::ADD(Reg::SP_HI, hi));
        }
    }

    fn sp_sub(&mut self, amount: u16) {
        let [hi, lo] = amount.to_be_bytes();
        self.emit(Inst::LD(V0, lo));
        self.emit(Inst::SUB(Reg::SP_LO, V0));
        self.emit(Inst::SE(VF, 1));
        self.emit(Inst::ADD(Reg::SP_HI, 0xFF));
        if hi != 0 {
            self.emit(Inst::LD(V0, hi));
            self.emit(Inst::SUB(Reg::SP_HI, V0));
        }
    }
}

// ----------------------------------------------------------------------------
// Expressions
// ----------------------------------------------------------------------------

impl<'a> FunctionCodegen<'a> {
    /// Evaluate `node` into freshly allocated registers owned by the caller.
    fn value(&mut self, node: &Node) -> Result<Operand> {
        use TokenKind as K;
        match node.kind() {
            K::Number => {
                let Some(n) = byte_literal(node) else {
                    return internal(format!("`{}` is not a byte", node.literal()));
                };
                let r = self.alloc()?;
                self.emit(Inst::LD(r, n));
                Ok(Operand::Single(r))
            }
            K::True | K::False => {
                let r = self.alloc()?;
                self.emit(Inst::LD(r, (node.kind() == K::True) as u8));
                Ok(Operand::Single(r))
            }
            K::Identifier => {
                let ty = self.ty(node)?;
                match self.storage(node)? {
                    Storage::Pinned(source) => self.copy(source, &ty),
                    Storage::Frame(offset) => self.load(Location::new(Place::Frame(offset)), &ty),
                    Storage::Static(addr) => self.load(Location::new(Place::Static(addr)), &ty),
                }
            }
            K::LeftParen => match self.call(node)? {
                Some(result) => Ok(result),
                None => internal(format!("void call used as a value on line {}", node.line())),
            },
            K::Bang => {
                let operand = self.value(node.child(0)?)?;
                self.emit(Inst::LD(V0, 1));
                self.emit(Inst::XOR(operand.low(), V0));
                Ok(operand)
            }
            K::Star | K::LeftBracket => {
                let ty = self.ty(node)?;
                let loc = self.location(node)?;
                self.load(loc, &ty)
            }
            _ => self.binary(node),
        }
    }

    fn copy(&mut self, source: Operand, ty: &Type) -> Result<Operand> {
        let target = self.regs.alloc_for(ty)?;
        self.mov(target, source);
        Ok(target)
    }

    fn mov(&mut self, target: Operand, source: Operand) {
        for (t, s) in target.regs().into_iter().zip(source.regs()) {
            self.emit(Inst::MOV(t, s));
        }
    }

    /// Keep the first register of `keep`, release everything else.
    fn result(&mut self, keep: Operand, other: Operand) -> Operand {
        let regs = keep.regs();
        for &r in &regs[1..] {
            self.regs.free_reg(r);
        }
        self.regs.free(other);
        Operand::Single(regs[0])
    }

    fn binary(&mut self, node: &Node) -> Result<Operand> {
        use TokenKind as K;
        let (lhs, rhs) = node.operands()?;
        let l = self.value(lhs)?;
        let r = self.value(rhs)?;
        let kind = node.kind();
        match kind {
            K::Plus => {
                match l {
                    Operand::Single(a) => self.emit(Inst::ADDR(a, r.low())),
                    Operand::Pair { hi, lo } => {
                        self.emit(Inst::ADDR(lo, r.low()));
                        self.emit(Inst::ADDR(hi, VF));
                    }
                }
                self.regs.free(r);
                Ok(l)
            }
            K::Minus => {
                match l {
                    Operand::Single(a) => self.emit(Inst::SUB(a, r.low())),
                    Operand::Pair { hi, lo } => {
                        self.emit(Inst::SUB(lo, r.low()));
                        self.emit(Inst::SE(VF, 1));
                        self.emit(Inst::ADD(hi, 0xFF));
                    }
                }
                self.regs.free(r);
                Ok(l)
            }
            K::Ampersand | K::Pipe | K::Caret | K::AndAnd | K::OrOr => {
                for (a, b) in l.regs().into_iter().zip(r.regs()) {
                    self.emit(match kind {
                        K::Ampersand | K::AndAnd => Inst::AND(a, b),
                        K::Pipe | K::OrOr => Inst::OR(a, b),
                        _ => Inst::XOR(a, b),
                    });
                }
                self.regs.free(r);
                Ok(l)
            }
            K::ShiftLeft | K::ShiftRight => {
                let (a, b) = (l.low(), r.low());
                let top = self.code.fresh_label("shift");
                let end = self.code.fresh_label("shifted");
                self.code.label(&top);
                self.emit(Inst::SNE(b, 0));
                self.emit(Inst::JP(label(&end)));
                self.emit(if kind == K::ShiftLeft { Inst::SHL(a) } else { Inst::SHR(a) });
                self.emit(Inst::ADD(b, 0xFF));
                self.emit(Inst::JP(label(&top)));
                self.code.label(&end);
                self.regs.free(r);
                Ok(l)
            }
            K::Slash | K::Percent => self.divide(kind, l.low(), r.low()),
            K::Less | K::LessEqual | K::Greater | K::GreaterEqual => {
                // a >= b, possibly negated, covers every ordering.
                let (a, b, negate) = match kind {
                    K::GreaterEqual => (l, r, false),
                    K::Less => (l, r, true),
                    K::LessEqual => (r, l, false),
                    _ => (r, l, true),
                };
                match (a, b) {
                    (Operand::Pair { hi: ah, lo: al }, Operand::Pair { hi: bh, lo: bl }) => {
                        let done = self.code.fresh_label("cmp");
                        self.emit(Inst::MOV(V0, ah));
                        self.emit(Inst::SUB(V0, bh));
                        self.emit(Inst::SE(V0, 0));
                        self.emit(Inst::JP(label(&done)));
                        self.emit(Inst::MOV(V0, al));
                        self.emit(Inst::SUB(V0, bl));
                        self.code.label(&done);
                    }
                    _ => {
                        self.emit(Inst::MOV(V0, a.low()));
                        self.emit(Inst::SUB(V0, b.low()));
                    }
                }
                let result = self.result(l, r);
                self.emit(Inst::MOV(result.low(), VF));
                if negate {
                    self.emit(Inst::LD(V0, 1));
                    self.emit(Inst::XOR(result.low(), V0));
                }
                Ok(result)
            }
            K::Equal | K::NotEqual => {
                let (differ, same) = if kind == K::Equal { (0, 1) } else { (1, 0) };
                let end = self.code.fresh_label("eq");
                self.emit(Inst::LD(V0, differ));
                for (a, b) in l.regs().into_iter().zip(r.regs()) {
                    self.emit(Inst::SER(a, b));
                    self.emit(Inst::JP(label(&end)));
                }
                self.emit(Inst::LD(V0, same));
                self.code.label(&end);
                let result = self.result(l, r);
                self.emit(Inst::MOV(result.low(), V0));
                Ok(result)
            }
            other => internal(format!(
                "`{}` is not an operator on line {}",
                other,
                node.line()
            )),
        }
    }

    /// Repeated subtraction. A zero divisor gives quotient 0 and leaves the
    /// dividend as remainder.
    fn divide(&mut self, kind: TokenKind, a: Reg, b: Reg) -> Result<Operand> {
        let q = self.alloc()?;
        let top = self.code.fresh_label("div");
        let end = self.code.fresh_label("divided");
        self.emit(Inst::LD(q, 0));
        self.emit(Inst::SNE(b, 0));
        self.emit(Inst::JP(label(&end)));
        self.code.label(&top);
        self.emit(Inst::MOV(V0, a));
        self.emit(Inst::SUB(V0, b));
        self.emit(Inst::SE(VF, 1));
        self.emit(Inst::JP(label(&end)));
        self.emit(Inst::MOV(a, V0));
        self.emit(Inst::ADD(q, 1));
        self.emit(Inst::JP(label(&top)));
        self.code.label(&end);

        self.regs.free_reg(b);
        if kind == TokenKind::Slash {
            self.regs.free_reg(a);
            Ok(Operand::Single(q))
        } else {
            self.regs.free_reg(q);
            Ok(Operand::Single(a))
        }
    }

    /// Emit a call. Returns the result registers for non-void callees.
    fn call(&mut self, node: &Node) -> Result<Option<Operand>> {
        let callee = node.child(0)?;
        let name = callee.literal();
        let args = &node.children[1..];
        if let Some(intrinsic) = Intrinsic::parse(name) {
            return self.intrinsic(intrinsic, node, args);
        }

        let Some(Symbol {
            ty: Type::Function { ret, args: params },
            ..
        }) = self.scopes.resolve(ScopeTree::ROOT, name).cloned()
        else {
            return internal(format!("`{}` is not a function", name));
        };

        let mut values = vec![];
        for arg in args {
            values.push(self.value(arg)?);
        }

        let locals = self.frames.locals_size();
        let frame = self.frames.frame_size();

        // Save V0..VC above the locals of this frame.
        self.load_i(Location::new(Place::Frame(locals)));
        self.emit(Inst::STM(Reg::POOL_LAST));

        // Arguments go to the parameter slots of the callee frame, which
        // starts right after this one.
        let mut offset = frame;
        for (value, ty) in values.into_iter().zip(&params) {
            self.load_i(Location::new(Place::Frame(offset)));
            self.store_at_i(value);
            self.regs.free(value);
            offset += ty.size_of() as u16;
        }

        self.sp_add(frame);
        self.emit(Inst::CALL(label(name)));
        self.sp_sub(frame);

        self.load_i(Location::new(Place::Frame(locals)));
        self.emit(Inst::LDM(Reg::POOL_LAST));

        if ret.is_void() {
            return Ok(None);
        }
        self.emit(Inst::LDI(Imm::Addr(RETURN_SLOT)));
        let result = self.regs.alloc_for(&ret)?;
        match result {
            Operand::Single(r) => {
                self.emit(Inst::LDM(V0));
                self.emit(Inst::MOV(r, V0));
            }
            Operand::Pair { hi, lo } => {
                self.emit(Inst::LDM(V1));
                self.emit(Inst::MOV(hi, V0));
                self.emit(Inst::MOV(lo, V1));
            }
        }
        Ok(Some(result))
    }

    fn intrinsic(&mut self, intrinsic: Intrinsic, node: &Node, args: &[Node]) -> Result<Option<Operand>> {
        match intrinsic {
            Intrinsic::Draw => {
                let [x, y, sprite, height] = args else {
                    return internal("draw takes four arguments");
                };
                let height = match byte_literal(height) {
                    Some(n @ 1..=15) => n,
                    _ => return Err(ResourceError::SpriteHeightNotLiteral(node.line()).into()),
                };
                let x = self.value(x)?;
                let y = self.value(y)?;
                let sprite = self.value(sprite)?;
                self.load_i(Location::new(Place::Pointer(sprite)));
                self.emit(Inst::DRW(x.low(), y.low(), height));
                self.emit(Inst::MOV(x.low(), VF));
                self.regs.free(y);
                Ok(Some(x))
            }
            Intrinsic::GetDelay | Intrinsic::GetSound => {
                let r = self.alloc()?;
                self.emit(if intrinsic == Intrinsic::GetDelay {
                    Inst::GDT(r)
                } else {
                    Inst::GST(r)
                });
                Ok(Some(Operand::Single(r)))
            }
            Intrinsic::SetDelay | Intrinsic::SetSound => {
                let [value] = args else {
                    return internal(format!("{} takes one argument", intrinsic));
                };
                let value = self.value(value)?;
                self.emit(if intrinsic == Intrinsic::SetDelay {
                    Inst::SDT(value.low())
                } else {
                    Inst::SST(value.low())
                });
                self.regs.free(value);
                Ok(None)
            }
        }
    }
}

// ----------------------------------------------------------------------------
// Statements
// ----------------------------------------------------------------------------

impl<'a> FunctionCodegen<'a> {
    fn statement(&mut self, node: &Node) -> Result<()> {
        match node.kind() {
            TokenKind::Let => self.let_statement(node),
            TokenKind::LeftBrace => self.block(node),
            TokenKind::Assign => self.assign(node),
            TokenKind::LeftParen => {
                if let Some(result) = self.call(node)? {
                    self.regs.free(result);
                }
                Ok(())
            }
            TokenKind::If => self.if_statement(node),
            TokenKind::While => self.while_statement(node),
            TokenKind::Return => self.return_statement(node),
            other => internal(format!(
                "`{}` is not a statement on line {}",
                other,
                node.line()
            )),
        }
    }

    fn block(&mut self, node: &Node) -> Result<()> {
        self.cursor.enter();
        for statement in &node.children {
            self.statement(statement)?;
        }
        self.cursor.leave();
        Ok(())
    }

    fn let_statement(&mut self, node: &Node) -> Result<()> {
        let init = match node.children.get(2) {
            Some(init) => Some(self.value(init)?),
            None => None,
        };
        let Some(id) = self.cursor.declare() else {
            return internal(format!("no slot for `{}`", node.child(0)?.literal()));
        };
        let slot = self.cursor.slot(id);
        let value = match init {
            Some(value) => value,
            None if slot.ty.is_scalar() => {
                let zero = self.regs.alloc_for(&slot.ty)?;
                for r in zero.regs() {
                    self.emit(Inst::LD(r, 0));
                }
                zero
            }
            // Arrays start with whatever the stack held.
            None => return Ok(()),
        };
        match self.pinned.get(&id).copied() {
            Some(target) => self.mov(target, value),
            None => self.store(Location::new(Place::Frame(slot.offset)), value),
        }
        self.regs.free(value);
        Ok(())
    }

    fn assign(&mut self, node: &Node) -> Result<()> {
        let (lhs, rhs) = node.operands()?;
        let value = self.value(rhs)?;
        let pinned = match lhs.kind() {
            TokenKind::Identifier => match self.storage(lhs)? {
                Storage::Pinned(target) => Some(target),
                _ => None,
            },
            _ => None,
        };
        match pinned {
            Some(target) => self.mov(target, value),
            None => {
                let loc = self.location(lhs)?;
                self.store(loc, value);
            }
        }
        self.regs.free(value);
        Ok(())
    }

    /// Jump to `target` when the boolean in `cond` is false.
    fn branch_if_false(&mut self, cond: Operand, target: &str) {
        self.emit(Inst::SNE(cond.low(), 0));
        self.emit(Inst::JP(label(target)));
        self.regs.free(cond);
    }

    fn if_statement(&mut self, node: &Node) -> Result<()> {
        let cond = self.value(node.child(0)?)?;
        let otherwise = self.code.fresh_label("else");
        self.branch_if_false(cond, &otherwise);
        self.block(node.child(1)?)?;
        match node.children.get(2) {
            Some(next) => {
                let end = self.code.fresh_label("endif");
                self.emit(Inst::JP(label(&end)));
                self.code.label(&otherwise);
                if next.kind() == TokenKind::If {
                    self.if_statement(next)?;
                } else {
                    self.block(next)?;
                }
                self.code.label(&end);
            }
            None => self.code.label(&otherwise),
        }
        Ok(())
    }

    fn while_statement(&mut self, node: &Node) -> Result<()> {
        let top = self.code.fresh_label("while");
        let end = self.code.fresh_label("wend");
        self.code.label(&top);
        let cond = self.value(node.child(0)?)?;
        self.branch_if_false(cond, &end);
        self.block(node.child(1)?)?;
        self.emit(Inst::JP(label(&top)));
        self.code.label(&end);
        Ok(())
    }

    fn return_statement(&mut self, node: &Node) -> Result<()> {
        if let Some(expr) = node.children.first() {
            let value = self.value(expr)?;
            self.emit(Inst::LDI(Imm::Addr(RETURN_SLOT)));
            self.store_at_i(value);
            self.regs.free(value);
        }
        self.exit();
        Ok(())
    }

    /// Leave the function. The entry function was jumped to, so it halts.
    fn exit(&mut self) {
        if self.is_entry {
            let halt = self.code.fresh_label("halt");
            self.code.label(&halt);
            self.emit(Inst::JP(label(&halt)));
        } else {
            self.emit(Inst::RET());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::code::Line;
    use super::*;
    use crate::analyzer::analyze;
    use crate::grammar;
    use crate::lexer::Lexer;

    fn generate(code: &str, index: usize, pin: bool) -> (Code, usize) {
        let tree = grammar::parse(&Lexer::new(code).parse()).into_tree().unwrap();
        let scopes = analyze(&tree).unwrap();
        let statements = tree.statements().unwrap();
        let layout = GlobalLayout::build(statements, &scopes).unwrap();
        let function = &statements[index];
        let frames = FrameTree::build(function).unwrap();
        let name = function.child(0).unwrap().literal().to_string();
        let mut gen = FunctionCodegen::new(&name, &scopes, &layout, &frames, name == "main");
        if pin {
            let counts = super::super::optimizer::count_uses(function, &frames);
            gen.pin(&super::super::optimizer::select(&frames, &counts, 6)).unwrap();
        }
        let pinned = gen.pinned().len();
        (gen.generate(function).unwrap(), pinned)
    }

    fn insts(code: &Code) -> Vec<Inst<Imm>> {
        code.lines
            .iter()
            .filter_map(|line| match line {
                Line::Inst(inst) => Some(inst.clone()),
                Line::Label(_) => None,
            })
            .collect()
    }

    #[test]
    fn entry_function_halts() {
        let (code, _) = generate("fn main() void {\n}", 0, true);
        assert_eq!(code.lines[0], Line::Label("main".to_string()));
        assert_eq!(insts(&code), vec![Inst::JP(label("main.halt1"))]);
    }

    #[test]
    fn other_functions_return() {
        let (code, _) = generate("fn f() void {\n}", 0, true);
        assert_eq!(insts(&code), vec![Inst::RET()]);
    }

    #[test]
    fn global_store_uses_static_address() {
        let (code, _) = generate("let x byte\nfn f() void {\nx = 7\n}", 1, true);
        assert_eq!(
            insts(&code),
            vec![
                Inst::LD(Reg::V2, 7),
                Inst::LDI(Imm::Addr(c8arch::mem::GLOBAL_BASE)),
                Inst::MOV(V0, Reg::V2),
                Inst::STM(V0),
                Inst::RET(),
            ]
        );
    }

    #[test]
    fn pinned_local_stays_in_register() {
        let (code, pinned) = generate("fn f() void {\nlet i byte = 1\ni = i + 2\n}", 0, true);
        assert_eq!(pinned, 1);
        let insts = insts(&code);
        // No memory traffic at all.
        assert!(!insts.iter().any(|i| matches!(i, Inst::STM(_) | Inst::LDM(_))));
        assert_eq!(insts[0], Inst::LD(Reg::V3, 1));
        assert_eq!(insts[1], Inst::MOV(Reg::V2, Reg::V3));
    }

    #[test]
    fn unpinned_local_goes_through_frame() {
        let (code, pinned) = generate("fn f() void {\nlet i byte = 1\n}", 0, false);
        assert_eq!(pinned, 0);
        let insts = insts(&code);
        assert!(insts.contains(&Inst::CALL(Imm::Addr(TRAMPOLINE))));
        assert!(insts.contains(&Inst::STM(V0)));
    }

    #[test]
    fn call_saves_and_restores() {
        let code = "fn g(a byte) byte {\nreturn a\n}\nfn f() void {\nlet v byte = g(3)\n}";
        let (code, _) = generate(code, 1, false);
        let insts = insts(&code);
        let save = insts.iter().position(|i| *i == Inst::STM(Reg::VC)).unwrap();
        let call = insts.iter().position(|i| *i == Inst::CALL(label("g"))).unwrap();
        let restore = insts.iter().position(|i| *i == Inst::LDM(Reg::VC)).unwrap();
        assert!(save < call && call < restore);
        assert!(insts.contains(&Inst::LDI(Imm::Addr(RETURN_SLOT))));
    }

    #[test]
    fn draw_needs_literal_height() {
        let code = "let s *byte\nfn f(h byte) void {\nlet c bool = draw(0, 0, s, h)\n}";
        let tree = grammar::parse(&Lexer::new(code).parse()).into_tree().unwrap();
        let scopes = analyze(&tree).unwrap();
        let statements = tree.statements().unwrap();
        let layout = GlobalLayout::build(statements, &scopes).unwrap();
        let frames = FrameTree::build(&statements[1]).unwrap();
        let gen = FunctionCodegen::new("f", &scopes, &layout, &frames, false);
        assert!(matches!(
            gen.generate(&statements[1]),
            Err(crate::error::Error::Resource(ResourceError::SpriteHeightNotLiteral(3)))
        ));
    }

    #[test]
    fn draw_emits_drw() {
        let code = "let s *byte\nfn f() void {\nlet c bool = draw(1, 2, s, 5)\n}";
        let (code, _) = generate(code, 1, false);
        assert!(insts(&code).contains(&Inst::DRW(Reg::V2, Reg::V3, 5)));
    }
}
