//! The operator-stream executor: the in-tree producer behind the
//! compiled-function contract.
//!
//! One machine per activation. Structured control never rescans the
//! stream: every branch resolves through the function's side table.
//! Guest failures propagate as `Result`; thrown exceptions unwind the
//! block stack here and the call stack via the same error path.

use std::sync::{
    atomic::Ordering,
    Arc,
};

use keel_ops::Operator;
use keel_types::{
    floats::{
        canonicalize_f32 as cf32,
        canonicalize_f64 as cf64,
    },
    RefType,
    UntaggedValue,
    Value,
    V128,
};

use super::{
    call_function,
    numeric,
    side_table::CatchClause,
    CompiledFunc,
    ExecCtx,
    InstanceView,
};
use crate::{
    concurrency,
    runtime::table::{
        elem_from_token,
        TableElem,
    },
    Trap,
    TrapKind,
};

/// One open structured-control frame.
struct Frame {
    /// Operator index of the opening operator.
    start: u32,
    /// Operator index of the matching `end` (or `delegate`).
    end: u32,
    /// Value-stack height at entry, parameters excluded.
    height: usize,
    param_count: u16,
    result_count: u16,
    is_loop: bool,
    is_try: bool,
    /// Set once a catch handler of this frame is running.
    in_catch: bool,
    /// The exception the running handler caught, for `rethrow`.
    caught: Option<Trap>,
}

/// Execute one compiled function.
pub(crate) fn execute(
    ctx: &mut ExecCtx<'_>,
    func: &CompiledFunc,
    view: &Arc<InstanceView>,
    args: &[UntaggedValue],
) -> Result<Vec<UntaggedValue>, Trap> {
    let mut machine = Machine {
        func,
        view,
        locals: {
            let mut locals = Vec::with_capacity(args.len() + func.locals.len());
            locals.extend_from_slice(args);
            locals.extend(std::iter::repeat(UntaggedValue::ZERO).take(func.locals.len()));
            locals
        },
        stack: Vec::with_capacity(16),
        frames: vec![Frame {
            start: 0,
            end: func.ops.len().saturating_sub(1) as u32,
            height: 0,
            param_count: 0,
            result_count: func.ty.results().len() as u16,
            is_loop: false,
            is_try: false,
            in_catch: false,
            caught: None,
        }],
        pc: 0,
    };
    machine.run(ctx).map_err(|mut trap| {
        trap.push_frame(&func.debug_name, machine.pc);
        trap
    })
}

struct Machine<'e> {
    func: &'e CompiledFunc,
    view: &'e Arc<InstanceView>,
    locals: Vec<UntaggedValue>,
    stack: Vec<UntaggedValue>,
    frames: Vec<Frame>,
    pc: usize,
}

macro_rules! binop {
    ($self:ident, $pop:ident, $push:ident, $f:expr) => {{
        let rhs = $self.$pop();
        let lhs = $self.$pop();
        $self.$push($f(lhs, rhs));
    }};
}

macro_rules! unop {
    ($self:ident, $pop:ident, $push:ident, $f:expr) => {{
        let value = $self.$pop();
        $self.$push($f(value));
    }};
}

macro_rules! binop_trap {
    ($self:ident, $pop:ident, $push:ident, $f:expr) => {{
        let rhs = $self.$pop();
        let lhs = $self.$pop();
        $self.$push($f(lhs, rhs)?);
    }};
}

macro_rules! cmpop {
    ($self:ident, $pop:ident, $f:expr) => {{
        let rhs = $self.$pop();
        let lhs = $self.$pop();
        $self.push_u32($f(lhs, rhs) as u32);
    }};
}

macro_rules! load {
    ($self:ident, $imm:expr, $raw:ty, $push:ident, $conv:ty) => {{
        let addr = $self.pop_u32();
        let mut raw = [0u8; std::mem::size_of::<$raw>()];
        $self.memory(0)?.read(addr, $imm.offset, &mut raw)?;
        let wide = <$raw>::from_le_bytes(raw) as $conv;
        $self.$push(wide);
    }};
}

macro_rules! store {
    ($self:ident, $imm:expr, $pop:ident, $raw:ty) => {{
        let value = $self.$pop() as $raw;
        let addr = $self.pop_u32();
        $self.memory(0)?.write(addr, $imm.offset, &value.to_le_bytes())?;
    }};
}

macro_rules! atomic_rmw {
    ($self:ident, $imm:expr, $cell:ident, $pop:ident, $push:ident, $raw:ty, $conv:ty, $op:ident) => {{
        let operand = $self.$pop() as $raw;
        let addr = $self.pop_u32();
        let old = $self
            .memory(0)?
            .$cell(addr, $imm.offset)?
            .$op(operand, Ordering::SeqCst);
        $self.$push(old as $conv);
    }};
}

macro_rules! atomic_cmpxchg {
    ($self:ident, $imm:expr, $cell:ident, $pop:ident, $push:ident, $raw:ty, $conv:ty) => {{
        let replacement = $self.$pop() as $raw;
        let expected = $self.$pop() as $raw;
        let addr = $self.pop_u32();
        let old = match $self.memory(0)?.$cell(addr, $imm.offset)?.compare_exchange(
            expected,
            replacement,
            Ordering::SeqCst,
            Ordering::SeqCst,
        ) {
            Ok(old) | Err(old) => old,
        };
        $self.$push(old as $conv);
    }};
}

impl Machine<'_> {
    fn push(&mut self, bits: UntaggedValue) {
        self.stack.push(bits);
    }

    fn pop(&mut self) -> UntaggedValue {
        self.stack.pop().expect("validated operand stack")
    }

    fn push_i32(&mut self, value: i32) {
        self.push(value.into());
    }

    fn push_u32(&mut self, value: u32) {
        self.push(value.into());
    }

    fn push_i64(&mut self, value: i64) {
        self.push(value.into());
    }

    fn push_u64(&mut self, value: u64) {
        self.push(value.into());
    }

    fn push_f32(&mut self, value: f32) {
        self.push(value.into());
    }

    fn push_f64(&mut self, value: f64) {
        self.push(value.into());
    }

    fn push_v128(&mut self, value: V128) {
        self.push(value.into());
    }

    fn pop_i32(&mut self) -> i32 {
        self.pop().as_i32()
    }

    fn pop_u32(&mut self) -> u32 {
        self.pop().as_i32() as u32
    }

    fn pop_i64(&mut self) -> i64 {
        self.pop().as_i64()
    }

    fn pop_u64(&mut self) -> u64 {
        self.pop().as_i64() as u64
    }

    fn pop_f32(&mut self) -> f32 {
        self.pop().as_f32()
    }

    fn pop_f64(&mut self) -> f64 {
        self.pop().as_f64()
    }

    fn pop_v128(&mut self) -> V128 {
        self.pop().as_v128()
    }

    fn memory(&self, index: usize) -> Result<&Arc<crate::runtime::memory::MemoryData>, Trap> {
        // Validation pinned every memory operator to an existing memory.
        Ok(&self.view.memories[index])
    }

    fn enter_block(&mut self, is_loop: bool, is_try: bool) {
        let meta = self.func.side.block(self.pc);
        self.frames.push(Frame {
            start: self.pc as u32,
            end: meta.end,
            height: self.stack.len() - meta.param_count as usize,
            param_count: meta.param_count,
            result_count: meta.result_count,
            is_loop,
            is_try,
            in_catch: false,
            caught: None,
        });
    }

    /// Transfer to the frame `depth` levels up: keep the label arity,
    /// truncate the rest, and continue at the label's target.
    fn branch(&mut self, depth: u32) {
        let index = self.frames.len() - 1 - depth as usize;
        let frame = &self.frames[index];
        let keep = if frame.is_loop {
            frame.param_count
        } else {
            frame.result_count
        } as usize;
        let height = frame.height;
        let target = if frame.is_loop {
            frame.start as usize + 1
        } else {
            frame.end as usize + 1
        };
        let is_loop = frame.is_loop;

        let kept = self.stack.split_off(self.stack.len() - keep);
        self.stack.truncate(height);
        self.stack.extend(kept);
        self.frames.truncate(index + usize::from(is_loop));
        self.pc = target;
    }

    /// Deliver a thrown exception: find a handler in this activation or
    /// propagate to the caller.
    fn raise(&mut self, trap: Trap) -> Result<(), Trap> {
        let TrapKind::UserException { tag, .. } = &trap.kind else {
            return Err(trap);
        };
        let thrown_tag = *tag;

        let mut index = self.frames.len();
        while index > 0 {
            index -= 1;
            let frame = &self.frames[index];
            if !frame.is_try || frame.in_catch {
                continue;
            }
            let meta = self.func.side.block(frame.start as usize);
            let mut handler: Option<(Option<u32>, u32)> = None;
            let mut delegate: Option<u32> = None;
            for clause in &meta.catches {
                match clause {
                    CatchClause::Tag { tag_index, op } => {
                        if self.view.tag_ids[*tag_index as usize] == thrown_tag {
                            handler = Some((Some(*tag_index), *op));
                            break;
                        }
                    }
                    CatchClause::All { op } => {
                        handler = Some((None, *op));
                        break;
                    }
                    CatchClause::Delegate { depth } => {
                        delegate = Some(*depth);
                        break;
                    }
                }
            }

            if let Some((_tag, op)) = handler {
                let payload = match &trap.kind {
                    TrapKind::UserException { payload, .. } => payload.clone(),
                    _ => unreachable!(),
                };
                self.frames.truncate(index + 1);
                let frame = &mut self.frames[index];
                self.stack.truncate(frame.height);
                frame.in_catch = true;
                frame.caught = Some(trap);
                // catch_all receives no payload; catch receives the tag's
                // parameters.
                if _tag.is_some() {
                    for value in payload {
                        self.stack.push(value.bits());
                    }
                }
                self.pc = op as usize + 1;
                return Ok(());
            }

            if let Some(depth) = delegate {
                // Forward past the frames the delegate label skips.
                let Some(target) = index.checked_sub(1 + depth as usize) else {
                    return Err(trap);
                };
                index = target + 1;
                continue;
            }
        }
        Err(trap)
    }

    /// Pop `count` raw arguments in pushed order.
    fn pop_args(&mut self, count: usize) -> Vec<UntaggedValue> {
        self.stack.split_off(self.stack.len() - count)
    }

    /// Call a function; returns whether control was transferred to an
    /// exception handler (in which case `pc` is already placed).
    fn call_target(
        &mut self,
        ctx: &mut ExecCtx<'_>,
        callee: &Arc<crate::runtime::object::FunctionData>,
    ) -> Result<bool, Trap> {
        let args = self.pop_args(callee.ty.params().len());
        match call_function(ctx, callee, &args) {
            Ok(results) => {
                self.stack.extend(results);
                Ok(false)
            }
            Err(trap) => {
                self.raise(trap)?;
                Ok(true)
            }
        }
    }

    fn run(&mut self, ctx: &mut ExecCtx<'_>) -> Result<Vec<UntaggedValue>, Trap> {
        use Operator as O;

        while self.pc < self.func.ops.len() {
            let op = &self.func.ops[self.pc];
            match op {
                // Control.
                O::Unreachable(_) => {
                    return Err(Trap::new(TrapKind::Unreachable));
                }
                O::Nop(_) => {}
                O::Block(_) => self.enter_block(false, false),
                O::Loop(_) => self.enter_block(true, false),
                O::Try(_) => self.enter_block(false, true),
                O::If(_) => {
                    let cond = self.pop_u32();
                    let meta = self.func.side.block(self.pc);
                    if cond != 0 {
                        self.enter_block(false, false);
                    } else if let Some(else_at) = meta.else_ {
                        self.enter_block(false, false);
                        self.pc = else_at as usize;
                    } else {
                        // Type-neutral if without else: skip the body and
                        // its end.
                        self.pc = meta.end as usize + 1;
                        continue;
                    }
                }
                O::Else(_) => {
                    // The then-branch finished; skip to the end.
                    let frame = self.frames.last().expect("validated control stack");
                    self.pc = frame.end as usize;
                    continue;
                }
                O::Catch(_) | O::CatchAll(_) => {
                    // The protected body finished; skip to the end.
                    let frame = self.frames.last().expect("validated control stack");
                    self.pc = frame.end as usize;
                    continue;
                }
                O::Delegate(_) | O::End(_) => {
                    self.frames.pop();
                    if self.frames.is_empty() {
                        break;
                    }
                }
                O::Br(imm) => {
                    self.branch(imm.depth);
                    continue;
                }
                O::BrIf(imm) => {
                    if self.pop_u32() != 0 {
                        self.branch(imm.depth);
                        continue;
                    }
                }
                O::BrTable(imm) => {
                    let index = self.pop_u32() as usize;
                    let depth = imm
                        .targets
                        .get(index)
                        .copied()
                        .unwrap_or(imm.default);
                    self.branch(depth);
                    continue;
                }
                O::Return(_) => {
                    self.branch(self.frames.len() as u32 - 1);
                    continue;
                }
                O::Call(imm) => {
                    let callee = Arc::clone(&self.view.functions[imm.func as usize]);
                    if self.call_target(ctx, &callee)? {
                        continue;
                    }
                }
                O::CallIndirect(imm) => {
                    let index = self.pop_u32();
                    let table = &self.view.tables[imm.table as usize];
                    let callee = match table.get(index)? {
                        TableElem::Null => {
                            return Err(Trap::new(TrapKind::UndefinedElement)
                                .with_operand(index));
                        }
                        TableElem::Extern { .. } => {
                            return Err(Trap::new(TrapKind::IndirectCallSignatureMismatch)
                                .with_operand(index));
                        }
                        TableElem::Func { data, .. } => data,
                    };
                    let expected = &self.unit_type(imm.ty);
                    if callee.ty != *expected {
                        return Err(Trap::new(TrapKind::IndirectCallSignatureMismatch)
                            .with_operand(index));
                    }
                    if self.call_target(ctx, &callee)? {
                        continue;
                    }
                }
                O::Throw(imm) => {
                    let tag = &self.view.tags[imm.tag as usize];
                    let params = tag.ty.params();
                    let raw = self.pop_args(params.len());
                    let payload = raw
                        .into_iter()
                        .zip(params)
                        .map(|(bits, ty)| Value::from_parts(*ty, bits))
                        .collect();
                    let trap = Trap::new(TrapKind::UserException {
                        tag: self.view.tag_ids[imm.tag as usize],
                        payload,
                    });
                    self.raise(trap)?;
                    continue;
                }
                O::Rethrow(imm) => {
                    let index = self.frames.len() - 1 - imm.depth as usize;
                    let trap = self.frames[index]
                        .caught
                        .clone()
                        .expect("validation pinned rethrow to a catch");
                    self.raise(trap)?;
                    continue;
                }

                // Parametric.
                O::Drop(_) => {
                    self.pop();
                }
                O::Select(_) | O::SelectT(_) => {
                    let cond = self.pop_u32();
                    let on_false = self.pop();
                    let on_true = self.pop();
                    self.push(if cond != 0 { on_true } else { on_false });
                }

                // Variables.
                O::LocalGet(imm) => {
                    let value = self.locals[imm.local as usize];
                    self.push(value);
                }
                O::LocalSet(imm) => {
                    self.locals[imm.local as usize] = self.pop();
                }
                O::LocalTee(imm) => {
                    let value = *self.stack.last().expect("validated operand stack");
                    self.locals[imm.local as usize] = value;
                }
                O::GlobalGet(imm) => {
                    let global = &self.view.globals[imm.global as usize];
                    let bits = match &global.storage {
                        crate::runtime::object::GlobalStorage::Immutable(bits) => *bits,
                        crate::runtime::object::GlobalStorage::Mutable { slot } => {
                            let slab = ctx.context.mutable_globals.lock();
                            slab[*slot as usize]
                        }
                    };
                    self.push(bits);
                }
                O::GlobalSet(imm) => {
                    let value = self.pop();
                    let global = &self.view.globals[imm.global as usize];
                    match &global.storage {
                        crate::runtime::object::GlobalStorage::Mutable { slot } => {
                            let mut slab = ctx.context.mutable_globals.lock();
                            slab[*slot as usize] = value;
                        }
                        crate::runtime::object::GlobalStorage::Immutable(_) => {
                            unreachable!("validation rejects writes to immutable globals")
                        }
                    }
                }

                // Tables.
                O::TableGet(imm) => {
                    let index = self.pop_u32();
                    let token = self.view.tables[imm.table as usize].get(index)?.token();
                    self.push_u64(token);
                }
                O::TableSet(imm) => {
                    let token = self.pop().as_ref_token();
                    let index = self.pop_u32();
                    let table = &self.view.tables[imm.table as usize];
                    let elem = self.elem_from_token(ctx, table.elem_kind(), token)?;
                    table.set(index, elem)?;
                }
                O::TableGrow(imm) => {
                    let delta = self.pop_u32();
                    let token = self.pop().as_ref_token();
                    let table = &self.view.tables[imm.table as usize];
                    let fill = self.elem_from_token(ctx, table.elem_kind(), token)?;
                    let result = table
                        .grow(delta, fill)
                        .map(|prev| prev as i32)
                        .unwrap_or(-1);
                    self.push_i32(result);
                }
                O::TableSize(imm) => {
                    let len = self.view.tables[imm.table as usize].len();
                    self.push_u32(len);
                }
                O::TableFill(imm) => {
                    let len = self.pop_u32();
                    let token = self.pop().as_ref_token();
                    let start = self.pop_u32();
                    let table = &self.view.tables[imm.table as usize];
                    let elem = self.elem_from_token(ctx, table.elem_kind(), token)?;
                    table.fill(start, elem, len)?;
                }
                O::TableCopy(imm) => {
                    let len = self.pop_u32();
                    let src_start = self.pop_u32();
                    let dst_start = self.pop_u32();
                    let dst = &self.view.tables[imm.dst as usize];
                    let src = &self.view.tables[imm.src as usize];
                    dst.copy_from(src, dst_start, src_start, len)?;
                }
                O::TableInit(imm) => {
                    let len = self.pop_u32();
                    let src_start = self.pop_u32();
                    let dst_start = self.pop_u32();
                    let segment = self.view.passive_elems.lock()[imm.elem as usize].clone();
                    let items = segment.as_deref().map(Vec::as_slice).unwrap_or(&[]);
                    let end = src_start as u64 + len as u64;
                    if end > items.len() as u64 {
                        return Err(Trap::new(TrapKind::OutOfBoundsTableAccess)
                            .with_operand(src_start));
                    }
                    self.view.tables[imm.table as usize].init(
                        dst_start,
                        &items[src_start as usize..end as usize],
                    )?;
                }
                O::ElemDrop(imm) => {
                    self.view.passive_elems.lock()[imm.elem as usize] = None;
                }

                // Memory management.
                O::MemorySize(_) => {
                    let pages = self.memory(0)?.pages();
                    self.push_u32(pages as u32);
                }
                O::MemoryGrow(_) => {
                    let delta = self.pop_u32();
                    let result = self
                        .memory(0)?
                        .grow(delta as u64)?
                        .map(|prev| prev as i32)
                        .unwrap_or(-1);
                    self.push_i32(result);
                }
                O::MemoryFill(_) => {
                    let len = self.pop_u32();
                    let value = self.pop_u32() as u8;
                    let dst = self.pop_u32();
                    self.memory(0)?.fill(dst, value, len)?;
                }
                O::MemoryCopy(_) => {
                    let len = self.pop_u32();
                    let src = self.pop_u32();
                    let dst = self.pop_u32();
                    self.memory(0)?.copy_within(dst, src, len)?;
                }
                O::MemoryInit(imm) => {
                    let len = self.pop_u32();
                    let src = self.pop_u32();
                    let dst = self.pop_u32();
                    let segment = self.view.passive_data.lock()[imm.data as usize].clone();
                    let bytes = segment.as_deref().unwrap_or(&[]);
                    let end = src as u64 + len as u64;
                    if end > bytes.len() as u64 {
                        return Err(Trap::new(TrapKind::OutOfBoundsMemoryAccess)
                            .with_operand(src));
                    }
                    self.memory(0)?
                        .init(dst, &bytes[src as usize..end as usize])?;
                }
                O::DataDrop(imm) => {
                    self.view.passive_data.lock()[imm.data as usize] = None;
                }

                // Scalar loads.
                O::I32Load(imm) => load!(self, imm, i32, push_i32, i32),
                O::I64Load(imm) => load!(self, imm, i64, push_i64, i64),
                O::F32Load(imm) => load!(self, imm, f32, push_f32, f32),
                O::F64Load(imm) => load!(self, imm, f64, push_f64, f64),
                O::I32Load8S(imm) => load!(self, imm, i8, push_i32, i32),
                O::I32Load8U(imm) => load!(self, imm, u8, push_u32, u32),
                O::I32Load16S(imm) => load!(self, imm, i16, push_i32, i32),
                O::I32Load16U(imm) => load!(self, imm, u16, push_u32, u32),
                O::I64Load8S(imm) => load!(self, imm, i8, push_i64, i64),
                O::I64Load8U(imm) => load!(self, imm, u8, push_u64, u64),
                O::I64Load16S(imm) => load!(self, imm, i16, push_i64, i64),
                O::I64Load16U(imm) => load!(self, imm, u16, push_u64, u64),
                O::I64Load32S(imm) => load!(self, imm, i32, push_i64, i64),
                O::I64Load32U(imm) => load!(self, imm, u32, push_u64, u64),

                // Scalar stores.
                O::I32Store(imm) => store!(self, imm, pop_i32, i32),
                O::I64Store(imm) => store!(self, imm, pop_i64, i64),
                O::F32Store(imm) => {
                    let value = self.pop_f32();
                    let addr = self.pop_u32();
                    self.memory(0)?
                        .write(addr, imm.offset, &value.to_bits().to_le_bytes())?;
                }
                O::F64Store(imm) => {
                    let value = self.pop_f64();
                    let addr = self.pop_u32();
                    self.memory(0)?
                        .write(addr, imm.offset, &value.to_bits().to_le_bytes())?;
                }
                O::I32Store8(imm) => store!(self, imm, pop_i32, i8),
                O::I32Store16(imm) => store!(self, imm, pop_i32, i16),
                O::I64Store8(imm) => store!(self, imm, pop_i64, i8),
                O::I64Store16(imm) => store!(self, imm, pop_i64, i16),
                O::I64Store32(imm) => store!(self, imm, pop_i64, i32),

                // Constants.
                O::I32Const(imm) => self.push_i32(imm.value),
                O::I64Const(imm) => self.push_i64(imm.value),
                O::F32Const(imm) => self.push_f32(imm.value()),
                O::F64Const(imm) => self.push_f64(imm.value()),

                // i32 comparisons.
                O::I32Eqz(_) => unop!(self, pop_u32, push_u32, |v| (v == 0) as u32),
                O::I32Eq(_) => cmpop!(self, pop_u32, |a, b| a == b),
                O::I32Ne(_) => cmpop!(self, pop_u32, |a, b| a != b),
                O::I32LtS(_) => cmpop!(self, pop_i32, |a, b| a < b),
                O::I32LtU(_) => cmpop!(self, pop_u32, |a, b| a < b),
                O::I32GtS(_) => cmpop!(self, pop_i32, |a, b| a > b),
                O::I32GtU(_) => cmpop!(self, pop_u32, |a, b| a > b),
                O::I32LeS(_) => cmpop!(self, pop_i32, |a, b| a <= b),
                O::I32LeU(_) => cmpop!(self, pop_u32, |a, b| a <= b),
                O::I32GeS(_) => cmpop!(self, pop_i32, |a, b| a >= b),
                O::I32GeU(_) => cmpop!(self, pop_u32, |a, b| a >= b),

                // i64 comparisons.
                O::I64Eqz(_) => unop!(self, pop_u64, push_u32, |v| (v == 0) as u32),
                O::I64Eq(_) => cmpop!(self, pop_u64, |a, b| a == b),
                O::I64Ne(_) => cmpop!(self, pop_u64, |a, b| a != b),
                O::I64LtS(_) => cmpop!(self, pop_i64, |a, b| a < b),
                O::I64LtU(_) => cmpop!(self, pop_u64, |a, b| a < b),
                O::I64GtS(_) => cmpop!(self, pop_i64, |a, b| a > b),
                O::I64GtU(_) => cmpop!(self, pop_u64, |a, b| a > b),
                O::I64LeS(_) => cmpop!(self, pop_i64, |a, b| a <= b),
                O::I64LeU(_) => cmpop!(self, pop_u64, |a, b| a <= b),
                O::I64GeS(_) => cmpop!(self, pop_i64, |a, b| a >= b),
                O::I64GeU(_) => cmpop!(self, pop_u64, |a, b| a >= b),

                // Float comparisons (IEEE, not bitwise).
                O::F32Eq(_) => cmpop!(self, pop_f32, |a, b| a == b),
                O::F32Ne(_) => cmpop!(self, pop_f32, |a, b| a != b),
                O::F32Lt(_) => cmpop!(self, pop_f32, |a, b| a < b),
                O::F32Gt(_) => cmpop!(self, pop_f32, |a, b| a > b),
                O::F32Le(_) => cmpop!(self, pop_f32, |a, b| a <= b),
                O::F32Ge(_) => cmpop!(self, pop_f32, |a, b| a >= b),
                O::F64Eq(_) => cmpop!(self, pop_f64, |a, b| a == b),
                O::F64Ne(_) => cmpop!(self, pop_f64, |a, b| a != b),
                O::F64Lt(_) => cmpop!(self, pop_f64, |a, b| a < b),
                O::F64Gt(_) => cmpop!(self, pop_f64, |a, b| a > b),
                O::F64Le(_) => cmpop!(self, pop_f64, |a, b| a <= b),
                O::F64Ge(_) => cmpop!(self, pop_f64, |a, b| a >= b),

                // i32 arithmetic.
                O::I32Clz(_) => unop!(self, pop_u32, push_u32, u32::leading_zeros),
                O::I32Ctz(_) => unop!(self, pop_u32, push_u32, u32::trailing_zeros),
                O::I32Popcnt(_) => unop!(self, pop_u32, push_u32, u32::count_ones),
                O::I32Add(_) => binop!(self, pop_u32, push_u32, u32::wrapping_add),
                O::I32Sub(_) => binop!(self, pop_u32, push_u32, u32::wrapping_sub),
                O::I32Mul(_) => binop!(self, pop_u32, push_u32, u32::wrapping_mul),
                O::I32DivS(_) => binop_trap!(self, pop_i32, push_i32, numeric::div_s),
                O::I32DivU(_) => binop_trap!(self, pop_u32, push_u32, numeric::div_u),
                O::I32RemS(_) => binop_trap!(self, pop_i32, push_i32, numeric::rem_s),
                O::I32RemU(_) => binop_trap!(self, pop_u32, push_u32, numeric::rem_u),
                O::I32And(_) => binop!(self, pop_u32, push_u32, |a, b| a & b),
                O::I32Or(_) => binop!(self, pop_u32, push_u32, |a, b| a | b),
                O::I32Xor(_) => binop!(self, pop_u32, push_u32, |a, b| a ^ b),
                O::I32Shl(_) => binop!(self, pop_u32, push_u32, |a, b| a << (b & 31)),
                O::I32ShrS(_) => {
                    binop!(self, pop_i32, push_i32, |a, b: i32| a >> (b & 31))
                }
                O::I32ShrU(_) => binop!(self, pop_u32, push_u32, |a, b| a >> (b & 31)),
                O::I32Rotl(_) => {
                    binop!(self, pop_u32, push_u32, |a: u32, b| a.rotate_left(b & 31))
                }
                O::I32Rotr(_) => {
                    binop!(self, pop_u32, push_u32, |a: u32, b| a.rotate_right(b & 31))
                }

                // i64 arithmetic.
                O::I64Clz(_) => unop!(self, pop_u64, push_u64, |v: u64| v.leading_zeros() as u64),
                O::I64Ctz(_) => unop!(self, pop_u64, push_u64, |v: u64| v.trailing_zeros() as u64),
                O::I64Popcnt(_) => unop!(self, pop_u64, push_u64, |v: u64| v.count_ones() as u64),
                O::I64Add(_) => binop!(self, pop_u64, push_u64, u64::wrapping_add),
                O::I64Sub(_) => binop!(self, pop_u64, push_u64, u64::wrapping_sub),
                O::I64Mul(_) => binop!(self, pop_u64, push_u64, u64::wrapping_mul),
                O::I64DivS(_) => binop_trap!(self, pop_i64, push_i64, numeric::div_s),
                O::I64DivU(_) => binop_trap!(self, pop_u64, push_u64, numeric::div_u),
                O::I64RemS(_) => binop_trap!(self, pop_i64, push_i64, numeric::rem_s),
                O::I64RemU(_) => binop_trap!(self, pop_u64, push_u64, numeric::rem_u),
                O::I64And(_) => binop!(self, pop_u64, push_u64, |a, b| a & b),
                O::I64Or(_) => binop!(self, pop_u64, push_u64, |a, b| a | b),
                O::I64Xor(_) => binop!(self, pop_u64, push_u64, |a, b| a ^ b),
                O::I64Shl(_) => binop!(self, pop_u64, push_u64, |a, b| a << (b & 63)),
                O::I64ShrS(_) => {
                    binop!(self, pop_i64, push_i64, |a, b: i64| a >> (b & 63))
                }
                O::I64ShrU(_) => binop!(self, pop_u64, push_u64, |a, b| a >> (b & 63)),
                O::I64Rotl(_) => binop!(self, pop_u64, push_u64, |a: u64, b: u64| {
                    a.rotate_left((b & 63) as u32)
                }),
                O::I64Rotr(_) => binop!(self, pop_u64, push_u64, |a: u64, b: u64| {
                    a.rotate_right((b & 63) as u32)
                }),

                // f32 arithmetic.
                O::F32Abs(_) => unop!(self, pop_f32, push_f32, f32::abs),
                O::F32Neg(_) => unop!(self, pop_f32, push_f32, |v: f32| -v),
                O::F32Ceil(_) => unop!(self, pop_f32, push_f32, |v: f32| cf32(v.ceil())),
                O::F32Floor(_) => unop!(self, pop_f32, push_f32, |v: f32| cf32(v.floor())),
                O::F32Trunc(_) => unop!(self, pop_f32, push_f32, |v: f32| cf32(v.trunc())),
                O::F32Nearest(_) => {
                    unop!(self, pop_f32, push_f32, |v| cf32(numeric::nearest32(v)))
                }
                O::F32Sqrt(_) => unop!(self, pop_f32, push_f32, |v: f32| cf32(v.sqrt())),
                O::F32Add(_) => binop!(self, pop_f32, push_f32, |a, b| cf32(a + b)),
                O::F32Sub(_) => binop!(self, pop_f32, push_f32, |a, b| cf32(a - b)),
                O::F32Mul(_) => binop!(self, pop_f32, push_f32, |a, b| cf32(a * b)),
                O::F32Div(_) => binop!(self, pop_f32, push_f32, |a, b| cf32(a / b)),
                O::F32Min(_) => binop!(self, pop_f32, push_f32, numeric::fmin32),
                O::F32Max(_) => binop!(self, pop_f32, push_f32, numeric::fmax32),
                O::F32Copysign(_) => binop!(self, pop_f32, push_f32, f32::copysign),

                // f64 arithmetic.
                O::F64Abs(_) => unop!(self, pop_f64, push_f64, f64::abs),
                O::F64Neg(_) => unop!(self, pop_f64, push_f64, |v: f64| -v),
                O::F64Ceil(_) => unop!(self, pop_f64, push_f64, |v: f64| cf64(v.ceil())),
                O::F64Floor(_) => unop!(self, pop_f64, push_f64, |v: f64| cf64(v.floor())),
                O::F64Trunc(_) => unop!(self, pop_f64, push_f64, |v: f64| cf64(v.trunc())),
                O::F64Nearest(_) => {
                    unop!(self, pop_f64, push_f64, |v| cf64(numeric::nearest64(v)))
                }
                O::F64Sqrt(_) => unop!(self, pop_f64, push_f64, |v: f64| cf64(v.sqrt())),
                O::F64Add(_) => binop!(self, pop_f64, push_f64, |a, b| cf64(a + b)),
                O::F64Sub(_) => binop!(self, pop_f64, push_f64, |a, b| cf64(a - b)),
                O::F64Mul(_) => binop!(self, pop_f64, push_f64, |a, b| cf64(a * b)),
                O::F64Div(_) => binop!(self, pop_f64, push_f64, |a, b| cf64(a / b)),
                O::F64Min(_) => binop!(self, pop_f64, push_f64, numeric::fmin64),
                O::F64Max(_) => binop!(self, pop_f64, push_f64, numeric::fmax64),
                O::F64Copysign(_) => binop!(self, pop_f64, push_f64, f64::copysign),

                // Conversions.
                O::I32WrapI64(_) => unop!(self, pop_u64, push_u32, |v| v as u32),
                O::I32TruncF32S(_) => {
                    let value = self.pop_f32();
                    self.push_i32(numeric::trunc_f32_to_i32(value)?);
                }
                O::I32TruncF32U(_) => {
                    let value = self.pop_f32();
                    self.push_u32(numeric::trunc_f32_to_u32(value)?);
                }
                O::I32TruncF64S(_) => {
                    let value = self.pop_f64();
                    self.push_i32(numeric::trunc_f64_to_i32(value)?);
                }
                O::I32TruncF64U(_) => {
                    let value = self.pop_f64();
                    self.push_u32(numeric::trunc_f64_to_u32(value)?);
                }
                O::I64ExtendI32S(_) => unop!(self, pop_i32, push_i64, |v| v as i64),
                O::I64ExtendI32U(_) => unop!(self, pop_u32, push_u64, |v| v as u64),
                O::I64TruncF32S(_) => {
                    let value = self.pop_f32();
                    self.push_i64(numeric::trunc_f32_to_i64(value)?);
                }
                O::I64TruncF32U(_) => {
                    let value = self.pop_f32();
                    self.push_u64(numeric::trunc_f32_to_u64(value)?);
                }
                O::I64TruncF64S(_) => {
                    let value = self.pop_f64();
                    self.push_i64(numeric::trunc_f64_to_i64(value)?);
                }
                O::I64TruncF64U(_) => {
                    let value = self.pop_f64();
                    self.push_u64(numeric::trunc_f64_to_u64(value)?);
                }
                O::F32ConvertI32S(_) => unop!(self, pop_i32, push_f32, |v| v as f32),
                O::F32ConvertI32U(_) => unop!(self, pop_u32, push_f32, |v| v as f32),
                O::F32ConvertI64S(_) => unop!(self, pop_i64, push_f32, |v| v as f32),
                O::F32ConvertI64U(_) => unop!(self, pop_u64, push_f32, |v| v as f32),
                O::F32DemoteF64(_) => unop!(self, pop_f64, push_f32, |v| cf32(v as f32)),
                O::F64ConvertI32S(_) => unop!(self, pop_i32, push_f64, |v| v as f64),
                O::F64ConvertI32U(_) => unop!(self, pop_u32, push_f64, |v| v as f64),
                O::F64ConvertI64S(_) => unop!(self, pop_i64, push_f64, |v| v as f64),
                O::F64ConvertI64U(_) => unop!(self, pop_u64, push_f64, |v| v as f64),
                O::F64PromoteF32(_) => unop!(self, pop_f32, push_f64, |v| cf64(v as f64)),
                O::I32ReinterpretF32(_) => {
                    unop!(self, pop_f32, push_u32, |v: f32| v.to_bits())
                }
                O::I64ReinterpretF64(_) => {
                    unop!(self, pop_f64, push_u64, |v: f64| v.to_bits())
                }
                O::F32ReinterpretI32(_) => {
                    unop!(self, pop_u32, push_f32, f32::from_bits)
                }
                O::F64ReinterpretI64(_) => {
                    unop!(self, pop_u64, push_f64, f64::from_bits)
                }

                // Saturating truncation.
                O::I32TruncSatF32S(_) => {
                    unop!(self, pop_f32, push_i32, numeric::trunc_sat_f32_to_i32)
                }
                O::I32TruncSatF32U(_) => {
                    unop!(self, pop_f32, push_u32, numeric::trunc_sat_f32_to_u32)
                }
                O::I32TruncSatF64S(_) => {
                    unop!(self, pop_f64, push_i32, numeric::trunc_sat_f64_to_i32)
                }
                O::I32TruncSatF64U(_) => {
                    unop!(self, pop_f64, push_u32, numeric::trunc_sat_f64_to_u32)
                }
                O::I64TruncSatF32S(_) => {
                    unop!(self, pop_f32, push_i64, numeric::trunc_sat_f32_to_i64)
                }
                O::I64TruncSatF32U(_) => {
                    unop!(self, pop_f32, push_u64, numeric::trunc_sat_f32_to_u64)
                }
                O::I64TruncSatF64S(_) => {
                    unop!(self, pop_f64, push_i64, numeric::trunc_sat_f64_to_i64)
                }
                O::I64TruncSatF64U(_) => {
                    unop!(self, pop_f64, push_u64, numeric::trunc_sat_f64_to_u64)
                }

                // Sign extension.
                O::I32Extend8S(_) => unop!(self, pop_i32, push_i32, |v| v as i8 as i32),
                O::I32Extend16S(_) => unop!(self, pop_i32, push_i32, |v| v as i16 as i32),
                O::I64Extend8S(_) => unop!(self, pop_i64, push_i64, |v| v as i8 as i64),
                O::I64Extend16S(_) => unop!(self, pop_i64, push_i64, |v| v as i16 as i64),
                O::I64Extend32S(_) => unop!(self, pop_i64, push_i64, |v| v as i32 as i64),

                // References.
                O::RefNull(_) => self.push_u64(0),
                O::RefIsNull(_) => {
                    let token = self.pop().as_ref_token();
                    self.push_u32((token == 0) as u32);
                }
                O::RefFunc(imm) => {
                    let id = self.view.func_ids[imm.func as usize];
                    self.push_u64(id as u64 + 1);
                }

                // Atomic wait, notify, fence.
                O::MemoryAtomicNotify(imm) => {
                    let count = self.pop_u32();
                    let addr = self.pop_u32();
                    let woken = concurrency::notify(
                        self.memory(0)?,
                        ctx.compartment.id(),
                        addr,
                        imm.offset,
                        count,
                    )?;
                    self.push_u32(woken);
                }
                O::MemoryAtomicWait32(imm) => {
                    let timeout = self.pop_i64();
                    let expected = self.pop_u32();
                    let addr = self.pop_u32();
                    let deadline = wait_deadline(timeout);
                    let result = concurrency::wait32(
                        self.memory(0)?,
                        ctx.compartment.id(),
                        addr,
                        imm.offset,
                        expected,
                        deadline,
                    )?;
                    self.push_i32(result as i32);
                }
                O::MemoryAtomicWait64(imm) => {
                    let timeout = self.pop_i64();
                    let expected = self.pop_u64();
                    let addr = self.pop_u32();
                    let deadline = wait_deadline(timeout);
                    let result = concurrency::wait64(
                        self.memory(0)?,
                        ctx.compartment.id(),
                        addr,
                        imm.offset,
                        expected,
                        deadline,
                    )?;
                    self.push_i32(result as i32);
                }
                O::AtomicFence(_) => concurrency::fence(),

                // Atomic loads and stores.
                O::I32AtomicLoad(imm) => {
                    let addr = self.pop_u32();
                    let value = self
                        .memory(0)?
                        .atomic_u32(addr, imm.offset)?
                        .load(Ordering::SeqCst);
                    self.push_u32(value);
                }
                O::I64AtomicLoad(imm) => {
                    let addr = self.pop_u32();
                    let value = self
                        .memory(0)?
                        .atomic_u64(addr, imm.offset)?
                        .load(Ordering::SeqCst);
                    self.push_u64(value);
                }
                O::I32AtomicLoad8U(imm) => {
                    let addr = self.pop_u32();
                    let value = self
                        .memory(0)?
                        .atomic_u8(addr, imm.offset)?
                        .load(Ordering::SeqCst);
                    self.push_u32(value as u32);
                }
                O::I32AtomicLoad16U(imm) => {
                    let addr = self.pop_u32();
                    let value = self
                        .memory(0)?
                        .atomic_u16(addr, imm.offset)?
                        .load(Ordering::SeqCst);
                    self.push_u32(value as u32);
                }
                O::I64AtomicLoad8U(imm) => {
                    let addr = self.pop_u32();
                    let value = self
                        .memory(0)?
                        .atomic_u8(addr, imm.offset)?
                        .load(Ordering::SeqCst);
                    self.push_u64(value as u64);
                }
                O::I64AtomicLoad16U(imm) => {
                    let addr = self.pop_u32();
                    let value = self
                        .memory(0)?
                        .atomic_u16(addr, imm.offset)?
                        .load(Ordering::SeqCst);
                    self.push_u64(value as u64);
                }
                O::I64AtomicLoad32U(imm) => {
                    let addr = self.pop_u32();
                    let value = self
                        .memory(0)?
                        .atomic_u32(addr, imm.offset)?
                        .load(Ordering::SeqCst);
                    self.push_u64(value as u64);
                }
                O::I32AtomicStore(imm) => {
                    let value = self.pop_u32();
                    let addr = self.pop_u32();
                    self.memory(0)?
                        .atomic_u32(addr, imm.offset)?
                        .store(value, Ordering::SeqCst);
                }
                O::I64AtomicStore(imm) => {
                    let value = self.pop_u64();
                    let addr = self.pop_u32();
                    self.memory(0)?
                        .atomic_u64(addr, imm.offset)?
                        .store(value, Ordering::SeqCst);
                }
                O::I32AtomicStore8(imm) => {
                    let value = self.pop_u32() as u8;
                    let addr = self.pop_u32();
                    self.memory(0)?
                        .atomic_u8(addr, imm.offset)?
                        .store(value, Ordering::SeqCst);
                }
                O::I32AtomicStore16(imm) => {
                    let value = self.pop_u32() as u16;
                    let addr = self.pop_u32();
                    self.memory(0)?
                        .atomic_u16(addr, imm.offset)?
                        .store(value, Ordering::SeqCst);
                }
                O::I64AtomicStore8(imm) => {
                    let value = self.pop_u64() as u8;
                    let addr = self.pop_u32();
                    self.memory(0)?
                        .atomic_u8(addr, imm.offset)?
                        .store(value, Ordering::SeqCst);
                }
                O::I64AtomicStore16(imm) => {
                    let value = self.pop_u64() as u16;
                    let addr = self.pop_u32();
                    self.memory(0)?
                        .atomic_u16(addr, imm.offset)?
                        .store(value, Ordering::SeqCst);
                }
                O::I64AtomicStore32(imm) => {
                    let value = self.pop_u64() as u32;
                    let addr = self.pop_u32();
                    self.memory(0)?
                        .atomic_u32(addr, imm.offset)?
                        .store(value, Ordering::SeqCst);
                }

                // Atomic read-modify-write.
                O::I32AtomicRmwAdd(imm) => {
                    atomic_rmw!(self, imm, atomic_u32, pop_u32, push_u32, u32, u32, fetch_add)
                }
                O::I64AtomicRmwAdd(imm) => {
                    atomic_rmw!(self, imm, atomic_u64, pop_u64, push_u64, u64, u64, fetch_add)
                }
                O::I32AtomicRmw8AddU(imm) => {
                    atomic_rmw!(self, imm, atomic_u8, pop_u32, push_u32, u8, u32, fetch_add)
                }
                O::I32AtomicRmw16AddU(imm) => {
                    atomic_rmw!(self, imm, atomic_u16, pop_u32, push_u32, u16, u32, fetch_add)
                }
                O::I64AtomicRmw8AddU(imm) => {
                    atomic_rmw!(self, imm, atomic_u8, pop_u64, push_u64, u8, u64, fetch_add)
                }
                O::I64AtomicRmw16AddU(imm) => {
                    atomic_rmw!(self, imm, atomic_u16, pop_u64, push_u64, u16, u64, fetch_add)
                }
                O::I64AtomicRmw32AddU(imm) => {
                    atomic_rmw!(self, imm, atomic_u32, pop_u64, push_u64, u32, u64, fetch_add)
                }
                O::I32AtomicRmwSub(imm) => {
                    atomic_rmw!(self, imm, atomic_u32, pop_u32, push_u32, u32, u32, fetch_sub)
                }
                O::I64AtomicRmwSub(imm) => {
                    atomic_rmw!(self, imm, atomic_u64, pop_u64, push_u64, u64, u64, fetch_sub)
                }
                O::I32AtomicRmw8SubU(imm) => {
                    atomic_rmw!(self, imm, atomic_u8, pop_u32, push_u32, u8, u32, fetch_sub)
                }
                O::I32AtomicRmw16SubU(imm) => {
                    atomic_rmw!(self, imm, atomic_u16, pop_u32, push_u32, u16, u32, fetch_sub)
                }
                O::I64AtomicRmw8SubU(imm) => {
                    atomic_rmw!(self, imm, atomic_u8, pop_u64, push_u64, u8, u64, fetch_sub)
                }
                O::I64AtomicRmw16SubU(imm) => {
                    atomic_rmw!(self, imm, atomic_u16, pop_u64, push_u64, u16, u64, fetch_sub)
                }
                O::I64AtomicRmw32SubU(imm) => {
                    atomic_rmw!(self, imm, atomic_u32, pop_u64, push_u64, u32, u64, fetch_sub)
                }
                O::I32AtomicRmwAnd(imm) => {
                    atomic_rmw!(self, imm, atomic_u32, pop_u32, push_u32, u32, u32, fetch_and)
                }
                O::I64AtomicRmwAnd(imm) => {
                    atomic_rmw!(self, imm, atomic_u64, pop_u64, push_u64, u64, u64, fetch_and)
                }
                O::I32AtomicRmw8AndU(imm) => {
                    atomic_rmw!(self, imm, atomic_u8, pop_u32, push_u32, u8, u32, fetch_and)
                }
                O::I32AtomicRmw16AndU(imm) => {
                    atomic_rmw!(self, imm, atomic_u16, pop_u32, push_u32, u16, u32, fetch_and)
                }
                O::I64AtomicRmw8AndU(imm) => {
                    atomic_rmw!(self, imm, atomic_u8, pop_u64, push_u64, u8, u64, fetch_and)
                }
                O::I64AtomicRmw16AndU(imm) => {
                    atomic_rmw!(self, imm, atomic_u16, pop_u64, push_u64, u16, u64, fetch_and)
                }
                O::I64AtomicRmw32AndU(imm) => {
                    atomic_rmw!(self, imm, atomic_u32, pop_u64, push_u64, u32, u64, fetch_and)
                }
                O::I32AtomicRmwOr(imm) => {
                    atomic_rmw!(self, imm, atomic_u32, pop_u32, push_u32, u32, u32, fetch_or)
                }
                O::I64AtomicRmwOr(imm) => {
                    atomic_rmw!(self, imm, atomic_u64, pop_u64, push_u64, u64, u64, fetch_or)
                }
                O::I32AtomicRmw8OrU(imm) => {
                    atomic_rmw!(self, imm, atomic_u8, pop_u32, push_u32, u8, u32, fetch_or)
                }
                O::I32AtomicRmw16OrU(imm) => {
                    atomic_rmw!(self, imm, atomic_u16, pop_u32, push_u32, u16, u32, fetch_or)
                }
                O::I64AtomicRmw8OrU(imm) => {
                    atomic_rmw!(self, imm, atomic_u8, pop_u64, push_u64, u8, u64, fetch_or)
                }
                O::I64AtomicRmw16OrU(imm) => {
                    atomic_rmw!(self, imm, atomic_u16, pop_u64, push_u64, u16, u64, fetch_or)
                }
                O::I64AtomicRmw32OrU(imm) => {
                    atomic_rmw!(self, imm, atomic_u32, pop_u64, push_u64, u32, u64, fetch_or)
                }
                O::I32AtomicRmwXor(imm) => {
                    atomic_rmw!(self, imm, atomic_u32, pop_u32, push_u32, u32, u32, fetch_xor)
                }
                O::I64AtomicRmwXor(imm) => {
                    atomic_rmw!(self, imm, atomic_u64, pop_u64, push_u64, u64, u64, fetch_xor)
                }
                O::I32AtomicRmw8XorU(imm) => {
                    atomic_rmw!(self, imm, atomic_u8, pop_u32, push_u32, u8, u32, fetch_xor)
                }
                O::I32AtomicRmw16XorU(imm) => {
                    atomic_rmw!(self, imm, atomic_u16, pop_u32, push_u32, u16, u32, fetch_xor)
                }
                O::I64AtomicRmw8XorU(imm) => {
                    atomic_rmw!(self, imm, atomic_u8, pop_u64, push_u64, u8, u64, fetch_xor)
                }
                O::I64AtomicRmw16XorU(imm) => {
                    atomic_rmw!(self, imm, atomic_u16, pop_u64, push_u64, u16, u64, fetch_xor)
                }
                O::I64AtomicRmw32XorU(imm) => {
                    atomic_rmw!(self, imm, atomic_u32, pop_u64, push_u64, u32, u64, fetch_xor)
                }
                O::I32AtomicRmwXchg(imm) => {
                    atomic_rmw!(self, imm, atomic_u32, pop_u32, push_u32, u32, u32, swap)
                }
                O::I64AtomicRmwXchg(imm) => {
                    atomic_rmw!(self, imm, atomic_u64, pop_u64, push_u64, u64, u64, swap)
                }
                O::I32AtomicRmw8XchgU(imm) => {
                    atomic_rmw!(self, imm, atomic_u8, pop_u32, push_u32, u8, u32, swap)
                }
                O::I32AtomicRmw16XchgU(imm) => {
                    atomic_rmw!(self, imm, atomic_u16, pop_u32, push_u32, u16, u32, swap)
                }
                O::I64AtomicRmw8XchgU(imm) => {
                    atomic_rmw!(self, imm, atomic_u8, pop_u64, push_u64, u8, u64, swap)
                }
                O::I64AtomicRmw16XchgU(imm) => {
                    atomic_rmw!(self, imm, atomic_u16, pop_u64, push_u64, u16, u64, swap)
                }
                O::I64AtomicRmw32XchgU(imm) => {
                    atomic_rmw!(self, imm, atomic_u32, pop_u64, push_u64, u32, u64, swap)
                }
                O::I32AtomicRmwCmpxchg(imm) => {
                    atomic_cmpxchg!(self, imm, atomic_u32, pop_u32, push_u32, u32, u32)
                }
                O::I64AtomicRmwCmpxchg(imm) => {
                    atomic_cmpxchg!(self, imm, atomic_u64, pop_u64, push_u64, u64, u64)
                }
                O::I32AtomicRmw8CmpxchgU(imm) => {
                    atomic_cmpxchg!(self, imm, atomic_u8, pop_u32, push_u32, u8, u32)
                }
                O::I32AtomicRmw16CmpxchgU(imm) => {
                    atomic_cmpxchg!(self, imm, atomic_u16, pop_u32, push_u32, u16, u32)
                }
                O::I64AtomicRmw8CmpxchgU(imm) => {
                    atomic_cmpxchg!(self, imm, atomic_u8, pop_u64, push_u64, u8, u64)
                }
                O::I64AtomicRmw16CmpxchgU(imm) => {
                    atomic_cmpxchg!(self, imm, atomic_u16, pop_u64, push_u64, u16, u64)
                }
                O::I64AtomicRmw32CmpxchgU(imm) => {
                    atomic_cmpxchg!(self, imm, atomic_u32, pop_u64, push_u64, u32, u64)
                }

                // Everything in the vector space.
                other => self.step_vector(other)?,
            }
            self.pc += 1;
        }

        let results = self
            .stack
            .split_off(self.stack.len() - self.func.ty.results().len());
        Ok(results)
    }

    fn unit_type(&self, type_index: u32) -> keel_types::InternedFuncType {
        self.view.unit_types[type_index as usize].clone()
    }

    fn elem_from_token(
        &self,
        ctx: &ExecCtx<'_>,
        kind: RefType,
        token: u64,
    ) -> Result<TableElem, Trap> {
        elem_from_token(kind, token, |id| ctx.compartment.function_data(id))
    }
}

/// Translate a wait timeout (nanoseconds, negative = infinite) into a
/// queue deadline.
fn wait_deadline(timeout_ns: i64) -> u64 {
    if timeout_ns < 0 {
        concurrency::DEADLINE_INFINITE
    } else {
        concurrency::now_ns().saturating_add(timeout_ns as u64)
    }
}

mod vector;
