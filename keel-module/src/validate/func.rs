//! The per-function streaming type-checker.
//!
//! A single pass over the operator stream, tracking a value stack of
//! operand types and a control stack of structured frames. Code after an
//! unconditional transfer is checked polymorphically: pops succeed against
//! the `Any` operand until the enclosing frame closes.

use std::collections::BTreeSet;

use keel_ops::{
    BlockType,
    FeatureSet,
    MemArg,
    Opcode,
    Operator,
};
use keel_types::{
    ExternKind,
    RefType,
    ValueType,
};

use crate::{
    error::BodyError,
    module::FunctionBody,
    Module,
    ValidationError,
};

/// One slot of the value stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operand {
    Exact(ValueType),
    /// A polymorphic slot produced in unreachable code.
    Any,
}

impl Operand {
    fn describe(self) -> String {
        match self {
            Self::Exact(ty) => ty.to_string(),
            Self::Any => "unknown".into(),
        }
    }
}

/// What opened the current control frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameKind {
    Block,
    Loop,
    If,
    Else,
    Try,
    Catch,
    CatchAll,
}

#[derive(Debug)]
struct ControlFrame {
    kind: FrameKind,
    params: Vec<ValueType>,
    results: Vec<ValueType>,
    /// Value-stack height at frame entry.
    height: usize,
    /// Set after an unconditional transfer inside this frame.
    unreachable: bool,
}

impl ControlFrame {
    /// The types a branch to this frame must supply: parameters for a
    /// `loop` (branches re-enter), results for everything else.
    fn label_types(&self) -> &[ValueType] {
        if self.kind == FrameKind::Loop {
            &self.params
        } else {
            &self.results
        }
    }

    fn is_catch(&self) -> bool {
        matches!(self.kind, FrameKind::Catch | FrameKind::CatchAll)
    }
}

pub(super) fn validate_body(
    module: &Module,
    features: FeatureSet,
    declared_funcs: &BTreeSet<u32>,
    func: u32,
    body: &FunctionBody,
) -> Result<(), ValidationError> {
    let type_index = module
        .func_type_index(func)
        .expect("function declarations checked before bodies");
    let ty = &module.types[type_index as usize];

    let mut locals: Vec<ValueType> = ty.params().to_vec();
    locals.extend(body.iter_locals());

    let mut validator = FuncValidator {
        module,
        features,
        declared_funcs,
        locals,
        operands: Vec::new(),
        frames: vec![ControlFrame {
            kind: FrameKind::Block,
            params: Vec::new(),
            results: ty.results().to_vec(),
            height: 0,
            unreachable: false,
        }],
        done: false,
    };

    for (index, op) in body.ops.iter().enumerate() {
        validator
            .step(op)
            .map_err(|reason| ValidationError::Body {
                func,
                index,
                name: op.name(),
                reason,
            })?;
    }
    if !validator.done {
        return Err(ValidationError::Body {
            func,
            index: body.ops.len().saturating_sub(1),
            name: "end",
            reason: BodyError::UnclosedFrames {
                depth: validator.frames.len(),
            },
        });
    }
    Ok(())
}

struct FuncValidator<'m> {
    module: &'m Module,
    features: FeatureSet,
    declared_funcs: &'m BTreeSet<u32>,
    locals: Vec<ValueType>,
    operands: Vec<Operand>,
    frames: Vec<ControlFrame>,
    done: bool,
}

impl FuncValidator<'_> {
    fn top_frame(&self) -> &ControlFrame {
        self.frames.last().expect("frame stack never empties mid-body")
    }

    fn push(&mut self, ty: ValueType) {
        self.operands.push(Operand::Exact(ty));
    }

    fn push_types(&mut self, types: &[ValueType]) {
        for ty in types {
            self.push(*ty);
        }
    }

    fn pop_any(&mut self) -> Result<Operand, BodyError> {
        let frame = self.top_frame();
        if self.operands.len() == frame.height {
            return if frame.unreachable {
                Ok(Operand::Any)
            } else {
                Err(BodyError::StackUnderflow {
                    expected: "a value".into(),
                })
            };
        }
        Ok(self.operands.pop().expect("height checked above"))
    }

    fn pop_expect(&mut self, expected: ValueType) -> Result<(), BodyError> {
        let frame = self.top_frame();
        if self.operands.len() == frame.height {
            return if frame.unreachable {
                Ok(())
            } else {
                Err(BodyError::StackUnderflow {
                    expected: expected.to_string(),
                })
            };
        }
        match self.operands.pop().expect("height checked above") {
            Operand::Any => Ok(()),
            Operand::Exact(found) if found == expected => Ok(()),
            found => Err(BodyError::TypeMismatch {
                expected: expected.to_string(),
                found: found.describe(),
            }),
        }
    }

    fn pop_types(&mut self, types: &[ValueType]) -> Result<(), BodyError> {
        for ty in types.iter().rev() {
            self.pop_expect(*ty)?;
        }
        Ok(())
    }

    /// Check that the stack could satisfy `types` without consuming it;
    /// the equivalent of popping them and pushing them straight back.
    fn check_stack_top(&self, types: &[ValueType]) -> Result<(), BodyError> {
        let frame = self.top_frame();
        let available = self.operands.len() - frame.height;
        for (depth, ty) in types.iter().rev().enumerate() {
            if depth < available {
                match self.operands[self.operands.len() - 1 - depth] {
                    Operand::Any => {}
                    Operand::Exact(found) if found == *ty => {}
                    found => {
                        return Err(BodyError::TypeMismatch {
                            expected: ty.to_string(),
                            found: found.describe(),
                        })
                    }
                }
            } else if !frame.unreachable {
                return Err(BodyError::StackUnderflow {
                    expected: ty.to_string(),
                });
            }
        }
        Ok(())
    }

    /// A pop that must produce some reference kind.
    fn pop_ref(&mut self) -> Result<Option<RefType>, BodyError> {
        match self.pop_any()? {
            Operand::Any => Ok(None),
            Operand::Exact(ty) => RefType::try_from(ty).map(Some).map_err(|found| {
                BodyError::TypeMismatch {
                    expected: "a reference".into(),
                    found: found.to_string(),
                }
            }),
        }
    }

    fn set_unreachable(&mut self) {
        let frame = self.frames.last_mut().expect("frame stack never empties mid-body");
        self.operands.truncate(frame.height);
        frame.unreachable = true;
    }

    fn frame_at(&self, depth: u32) -> Result<&ControlFrame, BodyError> {
        self.frames
            .len()
            .checked_sub(1 + depth as usize)
            .map(|index| &self.frames[index])
            .ok_or(BodyError::BadBranchDepth {
                depth,
                frames: self.frames.len(),
            })
    }

    fn push_frame(
        &mut self,
        kind: FrameKind,
        params: Vec<ValueType>,
        results: Vec<ValueType>,
    ) {
        self.frames.push(ControlFrame {
            kind,
            height: self.operands.len(),
            unreachable: false,
            params,
            results,
        });
    }

    /// Close the top frame: its results must sit on the stack, and nothing
    /// else above the entry height.
    fn pop_frame(&mut self) -> Result<ControlFrame, BodyError> {
        let results = self.top_frame().results.clone();
        self.pop_types(&results)?;
        let frame = self.frames.pop().expect("caller keeps the sentinel");
        if self.operands.len() != frame.height {
            return Err(BodyError::FrameHeightMismatch {
                found: self.operands.len() - frame.height,
            });
        }
        Ok(frame)
    }

    fn block_signature(
        &self,
        ty: BlockType,
    ) -> Result<(Vec<ValueType>, Vec<ValueType>), BodyError> {
        match ty {
            BlockType::Empty => Ok((Vec::new(), Vec::new())),
            BlockType::Value(ty) => Ok((Vec::new(), vec![ty])),
            BlockType::Func(index) => {
                if index as usize >= self.module.types.len() {
                    return Err(ValidationError::TypeIndexOutOfRange {
                        index,
                        count: self.module.types.len(),
                    }
                    .into());
                }
                let ty = &self.module.types[index as usize];
                Ok((ty.params().to_vec(), ty.results().to_vec()))
            }
        }
    }

    fn func_type(&self, index: u32) -> Result<&keel_types::InternedFuncType, BodyError> {
        let type_index = self.module.func_type_index(index).ok_or(
            ValidationError::IndexOutOfRange {
                kind: ExternKind::Func,
                index,
                count: self.module.func_count(),
            },
        )?;
        Ok(&self.module.types[type_index as usize])
    }

    fn tag_type(&self, index: u32) -> Result<&keel_types::InternedFuncType, BodyError> {
        let type_index = self.module.tag_type_index(index).ok_or(
            ValidationError::IndexOutOfRange {
                kind: ExternKind::Tag,
                index,
                count: self.module.tag_count(),
            },
        )?;
        Ok(&self.module.types[type_index as usize])
    }

    fn table_type(&self, index: u32) -> Result<keel_types::TableType, BodyError> {
        self.module
            .table_type(index)
            .ok_or_else(|| {
                ValidationError::IndexOutOfRange {
                    kind: ExternKind::Table,
                    index,
                    count: self.module.table_count(),
                }
                .into()
            })
    }

    fn memory_type(&self, index: u32) -> Result<keel_types::MemoryType, BodyError> {
        self.module
            .memory_type(index)
            .ok_or_else(|| {
                ValidationError::IndexOutOfRange {
                    kind: ExternKind::Memory,
                    index,
                    count: self.module.memory_count(),
                }
                .into()
            })
    }

    fn local_type(&self, index: u32) -> Result<ValueType, BodyError> {
        self.locals
            .get(index as usize)
            .copied()
            .ok_or(BodyError::BadLocalIndex {
                index,
                count: self.locals.len(),
            })
    }

    fn data_segment_in_range(&self, index: u32) -> Result<(), BodyError> {
        let count = self
            .module
            .data_count
            .map(|count| count as usize)
            .unwrap_or(self.module.data.len());
        if (index as usize) < count {
            Ok(())
        } else {
            Err(ValidationError::SegmentIndexOutOfRange {
                space: "data",
                index,
                count,
            }
            .into())
        }
    }

    fn elem_segment_type(&self, index: u32) -> Result<RefType, BodyError> {
        self.module
            .elems
            .get(index as usize)
            .map(|segment| segment.ty)
            .ok_or_else(|| {
                ValidationError::SegmentIndexOutOfRange {
                    space: "elem",
                    index,
                    count: self.module.elems.len(),
                }
                .into()
            })
    }

    /// Alignment, bounds, and sharing rules of one memory access.
    fn check_memarg(&self, opcode: Opcode, memarg: &MemArg) -> Result<(), BodyError> {
        self.memory_type(0)?;
        let natural = opcode
            .natural_alignment_log2()
            .expect("every memarg operator has a natural alignment");
        if opcode.is_atomic() {
            if memarg.align_log2 != natural {
                return Err(BodyError::AtomicAlignmentNotNatural {
                    align: memarg.align_log2,
                    natural,
                });
            }
        } else if memarg.align_log2 > natural {
            return Err(BodyError::AlignmentTooLarge {
                align: memarg.align_log2,
                natural,
            });
        }
        Ok(())
    }

    fn check_shared_memory(&self) -> Result<(), BodyError> {
        if self.memory_type(0)?.shared {
            Ok(())
        } else {
            Err(BodyError::AtomicNeedsSharedMemory)
        }
    }

    fn sig(&mut self, pops: &[ValueType], pushes: &[ValueType]) -> Result<(), BodyError> {
        self.pop_types(pops)?;
        self.push_types(pushes);
        Ok(())
    }

    fn load(&mut self, opcode: Opcode, memarg: &MemArg, result: ValueType) -> Result<(), BodyError> {
        self.check_memarg(opcode, memarg)?;
        self.sig(&[ValueType::I32], &[result])
    }

    fn store(&mut self, opcode: Opcode, memarg: &MemArg, operand: ValueType) -> Result<(), BodyError> {
        self.check_memarg(opcode, memarg)?;
        self.sig(&[ValueType::I32, operand], &[])
    }

    fn atomic_rmw(
        &mut self,
        opcode: Opcode,
        memarg: &MemArg,
        ty: ValueType,
    ) -> Result<(), BodyError> {
        self.check_memarg(opcode, memarg)?;
        self.sig(&[ValueType::I32, ty], &[ty])
    }

    fn atomic_cmpxchg(
        &mut self,
        opcode: Opcode,
        memarg: &MemArg,
        ty: ValueType,
    ) -> Result<(), BodyError> {
        self.check_memarg(opcode, memarg)?;
        self.sig(&[ValueType::I32, ty, ty], &[ty])
    }

    fn lane(&mut self, lane: u8, lanes: u8) -> Result<(), BodyError> {
        if lane < lanes {
            Ok(())
        } else {
            Err(BodyError::BadLaneIndex { lane, lanes })
        }
    }

    fn step(&mut self, op: &Operator) -> Result<(), BodyError> {
        use Operator as O;
        use ValueType::*;

        if self.done {
            return Err(BodyError::TrailingOperators);
        }
        if !self.features.contains(op.opcode().feature()) {
            return Err(BodyError::FeatureDisabled);
        }

        match op {
            // Structured control.
            O::Unreachable(_) => self.set_unreachable(),
            O::Nop(_) => {}
            O::Block(imm) => {
                let (params, results) = self.block_signature(imm.ty)?;
                self.pop_types(&params)?;
                self.push_frame(FrameKind::Block, params.clone(), results);
                self.push_types(&params);
            }
            O::Loop(imm) => {
                let (params, results) = self.block_signature(imm.ty)?;
                self.pop_types(&params)?;
                self.push_frame(FrameKind::Loop, params.clone(), results);
                self.push_types(&params);
            }
            O::If(imm) => {
                let (params, results) = self.block_signature(imm.ty)?;
                self.pop_expect(I32)?;
                self.pop_types(&params)?;
                self.push_frame(FrameKind::If, params.clone(), results);
                self.push_types(&params);
            }
            O::Else(_) => {
                if self.top_frame().kind != FrameKind::If {
                    return Err(BodyError::ElseWithoutIf);
                }
                let frame = self.pop_frame()?;
                let params = frame.params.clone();
                self.push_frame(FrameKind::Else, frame.params, frame.results);
                self.push_types(&params);
            }
            O::Try(imm) => {
                let (params, results) = self.block_signature(imm.ty)?;
                self.pop_types(&params)?;
                self.push_frame(FrameKind::Try, params.clone(), results);
                self.push_types(&params);
            }
            O::Catch(imm) => {
                let tag_params = self.tag_type(imm.tag)?.params().to_vec();
                match self.top_frame().kind {
                    FrameKind::Try | FrameKind::Catch => {}
                    FrameKind::CatchAll => return Err(BodyError::CatchAfterCatchAll),
                    _ => return Err(BodyError::CatchWithoutTry { name: "catch" }),
                }
                let frame = self.pop_frame()?;
                self.push_frame(FrameKind::Catch, frame.params, frame.results);
                self.push_types(&tag_params);
            }
            O::CatchAll(_) => {
                match self.top_frame().kind {
                    FrameKind::Try | FrameKind::Catch => {}
                    FrameKind::CatchAll => return Err(BodyError::CatchAfterCatchAll),
                    _ => return Err(BodyError::CatchWithoutTry { name: "catch_all" }),
                }
                let frame = self.pop_frame()?;
                self.push_frame(FrameKind::CatchAll, frame.params, frame.results);
            }
            O::Delegate(imm) => {
                if self.top_frame().kind != FrameKind::Try {
                    return Err(BodyError::CatchWithoutTry { name: "delegate" });
                }
                let frame = self.pop_frame()?;
                // The delegate label may name any enclosing frame,
                // including the function sentinel.
                if (imm.depth as usize) >= self.frames.len() {
                    return Err(BodyError::BadBranchDepth {
                        depth: imm.depth,
                        frames: self.frames.len(),
                    });
                }
                self.push_types(&frame.results);
            }
            O::Throw(imm) => {
                let tag_params = self.tag_type(imm.tag)?.params().to_vec();
                self.pop_types(&tag_params)?;
                self.set_unreachable();
            }
            O::Rethrow(imm) => {
                if !self.frame_at(imm.depth)?.is_catch() {
                    return Err(BodyError::BadRethrowDepth { depth: imm.depth });
                }
                self.set_unreachable();
            }
            O::End(_) => {
                let frame = self.pop_frame()?;
                if frame.kind == FrameKind::If && frame.params != frame.results {
                    return Err(BodyError::IfWithoutElseTypeMismatch);
                }
                if self.frames.is_empty() {
                    self.done = true;
                    self.operands.clear();
                } else {
                    self.push_types(&frame.results);
                }
            }
            O::Br(imm) => {
                let label = self.frame_at(imm.depth)?.label_types().to_vec();
                self.pop_types(&label)?;
                self.set_unreachable();
            }
            O::BrIf(imm) => {
                self.pop_expect(I32)?;
                let label = self.frame_at(imm.depth)?.label_types().to_vec();
                self.pop_types(&label)?;
                self.push_types(&label);
            }
            O::BrTable(imm) => {
                self.pop_expect(I32)?;
                let default = self.frame_at(imm.default)?.label_types().to_vec();
                for target in imm.targets.iter() {
                    let label = self.frame_at(*target)?.label_types().to_vec();
                    if label.len() != default.len() {
                        return Err(BodyError::InconsistentBrTable);
                    }
                    self.check_stack_top(&label)?;
                }
                self.pop_types(&default)?;
                self.set_unreachable();
            }
            O::Return(_) => {
                let results = self.frames[0].results.clone();
                self.pop_types(&results)?;
                self.set_unreachable();
            }
            O::Call(imm) => {
                let ty = self.func_type(imm.func)?.clone();
                self.pop_types(ty.params())?;
                self.push_types(ty.results());
            }
            O::CallIndirect(imm) => {
                let table = self.table_type(imm.table)?;
                if table.elem != RefType::FuncRef {
                    return Err(BodyError::TypeMismatch {
                        expected: "a funcref table".into(),
                        found: table.elem.to_string(),
                    });
                }
                if imm.ty as usize >= self.module.types.len() {
                    return Err(ValidationError::TypeIndexOutOfRange {
                        index: imm.ty,
                        count: self.module.types.len(),
                    }
                    .into());
                }
                let ty = self.module.types[imm.ty as usize].clone();
                self.pop_expect(I32)?;
                self.pop_types(ty.params())?;
                self.push_types(ty.results());
            }

            // Parametric.
            O::Drop(_) => {
                self.pop_any()?;
            }
            O::Select(_) => {
                self.pop_expect(I32)?;
                let first = self.pop_any()?;
                let second = self.pop_any()?;
                let unified = match (first, second) {
                    (Operand::Any, other) | (other, Operand::Any) => other,
                    (Operand::Exact(a), Operand::Exact(b)) if a == b => Operand::Exact(a),
                    (Operand::Exact(a), Operand::Exact(b)) => {
                        return Err(BodyError::TypeMismatch {
                            expected: a.to_string(),
                            found: b.to_string(),
                        })
                    }
                };
                if let Operand::Exact(ty) = unified {
                    if ty.is_ref() {
                        return Err(BodyError::UntypedSelectOnRef {
                            found: ty.to_string(),
                        });
                    }
                }
                self.operands.push(unified);
            }
            O::SelectT(imm) => {
                let [ty] = imm.types.as_ref() else {
                    return Err(BodyError::BadSelectArity {
                        found: imm.types.len(),
                    });
                };
                self.sig(&[*ty, *ty, I32], &[*ty])?;
            }

            // Variables.
            O::LocalGet(imm) => {
                let ty = self.local_type(imm.local)?;
                self.push(ty);
            }
            O::LocalSet(imm) => {
                let ty = self.local_type(imm.local)?;
                self.pop_expect(ty)?;
            }
            O::LocalTee(imm) => {
                let ty = self.local_type(imm.local)?;
                self.pop_expect(ty)?;
                self.push(ty);
            }
            O::GlobalGet(imm) => {
                let ty = self.module.global_type(imm.global).ok_or(
                    ValidationError::IndexOutOfRange {
                        kind: ExternKind::Global,
                        index: imm.global,
                        count: self.module.global_count(),
                    },
                )?;
                self.push(ty.ty);
            }
            O::GlobalSet(imm) => {
                let ty = self.module.global_type(imm.global).ok_or(
                    ValidationError::IndexOutOfRange {
                        kind: ExternKind::Global,
                        index: imm.global,
                        count: self.module.global_count(),
                    },
                )?;
                if !ty.mutable {
                    return Err(ValidationError::GlobalNotMutable { index: imm.global }.into());
                }
                self.pop_expect(ty.ty)?;
            }

            // Tables.
            O::TableGet(imm) => {
                let table = self.table_type(imm.table)?;
                self.sig(&[I32], &[table.elem.into()])?;
            }
            O::TableSet(imm) => {
                let table = self.table_type(imm.table)?;
                self.sig(&[I32, table.elem.into()], &[])?;
            }
            O::TableGrow(imm) => {
                let table = self.table_type(imm.table)?;
                self.sig(&[table.elem.into(), I32], &[I32])?;
            }
            O::TableSize(imm) => {
                self.table_type(imm.table)?;
                self.push(I32);
            }
            O::TableFill(imm) => {
                let table = self.table_type(imm.table)?;
                self.sig(&[I32, table.elem.into(), I32], &[])?;
            }
            O::TableCopy(imm) => {
                let dst = self.table_type(imm.dst)?;
                let src = self.table_type(imm.src)?;
                if dst.elem != src.elem {
                    return Err(BodyError::TypeMismatch {
                        expected: dst.elem.to_string(),
                        found: src.elem.to_string(),
                    });
                }
                self.sig(&[I32, I32, I32], &[])?;
            }
            O::TableInit(imm) => {
                let table = self.table_type(imm.table)?;
                let elem = self.elem_segment_type(imm.elem)?;
                if table.elem != elem {
                    return Err(BodyError::TypeMismatch {
                        expected: table.elem.to_string(),
                        found: elem.to_string(),
                    });
                }
                self.sig(&[I32, I32, I32], &[])?;
            }
            O::ElemDrop(imm) => {
                self.elem_segment_type(imm.elem)?;
            }

            // Memory management.
            O::MemorySize(imm) => {
                self.memory_type(imm.memory)?;
                self.push(I32);
            }
            O::MemoryGrow(imm) => {
                self.memory_type(imm.memory)?;
                self.sig(&[I32], &[I32])?;
            }
            O::MemoryFill(imm) => {
                self.memory_type(imm.memory)?;
                self.sig(&[I32, I32, I32], &[])?;
            }
            O::MemoryCopy(imm) => {
                self.memory_type(imm.dst)?;
                self.memory_type(imm.src)?;
                self.sig(&[I32, I32, I32], &[])?;
            }
            O::MemoryInit(imm) => {
                self.memory_type(imm.memory)?;
                self.data_segment_in_range(imm.data)?;
                self.sig(&[I32, I32, I32], &[])?;
            }
            O::DataDrop(imm) => {
                self.data_segment_in_range(imm.data)?;
            }

            // Scalar loads and stores.
            O::I32Load(imm) => self.load(op.opcode(), imm, I32)?,
            O::I64Load(imm) => self.load(op.opcode(), imm, I64)?,
            O::F32Load(imm) => self.load(op.opcode(), imm, F32)?,
            O::F64Load(imm) => self.load(op.opcode(), imm, F64)?,
            O::I32Load8S(imm) | O::I32Load8U(imm) | O::I32Load16S(imm)
            | O::I32Load16U(imm) => self.load(op.opcode(), imm, I32)?,
            O::I64Load8S(imm) | O::I64Load8U(imm) | O::I64Load16S(imm)
            | O::I64Load16U(imm) | O::I64Load32S(imm) | O::I64Load32U(imm) => {
                self.load(op.opcode(), imm, I64)?
            }
            O::I32Store(imm) | O::I32Store8(imm) | O::I32Store16(imm) => {
                self.store(op.opcode(), imm, I32)?
            }
            O::I64Store(imm) | O::I64Store8(imm) | O::I64Store16(imm)
            | O::I64Store32(imm) => self.store(op.opcode(), imm, I64)?,
            O::F32Store(imm) => self.store(op.opcode(), imm, F32)?,
            O::F64Store(imm) => self.store(op.opcode(), imm, F64)?,

            // Constants.
            O::I32Const(_) => self.push(I32),
            O::I64Const(_) => self.push(I64),
            O::F32Const(_) => self.push(F32),
            O::F64Const(_) => self.push(F64),

            // Scalar comparisons and tests.
            O::I32Eqz(_) => self.sig(&[I32], &[I32])?,
            O::I64Eqz(_) => self.sig(&[I64], &[I32])?,
            O::I32Eq(_) | O::I32Ne(_) | O::I32LtS(_) | O::I32LtU(_) | O::I32GtS(_)
            | O::I32GtU(_) | O::I32LeS(_) | O::I32LeU(_) | O::I32GeS(_)
            | O::I32GeU(_) => self.sig(&[I32, I32], &[I32])?,
            O::I64Eq(_) | O::I64Ne(_) | O::I64LtS(_) | O::I64LtU(_) | O::I64GtS(_)
            | O::I64GtU(_) | O::I64LeS(_) | O::I64LeU(_) | O::I64GeS(_)
            | O::I64GeU(_) => self.sig(&[I64, I64], &[I32])?,
            O::F32Eq(_) | O::F32Ne(_) | O::F32Lt(_) | O::F32Gt(_) | O::F32Le(_)
            | O::F32Ge(_) => self.sig(&[F32, F32], &[I32])?,
            O::F64Eq(_) | O::F64Ne(_) | O::F64Lt(_) | O::F64Gt(_) | O::F64Le(_)
            | O::F64Ge(_) => self.sig(&[F64, F64], &[I32])?,

            // Scalar arithmetic.
            O::I32Clz(_) | O::I32Ctz(_) | O::I32Popcnt(_) | O::I32Extend8S(_)
            | O::I32Extend16S(_) => self.sig(&[I32], &[I32])?,
            O::I64Clz(_) | O::I64Ctz(_) | O::I64Popcnt(_) | O::I64Extend8S(_)
            | O::I64Extend16S(_) | O::I64Extend32S(_) => self.sig(&[I64], &[I64])?,
            O::I32Add(_) | O::I32Sub(_) | O::I32Mul(_) | O::I32DivS(_) | O::I32DivU(_)
            | O::I32RemS(_) | O::I32RemU(_) | O::I32And(_) | O::I32Or(_) | O::I32Xor(_)
            | O::I32Shl(_) | O::I32ShrS(_) | O::I32ShrU(_) | O::I32Rotl(_)
            | O::I32Rotr(_) => self.sig(&[I32, I32], &[I32])?,
            O::I64Add(_) | O::I64Sub(_) | O::I64Mul(_) | O::I64DivS(_) | O::I64DivU(_)
            | O::I64RemS(_) | O::I64RemU(_) | O::I64And(_) | O::I64Or(_) | O::I64Xor(_)
            | O::I64Shl(_) | O::I64ShrS(_) | O::I64ShrU(_) | O::I64Rotl(_)
            | O::I64Rotr(_) => self.sig(&[I64, I64], &[I64])?,
            O::F32Abs(_) | O::F32Neg(_) | O::F32Ceil(_) | O::F32Floor(_)
            | O::F32Trunc(_) | O::F32Nearest(_) | O::F32Sqrt(_) => {
                self.sig(&[F32], &[F32])?
            }
            O::F64Abs(_) | O::F64Neg(_) | O::F64Ceil(_) | O::F64Floor(_)
            | O::F64Trunc(_) | O::F64Nearest(_) | O::F64Sqrt(_) => {
                self.sig(&[F64], &[F64])?
            }
            O::F32Add(_) | O::F32Sub(_) | O::F32Mul(_) | O::F32Div(_) | O::F32Min(_)
            | O::F32Max(_) | O::F32Copysign(_) => self.sig(&[F32, F32], &[F32])?,
            O::F64Add(_) | O::F64Sub(_) | O::F64Mul(_) | O::F64Div(_) | O::F64Min(_)
            | O::F64Max(_) | O::F64Copysign(_) => self.sig(&[F64, F64], &[F64])?,

            // Scalar conversions.
            O::I32WrapI64(_) => self.sig(&[I64], &[I32])?,
            O::I32TruncF32S(_) | O::I32TruncF32U(_) | O::I32TruncSatF32S(_)
            | O::I32TruncSatF32U(_) | O::I32ReinterpretF32(_) => {
                self.sig(&[F32], &[I32])?
            }
            O::I32TruncF64S(_) | O::I32TruncF64U(_) | O::I32TruncSatF64S(_)
            | O::I32TruncSatF64U(_) => self.sig(&[F64], &[I32])?,
            O::I64ExtendI32S(_) | O::I64ExtendI32U(_) => self.sig(&[I32], &[I64])?,
            O::I64TruncF32S(_) | O::I64TruncF32U(_) | O::I64TruncSatF32S(_)
            | O::I64TruncSatF32U(_) => self.sig(&[F32], &[I64])?,
            O::I64TruncF64S(_) | O::I64TruncF64U(_) | O::I64TruncSatF64S(_)
            | O::I64TruncSatF64U(_) | O::I64ReinterpretF64(_) => {
                self.sig(&[F64], &[I64])?
            }
            O::F32ConvertI32S(_) | O::F32ConvertI32U(_) | O::F32ReinterpretI32(_) => {
                self.sig(&[I32], &[F32])?
            }
            O::F32ConvertI64S(_) | O::F32ConvertI64U(_) => self.sig(&[I64], &[F32])?,
            O::F32DemoteF64(_) => self.sig(&[F64], &[F32])?,
            O::F64ConvertI32S(_) | O::F64ConvertI32U(_) => self.sig(&[I32], &[F64])?,
            O::F64ConvertI64S(_) | O::F64ConvertI64U(_) | O::F64ReinterpretI64(_) => {
                self.sig(&[I64], &[F64])?
            }
            O::F64PromoteF32(_) => self.sig(&[F32], &[F64])?,

            // References.
            O::RefNull(imm) => self.push(imm.ty.into()),
            O::RefIsNull(_) => {
                self.pop_ref()?;
                self.push(I32);
            }
            O::RefFunc(imm) => {
                if self.module.func_type_index(imm.func).is_none() {
                    return Err(ValidationError::IndexOutOfRange {
                        kind: ExternKind::Func,
                        index: imm.func,
                        count: self.module.func_count(),
                    }
                    .into());
                }
                if !self.declared_funcs.contains(&imm.func) {
                    return Err(BodyError::UndeclaredFunctionReference { index: imm.func });
                }
                self.push(FuncRef);
            }

            // Vector memory access.
            O::V128Load(imm) | O::V128Load8x8S(imm) | O::V128Load8x8U(imm)
            | O::V128Load16x4S(imm) | O::V128Load16x4U(imm) | O::V128Load32x2S(imm)
            | O::V128Load32x2U(imm) | O::V128Load8Splat(imm) | O::V128Load16Splat(imm)
            | O::V128Load32Splat(imm) | O::V128Load64Splat(imm)
            | O::V128Load32Zero(imm) | O::V128Load64Zero(imm) => {
                self.load(op.opcode(), imm, V128)?
            }
            O::V128Store(imm) => self.store(op.opcode(), imm, V128)?,
            O::V128Load8Lane(imm) | O::V128Load16Lane(imm) | O::V128Load32Lane(imm)
            | O::V128Load64Lane(imm) => {
                self.lane(imm.lane, lane_count(op.opcode()))?;
                self.check_memarg(op.opcode(), &imm.memarg)?;
                self.sig(&[I32, V128], &[V128])?;
            }
            O::V128Store8Lane(imm) | O::V128Store16Lane(imm) | O::V128Store32Lane(imm)
            | O::V128Store64Lane(imm) => {
                self.lane(imm.lane, lane_count(op.opcode()))?;
                self.check_memarg(op.opcode(), &imm.memarg)?;
                self.sig(&[I32, V128], &[])?;
            }

            // Vector constants and lane shuffling.
            O::V128Const(_) => self.push(V128),
            O::I8x16Shuffle(imm) => {
                for lane in imm.lanes {
                    self.lane(lane, 32)?;
                }
                self.sig(&[V128, V128], &[V128])?;
            }
            O::I8x16Swizzle(_) => self.sig(&[V128, V128], &[V128])?,

            // Vector splats.
            O::I8x16Splat(_) | O::I16x8Splat(_) | O::I32x4Splat(_) => {
                self.sig(&[I32], &[V128])?
            }
            O::I64x2Splat(_) => self.sig(&[I64], &[V128])?,
            O::F32x4Splat(_) => self.sig(&[F32], &[V128])?,
            O::F64x2Splat(_) => self.sig(&[F64], &[V128])?,

            // Vector lane access.
            O::I8x16ExtractLaneS(imm) | O::I8x16ExtractLaneU(imm) => {
                self.lane(imm.lane, 16)?;
                self.sig(&[V128], &[I32])?;
            }
            O::I16x8ExtractLaneS(imm) | O::I16x8ExtractLaneU(imm) => {
                self.lane(imm.lane, 8)?;
                self.sig(&[V128], &[I32])?;
            }
            O::I32x4ExtractLane(imm) => {
                self.lane(imm.lane, 4)?;
                self.sig(&[V128], &[I32])?;
            }
            O::I64x2ExtractLane(imm) => {
                self.lane(imm.lane, 2)?;
                self.sig(&[V128], &[I64])?;
            }
            O::F32x4ExtractLane(imm) => {
                self.lane(imm.lane, 4)?;
                self.sig(&[V128], &[F32])?;
            }
            O::F64x2ExtractLane(imm) => {
                self.lane(imm.lane, 2)?;
                self.sig(&[V128], &[F64])?;
            }
            O::I8x16ReplaceLane(imm) => {
                self.lane(imm.lane, 16)?;
                self.sig(&[V128, I32], &[V128])?;
            }
            O::I16x8ReplaceLane(imm) => {
                self.lane(imm.lane, 8)?;
                self.sig(&[V128, I32], &[V128])?;
            }
            O::I32x4ReplaceLane(imm) => {
                self.lane(imm.lane, 4)?;
                self.sig(&[V128, I32], &[V128])?;
            }
            O::I64x2ReplaceLane(imm) => {
                self.lane(imm.lane, 2)?;
                self.sig(&[V128, I64], &[V128])?;
            }
            O::F32x4ReplaceLane(imm) => {
                self.lane(imm.lane, 4)?;
                self.sig(&[V128, F32], &[V128])?;
            }
            O::F64x2ReplaceLane(imm) => {
                self.lane(imm.lane, 2)?;
                self.sig(&[V128, F64], &[V128])?;
            }

            // Vector tests and masks.
            O::V128AnyTrue(_) | O::I8x16AllTrue(_) | O::I16x8AllTrue(_)
            | O::I32x4AllTrue(_) | O::I64x2AllTrue(_) | O::I8x16Bitmask(_)
            | O::I16x8Bitmask(_) | O::I32x4Bitmask(_) | O::I64x2Bitmask(_) => {
                self.sig(&[V128], &[I32])?
            }

            // Vector shifts.
            O::I8x16Shl(_) | O::I8x16ShrS(_) | O::I8x16ShrU(_) | O::I16x8Shl(_)
            | O::I16x8ShrS(_) | O::I16x8ShrU(_) | O::I32x4Shl(_) | O::I32x4ShrS(_)
            | O::I32x4ShrU(_) | O::I64x2Shl(_) | O::I64x2ShrS(_) | O::I64x2ShrU(_) => {
                self.sig(&[V128, I32], &[V128])?
            }

            // Vector select.
            O::V128Bitselect(_) => self.sig(&[V128, V128, V128], &[V128])?,

            // Everything else in the vector space is lanewise
            // vector-to-vector: unary or binary on v128.
            O::V128Not(_) | O::I8x16Abs(_) | O::I8x16Neg(_) | O::I8x16Popcnt(_)
            | O::I16x8Abs(_) | O::I16x8Neg(_) | O::I32x4Abs(_) | O::I32x4Neg(_)
            | O::I64x2Abs(_) | O::I64x2Neg(_) | O::F32x4Abs(_) | O::F32x4Neg(_)
            | O::F32x4Sqrt(_) | O::F32x4Ceil(_) | O::F32x4Floor(_) | O::F32x4Trunc(_)
            | O::F32x4Nearest(_) | O::F64x2Abs(_) | O::F64x2Neg(_) | O::F64x2Sqrt(_)
            | O::F64x2Ceil(_) | O::F64x2Floor(_) | O::F64x2Trunc(_)
            | O::F64x2Nearest(_) | O::I16x8ExtaddPairwiseI8x16S(_)
            | O::I16x8ExtaddPairwiseI8x16U(_) | O::I32x4ExtaddPairwiseI16x8S(_)
            | O::I32x4ExtaddPairwiseI16x8U(_) | O::I16x8ExtendLowI8x16S(_)
            | O::I16x8ExtendHighI8x16S(_) | O::I16x8ExtendLowI8x16U(_)
            | O::I16x8ExtendHighI8x16U(_) | O::I32x4ExtendLowI16x8S(_)
            | O::I32x4ExtendHighI16x8S(_) | O::I32x4ExtendLowI16x8U(_)
            | O::I32x4ExtendHighI16x8U(_) | O::I64x2ExtendLowI32x4S(_)
            | O::I64x2ExtendHighI32x4S(_) | O::I64x2ExtendLowI32x4U(_)
            | O::I64x2ExtendHighI32x4U(_) | O::F32x4DemoteF64x2Zero(_)
            | O::F64x2PromoteLowF32x4(_) | O::I32x4TruncSatF32x4S(_)
            | O::I32x4TruncSatF32x4U(_) | O::F32x4ConvertI32x4S(_)
            | O::F32x4ConvertI32x4U(_) | O::I32x4TruncSatF64x2SZero(_)
            | O::I32x4TruncSatF64x2UZero(_) | O::F64x2ConvertLowI32x4S(_)
            | O::F64x2ConvertLowI32x4U(_) => self.sig(&[V128], &[V128])?,
            O::V128And(_) | O::V128Andnot(_) | O::V128Or(_) | O::V128Xor(_)
            | O::I8x16Eq(_) | O::I8x16Ne(_) | O::I8x16LtS(_) | O::I8x16LtU(_)
            | O::I8x16GtS(_) | O::I8x16GtU(_) | O::I8x16LeS(_) | O::I8x16LeU(_)
            | O::I8x16GeS(_) | O::I8x16GeU(_) | O::I16x8Eq(_) | O::I16x8Ne(_)
            | O::I16x8LtS(_) | O::I16x8LtU(_) | O::I16x8GtS(_) | O::I16x8GtU(_)
            | O::I16x8LeS(_) | O::I16x8LeU(_) | O::I16x8GeS(_) | O::I16x8GeU(_)
            | O::I32x4Eq(_) | O::I32x4Ne(_) | O::I32x4LtS(_) | O::I32x4LtU(_)
            | O::I32x4GtS(_) | O::I32x4GtU(_) | O::I32x4LeS(_) | O::I32x4LeU(_)
            | O::I32x4GeS(_) | O::I32x4GeU(_) | O::I64x2Eq(_) | O::I64x2Ne(_)
            | O::I64x2LtS(_) | O::I64x2GtS(_) | O::I64x2LeS(_) | O::I64x2GeS(_)
            | O::F32x4Eq(_) | O::F32x4Ne(_) | O::F32x4Lt(_) | O::F32x4Gt(_)
            | O::F32x4Le(_) | O::F32x4Ge(_) | O::F64x2Eq(_) | O::F64x2Ne(_)
            | O::F64x2Lt(_) | O::F64x2Gt(_) | O::F64x2Le(_) | O::F64x2Ge(_)
            | O::I8x16NarrowI16x8S(_) | O::I8x16NarrowI16x8U(_)
            | O::I16x8NarrowI32x4S(_) | O::I16x8NarrowI32x4U(_) | O::I8x16Add(_)
            | O::I8x16AddSatS(_) | O::I8x16AddSatU(_) | O::I8x16Sub(_)
            | O::I8x16SubSatS(_) | O::I8x16SubSatU(_) | O::I8x16MinS(_)
            | O::I8x16MinU(_) | O::I8x16MaxS(_) | O::I8x16MaxU(_) | O::I8x16AvgrU(_)
            | O::I16x8Add(_) | O::I16x8AddSatS(_) | O::I16x8AddSatU(_)
            | O::I16x8Sub(_) | O::I16x8SubSatS(_) | O::I16x8SubSatU(_)
            | O::I16x8Mul(_) | O::I16x8MinS(_) | O::I16x8MinU(_) | O::I16x8MaxS(_)
            | O::I16x8MaxU(_) | O::I16x8AvgrU(_) | O::I16x8Q15mulrSatS(_)
            | O::I16x8ExtmulLowI8x16S(_) | O::I16x8ExtmulHighI8x16S(_)
            | O::I16x8ExtmulLowI8x16U(_) | O::I16x8ExtmulHighI8x16U(_)
            | O::I32x4Add(_) | O::I32x4Sub(_) | O::I32x4Mul(_) | O::I32x4MinS(_)
            | O::I32x4MinU(_) | O::I32x4MaxS(_) | O::I32x4MaxU(_)
            | O::I32x4DotI16x8S(_) | O::I32x4ExtmulLowI16x8S(_)
            | O::I32x4ExtmulHighI16x8S(_) | O::I32x4ExtmulLowI16x8U(_)
            | O::I32x4ExtmulHighI16x8U(_) | O::I64x2Add(_) | O::I64x2Sub(_)
            | O::I64x2Mul(_) | O::I64x2ExtmulLowI32x4S(_)
            | O::I64x2ExtmulHighI32x4S(_) | O::I64x2ExtmulLowI32x4U(_)
            | O::I64x2ExtmulHighI32x4U(_) | O::F32x4Add(_) | O::F32x4Sub(_)
            | O::F32x4Mul(_) | O::F32x4Div(_) | O::F32x4Min(_) | O::F32x4Max(_)
            | O::F32x4Pmin(_) | O::F32x4Pmax(_) | O::F64x2Add(_) | O::F64x2Sub(_)
            | O::F64x2Mul(_) | O::F64x2Div(_) | O::F64x2Min(_) | O::F64x2Max(_)
            | O::F64x2Pmin(_) | O::F64x2Pmax(_) => self.sig(&[V128, V128], &[V128])?,

            // Wait and notify.
            O::MemoryAtomicNotify(imm) => {
                self.check_shared_memory()?;
                self.check_memarg(op.opcode(), imm)?;
                self.sig(&[I32, I32], &[I32])?;
            }
            O::MemoryAtomicWait32(imm) => {
                self.check_shared_memory()?;
                self.check_memarg(op.opcode(), imm)?;
                self.sig(&[I32, I32, I64], &[I32])?;
            }
            O::MemoryAtomicWait64(imm) => {
                self.check_shared_memory()?;
                self.check_memarg(op.opcode(), imm)?;
                self.sig(&[I32, I64, I64], &[I32])?;
            }
            O::AtomicFence(imm) => {
                if imm.order != 0 {
                    return Err(BodyError::BadFenceOrdering);
                }
            }

            // Atomic loads and stores.
            O::I32AtomicLoad(imm) | O::I32AtomicLoad8U(imm) | O::I32AtomicLoad16U(imm) => {
                self.load(op.opcode(), imm, I32)?
            }
            O::I64AtomicLoad(imm) | O::I64AtomicLoad8U(imm) | O::I64AtomicLoad16U(imm)
            | O::I64AtomicLoad32U(imm) => self.load(op.opcode(), imm, I64)?,
            O::I32AtomicStore(imm) | O::I32AtomicStore8(imm) | O::I32AtomicStore16(imm) => {
                self.store(op.opcode(), imm, I32)?
            }
            O::I64AtomicStore(imm) | O::I64AtomicStore8(imm) | O::I64AtomicStore16(imm)
            | O::I64AtomicStore32(imm) => self.store(op.opcode(), imm, I64)?,

            // Atomic read-modify-write.
            O::I32AtomicRmwAdd(imm) | O::I32AtomicRmw8AddU(imm)
            | O::I32AtomicRmw16AddU(imm) | O::I32AtomicRmwSub(imm)
            | O::I32AtomicRmw8SubU(imm) | O::I32AtomicRmw16SubU(imm)
            | O::I32AtomicRmwAnd(imm) | O::I32AtomicRmw8AndU(imm)
            | O::I32AtomicRmw16AndU(imm) | O::I32AtomicRmwOr(imm)
            | O::I32AtomicRmw8OrU(imm) | O::I32AtomicRmw16OrU(imm)
            | O::I32AtomicRmwXor(imm) | O::I32AtomicRmw8XorU(imm)
            | O::I32AtomicRmw16XorU(imm) | O::I32AtomicRmwXchg(imm)
            | O::I32AtomicRmw8XchgU(imm) | O::I32AtomicRmw16XchgU(imm) => {
                self.atomic_rmw(op.opcode(), imm, I32)?
            }
            O::I64AtomicRmwAdd(imm) | O::I64AtomicRmw8AddU(imm)
            | O::I64AtomicRmw16AddU(imm) | O::I64AtomicRmw32AddU(imm)
            | O::I64AtomicRmwSub(imm) | O::I64AtomicRmw8SubU(imm)
            | O::I64AtomicRmw16SubU(imm) | O::I64AtomicRmw32SubU(imm)
            | O::I64AtomicRmwAnd(imm) | O::I64AtomicRmw8AndU(imm)
            | O::I64AtomicRmw16AndU(imm) | O::I64AtomicRmw32AndU(imm)
            | O::I64AtomicRmwOr(imm) | O::I64AtomicRmw8OrU(imm)
            | O::I64AtomicRmw16OrU(imm) | O::I64AtomicRmw32OrU(imm)
            | O::I64AtomicRmwXor(imm) | O::I64AtomicRmw8XorU(imm)
            | O::I64AtomicRmw16XorU(imm) | O::I64AtomicRmw32XorU(imm)
            | O::I64AtomicRmwXchg(imm) | O::I64AtomicRmw8XchgU(imm)
            | O::I64AtomicRmw16XchgU(imm) | O::I64AtomicRmw32XchgU(imm) => {
                self.atomic_rmw(op.opcode(), imm, I64)?
            }
            O::I32AtomicRmwCmpxchg(imm) | O::I32AtomicRmw8CmpxchgU(imm)
            | O::I32AtomicRmw16CmpxchgU(imm) => {
                self.atomic_cmpxchg(op.opcode(), imm, I32)?
            }
            O::I64AtomicRmwCmpxchg(imm) | O::I64AtomicRmw8CmpxchgU(imm)
            | O::I64AtomicRmw16CmpxchgU(imm) | O::I64AtomicRmw32CmpxchgU(imm) => {
                self.atomic_cmpxchg(op.opcode(), imm, I64)?
            }
        }

        Ok(())
    }
}

/// Lane count of a lane-indexed vector memory access.
fn lane_count(opcode: Opcode) -> u8 {
    match opcode {
        Opcode::V128Load8Lane | Opcode::V128Store8Lane => 16,
        Opcode::V128Load16Lane | Opcode::V128Store16Lane => 8,
        Opcode::V128Load32Lane | Opcode::V128Store32Lane => 4,
        Opcode::V128Load64Lane | Opcode::V128Store64Lane => 2,
        _ => unreachable!("not a lane access"),
    }
}

#[cfg(test)]
mod tests {
    use keel_ops::{
        BlockTypeImm,
        BranchImm,
        FuncImm,
        I32Imm,
        I64Imm,
        LocalImm,
        MemoryImm,
        NoImm,
        Operator as O,
        RefTypeImm,
        TagImm,
    };
    use keel_types::InternedFuncType;

    use super::*;
    use crate::{
        module::FunctionBody,
        validate_module,
        Module,
    };

    /// A module with one function of the given type whose body is `ops`
    /// plus the closing `end`.
    fn module_with_body(
        params: &[ValueType],
        results: &[ValueType],
        mut ops: Vec<O>,
    ) -> Module {
        ops.push(O::End(NoImm));
        let mut module = Module::default();
        module.types.push(InternedFuncType::from_parts(params, results));
        module.functions.push(0);
        module.code.push(FunctionBody {
            locals: vec![],
            offsets: (0..ops.len() as u32).collect(),
            ops,
        });
        module
    }

    fn validate(module: &Module) -> Result<(), ValidationError> {
        validate_module(module, FeatureSet::standard()).map(|_| ())
    }

    #[test]
    fn identity_body_validates() {
        let module = module_with_body(
            &[ValueType::I32],
            &[ValueType::I32],
            vec![O::LocalGet(LocalImm { local: 0 })],
        );
        assert!(validate(&module).is_ok());
    }

    #[test]
    fn result_type_mismatch_is_reported_with_context() {
        let module = module_with_body(
            &[],
            &[ValueType::I32],
            vec![O::I64Const(I64Imm { value: 0 })],
        );
        let err = validate(&module).unwrap_err();
        assert!(matches!(
            err,
            ValidationError::Body {
                func: 0,
                name: "end",
                reason: BodyError::TypeMismatch { .. },
                ..
            }
        ));
    }

    #[test]
    fn underflow_is_rejected_when_reachable() {
        let module = module_with_body(&[], &[], vec![O::Drop(NoImm)]);
        assert!(matches!(
            validate(&module).unwrap_err(),
            ValidationError::Body {
                reason: BodyError::StackUnderflow { .. },
                ..
            }
        ));
    }

    #[test]
    fn pops_after_unreachable_are_polymorphic() {
        // unreachable; i32.add; drop -- all fine in dead code.
        let module = module_with_body(
            &[],
            &[],
            vec![O::Unreachable(NoImm), O::I32Add(NoImm), O::Drop(NoImm)],
        );
        assert!(validate(&module).is_ok());
    }

    #[test]
    fn values_pushed_in_dead_code_persist_until_end() {
        // A concrete value pushed after unreachable still counts against
        // the frame: it satisfies a declared result...
        let producing = module_with_body(
            &[],
            &[ValueType::I32],
            vec![O::Unreachable(NoImm), O::I32Const(I32Imm { value: 1 })],
        );
        assert!(validate(&producing).is_ok());

        // ...and is surplus when the frame declares none.
        let surplus = module_with_body(
            &[],
            &[],
            vec![O::Unreachable(NoImm), O::I32Const(I32Imm { value: 1 })],
        );
        assert!(matches!(
            validate(&surplus).unwrap_err(),
            ValidationError::Body {
                reason: BodyError::FrameHeightMismatch { found: 1 },
                ..
            }
        ));
    }

    #[test]
    fn branching_to_the_function_frame_acts_as_return() {
        let module = module_with_body(
            &[],
            &[],
            vec![
                O::Block(BlockTypeImm { ty: BlockType::Empty }),
                O::Br(BranchImm { depth: 1 }),
                O::End(NoImm),
            ],
        );
        assert!(validate(&module).is_ok());
    }

    #[test]
    fn branch_depth_is_bounded() {
        let module = module_with_body(&[], &[], vec![O::Br(BranchImm { depth: 2 })]);
        assert!(matches!(
            validate(&module).unwrap_err(),
            ValidationError::Body {
                reason: BodyError::BadBranchDepth { depth: 2, .. },
                ..
            }
        ));
    }

    #[test]
    fn if_without_else_must_be_type_neutral() {
        let module = module_with_body(
            &[],
            &[],
            vec![
                O::I32Const(I32Imm { value: 1 }),
                O::If(BlockTypeImm {
                    ty: BlockType::Value(ValueType::I32),
                }),
                O::I32Const(I32Imm { value: 2 }),
                O::End(NoImm),
                O::Drop(NoImm),
            ],
        );
        assert!(matches!(
            validate(&module).unwrap_err(),
            ValidationError::Body {
                reason: BodyError::IfWithoutElseTypeMismatch,
                ..
            }
        ));
    }

    #[test]
    fn legacy_select_rejects_references() {
        let module = module_with_body(
            &[],
            &[],
            vec![
                O::RefNull(RefTypeImm {
                    ty: keel_types::RefType::ExternRef,
                }),
                O::RefNull(RefTypeImm {
                    ty: keel_types::RefType::ExternRef,
                }),
                O::I32Const(I32Imm { value: 0 }),
                O::Select(NoImm),
                O::Drop(NoImm),
            ],
        );
        assert!(matches!(
            validate(&module).unwrap_err(),
            ValidationError::Body {
                reason: BodyError::UntypedSelectOnRef { .. },
                ..
            }
        ));
    }

    #[test]
    fn over_aligned_access_is_rejected() {
        let mut module = module_with_body(
            &[],
            &[],
            vec![
                O::I32Const(I32Imm { value: 0 }),
                O::I32Load(MemArg {
                    align_log2: 3,
                    offset: 0,
                }),
                O::Drop(NoImm),
            ],
        );
        module.memories.push(keel_types::MemoryType {
            limits: keel_types::Limits { min: 1, max: None },
            shared: false,
        });
        assert!(matches!(
            validate(&module).unwrap_err(),
            ValidationError::Body {
                reason: BodyError::AlignmentTooLarge { align: 3, natural: 2 },
                ..
            }
        ));
    }

    #[test]
    fn memory_operators_require_a_memory() {
        let module = module_with_body(
            &[],
            &[],
            vec![O::MemorySize(MemoryImm { memory: 0 }), O::Drop(NoImm)],
        );
        assert!(matches!(
            validate(&module).unwrap_err(),
            ValidationError::Body {
                reason: BodyError::Module(_),
                ..
            }
        ));
    }

    #[test]
    fn atomic_wait_requires_a_shared_memory() {
        let mut module = module_with_body(
            &[],
            &[],
            vec![
                O::I32Const(I32Imm { value: 0 }),
                O::I32Const(I32Imm { value: 0 }),
                O::I64Const(I64Imm { value: -1 }),
                O::MemoryAtomicWait32(MemArg {
                    align_log2: 2,
                    offset: 0,
                }),
                O::Drop(NoImm),
            ],
        );
        module.memories.push(keel_types::MemoryType {
            limits: keel_types::Limits { min: 1, max: Some(1) },
            shared: false,
        });
        assert!(matches!(
            validate(&module).unwrap_err(),
            ValidationError::Body {
                reason: BodyError::AtomicNeedsSharedMemory,
                ..
            }
        ));
    }

    #[test]
    fn atomic_alignment_must_be_exact() {
        let mut module = module_with_body(
            &[],
            &[],
            vec![
                O::I32Const(I32Imm { value: 0 }),
                O::I32AtomicLoad(MemArg {
                    align_log2: 0,
                    offset: 0,
                }),
                O::Drop(NoImm),
            ],
        );
        module.memories.push(keel_types::MemoryType {
            limits: keel_types::Limits { min: 1, max: Some(1) },
            shared: true,
        });
        assert!(matches!(
            validate(&module).unwrap_err(),
            ValidationError::Body {
                reason: BodyError::AtomicAlignmentNotNatural { align: 0, natural: 2 },
                ..
            }
        ));
    }

    #[test]
    fn ref_func_requires_a_declaration() {
        let mut module = module_with_body(
            &[],
            &[],
            vec![O::RefFunc(FuncImm { func: 0 }), O::Drop(NoImm)],
        );
        assert!(matches!(
            validate(&module).unwrap_err(),
            ValidationError::Body {
                reason: BodyError::UndeclaredFunctionReference { index: 0 },
                ..
            }
        ));
        // Declaring it through an element segment makes the same body
        // valid.
        module.elems.push(crate::module::ElemSegment {
            kind: crate::module::ElemKind::Declared,
            ty: keel_types::RefType::FuncRef,
            items: crate::module::ElemItems::Funcs(vec![0]),
        });
        assert!(validate(&module).is_ok());
    }

    #[test]
    fn rethrow_must_name_a_catch() {
        let mut module = module_with_body(
            &[],
            &[],
            vec![
                O::Try(BlockTypeImm { ty: BlockType::Empty }),
                O::Rethrow(BranchImm { depth: 0 }),
                O::End(NoImm),
            ],
        );
        module.types.push(InternedFuncType::from_parts(&[], &[]));
        assert!(matches!(
            validate(&module).unwrap_err(),
            ValidationError::Body {
                reason: BodyError::BadRethrowDepth { depth: 0 },
                ..
            }
        ));
    }

    #[test]
    fn catch_pushes_the_tag_parameters() {
        let mut module = module_with_body(
            &[],
            &[],
            vec![
                O::Try(BlockTypeImm { ty: BlockType::Empty }),
                O::Catch(TagImm { tag: 0 }),
                O::Drop(NoImm),
                O::End(NoImm),
            ],
        );
        // Tag of type [i32] -> [].
        module
            .types
            .push(InternedFuncType::from_parts(&[ValueType::I32], &[]));
        module.tags.push(1);
        assert!(validate(&module).is_ok());
    }

    #[test]
    fn function_must_close_every_frame() {
        let module = module_with_body(
            &[],
            &[],
            vec![O::Block(BlockTypeImm { ty: BlockType::Empty })],
        );
        assert!(matches!(
            validate(&module).unwrap_err(),
            ValidationError::Body {
                reason: BodyError::UnclosedFrames { .. },
                ..
            }
        ));
    }
}
