//! Structured-control side tables.
//!
//! Built once per function from the validated operator stream: for every
//! block-opening operator, the index of its matching `end`, the `else` of
//! an `if`, the catch clauses of a `try`, and the block's parameter and
//! result arities. The executor drives every branch through this table
//! instead of re-scanning the stream.

use keel_ops::{
    BlockType,
    Operator,
};
use keel_types::InternedFuncType;

/// One catch clause of a `try`, in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CatchClause {
    /// `catch` with a tag: the handler starts after `op`.
    Tag {
        /// Module-level tag index.
        tag_index: u32,
        /// Operator index of the `catch`.
        op: u32,
    },
    /// `catch_all`: the handler starts after `op`.
    All {
        /// Operator index of the `catch_all`.
        op: u32,
    },
    /// `delegate`: forward to the frame `depth` levels out.
    Delegate {
        /// Relative depth from the try's parent frame.
        depth: u32,
    },
}

/// Metadata of one block-opening operator.
#[derive(Debug, Clone, Default)]
pub(crate) struct BlockMeta {
    /// Index of the matching `end` (or the terminating `delegate`).
    pub(crate) end: u32,
    /// Index of the `else`, for an `if` that has one.
    pub(crate) else_: Option<u32>,
    /// Catch clauses, for a `try`.
    pub(crate) catches: Vec<CatchClause>,
    /// Parameter count of the block type.
    pub(crate) param_count: u16,
    /// Result count of the block type.
    pub(crate) result_count: u16,
}

/// Side table of one function: metadata slots parallel to the operator
/// stream, populated at block-opening indices.
#[derive(Debug, Default)]
pub(crate) struct SideTable {
    entries: Vec<Option<BlockMeta>>,
}

impl SideTable {
    /// The metadata of the block opened at `op_index`.
    pub(crate) fn block(&self, op_index: usize) -> &BlockMeta {
        self.entries[op_index]
            .as_ref()
            .expect("side table queried at a non-block operator")
    }

    /// Build the table for a validated operator stream.
    ///
    /// `block_arity` resolves a block type to `(params, results)` counts;
    /// the module's type table backs it.
    pub(crate) fn build(
        ops: &[Operator],
        block_arity: impl Fn(BlockType) -> (u16, u16),
    ) -> SideTable {
        let mut entries: Vec<Option<BlockMeta>> = vec![None; ops.len()];
        // Indices of currently open block operators.
        let mut open: Vec<u32> = Vec::new();

        for (index, op) in ops.iter().enumerate() {
            let index = index as u32;
            match op {
                Operator::Block(imm)
                | Operator::Loop(imm)
                | Operator::If(imm)
                | Operator::Try(imm) => {
                    let (param_count, result_count) = block_arity(imm.ty);
                    entries[index as usize] = Some(BlockMeta {
                        end: 0,
                        else_: None,
                        catches: Vec::new(),
                        param_count,
                        result_count,
                    });
                    open.push(index);
                }
                Operator::Else(_) => {
                    let owner = *open.last().expect("validated stream");
                    entries[owner as usize]
                        .as_mut()
                        .expect("owner is a block operator")
                        .else_ = Some(index);
                }
                Operator::Catch(imm) => {
                    let owner = *open.last().expect("validated stream");
                    entries[owner as usize]
                        .as_mut()
                        .expect("owner is a block operator")
                        .catches
                        .push(CatchClause::Tag {
                            tag_index: imm.tag,
                            op: index,
                        });
                }
                Operator::CatchAll(_) => {
                    let owner = *open.last().expect("validated stream");
                    entries[owner as usize]
                        .as_mut()
                        .expect("owner is a block operator")
                        .catches
                        .push(CatchClause::All { op: index });
                }
                Operator::Delegate(imm) => {
                    // Terminates the try like an end, forwarding instead
                    // of catching.
                    let owner = open.pop().expect("validated stream");
                    let meta = entries[owner as usize]
                        .as_mut()
                        .expect("owner is a block operator");
                    meta.catches.push(CatchClause::Delegate { depth: imm.depth });
                    meta.end = index;
                }
                Operator::End(_) => {
                    // The function's own end has no owner on the stack.
                    if let Some(owner) = open.pop() {
                        entries[owner as usize]
                            .as_mut()
                            .expect("owner is a block operator")
                            .end = index;
                    }
                }
                _ => {}
            }
        }
        SideTable { entries }
    }
}

/// Resolve a block type's arity against a module type table.
pub(crate) fn arity_resolver(
    types: &[InternedFuncType],
) -> impl Fn(BlockType) -> (u16, u16) + '_ {
    move |ty| match ty {
        BlockType::Empty => (0, 0),
        BlockType::Value(_) => (0, 1),
        BlockType::Func(index) => {
            let ty = &types[index as usize];
            (ty.params().len() as u16, ty.results().len() as u16)
        }
    }
}

#[cfg(test)]
mod tests {
    use keel_ops::{
        BlockTypeImm,
        BranchImm,
        NoImm,
        TagImm,
    };

    use super::*;

    fn block(ty: BlockType) -> Operator {
        Operator::Block(BlockTypeImm { ty })
    }

    #[test]
    fn ends_match_their_openers() {
        use Operator as O;
        let ops = vec![
            block(BlockType::Empty),         // 0
            block(BlockType::Empty),         // 1
            O::End(NoImm),                   // 2
            O::End(NoImm),                   // 3
            O::End(NoImm),                   // 4 (function end)
        ];
        let table = SideTable::build(&ops, |_| (0, 0));
        assert_eq!(table.block(0).end, 3);
        assert_eq!(table.block(1).end, 2);
    }

    #[test]
    fn if_records_its_else() {
        use Operator as O;
        let ops = vec![
            O::If(BlockTypeImm {
                ty: BlockType::Empty,
            }),                              // 0
            O::Nop(NoImm),                   // 1
            O::Else(NoImm),                  // 2
            O::Nop(NoImm),                   // 3
            O::End(NoImm),                   // 4
            O::End(NoImm),                   // 5
        ];
        let table = SideTable::build(&ops, |_| (0, 0));
        assert_eq!(table.block(0).else_, Some(2));
        assert_eq!(table.block(0).end, 4);
    }

    #[test]
    fn try_collects_catches_in_order() {
        use Operator as O;
        let ops = vec![
            O::Try(BlockTypeImm {
                ty: BlockType::Empty,
            }),                              // 0
            O::Catch(TagImm { tag: 3 }),     // 1
            O::CatchAll(NoImm),              // 2
            O::End(NoImm),                   // 3
            O::End(NoImm),                   // 4
        ];
        let table = SideTable::build(&ops, |_| (0, 0));
        assert_eq!(table.block(0).catches, vec![
            CatchClause::Tag { tag_index: 3, op: 1 },
            CatchClause::All { op: 2 },
        ]);
    }

    #[test]
    fn delegate_terminates_the_try() {
        use Operator as O;
        let ops = vec![
            O::Try(BlockTypeImm {
                ty: BlockType::Empty,
            }),                              // 0
            O::Delegate(BranchImm { depth: 0 }), // 1
            O::End(NoImm),                   // 2
        ];
        let table = SideTable::build(&ops, |_| (0, 0));
        assert_eq!(table.block(0).end, 1);
        assert_eq!(table.block(0).catches, vec![CatchClause::Delegate { depth: 0 }]);
    }
}
