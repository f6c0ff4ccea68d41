use crate::ir::{
    BinaryOp, BlockId, CompareOp, ConstValue, ConvertOp, FuncSignature, MemAccess, NumKind, Slot,
    UnaryOp,
};

/// One native statement over typed slots.
///
/// A function is a flat list of these, split into basic blocks by
/// [`Stmt::Label`]. Every block ends with exactly one terminator.
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Label(BlockId),

    Const {
        dest: Slot,
        value: ConstValue,
    },
    LocalGet {
        dest: Slot,
        local: u32,
    },
    LocalSet {
        local: u32,
        src: Slot,
    },
    GlobalGet {
        dest: Slot,
        global: u32,
    },
    GlobalSet {
        global: u32,
        src: Slot,
    },
    /// Copy into a merge slot or temporary.
    Move {
        dest: Slot,
        src: Slot,
    },
    Unary {
        dest: Slot,
        kind: NumKind,
        op: UnaryOp,
        src: Slot,
    },
    Binary {
        dest: Slot,
        kind: NumKind,
        op: BinaryOp,
        lhs: Slot,
        rhs: Slot,
    },
    Compare {
        dest: Slot,
        kind: NumKind,
        op: CompareOp,
        lhs: Slot,
        rhs: Slot,
    },
    Convert {
        dest: Slot,
        op: ConvertOp,
        from: NumKind,
        to: NumKind,
        src: Slot,
    },
    Select {
        dest: Slot,
        cond: Slot,
        if_true: Slot,
        if_false: Slot,
    },

    Load {
        dest: Slot,
        kind: NumKind,
        access: MemAccess,
        addr: Slot,
    },
    Store {
        kind: NumKind,
        access: MemAccess,
        addr: Slot,
        value: Slot,
    },
    MemorySize {
        dest: Slot,
    },
    MemoryGrow {
        dest: Slot,
        delta: Slot,
    },
    MemoryCopy {
        dst: Slot,
        src: Slot,
        len: Slot,
    },
    MemoryFill {
        dst: Slot,
        value: Slot,
        len: Slot,
    },

    /// Call of a function defined in the module.
    Call {
        dest: Option<Slot>,
        func: u32,
        args: Vec<Slot>,
    },
    /// Call of an imported function (index into the function index space).
    CallImport {
        dest: Option<Slot>,
        func: u32,
        args: Vec<Slot>,
    },
    CallIndirect {
        dest: Option<Slot>,
        type_index: u32,
        index: Slot,
        args: Vec<Slot>,
    },

    /// An operator the translator does not lower, by name.
    Passthrough(String),

    Jump(BlockId),
    BranchIf {
        cond: Slot,
        then_block: BlockId,
        else_block: BlockId,
    },
    /// `targets[index]`, or `default` when out of range.
    BranchTable {
        index: Slot,
        targets: Vec<BlockId>,
        default: BlockId,
    },
    Return(Option<Slot>),
    /// `unreachable`, or a missing return value.
    Trap,
}

impl Stmt {
    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            Stmt::Jump(_)
                | Stmt::BranchIf { .. }
                | Stmt::BranchTable { .. }
                | Stmt::Return(_)
                | Stmt::Trap
        )
    }

    /// Blocks this terminator may transfer control to.
    pub fn successors(&self) -> Vec<BlockId> {
        match self {
            Stmt::Jump(target) => vec![*target],
            Stmt::BranchIf {
                then_block,
                else_block,
                ..
            } => vec![*then_block, *else_block],
            Stmt::BranchTable {
                targets, default, ..
            } => targets.iter().chain(Some(default)).copied().collect(),
            _ => Vec::new(),
        }
    }
}

/// Result of translating one function body.
#[derive(Debug, Clone)]
pub struct TranslatedFunction {
    /// Index in the module's function index space.
    pub index: u32,
    pub signature: FuncSignature,
    /// Declared locals, after the parameters.
    pub locals: Vec<NumKind>,
    /// Kind of every slot, indexed by slot number.
    pub slot_kinds: Vec<NumKind>,
    pub statements: Vec<Stmt>,
    /// Slot returned when control falls off the end of the body.
    pub result: Option<Slot>,
}

impl TranslatedFunction {
    pub fn params(&self) -> &[NumKind] {
        &self.signature.params
    }

    pub fn return_kind(&self) -> Option<NumKind> {
        self.signature.return_kind()
    }

    pub fn block_count(&self) -> usize {
        self.statements
            .iter()
            .filter(|s| matches!(s, Stmt::Label(_)))
            .count()
    }

    /// Whether any statement is a passthrough marker.
    pub fn is_partial(&self) -> bool {
        self.statements
            .iter()
            .any(|s| matches!(s, Stmt::Passthrough(_)))
    }
}
