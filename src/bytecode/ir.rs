use crate::bytecode::Action;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Reserved label token for the program root. Appears on the wire without a
/// `kind:name` pair.
pub const PROGRAM_MARKER: &str = "Program";

/// Index of an `InstructionSequence` inside `DecodedProgram::sequences`.
///
/// The label and block tables store indices rather than references so the
/// sequences stay exclusively owned by the output vector.
pub type SeqId = usize;

/// One resolved operand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Param {
    /// Integer literal, or a resolved jump-target line for branch operations.
    Int(i64),
    /// Opaque token: identifiers, symbolic operands, string literals.
    Str(String),
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Param::Int(n) => write!(f, "{}", n),
            Param::Str(s) => write!(f, "{:?}", s),
        }
    }
}

/// One decoded operation, ready for execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instruction {
    /// Source line number from the listing.
    pub line: i64,
    pub action: Action,
    pub params: Vec<Param>,
}

/// What an `InstructionSequence` represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LabelKind {
    Program,
    Def,
    DefClass,
    Block,
}

impl LabelKind {
    pub fn from_wire(s: &str) -> Option<LabelKind> {
        match s {
            "Program" => Some(LabelKind::Program),
            "Def" => Some(LabelKind::Def),
            "DefClass" => Some(LabelKind::DefClass),
            "Block" => Some(LabelKind::Block),
            _ => None,
        }
    }

    pub fn as_wire(&self) -> &'static str {
        match self {
            LabelKind::Program => "Program",
            LabelKind::Def => "Def",
            LabelKind::DefClass => "DefClass",
            LabelKind::Block => "Block",
        }
    }
}

/// Label attached to a sequence at creation time, never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Label {
    pub kind: LabelKind,
    pub name: String,
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind.as_wire(), self.name)
    }
}

/// An ordered run of instructions for one program unit: the top-level
/// program, a method body, a class body, or a block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstructionSequence {
    /// Originating file of the listing.
    pub filename: String,

    /// `None` only for the program-root sequence.
    pub label: Option<Label>,

    pub instructions: Vec<Instruction>,
}

impl InstructionSequence {
    pub fn new(filename: &str) -> Self {
        Self {
            filename: filename.to_string(),
            label: None,
            instructions: Vec::new(),
        }
    }
}

/// Everything a decode run produces: the sequences in encounter order plus
/// the lookup tables the execution engine uses to find entry points by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodedProgram {
    pub sequences: Vec<InstructionSequence>,

    /// (kind, name) -> defining sequences, encounter order. Keyed for
    /// exactly `Def` and `DefClass`; a name may define more than once.
    pub label_table: HashMap<LabelKind, HashMap<String, Vec<SeqId>>>,

    /// Block name -> its sequence. Last definition wins.
    pub block_table: HashMap<String, SeqId>,

    /// The program-root sequence, if a Program section was present.
    pub program: Option<SeqId>,
}

impl DecodedProgram {
    /// Entry sequence of the top-level program.
    pub fn program(&self) -> Option<&InstructionSequence> {
        self.program.map(|id| &self.sequences[id])
    }

    /// All defining sequences for a method name, encounter order.
    pub fn methods(&self, name: &str) -> Vec<&InstructionSequence> {
        self.labelled(LabelKind::Def, name)
    }

    /// All defining sequences for a class-body name, encounter order.
    pub fn class_bodies(&self, name: &str) -> Vec<&InstructionSequence> {
        self.labelled(LabelKind::DefClass, name)
    }

    /// The most recent definition of a block, if any.
    pub fn block(&self, name: &str) -> Option<&InstructionSequence> {
        self.block_table.get(name).map(|&id| &self.sequences[id])
    }

    fn labelled(&self, kind: LabelKind, name: &str) -> Vec<&InstructionSequence> {
        self.label_table
            .get(&kind)
            .and_then(|names| names.get(name))
            .map(|ids| ids.iter().map(|&id| &self.sequences[id]).collect())
            .unwrap_or_default()
    }
}
