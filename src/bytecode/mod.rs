pub mod action;
pub mod decode;
pub mod decode_error;
pub mod disasm;
pub mod ir;
pub mod record;

pub use action::Action;
pub use decode::Decoder;
pub use decode_error::DecodeError;
pub use ir::{DecodedProgram, Instruction, InstructionSequence, Label, LabelKind, Param, SeqId};
