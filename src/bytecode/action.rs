use serde::{Deserialize, Serialize};

// =============================================================================
// ACTION - The fixed operation table
// =============================================================================

/// Handle into the runtime's fixed operation table.
///
/// The table is the `lookup` match below: populated once at compile time,
/// read-only during decoding. The decoder never inspects an action beyond
/// the two groups that change operand handling (`is_branch`,
/// `is_put_string`); everything else is opaque to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    // variables & constants
    GetLocal,
    SetLocal,
    GetConstant,
    SetConstant,
    GetInstanceVariable,
    SetInstanceVariable,

    // literals
    PutBoolean,
    PutString,
    PutSelf,
    PutObject,
    PutNull,

    // composite values
    NewArray,
    ExpandArray,
    NewHash,
    NewRange,

    // control transfer (single operand: resolved target line)
    BranchUnless,
    BranchIf,
    Jump,

    // definitions
    DefMethod,
    DefSingletonMethod,
    DefClass,

    // calls & frame control
    Send,
    InvokeBlock,
    Pop,
    Leave,
}

impl Action {
    /// Look an operation name up in the fixed table.
    /// `None` means the listing names an operation this runtime does not have.
    pub fn lookup(name: &str) -> Option<Action> {
        let action = match name {
            "getlocal" => Action::GetLocal,
            "setlocal" => Action::SetLocal,
            "getconstant" => Action::GetConstant,
            "setconstant" => Action::SetConstant,
            "getinstancevariable" => Action::GetInstanceVariable,
            "setinstancevariable" => Action::SetInstanceVariable,
            "putboolean" => Action::PutBoolean,
            "putstring" => Action::PutString,
            "putself" => Action::PutSelf,
            "putobject" => Action::PutObject,
            "putnull" => Action::PutNull,
            "newarray" => Action::NewArray,
            "expand_array" => Action::ExpandArray,
            "newhash" => Action::NewHash,
            "newrange" => Action::NewRange,
            "branchunless" => Action::BranchUnless,
            "branchif" => Action::BranchIf,
            "jump" => Action::Jump,
            "def_method" => Action::DefMethod,
            "def_singleton_method" => Action::DefSingletonMethod,
            "def_class" => Action::DefClass,
            "send" => Action::Send,
            "invokeblock" => Action::InvokeBlock,
            "pop" => Action::Pop,
            "leave" => Action::Leave,
            _ => return None,
        };

        Some(action)
    }

    /// Wire name of the operation, for disassembly.
    pub fn name(&self) -> &'static str {
        match self {
            Action::GetLocal => "getlocal",
            Action::SetLocal => "setlocal",
            Action::GetConstant => "getconstant",
            Action::SetConstant => "setconstant",
            Action::GetInstanceVariable => "getinstancevariable",
            Action::SetInstanceVariable => "setinstancevariable",
            Action::PutBoolean => "putboolean",
            Action::PutString => "putstring",
            Action::PutSelf => "putself",
            Action::PutObject => "putobject",
            Action::PutNull => "putnull",
            Action::NewArray => "newarray",
            Action::ExpandArray => "expand_array",
            Action::NewHash => "newhash",
            Action::NewRange => "newrange",
            Action::BranchUnless => "branchunless",
            Action::BranchIf => "branchif",
            Action::Jump => "jump",
            Action::DefMethod => "def_method",
            Action::DefSingletonMethod => "def_singleton_method",
            Action::DefClass => "def_class",
            Action::Send => "send",
            Action::InvokeBlock => "invokeblock",
            Action::Pop => "pop",
            Action::Leave => "leave",
        }
    }

    /// Control-transfer operations take a single resolved target line.
    pub fn is_branch(&self) -> bool {
        matches!(self, Action::BranchUnless | Action::BranchIf | Action::Jump)
    }

    /// The one operation whose operand is a quoted string literal.
    pub fn is_put_string(&self) -> bool {
        matches!(self, Action::PutString)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_known_operations() {
        assert_eq!(Action::lookup("putstring"), Some(Action::PutString));
        assert_eq!(Action::lookup("branchif"), Some(Action::BranchIf));
        assert_eq!(Action::lookup("leave"), Some(Action::Leave));
        assert_eq!(Action::lookup("def_method"), Some(Action::DefMethod));
    }

    #[test]
    fn test_lookup_unknown_operation() {
        assert_eq!(Action::lookup("frobnicate"), None);
        assert_eq!(Action::lookup(""), None);
        assert_eq!(Action::lookup("PUTSTRING"), None); // names are case-sensitive
    }

    #[test]
    fn test_name_inverts_lookup() {
        for name in ["putstring", "branchunless", "send", "expand_array", "pop"] {
            let action = Action::lookup(name).unwrap();
            assert_eq!(action.name(), name);
        }
    }

    #[test]
    fn test_branch_group() {
        assert!(Action::BranchIf.is_branch());
        assert!(Action::BranchUnless.is_branch());
        assert!(Action::Jump.is_branch());
        assert!(!Action::Send.is_branch());
        assert!(!Action::Leave.is_branch());
    }

    #[test]
    fn test_put_string_group() {
        assert!(Action::PutString.is_put_string());
        assert!(!Action::PutObject.is_put_string());
    }
}
