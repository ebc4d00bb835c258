/// Decode failures that void the whole run.
///
/// All three variants are fatal for the decode they occur in: the textual
/// entry point surfaces them as a single `Err` with no partial output, the
/// structured entry point aborts (its producer is trusted, so hitting one of
/// these there is a bug upstream). Anything not representable here — a
/// truncated instruction line, a `putstring` with no quoted text — is a
/// malformed listing and panics instead of being reported.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodeError {
    /// Label token missing the `kind:name` separator, or naming a kind the
    /// decoder does not recognize.
    MalformedLabel { token: String },

    /// Operation name absent from the fixed action table.
    UnknownOperation { name: String, line: i64 },

    /// Control-transfer operand that cannot be mapped to a target line.
    UnresolvedTarget { operand: String, line: i64 },
}

impl DecodeError {
    pub fn malformed_label(token: impl Into<String>) -> Self {
        DecodeError::MalformedLabel {
            token: token.into(),
        }
    }

    pub fn unknown_operation(name: impl Into<String>, line: i64) -> Self {
        DecodeError::UnknownOperation {
            name: name.into(),
            line,
        }
    }

    pub fn unresolved_target(operand: impl Into<String>, line: i64) -> Self {
        DecodeError::UnresolvedTarget {
            operand: operand.into(),
            line,
        }
    }
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecodeError::MalformedLabel { token } => {
                write!(f, "decode error: malformed label '{}'", token)
            }
            DecodeError::UnknownOperation { name, line } => {
                write!(f, "decode error: unknown operation '{}' (line {})", name, line)
            }
            DecodeError::UnresolvedTarget { operand, line } => {
                write!(
                    f,
                    "decode error: cannot resolve jump target '{}' (line {})",
                    operand, line
                )
            }
        }
    }
}

impl std::error::Error for DecodeError {}
