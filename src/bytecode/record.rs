use serde::{Deserialize, Serialize};

// =============================================================================
// Structured-input records
// =============================================================================
//
// The shape the upstream producer hands over when it has already segmented
// the listing: one record per section, operands still raw strings, jump
// targets pre-resolved to an anchor line. Postcard framing lets a producer
// ship a whole listing as one compact blob.

/// One pre-segmented instruction, operands unresolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstructionRecord {
    /// Source line number in the listing.
    pub line: i64,
    /// Operation name, resolved against the fixed action table at decode time.
    pub action: String,
    /// Raw operand tokens, in order.
    pub params: Vec<String>,
    /// Pre-resolved target line, set by the producer for jump operations.
    pub anchor: Option<i64>,
}

/// One pre-segmented section: a label token plus its instructions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceRecord {
    /// Composite label token, `"<kind>:<name>"` or the reserved program marker.
    pub label: String,
    pub instructions: Vec<InstructionRecord>,
}

/// Serialize a record listing to a postcard blob.
pub fn to_bytes(records: &[SequenceRecord]) -> Result<Vec<u8>, postcard::Error> {
    postcard::to_allocvec(records)
}

/// Deserialize a record listing from a postcard blob.
pub fn from_bytes(bytes: &[u8]) -> Result<Vec<SequenceRecord>, postcard::Error> {
    postcard::from_bytes(bytes)
}
