use std::collections::HashMap;

use crate::bytecode::{
    action::Action,
    decode_error::DecodeError,
    ir::{
        DecodedProgram, Instruction, InstructionSequence, Label, LabelKind, PROGRAM_MARKER, Param,
        SeqId,
    },
    record::{InstructionRecord, SequenceRecord},
};

/// Per-run decoder context.
///
/// One `Decoder` per decode run; the entry points consume it by value, so
/// state can never leak across runs and concurrent callers simply construct
/// their own. Holds the source filename stamped onto every sequence, the two
/// label-resolution tables, and the program-root pointer.
pub struct Decoder {
    filename: String,

    /// (kind, name) -> defining sequences, for Def and DefClass.
    label_table: HashMap<LabelKind, HashMap<String, Vec<SeqId>>>,

    /// Block name -> sequence. Last definition wins.
    block_table: HashMap<String, SeqId>,

    /// Set when a Program section is registered. A later Program section
    /// silently replaces it.
    program: Option<SeqId>,
}

impl Decoder {
    pub fn new(filename: &str) -> Self {
        let mut label_table = HashMap::new();
        label_table.insert(LabelKind::Def, HashMap::new());
        label_table.insert(LabelKind::DefClass, HashMap::new());

        Self {
            filename: filename.to_string(),
            label_table,
            block_table: HashMap::new(),
            program: None,
        }
    }

    // ==========================================================================
    // Structured path
    // ==========================================================================

    /// Decode pre-segmented records from a trusted producer.
    ///
    /// # Panics
    ///
    /// On any decode error. The structured producer has already validated its
    /// output, so an unknown operation, malformed label, or missing jump
    /// anchor here is a bug upstream and aborts the run; there is no
    /// recoverable failure on this path.
    pub fn decode_records(self, records: &[SequenceRecord]) -> DecodedProgram {
        match self.try_decode_records(records) {
            Ok(program) => program,
            Err(e) => panic!("{}", e),
        }
    }

    fn try_decode_records(
        mut self,
        records: &[SequenceRecord],
    ) -> Result<DecodedProgram, DecodeError> {
        let mut sequences = Vec::new();

        for record in records {
            let id = sequences.len();
            let mut seq = InstructionSequence::new(&self.filename);
            self.register_label(&mut seq, id, &record.label)?;

            for instruction in &record.instructions {
                seq.instructions.push(convert_record(instruction)?);
            }

            sequences.push(seq);
        }

        Ok(self.finish(sequences))
    }

    // ==========================================================================
    // Textual path
    // ==========================================================================

    /// Decode the textual line encoding.
    ///
    /// This is the single catching boundary: any decode error voids the whole
    /// run and comes back as one `Err`, never as partial output. Malformed
    /// listings outside the decode-error taxonomy (a truncated instruction
    /// line, `putstring` without quotes) panic instead.
    pub fn decode_text(mut self, source: &str) -> Result<DecodedProgram, DecodeError> {
        let lines: Vec<&str> = source.trim().split('\n').collect();
        let mut sequences = Vec::new();

        self.decode_section(&mut sequences, &lines, 0)?;

        Ok(self.finish(sequences))
    }

    /// Decode one section starting at `cursor`, which must sit on a
    /// `<kind:name>` header line.
    ///
    /// The first nested-marker line ends this section and hands the entire
    /// remaining suffix to a recursive call, so sections come out flattened
    /// in encounter order; nesting survives only in the labels and tables,
    /// never as containment. Each section's slot is reserved before
    /// recursing, which keeps table indices aligned with output positions.
    fn decode_section(
        &mut self,
        out: &mut Vec<InstructionSequence>,
        lines: &[&str],
        cursor: usize,
    ) -> Result<(), DecodeError> {
        let header = lines[cursor].trim();
        let token = header.trim_start_matches('<').trim_end_matches('>');

        let id = out.len();
        let mut seq = InstructionSequence::new(&self.filename);
        self.register_label(&mut seq, id, token)?;
        out.push(seq);

        let mut pos = cursor + 1;
        while pos < lines.len() {
            let line = lines[pos].trim();

            if line.starts_with('<') {
                return self.decode_section(out, lines, pos);
            }

            let instruction = self.decode_line(line)?;
            out[id].instructions.push(instruction);
            pos += 1;
        }

        Ok(())
    }

    /// Decode one instruction line: `<lineNumber> <operationName> [operand...]`.
    fn decode_line(&self, line: &str) -> Result<Instruction, DecodeError> {
        let tokens: Vec<&str> = line.split_whitespace().collect();

        if tokens.len() < 2 {
            panic!(
                "malformed instruction line {:?} in {}",
                line, self.filename
            );
        }

        // The original discards line-number parse errors; an unparseable
        // number decodes as line 0.
        let line_no = parse_int(tokens[0]).unwrap_or(0);

        let action = Action::lookup(tokens[1])
            .ok_or_else(|| DecodeError::unknown_operation(tokens[1], line_no))?;

        let params = if action.is_put_string() {
            let text = quoted_text(line).unwrap_or_else(|| {
                panic!("putstring without quoted text (line {}) in {}", line_no, self.filename)
            });
            vec![Param::Str(text.to_string())]
        } else if action.is_branch() {
            let operand = tokens.get(2).copied().unwrap_or("");
            let target = parse_int(operand)
                .ok_or_else(|| DecodeError::unresolved_target(operand, line_no))?;
            vec![Param::Int(target)]
        } else {
            tokens[2..].iter().map(|t| parse_param(t)).collect()
        };

        Ok(Instruction {
            line: line_no,
            action,
            params,
        })
    }

    // ==========================================================================
    // Label registry
    // ==========================================================================

    /// Register a composite label token `"<kind>:<name>"` for the sequence.
    ///
    /// The reserved program marker sets the program-root pointer and leaves
    /// the sequence unlabelled; Block labels overwrite the block table; Def
    /// and DefClass labels append to the label table in encounter order.
    fn register_label(
        &mut self,
        seq: &mut InstructionSequence,
        id: SeqId,
        token: &str,
    ) -> Result<(), DecodeError> {
        if token == PROGRAM_MARKER {
            self.program = Some(id);
            return Ok(());
        }

        let (kind_token, name) = token
            .split_once(':')
            .ok_or_else(|| DecodeError::malformed_label(token))?;
        let kind =
            LabelKind::from_wire(kind_token).ok_or_else(|| DecodeError::malformed_label(token))?;

        seq.label = Some(Label {
            kind,
            name: name.to_string(),
        });

        match kind {
            LabelKind::Block => {
                self.block_table.insert(name.to_string(), id);
            }
            LabelKind::Def | LabelKind::DefClass => {
                self.label_table
                    .entry(kind)
                    .or_default()
                    .entry(name.to_string())
                    .or_default()
                    .push(id);
            }
            // The program marker carries no name; "Program:x" is not a label.
            LabelKind::Program => return Err(DecodeError::malformed_label(token)),
        }

        Ok(())
    }

    fn finish(self, sequences: Vec<InstructionSequence>) -> DecodedProgram {
        DecodedProgram {
            sequences,
            label_table: self.label_table,
            block_table: self.block_table,
            program: self.program,
        }
    }
}

/// Convert one structured instruction record.
fn convert_record(record: &InstructionRecord) -> Result<Instruction, DecodeError> {
    let action = Action::lookup(&record.action)
        .ok_or_else(|| DecodeError::unknown_operation(&record.action, record.line))?;

    let params = if action.is_put_string() {
        let raw = record
            .params
            .first()
            .unwrap_or_else(|| panic!("putstring record without operand (line {})", record.line));
        let text = quoted_text(raw).unwrap_or_else(|| {
            panic!("putstring record without quoted text (line {})", record.line)
        });
        vec![Param::Str(text.to_string())]
    } else if action.is_branch() {
        let target = record.anchor.ok_or_else(|| {
            let operand = record.params.first().map(String::as_str).unwrap_or("");
            DecodeError::unresolved_target(operand, record.line)
        })?;
        vec![Param::Int(target)]
    } else {
        record.params.iter().map(|p| parse_param(p)).collect()
    };

    Ok(Instruction {
        line: record.line,
        action,
        params,
    })
}

/// Resolve one operand token: base-flexible integer or opaque string.
fn parse_param(token: &str) -> Param {
    match parse_int(token) {
        Some(n) => Param::Int(n),
        None => Param::Str(token.to_string()),
    }
}

/// Base-flexible integer parse: decimal, `0x`/`0o`/`0b` prefixes,
/// leading-zero octal, optional sign.
fn parse_int(token: &str) -> Option<i64> {
    let (negative, rest) = match token.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, token.strip_prefix('+').unwrap_or(token)),
    };

    let (radix, digits) = if let Some(d) = rest.strip_prefix("0x").or_else(|| rest.strip_prefix("0X")) {
        (16, d)
    } else if let Some(d) = rest.strip_prefix("0o").or_else(|| rest.strip_prefix("0O")) {
        (8, d)
    } else if let Some(d) = rest.strip_prefix("0b").or_else(|| rest.strip_prefix("0B")) {
        (2, d)
    } else if rest.len() > 1 && rest.starts_with('0') {
        (8, &rest[1..])
    } else {
        (10, rest)
    };

    if digits.is_empty() {
        return None;
    }

    let value = i64::from_str_radix(digits, radix).ok()?;
    Some(if negative { -value } else { value })
}

/// Text between the first two double quotes of `raw`.
/// Escaped quotes are not supported; the first `"` after the opener closes.
fn quoted_text(raw: &str) -> Option<&str> {
    let start = raw.find('"')? + 1;
    let end = raw[start..].find('"')? + start;
    Some(&raw[start..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(source: &str) -> DecodedProgram {
        Decoder::new("test.kbc").decode_text(source).unwrap()
    }

    #[test]
    fn test_decode_program_section() {
        let program = decode("<Program>\n1 putstring \"hi\"\n2 leave");

        assert_eq!(program.sequences.len(), 1);
        assert_eq!(program.program, Some(0));

        let seq = program.program().unwrap();
        assert!(seq.label.is_none());
        assert_eq!(seq.instructions.len(), 2);

        assert_eq!(seq.instructions[0].line, 1);
        assert_eq!(seq.instructions[0].action, Action::PutString);
        assert_eq!(seq.instructions[0].params, vec![Param::Str("hi".to_string())]);

        assert_eq!(seq.instructions[1].line, 2);
        assert_eq!(seq.instructions[1].action, Action::Leave);
        assert!(seq.instructions[1].params.is_empty());
    }

    #[test]
    fn test_program_root_unset_without_program_section() {
        let program = decode("<Def:foo>\n0 putself");

        assert_eq!(program.program, None);
        assert!(program.program().is_none());
        assert_eq!(program.methods("foo").len(), 1);
    }

    #[test]
    fn test_duplicate_definitions_preserve_encounter_order() {
        let program = decode("<Def:foo>\n0 putself\n<Def:foo>\n0 putnull");

        let ids = &program.label_table[&LabelKind::Def]["foo"];
        assert_eq!(ids, &vec![0, 1]);

        let defs = program.methods("foo");
        assert_eq!(defs.len(), 2);
        assert_eq!(defs[0].instructions[0].action, Action::PutSelf);
        assert_eq!(defs[1].instructions[0].action, Action::PutNull);
    }

    #[test]
    fn test_branch_operand_is_integer() {
        let program = decode("<Program>\n0 branchif 7");

        let instr = &program.program().unwrap().instructions[0];
        assert_eq!(instr.params, vec![Param::Int(7)]);
    }

    #[test]
    fn test_base_flexible_operands() {
        let program = decode(
            "<Program>\n0 putobject 0x1F\n1 putobject 0o17\n2 putobject 0b101\n3 putobject 017\n4 putobject -4",
        );

        let params: Vec<&Param> = program
            .program()
            .unwrap()
            .instructions
            .iter()
            .map(|i| &i.params[0])
            .collect();

        assert_eq!(params[0], &Param::Int(31));
        assert_eq!(params[1], &Param::Int(15));
        assert_eq!(params[2], &Param::Int(5));
        assert_eq!(params[3], &Param::Int(15));
        assert_eq!(params[4], &Param::Int(-4));
    }

    #[test]
    fn test_non_numeric_operand_stays_string() {
        let program = decode("<Program>\n0 getconstant Foo");

        let instr = &program.program().unwrap().instructions[0];
        assert_eq!(instr.params, vec![Param::Str("Foo".to_string())]);
    }

    #[test]
    fn test_unknown_operation_reports_failure() {
        let result = Decoder::new("test.kbc").decode_text("<Program>\n1 frobnicate");

        assert_eq!(
            result.unwrap_err(),
            DecodeError::unknown_operation("frobnicate", 1)
        );
    }

    #[test]
    fn test_malformed_label_missing_separator() {
        let result = Decoder::new("test.kbc").decode_text("<Def>\n0 putself");

        assert_eq!(result.unwrap_err(), DecodeError::malformed_label("Def"));
    }

    #[test]
    fn test_malformed_label_unknown_kind() {
        let result = Decoder::new("test.kbc").decode_text("<Method:foo>\n0 putself");

        assert_eq!(
            result.unwrap_err(),
            DecodeError::malformed_label("Method:foo")
        );
    }

    #[test]
    fn test_jump_target_not_numeric() {
        let result = Decoder::new("test.kbc").decode_text("<Program>\n2 jump loop");

        assert_eq!(
            result.unwrap_err(),
            DecodeError::unresolved_target("loop", 2)
        );
    }

    #[test]
    fn test_sections_flatten_in_encounter_order() {
        let source = "<Program>\n\
                      0 putself\n\
                      1 send foo 0\n\
                      <Def:foo>\n\
                      0 putnull\n\
                      1 leave\n\
                      <Block:0>\n\
                      0 leave";
        let program = decode(source);

        assert_eq!(program.sequences.len(), 3);
        assert_eq!(program.program, Some(0));

        let counts: Vec<usize> = program
            .sequences
            .iter()
            .map(|s| s.instructions.len())
            .collect();
        assert_eq!(counts, vec![2, 2, 1]);

        assert_eq!(
            program.sequences[1].label,
            Some(Label {
                kind: LabelKind::Def,
                name: "foo".to_string()
            })
        );
        assert_eq!(
            program.sequences[2].label,
            Some(Label {
                kind: LabelKind::Block,
                name: "0".to_string()
            })
        );

        // mixed operands on the send
        assert_eq!(
            program.sequences[0].instructions[1].params,
            vec![Param::Str("foo".to_string()), Param::Int(0)]
        );
    }

    #[test]
    fn test_block_table_last_definition_wins() {
        let program = decode("<Block:0>\n0 putself\n<Block:0>\n0 putnull");

        assert_eq!(program.block_table.len(), 1);
        assert_eq!(
            program.block("0").unwrap().instructions[0].action,
            Action::PutNull
        );
    }

    #[test]
    fn test_second_program_section_replaces_root() {
        let program = decode("<Program>\n0 putself\n<Program>\n0 putnull");

        assert_eq!(program.program, Some(1));
        assert_eq!(
            program.program().unwrap().instructions[0].action,
            Action::PutNull
        );
    }

    #[test]
    fn test_string_literal_keeps_spaces() {
        let program = decode("<Program>\n1 putstring \"hello world\"");

        let instr = &program.program().unwrap().instructions[0];
        assert_eq!(instr.params, vec![Param::Str("hello world".to_string())]);
    }

    #[test]
    fn test_empty_section_has_no_instructions() {
        let program = decode("<Program>");

        assert_eq!(program.sequences.len(), 1);
        assert_eq!(program.program, Some(0));
        assert!(program.program().unwrap().instructions.is_empty());
    }

    #[test]
    fn test_unparseable_line_number_becomes_zero() {
        let program = decode("<Program>\nxx putself");

        assert_eq!(program.program().unwrap().instructions[0].line, 0);
    }

    #[test]
    fn test_decode_twice_is_deterministic() {
        let source = "<Program>\n0 putself\n<Def:foo>\n0 leave\n<Block:1>\n0 leave";

        let first = Decoder::new("a.kbc").decode_text(source).unwrap();
        let second = Decoder::new("a.kbc").decode_text(source).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_filename_stamped_on_sequences() {
        let program = Decoder::new("demo.kbc")
            .decode_text("<Program>\n0 putself")
            .unwrap();

        assert_eq!(program.sequences[0].filename, "demo.kbc");
    }

    #[test]
    #[should_panic(expected = "malformed instruction line")]
    fn test_truncated_instruction_line_panics() {
        let _ = Decoder::new("test.kbc").decode_text("<Program>\nleave");
    }

    #[test]
    #[should_panic(expected = "putstring without quoted text")]
    fn test_putstring_without_quotes_panics() {
        let _ = Decoder::new("test.kbc").decode_text("<Program>\n1 putstring hi");
    }

    // =========================================================================
    // Structured path
    // =========================================================================

    fn record(label: &str, instructions: Vec<InstructionRecord>) -> SequenceRecord {
        SequenceRecord {
            label: label.to_string(),
            instructions,
        }
    }

    fn instr(line: i64, action: &str, params: &[&str], anchor: Option<i64>) -> InstructionRecord {
        InstructionRecord {
            line,
            action: action.to_string(),
            params: params.iter().map(|p| p.to_string()).collect(),
            anchor,
        }
    }

    #[test]
    fn test_decode_records_basic() {
        let records = vec![
            record(
                "Program",
                vec![
                    instr(0, "putstring", &["\"hi\""], None),
                    instr(1, "send", &["add", "1"], None),
                ],
            ),
            record(
                "Def:add",
                vec![
                    instr(0, "getlocal", &["0"], None),
                    instr(1, "branchunless", &["4"], Some(4)),
                    instr(2, "leave", &[], None),
                ],
            ),
        ];

        let program = Decoder::new("test.kbr").decode_records(&records);

        assert_eq!(program.sequences.len(), 2);
        assert_eq!(program.program, Some(0));
        assert_eq!(program.methods("add").len(), 1);

        let root = program.program().unwrap();
        assert_eq!(root.instructions[0].params, vec![Param::Str("hi".to_string())]);
        assert_eq!(
            root.instructions[1].params,
            vec![Param::Str("add".to_string()), Param::Int(1)]
        );

        let add = program.methods("add")[0];
        assert_eq!(add.instructions[1].action, Action::BranchUnless);
        assert_eq!(add.instructions[1].params, vec![Param::Int(4)]);
    }

    #[test]
    fn test_decode_records_block_and_class() {
        let records = vec![
            record("DefClass:Bar", vec![instr(0, "leave", &[], None)]),
            record("Block:0", vec![instr(0, "leave", &[], None)]),
        ];

        let program = Decoder::new("test.kbr").decode_records(&records);

        assert_eq!(program.class_bodies("Bar").len(), 1);
        assert!(program.block("0").is_some());
        assert_eq!(program.program, None);
    }

    #[test]
    #[should_panic(expected = "unknown operation")]
    fn test_unknown_operation_in_records_aborts() {
        let records = vec![record("Program", vec![instr(0, "frobnicate", &[], None)])];

        let _ = Decoder::new("test.kbr").decode_records(&records);
    }

    #[test]
    #[should_panic(expected = "jump target")]
    fn test_missing_anchor_in_records_aborts() {
        let records = vec![record(
            "Program",
            vec![instr(0, "jump", &["loop"], None)],
        )];

        let _ = Decoder::new("test.kbr").decode_records(&records);
    }

    #[test]
    #[should_panic(expected = "malformed label")]
    fn test_malformed_label_in_records_aborts() {
        let records = vec![record("Def", vec![])];

        let _ = Decoder::new("test.kbr").decode_records(&records);
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    #[test]
    fn test_parse_int_bases() {
        assert_eq!(parse_int("42"), Some(42));
        assert_eq!(parse_int("-42"), Some(-42));
        assert_eq!(parse_int("+7"), Some(7));
        assert_eq!(parse_int("0"), Some(0));
        assert_eq!(parse_int("0x1F"), Some(31));
        assert_eq!(parse_int("0X1f"), Some(31));
        assert_eq!(parse_int("0o17"), Some(15));
        assert_eq!(parse_int("017"), Some(15));
        assert_eq!(parse_int("0b101"), Some(5));
        assert_eq!(parse_int("-0x10"), Some(-16));
    }

    #[test]
    fn test_parse_int_rejects_non_numbers() {
        assert_eq!(parse_int(""), None);
        assert_eq!(parse_int("abc"), None);
        assert_eq!(parse_int("0x"), None);
        assert_eq!(parse_int("08"), None); // invalid octal digit
        assert_eq!(parse_int("1.5"), None);
    }

    #[test]
    fn test_quoted_text() {
        assert_eq!(quoted_text("1 putstring \"hi\""), Some("hi"));
        assert_eq!(quoted_text("\"a b c\" trailing"), Some("a b c"));
        assert_eq!(quoted_text("no quotes here"), None);
        assert_eq!(quoted_text("only \"one"), None);
        assert_eq!(quoted_text("\"\""), Some(""));
    }
}
