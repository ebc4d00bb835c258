use crate::bytecode::{DecodedProgram, InstructionSequence, Param};
use std::collections::HashMap;

/// Print a full listing of a decoded program.
pub fn print_program(program: &DecodedProgram) {
    println!("=== DECODED PROGRAM ===\n");

    for (id, seq) in program.sequences.iter().enumerate() {
        let title = sequence_title(program, id, seq);

        println!("════════════════════════════════════════");
        println!(" {}", title);
        println!(" {} ({} instructions)", seq.filename, seq.instructions.len());
        println!("════════════════════════════════════════");
        print!("{}", disassemble_sequence(seq));
        println!();
    }
}

fn sequence_title(program: &DecodedProgram, id: usize, seq: &InstructionSequence) -> String {
    match &seq.label {
        Some(label) => label.to_string(),
        None if program.program == Some(id) => "Program".to_string(),
        None => format!("sequence[{}]", id),
    }
}

/// Disassemble one sequence to a string, one instruction per line.
///
/// Branch instructions get a `(→ line)` annotation and the lines they target
/// get a `►` marker column, so control flow reads off the listing directly.
pub fn disassemble_sequence(seq: &InstructionSequence) -> String {
    let targets = collect_branch_targets(seq);
    let mut output = String::new();

    for instruction in &seq.instructions {
        let marker = if targets.contains(&instruction.line) {
            "► "
        } else {
            "  "
        };

        let params: Vec<String> = instruction.params.iter().map(|p| p.to_string()).collect();

        output.push_str(&format!(
            "{:04} {}{:<22}",
            instruction.line,
            marker,
            instruction.action.name()
        ));

        if !params.is_empty() {
            output.push_str(&format!(" {}", params.join(" ")));
        }

        if instruction.action.is_branch() {
            if let Some(Param::Int(target)) = instruction.params.first() {
                output.push_str(&format!(" (→ {:04})", target));
            }
        }

        output.push('\n');
    }

    output
}

/// Lines targeted by branch instructions within this sequence.
fn collect_branch_targets(seq: &InstructionSequence) -> Vec<i64> {
    let mut targets = Vec::new();

    for instruction in &seq.instructions {
        if !instruction.action.is_branch() {
            continue;
        }

        if let Some(Param::Int(target)) = instruction.params.first() {
            if !targets.contains(target) {
                targets.push(*target);
            }
        }
    }

    targets
}

// =============================================================================
// Statistics
// =============================================================================

/// Print decode statistics: sequence counts and action frequency.
pub fn print_stats(program: &DecodedProgram) {
    println!("=== DECODE STATISTICS ===\n");

    let total: usize = program
        .sequences
        .iter()
        .map(|s| s.instructions.len())
        .sum();

    let methods: usize = program
        .label_table
        .values()
        .flat_map(|names| names.values())
        .map(|ids| ids.len())
        .sum();

    println!("Sequences:         {}", program.sequences.len());
    println!("Labelled entries:  {}", methods);
    println!("Blocks:            {}", program.block_table.len());
    println!("Program root:      {}", if program.program.is_some() { "yes" } else { "no" });
    println!("Instructions:      {}", total);
    println!();

    let mut counts: HashMap<&'static str, usize> = HashMap::new();
    for seq in &program.sequences {
        for instruction in &seq.instructions {
            *counts.entry(instruction.action.name()).or_insert(0) += 1;
        }
    }

    let mut counts: Vec<_> = counts.into_iter().collect();
    counts.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));

    println!("Action frequency:");
    for (name, count) in counts.iter().take(10) {
        let pct = (*count as f64 / total.max(1) as f64) * 100.0;
        println!("  {:<22} {:>4} ({:>5.1}%)", name, count, pct);
    }
}
