mod bytecode;

use std::{env, fs, path::Path, process};

use crate::bytecode::disasm::{print_program, print_stats};
use crate::bytecode::{DecodedProgram, Decoder, record};

fn main() {
    let args: Vec<String> = env::args().collect();

    let stats = args.contains(&"--stats".to_string());
    let check = args.contains(&"--check".to_string());
    let records = args.contains(&"--records".to_string());

    // first non-flag argument is the filename
    let filename = args.iter().skip(1).find(|a| !a.starts_with('-'));

    let filename = match filename {
        Some(filename) => filename,
        None => {
            print_usage();
            return;
        }
    };

    let program = if records {
        decode_records_file(filename)
    } else {
        ensure_extension(filename);
        decode_text_file(filename)
    };

    if check {
        println!("OK: {} ({} sequences)", filename, program.sequences.len());
    } else if stats {
        print_stats(&program);
    } else {
        print_program(&program);
    }
}

fn print_usage() {
    println!("KILN - Bytecode Listing Decoder");
    println!();
    println!("Usage:");
    println!("  kiln <file.kbc>            Decode a textual listing and print it");
    println!("  kiln --stats <file.kbc>    Decode and print statistics");
    println!("  kiln --check <file.kbc>    Decode only; report success or failure");
    println!("  kiln --records <file.kbr>  Decode a binary records blob instead");
}

fn ensure_extension(filename: &str) {
    let path = Path::new(filename);
    if path.extension().and_then(|e| e.to_str()) != Some("kbc") {
        eprintln!("Error: expected a .kbc file, got {}", filename);
        process::exit(1);
    }
}

fn decode_text_file(filename: &str) -> DecodedProgram {
    let source = read_file(filename);

    match Decoder::new(filename).decode_text(&source) {
        Ok(program) => program,
        Err(e) => {
            eprintln!("Decode error in '{}': {}", filename, e);
            process::exit(1);
        }
    }
}

fn decode_records_file(filename: &str) -> DecodedProgram {
    let bytes = match fs::read(filename) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("Failed to read '{}': {}", filename, e);
            process::exit(1);
        }
    };

    let records = match record::from_bytes(&bytes) {
        Ok(records) => records,
        Err(e) => {
            eprintln!("Invalid records blob '{}': {}", filename, e);
            process::exit(1);
        }
    };

    Decoder::new(filename).decode_records(&records)
}

fn read_file(filename: &str) -> String {
    match fs::read_to_string(filename) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("Failed to read '{}': {}", filename, e);
            process::exit(1);
        }
    }
}
