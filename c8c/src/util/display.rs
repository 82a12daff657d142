use crate::emitter::{Image, Line};
use c8arch::inst::Inst;
use c8arch::mem::{INST_SIZE, PROGRAM_START, TRAMPOLINE};
use color_print::{cformat, cprint, cprintln};

/// One listing row per instruction, labels on their own rows.
pub fn listing(image: &Image) -> Vec<String> {
    let mut rows = vec![];
    for addr in (PROGRAM_START..TRAMPOLINE + 2 * INST_SIZE).step_by(INST_SIZE as usize) {
        let note = if addr < TRAMPOLINE { "prologue" } else { "trampoline" };
        rows.push(cformat!("| 0x{:04X} : {} <dim>; {}</>", addr, decode(image, addr), note));
    }
    for function in &image.functions {
        rows.push(cformat!("+--------+ <green>{}</green> : {}", function.name, function.ty));
        let mut addr = function.addr;
        for line in &function.code.lines {
            match line {
                Line::Label(label) if *label == function.name => {}
                Line::Label(label) => rows.push(cformat!("| <m>{}</m>:", label)),
                Line::Inst(_) => {
                    rows.push(format!("| 0x{:04X} : {}", addr, decode(image, addr)));
                    addr += INST_SIZE;
                }
            }
        }
    }
    rows
}

fn decode(image: &Image, addr: u16) -> String {
    let Some(word) = image.word(addr) else {
        return cformat!("<r>----</>");
    };
    match Inst::from_bin(word) {
        Some(inst) => inst.cformat(),
        None => cformat!("<r>0x{:04X}</>", word),
    }
}

/// Print the memory layout and the disassembled code of `image`.
pub fn binprint(image: &Image) {
    println!("+-[Code]-+------------------------------------------------------------------------");
    for row in listing(image) {
        println!("{}", row);
    }

    println!("+-[Data]-+------------------------------------------------------------------------");
    for (name, global) in &image.globals {
        let size = global.ty.size_of() as u16;
        let end = if size > 0 { global.addr + size - 1 } else { global.addr };
        cprint!("| 0x{:04X} : 0x{:04X} | ", global.addr, end);
        cprintln!("<cyan>{}</cyan> : {}", name, global.ty);
    }
    cprintln!(
        "| 0x{:04X} : 0x{:04X} | <yellow>stack</yellow>",
        image.stack_start,
        image.code_start.saturating_sub(1)
    );
    println!("+--------+------------------------------------------------------------------------");
}
