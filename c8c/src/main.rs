mod msg;

use c8c::{binprint, compile, Config, Error, Lexer, SymbolMap};
use msg::Msg;

const HELP_TEMPLATE: &str = "\
{before-help}{bin} {version}
  {author}
  {about}

{usage-heading}
{tab}{usage}

{all-args}{after-help}";

#[derive(Debug, clap::Parser)]
#[clap(author, version, about, help_template = HELP_TEMPLATE)]
struct Args {
    /// Input file
    #[clap(default_value = "main.c8")]
    input: String,

    /// Output file
    #[clap(short, long, default_value = "main.ch8")]
    output: String,

    /// Write a YAML symbol map
    #[clap(short, long)]
    map: Option<String>,

    /// Write only the bytes from 0x200, as CHIP-8 interpreters expect
    #[clap(long)]
    rom: bool,

    /// Name of the entry function
    #[clap(long, default_value = "main")]
    entry: String,

    /// Print the memory layout and disassembly
    #[clap(short, long)]
    verbose: bool,
}

fn main() {
    use clap::Parser;

    let args = Args::parse();
    let code = match std::fs::read_to_string(&args.input) {
        Ok(code) => code,
        Err(e) => fail(&args, "", Error::Io(e)),
    };
    if let Err(e) = run(&args, &code) {
        fail(&args, &code, e);
    }
}

fn run(args: &Args, code: &str) -> Result<(), Error> {
    let config = Config {
        entry: args.entry.clone(),
        ..Config::default()
    };
    let tokens = Lexer::new(code).parse();
    let image = compile(&tokens, &config)?;

    if args.verbose {
        binprint(&image);
    }

    let bytes = if args.rom { image.program() } else { &image.memory[..] };
    std::fs::write(&args.output, bytes)?;

    if let Some(path) = &args.map {
        std::fs::write(path, SymbolMap::generate(&image).to_yaml()?)?;
    }

    println!("Successfully compiled {} to {}", args.input, args.output);
    Ok(())
}

fn fail(args: &Args, code: &str, e: Error) -> ! {
    let msg = Msg::Error(e.to_string());
    match e.line() {
        Some(line) => {
            let raw = code.lines().nth((line as usize).saturating_sub(1)).unwrap_or_default();
            msg.diag(&args.input, line, raw);
        }
        None => msg.print(),
    }
    if let Error::Syntax = e {
        Msg::Note("the source does not match the grammar of the language".to_string())
            .print();
    }
    std::process::exit(1);
}
