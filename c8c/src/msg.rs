use color_print::cprintln;

#[derive(Debug)]
pub enum Msg {
    Error(String),
    Note(String),
}

impl Msg {
    pub fn print(&self) {
        match self {
            Msg::Error(msg) => cprintln!("<red,bold>error</>: {}", msg),
            Msg::Note(msg) => cprintln!("<green,bold>note</>: {}", msg),
        }
    }

    /// Print with a source excerpt of `line` (1-based) from `file`.
    pub fn diag(&self, file: &str, line: u32, raw: &str) {
        self.print();
        cprintln!("     <blue>--></> <underline>{}:{}</>", file, line);
        cprintln!("      <blue>|</>");
        cprintln!(" <blue>{:>4} |</> {}", line, raw);
        cprintln!("      <blue>|</>");
    }
}
