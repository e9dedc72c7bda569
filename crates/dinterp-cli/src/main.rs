use std::{env, fs, process::ExitCode};

use dinterp::{
    AccumulatingLog, FormatOptions, Runner, Severity, SourceFile, StdInput, StdPrint, TokenKind, tokenize,
};

const HELP: &str = r"dinterp - an interpreter for the D language.

Usage: dinterp [OPTIONS] [--] [file1.d file2.d ...]

Options:
    --help      -h  Show this text.
    --check     -c  Only check for errors, do not run.
    --lexer     -L  Stop after lexical analysis, output the tokens.
    --locators  -l  Show code excerpts below errors.
    --

Every argument after -- is assumed to be a file name.
";

#[derive(Default)]
struct Options {
    help: bool,
    check: bool,
    lexer: bool,
    locators: bool,
}

impl Options {
    fn set_long(&mut self, name: &str) -> bool {
        match name {
            "help" => self.help = true,
            "check" => self.check = true,
            "lexer" => self.lexer = true,
            "locators" => self.locators = true,
            _ => return false,
        }
        true
    }

    fn set_short(&mut self, name: char) -> bool {
        match name {
            'h' => self.help = true,
            'c' => self.check = true,
            'L' => self.lexer = true,
            'l' => self.locators = true,
            _ => return false,
        }
        true
    }
}

fn interpret_args(args: &[String], opts: &mut Options, files: &mut Vec<String>) -> bool {
    let mut only_files = false;
    for arg in args {
        if only_files {
            files.push(arg.clone());
            continue;
        }
        if let Some(long) = arg.strip_prefix("--") {
            if long.is_empty() {
                only_files = true;
                continue;
            }
            if !opts.set_long(long) {
                eprintln!("Unknown flag: --{long}");
                return false;
            }
            continue;
        }
        if let Some(shorts) = arg.strip_prefix('-') {
            let mut failed = false;
            for ch in shorts.chars() {
                if !opts.set_short(ch) {
                    failed = true;
                    eprintln!("Unknown flag: -{ch}");
                }
            }
            if failed {
                return false;
            }
            continue;
        }
        files.push(arg.clone());
    }
    true
}

fn render_token(token: &dinterp::Token, file: &SourceFile) -> String {
    let (line, col) = file.line_col(token.span.start);
    let what = match &token.kind {
        TokenKind::IntLiteral(value) => format!("integer literal {value}"),
        TokenKind::RealLiteral(value) => format!("real literal {value}"),
        TokenKind::StrLiteral(value) => format!("string literal {value:?}"),
        TokenKind::Ident(name) => format!("identifier {name}"),
        other => other.describe().to_owned(),
    };
    format!("{}:{}: {what}", line + 1, col)
}

fn process_file(file_name: &str, opts: &Options) -> bool {
    let code = match fs::read_to_string(file_name) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Cannot open {file_name}: {err}");
            return false;
        }
    };
    let format = if opts.locators {
        FormatOptions::default().with_context()
    } else {
        FormatOptions::default()
    };

    if opts.lexer {
        let file = SourceFile::new(file_name, code);
        let mut log = AccumulatingLog::new();
        let tokens = tokenize(&file, &mut log);
        eprint!("{}", log.render(Severity::Warning, &file, &format));
        let Some(tokens) = tokens else { return false };
        for token in &tokens {
            if !matches!(token.kind, TokenKind::NewLine) {
                println!("{}", render_token(token, &file));
            }
        }
        return true;
    }

    let mut log = AccumulatingLog::new();
    let runner = Runner::compile(code.clone(), file_name, &mut log);
    let rendered = match &runner {
        Some(runner) => log.render(Severity::Warning, runner.source(), &format),
        None => {
            let file = SourceFile::new(file_name, code);
            log.render(Severity::Warning, &file, &format)
        }
    };
    eprint!("{rendered}");
    let Some(runner) = runner else { return false };
    if opts.check {
        return true;
    }
    let mut input = StdInput;
    let mut output = StdPrint::new();
    match runner.run(&mut input, &mut output) {
        Ok(()) => true,
        Err(failure) => {
            drop(output); // flush program output before the error report
            eprintln!("{failure}");
            false
        }
    }
}

fn main() -> ExitCode {
    let args: Vec<String> = env::args().skip(1).collect();
    let mut opts = Options::default();
    let mut files = Vec::new();
    if !interpret_args(&args, &mut opts, &mut files) {
        return ExitCode::FAILURE;
    }
    if opts.help || (files.is_empty() && args.is_empty()) {
        println!("{HELP}");
        return ExitCode::SUCCESS;
    }
    let mut failed = false;
    for file in &files {
        if !process_file(file, &opts) {
            failed = true;
        }
    }
    if failed { ExitCode::FAILURE } else { ExitCode::SUCCESS }
}
