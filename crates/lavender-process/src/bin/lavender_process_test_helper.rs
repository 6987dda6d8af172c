//! Stand-in for `find`, `md5sum` and `ssh` in the process tests. Each flag is one step, run in
//! order: `--stdout-bytes N`, `--stderr-bytes N`, `--stderr-line TEXT`, `--echo-stdin`,
//! `--print-cwd`, `--sleep-ms N`, `--spawn-sleeper-ms N`, `--exit CODE`.

use std::io::{self, Read, Write};
use std::time::Duration;
use std::{env, process, thread};

enum Step {
    Stdout(usize),
    Stderr(usize),
    StderrLine(String),
    EchoStdin,
    PrintCwd,
    Sleep(u64),
    SpawnSleeper(u64),
    Exit(i32),
}

fn usage(message: String) -> ! {
    eprintln!("lavender_process_test_helper: {message}");
    process::exit(2);
}

fn value(args: &mut impl Iterator<Item = String>, flag: &str) -> String {
    args.next()
        .unwrap_or_else(|| usage(format!("{flag} needs a value")))
}

fn number(args: &mut impl Iterator<Item = String>, flag: &str) -> u64 {
    let text = value(args, flag);
    text.parse()
        .unwrap_or_else(|_| usage(format!("{flag}: not a number: {text}")))
}

fn steps(mut args: impl Iterator<Item = String>) -> Vec<Step> {
    let mut steps = Vec::new();
    while let Some(flag) = args.next() {
        let args = &mut args;
        let step = match flag.as_str() {
            "--stdout-bytes" => Step::Stdout(number(args, &flag) as usize),
            "--stderr-bytes" => Step::Stderr(number(args, &flag) as usize),
            "--stderr-line" => Step::StderrLine(value(args, &flag)),
            "--echo-stdin" => Step::EchoStdin,
            "--print-cwd" => Step::PrintCwd,
            "--sleep-ms" => Step::Sleep(number(args, &flag)),
            "--spawn-sleeper-ms" => Step::SpawnSleeper(number(args, &flag)),
            "--exit" => Step::Exit(number(args, &flag) as i32),
            _ => usage(format!("unknown flag {flag}")),
        };
        steps.push(step);
    }
    steps
}

fn fill(mut out: impl Write, len: usize, byte: u8) -> io::Result<()> {
    out.write_all(&vec![byte; len])?;
    out.flush()
}

fn run(step: Step) -> io::Result<()> {
    match step {
        Step::Stdout(len) => fill(io::stdout().lock(), len, b'o'),
        Step::Stderr(len) => fill(io::stderr().lock(), len, b'e'),
        Step::StderrLine(line) => writeln!(io::stderr(), "{line}"),
        Step::EchoStdin => {
            let mut input = Vec::new();
            io::stdin().read_to_end(&mut input)?;
            io::stdout().write_all(&input)
        }
        Step::PrintCwd => writeln!(io::stdout(), "{}", env::current_dir()?.display()),
        Step::Sleep(ms) => {
            thread::sleep(Duration::from_millis(ms));
            Ok(())
        }
        Step::SpawnSleeper(ms) => {
            // Inherits our stdout, so the parent only sees EOF once the sleeper is gone too.
            process::Command::new(env::current_exe()?)
                .args(["--sleep-ms", &ms.to_string()])
                .spawn()
                .map(drop)
        }
        Step::Exit(code) => process::exit(code),
    }
}

fn main() {
    for step in steps(env::args().skip(1)) {
        if let Err(err) = run(step) {
            usage(err.to_string());
        }
    }
}
