mod grammar;
mod session;

use std::env;
use std::io::{self, BufRead, Write};
use std::process;

use clock_core::config::JumperIndex;
use session::{Session, SessionOptions};

const USAGE: &str = "Usage: clock-emulator [--jumpers <0-31>] [--sweep]";

fn main() -> io::Result<()> {
    let options = parse_options(env::args().skip(1)).unwrap_or_else(|err| {
        eprintln!("{err}");
        eprintln!("{USAGE}");
        process::exit(2);
    });

    let stdin = io::stdin();
    let mut reader = stdin.lock();
    let stdout = io::stdout();
    let mut writer = stdout.lock();
    let mut session = Session::new(options);
    let mut line = String::new();

    writeln!(
        writer,
        "Slave Clock Emulator ready. Type `help` for commands or `exit` to quit."
    )?;
    for banner in session.banner() {
        writeln!(writer, "{banner}")?;
    }

    loop {
        line.clear();
        write!(writer, "> ")?;
        writer.flush()?;

        let bytes_read = reader.read_line(&mut line)?;
        if bytes_read == 0 {
            writeln!(writer)?;
            break;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        if should_terminate(trimmed) {
            writeln!(writer, "Session closed.")?;
            break;
        }

        for response in session.handle_command(trimmed) {
            writeln!(writer, "{response}")?;
        }
    }

    Ok(())
}

fn should_terminate(input: &str) -> bool {
    input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit")
}

fn parse_options<I>(args: I) -> Result<SessionOptions, String>
where
    I: IntoIterator<Item = String>,
{
    let mut options = SessionOptions::default();
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        if let Some(value) = arg.strip_prefix("--jumpers=") {
            options.jumpers = parse_jumpers(value)?;
        } else if arg == "--jumpers" {
            let value = args
                .next()
                .ok_or_else(|| "Expected value after --jumpers".to_string())?;
            options.jumpers = parse_jumpers(&value)?;
        } else if arg == "--sweep" {
            options.sweep = true;
        } else {
            return Err(format!("Unknown argument `{arg}`"));
        }
    }

    Ok(options)
}

fn parse_jumpers(value: &str) -> Result<JumperIndex, String> {
    match value.parse::<u8>() {
        Ok(bits) if bits < 32 => Ok(JumperIndex::from_bits(bits)),
        _ => Err(format!("Jumper setting `{value}` is not in 0-31")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|arg| (*arg).to_string()).collect()
    }

    #[test]
    fn defaults_to_cold_boot_and_first_jumper_setting() {
        let options = parse_options(args(&[])).unwrap();
        assert_eq!(options, SessionOptions::default());
    }

    #[test]
    fn reads_jumpers_in_both_spellings() {
        let spaced = parse_options(args(&["--jumpers", "31", "--sweep"])).unwrap();
        assert_eq!(spaced.jumpers.value(), 31);
        assert!(spaced.sweep);

        let joined = parse_options(args(&["--jumpers=7"])).unwrap();
        assert_eq!(joined.jumpers.value(), 7);
    }

    #[test]
    fn rejects_out_of_range_jumpers() {
        assert!(parse_options(args(&["--jumpers", "32"])).is_err());
        assert!(parse_options(args(&["--jumpers"])).is_err());
        assert!(parse_options(args(&["--fast"])).is_err());
    }
}
