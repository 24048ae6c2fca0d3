use std::env;
use std::path::PathBuf;
use std::process;

use anyhow::Result;

use tmsu::{Args, Command, Config};

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let argv: Vec<String> = env::args().collect();
    if argv.len() < 2 {
        eprintln!("usage: {} COMMAND [ARG]...", argv[0]);
        process::exit(2);
    }

    let name = &argv[1];
    let Some(command) = Command::from_name(name) else {
        eprintln!("tmsu: unknown command '{}'", name);
        process::exit(2);
    };

    let args = parse_args(&argv[2..]);

    let config = match Config::resolve(args.value("database").map(PathBuf::from)) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("tmsu: {}", e);
            process::exit(1);
        }
    };

    match command.execute(&config, &args) {
        Ok(lines) => {
            for line in lines {
                println!("{}", line);
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("tmsu: {}", e);
            process::exit(1);
        }
    }
}

/// Split raw arguments into the positional/flag/value shape the command
/// layer consumes: "--key=value" carries a value, "--flag" is a flag,
/// anything else is positional. Rich option parsing (abbreviations, help
/// text) belongs to a front-end, not here.
fn parse_args(raw: &[String]) -> Args {
    let mut args = Args::default();

    for arg in raw {
        match arg.strip_prefix("--") {
            Some(option) => match option.split_once('=') {
                Some((key, value)) => args.values.push((key.to_string(), value.to_string())),
                None => args.flags.push(option.to_string()),
            },
            None => args.positional.push(arg.clone()),
        }
    }

    args
}
