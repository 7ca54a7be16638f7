//! Decode the tokens of the plain package format.
//!
//! ```bash
//! cargo run --example pal-hex -- 0000002a 000000ff
//! cargo run --example pal-hex -- --reverse 42 255
//! cargo run --example pal-hex -- --index var v1*2+-3 7 '?'
//! ```
//!
//! With no tokens on the command line, whitespace-separated tokens are read
//! from standard input. Exits with status 1 if any token fails to decode.

use std::io::{self, BufRead};

use clap::Parser;
use color_eyre::eyre::eyre;
use color_eyre::Result;
use log::debug;
use pal_rs::error::DecodeError;
use pal_rs::indexing::{self, Indexing};
use pal_rs::loc::Loc;
use pal_rs::plain::{parse_usize, Plain};

#[derive(Parser)]
#[command(author, version, about = "Decode location and index tokens of the plain format")]
struct Cli {
    /// Tokens to decode (read from stdin if none are given)
    tokens: Vec<String>,

    /// Encode decimal location numbers as hex tokens instead
    #[arg(short, long)]
    reverse: bool,

    /// Decode index tokens with the named index algebra (const or var)
    #[arg(short, long, value_name = "NAME", conflicts_with = "reverse")]
    index: Option<String>,

    /// Log every token as it is processed
    #[arg(short, long)]
    verbose: bool,
}

enum Mode {
    Decode,
    Encode,
    Index(std::sync::Arc<dyn Indexing>),
}

impl Mode {
    fn apply(&self, token: &str) -> Result<String, DecodeError> {
        match self {
            Mode::Decode => Loc::plain_decode(token).map(|l| l.raw().to_string()),
            Mode::Encode => {
                let n = parse_usize(token)?;
                let n = u32::try_from(n).map_err(|_| DecodeError::BadNumber(token.to_string()))?;
                Ok(Loc::new(n).to_plain())
            }
            Mode::Index(ix) => ix.decode(token).map(|i| {
                let mut out = String::new();
                ix.encode(i, &mut out);
                match ix.to_int(i) {
                    Some(c) => format!("{} = {}", out, c),
                    None => format!("{} (unknown)", out),
                }
            }),
        }
    }
}

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();

    simplelog::TermLogger::init(
        if cli.verbose {
            simplelog::LevelFilter::Debug
        } else {
            simplelog::LevelFilter::Warn
        },
        simplelog::Config::default(),
        simplelog::TerminalMode::Stderr,
        simplelog::ColorChoice::Auto,
    )?;

    let mode = match &cli.index {
        Some(name) => Mode::Index(indexing::by_name(name).ok_or_else(|| eyre!("unknown index algebra {:?}", name))?),
        None if cli.reverse => Mode::Encode,
        None => Mode::Decode,
    };

    let tokens = if cli.tokens.is_empty() {
        let mut tokens = Vec::new();
        for line in io::stdin().lock().lines() {
            tokens.extend(line?.split_whitespace().map(String::from));
        }
        tokens
    } else {
        cli.tokens
    };

    let mut failed = 0;
    for token in &tokens {
        debug!("token {:?}", token);
        match mode.apply(token) {
            Ok(s) => println!("{}", s),
            Err(e) => {
                eprintln!("{}: {}", token, e);
                failed += 1;
            }
        }
    }

    if failed > 0 {
        debug!("{} of {} tokens failed", failed, tokens.len());
        std::process::exit(1);
    }
    Ok(())
}
