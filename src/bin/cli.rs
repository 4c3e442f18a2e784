//! QuillKV interactive client.
//!
//! Reads one command per line, sends it as a RESP frame and prints the
//! reply the way redis-cli does. Arguments after the options run a single
//! command instead of the prompt.
//!
//! ```text
//! quillkv-cli -p 6380
//! 127.0.0.1:6380> SET name quill
//! OK
//! quillkv-cli GET name
//! "quill"
//! ```

use anyhow::{bail, Context as _};
use clap::Parser;
use quillkv::protocol::{encode_cmd, Decoder};
use std::io::{self, BufRead, Write};
use std::net::TcpStream;

#[derive(Parser, Debug)]
#[command(name = "quillkv-cli", version, about = "Command-line client for QuillKV")]
struct Args {
    /// Server host
    #[arg(short = 'H', long, default_value = quillkv::DEFAULT_HOST)]
    host: String,

    /// Server port
    #[arg(short, long, default_value_t = quillkv::DEFAULT_PORT)]
    port: u16,

    /// Command to run once instead of starting the prompt
    command: Vec<String>,
}

struct Client {
    stream: TcpStream,
    decoder: Decoder<TcpStream>,
}

impl Client {
    fn connect(addr: &str) -> anyhow::Result<Self> {
        let stream = TcpStream::connect(addr).with_context(|| format!("could not connect to {addr}"))?;
        let reader = stream.try_clone()?;
        Ok(Self {
            stream,
            decoder: Decoder::new(reader),
        })
    }

    /// Sends one command line and returns the printable reply.
    fn roundtrip(&mut self, line: &str) -> anyhow::Result<String> {
        self.stream.write_all(&encode_cmd(line))?;
        match self.decoder.decode()? {
            Some(reply) => Ok(reply.to_string()),
            None => bail!("server closed the connection"),
        }
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let addr = format!("{}:{}", args.host, args.port);
    let mut client = Client::connect(&addr)?;

    if !args.command.is_empty() {
        println!("{}", client.roundtrip(&args.command.join(" "))?);
        return Ok(());
    }

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut line = String::new();

    loop {
        write!(stdout, "{addr}> ")?;
        stdout.flush()?;

        line.clear();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let command = line.trim();
        if command.is_empty() {
            continue;
        }

        println!("{}", client.roundtrip(command)?);
        if command.eq_ignore_ascii_case("quit") {
            break;
        }
    }

    Ok(())
}
