use std::fs;

use nxtlink_frame::{Message, Wait};
use nxtlink_session::Connection;

use crate::cmd::SendArgs;
use crate::exit::{io_error, link_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_message, OutputFormat};

pub fn run(args: SendArgs, format: OutputFormat, wait: Wait) -> CliResult<i32> {
    let payload = resolve_payload(&args)?;

    let mut conn = Connection::new();
    conn.set_wait(wait);
    conn.open().map_err(|err| link_error("open failed", err))?;

    conn.send(&payload)
        .map_err(|err| link_error("send failed", err))?;

    if args.wait {
        let mut replies = 0usize;
        loop {
            match conn.receive() {
                Ok(Message::Data(reply)) => {
                    replies += 1;
                    print_message(&reply, replies, format);
                }
                Ok(Message::Exit) => break,
                Err(err) => return Err(link_error("receive failed", err)),
            }
        }
    }

    conn.close();
    Ok(SUCCESS)
}

fn resolve_payload(args: &SendArgs) -> CliResult<Vec<u8>> {
    if let Some(data) = &args.data {
        return Ok(data.as_bytes().to_vec());
    }
    if let Some(hex) = &args.hex {
        return parse_hex(hex);
    }
    if let Some(path) = &args.file {
        return fs::read(path)
            .map_err(|err| io_error(&format!("failed reading {}", path.display()), err));
    }
    Err(CliError::new(
        USAGE,
        "one of --data, --hex or --file is required",
    ))
}

fn parse_hex(input: &str) -> CliResult<Vec<u8>> {
    let digits: Vec<char> = input.chars().filter(|c| !c.is_whitespace()).collect();
    if digits.is_empty() || digits.len() % 2 != 0 {
        return Err(CliError::new(
            USAGE,
            format!("--hex wants an even number of hex digits: {input:?}"),
        ));
    }

    let mut bytes = Vec::with_capacity(digits.len() / 2);
    for pair in digits.chunks(2) {
        let high = hex_digit(pair[0])?;
        let low = hex_digit(pair[1])?;
        bytes.push(high << 4 | low);
    }
    Ok(bytes)
}

fn hex_digit(c: char) -> CliResult<u8> {
    c.to_digit(16)
        .map(|d| d as u8)
        .ok_or_else(|| CliError::new(USAGE, format!("invalid hex digit {c:?}")))
}
