//! Memcached ASCII flavor (spec.md §4.4.3, §6.1): a line-based grammar with
//! a raw value block following storage commands.
//!
//! Parsing never mutates `buf`'s cursor except on a successful `Ok` —
//! `Unfin` and `Invalid` both leave `rpos` untouched, so the caller can feed
//! more bytes and simply call `parse_request` again on the same buffer
//! (spec.md §4.4.1's five-way contract).

use crate::buffer::Buffer;
use crate::error::ParseOutcome;
use crate::protocol::request::Command;
use crate::protocol::response::Response;

const CRLF: &[u8] = b"\r\n";

fn find_crlf(data: &[u8]) -> Option<usize> {
    data.windows(2).position(|w| w == CRLF)
}

fn tokens(line: &[u8]) -> Vec<Vec<u8>> {
    line.split(|&b| b == b' ').filter(|t| !t.is_empty()).map(|t| t.to_vec()).collect()
}

fn parse_u32(tok: &[u8]) -> Option<u32> {
    std::str::from_utf8(tok).ok()?.parse().ok()
}

fn parse_u64(tok: &[u8]) -> Option<u64> {
    std::str::from_utf8(tok).ok()?.parse().ok()
}

/// Parse one request out of `buf`. See the module contract above for the
/// cursor-mutation rules: `rpos` only ever moves on a successful `Ok`; an
/// `Invalid` result always leaves `rpos` exactly where it found it (spec.md
/// §4.4.1: "On `INVALID`, the parser restores `rpos` to the start of the
/// current request"), since nothing was consumed until then.
pub fn parse_request(buf: &mut Buffer) -> (ParseOutcome, Option<Command>) {
    let Some(line_end) = find_crlf(buf.readable()) else {
        return (ParseOutcome::Unfin, None);
    };
    let toks = tokens(&buf.readable()[..line_end]);
    let Some(verb) = toks.first() else {
        return (ParseOutcome::Invalid, None);
    };

    match verb.as_slice() {
        b"get" | b"gets" => parse_retrieval(buf, &toks, line_end),
        b"set" | b"add" | b"replace" | b"append" | b"prepend" | b"cas" => parse_storage(buf, &toks, line_end),
        b"delete" => parse_delete(buf, &toks, line_end),
        b"incr" | b"decr" => parse_incr_decr(buf, &toks, line_end),
        b"flush_all" => parse_flush_all(buf, &toks, line_end),
        b"quit" => {
            buf.advance_rpos(line_end + 2);
            (ParseOutcome::Ok, Some(Command::Quit))
        }
        _ => (ParseOutcome::Invalid, None),
    }
}

fn parse_retrieval(buf: &mut Buffer, toks: &[Vec<u8>], line_end: usize) -> (ParseOutcome, Option<Command>) {
    let with_cas = toks[0] == b"gets";
    let keys: Vec<Vec<u8>> = toks[1..].to_vec();
    if keys.is_empty() {
        return (ParseOutcome::Invalid, None);
    }
    buf.advance_rpos(line_end + 2);
    (ParseOutcome::Ok, Some(Command::Get { keys, with_cas }))
}

fn parse_storage(buf: &mut Buffer, toks: &[Vec<u8>], line_end: usize) -> (ParseOutcome, Option<Command>) {
    let verb = toks[0].clone();
    let is_cas = verb == b"cas";
    let min_tokens = if is_cas { 6 } else { 5 };
    if toks.len() < min_tokens {
        return (ParseOutcome::Invalid, None);
    }
    let key = toks[1].clone();
    let Some(flags) = parse_u32(&toks[2]) else {
        return (ParseOutcome::Invalid, None);
    };
    let Some(exptime) = parse_u32(&toks[3]) else {
        return (ParseOutcome::Invalid, None);
    };
    let Some(bytes) = parse_u64(&toks[4]).map(|v| v as usize) else {
        return (ParseOutcome::Invalid, None);
    };
    let mut idx = 5;
    let cas = if is_cas {
        let Some(c) = parse_u64(&toks[idx]) else {
            return (ParseOutcome::Invalid, None);
        };
        idx += 1;
        c
    } else {
        0
    };
    let noreply = toks.get(idx).map(|t| t.as_slice() == b"noreply").unwrap_or(false);

    let data_start = line_end + 2;
    let needed = data_start + bytes + 2;
    if buf.unread_len() < needed {
        return (ParseOutcome::Unfin, None);
    }
    let value = buf.readable()[data_start..data_start + bytes].to_vec();
    if &buf.readable()[data_start + bytes..data_start + bytes + 2] != CRLF {
        return (ParseOutcome::Invalid, None);
    }
    buf.advance_rpos(needed);

    let command = match verb.as_slice() {
        b"set" => Command::Set { key, flags, exptime, value, noreply },
        b"add" => Command::Add { key, flags, exptime, value, noreply },
        b"replace" => Command::Replace { key, flags, exptime, value, noreply },
        b"append" => Command::Append { key, value, noreply },
        b"prepend" => Command::Prepend { key, value, noreply },
        b"cas" => Command::Cas { key, flags, exptime, value, cas, noreply },
        _ => unreachable!(),
    };
    (ParseOutcome::Ok, Some(command))
}

fn parse_delete(buf: &mut Buffer, toks: &[Vec<u8>], line_end: usize) -> (ParseOutcome, Option<Command>) {
    if toks.len() < 2 {
        return (ParseOutcome::Invalid, None);
    }
    let key = toks[1].clone();
    let noreply = toks.get(2).map(|t| t.as_slice() == b"noreply").unwrap_or(false);
    buf.advance_rpos(line_end + 2);
    (ParseOutcome::Ok, Some(Command::Delete { key, noreply }))
}

fn parse_incr_decr(buf: &mut Buffer, toks: &[Vec<u8>], line_end: usize) -> (ParseOutcome, Option<Command>) {
    let verb = toks[0].clone();
    if toks.len() < 3 {
        return (ParseOutcome::Invalid, None);
    }
    let key = toks[1].clone();
    let Some(delta) = parse_u64(&toks[2]) else {
        return (ParseOutcome::Invalid, None);
    };
    let noreply = toks.get(3).map(|t| t.as_slice() == b"noreply").unwrap_or(false);
    buf.advance_rpos(line_end + 2);
    let command = if verb == b"incr" { Command::Incr { key, delta, noreply } } else { Command::Decr { key, delta, noreply } };
    (ParseOutcome::Ok, Some(command))
}

fn parse_flush_all(buf: &mut Buffer, toks: &[Vec<u8>], line_end: usize) -> (ParseOutcome, Option<Command>) {
    let noreply = toks.iter().any(|t| t.as_slice() == b"noreply");
    buf.advance_rpos(line_end + 2);
    (ParseOutcome::Ok, Some(Command::FlushAll { noreply }))
}

/// Compose a [`Command`] back onto the wire as a memcached ASCII request,
/// the inverse of [`parse_request`] (spec.md §4.4.4's composer contract
/// covers `Request` as well as `Response`).
pub fn compose_request(cmd: &Command, buf: &mut Buffer) -> Result<(), crate::error::ComposeError> {
    match cmd {
        Command::Quit => {
            buf.write(b"quit\r\n")?;
            Ok(())
        }
        Command::Get { keys, with_cas } => {
            buf.write(if *with_cas { b"gets" } else { b"get" })?;
            for k in keys {
                buf.write(b" ")?;
                buf.write(k)?;
            }
            buf.write(CRLF)?;
            Ok(())
        }
        Command::Set { key, flags, exptime, value, noreply } => {
            compose_storage(buf, b"set", key, *flags, *exptime, value, None, *noreply)
        }
        Command::Add { key, flags, exptime, value, noreply } => {
            compose_storage(buf, b"add", key, *flags, *exptime, value, None, *noreply)
        }
        Command::Replace { key, flags, exptime, value, noreply } => {
            compose_storage(buf, b"replace", key, *flags, *exptime, value, None, *noreply)
        }
        Command::Append { key, value, noreply } => compose_storage(buf, b"append", key, 0, 0, value, None, *noreply),
        Command::Prepend { key, value, noreply } => compose_storage(buf, b"prepend", key, 0, 0, value, None, *noreply),
        Command::Cas { key, flags, exptime, value, cas, noreply } => {
            compose_storage(buf, b"cas", key, *flags, *exptime, value, Some(*cas), *noreply)
        }
        Command::Delete { key, noreply } => {
            buf.write(b"delete ")?;
            buf.write(key)?;
            if *noreply {
                buf.write(b" noreply")?;
            }
            buf.write(CRLF)?;
            Ok(())
        }
        Command::Incr { key, delta, noreply } => compose_incr_decr(buf, b"incr", key, *delta, *noreply),
        Command::Decr { key, delta, noreply } => compose_incr_decr(buf, b"decr", key, *delta, *noreply),
        Command::FlushAll { noreply } => {
            buf.write(b"flush_all")?;
            if *noreply {
                buf.write(b" noreply")?;
            }
            buf.write(CRLF)?;
            Ok(())
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn compose_storage(
    buf: &mut Buffer,
    verb: &[u8],
    key: &[u8],
    flags: u32,
    exptime: u32,
    value: &[u8],
    cas: Option<u64>,
    noreply: bool,
) -> Result<(), crate::error::ComposeError> {
    buf.write(verb)?;
    buf.write(b" ")?;
    buf.write(key)?;
    buf.write(format!(" {flags} {exptime} {}", value.len()).as_bytes())?;
    if let Some(cas) = cas {
        buf.write(format!(" {cas}").as_bytes())?;
    }
    if noreply {
        buf.write(b" noreply")?;
    }
    buf.write(CRLF)?;
    buf.write(value)?;
    buf.write(CRLF)?;
    Ok(())
}

fn compose_incr_decr(buf: &mut Buffer, verb: &[u8], key: &[u8], delta: u64, noreply: bool) -> Result<(), crate::error::ComposeError> {
    buf.write(verb)?;
    buf.write(b" ")?;
    buf.write(key)?;
    buf.write(format!(" {delta}").as_bytes())?;
    if noreply {
        buf.write(b" noreply")?;
    }
    buf.write(CRLF)?;
    Ok(())
}

/// Compose `resp` into `buf` as a memcached ASCII reply. `Suppressed`
/// writes nothing (spec.md §6.1's `noreply`).
pub fn compose_response(resp: &Response, buf: &mut Buffer) -> Result<(), crate::error::ComposeError> {
    match resp {
        Response::Stored => buf.write(b"STORED\r\n")?,
        Response::NotStored => buf.write(b"NOT_STORED\r\n")?,
        Response::Exists => buf.write(b"EXISTS\r\n")?,
        Response::NotFound => buf.write(b"NOT_FOUND\r\n")?,
        Response::Deleted => buf.write(b"DELETED\r\n")?,
        Response::Ok => buf.write(b"OK\r\n")?,
        Response::Suppressed => {}
        Response::Number(n) => buf.write(format!("{n}\r\n").as_bytes())?,
        Response::Error(msg) => buf.write(format!("ERROR {msg}\r\n").as_bytes())?,
        Response::ClientError(msg) => buf.write(format!("CLIENT_ERROR {msg}\r\n").as_bytes())?,
        Response::ServerError(msg) => buf.write(format!("SERVER_ERROR {msg}\r\n").as_bytes())?,
        Response::Values(entries) => {
            for v in entries {
                let key = String::from_utf8_lossy(&v.key);
                let header = match v.cas {
                    Some(cas) => format!("VALUE {key} {} {} {cas}\r\n", v.flags, v.value.len()),
                    None => format!("VALUE {key} {} {}\r\n", v.flags, v.value.len()),
                };
                buf.write(header.as_bytes())?;
                buf.write(&v.value)?;
                buf.write(CRLF)?;
            }
            buf.write(b"END\r\n")?;
        }
    }
    Ok(())
}
