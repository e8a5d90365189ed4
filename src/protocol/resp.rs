//! RESP-style flavor (spec.md §4.4.2, §6.2): requests arrive as RESP
//! arrays of bulk strings (`*N\r\n$len\r\n...\r\n` repeated N times);
//! responses are composed in RESP reply types (simple string, bulk string,
//! integer, error).
//!
//! Per an explicit open question in spec.md §9, only the request parser and
//! the response composer are in scope here — a RESP *response* parser
//! (the shape a client-side driver would need) is not implemented, since
//! nothing in this engine plays a RESP client role.

use crate::buffer::Buffer;
use crate::error::ParseOutcome;
use crate::protocol::request::Command;
use crate::protocol::response::Response;

const CRLF: &[u8] = b"\r\n";

fn find_crlf_from(data: &[u8], from: usize) -> Option<usize> {
    data[from..].windows(2).position(|w| w == CRLF).map(|p| p + from)
}

/// Parse one RESP line of the form `<prefix><digits>\r\n`, returning the
/// parsed number and the offset just past the CRLF.
fn parse_prefixed_int(data: &[u8], prefix: u8) -> Option<(i64, usize)> {
    if data.first() != Some(&prefix) {
        return None;
    }
    let end = find_crlf_from(data, 1)?;
    let n: i64 = std::str::from_utf8(&data[1..end]).ok()?.parse().ok()?;
    Some((n, end + 2))
}

/// Parse a RESP array-of-bulk-strings request into a list of argument byte
/// strings, consuming exactly the bytes of one full command on success.
fn parse_array(buf: &mut Buffer) -> (ParseOutcome, Option<Vec<Vec<u8>>>) {
    let data = buf.readable();
    let Some((count, mut off)) = parse_prefixed_int(data, b'*') else {
        return if find_crlf_from(data, 0).is_some() { (ParseOutcome::Invalid, None) } else { (ParseOutcome::Unfin, None) };
    };
    if count < 0 {
        return (ParseOutcome::Invalid, None);
    }
    let mut args = Vec::with_capacity(count as usize);
    for _ in 0..count {
        if off >= data.len() {
            return (ParseOutcome::Unfin, None);
        }
        let Some((len, body_start)) = parse_prefixed_int(&data[off..], b'$') else {
            return if find_crlf_from(&data[off..], 0).is_some() { (ParseOutcome::Invalid, None) } else { (ParseOutcome::Unfin, None) };
        };
        if len < 0 {
            return (ParseOutcome::Invalid, None);
        }
        let len = len as usize;
        let needed = body_start + len + 2;
        if data.len() < off + needed {
            return (ParseOutcome::Unfin, None);
        }
        let body = &data[off + body_start..off + body_start + len];
        if &data[off + body_start + len..off + needed] != CRLF {
            return (ParseOutcome::Invalid, None);
        }
        args.push(body.to_vec());
        off += needed;
    }
    buf.advance_rpos(off);
    (ParseOutcome::Ok, Some(args))
}

/// Parse one request. Supports exactly the verb table in spec.md §4.4.2:
/// `quit`, `flush` (no args), `get`/`mget` (1..MAX_BATCH keys, variadic),
/// `delete` (1 key), `set` (key, value), `incrby`/`decrby` (key, delta).
/// No `cas`/`gets`/`append`/`prepend` here — those are ASCII-only
/// (spec.md §6.1).
pub fn parse_request(buf: &mut Buffer) -> (ParseOutcome, Option<Command>) {
    let (outcome, args) = parse_array(buf);
    let Some(args) = args else {
        return (outcome, None);
    };
    let Some(verb) = args.first() else {
        return (ParseOutcome::Invalid, None);
    };
    let verb_upper = verb.to_ascii_uppercase();
    match verb_upper.as_slice() {
        b"QUIT" if args.len() == 1 => (ParseOutcome::Ok, Some(Command::Quit)),
        b"FLUSH" if args.len() == 1 => (ParseOutcome::Ok, Some(Command::FlushAll { noreply: false })),
        b"GET" | b"MGET" if args.len() >= 2 => {
            (ParseOutcome::Ok, Some(Command::Get { keys: args[1..].to_vec(), with_cas: false }))
        }
        b"DELETE" if args.len() == 2 => (ParseOutcome::Ok, Some(Command::Delete { key: args[1].clone(), noreply: false })),
        b"SET" if args.len() == 3 => (
            ParseOutcome::Ok,
            Some(Command::Set { key: args[1].clone(), flags: 0, exptime: 0, value: args[2].clone(), noreply: false }),
        ),
        b"INCRBY" if args.len() == 3 => {
            let Some(delta) = std::str::from_utf8(&args[2]).ok().and_then(|s| s.parse().ok()) else {
                return (ParseOutcome::Invalid, None);
            };
            (ParseOutcome::Ok, Some(Command::Incr { key: args[1].clone(), delta, noreply: false }))
        }
        b"DECRBY" if args.len() == 3 => {
            let Some(delta) = std::str::from_utf8(&args[2]).ok().and_then(|s| s.parse().ok()) else {
                return (ParseOutcome::Invalid, None);
            };
            (ParseOutcome::Ok, Some(Command::Decr { key: args[1].clone(), delta, noreply: false }))
        }
        _ => (ParseOutcome::Other("unsupported command or wrong arity"), None),
    }
}

/// Compose a [`Command`] back onto the wire as a RESP array of bulk
/// strings, the inverse of [`parse_request`] (spec.md §4.4.4's composer
/// contract covers `Request` as well as `Response`).
pub fn compose_request(cmd: &Command, buf: &mut Buffer) -> Result<(), crate::error::ComposeError> {
    fn bulk(buf: &mut Buffer, s: &[u8]) -> Result<(), crate::error::ComposeError> {
        buf.write(format!("${}\r\n", s.len()).as_bytes())?;
        buf.write(s)?;
        buf.write(CRLF)?;
        Ok(())
    }
    fn array(buf: &mut Buffer, parts: &[&[u8]]) -> Result<(), crate::error::ComposeError> {
        buf.write(format!("*{}\r\n", parts.len()).as_bytes())?;
        for p in parts {
            bulk(buf, p)?;
        }
        Ok(())
    }

    match cmd {
        Command::Quit => array(buf, &[b"quit"]),
        Command::FlushAll { .. } => array(buf, &[b"flush"]),
        Command::Get { keys, .. } => {
            let mut parts: Vec<&[u8]> = vec![b"get"];
            parts.extend(keys.iter().map(|k| k.as_slice()));
            array(buf, &parts)
        }
        Command::Delete { key, .. } => array(buf, &[b"delete", key]),
        Command::Set { key, value, .. } => array(buf, &[b"set", key, value]),
        Command::Incr { key, delta, .. } => array(buf, &[b"incrby", key, delta.to_string().as_bytes()]),
        Command::Decr { key, delta, .. } => array(buf, &[b"decrby", key, delta.to_string().as_bytes()]),
        other => Err(crate::error::ComposeError::Unsupported(format!("{other:?} has no RESP encoding"))),
    }
}

/// Compose `resp` as a RESP reply. `Values` only ever carries one entry in
/// the RESP flavor (no multi-key `GET`), matching the argument-arity rules
/// in `parse_request` above.
pub fn compose_response(resp: &Response, buf: &mut Buffer) -> Result<(), crate::error::ComposeError> {
    match resp {
        Response::Stored | Response::Deleted | Response::Ok => buf.write(b"+OK\r\n")?,
        Response::NotStored | Response::NotFound => buf.write(b"$-1\r\n")?,
        Response::Exists => buf.write(b"-EXISTS item exists with a different cas value\r\n")?,
        Response::Number(n) => buf.write(format!(":{n}\r\n").as_bytes())?,
        Response::Error(msg) | Response::ClientError(msg) | Response::ServerError(msg) => {
            buf.write(format!("-ERR {msg}\r\n").as_bytes())?
        }
        Response::Suppressed => {}
        Response::Values(entries) => match entries.first() {
            None => buf.write(b"$-1\r\n")?,
            Some(v) => {
                buf.write(format!("${}\r\n", v.value.len()).as_bytes())?;
                buf.write(&v.value)?;
                buf.write(CRLF)?;
            }
        },
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_get_array() {
        let mut buf = Buffer::new(64, 4);
        buf.write(b"*2\r\n$3\r\nGET\r\n$3\r\nfoo\r\n").unwrap();
        let (outcome, cmd) = parse_request(&mut buf);
        assert_eq!(outcome, ParseOutcome::Ok);
        assert_eq!(cmd, Some(Command::Get { keys: vec![b"foo".to_vec()], with_cas: false }));
        assert_eq!(buf.unread_len(), 0);
    }

    #[test]
    fn parse_set_array() {
        let mut buf = Buffer::new(64, 4);
        buf.write(b"*3\r\n$3\r\nSET\r\n$1\r\nk\r\n$1\r\nv\r\n").unwrap();
        let (outcome, cmd) = parse_request(&mut buf);
        assert_eq!(outcome, ParseOutcome::Ok);
        assert_eq!(cmd, Some(Command::Set { key: b"k".to_vec(), flags: 0, exptime: 0, value: b"v".to_vec(), noreply: false }));
    }

    #[test]
    fn incomplete_bulk_string_returns_unfin() {
        let mut buf = Buffer::new(64, 4);
        buf.write(b"*2\r\n$3\r\nGET\r\n$3\r\nfo").unwrap();
        let rpos = buf.rpos();
        let (outcome, cmd) = parse_request(&mut buf);
        assert_eq!(outcome, ParseOutcome::Unfin);
        assert!(cmd.is_none());
        assert_eq!(buf.rpos(), rpos);
    }

    #[test]
    fn unsupported_arity_is_other() {
        let mut buf = Buffer::new(64, 4);
        buf.write(b"*1\r\n$3\r\nGET\r\n").unwrap();
        let (outcome, cmd) = parse_request(&mut buf);
        assert_eq!(outcome, ParseOutcome::Other("unsupported command or wrong arity"));
        assert!(cmd.is_none());
    }

    #[test]
    fn compose_number_reply() {
        let mut buf = Buffer::new(64, 4);
        compose_response(&Response::Number(42), &mut buf).unwrap();
        assert_eq!(buf.readable(), b":42\r\n");
    }

    #[test]
    fn compose_missing_value_is_nil_bulk_string() {
        let mut buf = Buffer::new(64, 4);
        compose_response(&Response::Values(vec![]), &mut buf).unwrap();
        assert_eq!(buf.readable(), b"$-1\r\n");
    }

    #[test]
    fn parse_quit_takes_no_args() {
        let mut buf = Buffer::new(64, 4);
        buf.write(b"*1\r\n$4\r\nQUIT\r\n").unwrap();
        let (outcome, cmd) = parse_request(&mut buf);
        assert_eq!(outcome, ParseOutcome::Ok);
        assert_eq!(cmd, Some(Command::Quit));
    }

    #[test]
    fn parse_flush_takes_no_args() {
        let mut buf = Buffer::new(64, 4);
        buf.write(b"*1\r\n$5\r\nFLUSH\r\n").unwrap();
        let (outcome, cmd) = parse_request(&mut buf);
        assert_eq!(outcome, ParseOutcome::Ok);
        assert_eq!(cmd, Some(Command::FlushAll { noreply: false }));
    }

    #[test]
    fn parse_mget_is_variadic_like_get() {
        let mut buf = Buffer::new(64, 4);
        buf.write(b"*3\r\n$4\r\nMGET\r\n$1\r\na\r\n$1\r\nb\r\n").unwrap();
        let (outcome, cmd) = parse_request(&mut buf);
        assert_eq!(outcome, ParseOutcome::Ok);
        assert_eq!(cmd, Some(Command::Get { keys: vec![b"a".to_vec(), b"b".to_vec()], with_cas: false }));
    }

    #[test]
    fn compose_request_then_parse_recovers_get() {
        let cmd = Command::Get { keys: vec![b"foo".to_vec()], with_cas: false };
        let mut buf = Buffer::new(64, 4);
        compose_request(&cmd, &mut buf).unwrap();
        let (outcome, parsed) = parse_request(&mut buf);
        assert_eq!(outcome, ParseOutcome::Ok);
        assert_eq!(parsed, Some(cmd));
    }

    #[test]
    fn compose_request_then_parse_recovers_incrby() {
        let cmd = Command::Incr { key: b"foo".to_vec(), delta: 909, noreply: false };
        let mut buf = Buffer::new(64, 4);
        compose_request(&cmd, &mut buf).unwrap();
        let (outcome, parsed) = parse_request(&mut buf);
        assert_eq!(outcome, ParseOutcome::Ok);
        assert_eq!(parsed, Some(cmd));
    }

    #[test]
    fn compose_request_then_parse_recovers_quit() {
        let mut buf = Buffer::new(64, 4);
        compose_request(&Command::Quit, &mut buf).unwrap();
        let (outcome, parsed) = parse_request(&mut buf);
        assert_eq!(outcome, ParseOutcome::Ok);
        assert_eq!(parsed, Some(Command::Quit));
    }
}
