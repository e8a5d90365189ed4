//! Wire protocols (spec.md §4.4): two codecs sharing one [`Command`]/
//! [`Response`] vocabulary, so dispatch against [`crate::engine::Cache`] is
//! written once in [`crate::protocol::dispatch`] rather than duplicated per
//! flavor.

pub mod memcache;
pub mod request;
pub mod resp;
pub mod response;

pub use request::Command;
pub use response::{Response, ValueEntry};

use crate::buffer::Buffer;
use crate::engine::Cache;
use crate::error::{CoreError, ParseOutcome};
use crate::stats::Stats;

/// Which wire flavor a connection speaks (spec.md §4.4: "memcached ASCII"
/// vs "RESP-style"). Fixed per connection; never switches mid-stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flavor {
    Memcache,
    Resp,
}

impl Flavor {
    pub fn parse_request(self, buf: &mut Buffer) -> (ParseOutcome, Option<Command>) {
        match self {
            Flavor::Memcache => memcache::parse_request(buf),
            Flavor::Resp => resp::parse_request(buf),
        }
    }

    pub fn compose_response(self, resp: &Response, buf: &mut Buffer) -> Result<(), crate::error::ComposeError> {
        match self {
            Flavor::Memcache => memcache::compose_response(resp, buf),
            Flavor::Resp => resp::compose_response(resp, buf),
        }
    }

    /// Compose a [`Command`] back onto the wire, the inverse of
    /// [`Flavor::parse_request`] (spec.md §4.4.4, §8 Invariant 1's
    /// round-trip codec property).
    pub fn compose_request(self, cmd: &Command, buf: &mut Buffer) -> Result<(), crate::error::ComposeError> {
        match self {
            Flavor::Memcache => memcache::compose_request(cmd, buf),
            Flavor::Resp => resp::compose_request(cmd, buf),
        }
    }
}

/// Like [`Flavor::parse_request`], but also records `bytes_parsed` and
/// `parse_invalid` on `stats` (spec.md's ambient metrics plane) and emits a
/// `tracing::warn!` on `INVALID`, since a malformed request from a client
/// is the one parser outcome worth surfacing to an operator.
pub fn parse_request_tracked(flavor: Flavor, buf: &mut Buffer, stats: &Stats) -> (ParseOutcome, Option<Command>) {
    let before = buf.rpos();
    let (outcome, cmd) = flavor.parse_request(buf);
    let consumed = buf.rpos() - before;
    if consumed > 0 {
        Stats::add(&stats.bytes_parsed, consumed as u64);
    }
    if outcome == ParseOutcome::Invalid {
        Stats::inc(&stats.parse_invalid);
        tracing::warn!(?flavor, "parser returned INVALID");
    }
    (outcome, cmd)
}

/// Like [`Flavor::compose_response`], but also records `bytes_composed` on
/// `stats`.
pub fn compose_response_tracked(flavor: Flavor, resp: &Response, buf: &mut Buffer, stats: &Stats) -> Result<(), crate::error::ComposeError> {
    let before = buf.wpos();
    flavor.compose_response(resp, buf)?;
    let written = buf.wpos() - before;
    if written > 0 {
        Stats::add(&stats.bytes_composed, written as u64);
    }
    Ok(())
}

/// Apply `command` to `cache`, producing the [`Response`] to compose back.
/// This is the one place request variants are mapped onto
/// [`crate::engine::Cache`] operations, shared by both protocol flavors.
pub fn dispatch(cache: &mut Cache, command: Command) -> Response {
    if command.is_noreply() {
        apply(cache, command);
        return Response::Suppressed;
    }
    apply(cache, command)
}

fn apply(cache: &mut Cache, command: Command) -> Response {
    match command {
        // Connection teardown is the embedder's job (spec.md §1's
        // non-goals); this core only reports that it was asked to quit.
        Command::Quit => Response::Suppressed,
        Command::Get { keys, with_cas } => {
            let mut entries = Vec::with_capacity(keys.len());
            for key in keys {
                if let Some(got) = cache.item_get(&key) {
                    entries.push(ValueEntry {
                        key,
                        flags: got.data.meta.dataflag,
                        value: got.data.value,
                        cas: if with_cas { got.data.meta.cas } else { None },
                    });
                }
            }
            Response::Values(entries)
        }
        Command::Set { key, flags, exptime, value, .. } => {
            result_to_response(cache.item_set(&key, &value, flags, exptime), Response::Stored)
        }
        Command::Add { key, flags, exptime, value, .. } => {
            result_to_response(cache.item_add(&key, &value, flags, exptime), Response::Stored)
        }
        Command::Replace { key, flags, exptime, value, .. } => {
            result_to_response(cache.item_replace(&key, &value, flags, exptime), Response::Stored)
        }
        Command::Cas { key, flags, exptime, value, cas, .. } => {
            result_to_response(cache.item_cas(&key, &value, flags, exptime, cas), Response::Stored)
        }
        Command::Append { key, value, .. } => result_to_response(cache.item_annex(&key, &value, false), Response::Stored),
        Command::Prepend { key, value, .. } => result_to_response(cache.item_annex(&key, &value, true), Response::Stored),
        Command::Incr { key, delta, .. } => match cache.item_incr(&key, delta, false) {
            Ok(v) => Response::Number(v),
            Err(e) => e.into(),
        },
        Command::Decr { key, delta, .. } => match cache.item_incr(&key, delta, true) {
            Ok(v) => Response::Number(v),
            Err(e) => e.into(),
        },
        Command::Delete { key, .. } => result_to_response(cache.item_delete(&key), Response::Deleted),
        Command::FlushAll { .. } => {
            cache.item_flush();
            Response::Ok
        }
    }
}

fn result_to_response(result: Result<(), CoreError>, ok: Response) -> Response {
    match result {
        Ok(()) => ok,
        Err(e) => e.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn cache() -> Cache {
        let mut cfg = Config::default();
        cfg.slab_size = 4096;
        cfg.slab_profile = vec![64, 128, 256];
        Cache::setup(&cfg, 0)
    }

    #[test]
    fn dispatch_set_then_get_round_trips_through_memcache_flavor() {
        let mut cache = cache();
        let mut buf = Buffer::new(128, 4);
        buf.write(b"set k 0 0 3\r\nabc\r\n").unwrap();
        let (_, cmd) = Flavor::Memcache.parse_request(&mut buf);
        let resp = dispatch(&mut cache, cmd.unwrap());
        assert_eq!(resp, Response::Stored);

        buf.write(b"get k\r\n").unwrap();
        let (_, cmd) = Flavor::Memcache.parse_request(&mut buf);
        let resp = dispatch(&mut cache, cmd.unwrap());
        match resp {
            Response::Values(entries) => assert_eq!(entries[0].value, b"abc"),
            other => panic!("expected Values, got {other:?}"),
        }
    }

    #[test]
    fn noreply_commands_produce_suppressed_response() {
        let mut cache = cache();
        let command = Command::Set { key: b"k".to_vec(), flags: 0, exptime: 0, value: b"v".to_vec(), noreply: true };
        assert_eq!(dispatch(&mut cache, command), Response::Suppressed);
        assert!(cache.item_get(b"k").is_some());
    }

    #[test]
    fn delete_missing_key_maps_core_error_to_not_found() {
        let mut cache = cache();
        let command = Command::Delete { key: b"missing".to_vec(), noreply: false };
        assert_eq!(dispatch(&mut cache, command), Response::NotFound);
    }

    #[test]
    fn quit_is_suppressed_and_touches_nothing() {
        let mut cache = cache();
        assert_eq!(dispatch(&mut cache, Command::Quit), Response::Suppressed);
    }
}
