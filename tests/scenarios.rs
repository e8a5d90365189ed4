//! Cross-module scenarios and invariants (spec.md §8), written as concrete
//! tests rather than a property-testing harness — see DESIGN.md's ambient
//! stack entry for why.

use twemcache_core::buffer::Buffer;
use twemcache_core::config::Config;
use twemcache_core::error::ParseOutcome;
use twemcache_core::protocol::{self, Command, Flavor, Response};
use twemcache_core::Cache;

fn small_cache() -> Cache {
    let mut cfg = Config::default();
    cfg.slab_size = 4096;
    cfg.slab_profile = vec![32, 64, 128, 256];
    Cache::setup(&cfg, 0)
}

// S1 — QUIT round-trip (RESP): compose {type: QUIT} then parse the
// resulting bytes back, matching spec.md's `*1\r\n$4\r\nquit\r\n` exactly.
#[test]
fn s1_resp_quit_round_trip() {
    let mut buf = Buffer::new(64, 4);
    Flavor::Resp.compose_request(&Command::Quit, &mut buf).unwrap();
    assert_eq!(buf.readable(), b"*1\r\n$4\r\nquit\r\n");
    let (outcome, cmd) = Flavor::Resp.parse_request(&mut buf);
    assert_eq!(outcome, ParseOutcome::Ok);
    assert_eq!(cmd, Some(Command::Quit));
}

// S2 — GET round-trip (RESP): one key recovered from a bulk-string array.
#[test]
fn s2_resp_get_round_trip() {
    let mut buf = Buffer::new(64, 4);
    buf.write(b"*2\r\n$3\r\nGET\r\n$3\r\nfoo\r\n").unwrap();
    let (outcome, cmd) = Flavor::Resp.parse_request(&mut buf);
    assert_eq!(outcome, ParseOutcome::Ok);
    assert_eq!(cmd, Some(Command::Get { keys: vec![b"foo".to_vec()], with_cas: false }));
}

// S3 — SET then GET: klen/vlen/value all round-trip through the engine.
#[test]
fn s3_set_then_get() {
    let mut cache = small_cache();
    cache.item_set(b"foo", b"XYZ", 0, 0).unwrap();
    let got = cache.item_get(b"foo").unwrap();
    assert_eq!(got.data.meta.vlen, 3);
    assert_eq!(got.data.meta.klen, 3);
    assert_eq!(got.data.value, b"XYZ");
}

// S4 — INCRBY round-trip with delta 909 (RESP): parse side (verb arrives
// uppercase over the wire, as a real client would send it)...
#[test]
fn s4_resp_incrby_round_trip() {
    let mut buf = Buffer::new(64, 4);
    buf.write(b"*3\r\n$6\r\nINCRBY\r\n$3\r\nfoo\r\n$3\r\n909\r\n").unwrap();
    let (outcome, cmd) = Flavor::Resp.parse_request(&mut buf);
    assert_eq!(outcome, ParseOutcome::Ok);
    assert_eq!(cmd, Some(Command::Incr { key: b"foo".to_vec(), delta: 909, noreply: false }));
}

// ...and the compose side, matching spec.md's literal byte example for the
// same scenario: compose {INCR, foo, 909} -> *3\r\n$6\r\nincrby\r\n$3\r\nfoo\r\n$3\r\n909\r\n.
#[test]
fn s4_resp_incrby_compose_matches_spec_bytes() {
    let cmd = Command::Incr { key: b"foo".to_vec(), delta: 909, noreply: false };
    let mut buf = Buffer::new(64, 4);
    Flavor::Resp.compose_request(&cmd, &mut buf).unwrap();
    assert_eq!(buf.readable(), b"*3\r\n$6\r\nincrby\r\n$3\r\nfoo\r\n$3\r\n909\r\n");
}

// S5 — annex across a class boundary: saturate the smallest class, then
// append enough bytes to force a move into a larger class. Observable
// through the public API: the concatenated value still resolves by key.
#[test]
fn s5_annex_crosses_class_boundary() {
    let mut cache = small_cache();
    // small enough to land in the smallest class that fits key+header+value
    cache.item_set(b"k", &[b'a'; 10], 0, 0).unwrap();
    let extra = vec![b'b'; 64];
    cache.item_annex(b"k", &extra, false).unwrap();
    let got = cache.item_get(b"k").unwrap();
    assert_eq!(got.data.value.len(), 10 + 64);
    assert!(got.data.value[..10].iter().all(|&b| b == b'a'));
    assert!(got.data.value[10..].iter().all(|&b| b == b'b'));
}

// S6 — partial parse: feeding a request in two pieces across the `get`
// keyword boundary returns UNFIN without consuming, then OK once complete.
#[test]
fn s6_partial_parse_across_two_writes() {
    let mut buf = Buffer::new(64, 4);
    buf.write(b"*2\r\n$3\r\nget").unwrap();
    let rpos_before = buf.rpos();
    let (outcome, cmd) = Flavor::Resp.parse_request(&mut buf);
    assert_eq!(outcome, ParseOutcome::Unfin);
    assert!(cmd.is_none());
    assert_eq!(buf.rpos(), rpos_before);

    buf.write(b"\r\n$3\r\nfoo\r\n").unwrap();
    let (outcome, cmd) = Flavor::Resp.parse_request(&mut buf);
    assert_eq!(outcome, ParseOutcome::Ok);
    assert_eq!(cmd, Some(Command::Get { keys: vec![b"foo".to_vec()], with_cas: false }));
}

// Invariant 2 — incremental parse: feeding a memcache `get` byte by byte
// never advances `rpos` until the full line has arrived, and the final
// result matches feeding it in one shot.
#[test]
fn invariant_incremental_parse_matches_one_shot() {
    let line = b"get foo\r\n";

    let mut one_shot = Buffer::new(64, 4);
    one_shot.write(line).unwrap();
    let (outcome_one_shot, cmd_one_shot) = Flavor::Memcache.parse_request(&mut one_shot);

    let mut incremental = Buffer::new(64, 4);
    let mut last = (ParseOutcome::Unfin, None);
    for &byte in &line[..line.len() - 1] {
        incremental.write(&[byte]).unwrap();
        let before = incremental.rpos();
        last = Flavor::Memcache.parse_request(&mut incremental);
        assert_eq!(last.0, ParseOutcome::Unfin);
        assert_eq!(incremental.rpos(), before);
    }
    incremental.write(&line[line.len() - 1..]).unwrap();
    last = Flavor::Memcache.parse_request(&mut incremental);

    assert_eq!(last.0, outcome_one_shot);
    assert_eq!(last.1, cmd_one_shot);
}

// Invariant 3 — expiration correctness: live before expiry, gone after,
// with the lazy unlink observed via `curr_items`.
#[test]
fn invariant_expiration_correctness() {
    let mut cache = small_cache();
    cache.item_set(b"k", b"v", 0, 1).unwrap();
    assert!(cache.item_get(b"k").is_some());
    std::thread::sleep(std::time::Duration::from_millis(2100));
    cache.tick();
    assert!(cache.item_get(b"k").is_none());
}

// Invariant 4 — flush monotonicity: every key inserted strictly before the
// flush is gone on next access.
#[test]
fn invariant_flush_monotonicity() {
    let mut cache = small_cache();
    cache.item_set(b"a", b"1", 0, 0).unwrap();
    cache.item_set(b"b", b"2", 0, 0).unwrap();
    cache.tick();
    cache.item_flush();
    assert!(cache.item_get(b"a").is_none());
    assert!(cache.item_get(b"b").is_none());
}

// Invariant 7 — CAS monotonicity: successive mutations produce strictly
// increasing CAS stamps.
#[test]
fn invariant_cas_monotonicity() {
    let mut cache = small_cache();
    cache.item_set(b"k", b"v1", 0, 0).unwrap();
    let cas_a = cache.item_get(b"k").unwrap().data.meta.cas.unwrap();
    cache.item_set(b"k", b"v2", 0, 0).unwrap();
    let cas_b = cache.item_get(b"k").unwrap().data.meta.cas.unwrap();
    assert!(cas_b > cas_a);
}

// Invariant 8 — annex equivalence: APPEND and PREPEND both commute with
// the insert, whichever path (in-place or realloc) is taken.
#[test]
fn invariant_annex_equivalence() {
    let mut append_cache = small_cache();
    append_cache.item_set(b"k", b"v1", 0, 0).unwrap();
    append_cache.item_annex(b"k", b"v2", false).unwrap();
    assert_eq!(append_cache.item_get(b"k").unwrap().data.value, b"v1v2");

    let mut prepend_cache = small_cache();
    prepend_cache.item_set(b"k", b"v1", 0, 0).unwrap();
    prepend_cache.item_annex(b"k", b"v2", true).unwrap();
    assert_eq!(prepend_cache.item_get(b"k").unwrap().data.value, b"v2v1");
}

// End-to-end: memcache flavor dispatch through the shared Command/Response
// vocabulary, including a noreply suppression and stats bookkeeping.
#[test]
fn end_to_end_memcache_dispatch_updates_stats() {
    let mut cache = small_cache();
    let mut buf = Buffer::new(128, 4);
    buf.write(b"set k 0 0 3 noreply\r\nabc\r\n").unwrap();
    let (_, cmd) = protocol::parse_request_tracked(Flavor::Memcache, &mut buf, cache.stats());
    let resp = protocol::dispatch(&mut cache, cmd.unwrap());
    assert_eq!(resp, Response::Suppressed);

    buf.write(b"get k\r\n").unwrap();
    let (_, cmd) = protocol::parse_request_tracked(Flavor::Memcache, &mut buf, cache.stats());
    let resp = protocol::dispatch(&mut cache, cmd.unwrap());
    match resp {
        Response::Values(entries) => assert_eq!(entries[0].value, b"abc"),
        other => panic!("expected Values, got {other:?}"),
    }

    let snap = cache.stats().snapshot();
    assert_eq!(snap.get_hits, 1);
    assert_eq!(snap.total_items, 1);
    assert!(snap.bytes_parsed > 0);
}
