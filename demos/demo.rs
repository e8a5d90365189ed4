//! End-to-end walkthrough of the storage engine and both wire codecs,
//! exercised the way an embedder's connection loop would: bytes in,
//! parse, dispatch, compose, bytes out.

use twemcache_core::buffer::Buffer;
use twemcache_core::config::Config;
use twemcache_core::protocol::{self, Flavor};
use twemcache_core::Cache;

fn main() {
    tracing_subscriber_init();

    let mut cfg = Config::default();
    cfg.slab_size = 1024 * 1024;
    cfg.slab_profile = vec![64, 128, 256, 512, 1024];
    let mut cache = Cache::setup(&cfg, 0);

    println!("twemcache-core demo");
    println!("===================\n");

    run_memcache_round_trip(&mut cache);
    run_annex(&mut cache);
    run_resp_round_trip(&mut cache);
    run_flush(&mut cache);

    let snap = cache.stats().snapshot();
    println!("\nfinal stats: {snap:#?}");
}

fn run_memcache_round_trip(cache: &mut Cache) {
    println!("-- memcache: set + get --");
    let mut buf = Buffer::new(256, 4);
    buf.write(b"set greeting 0 0 5\r\nhello\r\n").unwrap();
    let (_, cmd) = protocol::parse_request_tracked(Flavor::Memcache, &mut buf, cache.stats());
    let resp = protocol::dispatch(cache, cmd.expect("parsed set"));
    protocol::compose_response_tracked(Flavor::Memcache, &resp, &mut buf, cache.stats()).unwrap();
    print_out(&mut buf);

    buf.write(b"get greeting\r\n").unwrap();
    let (_, cmd) = protocol::parse_request_tracked(Flavor::Memcache, &mut buf, cache.stats());
    let resp = protocol::dispatch(cache, cmd.expect("parsed get"));
    protocol::compose_response_tracked(Flavor::Memcache, &resp, &mut buf, cache.stats()).unwrap();
    print_out(&mut buf);
}

fn run_annex(cache: &mut Cache) {
    println!("-- memcache: append --");
    let mut buf = Buffer::new(256, 4);
    buf.write(b"append greeting 0 0 6\r\n world\r\n").unwrap();
    let (_, cmd) = protocol::parse_request_tracked(Flavor::Memcache, &mut buf, cache.stats());
    let resp = protocol::dispatch(cache, cmd.expect("parsed append"));
    protocol::compose_response_tracked(Flavor::Memcache, &resp, &mut buf, cache.stats()).unwrap();
    print_out(&mut buf);

    buf.write(b"get greeting\r\n").unwrap();
    let (_, cmd) = protocol::parse_request_tracked(Flavor::Memcache, &mut buf, cache.stats());
    let resp = protocol::dispatch(cache, cmd.expect("parsed get"));
    protocol::compose_response_tracked(Flavor::Memcache, &resp, &mut buf, cache.stats()).unwrap();
    print_out(&mut buf);
}

fn run_resp_round_trip(cache: &mut Cache) {
    println!("-- resp: set + get --");
    let mut buf = Buffer::new(256, 4);
    buf.write(b"*3\r\n$3\r\nSET\r\n$7\r\ncounter\r\n$1\r\n0\r\n").unwrap();
    let (_, cmd) = protocol::parse_request_tracked(Flavor::Resp, &mut buf, cache.stats());
    let resp = protocol::dispatch(cache, cmd.expect("parsed set"));
    protocol::compose_response_tracked(Flavor::Resp, &resp, &mut buf, cache.stats()).unwrap();
    print_out(&mut buf);

    buf.write(b"*3\r\n$6\r\nINCRBY\r\n$7\r\ncounter\r\n$2\r\n41\r\n").unwrap();
    let (_, cmd) = protocol::parse_request_tracked(Flavor::Resp, &mut buf, cache.stats());
    let resp = protocol::dispatch(cache, cmd.expect("parsed incrby"));
    protocol::compose_response_tracked(Flavor::Resp, &resp, &mut buf, cache.stats()).unwrap();
    print_out(&mut buf);
}

fn run_flush(cache: &mut Cache) {
    println!("-- memcache: flush_all --");
    let mut buf = Buffer::new(256, 4);
    buf.write(b"flush_all\r\n").unwrap();
    let (_, cmd) = protocol::parse_request_tracked(Flavor::Memcache, &mut buf, cache.stats());
    let resp = protocol::dispatch(cache, cmd.expect("parsed flush_all"));
    protocol::compose_response_tracked(Flavor::Memcache, &resp, &mut buf, cache.stats()).unwrap();
    print_out(&mut buf);

    buf.write(b"get greeting\r\n").unwrap();
    let (_, cmd) = protocol::parse_request_tracked(Flavor::Memcache, &mut buf, cache.stats());
    let resp = protocol::dispatch(cache, cmd.expect("parsed get"));
    protocol::compose_response_tracked(Flavor::Memcache, &resp, &mut buf, cache.stats()).unwrap();
    print_out(&mut buf);
}

fn print_out(buf: &mut Buffer) {
    let out = buf.readable().to_vec();
    print!("  {}", String::from_utf8_lossy(&out).replace("\r\n", "\\r\\n\n  "));
    println!();
    buf.advance_rpos(out.len());
    buf.shrink();
}

fn tracing_subscriber_init() {
    // No subscriber wired here; this crate depends only on the `tracing`
    // facade. An embedder picks the subscriber (fmt, journald, etc).
}
