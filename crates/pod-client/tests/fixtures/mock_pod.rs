// SPDX-License-Identifier: MIT OR Apache-2.0
//! A minimal pod speaking the wire protocol over stdio, standing in
//! for a real babashka pod in lifecycle tests. Advertises one
//! immediate namespace (`mock.pod/core`) and one deferred namespace
//! (`mock.pod/deferred`) resolved via `load-ns`, and negotiates JSON
//! payloads to avoid needing an EDN writer here too.

use std::collections::BTreeMap;
use std::io::{Read, Write};

use pod_client::bencode::{BValue, Envelope, decode_envelope, encode_envelope, get_maybe_string, get_string};

fn scan_value(buf: &[u8], pos: usize) -> Option<usize> {
    if pos >= buf.len() {
        return None;
    }
    match buf[pos] {
        b'i' => buf[pos..].iter().position(|&b| b == b'e').map(|i| pos + i + 1),
        b'd' | b'l' => {
            let mut cur = pos + 1;
            loop {
                if cur >= buf.len() {
                    return None;
                }
                if buf[cur] == b'e' {
                    return Some(cur + 1);
                }
                cur = scan_value(buf, cur)?;
            }
        }
        b'0'..=b'9' => {
            let colon = buf[pos..].iter().position(|&b| b == b':')? + pos;
            let len: usize = std::str::from_utf8(&buf[pos..colon]).ok()?.parse().ok()?;
            let end = colon + 1 + len;
            (end <= buf.len()).then_some(end)
        }
        _ => None,
    }
}

fn read_envelope(stdin: &mut impl Read, buf: &mut Vec<u8>) -> Option<Envelope> {
    let mut chunk = [0u8; 4096];
    loop {
        if let Some(end) = scan_value(buf, 0) {
            let envelope = decode_envelope(&buf[..end]).ok()??;
            buf.drain(..end);
            return Some(envelope);
        }
        let n = stdin.read(&mut chunk).ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
}

fn write_envelope(stdout: &mut impl Write, envelope: &Envelope) {
    let bytes = encode_envelope(envelope).expect("mock pod envelope encodes");
    stdout.write_all(&bytes).expect("mock pod stdout write");
    stdout.flush().expect("mock pod stdout flush");
}

fn var_dict(name: &str, is_async: bool) -> BValue {
    let mut d = BTreeMap::new();
    d.insert("name".to_string(), BValue::text(name));
    if is_async {
        d.insert("async".to_string(), BValue::boolean(true));
    }
    BValue::Dict(d)
}

fn namespace_dict(name: &str, defer: bool, vars: Vec<BValue>) -> BValue {
    let mut d = BTreeMap::new();
    d.insert("name".to_string(), BValue::text(name));
    if defer {
        d.insert("defer".to_string(), BValue::boolean(true));
    }
    d.insert("vars".to_string(), BValue::List(vars));
    BValue::Dict(d)
}

fn describe_reply(id: &str) -> Envelope {
    let mut e = Envelope::new();
    e.insert("id".to_string(), BValue::text(id));
    e.insert("format".to_string(), BValue::text("json"));
    e.insert(
        "ops".to_string(),
        BValue::List(vec![
            BValue::text("invoke"),
            BValue::text("load-ns"),
            BValue::text("shutdown"),
        ]),
    );
    e.insert(
        "namespaces".to_string(),
        BValue::List(vec![
            namespace_dict(
                "mock.pod/core",
                false,
                vec![
                    var_dict("echo", false),
                    var_dict("add", false),
                    var_dict("boom", false),
                    var_dict("stream-count", true),
                    var_dict("crash-silently", false),
                ],
            ),
            namespace_dict("mock.pod/deferred", true, vec![]),
        ]),
    );
    e
}

fn reply_value(stdout: &mut impl Write, id: &str, value: &serde_json::Value) {
    let mut e = Envelope::new();
    e.insert("id".to_string(), BValue::text(id));
    e.insert(
        "value".to_string(),
        BValue::text(serde_json::to_string(value).unwrap()),
    );
    e.insert("status".to_string(), BValue::List(vec![BValue::text("done")]));
    write_envelope(stdout, &e);
}

fn reply_error(stdout: &mut impl Write, id: &str, message: &str, data: &serde_json::Value) {
    let mut e = Envelope::new();
    e.insert("id".to_string(), BValue::text(id));
    e.insert("ex-message".to_string(), BValue::text(message));
    e.insert(
        "ex-data".to_string(),
        BValue::text(serde_json::to_string(data).unwrap()),
    );
    e.insert(
        "status".to_string(),
        BValue::List(vec![BValue::text("done"), BValue::text("error")]),
    );
    write_envelope(stdout, &e);
}

fn handle_invoke(stdout: &mut impl Write, req: &Envelope, id: &str) {
    let var = get_string(req, "var").unwrap_or_default();
    let args_str = get_maybe_string(req, "args").unwrap_or_else(|| "[]".into());
    let args: Vec<serde_json::Value> = serde_json::from_str(&args_str).unwrap_or_default();
    let name = var.rsplit('/').next().unwrap_or("");

    match name {
        "echo" => {
            let value = args.first().cloned().unwrap_or(serde_json::Value::Null);
            reply_value(stdout, id, &value);
        }
        "add" => {
            let sum: i64 = args.iter().filter_map(|v| v.as_i64()).sum();
            reply_value(stdout, id, &serde_json::json!(sum));
        }
        "boom" => {
            reply_error(stdout, id, "boom exploded", &serde_json::json!({"reason": "test"}));
        }
        "stream-count" => {
            let n = args.first().and_then(|v| v.as_i64()).unwrap_or(0);
            for i in 0..n {
                let mut e = Envelope::new();
                e.insert("id".to_string(), BValue::text(id));
                e.insert(
                    "value".to_string(),
                    BValue::text(serde_json::to_string(&serde_json::json!(i)).unwrap()),
                );
                write_envelope(stdout, &e);
            }
            let mut done = Envelope::new();
            done.insert("id".to_string(), BValue::text(id));
            done.insert("status".to_string(), BValue::List(vec![BValue::text("done")]));
            write_envelope(stdout, &done);
        }
        "crash-silently" => std::process::exit(1),
        _ => reply_error(stdout, id, &format!("unknown var {var}"), &serde_json::Value::Null),
    }
}

fn handle_load_ns(stdout: &mut impl Write, req: &Envelope, id: &str) {
    let ns = get_string(req, "ns").unwrap_or_default();
    let mut e = Envelope::new();
    e.insert("id".to_string(), BValue::text(id));
    e.insert("name".to_string(), BValue::text(ns));
    e.insert("vars".to_string(), BValue::List(vec![var_dict("greet", false)]));
    write_envelope(stdout, &e);
}

fn main() {
    let stdin = std::io::stdin();
    let mut stdin = stdin.lock();
    let stdout = std::io::stdout();
    let mut stdout = stdout.lock();
    let mut buf = Vec::new();

    loop {
        let Some(req) = read_envelope(&mut stdin, &mut buf) else {
            break;
        };
        let op = get_maybe_string(&req, "op").unwrap_or_default();
        let id = get_maybe_string(&req, "id").unwrap_or_default();

        match op.as_str() {
            "describe" => write_envelope(&mut stdout, &describe_reply(&id)),
            "invoke" => handle_invoke(&mut stdout, &req, &id),
            "load-ns" => handle_load_ns(&mut stdout, &req, &id),
            "shutdown" => break,
            _ => {}
        }
    }
}
