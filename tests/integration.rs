//! End-to-end tests against an in-process mock RIOC server, covering the
//! scripted scenarios from the wire-format spec this client implements.

use std::collections::BTreeMap;
use std::io::Read;
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};

use rioc::{Client, ClientConfig};

const CMD_GET: u16 = 1;
const CMD_INSERT: u16 = 2;
const CMD_DELETE: u16 = 3;
const CMD_RANGE_QUERY: u16 = 6;
const CMD_ATOMIC_INC_DEC: u16 = 7;

const STATUS_SUCCESS: i32 = 0;
const STATUS_NOENT: i32 = -6;

type Store = Arc<Mutex<BTreeMap<Vec<u8>, Vec<u8>>>>;

fn spawn_mock_server() -> (u16, std::thread::JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let store: Store = Arc::new(Mutex::new(BTreeMap::new()));

    let handle = std::thread::spawn(move || {
        for stream in listener.incoming() {
            let stream = match stream {
                Ok(s) => s,
                Err(_) => continue,
            };
            let store = Arc::clone(&store);
            std::thread::spawn(move || serve_connection(stream, store));
        }
    });
    (port, handle)
}

fn read_u16(stream: &mut TcpStream) -> Option<u16> {
    let mut buf = [0u8; 2];
    stream.read_exact(&mut buf).ok()?;
    Some(u16::from_le_bytes(buf))
}

fn read_u32(stream: &mut TcpStream) -> Option<u32> {
    let mut buf = [0u8; 4];
    stream.read_exact(&mut buf).ok()?;
    Some(u32::from_le_bytes(buf))
}

fn read_u64(stream: &mut TcpStream) -> Option<u64> {
    let mut buf = [0u8; 8];
    stream.read_exact(&mut buf).ok()?;
    Some(u64::from_le_bytes(buf))
}

fn write_response(stream: &mut TcpStream, status: i32, payload: &[u8]) {
    use std::io::Write;
    let mut buf = Vec::with_capacity(8 + payload.len());
    buf.extend_from_slice(&status.to_le_bytes());
    buf.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    buf.extend_from_slice(payload);
    stream.write_all(&buf).unwrap();
}

fn serve_connection(mut stream: TcpStream, store: Store) {
    loop {
        let mut batch_hdr = [0u8; 12];
        if stream.read_exact(&mut batch_hdr).is_err() {
            return;
        }
        let count = u16::from_le_bytes([batch_hdr[6], batch_hdr[7]]);

        for _ in 0..count {
            let command = match read_u16(&mut stream) {
                Some(c) => c,
                None => return,
            };
            let key_len = read_u16(&mut stream).unwrap();
            let value_len = read_u32(&mut stream).unwrap();
            let _timestamp = read_u64(&mut stream).unwrap();

            let mut key = vec![0u8; key_len as usize];
            stream.read_exact(&mut key).unwrap();

            match command {
                CMD_GET => {
                    let found = store.lock().unwrap().get(&key).cloned();
                    match found {
                        Some(v) => write_response(&mut stream, STATUS_SUCCESS, &v),
                        None => write_response(&mut stream, STATUS_NOENT, &[]),
                    }
                }
                CMD_INSERT => {
                    let mut value = vec![0u8; value_len as usize];
                    stream.read_exact(&mut value).unwrap();
                    store.lock().unwrap().insert(key, value);
                    write_response(&mut stream, STATUS_SUCCESS, &[]);
                }
                CMD_DELETE => {
                    store.lock().unwrap().remove(&key);
                    write_response(&mut stream, STATUS_SUCCESS, &[]);
                }
                CMD_ATOMIC_INC_DEC => {
                    let mut delta_buf = [0u8; 8];
                    stream.read_exact(&mut delta_buf).unwrap();
                    let delta = i64::from_le_bytes(delta_buf);
                    let mut guard = store.lock().unwrap();
                    let current = guard
                        .get(&key)
                        .and_then(|v| v.as_slice().try_into().ok())
                        .map(i64::from_le_bytes)
                        .unwrap_or(0);
                    let updated = current + delta;
                    guard.insert(key.clone(), updated.to_le_bytes().to_vec());
                    drop(guard);
                    write_response(&mut stream, STATUS_SUCCESS, &updated.to_le_bytes());
                }
                CMD_RANGE_QUERY => {
                    let mut end_key = vec![0u8; value_len as usize];
                    stream.read_exact(&mut end_key).unwrap();
                    let guard = store.lock().unwrap();
                    let matches: Vec<(Vec<u8>, Vec<u8>)> = guard
                        .range(key.clone()..=end_key.clone())
                        .map(|(k, v)| (k.clone(), v.clone()))
                        .collect();
                    drop(guard);

                    let mut header_buf = Vec::new();
                    header_buf.extend_from_slice(&STATUS_SUCCESS.to_le_bytes());
                    header_buf.extend_from_slice(&(matches.len() as u32).to_le_bytes());
                    use std::io::Write;
                    stream.write_all(&header_buf).unwrap();

                    for (k, v) in matches {
                        stream.write_all(&(k.len() as u16).to_le_bytes()).unwrap();
                        stream.write_all(&k).unwrap();
                        stream.write_all(&(v.len() as u64).to_le_bytes()).unwrap();
                        stream.write_all(&v).unwrap();
                    }
                }
                _ => write_response(&mut stream, STATUS_SUCCESS, &[]),
            }
        }
    }
}

#[test]
fn insert_get_delete_get_round_trip() {
    let (port, _server) = spawn_mock_server();
    let config = ClientConfig::new("127.0.0.1", port as u32);
    let mut client = Client::connect(&config).unwrap();

    client.insert(b"test_key", b"initial value", 1).unwrap();
    assert_eq!(client.get(b"test_key").unwrap().unwrap(), b"initial value");

    client.delete(b"test_key", 2).unwrap();
    assert!(client.get(b"test_key").unwrap().is_none());
}

#[test]
fn atomic_counter_creation_and_update() {
    let (port, _server) = spawn_mock_server();
    let config = ClientConfig::new("127.0.0.1", port as u32);
    let mut client = Client::connect(&config).unwrap();

    assert_eq!(client.atomic_inc_dec(b"test_counter", 5, 1).unwrap(), 5);
    assert_eq!(client.atomic_inc_dec(b"test_counter", 3, 2).unwrap(), 8);
    assert_eq!(client.atomic_inc_dec(b"test_counter", -2, 3).unwrap(), 6);
}

#[test]
fn batched_range_query() {
    let (port, _server) = spawn_mock_server();
    let config = ClientConfig::new("127.0.0.1", port as u32);
    let mut client = Client::connect(&config).unwrap();

    let entries = [
        ("range_a", "value_a"),
        ("range_b", "value_b"),
        ("range_c", "value_c"),
        ("range_d", "value_d"),
        ("range_e", "value_e"),
    ];
    for (i, (k, v)) in entries.iter().enumerate() {
        client.insert(k.as_bytes(), v.as_bytes(), i as u64 + 1).unwrap();
    }

    let results = client.range_query(b"range_b", b"range_d").unwrap();
    assert_eq!(results.len(), 3);
    assert_eq!(results[0].key, b"range_b");
    assert_eq!(results[1].key, b"range_c");
    assert_eq!(results[2].key, b"range_d");
}

#[test]
fn batch_of_mixed_ops_executes_in_order() {
    let (port, _server) = spawn_mock_server();
    let config = ClientConfig::new("127.0.0.1", port as u32);
    let mut client = Client::connect(&config).unwrap();

    let mut insert_batch = client.batch();
    for i in 0..16 {
        insert_batch
            .add_insert(format!("key_{i}").as_bytes(), b"A".repeat(100).as_slice(), i as u64 + 1)
            .unwrap();
    }
    let tracker = client.execute_async(insert_batch).unwrap();
    tracker.wait(0).unwrap();
    for i in 0..16 {
        assert_eq!(tracker.get_response(i).unwrap().status, 0);
    }
    client.reclaim(tracker).unwrap();

    let mut get_batch = client.batch();
    for i in 0..16 {
        get_batch.add_get(format!("key_{i}").as_bytes()).unwrap();
    }
    let tracker = client.execute_async(get_batch).unwrap();
    tracker.wait(0).unwrap();
    for i in 0..16 {
        let response = tracker.get_response(i).unwrap();
        assert_eq!(response.status, 0);
        assert_eq!(response.value, b"A".repeat(100));
    }
    client.reclaim(tracker).unwrap();

    let mut delete_batch = client.batch();
    for i in 0..16 {
        delete_batch.add_delete(format!("key_{i}").as_bytes(), i as u64 + 100).unwrap();
    }
    let tracker = client.execute_async(delete_batch).unwrap();
    tracker.wait(0).unwrap();
    for i in 0..16 {
        assert_eq!(tracker.get_response(i).unwrap().status, 0);
    }
    client.reclaim(tracker).unwrap();
}

#[test]
fn overflow_guard_rejects_oversized_value_and_full_batch() {
    let mut batch = rioc::Batch::create();
    let oversized = vec![0u8; 102_401];
    assert!(batch.add_insert(b"k", &oversized, 1).is_err());
    assert!(batch.is_empty());

    for i in 0..128 {
        batch.add_get(format!("k{i}").as_bytes()).unwrap();
    }
    assert!(batch.add_get(b"overflow").is_err());
    assert_eq!(batch.len(), 128);
}
