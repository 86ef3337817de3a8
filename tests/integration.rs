use std::net::SocketAddr;

use rand::Rng;
use respkv::codec::DEFAULT_MAX_FRAME_SIZE;
use respkv::server::serve;
use respkv::store::Store;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{sleep, Duration};

async fn start_server() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(serve(listener, Store::new(), DEFAULT_MAX_FRAME_SIZE));

    addr
}

async fn connect(addr: SocketAddr) -> TcpStream {
    TcpStream::connect(addr).await.unwrap()
}

/// Encodes a command the way clients do: an array of bulk strings.
fn request(args: &[&[u8]]) -> Vec<u8> {
    let mut bytes = format!("*{}\r\n", args.len()).into_bytes();
    for arg in args {
        bytes.extend_from_slice(format!("${}\r\n", arg.len()).as_bytes());
        bytes.extend_from_slice(arg);
        bytes.extend_from_slice(b"\r\n");
    }
    bytes
}

async fn send(stream: &mut TcpStream, request: &[u8], expected: &[u8]) {
    stream.write_all(request).await.unwrap();

    let mut buf = vec![0; expected.len()];
    stream.read_exact(&mut buf).await.unwrap();

    assert_eq!(
        String::from_utf8_lossy(&buf),
        String::from_utf8_lossy(expected),
        "request: {:?}",
        String::from_utf8_lossy(request)
    );
}

fn bulk(value: &[u8]) -> Vec<u8> {
    let mut bytes = format!("${}\r\n", value.len()).into_bytes();
    bytes.extend_from_slice(value);
    bytes.extend_from_slice(b"\r\n");
    bytes
}

#[tokio::test]
async fn test_ping() {
    let addr = start_server().await;
    let mut stream = connect(addr).await;

    send(&mut stream, b"*1\r\n$4\r\nPING\r\n", b"+PONG\r\n").await;
}

#[tokio::test]
async fn test_echo() {
    let addr = start_server().await;
    let mut stream = connect(addr).await;

    send(
        &mut stream,
        b"*2\r\n$4\r\nECHO\r\n$11\r\nwatermelons\r\n",
        b"+watermelons\r\n",
    )
    .await;
}

#[tokio::test]
async fn test_set_and_get_across_connections() {
    let addr = start_server().await;

    let set_msg = b"*3\r\n$3\r\nSET\r\n$5\r\nHello\r\n$5\r\nWorld\r\n";
    let get_msg = b"*2\r\n$3\r\nGET\r\n$5\r\nHello\r\n";

    send(&mut connect(addr).await, set_msg, b"+OK\r\n").await;
    send(&mut connect(addr).await, set_msg, b"+OK\r\n").await;
    send(&mut connect(addr).await, get_msg, b"$5\r\nWorld\r\n").await;
}

#[tokio::test]
async fn test_get_missing_key() {
    let addr = start_server().await;
    let mut stream = connect(addr).await;

    send(
        &mut stream,
        b"*3\r\n$3\r\nSET\r\n$4\r\nOpen\r\n$5\r\nClose\r\n",
        b"+OK\r\n",
    )
    .await;
    send(
        &mut stream,
        b"*2\r\n$3\r\nGET\r\n$7\r\nNotOpen\r\n",
        b"$-1\r\n",
    )
    .await;
}

#[tokio::test]
async fn test_set_px_and_get() {
    let addr = start_server().await;
    let mut stream = connect(addr).await;

    send(
        &mut stream,
        b"*5\r\n$3\r\nSET\r\n$4\r\nSome\r\n$4\r\nBody\r\n$2\r\nPX\r\n$6\r\n100000\r\n",
        b"+OK\r\n",
    )
    .await;
    send(
        &mut stream,
        b"*2\r\n$3\r\nGET\r\n$4\r\nSome\r\n",
        b"$4\r\nBody\r\n",
    )
    .await;
}

#[tokio::test]
async fn test_px_expiry() {
    let addr = start_server().await;
    let mut stream = connect(addr).await;

    send(
        &mut stream,
        &request(&[b"SET", b"fleeting", b"value", b"px", b"100"]),
        b"+OK\r\n",
    )
    .await;
    send(
        &mut stream,
        &request(&[b"GET", b"fleeting"]),
        b"$5\r\nvalue\r\n",
    )
    .await;

    sleep(Duration::from_millis(150)).await;

    send(&mut stream, &request(&[b"GET", b"fleeting"]), b"$-1\r\n").await;
    send(&mut stream, &request(&[b"GET", b"fleeting"]), b"$-1\r\n").await;
}

#[tokio::test]
async fn test_overwrite_clears_ttl() {
    let addr = start_server().await;
    let mut stream = connect(addr).await;

    send(
        &mut stream,
        &request(&[b"SET", b"k", b"v1", b"PX", b"50"]),
        b"+OK\r\n",
    )
    .await;
    send(&mut stream, &request(&[b"SET", b"k", b"v2"]), b"+OK\r\n").await;

    sleep(Duration::from_millis(100)).await;

    send(&mut stream, &request(&[b"GET", b"k"]), b"$2\r\nv2\r\n").await;
}

#[tokio::test]
async fn test_round_trip_binary_values() {
    let addr = start_server().await;
    let mut stream = connect(addr).await;

    let mut rng = rand::thread_rng();
    let pairs: Vec<(Vec<u8>, Vec<u8>)> = (0..50)
        .map(|i| {
            let mut key = format!("key-{}-", i).into_bytes();
            key.extend((0..rng.gen_range(0..16)).map(|_| rng.gen::<u8>()));
            let value = (0..rng.gen_range(0..512)).map(|_| rng.gen::<u8>()).collect();
            (key, value)
        })
        .collect();

    for (key, value) in &pairs {
        send(
            &mut stream,
            &request(&[b"SET", key.as_slice(), value.as_slice()]),
            b"+OK\r\n",
        )
        .await;
    }

    for (key, value) in &pairs {
        send(
            &mut stream,
            &request(&[b"GET", key.as_slice()]),
            &bulk(value),
        )
        .await;
    }
}

#[tokio::test]
async fn test_value_with_embedded_crlf() {
    let addr = start_server().await;
    let mut stream = connect(addr).await;

    send(
        &mut stream,
        &request(&[b"SET", b"lines", b"one\r\ntwo"]),
        b"+OK\r\n",
    )
    .await;
    send(
        &mut stream,
        &request(&[b"GET", b"lines"]),
        b"$8\r\none\r\ntwo\r\n",
    )
    .await;
}

#[tokio::test]
async fn test_large_value() {
    let addr = start_server().await;
    let mut stream = connect(addr).await;

    let value = vec![b'x'; 100_000];

    send(
        &mut stream,
        &request(&[b"SET", b"big", value.as_slice()]),
        b"+OK\r\n",
    )
    .await;
    send(&mut stream, &request(&[b"GET", b"big"]), &bulk(&value)).await;
}

#[tokio::test]
async fn test_concurrent_isolation() {
    let addr = start_server().await;

    let clients = (0..2).map(|i| {
        tokio::spawn(async move {
            let mut stream = connect(addr).await;
            let key = format!("client-{}", i);
            let value = format!("value-{}", i);

            send(
                &mut stream,
                &request(&[b"SET", key.as_bytes(), value.as_bytes()]),
                b"+OK\r\n",
            )
            .await;

            stream
        })
    });
    let clients: Vec<_> = clients.collect();

    let mut streams = Vec::new();
    for client in clients {
        streams.push(client.await.unwrap());
    }

    // Each connection observes both keys.
    for stream in streams.iter_mut() {
        for i in 0..2 {
            let key = format!("client-{}", i);
            let expected = bulk(format!("value-{}", i).as_bytes());

            send(stream, &request(&[b"GET", key.as_bytes()]), &expected).await;
        }
    }
}

#[tokio::test]
async fn test_errors_keep_the_connection_open() {
    let addr = start_server().await;
    let mut stream = connect(addr).await;

    send(
        &mut stream,
        &request(&[b"FLUSHALL"]),
        b"-ERR unknown command 'FLUSHALL'\r\n",
    )
    .await;
    send(
        &mut stream,
        &request(&[b"SET", b"k"]),
        b"-ERR wrong number of arguments for 'set' command\r\n",
    )
    .await;
    send(
        &mut stream,
        &request(&[b"SET", b"k", b"v", b"EX", b"10"]),
        b"-ERR syntax error\r\n",
    )
    .await;
    send(
        &mut stream,
        &request(&[b"SET", b"k", b"v", b"PX", b"soon"]),
        b"-ERR value is not an integer or out of range\r\n",
    )
    .await;
    send(
        &mut stream,
        &request(&[b"X\r\n+OK\r\n"]),
        b"-ERR unknown command 'X  +OK  '\r\n",
    )
    .await;
    send(&mut stream, &request(&[b"GET", b"k"]), b"$-1\r\n").await;
    send(&mut stream, &request(&[b"ping"]), b"+PONG\r\n").await;
}

#[tokio::test]
async fn test_malformed_request_closes_the_connection() {
    let addr = start_server().await;
    let mut stream = connect(addr).await;

    stream.write_all(b"*1\r\n$four\r\nPING\r\n").await.unwrap();

    let mut buf = Vec::new();
    let read = stream.read_to_end(&mut buf).await.unwrap();
    assert_eq!(read, 0);

    // Other connections are not affected.
    send(&mut connect(addr).await, &request(&[b"PING"]), b"+PONG\r\n").await;
}
