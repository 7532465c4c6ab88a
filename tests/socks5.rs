//! End-to-end tests speaking raw SOCKS5 to an in-process server

use std::{net::SocketAddr, time::Duration};

use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
    time,
};

use socks5d::{Config, Socks5Server};

/// Starts the proxy on an ephemeral port and returns its address
async fn start_server() -> SocketAddr {
    let config = Config {
        bind_host: "127.0.0.1".to_owned(),
        bind_port: 0,
        ..Default::default()
    };

    let server = Socks5Server::bind(&config).await.expect("bind server");
    let addr = server.local_addr();
    tokio::spawn(server.run());
    addr
}

/// Starts a TCP echo server on an ephemeral port and returns its address
async fn start_echo_server() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind echo server");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let (mut r, mut w) = stream.split();
                let _ = tokio::io::copy(&mut r, &mut w).await;
            });
        }
    });

    addr
}

/// `05 01 00` → `05 00`
async fn greet(stream: &mut TcpStream) {
    stream.write_all(&[0x05, 0x01, 0x00]).await.unwrap();

    let mut reply = [0u8; 2];
    stream.read_exact(&mut reply).await.unwrap();
    assert_eq!(reply, [0x05, 0x00]);
}

/// CONNECT to an IPv4 address, expecting success with the proxy's own
/// bound address echoed back
async fn connect_ipv4(stream: &mut TcpStream, proxy_addr: SocketAddr, target: SocketAddr) {
    let mut request = vec![0x05, 0x01, 0x00, 0x01];
    match target {
        SocketAddr::V4(v4) => request.extend_from_slice(&v4.ip().octets()),
        SocketAddr::V6(..) => panic!("ipv4 target expected"),
    }
    request.extend_from_slice(&target.port().to_be_bytes());
    stream.write_all(&request).await.unwrap();

    let mut reply = [0u8; 10];
    stream.read_exact(&mut reply).await.unwrap();
    assert_eq!(&reply[..4], &[0x05, 0x00, 0x00, 0x01]);
    assert_eq!(&reply[4..8], &[127, 0, 0, 1]);
    // BND.PORT is network byte order
    assert_eq!(u16::from_be_bytes([reply[8], reply[9]]), proxy_addr.port());
}

#[tokio::test]
async fn method_identification_none() {
    let proxy = start_server().await;

    let mut stream = TcpStream::connect(proxy).await.unwrap();
    greet(&mut stream).await;
}

#[tokio::test]
async fn method_identification_not_acceptable() {
    let proxy = start_server().await;

    let mut stream = TcpStream::connect(proxy).await.unwrap();
    // only USERNAME/PASSWORD advertised
    stream.write_all(&[0x05, 0x01, 0x02]).await.unwrap();

    let mut reply = [0u8; 2];
    stream.read_exact(&mut reply).await.unwrap();
    assert_eq!(reply, [0x05, 0xff]);

    // nothing follows the rejection
    let mut rest = Vec::new();
    stream.read_to_end(&mut rest).await.unwrap();
    assert!(rest.is_empty());
}

#[tokio::test]
async fn connect_ipv4_and_relay() {
    let proxy = start_server().await;
    let echo = start_echo_server().await;

    let mut stream = TcpStream::connect(proxy).await.unwrap();
    greet(&mut stream).await;
    connect_ipv4(&mut stream, proxy, echo).await;

    let payload = b"hello through the tunnel";
    stream.write_all(payload).await.unwrap();

    let mut back = [0u8; 24];
    stream.read_exact(&mut back).await.unwrap();
    assert_eq!(&back[..], payload);

    // a second round trip over the same tunnel
    stream.write_all(b"ping").await.unwrap();
    let mut pong = [0u8; 4];
    stream.read_exact(&mut pong).await.unwrap();
    assert_eq!(&pong, b"ping");
}

#[tokio::test]
async fn relay_payload_larger_than_buffer() {
    let proxy = start_server().await;
    let echo = start_echo_server().await;

    let mut stream = TcpStream::connect(proxy).await.unwrap();
    greet(&mut stream).await;
    connect_ipv4(&mut stream, proxy, echo).await;

    // several times the 2048-byte relay buffer
    let payload: Vec<u8> = (0..10240u32).map(|i| (i % 251) as u8).collect();
    stream.write_all(&payload).await.unwrap();

    let mut back = vec![0u8; payload.len()];
    stream.read_exact(&mut back).await.unwrap();
    assert_eq!(back, payload);
}

#[tokio::test]
async fn connect_domain_walks_resolved_addresses() {
    let proxy = start_server().await;
    let echo = start_echo_server().await;

    let mut stream = TcpStream::connect(proxy).await.unwrap();
    greet(&mut stream).await;

    // "localhost" usually resolves to ::1 first, which nothing listens on;
    // the connect fallback has to walk on to 127.0.0.1
    let mut request = vec![0x05, 0x01, 0x00, 0x03, 9];
    request.extend_from_slice(b"localhost");
    request.extend_from_slice(&echo.port().to_be_bytes());
    stream.write_all(&request).await.unwrap();

    let mut reply = [0u8; 10];
    stream.read_exact(&mut reply).await.unwrap();
    assert_eq!(&reply[..2], &[0x05, 0x00]);

    stream.write_all(b"via domain").await.unwrap();
    let mut back = [0u8; 10];
    stream.read_exact(&mut back).await.unwrap();
    assert_eq!(&back[..], b"via domain");
}

#[tokio::test]
async fn connect_unresolvable_domain_is_rejected() {
    let proxy = start_server().await;

    let mut stream = TcpStream::connect(proxy).await.unwrap();
    greet(&mut stream).await;

    // RFC 2606 reserves .invalid, it never resolves
    let name = b"no.such.host.invalid";
    let mut request = vec![0x05, 0x01, 0x00, 0x03, name.len() as u8];
    request.extend_from_slice(name);
    request.extend_from_slice(&80u16.to_be_bytes());
    stream.write_all(&request).await.unwrap();

    let mut reply = [0u8; 10];
    stream.read_exact(&mut reply).await.unwrap();
    assert_eq!(reply[0], 0x05);
    assert_ne!(reply[1], 0x00);
    assert_eq!(&reply[2..], &[0x00, 0x01, 0, 0, 0, 0, 0, 0]);

    let mut rest = Vec::new();
    stream.read_to_end(&mut rest).await.unwrap();
    assert!(rest.is_empty());
}

#[tokio::test]
async fn connect_refused_upstream_is_rejected() {
    let proxy = start_server().await;

    // bind a port, learn it, then free it so connecting is refused
    let refused_addr = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };

    let mut stream = TcpStream::connect(proxy).await.unwrap();
    greet(&mut stream).await;

    let mut request = vec![0x05, 0x01, 0x00, 0x01, 127, 0, 0, 1];
    request.extend_from_slice(&refused_addr.port().to_be_bytes());
    stream.write_all(&request).await.unwrap();

    let mut reply = [0u8; 10];
    stream.read_exact(&mut reply).await.unwrap();
    // connection refused
    assert_eq!(&reply[..2], &[0x05, 0x05]);

    let mut rest = Vec::new();
    stream.read_to_end(&mut rest).await.unwrap();
    assert!(rest.is_empty());
}

#[tokio::test]
async fn bind_command_is_rejected() {
    let proxy = start_server().await;

    let mut stream = TcpStream::connect(proxy).await.unwrap();
    greet(&mut stream).await;

    stream
        .write_all(&[0x05, 0x02, 0x00, 0x01, 127, 0, 0, 1, 0x00, 0x50])
        .await
        .unwrap();

    let mut reply = [0u8; 10];
    stream.read_exact(&mut reply).await.unwrap();
    assert_eq!(&reply[..], &[0x05, 0x07, 0x00, 0x01, 0, 0, 0, 0, 0, 0]);

    let mut rest = Vec::new();
    stream.read_to_end(&mut rest).await.unwrap();
    assert!(rest.is_empty());
}

#[tokio::test]
async fn fragmented_greeting() {
    let proxy = start_server().await;

    let mut stream = TcpStream::connect(proxy).await.unwrap();

    // `05`, `01`, `00` in three separate sends
    for byte in [0x05u8, 0x01, 0x00] {
        stream.write_all(&[byte]).await.unwrap();
        stream.flush().await.unwrap();
        time::sleep(Duration::from_millis(10)).await;
    }

    let mut reply = [0u8; 2];
    stream.read_exact(&mut reply).await.unwrap();
    assert_eq!(reply, [0x05, 0x00]);
}

#[tokio::test]
async fn fragmented_request() {
    let proxy = start_server().await;
    let echo = start_echo_server().await;

    let mut stream = TcpStream::connect(proxy).await.unwrap();
    greet(&mut stream).await;

    let mut request = vec![0x05, 0x01, 0x00, 0x01, 127, 0, 0, 1];
    request.extend_from_slice(&echo.port().to_be_bytes());

    for chunk in request.chunks(3) {
        stream.write_all(chunk).await.unwrap();
        stream.flush().await.unwrap();
        time::sleep(Duration::from_millis(10)).await;
    }

    let mut reply = [0u8; 10];
    stream.read_exact(&mut reply).await.unwrap();
    assert_eq!(&reply[..4], &[0x05, 0x00, 0x00, 0x01]);

    stream.write_all(b"fragmented ok").await.unwrap();
    let mut back = [0u8; 13];
    stream.read_exact(&mut back).await.unwrap();
    assert_eq!(&back[..], b"fragmented ok");
}

#[tokio::test]
async fn client_eof_tears_down_tunnel() {
    let proxy = start_server().await;
    let echo = start_echo_server().await;

    let mut stream = TcpStream::connect(proxy).await.unwrap();
    greet(&mut stream).await;
    connect_ipv4(&mut stream, proxy, echo).await;

    stream.write_all(b"last words").await.unwrap();
    stream.shutdown().await.unwrap();

    // the echoed bytes still drain back, then the tunnel closes
    let mut back = Vec::new();
    stream.read_to_end(&mut back).await.unwrap();
    assert_eq!(&back[..], b"last words");
}

#[tokio::test]
async fn many_concurrent_sessions() {
    let proxy = start_server().await;
    let echo = start_echo_server().await;

    let mut tasks = Vec::new();
    for i in 0..32u32 {
        tasks.push(tokio::spawn(async move {
            let mut stream = TcpStream::connect(proxy).await.unwrap();
            greet(&mut stream).await;
            connect_ipv4(&mut stream, proxy, echo).await;

            let payload = format!("session {i}");
            stream.write_all(payload.as_bytes()).await.unwrap();

            let mut back = vec![0u8; payload.len()];
            stream.read_exact(&mut back).await.unwrap();
            assert_eq!(back, payload.as_bytes());
        }));
    }

    for task in tasks {
        task.await.unwrap();
    }
}
