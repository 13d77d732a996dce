//! Minimal scripted PostgreSQL backend for tests
//!
//! Speaks just enough of the v3 protocol to exercise the client:
//! startup, one authentication exchange, and canned responses to
//! simple queries until the client terminates.

use bytes::{BufMut, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// How the server answers the startup packet
#[derive(Debug, Clone, Copy)]
pub enum AuthMode {
    Trust,
    Cleartext,
    Md5,
    Reject,
}

/// How the server answers every simple query
#[derive(Debug, Clone, Copy)]
pub enum QueryScript {
    /// One single-column row with the given value, then "SELECT 1"
    Row(&'static str),
    /// An ERROR response
    Error,
}

/// How the client side of the connection ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disconnect {
    /// Client sent an explicit Terminate message
    Terminate,
    /// Client hung up without terminating
    Eof,
}

/// Bind, spawn a one-connection server task, return its address
pub async fn spawn_server(auth: AuthMode, script: QueryScript) -> std::net::SocketAddr {
    let (addr, _) = spawn_server_observed(auth, script).await;
    addr
}

/// Like `spawn_server`, but also reports how the connection ended
pub async fn spawn_server_observed(
    auth: AuthMode,
    script: QueryScript,
) -> (
    std::net::SocketAddr,
    tokio::sync::oneshot::Receiver<Disconnect>,
) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = tokio::sync::oneshot::channel();

    tokio::spawn(async move {
        if let Ok((stream, _)) = listener.accept().await {
            let disconnect = serve(stream, auth, script).await;
            let _ = tx.send(disconnect);
        }
    });

    (addr, rx)
}

/// An address that accepts TCP but never answers the startup packet
pub async fn silent_addr() -> std::net::SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        if let Ok((stream, _)) = listener.accept().await {
            // Hold the socket open without ever writing
            let _stream = stream;
            std::future::pending::<()>().await;
        }
    });

    addr
}

/// An address with nothing listening on it
pub async fn refused_addr() -> std::net::SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

async fn serve(mut stream: TcpStream, auth: AuthMode, script: QueryScript) -> Disconnect {
    // Startup packet: length-prefixed, no tag byte
    let mut len_buf = [0u8; 4];
    if stream.read_exact(&mut len_buf).await.is_err() {
        return Disconnect::Eof;
    }
    let len = u32::from_be_bytes(len_buf) as usize;
    let mut startup = vec![0u8; len.saturating_sub(4)];
    if stream.read_exact(&mut startup).await.is_err() {
        return Disconnect::Eof;
    }

    match auth {
        AuthMode::Trust => {
            write_all(&mut stream, &[auth_request(0, &[])]).await;
        }
        AuthMode::Cleartext => {
            write_all(&mut stream, &[auth_request(3, &[])]).await;
            if read_frame(&mut stream).await.is_none() {
                return Disconnect::Eof;
            }
            write_all(&mut stream, &[auth_request(0, &[])]).await;
        }
        AuthMode::Md5 => {
            write_all(&mut stream, &[auth_request(5, &[1, 2, 3, 4])]).await;
            if read_frame(&mut stream).await.is_none() {
                return Disconnect::Eof;
            }
            write_all(&mut stream, &[auth_request(0, &[])]).await;
        }
        AuthMode::Reject => {
            write_all(
                &mut stream,
                &[error_response("FATAL", "28P01", "password authentication failed")],
            )
            .await;
            return Disconnect::Eof;
        }
    }
    write_all(&mut stream, &[ready_for_query()]).await;

    loop {
        let (tag, _body) = match read_frame(&mut stream).await {
            Some(frame) => frame,
            None => return Disconnect::Eof,
        };
        match tag {
            b'Q' => match script {
                QueryScript::Row(value) => {
                    write_all(
                        &mut stream,
                        &[data_row(value), command_complete("SELECT 1"), ready_for_query()],
                    )
                    .await;
                }
                QueryScript::Error => {
                    write_all(
                        &mut stream,
                        &[
                            error_response("ERROR", "42601", "syntax error"),
                            ready_for_query(),
                        ],
                    )
                    .await;
                }
            },
            b'X' => return Disconnect::Terminate,
            _ => {}
        }
    }
}

async fn read_frame(stream: &mut TcpStream) -> Option<(u8, Vec<u8>)> {
    let mut header = [0u8; 5];
    stream.read_exact(&mut header).await.ok()?;
    let tag = header[0];
    let len = u32::from_be_bytes([header[1], header[2], header[3], header[4]]) as usize;
    let mut body = vec![0u8; len.saturating_sub(4)];
    stream.read_exact(&mut body).await.ok()?;
    Some((tag, body))
}

async fn write_all(stream: &mut TcpStream, messages: &[BytesMut]) {
    for msg in messages {
        let _ = stream.write_all(msg).await;
    }
    let _ = stream.flush().await;
}

fn message(tag: u8, body: &[u8]) -> BytesMut {
    let mut buf = BytesMut::new();
    buf.put_u8(tag);
    buf.put_i32((4 + body.len()) as i32);
    buf.extend_from_slice(body);
    buf
}

fn auth_request(code: i32, extra: &[u8]) -> BytesMut {
    let mut body = Vec::new();
    body.extend_from_slice(&code.to_be_bytes());
    body.extend_from_slice(extra);
    message(b'R', &body)
}

fn ready_for_query() -> BytesMut {
    message(b'Z', b"I")
}

fn data_row(value: &str) -> BytesMut {
    let mut body = Vec::new();
    body.extend_from_slice(&1u16.to_be_bytes());
    body.extend_from_slice(&(value.len() as i32).to_be_bytes());
    body.extend_from_slice(value.as_bytes());
    message(b'D', &body)
}

fn command_complete(tag: &str) -> BytesMut {
    let mut body = tag.as_bytes().to_vec();
    body.push(0);
    message(b'C', &body)
}

fn error_response(severity: &str, code: &str, text: &str) -> BytesMut {
    let mut body = Vec::new();
    body.push(b'S');
    body.extend_from_slice(severity.as_bytes());
    body.push(0);
    body.push(b'C');
    body.extend_from_slice(code.as_bytes());
    body.push(0);
    body.push(b'M');
    body.extend_from_slice(text.as_bytes());
    body.push(0);
    body.push(0);
    message(b'E', &body)
}
