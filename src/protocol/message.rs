use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Backend frame header size: 1 byte tag + 4 bytes length
pub const FRAME_HEADER_SIZE: usize = 5;

/// PostgreSQL protocol version 3.0
pub const PROTOCOL_VERSION: i32 = 196608;

/// A raw message frame from the backend
///
/// The length field on the wire includes itself but not the tag byte;
/// `body` holds only the payload after the header.
#[derive(Debug, Clone)]
pub struct BackendFrame {
    pub tag: u8,
    pub body: Bytes,
}

impl BackendFrame {
    /// Try to decode a frame from bytes, returns None if not enough data
    pub fn decode(src: &mut BytesMut) -> Option<Self> {
        if src.len() < FRAME_HEADER_SIZE {
            return None;
        }

        let tag = src[0];
        let len = u32::from_be_bytes([src[1], src[2], src[3], src[4]]) as usize;
        if len < 4 {
            // Length includes itself; anything smaller is garbage
            return None;
        }

        let total_len = 1 + len;
        if src.len() < total_len {
            return None;
        }

        src.advance(FRAME_HEADER_SIZE);
        let body = src.split_to(len - 4).freeze();

        Some(Self { tag, body })
    }
}

/// Authentication request carried in an 'R' message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthRequest {
    /// Authentication successful
    Ok,
    /// Server wants the password in cleartext
    CleartextPassword,
    /// Server wants an MD5 digest with the given salt
    Md5Password { salt: [u8; 4] },
    /// Any mechanism this client does not speak (SCRAM, GSS, ...)
    Unsupported(i32),
}

/// Error or notice fields extracted from an 'E'/'N' message
#[derive(Debug, Clone)]
pub struct ServerError {
    pub severity: String,
    pub code: String,
    pub message: String,
}

impl std::fmt::Display for ServerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {} ({})", self.severity, self.message, self.code)
    }
}

/// Parsed backend message
#[derive(Debug, Clone)]
pub enum BackendMessage {
    Authentication(AuthRequest),
    ParameterStatus { name: String, value: String },
    BackendKeyData,
    ReadyForQuery(u8),
    RowDescription { field_count: u16 },
    DataRow(Vec<Option<Bytes>>),
    CommandComplete(String),
    EmptyQueryResponse,
    ErrorResponse(ServerError),
    NoticeResponse(ServerError),
    Unknown(u8),
}

impl BackendMessage {
    /// Parse a raw frame, returns None on a malformed body
    pub fn parse(frame: BackendFrame) -> Option<Self> {
        let mut body = frame.body;
        let msg = match frame.tag {
            b'R' => {
                if body.len() < 4 {
                    return None;
                }
                let code = body.get_i32();
                let auth = match code {
                    0 => AuthRequest::Ok,
                    3 => AuthRequest::CleartextPassword,
                    5 => {
                        if body.len() < 4 {
                            return None;
                        }
                        let mut salt = [0u8; 4];
                        body.copy_to_slice(&mut salt);
                        AuthRequest::Md5Password { salt }
                    }
                    other => AuthRequest::Unsupported(other),
                };
                Self::Authentication(auth)
            }
            b'S' => {
                let name = read_cstring(&mut body)?;
                let value = read_cstring(&mut body)?;
                Self::ParameterStatus { name, value }
            }
            b'K' => Self::BackendKeyData,
            b'Z' => {
                if body.is_empty() {
                    return None;
                }
                Self::ReadyForQuery(body.get_u8())
            }
            b'T' => {
                if body.len() < 2 {
                    return None;
                }
                Self::RowDescription {
                    field_count: body.get_u16(),
                }
            }
            b'D' => {
                if body.len() < 2 {
                    return None;
                }
                let count = body.get_u16() as usize;
                let mut columns = Vec::with_capacity(count);
                for _ in 0..count {
                    if body.len() < 4 {
                        return None;
                    }
                    let len = body.get_i32();
                    if len < 0 {
                        columns.push(None);
                    } else {
                        let len = len as usize;
                        if body.len() < len {
                            return None;
                        }
                        columns.push(Some(body.split_to(len)));
                    }
                }
                Self::DataRow(columns)
            }
            b'C' => Self::CommandComplete(read_cstring(&mut body)?),
            b'I' => Self::EmptyQueryResponse,
            b'E' => Self::ErrorResponse(read_error_fields(&mut body)),
            b'N' => Self::NoticeResponse(read_error_fields(&mut body)),
            tag => Self::Unknown(tag),
        };
        Some(msg)
    }
}

/// Frontend message to be encoded and sent to the backend
#[derive(Debug, Clone)]
pub enum FrontendMessage {
    /// Startup packet (protocol 3.0, no tag byte)
    Startup {
        user: String,
        database: Option<String>,
    },
    /// Password response ('p')
    Password(String),
    /// Simple query ('Q')
    Query(String),
    /// Graceful close ('X')
    Terminate,
}

impl FrontendMessage {
    pub fn encode(&self, dst: &mut BytesMut) {
        match self {
            Self::Startup { user, database } => {
                let mut params = BytesMut::new();
                put_cstring(&mut params, "user");
                put_cstring(&mut params, user);
                if let Some(db) = database {
                    put_cstring(&mut params, "database");
                    put_cstring(&mut params, db);
                }
                params.put_u8(0);

                dst.put_i32((4 + 4 + params.len()) as i32);
                dst.put_i32(PROTOCOL_VERSION);
                dst.extend_from_slice(&params);
            }
            Self::Password(password) => {
                dst.put_u8(b'p');
                dst.put_i32((4 + password.len() + 1) as i32);
                put_cstring(dst, password);
            }
            Self::Query(sql) => {
                dst.put_u8(b'Q');
                dst.put_i32((4 + sql.len() + 1) as i32);
                put_cstring(dst, sql);
            }
            Self::Terminate => {
                dst.put_u8(b'X');
                dst.put_i32(4);
            }
        }
    }
}

/// Read a NUL-terminated string from the buffer
fn read_cstring(body: &mut Bytes) -> Option<String> {
    let nul = body.iter().position(|&b| b == 0)?;
    let raw = body.split_to(nul);
    body.advance(1);
    Some(String::from_utf8_lossy(&raw).into_owned())
}

/// Read the tagged fields of an ErrorResponse/NoticeResponse body
///
/// Unknown field tags are skipped; missing fields stay empty rather
/// than failing the parse, since even a partial error beats none.
fn read_error_fields(body: &mut Bytes) -> ServerError {
    let mut error = ServerError {
        severity: String::new(),
        code: String::new(),
        message: String::new(),
    };

    while !body.is_empty() {
        let field_type = body.get_u8();
        if field_type == 0 {
            break;
        }
        let value = match read_cstring(body) {
            Some(v) => v,
            None => break,
        };
        match field_type {
            b'S' => error.severity = value,
            b'C' => error.code = value,
            b'M' => error.message = value,
            _ => {}
        }
    }

    error
}

fn put_cstring(dst: &mut BytesMut, s: &str) {
    dst.extend_from_slice(s.as_bytes());
    dst.put_u8(0);
}
