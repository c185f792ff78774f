//! Auth-opener and operation tag bytes, and response codes (§6.1).
//!
//! One deliberate deviation from the literal wire table: the `C` reconnect
//! opener's token is 48 raw bytes here, not 28 — it follows this crate's
//! widened reconnection-token composition (`nodeKey ∥ nodeUuid ∥ userUuid`,
//! see `beehive_auth::node`) rather than the original 20-byte scheme.

use crate::errors::WireError;
use crate::framer::{FrameReader, FrameWriter};
use uuid::Uuid;

/// Raw length of the `C` opener's reconnection token, matching
/// `beehive_auth::node::RECONNECT_TOKEN_RAW_LEN`. Duplicated as a
/// constant here (rather than a dependency on `beehive-auth`) since the
/// wire crate has no other reason to depend on the auth crate.
pub const RECONNECT_TOKEN_LEN: usize = 48;

fn parse_uuid_bytes(bytes: &[u8], field: &'static str) -> Result<Uuid, WireError> {
    match bytes.len() {
        36 => {
            let s = std::str::from_utf8(bytes).map_err(|_| WireError::InvalidUtf8 { field })?;
            Uuid::parse_str(s).map_err(|_| WireError::InvalidUuid { field })
        }
        16 => Ok(Uuid::from_slice(bytes).expect("16 bytes")),
        _ => Err(WireError::InvalidUuid { field }),
    }
}

fn read_uuid_u8len(r: &mut FrameReader<'_>, field: &'static str) -> Result<Uuid, WireError> {
    let len = r.read_u8(field)? as usize;
    let bytes = r.read_blob_exact(len, field)?;
    parse_uuid_bytes(&bytes, field)
}

fn write_uuid_u8len_text(w: &mut FrameWriter, uuid: Uuid) {
    w.write_u8(36);
    w.write_blob_exact(uuid.hyphenated().to_string().as_bytes());
}

/// `I` — JWT sign-in.
#[derive(Debug, Clone)]
pub struct JwtSignIn {
    pub token: String,
    pub context: String,
    pub module: String,
    pub node_uuid: Uuid,
    pub version: u32,
}

impl JwtSignIn {
    pub fn decode(body: &[u8]) -> Result<Self, WireError> {
        let mut r = FrameReader::new(body);
        let token = r.read_string_u16("token")?;
        let context = r.read_string_u8("context")?;
        let module = r.read_string_u8("module")?;
        let node_uuid = read_uuid_u8len(&mut r, "nodeUuid")?;
        let version = r.read_u32("version")?;
        r.read_final_crc()?;
        Ok(Self {
            token,
            context,
            module,
            node_uuid,
            version,
        })
    }

    pub fn encode(&self) -> Result<Vec<u8>, WireError> {
        let mut w = FrameWriter::new();
        w.write_string_u16(&self.token)?;
        w.write_string_u8(&self.context)?;
        w.write_string_u8(&self.module)?;
        write_uuid_u8len_text(&mut w, self.node_uuid);
        w.write_u32(self.version);
        Ok(w.finish())
    }
}

/// `S` — password sign-in.
#[derive(Debug, Clone)]
pub struct PasswordSignIn {
    pub email: String,
    pub password: String,
    pub context: String,
    pub module: String,
    pub node_uuid: Uuid,
    pub version: u32,
}

impl PasswordSignIn {
    pub fn decode(body: &[u8]) -> Result<Self, WireError> {
        let mut r = FrameReader::new(body);
        let email = r.read_string_u8("email")?;
        let password = r.read_string_u8("password")?;
        let context = r.read_string_u8("context")?;
        let module = r.read_string_u8("module")?;
        let node_uuid = read_uuid_u8len(&mut r, "nodeUuid")?;
        let version = r.read_u32("version")?;
        r.read_final_crc()?;
        Ok(Self {
            email,
            password,
            context,
            module,
            node_uuid,
            version,
        })
    }

    pub fn encode(&self) -> Result<Vec<u8>, WireError> {
        let mut w = FrameWriter::new();
        w.write_string_u8(&self.email)?;
        w.write_string_u8(&self.password)?;
        w.write_string_u8(&self.context)?;
        w.write_string_u8(&self.module)?;
        write_uuid_u8len_text(&mut w, self.node_uuid);
        w.write_u32(self.version);
        Ok(w.finish())
    }
}

/// `U` — sign-up: a display name ahead of an `S` payload.
#[derive(Debug, Clone)]
pub struct SignUp {
    pub name: String,
    pub sign_in: PasswordSignIn,
}

impl SignUp {
    pub fn decode(body: &[u8]) -> Result<Self, WireError> {
        let mut r = FrameReader::new(body);
        let name = r.read_string_u8("name")?;
        let email = r.read_string_u8("email")?;
        let password = r.read_string_u8("password")?;
        let context = r.read_string_u8("context")?;
        let module = r.read_string_u8("module")?;
        let node_uuid = read_uuid_u8len(&mut r, "nodeUuid")?;
        let version = r.read_u32("version")?;
        r.read_final_crc()?;
        Ok(Self {
            name,
            sign_in: PasswordSignIn {
                email,
                password,
                context,
                module,
                node_uuid,
                version,
            },
        })
    }

    pub fn encode(&self) -> Result<Vec<u8>, WireError> {
        let mut w = FrameWriter::new();
        w.write_string_u8(&self.name)?;
        w.write_string_u8(&self.sign_in.email)?;
        w.write_string_u8(&self.sign_in.password)?;
        w.write_string_u8(&self.sign_in.context)?;
        w.write_string_u8(&self.sign_in.module)?;
        write_uuid_u8len_text(&mut w, self.sign_in.node_uuid);
        w.write_u32(self.sign_in.version);
        Ok(w.finish())
    }
}

/// `F` — sign-off via JWT.
#[derive(Debug, Clone)]
pub struct SignOffJwt {
    pub token: String,
    pub context: String,
}

impl SignOffJwt {
    pub fn decode(body: &[u8]) -> Result<Self, WireError> {
        let mut r = FrameReader::new(body);
        let token = r.read_string_u16("token")?;
        let context = r.read_string_u8("context")?;
        r.read_final_crc()?;
        Ok(Self { token, context })
    }

    pub fn encode(&self) -> Result<Vec<u8>, WireError> {
        let mut w = FrameWriter::new();
        w.write_string_u16(&self.token)?;
        w.write_string_u8(&self.context)?;
        Ok(w.finish())
    }
}

/// `G` — sign-off via local credentials.
#[derive(Debug, Clone)]
pub struct SignOffLocal {
    pub email: String,
    pub password: String,
    pub context: String,
}

impl SignOffLocal {
    pub fn decode(body: &[u8]) -> Result<Self, WireError> {
        let mut r = FrameReader::new(body);
        let email = r.read_string_u8("email")?;
        let password = r.read_string_u8("password")?;
        let context = r.read_string_u8("context")?;
        r.read_final_crc()?;
        Ok(Self { email, password, context })
    }

    pub fn encode(&self) -> Result<Vec<u8>, WireError> {
        let mut w = FrameWriter::new();
        w.write_string_u8(&self.email)?;
        w.write_string_u8(&self.password)?;
        w.write_string_u8(&self.context)?;
        Ok(w.finish())
    }
}

/// `C` — reconnect via a previously issued token.
#[derive(Debug, Clone)]
pub struct Reconnect {
    pub token: Vec<u8>,
    pub version: u32,
}

impl Reconnect {
    pub fn decode(body: &[u8]) -> Result<Self, WireError> {
        let mut r = FrameReader::new(body);
        let token = r.read_blob_exact(RECONNECT_TOKEN_LEN, "token")?;
        let version = r.read_u32("version")?;
        r.read_final_crc()?;
        Ok(Self { token, version })
    }

    pub fn encode(&self) -> Result<Vec<u8>, WireError> {
        let mut w = FrameWriter::new();
        w.write_blob_exact(&self.token);
        w.write_u32(self.version);
        Ok(w.finish())
    }
}

/// The decoded body of whichever auth opener tag started the session.
#[derive(Debug, Clone)]
pub enum AuthOpener {
    JwtSignIn(JwtSignIn),
    PasswordSignIn(PasswordSignIn),
    SignUp(SignUp),
    SignOffJwt(SignOffJwt),
    SignOffLocal(SignOffLocal),
    Reconnect(Reconnect),
}

impl AuthOpener {
    /// Dispatch on the opener's tag byte and decode its body.
    pub fn decode(tag: u8, body: &[u8]) -> Result<Self, WireError> {
        Ok(match tag {
            b'I' => Self::JwtSignIn(JwtSignIn::decode(body)?),
            b'S' => Self::PasswordSignIn(PasswordSignIn::decode(body)?),
            b'U' => Self::SignUp(SignUp::decode(body)?),
            b'F' => Self::SignOffJwt(SignOffJwt::decode(body)?),
            b'G' => Self::SignOffLocal(SignOffLocal::decode(body)?),
            b'C' => Self::Reconnect(Reconnect::decode(body)?),
            other => return Err(WireError::UnknownTag(other)),
        })
    }
}

/// Post-auth operation tags (§4.9).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationTag {
    SignOut,
    DeleteDataset,
    PushDataset,
    PopDataset,
    PutDataset,
    PullDataset,
    LeaveDataset,
    UpdateMember,
    DeleteMember,
    FullSync,
}

impl OperationTag {
    /// Decode a tag byte into an operation.
    pub fn from_tag(tag: u8) -> Result<Self, WireError> {
        Ok(match tag {
            b'O' => Self::SignOut,
            b'e' => Self::DeleteDataset,
            b'g' => Self::PushDataset,
            b'i' => Self::PopDataset,
            b'r' => Self::PutDataset,
            b't' => Self::PullDataset,
            b's' => Self::LeaveDataset,
            b'k' => Self::UpdateMember,
            b'l' => Self::DeleteMember,
            b'z' => Self::FullSync,
            other => return Err(WireError::UnknownTag(other)),
        })
    }

    /// The tag byte for this operation.
    pub fn tag(self) -> u8 {
        match self {
            Self::SignOut => b'O',
            Self::DeleteDataset => b'e',
            Self::PushDataset => b'g',
            Self::PopDataset => b'i',
            Self::PutDataset => b'r',
            Self::PullDataset => b't',
            Self::LeaveDataset => b's',
            Self::UpdateMember => b'k',
            Self::DeleteMember => b'l',
            Self::FullSync => b'z',
        }
    }
}

/// Response codes a server frame may carry (§6.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ResponseCode {
    Success = 0,
    TransmissionError = 1,
    NewContainerAvailable = 40,
    NewGroupAvailable = 50,
    NewElementAvailable = 51,
    DataNotFound = 99,
    UserNotFound = 100,
    NotEnoughRights = 110,
    InvalidSchema = 120,
    InternalError = 255,
}

impl ResponseCode {
    /// The numeric wire value.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Decode a numeric wire value back into a response code.
    pub fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            0 => Self::Success,
            1 => Self::TransmissionError,
            40 => Self::NewContainerAvailable,
            50 => Self::NewGroupAvailable,
            51 => Self::NewElementAvailable,
            99 => Self::DataNotFound,
            100 => Self::UserNotFound,
            110 => Self::NotEnoughRights,
            120 => Self::InvalidSchema,
            255 => Self::InternalError,
            _ => return None,
        })
    }
}
