//! multipart/form-data bodies for uploads.

use bytes::{BufMut, Bytes, BytesMut};
use rand::distributions::Alphanumeric;
use rand::Rng;

const BOUNDARY_PREFIX: &str = "oauth1-boundary-";
const BOUNDARY_RANDOM_LENGTH: usize = 24;

/// One field of a multipart body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    pub name: String,
    pub data: Bytes,
    pub file_name: Option<String>,
    pub mime_type: Option<String>,
}

impl Part {
    pub fn text<N: Into<String>, V: Into<String>>(name: N, value: V) -> Self {
        Part {
            name: name.into(),
            data: Bytes::from(value.into()),
            file_name: None,
            mime_type: None,
        }
    }

    pub fn file<N, F, M, D>(name: N, file_name: F, mime_type: M, data: D) -> Self
    where
        N: Into<String>,
        F: Into<String>,
        M: Into<String>,
        D: Into<Bytes>,
    {
        Part {
            name: name.into(),
            data: data.into(),
            file_name: Some(file_name.into()),
            mime_type: Some(mime_type.into()),
        }
    }
}

/// An encoded body and the boundary that separates its parts.
#[derive(Debug, Clone)]
pub struct MultipartBody {
    pub body: Bytes,
    pub boundary: String,
}

/// Encodes parts into a multipart body.
pub trait MultipartEncoder {
    fn encode(&self, parts: &[Part]) -> MultipartBody;
}

/// RFC 7578 encoder with a random boundary per body.
#[derive(Debug, Clone, Copy, Default)]
pub struct FormDataEncoder;

impl FormDataEncoder {
    pub fn encode_with_boundary(parts: &[Part], boundary: &str) -> Bytes {
        let mut body = BytesMut::new();
        for part in parts {
            body.put_slice(format!("--{}\r\n", boundary).as_bytes());
            let mut disposition = format!("Content-Disposition: form-data; name=\"{}\"", escape_quoted(&part.name));
            if let Some(ref file_name) = part.file_name {
                disposition.push_str(&format!("; filename=\"{}\"", escape_quoted(file_name)));
            }
            body.put_slice(disposition.as_bytes());
            body.put_slice(b"\r\n");
            if let Some(ref mime_type) = part.mime_type {
                body.put_slice(format!("Content-Type: {}\r\n", mime_type).as_bytes());
            }
            body.put_slice(b"\r\n");
            body.put_slice(&part.data);
            body.put_slice(b"\r\n");
        }
        body.put_slice(format!("--{}--\r\n", boundary).as_bytes());
        body.freeze()
    }
}

impl MultipartEncoder for FormDataEncoder {
    fn encode(&self, parts: &[Part]) -> MultipartBody {
        let boundary = generate_boundary();
        MultipartBody {
            body: FormDataEncoder::encode_with_boundary(parts, &boundary),
            boundary,
        }
    }
}

fn escape_quoted(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

fn generate_boundary() -> String {
    let random: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(BOUNDARY_RANDOM_LENGTH)
        .map(char::from)
        .collect();
    format!("{}{}", BOUNDARY_PREFIX, random)
}
