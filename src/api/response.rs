//! Success envelope shared by every endpoint.

use serde::Serialize;

/// `{"status": "success", "data": ...}`
#[derive(Debug, Serialize)]
pub struct Success<T> {
    pub status: &'static str,
    pub data: T,
}

pub fn success<T: Serialize>(data: T) -> Success<T> {
    Success {
        status: "success",
        data,
    }
}

/// `{"status": "success", "message": ...}` for endpoints with no payload.
#[derive(Debug, Serialize)]
pub struct Message {
    pub status: &'static str,
    pub message: &'static str,
}

pub fn message(message: &'static str) -> Message {
    Message {
        status: "success",
        message,
    }
}
