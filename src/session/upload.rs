use std::sync::mpsc;

use image::RgbaImage;

use crate::codec::{decode_upload, InputRejection, UploadLimits};

/// An upload waiting to be decoded, tagged with the session generation it belongs to.
#[derive(Debug, Clone)]
pub struct DecodeTicket {
    generation: u64,
    bytes: Vec<u8>,
    declared_size: u64,
    limits: UploadLimits,
}

#[derive(Debug)]
pub struct DecodeOutcome {
    pub(crate) generation: u64,
    pub(crate) bytes: Vec<u8>,
    pub(crate) result: Result<RgbaImage, InputRejection>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadStatus {
    Loaded { width: u32, height: u32 },
    /// A newer upload or a reset happened while this one was decoding.
    Stale,
}

impl DecodeTicket {
    pub(crate) fn new(generation: u64, bytes: Vec<u8>, declared_size: u64, limits: UploadLimits) -> Self {
        Self {
            generation,
            bytes,
            declared_size,
            limits,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Pure and `Send`; safe to run off the session thread.
    pub fn decode(self) -> DecodeOutcome {
        let result = decode_upload(&self.bytes, self.declared_size, self.limits);
        DecodeOutcome {
            generation: self.generation,
            bytes: self.bytes,
            result,
        }
    }
}

impl DecodeOutcome {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Decodes `ticket` on a worker thread; the outcome arrives on the returned channel.
pub fn spawn_decode(ticket: DecodeTicket) -> mpsc::Receiver<DecodeOutcome> {
    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        let generation = ticket.generation;
        let outcome = ticket.decode();
        if tx.send(outcome).is_err() {
            tracing::debug!(generation, "decode result dropped; receiver gone");
        }
    });
    rx
}
