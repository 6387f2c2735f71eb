// SPDX-FileCopyrightText: 2025 Jörg Thalheim
// SPDX-License-Identifier: MIT

//! An async reader adapter that checks a NAR against its declared hash.
//!
//! Every byte read through this wrapper is fed into a [`NarHasher`]. When
//! the underlying reader reports end of file, the digest and byte count are
//! compared with the values from the path info and a mismatch is returned
//! as an [`io::ErrorKind::InvalidData`] error in place of the final EOF.
//! A destination store therefore sees the stream fail before it can commit
//! the path.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use harmonia_store_core::{NarHash, NarHasher, StorePath};
use pin_project_lite::pin_project;
use tokio::io::{AsyncRead, ReadBuf};

use crate::error::StoreError;

pin_project! {
    /// Wraps an [`AsyncRead`] producing the NAR of `path` and verifies it
    /// hashes to `expected_hash` and is exactly `expected_size` bytes long.
    pub struct VerifyingReader<R> {
        #[pin]
        inner: R,
        hasher: NarHasher,
        path: StorePath,
        expected_hash: NarHash,
        expected_size: u64,
        state: State,
    }
}

#[derive(Debug, Clone, Copy)]
enum State {
    Reading,
    Verified,
    /// Returned again on every later read.
    Failed(Mismatch),
}

#[derive(Debug, Clone, Copy)]
enum Mismatch {
    Size(u64),
    Hash(NarHash),
}

impl<R> VerifyingReader<R> {
    pub fn new(inner: R, path: StorePath, expected_hash: NarHash, expected_size: u64) -> Self {
        Self {
            inner,
            hasher: NarHasher::new(),
            path,
            expected_hash,
            expected_size,
            state: State::Reading,
        }
    }
}

fn mismatch_error(
    path: &StorePath,
    expected_hash: NarHash,
    expected_size: u64,
    mismatch: Mismatch,
) -> io::Error {
    let err = match mismatch {
        Mismatch::Size(actual) => StoreError::NarSizeMismatch {
            path: path.clone(),
            expected: expected_size,
            actual,
        },
        Mismatch::Hash(actual) => StoreError::NarHashMismatch {
            path: path.clone(),
            expected: expected_hash,
            actual,
        },
    };
    io::Error::new(io::ErrorKind::InvalidData, err)
}

impl<R: AsyncRead> AsyncRead for VerifyingReader<R> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.project();
        let path = &*this.path;
        let (expected_hash, expected_size) = (*this.expected_hash, *this.expected_size);
        let fail = |state: &mut State, mismatch| {
            *state = State::Failed(mismatch);
            Poll::Ready(Err(mismatch_error(
                path,
                expected_hash,
                expected_size,
                mismatch,
            )))
        };
        match *this.state {
            State::Reading => {}
            State::Verified => return Poll::Ready(Ok(())),
            State::Failed(mismatch) => return fail(this.state, mismatch),
        }

        let before = buf.filled().len();
        let wants_data = buf.remaining() > 0;
        let result = this.inner.poll_read(cx, buf);
        if let Poll::Ready(Ok(())) = &result {
            let new_bytes = &buf.filled()[before..];
            if !new_bytes.is_empty() {
                this.hasher.update(new_bytes);
                // Fail early instead of hashing an oversized stream to the end.
                if this.hasher.bytes() > expected_size {
                    // An erroring read must not hand out data.
                    buf.set_filled(before);
                    return fail(this.state, Mismatch::Size(this.hasher.bytes()));
                }
            } else if wants_data {
                let (actual_hash, actual_size) = std::mem::take(this.hasher).finish();
                if actual_size != expected_size {
                    return fail(this.state, Mismatch::Size(actual_size));
                }
                if actual_hash != expected_hash {
                    return fail(this.state, Mismatch::Hash(actual_hash));
                }
                *this.state = State::Verified;
            }
        }
        result
    }
}
