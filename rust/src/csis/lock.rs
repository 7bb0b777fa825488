// Copyright 2023 The Android Open Source Project
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Bluetooth CSIS 1.0.1, 5.3 Set Member Lock

use num_traits::FromPrimitive;

use crate::att::{Address, AttErrorCode, ConnectionId};
use crate::csis::{LockOwner, LockValue, ServiceHandle};

/// Outcome of a client write to the Lock characteristic.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
    /// The writer takes the lock.
    Acquire,
    /// The owner releases the lock.
    Release,
    /// Accepted, nothing changes.
    Unchanged,
    /// The writer already owns the lock. `reassign` is set when it
    /// reconnected with a new connection id.
    AlreadyGranted { reassign: bool },
    Reject(AttErrorCode),
}

impl Verdict {
    /// Write response sent back to the client.
    pub fn response(&self) -> Result<(), AttErrorCode> {
        match self {
            Verdict::Acquire | Verdict::Release | Verdict::Unchanged => Ok(()),
            Verdict::AlreadyGranted { .. } => Err(AttErrorCode::LockAlreadyGranted),
            Verdict::Reject(error) => Err(*error),
        }
    }
}

/// The process wide lock, if any, as seen by a write on `instance`.
#[derive(Clone, Copy, Debug)]
pub struct Held<'a> {
    pub instance: ServiceHandle,
    pub owner: &'a LockOwner,
}

/// Evaluate a write of `value` to the Lock characteristic of `instance`
/// by the peer `cid`. Only one instance may be locked at a time.
pub fn evaluate(
    held: Option<Held<'_>>,
    instance: ServiceHandle,
    cid: ConnectionId,
    identity: Option<Address>,
    value: &[u8],
) -> Verdict {
    if value.len() != 1 {
        return Verdict::Reject(AttErrorCode::InvalidAttributeValueLength);
    }

    let requested = match LockValue::from_u8(value[0]) {
        Some(requested) => requested,
        None => return Verdict::Reject(AttErrorCode::InvalidLockValue),
    };

    match (requested, held) {
        (LockValue::Locked, None) => Verdict::Acquire,
        (LockValue::Locked, Some(held)) => {
            if held.instance == instance && held.owner.is_peer(cid, identity) {
                Verdict::AlreadyGranted { reassign: held.owner.cid() != Some(cid) }
            } else {
                Verdict::Reject(AttErrorCode::LockDenied)
            }
        }
        (LockValue::Unlocked, Some(held)) if held.instance == instance => {
            if held.owner.is_peer(cid, identity) {
                Verdict::Release
            } else {
                Verdict::Reject(AttErrorCode::LockReleaseNotAllowed)
            }
        }
        (LockValue::Unlocked, _) => Verdict::Unchanged,
    }
}
