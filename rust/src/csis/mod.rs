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

//! Coordinated Set Identification Service, server role.
//!
//! Bluetooth CSIS 1.0.1, 3 and 5.

use std::fmt;
use std::time::Instant;

use num_derive::{FromPrimitive, ToPrimitive};

use crate::att::{Address, AttErrorCode, AttHandle, ConnectionId};

pub mod config;
pub mod lock;
pub mod manager;
pub mod sirk;
pub mod timer;

#[cfg(test)]
pub(crate) mod test;

/// Lock timeout used until the application configures one, in seconds.
pub const DEFAULT_LOCK_TIMEOUT: u16 = 60;

/// Number of client configuration slots of each instance.
pub const MAX_CONNECTIONS: usize = 6;

/// Number of attribute handles used by one service instance.
pub const NUM_ATTRIBUTES: u16 = 12;

/// Services provided by the host to the CSIS server.
///
/// Every method is invoked from the thread owning the manager.
pub trait Context {
    fn send_read_response(
        &self,
        cid: ConnectionId,
        handle: AttHandle,
        result: Result<Vec<u8>, AttErrorCode>,
    );
    fn send_write_response(
        &self,
        cid: ConnectionId,
        handle: AttHandle,
        result: Result<(), AttErrorCode>,
    );
    fn send_notification(&self, cid: ConnectionId, handle: AttHandle, value: &[u8]);

    /// Deliver a message to the application task.
    fn send_message(&self, message: CsisMessage);

    /// Identity address of the bonded device behind `cid`, if known.
    fn peer_identity(&self, _cid: ConnectionId) -> Option<Address> {
        None
    }

    fn now(&self) -> Instant;

    /// Set identity resolving hash function `sih`, CSIS 4.7.
    fn sih(&self, sirk: &[u8; 16], prand: [u8; 3]) -> [u8; 3];

    /// Start the encryption of the SIRK with the link key of `cid`.
    /// The host completes the request with `CsisManager::sirk_encrypted`.
    fn request_sirk_encryption(&self, cid: ConnectionId, sirk: &[u8; 16]);
}

/// Handle of a local service instance, allocated by `CsisManager::init`.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct ServiceHandle(pub u16);

impl fmt::Display for ServiceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "csis#{}", self.0)
    }
}

/// How the SIRK may be disclosed to clients.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[repr(u8)]
pub enum SirkExposure {
    #[default]
    Encrypted = 0x00,
    Plaintext = 0x01,
    /// The SIRK is only shared out of band.
    OobOnly = 0x02,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InitParams {
    pub rank: u8,
    pub set_size: u8,
    pub sirk: [u8; 16],
    pub exposure: SirkExposure,
}

impl InitParams {
    pub(crate) fn is_valid(&self) -> bool {
        self.rank >= 1 && self.set_size >= 1 && self.rank <= self.set_size
    }
}

/// Value of the Lock characteristic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[repr(u8)]
pub enum LockValue {
    Unlocked = 0x01,
    Locked = 0x02,
}

/// Lock change requested by the local application.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LockRequest {
    Unlock,
    Lock,
    /// Only restart the expiry timer of a held lock.
    RefreshTimeout,
}

impl From<u8> for LockRequest {
    fn from(value: u8) -> Self {
        match value {
            0x01 => LockRequest::Unlock,
            0x02 => LockRequest::Lock,
            _ => LockRequest::RefreshTimeout,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LockOwner {
    /// Taken by the local application.
    Local,
    Remote { cid: ConnectionId, identity: Option<Address> },
}

impl LockOwner {
    pub fn cid(&self) -> Option<ConnectionId> {
        match self {
            LockOwner::Local => None,
            LockOwner::Remote { cid, .. } => Some(*cid),
        }
    }

    /// Whether the peer behind `cid` is the owner. Connection ids change
    /// across reconnections, so a bonded owner is matched by identity only.
    /// Connection ids are compared when neither side has an identity.
    pub fn is_peer(&self, cid: ConnectionId, identity: Option<Address>) -> bool {
        match (self, identity) {
            (LockOwner::Local, _) => false,
            (LockOwner::Remote { identity: Some(owner), .. }, identity) => Some(*owner) == identity,
            (LockOwner::Remote { identity: None, .. }, Some(_)) => false,
            (LockOwner::Remote { cid: owner, identity: None }, None) => *owner == cid,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LockState {
    Unlocked,
    Locked { owner: LockOwner },
}

impl LockState {
    pub fn value(&self) -> LockValue {
        match self {
            LockState::Unlocked => LockValue::Unlocked,
            LockState::Locked { .. } => LockValue::Locked,
        }
    }
}

/// Client Characteristic Configuration of one characteristic.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[repr(u16)]
pub enum NotifyState {
    #[default]
    Disabled = 0x0000,
    Notify = 0x0001,
    Indicate = 0x0002,
}

impl NotifyState {
    pub fn enabled(&self) -> bool {
        !matches!(self, NotifyState::Disabled)
    }
}

/// Configuration of the notifiable characteristics for one client.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ClientConfig {
    pub lock: NotifyState,
    pub sirk: NotifyState,
    pub size: NotifyState,
}

/// Messages delivered to the application task.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CsisMessage {
    /// The lock changed. `cid` is the connection that caused the change,
    /// or `None` when the local application did.
    LockStateChanged { handle: ServiceHandle, cid: Option<ConnectionId>, lock: LockValue },
    /// A client wrote one of its CCCDs. `complete` is set once all three
    /// have been written since the configuration was added.
    ConfigChanged { handle: ServiceHandle, cid: ConnectionId, complete: bool },
}

/// Characteristics that can be configured for notification.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Characteristic {
    Sirk,
    Size,
    Lock,
}

/// Attributes of an instance, located by their offset from the
/// instance start handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Attribute {
    Service,
    Value(Characteristic),
    ClientConfig(Characteristic),
    Rank,
}

impl Attribute {
    pub(crate) fn from_offset(offset: u16) -> Option<Attribute> {
        match offset {
            0 => Some(Attribute::Service),
            2 => Some(Attribute::Value(Characteristic::Sirk)),
            3 => Some(Attribute::ClientConfig(Characteristic::Sirk)),
            5 => Some(Attribute::Value(Characteristic::Size)),
            6 => Some(Attribute::ClientConfig(Characteristic::Size)),
            8 => Some(Attribute::Value(Characteristic::Lock)),
            9 => Some(Attribute::ClientConfig(Characteristic::Lock)),
            11 => Some(Attribute::Rank),
            _ => None,
        }
    }

    pub(crate) fn offset(&self) -> u16 {
        match self {
            Attribute::Service => 0,
            Attribute::Value(Characteristic::Sirk) => 2,
            Attribute::ClientConfig(Characteristic::Sirk) => 3,
            Attribute::Value(Characteristic::Size) => 5,
            Attribute::ClientConfig(Characteristic::Size) => 6,
            Attribute::Value(Characteristic::Lock) => 8,
            Attribute::ClientConfig(Characteristic::Lock) => 9,
            Attribute::Rank => 11,
        }
    }
}
