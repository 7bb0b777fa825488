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

//! Attribute protocol vocabulary shared with the external GATT server.

use std::fmt;

use num_derive::{FromPrimitive, ToPrimitive};

/// Handle of an attribute in the GATT database.
pub type AttHandle = u16;

/// Identifier of an ATT bearer, assigned by the GATT server.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct ConnectionId(pub u32);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#06x}", self.0)
    }
}

/// Identity address of a bonded device.
#[derive(Clone, Copy, Debug, Default, Hash, PartialEq, Eq)]
pub struct Address(pub [u8; 6]);

pub const EMPTY_ADDRESS: Address = Address([0; 6]);

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bytes = self.0;
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            bytes[5], bytes[4], bytes[3], bytes[2], bytes[1], bytes[0],
        )
    }
}

impl From<&[u8; 6]> for Address {
    fn from(bytes: &[u8; 6]) -> Self {
        Self(*bytes)
    }
}

impl From<Address> for [u8; 6] {
    fn from(Address(bytes): Address) -> Self {
        bytes
    }
}

impl Address {
    pub fn is_empty(&self) -> bool {
        *self == EMPTY_ADDRESS
    }
}

/// ATT error codes returned in access responses.
///
/// Codes in the 0x80..=0x9F range are the CSIS application errors,
/// Bluetooth CSIS 1.0.1, 5.1.
#[derive(Clone, Copy, Debug, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[repr(u8)]
pub enum AttErrorCode {
    InvalidHandle = 0x01,
    ReadNotPermitted = 0x02,
    WriteNotPermitted = 0x03,
    RequestNotSupported = 0x06,
    InvalidAttributeValueLength = 0x0D,
    UnlikelyError = 0x0E,
    InsufficientResources = 0x11,
    LockDenied = 0x80,
    LockReleaseNotAllowed = 0x81,
    InvalidLockValue = 0x82,
    OobSirkOnly = 0x83,
    LockAlreadyGranted = 0x84,
    CccdImproperlyConfigured = 0xFD,
}

/// Body of an attribute access forwarded by the GATT server.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Access<'a> {
    Read,
    Write(&'a [u8]),
}
