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

//! Bluetooth CSIS 1.0.1, 5.1 Set Identity Resolving Key and
//! 4.8 Resolvable Set Identifier

use std::collections::VecDeque;

use bytes::{BufMut, BytesMut};
use num_derive::{FromPrimitive, ToPrimitive};

use crate::att::ConnectionId;
use crate::csis::Context;

pub const SIRK_SIZE: usize = 16;

/// Size of the SIRK characteristic value: type followed by the key.
pub const SIRK_VALUE_SIZE: usize = SIRK_SIZE + 1;

pub const RSI_SIZE: usize = 6;

#[derive(Clone, Copy, Debug, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[repr(u8)]
pub enum SirkType {
    Encrypted = 0x00,
    Plaintext = 0x01,
}

/// SIRK characteristic value. The key is held most significant octet
/// first and transmitted least significant octet first.
pub fn encode_sirk(sirk_type: SirkType, key: &[u8; SIRK_SIZE]) -> Vec<u8> {
    let mut buf = BytesMut::with_capacity(SIRK_VALUE_SIZE);
    buf.put_u8(sirk_type as u8);
    key.iter().rev().for_each(|octet| buf.put_u8(*octet));
    buf.to_vec()
}

/// Random part of an RSI: the two most significant bits are 0b01 and the
/// remaining 22 bits are neither all zeros nor all ones.
pub fn prand() -> [u8; 3] {
    const RANDOM_MASK: u32 = 0x3f_ffff;

    loop {
        let random = rand::random::<u32>() & RANDOM_MASK;
        if random != 0 && random != RANDOM_MASK {
            let prand = random | 0x40_0000;
            return [prand as u8, (prand >> 8) as u8, (prand >> 16) as u8];
        }
    }
}

/// rsi = hash || prand, least significant octet first.
pub fn rsi(ctx: &impl Context, sirk: &[u8; SIRK_SIZE], prand: [u8; 3]) -> [u8; RSI_SIZE] {
    let hash = ctx.sih(sirk, prand);
    [hash[0], hash[1], hash[2], prand[0], prand[1], prand[2]]
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SirkOperation {
    /// Answer a pending read of the SIRK characteristic.
    Read,
    /// Notify a subscriber that the SIRK changed.
    Notify,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SirkRequest {
    pub cid: ConnectionId,
    pub operation: SirkOperation,
}

/// SIRK encryptions of an instance. The host processes one request at a
/// time, the one at the front of the queue.
#[derive(Debug, Default)]
pub struct SirkQueue {
    pending: VecDeque<SirkRequest>,
}

impl SirkQueue {
    pub fn is_busy(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Queue a request; returns true when it is the one to start.
    pub fn push(&mut self, request: SirkRequest) -> bool {
        self.pending.push_back(request);
        self.pending.len() == 1
    }

    pub fn front(&self) -> Option<SirkRequest> {
        self.pending.front().copied()
    }

    /// Complete the request in flight if it was issued for `cid`.
    pub fn complete(&mut self, cid: ConnectionId) -> Option<SirkRequest> {
        match self.pending.front() {
            Some(request) if request.cid == cid => self.pending.pop_front(),
            _ => None,
        }
    }

    /// Drop the requests of `cid` not yet handed to the host.
    pub fn cancel(&mut self, cid: ConnectionId) {
        let mut index = 0;
        self.pending.retain(|request| {
            index += 1;
            index == 1 || request.cid != cid
        });
    }
}
