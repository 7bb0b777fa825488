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

use bitflags::bitflags;
use bytes::{BufMut, BytesMut};
use num_traits::FromPrimitive;

use crate::att::{AttErrorCode, ConnectionId};
use crate::csis::manager::CsisError;
use crate::csis::{Characteristic, ClientConfig, NotifyState, MAX_CONNECTIONS};

/// Size of a Client Characteristic Configuration value.
pub const CCCD_SIZE: usize = 2;

bitflags! {
    /// CCCDs written by a client since its configuration was added.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    struct Written: u8 {
        const SIRK = 1 << 0;
        const SIZE = 1 << 1;
        const LOCK = 1 << 2;
    }
}

impl From<Characteristic> for Written {
    fn from(characteristic: Characteristic) -> Self {
        match characteristic {
            Characteristic::Sirk => Written::SIRK,
            Characteristic::Size => Written::SIZE,
            Characteristic::Lock => Written::LOCK,
        }
    }
}

pub fn encode_cccd(state: NotifyState) -> Vec<u8> {
    let mut buf = BytesMut::with_capacity(CCCD_SIZE);
    buf.put_u16_le(state as u16);
    buf.to_vec()
}

pub fn decode_cccd(value: &[u8]) -> Result<NotifyState, AttErrorCode> {
    if value.len() != CCCD_SIZE {
        return Err(AttErrorCode::InvalidAttributeValueLength);
    }
    NotifyState::from_u16(u16::from_le_bytes([value[0], value[1]]))
        .ok_or(AttErrorCode::CccdImproperlyConfigured)
}

/// Effect of a CCCD write on the client configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CccdUpdate {
    pub changed: bool,
    /// All CCCDs have been written at least once.
    pub complete: bool,
    /// This write was the last one missing.
    pub completed_now: bool,
}

#[derive(Clone, Copy, Debug)]
struct Client {
    cid: ConnectionId,
    config: ClientConfig,
    written: Written,
}

impl Client {
    fn state_mut(&mut self, characteristic: Characteristic) -> &mut NotifyState {
        match characteristic {
            Characteristic::Sirk => &mut self.config.sirk,
            Characteristic::Size => &mut self.config.size,
            Characteristic::Lock => &mut self.config.lock,
        }
    }
}

fn state_of(config: &ClientConfig, characteristic: Characteristic) -> NotifyState {
    match characteristic {
        Characteristic::Sirk => config.sirk,
        Characteristic::Size => config.size,
        Characteristic::Lock => config.lock,
    }
}

/// Client configurations of one service instance, bounded to
/// `MAX_CONNECTIONS` entries.
#[derive(Debug, Default)]
pub struct ClientTable {
    clients: [Option<Client>; MAX_CONNECTIONS],
}

impl ClientTable {
    fn find(&self, cid: ConnectionId) -> Option<&Client> {
        self.clients.iter().flatten().find(|client| client.cid == cid)
    }

    fn find_mut(&mut self, cid: ConnectionId) -> Option<&mut Client> {
        self.clients.iter_mut().flatten().find(|client| client.cid == cid)
    }

    pub fn contains(&self, cid: ConnectionId) -> bool {
        self.find(cid).is_some()
    }

    /// Add or replace the configuration of `cid`. A configuration restored
    /// for a bonded device counts as fully written.
    pub fn add(
        &mut self,
        cid: ConnectionId,
        config: Option<ClientConfig>,
    ) -> Result<(), CsisError> {
        let written = if config.is_some() { Written::all() } else { Written::empty() };
        let client = Client { cid, config: config.unwrap_or_default(), written };

        if let Some(existing) = self.find_mut(cid) {
            *existing = client;
            return Ok(());
        }

        match self.clients.iter_mut().find(|slot| slot.is_none()) {
            Some(slot) => {
                *slot = Some(client);
                Ok(())
            }
            None => Err(CsisError::InsufficientResources),
        }
    }

    pub fn remove(&mut self, cid: ConnectionId) -> Option<ClientConfig> {
        self.clients
            .iter_mut()
            .find(|slot| matches!(slot, Some(client) if client.cid == cid))
            .and_then(Option::take)
            .map(|client| client.config)
    }

    pub fn get(&self, cid: ConnectionId) -> Option<ClientConfig> {
        self.find(cid).map(|client| client.config)
    }

    pub fn read_cccd(&self, cid: ConnectionId, characteristic: Characteristic) -> Option<Vec<u8>> {
        self.find(cid).map(|client| encode_cccd(state_of(&client.config, characteristic)))
    }

    pub fn write_cccd(
        &mut self,
        cid: ConnectionId,
        characteristic: Characteristic,
        value: &[u8],
    ) -> Result<CccdUpdate, AttErrorCode> {
        let state = decode_cccd(value)?;
        let client = self.find_mut(cid).ok_or(AttErrorCode::UnlikelyError)?;

        let was_complete = client.written.is_all();
        let changed = std::mem::replace(client.state_mut(characteristic), state) != state;
        client.written.insert(characteristic.into());
        let complete = client.written.is_all();

        Ok(CccdUpdate { changed, complete, completed_now: complete && !was_complete })
    }

    /// Connections subscribed to changes of `characteristic`.
    /// Indications are delivered as notifications.
    pub fn subscribers(&self, characteristic: Characteristic) -> Vec<ConnectionId> {
        self.clients
            .iter()
            .flatten()
            .filter(|client| state_of(&client.config, characteristic).enabled())
            .map(|client| client.cid)
            .collect()
    }
}
