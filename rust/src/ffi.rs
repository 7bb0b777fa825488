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

#![allow(clippy::undocumented_unsafe_blocks)]

use std::mem::ManuallyDrop;
use std::ptr;
use std::rc::Rc;
use std::slice;
use std::time::Instant;

use num_traits::FromPrimitive;

use crate::att::{Access, Address, AttErrorCode, AttHandle, ConnectionId};
use crate::csis::manager::CsisManager;
use crate::csis::{
    ClientConfig, Context, CsisMessage, InitParams, NotifyState, ServiceHandle, SirkExposure,
};

/// CSIS server instance handed to C callers.
pub type CsisServer = CsisManager<CsisServerOps>;

/// Status reported for successful accesses.
pub const ATT_SUCCESS: u8 = 0x00;

/// Returned in place of a service handle when none is available.
pub const INVALID_SERVICE_HANDLE: u16 = 0x0000;

/// CSIS server callbacks
#[repr(C)]
#[derive(Clone)]
pub struct CsisServerOps {
    user_pointer: *mut (),
    send_read_response: unsafe extern "C" fn(
        user: *mut (),
        cid: u32,
        handle: u16,
        status: u8,
        data: *const u8,
        len: usize,
    ),
    send_write_response: unsafe extern "C" fn(user: *mut (), cid: u32, handle: u16, status: u8),
    send_notification:
        unsafe extern "C" fn(user: *mut (), cid: u32, handle: u16, data: *const u8, len: usize),
    send_lock_message:
        unsafe extern "C" fn(user: *mut (), service: u16, cid: u32, remote: bool, lock: u8),
    send_config_message:
        unsafe extern "C" fn(user: *mut (), service: u16, cid: u32, complete: bool),
    get_peer_identity: unsafe extern "C" fn(user: *mut (), cid: u32, result: *mut [u8; 6]),
    sih: unsafe extern "C" fn(
        user: *mut (),
        sirk: *const [u8; 16],
        prand: *const [u8; 3],
        result: *mut [u8; 3],
    ),
    request_sirk_encryption: unsafe extern "C" fn(user: *mut (), cid: u32, sirk: *const [u8; 16]),
}

fn status(result: Result<(), AttErrorCode>) -> u8 {
    match result {
        Ok(()) => ATT_SUCCESS,
        Err(error) => error as u8,
    }
}

impl Context for CsisServerOps {
    fn send_read_response(
        &self,
        cid: ConnectionId,
        handle: AttHandle,
        result: Result<Vec<u8>, AttErrorCode>,
    ) {
        let (status, value) = match result {
            Ok(value) => (ATT_SUCCESS, value),
            Err(error) => (error as u8, vec![]),
        };
        unsafe {
            (self.send_read_response)(
                self.user_pointer,
                cid.0,
                handle,
                status,
                value.as_ptr(),
                value.len(),
            )
        }
    }

    fn send_write_response(
        &self,
        cid: ConnectionId,
        handle: AttHandle,
        result: Result<(), AttErrorCode>,
    ) {
        unsafe { (self.send_write_response)(self.user_pointer, cid.0, handle, status(result)) }
    }

    fn send_notification(&self, cid: ConnectionId, handle: AttHandle, value: &[u8]) {
        unsafe {
            (self.send_notification)(self.user_pointer, cid.0, handle, value.as_ptr(), value.len())
        }
    }

    fn send_message(&self, message: CsisMessage) {
        match message {
            CsisMessage::LockStateChanged { handle, cid, lock } => unsafe {
                (self.send_lock_message)(
                    self.user_pointer,
                    handle.0,
                    cid.map_or(0, |cid| cid.0),
                    cid.is_some(),
                    lock as u8,
                )
            },
            CsisMessage::ConfigChanged { handle, cid, complete } => unsafe {
                (self.send_config_message)(self.user_pointer, handle.0, cid.0, complete)
            },
        }
    }

    fn peer_identity(&self, cid: ConnectionId) -> Option<Address> {
        let mut result = [0; 6];
        unsafe { (self.get_peer_identity)(self.user_pointer, cid.0, &mut result as *mut _) };
        let address = Address::from(&result);
        (!address.is_empty()).then_some(address)
    }

    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sih(&self, sirk: &[u8; 16], prand: [u8; 3]) -> [u8; 3] {
        let mut result = [0; 3];
        unsafe {
            (self.sih)(
                self.user_pointer,
                sirk as *const _,
                &prand as *const _,
                &mut result as *mut _,
            )
        };
        result
    }

    fn request_sirk_encryption(&self, cid: ConnectionId, sirk: &[u8; 16]) {
        unsafe { (self.request_sirk_encryption)(self.user_pointer, cid.0, sirk as *const _) }
    }
}

/// Client Characteristic Configuration values of one client.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CsisClientConfig {
    pub lock: u16,
    pub sirk: u16,
    pub size: u16,
}

impl From<ClientConfig> for CsisClientConfig {
    fn from(config: ClientConfig) -> Self {
        CsisClientConfig {
            lock: config.lock as u16,
            sirk: config.sirk as u16,
            size: config.size as u16,
        }
    }
}

impl From<CsisClientConfig> for ClientConfig {
    fn from(config: CsisClientConfig) -> Self {
        let state = |value| NotifyState::from_u16(value).unwrap_or_default();
        ClientConfig {
            lock: state(config.lock),
            sirk: state(config.sirk),
            size: state(config.size),
        }
    }
}

unsafe fn init_params(
    rank: u8,
    set_size: u8,
    sirk: *const [u8; 16],
    exposure: u8,
) -> Option<InitParams> {
    if sirk.is_null() {
        return None;
    }
    let exposure = SirkExposure::from_u8(exposure)?;
    Some(InitParams { rank, set_size, sirk: unsafe { *sirk }, exposure })
}

/// Create a new CSIS server
/// # Arguments
/// * `ops` - Function callbacks required by the server
#[no_mangle]
pub extern "C" fn csis_server_create(ops: CsisServerOps) -> *const CsisServer {
    Rc::into_raw(Rc::new(CsisManager::new(Rc::new(ops))))
}

/// Register a service instance
/// Returns the service handle, or 0 if the parameters are invalid
/// # Arguments
/// * `server` - server pointer
/// * `rank` - rank of the device in the coordinated set
/// * `set_size` - number of devices in the coordinated set
/// * `sirk` - SIRK as array of 16 bytes, most significant byte first
/// * `exposure` - 0 (encrypted), 1 (plaintext) or 2 (out of band only)
/// * `start_handle` - first attribute handle of the instance
/// * `end_handle` - last attribute handle of the instance
/// # Safety
/// - This should be called from the thread of creation
/// - `server` must be a valid pointer
/// - `sirk` must be valid for reads for 16 bytes
#[no_mangle]
pub unsafe extern "C" fn csis_server_init(
    server: *const CsisServer,
    rank: u8,
    set_size: u8,
    sirk: *const [u8; 16],
    exposure: u8,
    start_handle: u16,
    end_handle: u16,
) -> u16 {
    let mut server = ManuallyDrop::new(unsafe { Rc::from_raw(server) });
    let (Some(server), Some(params)) =
        (Rc::get_mut(&mut server), unsafe { init_params(rank, set_size, sirk, exposure) })
    else {
        return INVALID_SERVICE_HANDLE;
    };
    server.init(params, start_handle, end_handle).map_or(INVALID_SERVICE_HANDLE, |handle| handle.0)
}

/// Process a read of one of the service attributes
/// Returns true if the access was handled
/// # Arguments
/// * `server` - server pointer
/// * `cid` - connection identifier of the client
/// * `handle` - attribute handle
/// # Safety
/// - This should be called from the thread of creation
/// - `server` must be a valid pointer
#[no_mangle]
pub unsafe extern "C" fn csis_server_ingest_read(
    server: *const CsisServer,
    cid: u32,
    handle: u16,
) -> bool {
    let mut server = ManuallyDrop::new(unsafe { Rc::from_raw(server) });
    Rc::get_mut(&mut server)
        .map_or(false, |server| {
            server.ingest_access(ConnectionId(cid), handle, Access::Read).is_ok()
        })
}

/// Process a write to one of the service attributes
/// Returns true if the access was handled
/// # Arguments
/// * `server` - server pointer
/// * `cid` - connection identifier of the client
/// * `handle` - attribute handle
/// * `data` - value written
/// * `len` - value len
/// # Safety
/// - This should be called from the thread of creation
/// - `server` must be a valid pointer
/// - `data` must be valid for reads of len `len`
#[no_mangle]
pub unsafe extern "C" fn csis_server_ingest_write(
    server: *const CsisServer,
    cid: u32,
    handle: u16,
    data: *const u8,
    len: usize,
) -> bool {
    let mut server = ManuallyDrop::new(unsafe { Rc::from_raw(server) });
    let value = if len == 0 { &[][..] } else { unsafe { slice::from_raw_parts(data, len) } };
    Rc::get_mut(&mut server).map_or(false, |server| {
        server.ingest_access(ConnectionId(cid), handle, Access::Write(value)).is_ok()
    })
}

/// Lock, unlock or refresh the lock of an instance on behalf of the application
/// Returns false if the instance is unknown
/// # Arguments
/// * `server` - server pointer
/// * `service` - service handle
/// * `lock` - 1 (unlock), 2 (lock), any other value refreshes the timeout
/// * `timeout` - lock timeout in seconds, 0 keeps the current one
/// # Safety
/// - This should be called from the thread of creation
/// - `server` must be a valid pointer
#[no_mangle]
pub unsafe extern "C" fn csis_server_set_lock(
    server: *const CsisServer,
    service: u16,
    lock: u8,
    timeout: u16,
) -> bool {
    let mut server = ManuallyDrop::new(unsafe { Rc::from_raw(server) });
    Rc::get_mut(&mut server)
        .map_or(false, |server| server.set_lock(ServiceHandle(service), lock.into(), timeout))
}

/// Query the lock of an instance
/// Returns the Lock characteristic value, or 0 if the instance is unknown
/// # Arguments
/// * `server` - server pointer
/// * `service` - service handle
/// # Safety
/// - This should be called from the thread of creation
/// - `server` must be a valid pointer
#[no_mangle]
pub unsafe extern "C" fn csis_server_get_lock(server: *const CsisServer, service: u16) -> u8 {
    let server = ManuallyDrop::new(unsafe { Rc::from_raw(server) });
    server.lock_state(ServiceHandle(service)).map_or(0, |state| state.value() as u8)
}

/// Query the instance holding the lock
/// Returns its service handle, or 0 if no instance is locked
/// # Arguments
/// * `server` - server pointer
/// # Safety
/// - This should be called from the thread of creation
/// - `server` must be a valid pointer
#[no_mangle]
pub unsafe extern "C" fn csis_server_get_lock_owner(server: *const CsisServer) -> u16 {
    let server = ManuallyDrop::new(unsafe { Rc::from_raw(server) });
    server.lock_owner().map_or(INVALID_SERVICE_HANDLE, |handle| handle.0)
}

/// Generate a Resolvable Set Identifier for an instance
/// Returns true if successful
/// # Arguments
/// * `server` - server pointer
/// * `service` - service handle
/// * `result` - Returns the RSI, least significant byte first
/// # Safety
/// - This should be called from the thread of creation
/// - `server` must be a valid pointer
/// - `result` must be valid for writes for 6 bytes
#[no_mangle]
pub unsafe extern "C" fn csis_server_get_rsi(
    server: *const CsisServer,
    service: u16,
    result: *mut [u8; 6],
) -> bool {
    let server = ManuallyDrop::new(unsafe { Rc::from_raw(server) });
    server
        .get_rsi(ServiceHandle(service))
        .map(|rsi| unsafe {
            *result = rsi;
        })
        .is_some()
}

/// Add the configuration of a client
/// Returns true if successful
/// # Arguments
/// * `server` - server pointer
/// * `service` - service handle
/// * `cid` - connection identifier of the client
/// * `config` - stored configuration of a bonded client, or null
/// # Safety
/// - This should be called from the thread of creation
/// - `server` must be a valid pointer
/// - `config` must be null or a valid pointer
#[no_mangle]
pub unsafe extern "C" fn csis_server_add_config(
    server: *const CsisServer,
    service: u16,
    cid: u32,
    config: *const CsisClientConfig,
) -> bool {
    let mut server = ManuallyDrop::new(unsafe { Rc::from_raw(server) });
    let config = unsafe { config.as_ref() }.map(|config| ClientConfig::from(*config));
    Rc::get_mut(&mut server).map_or(false, |server| {
        server.add_config(ServiceHandle(service), ConnectionId(cid), config).is_ok()
    })
}

/// Remove the configuration of a client
/// Returns true if the client had a configuration
/// # Arguments
/// * `server` - server pointer
/// * `service` - service handle
/// * `cid` - connection identifier of the client
/// * `result` - Returns the removed configuration if not null
/// # Safety
/// - This should be called from the thread of creation
/// - `server` must be a valid pointer
/// - `result` must be null or a valid pointer
#[no_mangle]
pub unsafe extern "C" fn csis_server_remove_config(
    server: *const CsisServer,
    service: u16,
    cid: u32,
    result: *mut CsisClientConfig,
) -> bool {
    let mut server = ManuallyDrop::new(unsafe { Rc::from_raw(server) });
    Rc::get_mut(&mut server)
        .and_then(|server| server.remove_config(ServiceHandle(service), ConnectionId(cid)))
        .map(|config| {
            if !result.is_null() {
                unsafe { ptr::write(result, config.into()) }
            }
        })
        .is_some()
}

/// Query the configuration of a client
/// Returns true if the client has a configuration
/// # Arguments
/// * `server` - server pointer
/// * `service` - service handle
/// * `cid` - connection identifier of the client
/// * `result` - Returns the configuration
/// # Safety
/// - This should be called from the thread of creation
/// - `server` must be a valid pointer
/// - `result` must be a valid pointer
#[no_mangle]
pub unsafe extern "C" fn csis_server_get_config(
    server: *const CsisServer,
    service: u16,
    cid: u32,
    result: *mut CsisClientConfig,
) -> bool {
    let server = ManuallyDrop::new(unsafe { Rc::from_raw(server) });
    server
        .get_config(ServiceHandle(service), ConnectionId(cid))
        .map(|config| unsafe {
            *result = config.into();
        })
        .is_some()
}

/// Replace the parameters of an instance
/// Returns true if successful
/// # Arguments
/// * `server` - server pointer
/// * `service` - service handle
/// * `rank`, `set_size`, `sirk`, `exposure` - as for `csis_server_init`
/// # Safety
/// - This should be called from the thread of creation
/// - `server` must be a valid pointer
/// - `sirk` must be valid for reads for 16 bytes
#[no_mangle]
pub unsafe extern "C" fn csis_server_update_init_param(
    server: *const CsisServer,
    service: u16,
    rank: u8,
    set_size: u8,
    sirk: *const [u8; 16],
    exposure: u8,
) -> bool {
    let mut server = ManuallyDrop::new(unsafe { Rc::from_raw(server) });
    let (Some(server), Some(params)) =
        (Rc::get_mut(&mut server), unsafe { init_params(rank, set_size, sirk, exposure) })
    else {
        return false;
    };
    server.update_init_param(ServiceHandle(service), params).is_ok()
}

/// Complete a SIRK encryption requested with `request_sirk_encryption`
/// Returns true if the encryption was pending
/// # Arguments
/// * `server` - server pointer
/// * `service` - service handle
/// * `cid` - connection identifier of the client
/// * `encrypted` - encrypted SIRK as array of 16 bytes, or null on failure
/// # Safety
/// - This should be called from the thread of creation
/// - `server` must be a valid pointer
/// - `encrypted` must be null or valid for reads for 16 bytes
#[no_mangle]
pub unsafe extern "C" fn csis_server_sirk_encrypted(
    server: *const CsisServer,
    service: u16,
    cid: u32,
    encrypted: *const [u8; 16],
) -> bool {
    let mut server = ManuallyDrop::new(unsafe { Rc::from_raw(server) });
    let encrypted = unsafe { encrypted.as_ref() }.copied();
    Rc::get_mut(&mut server).map_or(false, |server| {
        server.sirk_encrypted(ServiceHandle(service), ConnectionId(cid), encrypted).is_ok()
    })
}

/// Run the lock timer
/// # Arguments
/// * `server` - server pointer
/// # Safety
/// - This should be called from the thread of creation
/// - `server` must be a valid pointer
#[no_mangle]
pub unsafe extern "C" fn csis_server_tick(server: *const CsisServer) {
    let mut server = ManuallyDrop::new(unsafe { Rc::from_raw(server) });
    if let Some(server) = Rc::get_mut(&mut server) {
        server.tick();
    }
}

/// Deallocate the CSIS server
/// # Arguments
/// * `server` - server pointer
/// # Safety
/// - This should be called from the thread of creation
/// - `server` must be a valid pointers and must not be reused afterwards
#[no_mangle]
pub unsafe extern "C" fn csis_server_destroy(server: *const CsisServer) {
    unsafe {
        let _ = Rc::from_raw(server);
    }
}
