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

use std::future::Future;
use std::rc::Rc;
use std::task;

use log::{debug, info, warn};
use thiserror::Error;

use crate::att::{Access, AttErrorCode, AttHandle, ConnectionId};
use crate::csis::config::ClientTable;
use crate::csis::lock::{self, Held, Verdict};
use crate::csis::sirk::{self, SirkOperation, SirkQueue, SirkRequest, SirkType, RSI_SIZE};
use crate::csis::timer::{self, LockTimer};
use crate::csis::{
    Attribute, Characteristic, ClientConfig, Context, CsisMessage, InitParams, LockOwner,
    LockRequest, LockState, LockValue, ServiceHandle, SirkExposure, DEFAULT_LOCK_TIMEOUT,
    NUM_ATTRIBUTES,
};
use crate::future::noop_waker;

#[derive(Error, Debug)]
pub enum CsisError {
    #[error("Unknown service instance")]
    UnknownInstance,
    #[error("Unknown attribute handle")]
    UnknownHandle,
    #[error("Unknown connection")]
    UnknownConnection,
    #[error("Maximum number of client configurations reached")]
    InsufficientResources,
    #[error("Invalid init parameters")]
    InvalidParameters,
    #[error("Invalid attribute handle range")]
    InvalidHandleRange,
    #[error("No pending SIRK operation")]
    NoPendingSirkOperation,
}

struct Instance {
    handle: ServiceHandle,
    start_handle: AttHandle,
    end_handle: AttHandle,
    params: InitParams,
    lock_timeout: u16,
    clients: ClientTable,
    sirk_queue: SirkQueue,
}

impl Instance {
    fn contains(&self, handle: AttHandle) -> bool {
        (self.start_handle..=self.end_handle).contains(&handle)
    }

    fn attribute_handle(&self, attribute: Attribute) -> AttHandle {
        self.start_handle + attribute.offset()
    }

    /// Notify the subscribers of `characteristic`, except `except`.
    fn notify(
        &self,
        ctx: &impl Context,
        characteristic: Characteristic,
        value: &[u8],
        except: Option<ConnectionId>,
    ) {
        let handle = self.attribute_handle(Attribute::Value(characteristic));
        for cid in self.clients.subscribers(characteristic) {
            if Some(cid) != except {
                ctx.send_notification(cid, handle, value);
            }
        }
    }

    fn queue_sirk_request(&mut self, ctx: &impl Context, request: SirkRequest) {
        if self.sirk_queue.push(request) {
            ctx.request_sirk_encryption(request.cid, &self.params.sirk);
        }
    }
}

/// The lock held on one of the instances.
struct Lock {
    instance: ServiceHandle,
    owner: LockOwner,
    timer: LockTimer,
}

/// Owner of the local CSIS service instances.
///
/// At most one instance is locked at any time, whatever the number of
/// coordinated sets the device is a member of.
pub struct CsisManager<C: Context + 'static> {
    ctx: Rc<C>,
    instances: Vec<Instance>,
    lock: Option<Lock>,
    next_handle: u16,
}

impl<C: Context + 'static> CsisManager<C> {
    pub fn new(ctx: Rc<C>) -> Self {
        Self { ctx, instances: Vec::new(), lock: None, next_handle: 1 }
    }

    fn instance(&self, handle: ServiceHandle) -> Option<&Instance> {
        self.instances.iter().find(|instance| instance.handle == handle)
    }

    fn instance_mut(&mut self, handle: ServiceHandle) -> Option<&mut Instance> {
        self.instances.iter_mut().find(|instance| instance.handle == handle)
    }

    fn index_of(&self, handle: ServiceHandle) -> Option<usize> {
        self.instances.iter().position(|instance| instance.handle == handle)
    }

    /// Register a service instance occupying the attribute handles
    /// `start_handle..=end_handle`.
    pub fn init(
        &mut self,
        params: InitParams,
        start_handle: AttHandle,
        end_handle: AttHandle,
    ) -> Result<ServiceHandle, CsisError> {
        if !params.is_valid() {
            return Err(CsisError::InvalidParameters);
        }

        if start_handle == 0
            || end_handle < start_handle
            || end_handle - start_handle < NUM_ATTRIBUTES - 1
            || self.instances.iter().any(|instance| {
                start_handle <= instance.end_handle && instance.start_handle <= end_handle
            })
        {
            return Err(CsisError::InvalidHandleRange);
        }

        let handle = ServiceHandle(self.next_handle);
        self.next_handle = self.next_handle.checked_add(1).ok_or(CsisError::InsufficientResources)?;

        info!(
            "{}: rank {}/{} at handles {:#06x}..={:#06x}",
            handle, params.rank, params.set_size, start_handle, end_handle
        );

        self.instances.push(Instance {
            handle,
            start_handle,
            end_handle,
            params,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            clients: ClientTable::default(),
            sirk_queue: SirkQueue::default(),
        });
        Ok(handle)
    }

    pub fn lock_state(&self, handle: ServiceHandle) -> Option<LockState> {
        self.instance(handle)?;
        Some(match &self.lock {
            Some(lock) if lock.instance == handle => LockState::Locked { owner: lock.owner },
            _ => LockState::Unlocked,
        })
    }

    /// The instance holding the lock, if any.
    pub fn lock_owner(&self) -> Option<ServiceHandle> {
        self.lock.as_ref().map(|lock| lock.instance)
    }

    pub fn lock_timeout(&self, handle: ServiceHandle) -> Option<u16> {
        self.instance(handle).map(|instance| instance.lock_timeout)
    }

    fn acquire(&mut self, index: usize, owner: LockOwner, except: Option<ConnectionId>) {
        let instance = &self.instances[index];
        info!("{}: locked by {:?} for {}s", instance.handle, owner, instance.lock_timeout);

        self.lock = Some(Lock {
            instance: instance.handle,
            owner,
            timer: timer::lock_timer(&self.ctx, instance.lock_timeout),
        });

        instance.notify(&*self.ctx, Characteristic::Lock, &[LockValue::Locked as u8], except);
        self.ctx.send_message(CsisMessage::LockStateChanged {
            handle: instance.handle,
            cid: owner.cid(),
            lock: LockValue::Locked,
        });
    }

    /// Release the lock, cancelling its timer. `cid` is the connection
    /// responsible for the release.
    fn release(&mut self, cid: Option<ConnectionId>, except: Option<ConnectionId>) {
        let lock = match self.lock.take() {
            Some(lock) => lock,
            None => return,
        };

        if let Some(instance) = self.instance(lock.instance) {
            info!("{}: unlocked", instance.handle);
            instance.notify(&*self.ctx, Characteristic::Lock, &[LockValue::Unlocked as u8], except);
            self.ctx.send_message(CsisMessage::LockStateChanged {
                handle: instance.handle,
                cid,
                lock: LockValue::Unlocked,
            });
        }
    }

    fn restart_timer(&mut self, timeout: u16) {
        if let Some(lock) = self.lock.as_mut() {
            debug!("{}: lock timer restarted for {}s", lock.instance, timeout);
            lock.timer = timer::lock_timer(&self.ctx, timeout);
        }
    }

    /// Lock or unlock an instance on behalf of the local application.
    /// A non zero `timeout` replaces the lock timeout of the instance.
    /// Returns false if the instance is unknown.
    pub fn set_lock(&mut self, handle: ServiceHandle, request: LockRequest, timeout: u16) -> bool {
        let index = match self.index_of(handle) {
            Some(index) => index,
            None => return false,
        };

        if timeout != 0 {
            self.instances[index].lock_timeout = timeout;
        }
        let timeout = self.instances[index].lock_timeout;
        let locked_here = self.lock_owner() == Some(handle);

        match request {
            LockRequest::Lock if locked_here => self.restart_timer(timeout),
            LockRequest::Lock => {
                // Locking takes precedence over a lock held on another instance.
                self.release(None, None);
                self.acquire(index, LockOwner::Local, None);
            }
            LockRequest::Unlock if locked_here => self.release(None, None),
            LockRequest::RefreshTimeout if locked_here => self.restart_timer(timeout),
            LockRequest::Unlock | LockRequest::RefreshTimeout => (),
        }
        true
    }

    /// Compute a fresh Resolvable Set Identifier for the instance.
    /// None if the instance is unknown or its SIRK is shared out of band.
    pub fn get_rsi(&self, handle: ServiceHandle) -> Option<[u8; RSI_SIZE]> {
        let instance = self.instance(handle)?;
        match instance.params.exposure {
            SirkExposure::OobOnly => None,
            _ => Some(sirk::rsi(&*self.ctx, &instance.params.sirk, sirk::prand())),
        }
    }

    /// Add the configuration of a connection, or the default configuration
    /// if `config` is None.
    pub fn add_config(
        &mut self,
        handle: ServiceHandle,
        cid: ConnectionId,
        config: Option<ClientConfig>,
    ) -> Result<(), CsisError> {
        let instance = self.instance_mut(handle).ok_or(CsisError::UnknownInstance)?;
        instance.clients.add(cid, config).map_err(|err| {
            warn!("{}: no room for the configuration of {}", handle, cid);
            err
        })
    }

    /// Remove the configuration of a connection and hand it back so it can
    /// be stored for a bonded device. A lock held by a connection without
    /// known identity is released.
    pub fn remove_config(
        &mut self,
        handle: ServiceHandle,
        cid: ConnectionId,
    ) -> Option<ClientConfig> {
        let instance = self.instance_mut(handle)?;
        let config = instance.clients.remove(cid)?;
        instance.sirk_queue.cancel(cid);

        let release = match &self.lock {
            Some(lock) if lock.instance == handle => matches!(
                lock.owner,
                LockOwner::Remote { cid: owner, identity: None } if owner == cid
            ),
            _ => false,
        };
        if release {
            info!("{}: lock owner {} removed", handle, cid);
            self.release(Some(cid), Some(cid));
        }

        Some(config)
    }

    pub fn get_config(&self, handle: ServiceHandle, cid: ConnectionId) -> Option<ClientConfig> {
        self.instance(handle)?.clients.get(cid)
    }

    /// Replace the init parameters of an instance, notifying subscribers of
    /// the Size and SIRK characteristics of the values that changed.
    pub fn update_init_param(
        &mut self,
        handle: ServiceHandle,
        params: InitParams,
    ) -> Result<(), CsisError> {
        if !params.is_valid() {
            return Err(CsisError::InvalidParameters);
        }

        let ctx = &*self.ctx;
        let instance = self
            .instances
            .iter_mut()
            .find(|instance| instance.handle == handle)
            .ok_or(CsisError::UnknownInstance)?;
        let previous = std::mem::replace(&mut instance.params, params);

        if previous.set_size != instance.params.set_size {
            instance.notify(ctx, Characteristic::Size, &[instance.params.set_size], None);
        }

        if previous.sirk != instance.params.sirk {
            match instance.params.exposure {
                SirkExposure::Plaintext => {
                    let value = sirk::encode_sirk(SirkType::Plaintext, &instance.params.sirk);
                    instance.notify(ctx, Characteristic::Sirk, &value, None);
                }
                SirkExposure::Encrypted => {
                    for cid in instance.clients.subscribers(Characteristic::Sirk) {
                        instance.queue_sirk_request(
                            ctx,
                            SirkRequest { cid, operation: SirkOperation::Notify },
                        );
                    }
                }
                SirkExposure::OobOnly => (),
            }
        }
        Ok(())
    }

    /// Process an attribute access from the GATT server. Accesses from a
    /// connection without configuration on the instance are dropped.
    pub fn ingest_access(
        &mut self,
        cid: ConnectionId,
        handle: AttHandle,
        access: Access<'_>,
    ) -> Result<(), CsisError> {
        let index = self
            .instances
            .iter()
            .position(|instance| instance.contains(handle))
            .ok_or(CsisError::UnknownHandle)?;
        let instance = &self.instances[index];

        if !instance.clients.contains(cid) {
            warn!("{}: access to {:#06x} from unknown connection {}", instance.handle, handle, cid);
            return Err(CsisError::UnknownConnection);
        }

        let ctx = &*self.ctx;
        let attribute = Attribute::from_offset(handle - instance.start_handle);

        match (attribute, access) {
            (None, Access::Read) => {
                ctx.send_read_response(cid, handle, Err(AttErrorCode::InvalidHandle))
            }
            (None, Access::Write(_)) => {
                ctx.send_write_response(cid, handle, Err(AttErrorCode::InvalidHandle))
            }
            (Some(Attribute::Service), Access::Read) => {
                ctx.send_read_response(cid, handle, Ok(vec![]))
            }
            (Some(Attribute::Rank), Access::Read) => {
                ctx.send_read_response(cid, handle, Ok(vec![instance.params.rank]))
            }
            (Some(Attribute::Value(Characteristic::Size)), Access::Read) => {
                ctx.send_read_response(cid, handle, Ok(vec![instance.params.set_size]))
            }
            (Some(Attribute::Value(Characteristic::Lock)), Access::Read) => {
                let value = match &self.lock {
                    Some(lock) if lock.instance == instance.handle => LockValue::Locked,
                    _ => LockValue::Unlocked,
                };
                ctx.send_read_response(cid, handle, Ok(vec![value as u8]))
            }
            (Some(Attribute::Value(Characteristic::Lock)), Access::Write(value)) => {
                self.write_lock(index, cid, value)
            }
            (Some(Attribute::Value(Characteristic::Sirk)), Access::Read) => {
                self.read_sirk(index, cid)
            }
            (Some(Attribute::ClientConfig(characteristic)), Access::Read) => {
                let value = instance.clients.read_cccd(cid, characteristic).unwrap_or_default();
                ctx.send_read_response(cid, handle, Ok(value))
            }
            (Some(Attribute::ClientConfig(characteristic)), Access::Write(value)) => {
                self.write_cccd(index, cid, characteristic, value)
            }
            (Some(_), Access::Write(_)) => {
                ctx.send_write_response(cid, handle, Err(AttErrorCode::WriteNotPermitted))
            }
        }
        Ok(())
    }

    fn write_lock(&mut self, index: usize, cid: ConnectionId, value: &[u8]) {
        let instance = &self.instances[index];
        let handle = instance.attribute_handle(Attribute::Value(Characteristic::Lock));
        let identity = self.ctx.peer_identity(cid);
        let held =
            self.lock.as_ref().map(|lock| Held { instance: lock.instance, owner: &lock.owner });

        let verdict = lock::evaluate(held, instance.handle, cid, identity, value);
        self.ctx.send_write_response(cid, handle, verdict.response());

        match verdict {
            Verdict::Acquire => self.acquire(index, LockOwner::Remote { cid, identity }, Some(cid)),
            Verdict::Release => self.release(Some(cid), Some(cid)),
            Verdict::AlreadyGranted { reassign: true } => {
                if let Some(Lock { owner: LockOwner::Remote { cid: owner, .. }, .. }) =
                    self.lock.as_mut()
                {
                    debug!("lock owner reconnected as {}", cid);
                    *owner = cid;
                }
            }
            Verdict::Reject(error) => debug!("lock write from {} rejected: {:?}", cid, error),
            Verdict::AlreadyGranted { reassign: false } | Verdict::Unchanged => (),
        }
    }

    fn read_sirk(&mut self, index: usize, cid: ConnectionId) {
        let ctx = &*self.ctx;
        let instance = &mut self.instances[index];
        let handle = instance.attribute_handle(Attribute::Value(Characteristic::Sirk));

        match instance.params.exposure {
            SirkExposure::OobOnly => {
                ctx.send_read_response(cid, handle, Err(AttErrorCode::OobSirkOnly))
            }
            SirkExposure::Plaintext => ctx.send_read_response(
                cid,
                handle,
                Ok(sirk::encode_sirk(SirkType::Plaintext, &instance.params.sirk)),
            ),
            SirkExposure::Encrypted if instance.sirk_queue.is_busy() => {
                debug!("{}: SIRK encryption in progress", instance.handle);
                ctx.send_read_response(cid, handle, Err(AttErrorCode::InsufficientResources))
            }
            SirkExposure::Encrypted => instance
                .queue_sirk_request(ctx, SirkRequest { cid, operation: SirkOperation::Read }),
        }
    }

    fn write_cccd(
        &mut self,
        index: usize,
        cid: ConnectionId,
        characteristic: Characteristic,
        value: &[u8],
    ) {
        let ctx = &*self.ctx;
        let instance = &mut self.instances[index];
        let handle = instance.attribute_handle(Attribute::ClientConfig(characteristic));

        match instance.clients.write_cccd(cid, characteristic, value) {
            Ok(update) => {
                ctx.send_write_response(cid, handle, Ok(()));
                if update.changed || update.completed_now {
                    ctx.send_message(CsisMessage::ConfigChanged {
                        handle: instance.handle,
                        cid,
                        complete: update.complete,
                    });
                }
            }
            Err(error) => ctx.send_write_response(cid, handle, Err(error)),
        }
    }

    /// Completion of `Context::request_sirk_encryption`; `key` is None if
    /// the encryption failed.
    pub fn sirk_encrypted(
        &mut self,
        handle: ServiceHandle,
        cid: ConnectionId,
        key: Option<[u8; 16]>,
    ) -> Result<(), CsisError> {
        let ctx = &*self.ctx;
        let instance = self
            .instances
            .iter_mut()
            .find(|instance| instance.handle == handle)
            .ok_or(CsisError::UnknownInstance)?;
        let request = instance.sirk_queue.complete(cid).ok_or(CsisError::NoPendingSirkOperation)?;
        let value_handle = instance.attribute_handle(Attribute::Value(Characteristic::Sirk));

        match (request.operation, key) {
            (SirkOperation::Read, _) if !instance.clients.contains(cid) => {
                debug!("{}: SIRK read by {} dropped, connection removed", handle, cid)
            }
            (SirkOperation::Read, Some(key)) => ctx.send_read_response(
                cid,
                value_handle,
                Ok(sirk::encode_sirk(SirkType::Encrypted, &key)),
            ),
            (SirkOperation::Read, None) => {
                warn!("{}: SIRK encryption for {} failed", handle, cid);
                ctx.send_read_response(cid, value_handle, Err(AttErrorCode::UnlikelyError))
            }
            (SirkOperation::Notify, Some(key)) => {
                if instance.clients.subscribers(Characteristic::Sirk).contains(&cid) {
                    let value = sirk::encode_sirk(SirkType::Encrypted, &key);
                    ctx.send_notification(cid, value_handle, &value);
                }
            }
            (SirkOperation::Notify, None) => {
                warn!("{}: SIRK encryption for {} failed, change not notified", handle, cid)
            }
        }

        if let Some(next) = instance.sirk_queue.front() {
            ctx.request_sirk_encryption(next.cid, &instance.params.sirk);
        }
        Ok(())
    }

    /// Run the lock timer. The lock is released once it expires.
    pub fn tick(&mut self) {
        let waker = noop_waker();
        let expired = match self.lock.as_mut() {
            Some(lock) => {
                lock.timer.as_mut().poll(&mut task::Context::from_waker(&waker)).is_ready()
            }
            None => false,
        };

        if expired {
            let cid = self.lock.as_ref().and_then(|lock| lock.owner.cid());
            info!("lock timeout expired");
            self.release(cid, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;
    use std::time::Duration;

    use super::*;
    use crate::att::Address;
    use crate::csis::test::TestContext;
    use crate::csis::{NotifyState, MAX_CONNECTIONS};

    const START: AttHandle = 0x0010;
    const END: AttHandle = START + NUM_ATTRIBUTES - 1;
    const SIRK: AttHandle = START + 2;
    const SIRK_CCCD: AttHandle = START + 3;
    const SIZE: AttHandle = START + 5;
    const SIZE_CCCD: AttHandle = START + 6;
    const LOCK: AttHandle = START + 8;
    const LOCK_CCCD: AttHandle = START + 9;
    const RANK: AttHandle = START + 11;

    const C: ConnectionId = ConnectionId(0x40);
    const D: ConnectionId = ConnectionId(0x41);

    const LOCKED: &[u8] = &[0x02];
    const UNLOCKED: &[u8] = &[0x01];
    const NOTIFY: &[u8] = &[0x01, 0x00];

    const KEY: [u8; 16] = [
        0x45, 0x7d, 0x7d, 0x09, 0x21, 0xa1, 0xfd, 0x22, 0xce, 0xcd, 0x8c, 0x86, 0xdd, 0x72, 0xcc,
        0xcd,
    ];

    fn params(exposure: SirkExposure) -> InitParams {
        InitParams { rank: 1, set_size: 2, sirk: KEY, exposure }
    }

    fn setup_with(
        ctx: TestContext,
        exposure: SirkExposure,
    ) -> (Rc<TestContext>, CsisManager<TestContext>, ServiceHandle) {
        let ctx = Rc::new(ctx);
        let mut manager = CsisManager::new(ctx.clone());
        let handle = manager.init(params(exposure), START, END).unwrap();
        for cid in [C, D] {
            manager.add_config(handle, cid, None).unwrap();
        }
        (ctx, manager, handle)
    }

    fn setup() -> (Rc<TestContext>, CsisManager<TestContext>, ServiceHandle) {
        setup_with(TestContext::new(), SirkExposure::Plaintext)
    }

    fn subscribe(
        ctx: &TestContext,
        manager: &mut CsisManager<TestContext>,
        cid: ConnectionId,
        cccd: AttHandle,
    ) {
        manager.ingest_access(cid, cccd, Access::Write(NOTIFY)).unwrap();
        assert_eq!(ctx.pop_write_response(), Some((cid, cccd, Ok(()))));
        while ctx.pop_message().is_some() {}
    }

    fn write_lock(
        ctx: &TestContext,
        manager: &mut CsisManager<TestContext>,
        cid: ConnectionId,
        value: &[u8],
    ) -> Result<(), AttErrorCode> {
        manager.ingest_access(cid, LOCK, Access::Write(value)).unwrap();
        let (response_cid, response_handle, result) = ctx.pop_write_response().unwrap();
        assert_eq!((response_cid, response_handle), (cid, LOCK));
        result
    }

    fn owner(manager: &CsisManager<TestContext>, handle: ServiceHandle) -> Option<ConnectionId> {
        match manager.lock_state(handle) {
            Some(LockState::Locked { owner }) => owner.cid(),
            _ => None,
        }
    }

    #[test]
    fn lock_and_unlock_by_owner() {
        let (ctx, mut manager, handle) = setup();
        subscribe(&ctx, &mut manager, C, LOCK_CCCD);
        subscribe(&ctx, &mut manager, D, LOCK_CCCD);

        assert_eq!(write_lock(&ctx, &mut manager, C, LOCKED), Ok(()));
        assert_eq!(ctx.pop_notification(), Some((D, LOCK, vec![0x02])));
        assert_eq!(
            ctx.pop_message(),
            Some(CsisMessage::LockStateChanged { handle, cid: Some(C), lock: LockValue::Locked })
        );
        assert_eq!(owner(&manager, handle), Some(C));
        assert_eq!(manager.lock_owner(), Some(handle));
        assert!(ctx.is_idle());

        assert_eq!(write_lock(&ctx, &mut manager, C, UNLOCKED), Ok(()));
        assert_eq!(ctx.pop_notification(), Some((D, LOCK, vec![0x01])));
        assert_eq!(
            ctx.pop_message(),
            Some(CsisMessage::LockStateChanged { handle, cid: Some(C), lock: LockValue::Unlocked })
        );
        assert_eq!(manager.lock_state(handle), Some(LockState::Unlocked));
        assert_eq!(manager.lock_owner(), None);
        assert!(ctx.is_idle());
    }

    #[test]
    fn lock_denied_then_released_before_timeout() {
        let (ctx, mut manager, handle) = setup();
        assert!(manager.set_lock(handle, LockRequest::RefreshTimeout, 1));
        assert_eq!(manager.lock_timeout(handle), Some(1));
        assert!(ctx.is_idle());

        assert_eq!(write_lock(&ctx, &mut manager, C, LOCKED), Ok(()));
        ctx.pop_message();

        ctx.advance(Duration::from_millis(500));
        manager.tick();
        assert_eq!(write_lock(&ctx, &mut manager, D, LOCKED), Err(AttErrorCode::LockDenied));
        assert_eq!(owner(&manager, handle), Some(C));

        ctx.advance(Duration::from_millis(400));
        manager.tick();
        assert_eq!(write_lock(&ctx, &mut manager, C, UNLOCKED), Ok(()));
        ctx.pop_message();

        ctx.advance(Duration::from_millis(100));
        manager.tick();
        ctx.advance(Duration::from_secs(5));
        manager.tick();
        assert!(ctx.is_idle());
        assert_eq!(manager.lock_state(handle), Some(LockState::Unlocked));
    }

    #[test]
    fn lock_expires_after_default_timeout() {
        let (ctx, mut manager, handle) = setup();
        subscribe(&ctx, &mut manager, C, LOCK_CCCD);
        subscribe(&ctx, &mut manager, D, LOCK_CCCD);

        assert_eq!(write_lock(&ctx, &mut manager, C, LOCKED), Ok(()));
        ctx.pop_notification();
        ctx.pop_message();

        ctx.advance(Duration::from_secs(59));
        manager.tick();
        assert!(ctx.is_idle());
        assert_eq!(owner(&manager, handle), Some(C));

        ctx.advance(Duration::from_secs(1));
        manager.tick();
        assert_eq!(manager.lock_state(handle), Some(LockState::Unlocked));
        assert_eq!(
            ctx.pop_message(),
            Some(CsisMessage::LockStateChanged { handle, cid: Some(C), lock: LockValue::Unlocked })
        );
        assert_eq!(ctx.pop_notification(), Some((C, LOCK, vec![0x01])));
        assert_eq!(ctx.pop_notification(), Some((D, LOCK, vec![0x01])));

        manager.tick();
        ctx.advance(Duration::from_secs(60));
        manager.tick();
        assert!(ctx.is_idle());
    }

    #[test]
    fn only_owner_unlocks() {
        let (ctx, mut manager, handle) = setup();
        subscribe(&ctx, &mut manager, C, LOCK_CCCD);

        assert_eq!(write_lock(&ctx, &mut manager, C, LOCKED), Ok(()));
        ctx.pop_message();

        assert_eq!(
            write_lock(&ctx, &mut manager, D, UNLOCKED),
            Err(AttErrorCode::LockReleaseNotAllowed)
        );
        assert_eq!(owner(&manager, handle), Some(C));
        assert!(ctx.is_idle());
    }

    #[test]
    fn invalid_lock_values_are_rejected() {
        let (ctx, mut manager, handle) = setup();
        subscribe(&ctx, &mut manager, D, LOCK_CCCD);

        for value in [0x00, 0x03, 0xff] {
            assert_eq!(
                write_lock(&ctx, &mut manager, C, &[value]),
                Err(AttErrorCode::InvalidLockValue)
            );
            assert_eq!(manager.lock_state(handle), Some(LockState::Unlocked));
        }

        assert_eq!(write_lock(&ctx, &mut manager, C, LOCKED), Ok(()));
        ctx.pop_notification();
        ctx.pop_message();
        assert_eq!(write_lock(&ctx, &mut manager, C, &[0x00]), Err(AttErrorCode::InvalidLockValue));
        assert_eq!(owner(&manager, handle), Some(C));
        assert!(ctx.is_idle());
    }

    #[test]
    fn mutual_exclusion_under_alternating_writes() {
        let (ctx, mut manager, handle) = setup();

        let mut expected = None;
        for step in 0..40 {
            let cid = if step % 2 == 0 { C } else { D };
            let value = if step % 3 == 0 { UNLOCKED } else { LOCKED };
            let _ = write_lock(&ctx, &mut manager, cid, value);

            expected = match (expected, value[0]) {
                (None, 0x02) => Some(cid),
                (Some(owner), 0x01) if owner == cid => None,
                (expected, _) => expected,
            };
            assert_eq!(owner(&manager, handle), expected);
            assert_eq!(manager.lock_owner().is_some(), expected.is_some());
            while ctx.pop_message().is_some() {}
        }
    }

    #[test]
    fn unlock_when_unlocked_is_silent() {
        let (ctx, mut manager, _) = setup();
        subscribe(&ctx, &mut manager, D, LOCK_CCCD);

        assert_eq!(write_lock(&ctx, &mut manager, C, UNLOCKED), Ok(()));
        assert!(ctx.is_idle());
    }

    #[test]
    fn lock_already_granted() {
        let (ctx, mut manager, handle) = setup();
        assert_eq!(write_lock(&ctx, &mut manager, C, LOCKED), Ok(()));
        ctx.pop_message();

        assert_eq!(
            write_lock(&ctx, &mut manager, C, LOCKED),
            Err(AttErrorCode::LockAlreadyGranted)
        );
        assert_eq!(owner(&manager, handle), Some(C));
        assert!(ctx.is_idle());
    }

    #[test]
    fn lock_kept_across_reconnection() {
        let identity = Address([0x01, 0x02, 0x03, 0x04, 0x05, 0x06]);
        let reconnected = ConnectionId(0x42);
        let ctx =
            TestContext::new().with_identity(C, identity).with_identity(reconnected, identity);
        let (ctx, mut manager, handle) = setup_with(ctx, SirkExposure::Plaintext);

        assert_eq!(write_lock(&ctx, &mut manager, C, LOCKED), Ok(()));
        ctx.pop_message();

        // Bonded owner: the lock survives the removal of its configuration.
        let config = manager.remove_config(handle, C).unwrap();
        assert_eq!(owner(&manager, handle), Some(C));
        manager.add_config(handle, reconnected, Some(config)).unwrap();

        assert_eq!(
            write_lock(&ctx, &mut manager, reconnected, LOCKED),
            Err(AttErrorCode::LockAlreadyGranted)
        );
        assert_eq!(owner(&manager, handle), Some(reconnected));
        assert!(ctx.is_idle());

        assert_eq!(write_lock(&ctx, &mut manager, reconnected, UNLOCKED), Ok(()));
        assert_eq!(
            ctx.pop_message(),
            Some(CsisMessage::LockStateChanged {
                handle,
                cid: Some(reconnected),
                lock: LockValue::Unlocked
            })
        );
    }

    #[test]
    fn bonded_owner_not_matched_by_reused_cid() {
        let identity = Address([0x01, 0x02, 0x03, 0x04, 0x05, 0x06]);
        let ctx = TestContext::new().with_identity(C, identity);
        let (ctx, mut manager, handle) = setup_with(ctx, SirkExposure::Plaintext);

        assert_eq!(write_lock(&ctx, &mut manager, C, LOCKED), Ok(()));
        ctx.pop_message();
        manager.remove_config(handle, C).unwrap();
        assert_eq!(owner(&manager, handle), Some(C));

        // Another device, without identity, gets the same connection id.
        ctx.forget_identity(C);
        manager.add_config(handle, C, None).unwrap();

        assert_eq!(
            write_lock(&ctx, &mut manager, C, UNLOCKED),
            Err(AttErrorCode::LockReleaseNotAllowed)
        );
        assert_eq!(write_lock(&ctx, &mut manager, C, LOCKED), Err(AttErrorCode::LockDenied));
        assert_eq!(
            manager.lock_state(handle),
            Some(LockState::Locked {
                owner: LockOwner::Remote { cid: C, identity: Some(identity) }
            })
        );
        assert!(ctx.is_idle());
    }

    #[test]
    fn removing_anonymous_owner_releases_lock() {
        let (ctx, mut manager, handle) = setup();
        subscribe(&ctx, &mut manager, D, LOCK_CCCD);
        assert_eq!(write_lock(&ctx, &mut manager, C, LOCKED), Ok(()));
        ctx.pop_notification();
        ctx.pop_message();

        assert_eq!(manager.remove_config(handle, C), Some(ClientConfig::default()));
        assert_eq!(manager.lock_state(handle), Some(LockState::Unlocked));
        assert_eq!(ctx.pop_notification(), Some((D, LOCK, vec![0x01])));
        assert_eq!(
            ctx.pop_message(),
            Some(CsisMessage::LockStateChanged { handle, cid: Some(C), lock: LockValue::Unlocked })
        );

        ctx.advance(Duration::from_secs(60));
        manager.tick();
        assert!(ctx.is_idle());
    }

    #[test]
    fn application_lock() {
        let (ctx, mut manager, handle) = setup();
        subscribe(&ctx, &mut manager, C, LOCK_CCCD);

        assert!(manager.set_lock(handle, LockRequest::Lock, 10));
        assert_eq!(ctx.pop_notification(), Some((C, LOCK, vec![0x02])));
        assert_eq!(
            ctx.pop_message(),
            Some(CsisMessage::LockStateChanged { handle, cid: None, lock: LockValue::Locked })
        );
        assert_eq!(manager.lock_state(handle), Some(LockState::Locked { owner: LockOwner::Local }));

        assert_eq!(write_lock(&ctx, &mut manager, C, LOCKED), Err(AttErrorCode::LockDenied));
        assert_eq!(
            write_lock(&ctx, &mut manager, C, UNLOCKED),
            Err(AttErrorCode::LockReleaseNotAllowed)
        );

        assert!(manager.set_lock(handle, LockRequest::Unlock, 0));
        assert_eq!(ctx.pop_notification(), Some((C, LOCK, vec![0x01])));
        assert_eq!(
            ctx.pop_message(),
            Some(CsisMessage::LockStateChanged { handle, cid: None, lock: LockValue::Unlocked })
        );
        assert_eq!(manager.lock_timeout(handle), Some(10));

        assert!(manager.set_lock(handle, LockRequest::Unlock, 0));
        assert!(ctx.is_idle());
    }

    #[test]
    fn application_refreshes_timer() {
        let (ctx, mut manager, handle) = setup();
        assert!(manager.set_lock(handle, LockRequest::Lock, 10));
        ctx.pop_message();

        ctx.advance(Duration::from_secs(8));
        manager.tick();
        assert!(manager.set_lock(handle, LockRequest::RefreshTimeout, 10));
        assert!(ctx.is_idle());

        ctx.advance(Duration::from_secs(8));
        manager.tick();
        assert_eq!(manager.lock_state(handle), Some(LockState::Locked { owner: LockOwner::Local }));

        ctx.advance(Duration::from_secs(2));
        manager.tick();
        assert_eq!(manager.lock_state(handle), Some(LockState::Unlocked));
        assert_eq!(
            ctx.pop_message(),
            Some(CsisMessage::LockStateChanged { handle, cid: None, lock: LockValue::Unlocked })
        );
    }

    #[test]
    fn application_lock_on_invalid_instance() {
        let (ctx, mut manager, _) = setup();
        assert!(!manager.set_lock(ServiceHandle(0x99), LockRequest::Lock, 10));
        assert_eq!(manager.lock_owner(), None);
        assert!(ctx.is_idle());
    }

    #[test]
    fn single_lock_across_instances() {
        let (ctx, mut manager, first) = setup();
        let second = manager.init(params(SirkExposure::Plaintext), 0x0100, 0x0120).unwrap();
        manager.add_config(second, C, None).unwrap();
        manager.add_config(second, D, None).unwrap();

        assert_eq!(write_lock(&ctx, &mut manager, C, LOCKED), Ok(()));
        ctx.pop_message();
        assert_eq!(manager.lock_owner(), Some(first));

        let second_lock = 0x0100 + 8;
        for cid in [C, D] {
            manager.ingest_access(cid, second_lock, Access::Write(LOCKED)).unwrap();
            assert_eq!(
                ctx.pop_write_response(),
                Some((cid, second_lock, Err(AttErrorCode::LockDenied)))
            );
        }
        manager.ingest_access(D, second_lock, Access::Read).unwrap();
        assert_eq!(ctx.pop_read_response(), Some((D, second_lock, Ok(vec![0x01]))));

        // The application moves the lock to the second instance.
        assert!(manager.set_lock(second, LockRequest::Lock, 0));
        assert_eq!(
            ctx.pop_message(),
            Some(CsisMessage::LockStateChanged {
                handle: first,
                cid: None,
                lock: LockValue::Unlocked
            })
        );
        assert_eq!(
            ctx.pop_message(),
            Some(CsisMessage::LockStateChanged {
                handle: second,
                cid: None,
                lock: LockValue::Locked
            })
        );
        assert_eq!(manager.lock_owner(), Some(second));
        assert_eq!(manager.lock_state(first), Some(LockState::Unlocked));
    }

    #[test]
    fn add_config_defaults() {
        let (_, mut manager, handle) = setup();
        manager.add_config(handle, ConnectionId(5), None).unwrap();
        let config = manager.get_config(handle, ConnectionId(5)).unwrap();
        assert_eq!(config.lock, NotifyState::Disabled);
        assert_eq!(config.sirk, NotifyState::Disabled);
        assert_eq!(config.size, NotifyState::Disabled);

        assert!(matches!(
            manager.add_config(ServiceHandle(0x99), ConnectionId(5), None),
            Err(CsisError::UnknownInstance)
        ));
        assert_eq!(manager.get_config(handle, ConnectionId(6)), None);
        assert_eq!(manager.remove_config(handle, ConnectionId(6)), None);
    }

    #[test]
    fn configuration_table_is_bounded() {
        let (_, mut manager, handle) = setup();
        for cid in 3..=MAX_CONNECTIONS as u32 {
            manager.add_config(handle, ConnectionId(cid), None).unwrap();
        }

        assert!(matches!(
            manager.add_config(handle, ConnectionId(0x99), None),
            Err(CsisError::InsufficientResources)
        ));
        assert!(manager.get_config(handle, C).is_some());
        assert!(manager.get_config(handle, D).is_some());
        assert_eq!(manager.get_config(handle, ConnectionId(0x99)), None);
    }

    #[test]
    fn configuration_round_trip() {
        let (ctx, mut manager, handle) = setup();
        subscribe(&ctx, &mut manager, C, LOCK_CCCD);
        subscribe(&ctx, &mut manager, C, SIZE_CCCD);
        let before = manager.get_config(handle, C);

        let config = manager.remove_config(handle, C).unwrap();
        manager.add_config(handle, C, Some(config)).unwrap();
        assert_eq!(manager.get_config(handle, C), before);

        manager.remove_config(handle, C);
        manager.add_config(handle, C, None).unwrap();
        assert_eq!(manager.get_config(handle, C), Some(ClientConfig::default()));
    }

    #[test]
    fn cccd_writes_report_configuration_changes() {
        let (ctx, mut manager, handle) = setup();

        manager.ingest_access(C, LOCK_CCCD, Access::Write(NOTIFY)).unwrap();
        assert_eq!(ctx.pop_write_response(), Some((C, LOCK_CCCD, Ok(()))));
        assert_eq!(
            ctx.pop_message(),
            Some(CsisMessage::ConfigChanged { handle, cid: C, complete: false })
        );

        manager.ingest_access(C, SIRK_CCCD, Access::Write(&[0x00, 0x00])).unwrap();
        assert_eq!(ctx.pop_write_response(), Some((C, SIRK_CCCD, Ok(()))));
        assert!(ctx.is_idle());

        manager.ingest_access(C, SIZE_CCCD, Access::Write(&[0x02, 0x00])).unwrap();
        assert_eq!(ctx.pop_write_response(), Some((C, SIZE_CCCD, Ok(()))));
        assert_eq!(
            ctx.pop_message(),
            Some(CsisMessage::ConfigChanged { handle, cid: C, complete: true })
        );

        manager.ingest_access(C, SIZE_CCCD, Access::Read).unwrap();
        assert_eq!(ctx.pop_read_response(), Some((C, SIZE_CCCD, Ok(vec![0x02, 0x00]))));

        manager.ingest_access(C, LOCK_CCCD, Access::Write(&[0x03, 0x00])).unwrap();
        assert_eq!(
            ctx.pop_write_response(),
            Some((C, LOCK_CCCD, Err(AttErrorCode::CccdImproperlyConfigured)))
        );
        manager.ingest_access(C, LOCK_CCCD, Access::Write(&[0x01])).unwrap();
        assert_eq!(
            ctx.pop_write_response(),
            Some((C, LOCK_CCCD, Err(AttErrorCode::InvalidAttributeValueLength)))
        );
        assert!(ctx.is_idle());

        let config = manager.get_config(handle, C).unwrap();
        assert_eq!(config.lock, NotifyState::Notify);
        assert_eq!(config.size, NotifyState::Indicate);
    }

    #[test]
    fn characteristic_reads() {
        let (ctx, mut manager, _) = setup();

        manager.ingest_access(C, RANK, Access::Read).unwrap();
        assert_eq!(ctx.pop_read_response(), Some((C, RANK, Ok(vec![1]))));
        manager.ingest_access(C, SIZE, Access::Read).unwrap();
        assert_eq!(ctx.pop_read_response(), Some((C, SIZE, Ok(vec![2]))));
        manager.ingest_access(C, LOCK, Access::Read).unwrap();
        assert_eq!(ctx.pop_read_response(), Some((C, LOCK, Ok(vec![0x01]))));
        manager.ingest_access(C, START, Access::Read).unwrap();
        assert_eq!(ctx.pop_read_response(), Some((C, START, Ok(vec![]))));
        manager.ingest_access(C, START + 1, Access::Read).unwrap();
        assert_eq!(ctx.pop_read_response(), Some((C, START + 1, Err(AttErrorCode::InvalidHandle))));

        for handle in [START, SIRK, SIZE, RANK] {
            manager.ingest_access(C, handle, Access::Write(&[0x00])).unwrap();
            assert_eq!(
                ctx.pop_write_response(),
                Some((C, handle, Err(AttErrorCode::WriteNotPermitted)))
            );
        }

        write_lock(&ctx, &mut manager, C, LOCKED).unwrap();
        ctx.pop_message();
        manager.ingest_access(D, LOCK, Access::Read).unwrap();
        assert_eq!(ctx.pop_read_response(), Some((D, LOCK, Ok(vec![0x02]))));
        assert!(ctx.is_idle());
    }

    #[test]
    fn unknown_accesses_are_dropped() {
        let (ctx, mut manager, _) = setup();

        assert!(matches!(
            manager.ingest_access(ConnectionId(0x99), LOCK, Access::Write(LOCKED)),
            Err(CsisError::UnknownConnection)
        ));
        assert!(matches!(
            manager.ingest_access(C, END + 1, Access::Read),
            Err(CsisError::UnknownHandle)
        ));
        assert_eq!(manager.lock_owner(), None);
        assert!(ctx.is_idle());
    }

    #[test]
    fn plaintext_sirk_read() {
        let (ctx, mut manager, _) = setup();
        manager.ingest_access(C, SIRK, Access::Read).unwrap();

        let mut expected = vec![0x01];
        expected.extend(KEY.iter().rev());
        assert_eq!(ctx.pop_read_response(), Some((C, SIRK, Ok(expected))));
    }

    #[test]
    fn oob_only_sirk() {
        let (ctx, mut manager, handle) = setup_with(TestContext::new(), SirkExposure::OobOnly);
        manager.ingest_access(C, SIRK, Access::Read).unwrap();
        assert_eq!(ctx.pop_read_response(), Some((C, SIRK, Err(AttErrorCode::OobSirkOnly))));
        assert_eq!(manager.get_rsi(handle), None);
    }

    #[test]
    fn encrypted_sirk_read() {
        let (ctx, mut manager, handle) = setup_with(TestContext::new(), SirkExposure::Encrypted);

        manager.ingest_access(C, SIRK, Access::Read).unwrap();
        assert_eq!(ctx.pop_encryption_request(), Some((C, KEY)));
        assert!(ctx.is_idle());

        manager.ingest_access(D, SIRK, Access::Read).unwrap();
        assert_eq!(
            ctx.pop_read_response(),
            Some((D, SIRK, Err(AttErrorCode::InsufficientResources)))
        );

        assert!(matches!(
            manager.sirk_encrypted(handle, D, Some([0; 16])),
            Err(CsisError::NoPendingSirkOperation)
        ));

        let encrypted = [0xaa; 16];
        manager.sirk_encrypted(handle, C, Some(encrypted)).unwrap();
        let mut expected = vec![0x00];
        expected.extend([0xaa; 16]);
        assert_eq!(ctx.pop_read_response(), Some((C, SIRK, Ok(expected))));

        manager.ingest_access(D, SIRK, Access::Read).unwrap();
        assert_eq!(ctx.pop_encryption_request(), Some((D, KEY)));
        manager.sirk_encrypted(handle, D, None).unwrap();
        assert_eq!(ctx.pop_read_response(), Some((D, SIRK, Err(AttErrorCode::UnlikelyError))));
        assert!(ctx.is_idle());
    }

    #[test]
    fn encrypted_sirk_read_dropped_after_removal() {
        let (ctx, mut manager, handle) = setup_with(TestContext::new(), SirkExposure::Encrypted);

        manager.ingest_access(C, SIRK, Access::Read).unwrap();
        assert_eq!(ctx.pop_encryption_request(), Some((C, KEY)));

        manager.remove_config(handle, C).unwrap();
        manager.sirk_encrypted(handle, C, Some([0xaa; 16])).unwrap();
        assert!(ctx.is_idle());

        manager.ingest_access(D, SIRK, Access::Read).unwrap();
        assert_eq!(ctx.pop_encryption_request(), Some((D, KEY)));
    }

    #[test]
    fn size_change_is_notified() {
        let (ctx, mut manager, handle) = setup();
        subscribe(&ctx, &mut manager, D, SIZE_CCCD);

        let updated = InitParams { set_size: 3, ..params(SirkExposure::Plaintext) };
        manager.update_init_param(handle, updated).unwrap();
        assert_eq!(ctx.pop_notification(), Some((D, SIZE, vec![3])));
        assert!(ctx.is_idle());

        manager.ingest_access(C, SIZE, Access::Read).unwrap();
        assert_eq!(ctx.pop_read_response(), Some((C, SIZE, Ok(vec![3]))));

        assert!(matches!(
            manager.update_init_param(
                handle,
                InitParams { rank: 4, ..params(SirkExposure::Plaintext) }
            ),
            Err(CsisError::InvalidParameters)
        ));
    }

    #[test]
    fn plaintext_sirk_change_is_notified() {
        let (ctx, mut manager, handle) = setup();
        subscribe(&ctx, &mut manager, C, SIRK_CCCD);

        let sirk = [0x11; 16];
        let updated = InitParams { sirk, ..params(SirkExposure::Plaintext) };
        manager.update_init_param(handle, updated).unwrap();
        let mut expected = vec![0x01];
        expected.extend([0x11; 16]);
        assert_eq!(ctx.pop_notification(), Some((C, SIRK, expected)));
        assert!(ctx.is_idle());
    }

    #[test]
    fn encrypted_sirk_change_is_notified_one_client_at_a_time() {
        let (ctx, mut manager, handle) = setup_with(TestContext::new(), SirkExposure::Encrypted);
        subscribe(&ctx, &mut manager, C, SIRK_CCCD);
        subscribe(&ctx, &mut manager, D, SIRK_CCCD);

        let sirk = [0x22; 16];
        let updated = InitParams { sirk, ..params(SirkExposure::Encrypted) };
        manager.update_init_param(handle, updated).unwrap();
        assert_eq!(ctx.pop_encryption_request(), Some((C, sirk)));
        assert!(ctx.is_idle());

        manager.sirk_encrypted(handle, C, Some([0x33; 16])).unwrap();
        let mut expected = vec![0x00];
        expected.extend([0x33; 16]);
        assert_eq!(ctx.pop_notification(), Some((C, SIRK, expected)));
        assert_eq!(ctx.pop_encryption_request(), Some((D, sirk)));

        manager.sirk_encrypted(handle, D, None).unwrap();
        assert!(ctx.is_idle());
    }

    #[test]
    fn rsi_is_fresh() {
        let (_, manager, handle) = setup();
        let rsi = manager.get_rsi(handle).unwrap();
        let prand = [rsi[3], rsi[4], rsi[5]];
        assert_eq!(prand[2] >> 6, 0b01);
        assert_eq!(&rsi[..3], &[KEY[0] ^ prand[0], KEY[1] ^ prand[1], KEY[2] ^ prand[2]]);
        assert_eq!(manager.get_rsi(ServiceHandle(0x99)), None);
    }

    #[test]
    fn init_validation() {
        let ctx = Rc::new(TestContext::new());
        let mut manager = CsisManager::new(ctx);

        assert!(matches!(
            manager.init(InitParams { rank: 0, ..params(SirkExposure::Plaintext) }, START, END),
            Err(CsisError::InvalidParameters)
        ));
        assert!(matches!(
            manager.init(params(SirkExposure::Plaintext), START, END - 1),
            Err(CsisError::InvalidHandleRange)
        ));
        assert!(matches!(
            manager.init(params(SirkExposure::Plaintext), 0, END),
            Err(CsisError::InvalidHandleRange)
        ));

        let first = manager.init(params(SirkExposure::Plaintext), START, END).unwrap();
        assert!(matches!(
            manager.init(params(SirkExposure::Plaintext), END, END + 20),
            Err(CsisError::InvalidHandleRange)
        ));
        let second = manager.init(params(SirkExposure::Plaintext), END + 1, END + 20).unwrap();
        assert_ne!(first, second);
        assert_eq!(manager.lock_timeout(second), Some(DEFAULT_LOCK_TIMEOUT));
    }
}
