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
use std::pin::Pin;
use std::rc::{Rc, Weak};
use std::task::{self, Poll};
use std::time::{Duration, Instant};

use crate::csis::Context;

/// Lock expiry timer. Dropping it cancels the expiry.
pub type LockTimer = Pin<Box<dyn Future<Output = ()>>>;

/// Future for `sleep`, resolved once the host clock reaches the deadline.
pub struct Sleep<C> {
    ctx: Weak<C>,
    deadline: Instant,
}

impl<C: Context> Future for Sleep<C> {
    type Output = ();

    fn poll(self: Pin<&mut Self>, _cx: &mut task::Context<'_>) -> Poll<Self::Output> {
        match self.ctx.upgrade() {
            Some(ctx) if ctx.now() >= self.deadline => Poll::Ready(()),
            _ => Poll::Pending,
        }
    }
}

pub fn sleep<C: Context>(ctx: &Rc<C>, duration: Duration) -> Sleep<C> {
    Sleep { ctx: Rc::downgrade(ctx), deadline: ctx.now() + duration }
}

pub fn lock_timer<C: Context + 'static>(ctx: &Rc<C>, timeout_seconds: u16) -> LockTimer {
    Box::pin(sleep(ctx, Duration::from_secs(timeout_seconds.into())))
}
