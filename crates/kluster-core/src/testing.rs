//! In-process provisioner fake for tests
//!
//! Records every capability call and can be told to fail one capability or
//! to hold `setup` until released, which is how tests observe a busy cluster.

use crate::provisioner::{Capability, ProvisionParams, Provisioner};
use anyhow::{Result, bail};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;

/// Provisioner that records calls instead of touching infrastructure
#[derive(Debug, Default)]
pub struct RecordingProvisioner {
    calls: Mutex<Vec<(Capability, Option<ProvisionParams>)>>,
    fail_on: Option<Capability>,
    setup_gate: Option<Arc<Semaphore>>,
}

/// Releases a held `setup`
#[derive(Debug, Clone)]
pub struct SetupGate(Arc<Semaphore>);

impl SetupGate {
    pub fn release(&self) {
        self.0.add_permits(1);
    }
}

impl RecordingProvisioner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails the given capability with an error naming it
    pub fn failing(capability: Capability) -> Self {
        Self {
            fail_on: Some(capability),
            ..Self::default()
        }
    }

    /// `setup` blocks until the returned gate is released
    pub fn gated() -> (Self, SetupGate) {
        let gate = Arc::new(Semaphore::new(0));
        let provisioner = Self {
            setup_gate: Some(gate.clone()),
            ..Self::default()
        };
        (provisioner, SetupGate(gate))
    }

    /// Capabilities invoked so far, in order
    pub fn calls(&self) -> Vec<Capability> {
        self.lock().iter().map(|(capability, _)| *capability).collect()
    }

    /// Parameters passed to the most recent call
    pub fn last_params(&self) -> Option<ProvisionParams> {
        self.lock().last().and_then(|(_, params)| params.clone())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(Capability, Option<ProvisionParams>)>> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn record(&self, capability: Capability, params: Option<&ProvisionParams>) -> Result<()> {
        self.lock().push((capability, params.cloned()));
        if self.fail_on == Some(capability) {
            bail!("{capability} rejected by test provisioner");
        }
        Ok(())
    }
}

#[async_trait]
impl Provisioner for RecordingProvisioner {
    async fn init(&self, params: Option<&ProvisionParams>) -> Result<()> {
        self.record(Capability::Init, params)
    }

    async fn setup(&self, params: Option<&ProvisionParams>) -> Result<()> {
        if let Some(gate) = &self.setup_gate {
            gate.acquire().await?.forget();
        }
        self.record(Capability::Setup, params)
    }

    async fn destroy(&self, params: Option<&ProvisionParams>) -> Result<()> {
        self.record(Capability::Destroy, params)
    }
}
