//! Process-scoped platform context
//!
//! Some deployments need a process-wide handle (a hardware codec service, a
//! host runtime) set up once before any codec runs, and threads that call
//! into it registered with it. This module keeps that state explicit:
//! [`initialize`] installs a [`PlatformContext`], [`uninitialize`] removes it,
//! and a [`ThreadAttachment`] guard registers the current thread for as long
//! as it lives.
//!
//! The codec adapters never call into this module; applications that need it
//! do so around them.

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::cell::Cell;
use std::marker::PhantomData;
use thiserror::Error;
use tracing::{debug, info};

/// Platform errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlatformError {
    /// `initialize` called twice
    #[error("Platform already initialized")]
    AlreadyInitialized,

    /// Context required but absent
    #[error("Platform not initialized")]
    NotInitialized,

    /// Teardown attempted while threads are still registered
    #[error("Platform still has {0} attached threads")]
    ThreadsAttached(usize),
}

/// Process-wide settings installed by [`initialize`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformContext {
    /// Name reported to the host platform
    pub application_name: String,
}

impl Default for PlatformContext {
    fn default() -> Self {
        Self {
            application_name: "adaptive-codec".to_string(),
        }
    }
}

#[derive(Default)]
struct PlatformState {
    context: Option<PlatformContext>,
    attached_threads: usize,
}

static STATE: Lazy<Mutex<PlatformState>> = Lazy::new(|| Mutex::new(PlatformState::default()));

thread_local! {
    static ATTACH_DEPTH: Cell<usize> = const { Cell::new(0) };
}

/// Install the process-wide context.
pub fn initialize(context: PlatformContext) -> Result<(), PlatformError> {
    let mut state = STATE.lock();
    if state.context.is_some() {
        return Err(PlatformError::AlreadyInitialized);
    }
    info!(
        application = %context.application_name,
        "Platform initialized"
    );
    state.context = Some(context);
    Ok(())
}

/// Install the default context unless one is already present, returning the
/// active context either way.
pub fn ensure_initialized() -> PlatformContext {
    let mut state = STATE.lock();
    state
        .context
        .get_or_insert_with(|| {
            debug!("Platform initialized with defaults");
            PlatformContext::default()
        })
        .clone()
}

/// Remove the process-wide context.
pub fn uninitialize() -> Result<(), PlatformError> {
    let mut state = STATE.lock();
    if state.context.is_none() {
        return Err(PlatformError::NotInitialized);
    }
    if state.attached_threads > 0 {
        return Err(PlatformError::ThreadsAttached(state.attached_threads));
    }
    state.context = None;
    info!("Platform uninitialized");
    Ok(())
}

/// Active context, if initialized
pub fn context() -> Option<PlatformContext> {
    STATE.lock().context.clone()
}

/// Whether a context is installed
pub fn is_initialized() -> bool {
    STATE.lock().context.is_some()
}

/// Number of threads currently holding a [`ThreadAttachment`]
pub fn attached_threads() -> usize {
    STATE.lock().attached_threads
}

/// Registers the current thread with the platform while alive.
///
/// Nested guards on one thread register it once. The guard cannot leave the
/// thread that created it.
#[derive(Debug)]
pub struct ThreadAttachment {
    _not_send: PhantomData<*const ()>,
}

impl ThreadAttachment {
    /// Register the current thread.
    pub fn attach() -> Result<Self, PlatformError> {
        let mut state = STATE.lock();
        if state.context.is_none() {
            return Err(PlatformError::NotInitialized);
        }
        let depth = ATTACH_DEPTH.with(|d| {
            let depth = d.get();
            d.set(depth + 1);
            depth
        });
        if depth == 0 {
            state.attached_threads += 1;
            debug!(attached = state.attached_threads, "Thread attached to platform");
        }
        Ok(Self {
            _not_send: PhantomData,
        })
    }
}

impl Drop for ThreadAttachment {
    fn drop(&mut self) {
        let depth = ATTACH_DEPTH.with(|d| {
            let depth = d.get().saturating_sub(1);
            d.set(depth);
            depth
        });
        if depth == 0 {
            let mut state = STATE.lock();
            state.attached_threads = state.attached_threads.saturating_sub(1);
            debug!(attached = state.attached_threads, "Thread detached from platform");
        }
    }
}
