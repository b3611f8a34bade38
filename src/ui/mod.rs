//! Browser automation surface.
//!
//! Element lookups come back as [`Lookup`] values rather than errors: an
//! absent element is an expected outcome the login flow branches on. `Err`
//! is reserved for transport faults (driver gone, malformed reply).

pub mod session;
pub mod snapshot;
pub mod webdriver;

use anyhow::Result;
use std::time::Duration;

use crate::config::Locator;
pub use session::SessionGuard;
pub use snapshot::Snapshot;

/// Opaque reference to a live element.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementHandle(pub String);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup<T> {
    Found(T),
    NotFound,
    TimedOut,
}

pub trait UiSurface {
    fn navigate(&mut self, url: &str) -> Result<()>;
    fn find(&mut self, locator: &Locator, within: Option<&ElementHandle>)
    -> Result<Lookup<ElementHandle>>;
    /// Poll for `locator` until it appears or `timeout` elapses.
    fn wait_for(&mut self, locator: &Locator, timeout: Duration) -> Result<Lookup<ElementHandle>>;
    fn click(&mut self, element: &ElementHandle) -> Result<()>;
    fn type_text(&mut self, element: &ElementHandle, text: &str) -> Result<()>;
    fn read_attribute(&mut self, element: &ElementHandle, name: &str) -> Result<Option<String>>;
    fn read_text(&mut self, element: &ElementHandle) -> Result<String>;
    fn current_snapshot(&mut self) -> Result<Snapshot>;
    /// End the browser session. Must be safe to call more than once.
    fn close(&mut self) -> Result<()>;
}

/// Starts browser sessions; one per workflow run.
pub trait SessionFactory {
    type Surface: UiSurface;
    fn open(&self) -> Result<Self::Surface>;
}
