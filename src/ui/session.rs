use log::{debug, warn};
use std::ops::{Deref, DerefMut};

use crate::ui::UiSurface;

/// Owns a browser session for one run and closes it when dropped, whatever
/// path the run leaves by.
pub struct SessionGuard<U: UiSurface> {
    surface: U,
    released: bool,
}

impl<U: UiSurface> SessionGuard<U> {
    pub fn new(surface: U) -> Self {
        Self {
            surface,
            released: false,
        }
    }

    /// Close now and report the outcome. Drop becomes a no-op afterwards.
    pub fn release(mut self) -> anyhow::Result<()> {
        self.released = true;
        self.surface.close()
    }
}

impl<U: UiSurface> Deref for SessionGuard<U> {
    type Target = U;
    fn deref(&self) -> &U {
        &self.surface
    }
}

impl<U: UiSurface> DerefMut for SessionGuard<U> {
    fn deref_mut(&mut self) -> &mut U {
        &mut self.surface
    }
}

impl<U: UiSurface> Drop for SessionGuard<U> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        debug!("closing browser session on drop");
        if let Err(e) = self.surface.close() {
            warn!("failed to close browser session: {e:#}");
        }
    }
}
