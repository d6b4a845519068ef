//! Transaction guard.

use crate::{engine::Engine, error::Error};
use std::ops::{Deref, DerefMut};
use tracing::warn;

///
/// Transaction
///
/// Scoped transaction over an [`Engine`]. Derefs to the engine, so every
/// query method is available inside the transaction. Consuming `commit`
/// or `rollback` ends it; a guard dropped without either rolls back.
///

pub struct Transaction<'a> {
    engine: &'a mut Engine,
    finished: bool,
}

impl<'a> Transaction<'a> {
    pub(crate) fn begin(engine: &'a mut Engine) -> Result<Self, Error> {
        engine.driver.begin()?;
        Ok(Self {
            engine,
            finished: false,
        })
    }

    /// Make the transaction's writes permanent.
    pub fn commit(mut self) -> Result<(), Error> {
        self.finished = true;
        self.engine.driver.commit()?;
        Ok(())
    }

    /// Discard the transaction's writes.
    pub fn rollback(mut self) -> Result<(), Error> {
        self.finished = true;
        self.engine.driver.rollback()?;
        Ok(())
    }
}

impl Deref for Transaction<'_> {
    type Target = Engine;

    fn deref(&self) -> &Engine {
        self.engine
    }
}

impl DerefMut for Transaction<'_> {
    fn deref_mut(&mut self) -> &mut Engine {
        self.engine
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if !self.finished {
            if let Err(err) = self.engine.driver.rollback() {
                warn!(error = %err, "implicit transaction rollback failed");
            }
        }
    }
}
