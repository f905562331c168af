//! Ownership epochs of shared buffers.
//!
//! A shared buffer is owned either by graphics or by compute. Acquire moves it
//! to compute, release moves it back. No other transition exists.

use crate::{Error, ErrorCode, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Owner {
    #[default]
    Graphics,
    Compute,
}

impl Owner {
    /// Transition for an acquire.
    pub fn acquire(&mut self) -> Result<()> {
        match self {
            Owner::Graphics => {
                *self = Owner::Compute;
                Ok(())
            }
            Owner::Compute => Err(Error::device("acquire", ErrorCode::InvalidGraphicsObject)),
        }
    }

    /// Transition for a release.
    pub fn release(&mut self) -> Result<()> {
        match self {
            Owner::Compute => {
                *self = Owner::Graphics;
                Ok(())
            }
            Owner::Graphics => Err(Error::device("release", ErrorCode::InvalidGraphicsObject)),
        }
    }

    /// Fails unless the compute side currently owns the buffer.
    pub fn check_compute(self, op: &'static str) -> Result<()> {
        match self {
            Owner::Compute => Ok(()),
            Owner::Graphics => Err(Error::device(op, ErrorCode::InvalidGraphicsObject)),
        }
    }

    /// Fails unless the graphics side currently owns the buffer.
    pub fn check_graphics(self, op: &'static str) -> Result<()> {
        match self {
            Owner::Graphics => Ok(()),
            Owner::Compute => Err(Error::device(op, ErrorCode::InvalidGraphicsObject)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_release_alternate() {
        let mut owner = Owner::default();
        owner.acquire().unwrap();
        assert!(owner.acquire().is_err());
        assert!(owner.check_graphics("draw").is_err());
        owner.check_compute("dispatch").unwrap();
        owner.release().unwrap();
        assert!(owner.release().is_err());
        owner.check_graphics("draw").unwrap();
    }
}
