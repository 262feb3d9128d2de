/// Shrink-and-retry strategy for fill file allocation
///
/// A volume can report more free space than it can hand out as one allocation
/// (fragmentation, metadata overhead). Any failure above the one-cluster floor is
/// treated as transient: the request shrinks by one cluster and is tried again.
/// A failure at or below the floor means there is no usable space left.
use super::ErrorClass;
use std::io;

/// Retry strategy for sizing a fill file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocationRetry {
    /// Shrink step and floor (the volume's cluster size)
    cluster_size: u64,
}

impl AllocationRetry {
    pub fn new(cluster_size: u64) -> Self {
        Self {
            cluster_size: cluster_size.max(1),
        }
    }

    pub fn cluster_size(&self) -> u64 {
        self.cluster_size
    }

    /// Length to try after `failed_length` was rejected, or `None` when the floor
    /// has been reached and the failure is final.
    pub fn next_length(&self, failed_length: u64) -> Option<u64> {
        if failed_length > self.cluster_size {
            Some(failed_length - self.cluster_size)
        } else {
            None
        }
    }

    /// Run `allocate` starting at `length`, shrinking on every failure.
    ///
    /// Returns the length that was finally allocated, or the error from the attempt
    /// at the floor together with that length.
    pub fn run<F>(&self, mut length: u64, mut allocate: F) -> Result<u64, (u64, io::Error)>
    where
        F: FnMut(u64) -> io::Result<()>,
    {
        loop {
            match allocate(length) {
                Ok(()) => return Ok(length),
                Err(e) => match self.next_length(length) {
                    Some(next) => {
                        tracing::debug!(
                            requested = length,
                            retry = next,
                            error = %e,
                            class = %ErrorClass::Transient,
                            "Allocation rejected, shrinking by one cluster"
                        );
                        length = next;
                    }
                    None => return Err((length, e)),
                },
            }
        }
    }
}
