use std::thread;
use std::time::{Duration, Instant};

use mmalink_frame::Matrix;
use mmalink_transport::SerialChannel;
use mmalink_verify::{
    classify_compatibility, first_mismatch, is_multipliable, multiply, CompatibilityClass,
    Mismatch, Tolerance, VerifyError,
};
use tracing::{debug, info, warn};

use crate::config::DriverConfig;
use crate::error::{DriverError, Result};
use crate::session::Session;

/// Outcome of one device multiply checked against the local reference.
#[derive(Debug, Clone)]
pub struct JobReport {
    pub compatibility: CompatibilityClass,
    pub result: Matrix,
    pub reference: Matrix,
    /// First disagreeing element, if any.
    pub mismatch: Option<Mismatch>,
    pub tolerance: Tolerance,
    /// Wall time from the first operand frame to the decoded result.
    pub elapsed: Duration,
}

impl JobReport {
    /// Whether the device result matched the reference.
    pub fn verified(&self) -> bool {
        self.mismatch.is_none()
    }
}

/// Multiply `a × b` on the device and verify the answer.
///
/// The reference product is computed on a scoped thread while the device
/// works and joined before the comparison. Operands that cannot be
/// multiplied are rejected before anything is sent. The channel is handed
/// to a [`Session`] for the duration; on failure it is closed.
pub fn multiply_and_verify<C: SerialChannel>(
    channel: C,
    a: &Matrix,
    b: &Matrix,
    config: &DriverConfig,
    tolerance: Tolerance,
) -> Result<JobReport> {
    let compatibility = classify_compatibility(a, b);
    debug!(
        a = %a.shape(),
        b = %b.shape(),
        class = %compatibility,
        code = compatibility.code(),
        "operand compatibility"
    );
    if !is_multipliable(a, b) {
        return Err(DriverError::Verify(VerifyError::DimensionMismatch {
            operation: "multiply",
            left: a.shape(),
            right: b.shape(),
        }));
    }

    let started = Instant::now();
    let mut session = Session::with_config(channel, config.clone());
    session.send_matrix(a, 1)?;
    session.send_matrix(b, 2)?;
    session.start()?;

    let (result, reference) = thread::scope(|scope| {
        let worker = scope.spawn(|| multiply(a, b));
        let device = session
            .await_completion()
            .and_then(|()| session.fetch_result());
        let reference = worker.join();
        (device, reference)
    });
    let result = result?;
    let reference = reference.map_err(|_| DriverError::ReferenceWorker)??;
    let elapsed = started.elapsed();
    session.finish()?;

    let mismatch = first_mismatch(&reference, &result, tolerance)?;
    match &mismatch {
        None => info!(shape = %result.shape(), ?elapsed, "device result verified"),
        Some(m) => warn!(mismatch = %m, "device result differs from reference"),
    }

    Ok(JobReport {
        compatibility,
        result,
        reference,
        mismatch,
        tolerance,
        elapsed,
    })
}
