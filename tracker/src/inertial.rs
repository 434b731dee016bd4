use hal::{HalError, HalResult, ImuBackend, InertialSensor, Vector3d};
use log::info;

/// Average `samples` raw readings on all three axes, in m/s².
///
/// The platform must be stationary. Gravity is part of the average, so the
/// corrected output reads zero at rest in every direction.
pub fn estimate_stationary_bias<B: ImuBackend + ?Sized>(
    backend: &mut B,
    samples: u32,
) -> HalResult<Vector3d> {
    if samples == 0 {
        return Err(HalError::InvalidParameter("bias sample count must be non-zero"));
    }

    let mut sum = [0i64; 3];
    for _ in 0..samples {
        let raw = backend.read_raw_accel()?;
        for (acc, value) in sum.iter_mut().zip(raw) {
            *acc += value as i64;
        }
    }

    let scale = backend.accel_scale();
    let n = samples as f32;
    Ok(Vector3d::new(
        sum[0] as f32 / n * scale,
        sum[1] as f32 / n * scale,
        sum[2] as f32 / n * scale,
    ))
}

/// Bias-corrected inertial sensor on top of a vendor backend
pub struct CalibratedImu<B> {
    backend: B,
    bias_samples: u32,
    bias: Option<Vector3d>,
}

impl<B: ImuBackend> CalibratedImu<B> {
    pub fn new(backend: B, bias_samples: u32) -> Self {
        CalibratedImu {
            backend,
            bias_samples,
            bias: None,
        }
    }

    /// Bias removed from every sample; `None` until initialised
    pub fn bias(&self) -> Option<Vector3d> {
        self.bias
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }
}

impl<B: ImuBackend> InertialSensor for CalibratedImu<B> {
    fn initialize(&mut self) -> HalResult<()> {
        self.backend.init()?;
        let bias = estimate_stationary_bias(&mut self.backend, self.bias_samples)?;
        info!(
            "IMU bias from {} samples: [{:.4}, {:.4}, {:.4}] m/s^2",
            self.bias_samples, bias.x, bias.y, bias.z
        );
        self.bias = Some(bias);
        Ok(())
    }

    fn read_acceleration(&mut self) -> HalResult<Vector3d> {
        let bias = self.bias.ok_or(HalError::NotInitialized)?;
        let raw = self.backend.read_raw_accel()?;
        Ok(self.backend.raw_to_accel(raw) - bias)
    }

    fn read_temperature(&mut self) -> HalResult<f32> {
        self.backend.read_temperature()
    }
}
