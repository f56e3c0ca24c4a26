//! Linear Kalman filter
//!
//! Fixed-size filter used by the pose estimator (3 states) and by the
//! per-axis observers in the trajectory controller (2 states). The caller
//! supplies the transition and measurement models at each step, which lets
//! the pose estimator feed a pre-integrated odometry increment and a
//! wrap-corrected heading innovation.

use nalgebra::{SMatrix, SVector};

/// Kalman filter with `N` states and `M` measurements
#[derive(Debug, Clone)]
pub struct KalmanFilter<const N: usize, const M: usize> {
    /// State estimate
    pub x: SVector<f64, N>,
    /// Estimate covariance
    pub p: SMatrix<f64, N, N>,
    /// Process noise covariance (Q)
    pub q: SMatrix<f64, N, N>,
    /// Measurement noise covariance (R)
    pub r: SMatrix<f64, M, M>,
}

impl<const N: usize, const M: usize> KalmanFilter<N, M> {
    /// Create a filter with diagonal noise from standard deviations
    pub fn new(process_std: &[f64; N], measurement_std: &[f64; M]) -> Self {
        Self {
            x: SVector::zeros(),
            p: SMatrix::identity(),
            q: diagonal_covariance(process_std),
            r: diagonal_covariance(measurement_std),
        }
    }

    /// Reset the state and covariance
    pub fn reset(&mut self, x: SVector<f64, N>, p: SMatrix<f64, N, N>) {
        self.x = x;
        self.p = p;
    }

    /// Prediction step: x = A·x + u, P = A·P·Aᵀ + Q
    ///
    /// `u` is the already-mapped control contribution (B·u).
    pub fn predict(&mut self, a: &SMatrix<f64, N, N>, u: &SVector<f64, N>) {
        let q = self.q;
        self.predict_with_noise(a, u, &q);
    }

    /// Prediction step with an explicit process noise for this step
    pub fn predict_with_noise(
        &mut self,
        a: &SMatrix<f64, N, N>,
        u: &SVector<f64, N>,
        q: &SMatrix<f64, N, N>,
    ) {
        self.x = a * self.x + u;
        self.p = a * self.p * a.transpose() + q;
    }

    /// Kalman gain K = P·Hᵀ·(H·P·Hᵀ + R)⁻¹, or `None` if the innovation
    /// covariance is singular
    pub fn gain(
        &self,
        h: &SMatrix<f64, M, N>,
        r: &SMatrix<f64, M, M>,
    ) -> Option<SMatrix<f64, N, M>> {
        let s = h * self.p * h.transpose() + r;
        let s_inv = s.try_inverse()?;
        Some(self.p * h.transpose() * s_inv)
    }

    /// Update with measurement `z` of `h·x`
    pub fn correct(&mut self, z: &SVector<f64, M>, h: &SMatrix<f64, M, N>) -> bool {
        let innovation = z - h * self.x;
        let r = self.r;
        self.correct_innovation(&innovation, h, &r)
    }

    /// Update with a precomputed innovation and measurement noise
    ///
    /// Returns false and leaves the filter untouched when the innovation
    /// covariance cannot be inverted.
    pub fn correct_innovation(
        &mut self,
        innovation: &SVector<f64, M>,
        h: &SMatrix<f64, M, N>,
        r: &SMatrix<f64, M, M>,
    ) -> bool {
        let Some(k) = self.gain(h, r) else {
            return false;
        };

        self.x += k * innovation;

        // Joseph form keeps P symmetric positive semi-definite
        let i_kh = SMatrix::<f64, N, N>::identity() - k * h;
        self.p = i_kh * self.p * i_kh.transpose() + k * r * k.transpose();
        true
    }
}

/// Diagonal covariance from per-axis standard deviations
pub fn diagonal_covariance<const D: usize>(std_devs: &[f64; D]) -> SMatrix<f64, D, D> {
    let variances = SVector::<f64, D>::from_iterator(std_devs.iter().map(|s| s * s));
    SMatrix::from_diagonal(&variances)
}
