//! Cluster delay line channel model
//!
//! Cluster delays and powers are drawn per realization following the
//! stochastic steps of 3GPP TR 38.901 section 7.5:
//!
//! ```text
//! tau'_n = -r_tau * DS * ln(X_n),   X_n ~ U(0, 1], shifted to start at zero
//! P'_n   = exp(-tau'_n * (r_tau - 1) / (r_tau * DS)) * 10^(-Z_n / 10),   Z_n ~ N(0, zeta)
//! ```
//!
//! With line of sight a Rice factor `K ~ N(mu_K, sigma_K)` in dB is drawn,
//! delays shrink by `C_tau(K)` and a specular path carrying `K / (K + 1)` of
//! the power joins the first cluster. Every cluster becomes one path of a
//! [`ChannelParams`] set, so a drawn line is an ordinary
//! [`MultipathFadingRealization`].

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};
use sim_core::random::fallback_seed;
use sim_core::{Device, SimError, SimResult};
use tracing::debug;

use crate::channel::ChannelParams;
use crate::fading::PathRealization;
use crate::realization::{Direction, LinkEnd, MultipathFadingRealization};
use crate::state::ChannelState;

/// Rice factor mean in dB, urban micro line of sight
pub const DEFAULT_RICE_FACTOR_MEAN: f64 = 9.0;
/// Rice factor standard deviation in dB
pub const DEFAULT_RICE_FACTOR_STD: f64 = 5.0;
/// Per-cluster shadowing standard deviation in dB
pub const DEFAULT_CLUSTER_SHADOWING_STD: f64 = 3.0;

fn non_negative(value: f64, name: &str) -> SimResult<f64> {
    if !(value >= 0.0) || !value.is_finite() {
        return Err(SimError::config(format!("{} must be non-negative", name)));
    }
    Ok(value)
}

fn normal(mean: f64, std_dev: f64) -> SimResult<Normal<f64>> {
    Normal::new(mean, std_dev).map_err(|e| SimError::config(format!("invalid normal distribution: {}", e)))
}

/// Delay scaling of a line of sight draw, `K` in dB
fn los_delay_scaling(rice_factor_db: f64) -> f64 {
    let k = rice_factor_db;
    0.7705 - 0.0433 * k + 0.0002 * k * k + 0.000017 * k * k * k
}

/// Stochastic cluster delay line between two devices
#[derive(Debug)]
pub struct ClusterDelayLine {
    num_clusters: usize,
    delay_spread: f64,
    delay_scaling: f64,
    rice_factor_mean: f64,
    rice_factor_std: f64,
    cluster_shadowing_std: f64,
    line_of_sight: bool,
    doppler_frequency: f64,
    alpha: LinkEnd,
    beta: LinkEnd,
    rng: ChaCha8Rng,
}

impl ClusterDelayLine {
    /// Create a non line of sight cluster delay line
    ///
    /// # Arguments
    /// * `num_clusters` - Number of clusters, at least one
    /// * `delay_spread` - Rms delay spread `DS` in seconds, non-negative
    /// * `delay_scaling` - Delay distribution proportionality `r_tau`, at least one
    pub fn new(
        num_clusters: usize,
        delay_spread: f64,
        delay_scaling: f64,
        alpha: &Device,
        beta: &Device,
        seed: Option<u64>,
    ) -> SimResult<Self> {
        let mut line = Self {
            num_clusters: 1,
            delay_spread: 0.0,
            delay_scaling: 1.0,
            rice_factor_mean: DEFAULT_RICE_FACTOR_MEAN,
            rice_factor_std: DEFAULT_RICE_FACTOR_STD,
            cluster_shadowing_std: DEFAULT_CLUSTER_SHADOWING_STD,
            line_of_sight: false,
            doppler_frequency: 0.0,
            alpha: LinkEnd::of(alpha),
            beta: LinkEnd::of(beta),
            rng: ChaCha8Rng::seed_from_u64(seed.unwrap_or_else(fallback_seed)),
        };
        line.set_num_clusters(num_clusters)?;
        line.set_delay_spread(delay_spread)?;
        line.set_delay_scaling(delay_scaling)?;
        Ok(line)
    }

    pub fn num_clusters(&self) -> usize {
        self.num_clusters
    }

    pub fn set_num_clusters(&mut self, num_clusters: usize) -> SimResult<()> {
        if num_clusters < 1 {
            return Err(SimError::config("a cluster delay line requires at least one cluster"));
        }
        self.num_clusters = num_clusters;
        Ok(())
    }

    pub fn delay_spread(&self) -> f64 {
        self.delay_spread
    }

    pub fn set_delay_spread(&mut self, delay_spread: f64) -> SimResult<()> {
        self.delay_spread = non_negative(delay_spread, "delay spread")?;
        Ok(())
    }

    pub fn delay_scaling(&self) -> f64 {
        self.delay_scaling
    }

    pub fn set_delay_scaling(&mut self, delay_scaling: f64) -> SimResult<()> {
        if !(delay_scaling >= 1.0) || !delay_scaling.is_finite() {
            return Err(SimError::config("delay scaling must be at least one"));
        }
        self.delay_scaling = delay_scaling;
        Ok(())
    }

    /// Mean of the Rice factor in dB
    pub fn rice_factor_mean(&self) -> f64 {
        self.rice_factor_mean
    }

    pub fn set_rice_factor_mean(&mut self, mean: f64) -> SimResult<()> {
        self.rice_factor_mean = non_negative(mean, "rice factor mean")?;
        Ok(())
    }

    /// Standard deviation of the Rice factor in dB
    pub fn rice_factor_std(&self) -> f64 {
        self.rice_factor_std
    }

    pub fn set_rice_factor_std(&mut self, std_dev: f64) -> SimResult<()> {
        self.rice_factor_std = non_negative(std_dev, "rice factor standard deviation")?;
        Ok(())
    }

    /// Standard deviation of the per-cluster shadowing in dB
    pub fn cluster_shadowing_std(&self) -> f64 {
        self.cluster_shadowing_std
    }

    pub fn set_cluster_shadowing_std(&mut self, std_dev: f64) -> SimResult<()> {
        self.cluster_shadowing_std = non_negative(std_dev, "cluster shadowing standard deviation")?;
        Ok(())
    }

    pub fn line_of_sight(&self) -> bool {
        self.line_of_sight
    }

    pub fn set_line_of_sight(&mut self, line_of_sight: bool) {
        self.line_of_sight = line_of_sight;
    }

    pub fn doppler_frequency(&self) -> f64 {
        self.doppler_frequency
    }

    pub fn set_doppler_frequency(&mut self, doppler_frequency: f64) -> SimResult<()> {
        self.doppler_frequency = non_negative(doppler_frequency, "doppler frequency")?;
        Ok(())
    }

    pub fn alpha(&self) -> LinkEnd {
        self.alpha
    }

    pub fn beta(&self) -> LinkEnd {
        self.beta
    }

    /// Restart the generator from a seed
    pub fn set_seed(&mut self, seed: u64) {
        self.rng = ChaCha8Rng::seed_from_u64(seed);
    }

    /// Draw cluster delays and powers into a path parameter set
    ///
    /// Non line of sight lines hold one path per cluster. Line of sight lines
    /// prepend a specular path at zero delay. Powers sum to one.
    pub fn cluster_params<R: Rng + ?Sized>(&self, rng: &mut R) -> SimResult<ChannelParams> {
        let spread = self.delay_scaling * self.delay_spread;
        let mut delays: Vec<f64> = (0..self.num_clusters)
            .map(|_| -spread * (1.0 - rng.gen::<f64>()).ln())
            .collect();
        delays.sort_by(f64::total_cmp);
        let first = delays[0];
        delays.iter_mut().for_each(|d| *d -= first);

        let shadowing = normal(0.0, self.cluster_shadowing_std)?;
        let decay = if spread > 0.0 {
            (self.delay_scaling - 1.0) / spread
        } else {
            0.0
        };
        let mut powers: Vec<f64> = delays
            .iter()
            .map(|d| (-d * decay).exp() * 10f64.powf(-shadowing.sample(&mut *rng) / 10.0))
            .collect();
        let total: f64 = powers.iter().sum();
        powers.iter_mut().for_each(|p| *p /= total);

        let params = if self.line_of_sight {
            let rice_factor_db = normal(self.rice_factor_mean, self.rice_factor_std)?.sample(&mut *rng);
            let rice_factor = 10f64.powf(rice_factor_db / 10.0);
            let scaling = los_delay_scaling(rice_factor_db);

            let mut los_delays = vec![0.0];
            los_delays.extend(delays.iter().map(|d| d * scaling));
            let mut los_powers = vec![rice_factor / (rice_factor + 1.0)];
            los_powers.extend(powers.iter().map(|p| p / (rice_factor + 1.0)));
            let mut rice_factors = vec![0.0; los_delays.len()];
            rice_factors[0] = f64::INFINITY;

            ChannelParams::new(los_delays, los_powers, rice_factors)?
        } else {
            let rice_factors = vec![0.0; delays.len()];
            ChannelParams::new(delays, powers, rice_factors)?
        };

        params.with_doppler_frequency(self.doppler_frequency)
    }

    /// Draw the next realization from the line's own generator
    pub fn realize(&mut self) -> SimResult<MultipathFadingRealization> {
        let mut rng = self.rng.clone();
        let realization = self.realize_with(&mut rng);
        self.rng = rng;
        realization
    }

    /// Draw a realization from an external generator
    pub fn realize_with<R: Rng + ?Sized>(&self, rng: &mut R) -> SimResult<MultipathFadingRealization> {
        let params = self.cluster_params(rng)?;
        let paths: Vec<PathRealization> = params
            .path_profiles()
            .map(|profile| {
                PathRealization::realize(&profile, self.beta.num_antennas, self.alpha.num_antennas, rng)
            })
            .collect();

        debug!(
            num_paths = paths.len(),
            line_of_sight = self.line_of_sight,
            max_delay = params.max_delay(),
            "realized cluster delay line"
        );

        Ok(MultipathFadingRealization::new(
            self.alpha,
            self.beta,
            params.gain(),
            paths,
            None,
            None,
        ))
    }

    /// Realize and sample the alpha to beta response
    ///
    /// The state spans every delay tap of the drawn realization.
    pub fn impulse_response(&mut self, num_samples: usize, sampling_rate: f64) -> SimResult<ChannelState> {
        if !(sampling_rate > 0.0) {
            return Err(SimError::config("sampling rate must be greater than zero"));
        }
        let realization = self.realize()?;
        let num_delay_taps = realization.max_delay_tap(sampling_rate) + 1;
        realization.sample(Direction::Forward, 0.0, sampling_rate, num_samples, num_delay_taps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use sim_core::{AntennaArray, Signal};

    const NUM_CLUSTERS: usize = 10;
    const DELAY_SPREAD: f64 = 11e-9;
    const DELAY_SCALING: f64 = 1.1;
    const NUM_SAMPLES: usize = 5000;
    const SAMPLING_RATE: f64 = 5e8;

    fn device() -> Device {
        let antennas = AntennaArray::uniform(0.01, [1, 1, 1]).unwrap();
        Device::new(antennas, SAMPLING_RATE, 1e9).unwrap()
    }

    fn line(seed: u64) -> ClusterDelayLine {
        ClusterDelayLine::new(NUM_CLUSTERS, DELAY_SPREAD, DELAY_SCALING, &device(), &device(), Some(seed))
            .unwrap()
    }

    #[test]
    fn test_init() {
        let line = line(42);
        assert_eq!(line.num_clusters(), NUM_CLUSTERS);
        assert_eq!(line.delay_spread(), DELAY_SPREAD);
        assert_eq!(line.delay_scaling(), DELAY_SCALING);
        assert!(!line.line_of_sight());
    }

    #[test]
    fn test_num_clusters_validation() {
        let mut line = line(42);
        assert!(matches!(line.set_num_clusters(0), Err(SimError::Configuration(_))));
        line.set_num_clusters(123).unwrap();
        assert_eq!(line.num_clusters(), 123);

        assert!(ClusterDelayLine::new(0, DELAY_SPREAD, DELAY_SCALING, &device(), &device(), None).is_err());
    }

    #[test]
    fn test_delay_spread_validation() {
        let mut line = line(42);
        assert!(line.set_delay_spread(-1.0).is_err());
        line.set_delay_spread(0.0).unwrap();
        line.set_delay_spread(123.0).unwrap();
        assert_eq!(line.delay_spread(), 123.0);
    }

    #[test]
    fn test_delay_scaling_validation() {
        let mut line = line(42);
        assert!(line.set_delay_scaling(-1.0).is_err());
        assert!(line.set_delay_scaling(0.5).is_err());
        line.set_delay_scaling(1.0).unwrap();
        line.set_delay_scaling(123.0).unwrap();
        assert_eq!(line.delay_scaling(), 123.0);
    }

    #[test]
    fn test_rice_factor_validation() {
        let mut line = line(42);
        assert!(line.set_rice_factor_mean(-1.0).is_err());
        line.set_rice_factor_mean(0.0).unwrap();
        line.set_rice_factor_mean(123.0).unwrap();
        assert_eq!(line.rice_factor_mean(), 123.0);

        assert!(line.set_rice_factor_std(-1.0).is_err());
        line.set_rice_factor_std(0.0).unwrap();
        line.set_rice_factor_std(123.0).unwrap();
        assert_eq!(line.rice_factor_std(), 123.0);
    }

    #[test]
    fn test_cluster_shadowing_std_validation() {
        let mut line = line(42);
        assert!(line.set_cluster_shadowing_std(-1.0).is_err());
        line.set_cluster_shadowing_std(0.0).unwrap();
        line.set_cluster_shadowing_std(123.0).unwrap();
        assert_eq!(line.cluster_shadowing_std(), 123.0);
    }

    #[test]
    fn test_nlos_clusters() {
        let line = line(42);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let params = line.cluster_params(&mut rng).unwrap();

        assert_eq!(params.num_paths(), NUM_CLUSTERS);
        assert_relative_eq!(params.power_profile().iter().sum::<f64>(), 1.0, epsilon = 1e-12);
        assert_eq!(params.delays().iter().copied().fold(f64::INFINITY, f64::min), 0.0);
        assert!(params.rice_factors().iter().all(|k| *k == 0.0), "NLOS clusters are pure scattering");
    }

    #[test]
    fn test_los_clusters() {
        let mut line = line(42);
        line.set_line_of_sight(true);
        line.set_rice_factor_std(0.0).unwrap();
        line.set_rice_factor_mean(10.0).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let params = line.cluster_params(&mut rng).unwrap();

        assert_eq!(params.num_paths(), NUM_CLUSTERS + 1);
        assert_eq!(params.delays()[0], 0.0);
        assert!(params.rice_factors()[0].is_infinite(), "First path is specular");
        assert_relative_eq!(params.power_profile()[0], 10.0 / 11.0, epsilon = 1e-12);
        assert_relative_eq!(params.power_profile().iter().sum::<f64>(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_zero_delay_spread_collapses_to_one_tap() {
        let mut line = line(42);
        line.set_delay_spread(0.0).unwrap();
        let state = line.impulse_response(16, SAMPLING_RATE).unwrap();
        assert_eq!(state.num_delay_taps(), 1);
        assert!(state.dense().iter().all(|h| h.re.is_finite() && h.im.is_finite()));
    }

    #[test]
    fn test_impulse_response_nlos() {
        let mut line = line(42);
        let state = line.impulse_response(NUM_SAMPLES, SAMPLING_RATE).unwrap();

        assert_eq!(state.num_receive_streams(), 1);
        assert_eq!(state.num_transmit_streams(), 1);
        assert_eq!(state.num_samples(), NUM_SAMPLES);
        assert!(state.num_delay_taps() >= 1);

        // Without Doppler the response is static
        let dense = state.dense();
        for tap in 0..state.num_delay_taps() {
            let first = dense[[0, 0, 0, tap]];
            assert!((dense[[0, 0, NUM_SAMPLES - 1, tap]] - first).norm() < 1e-12);
        }
        let energy: f64 = (0..state.num_delay_taps()).map(|t| dense[[0, 0, 0, t]].norm_sqr()).sum();
        assert!(energy > 0.0, "NLOS response carries no energy");
    }

    #[test]
    fn test_impulse_response_los() {
        let mut line = line(42);
        line.set_line_of_sight(true);
        line.set_rice_factor_mean(40.0).unwrap();
        line.set_rice_factor_std(0.0).unwrap();
        let state = line.impulse_response(NUM_SAMPLES, SAMPLING_RATE).unwrap();

        assert_eq!(state.num_samples(), NUM_SAMPLES);
        let first_tap = state.dense()[[0, 0, 0, 0]].norm_sqr();
        assert!(first_tap > 0.8, "Specular tap power {} too weak", first_tap);
    }

    #[test]
    fn test_realizations_follow_seed() {
        let a = line(7).impulse_response(64, SAMPLING_RATE).unwrap();
        let b = line(7).impulse_response(64, SAMPLING_RATE).unwrap();
        assert_eq!(a, b);

        let mut advancing = line(7);
        let first = advancing.realize().unwrap();
        let second = advancing.realize().unwrap();
        assert_ne!(first, second, "Consecutive draws must differ");
    }

    #[test]
    fn test_realization_propagates_like_any_channel() {
        let tx = device();
        let rx = device();
        let mut line =
            ClusterDelayLine::new(NUM_CLUSTERS, DELAY_SPREAD, DELAY_SCALING, &tx, &rx, Some(3)).unwrap();
        let realization = line.realize().unwrap();

        let signal = Signal::from_stream(vec![num_complex::Complex64::new(1.0, 0.0); 32], SAMPLING_RATE, 1e9)
            .unwrap();
        let propagated = realization.propagate(&signal, Some(&tx), Some(&rx)).unwrap();
        assert_eq!(
            propagated.num_samples(),
            32 + realization.max_delay_tap(SAMPLING_RATE),
            "Output must cover the delay spread"
        );

        let state = realization.state(&tx, &rx, 0.0, SAMPLING_RATE, 32, 1).unwrap();
        let sampled = realization.sample(Direction::Forward, 0.0, SAMPLING_RATE, 32, 1).unwrap();
        assert_eq!(state, sampled);
    }
}
