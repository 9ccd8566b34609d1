//! Simulation scenario
//!
//! A scenario owns devices, the modems operating them and the fading channels
//! linking device pairs. One [`SimulationScenario::drop`] is a single Monte
//! Carlo draw: every bound modem transmits, every channel is realized once,
//! each device receives the superposition of all linked transmissions plus
//! noise, and every bound modem decodes its device's reception.

use std::collections::HashMap;

use ndarray::{Array1, Array2, Array4};
use num_complex::Complex64;
use channel_physics::{AwgnNoise, ChannelParams, ChannelState, MultipathFadingChannel, MultipathFadingRealization};
use sim_core::logging::init_logging;
use sim_core::random::fallback_seed;
use sim_core::{
    Device, DeviceId, Operator, OperatorId, RandomStreams, SimError, SimResult, Signal, Slab,
    StreamKind,
};
use tracing::{debug, info, warn};

use crate::config::ScenarioConfig;
use crate::modem::{Modem, ModemReception, ModemTransmission};

/// Records of one Monte Carlo drop
#[derive(Debug, Clone)]
pub struct ScenarioDrop {
    pub transmissions: Vec<(OperatorId, ModemTransmission)>,
    pub receptions: Vec<(OperatorId, ModemReception)>,
    /// One realization per channel, in channel order
    pub realizations: Vec<MultipathFadingRealization>,
}

impl ScenarioDrop {
    pub fn transmission(&self, modem: OperatorId) -> Option<&ModemTransmission> {
        self.transmissions.iter().find(|(id, _)| *id == modem).map(|(_, t)| t)
    }

    pub fn reception(&self, modem: OperatorId) -> Option<&ModemReception> {
        self.receptions.iter().find(|(id, _)| *id == modem).map(|(_, r)| r)
    }
}

#[derive(Debug)]
pub struct SimulationScenario {
    streams: RandomStreams,
    devices: Vec<Device>,
    modems: Slab<Modem>,
    channels: Vec<MultipathFadingChannel>,
    references: HashMap<OperatorId, OperatorId>,
    num_frames: usize,
}

impl SimulationScenario {
    pub fn new(seed: u64) -> Self {
        Self {
            streams: RandomStreams::new(seed),
            devices: Vec::new(),
            modems: Slab::new(),
            channels: Vec::new(),
            references: HashMap::new(),
            num_frames: 1,
        }
    }

    /// Build a scenario from its tagged configuration
    pub fn from_config(config: &ScenarioConfig) -> SimResult<Self> {
        if let Some(logging) = &config.logging {
            init_logging(logging);
        }

        let mut scenario = Self::new(config.seed.unwrap_or_else(fallback_seed));
        let mut device_ids = Vec::with_capacity(config.devices.len());
        for device in &config.devices {
            device_ids.push(scenario.add_device(device.build()?));
        }
        let device_at = |index: usize| {
            device_ids.get(index).copied().ok_or_else(|| {
                SimError::config(format!("device index {} out of {} devices", index, device_ids.len()))
            })
        };

        for link in &config.links {
            let (alpha, beta) = (device_at(link.alpha)?, device_at(link.beta)?);
            scenario.set_channel(alpha, beta, link.channel.to_params()?)?;
            if let Some(channel) = scenario.channel_mut(alpha, beta) {
                if let Some(correlation) = &link.alpha_correlation {
                    channel.set_alpha_correlation(Some(correlation.build()?));
                }
                if let Some(correlation) = &link.beta_correlation {
                    channel.set_beta_correlation(Some(correlation.build()?));
                }
            }
        }

        for modem in &config.modems {
            let device = device_at(modem.device)?;
            let id = scenario.add_modem(modem.build()?)?;
            scenario.bind(id, device)?;
        }

        info!(
            seed = scenario.streams.seed(),
            devices = scenario.devices.len(),
            channels = scenario.channels.len(),
            modems = scenario.modems.len(),
            "scenario configured"
        );
        Ok(scenario)
    }

    pub fn seed(&self) -> u64 {
        self.streams.seed()
    }

    pub fn num_frames(&self) -> usize {
        self.num_frames
    }

    /// Frames every modem transmits per drop, at least one
    pub fn set_num_frames(&mut self, num_frames: usize) -> SimResult<()> {
        if num_frames < 1 {
            return Err(SimError::config("a drop must transmit at least one frame"));
        }
        self.num_frames = num_frames;
        Ok(())
    }

    pub fn add_device(&mut self, device: Device) -> DeviceId {
        let id = device.id();
        self.devices.push(device);
        id
    }

    pub fn device(&self, id: DeviceId) -> Option<&Device> {
        self.devices.iter().find(|d| d.id() == id)
    }

    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    fn device_index(&self, id: DeviceId) -> SimResult<usize> {
        self.devices
            .iter()
            .position(|d| d.id() == id)
            .ok_or_else(|| SimError::state(format!("device {} is not part of the scenario", id.raw())))
    }

    /// Add a floating modem
    pub fn add_modem(&mut self, modem: Modem) -> SimResult<OperatorId> {
        if modem.device().is_some() {
            return Err(SimError::state("only floating modems can be added to a scenario"));
        }
        self.modems
            .insert(modem)
            .map(OperatorId)
            .ok_or_else(|| SimError::state("scenario modem capacity exhausted"))
    }

    pub fn modem(&self, id: OperatorId) -> Option<&Modem> {
        self.modems.get(id.0)
    }

    pub fn modem_mut(&mut self, id: OperatorId) -> Option<&mut Modem> {
        self.modems.get_mut(id.0)
    }

    /// Remove a modem, unbinding it first
    pub fn remove_modem(&mut self, id: OperatorId) -> SimResult<Modem> {
        if self.modem(id).and_then(Modem::device).is_some() {
            self.unbind(id)?;
        }
        self.references.retain(|receiver, transmitter| *receiver != id && *transmitter != id);
        self.modems
            .remove(id.0)
            .ok_or_else(|| unknown_modem(id))
    }

    /// Bind a floating modem to a device
    pub fn bind(&mut self, modem: OperatorId, device: DeviceId) -> SimResult<()> {
        let index = self.device_index(device)?;
        let operator = self
            .modems
            .get_mut(modem.0)
            .ok_or_else(|| unknown_modem(modem))?;
        self.devices[index].bind_operator(modem, operator)
    }

    pub fn unbind(&mut self, modem: OperatorId) -> SimResult<()> {
        let device = self
            .modem(modem)
            .ok_or_else(|| unknown_modem(modem))?
            .binding()
            .require()?;
        let index = self.device_index(device)?;
        let operator = self
            .modems
            .get_mut(modem.0)
            .ok_or_else(|| unknown_modem(modem))?;
        self.devices[index].unbind_operator(modem, operator)
    }

    /// Link two devices, replacing any channel already linking them
    pub fn set_channel(&mut self, alpha: DeviceId, beta: DeviceId, params: ChannelParams) -> SimResult<()> {
        let seed = self.streams.derive_seed(StreamKind::Channel);
        let alpha_device = &self.devices[self.device_index(alpha)?];
        let beta_device = &self.devices[self.device_index(beta)?];
        let channel = MultipathFadingChannel::new(params, alpha_device, beta_device, Some(seed));

        match self.channel_position(alpha, beta) {
            Some(index) => self.channels[index] = channel,
            None => self.channels.push(channel),
        }
        debug!(alpha = alpha.raw(), beta = beta.raw(), "channel linked");
        Ok(())
    }

    fn channel_position(&self, a: DeviceId, b: DeviceId) -> Option<usize> {
        self.channels.iter().position(|c| {
            let (alpha, beta) = (c.alpha().device, c.beta().device);
            (alpha == a && beta == b) || (alpha == b && beta == a)
        })
    }

    /// The channel linking two devices in either orientation
    pub fn channel(&self, a: DeviceId, b: DeviceId) -> Option<&MultipathFadingChannel> {
        self.channel_position(a, b).map(|index| &self.channels[index])
    }

    pub fn channel_mut(&mut self, a: DeviceId, b: DeviceId) -> Option<&mut MultipathFadingChannel> {
        self.channel_position(a, b).map(move |index| &mut self.channels[index])
    }

    /// Select the transmitting modem whose link provides a receiver's channel state
    pub fn set_reference(&mut self, receiver: OperatorId, transmitter: OperatorId) -> SimResult<()> {
        if self.modem(receiver).is_none() || self.modem(transmitter).is_none() {
            return Err(SimError::state("reference modems must be part of the scenario"));
        }
        self.references.insert(receiver, transmitter);
        Ok(())
    }

    /// Reference transmitter of a receiving modem
    ///
    /// Without an explicit choice this is the first other bound modem linked
    /// to the receiver's device, then the receiver itself if its device is
    /// linked to itself.
    pub fn reference(&self, receiver: OperatorId) -> Option<OperatorId> {
        if let Some(reference) = self.references.get(&receiver) {
            return Some(*reference);
        }

        let rx_device = self.modem(receiver)?.device()?;
        let linked = |id: &OperatorId| {
            self.modem(*id)
                .and_then(Modem::device)
                .is_some_and(|tx_device| self.channel_position(tx_device, rx_device).is_some())
        };

        let mut candidates: Vec<OperatorId> = self.modems.ids().into_iter().map(OperatorId).collect();
        candidates.sort_by_key(|id| id.0);
        candidates
            .iter()
            .copied()
            .find(|id| *id != receiver && linked(id))
            .or_else(|| Some(receiver).filter(linked))
    }

    /// Run one Monte Carlo drop
    ///
    /// # Arguments
    /// * `noise_power` - Power of the white Gaussian noise added at every receiving device
    pub fn drop(&mut self, noise_power: f64) -> SimResult<ScenarioDrop> {
        let noise = AwgnNoise::new(noise_power)?;

        let mut modem_ids: Vec<OperatorId> = self.modems.ids().into_iter().map(OperatorId).collect();
        modem_ids.sort_by_key(|id| id.0);

        // Transmit
        let mut transmissions = Vec::new();
        for id in &modem_ids {
            let Some(device_id) = self.modem(*id).and_then(Modem::device) else {
                continue;
            };
            let index = self.device_index(device_id)?;
            let modem = self
                .modems
                .get_mut(id.0)
                .ok_or_else(|| unknown_modem(*id))?;
            let device = &self.devices[index];
            let rng = self.streams.stream(StreamKind::Source);
            let transmission = modem.transmit(device, self.num_frames, rng)?;
            transmissions.push((*id, device_id, transmission));
        }

        // Realize
        let realizations = self
            .channels
            .iter_mut()
            .map(MultipathFadingChannel::realize)
            .collect::<SimResult<Vec<_>>>()?;

        // Propagate and superimpose per receiving device
        let mut receptions_by_device: HashMap<DeviceId, Signal> = HashMap::new();
        for receiver in &self.devices {
            let mut received = Signal::new(
                Array2::zeros((receiver.num_antennas(), 0)),
                receiver.sampling_rate(),
                receiver.carrier_frequency(),
            )?;
            for (_, tx_device_id, transmission) in &transmissions {
                let Some(link) = self.channel_position(*tx_device_id, receiver.id()) else {
                    continue;
                };
                let transmitter = &self.devices[self.device_index(*tx_device_id)?];
                let propagated = realizations[link].propagate(&transmission.signal, Some(transmitter), Some(receiver))?;
                received.superimpose(&propagated)?;
            }
            noise.add_to(&mut received, self.streams.stream(StreamKind::Noise));
            receptions_by_device.insert(receiver.id(), received);
        }

        // Receive
        let mut receptions = Vec::new();
        for id in &modem_ids {
            let Some(device_id) = self.modem(*id).and_then(Modem::device) else {
                continue;
            };
            let Some(received) = receptions_by_device.get(&device_id) else {
                continue;
            };
            let csi = self.reference_state(*id, device_id, received.num_samples(), &realizations)?;

            let index = self.device_index(device_id)?;
            let modem = self
                .modems
                .get_mut(id.0)
                .ok_or_else(|| unknown_modem(*id))?;
            let device = &self.devices[index];

            let csi = match csi {
                Some(state) if modem.waveform().sampling_rate() == device.sampling_rate() => Some(state),
                Some(_) => {
                    warn!(modem = id.0, "device and waveform rates differ, receiving without channel state");
                    None
                }
                None => None,
            };
            let reception = modem.receive(device, received, csi.as_ref(), noise_power)?;
            receptions.push((*id, reception));
        }

        debug!(
            transmissions = transmissions.len(),
            receptions = receptions.len(),
            channels = realizations.len(),
            "scenario drop"
        );
        Ok(ScenarioDrop {
            transmissions: transmissions.into_iter().map(|(id, _, t)| (id, t)).collect(),
            receptions,
            realizations,
        })
    }

    /// Channel state of a receiver's reference link covering `num_samples` received samples
    ///
    /// A transmit beam of the reference modem is folded into a single
    /// effective transmit stream.
    fn reference_state(
        &mut self,
        receiver: OperatorId,
        rx_device_id: DeviceId,
        num_samples: usize,
        realizations: &[MultipathFadingRealization],
    ) -> SimResult<Option<ChannelState>> {
        let Some(reference) = self.reference(receiver) else {
            return Ok(None);
        };
        let Some(tx_device_id) = self.modem(reference).and_then(Modem::device) else {
            return Ok(None);
        };
        let Some(link) = self.channel_position(tx_device_id, rx_device_id) else {
            return Ok(None);
        };

        let tx_index = self.device_index(tx_device_id)?;
        let rx_index = self.device_index(rx_device_id)?;
        let (transmitter, receiver_device) = (&self.devices[tx_index], &self.devices[rx_index]);
        let realization = &realizations[link];

        let sampling_rate = receiver_device.sampling_rate();
        let num_taps = realization.max_delay_tap(sampling_rate) + 1;
        let state = realization.state(
            transmitter,
            receiver_device,
            0.0,
            sampling_rate,
            (num_samples + 1).saturating_sub(num_taps),
            num_taps,
        )?;

        let weights = match self.modems.get_mut(reference.0) {
            Some(modem) => modem.transmit_weights(&self.devices[tx_index])?,
            None => None,
        };
        Ok(Some(match weights {
            Some(weights) => fold_weights(&state, &weights),
            None => state,
        }))
    }
}

fn unknown_modem(id: OperatorId) -> SimError {
    SimError::state(format!("unknown modem {}", id.0))
}

/// Effective single-stream state of a state driven through transmit weights
fn fold_weights(state: &ChannelState, weights: &Array1<Complex64>) -> ChannelState {
    let dense = state.dense();
    let (num_rx, _, num_samples, num_taps) = dense.dim();
    let folded = Array4::from_shape_fn((num_rx, 1, num_samples, num_taps), |(rx, _, k, tap)| {
        weights
            .iter()
            .enumerate()
            .map(|(tx, w)| dense[[rx, tx, k, tap]] * w)
            .sum()
    });
    ChannelState::from_dense(folded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScenarioConfig;
    use crate::evaluators::{BitErrorEvaluator, Evaluator};
    use crate::precoding::MaximumRatioCombining;
    use crate::traits::WaveformGenerator;
    use crate::waveform::{PskQamWaveform, ZeroForcingChannelEqualization};
    use serde_json::json;
    use sim_core::AntennaArray;

    fn modem() -> Modem {
        let mut waveform = PskQamWaveform::new(1e6, 4, 4, 0, 32).unwrap();
        waveform
            .routines_mut()
            .set_equalization(Box::new(ZeroForcingChannelEqualization::new()))
            .unwrap();
        Modem::new(Box::new(waveform))
    }

    #[test]
    fn test_bind_and_unbind() {
        let mut scenario = SimulationScenario::new(1);
        let device = scenario.add_device(Device::single_antenna(4e6, 1e9).unwrap());
        let id = scenario.add_modem(modem()).unwrap();

        scenario.bind(id, device).unwrap();
        assert_eq!(scenario.modem(id).unwrap().device(), Some(device));
        assert!(matches!(scenario.bind(id, device), Err(SimError::State(_))), "Rebinding requires an unbind");

        scenario.unbind(id).unwrap();
        assert_eq!(scenario.modem(id).unwrap().device(), None);
        assert!(scenario.device(device).unwrap().operators().is_empty());
        assert!(matches!(scenario.unbind(id), Err(SimError::State(_))));
    }

    #[test]
    fn test_noiseless_flat_link_is_error_free() {
        let mut scenario = SimulationScenario::new(42);
        let alpha = scenario.add_device(Device::single_antenna(4e6, 1e9).unwrap());
        let beta = scenario.add_device(Device::single_antenna(4e6, 1e9).unwrap());
        scenario.set_channel(alpha, beta, ChannelParams::flat(0.0).unwrap()).unwrap();

        let transmitter = scenario.add_modem(modem()).unwrap();
        let receiver = scenario.add_modem(modem()).unwrap();
        scenario.bind(transmitter, alpha).unwrap();
        scenario.bind(receiver, beta).unwrap();
        scenario.set_num_frames(2).unwrap();

        assert_eq!(scenario.reference(receiver), Some(transmitter));

        let drop = scenario.drop(0.0).unwrap();
        assert_eq!(drop.realizations.len(), 1);

        let sent = drop.transmission(transmitter).unwrap();
        let received = drop.reception(receiver).unwrap();
        let ber = BitErrorEvaluator.evaluate(sent, received).unwrap();
        assert_eq!(ber.errors, 0, "Ideal CSI over a flat Rayleigh link must be error free");
    }

    #[test]
    fn test_drops_are_reproducible() {
        let run = || {
            let mut scenario = SimulationScenario::new(9);
            let alpha = scenario.add_device(Device::single_antenna(4e6, 1e9).unwrap());
            let beta = scenario.add_device(Device::single_antenna(4e6, 1e9).unwrap());
            scenario.set_channel(alpha, beta, ChannelParams::flat(0.0).unwrap()).unwrap();
            let tx = scenario.add_modem(modem()).unwrap();
            let rx = scenario.add_modem(modem()).unwrap();
            scenario.bind(tx, alpha).unwrap();
            scenario.bind(rx, beta).unwrap();
            let drop = scenario.drop(0.1).unwrap();
            drop.reception(rx).unwrap().signal.clone()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_beamformed_link_to_array_receiver() {
        let mut scenario = SimulationScenario::new(3);
        let array = AntennaArray::uniform(0.15, [2, 1, 1]).unwrap();
        let alpha = scenario.add_device(Device::new(array.clone(), 4e6, 1e9).unwrap());
        let beta = scenario.add_device(Device::new(array, 4e6, 1e9).unwrap());
        scenario.set_channel(alpha, beta, ChannelParams::flat(0.0).unwrap()).unwrap();

        let mut transmitter = modem();
        transmitter.set_transmit_beam(Some(crate::modem::TransmitBeam {
            beamformer: crate::beamforming::ConventionalBeamformer::new(),
            focus: [0.0, 0.0],
        }));
        let mut receiver = modem();
        receiver.set_transmit_beam(transmitter.transmit_beam().cloned());
        // Both array devices transmit and receive every drop
        for modem in [&mut transmitter, &mut receiver] {
            modem.receive_precoding_mut().push(Box::new(MaximumRatioCombining));
        }

        let tx = scenario.add_modem(transmitter).unwrap();
        let rx = scenario.add_modem(receiver).unwrap();
        scenario.bind(tx, alpha).unwrap();
        scenario.bind(rx, beta).unwrap();

        let drop = scenario.drop(0.0).unwrap();
        let ber = BitErrorEvaluator
            .evaluate(drop.transmission(tx).unwrap(), drop.reception(rx).unwrap())
            .unwrap();
        assert_eq!(ber.errors, 0);
    }

    #[test]
    fn test_from_config() {
        let config = ScenarioConfig::decode(&json!({
            "seed": 5,
            "devices": [
                {"sampling_rate": 4e6, "carrier_frequency": 1e9},
                {"sampling_rate": 4e6, "carrier_frequency": 1e9},
            ],
            "links": [
                {"alpha": 0, "beta": 1, "channel": {"type": "cost259", "model": "TypicalUrban"}},
            ],
            "modems": [
                {"device": 0, "waveform": {"type": "psk_qam", "symbol_rate": 1e6, "num_data_symbols": 16}},
                {"device": 1, "waveform": {"type": "psk_qam", "symbol_rate": 1e6, "num_data_symbols": 16}},
            ],
        }))
        .unwrap();

        let mut scenario = SimulationScenario::from_config(&config).unwrap();
        assert_eq!(scenario.seed(), 5);
        assert_eq!(scenario.devices().len(), 2);
        let drop = scenario.drop(0.0).unwrap();
        assert_eq!(drop.transmissions.len(), 2);
        assert_eq!(drop.receptions.len(), 2);

        let bad = ScenarioConfig::decode(&json!({
            "devices": [{"sampling_rate": 4e6}],
            "modems": [{"device": 3, "waveform": {"type": "psk_qam", "symbol_rate": 1e6, "num_data_symbols": 16}}],
        }))
        .unwrap();
        assert!(matches!(SimulationScenario::from_config(&bad), Err(SimError::Configuration(_))));
    }
}
