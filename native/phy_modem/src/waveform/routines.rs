//! Attachment of receive routines to waveforms
//!
//! Every routine is attached to at most one waveform and exactly once:
//! attaching an attached routine is a state error, and using a floating
//! routine is a state error. Replacing a routine on a waveform hands the
//! previous one back detached.

use std::sync::atomic::{AtomicU64, Ordering};

use sim_core::{SimError, SimResult};
use tracing::debug;

use super::equalization::{ChannelEqualization, NoEqualization};
use super::estimation::{ChannelEstimation, IdealChannelEstimation};
use super::synchronization::{FrameSynchronization, Synchronization};

static NEXT_WAVEFORM_ID: AtomicU64 = AtomicU64::new(0);

/// Process-unique waveform identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WaveformId(u64);

impl WaveformId {
    pub(crate) fn next() -> Self {
        Self(NEXT_WAVEFORM_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

/// Back-reference from a routine to its waveform
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attachment {
    waveform: Option<WaveformId>,
}

impl Attachment {
    pub fn waveform(&self) -> Option<WaveformId> {
        self.waveform
    }

    /// The owning waveform, or a state error for floating routines
    pub fn require(&self, routine: &str) -> SimResult<WaveformId> {
        self.waveform.ok_or_else(|| {
            SimError::state(format!("{} routine is floating and not attached to a waveform", routine))
        })
    }

    fn attach(&mut self, waveform: WaveformId, routine: &str) -> SimResult<()> {
        if let Some(current) = self.waveform {
            return Err(SimError::state(format!(
                "{} routine is already attached to waveform {}",
                routine,
                current.raw()
            )));
        }
        self.waveform = Some(waveform);
        Ok(())
    }

    fn detach(&mut self) {
        self.waveform = None;
    }
}

/// Common surface of synchronization, estimation and equalization routines
pub trait Routine: Send + std::fmt::Debug {
    fn attachment(&self) -> &Attachment;

    fn attachment_mut(&mut self) -> &mut Attachment;

    fn is_attached(&self) -> bool {
        self.attachment().waveform().is_some()
    }
}

/// Receive routines owned by one waveform
#[derive(Debug)]
pub struct WaveformRoutines {
    id: WaveformId,
    synchronization: Box<dyn Synchronization>,
    estimation: Box<dyn ChannelEstimation>,
    equalization: Box<dyn ChannelEqualization>,
}

impl WaveformRoutines {
    /// Default routines: frame slicing, ideal estimation and no equalization
    pub fn new() -> Self {
        let id = WaveformId::next();
        let mut routines = Self {
            id,
            synchronization: Box::new(FrameSynchronization::new()),
            estimation: Box::new(IdealChannelEstimation::new()),
            equalization: Box::new(NoEqualization::new()),
        };
        routines.synchronization.attachment_mut().waveform = Some(id);
        routines.estimation.attachment_mut().waveform = Some(id);
        routines.equalization.attachment_mut().waveform = Some(id);
        routines
    }

    pub fn id(&self) -> WaveformId {
        self.id
    }

    pub fn synchronization(&self) -> &dyn Synchronization {
        self.synchronization.as_ref()
    }

    pub fn estimation(&self) -> &dyn ChannelEstimation {
        self.estimation.as_ref()
    }

    pub fn equalization(&self) -> &dyn ChannelEqualization {
        self.equalization.as_ref()
    }

    /// Attach a floating synchronization routine, returning the detached previous one
    pub fn set_synchronization(
        &mut self,
        mut routine: Box<dyn Synchronization>,
    ) -> SimResult<Box<dyn Synchronization>> {
        routine.attachment_mut().attach(self.id, "synchronization")?;
        let mut previous = std::mem::replace(&mut self.synchronization, routine);
        previous.attachment_mut().detach();
        debug!(waveform = self.id.raw(), "synchronization routine replaced");
        Ok(previous)
    }

    /// Attach a floating estimation routine, returning the detached previous one
    pub fn set_estimation(
        &mut self,
        mut routine: Box<dyn ChannelEstimation>,
    ) -> SimResult<Box<dyn ChannelEstimation>> {
        routine.attachment_mut().attach(self.id, "channel estimation")?;
        let mut previous = std::mem::replace(&mut self.estimation, routine);
        previous.attachment_mut().detach();
        debug!(waveform = self.id.raw(), "channel estimation routine replaced");
        Ok(previous)
    }

    /// Attach a floating equalization routine, returning the detached previous one
    pub fn set_equalization(
        &mut self,
        mut routine: Box<dyn ChannelEqualization>,
    ) -> SimResult<Box<dyn ChannelEqualization>> {
        routine.attachment_mut().attach(self.id, "channel equalization")?;
        let mut previous = std::mem::replace(&mut self.equalization, routine);
        previous.attachment_mut().detach();
        debug!(waveform = self.id.raw(), "channel equalization routine replaced");
        Ok(previous)
    }
}

impl Default for WaveformRoutines {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::waveform::{CorrelationSynchronization, LeastSquaresChannelEstimation, ZeroForcingChannelEqualization};

    #[test]
    fn test_default_routines_are_attached() {
        let routines = WaveformRoutines::new();
        assert_eq!(routines.synchronization().attachment().waveform(), Some(routines.id()));
        assert!(routines.estimation().is_attached());
        assert!(routines.equalization().is_attached());
    }

    #[test]
    fn test_replacing_detaches_previous() {
        let mut routines = WaveformRoutines::new();
        let previous = routines
            .set_synchronization(Box::new(CorrelationSynchronization::new()))
            .unwrap();
        assert!(!previous.is_attached(), "Replaced routine must be floating");
        assert!(routines.synchronization().is_attached());
    }

    #[test]
    fn test_reattaching_is_a_state_error() {
        let mut first = WaveformRoutines::new();
        let mut second = WaveformRoutines::new();

        let detached = first
            .set_estimation(Box::new(LeastSquaresChannelEstimation::new()))
            .unwrap();
        // The detached default may move to another waveform exactly once
        second.set_estimation(detached).unwrap();

        let mut equalization = ZeroForcingChannelEqualization::new();
        equalization.attachment_mut().attach(first.id(), "channel equalization").unwrap();
        assert!(matches!(
            second.set_equalization(Box::new(equalization)),
            Err(SimError::State(_))
        ));
    }

    #[test]
    fn test_floating_routine_requires_attachment() {
        let attachment = Attachment::default();
        assert!(matches!(attachment.require("synchronization"), Err(SimError::State(_))));
    }
}
