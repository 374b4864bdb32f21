use crate::guidance::domain::guidance_decision::GuidanceDecision;

/// Receives one decision per analysis cycle.
///
/// `update` is called on the analysis worker and must not block it. Sinks
/// tied to a particular thread (a UI loop, an overlay) marshal the decision
/// there themselves, e.g. through
/// [`ChannelGuidanceSink`](crate::guidance::infrastructure::channel_guidance_sink::ChannelGuidanceSink).
pub trait GuidanceSink: Send {
    fn update(&mut self, decision: GuidanceDecision);
}

/// Discards every decision.
pub struct NullGuidanceSink;

impl GuidanceSink for NullGuidanceSink {
    fn update(&mut self, _decision: GuidanceDecision) {}
}

impl<F> GuidanceSink for F
where
    F: FnMut(GuidanceDecision) + Send,
{
    fn update(&mut self, decision: GuidanceDecision) {
        self(decision)
    }
}
