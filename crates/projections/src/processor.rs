//! Projection processor for feeding log envelopes to projections.

use event_store::{Envelope, EventLog, Tag};
use futures_util::StreamExt;

use crate::Result;
use crate::projection::Projection;

/// Reads the event log and delivers envelopes to projections.
///
/// The processor supports:
/// - Catch-up: replays the log up to its current head, starting after the
///   lowest position among the registered projections
/// - Single envelope delivery
/// - Rebuild: resets all projections and replays from the start
pub struct ProjectionProcessor<L: EventLog> {
    log: L,
    projections: Vec<Box<dyn Projection>>,
}

impl<L: EventLog> ProjectionProcessor<L> {
    pub fn new(log: L) -> Self {
        Self {
            log,
            projections: Vec::new(),
        }
    }

    /// Registers a projection with this processor.
    pub fn register(&mut self, projection: Box<dyn Projection>) {
        self.projections.push(projection);
    }

    pub fn projection_count(&self) -> usize {
        self.projections.len()
    }

    /// Streams the log up to its current head and delivers each envelope to
    /// every projection that has not seen it yet.
    #[tracing::instrument(skip(self))]
    pub async fn run_catch_up(&self) -> Result<u64> {
        let mut from = None;
        for projection in &self.projections {
            let offset = projection.position().await.offset;
            from = Some(from.map_or(offset, |f: event_store::Offset| f.min(offset)));
        }
        let Some(from) = from else {
            return Ok(0);
        };

        let mut stream = self.log.current_events_by_tag(&Tag::all(), from).await?;
        let mut delivered: u64 = 0;

        while let Some(result) = stream.next().await {
            let envelope = result?;
            for projection in &self.projections {
                if projection.position().await.offset < envelope.offset {
                    projection.handle(&envelope).await?;
                    metrics::counter!("projections_events_processed", "projection" => projection.name())
                        .increment(1);
                    delivered += 1;
                }
            }
        }

        tracing::info!(
            from = %from,
            delivered,
            projections = self.projections.len(),
            "catch-up complete"
        );
        Ok(delivered)
    }

    /// Delivers a single envelope to all registered projections.
    #[tracing::instrument(skip(self, envelope), fields(offset = %envelope.offset, event_type = %envelope.event_type()))]
    pub async fn process_envelope(&self, envelope: &Envelope) -> Result<()> {
        for projection in &self.projections {
            projection.handle(envelope).await?;
        }
        Ok(())
    }

    /// Resets all projections and replays the log from the start.
    #[tracing::instrument(skip(self))]
    pub async fn rebuild_all(&self) -> Result<u64> {
        for projection in &self.projections {
            projection.reset().await?;
        }
        self.run_catch_up().await
    }
}
