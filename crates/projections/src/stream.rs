//! Live, scoped event streams with resumption.

use std::pin::Pin;
use std::task::{Context, Poll};

use common::{AggregateKey, Label, ProjectRef};
use event_store::{Envelope, EventLog, Offset, Tag};
use futures_core::Stream;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::{ProjectionError, Result};

/// Which envelopes a subscription delivers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "@type")]
pub enum SubscriptionScope {
    Global,
    Organization { organization: Label },
    Project { project: ProjectRef },
    /// Every event of one aggregate.
    Resource { key: AggregateKey },
}

impl SubscriptionScope {
    /// The log index the subscription reads.
    pub fn tag(&self) -> Tag {
        match self {
            SubscriptionScope::Global => Tag::all(),
            SubscriptionScope::Organization { organization } => Tag::organization(organization),
            SubscriptionScope::Project { project } => Tag::project(project),
            SubscriptionScope::Resource { key } => key
                .project_ref()
                .map_or_else(|| Tag::entity(key.entity_type()), |p| Tag::project(&p)),
        }
    }

    /// Whether an envelope read from [`Self::tag`] belongs to the scope.
    pub fn matches(&self, envelope: &Envelope) -> bool {
        match self {
            SubscriptionScope::Resource { key } => envelope.key() == key,
            _ => true,
        }
    }
}

impl std::fmt::Display for SubscriptionScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubscriptionScope::Global => f.write_str("global"),
            SubscriptionScope::Organization { organization } => write!(f, "org:{organization}"),
            SubscriptionScope::Project { project } => write!(f, "project:{project}"),
            SubscriptionScope::Resource { key } => write!(f, "key:{key}"),
        }
    }
}

/// Lifecycle of a subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "phase")]
pub enum Phase {
    Connecting,
    /// Delivering history after `from`, up to the head seen at subscribe time.
    Replaying { from: Offset, head: Offset },
    /// Delivering envelopes as they are appended.
    Live,
    Closed,
    Failed { reason: String },
}

/// Opens scoped subscriptions on a log.
#[derive(Clone)]
pub struct EventStreamer<L> {
    log: L,
}

impl<L> EventStreamer<L>
where
    L: EventLog + Clone + 'static,
{
    pub fn new(log: L) -> Self {
        Self { log }
    }

    /// Streams the envelopes of `scope` with an offset greater than `from`:
    /// first the history up to the current head, then new appends.
    ///
    /// The stream only reads the log while it is polled, so a slow consumer
    /// never holds anything the write path waits on. Dropping the
    /// subscription releases the log cursor.
    pub fn subscribe(&self, scope: SubscriptionScope, from: Offset) -> Subscription {
        let (phase_tx, phase_rx) = watch::channel(Phase::Connecting);
        let log = self.log.clone();
        let scope_label = scope.to_string();

        let inner = async_stream::stream! {
            let tag = scope.tag();

            let head = match log.last_offset(&tag).await {
                Ok(head) => head,
                Err(e) => {
                    phase_tx.send_replace(Phase::Failed { reason: e.to_string() });
                    yield Err(ProjectionError::from(e));
                    return;
                }
            };
            phase_tx.send_replace(Phase::Replaying { from, head });
            tracing::debug!(scope = %scope, from = %from, head = %head, "replaying");

            // The tail continues after the last envelope read, whether or not
            // it matched, so nothing is delivered twice.
            let mut cursor = from;
            if head > from {
                let mut history = match log.current_events_by_tag(&tag, from).await {
                    Ok(history) => history,
                    Err(e) => {
                        phase_tx.send_replace(Phase::Failed { reason: e.to_string() });
                        yield Err(ProjectionError::from(e));
                        return;
                    }
                };
                while let Some(item) = history.next().await {
                    match item {
                        Ok(envelope) => {
                            cursor = envelope.offset;
                            if scope.matches(&envelope) {
                                metrics::counter!("stream_envelopes_delivered_total").increment(1);
                                yield Ok(envelope);
                            }
                        }
                        Err(e) => {
                            phase_tx.send_replace(Phase::Failed { reason: e.to_string() });
                            yield Err(ProjectionError::from(e));
                            return;
                        }
                    }
                }
            }

            let mut live = match log.events_by_tag(&tag, cursor).await {
                Ok(live) => live,
                Err(e) => {
                    phase_tx.send_replace(Phase::Failed { reason: e.to_string() });
                    yield Err(ProjectionError::from(e));
                    return;
                }
            };
            phase_tx.send_replace(Phase::Live);
            tracing::debug!(scope = %scope, cursor = %cursor, "live");

            while let Some(item) = live.next().await {
                match item {
                    Ok(envelope) => {
                        if scope.matches(&envelope) {
                            metrics::counter!("stream_envelopes_delivered_total").increment(1);
                            yield Ok(envelope);
                        }
                    }
                    Err(e) => {
                        phase_tx.send_replace(Phase::Failed { reason: e.to_string() });
                        yield Err(ProjectionError::from(e));
                        return;
                    }
                }
            }
            phase_tx.send_replace(Phase::Closed);
        };

        metrics::gauge!("stream_subscriptions_active").increment(1.0);
        tracing::debug!(scope = %scope_label, from = %from, "subscription opened");
        Subscription {
            inner: Box::pin(inner),
            phase: phase_rx,
            scope: scope_label,
        }
    }
}

/// A cancellable stream of envelopes for one scope.
pub struct Subscription {
    inner: Pin<Box<dyn Stream<Item = Result<Envelope>> + Send>>,
    phase: watch::Receiver<Phase>,
    scope: String,
}

impl Subscription {
    /// Current phase. Reads `Connecting` until the stream is first polled.
    pub fn phase(&self) -> Phase {
        self.phase.borrow().clone()
    }
}

impl Stream for Subscription {
    type Item = Result<Envelope>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().inner.as_mut().poll_next(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        metrics::gauge!("stream_subscriptions_active").decrement(1.0);
        tracing::debug!(scope = %self.scope, "subscription closed");
    }
}
