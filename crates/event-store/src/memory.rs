use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{RwLock, watch};

use crate::{
    AggregateKey, Envelope, Event, EventLogError, Offset, Result, Revision, Tag,
    store::{EnvelopeStream, EventLog, validate_for_append},
};

/// Number of envelopes read per lock acquisition while tailing.
const TAIL_BATCH_SIZE: usize = 256;

#[derive(Default)]
struct Inner {
    /// All envelopes in offset order; the envelope at index `i` has offset `i + 1`.
    envelopes: Vec<Envelope>,
    by_key: HashMap<AggregateKey, Vec<usize>>,
    by_tag: HashMap<Tag, Vec<usize>>,
}

impl Inner {
    fn head(&self) -> Offset {
        Offset::new(self.envelopes.len() as i64)
    }

    fn indexes(&self, tag: &Tag) -> Option<&[usize]> {
        self.by_tag.get(tag).map(Vec::as_slice)
    }

    /// Envelopes under `tag` with an offset in `(after, until]`, at most `limit`.
    fn read(&self, tag: &Tag, after: Offset, until: Offset, limit: usize) -> Vec<Envelope> {
        let in_range = |e: &&Envelope| e.offset > after && e.offset <= until;
        if tag.is_all() {
            let start = after.as_i64().max(0) as usize;
            self.envelopes
                .iter()
                .skip(start)
                .filter(in_range)
                .take(limit)
                .cloned()
                .collect()
        } else {
            let indexes = self.indexes(tag).unwrap_or_default();
            // offsets grow with indexes, so the first candidate can be found by bisection
            let first = indexes.partition_point(|&i| self.envelopes[i].offset <= after);
            indexes[first..]
                .iter()
                .map(|&i| &self.envelopes[i])
                .filter(in_range)
                .take(limit)
                .cloned()
                .collect()
        }
    }
}

/// In-memory event log.
///
/// Appends take a short write lock and publish the new head through a
/// `watch` channel; tailing readers wake up on head changes and re-read the
/// log, so a slow reader never holds anything a writer waits on.
#[derive(Clone)]
pub struct InMemoryEventLog {
    inner: Arc<RwLock<Inner>>,
    head: Arc<watch::Sender<Offset>>,
}

impl InMemoryEventLog {
    /// Creates a new empty log.
    pub fn new() -> Self {
        let (head, _) = watch::channel(Offset::start());
        Self {
            inner: Arc::new(RwLock::new(Inner::default())),
            head: Arc::new(head),
        }
    }

    /// Returns the total number of events stored.
    pub async fn event_count(&self) -> usize {
        self.inner.read().await.envelopes.len()
    }

    /// Number of live tails currently following the head.
    pub fn tailing_readers(&self) -> usize {
        self.head.receiver_count()
    }

    async fn read(&self, tag: &Tag, after: Offset, limit: usize) -> (Vec<Envelope>, Offset) {
        let inner = self.inner.read().await;
        let head = inner.head();
        (inner.read(tag, after, head, limit), head)
    }
}

impl Default for InMemoryEventLog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventLog for InMemoryEventLog {
    async fn append(&self, event: Event, expected: Revision) -> Result<Envelope> {
        validate_for_append(&event, expected)?;
        let tags = Tag::for_key(&event.key);

        let envelope = {
            let mut inner = self.inner.write().await;
            let actual = inner
                .by_key
                .get(&event.key)
                .map(|indexes| Revision::new(indexes.len() as i64))
                .unwrap_or_default();
            if actual != expected {
                return Err(EventLogError::RevisionConflict {
                    key: event.key,
                    expected,
                    actual,
                });
            }

            let index = inner.envelopes.len();
            let envelope = Envelope::new(Offset::new(index as i64 + 1), event);
            inner
                .by_key
                .entry(envelope.key().clone())
                .or_default()
                .push(index);
            for tag in tags {
                inner.by_tag.entry(tag).or_default().push(index);
            }
            inner.envelopes.push(envelope.clone());
            envelope
        };

        self.head.send_replace(envelope.offset);
        metrics::counter!("event_log_appends_total").increment(1);
        Ok(envelope)
    }

    async fn events(&self, key: &AggregateKey) -> Result<Vec<Envelope>> {
        let inner = self.inner.read().await;
        Ok(inner
            .by_key
            .get(key)
            .map(|indexes| {
                indexes
                    .iter()
                    .map(|&i| inner.envelopes[i].clone())
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn events_until(&self, key: &AggregateKey, revision: Revision) -> Result<Vec<Envelope>> {
        let inner = self.inner.read().await;
        Ok(inner
            .by_key
            .get(key)
            .map(|indexes| {
                indexes
                    .iter()
                    .map(|&i| &inner.envelopes[i])
                    .take_while(|e| e.revision() <= revision)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn current_revision(&self, key: &AggregateKey) -> Result<Revision> {
        let inner = self.inner.read().await;
        Ok(inner
            .by_key
            .get(key)
            .map(|indexes| Revision::new(indexes.len() as i64))
            .unwrap_or_default())
    }

    async fn last_offset(&self, tag: &Tag) -> Result<Offset> {
        let inner = self.inner.read().await;
        if tag.is_all() {
            return Ok(inner.head());
        }
        Ok(inner
            .indexes(tag)
            .and_then(|indexes| indexes.last())
            .map(|&i| inner.envelopes[i].offset)
            .unwrap_or_default())
    }

    async fn current_events_by_tag(&self, tag: &Tag, from: Offset) -> Result<EnvelopeStream> {
        use futures_util::stream;

        let inner = self.inner.read().await;
        let envelopes = inner.read(tag, from, inner.head(), usize::MAX);
        Ok(Box::pin(stream::iter(envelopes.into_iter().map(Ok))))
    }

    async fn events_by_tag(&self, tag: &Tag, from: Offset) -> Result<EnvelopeStream> {
        let log = self.clone();
        let tag = tag.clone();
        let mut head = self.head.subscribe();

        let stream = async_stream::stream! {
            let mut cursor = from;
            loop {
                let (batch, seen) = log.read(&tag, cursor, TAIL_BATCH_SIZE).await;
                if batch.is_empty() {
                    // sleep until something is appended past what was just read
                    let woken = head.wait_for(|current| *current > seen).await.map(|_| ());
                    if woken.is_err() {
                        break;
                    }
                    continue;
                }
                for envelope in batch {
                    cursor = envelope.offset;
                    yield Ok::<Envelope, EventLogError>(envelope);
                }
            }
        };
        Ok(Box::pin(stream))
    }
}
