//! Command submission: per-key serialized evaluation, append and cache write.

use std::sync::Arc;
use std::time::{Duration, Instant};

use common::{AggregateKey, Subject};
use event_store::{
    Envelope, Event, EventLog, EventLogError, EventLogExt, Revision, RetryPolicy,
};

use crate::cache::StateCache;
use crate::entity::{DomainEvent, Entity, EntityState, EventMeta, apply, fold};
use crate::error::{CommandError, FetchError};
use crate::hooks::{CommitHook, HookReport, run_hooks};
use crate::locks::KeyLocks;

/// Tuning of the write path.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// How many times a command is re-evaluated after losing an append race
    /// before failing with `WriteContention`.
    pub max_conflict_retries: u32,
    /// Upper bound for each post-commit hook.
    pub hook_timeout: Duration,
    /// Backoff for transient storage failures.
    pub storage_retry: RetryPolicy,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            max_conflict_retries: 3,
            hook_timeout: Duration::from_secs(5),
            storage_retry: RetryPolicy::default(),
        }
    }
}

/// The revision a command expects the aggregate to be at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpectedRevision {
    /// No expectation; the entity decides whether the command applies.
    Any,
    Exact(Revision),
}

impl ExpectedRevision {
    /// Expectation for commands creating an aggregate.
    pub fn new_aggregate() -> Self {
        ExpectedRevision::Exact(Revision::initial())
    }
}

impl From<Option<Revision>> for ExpectedRevision {
    fn from(revision: Option<Revision>) -> Self {
        revision.map_or(ExpectedRevision::Any, ExpectedRevision::Exact)
    }
}

/// A requested mutation of one aggregate.
#[derive(Debug, Clone)]
pub struct Command<C> {
    pub key: AggregateKey,
    pub expected: ExpectedRevision,
    pub subject: Subject,
    pub payload: C,
}

impl<C> Command<C> {
    pub fn new(key: AggregateKey, expected: ExpectedRevision, subject: Subject, payload: C) -> Self {
        Self {
            key,
            expected,
            subject,
            payload,
        }
    }
}

/// Result of an accepted command.
#[derive(Debug, Clone)]
pub struct Committed<S> {
    /// The state after applying the new event.
    pub state: S,
    /// The appended event and its offset.
    pub envelope: Envelope,
    /// Post-commit hook outcome; a degraded report still means the event is
    /// durable.
    pub hooks: HookReport,
}

/// Serializes command evaluation per aggregate key.
///
/// For each command the coordinator:
/// 1. takes the key's lock,
/// 2. reads the current state (cache first, the log after a conflict),
/// 3. checks the expected revision and evaluates the command,
/// 4. appends the event expecting the revision it read,
/// 5. writes the new state through to the cache,
/// 6. releases the lock and runs the post-commit hooks.
///
/// The log's own revision check guards against writers that bypass this
/// coordinator, e.g. another process; a conflict there re-reads the state and
/// re-evaluates up to `max_conflict_retries` times.
pub struct WriteCoordinator<L, E: Entity> {
    log: L,
    cache: StateCache<E::State>,
    locks: KeyLocks,
    hooks: Vec<Arc<dyn CommitHook<E>>>,
    config: CoordinatorConfig,
}

impl<L, E> WriteCoordinator<L, E>
where
    L: EventLog,
    E: Entity,
{
    pub fn new(log: L, config: CoordinatorConfig) -> Self {
        Self::with_cache(log, StateCache::new(), config)
    }

    /// Creates a coordinator writing through to an existing cache.
    pub fn with_cache(log: L, cache: StateCache<E::State>, config: CoordinatorConfig) -> Self {
        Self {
            log,
            cache,
            locks: KeyLocks::new(),
            hooks: Vec::new(),
            config,
        }
    }

    /// Registers a post-commit hook.
    pub fn with_hook(mut self, hook: Arc<dyn CommitHook<E>>) -> Self {
        self.hooks.push(hook);
        self
    }

    pub fn log(&self) -> &L {
        &self.log
    }

    pub fn cache(&self) -> &StateCache<E::State> {
        &self.cache
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Replays the log for `key`.
    async fn load(&self, key: &AggregateKey) -> event_store::Result<(Option<E::State>, Revision)> {
        self.config
            .storage_retry
            .run("current_state", || self.log.current_state(key, None, fold::<E>))
            .await
    }

    /// Replays the log for `key` and brings the cache up to that state.
    async fn refresh(
        &self,
        key: &AggregateKey,
    ) -> event_store::Result<(Option<E::State>, Revision)> {
        let (state, revision) = self.load(key).await?;
        if let Some(state) = &state {
            self.cache.put_if_newer(state.clone()).await;
        }
        Ok((state, revision))
    }

    /// Latest state of `key`, read from the cache and filled from the log on
    /// a miss. `None` if the aggregate has no events.
    pub async fn lookup(&self, key: &AggregateKey) -> event_store::Result<Option<E::State>> {
        if let Some(state) = self.cache.get(key).await {
            return Ok(Some(state));
        }
        let (state, _) = self.refresh(key).await?;
        Ok(state)
    }

    /// Latest state of `key`.
    pub async fn fetch(&self, key: &AggregateKey) -> Result<E::State, FetchError> {
        self.lookup(key)
            .await?
            .ok_or_else(|| FetchError::NotFound { key: key.clone() })
    }

    /// State of `key` as of `revision`, folded from the log.
    pub async fn fetch_at(
        &self,
        key: &AggregateKey,
        revision: Revision,
    ) -> Result<E::State, FetchError> {
        let state = self
            .config
            .storage_retry
            .run("state_at", || {
                self.log.state_at(key, revision, None, fold::<E>)
            })
            .await?;
        state.ok_or_else(|| FetchError::NotFound { key: key.clone() })
    }

    /// Evaluates and commits a command.
    #[tracing::instrument(
        skip(self, command),
        fields(entity = E::ENTITY_TYPE.as_str(), key = %command.key, subject = %command.subject)
    )]
    pub async fn submit(
        &self,
        command: Command<E::Command>,
    ) -> Result<Committed<E::State>, CommandError<E::Rejection>> {
        let started = Instant::now();
        let result = self.commit(&command).await;

        let entity = E::ENTITY_TYPE.as_str();
        let outcome = match &result {
            Ok(_) => "accepted",
            Err(e) if e.is_rejection() => "rejected",
            Err(_) => "failed",
        };
        metrics::counter!("commands_total", "entity" => entity, "outcome" => outcome).increment(1);
        metrics::histogram!("command_duration_seconds", "entity" => entity)
            .record(started.elapsed().as_secs_f64());

        let (state, envelope, event) = match result {
            Ok(committed) => committed,
            Err(e) if e.is_rejection() => {
                tracing::debug!(error = %e, "command rejected");
                return Err(e);
            }
            Err(e) => {
                tracing::error!(error = %e, "command failed");
                return Err(e);
            }
        };
        tracing::debug!(revision = %envelope.revision(), offset = %envelope.offset, "event committed");

        let hooks = run_hooks(
            &self.hooks,
            self.config.hook_timeout,
            &command.key,
            &event,
            &command.subject,
        )
        .await;

        Ok(Committed {
            state,
            envelope,
            hooks,
        })
    }

    /// Evaluates and appends under the key lock, which is released on return.
    async fn commit(
        &self,
        command: &Command<E::Command>,
    ) -> Result<(E::State, Envelope, E::Event), CommandError<E::Rejection>> {
        let key = &command.key;
        let _guard = self.locks.lock(key).await;

        let mut attempts = 0;
        loop {
            attempts += 1;
            let cached = match attempts {
                1 => self.cache.get(key).await,
                _ => None,
            };
            let (mut current, mut revision, from_log) = match cached {
                Some(state) => {
                    let revision = state.revision();
                    (Some(state), revision, false)
                }
                None => {
                    let (state, revision) = self.refresh(key).await?;
                    (state, revision, true)
                }
            };

            // The cache lags behind writers outside this process; only the
            // log can reject an expected revision.
            if let ExpectedRevision::Exact(provided) = command.expected
                && provided != revision
                && !from_log
            {
                (current, revision) = self.refresh(key).await?;
            }

            if let ExpectedRevision::Exact(provided) = command.expected
                && provided != revision
            {
                return Err(CommandError::IncorrectRevision {
                    key: key.clone(),
                    provided,
                    expected: revision,
                });
            }

            let event = E::evaluate(key, current.as_ref(), &command.payload)
                .map_err(CommandError::Rejected)?;

            let record = Event::builder()
                .event_type(event.event_type())
                .key(key.clone())
                .revision(revision.next())
                .subject(command.subject.clone())
                .payload(&event)
                .map_err(EventLogError::from)?
                .build();
            let next = apply::<E>(current, &event, &EventMeta::from(&record), key)?;

            let appended = self
                .config
                .storage_retry
                .run("append", || self.log.append(record.clone(), revision))
                .await;

            match appended {
                Ok(envelope) => {
                    self.cache.put(next.clone()).await;
                    return Ok((next, envelope, event));
                }
                Err(EventLogError::RevisionConflict { actual, .. }) => {
                    metrics::counter!("revision_conflicts_total", "entity" => E::ENTITY_TYPE.as_str())
                        .increment(1);
                    tracing::warn!(
                        attempt = attempts,
                        expected = %revision,
                        actual = %actual,
                        "revision conflict on append"
                    );
                    if attempts > self.config.max_conflict_retries {
                        return Err(CommandError::WriteContention {
                            key: key.clone(),
                            attempts,
                        });
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}
