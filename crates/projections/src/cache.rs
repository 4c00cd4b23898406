//! Rebuilds an entity's state cache from the log.

use std::marker::PhantomData;

use async_trait::async_trait;
use domain::{Entity, EntityState, StateCache, fold};
use event_store::{Envelope, Revision};
use tokio::sync::RwLock;

use crate::projection::{Projection, ProjectionPosition};
use crate::{ProjectionError, Result};

/// Folds the envelopes of entity `E` into its [`StateCache`].
///
/// Cache writes are monotone by revision: an envelope at or below the cached
/// revision is skipped, so a rebuild running next to the write coordinator
/// never replaces a newer state.
pub struct CacheProjection<E: Entity> {
    cache: StateCache<E::State>,
    position: RwLock<ProjectionPosition>,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> CacheProjection<E> {
    pub fn new(cache: StateCache<E::State>) -> Self {
        Self {
            cache,
            position: RwLock::new(ProjectionPosition::zero()),
            _entity: PhantomData,
        }
    }

    async fn apply(&self, envelope: &Envelope) -> Result<()> {
        let key = envelope.key();
        let revision = envelope.revision();
        let cached = self.cache.get(key).await;
        let current = cached.as_ref().map_or(Revision::initial(), |s| s.revision());

        if current >= revision {
            return Ok(());
        }
        if current.next() != revision {
            return Err(ProjectionError::RevisionGap {
                key: key.clone(),
                current,
                revision,
            });
        }

        if let Some(state) = fold::<E>(cached, &envelope.event)? {
            self.cache.put_if_newer(state).await;
        }
        Ok(())
    }
}

#[async_trait]
impl<E: Entity> Projection for CacheProjection<E> {
    fn name(&self) -> &'static str {
        E::ENTITY_TYPE.as_str()
    }

    async fn handle(&self, envelope: &Envelope) -> Result<()> {
        if envelope.key().entity_type() == E::ENTITY_TYPE {
            self.apply(envelope).await?;
        }
        let mut position = self.position.write().await;
        *position = position.advance(envelope.offset);
        Ok(())
    }

    async fn position(&self) -> ProjectionPosition {
        *self.position.read().await
    }

    async fn reset(&self) -> Result<()> {
        self.cache.clear().await;
        *self.position.write().await = ProjectionPosition::zero();
        Ok(())
    }
}
