use std::sync::Arc;

use crate::config::Settings;
use crate::database::{DbPool, PgChunkStore, PgVectorIndex};
use crate::logging::ActivityLogger;
use crate::services::embedding::{Embedder, HttpEmbedder};
use crate::services::object_store::{FsObjectStore, ObjectStore};
use crate::services::{
    AdmissionController, Evaluator, EventBus, IngestOrchestrator, QueryOrchestrator,
};
use crate::services::chunk_store::ChunkStore;
use crate::services::session_store::{NullSessionStore, RedisSessionStore, SessionStore};
use crate::services::vector_index::VectorIndex;
use crate::utils::limiters::Limiters;

/// The composition root: every collaborator is constructed once at startup
/// and threaded explicitly into the orchestrators and handlers, replacing
/// the teacher's module-level service singletons per §9's redesign note.
#[derive(Clone)]
pub struct AppState {
    pub settings: Settings,
    pub db_pool: DbPool,
    pub embedder: Arc<dyn Embedder>,
    pub object_store: Arc<dyn ObjectStore>,
    pub chunk_store: Arc<dyn ChunkStore>,
    pub vector_index: Arc<dyn VectorIndex>,
    pub session_store: Arc<dyn SessionStore>,
    pub admission: Arc<AdmissionController>,
    pub ingest_orchestrator: Arc<IngestOrchestrator>,
    pub query_orchestrator: Arc<QueryOrchestrator>,
    pub evaluator: Arc<Evaluator>,
    pub event_bus: Arc<EventBus>,
    pub activity_logger: Arc<ActivityLogger>,
    pub limiters: Arc<Limiters>,
}

const EVENT_BUS_CAPACITY: usize = 1024;
const OBJECT_STORE_ROOT: &str = "data/objects";

impl AppState {
    pub async fn build(settings: Settings) -> anyhow::Result<Self> {
        let limiters = Arc::new(Limiters::new(&settings.limits));

        let db_pool = DbPool::new(&settings.database).await?;

        let embedder: Arc<dyn Embedder> = Arc::new(HttpEmbedder::new(settings.embedding.clone(), limiters.clone()));
        let object_store: Arc<dyn ObjectStore> = Arc::new(FsObjectStore::new(OBJECT_STORE_ROOT));
        let chunk_store: Arc<dyn ChunkStore> = Arc::new(crate::database::PgChunkStore::new(db_pool.clone()));
        let vector_index: Arc<dyn VectorIndex> = Arc::new(PgVectorIndex::new(db_pool.clone()));

        let session_store: Arc<dyn SessionStore> =
            match RedisSessionStore::new(&settings.session, &settings.redis.url, settings.redis.pool_max_size) {
                Ok(store) => Arc::new(store),
                Err(e) => {
                    tracing::warn!(error = %e, "session store unavailable at startup, degrading to no-op store");
                    Arc::new(NullSessionStore)
                }
            };

        let admission = Arc::new(AdmissionController::new(&settings.admission));

        let ingest_orchestrator = Arc::new(IngestOrchestrator::new(
            embedder.clone(),
            chunk_store.clone(),
            object_store.clone(),
            vector_index.clone(),
            settings.chunking.clone(),
            &settings.deadlines,
            limiters.clone(),
        ));

        let query_orchestrator = Arc::new(QueryOrchestrator::new(
            embedder.clone(),
            vector_index.clone(),
            chunk_store.clone(),
            session_store.clone(),
            &settings.retrieval,
            settings.generator.clone(),
            &settings.deadlines,
            &settings.session,
        ));

        let evaluator = Arc::new(Evaluator::new(embedder.clone()));
        let event_bus = Arc::new(EventBus::new(EVENT_BUS_CAPACITY));
        let activity_logger = Arc::new(ActivityLogger::new(Default::default()));

        Ok(Self {
            settings,
            db_pool,
            embedder,
            object_store,
            chunk_store,
            vector_index,
            session_store,
            admission,
            ingest_orchestrator,
            query_orchestrator,
            evaluator,
            event_bus,
            activity_logger,
            limiters,
        })
    }
}
