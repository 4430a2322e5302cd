use std::sync::Arc;

use sqlx::PgPool;

use crate::core::config::Settings;
use crate::services::grader::GraderClient;
use crate::services::notifier::Notifier;

#[derive(Clone)]
pub(crate) struct AppState {
    inner: Arc<InnerState>,
}

struct InnerState {
    settings: Settings,
    db: PgPool,
    grader: GraderClient,
    notifier: Notifier,
}

impl AppState {
    pub(crate) fn new(
        settings: Settings,
        db: PgPool,
        grader: GraderClient,
        notifier: Notifier,
    ) -> Self {
        Self { inner: Arc::new(InnerState { settings, db, grader, notifier }) }
    }

    pub(crate) fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    pub(crate) fn db(&self) -> &PgPool {
        &self.inner.db
    }

    pub(crate) fn grader(&self) -> &GraderClient {
        &self.inner.grader
    }

    pub(crate) fn notifier(&self) -> &Notifier {
        &self.inner.notifier
    }
}
