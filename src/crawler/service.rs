//! Crawl service - the registry of crawl managers
//!
//! The service maps project names to their managers. Starting a project it has
//! never seen creates a manager; starting a known project reuses the existing
//! one, so one project never has two worker pools.

use crate::config::{Config, CrawlerConfig};
use crate::crawler::fetcher::build_http_client;
use crate::crawler::manager::{CrawlManager, CrawlStatus, StartOutcome};
use crate::project::{CrawlProject, ProjectRequest};
use crate::storage::{open_store, FrontierStore};
use crate::Result;
use reqwest::Client;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Entry point for starting, observing and stopping crawls
pub struct CrawlService {
    settings: CrawlerConfig,
    store: Arc<dyn FrontierStore>,
    client: Client,
    managers: Mutex<HashMap<String, Arc<CrawlManager>>>,
}

impl CrawlService {
    pub fn new(settings: CrawlerConfig, store: Arc<dyn FrontierStore>, client: Client) -> Self {
        Self {
            settings,
            store,
            client,
            managers: Mutex::new(HashMap::new()),
        }
    }

    /// Opens the configured store and builds the HTTP client
    pub fn from_config(config: &Config) -> Result<Self> {
        let store = open_store(&config.storage)?;
        let client = build_http_client(&config.user_agent)?;
        Ok(Self::new(config.crawler.clone(), store, client))
    }

    pub fn store(&self) -> &Arc<dyn FrontierStore> {
        &self.store
    }

    /// Returns the manager for a request's project, creating it on first use
    async fn manager_for(&self, request: &ProjectRequest) -> Result<Arc<CrawlManager>> {
        let project = CrawlProject::new(request)?;
        let mut managers = self.managers.lock().await;

        let manager = managers
            .entry(project.name().to_string())
            .or_insert_with(|| {
                tracing::debug!("[{}] Registering project", project.name());
                Arc::new(CrawlManager::new(
                    project.clone(),
                    &self.settings,
                    Arc::clone(&self.store),
                    self.client.clone(),
                ))
            });

        if manager.project() != &project {
            tracing::warn!(
                "[{}] Project already registered; keeping its original settings",
                project.name()
            );
        }

        Ok(Arc::clone(manager))
    }

    /// Starts crawling a project
    ///
    /// # Errors
    ///
    /// * `CrawlError::Config` - the request is invalid
    /// * `CrawlError::Store` - the frontier store could not be read or seeded
    pub async fn start(&self, request: &ProjectRequest) -> Result<StartOutcome> {
        let manager = self.manager_for(request).await?;
        manager.start().await
    }

    /// Status of one project, or `None` if it was never started
    pub async fn status(&self, project: &str) -> Option<CrawlStatus> {
        let manager = self.managers.lock().await.get(project).cloned();
        manager.map(|m| m.status())
    }

    /// Status of every registered project, ordered by name
    pub async fn statuses(&self) -> Vec<CrawlStatus> {
        let managers: Vec<Arc<CrawlManager>> =
            self.managers.lock().await.values().cloned().collect();
        let mut statuses: Vec<CrawlStatus> = managers.iter().map(|m| m.status()).collect();
        statuses.sort_by(|a, b| a.project.cmp(&b.project));
        statuses
    }

    /// Stops a project's crawl and waits for its workers
    ///
    /// Returns `Ok(None)` if the project was never started.
    pub async fn stop(&self, project: &str) -> Result<Option<CrawlStatus>> {
        let manager = self.managers.lock().await.get(project).cloned();
        match manager {
            Some(manager) => manager.stop().await.map(Some),
            None => Ok(None),
        }
    }

    /// Stops every registered project
    pub async fn stop_all(&self) -> Result<Vec<CrawlStatus>> {
        let managers: Vec<Arc<CrawlManager>> =
            self.managers.lock().await.values().cloned().collect();
        let mut statuses = Vec::with_capacity(managers.len());
        for manager in managers {
            statuses.push(manager.stop().await?);
        }
        statuses.sort_by(|a, b| a.project.cmp(&b.project));
        Ok(statuses)
    }

    /// Waits until every registered project has stopped
    pub async fn wait_all(&self) {
        let managers: Vec<Arc<CrawlManager>> =
            self.managers.lock().await.values().cloned().collect();
        for manager in managers {
            manager.wait_until_stopped().await;
        }
    }
}
