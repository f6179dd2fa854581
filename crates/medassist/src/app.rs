//! Session-wide state behind the terminal front-end.

use std::path::Path;

use thiserror::Error;
use tracing::info;

use crate::config::Config;
use crate::consult::ConsultSession;
use crate::credentials::{CredentialError, CredentialStore, Credentials};
use crate::llm::{Attachment, LLMError, ProviderKind};
use crate::report::{ReportError, ReportSession};
use crate::router::{RouteError, Router};
use crate::store::{StorageError, TrendStore};

/// Everything one interactive session owns.
pub struct App {
    credentials: CredentialStore,
    trend: TrendStore,
    router: Router,
    provider: Option<ProviderKind>,
    consult: ConsultSession,
    report: ReportSession,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Credentials(#[from] CredentialError),

    #[error("failed to build http client: {0}")]
    Client(#[from] LLMError),
}

impl App {
    /// Load credentials and the trend from the configured paths.
    pub async fn load(config: Config) -> Result<Self, AppError> {
        let credentials = CredentialStore::load(&config.storage.credentials_path).await?;
        let trend = TrendStore::load(&config.storage.trend_path).await;
        let router = Router::new(config.providers, credentials.credentials())?;
        Ok(Self::from_parts(credentials, trend, router))
    }

    pub(crate) fn from_parts(credentials: CredentialStore, trend: TrendStore, router: Router) -> Self {
        let provider = credentials.credentials().default_provider();
        Self {
            credentials,
            trend,
            router,
            provider,
            consult: ConsultSession::new(),
            report: ReportSession::new(),
        }
    }

    pub fn provider(&self) -> Option<ProviderKind> {
        self.provider
    }

    pub fn credentials(&self) -> &Credentials {
        self.credentials.credentials()
    }

    pub fn credentials_path(&self) -> &Path {
        self.credentials.path()
    }

    pub fn trend(&self) -> &[u32] {
        self.trend.values()
    }

    pub fn consult_session(&self) -> &ConsultSession {
        &self.consult
    }

    pub fn report_session(&self) -> &ReportSession {
        &self.report
    }

    /// Switch provider and remember the choice.
    pub async fn select_provider(&mut self, provider: ProviderKind) -> Result<(), CredentialError> {
        self.credentials.set_selected(provider).await?;
        self.provider = Some(provider);
        info!(provider = %provider, "Selected provider");
        Ok(())
    }

    /// Save a key and make the provider usable immediately.
    pub async fn set_api_key(
        &mut self,
        provider: ProviderKind,
        key: &str,
    ) -> Result<(), CredentialError> {
        self.credentials.set_api_key(provider, key).await?;
        self.router.reload(self.credentials.credentials());
        Ok(())
    }

    /// Forget every saved key and the provider preference.
    pub async fn reset_keys(&mut self) -> Result<(), CredentialError> {
        self.credentials.reset().await?;
        self.router.reload(self.credentials.credentials());
        self.provider = None;
        Ok(())
    }

    /// Delete the trend file and the consult history.
    pub async fn clear_data(&mut self) -> Result<(), StorageError> {
        self.trend.clear().await?;
        self.consult.new_chat();
        info!("Cleared health data and chat history");
        Ok(())
    }

    pub fn new_chat(&mut self) {
        self.consult.new_chat();
    }

    pub async fn consult(
        &mut self,
        text: &str,
        attachment: Option<&Attachment>,
    ) -> Result<String, RouteError> {
        let provider = self.provider.ok_or(RouteError::NoProvider)?;
        self.consult
            .send(&self.router, provider, &mut self.trend, text, attachment)
            .await
    }

    pub async fn retry_consult(
        &mut self,
        attachment: Option<&Attachment>,
    ) -> Result<String, RouteError> {
        let provider = self.provider.ok_or(RouteError::NoProvider)?;
        self.consult.retry(&self.router, provider, attachment).await
    }

    /// Bind the report session to `report_id` and explain it if it has no
    /// explanation yet. Returns `None` when the report was already explained.
    pub async fn explain_report(
        &mut self,
        report_id: &str,
        report_text: &str,
    ) -> Result<Option<String>, ReportError> {
        self.report.load(report_id);
        if self.report.is_explained() {
            return Ok(None);
        }
        let provider = self.provider.ok_or(RouteError::NoProvider)?;
        let explanation = self.report.explain(&self.router, provider, report_text).await?;
        Ok(Some(explanation))
    }

    pub async fn ask_report(&mut self, question: &str) -> Result<String, ReportError> {
        let provider = self.provider.ok_or(RouteError::NoProvider)?;
        self.report.ask(&self.router, provider, question).await
    }

    pub async fn retry_report(&mut self) -> Result<String, ReportError> {
        let provider = self.provider.ok_or(RouteError::NoProvider)?;
        self.report.retry(&self.router, provider).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProvidersConfig;
    use crate::testing::{ScriptedProvider, router_with};
    use tempfile::TempDir;

    async fn app_in(dir: &TempDir, env: &'static [(&'static str, &'static str)]) -> App {
        let credentials = CredentialStore::load_with(dir.path().join(".env"), |key| {
            env.iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string())
        })
        .await
        .unwrap();
        let trend = TrendStore::load(dir.path().join("health_data.json")).await;
        let router = Router::new(ProvidersConfig::default(), credentials.credentials()).unwrap();
        App::from_parts(credentials, trend, router)
    }

    #[tokio::test]
    async fn default_provider_comes_from_credentials() {
        let dir = TempDir::new().unwrap();
        let app = app_in(&dir, &[("GEMINI_API_KEY", "g")]).await;
        assert_eq!(app.provider(), Some(ProviderKind::Gemini));

        let dir = TempDir::new().unwrap();
        let app = app_in(&dir, &[]).await;
        assert_eq!(app.provider(), None);
    }

    #[tokio::test]
    async fn consult_without_provider_is_refused() {
        let dir = TempDir::new().unwrap();
        let mut app = app_in(&dir, &[]).await;

        let err = app.consult("fever", None).await.unwrap_err();
        assert_eq!(err, RouteError::NoProvider);
        assert!(app.consult_session().conversation().is_empty());
    }

    #[tokio::test]
    async fn consult_with_provider_but_no_key_names_the_key() {
        let dir = TempDir::new().unwrap();
        let mut app = app_in(&dir, &[]).await;
        app.select_provider(ProviderKind::OpenAI).await.unwrap();

        let err = app.consult("fever", None).await.unwrap_err();
        assert!(err.to_string().contains("OPENAI_API_KEY"));
    }

    #[tokio::test]
    async fn select_provider_is_persisted() {
        let dir = TempDir::new().unwrap();
        let mut app = app_in(&dir, &[]).await;
        app.select_provider(ProviderKind::Gemini).await.unwrap();

        let reloaded = app_in(&dir, &[]).await;
        assert_eq!(reloaded.provider(), Some(ProviderKind::Gemini));
    }

    #[tokio::test]
    async fn set_api_key_registers_provider() {
        let dir = TempDir::new().unwrap();
        let mut app = app_in(&dir, &[]).await;
        assert!(!app.router.is_available(ProviderKind::OpenAI));

        app.set_api_key(ProviderKind::OpenAI, "sk-test").await.unwrap();

        assert!(app.router.is_available(ProviderKind::OpenAI));
        assert!(app.credentials().has_key(ProviderKind::OpenAI));
    }

    #[tokio::test]
    async fn reset_keys_unregisters_providers() {
        let dir = TempDir::new().unwrap();
        let mut app = app_in(&dir, &[]).await;
        app.set_api_key(ProviderKind::Gemini, "g").await.unwrap();
        app.select_provider(ProviderKind::Gemini).await.unwrap();

        app.reset_keys().await.unwrap();

        assert!(!app.router.is_available(ProviderKind::Gemini));
        assert_eq!(app.provider(), None);
        assert_eq!(app.credentials(), &Credentials::default());
    }

    #[tokio::test]
    async fn clear_data_empties_trend_and_chat() {
        let dir = TempDir::new().unwrap();
        let credentials = CredentialStore::load_with(dir.path().join(".env"), |_| None)
            .await
            .unwrap();
        let trend = TrendStore::load(dir.path().join("health_data.json")).await;
        let provider = ScriptedProvider::new(vec![Ok("Rest.".to_string())]);
        let router = router_with(ProviderKind::OpenAI, provider);
        let mut app = App::from_parts(credentials, trend, router);
        app.select_provider(ProviderKind::OpenAI).await.unwrap();

        app.consult("cough and fever", None).await.unwrap();
        assert_eq!(app.trend(), &[2]);
        assert!(dir.path().join("health_data.json").exists());

        app.clear_data().await.unwrap();

        assert!(app.trend().is_empty());
        assert!(app.consult_session().conversation().is_empty());
        assert!(!dir.path().join("health_data.json").exists());
    }

    #[tokio::test]
    async fn explain_report_only_once_per_report() {
        let dir = TempDir::new().unwrap();
        let credentials = CredentialStore::load_with(dir.path().join(".env"), |_| None)
            .await
            .unwrap();
        let trend = TrendStore::load(dir.path().join("health_data.json")).await;
        let provider = ScriptedProvider::new(vec![
            Ok("First.".to_string()),
            Ok("Second.".to_string()),
        ]);
        let router = router_with(ProviderKind::Gemini, provider.clone());
        let mut app = App::from_parts(credentials, trend, router);
        app.select_provider(ProviderKind::Gemini).await.unwrap();

        let first = app.explain_report("a.pdf", "WBC 11").await.unwrap();
        let again = app.explain_report("a.pdf", "WBC 11").await.unwrap();
        let other = app.explain_report("b.pdf", "RBC 4").await.unwrap();

        assert_eq!(first.as_deref(), Some("First."));
        assert_eq!(again, None);
        assert_eq!(other.as_deref(), Some("Second."));
        assert_eq!(provider.calls().len(), 2);
        // Report turns do not feed the trend.
        assert!(app.trend().is_empty());
    }
}
