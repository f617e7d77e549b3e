pub mod auth;
pub mod config;
pub mod error;
pub mod extractor;
pub mod models;
pub mod pagination;
pub mod search;
pub mod session;
pub mod synth;
pub mod transport;

#[cfg(test)]
mod test_support;

use std::sync::Arc;

use crate::auth::{PisteTokenProvider, TokenProvider};
use crate::config::Config;
use crate::error::Result;
use crate::extractor::{QueryExtractor, ToolCallExtractor};
use crate::pagination::PaginationDriver;
use crate::search::{JudilibreClient, SearchBackend};
use crate::session::Session;
use crate::synth::{AnswerStream, AnswerSynthesizer};
use crate::transport::{OpenAiTransport, Transport};

/// Question -> keywords -> Judilibre search -> streamed grounded answer
pub struct LegalAssistant {
    tokens: Arc<dyn TokenProvider>,
    extractor: Arc<dyn QueryExtractor>,
    search: Arc<dyn SearchBackend>,
    driver: PaginationDriver,
    synth: AnswerSynthesizer,
}

impl LegalAssistant {
    /// Wire the production components; fails with `MissingApiKey` when no model key is set
    pub fn new(cfg: &Config) -> Result<Self> {
        let api_key = cfg.openai_api_key()?;
        let transport: Arc<dyn Transport> =
            Arc::new(OpenAiTransport::new(api_key, cfg.openai.base_url.as_deref()));

        let tokens = Arc::new(PisteTokenProvider::new(
            cfg.judilibre.auth_url.clone(),
            cfg.judilibre.client_id.clone(),
            cfg.judilibre.client_secret.clone(),
            cfg.judilibre_timeout(),
        )?);
        let extractor = Arc::new(ToolCallExtractor::new(
            Arc::clone(&transport),
            cfg.openai.model.clone(),
            cfg.extraction.temperature,
            cfg.extraction_timeout(),
        ));
        let search = Arc::new(JudilibreClient::new(
            cfg.judilibre.search_url.clone(),
            cfg.judilibre_timeout(),
        )?);
        let driver = PaginationDriver::new(
            cfg.search.pagination.clone(),
            cfg.search.include_record_number,
        );
        let synth = AnswerSynthesizer::new(
            Arc::clone(&transport),
            cfg.openai.model.clone(),
            cfg.synthesis.mode,
            cfg.synthesis.temperature,
            cfg.synthesis_timeout(),
        );

        Ok(Self::with_components(tokens, extractor, search, driver, synth))
    }

    pub fn with_components(
        tokens: Arc<dyn TokenProvider>,
        extractor: Arc<dyn QueryExtractor>,
        search: Arc<dyn SearchBackend>,
        driver: PaginationDriver,
        synth: AnswerSynthesizer,
    ) -> Self {
        Self {
            tokens,
            extractor,
            search,
            driver,
            synth,
        }
    }

    /// Run one turn up to the start of the streamed answer
    ///
    /// The user turn is recorded immediately. A fresh bearer token is acquired for every turn
    /// and dropped once its searches are done. The caller consumes the returned stream and
    /// then hands it to `Session::commit_answer`.
    pub async fn ask(&self, session: &mut Session, question: &str) -> Result<AnswerStream> {
        session.push_user(question);

        let token = self.tokens.fetch_token().await?;
        let extracted = self.extractor.extract(question).await?;
        let summaries = self
            .driver
            .collect(self.search.as_ref(), &token, &extracted.query)
            .await?;
        self.synth.stream(question, &summaries).await
    }
}
