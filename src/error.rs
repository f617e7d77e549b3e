use thiserror::Error;

/// Errors raised along the question -> search -> answer pipeline
#[derive(Error, Debug)]
pub enum AssistantError {
    #[error("Token exchange failed: {0}")]
    Auth(String),

    #[error("Query extraction failed: {0}")]
    Extraction(String),

    #[error("Search request failed: {0}")]
    Search(String),

    #[error("Malformed search record: {0}")]
    MalformedRecord(String),

    #[error("Answer synthesis failed: {0}")]
    Synthesis(String),

    #[error("OpenAI API key is not configured")]
    MissingApiKey,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AssistantError {
    /// Text shown to the user when a turn is aborted
    pub fn user_message(&self) -> String {
        match self {
            Self::Auth(_) => {
                "Impossible de s'authentifier auprès de Judilibre. Vérifiez les identifiants PISTE."
                    .to_string()
            }
            Self::Extraction(_) => {
                "Je n'ai pas pu extraire de mots-clés de votre question. Merci de la reformuler."
                    .to_string()
            }
            Self::Search(_) | Self::MalformedRecord(_) => {
                "La recherche Judilibre a échoué. Merci de réessayer.".to_string()
            }
            Self::Synthesis(_) => {
                "La génération de la réponse a été interrompue.".to_string()
            }
            Self::MissingApiKey => "Please add your OpenAI API key to continue.".to_string(),
            other => format!("Erreur interne : {other}"),
        }
    }
}

pub type Result<T> = std::result::Result<T, AssistantError>;
