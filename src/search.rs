use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;

use crate::auth::Token;
use crate::error::{AssistantError, Result};
use crate::models::{
    NormalizedSummary, PageRequest, ResultEntry, SearchPage, SearchResultRecord, SummarySource,
};

#[cfg(test)]
use mockall::automock;

/// Raw access to the case-law search endpoint
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SearchBackend: Send + Sync {
    async fn fetch_page(&self, token: &Token, request: &PageRequest) -> Result<SearchPage>;
}

pub struct JudilibreClient {
    client: Client,
    search_url: String,
}

impl JudilibreClient {
    pub fn new(search_url: String, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AssistantError::Config(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { client, search_url })
    }
}

#[async_trait]
impl SearchBackend for JudilibreClient {
    async fn fetch_page(&self, token: &Token, request: &PageRequest) -> Result<SearchPage> {
        tracing::debug!(
            "Judilibre search query={:?} page={:?} page_size={:?} sort={:?}",
            request.query,
            request.page,
            request.page_size,
            request.sort
        );

        let response = self
            .client
            .get(&self.search_url)
            .bearer_auth(token.as_str())
            .query(request)
            .send()
            .await
            .map_err(|e| AssistantError::Search(format!("Failed to reach Judilibre: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AssistantError::Search(format!("Failed to read Judilibre response: {e}")))?;
        parse_search_response(status, &body)
    }
}

/// Turn a raw search response into a page; any non-2xx status or undecodable body is a search error
fn parse_search_response(status: StatusCode, body: &str) -> Result<SearchPage> {
    if !status.is_success() {
        tracing::error!("Judilibre returned {}", status);
        return Err(AssistantError::Search(format!(
            "Judilibre returned {status}: {body}"
        )));
    }
    serde_json::from_str(body)
        .map_err(|e| AssistantError::Search(format!("Malformed Judilibre response: {e}")))
}

/// Field-priority rule: `summary` first, then the first highlighted excerpt
pub fn resolve_summary(record: &SearchResultRecord) -> Result<SummarySource> {
    if let Some(summary) = record.summary.as_deref() {
        if !summary.trim().is_empty() {
            return Ok(SummarySource::Direct(summary.to_string()));
        }
    }
    let highlighted = record
        .highlights
        .as_ref()
        .and_then(|h| h.text.first())
        .filter(|t| !t.trim().is_empty());
    match highlighted {
        Some(text) => Ok(SummarySource::Highlighted(text.clone())),
        None => Err(AssistantError::MalformedRecord(format!(
            "record {} has neither summary nor highlights.text",
            record
                .id
                .as_deref()
                .or(record.number.as_deref())
                .unwrap_or("<unknown>")
        ))),
    }
}

fn entry_record(entry: &ResultEntry) -> Result<&SearchResultRecord> {
    match entry {
        ResultEntry::Record(record) => Ok(record),
        ResultEntry::Malformed(raw) => Err(AssistantError::MalformedRecord(format!(
            "record {} has fields of unexpected types",
            raw.get("id")
                .and_then(serde_json::Value::as_str)
                .unwrap_or("<unknown>")
        ))),
    }
}

fn summary_text(
    record: &SearchResultRecord,
    source: &SummarySource,
    include_record_number: bool,
) -> String {
    match (include_record_number, record.number.as_deref()) {
        (true, Some(number)) => format!("{number}: {}", source.text()),
        _ => source.text().to_string(),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedPage {
    pub summaries: Vec<NormalizedSummary>,
    pub has_next: bool,
    /// Records dropped because no summary could be resolved
    pub skipped: usize,
}

/// Normalize one page in record order; `result_id` is the record's position in the page
pub fn normalize_page(page: &SearchPage, include_record_number: bool) -> NormalizedPage {
    let mut summaries = Vec::with_capacity(page.results.len());
    let mut skipped = 0;

    for (result_id, entry) in page.results.iter().enumerate() {
        let resolved = entry_record(entry).and_then(|record| {
            let source = resolve_summary(record)?;
            Ok(summary_text(record, &source, include_record_number))
        });
        match resolved {
            Ok(summary) => summaries.push(NormalizedSummary { result_id, summary }),
            Err(e) => {
                tracing::warn!("Skipping search result {}: {}", result_id, e);
                skipped += 1;
            }
        }
    }

    NormalizedPage {
        summaries,
        has_next: page.has_next(),
        skipped,
    }
}

/// Fetch one page and normalize it
pub async fn search_page(
    backend: &dyn SearchBackend,
    token: &Token,
    request: &PageRequest,
    include_record_number: bool,
) -> Result<NormalizedPage> {
    let page = backend.fetch_page(token, request).await?;
    let normalized = normalize_page(&page, include_record_number);
    tracing::debug!(
        "Judilibre page {:?}: {} summaries, {} skipped, has_next={}",
        request.page,
        normalized.summaries.len(),
        normalized.skipped,
        normalized.has_next
    );
    Ok(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Highlights;

    fn record(number: &str, summary: Option<&str>, highlights: Option<Vec<&str>>) -> SearchResultRecord {
        SearchResultRecord {
            id: Some(format!("id-{number}")),
            number: Some(number.to_string()),
            summary: summary.map(str::to_string),
            highlights: highlights.map(|text| Highlights {
                text: text.into_iter().map(str::to_string).collect(),
            }),
        }
    }

    #[test]
    fn test_summary_takes_priority_over_highlights() {
        let r = record("1", Some("Résumé"), Some(vec!["extrait"]));
        assert_eq!(
            resolve_summary(&r).unwrap(),
            SummarySource::Direct("Résumé".to_string())
        );
    }

    #[test]
    fn test_falls_back_to_first_highlight() {
        let r = record("1", None, Some(vec!["premier", "second"]));
        assert_eq!(
            resolve_summary(&r).unwrap(),
            SummarySource::Highlighted("premier".to_string())
        );
    }

    #[test]
    fn test_record_without_text_is_malformed() {
        let r = record("1", None, Some(vec![]));
        assert!(matches!(
            resolve_summary(&r),
            Err(AssistantError::MalformedRecord(_))
        ));
        let r = record("2", Some("  "), None);
        assert!(matches!(
            resolve_summary(&r),
            Err(AssistantError::MalformedRecord(_))
        ));
    }

    #[test]
    fn test_normalize_page_with_and_without_number() {
        let page = SearchPage {
            results: vec![
                record("21-10.001", Some("Bail commercial"), None).into(),
                record("21-10.002", None, Some(vec!["loyers impayés"])).into(),
            ],
            next_page: Some("page=1".to_string()),
            ..Default::default()
        };

        let plain = normalize_page(&page, false);
        assert_eq!(
            plain.summaries,
            vec![
                NormalizedSummary {
                    result_id: 0,
                    summary: "Bail commercial".to_string()
                },
                NormalizedSummary {
                    result_id: 1,
                    summary: "loyers impayés".to_string()
                },
            ]
        );
        assert!(plain.has_next);

        let numbered = normalize_page(&page, true);
        assert_eq!(numbered.summaries[0].summary, "21-10.001: Bail commercial");
        assert_eq!(numbered.summaries[1].summary, "21-10.002: loyers impayés");
    }

    #[test]
    fn test_malformed_record_is_skipped_and_ids_keep_position() {
        let page = SearchPage {
            results: vec![
                record("1", None, None).into(),
                record("2", Some("Deuxième"), None).into(),
            ],
            ..Default::default()
        };
        let normalized = normalize_page(&page, false);
        assert_eq!(normalized.skipped, 1);
        assert_eq!(normalized.summaries.len(), 1);
        assert_eq!(normalized.summaries[0].result_id, 1);
        assert!(!normalized.has_next);
    }

    #[test]
    fn test_wrongly_typed_record_is_skipped() {
        let page: SearchPage = serde_json::from_str(
            r#"{"results":[
                {"id":"a","number":"1","highlights":{"text":"pas une liste"}},
                {"id":"b","number":"2","summary":"Valide"}
            ]}"#,
        )
        .unwrap();
        let normalized = normalize_page(&page, false);
        assert_eq!(normalized.skipped, 1);
        assert_eq!(
            normalized.summaries,
            vec![NormalizedSummary {
                result_id: 1,
                summary: "Valide".to_string()
            }]
        );
    }

    #[test]
    fn test_parse_search_response() {
        let page = parse_search_response(
            StatusCode::OK,
            r#"{"results":[{"id":"a","summary":"Bail"}],"page":0,"next_page":"page=1"}"#,
        )
        .expect("page should parse");
        assert_eq!(page.results.len(), 1);
        assert!(page.has_next());
    }

    #[test]
    fn test_error_status_is_search_error() {
        for status in [StatusCode::UNAUTHORIZED, StatusCode::INTERNAL_SERVER_ERROR] {
            let err = parse_search_response(status, r#"{"results":[]}"#).unwrap_err();
            match err {
                AssistantError::Search(msg) => assert!(msg.contains(status.as_str())),
                other => panic!("expected Search error for {status}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_malformed_body_is_search_error() {
        for body in ["<html>Service indisponible</html>", "", r#"{"page":0}"#] {
            assert!(
                matches!(
                    parse_search_response(StatusCode::OK, body),
                    Err(AssistantError::Search(_))
                ),
                "body {body:?} should be rejected"
            );
        }
    }

    #[tokio::test]
    async fn test_search_page_is_idempotent_on_fixture() {
        let fixture: SearchPage = serde_json::from_str(
            r#"{"results":[
                {"id":"a","number":"1","summary":"Premier"},
                {"id":"b","number":"2","highlights":{"text":["Second"]}}
            ],"page":0,"next_page":null}"#,
        )
        .unwrap();

        let mut backend = MockSearchBackend::new();
        backend
            .expect_fetch_page()
            .times(2)
            .returning(move |_, _| Ok(fixture.clone()));

        let token = Token::new("t");
        let request = PageRequest {
            query: "bail".to_string(),
            page_size: Some(50),
            sort: Some("score".to_string()),
            page: Some(0),
        };
        let first = search_page(&backend, &token, &request, true).await.unwrap();
        let second = search_page(&backend, &token, &request, true).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.summaries[1].summary, "2: Second");
    }

    #[tokio::test]
    async fn test_search_error_propagates() {
        let mut backend = MockSearchBackend::new();
        backend
            .expect_fetch_page()
            .returning(|_, _| Err(AssistantError::Search("Judilibre returned 500".to_string())));

        let request = PageRequest {
            query: "bail".to_string(),
            page_size: None,
            sort: None,
            page: None,
        };
        let result = search_page(&backend, &Token::new("t"), &request, false).await;
        assert!(matches!(result, Err(AssistantError::Search(_))));
    }
}
