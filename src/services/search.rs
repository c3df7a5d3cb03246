use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use scraper::{ElementRef, Html, Selector};
use serde::Serialize;
use thiserror::Error;

use crate::{
    configuration::EnrichmentSettings,
    domain::web_link::{first_external_link, resolve_result_href},
};

#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub url: String,
    pub title: String,
    pub snippet: String,
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("{engine} blocked the query with a captcha")]
    Blocked { engine: &'static str },
    #[error("{engine} request failed: {source}")]
    Http {
        engine: &'static str,
        source: reqwest::Error,
    },
    #[error("{engine} answered with status {status}")]
    Status {
        engine: &'static str,
        status: StatusCode,
    },
}

#[async_trait]
pub trait WebSearchProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, SearchError>;
}

pub enum ResultPage {
    Hits(Vec<SearchHit>),
    NotFound,
    CaptchaBlocked,
}

#[derive(Serialize)]
struct SearchQuery<'a> {
    q: &'a str,
}

async fn fetch_page(
    client: &Client,
    engine: &'static str,
    url: &str,
    query: &str,
) -> Result<String, SearchError> {
    let res = client
        .get(url)
        .query(&SearchQuery { q: query })
        .send()
        .await
        .map_err(|source| SearchError::Http { engine, source })?;

    let status = res.status();
    if status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::FORBIDDEN {
        return Err(SearchError::Blocked { engine });
    }
    if !status.is_success() {
        return Err(SearchError::Status { engine, status });
    }

    res.text()
        .await
        .map_err(|source| SearchError::Http { engine, source })
}

fn into_hits(
    engine: &'static str,
    page: ResultPage,
    query: &str,
) -> Result<Vec<SearchHit>, SearchError> {
    match page {
        ResultPage::Hits(hits) => {
            log::info!("{} returned {} hits for query: {}", engine, hits.len(), query);
            Ok(hits)
        }
        ResultPage::NotFound => {
            log::info!("{} found no results on query: {}", engine, query);
            Ok(vec![])
        }
        ResultPage::CaptchaBlocked => {
            log::error!("{} blocked by captcha on query: {}", engine, query);
            Err(SearchError::Blocked { engine })
        }
    }
}

fn element_text(element: ElementRef) -> String {
    element
        .text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<&str>>()
        .join(" ")
}

pub fn build_search_client(user_agent: &str, timeout: Duration) -> anyhow::Result<Client> {
    let client = Client::builder()
        .user_agent(user_agent)
        .cookie_store(true)
        .timeout(timeout)
        .build()?;
    Ok(client)
}

pub struct DuckDuckGo {
    client: Client,
}

impl DuckDuckGo {
    const URL: &'static str = "https://html.duckduckgo.com/html/";

    pub fn new(client: Client) -> Self {
        DuckDuckGo { client }
    }

    pub fn parse(html_content: &str) -> ResultPage {
        let result_selector = Selector::parse("div.result").unwrap();
        let link_selector = Selector::parse("a.result__a").unwrap();
        let snippet_selector = Selector::parse(".result__snippet").unwrap();

        if html_content.contains("anomaly-modal") || html_content.contains("bots use DuckDuckGo")
        {
            return ResultPage::CaptchaBlocked;
        }

        let document = Html::parse_document(html_content);
        let hits: Vec<SearchHit> = document
            .select(&result_selector)
            .filter_map(|result| {
                let link = result.select(&link_selector).next()?;
                let url = resolve_result_href(link.value().attr("href")?)?;
                Some(SearchHit {
                    url: url.to_string(),
                    title: element_text(link),
                    snippet: result
                        .select(&snippet_selector)
                        .next()
                        .map(element_text)
                        .unwrap_or_default(),
                })
            })
            .collect();

        match hits.is_empty() {
            true => ResultPage::NotFound,
            false => ResultPage::Hits(hits),
        }
    }
}

#[async_trait]
impl WebSearchProvider for DuckDuckGo {
    fn name(&self) -> &'static str {
        "duckduckgo"
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, SearchError> {
        let html_content = fetch_page(&self.client, self.name(), Self::URL, query).await?;
        into_hits(self.name(), Self::parse(&html_content), query)
    }
}

pub struct Bing {
    client: Client,
}

impl Bing {
    const URL: &'static str = "https://www.bing.com/search";

    pub fn new(client: Client) -> Self {
        Bing { client }
    }

    pub fn parse(html_content: &str) -> ResultPage {
        let result_selector = Selector::parse("li.b_algo").unwrap();
        let link_selector = Selector::parse("h2 a").unwrap();
        let snippet_selector = Selector::parse(".b_caption p, p").unwrap();

        let document = Html::parse_document(html_content);
        let hits: Vec<SearchHit> = document
            .select(&result_selector)
            .filter_map(|result| {
                let link = result.select(&link_selector).next()?;
                let url = resolve_result_href(link.value().attr("href")?)?;
                Some(SearchHit {
                    url: url.to_string(),
                    title: element_text(link),
                    snippet: result
                        .select(&snippet_selector)
                        .next()
                        .map(element_text)
                        .unwrap_or_default(),
                })
            })
            .collect();

        match hits.is_empty() {
            false => ResultPage::Hits(hits),
            true if html_content.to_lowercase().contains("captcha") => ResultPage::CaptchaBlocked,
            true => ResultPage::NotFound,
        }
    }
}

#[async_trait]
impl WebSearchProvider for Bing {
    fn name(&self) -> &'static str {
        "bing"
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, SearchError> {
        let html_content = fetch_page(&self.client, self.name(), Self::URL, query).await?;
        into_hits(self.name(), Self::parse(&html_content), query)
    }
}

pub struct Google {
    client: Client,
}

impl Google {
    const URL: &'static str = "https://www.google.com/search";

    pub fn new(client: Client) -> Self {
        Google { client }
    }

    pub fn parse(html_content: &str) -> ResultPage {
        let a_tag_selector = Selector::parse("a[href]").unwrap();
        let h3_selector = Selector::parse("h3").unwrap();

        let document = Html::parse_document(html_content);
        if document.select(&h3_selector).next().is_none() {
            return match html_content.contains("did not match any documents") {
                true => ResultPage::NotFound,
                false => ResultPage::CaptchaBlocked,
            };
        }

        let hits: Vec<SearchHit> = document
            .select(&a_tag_selector)
            .filter_map(|tag| {
                let heading = tag.select(&h3_selector).next()?;
                let url = resolve_result_href(tag.value().attr("href")?)?;
                let snippet = tag
                    .parent()
                    .and_then(|parent| parent.parent())
                    .and_then(ElementRef::wrap)
                    .map(element_text)
                    .unwrap_or_default();
                Some(SearchHit {
                    url: url.to_string(),
                    title: element_text(heading),
                    snippet,
                })
            })
            .collect();

        match hits.is_empty() {
            true => ResultPage::NotFound,
            false => ResultPage::Hits(hits),
        }
    }
}

#[async_trait]
impl WebSearchProvider for Google {
    fn name(&self) -> &'static str {
        "google"
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, SearchError> {
        let html_content = fetch_page(&self.client, self.name(), Self::URL, query).await?;
        into_hits(self.name(), Self::parse(&html_content), query)
    }
}

pub struct SearchChain {
    providers: Vec<Box<dyn WebSearchProvider>>,
    excluded_domains: Vec<String>,
}

impl SearchChain {
    pub fn new(providers: Vec<Box<dyn WebSearchProvider>>, excluded_domains: Vec<String>) -> Self {
        SearchChain {
            providers,
            excluded_domains,
        }
    }

    pub fn from_settings(settings: &EnrichmentSettings, user_agent: &str) -> anyhow::Result<Self> {
        let client = build_search_client(user_agent, settings.search_timeout())?;

        let providers: Vec<Box<dyn WebSearchProvider>> = settings
            .search_engines
            .iter()
            .filter_map(|name| -> Option<Box<dyn WebSearchProvider>> {
                match name.to_lowercase().as_str() {
                    "duckduckgo" => Some(Box::new(DuckDuckGo::new(client.clone()))),
                    "bing" => Some(Box::new(Bing::new(client.clone()))),
                    "google" => Some(Box::new(Google::new(client.clone()))),
                    other => {
                        log::warn!("Unknown search engine in configuration: {}", other);
                        None
                    }
                }
            })
            .collect();

        if providers.is_empty() {
            anyhow::bail!("No usable search engine configured");
        }

        Ok(SearchChain::new(providers, settings.excluded_domains.clone()))
    }

    async fn first_usable<T, F>(&self, query: &str, pick: F) -> Option<T>
    where
        F: Fn(Vec<SearchHit>) -> Option<T> + Send + Sync,
        T: Send,
    {
        for provider in self.providers.iter() {
            match provider.search(query).await {
                Ok(hits) => match pick(hits) {
                    Some(found) => return Some(found),
                    None => log::info!("{} had nothing usable for: {}", provider.name(), query),
                },
                Err(e) => log::warn!("Falling back from {}: {}", provider.name(), e),
            }
        }

        log::warn!("All search engines exhausted for query: {}", query);
        None
    }

    pub async fn first_external_link(&self, query: &str) -> Option<String> {
        self.first_usable(query, |hits| {
            first_external_link(hits.iter().map(|hit| hit.url.as_str()), &self.excluded_domains)
        })
        .await
    }

    pub async fn first_hit_where<F>(&self, query: &str, accept: F) -> Option<SearchHit>
    where
        F: Fn(&SearchHit) -> bool + Send + Sync,
    {
        self.first_usable(query, |hits| hits.into_iter().find(|hit| accept(hit)))
            .await
    }
}
