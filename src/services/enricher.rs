use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use url::Url;

use crate::{
    configuration::{EnrichmentSettings, WebDriverSettings},
    domain::{
        decision_maker::{build_profile_search_query, extract_person_name, extract_role},
        email::{best_email_in_page, find_contact_link},
        lead::EnrichmentResult,
        web_link::{host_without_www, usable_known_website},
    },
};

use super::{Droid, LoadedPage, SearchChain, SearchHit};

#[async_trait]
pub trait Enricher: Send + Sync {
    async fn start_session(&self) -> anyhow::Result<Box<dyn EnricherSession>>;
}

#[async_trait]
pub trait EnricherSession: Send {
    async fn enrich(
        &mut self,
        company_name: &str,
        known_website: &str,
    ) -> anyhow::Result<EnrichmentResult>;

    async fn stop_session(self: Box<Self>);
}

#[async_trait]
pub trait PageLoader: Send + Sync {
    async fn load(&self, url: &str) -> anyhow::Result<LoadedPage>;

    async fn close(self: Box<Self>);
}

pub struct BrowserPageLoader {
    droid: Droid,
    page_load_timeout: Duration,
    settle: Duration,
}

#[async_trait]
impl PageLoader for BrowserPageLoader {
    async fn load(&self, url: &str) -> anyhow::Result<LoadedPage> {
        self.droid
            .open(url, self.page_load_timeout, self.settle)
            .await
    }

    async fn close(self: Box<Self>) {
        self.droid.quit().await;
    }
}

pub struct EnrichmentEngine {
    search: Arc<SearchChain>,
    settings: EnrichmentSettings,
    webdriver: WebDriverSettings,
}

impl EnrichmentEngine {
    pub fn new(
        search: Arc<SearchChain>,
        settings: EnrichmentSettings,
        webdriver: WebDriverSettings,
    ) -> Self {
        EnrichmentEngine {
            search,
            settings,
            webdriver,
        }
    }
}

#[async_trait]
impl Enricher for EnrichmentEngine {
    async fn start_session(&self) -> anyhow::Result<Box<dyn EnricherSession>> {
        let droid = Droid::launch(&self.webdriver).await?;
        let loader = BrowserPageLoader {
            droid,
            page_load_timeout: self.settings.page_load_timeout(),
            settle: self.settings.settle(),
        };

        Ok(Box::new(EnrichmentSession::new(
            self.search.clone(),
            self.settings.clone(),
            Box::new(loader),
        )))
    }
}

pub struct EnrichmentSession {
    search: Arc<SearchChain>,
    settings: EnrichmentSettings,
    loader: Box<dyn PageLoader>,
}

impl EnrichmentSession {
    pub fn new(
        search: Arc<SearchChain>,
        settings: EnrichmentSettings,
        loader: Box<dyn PageLoader>,
    ) -> Self {
        EnrichmentSession {
            search,
            settings,
            loader,
        }
    }

    fn build_site_search_query(&self, company_name: &str) -> String {
        format!(
            "{} {} official website facebook",
            company_name.trim(),
            self.settings.search_region
        )
    }

    async fn resolve_target(&self, company_name: &str, known_website: &str) -> Option<String> {
        if let Some(website) = usable_known_website(known_website) {
            return Some(website);
        }

        let query = self.build_site_search_query(company_name);
        log::info!("Searching the web for the site of: {}", company_name);
        self.search.first_external_link(&query).await
    }

    async fn load(&self, url: &str) -> Option<LoadedPage> {
        match self.loader.load(url).await {
            Ok(page) => Some(page),
            Err(e) => {
                log::warn!("Could not load {}: {:?}", url, e);
                None
            }
        }
    }

    async fn deep_scan(&self, target: &str) -> Option<String> {
        log::info!("Deep scan: visiting {}", target);
        let page = self.load(target).await?;

        if let Some(email) = best_email_in_page(&page.source) {
            log::info!("Email found on {}: {}", target, email);
            return Some(email);
        }

        let contact_url = find_contact_link(&page.source, &page.url)?;
        log::info!("Following contact page {}", contact_url);
        let contact_page = self.load(&contact_url).await?;

        let email = best_email_in_page(&contact_page.source);
        if let Some(ref email) = email {
            log::info!("Email found on contact page {}: {}", contact_url, email);
        }
        email
    }

    async fn find_decision_maker(&self, company_name: &str) -> Option<SearchHit> {
        let query = build_profile_search_query(company_name.trim());
        self.search.first_hit_where(&query, is_profile_hit).await
    }
}

fn is_profile_hit(hit: &SearchHit) -> bool {
    let on_linkedin = Url::parse(&hit.url)
        .ok()
        .and_then(|url| host_without_www(&url))
        .is_some_and(|host| host == "linkedin.com" || host.ends_with(".linkedin.com"));

    on_linkedin && extract_person_name(&hit.title).is_some()
}

#[async_trait]
impl EnricherSession for EnrichmentSession {
    async fn enrich(
        &mut self,
        company_name: &str,
        known_website: &str,
    ) -> anyhow::Result<EnrichmentResult> {
        let mut result = EnrichmentResult::default();

        match self.resolve_target(company_name, known_website).await {
            Some(target) => {
                if let Some(email) = self.deep_scan(&target).await {
                    result.email = email;
                }
            }
            None => log::warn!("No website found for {}", company_name),
        }

        if self.settings.lookup_decision_makers {
            if let Some(hit) = self.find_decision_maker(company_name).await {
                result.decision_maker_name = extract_person_name(&hit.title);
                result.decision_maker_role =
                    extract_role(&hit.snippet).or_else(|| extract_role(&hit.title));
                result.profile_url = Some(hit.url);
            }
        }

        Ok(result)
    }

    async fn stop_session(self: Box<Self>) {
        self.loader.close().await;
    }
}
