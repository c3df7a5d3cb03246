use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use itertools::Itertools;
use rand::Rng;
use thirtyfour::prelude::*;
use url::Url;

use crate::{
    configuration::{CollectorSettings, WebDriverSettings},
    domain::{
        lead::{CandidateBusiness, UNKNOWN},
        phone::extract_phone_numbers,
    },
};

use super::Droid;

const FEED_SELECTOR: &str = "div[role='feed']";
const PLACE_LINK_SELECTOR: &str = "a[href*='/maps/place/']";
const WEBSITE_SELECTOR: &str = "a[data-item-id='authority']";
const TITLE_SELECTOR: &str = "h1";
const SCROLL_FEED_SCRIPT: &str = "arguments[0].scrollTop = arguments[0].scrollHeight";

#[async_trait]
pub trait Collector: Send + Sync {
    /// At most `max_results` candidates. `Err` only when the collection could not run at all.
    async fn collect(
        &self,
        keyword: &str,
        location: &str,
        max_results: usize,
    ) -> anyhow::Result<Vec<CandidateBusiness>>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlaceLink {
    pub name: String,
    pub url: String,
}

// Stop once enough anchors are loaded or the feed stops growing for `max_stale` scrolls.
#[derive(Debug)]
pub struct ScrollProgress {
    seen: usize,
    stale: u8,
    max_results: usize,
    max_stale: u8,
}

impl ScrollProgress {
    pub fn new(initial: usize, max_results: usize, max_stale: u8) -> Self {
        ScrollProgress {
            seen: initial,
            stale: 0,
            max_results,
            max_stale,
        }
    }

    pub fn record(&mut self, count: usize) {
        match count > self.seen {
            true => {
                self.seen = count;
                self.stale = 0;
            }
            false => self.stale += 1,
        }
    }

    pub fn should_scroll(&self) -> bool {
        self.seen < self.max_results && self.stale < self.max_stale
    }

    pub fn seen(&self) -> usize {
        self.seen
    }
}

pub fn build_maps_query(keyword: &str, location: &str) -> String {
    format!("{} in {}", keyword.trim(), location.trim())
}

pub fn build_maps_url(base_url: &str, query: &str) -> anyhow::Result<Url> {
    let base = Url::parse(base_url).context("Invalid maps base url")?;
    let url = base.join(&query.replace(['/', '?', '#'], " "))?;
    Ok(url)
}

pub fn select_places(links: Vec<PlaceLink>, max_results: usize) -> Vec<PlaceLink> {
    links
        .into_iter()
        .filter(|link| !link.url.is_empty())
        .unique_by(|link| link.url.clone())
        .take(max_results)
        .collect()
}

pub fn build_candidate(
    name: &str,
    keyword: &str,
    location: &str,
    page_source: &str,
    website: Option<String>,
) -> Option<CandidateBusiness> {
    let name = name.trim();
    if name.is_empty() {
        return None;
    }

    Some(CandidateBusiness {
        name: name.to_string(),
        industry: keyword.to_string(),
        location: location.to_string(),
        phone: extract_phone_numbers(page_source),
        website: website
            .map(|w| w.trim().to_string())
            .filter(|w| !w.is_empty())
            .unwrap_or_else(|| UNKNOWN.to_string()),
    })
}

fn jittered(base: Duration) -> Duration {
    let spread = (base.as_millis() / 4) as u64;
    base + Duration::from_millis(rand::thread_rng().gen_range(0..=spread))
}

#[async_trait]
pub trait MapsPage: Send + Sync {
    async fn load_feed(&self, query: &str, max_results: usize) -> anyhow::Result<Vec<PlaceLink>>;

    async fn scrape_place(
        &self,
        place: &PlaceLink,
        keyword: &str,
        location: &str,
    ) -> anyhow::Result<Option<CandidateBusiness>>;

    async fn close(self: Box<Self>);
}

pub struct BrowserMapsPage {
    droid: Droid,
    settings: CollectorSettings,
}

impl BrowserMapsPage {
    pub fn new(droid: Droid, settings: CollectorSettings) -> Self {
        BrowserMapsPage { droid, settings }
    }

    async fn count_place_links(driver: &WebDriver) -> WebDriverResult<usize> {
        Ok(driver.find_all(By::Css(PLACE_LINK_SELECTOR)).await?.len())
    }
}

#[async_trait]
impl MapsPage for BrowserMapsPage {
    async fn load_feed(&self, query: &str, max_results: usize) -> anyhow::Result<Vec<PlaceLink>> {
        let driver = self.droid.driver()?;
        let url = build_maps_url(&self.settings.maps_base_url, query)?;
        driver.goto(url.as_str()).await?;

        let feed = match driver
            .query(By::Css(FEED_SELECTOR))
            .wait(self.settings.feed_timeout(), Duration::from_millis(500))
            .first()
            .await
        {
            Ok(feed) => feed,
            Err(e) => {
                log::warn!("Results feed never showed up for '{}': {:?}", query, e);
                return Ok(vec![]);
            }
        };

        let initial = Self::count_place_links(driver).await?;
        let mut progress =
            ScrollProgress::new(initial, max_results, self.settings.max_stale_scrolls);

        while progress.should_scroll() {
            driver
                .execute(SCROLL_FEED_SCRIPT, vec![feed.to_json()?])
                .await?;
            tokio::time::sleep(jittered(self.settings.scroll_pause())).await;
            progress.record(Self::count_place_links(driver).await?);
        }
        log::info!("Feed for '{}' settled at {} places", query, progress.seen());

        let mut links = vec![];
        for anchor in driver.find_all(By::Css(PLACE_LINK_SELECTOR)).await? {
            let href = anchor.attr("href").await?.unwrap_or_default();
            let name = anchor.attr("aria-label").await?.unwrap_or_default();
            links.push(PlaceLink { name, url: href });
        }

        Ok(select_places(links, max_results))
    }

    async fn scrape_place(
        &self,
        place: &PlaceLink,
        keyword: &str,
        location: &str,
    ) -> anyhow::Result<Option<CandidateBusiness>> {
        let driver = self.droid.driver()?;
        driver.goto(place.url.as_str()).await?;
        tokio::time::sleep(jittered(self.settings.detail_settle())).await;

        let page_source = driver.source().await?;

        let website = match driver.find(By::Css(WEBSITE_SELECTOR)).await {
            Ok(element) => element.attr("href").await?,
            Err(_) => None,
        };

        let name = match place.name.trim().is_empty() {
            false => place.name.clone(),
            true => match driver.find(By::Css(TITLE_SELECTOR)).await {
                Ok(title) => title.text().await?,
                Err(_) => String::new(),
            },
        };

        Ok(build_candidate(
            &name,
            keyword,
            location,
            &page_source,
            website,
        ))
    }

    async fn close(self: Box<Self>) {
        self.droid.quit().await;
    }
}

async fn scrape_places(
    page: &dyn MapsPage,
    keyword: &str,
    location: &str,
    max_results: usize,
    candidates: &mut Vec<CandidateBusiness>,
) -> anyhow::Result<()> {
    let query = build_maps_query(keyword, location);
    log::info!("Searching maps for: {}", query);

    let places = page.load_feed(&query, max_results).await?;
    log::info!("Found {} places for '{}'", places.len(), query);

    for place in places.iter() {
        if candidates.len() >= max_results {
            break;
        }
        match page.scrape_place(place, keyword, location).await {
            Ok(Some(candidate)) => {
                log::info!(
                    "Collected: {} | {}",
                    candidate.name,
                    candidate.phone.join(" | ")
                );
                candidates.push(candidate);
            }
            Ok(None) => log::warn!("Skipping nameless place at {}", place.url),
            Err(e) => log::warn!("Skipping place {}: {:?}", place.url, e),
        }
    }

    Ok(())
}

/// Runs one collection on an already open page and always closes it. A failure
/// before or during the feed keeps whatever was collected until then.
pub async fn collect_from_page(
    page: Box<dyn MapsPage>,
    keyword: &str,
    location: &str,
    max_results: usize,
) -> Vec<CandidateBusiness> {
    let mut candidates = vec![];
    if let Err(e) = scrape_places(page.as_ref(), keyword, location, max_results, &mut candidates)
        .await
    {
        log::error!(
            "Maps collection for '{} in {}' stopped after {} candidates: {:?}",
            keyword,
            location,
            candidates.len(),
            e
        );
    }
    page.close().await;

    candidates.truncate(max_results);
    candidates
}

pub struct MapsCollector {
    webdriver: WebDriverSettings,
    settings: CollectorSettings,
}

impl MapsCollector {
    pub fn new(webdriver: WebDriverSettings, settings: CollectorSettings) -> Self {
        MapsCollector {
            webdriver,
            settings,
        }
    }
}

#[async_trait]
impl Collector for MapsCollector {
    async fn collect(
        &self,
        keyword: &str,
        location: &str,
        max_results: usize,
    ) -> anyhow::Result<Vec<CandidateBusiness>> {
        if max_results == 0 {
            return Ok(vec![]);
        }

        let droid = Droid::launch(&self.webdriver)
            .await
            .context("Failed to start the maps browser session")?;
        let page = BrowserMapsPage::new(droid, self.settings.clone());

        Ok(collect_from_page(Box::new(page), keyword, location, max_results).await)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    };

    use anyhow::anyhow;

    use super::*;

    struct FakeMapsPage {
        feed: Option<Vec<PlaceLink>>,
        broken_place: &'static str,
        scraped: Arc<Mutex<Vec<String>>>,
        closed: Arc<AtomicBool>,
    }

    #[async_trait]
    impl MapsPage for FakeMapsPage {
        async fn load_feed(
            &self,
            _query: &str,
            _max_results: usize,
        ) -> anyhow::Result<Vec<PlaceLink>> {
            self.feed
                .clone()
                .ok_or_else(|| anyhow!("chrome not reachable"))
        }

        async fn scrape_place(
            &self,
            place: &PlaceLink,
            keyword: &str,
            location: &str,
        ) -> anyhow::Result<Option<CandidateBusiness>> {
            self.scraped.lock().unwrap().push(place.name.clone());
            if place.name == self.broken_place {
                return Err(anyhow!("stale element reference"));
            }
            let page = "<span>01012345678</span>";
            Ok(build_candidate(&place.name, keyword, location, page, None))
        }

        async fn close(self: Box<Self>) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    struct Fixture {
        page: Box<FakeMapsPage>,
        scraped: Arc<Mutex<Vec<String>>>,
        closed: Arc<AtomicBool>,
    }

    fn fixture(feed: Option<Vec<PlaceLink>>, broken_place: &'static str) -> Fixture {
        let scraped = Arc::new(Mutex::new(vec![]));
        let closed = Arc::new(AtomicBool::new(false));
        Fixture {
            page: Box::new(FakeMapsPage {
                feed,
                broken_place,
                scraped: scraped.clone(),
                closed: closed.clone(),
            }),
            scraped,
            closed,
        }
    }

    fn clinics() -> Vec<PlaceLink> {
        vec![
            link("Smile Clinic", "https://www.google.com/maps/place/smile"),
            link("Nile Dental", "https://www.google.com/maps/place/nile"),
            link("Cairo Dent", "https://www.google.com/maps/place/cairo"),
        ]
    }

    #[tokio::test]
    async fn failing_place_is_skipped_and_batch_continues() {
        let f = fixture(Some(clinics()), "Nile Dental");

        let candidates = collect_from_page(f.page, "dentist", "Cairo", 5).await;

        let names: Vec<_> = candidates.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Smile Clinic", "Cairo Dent"]);
        assert_eq!(candidates[0].phone, vec!["01012345678"]);
        assert_eq!(f.scraped.lock().unwrap().len(), 3);
        assert!(f.closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn feed_failure_returns_empty_and_releases_browser() {
        let f = fixture(None, "");

        let candidates = collect_from_page(f.page, "dentist", "Cairo", 5).await;

        assert!(candidates.is_empty());
        assert!(f.scraped.lock().unwrap().is_empty());
        assert!(f.closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn collection_stops_at_max_results() {
        let f = fixture(Some(clinics()), "");

        let candidates = collect_from_page(f.page, "dentist", "Cairo", 2).await;

        assert_eq!(candidates.len(), 2);
        assert_eq!(
            *f.scraped.lock().unwrap(),
            vec!["Smile Clinic", "Nile Dental"]
        );
        assert!(f.closed.load(Ordering::SeqCst));
    }

    fn link(name: &str, url: &str) -> PlaceLink {
        PlaceLink {
            name: name.to_string(),
            url: url.to_string(),
        }
    }

    #[test]
    fn scroll_stops_after_three_stale_rounds() {
        let mut progress = ScrollProgress::new(5, 50, 3);
        for count in [9, 9, 9] {
            assert!(progress.should_scroll());
            progress.record(count);
        }
        assert!(progress.should_scroll());
        progress.record(9);

        assert!(!progress.should_scroll());
        assert_eq!(progress.seen(), 9);
    }

    #[test]
    fn scroll_stale_counter_resets_on_growth() {
        let mut progress = ScrollProgress::new(0, 50, 3);
        progress.record(0);
        progress.record(0);
        progress.record(7);
        progress.record(7);
        progress.record(7);

        assert!(progress.should_scroll());
    }

    #[test]
    fn scroll_stops_once_limit_reached() {
        let mut progress = ScrollProgress::new(3, 10, 3);
        progress.record(12);
        assert!(!progress.should_scroll());
    }

    #[test]
    fn select_places_dedupes_and_caps() {
        let links = vec![
            link("Smile Clinic", "https://www.google.com/maps/place/smile"),
            link("Smile Clinic", "https://www.google.com/maps/place/smile"),
            link("", ""),
            link("Nile Dental", "https://www.google.com/maps/place/nile"),
            link("Cairo Dent", "https://www.google.com/maps/place/cairo"),
        ];

        let places = select_places(links, 2);

        assert_eq!(
            places,
            vec![
                link("Smile Clinic", "https://www.google.com/maps/place/smile"),
                link("Nile Dental", "https://www.google.com/maps/place/nile"),
            ]
        );
    }

    #[test]
    fn build_candidate_extracts_phones_and_website() {
        let page = "<span>0223456789</span><span>+201012345678</span><span>0223456789</span>";
        let candidate = build_candidate(
            " Smile Clinic ",
            "dentist",
            "Cairo",
            page,
            Some("https://smileclinic.com/".to_string()),
        )
        .unwrap();

        assert_eq!(candidate.name, "Smile Clinic");
        assert_eq!(candidate.industry, "dentist");
        assert_eq!(candidate.phone, vec!["01012345678", "0223456789"]);
        assert_eq!(candidate.website, "https://smileclinic.com/");
    }

    #[test]
    fn build_candidate_defaults() {
        let candidate =
            build_candidate("Nile Dental", "dentist", "Giza", "no phone here", None).unwrap();
        assert!(candidate.phone.is_empty());
        assert_eq!(candidate.website, UNKNOWN);

        assert_eq!(build_candidate("  ", "dentist", "Giza", "", None), None);
    }

    #[test]
    fn maps_url_is_encoded() {
        let url = build_maps_url(
            "https://www.google.com/maps/search/",
            &build_maps_query("dentist", "Cairo"),
        )
        .unwrap();
        assert_eq!(
            url.as_str(),
            "https://www.google.com/maps/search/dentist%20in%20Cairo"
        );
    }
}
