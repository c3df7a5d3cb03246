use std::{fmt, sync::Arc};

use tokio::task::JoinHandle;

use crate::{
    dal::lead_db::LeadStore,
    domain::lead::{CandidateBusiness, EnrichmentResult, LeadRecord, SearchRequest, SearchRun},
};

use super::{Collector, EmailVerifier, Enricher, EnricherSession};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Started,
    Collecting,
    Enriching,
    Verifying,
    Persisted,
    Summarizing,
    Finished,
    Aborted,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineState::Started => "started",
            PipelineState::Collecting => "collecting",
            PipelineState::Enriching => "enriching",
            PipelineState::Verifying => "verifying",
            PipelineState::Persisted => "persisted",
            PipelineState::Summarizing => "summarizing",
            PipelineState::Finished => "finished",
            PipelineState::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Aborted,
    NoCandidates,
    Finished { saved: usize },
}

pub struct PipelineOrchestrator {
    collector: Arc<dyn Collector>,
    enricher: Arc<dyn Enricher>,
    verifier: Arc<dyn EmailVerifier>,
    store: Arc<dyn LeadStore>,
}

impl PipelineOrchestrator {
    pub fn new(
        collector: Arc<dyn Collector>,
        enricher: Arc<dyn Enricher>,
        verifier: Arc<dyn EmailVerifier>,
        store: Arc<dyn LeadStore>,
    ) -> Self {
        PipelineOrchestrator {
            collector,
            enricher,
            verifier,
            store,
        }
    }

    pub fn spawn(self: Arc<Self>, request: SearchRequest) -> JoinHandle<RunOutcome> {
        tokio::spawn(async move { self.run(&request).await })
    }

    /// Fire and forget. A panic inside the run is reported by the supervising task.
    pub fn spawn_supervised(self: Arc<Self>, request: SearchRequest) {
        tokio::spawn(supervise(self.spawn(request)));
    }

    pub async fn run(&self, request: &SearchRequest) -> RunOutcome {
        log_state(request, PipelineState::Started);

        log_state(request, PipelineState::Collecting);
        let candidates = match self
            .collector
            .collect(&request.keyword, &request.location, request.limit)
            .await
        {
            Ok(candidates) => candidates,
            Err(e) => {
                log::error!("Collection failed: {:?}", e);
                log_state(request, PipelineState::Aborted);
                return RunOutcome::Aborted;
            }
        };

        if candidates.is_empty() {
            log::warn!(
                "No businesses found for '{}' in '{}', nothing to save",
                request.keyword,
                request.location
            );
            return RunOutcome::NoCandidates;
        }
        log::info!("Collected {} candidates", candidates.len());

        let mut session = match self.enricher.start_session().await {
            Ok(session) => session,
            Err(e) => {
                log::error!("Could not start the enrichment session: {:?}", e);
                log_state(request, PipelineState::Aborted);
                return RunOutcome::Aborted;
            }
        };

        let saved = self
            .process_candidates(request, candidates, session.as_mut())
            .await;
        session.stop_session().await;

        log_state(request, PipelineState::Summarizing);
        let search_run = SearchRun::finished(request, saved);
        if let Err(e) = self.store.save_search_run(&search_run).await {
            log::error!("Failed to save search run summary: {:?}", e);
        }

        log_state(request, PipelineState::Finished);
        log::info!(
            "Saved {} leads for '{}' in '{}'",
            saved,
            request.keyword,
            request.location
        );
        RunOutcome::Finished { saved }
    }

    async fn process_candidates(
        &self,
        request: &SearchRequest,
        candidates: Vec<CandidateBusiness>,
        session: &mut dyn EnricherSession,
    ) -> usize {
        let total = candidates.len();
        let mut saved = 0;

        for (index, candidate) in candidates.into_iter().enumerate() {
            log::info!(
                "[{}/{}] {}: {}",
                index + 1,
                total,
                PipelineState::Enriching,
                candidate.name
            );
            let enrichment = match session.enrich(&candidate.name, &candidate.website).await {
                Ok(enrichment) => enrichment,
                Err(e) => {
                    log::warn!("Enrichment failed for {}: {:?}", candidate.name, e);
                    EnrichmentResult::default()
                }
            };

            log::info!(
                "[{}/{}] {}: {}",
                index + 1,
                total,
                PipelineState::Verifying,
                enrichment.email
            );
            let verification = self.verifier.verify(&enrichment.email).await;

            let lead = LeadRecord::assemble(request, candidate, enrichment, verification);
            match self.store.save_lead(&lead).await {
                Ok(()) => {
                    saved += 1;
                    log::info!(
                        "[{}/{}] {}: {} ({})",
                        index + 1,
                        total,
                        PipelineState::Persisted,
                        lead.company_name,
                        lead.email_status.as_str()
                    );
                }
                Err(e) => log::error!("Failed to save lead {}: {:?}", lead.company_name, e),
            }
        }

        saved
    }
}

pub async fn supervise(run: JoinHandle<RunOutcome>) -> Option<RunOutcome> {
    match run.await {
        Ok(outcome) => {
            log::info!("Search run ended: {:?}", outcome);
            Some(outcome)
        }
        Err(e) if e.is_panic() => {
            log::error!("Search run panicked: {:?}", e);
            None
        }
        Err(e) => {
            log::error!("Search run was cancelled: {:?}", e);
            None
        }
    }
}

fn log_state(request: &SearchRequest, state: PipelineState) {
    log::info!(
        "Run '{}' in '{}' for {}: {}",
        request.keyword,
        request.location,
        request.requester_id,
        state
    );
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use anyhow::{anyhow, bail};
    use async_trait::async_trait;
    use uuid::Uuid;

    use super::*;
    use crate::domain::lead::{EmailStatus, VerificationOutcome, UNKNOWN};

    fn candidate(name: &str, website: &str) -> CandidateBusiness {
        CandidateBusiness {
            name: name.to_string(),
            industry: "dentist".to_string(),
            location: "Cairo".to_string(),
            phone: vec!["01012345678".to_string()],
            website: website.to_string(),
        }
    }

    fn request(limit: usize) -> SearchRequest {
        SearchRequest {
            keyword: "dentist".to_string(),
            location: "Cairo".to_string(),
            requester_id: Uuid::new_v4(),
            limit,
        }
    }

    struct FakeCollector {
        result: Option<Vec<CandidateBusiness>>,
    }

    #[async_trait]
    impl Collector for FakeCollector {
        async fn collect(
            &self,
            _keyword: &str,
            _location: &str,
            max_results: usize,
        ) -> anyhow::Result<Vec<CandidateBusiness>> {
            match &self.result {
                Some(candidates) => Ok(candidates.iter().take(max_results).cloned().collect()),
                None => Err(anyhow!("webdriver unreachable")),
            }
        }
    }

    struct PanickingCollector;

    #[async_trait]
    impl Collector for PanickingCollector {
        async fn collect(
            &self,
            _keyword: &str,
            _location: &str,
            _max_results: usize,
        ) -> anyhow::Result<Vec<CandidateBusiness>> {
            panic!("selector returned an impossible element");
        }
    }

    #[derive(Default)]
    struct Calls {
        enriched: Mutex<Vec<String>>,
        stopped: Mutex<usize>,
    }

    struct FakeEnricher {
        calls: Arc<Calls>,
        fail_start: bool,
        failing_company: &'static str,
    }

    struct FakeSession {
        calls: Arc<Calls>,
        failing_company: &'static str,
    }

    #[async_trait]
    impl Enricher for FakeEnricher {
        async fn start_session(&self) -> anyhow::Result<Box<dyn EnricherSession>> {
            if self.fail_start {
                bail!("browser failed to start");
            }
            Ok(Box::new(FakeSession {
                calls: self.calls.clone(),
                failing_company: self.failing_company,
            }))
        }
    }

    #[async_trait]
    impl EnricherSession for FakeSession {
        async fn enrich(
            &mut self,
            company_name: &str,
            _known_website: &str,
        ) -> anyhow::Result<EnrichmentResult> {
            self.calls
                .enriched
                .lock()
                .unwrap()
                .push(company_name.to_string());
            if company_name == self.failing_company {
                bail!("page crashed");
            }
            Ok(EnrichmentResult {
                email: format!("info@{}.com", company_name.to_lowercase().replace(' ', "")),
                ..EnrichmentResult::default()
            })
        }

        async fn stop_session(self: Box<Self>) {
            *self.calls.stopped.lock().unwrap() += 1;
        }
    }

    struct FakeVerifier;

    #[async_trait]
    impl EmailVerifier for FakeVerifier {
        async fn verify(&self, email: &str) -> VerificationOutcome {
            match email {
                UNKNOWN => VerificationOutcome::missing(),
                _ => VerificationOutcome::valid(),
            }
        }
    }

    #[derive(Default)]
    struct FakeStore {
        leads: Mutex<Vec<LeadRecord>>,
        runs: Mutex<Vec<SearchRun>>,
        rejected_company: Option<&'static str>,
    }

    #[async_trait]
    impl LeadStore for FakeStore {
        async fn save_lead(&self, lead: &LeadRecord) -> anyhow::Result<()> {
            if self.rejected_company == Some(lead.company_name.as_str()) {
                bail!("constraint violation");
            }
            self.leads.lock().unwrap().push(lead.clone());
            Ok(())
        }

        async fn save_search_run(&self, run: &SearchRun) -> anyhow::Result<()> {
            self.runs.lock().unwrap().push(run.clone());
            Ok(())
        }
    }

    struct Harness {
        orchestrator: PipelineOrchestrator,
        calls: Arc<Calls>,
        store: Arc<FakeStore>,
    }

    fn harness(
        collected: Option<Vec<CandidateBusiness>>,
        fail_start: bool,
        failing_company: &'static str,
        rejected_company: Option<&'static str>,
    ) -> Harness {
        let calls = Arc::new(Calls::default());
        let store = Arc::new(FakeStore {
            rejected_company,
            ..FakeStore::default()
        });
        let orchestrator = PipelineOrchestrator::new(
            Arc::new(FakeCollector { result: collected }),
            Arc::new(FakeEnricher {
                calls: calls.clone(),
                fail_start,
                failing_company,
            }),
            Arc::new(FakeVerifier),
            store.clone(),
        );

        Harness {
            orchestrator,
            calls,
            store,
        }
    }

    fn three_clinics() -> Vec<CandidateBusiness> {
        vec![
            candidate("Smile Clinic", "https://smileclinic.com"),
            candidate("Nile Dental", UNKNOWN),
            candidate("Cairo Dent", "https://cairodent.com"),
        ]
    }

    #[tokio::test]
    async fn failed_enrichment_is_saved_as_degraded_record() {
        let h = harness(Some(three_clinics()), false, "Nile Dental", None);
        let request = request(3);

        let outcome = h.orchestrator.run(&request).await;

        assert_eq!(outcome, RunOutcome::Finished { saved: 3 });
        let leads = h.store.leads.lock().unwrap();
        let names: Vec<_> = leads.iter().map(|l| l.company_name.as_str()).collect();
        assert_eq!(names, vec!["Smile Clinic", "Nile Dental", "Cairo Dent"]);

        assert_eq!(leads[0].email, "info@smileclinic.com");
        assert_eq!(leads[0].email_status, EmailStatus::Valid);
        assert_eq!(leads[1].email, UNKNOWN);
        assert_eq!(leads[1].email_status, EmailStatus::Missing);
        assert_eq!(leads[1].confidence_score, 0.0);
        assert!(leads.iter().all(|l| l.requester_id == request.requester_id));
        assert!(leads.iter().all(|l| l.industry == "dentist"));

        let runs = h.store.runs.lock().unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].results_count, 3);
        assert_eq!(*h.calls.stopped.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn zero_candidates_writes_nothing() {
        let h = harness(Some(vec![]), false, "", None);

        let outcome = h.orchestrator.run(&request(5)).await;

        assert_eq!(outcome, RunOutcome::NoCandidates);
        assert!(h.store.leads.lock().unwrap().is_empty());
        assert!(h.store.runs.lock().unwrap().is_empty());
        assert_eq!(*h.calls.stopped.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn collection_failure_aborts_the_run() {
        let h = harness(None, false, "", None);

        let outcome = h.orchestrator.run(&request(5)).await;

        assert_eq!(outcome, RunOutcome::Aborted);
        assert!(h.store.leads.lock().unwrap().is_empty());
        assert!(h.store.runs.lock().unwrap().is_empty());
        assert!(h.calls.enriched.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn session_start_failure_aborts_the_run() {
        let h = harness(Some(three_clinics()), true, "", None);

        let outcome = h.orchestrator.run(&request(3)).await;

        assert_eq!(outcome, RunOutcome::Aborted);
        assert!(h.store.leads.lock().unwrap().is_empty());
        assert!(h.store.runs.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn persistence_failure_skips_only_that_record() {
        let h = harness(Some(three_clinics()), false, "", Some("Nile Dental"));

        let outcome = h.orchestrator.run(&request(3)).await;

        assert_eq!(outcome, RunOutcome::Finished { saved: 2 });
        assert_eq!(h.store.leads.lock().unwrap().len(), 2);
        assert_eq!(h.store.runs.lock().unwrap()[0].results_count, 2);
        assert_eq!(h.calls.enriched.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn spawned_run_respects_the_limit() {
        let h = harness(Some(three_clinics()), false, "", None);
        let store = h.store.clone();
        let calls = h.calls.clone();

        let outcome = Arc::new(h.orchestrator)
            .spawn(request(2))
            .await
            .unwrap();

        assert_eq!(outcome, RunOutcome::Finished { saved: 2 });
        assert_eq!(
            *calls.enriched.lock().unwrap(),
            vec!["Smile Clinic", "Nile Dental"]
        );
        assert_eq!(store.runs.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn supervisor_reports_outcome_and_survives_a_panic() {
        let h = harness(Some(three_clinics()), false, "", None);
        let finished = supervise(Arc::new(h.orchestrator).spawn(request(1))).await;
        assert_eq!(finished, Some(RunOutcome::Finished { saved: 1 }));

        let store = Arc::new(FakeStore::default());
        let crashing = Arc::new(PipelineOrchestrator::new(
            Arc::new(PanickingCollector),
            Arc::new(FakeEnricher {
                calls: Arc::new(Calls::default()),
                fail_start: false,
                failing_company: "",
            }),
            Arc::new(FakeVerifier),
            store.clone(),
        ));

        assert_eq!(supervise(crashing.spawn(request(3))).await, None);
        assert!(store.runs.lock().unwrap().is_empty());
    }
}
