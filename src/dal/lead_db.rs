use anyhow::Context;
use async_trait::async_trait;
use sqlx::{postgres::PgQueryResult, PgConnection, PgPool};
use uuid::Uuid;

use crate::domain::lead::{LeadRecord, SearchRun};

#[async_trait]
pub trait LeadStore: Send + Sync {
    async fn save_lead(&self, lead: &LeadRecord) -> anyhow::Result<()>;

    async fn save_search_run(&self, run: &SearchRun) -> anyhow::Result<()>;
}

pub async fn insert_lead(
    con: &mut PgConnection,
    lead: &LeadRecord,
) -> Result<Uuid, sqlx::Error> {
    sqlx::query_scalar(
        r"
        insert into lead
            (id, requester_id, company_name, industry, location, phone, website, email,
             email_status, confidence_score, decision_maker_name, decision_maker_role, profile_url)
        values
            ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
        returning id
        ",
    )
    .bind(Uuid::new_v4())
    .bind(lead.requester_id)
    .bind(&lead.company_name)
    .bind(&lead.industry)
    .bind(&lead.location)
    .bind(&lead.phone)
    .bind(&lead.website)
    .bind(&lead.email)
    .bind(lead.email_status.as_str())
    .bind(lead.confidence_score)
    .bind(&lead.decision_maker_name)
    .bind(&lead.decision_maker_role)
    .bind(&lead.profile_url)
    .fetch_one(con)
    .await
}

pub async fn insert_search_run(
    pool: &PgPool,
    run: &SearchRun,
) -> Result<PgQueryResult, sqlx::Error> {
    sqlx::query(
        r"
        insert into search_run
            (id, requester_id, keyword, location, results_count, searched_at)
        values
            ($1, $2, $3, $4, $5, $6)
        ",
    )
    .bind(Uuid::new_v4())
    .bind(run.requester_id)
    .bind(&run.keyword)
    .bind(&run.location)
    .bind(run.results_count)
    .bind(run.searched_at)
    .execute(pool)
    .await
}

#[derive(Clone)]
pub struct PgLeadStore {
    pool: PgPool,
}

impl PgLeadStore {
    pub fn new(pool: PgPool) -> Self {
        PgLeadStore { pool }
    }
}

#[async_trait]
impl LeadStore for PgLeadStore {
    async fn save_lead(&self, lead: &LeadRecord) -> anyhow::Result<()> {
        let mut transaction = self
            .pool
            .begin()
            .await
            .context("Failed to open a transaction for the lead")?;

        let id = insert_lead(&mut transaction, lead)
            .await
            .with_context(|| format!("Failed to insert lead {}", lead.company_name))?;
        transaction.commit().await?;

        log::debug!("Lead {} stored as {}", lead.company_name, id);
        Ok(())
    }

    async fn save_search_run(&self, run: &SearchRun) -> anyhow::Result<()> {
        insert_search_run(&self.pool, run)
            .await
            .context("Failed to insert search run")?;
        Ok(())
    }
}
