use std::sync::Arc;

use crate::{
    cached,
    db::{Cache, CacheKey},
    error::AppResult,
    models::{Company, CompanySummary},
    services::llm::LlmProvider,
};

/// Builds the prompt asking for an investor-facing overview of a company
pub fn build_summary_prompt(company: &Company) -> String {
    let growth = company
        .growth_percentage
        .map(|g| format!("{}%", g))
        .unwrap_or_else(|| "unknown".to_string());
    let description = if company.description.trim().is_empty() {
        "No description available."
    } else {
        company.description.trim()
    };

    format!(
        "You are an analyst at a venture capital firm. Write a concise summary \
         (3-4 sentences) of the company below for an investment committee. Cover \
         what it does, its stage and traction, and one key risk or open question. \
         Do not invent facts beyond the data given.\n\n\
         Name: {name}\n\
         Sector: {sector}\n\
         Location: {location}\n\
         Funding round: {round}\n\
         Total funding: ${funding}\n\
         Employees: {employees}\n\
         Founded: {founded}\n\
         Growth: {growth}\n\
         Description: {description}",
        name = company.name,
        sector = company.sector,
        location = company.location,
        round = company.funding_round,
        funding = company.funding,
        employees = company.num_employees,
        founded = company.founding_year,
        growth = growth,
        description = description,
    )
}

/// Generates company summaries, reusing cached ones when a cache is configured
#[derive(Clone)]
pub struct SummaryService {
    llm: Arc<dyn LlmProvider>,
    cache: Option<Cache>,
    cache_ttl: u64,
}

impl SummaryService {
    pub fn new(llm: Arc<dyn LlmProvider>, cache: Option<Cache>, cache_ttl: u64) -> Self {
        Self {
            llm,
            cache,
            cache_ttl,
        }
    }

    pub async fn summarize(&self, company: &Company) -> AppResult<CompanySummary> {
        let model = self.llm.model();

        let summary = match &self.cache {
            Some(cache) => {
                let key = CacheKey::CompanySummary {
                    company_id: company.id,
                    model: model.clone(),
                };
                let summary: String = cached!(cache, key, self.cache_ttl, self.generate(company));
                summary
            }
            None => self.generate(company).await?,
        };

        Ok(CompanySummary {
            company_id: company.id,
            summary,
            model,
        })
    }

    async fn generate(&self, company: &Company) -> AppResult<String> {
        tracing::info!(company_id = company.id, "Generating company summary");
        let text = self.llm.complete(&build_summary_prompt(company)).await?;
        Ok(text.trim().to_string())
    }
}
