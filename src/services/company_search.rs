use crate::{
    db::CompanyStore,
    error::{AppError, AppResult},
    models::{Company, CompanyQuery, Page, PAGE_SIZE},
};

/// Lists one page of the catalog
///
/// Validates the page number, delegates filtering to the store, and rejects
/// pages past the end of the results (the first page is always valid).
pub async fn list_companies(
    store: &dyn CompanyStore,
    query: &CompanyQuery,
) -> AppResult<Page<Company>> {
    if query.page() == 0 {
        return Err(AppError::InvalidInput(
            "Page numbers start at 1".to_string(),
        ));
    }

    if query.checked_offset().is_none() {
        return Err(AppError::InvalidInput("Page number is too large".to_string()));
    }

    let page = store.search(query).await?;

    if page.results.is_empty() && query.page() > 1 {
        return Err(AppError::NotFound("Invalid page".to_string()));
    }

    Ok(page)
}

/// Fetches a single company or fails with `NotFound`
pub async fn get_company(store: &dyn CompanyStore, id: i64) -> AppResult<Company> {
    store
        .get_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Company {} not found", id)))
}

/// Applies a catalog query to companies already loaded in memory
pub fn search_in_memory(companies: Vec<Company>, query: &CompanyQuery) -> Page<Company> {
    let mut matching: Vec<Company> = companies
        .into_iter()
        .filter(|company| query.matches(company))
        .collect();

    // Id first so that equal sort keys keep a deterministic order
    matching.sort_by_key(|company| company.id);
    matching.sort_by(|a, b| query.compare(a, b));

    let count = matching.len();
    let results = matching
        .into_iter()
        .skip(query.offset())
        .take(PAGE_SIZE)
        .collect();

    Page::new(results, count, query.page())
}
