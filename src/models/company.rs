use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Number of companies returned per catalog page
pub const PAGE_SIZE: usize = 10;

/// A venture-capital target company as stored in the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Company {
    pub id: i64,
    pub name: String,
    pub sector: String,
    /// Investment stage label, e.g. "Seed" or "Series A"
    pub funding_round: String,
    /// Amount raised, serialized as a decimal string ("500000.00")
    pub funding: Decimal,
    pub location: String,
    pub num_employees: i32,
    pub founding_year: i32,
    pub growth_percentage: Option<i32>,
    pub description: String,
}

/// Company fields used to create or update a catalog entry, keyed by name
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NewCompany {
    pub name: String,
    pub sector: String,
    pub funding_round: String,
    pub funding: Decimal,
    pub location: String,
    pub num_employees: i32,
    pub founding_year: i32,
    pub growth_percentage: Option<i32>,
    pub description: String,
}

impl NewCompany {
    /// Builds the stored record for this entry under the given id
    pub fn into_company(self, id: i64) -> Company {
        Company {
            id,
            name: self.name,
            sector: self.sector,
            funding_round: self.funding_round,
            funding: normalize_funding(self.funding),
            location: self.location,
            num_employees: self.num_employees,
            founding_year: self.founding_year,
            growth_percentage: self.growth_percentage,
            description: self.description,
        }
    }
}

/// Funding amounts are kept at two decimal places, matching the NUMERIC(14, 2) column
pub fn normalize_funding(amount: Decimal) -> Decimal {
    let mut amount = amount;
    amount.rescale(2);
    amount
}

/// Column a catalog listing can be ordered by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    Name,
    Sector,
    FundingRound,
    Funding,
    Location,
    NumEmployees,
    FoundingYear,
    GrowthPercentage,
}

impl SortField {
    /// Column name in the `companies` table
    pub fn column(&self) -> &'static str {
        match self {
            SortField::Name => "name",
            SortField::Sector => "sector",
            SortField::FundingRound => "funding_round",
            SortField::Funding => "funding",
            SortField::Location => "location",
            SortField::NumEmployees => "num_employees",
            SortField::FoundingYear => "founding_year",
            SortField::GrowthPercentage => "growth_percentage",
        }
    }

    /// Compares two companies on this column, ascending
    pub fn compare(&self, a: &Company, b: &Company) -> Ordering {
        match self {
            SortField::Name => a.name.cmp(&b.name),
            SortField::Sector => a.sector.cmp(&b.sector),
            SortField::FundingRound => a.funding_round.cmp(&b.funding_round),
            SortField::Funding => a.funding.cmp(&b.funding),
            SortField::Location => a.location.cmp(&b.location),
            SortField::NumEmployees => a.num_employees.cmp(&b.num_employees),
            SortField::FoundingYear => a.founding_year.cmp(&b.founding_year),
            SortField::GrowthPercentage => a.growth_percentage.cmp(&b.growth_percentage),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

/// Catalog listing parameters, deserialized straight from the query string
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CompanyQuery {
    /// Case-insensitive match on name or location
    pub search: Option<String>,
    /// Case-insensitive match on location
    pub location: Option<String>,
    pub funding_round: Option<String>,
    pub sector: Option<String>,
    pub sort_by: Option<SortField>,
    #[serde(default)]
    pub sort_dir: SortDirection,
    pub page: Option<usize>,
}

impl CompanyQuery {
    /// Returns the requested page, defaulting to the first
    pub fn page(&self) -> usize {
        self.page.unwrap_or(1)
    }

    /// Returns the number of records to skip for the requested page, saturating
    /// for pages too large to address
    pub fn offset(&self) -> usize {
        self.checked_offset().unwrap_or(usize::MAX)
    }

    /// Returns the offset only when it is representable as a SQL OFFSET
    pub fn checked_offset(&self) -> Option<usize> {
        self.page()
            .saturating_sub(1)
            .checked_mul(PAGE_SIZE)
            .filter(|offset| i64::try_from(*offset).is_ok())
    }

    /// Returns the search term, if one was given and is not blank
    pub fn search_term(&self) -> Option<&str> {
        non_blank(self.search.as_deref())
    }

    pub fn location_term(&self) -> Option<&str> {
        non_blank(self.location.as_deref())
    }

    pub fn funding_round_term(&self) -> Option<&str> {
        non_blank(self.funding_round.as_deref())
    }

    pub fn sector_term(&self) -> Option<&str> {
        non_blank(self.sector.as_deref())
    }

    /// Checks a company against every filter in the query
    pub fn matches(&self, company: &Company) -> bool {
        if let Some(term) = self.search_term() {
            let term = term.to_lowercase();
            if !company.name.to_lowercase().contains(&term)
                && !company.location.to_lowercase().contains(&term)
            {
                return false;
            }
        }

        if let Some(term) = self.location_term() {
            if !company.location.to_lowercase().contains(&term.to_lowercase()) {
                return false;
            }
        }

        if let Some(round) = self.funding_round_term() {
            if company.funding_round != round {
                return false;
            }
        }

        if let Some(sector) = self.sector_term() {
            if company.sector != sector {
                return false;
            }
        }

        true
    }

    /// Orders two companies per the requested sort, falling back to id
    pub fn compare(&self, a: &Company, b: &Company) -> Ordering {
        match self.sort_by {
            Some(field) => {
                let ordering = field.compare(a, b);
                match self.sort_dir {
                    SortDirection::Asc => ordering,
                    SortDirection::Desc => ordering.reverse(),
                }
            }
            None => a.id.cmp(&b.id),
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// One page of catalog results
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    /// Total number of matching records across all pages
    pub count: usize,
    pub next: Option<usize>,
    pub previous: Option<usize>,
    pub results: Vec<T>,
}

impl<T> Page<T> {
    /// Wraps one page of results, deriving the neighbouring page numbers
    pub fn new(results: Vec<T>, count: usize, page: usize) -> Self {
        let next = (page.saturating_mul(PAGE_SIZE) < count).then(|| page + 1);
        let previous = (page > 1).then(|| page - 1);

        Self {
            count,
            next,
            previous,
            results,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn company(id: i64, name: &str, location: &str, round: &str, sector: &str) -> Company {
        Company {
            id,
            name: name.to_string(),
            sector: sector.to_string(),
            funding_round: round.to_string(),
            funding: Decimal::from(1000 * id),
            location: location.to_string(),
            num_employees: 10,
            founding_year: 2020,
            growth_percentage: None,
            description: String::new(),
        }
    }

    #[test]
    fn test_search_matches_name_or_location_case_insensitively() {
        let query = CompanyQuery {
            search: Some("aUsTiN".to_string()),
            ..Default::default()
        };

        assert!(query.matches(&company(1, "Cedar Health", "Austin, TX", "Series B", "Other")));
        assert!(query.matches(&company(2, "Austin Labs", "Denver, CO", "Seed", "Other")));
        assert!(!query.matches(&company(3, "Dune Energy", "Denver, CO", "Seed", "Other")));
    }

    #[test]
    fn test_funding_round_and_sector_are_exact() {
        let query = CompanyQuery {
            funding_round: Some("Seed".to_string()),
            sector: Some("Fintech".to_string()),
            ..Default::default()
        };

        assert!(query.matches(&company(1, "NovaPay", "New York, USA", "Seed", "Fintech")));
        assert!(!query.matches(&company(2, "Other", "New York, USA", "seed", "Fintech")));
        assert!(!query.matches(&company(3, "Other", "New York, USA", "Seed", "fintech")));
    }

    #[test]
    fn test_blank_filters_are_ignored() {
        let query = CompanyQuery {
            search: Some("   ".to_string()),
            funding_round: Some(String::new()),
            ..Default::default()
        };

        assert!(query.matches(&company(1, "Anything", "Anywhere", "Seed", "Other")));
    }

    #[test]
    fn test_compare_respects_direction() {
        let small = company(1, "A", "X", "Seed", "Other");
        let large = company(2, "B", "X", "Seed", "Other");
        let mut query = CompanyQuery {
            sort_by: Some(SortField::Funding),
            ..Default::default()
        };
        assert_eq!(query.compare(&small, &large), Ordering::Less);

        query.sort_dir = SortDirection::Desc;
        assert_eq!(query.compare(&small, &large), Ordering::Greater);
    }

    #[test]
    fn test_page_links() {
        let page: Page<u8> = Page::new(vec![], 25, 1);
        assert_eq!(page.next, Some(2));
        assert_eq!(page.previous, None);

        let page: Page<u8> = Page::new(vec![], 25, 3);
        assert_eq!(page.next, None);
        assert_eq!(page.previous, Some(2));

        let page: Page<u8> = Page::new(vec![], 20, 2);
        assert_eq!(page.next, None);

        let page: Page<u8> = Page::new(vec![], 20, usize::MAX);
        assert_eq!(page.next, None);
    }

    #[test]
    fn test_offset_never_overflows() {
        let query = |page| CompanyQuery {
            page: Some(page),
            ..Default::default()
        };

        assert_eq!(query(3).checked_offset(), Some(20));
        assert_eq!(query(0).checked_offset(), Some(0));
        assert_eq!(query(usize::MAX).checked_offset(), None);
        assert_eq!(query(usize::MAX).offset(), usize::MAX);
        assert_eq!(query(usize::MAX / PAGE_SIZE).checked_offset(), None);
    }

    #[test]
    fn test_funding_serializes_as_two_decimal_string() {
        let stored = NewCompany {
            name: "Aurora Analytics".to_string(),
            sector: "Other".to_string(),
            funding_round: "Seed".to_string(),
            funding: Decimal::from(500_000),
            location: "San Francisco, CA".to_string(),
            num_employees: 8,
            founding_year: 2021,
            growth_percentage: Some(120),
            description: String::new(),
        }
        .into_company(1);

        let json = serde_json::to_value(&stored).unwrap();
        assert_eq!(json["funding"], "500000.00");
    }

    #[test]
    fn test_sort_field_deserializes_snake_case() {
        let field: SortField = serde_json::from_str("\"num_employees\"").unwrap();
        assert_eq!(field, SortField::NumEmployees);
        assert_eq!(field.column(), "num_employees");
    }
}
