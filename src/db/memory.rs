use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;

use crate::{
    db::{CompanyStore, UserStore, WatchlistStore},
    error::{AppError, AppResult},
    models::{Company, NewCompany, NewUser, User, WatchlistEntry},
};

/// In-process store implementing every storage trait
///
/// Used when no `DATABASE_URL` is configured and throughout the test suite.
/// Cloning is cheap and clones share the same tables.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<RwLock<Tables>>,
}

#[derive(Default)]
struct Tables {
    companies: BTreeMap<i64, Company>,
    users: BTreeMap<i64, User>,
    /// Kept in insertion order, which is the order watchlists are listed in
    watchlist: Vec<WatchlistEntry>,
    next_company_id: i64,
    next_user_id: i64,
}

impl Tables {
    fn allocate_company_id(&mut self) -> i64 {
        self.next_company_id += 1;
        self.next_company_id
    }

    fn allocate_user_id(&mut self) -> i64 {
        self.next_user_id += 1;
        self.next_user_id
    }

    /// Drops watchlist rows pointing at companies that no longer exist
    fn prune_watchlist(&mut self) {
        let companies = &self.companies;
        self.watchlist
            .retain(|entry| companies.contains_key(&entry.company_id));
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl CompanyStore for InMemoryStore {
    async fn list_all(&self) -> AppResult<Vec<Company>> {
        let tables = self.inner.read().await;
        Ok(tables.companies.values().cloned().collect())
    }

    async fn get_by_id(&self, id: i64) -> AppResult<Option<Company>> {
        let tables = self.inner.read().await;
        Ok(tables.companies.get(&id).cloned())
    }

    async fn upsert_by_name(&self, company: NewCompany) -> AppResult<(Company, bool)> {
        let mut tables = self.inner.write().await;

        let existing_id = tables
            .companies
            .values()
            .find(|c| c.name == company.name)
            .map(|c| c.id);

        let (id, created) = match existing_id {
            Some(id) => (id, false),
            None => (tables.allocate_company_id(), true),
        };

        let previous_growth = tables.companies.get(&id).and_then(|c| c.growth_percentage);
        let mut stored = company.into_company(id);
        stored.growth_percentage = stored.growth_percentage.or(previous_growth);
        tables.companies.insert(id, stored.clone());

        Ok((stored, created))
    }

    async fn delete_all(&self) -> AppResult<u64> {
        let mut tables = self.inner.write().await;
        let removed = tables.companies.len() as u64;
        tables.companies.clear();
        tables.prune_watchlist();
        Ok(removed)
    }

    async fn delete_by_names(&self, names: &[String]) -> AppResult<u64> {
        let mut tables = self.inner.write().await;
        let before = tables.companies.len();
        tables.companies.retain(|_, c| !names.contains(&c.name));
        let removed = (before - tables.companies.len()) as u64;
        tables.prune_watchlist();
        Ok(removed)
    }
}

#[async_trait::async_trait]
impl WatchlistStore for InMemoryStore {
    async fn list_for_user(&self, user_id: i64) -> AppResult<Vec<Company>> {
        let tables = self.inner.read().await;
        let companies = tables
            .watchlist
            .iter()
            .filter(|entry| entry.user_id == user_id)
            .filter_map(|entry| tables.companies.get(&entry.company_id))
            .cloned()
            .collect();

        Ok(companies)
    }

    async fn add(&self, user_id: i64, company_id: i64) -> AppResult<WatchlistEntry> {
        let mut tables = self.inner.write().await;

        if !tables.companies.contains_key(&company_id) {
            return Err(AppError::NotFound(format!("Company {} not found", company_id)));
        }

        if tables
            .watchlist
            .iter()
            .any(|e| e.user_id == user_id && e.company_id == company_id)
        {
            return Err(AppError::Conflict(
                "Company is already in your watchlist".to_string(),
            ));
        }

        let entry = WatchlistEntry {
            user_id,
            company_id,
            created_at: Utc::now(),
        };
        tables.watchlist.push(entry.clone());

        Ok(entry)
    }

    async fn remove(&self, user_id: i64, company_id: i64) -> AppResult<bool> {
        let mut tables = self.inner.write().await;
        let before = tables.watchlist.len();
        tables
            .watchlist
            .retain(|e| !(e.user_id == user_id && e.company_id == company_id));
        Ok(tables.watchlist.len() < before)
    }
}

#[async_trait::async_trait]
impl UserStore for InMemoryStore {
    async fn find_by_id(&self, id: i64) -> AppResult<Option<User>> {
        let tables = self.inner.read().await;
        Ok(tables.users.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let tables = self.inner.read().await;
        Ok(tables.users.values().find(|u| u.email == email).cloned())
    }

    async fn find_by_username(&self, username: &str) -> AppResult<Option<User>> {
        let tables = self.inner.read().await;
        Ok(tables.users.values().find(|u| u.username == username).cloned())
    }

    async fn create(&self, user: NewUser) -> AppResult<User> {
        let mut tables = self.inner.write().await;

        if tables
            .users
            .values()
            .any(|u| u.email == user.email || u.username == user.username)
        {
            return Err(AppError::Conflict(
                "A user with that email or username already exists".to_string(),
            ));
        }

        let id = tables.allocate_user_id();
        let stored = User {
            id,
            username: user.username,
            email: user.email,
            password_hash: user.password_hash,
        };
        tables.users.insert(id, stored.clone());

        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use tokio_test::{assert_err, assert_ok};

    fn new_company(name: &str, funding: i64) -> NewCompany {
        NewCompany {
            name: name.to_string(),
            sector: "Other".to_string(),
            funding_round: "Seed".to_string(),
            funding: Decimal::from(funding),
            location: "Austin, TX".to_string(),
            num_employees: 5,
            founding_year: 2022,
            growth_percentage: None,
            description: String::new(),
        }
    }

    #[tokio::test]
    async fn test_upsert_by_name_updates_in_place() {
        let store = InMemoryStore::new();

        let (first, created) = store.upsert_by_name(new_company("Aurora", 100)).await.unwrap();
        assert!(created);

        let (second, created) = store.upsert_by_name(new_company("Aurora", 200)).await.unwrap();
        assert!(!created);
        assert_eq!(first.id, second.id);
        assert_eq!(second.funding, Decimal::from(200));
        assert_eq!(store.list_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_upsert_without_growth_keeps_stored_growth() {
        let store = InMemoryStore::new();
        let seeded = NewCompany {
            growth_percentage: Some(45),
            ..new_company("Aurora", 100)
        };
        store.upsert_by_name(seeded).await.unwrap();

        let (updated, _) = store.upsert_by_name(new_company("Aurora", 300)).await.unwrap();
        assert_eq!(updated.growth_percentage, Some(45));
        assert_eq!(updated.funding, Decimal::from(300));

        let regrown = NewCompany {
            growth_percentage: Some(10),
            ..new_company("Aurora", 300)
        };
        let (updated, _) = store.upsert_by_name(regrown).await.unwrap();
        assert_eq!(updated.growth_percentage, Some(10));
    }

    #[tokio::test]
    async fn test_watchlist_rejects_duplicates_and_unknown_companies() {
        let store = InMemoryStore::new();
        let (company, _) = store.upsert_by_name(new_company("Aurora", 100)).await.unwrap();

        assert_ok!(store.add(1, company.id).await);
        assert!(matches!(
            store.add(1, company.id).await,
            Err(AppError::Conflict(_))
        ));
        assert!(matches!(store.add(1, 999).await, Err(AppError::NotFound(_))));

        // Another user may save the same company
        assert_ok!(store.add(2, company.id).await);
    }

    #[tokio::test]
    async fn test_watchlist_lists_in_save_order() {
        let store = InMemoryStore::new();
        let (a, _) = store.upsert_by_name(new_company("A", 1)).await.unwrap();
        let (b, _) = store.upsert_by_name(new_company("B", 2)).await.unwrap();

        store.add(7, b.id).await.unwrap();
        store.add(7, a.id).await.unwrap();

        let saved: Vec<i64> = store
            .list_for_user(7)
            .await
            .unwrap()
            .iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(saved, vec![b.id, a.id]);
    }

    #[tokio::test]
    async fn test_deleting_companies_cascades_to_watchlist() {
        let store = InMemoryStore::new();
        let (a, _) = store.upsert_by_name(new_company("A", 1)).await.unwrap();
        store.add(1, a.id).await.unwrap();

        let removed = store.delete_by_names(&["A".to_string()]).await.unwrap();
        assert_eq!(removed, 1);
        assert!(store.list_for_user(1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_remove_reports_whether_entry_existed() {
        let store = InMemoryStore::new();
        let (a, _) = store.upsert_by_name(new_company("A", 1)).await.unwrap();
        store.add(1, a.id).await.unwrap();

        assert!(store.remove(1, a.id).await.unwrap());
        assert!(!store.remove(1, a.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_user_email_is_unique() {
        let store = InMemoryStore::new();
        let user = NewUser {
            username: "testuser".to_string(),
            email: "test@example.com".to_string(),
            password_hash: "hash".to_string(),
        };

        let created = assert_ok!(store.create(user.clone()).await);
        assert_eq!(
            store.find_by_email("test@example.com").await.unwrap(),
            Some(created)
        );
        assert_err!(store.create(user).await);
    }
}
