use thiserror::Error;
use tracing::{debug, info};
use yatube_common::model::{
    ModelValidationError,
    group::CreateGroup,
};
use yatube_db::{DbError, Store};

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("Invalid seed group: {0}")]
    InvalidGroup(#[from] ModelValidationError),
    #[error(transparent)]
    Database(#[from] DbError),
}

/// Creates a group titled after its slug for every slug without one yet.
/// Returns how many groups were created.
pub async fn seed_groups(store: &dyn Store, slugs: &[String]) -> Result<usize, SeedError> {
    let mut created = 0;

    for slug in slugs {
        let group = CreateGroup::new(slug.clone(), slug.clone(), String::new())?;
        match store.create_group(&group).await {
            Ok(group) => {
                info!(group_id = %group.id, slug = %group.slug, "Seeded group");
                created += 1;
            }
            Err(DbError::SlugTaken(slug)) => debug!(%slug, "Seed group already exists"),
            Err(e) => return Err(e.into()),
        }
    }

    Ok(created)
}

#[cfg(test)]
mod tests {
    use crate::seed::{SeedError, seed_groups};
    use yatube_common::model::group::GroupSlug;
    use yatube_db::{MemoryStore, Store};

    fn slugs(slugs: &[&str]) -> Vec<String> {
        slugs.iter().map(|slug| (*slug).to_owned()).collect()
    }

    #[tokio::test]
    async fn seeding_twice_creates_once() {
        let store = MemoryStore::default();

        assert_eq!(seed_groups(&store, &slugs(&["cats", "dogs"])).await.unwrap(), 2);
        assert_eq!(seed_groups(&store, &slugs(&["dogs", "birds"])).await.unwrap(), 1);

        let groups = store.fetch_groups().await.unwrap();
        assert_eq!(groups.len(), 3);

        let cats = store
            .fetch_group_by_slug(&GroupSlug::new("cats".to_owned()).unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(cats.title, "cats");
    }

    #[tokio::test]
    async fn bad_slug_is_an_error() {
        let store = MemoryStore::default();

        let result = seed_groups(&store, &slugs(&["Not A Slug"])).await;
        assert!(matches!(result, Err(SeedError::InvalidGroup(_))));
    }
}
