//! Listing persistence
//!
//! Every operation runs in its own redb transaction, so each write is
//! all-or-nothing and concurrent writers to the same listing resolve
//! last-write-wins. Admin operations take an [`AdminAccess`] and reads take a
//! [`Viewer`]; both come from the gate in [`crate::middleware`].

use chrono::{DateTime, Utc};
use redb::{Database, ReadableDatabase, ReadableTable, Table};

use crate::calculator;
use crate::database::{load_users, random_id, TABLE_LISTINGS};
use crate::error::{AppError, AppResult};
use crate::inventory::SortBy;
use crate::middleware::{AdminAccess, Viewer};
use crate::model::{
    AdminListing, CreatorSummary, Listing, ListingDraft, ListingPatch, ListingStatus,
};

const ENTITY: &str = "Listing";
const ID_LEN: usize = 12;

/// Builds a stored listing from a validated draft and derives its snapshot.
fn materialize(draft: ListingDraft, id: String, owner_id: &str, now: DateTime<Utc>) -> Listing {
    let mut listing = Listing {
        id,
        created_at: now,
        updated_at: now,
        make: draft.make,
        model: draft.model,
        year: draft.year,
        kilometers: draft.kilometers,
        vin: draft.vin,
        trim: draft.trim,
        auction_link: draft.auction_link,
        auction_date: draft.auction_date,
        current_high_bid: draft.current_high_bid,
        current_high_bidder: draft.current_high_bidder,
        damage_estimate: draft.damage_estimate,
        estimated_market_value: draft.estimated_market_value,
        recommended_max_bid: draft.recommended_max_bid,
        absolute_max_bid: draft.absolute_max_bid,
        towing_cost: draft.towing_cost,
        detailing_cost: draft.detailing_cost,
        extra_costs: draft.extra_costs,
        profit_margin: 0.0,
        estimated_total_investment: 0.0,
        main_points: draft.main_points,
        car_gurus_link: draft.car_gurus_link,
        repairs: draft.repairs,
        status: draft.status,
        added_by_id: owner_id.to_string(),
    };
    calculator::refresh(&mut listing);
    listing
}

fn newest_first(a: &Listing, b: &Listing) -> std::cmp::Ordering {
    b.created_at
        .cmp(&a.created_at)
        .then_with(|| a.id.cmp(&b.id))
}

fn insert_draft(
    table: &mut Table<'_, &'static str, &'static str>,
    draft: ListingDraft,
    owner_id: &str,
    now: DateTime<Utc>,
) -> AppResult<Listing> {
    let id = loop {
        let candidate = random_id(ID_LEN);
        if table.get(candidate.as_str())?.is_none() {
            break candidate;
        }
    };

    let listing = materialize(draft, id, owner_id, now);
    let listing_json = serde_json::to_string(&listing)?;
    table.insert(listing.id.as_str(), listing_json.as_str())?;
    Ok(listing)
}

/// CRUD operations over the listings table
#[derive(Clone, Copy)]
pub struct ListingRepository<'a> {
    db: &'a Database,
}

impl<'a> ListingRepository<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Persists a new listing owned by the calling admin
    ///
    /// # Arguments
    ///
    /// * `admin` - Proof that the caller passed the admin gate
    /// * `draft` - A validated creation payload
    ///
    /// # Returns
    ///
    /// The stored listing with its generated id, timestamps and derived
    /// financial fields.
    ///
    /// # Database Operations
    ///
    /// One write transaction on `TABLE_LISTINGS`; the id is regenerated until
    /// it is unused.
    pub fn create_listing(&self, admin: &AdminAccess, draft: ListingDraft) -> AppResult<Listing> {
        let write_txn = self.db.begin_write()?;
        let listing = {
            let mut table = write_txn.open_table(TABLE_LISTINGS)?;
            insert_draft(&mut table, draft, &admin.user().id, Utc::now())?
        };
        write_txn.commit()?;

        tracing::info!(
            listing_id = %listing.id,
            user_id = %admin.user().id,
            profit_margin = listing.profit_margin,
            "Listing created"
        );
        Ok(listing)
    }

    /// Persists every draft in a single transaction, or none of them
    ///
    /// All listings in one import share the same `createdAt`.
    pub fn import_listings(
        &self,
        admin: &AdminAccess,
        drafts: Vec<ListingDraft>,
    ) -> AppResult<Vec<Listing>> {
        let now = Utc::now();

        let write_txn = self.db.begin_write()?;
        let created = {
            let mut table = write_txn.open_table(TABLE_LISTINGS)?;
            drafts
                .into_iter()
                .map(|draft| insert_draft(&mut table, draft, &admin.user().id, now))
                .collect::<AppResult<Vec<_>>>()?
        };
        write_txn.commit()?;

        tracing::info!(
            count = created.len(),
            user_id = %admin.user().id,
            "Listings imported"
        );
        Ok(created)
    }

    /// Applies a partial update and re-derives the financial snapshot
    ///
    /// # Arguments
    ///
    /// * `admin` - Proof that the caller passed the admin gate
    /// * `id` - Listing id
    /// * `patch` - Validated fields to replace
    ///
    /// # Returns
    ///
    /// The merged listing, or `NotFound` when `id` does not exist.
    pub fn update_listing(
        &self,
        admin: &AdminAccess,
        id: &str,
        patch: ListingPatch,
    ) -> AppResult<Listing> {
        let write_txn = self.db.begin_write()?;
        let listing = {
            let mut table = write_txn.open_table(TABLE_LISTINGS)?;

            let existing = table.get(id)?.map(|guard| guard.value().to_string());
            let Some(existing) = existing else {
                return Err(AppError::not_found(ENTITY, id));
            };

            let mut listing: Listing = serde_json::from_str(&existing)?;
            patch.apply_to(&mut listing);
            calculator::refresh(&mut listing);
            listing.updated_at = Utc::now();

            let listing_json = serde_json::to_string(&listing)?;
            table.insert(id, listing_json.as_str())?;
            listing
        };
        write_txn.commit()?;

        tracing::info!(
            listing_id = %id,
            user_id = %admin.user().id,
            status = %listing.status,
            profit_margin = listing.profit_margin,
            "Listing updated"
        );
        Ok(listing)
    }

    /// Hard-deletes a listing and returns the removed record
    ///
    /// Returns `NotFound` without touching the table when `id` does not exist.
    pub fn delete_listing(&self, admin: &AdminAccess, id: &str) -> AppResult<Listing> {
        let write_txn = self.db.begin_write()?;
        let listing = {
            let mut table = write_txn.open_table(TABLE_LISTINGS)?;

            let removed = table.remove(id)?.map(|guard| guard.value().to_string());
            let Some(removed) = removed else {
                return Err(AppError::not_found(ENTITY, id));
            };
            serde_json::from_str::<Listing>(&removed)?
        };
        write_txn.commit()?;

        tracing::info!(listing_id = %id, user_id = %admin.user().id, "Listing deleted");
        Ok(listing)
    }

    /// Every listing regardless of status, newest first, with its creator.
    pub fn list_all_listings_for_admin(
        &self,
        _admin: &AdminAccess,
        status: Option<ListingStatus>,
    ) -> AppResult<Vec<AdminListing>> {
        let mut listings = self.read_all()?;
        if let Some(status) = status {
            listings.retain(|l| l.status == status);
        }
        listings.sort_by(newest_first);

        let users = load_users(self.db)?;
        Ok(listings
            .into_iter()
            .map(|listing| AdminListing {
                added_by: users.get(&listing.added_by_id).map(CreatorSummary::from),
                listing,
            })
            .collect())
    }

    /// Active listings only, highest profit margin first.
    pub fn list_active_listings(&self, _viewer: &Viewer) -> AppResult<Vec<Listing>> {
        let mut listings = self.read_all()?;
        listings.retain(|l| l.status == ListingStatus::Active);
        listings.sort_by(newest_first);
        SortBy::Profit.sort(&mut listings);
        Ok(listings)
    }

    /// Fetches one listing by id
    ///
    /// # Arguments
    ///
    /// * `viewer` - The authenticated caller
    /// * `id` - Listing id
    ///
    /// # Returns
    ///
    /// The listing when it is visible to the caller. Sold and expired
    /// listings exist only in the admin view, so a non-admin caller gets
    /// `NotFound` for them, the same as for an unknown id.
    pub fn get_listing(&self, viewer: &Viewer, id: &str) -> AppResult<Listing> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(TABLE_LISTINGS)?;

        let found = table.get(id)?.map(|guard| guard.value().to_string());
        let Some(json) = found else {
            return Err(AppError::not_found(ENTITY, id));
        };

        let listing: Listing = serde_json::from_str(&json)?;
        if listing.status != ListingStatus::Active && !viewer.user().is_admin {
            return Err(AppError::not_found(ENTITY, id));
        }
        Ok(listing)
    }

    fn read_all(&self) -> AppResult<Vec<Listing>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(TABLE_LISTINGS)?;

        let mut listings = Vec::new();
        for entry in table.iter()? {
            let (_, value) = entry?;
            listings.push(serde_json::from_str::<Listing>(value.value())?);
        }
        Ok(listings)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::TimeZone;
    use tempfile::NamedTempFile;

    use super::*;
    use crate::database::{init_db, upsert_user};
    use crate::middleware::{authenticate, require_admin};

    struct Fixture {
        _file: NamedTempFile,
        db: Database,
        admin: AdminAccess,
        viewer: Viewer,
    }

    fn fixture() -> Fixture {
        let file = NamedTempFile::new().unwrap();
        let db = init_db(file.path().to_str().unwrap()).unwrap();
        let admin_user = upsert_user(&db, "admin@example.com", "admin", true, "a").unwrap();
        let buyer = upsert_user(&db, "buyer@example.com", "buyer", false, "b").unwrap();
        Fixture {
            _file: file,
            admin: require_admin(Some(admin_user)).unwrap(),
            viewer: authenticate(Some(buyer)).unwrap(),
            db,
        }
    }

    fn draft(make: &str, market_value: f64, max_bid: f64) -> ListingDraft {
        ListingDraft {
            make: make.into(),
            model: "Model".into(),
            year: 2020,
            kilometers: 50_000,
            vin: None,
            trim: None,
            auction_link: "https://auctions.example.com/lot/1".into(),
            auction_date: Utc.with_ymd_and_hms(2025, 11, 20, 15, 0, 0).unwrap(),
            current_high_bid: None,
            current_high_bidder: None,
            damage_estimate: 500.0,
            estimated_market_value: market_value,
            recommended_max_bid: max_bid,
            absolute_max_bid: max_bid + 1_000.0,
            towing_cost: 200.0,
            detailing_cost: 100.0,
            extra_costs: 50.0,
            main_points: vec!["Clean title".into()],
            car_gurus_link: None,
            repairs: None,
            status: ListingStatus::Active,
        }
    }

    #[test]
    fn create_derives_snapshot_and_owner() {
        let fx = fixture();
        let repo = ListingRepository::new(&fx.db);

        let listing = repo.create_listing(&fx.admin, draft("Toyota", 12_000.0, 8_000.0)).unwrap();

        assert_eq!(listing.estimated_total_investment, 8_000.0 + 200.0 + 100.0 + 500.0 + 50.0);
        assert_eq!(listing.profit_margin, 12_000.0 - 8_850.0);
        assert_eq!(listing.added_by_id, fx.admin.user().id);
        assert_eq!(listing.id.len(), ID_LEN);
        assert_eq!(repo.get_listing(&fx.viewer, &listing.id).unwrap(), listing);
    }

    #[test]
    fn update_applies_patch_and_rederives() {
        let fx = fixture();
        let repo = ListingRepository::new(&fx.db);
        let listing = repo.create_listing(&fx.admin, draft("Toyota", 12_000.0, 8_000.0)).unwrap();

        let patch = ListingPatch {
            recommended_max_bid: Some(9_000.0),
            status: Some(ListingStatus::Sold),
            ..ListingPatch::default()
        };
        let updated = repo.update_listing(&fx.admin, &listing.id, patch).unwrap();

        assert_eq!(updated.make, "Toyota");
        assert_eq!(updated.status, ListingStatus::Sold);
        assert_eq!(updated.estimated_total_investment, 9_850.0);
        assert_eq!(updated.profit_margin, 2_150.0);
        assert_eq!(updated.created_at, listing.created_at);
        assert!(updated.updated_at >= listing.updated_at);
    }

    #[test]
    fn update_and_delete_unknown_id_are_not_found() {
        let fx = fixture();
        let repo = ListingRepository::new(&fx.db);
        repo.create_listing(&fx.admin, draft("Toyota", 12_000.0, 8_000.0)).unwrap();

        assert_matches!(
            repo.update_listing(&fx.admin, "missing", ListingPatch::default()),
            Err(AppError::NotFound { .. })
        );
        assert_matches!(repo.delete_listing(&fx.admin, "missing"), Err(AppError::NotFound { .. }));
        assert_eq!(repo.list_all_listings_for_admin(&fx.admin, None).unwrap().len(), 1);
    }

    #[test]
    fn delete_returns_removed_record() {
        let fx = fixture();
        let repo = ListingRepository::new(&fx.db);
        let listing = repo.create_listing(&fx.admin, draft("Toyota", 12_000.0, 8_000.0)).unwrap();

        let deleted = repo.delete_listing(&fx.admin, &listing.id).unwrap();
        assert_eq!(deleted, listing);
        assert_matches!(repo.get_listing(&fx.viewer, &listing.id), Err(AppError::NotFound { .. }));
    }

    #[test]
    fn active_listings_exclude_other_statuses_and_sort_by_profit() {
        let fx = fixture();
        let repo = ListingRepository::new(&fx.db);

        // margins: 500, -200, 1000 (investment = bid + 850)
        repo.create_listing(&fx.admin, draft("A", 9_350.0, 8_000.0)).unwrap();
        repo.create_listing(&fx.admin, draft("B", 8_650.0, 8_000.0)).unwrap();
        repo.create_listing(&fx.admin, draft("C", 9_850.0, 8_000.0)).unwrap();
        let sold = repo.create_listing(&fx.admin, draft("D", 50_000.0, 8_000.0)).unwrap();
        repo.update_listing(
            &fx.admin,
            &sold.id,
            ListingPatch {
                status: Some(ListingStatus::Sold),
                ..ListingPatch::default()
            },
        )
        .unwrap();

        let active = repo.list_active_listings(&fx.viewer).unwrap();
        let margins: Vec<f64> = active.iter().map(|l| l.profit_margin).collect();
        assert_eq!(margins, vec![1_000.0, 500.0, -200.0]);
        assert!(active.iter().all(|l| l.status == ListingStatus::Active));
    }

    #[test]
    fn sold_listing_is_hidden_from_non_admin_lookup() {
        let fx = fixture();
        let repo = ListingRepository::new(&fx.db);
        let listing = repo.create_listing(&fx.admin, draft("Toyota", 12_000.0, 8_000.0)).unwrap();
        repo.update_listing(
            &fx.admin,
            &listing.id,
            ListingPatch {
                status: Some(ListingStatus::Sold),
                ..ListingPatch::default()
            },
        )
        .unwrap();

        assert_matches!(
            repo.get_listing(&fx.viewer, &listing.id),
            Err(AppError::NotFound { .. })
        );

        let admin_viewer = authenticate(Some(fx.admin.user().clone())).unwrap();
        let found = repo.get_listing(&admin_viewer, &listing.id).unwrap();
        assert_eq!(found.status, ListingStatus::Sold);
    }

    #[test]
    fn admin_view_includes_creator_and_filters_status() {
        let fx = fixture();
        let repo = ListingRepository::new(&fx.db);
        let first = repo.create_listing(&fx.admin, draft("A", 10_000.0, 5_000.0)).unwrap();
        repo.update_listing(
            &fx.admin,
            &first.id,
            ListingPatch {
                status: Some(ListingStatus::Expired),
                ..ListingPatch::default()
            },
        )
        .unwrap();
        repo.create_listing(&fx.admin, draft("B", 10_000.0, 5_000.0)).unwrap();

        let all = repo.list_all_listings_for_admin(&fx.admin, None).unwrap();
        assert_eq!(all.len(), 2);
        assert!(all[0].listing.created_at >= all[1].listing.created_at);
        assert_eq!(
            all[0].added_by,
            Some(CreatorSummary {
                email: "admin@example.com".into(),
                username: "admin".into(),
            })
        );

        let expired = repo
            .list_all_listings_for_admin(&fx.admin, Some(ListingStatus::Expired))
            .unwrap();
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].listing.id, first.id);
    }

    #[test]
    fn import_persists_every_draft() {
        let fx = fixture();
        let repo = ListingRepository::new(&fx.db);

        let created = repo
            .import_listings(
                &fx.admin,
                vec![draft("A", 10_000.0, 5_000.0), draft("B", 7_000.0, 5_000.0)],
            )
            .unwrap();

        assert_eq!(created.len(), 2);
        assert_eq!(repo.list_active_listings(&fx.viewer).unwrap().len(), 2);
    }
}
