use std::collections::{BTreeSet, HashMap};

use pestquote_core::{
    AddOnService, CatalogStore, DiscountConfig, LineItemTarget, QuoteError, ServicePlan,
};
use pestquote_pricing::LineRequest;
use tracing::warn;
use uuid::Uuid;

/// Catalog records needed to price one request.
#[derive(Debug, Default)]
pub struct ResolvedCatalog {
    pub plans: HashMap<Uuid, ServicePlan>,
    pub add_ons: HashMap<Uuid, AddOnService>,
    pub discounts: HashMap<Uuid, DiscountConfig>,
}

/// Loads every plan, add-on and discount referenced by `lines` that belongs to
/// `company_id`.
///
/// A missing or foreign plan or add-on fails the whole request. Discounts that
/// cannot be loaded or belong to another company are left out, and the
/// affected lines fall back to manual values.
pub async fn resolve_catalog<S>(
    store: &S,
    company_id: Uuid,
    lines: &[LineRequest],
) -> Result<ResolvedCatalog, QuoteError>
where
    S: CatalogStore + ?Sized,
{
    let mut plan_ids = BTreeSet::new();
    let mut add_on_ids = BTreeSet::new();
    let mut discount_ids = BTreeSet::new();

    for line in lines {
        match line.target {
            LineItemTarget::ServicePlan(id) => plan_ids.insert(id),
            LineItemTarget::AddOn(id) => add_on_ids.insert(id),
        };
        if let Some(id) = line.discount.catalog_id() {
            discount_ids.insert(id);
        }
    }

    let plan_ids: Vec<Uuid> = plan_ids.into_iter().collect();
    let plans: HashMap<Uuid, ServicePlan> = store
        .service_plans(&plan_ids)
        .await
        .map_err(QuoteError::unavailable("load service plans"))?
        .into_iter()
        .filter(|plan| owned_by(company_id, plan.company_id, "service plan", plan.id))
        .map(|plan| (plan.id, plan))
        .collect();
    if let Some(missing) = plan_ids.iter().find(|id| !plans.contains_key(*id)) {
        return Err(QuoteError::NotFound(format!(
            "service plan {missing} not found"
        )));
    }

    let add_ons = if add_on_ids.is_empty() {
        HashMap::new()
    } else {
        let add_on_ids: Vec<Uuid> = add_on_ids.into_iter().collect();
        let add_ons: HashMap<Uuid, AddOnService> = store
            .add_ons(&add_on_ids)
            .await
            .map_err(QuoteError::unavailable("load add-on services"))?
            .into_iter()
            .filter(|add_on| owned_by(company_id, add_on.company_id, "add-on service", add_on.id))
            .map(|add_on| (add_on.id, add_on))
            .collect();
        if let Some(missing) = add_on_ids.iter().find(|id| !add_ons.contains_key(*id)) {
            return Err(QuoteError::NotFound(format!(
                "add-on service {missing} not found"
            )));
        }
        add_ons
    };

    let discounts = if discount_ids.is_empty() {
        HashMap::new()
    } else {
        let discount_ids: Vec<Uuid> = discount_ids.into_iter().collect();
        match store.discounts(&discount_ids).await {
            Ok(discounts) => discounts
                .into_iter()
                .filter(|discount| owned_by(company_id, discount.company_id, "discount", discount.id))
                .map(|discount| (discount.id, discount))
                .collect(),
            Err(err) => {
                warn!("discount lookup failed, pricing without catalog discounts: {err:#}");
                HashMap::new()
            }
        }
    };

    Ok(ResolvedCatalog {
        plans,
        add_ons,
        discounts,
    })
}

fn owned_by(company_id: Uuid, owner_id: Uuid, kind: &str, id: Uuid) -> bool {
    if owner_id == company_id {
        return true;
    }
    warn!("ignoring {kind} {id} owned by company {owner_id}, not {company_id}");
    false
}
