//! End-to-end checkout runs against in-memory collaborators.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use regflow_checkout::{
    AvailabilityTracker, CatalogResolver, CheckoutConfig, CheckoutError, CheckoutResult,
    CheckoutService, DraftStore, FeeSettings, JsonFileDraftStore, MemoryDraftStore,
    PaymentGateway, PaymentReceipt, StaticCatalogResolver,
};
use regflow_core::registration::{Registration, RegistrationStatus};
use regflow_core::{
    AttendeePatch, AttendeeType, AvailabilityUpdate, BillingPatch, Catalog, CountryRef,
    EngineError, FeeBasis, FeeMode, Item, ItemId, ItemStatus, Money, Package, PackageId,
    PaymentRequest, RateTable, RegistrationMode, SelectionKey, WizardStep,
};
use tokio::sync::Mutex;

const FUNCTION: &str = "grand-installation";

// =============================================================================
// Test Collaborators
// =============================================================================

#[derive(Default)]
struct RecordingGateway {
    charges: Mutex<Vec<PaymentRequest>>,
}

#[async_trait]
impl PaymentGateway for RecordingGateway {
    async fn charge(&self, request: &PaymentRequest) -> CheckoutResult<PaymentReceipt> {
        let mut charges = self.charges.lock().await;
        charges.push(request.clone());
        Ok(PaymentReceipt {
            reference: format!("CONF-{:04}", charges.len()),
            amount: request.total_payable_minor_units,
            currency: request.currency.clone(),
            charged_at: Utc::now(),
        })
    }
}

struct DecliningGateway;

#[async_trait]
impl PaymentGateway for DecliningGateway {
    async fn charge(&self, _request: &PaymentRequest) -> CheckoutResult<PaymentReceipt> {
        Err(CheckoutError::PaymentDeclined("card declined".into()))
    }
}

/// Takes a fixed amount regardless of what was requested.
struct ShortChargingGateway;

#[async_trait]
impl PaymentGateway for ShortChargingGateway {
    async fn charge(&self, request: &PaymentRequest) -> CheckoutResult<PaymentReceipt> {
        Ok(PaymentReceipt {
            reference: "ch_short".into(),
            amount: Money::from_minor(10_000),
            currency: request.currency.clone(),
            charged_at: Utc::now(),
        })
    }
}

/// A host resolver that hands back whatever it was given, unchecked.
struct HostResolver(Catalog);

#[async_trait]
impl CatalogResolver for HostResolver {
    async fn resolve(&self, _function_id: &str) -> CheckoutResult<Catalog> {
        Ok(self.0.clone())
    }
}

// =============================================================================
// Fixtures
// =============================================================================

fn catalog() -> Catalog {
    let members = BTreeSet::from([
        AttendeeType::PrimaryMember,
        AttendeeType::SecondaryMember,
        AttendeeType::OfficialDelegate,
    ]);
    let everyone: BTreeSet<AttendeeType> = AttendeeType::ALL.into_iter().collect();
    Catalog::new(
        FUNCTION,
        vec![
            Item {
                id: ItemId::from("installation"),
                name: "Installation Ceremony".into(),
                description: None,
                price: Money::from_minor(12_000),
                eligibility: members.clone(),
                available: None,
                status: ItemStatus::Active,
            },
            Item {
                id: ItemId::from("banquet"),
                name: "Grand Banquet".into(),
                description: None,
                price: Money::from_minor(18_000),
                eligibility: everyone,
                available: None,
                status: ItemStatus::Active,
            },
        ],
        vec![Package {
            id: PackageId::from("weekend"),
            name: "Full Weekend".into(),
            price: Money::from_minor(25_000),
            includes: vec![ItemId::from("installation")],
            eligibility: members,
            description: None,
            status: ItemStatus::Active,
        }],
    )
}

fn config() -> CheckoutConfig {
    CheckoutConfig {
        fees: FeeSettings {
            mode: FeeMode::PassedToCustomer,
            basis: FeeBasis::Subtotal,
            domestic: Some(RateTable::new(175, 30)),
            international: Some(RateTable::new(350, 30)),
        },
        ..Default::default()
    }
}

fn service(
    gateway: Arc<dyn PaymentGateway>,
    drafts: Arc<dyn DraftStore>,
) -> CheckoutService {
    let catalogs = Arc::new(StaticCatalogResolver::with_catalog(catalog()));
    CheckoutService::new(FUNCTION, config(), catalogs, gateway, drafts).unwrap()
}

/// Walks a single-member registration to the payment step.
async fn at_payment(service: &CheckoutService, country: &str, selection: Selecting) -> Registration {
    let catalog = service.catalog().await.unwrap();
    let schedule = service.config().fee_schedule();
    let mut reg = service.start(RegistrationMode::Individual);

    let primary = reg.add_attendee(AttendeeType::PrimaryMember).unwrap();
    reg.update_attendee(
        &primary,
        AttendeePatch {
            first_name: Some("William".into()),
            last_name: Some("Preston".into()),
            email: Some("w.preston@example.org".into()),
            ..Default::default()
        },
    )
    .unwrap();
    reg.advance(&catalog, &schedule).unwrap();

    let key = SelectionKey::attendee(&primary);
    match selection {
        Selecting::Weekend => reg
            .select_package(&key, &PackageId::from("weekend"), &catalog)
            .unwrap(),
        Selecting::Banquet => reg
            .toggle_item(&key, &ItemId::from("banquet"), &catalog)
            .unwrap(),
    }
    reg.advance(&catalog, &schedule).unwrap();
    assert_eq!(reg.advance(&catalog, &schedule).unwrap(), WizardStep::Payment);

    reg.bill_to_primary().unwrap();
    reg.update_billing(BillingPatch {
        address_line1: Some("1 Lodge St".into()),
        city: Some("Sydney".into()),
        postcode: Some("2000".into()),
        country: Some(CountryRef::new(country, country)),
        ..Default::default()
    })
    .unwrap();
    reg
}

enum Selecting {
    Weekend,
    Banquet,
}

// =============================================================================
// Tests
// =============================================================================

#[tokio::test]
async fn test_submit_charges_and_confirms() {
    let gateway = Arc::new(RecordingGateway::default());
    let drafts = Arc::new(MemoryDraftStore::new());
    let service = service(gateway.clone(), drafts.clone());

    let mut reg = at_payment(&service, "AU", Selecting::Weekend).await;
    service.save_draft(&reg).await.unwrap();
    assert_eq!(drafts.len().await, 1);

    let quote = service.quote(&reg).await.unwrap();
    assert_eq!(quote.totals.total.minor(), 25_000 + 438 + 30);

    let confirmation = service.submit(&mut reg).await.unwrap();
    assert_eq!(confirmation.confirmation_number, "CONF-0001");
    assert_eq!(confirmation.order, quote);
    assert_eq!(reg.step(), WizardStep::Confirmation);
    assert_eq!(reg.status(), RegistrationStatus::Completed);
    assert_eq!(reg.confirmation_number(), Some("CONF-0001"));

    let charges = gateway.charges.lock().await;
    assert_eq!(charges.len(), 1);
    assert_eq!(charges[0].total_payable_minor_units.minor(), 25_468);
    assert_eq!(charges[0].currency, "AUD");
    assert_eq!(charges[0].billing_details.first_name, "William");
    drop(charges);

    assert!(drafts.is_empty().await);
    assert!(matches!(
        service.submit(&mut reg).await,
        Err(CheckoutError::AlreadyComplete(_))
    ));
    assert!(matches!(
        service.save_draft(&reg).await,
        Err(CheckoutError::AlreadyComplete(_))
    ));
}

#[tokio::test]
async fn test_international_billing_uses_international_rate() {
    let gateway = Arc::new(RecordingGateway::default());
    let service = service(gateway.clone(), Arc::new(MemoryDraftStore::new()));

    let mut reg = at_payment(&service, "NZ", Selecting::Weekend).await;
    let confirmation = service.submit(&mut reg).await.unwrap();
    assert_eq!(confirmation.order.totals.fee.minor(), 875 + 30);
    assert_eq!(confirmation.receipt.amount.minor(), 25_905);
}

#[tokio::test]
async fn test_declined_payment_leaves_registration_and_draft() {
    let drafts = Arc::new(MemoryDraftStore::new());
    let service = service(Arc::new(DecliningGateway), drafts.clone());

    let mut reg = at_payment(&service, "AU", Selecting::Weekend).await;
    service.save_draft(&reg).await.unwrap();
    let before = reg.clone();

    let err = service.submit(&mut reg).await.unwrap_err();
    assert!(matches!(err, CheckoutError::PaymentDeclined(_)));
    assert!(!err.is_retryable());
    assert_eq!(reg, before);

    let resumed = service.resume(reg.id()).await.unwrap();
    assert_eq!(resumed.step(), WizardStep::Payment);
    assert_eq!(resumed.attendees().len(), 1);
}

#[tokio::test]
async fn test_sold_out_after_review_blocks_submission() {
    let gateway = Arc::new(RecordingGateway::default());
    let tracker = AvailabilityTracker::new();
    let service =
        service(gateway.clone(), Arc::new(MemoryDraftStore::new())).with_availability(tracker.clone());

    let mut reg = at_payment(&service, "AU", Selecting::Banquet).await;

    let feed = tokio_stream::iter(vec![AvailabilityUpdate {
        item_id: ItemId::from("banquet"),
        available_count: 0,
        is_sold_out: true,
    }]);
    assert_eq!(tracker.spawn(feed).await.unwrap(), 1);

    let err = service.submit(&mut reg).await.unwrap_err();
    assert!(matches!(
        err,
        CheckoutError::Engine(EngineError::Unavailable { .. })
    ));
    assert_eq!(reg.step(), WizardStep::Payment);
    assert!(gateway.charges.lock().await.is_empty());
}

#[tokio::test]
async fn test_missing_rate_table_stops_checkout() {
    let mut config = config();
    config.fees.international = None;

    let err = CheckoutService::new(
        FUNCTION,
        config,
        Arc::new(StaticCatalogResolver::with_catalog(catalog())),
        Arc::new(RecordingGateway::default()),
        Arc::new(MemoryDraftStore::new()),
    )
    .err()
    .unwrap();
    assert!(err.is_config_error());
}

#[tokio::test]
async fn test_resume_from_file_store() {
    let dir = tempfile::tempdir().unwrap();
    let first = service(
        Arc::new(RecordingGateway::default()),
        Arc::new(JsonFileDraftStore::new(dir.path())),
    );

    let mut reg = first.start(RegistrationMode::Lodge);
    let master = reg.add_attendee(AttendeeType::PrimaryMember).unwrap();
    reg.add_partner(&master, AttendeeType::Partner).unwrap();
    first.save_draft(&reg).await.unwrap();

    // A fresh process pointed at the same directory.
    let second = service(
        Arc::new(RecordingGateway::default()),
        Arc::new(JsonFileDraftStore::new(dir.path())),
    );
    let resumed = second.resume(reg.id()).await.unwrap();
    assert_eq!(resumed.mode(), RegistrationMode::Lodge);
    assert_eq!(resumed.attendees().len(), 2);
    assert_eq!(resumed.step(), WizardStep::AttendeeDetails);
}

#[tokio::test]
async fn test_abandon_has_no_side_effects_beyond_the_draft() {
    let gateway = Arc::new(RecordingGateway::default());
    let drafts = Arc::new(MemoryDraftStore::new());
    let service = service(gateway.clone(), drafts.clone());

    let reg = at_payment(&service, "AU", Selecting::Weekend).await;
    service.save_draft(&reg).await.unwrap();
    service.abandon(reg.id()).await.unwrap();

    assert!(matches!(
        service.resume(reg.id()).await,
        Err(CheckoutError::DraftNotFound(_))
    ));
    assert!(gateway.charges.lock().await.is_empty());
    assert!(service.availability().is_empty().await);
}

#[tokio::test]
async fn test_host_resolver_catalog_is_checked() {
    let mut bad = catalog();
    bad.items.push(Item {
        id: ItemId::from("credit"),
        name: "Credit".into(),
        description: None,
        price: Money::from_minor(-6_000),
        eligibility: AttendeeType::ALL.into_iter().collect(),
        available: None,
        status: ItemStatus::Active,
    });

    let good = service(
        Arc::new(RecordingGateway::default()),
        Arc::new(MemoryDraftStore::new()),
    );
    let reg = at_payment(&good, "AU", Selecting::Weekend).await;

    let gateway = Arc::new(RecordingGateway::default());
    let hosted = CheckoutService::new(
        FUNCTION,
        config(),
        Arc::new(HostResolver(bad)),
        gateway.clone(),
        Arc::new(MemoryDraftStore::new()),
    )
    .unwrap();

    assert!(matches!(
        hosted.catalog().await,
        Err(CheckoutError::CatalogUnavailable { .. })
    ));
    assert!(matches!(
        hosted.quote(&reg).await,
        Err(CheckoutError::CatalogUnavailable { .. })
    ));
    let mut reg = reg;
    assert!(hosted.submit(&mut reg).await.is_err());
    assert_eq!(reg.step(), WizardStep::Payment);
    assert!(gateway.charges.lock().await.is_empty());
}

#[tokio::test]
async fn test_charge_for_wrong_amount_is_not_confirmed() {
    let drafts = Arc::new(MemoryDraftStore::new());
    let service = service(Arc::new(ShortChargingGateway), drafts.clone());

    let mut reg = at_payment(&service, "AU", Selecting::Weekend).await;
    service.save_draft(&reg).await.unwrap();

    match service.submit(&mut reg).await {
        Err(CheckoutError::AmountMismatch {
            reference,
            requested,
            charged,
        }) => {
            assert_eq!(reference, "ch_short");
            assert_eq!(requested, 25_468);
            assert_eq!(charged, 10_000);
        }
        other => panic!("expected AmountMismatch, got {:?}", other),
    }
    assert_eq!(reg.step(), WizardStep::Payment);
    assert_eq!(reg.status(), RegistrationStatus::Draft);
    assert_eq!(drafts.len().await, 1);
}
