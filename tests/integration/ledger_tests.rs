//! Ledger and reconciler tests against a real database

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use indexmap::IndexMap;
use sqlx::postgres::PgPoolOptions;

use quartermaster_server::{
    config::{
        AppConfig, DatabaseConfig, EmailConfig, ImportConfig, LoggingConfig, SchedulerConfig,
        ServerConfig,
    },
    error::{AppError, AppResult},
    models::{
        category::CreateCategory,
        enums::Condition,
        item::{CreateItem, Item},
        loan::{CloseLoan, CreateLoan, LoanFilter},
        member::{CreateMember, Member},
        packing_list::{AddPackingListEntry, CreatePackingList, UpdatePackingListEntry},
        RawRow,
    },
    repository::{loans::NewLoan, Repository},
    services::{
        overdue::{scan_and_notify, Notifier},
        reports::overdue_export,
        Services,
    },
};

struct Harness {
    repository: Repository,
    services: Services,
    tag: String,
}

async fn harness() -> Harness {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&url)
        .await
        .expect("Failed to connect to database");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    let config = AppConfig {
        server: ServerConfig::default(),
        database: DatabaseConfig {
            url,
            ..DatabaseConfig::default()
        },
        logging: LoggingConfig::default(),
        email: EmailConfig::default(),
        scheduler: SchedulerConfig::default(),
        import: ImportConfig::default(),
    };
    let repository = Repository::new(pool);
    let services = Services::new(repository.clone(), &config);
    let tag = format!("{}", Utc::now().timestamp_nanos_opt().unwrap_or_default());

    Harness {
        repository,
        services,
        tag,
    }
}

impl Harness {
    async fn item(&self, name: &str) -> Item {
        let category = self
            .services
            .catalog
            .create_category(CreateCategory {
                name: format!("Camping {} {}", name, self.tag),
                description: None,
                color: None,
            })
            .await
            .expect("category");
        self.services
            .catalog
            .create_item(CreateItem {
                name: format!("{} {}", name, self.tag),
                description: None,
                serial_number: None,
                category_id: category.id,
                condition: Some(Condition::Good),
                notes: None,
            })
            .await
            .expect("item")
    }

    async fn member(&self, name: &str) -> Member {
        self.services
            .members
            .create_member(CreateMember {
                name: name.to_string(),
                email: Some(format!("{}.{}@example.org", name.to_lowercase(), self.tag)),
                phone: None,
                role: None,
            })
            .await
            .expect("member")
    }

    fn checkout(&self, item: &Item, member: &Member) -> CreateLoan {
        CreateLoan {
            item_id: item.id,
            member_id: member.id,
            expected_return: Utc::now() + Duration::days(7),
            condition_out: Condition::Good,
            notes: None,
            actor: "desk".to_string(),
        }
    }
}

fn close(condition_in: Condition) -> CloseLoan {
    CloseLoan {
        condition_in,
        notes: Some("back in one piece".to_string()),
        actor: "desk".to_string(),
    }
}

fn row(pairs: &[(&str, &str)]) -> RawRow {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), Some(v.to_string())))
        .collect::<IndexMap<_, _>>()
}

#[tokio::test]
#[ignore]
async fn test_checkout_lifecycle() {
    let h = harness().await;
    let tent = h.item("Tent").await;
    let alice = h.member("Alice").await;

    let details = h.services.catalog.get_item(tent.id).await.unwrap();
    assert!(details.is_available);
    assert!(tent.scan_token.starts_with("QM"));
    assert!(details.scan_url.ends_with(&format!("/scan?item={}", tent.scan_token)));

    let loan = h.services.loans.checkout(h.checkout(&tent, &alice)).await.unwrap();
    assert!(loan.loan.is_open());
    assert!(!h.services.catalog.get_item(tent.id).await.unwrap().is_available);

    let second = h.services.loans.checkout(h.checkout(&tent, &alice)).await;
    assert!(matches!(second, Err(AppError::Conflict(ref m)) if m == "item already on loan"));

    let closed = h.services.loans.check_in(loan.loan.id, close(Condition::Fair)).await.unwrap();
    let closed_at = closed.loan.closed_at.expect("closed");
    assert!(closed_at >= closed.loan.opened_at);
    assert!(h.services.catalog.get_item(tent.id).await.unwrap().is_available);

    let history = h.services.loans.list_item_history(tent.id).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].loan.condition_out, Condition::Good);
    assert_eq!(history[0].loan.condition_in, Some(Condition::Fair));

    let again = h.services.loans.check_in(loan.loan.id, close(Condition::Fair)).await;
    assert!(matches!(again, Err(AppError::NotFound(_))));

    let unknown = h.services.loans.check_in(i32::MAX, close(Condition::Good)).await;
    assert!(matches!(unknown, Err(AppError::NotFound(_))));
}

#[tokio::test]
#[ignore]
async fn test_concurrent_checkouts_have_one_winner() {
    let h = harness().await;
    let stove = h.item("Stove").await;
    let bob = h.member("Bob").await;
    let carol = h.member("Carol").await;

    for _ in 0..5 {
        let (first, second) = tokio::join!(
            h.services.loans.checkout(h.checkout(&stove, &bob)),
            h.services.loans.checkout(h.checkout(&stove, &carol)),
        );

        let winners: Vec<_> = [&first, &second].into_iter().filter(|r| r.is_ok()).collect();
        assert_eq!(winners.len(), 1);
        let loser = if first.is_ok() { &second } else { &first };
        assert!(matches!(loser, Err(AppError::Conflict(_))));

        let open = h.services.loans.list_loans(LoanFilter::Active).await.unwrap();
        assert_eq!(open.iter().filter(|l| l.loan.item_id == stove.id).count(), 1);

        let loan_id = match (first, second) {
            (Ok(loan), _) | (_, Ok(loan)) => loan.loan.id,
            _ => unreachable!(),
        };
        h.services.loans.check_in(loan_id, close(Condition::Good)).await.unwrap();
    }
}

#[tokio::test]
#[ignore]
async fn test_deactivated_item_cannot_be_checked_out() {
    let h = harness().await;
    let lantern = h.item("Lantern").await;
    let dave = h.member("Dave").await;

    h.services.catalog.deactivate_item(lantern.id).await.unwrap();
    let result = h.services.loans.checkout(h.checkout(&lantern, &dave)).await;
    assert!(matches!(result, Err(AppError::Validation(_))));

    let missing = CreateLoan {
        item_id: i32::MAX,
        ..h.checkout(&lantern, &dave)
    };
    assert!(matches!(
        h.services.loans.checkout(missing).await,
        Err(AppError::NotFound(_))
    ));
}

/// Open a loan whose due date has already passed
async fn overdue_loan(h: &Harness, item: &Item, member: &Member, overdue_by: Duration) -> i32 {
    let now = Utc::now();
    h.repository
        .loans
        .open(&NewLoan {
            item_id: item.id,
            member_id: member.id,
            opened_at: now - Duration::days(10),
            expected_return: now - overdue_by,
            condition_out: Condition::Good,
            notes: None,
            opened_by: "desk".to_string(),
        })
        .await
        .unwrap()
        .id
}

#[tokio::test]
#[ignore]
async fn test_overdue_listing_and_export_agree() {
    let h = harness().await;
    let kayak = h.item("Kayak").await;
    let erin = h.member("Erin").await;
    let loan_id = overdue_loan(&h, &kayak, &erin, Duration::hours(25)).await;

    let now = Utc::now();
    let overdue = h.services.loans.list_overdue(now).await.unwrap();
    let listed = overdue
        .iter()
        .find(|l| l.loan.id == loan_id)
        .expect("loan listed as overdue");
    assert!(listed.is_overdue);

    let export = overdue_export(&overdue, now);
    let row = export
        .rows
        .iter()
        .find(|r| r[0] == kayak.name)
        .expect("loan exported as overdue");
    assert_eq!(row[5], "1");
    assert_eq!(export.rows.len(), overdue.len());
}

#[derive(Default)]
struct RecordingNotifier {
    sent: Mutex<Vec<String>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, _address: &str, item_name: &str, _member: &str, _due: &str) -> AppResult<()> {
        self.sent.lock().unwrap().push(item_name.to_string());
        Ok(())
    }
}

#[tokio::test]
#[ignore]
async fn test_overdue_notice_is_sent_once() {
    let h = harness().await;
    let canoe = h.item("Canoe").await;
    let frank = h.member("Frank").await;
    let loan_id = overdue_loan(&h, &canoe, &frank, Duration::days(2)).await;

    let notifier = RecordingNotifier::default();
    scan_and_notify(&h.repository.loans, &notifier, Utc::now()).await.unwrap();
    scan_and_notify(&h.repository.loans, &notifier, Utc::now()).await.unwrap();

    let sent = notifier.sent.lock().unwrap();
    assert_eq!(sent.iter().filter(|name| **name == canoe.name).count(), 1);
    drop(sent);

    let loan = h.repository.loans.get_by_id(loan_id).await.unwrap();
    assert!(loan.notification_sent);
}

#[tokio::test]
#[ignore]
async fn test_member_import_reports_duplicate_email() {
    let h = harness().await;
    let existing = h.member("Grace").await;
    let taken = existing.email.clone().unwrap();

    let rows = vec![
        row(&[("name", "Heidi"), ("email", &format!("heidi.{}@example.org", h.tag))]),
        row(&[("name", "Ivan"), ("email", &taken)]),
        row(&[("name", "Judy"), ("role", "leader")]),
    ];

    let report = h.services.import.import_members(rows).await.unwrap();

    assert_eq!(report.success, 2);
    assert_eq!(report.failed, 1);
    assert_eq!(report.errors, vec![format!("Row 3: Email '{}' already exists", taken)]);
}

#[tokio::test]
#[ignore]
async fn test_item_import_is_not_idempotent_on_serial() {
    let h = harness().await;
    let serial = format!("SN-{}", h.tag);
    let category = format!("Imported {}", h.tag);
    let rows = || {
        vec![row(&[
            ("name", "Headlamp"),
            ("category", category.as_str()),
            ("serial_number", serial.as_str()),
            ("condition", "excellent"),
        ])]
    };

    let first = h.services.import.import_items(rows()).await.unwrap();
    assert_eq!(first.success, 1);
    assert_eq!(first.created[0].condition, Condition::Excellent);

    let second = h.services.import.import_items(rows()).await.unwrap();
    assert_eq!(second.success, 0);
    assert_eq!(second.failed, 1);
    assert_eq!(
        second.errors,
        vec![format!("Row 2: Serial number '{}' already exists", serial)]
    );

    let categories = h.services.catalog.list_categories().await.unwrap();
    let created: Vec<_> = categories
        .iter()
        .filter(|c| c.category.name.eq_ignore_ascii_case(&category))
        .collect();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].category.description.as_deref(), Some("Auto-created from CSV import"));
}

#[tokio::test]
#[ignore]
async fn test_csv_import_creates_rows_and_warns_on_unknown_columns() {
    let h = harness().await;
    let csv = format!(
        "Name,Category,Serial Number,Colour\nTarp,Shelter {tag},TARP-{tag},blue\n,Shelter {tag},,\n",
        tag = h.tag
    );

    let report = h.services.import.import_items_csv(csv.as_bytes()).await.unwrap();

    assert_eq!(report.success, 1);
    assert_eq!(report.errors, vec!["Row 3: Missing required field 'name'".to_string()]);
    assert_eq!(report.warnings, vec!["Ignored unknown column 'Colour'".to_string()]);

    let empty = h.services.import.import_items_csv(b"name,category\n").await;
    assert!(matches!(empty, Err(AppError::Validation(_))));
}

#[tokio::test]
#[ignore]
async fn test_packing_list_entries_and_cascade_delete() {
    let h = harness().await;
    let tent = h.item("Tent").await;
    let lists = &h.services.packing_lists;

    let list = lists
        .create(CreatePackingList {
            name: format!("Weekend camp {}", h.tag),
            description: None,
            outing_date: None,
        })
        .await
        .unwrap();

    let missing_item = lists
        .add_entry(
            list.id,
            AddPackingListEntry {
                item_id: -1,
                quantity: Some(2),
                notes: None,
            },
        )
        .await;
    assert!(matches!(missing_item, Err(AppError::NotFound(_))));

    let entry = lists
        .add_entry(
            list.id,
            AddPackingListEntry {
                item_id: tent.id,
                quantity: None,
                notes: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(entry.quantity, 1);
    assert_eq!(entry.item_name, tent.name);

    let packed = lists
        .update_entry(
            list.id,
            entry.id,
            UpdatePackingListEntry {
                is_packed: Some(true),
                ..UpdatePackingListEntry::default()
            },
        )
        .await
        .unwrap();
    assert!(packed.is_packed);

    let details = lists.get(list.id).await.unwrap();
    assert_eq!(details.entries.len(), 1);

    lists.delete(list.id).await.unwrap();

    assert!(matches!(lists.get(list.id).await, Err(AppError::NotFound(_))));
    let orphaned: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM packing_list_entries WHERE packing_list_id = $1")
            .bind(list.id)
            .fetch_one(&h.repository.pool)
            .await
            .unwrap();
    assert_eq!(orphaned, 0);

    // Packing never touches the ledger
    assert!(h.services.loans.list_item_history(tent.id).await.unwrap().is_empty());
}
