//! Postgres ledger tests
//!
//! Need a live database: `DATABASE_URL=postgres://... cargo test -- --ignored`

use std::time::Duration;

use sqlx::{postgres::PgPoolOptions, PgPool};

use libris_server::{
    error::AppError,
    models::borrow_request::{Decision, RequestStatus},
    repository::{CatalogStore, Repository},
    services::loans::LoansService,
};

async fn pool() -> PgPool {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&url)
        .await
        .expect("Failed to connect to database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run database migrations");

    pool
}

async fn insert_book(pool: &PgPool, title: &str) -> i32 {
    sqlx::query_scalar("INSERT INTO books (title, author, category) VALUES ($1, 'Test', 'Test') RETURNING id")
        .bind(title)
        .fetch_one(pool)
        .await
        .expect("Failed to insert book")
}

async fn insert_patron(pool: &PgPool, name: &str) -> i32 {
    sqlx::query_scalar("INSERT INTO users (name, role) VALUES ($1, 'student') RETURNING id")
        .bind(name)
        .fetch_one(pool)
        .await
        .expect("Failed to insert patron")
}

fn service(pool: PgPool) -> LoansService {
    LoansService::new(Repository::postgres(pool), Duration::from_secs(5))
}

#[tokio::test]
#[ignore] // Run with: cargo test -- --ignored
async fn test_borrow_cycle() {
    let pool = pool().await;
    let book_id = insert_book(&pool, "Cycle").await;
    let user_id = insert_patron(&pool, "Cycle patron").await;
    let loans = service(pool.clone());
    let repository = Repository::postgres(pool);

    let request = loans
        .create_borrow_request(book_id, user_id)
        .await
        .expect("create");
    assert_eq!(request.status, RequestStatus::Pending);

    let approved = loans
        .decide_borrow_request(request.id, Decision::Approved)
        .await
        .expect("approve");
    assert_eq!(approved.status, RequestStatus::Approved);
    assert!(approved.due_date.is_some());
    assert!(!repository.ledger.get_book(book_id).await.expect("book").available);

    let returned = loans.request_return(book_id, user_id).await.expect("return");
    assert_eq!(returned.status, RequestStatus::Returned);
    assert!(returned.returned);
    assert_eq!(returned.due_date, approved.due_date);
    assert!(repository.ledger.get_book(book_id).await.expect("book").available);
}

#[tokio::test]
#[ignore]
async fn test_unknown_patron_is_not_found() {
    let pool = pool().await;
    let book_id = insert_book(&pool, "Orphan").await;
    let loans = service(pool);

    let result = loans.create_borrow_request(book_id, i32::MAX).await;
    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore]
async fn test_concurrent_creates_single_winner() {
    let pool = pool().await;
    let book_id = insert_book(&pool, "Contended").await;
    let mut patrons = Vec::new();
    for i in 0..8 {
        patrons.push(insert_patron(&pool, &format!("Racer {}", i)).await);
    }
    let loans = service(pool);

    let handles: Vec<_> = patrons
        .into_iter()
        .map(|user_id| {
            let loans = loans.clone();
            tokio::spawn(async move { loans.create_borrow_request(book_id, user_id).await })
        })
        .collect();

    let mut created = 0;
    for handle in handles {
        match handle.await.expect("task panicked") {
            Ok(_) => created += 1,
            Err(e) => assert!(matches!(e, AppError::Conflict(_)), "unexpected {:?}", e),
        }
    }
    assert_eq!(created, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore]
async fn test_concurrent_approvals_single_winner() {
    let pool = pool().await;
    let book_id = insert_book(&pool, "Approved twice").await;
    let user_id = insert_patron(&pool, "Approver").await;
    let loans = service(pool.clone());

    let request_id = loans
        .create_borrow_request(book_id, user_id)
        .await
        .expect("create")
        .id;

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let loans = loans.clone();
            tokio::spawn(async move { loans.decide_borrow_request(request_id, Decision::Approved).await })
        })
        .collect();

    let mut approved = 0;
    for handle in handles {
        match handle.await.expect("task panicked") {
            Ok(_) => approved += 1,
            Err(e) => assert!(matches!(e, AppError::Conflict(_)), "unexpected {:?}", e),
        }
    }
    assert_eq!(approved, 1);

    let repository = Repository::postgres(pool);
    assert!(!repository.ledger.get_book(book_id).await.expect("book").available);
}
