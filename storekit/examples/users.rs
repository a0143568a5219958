//! Users Example - Repository and Transactions over the In-Memory Store
//!
//! This example demonstrates:
//! - Describing an entity's table with `Entity`
//! - Creating, querying, updating and deleting through `Repository`
//! - Composing query options functionally and with the builder
//! - Committing and rolling back a transaction
//!
//! Run with: cargo run --example users

use storekit::backend::memory::MemoryStore;
use storekit::prelude::*;

#[derive(Debug, Clone, PartialEq)]
struct User {
    id: i64,
    name: String,
    email: Option<String>,
}

impl Entity for User {
    const TABLE: &'static str = "users";

    fn columns() -> &'static [&'static str] {
        &["id", "name", "email"]
    }

    fn to_row(&self) -> Row {
        Row::new()
            .with("id", self.id)
            .with("name", self.name.as_str())
            .with("email", self.email.clone())
    }

    fn from_row(row: &Row) -> std::result::Result<Self, RepositoryError> {
        Ok(Self {
            id: row.get_i64("id")?,
            name: row.get_string("name")?,
            email: row.get_opt_string("email")?,
        })
    }

    fn set_primary_key(&mut self, key: Value) {
        if let Some(id) = key.as_i64() {
            self.id = id;
        }
    }
}

fn user(name: &str) -> User {
    User {
        id: 0,
        name: name.to_string(),
        email: None,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing(&Config::default())?;

    let users = Repository::<User, _>::new(MemoryStore::new()).with_logger(TracingLogger);
    let ctx = Context::new();

    for name in ["alice", "bob", "carol", "dave"] {
        users.create(&ctx, &mut user(name)).await?;
    }

    // Functional options
    let bob = users.get(&ctx, [with_filter(Filter::eq("name", "bob"))]).await?;
    println!("found {:?}", bob);

    // Builder chain
    let page = users
        .list(
            &ctx,
            QueryOptions::default()
                .order_by("name", OrderDirection::Descending)
                .page(1, 2),
        )
        .await?;
    println!("first page: {:?}", page);

    let renamed = User {
        email: Some("bob@example.com".to_string()),
        ..bob.clone()
    };
    users.update(&ctx, &renamed, QueryOptions::default()).await?;

    // Both deletes succeed or neither does
    users
        .transaction(&ctx, |tx| {
            Box::pin(async move {
                let ctx = tx.context().clone();
                tx.delete(&ctx, [with_filter(Filter::eq("name", "carol"))])
                    .await?;
                tx.delete(&ctx, [with_filter(Filter::eq("name", "dave"))])
                    .await?;
                Ok::<_, RepositoryError>(())
            })
        })
        .await?;

    // An error from the callback rolls everything back
    let outcome = users
        .transaction(&ctx, |tx| {
            Box::pin(async move {
                let ctx = tx.context().clone();
                tx.delete(&ctx, [with_filter(Filter::eq("name", "alice"))])
                    .await?;
                Err::<(), _>(RepositoryError::validation_failed(
                    RepositoryOperation::Transaction,
                    "changed my mind",
                ))
            })
        })
        .await;
    println!("rolled back: {}", outcome.is_err());

    let remaining = users.count(&ctx, QueryOptions::default()).await?;
    println!("{} users remain", remaining);

    let missing = users
        .get(&ctx, [with_filter(Filter::eq("name", "carol"))])
        .await;
    println!("carol not found: {}", matches!(missing, Err(ref e) if e.is_not_found()));

    Ok(())
}
